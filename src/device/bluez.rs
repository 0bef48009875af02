use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use bluer::rfcomm::{SocketAddr, Stream};
use futures::{pin_mut, StreamExt};
use log::{debug, info};
use tokio::time::{sleep, Duration};

use crate::device::constants::{DISCOVERY_WINDOW, SERIAL_PORT_SERVICE};
use crate::device::types::Peer;
use crate::error::DeviceError;

pub fn parse_address(address: &str) -> Result<Address, DeviceError> {
    address.parse::<Address>().map_err(|_| DeviceError::InvalidAddress(address.to_string()))
}

/// With an address configured only the address counts, otherwise the name must
/// match exactly. Devices often show up before their name is resolved.
pub fn peer_matches(address: Address, device_name: Option<&str>, name: &str, wanted: Option<Address>) -> bool {
    match wanted {
        Some(wanted) => wanted == address,
        None => device_name == Some(name),
    }
}

pub struct Bluez {
    _session: Session,
    adapter: Adapter,
}

impl Bluez {
    pub async fn new() -> Result<Self, DeviceError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using adapter {}", adapter.name());
        adapter.set_powered(true).await?;

        Ok(Bluez { _session: session, adapter })
    }

    /// Looks for the prop among the devices the adapter already knows about (paired
    /// devices), then in a classic discovery run of at most DISCOVERY_WINDOW.
    pub async fn find_peer(&self, name: &str, address: Option<&str>) -> Result<Option<Peer>, DeviceError> {
        let wanted = address.map(parse_address).transpose()?;

        for known in self.adapter.device_addresses().await? {
            if let Some(peer) = self.matching_peer(known, name, wanted).await? {
                return Ok(Some(peer));
            }
        }

        let mut filter = DiscoveryFilter::default();
        filter.transport = DiscoveryTransport::BrEdr;
        self.adapter.set_discovery_filter(filter).await?;

        info!("Discovering devices...");
        // a device is reported again when its properties (such as its name) change
        let events = self.adapter.discover_devices_with_changes().await?;
        pin_mut!(events);

        let deadline = sleep(Duration::from_millis(DISCOVERY_WINDOW));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("No device matched during discovery");
                    return Ok(None);
                },
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(added)) => {
                        if let Some(peer) = self.matching_peer(added, name, wanted).await? {
                            return Ok(Some(peer));
                        }
                    },
                    Some(_) => {},
                    None => return Ok(None),
                },
            }
        }
    }

    async fn matching_peer(&self, address: Address, name: &str, wanted: Option<Address>) -> Result<Option<Peer>, DeviceError> {
        let device = self.adapter.device(address)?;
        let device_name = device.name().await?;
        debug!("Device discovered: {} {}", address, device_name.as_deref().unwrap_or("(no name yet)"));

        if !peer_matches(address, device_name.as_deref(), name, wanted) {
            return Ok(None);
        }

        info!("Found {} {}", address, device_name.as_deref().unwrap_or_default());
        Ok(Some(Peer {
            name: device_name.unwrap_or_default(),
            address: address.to_string(),
        }))
    }

    /// Devices that do not list their services are given the benefit of the doubt.
    pub async fn lookup_service(&self, peer: &Peer) -> Result<(), DeviceError> {
        let device = self.adapter.device(parse_address(&peer.address)?)?;

        match device.uuids().await? {
            Some(uuids) if !uuids.is_empty() => {
                if uuids.contains(&SERIAL_PORT_SERVICE) {
                    Ok(())
                } else {
                    Err(DeviceError::MissingSerialService)
                }
            },
            _ => {
                debug!("{} does not list its services", peer);
                Ok(())
            },
        }
    }

    pub async fn is_connected(&self, peer: &Peer) -> Result<bool, DeviceError> {
        let device = self.adapter.device(parse_address(&peer.address)?)?;
        Ok(device.is_connected().await?)
    }

    pub async fn connect(&self, peer: &Peer, channel: u8) -> Result<Stream, DeviceError> {
        let address = parse_address(&peer.address)?;
        info!("Opening RFCOMM channel {} on {}", channel, address);
        let stream = Stream::connect(SocketAddr::new(address, channel)).await?;
        Ok(stream)
    }
}
