use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use log::info;

use crate::command::types::Note;
use crate::config::types::DeviceConfig;
use crate::device::types::Peer;
use crate::error::DeviceError;

/// An open byte stream to the prop.
pub struct Link {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl Link {
    pub fn new<W: AsyncWrite + Send + Unpin + 'static>(writer: W) -> Self {
        Link { writer: Box::new(writer) }
    }

    pub async fn write_note(&mut self, note: Note) -> Result<(), DeviceError> {
        self.writer.write_all(&[note.command_byte()]).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), DeviceError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Finds the prop and opens a [`Link`] to it, either through BlueZ (discovery + RFCOMM)
/// or through a serial device the OS already bound to it.
pub struct Transport {
    config: DeviceConfig,
    #[cfg(target_os = "linux")]
    bluez: Option<crate::device::bluez::Bluez>,
}

impl Transport {
    pub fn new(config: DeviceConfig) -> Self {
        Transport {
            config,
            #[cfg(target_os = "linux")]
            bluez: None,
        }
    }

    /// Forget the adapter after an error; the next attempt starts from a fresh session.
    pub fn reset(&mut self) {
        #[cfg(target_os = "linux")]
        {
            self.bluez = None;
        }
    }

    pub async fn find_peer(&mut self) -> Result<Option<Peer>, DeviceError> {
        if let Some(path) = &self.config.serial_path {
            return match tokio::fs::metadata(path).await {
                Ok(_) => Ok(Some(Peer {
                    name: self.config.name.clone(),
                    address: path.to_string_lossy().into_owned(),
                })),
                Err(err) => {
                    info!("Serial device {} is not available: {}", path.to_string_lossy(), err);
                    Ok(None)
                },
            };
        }

        self.find_bluetooth_peer().await
    }

    pub async fn lookup_service(&mut self, peer: &Peer) -> Result<(), DeviceError> {
        if self.config.serial_path.is_some() {
            return Ok(());
        }

        self.lookup_bluetooth_service(peer).await
    }

    pub async fn open_link(&mut self, peer: &Peer) -> Result<Link, DeviceError> {
        if let Some(path) = &self.config.serial_path {
            info!("Opening serial device {}", path.to_string_lossy());
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .await?;
            return Ok(Link::new(file));
        }

        self.open_bluetooth_link(peer).await
    }

    /// Whether the peer of an open link is still there. A serial device node
    /// disappears when the OS releases the connection.
    pub async fn is_connected(&mut self, peer: &Peer) -> Result<bool, DeviceError> {
        if let Some(path) = &self.config.serial_path {
            return Ok(tokio::fs::metadata(path).await.is_ok());
        }

        self.is_bluetooth_connected(peer).await
    }

    #[cfg(target_os = "linux")]
    async fn bluez(&mut self) -> Result<&crate::device::bluez::Bluez, DeviceError> {
        if self.bluez.is_none() {
            self.bluez = Some(crate::device::bluez::Bluez::new().await?);
        }
        self.bluez.as_ref().ok_or(DeviceError::Unsupported)
    }

    #[cfg(target_os = "linux")]
    async fn find_bluetooth_peer(&mut self) -> Result<Option<Peer>, DeviceError> {
        let name = self.config.name.clone();
        let address = self.config.address.clone();
        self.bluez().await?.find_peer(&name, address.as_deref()).await
    }

    #[cfg(target_os = "linux")]
    async fn lookup_bluetooth_service(&mut self, peer: &Peer) -> Result<(), DeviceError> {
        self.bluez().await?.lookup_service(peer).await
    }

    #[cfg(target_os = "linux")]
    async fn open_bluetooth_link(&mut self, peer: &Peer) -> Result<Link, DeviceError> {
        let channel = self.config.rfcomm_channel;
        let stream = self.bluez().await?.connect(peer, channel).await?;
        Ok(Link::new(stream))
    }

    #[cfg(target_os = "linux")]
    async fn is_bluetooth_connected(&mut self, peer: &Peer) -> Result<bool, DeviceError> {
        self.bluez().await?.is_connected(peer).await
    }

    #[cfg(not(target_os = "linux"))]
    async fn is_bluetooth_connected(&mut self, _peer: &Peer) -> Result<bool, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    #[cfg(not(target_os = "linux"))]
    async fn find_bluetooth_peer(&mut self) -> Result<Option<Peer>, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    #[cfg(not(target_os = "linux"))]
    async fn lookup_bluetooth_service(&mut self, _peer: &Peer) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }

    #[cfg(not(target_os = "linux"))]
    async fn open_bluetooth_link(&mut self, _peer: &Peer) -> Result<Link, DeviceError> {
        Err(DeviceError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn notes_are_written_as_single_bytes() {
        let (client, mut server) = tokio::io::duplex(16);
        let mut link = Link::new(client);

        link.write_note(Note::Open).await.unwrap();
        link.write_note(Note::Tail).await.unwrap();
        link.close().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"ot".to_vec());
    }

    #[tokio::test]
    async fn missing_serial_device_is_not_found() {
        let mut config = DeviceConfig::default();
        config.serial_path = Some(std::env::temp_dir().join("poisson-billy-no-such-device"));
        let mut transport = Transport::new(config);

        assert_eq!(transport.find_peer().await.unwrap(), None);
    }

    #[tokio::test]
    async fn removed_serial_device_is_disconnected() {
        let path = std::env::temp_dir().join(format!("poisson-billy-vanishing-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let mut config = DeviceConfig::default();
        config.serial_path = Some(path.clone());
        let mut transport = Transport::new(config);
        let peer = transport.find_peer().await.unwrap().unwrap();

        assert!(transport.is_connected(&peer).await.unwrap());

        std::fs::remove_file(&path).unwrap();
        assert!(!transport.is_connected(&peer).await.unwrap());
    }
}
