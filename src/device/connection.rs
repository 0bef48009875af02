use std::convert::Infallible;
use std::future::Future;
use iced::subscription::{self, Subscription};
use futures::{SinkExt, StreamExt};
use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::future::pending;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio::time::{sleep, sleep_until, timeout, Duration, Instant};

use crate::command::types::Note;
use crate::config::types::DeviceConfig;
use crate::device::constants::{CONNECT_DEADLINE, CONNECT_DELAY, IS_CONNECTED_DEADLINE, POLL_DELAY, WRITE_DEADLINE};
use crate::device::transport::{Link, Transport};
use crate::device::types::{LinkEvent, LinkState, Peer};
use crate::error::DeviceError;

#[derive(Debug)]
enum ConnectionState {
    Discovering {
        retry: bool,
    },
    ServiceLookup {
        peer: Peer,
    },
    Connecting {
        peer: Peer,
    },
    Connected {
        peer: Peer,
        link: Link,
        // when to check again that the peer is still there
        next_poll: Instant,
    },
    // the connection was lost or could not be opened
    Disconnected,
    Closing {
        link: Option<Link>,
    },
    Closed,
}

impl ConnectionState {
    fn link_state(&self) -> LinkState {
        match self {
            ConnectionState::Discovering { .. } => LinkState::Discovering,
            ConnectionState::ServiceLookup { .. } => LinkState::ServiceLookup,
            ConnectionState::Connecting { .. } => LinkState::Connecting,
            ConnectionState::Connected { peer, .. } => LinkState::Connected(peer.clone()),
            ConnectionState::Disconnected => LinkState::Disconnected,
            ConnectionState::Closing { .. } => LinkState::Closing,
            ConnectionState::Closed => LinkState::Disconnected,
        }
    }
}

fn next_poll() -> Instant {
    Instant::now() + Duration::from_millis(POLL_DELAY)
}

// None if `cancel` fired first
async fn unless_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

async fn advance_state(
    state: ConnectionState,
    transport: &mut Transport,
    notes: &mut Receiver<Note>,
    cancel: &CancellationToken,
) -> ConnectionState {
    match state {
        ConnectionState::Discovering { retry } => {
            if retry && unless_cancelled(cancel, sleep(Duration::from_millis(CONNECT_DELAY))).await.is_none() {
                return ConnectionState::Closing { link: None };
            }

            match unless_cancelled(cancel, transport.find_peer()).await {
                None => ConnectionState::Closing { link: None },
                Some(Ok(Some(peer))) => {
                    info!("Using peer {}", peer);
                    ConnectionState::ServiceLookup { peer }
                },
                Some(Ok(None)) => {
                    debug!("No peer matched");
                    ConnectionState::Discovering { retry: true }
                },
                Some(Err(err)) => {
                    warn!("Discovery failed: {}", err);
                    transport.reset();
                    ConnectionState::Discovering { retry: true }
                },
            }
        },
        ConnectionState::ServiceLookup { peer } => {
            match unless_cancelled(cancel, transport.lookup_service(&peer)).await {
                None => ConnectionState::Closing { link: None },
                Some(Ok(())) => ConnectionState::Connecting { peer },
                Some(Err(DeviceError::MissingSerialService)) => {
                    warn!("{} does not offer a serial port, ignoring it", peer);
                    ConnectionState::Discovering { retry: true }
                },
                Some(Err(err)) => {
                    warn!("Service lookup failed: {}", err);
                    transport.reset();
                    ConnectionState::Discovering { retry: true }
                },
            }
        },
        ConnectionState::Connecting { peer } => {
            let open = timeout(Duration::from_millis(CONNECT_DEADLINE), transport.open_link(&peer));

            match unless_cancelled(cancel, open).await {
                None => ConnectionState::Closing { link: None },
                Some(Ok(Ok(link))) => {
                    // drop whatever was queued while we were not connected
                    while let Ok(Some(note)) = notes.try_next() {
                        debug!("Discarding stale note {}", note);
                    }

                    info!("Connected");
                    ConnectionState::Connected { peer, link, next_poll: next_poll() }
                },
                Some(Ok(Err(err))) => {
                    warn!("Connecting to peer failed: {}", err);
                    ConnectionState::Disconnected
                },
                Some(Err(_)) => {
                    warn!("Connecting to peer took too long");
                    ConnectionState::Disconnected
                },
            }
        },
        ConnectionState::Connected { peer, mut link, next_poll: poll_at } => {
            tokio::select! {
                _ = cancel.cancelled() => ConnectionState::Closing { link: Some(link) },
                _ = sleep_until(poll_at) => {
                    let check = timeout(Duration::from_millis(IS_CONNECTED_DEADLINE), transport.is_connected(&peer));
                    match check.await {
                        Ok(Ok(true)) => ConnectionState::Connected { peer, link, next_poll: next_poll() },
                        Ok(Ok(false)) => {
                            warn!("Connection lost");
                            ConnectionState::Disconnected
                        },
                        Ok(Err(err)) => {
                            warn!("Error checking for connection state: {}", err);
                            transport.reset();
                            ConnectionState::Disconnected
                        },
                        Err(_) => {
                            warn!("Checking for connection status took too long");
                            ConnectionState::Disconnected
                        },
                    }
                },
                note = notes.next() => match note {
                    None => ConnectionState::Closing { link: Some(link) },
                    Some(note) => {
                        debug!("Writing {} to {}", note, peer);
                        match timeout(Duration::from_millis(WRITE_DEADLINE), link.write_note(note)).await {
                            Ok(Ok(())) => ConnectionState::Connected { peer, link, next_poll: poll_at },
                            Ok(Err(err)) => {
                                warn!("Connection lost: {}", err);
                                ConnectionState::Disconnected
                            },
                            Err(_) => {
                                warn!("Writing to the peer took too long");
                                ConnectionState::Disconnected
                            },
                        }
                    },
                },
            }
        },
        ConnectionState::Disconnected => {
            match unless_cancelled(cancel, sleep(Duration::from_millis(CONNECT_DELAY))).await {
                None => ConnectionState::Closing { link: None },
                Some(()) => ConnectionState::Discovering { retry: false },
            }
        },
        ConnectionState::Closing { link } => {
            if let Some(mut link) = link {
                info!("Closing link");
                if let Err(err) = link.close().await {
                    warn!("Failed to close link: {}", err);
                }
            }
            ConnectionState::Closed
        },
        ConnectionState::Closed => ConnectionState::Closed,
    }
}

async fn emit(output: &mut Sender<LinkEvent>, event: LinkEvent) {
    if let Err(err) = output.send(event).await {
        warn!("Failed to send LinkEvent: {}", err);
    }
}

async fn connect_device(config: DeviceConfig, cancel: CancellationToken, mut output: Sender<LinkEvent>) -> Infallible {
    let (note_sender, mut notes) = channel::<Note>(32);
    emit(&mut output, LinkEvent::Ready(note_sender)).await;

    let mut transport = Transport::new(config);
    let mut connection_state = ConnectionState::Discovering { retry: false };
    let mut previous_link_state: Option<LinkState> = None;

    // note: subscription::channel expects the future to never resolve (Infallible)
    // so after closing, this function idles until the subscription is dropped.
    loop {
        let link_state = connection_state.link_state();

        if previous_link_state.as_ref() != Some(&link_state) {
            info!("Link state changed: {:?}", link_state);
            emit(&mut output, LinkEvent::StateChange(link_state.clone())).await;
            previous_link_state = Some(link_state);
        }

        if let ConnectionState::Closed = connection_state {
            break;
        }

        connection_state = advance_state(connection_state, &mut transport, &mut notes, &cancel).await;
    }

    pending().await
}

pub fn connect_device_subscription(config: DeviceConfig, cancel: CancellationToken) -> Subscription<LinkEvent> {
    struct Connect;

    subscription::channel(
        std::any::TypeId::of::<Connect>(),
        64,
        move |output| connect_device(config, cancel, output),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_device_path() -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("poisson-billy-rfcomm-{}-{}", std::process::id(), nanos))
    }

    async fn next_event(receiver: &mut Receiver<LinkEvent>) -> LinkEvent {
        timeout(Duration::from_secs(5), receiver.next())
            .await
            .expect("timed out waiting for a LinkEvent")
            .expect("event stream ended")
    }

    async fn next_state(receiver: &mut Receiver<LinkEvent>) -> LinkState {
        match next_event(receiver).await {
            LinkEvent::StateChange(state) => state,
            other => panic!("expected a state change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn serial_device_lifecycle() {
        let path = temp_device_path();
        std::fs::write(&path, b"").unwrap();

        let mut config = DeviceConfig::default();
        config.serial_path = Some(path.clone());
        let cancel = CancellationToken::new();
        let (output, mut events) = channel::<LinkEvent>(64);

        let task = tokio::spawn(connect_device(config, cancel.clone(), output));

        let mut notes = match next_event(&mut events).await {
            LinkEvent::Ready(sender) => sender,
            other => panic!("expected Ready, got {:?}", other),
        };

        assert_eq!(next_state(&mut events).await, LinkState::Discovering);
        assert_eq!(next_state(&mut events).await, LinkState::ServiceLookup);
        assert_eq!(next_state(&mut events).await, LinkState::Connecting);
        let peer = Peer { name: "El Poisson".to_string(), address: path.to_string_lossy().into_owned() };
        assert_eq!(next_state(&mut events).await, LinkState::Connected(peer));

        notes.send(Note::Open).await.unwrap();
        notes.send(Note::Head).await.unwrap();
        notes.send(Note::Close).await.unwrap();

        // give the loop a chance to write before asking it to close
        sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert_eq!(next_state(&mut events).await, LinkState::Closing);
        assert_eq!(next_state(&mut events).await, LinkState::Disconnected);

        assert_eq!(std::fs::read(&path).unwrap(), b"ohc".to_vec());

        task.abort();
        std::fs::remove_file(&path).unwrap();
    }

    async fn connect_serial(path: PathBuf) -> (Sender<Note>, Receiver<LinkEvent>, CancellationToken, tokio::task::JoinHandle<Infallible>) {
        let mut config = DeviceConfig::default();
        config.serial_path = Some(path);
        let cancel = CancellationToken::new();
        let (output, mut events) = channel::<LinkEvent>(64);

        let task = tokio::spawn(connect_device(config, cancel.clone(), output));

        let notes = match next_event(&mut events).await {
            LinkEvent::Ready(sender) => sender,
            other => panic!("expected Ready, got {:?}", other),
        };

        assert_eq!(next_state(&mut events).await, LinkState::Discovering);
        assert_eq!(next_state(&mut events).await, LinkState::ServiceLookup);
        assert_eq!(next_state(&mut events).await, LinkState::Connecting);
        assert!(matches!(next_state(&mut events).await, LinkState::Connected(_)));

        (notes, events, cancel, task)
    }

    // writes to /dev/full always fail with ENOSPC
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_error_disconnects_and_rediscovers() {
        let (mut notes, mut events, cancel, task) = connect_serial(PathBuf::from("/dev/full")).await;

        notes.send(Note::Open).await.unwrap();

        assert_eq!(next_state(&mut events).await, LinkState::Disconnected);
        assert_eq!(next_state(&mut events).await, LinkState::Discovering);

        cancel.cancel();
        task.abort();
    }

    #[tokio::test]
    async fn vanished_serial_device_is_noticed_without_writing() {
        let path = temp_device_path();
        std::fs::write(&path, b"").unwrap();

        let (_notes, mut events, cancel, task) = connect_serial(path.clone()).await;

        std::fs::remove_file(&path).unwrap();

        assert_eq!(next_state(&mut events).await, LinkState::Disconnected);
        assert_eq!(next_state(&mut events).await, LinkState::Discovering);

        cancel.cancel();
        task.abort();
    }

    #[tokio::test]
    async fn cancelling_while_discovering_closes() {
        let mut config = DeviceConfig::default();
        config.serial_path = Some(temp_device_path());
        let cancel = CancellationToken::new();
        let (output, mut events) = channel::<LinkEvent>(64);

        let task = tokio::spawn(connect_device(config, cancel.clone(), output));

        assert!(matches!(next_event(&mut events).await, LinkEvent::Ready(_)));
        assert_eq!(next_state(&mut events).await, LinkState::Discovering);

        cancel.cancel();

        assert_eq!(next_state(&mut events).await, LinkState::Closing);
        assert_eq!(next_state(&mut events).await, LinkState::Disconnected);

        task.abort();
    }
}
