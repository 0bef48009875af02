use futures::channel::mpsc::Sender;

use crate::command::types::Note;

/// The prop as found by discovery: its advertised name and either a Bluetooth
/// address or the path of an OS-bound serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    pub address: String,
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Initial,
    Discovering,
    ServiceLookup,
    Connecting,
    Connected(Peer),
    Closing,
    Disconnected,
}

impl LinkState {
    pub fn is_writable(&self) -> bool {
        matches!(self, LinkState::Connected(_))
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Initial => write!(f, ""),
            LinkState::Discovering => write!(f, "Looking for the fish…"),
            LinkState::ServiceLookup => write!(f, "Service lookup…"),
            LinkState::Connecting => write!(f, "Connecting…"),
            LinkState::Connected(peer) => write!(f, "Connected to {}", peer),
            LinkState::Closing => write!(f, "Closing…"),
            LinkState::Disconnected => write!(f, "Not connected"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Sent once; notes sent here are written to the prop while connected.
    Ready(Sender<Note>),
    StateChange(LinkState),
}
