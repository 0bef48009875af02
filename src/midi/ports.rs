use std::thread::{self, JoinHandle};
use futures::channel::mpsc::{Receiver, Sender};
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::StreamExt;
use log::{info, warn};
use midir::{MidiInputConnection, MidiOutputConnection};

use crate::command::types::Note;
use crate::error::MidiError;
use crate::midi::message::note_on;

/// A virtual input port and a virtual output port sharing one name.
pub struct VirtualPorts {
    _input: MidiInputConnection<Sender<Vec<u8>>>,
    output: MidiOutputConnection,
}

impl VirtualPorts {
    /// Every message arriving on the input port is pushed to `incoming`.
    #[cfg(unix)]
    pub fn open(port_name: &str, incoming: Sender<Vec<u8>>) -> Result<Self, MidiError> {
        use midir::{MidiInput, MidiOutput};
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let input = MidiInput::new(&format!("{} input", port_name))?;
        let input = input
            .create_virtual(
                port_name,
                |_stamp: u64, message: &[u8], incoming: &mut Sender<Vec<u8>>| {
                    if let Err(err) = incoming.try_send(message.to_vec()) {
                        warn!("Dropping incoming MIDI message {:?}: {}", message, err);
                    }
                },
                incoming,
            )
            .map_err(|err| MidiError::Connect(err.to_string()))?;

        let output = MidiOutput::new(&format!("{} output", port_name))?;
        let output = output
            .create_virtual(port_name)
            .map_err(|err| MidiError::Connect(err.to_string()))?;

        Ok(VirtualPorts { _input: input, output })
    }

    #[cfg(not(unix))]
    pub fn open(_port_name: &str, _incoming: Sender<Vec<u8>>) -> Result<Self, MidiError> {
        Err(MidiError::VirtualPortsUnsupported)
    }

    pub fn send_note_on(&mut self, note: Note) -> Result<(), MidiError> {
        self.output.send(&note_on(note))?;
        Ok(())
    }
}

/// Opens the ports on a dedicated thread which owns them until `outgoing` is closed.
///
/// The returned oneshot resolves once the ports are open (or failed to open).
pub fn spawn_port_thread(
    port_name: String,
    mut outgoing: Receiver<Note>,
    incoming: Sender<Vec<u8>>,
) -> (oneshot::Receiver<Result<(), MidiError>>, JoinHandle<()>) {
    let (ready_sender, ready_receiver) = oneshot::channel();

    let handle = thread::spawn(move || {
        let mut ports = match VirtualPorts::open(&port_name, incoming) {
            Ok(ports) => {
                let _ = ready_sender.send(Ok(()));
                ports
            },
            Err(err) => {
                let _ = ready_sender.send(Err(err));
                return;
            },
        };

        info!("Opened virtual MIDI ports \"{}\"", port_name);

        while let Some(note) = block_on(outgoing.next()) {
            if let Err(err) = ports.send_note_on(note) {
                warn!("Failed to send note {} to the virtual MIDI port: {}", note, err);
            }
        }

        info!("Closing virtual MIDI ports \"{}\"", port_name);
    });

    (ready_receiver, handle)
}
