use futures::channel::mpsc::Sender;

use crate::command::types::Note;

#[derive(Debug, Clone)]
pub enum MidiEvent {
    /// The virtual ports are open; notes sent here are played on the output port.
    Ready(Sender<Note>),
    Unavailable(String),
    NoteOn(Note),
}
