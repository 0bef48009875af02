use futures::channel::mpsc::Sender;
use log::{info, warn};

use crate::command::types::Note;

/// Routes notes to the prop and to the virtual MIDI output.
///
/// Notes that originate locally (buttons, keys) go to both, notes that
/// arrive from MIDI or from the mouth tracker only go to the prop.
#[derive(Default)]
pub struct Dispatcher {
    link: Option<Sender<Note>>,
    link_writable: bool,
    midi: Option<Sender<Note>>,
    mouth_open: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_link(&mut self, sender: Sender<Note>) {
        self.link = Some(sender);
    }

    pub fn set_link_writable(&mut self, writable: bool) {
        self.link_writable = writable;
    }

    pub fn is_link_writable(&self) -> bool {
        self.link_writable && self.link.is_some()
    }

    pub fn set_midi(&mut self, sender: Sender<Note>) {
        self.midi = Some(sender);
    }

    pub fn clear_midi(&mut self) {
        self.midi = None;
    }

    pub fn is_mouth_open(&self) -> bool {
        self.mouth_open
    }

    pub fn send_note(&mut self, note: Note) -> bool {
        info!("Sending note: {}", note);

        if let Some(midi) = &mut self.midi {
            if let Err(err) = midi.try_send(note) {
                warn!("Failed to forward note to the MIDI bridge: {}", err);
            }
        }

        self.send_note_to_remote(note)
    }

    /// Returns false if the note was dropped.
    pub fn send_note_to_remote(&mut self, note: Note) -> bool {
        info!("Sending note to remote: {}", note);

        let link = match &mut self.link {
            Some(link) if self.link_writable => link,
            _ => {
                warn!("Cannot send command");
                return false;
            },
        };

        match link.try_send(note) {
            Ok(_) => {
                // only what reached the prop counts
                if note.is_mouth() {
                    self.mouth_open = note == Note::Open;
                }
                true
            },
            Err(err) => {
                warn!("Cannot send command: {}", err);
                false
            },
        }
    }

    pub fn toggle_mouth(&mut self) -> Note {
        let note = if self.mouth_open { Note::Close } else { Note::Open };
        self.send_note(note);
        note
    }
}
