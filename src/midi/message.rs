use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::command::types::Note;

/// Note-on status byte for channel 1.
pub const NOTE_ON: u8 = 0x90;
pub const FULL_VELOCITY: u8 = 0x7F;

pub fn note_on(note: Note) -> [u8; 3] {
    [NOTE_ON, note.midi_number(), FULL_VELOCITY]
}

/// Returns the note of a channel 1 note-on message. Other channels, other message
/// types, note numbers outside the command set and velocity 0 (a note-off in
/// disguise) are ignored.
pub fn parse_note_on(message: &[u8]) -> Option<Note> {
    match message {
        [NOTE_ON, number, velocity, ..] if *velocity > 0 => Note::from_midi_number(*number),
        _ => None,
    }
}

/// Recognizes our own notes coming back in, for sequencers that route their
/// input straight to their output.
#[derive(Debug)]
pub struct EchoGuard {
    window: Duration,
    sent: VecDeque<(Note, Instant)>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        EchoGuard { window, sent: VecDeque::new() }
    }

    pub fn record(&mut self, note: Note, now: Instant) {
        if self.window.is_zero() {
            return;
        }
        self.prune(now);
        self.sent.push_back((note, now));
    }

    /// Each recorded note suppresses at most one incoming note.
    pub fn is_echo(&mut self, note: Note, now: Instant) -> bool {
        self.prune(now);

        match self.sent.iter().position(|(sent, _)| *sent == note) {
            Some(index) => {
                self.sent.remove(index);
                true
            },
            None => false,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some((_, at)) = self.sent.front() {
            if now.saturating_duration_since(*at) <= self.window {
                break;
            }
            self.sent.pop_front();
        }
    }
}
