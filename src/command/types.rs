use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};

/// A discrete body/mouth command understood by the prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Note {
    Open,
    Close,
    Head,
    Tail,
    Stop,
}

/// MIDI note number of [`Note::Open`]; the other notes follow consecutively.
pub const FIRST_MIDI_NOTE: u8 = 60;

impl Note {
    pub fn all() -> Vec<Note> {
        all::<Note>().collect::<Vec<_>>()
    }

    /// The single ASCII byte the firmware reacts to.
    pub fn command_byte(self) -> u8 {
        match self {
            Note::Open => b'o',
            Note::Close => b'c',
            Note::Head => b'h',
            Note::Tail => b't',
            Note::Stop => b's',
        }
    }

    pub fn from_command_byte(byte: u8) -> Option<Note> {
        Note::all().into_iter().find(|note| note.command_byte() == byte)
    }

    pub fn midi_number(self) -> u8 {
        match self {
            Note::Open => FIRST_MIDI_NOTE,
            Note::Close => FIRST_MIDI_NOTE + 1,
            Note::Head => FIRST_MIDI_NOTE + 2,
            Note::Tail => FIRST_MIDI_NOTE + 3,
            Note::Stop => FIRST_MIDI_NOTE + 4,
        }
    }

    pub fn from_midi_number(number: u8) -> Option<Note> {
        Note::all().into_iter().find(|note| note.midi_number() == number)
    }

    pub fn is_mouth(self) -> bool {
        matches!(self, Note::Open | Note::Close)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Note::Open => "OPEN",
            Note::Close => "CLOSE",
            Note::Head => "HEAD",
            Note::Tail => "TAIL",
            Note::Stop => "STOP",
        };

        write!(f, "{}", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_match_firmware() {
        let bytes: Vec<u8> = Note::all().into_iter().map(Note::command_byte).collect();
        assert_eq!(bytes, b"ochts".to_vec());
    }

    #[test]
    fn midi_numbers_are_60_to_64() {
        let numbers: Vec<u8> = Note::all().into_iter().map(Note::midi_number).collect();
        assert_eq!(numbers, vec![60, 61, 62, 63, 64]);
    }

    #[test]
    fn lookups_reject_values_outside_the_set() {
        assert_eq!(Note::from_midi_number(59), None);
        assert_eq!(Note::from_midi_number(65), None);
        assert_eq!(Note::from_midi_number(62), Some(Note::Head));
        assert_eq!(Note::from_command_byte(b'x'), None);
        assert_eq!(Note::from_command_byte(b't'), Some(Note::Tail));
    }

    #[test]
    fn serializes_as_lowercase_name() {
        assert_eq!(serde_json::to_string(&Note::Stop).unwrap(), "\"stop\"");
        assert_eq!(serde_json::from_str::<Note>("\"open\"").unwrap(), Note::Open);
    }
}
