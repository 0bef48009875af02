use serde::{Deserialize, Serialize};

use crate::command::types::Note;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBinding {
    pub key: char,
    pub note: Note,
}

impl KeyBinding {
    pub fn new(key: char, note: Note) -> Self {
        KeyBinding { key, note }
    }
}

// laid out for an AZERTY keyboard
pub fn default_key_bindings() -> Vec<KeyBinding> {
    vec![
        KeyBinding::new('q', Note::Open),
        KeyBinding::new('z', Note::Close),
        KeyBinding::new('s', Note::Head),
        KeyBinding::new('e', Note::Tail),
        KeyBinding::new('d', Note::Stop),
    ]
}

/// Lowercases every key and drops later bindings for a key that is already bound.
pub fn normalize_key_bindings(bindings: &mut Vec<KeyBinding>) {
    let mut seen: Vec<char> = Vec::new();

    bindings.retain_mut(|binding| {
        binding.key = lowercase(binding.key);
        if seen.contains(&binding.key) {
            return false;
        }
        seen.push(binding.key);
        true
    });
}

pub fn note_for_key(bindings: &[KeyBinding], key: &str) -> Option<Note> {
    let mut chars = key.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) => lowercase(c),
        _ => return None,
    };

    bindings
        .iter()
        .find(|binding| lowercase(binding.key) == key)
        .map(|binding| binding.note)
}

/// Uppercase list of the keys bound to `note`, e.g. "Q/Z" for the mouth button.
pub fn key_hint(bindings: &[KeyBinding], notes: &[Note]) -> String {
    notes
        .iter()
        .filter_map(|note| bindings.iter().find(|binding| binding.note == *note))
        .map(|binding| binding.key.to_uppercase().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn lowercase(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_resolve_case_insensitively() {
        let bindings = default_key_bindings();

        assert_eq!(note_for_key(&bindings, "q"), Some(Note::Open));
        assert_eq!(note_for_key(&bindings, "Z"), Some(Note::Close));
        assert_eq!(note_for_key(&bindings, "s"), Some(Note::Head));
        assert_eq!(note_for_key(&bindings, "E"), Some(Note::Tail));
        assert_eq!(note_for_key(&bindings, "d"), Some(Note::Stop));
        assert_eq!(note_for_key(&bindings, "x"), None);
        assert_eq!(note_for_key(&bindings, "qq"), None);
        assert_eq!(note_for_key(&bindings, ""), None);
    }

    #[test]
    fn normalize_keeps_first_binding_per_key() {
        let mut bindings = vec![
            KeyBinding::new('A', Note::Head),
            KeyBinding::new('a', Note::Tail),
            KeyBinding::new('b', Note::Stop),
        ];

        normalize_key_bindings(&mut bindings);

        assert_eq!(bindings, vec![
            KeyBinding::new('a', Note::Head),
            KeyBinding::new('b', Note::Stop),
        ]);
    }

    #[test]
    fn hints_follow_bindings() {
        let bindings = default_key_bindings();

        assert_eq!(key_hint(&bindings, &[Note::Open, Note::Close]), "Q/Z");
        assert_eq!(key_hint(&bindings, &[Note::Stop]), "D");
        assert_eq!(key_hint(&[], &[Note::Stop]), "");
    }
}
