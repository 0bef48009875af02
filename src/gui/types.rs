use iced::Event;

use crate::command::types::Note;
use crate::config::types::Config;
use crate::device::types::LinkEvent;
use crate::midi::types::MidiEvent;
use crate::vision::types::VisionEvent;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)),
    FaceImageLoadComplete(Result<Vec<u8>, String>),
    Link(LinkEvent),
    Midi(MidiEvent),
    Vision(VisionEvent),
    NotePress(Note),
    MouthToggle,
    TrackingToggle,
    NoticeConfirmed,
}

/// What the GUI last heard from the MIDI bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiStatus {
    Disabled,
    Starting,
    Ready(String),
    Unavailable,
}

impl std::fmt::Display for MidiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiStatus::Disabled => write!(f, "MIDI disabled"),
            MidiStatus::Starting => write!(f, "Opening MIDI ports…"),
            MidiStatus::Ready(port_name) => write!(f, "MIDI ports \"{}\" open", port_name),
            MidiStatus::Unavailable => write!(f, "MIDI unavailable"),
        }
    }
}

/// Mouth recognition runs from `Running` until the tracking thread reports back
/// after being asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Off,
    Running,
    Stopping,
}

impl TrackingState {
    /// The tracking subscription must stay alive in this state.
    pub fn is_active(self) -> bool {
        self != TrackingState::Off
    }

    pub fn toggled(self) -> TrackingState {
        match self {
            TrackingState::Off => TrackingState::Running,
            TrackingState::Running => TrackingState::Stopping,
            // the camera is not released yet
            TrackingState::Stopping => TrackingState::Stopping,
        }
    }

    /// Button label, describing the current state.
    pub fn label(self) -> &'static str {
        match self {
            TrackingState::Off => "Mouth recognition off",
            TrackingState::Running => "Mouth recognition on",
            TrackingState::Stopping => "Stopping mouth recognition…",
        }
    }
}

/// What the tracking panel says about the face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FaceStatus {
    /// no frame analysed yet
    #[default]
    Waiting,
    NoFace,
    Face { mar: f32, open: bool },
}

impl FaceStatus {
    pub fn from_frame(face_found: bool, mar: Option<f32>, mar_threshold: f32) -> FaceStatus {
        match (face_found, mar) {
            (true, Some(mar)) => FaceStatus::Face { mar, open: mar > mar_threshold },
            _ => FaceStatus::NoFace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_label_shows_the_current_state() {
        assert_eq!(TrackingState::Off.label(), "Mouth recognition off");
        assert_eq!(TrackingState::Running.label(), "Mouth recognition on");
        assert_eq!(TrackingState::Off.toggled().label(), "Mouth recognition on");
    }

    #[test]
    fn tracking_cannot_restart_while_stopping() {
        let state = TrackingState::Off.toggled();
        assert_eq!(state, TrackingState::Running);

        let state = state.toggled();
        assert_eq!(state, TrackingState::Stopping);
        assert!(state.is_active());

        assert_eq!(state.toggled(), TrackingState::Stopping);
        assert!(!TrackingState::Off.is_active());
    }

    #[test]
    fn no_face_is_only_reported_after_a_frame() {
        assert_eq!(FaceStatus::default(), FaceStatus::Waiting);
        assert_eq!(FaceStatus::from_frame(false, None, 0.69), FaceStatus::NoFace);
        // landmarks failed on the detected face
        assert_eq!(FaceStatus::from_frame(true, None, 0.69), FaceStatus::NoFace);
    }

    #[test]
    fn face_status_compares_against_the_threshold() {
        assert_eq!(FaceStatus::from_frame(true, Some(0.8), 0.69), FaceStatus::Face { mar: 0.8, open: true });
        assert_eq!(FaceStatus::from_frame(true, Some(0.69), 0.69), FaceStatus::Face { mar: 0.69, open: false });
        assert_eq!(FaceStatus::from_frame(true, Some(0.2), 0.69), FaceStatus::Face { mar: 0.2, open: false });
    }
}
