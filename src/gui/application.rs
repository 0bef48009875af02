use std::path::PathBuf;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::keyboard::{self, Key};
use iced::theme::{self, Theme};
use iced::widget::{button, column, container, horizontal_rule, image, row, text};
use iced::window::icon;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::command::dispatch::Dispatcher;
use crate::command::keys::{key_hint, note_for_key};
use crate::command::types::Note;
use crate::config::io::{resolve_relative, ConfigIO};
use crate::config::types::{Config, VisionConfig};
use crate::device::connection::connect_device_subscription;
use crate::device::types::{LinkEvent, LinkState};
use crate::error::AppRunError;
use crate::gui::style::MouthButtonStyleSheet;
use crate::gui::types::{FaceStatus, Message, MidiStatus, TrackingState};
use crate::midi::bridge::midi_bridge_subscription;
use crate::midi::types::MidiEvent;
use crate::resources::POISSON_FACE_BYTES;
use crate::vision::stream::mouth_tracking_subscription;
use crate::vision::types::VisionEvent;

const COMPACT_SIZE: Size = Size::new(600.0, 480.0);
const TRACKING_SIZE: Size = Size::new(1000.0, 900.0);

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

#[derive(Default)]
struct TrackingView {
    camera_name: Option<String>,
    frame: Option<image::Handle>,
    face: FaceStatus,
}

pub struct PoissonApp {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,
    config_path: PathBuf,
    config: Config,
    // the link and midi subscriptions start once the config is known
    config_loaded: bool,

    dispatcher: Dispatcher,
    link_state: LinkState,
    midi_status: MidiStatus,

    tracking: TrackingState,
    // cancelled to ask the tracking thread to stop
    tracking_stop: CancellationToken,
    tracking_view: TrackingView,

    face_image: image::Handle,
}

impl PoissonApp {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn controls_enabled(&self) -> bool {
        self.dispatcher.is_link_writable()
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    if err.is_file_not_found_error() {
                        // this is probably the first start of the app
                        info!("Config file not found, writing defaults");
                        let config = Config::default();
                        if let Err(err) = config_io.save(config.clone()).await {
                            error!("Failed to save default config: {:?}", &err);
                            return (config, Some(format!("Failed to save config: {}", &err)));
                        }
                        (config, None)
                    } else {
                        error!("Failed to load config: {:?}", &err);
                        (Config::default(), Some(format!("Failed to load config: {}", &err)))
                    }
                },
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn load_face_image(&self, path: PathBuf) -> Command<Message> {
        let fut = async move {
            tokio::fs::read(&path).await.map_err(|err| {
                error!("Failed to read face image {}: {:?}", path.to_string_lossy(), &err);
                format!("Failed to read face image {}: {}", path.to_string_lossy(), &err)
            })
        };

        Command::perform(fut, Message::FaceImageLoadComplete)
    }

    // model paths in the config are relative to the config file
    fn vision_config(&self) -> VisionConfig {
        let mut vision = self.config.vision.clone();
        vision.face_detector_model = resolve_relative(&self.config_path, &vision.face_detector_model);
        vision.landmark_model = resolve_relative(&self.config_path, &vision.landmark_model);
        vision
    }

    fn toggle_tracking(&mut self) -> Command<Message> {
        let tracking = self.tracking.toggled();
        if tracking == self.tracking {
            return Command::none();
        }

        self.tracking = tracking;
        self.tracking_view = TrackingView::default();

        if tracking == TrackingState::Running {
            info!("Mouth recognition on");
            self.tracking_stop = CancellationToken::new();
            window::resize(window::Id::MAIN, TRACKING_SIZE)
        } else {
            info!("Mouth recognition off, waiting for the camera to be released");
            self.tracking_stop.cancel();
            window::resize(window::Id::MAIN, COMPACT_SIZE)
        }
    }

    // the tracking thread has been joined
    fn tracking_finished(&mut self) -> Command<Message> {
        let was_running = self.tracking == TrackingState::Running;
        self.tracking = TrackingState::Off;
        self.tracking_view = TrackingView::default();

        if was_running {
            window::resize(window::Id::MAIN, COMPACT_SIZE)
        } else {
            Command::none()
        }
    }

    fn handle_key(&mut self, key: &str, modifiers: keyboard::Modifiers) {
        if modifiers.control() || modifiers.alt() || modifiers.logo() {
            return;
        }

        if let Some(note) = note_for_key(&self.config.key_bindings, key) {
            if self.controls_enabled() {
                self.dispatcher.send_note(note);
            } else {
                info!("Ignoring key {} while not connected", key);
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Ready(sender) => self.dispatcher.set_link(sender),
            LinkEvent::StateChange(state) => {
                self.dispatcher.set_link_writable(state.is_writable());
                self.link_state = state;
            },
        }
    }

    fn handle_midi_event(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::Ready(sender) => {
                self.dispatcher.set_midi(sender);
                self.midi_status = MidiStatus::Ready(self.config.midi.port_name.clone());
            },
            MidiEvent::Unavailable(reason) => {
                self.dispatcher.clear_midi();
                self.midi_status = MidiStatus::Unavailable;
                self.notices.push(format!("The MIDI bridge is unavailable: {}", reason));
            },
            MidiEvent::NoteOn(note) => {
                self.dispatcher.send_note_to_remote(note);
            },
        }
    }

    fn handle_vision_event(&mut self, event: VisionEvent) -> Command<Message> {
        let running = self.tracking == TrackingState::Running;

        match event {
            VisionEvent::Started(camera_name) if running => {
                self.tracking_view.camera_name = Some(camera_name);
            },
            VisionEvent::Frame { frame, mar, face } if running => {
                self.tracking_view.frame = Some(image::Handle::from_pixels(frame.width, frame.height, frame.rgba));
                self.tracking_view.face = FaceStatus::from_frame(face.is_some(), mar, self.config.vision.mar_threshold);
            },
            VisionEvent::MouthChanged(open) if running => {
                self.dispatcher.send_note_to_remote(if open { Note::Open } else { Note::Close });
            },
            // left over from before the stop request
            VisionEvent::Started(_) | VisionEvent::Frame { .. } | VisionEvent::MouthChanged(_) => {},
            VisionEvent::Stopped => {
                info!("Mouth recognition stopped");
                return self.tracking_finished();
            },
            VisionEvent::Failed(reason) => {
                self.notices.push(format!("Mouth recognition failed: {}", reason));
                return self.tracking_finished();
            },
        }

        Command::none()
    }

    fn tracking_panel(&self) -> Element<Message> {
        let view = &self.tracking_view;

        let frame: Element<Message> = match &view.frame {
            Some(handle) => image(handle.clone()).width(Length::Fill).into(),
            None => text("Starting camera…").into(),
        };

        let status = match view.face {
            FaceStatus::Waiting => column![],
            FaceStatus::NoFace => column![text("No face detected!")],
            FaceStatus::Face { mar, open } => {
                let mut status = column![text(format!("MAR: {:.2}", mar))].spacing(5);
                if open {
                    status = status.push(text("Mouth is Open!").style(theme::Text::Color(iced::Color::from_rgb(0.8, 0.0, 0.0))));
                }
                status
            },
        };

        column![
            text(view.camera_name.clone().unwrap_or_default()).size(14),
            status,
            frame,
        ]
            .spacing(10)
            .align_items(Alignment::Center)
            .into()
    }
}

impl Application for PoissonApp {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (PoissonApp, Command<Self::Message>) {
        let config_path = flags.config_io.path();
        info!("Using config file {}", config_path.to_string_lossy());

        let app = PoissonApp {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            config_path,
            config: Config::default(),
            config_loaded: false,
            dispatcher: Dispatcher::new(),
            link_state: LinkState::Initial,
            midi_status: MidiStatus::Disabled,
            tracking: TrackingState::Off,
            tracking_stop: CancellationToken::new(),
            tracking_view: TrackingView::default(),
            face_image: image::Handle::from_memory(POISSON_FACE_BYTES),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from("El Poisson Billy")
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.config = config;
                self.config_loaded = true;
                self.midi_status = if self.config.midi.enabled { MidiStatus::Starting } else { MidiStatus::Disabled };

                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }

                if let Some(face_image) = &self.config.face_image {
                    let path = resolve_relative(&self.config_path, face_image);
                    return self.load_face_image(path);
                }
            },
            Message::FaceImageLoadComplete(Ok(bytes)) => {
                self.face_image = image::Handle::from_memory(bytes);
            },
            Message::FaceImageLoadComplete(Err(error_message)) => {
                self.notices.push(error_message);
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::EventOccurred(Event::Keyboard(keyboard::Event::KeyPressed { key: Key::Character(key), modifiers, .. })) => {
                // keys must not act behind a notice
                if self.notices.is_empty() {
                    self.handle_key(key.as_str(), modifiers);
                }
            },
            Message::EventOccurred(_) => {},
            Message::Link(event) => self.handle_link_event(event),
            Message::Midi(event) => self.handle_midi_event(event),
            Message::Vision(event) => return self.handle_vision_event(event),
            Message::NotePress(note) => {
                if self.controls_enabled() {
                    self.dispatcher.send_note(note);
                } else {
                    warn!("Ignoring {} while not connected", note);
                }
            },
            Message::MouthToggle => {
                if self.controls_enabled() {
                    self.dispatcher.toggle_mouth();
                }
            },
            Message::TrackingToggle => {
                return self.toggle_tracking();
            },
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![event::listen().map(Message::EventOccurred)];

        if self.config_loaded {
            subscriptions.push(
                connect_device_subscription(self.config.device.clone(), self.app_cancel.clone())
                    .map(Message::Link)
            );

            if self.config.midi.enabled {
                subscriptions.push(midi_bridge_subscription(self.config.midi.clone()).map(Message::Midi));
            }

            if self.tracking.is_active() {
                subscriptions.push(
                    mouth_tracking_subscription(self.vision_config(), self.tracking_stop.clone())
                        .map(Message::Vision)
                );
            }
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let enabled = self.controls_enabled();
        let bindings = &self.config.key_bindings;

        let note_button = |label: &str, note: Note| {
            button(text(format!("{} ({})", label, key_hint(bindings, &[note]))))
                .on_press_maybe(enabled.then_some(Message::NotePress(note)))
        };

        let mouth_button = button(text(format!("Mouth ({})", key_hint(bindings, &[Note::Open, Note::Close]))))
            .style(theme::Button::Custom(Box::new(MouthButtonStyleSheet { open: self.dispatcher.is_mouth_open() })))
            .on_press_maybe(enabled.then_some(Message::MouthToggle));

        let tracking_button = button(text(self.tracking.label()))
            .style(if self.tracking == TrackingState::Running { theme::Button::Primary } else { theme::Button::Secondary })
            .on_press_maybe((self.tracking != TrackingState::Stopping).then_some(Message::TrackingToggle));

        let mut content = column![
            image(self.face_image.clone()).height(200),

            text(self.link_state.to_string()),
            text(self.midi_status.to_string()).size(14),

            horizontal_rule(10),

            row![
                mouth_button,
                note_button("Head", Note::Head),
                note_button("Relax", Note::Stop),
                note_button("Tail", Note::Tail),
            ].spacing(10),

            tracking_button,
        ]
            .spacing(20)
            .width(Length::Fill)
            .align_items(Alignment::Center);

        if self.tracking == TrackingState::Running {
            content = content.push(self.tracking_panel());
        }

        container(content)
            .width(Length::Fill)
            .padding(20)
            .into()
    }
}

fn make_icon() -> Option<icon::Icon> {
    let bytes = include_bytes!(concat!(env!("OUT_DIR"), "/icon-32-rgba"));
    match icon::from_rgba(bytes.to_vec(), 32, 32) {
        Ok(icon) => Some(icon),
        Err(err) => {
            warn!("Failed to load window icon: {}", err);
            None
        },
    }
}

pub fn run_application(config_path: Option<PathBuf>) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync(config_path)?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("poisson-billy".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = COMPACT_SIZE;
    settings.window.resizable = false;
    settings.window.icon = make_icon();

    // this function will call process::exit() unless there was a startup error
    PoissonApp::run(settings)?;
    Ok(())
}
