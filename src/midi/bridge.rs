use std::convert::Infallible;
use std::time::{Duration, Instant};
use futures::channel::mpsc::{channel, Sender};
use futures::future::pending;
use futures::{SinkExt, StreamExt};
use iced::subscription::{self, Subscription};
use log::{debug, info, warn};

use crate::command::types::Note;
use crate::config::types::MidiConfig;
use crate::error::MidiError;
use crate::midi::message::{parse_note_on, EchoGuard};
use crate::midi::ports::spawn_port_thread;
use crate::midi::types::MidiEvent;

async fn emit(output: &mut Sender<MidiEvent>, event: MidiEvent) {
    if let Err(err) = output.send(event).await {
        warn!("Failed to send MidiEvent: {}", err);
    }
}

async fn run_bridge(config: MidiConfig, mut output: Sender<MidiEvent>) -> Infallible {
    let (note_sender, mut note_receiver) = channel::<Note>(32);
    let (mut port_sender, port_receiver) = channel::<Note>(32);
    let (incoming_sender, mut incoming_receiver) = channel::<Vec<u8>>(128);

    // the port thread lives as long as port_sender, which lives as long as this future
    let (ready, _port_thread) = spawn_port_thread(config.port_name.clone(), port_receiver, incoming_sender);

    let opened = match ready.await {
        Ok(result) => result,
        Err(_) => Err(MidiError::ThreadStopped),
    };

    if let Err(err) = opened {
        warn!("MIDI bridge unavailable: {}", err);
        emit(&mut output, MidiEvent::Unavailable(err.to_string())).await;
        return pending().await;
    }

    emit(&mut output, MidiEvent::Ready(note_sender)).await;

    let mut echo_guard = EchoGuard::new(Duration::from_millis(config.echo_window_ms));

    'mainloop: loop {
        tokio::select! {
            Some(note) = note_receiver.next() => {
                echo_guard.record(note, Instant::now());
                if port_sender.send(note).await.is_err() {
                    warn!("The MIDI port thread has stopped");
                    break 'mainloop;
                }
            },
            Some(message) = incoming_receiver.next() => {
                info!("Received MIDI message: {:?}", message);

                match parse_note_on(&message) {
                    Some(note) if echo_guard.is_echo(note, Instant::now()) => {
                        debug!("Ignoring looped back note {}", note);
                    },
                    Some(note) => emit(&mut output, MidiEvent::NoteOn(note)).await,
                    None => {},
                }
            },
            else => break 'mainloop,
        }
    }

    emit(&mut output, MidiEvent::Unavailable(MidiError::ThreadStopped.to_string())).await;
    pending().await
}

pub fn midi_bridge_subscription(config: MidiConfig) -> Subscription<MidiEvent> {
    struct Bridge;

    subscription::channel(
        std::any::TypeId::of::<Bridge>(),
        64,
        move |output| run_bridge(config, output),
    )
}
