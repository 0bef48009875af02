use std::convert::Infallible;
use std::thread;
use futures::channel::mpsc::{channel, Sender};
use futures::executor::block_on;
use futures::future::pending;
use futures::{SinkExt, StreamExt};
use iced::subscription::{self, Subscription};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::types::VisionConfig;
use crate::error::{readable_thread_panic_error, VisionError};
use crate::vision::camera::{resize_to_width, CameraSource};
use crate::vision::detector::UltraFaceDetector;
use crate::vision::landmarks::LandmarkModel;
use crate::vision::overlay::{draw_outline, to_frame, OUTLINE_COLOR};
use crate::vision::tracker::{FrameAnalysis, MouthTracker};
use crate::vision::types::VisionEvent;

// false if nobody is listening anymore
fn send_blocking(events: &mut Sender<VisionEvent>, event: VisionEvent) -> bool {
    block_on(events.send(event)).is_ok()
}

fn tracking_loop(config: VisionConfig, stop: CancellationToken, mut events: Sender<VisionEvent>) -> Result<(), VisionError> {
    let detector = UltraFaceDetector::load(&config.face_detector_model, config.face_confidence)?;
    let landmarks = LandmarkModel::load(&config.landmark_model, config.landmark_input_size)?;
    let mut tracker = MouthTracker::new(detector, landmarks, config.mar_threshold);
    let mut camera = CameraSource::open(config.camera_index)?;

    if !send_blocking(&mut events, VisionEvent::Started(camera.name())) {
        return Ok(());
    }

    while !stop.is_cancelled() {
        let mut frame = resize_to_width(camera.capture()?, config.frame_width);

        let analysis = match tracker.process(&frame) {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!("Skipping frame: {}", err);
                FrameAnalysis::default()
            },
        };

        if let Some(mouth) = &analysis.mouth {
            draw_outline(&mut frame, mouth, OUTLINE_COLOR);
        }

        if let Some(open) = analysis.mouth_changed {
            info!("Mouth is {}", if open { "open" } else { "closed" });
            if !send_blocking(&mut events, VisionEvent::MouthChanged(open)) {
                break;
            }
        }

        let event = VisionEvent::Frame {
            frame: to_frame(&frame),
            mar: analysis.mar,
            face: analysis.face,
        };
        if !send_blocking(&mut events, event) {
            break;
        }
    }

    Ok(())
}

async fn emit(output: &mut Sender<VisionEvent>, event: VisionEvent) {
    if let Err(err) = output.send(event).await {
        warn!("Failed to send VisionEvent: {}", err);
    }
}

/// Runs `body` on its own thread and forwards its events. The final event,
/// `Stopped` or `Failed`, is only emitted once the thread has been joined, so
/// everything it held (such as the camera) has been released by then.
async fn run_tracking_thread<F>(stop: CancellationToken, mut output: Sender<VisionEvent>, body: F) -> Infallible
where
    F: FnOnce(CancellationToken, Sender<VisionEvent>) -> Result<(), VisionError> + Send + 'static,
{
    // dropping the subscription without stopping first still ends the thread
    let _stop_guard = stop.clone().drop_guard();
    let (sender, mut receiver) = channel::<VisionEvent>(4);

    let thread = thread::spawn(move || body(stop, sender));

    // ends when the thread drops its sender
    while let Some(event) = receiver.next().await {
        emit(&mut output, event).await;
    }

    let event = match tokio::task::spawn_blocking(move || thread.join()).await {
        Ok(Ok(Ok(()))) => {
            info!("Mouth tracking stopped");
            VisionEvent::Stopped
        },
        Ok(Ok(Err(err))) => {
            error!("Mouth tracking failed: {}", err);
            VisionEvent::Failed(err.to_string())
        },
        Ok(Err(panic)) => {
            let message = readable_thread_panic_error(&panic);
            error!("{}", message);
            VisionEvent::Failed(message)
        },
        Err(err) => {
            error!("Failed to join the mouth tracking thread: {}", err);
            VisionEvent::Failed(err.to_string())
        },
    };
    emit(&mut output, event).await;

    pending().await
}

/// Runs the camera pipeline until `stop` is cancelled. Keep the subscription
/// alive until `Stopped` (or `Failed`) arrives.
pub fn mouth_tracking_subscription(config: VisionConfig, stop: CancellationToken) -> Subscription<VisionEvent> {
    struct Tracking;

    subscription::channel(
        std::any::TypeId::of::<Tracking>(),
        16,
        move |output| {
            info!("Starting mouth tracking with camera {}", config.camera_index);
            run_tracking_thread(stop, output, move |stop, events| tracking_loop(config, stop, events))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use futures::channel::mpsc::Receiver;
    use tokio::time::timeout;
    use crate::vision::types::Frame;

    async fn next_event(receiver: &mut Receiver<VisionEvent>) -> VisionEvent {
        timeout(Duration::from_secs(5), receiver.next())
            .await
            .expect("timed out waiting for a VisionEvent")
            .expect("event stream ended")
    }

    fn blank_frame() -> VisionEvent {
        VisionEvent::Frame {
            frame: Frame { width: 1, height: 1, rgba: vec![0, 0, 0, 255] },
            mar: None,
            face: None,
        }
    }

    #[tokio::test]
    async fn stopping_reports_stopped_after_the_thread_finished() {
        let stop = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let thread_finished = finished.clone();
        let (output, mut events) = channel::<VisionEvent>(16);

        let task = tokio::spawn(run_tracking_thread(stop.clone(), output, move |stop, mut events| {
            send_blocking(&mut events, VisionEvent::Started("fake camera".to_string()));
            while !stop.is_cancelled() {
                if !send_blocking(&mut events, blank_frame()) {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            // something slow to release, like a camera
            thread::sleep(Duration::from_millis(50));
            thread_finished.store(true, Ordering::SeqCst);
            Ok(())
        }));

        assert!(matches!(next_event(&mut events).await, VisionEvent::Started(_)));
        assert!(matches!(next_event(&mut events).await, VisionEvent::Frame { .. }));

        stop.cancel();

        loop {
            match next_event(&mut events).await {
                VisionEvent::Frame { .. } => {},
                VisionEvent::Stopped => break,
                other => panic!("expected Stopped, got {:?}", other),
            }
        }
        assert!(finished.load(Ordering::SeqCst));

        task.abort();
    }

    #[tokio::test]
    async fn errors_are_reported_as_failed() {
        let (output, mut events) = channel::<VisionEvent>(16);

        let task = tokio::spawn(run_tracking_thread(CancellationToken::new(), output, |_stop, _events| {
            Err(VisionError::ModelNotFound("models/missing.onnx".to_string()))
        }));

        match next_event(&mut events).await {
            VisionEvent::Failed(reason) => assert!(reason.contains("models/missing.onnx")),
            other => panic!("expected Failed, got {:?}", other),
        }

        task.abort();
    }

    #[tokio::test]
    async fn panics_are_reported_as_failed() {
        let (output, mut events) = channel::<VisionEvent>(16);

        let task = tokio::spawn(run_tracking_thread(CancellationToken::new(), output, |_stop, _events| {
            panic!("camera exploded");
        }));

        match next_event(&mut events).await {
            VisionEvent::Failed(reason) => assert!(reason.ends_with("[camera exploded]")),
            other => panic!("expected Failed, got {:?}", other),
        }

        task.abort();
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_the_thread() {
        let stop = CancellationToken::new();
        let (output, mut events) = channel::<VisionEvent>(16);

        let task = tokio::spawn(run_tracking_thread(stop.clone(), output, |stop, mut events| {
            send_blocking(&mut events, VisionEvent::Started("fake camera".to_string()));
            while !stop.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }));

        assert!(matches!(next_event(&mut events).await, VisionEvent::Started(_)));

        task.abort();
        let _ = task.await;

        assert!(stop.is_cancelled());
    }
}
