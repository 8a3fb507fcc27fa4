//! Session state for the live streaming page.
//!
//! The session reacts to two kinds of input: capture timer ticks and
//! transport events. Both are delivered by the binary's driver loop, so
//! the logic here is synchronous and timer-free and tests can replay any
//! tick/event sequence deterministically.
use std::time::Duration;

use common::protocol::{FramePayload, WireEvent};
use tokio::sync::mpsc;

use crate::{
    encode,
    meter::METER,
    sensors::{CameraError, FrameSource},
    transport::TransportEvent,
};

/// Fixed frame sampling rate.
pub const CAPTURE_RATE_HZ: u32 = 10;

/// Period of the capture timer (10 Hz sampling).
pub const CAPTURE_PERIOD: Duration = Duration::from_millis(100);

/// Connection state as driven by transport events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// An active camera capture, owned exclusively by the session.
///
/// Dropping it releases the underlying device.
struct CameraSession {
    source: Box<dyn FrameSource + Send>,
}

/// The live frame streaming client.
///
/// Owns the connection state, at most one camera session and at most one
/// received detection result. Outbound frames go through a single-slot
/// channel, fire-and-forget: a tick that cannot hand its frame over
/// drops it and the next tick samples anew.
pub struct StreamSession {
    conn: ConnectionState,
    status: String,
    start_enabled: bool,
    camera: Option<CameraSession>,
    latest_result: Option<String>,
    outbound: mpsc::Sender<WireEvent>,
}

impl StreamSession {
    pub fn new(outbound: mpsc::Sender<WireEvent>) -> Self {
        Self {
            conn: ConnectionState::Connecting,
            status: status_line(ConnectionState::Connecting),
            start_enabled: false,
            camera: None,
            latest_result: None,
            outbound,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn
    }

    /// User-visible status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the start-camera control should be enabled.
    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    /// True while a camera session exists, i.e. the capture timer runs.
    pub fn is_streaming(&self) -> bool {
        self.camera.is_some()
    }

    /// Latest detection result received from the backend, if any.
    pub fn latest_result(&self) -> Option<&str> {
        self.latest_result.as_deref()
    }

    /// Acquire the camera and activate the capture timer.
    ///
    /// A second start while a session is active is a no-op. A failed
    /// acquisition leaves no partial session behind; the error doubles
    /// as the user-visible denial reason and is also set as the status.
    pub fn start_camera<S, F>(&mut self, open: F) -> Result<(), CameraError>
    where
        S: FrameSource + Send + 'static,
        F: FnOnce() -> Result<S, CameraError>,
    {
        if self.camera.is_some() {
            log::debug!("Camera already running");
            return Ok(());
        }

        match open() {
            Ok(source) => {
                self.camera = Some(CameraSession {
                    source: Box::new(source),
                });
                self.status = "Streaming camera feed".to_owned();
                Ok(())
            }
            Err(err) => {
                self.status = denial_status(&err).to_owned();
                Err(err)
            }
        }
    }

    /// Stop the camera and clear the displayed result. Idempotent.
    ///
    /// Releases the capture device, deactivates the capture timer and
    /// resets the status line to reflect the connection state. Safe to
    /// call without an active session.
    pub fn stop_camera(&mut self) {
        if self.camera.take().is_some() {
            log::info!("Camera stopped");
        }
        self.latest_result = None;
        self.status = status_line(self.conn);
    }

    /// One capture tick: sample, encode, fire-and-forget send.
    ///
    /// Skipped silently when no decoded frame is ready yet. Delivery is
    /// never awaited; a full or closed outbound channel drops the frame.
    pub fn on_tick(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };

        let Some(frame) = camera.source.grab() else {
            METER.tick_skipped();
            return;
        };

        let data_uri = match encode::frame_to_data_uri(&frame) {
            Ok(uri) => uri,
            Err(err) => {
                log::debug!("Dropping frame that failed to encode: {err}");
                return;
            }
        };

        let event = WireEvent::VideoFrame(FramePayload::new(data_uri));
        if self.outbound.try_send(event).is_ok() {
            METER.tick_sent();
        }
    }

    /// React to a transport event.
    ///
    /// Connect and disconnect also gate the start-camera control; none
    /// of the events touch an active camera session.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.conn = ConnectionState::Connected;
                self.start_enabled = true;
                self.status = status_line(self.conn);
            }
            TransportEvent::Disconnected => {
                self.conn = ConnectionState::Disconnected;
                self.start_enabled = false;
                self.status = status_line(self.conn);
            }
            TransportEvent::ConnectError(reason) => {
                log::warn!("Connection failed: {reason}");
                self.conn = ConnectionState::Error;
                self.status = status_line(self.conn);
            }
            TransportEvent::Message(event) => self.on_message(event),
        }
    }

    /// Latest-wins display of inbound results.
    ///
    /// Results carry no correlation to outbound frames; whatever arrives
    /// last is what gets shown.
    pub fn on_message(&mut self, event: WireEvent) {
        match event {
            WireEvent::ProcessedFrame(payload) | WireEvent::LiveFrame(payload) => {
                self.latest_result = Some(payload.data_uri);
                METER.tick_received();
            }
            other => log::debug!("Ignoring unexpected {} event", other.name()),
        }
    }
}

fn status_line(conn: ConnectionState) -> String {
    match conn {
        ConnectionState::Connecting => "Connecting to server...",
        ConnectionState::Connected => "Connected",
        ConnectionState::Disconnected => "Disconnected, reconnecting...",
        ConnectionState::Error => "Failed to connect to server",
    }
    .to_owned()
}

fn denial_status(err: &CameraError) -> &'static str {
    match err {
        CameraError::AccessDenied => "Camera access denied",
        CameraError::NotFound => "No camera found",
        CameraError::Busy => "Camera already in use",
        CameraError::Other(_) => "Could not start camera",
    }
}

#[cfg(test)]
mod test {

    use std::collections::VecDeque;

    use image::RgbImage;

    use super::*;

    /// Frame source replaying a scripted sequence of grab results.
    struct ScriptedSource {
        frames: VecDeque<Option<RgbImage>>,
    }

    impl ScriptedSource {
        fn ready(count: usize) -> Self {
            Self {
                frames: (0..count).map(|_| Some(test_frame())).collect(),
            }
        }

        fn not_ready() -> Self {
            Self {
                frames: VecDeque::from([None]),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn grab(&mut self) -> Option<RgbImage> {
            self.frames.pop_front().flatten()
        }
    }

    fn test_frame() -> RgbImage {
        RgbImage::from_pixel(4, 4, image::Rgb([10, 120, 240]))
    }

    fn session(capacity: usize) -> (StreamSession, mpsc::Receiver<WireEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (StreamSession::new(tx), rx)
    }

    fn result_event(data_uri: &str) -> TransportEvent {
        TransportEvent::Message(WireEvent::ProcessedFrame(FramePayload::new(
            data_uri.to_owned(),
        )))
    }

    #[test]
    fn test_stop_camera_is_idempotent() {
        let (mut session, _rx) = session(8);

        // Safe with no active session.
        session.stop_camera();
        assert!(!session.is_streaming());

        session.start_camera(|| Ok(ScriptedSource::ready(4))).unwrap();
        session.on_message(WireEvent::ProcessedFrame(FramePayload::new(
            "data:image/jpeg;base64,AQ==".to_owned(),
        )));

        session.stop_camera();
        let after_first = (
            session.is_streaming(),
            session.latest_result().map(str::to_owned),
            session.status().to_owned(),
        );

        session.stop_camera();
        let after_second = (
            session.is_streaming(),
            session.latest_result().map(str::to_owned),
            session.status().to_owned(),
        );

        assert_eq!(after_first, after_second);
        assert!(!session.is_streaming());
        assert_eq!(session.latest_result(), None);
    }

    #[test]
    fn test_at_most_one_camera_session() {
        let (mut session, mut rx) = session(8);

        let mut opened = 0;
        session
            .start_camera(|| {
                opened += 1;
                Ok(ScriptedSource::ready(8))
            })
            .unwrap();
        session
            .start_camera(|| {
                opened += 1;
                Ok(ScriptedSource::ready(8))
            })
            .unwrap();

        // The second start must not have opened another device.
        assert_eq!(opened, 1);
        assert!(session.is_streaming());

        // One tick, one frame: a duplicate session would double this.
        session.on_tick();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // Interleaved start/stop never leaves more than one session.
        session.stop_camera();
        assert!(!session.is_streaming());
        session.start_camera(|| Ok(ScriptedSource::ready(1))).unwrap();
        assert!(session.is_streaming());
        session.stop_camera();
        session.stop_camera();
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_tick_without_ready_frame_sends_nothing() {
        let (mut session, mut rx) = session(8);
        session
            .start_camera(|| Ok(ScriptedSource::not_ready()))
            .unwrap();

        session.on_tick();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tick_without_camera_sends_nothing() {
        let (mut session, mut rx) = session(8);

        session.on_tick();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tick_sends_jpeg_data_uri() {
        let (mut session, mut rx) = session(8);
        session.start_camera(|| Ok(ScriptedSource::ready(1))).unwrap();

        session.on_tick();

        match rx.try_recv() {
            Ok(WireEvent::VideoFrame(payload)) => {
                assert!(payload.data_uri.starts_with("data:image/jpeg;base64,"));
                let (mime, jpeg) = common::data_uri::decode(&payload.data_uri).unwrap();
                assert_eq!(mime, common::data_uri::JPEG_MIME);
                assert!(image::load_from_memory(&jpeg).is_ok());
            }
            other => panic!("expected a video frame, got {other:?}"),
        }
    }

    #[test]
    fn test_tick_drops_frame_when_channel_full() {
        let (mut session, mut rx) = session(1);
        session.start_camera(|| Ok(ScriptedSource::ready(3))).unwrap();

        // Fills the single slot, then drops without erroring.
        session.on_tick();
        session.on_tick();
        session.on_tick();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_connect_after_connect_error_wins() {
        let (mut session, _rx) = session(8);

        session.on_transport_event(TransportEvent::ConnectError("refused".to_owned()));
        assert_eq!(session.connection_state(), ConnectionState::Error);
        assert!(!session.start_enabled());

        session.on_transport_event(TransportEvent::Connected);
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert!(session.start_enabled());
        assert_eq!(session.status(), "Connected");
    }

    #[test]
    fn test_disconnect_disables_start_control() {
        let (mut session, _rx) = session(8);

        session.on_transport_event(TransportEvent::Connected);
        session.on_transport_event(TransportEvent::Disconnected);

        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(!session.start_enabled());
    }

    #[test]
    fn test_latest_result_wins() {
        let (mut session, _rx) = session(8);

        session.on_transport_event(result_event("data:image/jpeg;base64,UjE="));
        session.on_transport_event(result_event("data:image/jpeg;base64,UjI="));
        session.on_transport_event(result_event("data:image/jpeg;base64,UjM="));

        assert_eq!(session.latest_result(), Some("data:image/jpeg;base64,UjM="));
    }

    #[test]
    fn test_live_frame_updates_result_too() {
        let (mut session, _rx) = session(8);

        session.on_message(WireEvent::LiveFrame(FramePayload::new(
            "data:image/jpeg;base64,TEY=".to_owned(),
        )));

        assert_eq!(session.latest_result(), Some("data:image/jpeg;base64,TEY="));
    }

    #[test]
    fn test_denial_reasons_are_distinct() {
        let (mut session, _rx) = session(8);

        let err = session
            .start_camera(|| Err::<ScriptedSource, _>(CameraError::AccessDenied))
            .unwrap_err();
        assert!(matches!(err, CameraError::AccessDenied));
        let denied_status = session.status().to_owned();
        assert!(!session.is_streaming());

        let err = session
            .start_camera(|| Err::<ScriptedSource, _>(CameraError::NotFound))
            .unwrap_err();
        assert!(matches!(err, CameraError::NotFound));
        assert_ne!(session.status(), denied_status);
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_transport_loss_keeps_camera_running() {
        let (mut session, mut rx) = session(8);
        session.start_camera(|| Ok(ScriptedSource::ready(4))).unwrap();

        session.on_transport_event(TransportEvent::Disconnected);

        // Frames keep being captured and attempted.
        assert!(session.is_streaming());
        session.on_tick();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_stop_resets_status_to_connection_state() {
        let (mut session, _rx) = session(8);
        session.on_transport_event(TransportEvent::Connected);
        session.start_camera(|| Ok(ScriptedSource::ready(1))).unwrap();
        assert_eq!(session.status(), "Streaming camera feed");

        session.stop_camera();

        assert_eq!(session.status(), "Connected");
    }
}
