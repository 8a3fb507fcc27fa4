//! Protocol definition for the detection data socket.
//!
use serde::{Deserialize, Serialize};

/// Messages exchanged with the detection backend.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
pub enum WireEvent {
    /// Outbound camera frame to run detection on.
    VideoFrame(FramePayload),
    /// Inbound frame with detection annotations drawn in.
    ProcessedFrame(FramePayload),
    /// Inbound raw preview frame for receive-only clients.
    LiveFrame(FramePayload),
}

impl WireEvent {
    /// Event name as the backend publishes it.
    pub fn name(&self) -> &'static str {
        match self {
            WireEvent::VideoFrame(_) => "video_frame",
            WireEvent::ProcessedFrame(_) => "processed_frame",
            WireEvent::LiveFrame(_) => "live_frame",
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Box<bincode::ErrorKind>> {
        bincode::deserialize(bytes)
    }
}

/// A single image frame, encoded as a base64 data URI.
///
/// Carries no sequence number: frames and results are uncorrelated on
/// the wire. Add one here if pairing ever becomes necessary.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
pub struct FramePayload {
    pub data_uri: String,
}

impl FramePayload {
    pub fn new(data_uri: String) -> Self {
        Self { data_uri }
    }
}
