//! Streaming client for the live object-detection demo.
//!
//! Captures webcam frames at a fixed rate, ships them to the detection
//! backend over a persistent socket and keeps the latest annotated frame
//! the backend sends back.
pub mod encode;
pub mod meter;
pub mod sensors;
pub mod session;
pub mod transport;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
