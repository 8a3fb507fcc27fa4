//! Common code shared between the streaming client and the detection backend.
pub mod data_uri;
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
