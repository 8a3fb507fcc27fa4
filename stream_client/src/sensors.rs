//! Camera capture layer.
//!
use image::RgbImage;
use rscam::{Camera, Config};
use thiserror::Error;

/// Camera acquisition failure, one variant per user-reportable reason.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access denied")]
    AccessDenied,
    #[error("no camera device found")]
    NotFound,
    #[error("camera device already in use")]
    Busy,
    #[error("camera error: {0}")]
    Other(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::PermissionDenied => CameraError::AccessDenied,
            ErrorKind::NotFound => CameraError::NotFound,
            ErrorKind::ResourceBusy => CameraError::Busy,
            _ => CameraError::Other(err.to_string()),
        }
    }
}

impl From<rscam::Error> for CameraError {
    fn from(err: rscam::Error) -> Self {
        match err {
            rscam::Error::Io(io) => io.into(),
            other => CameraError::Other(other.to_string()),
        }
    }
}

/// Source of decoded video frames.
///
/// `grab` returns `None` while no decoded frame is available; the
/// capture loop skips the tick and waits for the next one.
pub trait FrameSource {
    fn grab(&mut self) -> Option<RgbImage>;
}

/// Frame source backed by a V4L2 video device.
///
/// Dropping it stops the capture stream and releases the device.
pub struct V4lFrameSource {
    cam: Camera,
}

impl V4lFrameSource {
    /// Open a video device and start capturing.
    pub fn open(device: &str, resolution: (u32, u32), fps: u32) -> Result<Self, CameraError> {
        let mut cam = Camera::new(device)?;
        cam.start(&Config {
            interval: (1, fps),
            resolution,
            format: b"MJPG",
            ..Default::default()
        })?;

        log::info!(
            "Using camera {} at {}x{}, {} fps",
            device,
            resolution.0,
            resolution.1,
            fps
        );

        Ok(Self { cam })
    }
}

impl FrameSource for V4lFrameSource {
    fn grab(&mut self) -> Option<RgbImage> {
        let frame = self.cam.capture().ok()?;
        match image::load_from_memory(&frame[..]) {
            Ok(img) => Some(img.to_rgb8()),
            Err(err) => {
                log::debug!("Skipping undecodable frame: {err}");
                None
            }
        }
    }
}
