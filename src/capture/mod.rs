//! Frame sources: the camera backend and the common source interface.

mod nokhwa_backend;

pub use nokhwa_backend::CameraSource;

use crate::error::{FxError, FxResult};
use crate::frame::{VideoFrame, VideoStreamInfo};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// A finite or unbounded sequence of host frames.
pub trait FrameSource {
    /// Stream properties, fixed once the source is open.
    fn info(&self) -> &VideoStreamInfo;

    /// The next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Whether frames come from a live camera.
    fn is_live(&self) -> bool {
        false
    }
}

/// Information about a camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index
    pub index: u32,
    /// Human-readable name
    pub name: String,
}

/// Configuration for camera capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    /// Camera device index
    pub device_index: u32,
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    /// Requested frame rate
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Reads an image file as a single RGB frame.
pub fn read_image(path: &Path) -> FxResult<VideoFrame> {
    let image = image::open(path).map_err(|e| FxError::Read(format!("{:?}: {}", path, e)))?;
    let frame = VideoFrame::from_rgb_image(image.to_rgb8());
    debug!("Read {:?}: {}x{}", path, frame.width, frame.height);
    Ok(frame)
}

/// Parses a camera resolution of the form `[W x]H`.
///
/// A lone height gets a 16:9 width.
pub fn parse_camera_resolution(text: &str) -> FxResult<(u32, u32)> {
    let invalid = || FxError::Argument(format!("invalid camera resolution {:?}", text));
    let parse = |s: &str| s.trim().parse::<u32>().ok().filter(|v| *v > 0);

    match text.trim().split_once(['x', 'X']) {
        Some((w, h)) => Ok((parse(w).ok_or_else(invalid)?, parse(h).ok_or_else(invalid)?)),
        None => {
            let height = parse(text).ok_or_else(invalid)?;
            let width = (height as f64 * 16.0 / 9.0 + 0.5) as u32;
            Ok((width, height))
        }
    }
}
