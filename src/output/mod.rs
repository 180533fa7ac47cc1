//! Frame sinks: encoded files and the on-screen preview.

pub mod window_output;

pub use window_output::PreviewWindow;

use crate::controller::Key;
use crate::frame::VideoFrame;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Accepts processed host frames.
pub trait FrameSink {
    /// Appends a frame to the output.
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()>;

    /// Flushes and closes the output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A live view of the processed frames that also delivers key presses.
pub trait Preview {
    fn show(&mut self, frame: &VideoFrame) -> Result<()>;

    /// The next pending key press, if any. Closing the window reads as Escape.
    fn poll_key(&mut self) -> Option<Key>;

    /// Keeps the last frame on screen until a key press or close.
    fn hold(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes a single image file.
pub struct ImageFileSink {
    path: PathBuf,
}

impl ImageFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if is_jpeg(&path) {
            warn!("JPEG output is lossy and will reduce the quality of the result");
        }
        Self { path }
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

impl FrameSink for ImageFileSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let image = frame
            .to_rgb_image()
            .ok_or_else(|| anyhow!("Frame data does not match {}x{}", frame.width, frame.height))?;
        image
            .save(&self.path)
            .with_context(|| format!("writing {:?}", self.path))?;
        info!("Wrote {:?}", self.path);
        Ok(())
    }
}
