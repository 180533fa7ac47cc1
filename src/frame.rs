//! Host video frames and stream metadata.

use crate::error::FxError;
use std::fmt;
use std::str::FromStr;

/// Supported pixel formats for host frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel (24 bits per pixel)
    Rgb,
    /// RGBA with 8 bits per channel (32 bits per pixel)
    Rgba,
}

impl PixelFormat {
    /// Returns the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A decoded frame in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Tightly packed pixel data
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Creates a video frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::from_data(width, height, PixelFormat::Rgb, image.into_raw())
    }

    /// Converts this frame to an `image` buffer for encoding.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        let rgb = match self.format {
            PixelFormat::Rgb => self.data.clone(),
            PixelFormat::Rgba => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };
        image::RgbImage::from_raw(self.width, self.height, rgb)
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> VideoFrame {
        if self.format == PixelFormat::Rgba {
            return self.clone();
        }

        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut rgba_data = vec![255u8; pixel_count * 4];
        for (dst, src) in rgba_data.chunks_exact_mut(4).zip(self.data.chunks_exact(3)) {
            dst[..3].copy_from_slice(src);
        }

        VideoFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            data: rgba_data,
        }
    }
}

/// A four-character codec code such as `avc1` or `H264`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const H264: FourCc = FourCc(*b"H264");
    pub const AVC1: FourCc = FourCc(*b"avc1");

    /// Platform default for encoded output.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::AVC1
        } else {
            Self::H264
        }
    }

    /// `avc1` is an alias for H.264.
    pub fn is_h264(&self) -> bool {
        self.0.eq_ignore_ascii_case(&Self::H264.0) || self.0.eq_ignore_ascii_case(&Self::AVC1.0)
    }
}

impl FromStr for FourCc {
    type Err = FxError;

    /// Accepts one to four bytes, padding short codes with NULs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 4 {
            return Err(FxError::Argument(format!("codec must be 1 to 4 characters, got {:?}", s)));
        }
        let mut code = [0u8; 4];
        for (dst, src) in code.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Ok(FourCc(code))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self
            .0
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| *b as char)
            .collect();
        f.write_str(&text)
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

/// Properties of a frame source, read once when the stream opens.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamInfo {
    pub codec: FourCc,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// `None` when the source cannot tell, e.g. a live camera.
    pub frame_count: Option<u64>,
}

impl VideoStreamInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        match self.frame_count {
            Some(count) if self.frame_rate > 0.0 => Some(count as f64 / self.frame_rate),
            _ => None,
        }
    }
}

/// Formats seconds as `HH:MM:SS.mmm`.
pub fn duration_string(secs: f64) -> String {
    let hours = (secs / 3600.0) as u64;
    let rest = secs - hours as f64 * 3600.0;
    let minutes = (rest / 60.0) as u64;
    let seconds = rest - minutes as f64 * 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, seconds)
}
