//! Nokhwa-based camera source.

use super::{CameraConfig, CameraInfo, FrameSource};
use crate::error::{FxError, FxResult};
use crate::frame::{FourCc, PixelFormat, VideoFrame, VideoStreamInfo};
use anyhow::Result;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{debug, info, warn};

/// Live camera frames, decoded to RGB.
pub struct CameraSource {
    camera: Camera,
    info: VideoStreamInfo,
}

impl CameraSource {
    pub fn list_devices() -> Result<Vec<CameraInfo>> {
        let devices = nokhwa::query(ApiBackend::Auto)?;
        Ok(devices
            .into_iter()
            .map(|d| CameraInfo {
                index: d.index().as_index().unwrap_or(0),
                name: d.human_name().to_string(),
            })
            .collect())
    }

    /// Opens the camera at the requested resolution.
    ///
    /// Fails with [`FxError::UnsupportedCameraResolution`] when the device
    /// delivers any other size.
    pub fn open(config: CameraConfig) -> FxResult<Self> {
        let requested = Resolution::new(config.width, config.height);
        let mut camera = None;

        // Cameras differ in which pixel formats they accept at a given size.
        for format in [FrameFormat::MJPEG, FrameFormat::YUYV, FrameFormat::NV12] {
            let seed = CameraFormat::new(requested, format, config.fps);
            let request = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(seed));
            match Camera::new(CameraIndex::Index(config.device_index), request) {
                Ok(mut cam) => match cam.open_stream() {
                    Ok(()) => {
                        debug!("Camera stream opened with {:?}", seed);
                        camera = Some(cam);
                        break;
                    }
                    Err(e) => debug!("Camera rejected {:?}: {}", seed, e),
                },
                Err(e) => debug!("Camera rejected {:?}: {}", seed, e),
            }
        }

        let Some(camera) = camera else {
            return Err(FxError::Read(format!("could not open camera {}", config.device_index)));
        };

        let resolution = camera.resolution();
        if resolution.width() != config.width || resolution.height() != config.height {
            warn!(
                "Camera delivers {}x{} instead of {}x{}",
                resolution.width(),
                resolution.height(),
                config.width,
                config.height
            );
            return Err(FxError::UnsupportedCameraResolution {
                width: config.width,
                height: config.height,
            });
        }

        let format = camera.camera_format();
        info!("Camera opened: {} @ {} fps", resolution, format.frame_rate());
        let info = VideoStreamInfo {
            codec: fourcc(format.format()),
            width: resolution.width(),
            height: resolution.height(),
            frame_rate: format.frame_rate() as f64,
            frame_count: None,
        };
        Ok(Self { camera, info })
    }
}

fn fourcc(format: FrameFormat) -> FourCc {
    match format {
        FrameFormat::MJPEG => FourCc(*b"MJPG"),
        FrameFormat::YUYV => FourCc(*b"YUYV"),
        FrameFormat::NV12 => FourCc(*b"NV12"),
        FrameFormat::GRAY => FourCc(*b"GREY"),
        _ => FourCc(*b"RGB3"),
    }
}

impl FrameSource for CameraSource {
    fn info(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let frame = self.camera.frame()?;
        let decoded = frame.decode_image::<RgbFormat>()?;
        let (width, height) = decoded.dimensions();
        Ok(Some(VideoFrame::from_data(
            width,
            height,
            PixelFormat::Rgb,
            decoded.into_raw(),
        )))
    }

    fn is_live(&self) -> bool {
        true
    }
}
