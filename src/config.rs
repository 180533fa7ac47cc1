//! Run configuration: YAML file values merged with command-line values.

use crate::capture::{parse_camera_resolution, CameraConfig};
use crate::effect::EffectKind;
use crate::error::{FxError, FxResult};
use crate::frame::FourCc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Camera resolution used when none is given.
pub const DEFAULT_CAMERA_RESOLUTION: &str = "1280x720";

/// Effect settings a session applies to its effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectConfig {
    /// 0 = conservative, 1 = aggressive
    pub mode: u32,
    /// Enhancement strength in [0, 1]
    pub strength: f32,
    /// Target height for resizing effects.
    pub output_height: Option<u32>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            mode: 0,
            strength: 0.0,
            output_height: None,
        }
    }
}

/// Every setting of a run, as read from a YAML file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub in_file: Option<PathBuf>,
    pub webcam: bool,
    pub out_file: Option<PathBuf>,
    pub effect: Option<String>,
    pub show: bool,
    pub strength: Option<f32>,
    pub mode: Option<u32>,
    pub cam_res: Option<String>,
    pub resolution: Option<u32>,
    pub model_dir: Option<PathBuf>,
    pub codec: Option<String>,
    pub progress: bool,
    pub verbose: bool,
    pub debug: bool,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Image(PathBuf),
    Video(PathBuf),
    Webcam,
}

/// A checked run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub input: InputKind,
    pub output: Option<PathBuf>,
    pub effect: EffectKind,
    pub effect_config: EffectConfig,
    pub model_dir: Option<PathBuf>,
    pub codec: FourCc,
    pub camera: CameraConfig,
    pub show: bool,
    pub progress: bool,
}

impl RunConfig {
    pub fn load(path: &Path) -> FxResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| FxError::Argument(format!("{:?}: {}", path, e)))?;
        let config = serde_yaml::from_str(&text).map_err(|e| FxError::Argument(format!("{:?}: {}", path, e)))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Values set in `overrides` replace the ones in `self`.
    pub fn merge(self, overrides: RunConfig) -> RunConfig {
        RunConfig {
            in_file: overrides.in_file.or(self.in_file),
            webcam: overrides.webcam || self.webcam,
            out_file: overrides.out_file.or(self.out_file),
            effect: overrides.effect.or(self.effect),
            show: overrides.show || self.show,
            strength: overrides.strength.or(self.strength),
            mode: overrides.mode.or(self.mode),
            cam_res: overrides.cam_res.or(self.cam_res),
            resolution: overrides.resolution.or(self.resolution),
            model_dir: overrides.model_dir.or(self.model_dir),
            codec: overrides.codec.or(self.codec),
            progress: overrides.progress || self.progress,
            verbose: overrides.verbose || self.verbose,
            debug: overrides.debug || self.debug,
        }
    }

    pub fn validate(&self) -> FxResult<RunPlan> {
        let input = match (&self.in_file, self.webcam) {
            (_, true) => InputKind::Webcam,
            (Some(path), false) if is_image_file(path) => InputKind::Image(path.clone()),
            (Some(path), false) => InputKind::Video(path.clone()),
            (None, false) => return Err(FxError::Argument("an input file or --webcam is required".into())),
        };
        let webcam = input == InputKind::Webcam;
        let show = self.show || webcam;
        if self.out_file.is_none() && !show {
            return Err(FxError::Argument("an output file or --show is required".into()));
        }

        let Some(selector) = &self.effect else {
            return Err(FxError::Argument("an effect is required".into()));
        };
        let effect = selector.parse::<EffectKind>()?;

        let mode = self.mode.unwrap_or(0);
        if mode > 1 {
            return Err(FxError::Argument(format!("mode must be 0 or 1, got {}", mode)));
        }
        let strength = self.strength.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&strength) {
            return Err(FxError::Argument(format!("strength must be in [0, 1], got {}", strength)));
        }

        let (width, height) = parse_camera_resolution(self.cam_res.as_deref().unwrap_or(DEFAULT_CAMERA_RESOLUTION))?;
        let codec = match &self.codec {
            Some(code) => code.parse()?,
            None => FourCc::platform_default(),
        };

        Ok(RunPlan {
            input,
            output: self.out_file.clone(),
            effect,
            effect_config: EffectConfig {
                mode,
                strength,
                output_height: self.resolution,
            },
            model_dir: self.model_dir.clone(),
            codec,
            camera: CameraConfig {
                width,
                height,
                ..CameraConfig::default()
            },
            show,
            progress: self.progress && !webcam,
        })
    }
}

/// `.bmp`, `.jpg`, `.jpeg` and `.png` files are single images.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ["bmp", "jpg", "jpeg", "png"].iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeStatus;

    fn base() -> RunConfig {
        RunConfig {
            in_file: Some(PathBuf::from("clip.mp4")),
            out_file: Some(PathBuf::from("out.mp4")),
            effect: Some("SuperRes".into()),
            resolution: Some(1080),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_validate_video_run() {
        let plan = base().validate().unwrap();
        assert_eq!(plan.input, InputKind::Video(PathBuf::from("clip.mp4")));
        assert_eq!(plan.effect, EffectKind::SuperResolution);
        assert_eq!(plan.effect_config.output_height, Some(1080));
        assert_eq!(plan.codec, FourCc::platform_default());
        assert_eq!((plan.camera.width, plan.camera.height), (1280, 720));
        assert!(!plan.show);
    }

    #[test]
    fn test_webcam_forces_preview_and_disables_progress() {
        let config = RunConfig {
            in_file: None,
            out_file: None,
            webcam: true,
            progress: true,
            cam_res: Some("1080".into()),
            ..base()
        };
        let plan = config.validate().unwrap();
        assert_eq!(plan.input, InputKind::Webcam);
        assert!(plan.show);
        assert!(!plan.progress);
        assert_eq!((plan.camera.width, plan.camera.height), (1920, 1080));
    }

    #[test]
    fn test_missing_pieces_are_argument_errors() {
        let no_input = RunConfig { in_file: None, ..base() };
        assert!(matches!(no_input.validate(), Err(FxError::Argument(_))));

        let no_output = RunConfig { out_file: None, ..base() };
        assert!(matches!(no_output.validate(), Err(FxError::Argument(_))));

        let no_effect = RunConfig { effect: None, ..base() };
        assert!(matches!(no_effect.validate(), Err(FxError::Argument(_))));

        let bad_mode = RunConfig { mode: Some(2), ..base() };
        assert!(matches!(bad_mode.validate(), Err(FxError::Argument(_))));
    }

    #[test]
    fn test_unknown_effect_is_selector_error() {
        let config = RunConfig {
            effect: Some("Denoise".into()),
            ..base()
        };
        assert!(matches!(config.validate(), Err(FxError::Runtime(RuntimeStatus::Selector))));
    }

    #[test]
    fn test_codec_is_checked() {
        let config = RunConfig {
            codec: Some("avc1".into()),
            ..base()
        };
        assert_eq!(config.validate().unwrap().codec, FourCc::AVC1);

        let too_long = RunConfig {
            codec: Some("h2645".into()),
            ..base()
        };
        assert!(matches!(too_long.validate(), Err(FxError::Argument(_))));
    }

    #[test]
    fn test_image_detection() {
        assert!(is_image_file(Path::new("photo.PNG")));
        assert!(is_image_file(Path::new("a/b.jpeg")));
        assert!(!is_image_file(Path::new("clip.mp4")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_yaml_and_merge() {
        let file: RunConfig = serde_yaml::from_str("effect: Upscale\nstrength: 0.4\nshow: true\n").unwrap();
        let cli = RunConfig {
            strength: Some(0.8),
            in_file: Some(PathBuf::from("in.png")),
            ..RunConfig::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.effect.as_deref(), Some("Upscale"));
        assert_eq!(merged.strength, Some(0.8));
        assert!(merged.show);
        assert_eq!(merged.in_file, Some(PathBuf::from("in.png")));
    }
}
