//! ONNX model backend for the model-driven effects.
//!
//! Models take a `[1, 3, H, W]` float tensor named `input` (RGB, 0..1) and
//! produce a `[1, 3, H', W']` tensor named `output` in the same range.

use super::EffectKind;
use crate::error::RuntimeStatus;
use anyhow::Result;
use ndarray::{Array4, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{info, warn};

static ORT_INIT: Once = Once::new();

pub(crate) struct OnnxModel {
    session: Session,
}

impl OnnxModel {
    /// Loads the model for `kind` and `mode` from `dir`.
    pub fn load(dir: &Path, kind: EffectKind, mode: u32) -> Result<Self, RuntimeStatus> {
        let Some(path) = model_path(dir, kind, mode) else {
            warn!("No {} model found in {:?}", kind, dir);
            return Err(RuntimeStatus::Model);
        };

        ORT_INIT.call_once(|| {
            let _ = ort::init().with_name("videofx").commit();
        });

        info!("Loading {} model from {:?}", kind, path);
        let session = Self::build_session(&path).map_err(|e| {
            warn!("Failed to load model {:?}: {}", path, e);
            RuntimeStatus::Model
        })?;
        Ok(Self { session })
    }

    fn build_session(path: &Path) -> Result<Session> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(path)?;
        Ok(session)
    }

    /// Runs the model on three tightly packed planes of `width` x `height`.
    /// Returns the output size and planes.
    pub fn infer(&mut self, planes: &[Vec<f32>], width: u32, height: u32) -> Result<(u32, u32, Vec<Vec<f32>>), RuntimeStatus> {
        let (w, h) = (width as usize, height as usize);
        let input = Array4::<f32>::from_shape_fn((1, 3, h, w), |(_, c, y, x)| planes[c][y * w + x]);

        let shape = input.shape().iter().map(|&x| x as i64).collect::<Vec<_>>();
        let data = input.into_raw_vec();
        let input_value = Value::from_array((shape, data)).map_err(|e| {
            warn!("Failed to build input tensor: {}", e);
            RuntimeStatus::Buffer
        })?;
        let inputs = ort::inputs!["input" => &input_value];
        let outputs = self.session.run(inputs).map_err(|e| {
            warn!("Model inference failed: {}", e);
            RuntimeStatus::General
        })?;

        let (shape, data) = outputs["output"].try_extract_tensor::<f32>().map_err(|e| {
            warn!("Unexpected model output: {}", e);
            RuntimeStatus::Mismatch
        })?;
        if shape.len() != 4 || shape[1] != 3 {
            return Err(RuntimeStatus::Mismatch);
        }
        let output = Array4::from_shape_vec(
            (shape[0] as usize, shape[1] as usize, shape[2] as usize, shape[3] as usize),
            data.to_vec(),
        )
        .map_err(|_| RuntimeStatus::Mismatch)?;

        let out_height = shape[2] as u32;
        let out_width = shape[3] as u32;
        let image = output.index_axis(Axis(0), 0);
        let planes = image
            .outer_iter()
            .map(|plane| plane.iter().copied().collect())
            .collect();
        Ok((out_width, out_height, planes))
    }
}

fn model_stem(kind: EffectKind) -> Option<&'static str> {
    match kind {
        EffectKind::ArtifactReduction => Some("artifact_reduction"),
        EffectKind::SuperResolution => Some("super_resolution"),
        EffectKind::PassThrough | EffectKind::Upscale => None,
    }
}

/// `<dir>/<stem>_<mode>.onnx`, falling back to `<dir>/<stem>.onnx`.
fn model_path(dir: &Path, kind: EffectKind, mode: u32) -> Option<PathBuf> {
    let stem = model_stem(kind)?;
    let mode_name = if mode == 0 { "conservative" } else { "aggressive" };
    [
        dir.join(format!("{stem}_{mode_name}.onnx")),
        dir.join(format!("{stem}.onnx")),
    ]
    .into_iter()
    .find(|p| p.exists())
}
