//! Built-in effect runtime working on host memory.
//!
//! Buffers tagged as device memory are plain host allocations here, so the
//! whole pipeline runs without a GPU. Model-driven effects switch to an ONNX
//! model when a model directory has been set.

use super::onnx::OnnxModel;
use super::{ComputeStream, Effect, EffectKind, EffectRuntime, ImageRole, Parameter};
use crate::buffer::{Buffer, BufferDescriptor};
use crate::error::RuntimeStatus;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use std::path::PathBuf;
use tracing::{debug, trace};

/// Runtime whose effects execute on the CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRuntime;

impl HostRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl EffectRuntime for HostRuntime {
    fn create_effect(&self, kind: EffectKind) -> Result<Box<dyn Effect>, RuntimeStatus> {
        debug!("Creating {} effect", kind);
        Ok(Box::new(HostEffect::new(kind)))
    }

    fn info(&self) -> String {
        let mut text = String::new();
        for kind in EffectKind::ALL {
            let mut params = vec!["InputImage0", "OutputImage0", "CudaStream"];
            if kind.accepts_model_directory() {
                params.push("ModelDir");
            }
            if kind.takes_mode() {
                params.push("Mode");
            }
            if kind.takes_strength() {
                params.push("Strength");
            }
            text.push_str(&format!("{}\n    {}\n", kind.selector(), params.join(", ")));
        }
        text
    }
}

enum Engine {
    Builtin,
    Model(OnnxModel),
}

struct HostEffect {
    kind: EffectKind,
    mode: u32,
    strength: f32,
    model_dir: Option<PathBuf>,
    input: Option<BufferDescriptor>,
    output: Option<BufferDescriptor>,
    stream: ComputeStream,
    engine: Option<Engine>,
    resizer: Resizer,
}

impl HostEffect {
    fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            mode: 0,
            strength: 0.0,
            model_dir: None,
            input: None,
            output: None,
            stream: ComputeStream::DEFAULT,
            engine: None,
            resizer: Resizer::new(),
        }
    }

    fn artifact_reduction(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus> {
        let desc = input.descriptor();
        let (w, h) = (desc.width as usize, desc.height as usize);
        let planes = read_planes(input);
        let result = match self.engine.as_mut() {
            Some(Engine::Model(model)) => model_output(model, &planes, desc, output.descriptor())?,
            _ => {
                let amount = if self.mode == 0 { 0.5 } else { 1.0 };
                planes.iter().map(|p| smooth(p, w, h, amount)).collect()
            }
        };
        write_planes(output, &result);
        Ok(())
    }

    fn super_resolution(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus> {
        let src = *input.descriptor();
        let dst = *output.descriptor();
        let planes = read_planes(input);
        let mut result = match self.engine.as_mut() {
            Some(Engine::Model(model)) => model_output(model, &planes, &src, &dst)?,
            _ => {
                let mut rgb = image::Rgb32FImage::new(src.width, src.height);
                for (i, px) in rgb.pixels_mut().enumerate() {
                    px.0 = [planes[0][i], planes[1][i], planes[2][i]];
                }
                let resized = image::imageops::resize(&rgb, dst.width, dst.height, image::imageops::FilterType::CatmullRom);
                let mut out = vec![Vec::with_capacity(resized.len() / 3); 3];
                for px in resized.pixels() {
                    for (plane, v) in out.iter_mut().zip(px.0) {
                        plane.push(v);
                    }
                }
                out
            }
        };
        for plane in result.iter_mut() {
            sharpen(plane, dst.width as usize, dst.height as usize, self.strength, 1.0);
        }
        write_planes(output, &result);
        Ok(())
    }

    fn upscale(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus> {
        let src = *input.descriptor();
        let dst = *output.descriptor();

        let src_image = Image::from_vec_u8(src.width, src.height, pack_rows(input), PixelType::U8x4)
            .map_err(|_| RuntimeStatus::Buffer)?;
        let mut dst_image = Image::new(dst.width, dst.height, PixelType::U8x4);
        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|_| RuntimeStatus::General)?;

        let (w, h) = (dst.width as usize, dst.height as usize);
        let mut packed = dst_image.into_vec();
        if self.strength > 0.0 {
            for c in 0..3 {
                let mut plane: Vec<f32> = packed.iter().skip(c).step_by(4).map(|v| *v as f32).collect();
                sharpen(&mut plane, w, h, self.strength, 255.0);
                for (i, v) in plane.into_iter().enumerate() {
                    packed[i * 4 + c] = v.round() as u8;
                }
            }
        }

        let row = w * 4;
        let pitch = dst.pitch();
        let bytes = output.bytes_mut();
        for y in 0..h {
            bytes[y * pitch..y * pitch + row].copy_from_slice(&packed[y * row..(y + 1) * row]);
        }
        Ok(())
    }
}

impl Effect for HostEffect {
    fn kind(&self) -> EffectKind {
        self.kind
    }

    fn set_parameter(&mut self, param: Parameter) -> Result<(), RuntimeStatus> {
        match param {
            Parameter::ModelDirectory(dir) => {
                if !self.kind.accepts_model_directory() {
                    return Err(RuntimeStatus::Parameter);
                }
                self.model_dir = Some(dir);
            }
            Parameter::Mode(mode) => {
                if !self.kind.takes_mode() {
                    return Err(RuntimeStatus::Selector);
                }
                if mode > 1 {
                    return Err(RuntimeStatus::Parameter);
                }
                self.mode = mode;
            }
            Parameter::Strength(strength) => {
                if !self.kind.takes_strength() {
                    return Err(RuntimeStatus::Selector);
                }
                if !(0.0..=1.0).contains(&strength) {
                    return Err(RuntimeStatus::Parameter);
                }
                self.strength = strength;
            }
        }
        Ok(())
    }

    fn bind_image(&mut self, role: ImageRole, desc: &BufferDescriptor) -> Result<(), RuntimeStatus> {
        if !self.kind.accepts_device_buffer(desc) {
            return Err(RuntimeStatus::PixelFormat);
        }
        match role {
            ImageRole::Input => self.input = Some(*desc),
            ImageRole::Output => self.output = Some(*desc),
        }
        self.engine = None;
        Ok(())
    }

    fn bind_stream(&mut self, stream: ComputeStream) -> Result<(), RuntimeStatus> {
        self.stream = stream;
        Ok(())
    }

    fn load(&mut self) -> Result<(), RuntimeStatus> {
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return Err(RuntimeStatus::MissingInput);
        };
        let sizes_ok = if self.kind.is_resizing() {
            input.width as u64 * output.height as u64 == input.height as u64 * output.width as u64
        } else {
            input.same_size(&output)
        };
        if !sizes_ok {
            return Err(RuntimeStatus::Resolution);
        }

        let engine = match (&self.model_dir, self.kind.takes_mode()) {
            (Some(dir), true) => Engine::Model(OnnxModel::load(dir, self.kind, self.mode)?),
            _ => Engine::Builtin,
        };
        debug!(
            "Loaded {} effect: {}x{} -> {}x{} on stream {}",
            self.kind,
            input.width,
            input.height,
            output.width,
            output.height,
            self.stream.id()
        );
        self.engine = Some(engine);
        Ok(())
    }

    fn run(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus> {
        if self.engine.is_none() {
            return Err(RuntimeStatus::Initialization);
        }
        if Some(*input.descriptor()) != self.input || Some(*output.descriptor()) != self.output {
            return Err(RuntimeStatus::Mismatch);
        }
        trace!("Running {} effect", self.kind);
        match self.kind {
            EffectKind::PassThrough => {
                output.bytes_mut().copy_from_slice(input.bytes());
                Ok(())
            }
            EffectKind::ArtifactReduction => self.artifact_reduction(input, output),
            EffectKind::SuperResolution => self.super_resolution(input, output),
            EffectKind::Upscale => self.upscale(input, output),
        }
    }
}

fn model_output(
    model: &mut OnnxModel,
    planes: &[Vec<f32>],
    src: &BufferDescriptor,
    dst: &BufferDescriptor,
) -> Result<Vec<Vec<f32>>, RuntimeStatus> {
    let (width, height, result) = model.infer(planes, src.width, src.height)?;
    if width != dst.width || height != dst.height {
        return Err(RuntimeStatus::Resolution);
    }
    Ok(result)
}

/// Copies the planes of a planar float buffer out, tightly packed.
fn read_planes(buf: &Buffer) -> Vec<Vec<f32>> {
    let desc = buf.descriptor();
    let bytes = buf.bytes();
    let (w, h) = (desc.width as usize, desc.height as usize);
    (0..desc.order.count())
        .map(|c| {
            let mut plane = Vec::with_capacity(w * h);
            for y in 0..h {
                let start = desc.offset(0, y, c);
                plane.extend(
                    bytes[start..start + w * 4]
                        .chunks_exact(4)
                        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
                );
            }
            plane
        })
        .collect()
}

fn write_planes(buf: &mut Buffer, planes: &[Vec<f32>]) {
    let desc = *buf.descriptor();
    let w = desc.width as usize;
    let bytes = buf.bytes_mut();
    for (c, plane) in planes.iter().enumerate() {
        for (y, row) in plane.chunks_exact(w).enumerate() {
            let start = desc.offset(0, y, c);
            for (dst, v) in bytes[start..start + w * 4].chunks_exact_mut(4).zip(row) {
                dst.copy_from_slice(&v.to_ne_bytes());
            }
        }
    }
}

/// Strips the row padding from an interleaved 8-bit buffer.
fn pack_rows(buf: &Buffer) -> Vec<u8> {
    let desc = buf.descriptor();
    let row = desc.width as usize * desc.order.count();
    let pitch = desc.pitch();
    buf.bytes()
        .chunks(pitch)
        .take(desc.height as usize)
        .flat_map(|r| &r[..row])
        .copied()
        .collect()
}

/// 3x3 box filter with clamped edges.
fn box_blur(plane: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0; plane.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dy in [-1i64, 0, 1] {
                for dx in [-1i64, 0, 1] {
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as usize;
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as usize;
                    sum += plane[sy * w + sx];
                }
            }
            out[y * w + x] = sum / 9.0;
        }
    }
    out
}

fn smooth(plane: &[f32], w: usize, h: usize, amount: f32) -> Vec<f32> {
    box_blur(plane, w, h)
        .into_iter()
        .zip(plane)
        .map(|(blurred, v)| v + amount * (blurred - v))
        .collect()
}

/// Unsharp mask; values are clamped to `[0, max]`.
fn sharpen(plane: &mut [f32], w: usize, h: usize, amount: f32, max: f32) {
    if amount <= 0.0 {
        return;
    }
    let blurred = box_blur(plane, w, h);
    for (v, b) in plane.iter_mut().zip(blurred) {
        *v = (*v + amount * (*v - b)).clamp(0.0, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_buffer(kind: EffectKind, width: u32, height: u32) -> Buffer {
        Buffer::allocate(kind.device_format(width, height)).unwrap()
    }

    fn loaded(kind: EffectKind, input: &Buffer, output: &Buffer) -> Box<dyn Effect> {
        let mut effect = HostRuntime::new().create_effect(kind).unwrap();
        effect.bind_image(ImageRole::Input, input.descriptor()).unwrap();
        effect.bind_image(ImageRole::Output, output.descriptor()).unwrap();
        effect.load().unwrap();
        effect
    }

    #[test]
    fn test_upscale_rejects_model_directory() {
        let mut effect = HostRuntime::new().create_effect(EffectKind::Upscale).unwrap();
        assert_eq!(
            effect.set_parameter(Parameter::ModelDirectory(PathBuf::from("models"))),
            Err(RuntimeStatus::Parameter)
        );
    }

    #[test]
    fn test_parameter_ranges() {
        let mut effect = HostRuntime::new().create_effect(EffectKind::SuperResolution).unwrap();
        assert_eq!(effect.set_parameter(Parameter::Mode(2)), Err(RuntimeStatus::Parameter));
        assert_eq!(effect.set_parameter(Parameter::Strength(1.5)), Err(RuntimeStatus::Parameter));
        assert!(effect.set_parameter(Parameter::Mode(1)).is_ok());
        assert!(effect.set_parameter(Parameter::Strength(0.4)).is_ok());
    }

    #[test]
    fn test_bind_rejects_wrong_format() {
        let mut effect = HostRuntime::new().create_effect(EffectKind::Upscale).unwrap();
        let planar = EffectKind::SuperResolution.device_format(8, 8);
        assert_eq!(effect.bind_image(ImageRole::Input, &planar), Err(RuntimeStatus::PixelFormat));
    }

    #[test]
    fn test_load_requires_bound_images() {
        let mut effect = HostRuntime::new().create_effect(EffectKind::PassThrough).unwrap();
        assert_eq!(effect.load(), Err(RuntimeStatus::MissingInput));
    }

    #[test]
    fn test_load_rejects_anisotropic_scale() {
        let mut effect = HostRuntime::new().create_effect(EffectKind::SuperResolution).unwrap();
        effect
            .bind_image(ImageRole::Input, &EffectKind::SuperResolution.device_format(16, 9))
            .unwrap();
        effect
            .bind_image(ImageRole::Output, &EffectKind::SuperResolution.device_format(30, 18))
            .unwrap();
        assert_eq!(effect.load(), Err(RuntimeStatus::Resolution));
    }

    #[test]
    fn test_run_before_load_fails() {
        let input = device_buffer(EffectKind::PassThrough, 4, 4);
        let mut output = device_buffer(EffectKind::PassThrough, 4, 4);
        let mut effect = HostRuntime::new().create_effect(EffectKind::PassThrough).unwrap();
        assert_eq!(effect.run(&input, &mut output), Err(RuntimeStatus::Initialization));
    }

    #[test]
    fn test_passthrough_copies() {
        let mut input = device_buffer(EffectKind::PassThrough, 4, 4);
        input.bytes_mut().iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        let mut output = device_buffer(EffectKind::PassThrough, 4, 4);
        let mut effect = loaded(EffectKind::PassThrough, &input, &output);
        effect.run(&input, &mut output).unwrap();
        assert_eq!(input.bytes(), output.bytes());
    }

    #[test]
    fn test_artifact_reduction_keeps_flat_image() {
        let mut input = device_buffer(EffectKind::ArtifactReduction, 6, 4);
        let flat = vec![vec![0.25f32; 24]; 3];
        write_planes(&mut input, &flat);
        let mut output = device_buffer(EffectKind::ArtifactReduction, 6, 4);
        let mut effect = loaded(EffectKind::ArtifactReduction, &input, &output);
        effect.run(&input, &mut output).unwrap();
        for plane in read_planes(&output) {
            assert!(plane.iter().all(|v| (v - 0.25).abs() < 1e-6));
        }
    }

    #[test]
    fn test_super_resolution_doubles_size() {
        let input = device_buffer(EffectKind::SuperResolution, 8, 4);
        let mut output = device_buffer(EffectKind::SuperResolution, 16, 8);
        let mut effect = loaded(EffectKind::SuperResolution, &input, &output);
        effect.run(&input, &mut output).unwrap();
        assert_eq!(read_planes(&output)[0].len(), 128);
    }

    #[test]
    fn test_upscale_preserves_solid_colour() {
        let mut input = device_buffer(EffectKind::Upscale, 4, 2);
        let pitch = input.descriptor().pitch();
        let bytes = input.bytes_mut();
        for y in 0..2 {
            for x in 0..4 {
                bytes[y * pitch + x * 4..y * pitch + x * 4 + 4].copy_from_slice(&[200, 100, 50, 255]);
            }
        }
        let mut output = device_buffer(EffectKind::Upscale, 8, 4);
        let mut effect = loaded(EffectKind::Upscale, &input, &output);
        effect.set_parameter(Parameter::Strength(0.5)).unwrap();
        effect.run(&input, &mut output).unwrap();

        let packed = pack_rows(&output);
        assert_eq!(packed.len(), 8 * 4 * 4);
        for px in packed.chunks_exact(4) {
            for (v, want) in px.iter().zip([200u8, 100, 50, 255]) {
                assert!(v.abs_diff(want) <= 1, "{:?}", px);
            }
        }
    }

    #[test]
    fn test_run_with_unbound_shape_fails() {
        let input = device_buffer(EffectKind::PassThrough, 4, 4);
        let output = device_buffer(EffectKind::PassThrough, 4, 4);
        let mut effect = loaded(EffectKind::PassThrough, &input, &output);
        let mut other = device_buffer(EffectKind::PassThrough, 2, 2);
        assert_eq!(effect.run(&input, &mut other), Err(RuntimeStatus::Mismatch));
    }
}
