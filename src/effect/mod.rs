//! Effect runtime contract.
//!
//! The pipeline only talks to effects through [`EffectRuntime`] and
//! [`Effect`]; [`host::HostRuntime`] is the built-in implementation.

pub mod host;
mod onnx;

pub use host::HostRuntime;

use crate::buffer::{Buffer, BufferDescriptor, ChannelOrder, ComponentType, Layout, MemoryLocation};
use crate::error::RuntimeStatus;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// The transform applied to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    PassThrough,
    ArtifactReduction,
    SuperResolution,
    Upscale,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::PassThrough,
        EffectKind::ArtifactReduction,
        EffectKind::SuperResolution,
        EffectKind::Upscale,
    ];

    /// Canonical selector string.
    pub fn selector(self) -> &'static str {
        match self {
            EffectKind::PassThrough => "Transfer",
            EffectKind::ArtifactReduction => "ArtifactReduction",
            EffectKind::SuperResolution => "SuperRes",
            EffectKind::Upscale => "Upscale",
        }
    }

    /// Whether the output size differs from the input and needs a target height.
    pub fn is_resizing(self) -> bool {
        matches!(self, EffectKind::SuperResolution | EffectKind::Upscale)
    }

    pub fn takes_mode(self) -> bool {
        matches!(self, EffectKind::ArtifactReduction | EffectKind::SuperResolution)
    }

    pub fn takes_strength(self) -> bool {
        self.is_resizing()
    }

    pub fn accepts_model_directory(self) -> bool {
        self != EffectKind::Upscale
    }

    /// Format the effect requires of its device input and output buffers.
    pub fn device_format(self, width: u32, height: u32) -> BufferDescriptor {
        match self {
            EffectKind::Upscale => BufferDescriptor {
                width,
                height,
                order: ChannelOrder::Rgba,
                layout: Layout::Interleaved,
                component: ComponentType::U8,
                location: MemoryLocation::Device,
                alignment: 32,
            },
            _ => BufferDescriptor {
                width,
                height,
                order: ChannelOrder::Rgb,
                layout: Layout::Planar,
                component: ComponentType::F32,
                location: MemoryLocation::Device,
                alignment: 1,
            },
        }
    }

    /// Checks a descriptor against [`EffectKind::device_format`].
    pub fn accepts_device_buffer(self, desc: &BufferDescriptor) -> bool {
        self.device_format(desc.width, desc.height) == *desc
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for EffectKind {
    type Err = RuntimeStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" | "passthrough" => Ok(EffectKind::PassThrough),
            "artifactreduction" => Ok(EffectKind::ArtifactReduction),
            "superres" | "superresolution" => Ok(EffectKind::SuperResolution),
            "upscale" => Ok(EffectKind::Upscale),
            _ => Err(RuntimeStatus::Selector),
        }
    }
}

/// Effect settings, applied through [`Effect::set_parameter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    ModelDirectory(PathBuf),
    /// 0 = conservative, 1 = aggressive
    Mode(u32),
    /// Enhancement strength in [0, 1]
    Strength(f32),
}

/// Which side of the effect a buffer is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Input,
    Output,
}

/// An ordered queue of device work. A session issues everything on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeStream(u64);

impl ComputeStream {
    /// The implicit default stream.
    pub const DEFAULT: ComputeStream = ComputeStream(0);

    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ComputeStream(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ComputeStream {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One instantiated effect. Dropping it destroys the runtime-side state.
pub trait Effect {
    fn kind(&self) -> EffectKind;

    fn set_parameter(&mut self, param: Parameter) -> Result<(), RuntimeStatus>;

    /// Declares the shape of the buffer that will be passed for `role`.
    fn bind_image(&mut self, role: ImageRole, desc: &BufferDescriptor) -> Result<(), RuntimeStatus>;

    fn bind_stream(&mut self, stream: ComputeStream) -> Result<(), RuntimeStatus>;

    /// Prepares the effect for the bound images and parameters.
    fn load(&mut self) -> Result<(), RuntimeStatus>;

    /// Applies the effect, reading `input` and writing `output`.
    fn run(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus>;
}

/// Factory for effects.
pub trait EffectRuntime {
    fn create_effect(&self, kind: EffectKind) -> Result<Box<dyn Effect>, RuntimeStatus>;

    /// Human-readable list of available effects and their parameters.
    fn info(&self) -> String;
}

/// Owning handle to a created effect; the effect is released on drop on
/// every path out of the owning session.
pub struct EffectHandle {
    effect: Box<dyn Effect>,
}

impl EffectHandle {
    pub fn new(effect: Box<dyn Effect>) -> Self {
        Self { effect }
    }
}

impl std::ops::Deref for EffectHandle {
    type Target = dyn Effect;

    fn deref(&self) -> &Self::Target {
        self.effect.as_ref()
    }
}

impl std::ops::DerefMut for EffectHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.effect.as_mut()
    }
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        debug!("Releasing {} effect", self.effect.kind());
    }
}
