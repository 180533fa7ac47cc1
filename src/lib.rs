//! videofx: apply video effects to images, video files and live camera
//! streams.
//!
//! Frames are moved into effect-specific buffers, run through an effect and
//! moved back, with one session owning the effect and every buffer.

pub mod allocator;
pub mod buffer;
pub mod capture;
pub mod config;
pub mod controller;
pub mod effect;
pub mod error;
pub mod frame;
pub mod output;
pub mod overlay;
pub mod progress;
pub mod rate;
pub mod session;
pub mod transfer;
pub mod video;

pub use error::{FxError, FxResult};
pub use session::{EffectSession, StreamOutputs, StreamSummary};
