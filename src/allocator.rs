//! Buffer sizing per effect kind.
//!
//! [`plan`] is pure: it derives the four buffer shapes of a session and
//! validates the requested output size. [`BufferSet::allocate`] turns a plan
//! into memory, including the one scratch buffer every transfer shares.

use crate::buffer::{Buffer, BufferDescriptor, MemoryLocation};
use crate::effect::EffectKind;
use crate::error::{FxError, FxResult, RuntimeStatus, TransferError};
use tracing::debug;

/// Shapes of the buffers a session needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPlan {
    pub host_src: BufferDescriptor,
    pub host_dst: BufferDescriptor,
    pub device_src: BufferDescriptor,
    pub device_dst: BufferDescriptor,
}

impl BufferPlan {
    pub fn output_size(&self) -> (u32, u32) {
        (self.host_dst.width, self.host_dst.height)
    }
}

/// Derives the buffer shapes for `kind` on a `src_width` x `src_height` source.
///
/// Resizing kinds need `requested_height`; the width follows from the source
/// aspect ratio and must scale by exactly the same factor.
pub fn plan(kind: EffectKind, src_width: u32, src_height: u32, requested_height: Option<u32>) -> FxResult<BufferPlan> {
    if src_width == 0 || src_height == 0 {
        return Err(RuntimeStatus::Resolution.into());
    }

    let (dst_width, dst_height) = if kind.is_resizing() {
        let height = match requested_height {
            Some(h) if h > 0 => h,
            _ => return Err(FxError::MissingParameter("--resolution")),
        };
        let width = scaled_width(src_width, src_height, height);
        check_isotropy(src_width, src_height, width, height)?;
        (width, height)
    } else {
        (src_width, src_height)
    };

    Ok(BufferPlan {
        host_src: BufferDescriptor::host_rgb(src_width, src_height),
        host_dst: BufferDescriptor::host_rgb(dst_width, dst_height),
        device_src: kind.device_format(src_width, src_height),
        device_dst: kind.device_format(dst_width, dst_height),
    })
}

/// round(src_width * height / src_height)
fn scaled_width(src_width: u32, src_height: u32, height: u32) -> u32 {
    let num = 2 * src_width as u64 * height as u64 + src_height as u64;
    (num / (2 * src_height as u64)) as u32
}

fn check_isotropy(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> FxResult<()> {
    if src_width as u64 * dst_height as u64 != src_height as u64 * dst_width as u64 {
        return Err(FxError::ResolutionMismatch {
            src_width,
            src_height,
            dst_width,
            dst_height,
        });
    }
    Ok(())
}

/// Every buffer a session owns.
#[derive(Debug)]
pub struct BufferSet {
    pub host_src: Buffer,
    pub host_dst: Buffer,
    pub device_src: Buffer,
    pub device_dst: Buffer,
    /// Shared by every transfer, in both directions.
    pub scratch: Buffer,
}

impl BufferSet {
    /// Allocates the buffers of `plan`. Destination buffers first, then the
    /// scratch buffer covering both host shapes on the device side.
    pub fn allocate(plan: &BufferPlan) -> Result<Self, TransferError> {
        let host_dst = Buffer::allocate(plan.host_dst)?;
        let device_dst = Buffer::allocate(plan.device_dst)?;
        let host_src = Buffer::allocate(plan.host_src)?;
        let device_src = Buffer::allocate(plan.device_src)?;

        let mut scratch = Buffer::allocate(plan.host_dst.with_location(MemoryLocation::Device))?;
        scratch.widen(plan.host_src.with_location(MemoryLocation::Device))?;
        debug!(
            "Allocated buffers: {}x{} -> {}x{}, scratch {} bytes",
            plan.host_src.width,
            plan.host_src.height,
            plan.host_dst.width,
            plan.host_dst.height,
            scratch.capacity()
        );

        Ok(Self {
            host_src,
            host_dst,
            device_src,
            device_dst,
            scratch,
        })
    }

    pub fn output_size(&self) -> (u32, u32) {
        let desc = self.host_dst.descriptor();
        (desc.width, desc.height)
    }
}
