//! Pixel buffer descriptors and owned, aligned pixel storage.
//!
//! A [`Buffer`] owns a block of memory whose capacity only ever grows.
//! [`Buffer::reshape`] retargets it to a new descriptor in O(1) when the
//! descriptor fits, which is how one scratch buffer serves transfers of
//! differently shaped images.

use crate::error::{RuntimeStatus, TransferError};
use crate::frame::{PixelFormat, VideoFrame};
use bytemuck::{Pod, Zeroable};

/// Largest row alignment any buffer may request.
pub const MAX_ALIGNMENT: u32 = 32;

/// Storage unit; keeps the base address aligned for every supported layout.
#[repr(C, align(32))]
#[derive(Clone, Copy)]
struct Block([u8; MAX_ALIGNMENT as usize]);

// SAFETY: a plain byte array with an alignment equal to its size has no padding.
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Order of the colour channels within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
    Rgba,
}

/// Colour channel identity, used to map between channel orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl ChannelOrder {
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelOrder::Rgb => &[Channel::Red, Channel::Green, Channel::Blue],
            ChannelOrder::Bgr => &[Channel::Blue, Channel::Green, Channel::Red],
            ChannelOrder::Rgba => &[Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha],
        }
    }

    pub fn count(self) -> usize {
        self.channels().len()
    }

    pub fn index_of(self, channel: Channel) -> Option<usize> {
        self.channels().iter().position(|c| *c == channel)
    }
}

/// Whether channels are interleaved per pixel or stored as separate planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Interleaved,
    Planar,
}

/// Storage type of one channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    U8,
    F32,
}

impl ComponentType {
    pub fn size(self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::F32 => 4,
        }
    }

    /// Value of a fully opaque alpha channel.
    pub fn opaque(self) -> f32 {
        match self {
            ComponentType::U8 => 255.0,
            ComponentType::F32 => 1.0,
        }
    }
}

/// Memory domain a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    Host,
    Device,
}

/// Shape and format of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub layout: Layout,
    pub component: ComponentType,
    pub location: MemoryLocation,
    /// Row alignment in bytes.
    pub alignment: u32,
}

impl BufferDescriptor {
    /// Packed 8-bit RGB in host memory, the layout of decoded frames.
    pub fn host_rgb(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            layout: Layout::Interleaved,
            component: ComponentType::U8,
            location: MemoryLocation::Host,
            alignment: 1,
        }
    }

    pub fn with_location(self, location: MemoryLocation) -> Self {
        Self { location, ..self }
    }

    pub fn same_size(&self, other: &BufferDescriptor) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Bytes per row (per plane row for planar layouts), padded to the alignment.
    pub fn pitch(&self) -> usize {
        let per_row = match self.layout {
            Layout::Interleaved => self.width as usize * self.order.count() * self.component.size(),
            Layout::Planar => self.width as usize * self.component.size(),
        };
        let align = self.alignment.max(1) as usize;
        per_row.div_ceil(align) * align
    }

    /// Bytes of one plane; the whole image for interleaved layouts.
    pub fn plane_size(&self) -> usize {
        self.pitch() * self.height as usize
    }

    pub fn byte_size(&self) -> usize {
        match self.layout {
            Layout::Interleaved => self.plane_size(),
            Layout::Planar => self.plane_size() * self.order.count(),
        }
    }

    /// Byte offset of channel `c` of pixel (`x`, `y`).
    #[inline]
    pub fn offset(&self, x: usize, y: usize, c: usize) -> usize {
        let size = self.component.size();
        match self.layout {
            Layout::Interleaved => y * self.pitch() + (x * self.order.count() + c) * size,
            Layout::Planar => c * self.plane_size() + y * self.pitch() + x * size,
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeStatus> {
        if self.width == 0 || self.height == 0 {
            return Err(RuntimeStatus::Resolution);
        }
        if !self.alignment.is_power_of_two() || self.alignment > MAX_ALIGNMENT {
            return Err(RuntimeStatus::Device(crate::error::DeviceStatus::Pitch));
        }
        Ok(())
    }
}

/// Owned pixel storage whose capacity never shrinks.
#[derive(Debug, Clone)]
pub struct Buffer {
    desc: BufferDescriptor,
    storage: Vec<Block>,
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Block")
    }
}

impl Buffer {
    /// Allocates zeroed storage for `desc`.
    pub fn allocate(desc: BufferDescriptor) -> Result<Self, TransferError> {
        desc.validate().map_err(TransferError::Device)?;
        let mut buffer = Self {
            desc,
            storage: Vec::new(),
        };
        buffer.grow_to(desc.byte_size())?;
        Ok(buffer)
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.desc
    }

    /// Allocated bytes, independent of the current shape.
    pub fn capacity(&self) -> usize {
        self.storage.len() * MAX_ALIGNMENT as usize
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.storage)[..self.desc.byte_size()]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.desc.byte_size();
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.storage)[..len]
    }

    /// Retargets the buffer to `desc` without allocating.
    pub fn reshape(&mut self, desc: BufferDescriptor) -> Result<(), TransferError> {
        desc.validate().map_err(TransferError::Device)?;
        let need = desc.byte_size();
        if need > self.capacity() {
            return Err(TransferError::CapacityExceeded {
                need,
                have: self.capacity(),
            });
        }
        self.desc = desc;
        Ok(())
    }

    /// Retargets the buffer to `desc`, growing (never shrinking) the storage
    /// when it does not fit.
    pub fn widen(&mut self, desc: BufferDescriptor) -> Result<(), TransferError> {
        desc.validate().map_err(TransferError::Device)?;
        self.grow_to(desc.byte_size())?;
        self.desc = desc;
        Ok(())
    }

    fn grow_to(&mut self, bytes: usize) -> Result<(), TransferError> {
        let blocks = bytes.div_ceil(MAX_ALIGNMENT as usize);
        if blocks > self.storage.len() {
            self.storage
                .try_reserve_exact(blocks - self.storage.len())
                .map_err(|_| TransferError::Device(RuntimeStatus::Memory))?;
            self.storage.resize(blocks, Block::zeroed());
        }
        Ok(())
    }

    /// Copies a decoded frame into this host buffer.
    pub fn load_frame(&mut self, frame: &VideoFrame) -> Result<(), TransferError> {
        let expected = frame_descriptor(frame);
        if expected.with_location(self.desc.location) != self.desc || frame.data.len() != expected.byte_size() {
            return Err(TransferError::FormatMismatch {
                src: expected,
                dst: self.desc,
            });
        }
        self.bytes_mut().copy_from_slice(&frame.data);
        Ok(())
    }

    /// Copies this packed 8-bit buffer into `frame`, reusing its storage.
    pub fn store_frame(&self, frame: &mut VideoFrame) -> Result<(), TransferError> {
        let format = match (self.desc.order, self.desc.layout, self.desc.component, self.desc.alignment) {
            (ChannelOrder::Rgb, Layout::Interleaved, ComponentType::U8, 1) => PixelFormat::Rgb,
            (ChannelOrder::Rgba, Layout::Interleaved, ComponentType::U8, 1) => PixelFormat::Rgba,
            _ => {
                return Err(TransferError::FormatMismatch {
                    src: self.desc,
                    dst: BufferDescriptor::host_rgb(self.desc.width, self.desc.height),
                })
            }
        };
        frame.width = self.desc.width;
        frame.height = self.desc.height;
        frame.format = format;
        frame.data.clear();
        frame.data.extend_from_slice(self.bytes());
        Ok(())
    }
}

fn frame_descriptor(frame: &VideoFrame) -> BufferDescriptor {
    let desc = BufferDescriptor::host_rgb(frame.width, frame.height);
    match frame.format {
        PixelFormat::Rgb => desc,
        PixelFormat::Rgba => BufferDescriptor {
            order: ChannelOrder::Rgba,
            ..desc
        },
    }
}
