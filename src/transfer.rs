//! Host/device pixel transfers with format conversion.
//!
//! Moving data between memory domains goes through the session's scratch
//! buffer, which is reshaped (never reallocated) to the host-side shape of
//! the current call. Converting between layouts, channel orders and
//! component types happens on the device side.

use crate::buffer::{Buffer, BufferDescriptor, Channel, ComponentType, MemoryLocation};
use crate::error::TransferError;

/// Direction of a transfer; each carries the value-range scale applied
/// when converting between 8-bit and float components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    ToDevice,
    ToHost,
}

impl TransferDirection {
    pub fn scale(self) -> f32 {
        match self {
            TransferDirection::ToDevice => 1.0 / 255.0,
            TransferDirection::ToHost => 255.0,
        }
    }
}

/// Copies `src` into `dst`, converting the pixel format on the way.
pub fn transfer(
    src: &Buffer,
    dst: &mut Buffer,
    direction: TransferDirection,
    scratch: &mut Buffer,
) -> Result<(), TransferError> {
    let src_desc = *src.descriptor();
    let dst_desc = *dst.descriptor();
    if !src_desc.same_size(&dst_desc) {
        return Err(mismatch(&src_desc, &dst_desc));
    }

    match (src_desc.location, dst_desc.location, direction) {
        (from, to, _) if from == to => convert(src, dst, direction.scale()),
        (MemoryLocation::Host, MemoryLocation::Device, TransferDirection::ToDevice) => {
            scratch.reshape(src_desc.with_location(MemoryLocation::Device))?;
            scratch.bytes_mut().copy_from_slice(src.bytes());
            convert(scratch, dst, direction.scale())
        }
        (MemoryLocation::Device, MemoryLocation::Host, TransferDirection::ToHost) => {
            scratch.reshape(dst_desc.with_location(MemoryLocation::Device))?;
            convert(src, scratch, direction.scale())?;
            dst.bytes_mut().copy_from_slice(scratch.bytes());
            Ok(())
        }
        _ => Err(mismatch(&src_desc, &dst_desc)),
    }
}

fn mismatch(src: &BufferDescriptor, dst: &BufferDescriptor) -> TransferError {
    TransferError::FormatMismatch { src: *src, dst: *dst }
}

/// Converts between two same-sized buffers. `scale` only applies when the
/// component types differ; a missing alpha channel in `src` becomes opaque.
fn convert(src: &Buffer, dst: &mut Buffer, scale: f32) -> Result<(), TransferError> {
    let s = *src.descriptor();
    let d = *dst.descriptor();
    if !s.same_size(&d) {
        return Err(mismatch(&s, &d));
    }

    let channel_map = d
        .order
        .channels()
        .iter()
        .map(|ch| match s.order.index_of(*ch) {
            Some(i) => Ok(Some(i)),
            None if *ch == Channel::Alpha => Ok(None),
            None => Err(mismatch(&s, &d)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if s == d.with_location(s.location) {
        dst.bytes_mut().copy_from_slice(src.bytes());
        return Ok(());
    }

    let scale = if s.component == d.component { 1.0 } else { scale };
    let opaque = d.component.opaque();
    let src_bytes = src.bytes();
    let dst_bytes = dst.bytes_mut();
    for y in 0..d.height as usize {
        for x in 0..d.width as usize {
            for (c, from) in channel_map.iter().enumerate() {
                let value = match from {
                    Some(sc) => read(src_bytes, s.component, s.offset(x, y, *sc)) * scale,
                    None => opaque,
                };
                write(dst_bytes, d.component, d.offset(x, y, c), value);
            }
        }
    }
    Ok(())
}

#[inline]
fn read(bytes: &[u8], component: ComponentType, at: usize) -> f32 {
    match component {
        ComponentType::U8 => bytes[at] as f32,
        ComponentType::F32 => f32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]),
    }
}

#[inline]
fn write(bytes: &mut [u8], component: ComponentType, at: usize, value: f32) {
    match component {
        ComponentType::U8 => bytes[at] = value.round().clamp(0.0, 255.0) as u8,
        ComponentType::F32 => bytes[at..at + 4].copy_from_slice(&value.to_ne_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ChannelOrder, Layout};
    use crate::effect::EffectKind;

    fn host(width: u32, height: u32, fill: &[u8]) -> Buffer {
        let mut buf = Buffer::allocate(BufferDescriptor::host_rgb(width, height)).unwrap();
        for (b, v) in buf.bytes_mut().iter_mut().zip(fill.iter().cycle()) {
            *b = *v;
        }
        buf
    }

    fn scratch_for(width: u32, height: u32) -> Buffer {
        Buffer::allocate(BufferDescriptor::host_rgb(width, height).with_location(MemoryLocation::Device)).unwrap()
    }

    #[test]
    fn test_normalization_round_trip() {
        for v in [0u8, 1, 128, 255] {
            let src = host(5, 3, &[v]);
            let mut device = Buffer::allocate(EffectKind::SuperResolution.device_format(5, 3)).unwrap();
            let mut back = host(5, 3, &[7]);
            let mut scratch = scratch_for(5, 3);

            transfer(&src, &mut device, TransferDirection::ToDevice, &mut scratch).unwrap();
            let first = f32::from_ne_bytes(device.bytes()[..4].try_into().unwrap());
            assert!((first - v as f32 / 255.0).abs() < 1e-6);

            transfer(&device, &mut back, TransferDirection::ToHost, &mut scratch).unwrap();
            assert_eq!(back.bytes(), src.bytes());
        }
    }

    #[test]
    fn test_planar_layout_after_upload() {
        let src = host(2, 1, &[10, 20, 30, 40, 50, 60]);
        let mut device = Buffer::allocate(EffectKind::PassThrough.device_format(2, 1)).unwrap();
        let mut scratch = scratch_for(2, 1);
        transfer(&src, &mut device, TransferDirection::ToDevice, &mut scratch).unwrap();

        let values: Vec<u8> = device
            .bytes()
            .chunks_exact(4)
            .map(|b| (f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) * 255.0).round() as u8)
            .collect();
        assert_eq!(values, vec![10, 40, 20, 50, 30, 60]);
    }

    #[test]
    fn test_rgba_upload_adds_opaque_alpha_and_padding() {
        let src = host(3, 2, &[1, 2, 3]);
        let mut device = Buffer::allocate(EffectKind::Upscale.device_format(3, 2)).unwrap();
        let mut scratch = scratch_for(3, 2);
        transfer(&src, &mut device, TransferDirection::ToDevice, &mut scratch).unwrap();

        let pitch = device.descriptor().pitch();
        assert_eq!(pitch, 32);
        assert_eq!(&device.bytes()[..12], &[1, 2, 3, 255, 1, 2, 3, 255, 1, 2, 3, 255]);
        assert_eq!(&device.bytes()[pitch..pitch + 4], &[1, 2, 3, 255]);

        let mut back = host(3, 2, &[0]);
        transfer(&device, &mut back, TransferDirection::ToHost, &mut scratch).unwrap();
        assert_eq!(back.bytes(), src.bytes());
    }

    #[test]
    fn test_channel_reorder() {
        let src = host(1, 1, &[1, 2, 3]);
        let mut bgr = Buffer::allocate(BufferDescriptor {
            order: ChannelOrder::Bgr,
            ..BufferDescriptor::host_rgb(1, 1)
        })
        .unwrap();
        let mut scratch = scratch_for(1, 1);
        transfer(&src, &mut bgr, TransferDirection::ToHost, &mut scratch).unwrap();
        assert_eq!(bgr.bytes(), &[3, 2, 1]);
    }

    #[test]
    fn test_scratch_too_small() {
        let src = host(8, 8, &[0]);
        let mut device = Buffer::allocate(EffectKind::PassThrough.device_format(8, 8)).unwrap();
        let mut scratch = scratch_for(2, 2);
        let err = transfer(&src, &mut device, TransferDirection::ToDevice, &mut scratch).unwrap_err();
        assert!(matches!(err, TransferError::CapacityExceeded { need: 192, .. }));
    }

    #[test]
    fn test_size_mismatch() {
        let src = host(4, 4, &[0]);
        let mut device = Buffer::allocate(EffectKind::PassThrough.device_format(4, 2)).unwrap();
        let mut scratch = scratch_for(4, 4);
        assert!(matches!(
            transfer(&src, &mut device, TransferDirection::ToDevice, &mut scratch),
            Err(TransferError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_direction_must_match_locations() {
        let src = host(2, 2, &[0]);
        let mut device = Buffer::allocate(EffectKind::PassThrough.device_format(2, 2)).unwrap();
        let mut scratch = scratch_for(2, 2);
        assert!(transfer(&src, &mut device, TransferDirection::ToHost, &mut scratch).is_err());
        assert_eq!(device.descriptor().layout, Layout::Planar);
    }
}
