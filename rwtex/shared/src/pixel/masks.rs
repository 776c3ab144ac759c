//! Channel layouts described by bit masks, the way DDS and legacy PVR headers
//! describe uncompressed data.

use rwtex_native::raster::{ColorOrder, RasterFormat};

use super::color::{packed_masks, scale_channel, Rgba8};
use super::{geometry, RasterDescriptor};
use crate::error::{Result, TextureError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

/// Formats tried when looking for the descriptor behind a set of masks
const CANDIDATES: [(RasterFormat, u32); 7] = [
    (RasterFormat::Raster8888, 32),
    (RasterFormat::Raster888, 32),
    (RasterFormat::Raster888, 24),
    (RasterFormat::Raster565, 16),
    (RasterFormat::Raster1555, 16),
    (RasterFormat::Raster4444, 16),
    (RasterFormat::Raster555, 16),
];

impl ChannelMasks {
    pub const fn new(red: u32, green: u32, blue: u32, alpha: u32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Masks of a raw descriptor; luminance sits in the red mask
    pub fn of(desc: &RasterDescriptor) -> Option<Self> {
        if desc.is_compressed() || desc.is_palette() {
            return None;
        }
        match (desc.raster_format, desc.depth) {
            (RasterFormat::Lum, 8) => Some(Self::new(0xFF, 0, 0, 0)),
            (RasterFormat::LumAlpha, 8) => Some(Self::new(0x0F, 0, 0, 0xF0)),
            (RasterFormat::LumAlpha, 16) => Some(Self::new(0xFF, 0, 0, 0xFF00)),
            (format, depth) => {
                let [r, g, b, a] = packed_masks(format, depth, desc.color_order)?;
                Some(Self::new(r, g, b, a))
            }
        }
    }

    /// Raw descriptor with exactly these masks at `bit_count`
    pub fn to_descriptor(&self, bit_count: u32, luminance: bool) -> Option<RasterDescriptor> {
        if luminance {
            let (format, depth) = match (bit_count, self.red, self.alpha) {
                (8, 0xFF, 0) => (RasterFormat::Lum, 8),
                (8, 0x0F, 0xF0) => (RasterFormat::LumAlpha, 8),
                (16, 0xFF, 0xFF00) => (RasterFormat::LumAlpha, 16),
                _ => return None,
            };
            return Some(RasterDescriptor::raw(format, depth, ColorOrder::Rgba, 1));
        }

        for (format, depth) in CANDIDATES {
            if depth != bit_count {
                continue;
            }
            for order in [ColorOrder::Bgra, ColorOrder::Rgba, ColorOrder::Abgr] {
                let desc = RasterDescriptor::raw(format, depth, order, 1);
                if Self::of(&desc) == Some(*self) {
                    return Some(desc);
                }
            }
        }
        None
    }

    fn channel(value: u32, mask: u32) -> Option<u8> {
        if mask == 0 {
            return None;
        }
        let shift = mask.trailing_zeros();
        let bits = (mask >> shift).count_ones();
        Some(scale_channel((value & mask) >> shift, bits, 8) as u8)
    }

    pub fn decode(&self, value: u32, luminance: bool) -> Rgba8 {
        let alpha = Self::channel(value, self.alpha).unwrap_or(255);
        if luminance {
            let lum = Self::channel(value, self.red).unwrap_or(0);
            return Rgba8::new(lum, lum, lum, alpha);
        }
        Rgba8::new(
            Self::channel(value, self.red).unwrap_or(0),
            Self::channel(value, self.green).unwrap_or(0),
            Self::channel(value, self.blue).unwrap_or(0),
            alpha,
        )
    }
}

/// Decodes little endian texels of `bit_count` bits (8, 16, 24 or 32) into byte-ordered RGBA
pub fn decode_masked_surface(
    data: &[u8],
    width: u32,
    height: u32,
    row_alignment: u32,
    bit_count: u32,
    masks: &ChannelMasks,
    luminance: bool,
) -> Result<Vec<u8>> {
    if !matches!(bit_count, 8 | 16 | 24 | 32) {
        return Err(TextureError::Structural(format!(
            "cannot decode {} bit masked texels",
            bit_count
        )));
    }

    let bytes = bit_count as usize / 8;
    let row_size = geometry::row_size(width, bit_count, row_alignment);
    let needed = geometry::data_size(row_size, height);
    if data.len() < needed {
        return Err(TextureError::Structural(format!(
            "masked surface holds {} bytes but needs {}",
            data.len(),
            needed
        )));
    }

    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    for row in data.chunks(row_size).take(height as usize) {
        for texel in row.chunks_exact(bytes).take(width as usize) {
            let value = texel
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (i * 8));
            let color = masks.decode(value, luminance);
            out.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }
    Ok(out)
}
