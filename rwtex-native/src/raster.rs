use bitflags::bitflags;
use enumn::N;
use serde::{Deserialize, Serialize};

/// `rwRASTERTYPETEXTURE`
pub const RASTER_TYPE_TEXTURE: u8 = 4;

/// Framework-neutral channel layout of an uncompressed texel
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, N, Serialize, Deserialize)]
#[repr(u8)]
pub enum RasterFormat {
    /// Placeholder used by compressed rasters
    #[default]
    Default = 0,
    Raster1555 = 1,
    Raster565 = 2,
    Raster4444 = 3,
    Lum = 4,
    Raster8888 = 5,
    Raster888 = 6,
    Depth16 = 7,
    Depth24 = 8,
    Depth32 = 9,
    Raster555 = 10,
    LumAlpha = 11,
}

impl RasterFormat {
    pub fn has_alpha_channel(&self) -> bool {
        matches!(
            self,
            Self::Raster1555 | Self::Raster4444 | Self::Raster8888 | Self::LumAlpha
        )
    }

    pub fn is_luminance(&self) -> bool {
        matches!(
            self,
            Self::Lum | Self::LumAlpha | Self::Depth16 | Self::Depth24 | Self::Depth32
        )
    }

    /// Depth used for palette entries and other places that need a single canonical width
    pub fn natural_depth(&self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Raster1555 | Self::Raster565 | Self::Raster4444 | Self::Raster555 => 16,
            Self::Lum => 8,
            Self::LumAlpha => 16,
            Self::Raster8888 => 32,
            Self::Raster888 => 24,
            Self::Depth16 => 16,
            Self::Depth24 => 24,
            Self::Depth32 => 32,
        }
    }

    /// Whether `depth` is a valid storage width for this format
    pub fn accepts_depth(&self, depth: u32) -> bool {
        match self {
            Self::Default => false,
            Self::Raster1555 | Self::Raster565 | Self::Raster4444 => depth == 16,
            Self::Raster555 => depth == 15 || depth == 16,
            Self::Raster8888 => depth == 32,
            Self::Raster888 => depth == 24 || depth == 32,
            Self::Lum => depth == 4 || depth == 8,
            Self::LumAlpha => depth == 8 || depth == 16,
            Self::Depth16 => depth == 16,
            Self::Depth24 => depth == 24 || depth == 32,
            Self::Depth32 => depth == 32,
        }
    }
}

/// Order of the channels from the least significant bit upwards
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, N, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColorOrder {
    #[default]
    Rgba = 0,
    Bgra = 1,
    Abgr = 2,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, N, Serialize, Deserialize)]
#[repr(u8)]
pub enum PaletteType {
    #[default]
    None = 0,
    /// Two indices per byte, first texel in the high nibble
    Pal4 = 1,
    Pal8 = 2,
    /// Two indices per byte, first texel in the low nibble
    Pal4Lsb = 3,
}

impl PaletteType {
    pub fn is_palette(&self) -> bool {
        *self != Self::None
    }

    /// Full entry count of a palette of this type
    pub fn max_entries(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Pal4 | Self::Pal4Lsb => 16,
            Self::Pal8 => 256,
        }
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, Self::Pal4 | Self::Pal4Lsb)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, N, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionType {
    #[default]
    None = 0,
    Dxt1 = 1,
    Dxt2 = 2,
    Dxt3 = 3,
    Dxt4 = 4,
    Dxt5 = 5,
    Pvrtc2 = 6,
    Pvrtc4 = 7,
    Etc1 = 8,
}

impl CompressionType {
    pub fn is_compressed(&self) -> bool {
        *self != Self::None
    }

    pub fn is_dxt(&self) -> bool {
        matches!(
            self,
            Self::Dxt1 | Self::Dxt2 | Self::Dxt3 | Self::Dxt4 | Self::Dxt5
        )
    }

    /// `1..=5` for DXT kinds, as stored by the D3D native textures
    pub fn dxt_number(&self) -> Option<u8> {
        if self.is_dxt() {
            Some(*self as u8)
        } else {
            None
        }
    }

    pub fn from_dxt_number(n: u8) -> Option<Self> {
        match n {
            1..=5 => Self::n(n),
            _ => None,
        }
    }

    /// Pixel dimensions covered by one block
    pub fn block_dimensions(&self) -> (u32, u32) {
        match self {
            Self::None => (1, 1),
            Self::Pvrtc2 => (8, 4),
            _ => (4, 4),
        }
    }

    /// Bytes per block
    pub fn block_bytes(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Dxt1 | Self::Etc1 | Self::Pvrtc2 | Self::Pvrtc4 => 8,
            Self::Dxt2 | Self::Dxt3 | Self::Dxt4 | Self::Dxt5 => 16,
        }
    }

    /// Bits per texel, used where data size is tracked through a depth value
    pub fn bits_per_texel(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Pvrtc2 => 2,
            Self::Dxt1 | Self::Etc1 | Self::Pvrtc4 => 4,
            _ => 8,
        }
    }

    pub fn is_pvrtc(&self) -> bool {
        matches!(self, Self::Pvrtc2 | Self::Pvrtc4)
    }
}

bitflags! {
    /// The raster format word stored by every RenderWare native texture
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RasterFlags: u32 {
        const FORMAT_MASK = 0x0F00;
        const AUTOMIPMAP = 0x1000;
        const PAL8 = 0x2000;
        const PAL4 = 0x4000;
        const MIPMAP = 0x8000;
    }
}

impl RasterFlags {
    pub fn compose(
        format: RasterFormat,
        palette: PaletteType,
        has_mipmaps: bool,
        auto_mipmaps: bool,
    ) -> Self {
        let mut flags = Self::from_bits_retain((format as u32) << 8);
        match palette {
            PaletteType::None => {}
            PaletteType::Pal8 => flags |= Self::PAL8,
            PaletteType::Pal4 | PaletteType::Pal4Lsb => flags |= Self::PAL4,
        }
        flags.set(Self::MIPMAP, has_mipmaps);
        flags.set(Self::AUTOMIPMAP, auto_mipmaps);
        flags
    }

    /// Raster format stored in bits 8..12, `None` for codes outside the known range
    pub fn raster_format(&self) -> Option<RasterFormat> {
        RasterFormat::n(((self.bits() & Self::FORMAT_MASK.bits()) >> 8) as u8)
    }

    /// Palette kind the flags declare; 4-bit palettes are reported high-nibble first
    pub fn palette_type(&self) -> PaletteType {
        if self.contains(Self::PAL8) {
            PaletteType::Pal8
        } else if self.contains(Self::PAL4) {
            PaletteType::Pal4
        } else {
            PaletteType::None
        }
    }

    pub fn has_conflicting_palette(&self) -> bool {
        self.contains(Self::PAL8 | Self::PAL4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_flags_compose_decompose() {
        let flags = RasterFlags::compose(
            RasterFormat::Raster8888,
            PaletteType::Pal8,
            true,
            false,
        );
        assert_eq!(flags.bits(), 0x0500 | 0x2000 | 0x8000);
        assert_eq!(flags.raster_format(), Some(RasterFormat::Raster8888));
        assert_eq!(flags.palette_type(), PaletteType::Pal8);
        assert!(!flags.contains(RasterFlags::AUTOMIPMAP));
    }

    #[test]
    fn unknown_raster_code() {
        assert_eq!(RasterFlags::from_bits_retain(0x0F00).raster_format(), None);
    }

    #[test]
    fn depth_rules() {
        assert!(RasterFormat::Raster888.accepts_depth(32));
        assert!(RasterFormat::Raster888.accepts_depth(24));
        assert!(!RasterFormat::Raster8888.accepts_depth(24));
        assert!(!RasterFormat::Default.accepts_depth(0));
    }

    #[test]
    fn dxt_numbers() {
        assert_eq!(CompressionType::from_dxt_number(3), Some(CompressionType::Dxt3));
        assert_eq!(CompressionType::from_dxt_number(6), None);
        assert_eq!(CompressionType::Pvrtc4.dxt_number(), None);
        assert_eq!(CompressionType::Dxt1.block_bytes(), 8);
        assert_eq!(CompressionType::Dxt5.block_bytes(), 16);
    }
}
