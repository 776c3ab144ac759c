use binrw::binrw;
use enumn::N;

use crate::{common::NativeTextureCommon, raster::CompressionType, raster::RasterFlags};

/// XBOX-specific block compression codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u8)]
pub enum XboxCompression {
    Dxt1 = 0x0C,
    Dxt2 = 0x0D,
    Dxt3 = 0x0E,
    Dxt4 = 0x0F,
    Dxt5 = 0x10,
}

impl XboxCompression {
    pub fn to_generic(self) -> CompressionType {
        match self {
            Self::Dxt1 => CompressionType::Dxt1,
            Self::Dxt2 => CompressionType::Dxt2,
            Self::Dxt3 => CompressionType::Dxt3,
            Self::Dxt4 => CompressionType::Dxt4,
            Self::Dxt5 => CompressionType::Dxt5,
        }
    }

    pub fn from_generic(compression: CompressionType) -> Option<Self> {
        Some(match compression {
            CompressionType::Dxt1 => Self::Dxt1,
            CompressionType::Dxt2 => Self::Dxt2,
            CompressionType::Dxt3 => Self::Dxt3,
            CompressionType::Dxt4 => Self::Dxt4,
            CompressionType::Dxt5 => Self::Dxt5,
            _ => return None,
        })
    }
}

/// XBOX native texture struct (platform 5)
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XboxHeader {
    pub common: NativeTextureCommon,

    #[br(map = |v: u32| RasterFlags::from_bits_retain(v))]
    #[bw(map = |f: &RasterFlags| f.bits())]
    pub raster_flags: RasterFlags,

    pub has_alpha: u32,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub mipmap_count: u8,
    pub raster_type: u8,
    /// 0 when uncompressed, otherwise one of [`XboxCompression`]
    pub dxt_compression: u8,
    /// Byte count of all mipmap levels together
    pub image_data_size: u32,
}

crate::structure_size_tests!(XboxHeader = 92);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_codes_translate_both_ways() {
        for code in 0x0Cu8..=0x10 {
            let xbox = XboxCompression::n(code).unwrap();
            let generic = xbox.to_generic();
            assert_eq!(generic.dxt_number(), Some(code - 0x0B));
            assert_eq!(XboxCompression::from_generic(generic), Some(xbox));
        }
        assert_eq!(XboxCompression::n(0x0B), None);
        assert_eq!(XboxCompression::from_generic(CompressionType::Pvrtc4), None);
    }
}
