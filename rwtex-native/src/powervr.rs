use binrw::binrw;
use enumn::N;

use crate::{common::NativeTextureCommon, raster::CompressionType};

/// OpenGL ES PVRTC internal formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u32)]
pub enum PowerVrFormat {
    Rgb4bpp = 0x8C00,
    Rgb2bpp = 0x8C01,
    Rgba4bpp = 0x8C02,
    Rgba2bpp = 0x8C03,
}

impl PowerVrFormat {
    pub fn compression(&self) -> CompressionType {
        match self {
            Self::Rgb4bpp | Self::Rgba4bpp => CompressionType::Pvrtc4,
            Self::Rgb2bpp | Self::Rgba2bpp => CompressionType::Pvrtc2,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba4bpp | Self::Rgba2bpp)
    }

    pub fn from_compression(compression: CompressionType, has_alpha: bool) -> Option<Self> {
        Some(match (compression, has_alpha) {
            (CompressionType::Pvrtc4, false) => Self::Rgb4bpp,
            (CompressionType::Pvrtc4, true) => Self::Rgba4bpp,
            (CompressionType::Pvrtc2, false) => Self::Rgb2bpp,
            (CompressionType::Pvrtc2, true) => Self::Rgba2bpp,
            _ => return None,
        })
    }
}

/// PowerVR mobile native texture struct (platform `'PVR\0'`)
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PowerVrHeader {
    pub common: NativeTextureCommon,
    pub mipmap_count: u8,
    pub raster_type: u8,
    pub has_alpha: u8,
    pub pad: u8,
    pub width: u16,
    pub height: u16,
    pub internal_format: u32,
    pub image_data_size: u32,
}

crate::structure_size_tests!(PowerVrHeader = 88);
