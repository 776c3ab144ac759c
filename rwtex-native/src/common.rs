use binrw::binrw;

use crate::util::{name_from_bytes, name_to_bytes};

/// Sampling state packed as filter mode (bits 0..8), U addressing (8..12) and V addressing (12..16)
#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TextureFormatInfo {
    pub packed: u32,
}

impl TextureFormatInfo {
    pub fn new(filter_mode: u8, u_addressing: u8, v_addressing: u8) -> Self {
        Self {
            packed: filter_mode as u32
                | ((u_addressing as u32 & 0xF) << 8)
                | ((v_addressing as u32 & 0xF) << 12),
        }
    }

    pub fn filter_mode(&self) -> u8 {
        (self.packed & 0xFF) as u8
    }

    pub fn u_addressing(&self) -> u8 {
        ((self.packed >> 8) & 0xF) as u8
    }

    pub fn v_addressing(&self) -> u8 {
        ((self.packed >> 12) & 0xF) as u8
    }
}

/// Prefix shared by every RenderWare native texture struct
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NativeTextureCommon {
    pub platform: u32,
    pub format_info: TextureFormatInfo,
    pub name: [u8; 32],
    pub mask_name: [u8; 32],
}

impl NativeTextureCommon {
    pub fn new(platform: u32, format_info: TextureFormatInfo, name: &str, mask_name: &str) -> Self {
        Self {
            platform,
            format_info,
            name: name_to_bytes(name),
            mask_name: name_to_bytes(mask_name),
        }
    }

    pub fn name(&self) -> String {
        name_from_bytes(&self.name)
    }

    pub fn mask_name(&self) -> String {
        name_from_bytes(&self.mask_name)
    }
}

crate::structure_size_tests!(TextureFormatInfo = 4, NativeTextureCommon = 72);
