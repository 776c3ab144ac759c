use binrw::{binrw, Endian};
use bitflags::bitflags;
use enumn::N;

pub const PVR_HEADER_SIZE_V1: u32 = 44;
pub const PVR_HEADER_SIZE_V2: u32 = 52;
/// `'PVR!'`
pub const PVR_MAGIC: u32 = 0x2152_5650;

/// Legacy PowerVR pixel types (bits 0..8 of the flags word)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u8)]
pub enum PvrPixelType {
    Argb4444 = 0x00,
    Argb1555 = 0x01,
    Rgb565 = 0x02,
    Rgb555 = 0x03,
    Rgb888 = 0x04,
    Argb8888 = 0x05,
    Argb8332 = 0x06,
    I8 = 0x07,
    Ai88 = 0x08,
    Monochrome = 0x09,
    Vy1uy0 = 0x0A,
    Y1vy0u = 0x0B,
    Pvrtc2 = 0x0C,
    Pvrtc4 = 0x0D,

    OglRgba4444 = 0x10,
    OglRgba5551 = 0x11,
    OglRgba8888 = 0x12,
    OglRgb565 = 0x13,
    OglRgb555 = 0x14,
    OglRgb888 = 0x15,
    OglI8 = 0x16,
    OglAi88 = 0x17,
    OglPvrtc2 = 0x18,
    OglPvrtc4 = 0x19,
    OglBgra8888 = 0x1A,
    OglA8 = 0x1B,

    D3dDxt1 = 0x20,
    D3dDxt2 = 0x21,
    D3dDxt3 = 0x22,
    D3dDxt4 = 0x23,
    D3dDxt5 = 0x24,

    EtcRgb4bpp = 0x36,
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PvrFlags: u32 {
        const PIXEL_TYPE_MASK = 0xFF;
        const MIPMAP = 0x100;
        const TWIDDLE = 0x200;
        const BUMPMAP = 0x400;
        const TILING = 0x800;
        const CUBEMAP = 0x1000;
        const FALSE_MIPCOL = 0x2000;
        const VOLUME = 0x4000;
        const ALPHA = 0x8000;
        const VERTICAL_FLIP = 0x10000;
    }
}

#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PvrHeaderV2Ext {
    #[br(assert(magic == PVR_MAGIC, "Invalid PVR magic 0x{:x}", magic))]
    pub magic: u32,
    pub num_surfaces: u32,
}

/// Legacy (pre-v3) PVR file header, 44 or 52 bytes in either byte order
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PvrHeader {
    #[br(assert(header_size == PVR_HEADER_SIZE_V1 || header_size == PVR_HEADER_SIZE_V2, "Invalid PVR header size {}", header_size))]
    pub header_size: u32,
    pub height: u32,
    pub width: u32,
    /// Excludes the base level
    pub mipmap_count: u32,

    #[br(map = |v: u32| PvrFlags::from_bits_retain(v))]
    #[bw(map = |f: &PvrFlags| f.bits())]
    pub flags: PvrFlags,

    pub data_size: u32,
    pub bit_count: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub alpha_mask: u32,

    #[br(if(header_size == PVR_HEADER_SIZE_V2))]
    pub v2: Option<PvrHeaderV2Ext>,
}

impl PvrHeader {
    pub fn raw_pixel_type(&self) -> u8 {
        (self.flags.bits() & PvrFlags::PIXEL_TYPE_MASK.bits()) as u8
    }

    pub fn pixel_type(&self) -> Option<PvrPixelType> {
        PvrPixelType::n(self.raw_pixel_type())
    }

    pub fn set_pixel_type(&mut self, pixel_type: u8) {
        self.flags = (self.flags - PvrFlags::PIXEL_TYPE_MASK)
            | PvrFlags::from_bits_retain(pixel_type as u32);
    }
}

/// Detects the header variant and byte order from the first four bytes.
///
/// The size field is tested as both little and big endian against the two known sizes.
pub fn detect_header_endian(prefix: &[u8]) -> Option<(Endian, u32)> {
    let bytes: [u8; 4] = prefix.get(0..4)?.try_into().ok()?;
    let is_known = |v: u32| v == PVR_HEADER_SIZE_V1 || v == PVR_HEADER_SIZE_V2;

    let le = u32::from_le_bytes(bytes);
    if is_known(le) {
        return Some((Endian::Little, le));
    }

    let be = u32::from_be_bytes(bytes);
    if is_known(be) {
        return Some((Endian::Big, be));
    }

    None
}

crate::structure_size_tests!(PvrHeaderV2Ext = 8);
