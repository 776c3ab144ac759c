use binrw::binrw;
use bitflags::bitflags;
use enumn::N;

use crate::{common::NativeTextureCommon, dds::four_cc, raster::RasterFlags};

/// The subset of `D3DFORMAT` that RenderWare textures use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u32)]
pub enum D3dFormat {
    R8G8B8 = 20,
    A8R8G8B8 = 21,
    X8R8G8B8 = 22,
    R5G6B5 = 23,
    X1R5G5B5 = 24,
    A1R5G5B5 = 25,
    A4R4G4B4 = 26,
    R3G3B2 = 27,
    A8 = 28,
    A8R3G3B2 = 29,
    X4R4G4B4 = 30,
    A2B10G10R10 = 31,
    A8B8G8R8 = 32,
    X8B8G8R8 = 33,
    G16R16 = 34,
    A2R10G10B10 = 35,
    A16B16G16R16 = 36,
    A8P8 = 40,
    P8 = 41,
    L8 = 50,
    A8L8 = 51,
    A4L4 = 52,
    V8U8 = 60,
    L6V5U5 = 61,
    X8L8V8U8 = 62,
    Q8W8V8U8 = 63,
    V16U16 = 64,
    A2W10V10U10 = 67,
    D16Lockable = 70,
    D32 = 71,
    D15S1 = 73,
    D24S8 = 75,
    D24X8 = 77,
    D24X4S4 = 79,
    D16 = 80,
    L16 = 81,
    Dxt1 = four_cc(b"DXT1"),
    Dxt2 = four_cc(b"DXT2"),
    Dxt3 = four_cc(b"DXT3"),
    Dxt4 = four_cc(b"DXT4"),
    Dxt5 = four_cc(b"DXT5"),
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct D3d9TextureFlags: u8 {
        const HAS_ALPHA = 0x1;
        const CUBE_TEXTURE = 0x2;
        const AUTO_MIPMAPS = 0x4;
        const COMPRESSED = 0x8;
    }
}

/// Direct3D 8 native texture struct (platform 8)
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct D3d8Header {
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
    /// 0 when uncompressed, otherwise `1..=5` for DXT1 to DXT5
    pub dxt_compression: u8,
}

/// Direct3D 9 native texture struct (platform 9)
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct D3d9Header {
    pub common: NativeTextureCommon,

    #[br(map = |v: u32| RasterFlags::from_bits_retain(v))]
    #[bw(map = |f: &RasterFlags| f.bits())]
    pub raster_flags: RasterFlags,

    /// A `D3DFORMAT` value or FourCC, possibly one unknown to us
    pub d3d_format: u32,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub mipmap_count: u8,
    pub raster_type: u8,

    #[br(map = |v: u8| D3d9TextureFlags::from_bits_retain(v))]
    #[bw(map = |f: &D3d9TextureFlags| f.bits())]
    pub flags: D3d9TextureFlags,
}

crate::structure_size_tests!(D3d8Header = 88, D3d9Header = 88);
