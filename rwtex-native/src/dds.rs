use binrw::binrw;
use bitflags::bitflags;

pub const DDS_MAGIC: [u8; 4] = *b"DDS ";
pub const DDS_HEADER_SIZE: u32 = 124;
pub const DDS_PIXEL_FORMAT_SIZE: u32 = 32;

pub const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

pub const FOURCC_DXT1: u32 = four_cc(b"DXT1");
pub const FOURCC_DXT2: u32 = four_cc(b"DXT2");
pub const FOURCC_DXT3: u32 = four_cc(b"DXT3");
pub const FOURCC_DXT4: u32 = four_cc(b"DXT4");
pub const FOURCC_DXT5: u32 = four_cc(b"DXT5");
pub const FOURCC_ATI1: u32 = four_cc(b"ATI1");
pub const FOURCC_ATI2: u32 = four_cc(b"ATI2");
pub const FOURCC_BC4U: u32 = four_cc(b"BC4U");
pub const FOURCC_BC5U: u32 = four_cc(b"BC5U");
pub const FOURCC_YUY2: u32 = four_cc(b"YUY2");
pub const FOURCC_UYVY: u32 = four_cc(b"UYVY");
pub const FOURCC_ETC1: u32 = four_cc(b"ETC1");

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DdsFlags: u32 {
        const CAPS = 0x1;
        const HEIGHT = 0x2;
        const WIDTH = 0x4;
        const PITCH = 0x8;
        const PIXELFORMAT = 0x1000;
        const MIPMAPCOUNT = 0x20000;
        const LINEARSIZE = 0x80000;
        const DEPTH = 0x800000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DdsPixelFormatFlags: u32 {
        const ALPHAPIXELS = 0x1;
        const ALPHA = 0x2;
        const FOURCC = 0x4;
        const PALETTEINDEXED4 = 0x8;
        const PALETTEINDEXED8 = 0x20;
        const RGB = 0x40;
        const YUV = 0x200;
        const LUMINANCE = 0x20000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DdsCaps: u32 {
        const COMPLEX = 0x8;
        const TEXTURE = 0x1000;
        const MIPMAP = 0x400000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DdsCaps2: u32 {
        const CUBEMAP = 0x200;
        const CUBEMAP_ALLFACES = 0xFC00;
        const VOLUME = 0x200000;
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsPixelFormat {
    #[br(assert(size == DDS_PIXEL_FORMAT_SIZE, "Invalid DDS pixel format size {}", size))]
    pub size: u32,

    #[br(map = |v: u32| DdsPixelFormatFlags::from_bits_retain(v))]
    #[bw(map = |f: &DdsPixelFormatFlags| f.bits())]
    pub flags: DdsPixelFormatFlags,

    pub four_cc: u32,
    pub rgb_bit_count: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub alpha_mask: u32,
}

impl Default for DdsPixelFormat {
    fn default() -> Self {
        Self {
            size: DDS_PIXEL_FORMAT_SIZE,
            flags: DdsPixelFormatFlags::empty(),
            four_cc: 0,
            rgb_bit_count: 0,
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
            alpha_mask: 0,
        }
    }
}

/// `DDS_HEADER` including the leading magic
#[binrw]
#[brw(little, magic = b"DDS ")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsHeader {
    #[br(assert(size == DDS_HEADER_SIZE, "Invalid DDS header size {}", size))]
    pub size: u32,

    #[br(map = |v: u32| DdsFlags::from_bits_retain(v))]
    #[bw(map = |f: &DdsFlags| f.bits())]
    pub flags: DdsFlags,

    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,

    #[br(map = |v: u32| DdsCaps::from_bits_retain(v))]
    #[bw(map = |f: &DdsCaps| f.bits())]
    pub caps: DdsCaps,

    #[br(map = |v: u32| DdsCaps2::from_bits_retain(v))]
    #[bw(map = |f: &DdsCaps2| f.bits())]
    pub caps2: DdsCaps2,

    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl Default for DdsHeader {
    fn default() -> Self {
        Self {
            size: DDS_HEADER_SIZE,
            flags: DdsFlags::empty(),
            height: 0,
            width: 0,
            pitch_or_linear_size: 0,
            depth: 0,
            mipmap_count: 0,
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat::default(),
            caps: DdsCaps::empty(),
            caps2: DdsCaps2::empty(),
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }
}

crate::structure_size_tests!(DdsPixelFormat = 32, DdsHeader = 128);

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinReaderExt, BinWrite};
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let mut header = DdsHeader::default();
        header.width = 64;
        header.height = 32;
        header.flags = DdsFlags::CAPS | DdsFlags::PIXELFORMAT | DdsFlags::LINEARSIZE;
        header.pixel_format.flags = DdsPixelFormatFlags::FOURCC;
        header.pixel_format.four_cc = FOURCC_DXT1;

        let mut cursor = Cursor::new(Vec::new());
        header.write_le(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[0..4], b"DDS ");
        assert_eq!(&bytes[84..88], b"DXT1");

        let read: DdsHeader = Cursor::new(bytes).read_le().unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn rejects_bad_header_size() {
        let mut header = DdsHeader::default();
        header.size = 100;
        let mut cursor = Cursor::new(Vec::new());
        header.write_le(&mut cursor).unwrap();
        cursor.set_position(0);
        assert!(cursor.read_le::<DdsHeader>().is_err());
    }
}
