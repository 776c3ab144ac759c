use binrw::binrw;
use enumn::N;

use crate::{common::NativeTextureCommon, versions::LibraryVersion};

pub const GC_NO_PALETTE: u8 = 0xFF;

/// Texel formats understood by the GX texture unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u8)]
pub enum GxFormat {
    I4 = 0,
    I8 = 1,
    IA4 = 2,
    IA8 = 3,
    RGB565 = 4,
    RGB5A3 = 5,
    RGBA8 = 6,
    C4 = 8,
    C8 = 9,
    C14X2 = 10,
    CMPR = 14,
}

impl GxFormat {
    pub fn bpp(&self) -> u32 {
        match self {
            Self::I4 | Self::C4 | Self::CMPR => 4,
            Self::I8 | Self::IA4 | Self::C8 => 8,
            Self::IA8 | Self::RGB565 | Self::RGB5A3 | Self::C14X2 => 16,
            Self::RGBA8 => 32,
        }
    }

    /// Pixel dimensions of one 32-byte tile (64 bytes for RGBA8, split into two clusters)
    pub fn tile_size(&self) -> (u32, u32) {
        match self {
            Self::I4 | Self::C4 | Self::CMPR => (8, 8),
            Self::I8 | Self::IA4 | Self::C8 => (8, 4),
            Self::IA8 | Self::RGB565 | Self::RGB5A3 | Self::RGBA8 | Self::C14X2 => (4, 4),
        }
    }

    /// Number of 32-byte clusters that make up a tile
    pub fn clusters_per_tile(&self) -> u32 {
        match self {
            Self::RGBA8 => 2,
            _ => 1,
        }
    }

    pub fn is_palette(&self) -> bool {
        matches!(self, Self::C4 | Self::C8 | Self::C14X2)
    }

    pub fn is_luminance(&self) -> bool {
        matches!(self, Self::I4 | Self::I8 | Self::IA4 | Self::IA8)
    }
}

/// Color formats of a GX palette (TLUT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u8)]
pub enum GxPaletteFormat {
    IA8 = 0,
    RGB565 = 1,
    RGB5A3 = 2,
}

/// Native texture struct layout, which changed twice across library versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcHeaderLayout {
    /// Up to 3.3.0.0
    V1,
    /// 3.3.0.1 and 3.3.0.2
    V2,
    /// Newer than 3.3.0.2, the only layout that may carry luminance data
    V3,
}

impl GcHeaderLayout {
    pub fn for_version(version: LibraryVersion) -> Self {
        if version <= LibraryVersion::new(3, 3, 0, 0) {
            Self::V1
        } else if version <= LibraryVersion::new(3, 3, 0, 2) {
            Self::V2
        } else {
            Self::V3
        }
    }

    pub fn supports_luminance(&self) -> bool {
        *self == Self::V3
    }

    pub fn header_size(&self) -> usize {
        match self {
            Self::V1 => 88,
            Self::V2 => 92,
            Self::V3 => 96,
        }
    }
}

#[binrw]
#[brw(import(layout: GcHeaderLayout))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcHeaderExtension {
    #[br(pre_assert(layout == GcHeaderLayout::V1))]
    V1 { pad: u16 },

    #[br(pre_assert(layout == GcHeaderLayout::V2))]
    V2 {
        auto_mipmaps: u8,
        pad: u8,
        raster_flags: u32,
    },

    #[br(pre_assert(layout == GcHeaderLayout::V3))]
    V3 {
        auto_mipmaps: u8,
        pad: u8,
        raster_flags: u32,
        /// May be smaller than the full palette size
        palette_entries: u16,
        pad2: u16,
    },
}

impl GcHeaderExtension {
    pub fn layout(&self) -> GcHeaderLayout {
        match self {
            Self::V1 { .. } => GcHeaderLayout::V1,
            Self::V2 { .. } => GcHeaderLayout::V2,
            Self::V3 { .. } => GcHeaderLayout::V3,
        }
    }

    pub fn auto_mipmaps(&self) -> bool {
        match self {
            Self::V1 { .. } => false,
            Self::V2 { auto_mipmaps, .. } | Self::V3 { auto_mipmaps, .. } => *auto_mipmaps != 0,
        }
    }

    pub fn raster_flags(&self) -> Option<u32> {
        match self {
            Self::V1 { .. } => None,
            Self::V2 { raster_flags, .. } | Self::V3 { raster_flags, .. } => Some(*raster_flags),
        }
    }

    pub fn palette_entries(&self) -> Option<u16> {
        match self {
            Self::V3 {
                palette_entries, ..
            } => Some(*palette_entries),
            _ => None,
        }
    }
}

/// GameCube native texture struct (platform 6), always big endian
#[binrw]
#[brw(big, import(layout: GcHeaderLayout))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcHeader {
    pub common: NativeTextureCommon,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub mipmap_count: u8,
    pub raster_type: u8,
    /// A [`GxFormat`] code
    pub internal_format: u8,
    /// A [`GxPaletteFormat`] code or [`GC_NO_PALETTE`]
    pub palette_format: u8,
    pub has_alpha: u8,

    #[brw(args(layout))]
    pub extension: GcHeaderExtension,

    pub image_data_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinReaderExt, BinWrite, Endian};
    use std::io::Cursor;

    fn header(extension: GcHeaderExtension) -> GcHeader {
        GcHeader {
            common: NativeTextureCommon::default(),
            width: 32,
            height: 16,
            depth: 4,
            mipmap_count: 1,
            raster_type: 4,
            internal_format: GxFormat::C4 as u8,
            palette_format: GxPaletteFormat::RGB5A3 as u8,
            has_alpha: 1,
            extension,
            image_data_size: 256,
        }
    }

    #[test]
    fn layouts_have_documented_sizes() {
        let extensions = [
            GcHeaderExtension::V1 { pad: 0 },
            GcHeaderExtension::V2 {
                auto_mipmaps: 1,
                pad: 0,
                raster_flags: 0x4500,
            },
            GcHeaderExtension::V3 {
                auto_mipmaps: 0,
                pad: 0,
                raster_flags: 0x4500,
                palette_entries: 12,
                pad2: 0,
            },
        ];

        for extension in extensions {
            let layout = extension.layout();
            let h = header(extension);
            let mut cursor = Cursor::new(Vec::new());
            h.write_options(&mut cursor, Endian::Big, (layout,)).unwrap();
            let bytes = cursor.into_inner();
            assert_eq!(bytes.len(), layout.header_size());
            // width is big endian
            assert_eq!(&bytes[72..74], &[0, 32]);

            let read: GcHeader = Cursor::new(bytes).read_be_args((layout,)).unwrap();
            assert_eq!(read, h);
        }
    }

    #[test]
    fn layout_selection_by_version() {
        assert_eq!(
            GcHeaderLayout::for_version(LibraryVersion::new(3, 3, 0, 0)),
            GcHeaderLayout::V1
        );
        assert_eq!(
            GcHeaderLayout::for_version(LibraryVersion::new(3, 3, 0, 2)),
            GcHeaderLayout::V2
        );
        assert_eq!(
            GcHeaderLayout::for_version(LibraryVersion::new(3, 3, 0, 3)),
            GcHeaderLayout::V3
        );
        assert!(!GcHeaderLayout::V2.supports_luminance());
    }

    #[test]
    fn tile_geometry() {
        assert_eq!(GxFormat::RGBA8.tile_size(), (4, 4));
        assert_eq!(GxFormat::RGBA8.clusters_per_tile(), 2);
        assert_eq!(GxFormat::C4.tile_size(), (8, 8));
        // every tile is 32 bytes per cluster
        for fmt in [GxFormat::I4, GxFormat::I8, GxFormat::IA8, GxFormat::RGBA8, GxFormat::CMPR] {
            let (w, h) = fmt.tile_size();
            assert_eq!(w * h * fmt.bpp() / 8, 32 * fmt.clusters_per_tile());
        }
    }
}
