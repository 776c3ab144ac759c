pub mod color;
pub mod compress;
pub mod geometry;
pub mod masks;
pub mod palette;
pub mod transcode;

use rwtex_native::raster::{ColorOrder, CompressionType, PaletteType, RasterFormat};

/// Full description of how the texels of one surface are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterDescriptor {
    pub raster_format: RasterFormat,
    /// Bits per texel; the index width for palette rasters
    pub depth: u32,
    /// Byte boundary every row is padded to
    pub row_alignment: u32,
    pub color_order: ColorOrder,
    pub palette_type: PaletteType,
    pub compression: CompressionType,
}

impl RasterDescriptor {
    pub const fn raw(
        raster_format: RasterFormat,
        depth: u32,
        color_order: ColorOrder,
        row_alignment: u32,
    ) -> Self {
        Self {
            raster_format,
            depth,
            row_alignment,
            color_order,
            palette_type: PaletteType::None,
            compression: CompressionType::None,
        }
    }

    /// `entry_format`/`color_order` describe the palette entries, `depth` the index width
    pub const fn palette(
        entry_format: RasterFormat,
        color_order: ColorOrder,
        palette_type: PaletteType,
        depth: u32,
        row_alignment: u32,
    ) -> Self {
        Self {
            raster_format: entry_format,
            depth,
            row_alignment,
            color_order,
            palette_type,
            compression: CompressionType::None,
        }
    }

    pub const fn compressed(compression: CompressionType) -> Self {
        Self {
            raster_format: RasterFormat::Default,
            depth: match compression {
                CompressionType::Pvrtc2 => 2,
                CompressionType::Dxt1 | CompressionType::Etc1 | CompressionType::Pvrtc4 => 4,
                _ => 8,
            },
            row_alignment: 1,
            color_order: ColorOrder::Rgba,
            palette_type: PaletteType::None,
            compression,
        }
    }

    /// Byte-ordered RGBA, the universal conversion intermediate
    pub const fn rgba8888() -> Self {
        Self::raw(RasterFormat::Raster8888, 32, ColorOrder::Rgba, 1)
    }

    pub fn is_compressed(&self) -> bool {
        self.compression.is_compressed()
    }

    pub fn is_palette(&self) -> bool {
        self.palette_type.is_palette()
    }

    /// Storage width of one palette entry
    pub fn palette_entry_depth(&self) -> u32 {
        match self.raster_format {
            // palette entries are DWORD sized even without alpha
            RasterFormat::Raster888 => 32,
            other => other.natural_depth(),
        }
    }

    pub fn palette_entry_descriptor(&self) -> Self {
        Self::raw(
            self.raster_format,
            self.palette_entry_depth(),
            self.color_order,
            1,
        )
    }

    pub fn with_alignment(mut self, row_alignment: u32) -> Self {
        self.row_alignment = row_alignment;
        self
    }

    pub fn with_order(mut self, color_order: ColorOrder) -> Self {
        self.color_order = color_order;
        self
    }

    /// Reports why the descriptor does not describe a single, consistent data shape
    pub fn shape_error(&self) -> Option<String> {
        if self.compression.is_compressed() {
            if self.palette_type.is_palette() {
                return Some(format!(
                    "{:?} compression cannot be combined with a {:?} palette",
                    self.compression, self.palette_type
                ));
            }
            return None;
        }

        if self.row_alignment == 0 {
            return Some("row alignment must be at least 1".to_string());
        }

        match self.palette_type {
            PaletteType::None => {
                if !self.raster_format.accepts_depth(self.depth) {
                    return Some(format!(
                        "depth {} does not match raster format {:?}",
                        self.depth, self.raster_format
                    ));
                }
            }
            PaletteType::Pal4 | PaletteType::Pal4Lsb => {
                if self.depth != 4 && self.depth != 8 {
                    return Some(format!("4-bit palette with depth {}", self.depth));
                }
            }
            PaletteType::Pal8 => {
                if self.depth != 8 {
                    return Some(format!("8-bit palette with depth {}", self.depth));
                }
            }
        }

        if self.palette_type.is_palette()
            && (self.raster_format.is_luminance() || self.raster_format == RasterFormat::Default)
        {
            return Some(format!(
                "palette entries cannot use raster format {:?}",
                self.raster_format
            ));
        }

        None
    }
}
