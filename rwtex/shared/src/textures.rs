use std::borrow::Cow;

use image::RgbaImage;
use rwtex_native::raster::RASTER_TYPE_TEXTURE;

use crate::error::{Result, TextureError};
use crate::pixel::{
    color::ColorDispatcher,
    compress,
    geometry::{self, surface_dimensions},
    RasterDescriptor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteData<'a> {
    pub data: Cow<'a, [u8]>,
    pub entries: usize,
}

impl<'a> PaletteData<'a> {
    pub fn owned(data: Vec<u8>, entries: usize) -> Self {
        Self {
            data: Cow::Owned(data),
            entries,
        }
    }

    pub fn borrowed(data: &'a [u8], entries: usize) -> Self {
        Self {
            data: Cow::Borrowed(data),
            entries,
        }
    }

    pub fn reborrow(&self) -> PaletteData<'_> {
        PaletteData::borrowed(&self.data, self.entries)
    }

    pub fn into_owned(self) -> PaletteData<'static> {
        PaletteData::owned(self.data.into_owned(), self.entries)
    }
}

/// One mipmap level. `width`/`height` are the stored surface, the layer size
/// is the visible image, which may be smaller for block compressed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelLayer<'a> {
    pub width: u32,
    pub height: u32,
    pub layer_width: u32,
    pub layer_height: u32,
    pub texels: Cow<'a, [u8]>,
}

impl<'a> PixelLayer<'a> {
    pub fn new(width: u32, height: u32, layer_width: u32, layer_height: u32, texels: Cow<'a, [u8]>) -> Self {
        Self {
            width,
            height,
            layer_width,
            layer_height,
            texels,
        }
    }

    pub fn reborrow(&self) -> PixelLayer<'_> {
        PixelLayer::new(
            self.width,
            self.height,
            self.layer_width,
            self.layer_height,
            Cow::Borrowed(&self.texels),
        )
    }

    pub fn into_owned(self) -> PixelLayer<'static> {
        PixelLayer {
            width: self.width,
            height: self.height,
            layer_width: self.layer_width,
            layer_height: self.layer_height,
            texels: Cow::Owned(self.texels.into_owned()),
        }
    }
}

/// Level storage owned by the native containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipmapLayer {
    pub width: u32,
    pub height: u32,
    pub layer_width: u32,
    pub layer_height: u32,
    pub texels: Vec<u8>,
}

impl MipmapLayer {
    pub fn as_pixel_layer(&self) -> PixelLayer<'_> {
        PixelLayer::new(
            self.width,
            self.height,
            self.layer_width,
            self.layer_height,
            Cow::Borrowed(&self.texels),
        )
    }
}

impl From<PixelLayer<'_>> for MipmapLayer {
    fn from(layer: PixelLayer<'_>) -> Self {
        Self {
            width: layer.width,
            height: layer.height,
            layer_width: layer.layer_width,
            layer_height: layer.layer_height,
            texels: layer.texels.into_owned(),
        }
    }
}

/// How an import got hold of a piece of pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller's buffer was moved in unchanged
    Direct,
    /// A new buffer was produced by conversion
    Converted,
    /// Nothing of this kind was involved
    Absent,
}

impl Acquisition {
    /// Whether the caller's original buffers were consumed without copy
    pub fn is_direct(&self) -> bool {
        *self == Self::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub texels: Acquisition,
    pub palette: Acquisition,
}

impl ImportReport {
    pub fn is_fully_direct(&self) -> bool {
        self.texels.is_direct() && self.palette != Acquisition::Converted
    }
}

/// Framework-neutral pixel data exchanged with the native texture adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData<'a> {
    pub format: RasterDescriptor,
    pub palette: Option<PaletteData<'a>>,
    /// Face-major for cube textures
    pub mipmaps: Vec<PixelLayer<'a>>,
    pub has_alpha: bool,
    pub auto_mipmaps: bool,
    pub cube_texture: bool,
    pub raster_type: u8,
}

impl<'a> PixelData<'a> {
    pub fn new(format: RasterDescriptor) -> Self {
        Self {
            format,
            palette: None,
            mipmaps: vec![],
            has_alpha: false,
            auto_mipmaps: false,
            cube_texture: false,
            raster_type: RASTER_TYPE_TEXTURE,
        }
    }

    /// Builds a single level texture with surface dimensions derived from the format
    pub fn with_base_level(format: RasterDescriptor, width: u32, height: u32, texels: Cow<'a, [u8]>) -> Self {
        let (sw, sh) = surface_dimensions(width, height, format.compression);
        let mut pixels = Self::new(format);
        pixels.mipmaps.push(PixelLayer::new(sw, sh, width, height, texels));
        pixels
    }

    pub fn face_count(&self) -> usize {
        if self.cube_texture {
            6
        } else {
            1
        }
    }

    pub fn levels_per_face(&self) -> usize {
        self.mipmaps.len() / self.face_count()
    }

    pub fn base_dimensions(&self) -> Option<(u32, u32)> {
        self.mipmaps.first().map(|l| (l.layer_width, l.layer_height))
    }

    pub fn reborrow(&self) -> PixelData<'_> {
        PixelData {
            format: self.format,
            palette: self.palette.as_ref().map(|p| p.reborrow()),
            mipmaps: self.mipmaps.iter().map(|l| l.reborrow()).collect(),
            has_alpha: self.has_alpha,
            auto_mipmaps: self.auto_mipmaps,
            cube_texture: self.cube_texture,
            raster_type: self.raster_type,
        }
    }

    pub fn into_owned(self) -> PixelData<'static> {
        PixelData {
            format: self.format,
            palette: self.palette.map(|p| p.into_owned()),
            mipmaps: self.mipmaps.into_iter().map(|l| l.into_owned()).collect(),
            has_alpha: self.has_alpha,
            auto_mipmaps: self.auto_mipmaps,
            cube_texture: self.cube_texture,
            raster_type: self.raster_type,
        }
    }

    /// Whether every level borrows from somewhere else
    pub fn is_borrowed(&self) -> bool {
        self.mipmaps
            .iter()
            .all(|l| matches!(l.texels, Cow::Borrowed(_)))
    }

    /// Checks that the data is self-consistent before it is handed to an adapter
    pub fn validate(&self) -> Result<()> {
        if let Some(problem) = self.format.shape_error() {
            return Err(TextureError::InvalidConfiguration(problem));
        }

        if self.mipmaps.is_empty() {
            return Err(TextureError::InvalidConfiguration(
                "pixel data without mipmap levels".to_string(),
            ));
        }

        if self.mipmaps.len() % self.face_count() != 0 {
            return Err(TextureError::InvalidConfiguration(format!(
                "{} levels cannot be split across {} faces",
                self.mipmaps.len(),
                self.face_count()
            )));
        }

        match (&self.palette, self.format.is_palette()) {
            (None, true) => {
                return Err(TextureError::InvalidConfiguration(
                    "palette raster without palette".to_string(),
                ))
            }
            (Some(_), false) => {
                return Err(TextureError::InvalidConfiguration(
                    "palette supplied for a non-palette raster".to_string(),
                ))
            }
            (Some(palette), true) => {
                let max = self.format.palette_type.max_entries();
                if palette.entries == 0 || palette.entries > max {
                    return Err(TextureError::InvalidConfiguration(format!(
                        "{} palette entries for a {:?} raster",
                        palette.entries, self.format.palette_type
                    )));
                }
                let needed = geometry::palette_data_size(&self.format, palette.entries);
                if palette.data.len() < needed {
                    return Err(TextureError::InvalidConfiguration(format!(
                        "palette holds {} bytes, {} entries need {}",
                        palette.data.len(),
                        palette.entries,
                        needed
                    )));
                }
            }
            (None, false) => {}
        }

        for (i, level) in self.mipmaps.iter().enumerate() {
            if level.layer_width == 0 || level.layer_height == 0 {
                return Err(TextureError::InvalidConfiguration(format!(
                    "level {} has zero dimensions",
                    i
                )));
            }
            if level.width < level.layer_width || level.height < level.layer_height {
                return Err(TextureError::InvalidConfiguration(format!(
                    "level {} surface {}x{} is smaller than its layer {}x{}",
                    i, level.width, level.height, level.layer_width, level.layer_height
                )));
            }
            let needed = geometry::surface_data_size(&self.format, level.width, level.height);
            if level.texels.len() < needed {
                return Err(TextureError::InvalidConfiguration(format!(
                    "level {} holds {} bytes but needs {}",
                    i,
                    level.texels.len(),
                    needed
                )));
            }
        }

        Ok(())
    }

    /// Decodes one level into an RGBA image of the layer size
    pub fn to_rgba_image(&self, level: usize) -> Result<RgbaImage> {
        let layer = self.mipmaps.get(level).ok_or_else(|| {
            TextureError::InvalidConfiguration(format!("no mipmap level {}", level))
        })?;

        let mut out = vec![0u8; layer.layer_width as usize * layer.layer_height as usize * 4];

        if self.format.is_compressed() {
            let rgba = compress::decompress_surface(
                &layer.texels,
                self.format.compression,
                layer.width,
                layer.height,
            )?;
            let src_stride = layer.width as usize * 4;
            let dst_stride = layer.layer_width as usize * 4;
            for y in 0..layer.layer_height as usize {
                out[y * dst_stride..(y + 1) * dst_stride]
                    .copy_from_slice(&rgba[y * src_stride..y * src_stride + dst_stride]);
            }
        } else {
            let palette = self.palette.as_ref();
            let dispatch = ColorDispatcher::new(
                &self.format,
                palette.map(|p| p.data.as_ref()),
                palette.map(|p| p.entries).unwrap_or(0),
            )?;
            let row_size = geometry::row_size(layer.width, self.format.depth, self.format.row_alignment);
            for y in 0..layer.layer_height {
                let start = row_size * y as usize;
                let row = layer.texels.get(start..start + row_size).unwrap_or(&[]);
                for x in 0..layer.layer_width {
                    let c = dispatch.get_rgba(row, x);
                    let o = (y as usize * layer.layer_width as usize + x as usize) * 4;
                    out[o..o + 4].copy_from_slice(bytemuck::bytes_of(&c));
                }
            }
        }

        RgbaImage::from_raw(layer.layer_width, layer.layer_height, out)
            .ok_or_else(|| TextureError::Internal("RGBA image buffer size mismatch".to_string()))
    }
}
