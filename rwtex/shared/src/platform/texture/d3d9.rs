use std::borrow::Cow;
use std::io::{Read, Seek, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    d3d::{D3d9Header, D3d9TextureFlags, D3dFormat},
    raster::{ColorOrder, CompressionType, PaletteType, RasterFlags, RasterFormat},
    structural,
    versions::PLATFORM_D3D9,
};

use super::{
    acquire_pixels, d3d, platform_of, AdapterContext, NativeFormat, NativeFormatKind, TextureInfo,
};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, validate_chain};
use crate::pixel::{geometry, RasterDescriptor};
use crate::textures::{Acquisition, ImportReport, MipmapLayer, PaletteData, PixelData, PixelLayer};
use crate::warnings::{LEVEL_MINOR, LEVEL_NORMAL};

/// Storage of a Direct3D 9 raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum D3d9Storage {
    Generic(RasterDescriptor),
    /// A format only an extension handler understands
    Extension { d3d_format: u32, depth: u32 },
}

const fn raw(format: RasterFormat, depth: u32, order: ColorOrder) -> RasterDescriptor {
    RasterDescriptor::raw(format, depth, order, d3d::D3D_ROW_ALIGNMENT)
}

/// Built-in mapping of `D3DFORMAT` values to generic layouts
pub fn descriptor_for(format: D3dFormat) -> Option<RasterDescriptor> {
    use ColorOrder::*;
    use RasterFormat::*;
    Some(match format {
        D3dFormat::A8R8G8B8 => raw(Raster8888, 32, Bgra),
        D3dFormat::X8R8G8B8 => raw(Raster888, 32, Bgra),
        D3dFormat::R8G8B8 => raw(Raster888, 24, Bgra),
        D3dFormat::R5G6B5 => raw(Raster565, 16, Bgra),
        D3dFormat::X1R5G5B5 => raw(Raster555, 16, Bgra),
        D3dFormat::A1R5G5B5 => raw(Raster1555, 16, Bgra),
        D3dFormat::A4R4G4B4 => raw(Raster4444, 16, Bgra),
        D3dFormat::A8B8G8R8 => raw(Raster8888, 32, Rgba),
        D3dFormat::X8B8G8R8 => raw(Raster888, 32, Rgba),
        D3dFormat::L8 => raw(Lum, 8, Rgba),
        D3dFormat::A8L8 => raw(LumAlpha, 16, Rgba),
        D3dFormat::D16 | D3dFormat::D16Lockable => raw(Depth16, 16, Rgba),
        D3dFormat::D24X8 => raw(Depth24, 32, Rgba),
        D3dFormat::D32 => raw(Depth32, 32, Rgba),
        D3dFormat::Dxt1 => RasterDescriptor::compressed(CompressionType::Dxt1),
        D3dFormat::Dxt2 => RasterDescriptor::compressed(CompressionType::Dxt2),
        D3dFormat::Dxt3 => RasterDescriptor::compressed(CompressionType::Dxt3),
        D3dFormat::Dxt4 => RasterDescriptor::compressed(CompressionType::Dxt4),
        D3dFormat::Dxt5 => RasterDescriptor::compressed(CompressionType::Dxt5),
        _ => return None,
    })
}

/// Inverse of [`descriptor_for`] for the layouts `d3d::import_target` produces
pub fn format_for(desc: &RasterDescriptor) -> Option<D3dFormat> {
    if desc.is_palette() {
        return Some(D3dFormat::P8);
    }
    if desc.is_compressed() {
        return match desc.compression {
            CompressionType::Dxt1 => Some(D3dFormat::Dxt1),
            CompressionType::Dxt2 => Some(D3dFormat::Dxt2),
            CompressionType::Dxt3 => Some(D3dFormat::Dxt3),
            CompressionType::Dxt4 => Some(D3dFormat::Dxt4),
            CompressionType::Dxt5 => Some(D3dFormat::Dxt5),
            _ => None,
        };
    }
    use ColorOrder::*;
    use RasterFormat::*;
    Some(match (desc.raster_format, desc.depth, desc.color_order) {
        (Raster8888, 32, Bgra) => D3dFormat::A8R8G8B8,
        (Raster888, 32, Bgra) => D3dFormat::X8R8G8B8,
        (Raster888, 24, Bgra) => D3dFormat::R8G8B8,
        (Raster565, 16, Bgra) => D3dFormat::R5G6B5,
        (Raster555, 16, Bgra) => D3dFormat::X1R5G5B5,
        (Raster1555, 16, Bgra) => D3dFormat::A1R5G5B5,
        (Raster4444, 16, Bgra) => D3dFormat::A4R4G4B4,
        (Raster8888, 32, Rgba) => D3dFormat::A8B8G8R8,
        (Raster888, 32, Rgba) => D3dFormat::X8B8G8R8,
        (Lum, 8, _) => D3dFormat::L8,
        (LumAlpha, 16, _) => D3dFormat::A8L8,
        (Depth16, 16, _) => D3dFormat::D16,
        (Depth24, 32, _) => D3dFormat::D24X8,
        (Depth32, 32, _) => D3dFormat::D32,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct D3d9Texture {
    pub header: D3d9Header,
    pub storage: D3d9Storage,
    pub palette: Option<Vec<u8>>,
    /// Face-major when the cube texture flag is set
    pub levels: Vec<MipmapLayer>,
}

impl D3d9Texture {
    pub fn is_cube_texture(&self) -> bool {
        self.header.flags.contains(D3d9TextureFlags::CUBE_TEXTURE)
    }

    fn generic_storage(header: &D3d9Header) -> Result<Option<RasterDescriptor>> {
        let Some(format) = D3dFormat::n(header.d3d_format) else {
            return Ok(None);
        };

        if format == D3dFormat::P8 {
            // the flags tell the entry format and index width
            let desc = d3d::descriptor_from_flags(header.raster_flags, header.depth, CompressionType::None)?;
            if !desc.is_palette() {
                return Err(structural!("P8 raster without palette flags"));
            }
            return Ok(Some(desc));
        }

        Ok(descriptor_for(format))
    }

    fn export_extension(&self, d3d_format: u32, ctx: &mut AdapterContext) -> Result<PixelData<'static>> {
        let handler = ctx.handlers.get(d3d_format).ok_or_else(|| {
            structural!("no handler is registered for Direct3D format 0x{:x}", d3d_format)
        })?;

        let mut pixels = PixelData::new(RasterDescriptor::rgba8888());
        for level in &self.levels {
            let mut rgba = vec![0u8; level.width as usize * level.height as usize * 4];
            handler.convert_to_rw(&level.texels, level.width, level.height, &mut rgba)?;
            pixels.mipmaps.push(PixelLayer::new(
                level.width,
                level.height,
                level.layer_width,
                level.layer_height,
                Cow::Owned(rgba),
            ));
        }
        Ok(pixels)
    }
}

impl NativeFormat for D3d9Texture {
    const KIND: NativeFormatKind = NativeFormatKind::Direct3D9;

    fn is_recognized(prefix: &[u8]) -> bool {
        platform_of(prefix) == Some(PLATFORM_D3D9)
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let header: D3d9Header = reader.read_type(Endian::Little)?;
        if header.common.platform != PLATFORM_D3D9 {
            return Err(structural!(
                "platform {} is not Direct3D 9",
                header.common.platform
            ));
        }

        let storage = match Self::generic_storage(&header)? {
            Some(desc) => D3d9Storage::Generic(desc),
            None => {
                if ctx.handlers.get(header.d3d_format).is_none() {
                    ctx.warnings.push(
                        LEVEL_NORMAL,
                        format!(
                            "Direct3D format 0x{:x} has no handler, its texels are kept as stored",
                            header.d3d_format
                        ),
                    );
                }
                D3d9Storage::Extension {
                    d3d_format: header.d3d_format,
                    depth: header.depth as u32,
                }
            }
        };

        if let D3d9Storage::Generic(desc) = &storage {
            let compressed = header.flags.contains(D3d9TextureFlags::COMPRESSED);
            if compressed != desc.is_compressed() {
                ctx.warnings.push(LEVEL_MINOR, "compressed flag does not match the Direct3D format");
            }
        }

        let (width, height) = (header.width as u32, header.height as u32);
        let count = resolve_level_count(header.mipmap_count as usize, width, height, &mut ctx.warnings);
        if count > 1 && !header.raster_flags.contains(RasterFlags::MIPMAP) {
            ctx.warnings.push(LEVEL_MINOR, "mipmap levels present without the mipmap raster flag");
        }

        let (desc, palette) = match &storage {
            D3d9Storage::Generic(desc) => (Some(desc), d3d::read_palette(reader, desc)?),
            D3d9Storage::Extension { .. } => (None, None),
        };

        let faces = if header.flags.contains(D3d9TextureFlags::CUBE_TEXTURE) {
            6
        } else {
            1
        };
        let mut levels = Vec::with_capacity(count * faces);
        for _ in 0..faces {
            levels.extend(d3d::read_sized_levels(reader, width, height, count, desc)?);
        }

        Ok(Self {
            header,
            storage,
            palette,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, _ctx: &mut AdapterContext) -> Result<()> {
        let faces = if self.is_cube_texture() { 6 } else { 1 };
        let mut header = self.header.clone();
        header.mipmap_count = (self.levels.len() / faces) as u8;
        header.write_le(writer)?;
        if let D3d9Storage::Generic(desc) = &self.storage {
            d3d::write_palette(writer, desc, self.palette.as_deref())?;
        }
        d3d::write_sized_levels(writer, &self.levels)
    }

    fn export_pixels(&self, ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let mut pixels = match self.storage {
            D3d9Storage::Generic(desc) => {
                let mut pixels = PixelData::new(desc);
                pixels.palette = self
                    .palette
                    .as_deref()
                    .map(|p| PaletteData::borrowed(p, desc.palette_type.max_entries()));
                pixels.mipmaps = self.levels.iter().map(|l| l.as_pixel_layer()).collect();
                pixels
            }
            D3d9Storage::Extension { d3d_format, .. } => self.export_extension(d3d_format, ctx)?,
        };
        pixels.has_alpha = self.header.flags.contains(D3d9TextureFlags::HAS_ALPHA);
        pixels.auto_mipmaps = self.header.raster_flags.contains(RasterFlags::AUTOMIPMAP)
            || self.header.flags.contains(D3d9TextureFlags::AUTO_MIPMAPS);
        pixels.cube_texture = self.is_cube_texture();
        pixels.raster_type = self.header.raster_type;
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let target = d3d::import_target(&pixels.format, true);
        let (pixels, report) = acquire_pixels(pixels, &target, &d3d::size_rules(), ctx, Self::KIND)?;

        let format = pixels.format;
        let d3d_format = format_for(&format)
            .ok_or_else(|| structural!("no Direct3D format stores {:?}", format))?;

        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));
        let per_face = pixels.levels_per_face();

        let mut flags = D3d9TextureFlags::empty();
        flags.set(D3d9TextureFlags::HAS_ALPHA, pixels.has_alpha);
        flags.set(D3d9TextureFlags::CUBE_TEXTURE, pixels.cube_texture);
        flags.set(D3d9TextureFlags::AUTO_MIPMAPS, pixels.auto_mipmaps);
        flags.set(D3d9TextureFlags::COMPRESSED, format.is_compressed());

        let header = D3d9Header {
            common: TextureInfo::default().to_common(PLATFORM_D3D9),
            raster_flags: d3d::compose_flags(&format, pixels.has_alpha, per_face, pixels.auto_mipmaps),
            d3d_format: d3d_format as u32,
            width: width as u16,
            height: height as u16,
            depth: d3d::header_depth(&format),
            mipmap_count: per_face as u8,
            raster_type: pixels.raster_type,
            flags,
        };

        let palette = pixels.palette.map(|p| {
            let mut data = p.data.into_owned();
            data.resize(d3d::palette_bytes(&format), 0);
            data
        });

        Ok((
            Self {
                header,
                storage: D3d9Storage::Generic(format),
                palette,
                levels: pixels.mipmaps.into_iter().map(MipmapLayer::from).collect(),
            },
            report,
        ))
    }

    fn texture_info(&self) -> Option<TextureInfo> {
        Some(TextureInfo::from_common(&self.header.common))
    }

    fn set_texture_info(&mut self, info: &TextureInfo) {
        self.header.common = info.to_common(PLATFORM_D3D9);
    }

    fn base_dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }
}

/// Stores RGBA pixels in a handler-provided Direct3D format
pub fn import_with_handler(
    pixels: PixelData<'_>,
    d3d_format: u32,
    ctx: &mut AdapterContext,
) -> Result<(D3d9Texture, ImportReport)> {
    pixels.validate()?;
    validate_chain(&pixels, &d3d::size_rules())?;
    let handler = ctx.handlers.get(d3d_format).ok_or_else(|| {
        rwtex_native::invalid_config!("no handler is registered for Direct3D format 0x{:x}", d3d_format)
    })?;
    let depth = handler.depth();

    let rgba = if pixels.format == RasterDescriptor::rgba8888() {
        pixels
    } else {
        crate::pixel::transcode::convert_pixel_data(&pixels, &RasterDescriptor::rgba8888(), ctx.config)?
    };

    let per_face = rgba.levels_per_face();
    let mut levels = vec![];
    for layer in &rgba.mipmaps {
        let row = geometry::row_size(layer.width, depth, d3d::D3D_ROW_ALIGNMENT);
        let mut texels = vec![0u8; geometry::data_size(row, layer.height)];
        handler.convert_from_rw(&layer.texels, layer.width, layer.height, &mut texels)?;
        levels.push(MipmapLayer {
            width: layer.width,
            height: layer.height,
            layer_width: layer.layer_width,
            layer_height: layer.layer_height,
            texels,
        });
    }

    let (width, height) = rgba.base_dimensions().unwrap_or((1, 1));
    let mut flags = D3d9TextureFlags::empty();
    flags.set(D3d9TextureFlags::HAS_ALPHA, rgba.has_alpha);
    flags.set(D3d9TextureFlags::CUBE_TEXTURE, rgba.cube_texture);
    flags.set(D3d9TextureFlags::AUTO_MIPMAPS, rgba.auto_mipmaps);

    let header = D3d9Header {
        common: TextureInfo::default().to_common(PLATFORM_D3D9),
        raster_flags: RasterFlags::compose(
            RasterFormat::Raster8888,
            PaletteType::None,
            per_face > 1,
            rgba.auto_mipmaps,
        ),
        d3d_format,
        width: width as u16,
        height: height as u16,
        depth: depth as u8,
        mipmap_count: per_face as u8,
        raster_type: rgba.raster_type,
        flags,
    };

    Ok((
        D3d9Texture {
            header,
            storage: D3d9Storage::Extension { d3d_format, depth },
            palette: None,
            levels,
        },
        ImportReport {
            texels: Acquisition::Converted,
            palette: Acquisition::Absent,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::platform::handlers::FormatHandlerTable;
    use rwtex_native::versions::LibraryVersion;
    use std::io::Cursor;

    #[test]
    fn format_mapping_is_symmetric() {
        for format in [
            D3dFormat::A8R8G8B8,
            D3dFormat::X8R8G8B8,
            D3dFormat::R5G6B5,
            D3dFormat::A1R5G5B5,
            D3dFormat::A8B8G8R8,
            D3dFormat::L8,
            D3dFormat::A8L8,
            D3dFormat::Dxt3,
        ] {
            let desc = descriptor_for(format).unwrap();
            assert_eq!(format_for(&desc), Some(format), "{:?}", format);
        }
        assert!(descriptor_for(D3dFormat::A4L4).is_none());
    }

    #[test]
    fn unknown_format_keeps_bytes() {
        let config = EngineConfig::default();
        let handlers = FormatHandlerTable::new();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());

        let header = D3d9Header {
            common: TextureInfo::default().to_common(PLATFORM_D3D9),
            raster_flags: RasterFlags::compose(RasterFormat::LumAlpha, PaletteType::None, false, false),
            d3d_format: D3dFormat::A4L4 as u32,
            width: 2,
            height: 1,
            depth: 8,
            mipmap_count: 1,
            raster_type: 4,
            flags: D3d9TextureFlags::HAS_ALPHA,
        };
        let mut data = Cursor::new(vec![]);
        header.write_le(&mut data).unwrap();
        let mut data = data.into_inner();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0x1F, 0xF1, 0, 0]);

        let texture = D3d9Texture::deserialize(&mut Cursor::new(&data), &mut ctx).unwrap();
        assert!(ctx.warnings.mentions("no handler"));
        assert!(texture.export_pixels(&mut ctx).is_err());

        let mut out = Cursor::new(vec![]);
        texture.serialize(&mut out, &mut ctx).unwrap();
        assert_eq!(out.into_inner(), data);
    }

    #[test]
    fn rgba_order_is_stored_natively() {
        let config = EngineConfig::default();
        let handlers = FormatHandlerTable::new();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let pixels = PixelData::with_base_level(
            RasterDescriptor::rgba8888(),
            2,
            2,
            Cow::Owned((0..16).collect()),
        );
        let (texture, report) = D3d9Texture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Direct);
        assert_eq!(texture.header.d3d_format, D3dFormat::A8B8G8R8 as u32);
    }
}
