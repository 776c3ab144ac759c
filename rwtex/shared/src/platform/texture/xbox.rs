use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    raster::{ColorOrder, CompressionType, PaletteType, RasterFlags, RasterFormat},
    structural,
    versions::PLATFORM_XBOX,
    xbox::{XboxCompression, XboxHeader},
};

use super::{acquire_pixels, d3d, platform_of, read_level, AdapterContext, NativeFormat, NativeFormatKind, TextureInfo};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, MipmapChain, SizeRules};
use crate::pixel::{
    geometry::{surface_data_size, surface_dimensions},
    RasterDescriptor,
};
use crate::platform::swizzle::{swizzle_surface, unswizzle_surface, PackedTile};
use crate::textures::{Acquisition, ImportReport, MipmapLayer, PaletteData, PixelData, PixelLayer};
use crate::warnings::LEVEL_MINOR;

fn size_rules() -> SizeRules {
    SizeRules {
        power_of_two: true,
        maximum: Some(4096),
        ..Default::default()
    }
}

fn descriptor(header: &XboxHeader) -> Result<RasterDescriptor> {
    if header.dxt_compression != 0 {
        let compression = XboxCompression::n(header.dxt_compression)
            .ok_or_else(|| structural!("unknown XBOX compression 0x{:x}", header.dxt_compression))?;
        return Ok(RasterDescriptor::compressed(compression.to_generic()));
    }

    let desc = d3d::descriptor_from_flags(header.raster_flags, header.depth, CompressionType::None)?;
    Ok(desc.with_order(ColorOrder::Bgra).with_alignment(1))
}

/// XBOX stores BGRA texels and 8-bit palettes only
fn import_target(src: &RasterDescriptor) -> RasterDescriptor {
    if src.is_compressed() && src.compression.is_dxt() {
        return RasterDescriptor::compressed(src.compression);
    }
    if src.is_palette() {
        let entry_format = match src.raster_format {
            RasterFormat::Raster888 => RasterFormat::Raster888,
            _ => RasterFormat::Raster8888,
        };
        return RasterDescriptor::palette(entry_format, ColorOrder::Bgra, PaletteType::Pal8, 8, 1);
    }
    let mut target = d3d::import_target(src, false).with_alignment(1);
    if !target.raster_format.is_luminance() {
        target.color_order = ColorOrder::Bgra;
    }
    target
}

#[derive(Debug, Clone, PartialEq)]
pub struct XboxTexture {
    pub header: XboxHeader,
    pub format: RasterDescriptor,
    /// BGRA8888 entries
    pub palette: Option<Vec<u8>>,
    /// Swizzled unless block compressed
    pub levels: Vec<MipmapLayer>,
}

impl XboxTexture {
    fn is_swizzled(&self) -> bool {
        !self.format.is_compressed()
    }
}

impl NativeFormat for XboxTexture {
    const KIND: NativeFormatKind = NativeFormatKind::Xbox;

    fn is_recognized(prefix: &[u8]) -> bool {
        platform_of(prefix) == Some(PLATFORM_XBOX)
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let header: XboxHeader = reader.read_type(Endian::Little)?;
        if header.common.platform != PLATFORM_XBOX {
            return Err(structural!("platform {} is not XBOX", header.common.platform));
        }

        let format = descriptor(&header)?;
        let (width, height) = (header.width as u32, header.height as u32);
        if !format.is_compressed() && !(width.is_power_of_two() && height.is_power_of_two()) {
            return Err(structural!("swizzled XBOX raster of {}x{}", width, height));
        }

        let count = resolve_level_count(header.mipmap_count as usize, width, height, &mut ctx.warnings);
        let palette = d3d::read_palette(reader, &format)?;

        let mut levels = Vec::with_capacity(count);
        let mut total = 0;
        for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
            let (sw, sh) = surface_dimensions(w, h, format.compression);
            let size = surface_data_size(&format, sw, sh);
            total += size;
            if total > header.image_data_size as usize {
                return Err(structural!(
                    "level {} ends past the declared image data size of {}",
                    i,
                    header.image_data_size
                ));
            }
            levels.push(MipmapLayer {
                width: sw,
                height: sh,
                layer_width: w,
                layer_height: h,
                texels: read_level(reader, size, i)?,
            });
        }

        let unused = header.image_data_size as usize - total;
        if unused > 0 {
            ctx.warnings
                .push_secure(LEVEL_MINOR, format!("{} unused bytes after the XBOX levels", unused));
            reader.seek(SeekFrom::Current(unused as i64))?;
        }

        Ok(Self {
            header,
            format,
            palette,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, _ctx: &mut AdapterContext) -> Result<()> {
        let mut header = self.header.clone();
        header.mipmap_count = self.levels.len() as u8;
        header.image_data_size = self.levels.iter().map(|l| l.texels.len() as u32).sum();
        header.write_le(writer)?;
        d3d::write_palette(writer, &self.format, self.palette.as_deref())?;
        for level in &self.levels {
            writer.write_all(&level.texels)?;
        }
        Ok(())
    }

    fn export_pixels(&self, _ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let mut pixels = PixelData::new(self.format);
        pixels.palette = self
            .palette
            .as_deref()
            .map(|p| PaletteData::borrowed(p, self.format.palette_type.max_entries()));

        for level in &self.levels {
            let texels = if self.is_swizzled() {
                Cow::Owned(unswizzle_surface(
                    &level.texels,
                    level.width,
                    level.height,
                    self.format.depth,
                    PackedTile::XFirst,
                )?)
            } else {
                Cow::Borrowed(level.texels.as_slice())
            };
            pixels.mipmaps.push(PixelLayer::new(
                level.width,
                level.height,
                level.layer_width,
                level.layer_height,
                texels,
            ));
        }

        pixels.has_alpha = self.header.has_alpha != 0;
        pixels.auto_mipmaps = self.header.raster_flags.contains(RasterFlags::AUTOMIPMAP);
        pixels.raster_type = self.header.raster_type;
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let target = import_target(&pixels.format);
        let (pixels, mut report) = acquire_pixels(pixels, &target, &size_rules(), ctx, Self::KIND)?;
        let format = pixels.format;
        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));

        let mut levels = Vec::with_capacity(pixels.mipmaps.len());
        for layer in pixels.mipmaps {
            let mut level = MipmapLayer::from(layer);
            if !format.is_compressed() {
                level.texels = swizzle_surface(&level.texels, level.width, level.height, format.depth, PackedTile::XFirst)?;
                report.texels = Acquisition::Converted;
            }
            levels.push(level);
        }

        let header = XboxHeader {
            common: TextureInfo::default().to_common(PLATFORM_XBOX),
            raster_flags: d3d::compose_flags(&format, pixels.has_alpha, levels.len(), pixels.auto_mipmaps),
            has_alpha: pixels.has_alpha as u32,
            width: width as u16,
            height: height as u16,
            depth: d3d::header_depth(&format),
            mipmap_count: levels.len() as u8,
            raster_type: pixels.raster_type,
            dxt_compression: XboxCompression::from_generic(format.compression)
                .map(|c| c as u8)
                .unwrap_or(0),
            image_data_size: levels.iter().map(|l| l.texels.len() as u32).sum(),
        };

        let palette = pixels.palette.map(|p| {
            let mut data = p.data.into_owned();
            data.resize(d3d::palette_bytes(&format), 0);
            data
        });

        Ok((
            Self {
                header,
                format,
                palette,
                levels,
            },
            report,
        ))
    }

    fn texture_info(&self) -> Option<TextureInfo> {
        Some(TextureInfo::from_common(&self.header.common))
    }

    fn set_texture_info(&mut self, info: &TextureInfo) {
        self.header.common = info.to_common(PLATFORM_XBOX);
    }

    fn base_dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::platform::handlers::FormatHandlerTable;
    use rwtex_native::versions::LibraryVersion;
    use std::io::Cursor;

    fn context_parts() -> (EngineConfig, FormatHandlerTable) {
        (EngineConfig::default(), FormatHandlerTable::new())
    }

    #[test]
    fn swizzled_roundtrip() {
        let (config, handlers) = context_parts();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let linear: Vec<u8> = (0..64).collect();
        let bgra = RasterDescriptor::raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra, 1);
        let pixels = PixelData::with_base_level(bgra, 4, 4, Cow::Owned(linear.clone()));

        let (texture, report) = XboxTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Converted);
        assert_ne!(texture.levels[0].texels, linear);
        // texel (0, 1) lands right after (1, 0)
        assert_eq!(&texture.levels[0].texels[8..12], &linear[16..20]);

        let mut out = Cursor::new(vec![]);
        texture.serialize(&mut out, &mut ctx).unwrap();
        let data = out.into_inner();
        assert_eq!(data.len(), 92 + 64);

        let read = XboxTexture::deserialize(&mut Cursor::new(&data), &mut ctx).unwrap();
        let exported = read.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.mipmaps[0].texels.as_ref(), linear.as_slice());
    }

    #[test]
    fn npot_is_rejected() {
        let (config, handlers) = context_parts();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let pixels = PixelData::with_base_level(RasterDescriptor::rgba8888(), 3, 3, Cow::Owned(vec![0; 36]));
        let err = XboxTexture::import_pixels(pixels, &mut ctx).unwrap_err();
        assert_eq!(err.kind(), rwtex_native::ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn dxt_is_not_swizzled() {
        let (config, handlers) = context_parts();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let blocks: Vec<u8> = (0..8).collect();
        let pixels = PixelData::with_base_level(
            RasterDescriptor::compressed(CompressionType::Dxt1),
            4,
            4,
            Cow::Owned(blocks.clone()),
        );
        let (texture, report) = XboxTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Direct);
        assert_eq!(texture.header.dxt_compression, 0x0C);
        assert_eq!(texture.levels[0].texels, blocks);
        assert!(texture.export_pixels(&mut ctx).unwrap().is_borrowed());
    }
}
