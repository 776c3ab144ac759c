use std::borrow::Cow;
use std::io::{Read, Seek, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    d3d::D3d8Header,
    raster::{CompressionType, RasterFlags},
    structural,
    versions::PLATFORM_D3D8,
};

use super::{
    acquire_pixels, d3d, platform_of, AdapterContext, NativeFormat, NativeFormatKind, TextureInfo,
};
use crate::error::Result;
use crate::mipmap::resolve_level_count;
use crate::pixel::RasterDescriptor;
use crate::textures::{ImportReport, MipmapLayer, PaletteData, PixelData};
use crate::warnings::LEVEL_MINOR;

#[derive(Debug, Clone, PartialEq)]
pub struct D3d8Texture {
    pub header: D3d8Header,
    pub format: RasterDescriptor,
    /// Full 16 or 256 entries of RGBA8888
    pub palette: Option<Vec<u8>>,
    pub levels: Vec<MipmapLayer>,
}

impl NativeFormat for D3d8Texture {
    const KIND: NativeFormatKind = NativeFormatKind::Direct3D8;

    fn is_recognized(prefix: &[u8]) -> bool {
        platform_of(prefix) == Some(PLATFORM_D3D8)
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let header: D3d8Header = reader.read_type(Endian::Little)?;
        if header.common.platform != PLATFORM_D3D8 {
            return Err(structural!(
                "platform {} is not Direct3D 8",
                header.common.platform
            ));
        }

        let compression = match header.dxt_compression {
            0 => CompressionType::None,
            n => CompressionType::from_dxt_number(n)
                .ok_or_else(|| structural!("unknown DXT compression {}", n))?,
        };
        let format = d3d::descriptor_from_flags(header.raster_flags, header.depth, compression)?;

        let (width, height) = (header.width as u32, header.height as u32);
        let count = resolve_level_count(header.mipmap_count as usize, width, height, &mut ctx.warnings);
        if count > 1 && !header.raster_flags.contains(RasterFlags::MIPMAP) {
            ctx.warnings.push(LEVEL_MINOR, "mipmap levels present without the mipmap raster flag");
        }

        let palette = d3d::read_palette(reader, &format)?;
        let levels = d3d::read_sized_levels(reader, width, height, count, Some(&format))?;

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
        header.write_le(writer)?;
        d3d::write_palette(writer, &self.format, self.palette.as_deref())?;
        d3d::write_sized_levels(writer, &self.levels)
    }

    fn export_pixels(&self, _ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let mut pixels = PixelData::new(self.format);
        pixels.palette = self
            .palette
            .as_deref()
            .map(|p| PaletteData::borrowed(p, self.format.palette_type.max_entries()));
        pixels.mipmaps = self.levels.iter().map(|l| l.as_pixel_layer()).collect();
        pixels.has_alpha = self.header.has_alpha != 0;
        pixels.auto_mipmaps = self.header.raster_flags.contains(RasterFlags::AUTOMIPMAP);
        pixels.raster_type = self.header.raster_type;
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let target = d3d::import_target(&pixels.format, false);
        let (pixels, report) = acquire_pixels(pixels, &target, &d3d::size_rules(), ctx, Self::KIND)?;

        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));
        let levels: Vec<MipmapLayer> = pixels.mipmaps.into_iter().map(MipmapLayer::from).collect();
        let format = pixels.format;

        let header = D3d8Header {
            common: TextureInfo::default().to_common(PLATFORM_D3D8),
            raster_flags: d3d::compose_flags(&format, pixels.has_alpha, levels.len(), pixels.auto_mipmaps),
            has_alpha: pixels.has_alpha as u32,
            width: width as u16,
            height: height as u16,
            depth: d3d::header_depth(&format),
            mipmap_count: levels.len() as u8,
            raster_type: pixels.raster_type,
            dxt_compression: format.compression.dxt_number().unwrap_or(0),
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
        self.header.common = info.to_common(PLATFORM_D3D8);
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
    use crate::textures::Acquisition;
    use rwtex_native::raster::{ColorOrder, PaletteType, RasterFormat};
    use rwtex_native::versions::LibraryVersion;
    use std::io::Cursor;

    fn a1r5g5b5_3x3() -> Vec<u8> {
        let mut data = vec![];
        let header = D3d8Header {
            common: TextureInfo {
                name: "tex".to_string(),
                ..Default::default()
            }
            .to_common(PLATFORM_D3D8),
            raster_flags: RasterFlags::compose(RasterFormat::Raster1555, PaletteType::None, false, false),
            has_alpha: 1,
            width: 3,
            height: 3,
            depth: 16,
            mipmap_count: 1,
            raster_type: 4,
            dxt_compression: 0,
        };
        let mut cursor = Cursor::new(&mut data);
        header.write_le(&mut cursor).unwrap();
        data.extend_from_slice(&24u32.to_le_bytes());
        for _ in 0..3 {
            // opaque red, green, blue and two padding bytes
            for t in [0xFC00u16, 0x83E0, 0x801F, 0] {
                data.extend_from_slice(&t.to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn read_export_roundtrip() {
        let config = EngineConfig::default();
        let handlers = FormatHandlerTable::new();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());

        let data = a1r5g5b5_3x3();
        let texture = D3d8Texture::deserialize(&mut Cursor::new(&data), &mut ctx).unwrap();
        assert_eq!(texture.levels[0].texels.len(), 24);
        assert_eq!(texture.texture_info().unwrap().name, "tex");

        let pixels = texture.export_pixels(&mut ctx).unwrap();
        assert!(pixels.is_borrowed());
        assert_eq!(
            pixels.format,
            RasterDescriptor::raw(RasterFormat::Raster1555, 16, ColorOrder::Bgra, 4)
        );
        let image = pixels.to_rgba_image(0).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(2, 2).0, [0, 0, 255, 255]);

        let (imported, report) = D3d8Texture::import_pixels(pixels.into_owned(), &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Direct);
        assert_eq!(report.palette, Acquisition::Absent);
        assert_eq!(imported.levels, texture.levels);

        let mut out = Cursor::new(vec![]);
        texture.serialize(&mut out, &mut ctx).unwrap();
        assert_eq!(out.into_inner(), data);
    }

    #[test]
    fn bad_level_size_is_structural() {
        let mut data = a1r5g5b5_3x3();
        data[88] = 18;
        let config = EngineConfig::default();
        let handlers = FormatHandlerTable::new();
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let err = D3d8Texture::deserialize(&mut Cursor::new(&data), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), rwtex_native::ErrorKind::Structural);
    }
}
