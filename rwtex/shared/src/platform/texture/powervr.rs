use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    invalid_config,
    powervr::{PowerVrFormat, PowerVrHeader},
    structural,
    versions::PLATFORM_POWERVR,
};

use super::{acquire_pixels, platform_of, read_level, AdapterContext, NativeFormat, NativeFormatKind, TextureInfo};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, MipmapChain, SizeRules};
use crate::pixel::{
    geometry::{surface_data_size, surface_dimensions},
    RasterDescriptor,
};
use crate::textures::{ImportReport, MipmapLayer, PixelData, PixelLayer};
use crate::warnings::LEVEL_MINOR;

fn size_rules() -> SizeRules {
    SizeRules {
        power_of_two: true,
        square: true,
        maximum: Some(2048),
        ..Default::default()
    }
}

/// PVRTC levels as used by the PowerVR mobile TXDs
#[derive(Debug, Clone, PartialEq)]
pub struct PowerVrTexture {
    pub header: PowerVrHeader,
    pub format: PowerVrFormat,
    pub levels: Vec<MipmapLayer>,
}

impl PowerVrTexture {
    fn descriptor(&self) -> RasterDescriptor {
        RasterDescriptor::compressed(self.format.compression())
    }
}

impl NativeFormat for PowerVrTexture {
    const KIND: NativeFormatKind = NativeFormatKind::PowerVr;

    fn is_recognized(prefix: &[u8]) -> bool {
        platform_of(prefix) == Some(PLATFORM_POWERVR)
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let header: PowerVrHeader = reader.read_type(Endian::Little)?;
        if header.common.platform != PLATFORM_POWERVR {
            return Err(structural!("platform 0x{:x} is not PowerVR", header.common.platform));
        }

        let format = PowerVrFormat::n(header.internal_format)
            .ok_or_else(|| structural!("unknown PowerVR format 0x{:x}", header.internal_format))?;
        let (width, height) = (header.width as u32, header.height as u32);
        if let Err(problem) = size_rules().check(width, height) {
            return Err(structural!("PowerVR raster {}", problem));
        }
        if format.has_alpha() != (header.has_alpha != 0) {
            ctx.warnings.push(
                LEVEL_MINOR,
                format!("PowerVR alpha flag disagrees with format {:?}", format),
            );
        }

        let desc = RasterDescriptor::compressed(format.compression());
        let count = resolve_level_count(header.mipmap_count as usize, width, height, &mut ctx.warnings);

        let mut levels = Vec::with_capacity(count);
        let mut total = 0;
        for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
            let (sw, sh) = surface_dimensions(w, h, desc.compression);
            let size = surface_data_size(&desc, sw, sh);
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
                .push_secure(LEVEL_MINOR, format!("{} unused bytes after the PowerVR levels", unused));
            reader.seek(SeekFrom::Current(unused as i64))?;
        }

        Ok(Self {
            header,
            format,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, _ctx: &mut AdapterContext) -> Result<()> {
        let mut header = self.header.clone();
        header.mipmap_count = self.levels.len() as u8;
        header.image_data_size = self.levels.iter().map(|l| l.texels.len() as u32).sum();
        header.write_le(writer)?;
        for level in &self.levels {
            writer.write_all(&level.texels)?;
        }
        Ok(())
    }

    fn export_pixels(&self, _ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let mut pixels = PixelData::new(self.descriptor());
        for level in &self.levels {
            pixels.mipmaps.push(PixelLayer::new(
                level.width,
                level.height,
                level.layer_width,
                level.layer_height,
                Cow::Borrowed(level.texels.as_slice()),
            ));
        }
        pixels.has_alpha = self.header.has_alpha != 0;
        pixels.raster_type = self.header.raster_type;
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let format = PowerVrFormat::from_compression(pixels.format.compression, pixels.has_alpha).ok_or_else(|| {
            invalid_config!(
                "PowerVR textures only store PVRTC data, got {:?}",
                pixels.format.compression
            )
        })?;

        let target = RasterDescriptor::compressed(format.compression());
        let (pixels, report) = acquire_pixels(pixels, &target, &size_rules(), ctx, Self::KIND)?;
        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));
        let levels: Vec<MipmapLayer> = pixels.mipmaps.into_iter().map(MipmapLayer::from).collect();

        let header = PowerVrHeader {
            common: TextureInfo::default().to_common(PLATFORM_POWERVR),
            mipmap_count: levels.len() as u8,
            raster_type: pixels.raster_type,
            has_alpha: format.has_alpha() as u8,
            pad: 0,
            width: width as u16,
            height: height as u16,
            internal_format: format as u32,
            image_data_size: levels.iter().map(|l| l.texels.len() as u32).sum(),
        };

        Ok((
            Self {
                header,
                format,
                levels,
            },
            report,
        ))
    }

    fn texture_info(&self) -> Option<TextureInfo> {
        Some(TextureInfo::from_common(&self.header.common))
    }

    fn set_texture_info(&mut self, info: &TextureInfo) {
        self.header.common = info.to_common(PLATFORM_POWERVR);
    }

    fn base_dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }
}
