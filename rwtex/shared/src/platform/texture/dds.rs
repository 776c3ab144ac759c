use std::borrow::Cow;
use std::io::{Read, Seek, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    dds::*,
    raster::{ColorOrder, CompressionType, PaletteType, RasterFormat},
    internal, structural,
    util::{read_bytes, remaining_len},
};

use super::{acquire_pixels, read_level, AdapterContext, NativeFormat, NativeFormatKind};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, MipmapChain, SizeRules};
use crate::pixel::{
    compress::{decode_bc4, decode_bc5, decode_yuv422, YuvPacking},
    geometry::{aligned_dim, checked_row_size, checked_surface_data_size, row_size, surface_dimensions},
    masks::{decode_masked_surface, ChannelMasks},
    RasterDescriptor,
};
use crate::textures::{ImportReport, MipmapLayer, PaletteData, PixelData, PixelLayer};
use crate::warnings::{LEVEL_MINOR, LEVEL_NORMAL};

/// Pixel format kinds in the order they win when several flags are set
const TYPE_PRIORITY: [(DdsPixelFormatFlags, &str); 7] = [
    (DdsPixelFormatFlags::RGB, "RGB"),
    (DdsPixelFormatFlags::YUV, "YUV"),
    (DdsPixelFormatFlags::LUMINANCE, "LUMINANCE"),
    (DdsPixelFormatFlags::ALPHA, "ALPHA"),
    (DdsPixelFormatFlags::FOURCC, "FOURCC"),
    (DdsPixelFormatFlags::PALETTEINDEXED4, "PALETTEINDEXED4"),
    (DdsPixelFormatFlags::PALETTEINDEXED8, "PALETTEINDEXED8"),
];

fn compression_for_four_cc(four_cc: u32) -> Option<CompressionType> {
    Some(match four_cc {
        FOURCC_DXT1 => CompressionType::Dxt1,
        FOURCC_DXT2 => CompressionType::Dxt2,
        FOURCC_DXT3 => CompressionType::Dxt3,
        FOURCC_DXT4 => CompressionType::Dxt4,
        FOURCC_DXT5 => CompressionType::Dxt5,
        FOURCC_ETC1 => CompressionType::Etc1,
        _ => return None,
    })
}

fn four_cc_for_compression(compression: CompressionType) -> Option<u32> {
    Some(match compression {
        CompressionType::Dxt1 => FOURCC_DXT1,
        CompressionType::Dxt2 => FOURCC_DXT2,
        CompressionType::Dxt3 => FOURCC_DXT3,
        CompressionType::Dxt4 => FOURCC_DXT4,
        CompressionType::Dxt5 => FOURCC_DXT5,
        CompressionType::Etc1 => FOURCC_ETC1,
        _ => return None,
    })
}

fn four_cc_name(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|b| if b.is_ascii_graphic() { *b as char } else { '?' })
        .collect()
}

/// Data that has no generic counterpart and is decoded to RGBA8888
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdsDecoded {
    Bc4,
    Bc5,
    Yuv(YuvPacking),
    Masked {
        bit_count: u32,
        masks: ChannelMasks,
        luminance: bool,
    },
    /// FourCC without a built-in decoder, kept as stored and exported through
    /// a Direct3D format handler registered under the same code
    Extension { four_cc: u32, bit_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdsLayout {
    Generic(RasterDescriptor),
    Decoded(DdsDecoded),
}

impl DdsLayout {
    fn resolve(pf: &DdsPixelFormat, warnings: &mut crate::warnings::WarningLog) -> Result<Self> {
        let candidates: Vec<_> = TYPE_PRIORITY
            .iter()
            .filter(|(flag, _)| pf.flags.contains(*flag))
            .collect();
        let Some((_, kind)) = candidates.first() else {
            return Err(structural!("DDS pixel format names no data type"));
        };
        if candidates.len() > 1 {
            let names: Vec<&str> = candidates.iter().map(|(_, name)| *name).collect();
            warnings.push(
                LEVEL_NORMAL,
                format!("DDS pixel format has conflicting types {}, using {}", names.join(", "), names[0]),
            );
        }

        let alpha_mask = if pf.flags.intersects(DdsPixelFormatFlags::ALPHAPIXELS | DdsPixelFormatFlags::ALPHA) {
            pf.alpha_mask
        } else {
            0
        };
        let masks = ChannelMasks::new(pf.red_mask, pf.green_mask, pf.blue_mask, alpha_mask);
        let masked = |luminance: bool| -> Result<Self> {
            if !matches!(pf.rgb_bit_count, 8 | 16 | 24 | 32) {
                return Err(structural!("DDS raw texels of {} bits", pf.rgb_bit_count));
            }
            Ok(match masks.to_descriptor(pf.rgb_bit_count, luminance) {
                Some(desc) => Self::Generic(desc),
                None => Self::Decoded(DdsDecoded::Masked {
                    bit_count: pf.rgb_bit_count,
                    masks,
                    luminance,
                }),
            })
        };

        match *kind {
            "RGB" => masked(false),
            "LUMINANCE" => masked(true),
            "ALPHA" => {
                if !matches!(pf.rgb_bit_count, 8 | 16 | 32) {
                    return Err(structural!("DDS alpha texels of {} bits", pf.rgb_bit_count));
                }
                Ok(Self::Decoded(DdsDecoded::Masked {
                    bit_count: pf.rgb_bit_count,
                    masks: ChannelMasks::new(0, 0, 0, pf.alpha_mask),
                    luminance: false,
                }))
            }
            "YUV" => Ok(Self::Decoded(DdsDecoded::Yuv(YuvPacking::Yuy2))),
            "FOURCC" => {
                if let Some(compression) = compression_for_four_cc(pf.four_cc) {
                    return Ok(Self::Generic(RasterDescriptor::compressed(compression)));
                }
                Ok(Self::Decoded(match pf.four_cc {
                    FOURCC_ATI1 | FOURCC_BC4U => DdsDecoded::Bc4,
                    FOURCC_ATI2 | FOURCC_BC5U => DdsDecoded::Bc5,
                    FOURCC_YUY2 => DdsDecoded::Yuv(YuvPacking::Yuy2),
                    FOURCC_UYVY => DdsDecoded::Yuv(YuvPacking::Uyvy),
                    other => DdsDecoded::Extension {
                        four_cc: other,
                        // full 32-bit texels unless the header says otherwise
                        bit_count: if matches!(pf.rgb_bit_count, 8 | 16 | 24 | 32) {
                            pf.rgb_bit_count
                        } else {
                            32
                        },
                    },
                }))
            }
            "PALETTEINDEXED4" => Ok(Self::Generic(RasterDescriptor::palette(
                RasterFormat::Raster8888,
                ColorOrder::Rgba,
                PaletteType::Pal4Lsb,
                4,
                1,
            ))),
            _ => Ok(Self::Generic(RasterDescriptor::palette(
                RasterFormat::Raster8888,
                ColorOrder::Rgba,
                PaletteType::Pal8,
                8,
                1,
            ))),
        }
    }

    /// Block, 2x2 YUV and DXT data record a linear size, everything else a pitch
    fn uses_linear_size(&self) -> bool {
        match self {
            Self::Generic(desc) => desc.is_compressed(),
            Self::Decoded(DdsDecoded::Masked { .. }) => false,
            Self::Decoded(_) => true,
        }
    }

    /// `(surface width, surface height, bytes)` of one level
    fn level_geometry(&self, width: u32, height: u32) -> Result<(u32, u32, usize)> {
        let geometry = match self {
            Self::Generic(desc) => {
                let (sw, sh) = surface_dimensions(width, height, desc.compression);
                checked_surface_data_size(desc, sw, sh).map(|size| (sw, sh, size))
            }
            Self::Decoded(DdsDecoded::Bc4) | Self::Decoded(DdsDecoded::Bc5) => {
                let block = if *self == Self::Decoded(DdsDecoded::Bc4) { 8 } else { 16 };
                let blocks_x = (width.max(1) - 1) / 4 + 1;
                let blocks_y = (height.max(1) - 1) / 4 + 1;
                (blocks_x as usize)
                    .checked_mul(blocks_y as usize)
                    .and_then(|blocks| blocks.checked_mul(block))
                    .map(|size| (aligned_dim(width, 4), aligned_dim(height, 4), size))
            }
            Self::Decoded(DdsDecoded::Yuv(_)) => {
                let sw = aligned_dim(width, 2);
                (sw as usize)
                    .checked_mul(2)
                    .and_then(|row| row.checked_mul(height as usize))
                    .map(|size| (sw, height, size))
            }
            Self::Decoded(DdsDecoded::Masked { bit_count, .. })
            | Self::Decoded(DdsDecoded::Extension { bit_count, .. }) => checked_row_size(width, *bit_count, 1)
                .and_then(|row| row.checked_mul(height as usize))
                .map(|size| (width, height, size)),
        };
        geometry.ok_or_else(|| structural!("DDS level of {}x{} does not fit in memory", width, height))
    }

    /// The pitch or linear size value a base level of this size records
    fn pitch_or_linear_size(&self, width: u32, height: u32) -> Result<u32> {
        let value = if self.uses_linear_size() {
            self.level_geometry(width, height)?.2
        } else {
            match self {
                Self::Generic(desc) => row_size(width, desc.depth, 1),
                Self::Decoded(DdsDecoded::Masked { bit_count, .. }) => row_size(width, *bit_count, 1),
                Self::Decoded(_) => 0,
            }
        };
        Ok(value.min(u32::MAX as usize) as u32)
    }

    fn export_descriptor(&self) -> RasterDescriptor {
        match self {
            Self::Generic(desc) => *desc,
            Self::Decoded(_) => RasterDescriptor::rgba8888(),
        }
    }
}

/// Cuts the RGBA rows of a block aligned surface down to the layer
fn crop_rgba(rgba: Vec<u8>, surface_width: u32, width: u32, height: u32) -> Vec<u8> {
    if surface_width == width {
        let mut rgba = rgba;
        rgba.truncate(width as usize * height as usize * 4);
        return rgba;
    }
    rgba.chunks(surface_width as usize * 4)
        .take(height as usize)
        .flat_map(|row| row[..width as usize * 4].iter().copied())
        .collect()
}

/// Generic layout an import stores `src` as
fn import_target(src: &RasterDescriptor) -> RasterDescriptor {
    if src.is_compressed() {
        if four_cc_for_compression(src.compression).is_some() {
            return RasterDescriptor::compressed(src.compression);
        }
        return RasterDescriptor::rgba8888();
    }

    if src.is_palette() {
        return if src.palette_type == PaletteType::Pal8 {
            RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal8, 8, 1)
        } else {
            RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal4Lsb, 4, 1)
        };
    }

    let unpadded = src.with_alignment(1);
    if ChannelMasks::of(&unpadded).is_some() {
        return unpadded;
    }
    match src.raster_format {
        RasterFormat::Lum => RasterDescriptor::raw(RasterFormat::Lum, 8, src.color_order, 1),
        RasterFormat::LumAlpha => RasterDescriptor::raw(RasterFormat::LumAlpha, 16, src.color_order, 1),
        _ => RasterDescriptor::rgba8888(),
    }
}

fn pixel_format_for(desc: &RasterDescriptor) -> DdsPixelFormat {
    let mut pf = DdsPixelFormat::default();
    if let Some(code) = four_cc_for_compression(desc.compression) {
        pf.flags = DdsPixelFormatFlags::FOURCC;
        pf.four_cc = code;
        return pf;
    }
    if desc.is_palette() {
        pf.flags = if desc.palette_type.is_4bit() {
            DdsPixelFormatFlags::PALETTEINDEXED4
        } else {
            DdsPixelFormatFlags::PALETTEINDEXED8
        };
        pf.rgb_bit_count = desc.depth;
        return pf;
    }

    let masks = ChannelMasks::of(desc).unwrap_or_default();
    pf.flags = if desc.raster_format.is_luminance() {
        DdsPixelFormatFlags::LUMINANCE
    } else {
        DdsPixelFormatFlags::RGB
    };
    if masks.alpha != 0 {
        pf.flags |= DdsPixelFormatFlags::ALPHAPIXELS;
    }
    pf.rgb_bit_count = desc.depth;
    pf.red_mask = masks.red;
    pf.green_mask = masks.green;
    pf.blue_mask = masks.blue;
    pf.alpha_mask = masks.alpha;
    pf
}

/// A DirectDraw surface file
#[derive(Debug, Clone, PartialEq)]
pub struct DdsTexture {
    pub header: DdsHeader,
    pub layout: DdsLayout,
    /// RGBA8888 entries, 16 or 256 of them
    pub palette: Option<Vec<u8>>,
    pub levels: Vec<MipmapLayer>,
}

impl DdsTexture {
    fn has_alpha(&self) -> bool {
        match self.layout {
            DdsLayout::Generic(desc) if desc.is_compressed() => desc.compression != CompressionType::Dxt1,
            DdsLayout::Generic(desc) if desc.is_palette() => self
                .palette
                .as_ref()
                .map_or(false, |p| p.chunks_exact(4).any(|c| c[3] != 255)),
            DdsLayout::Generic(desc) => ChannelMasks::of(&desc).map_or(false, |m| m.alpha != 0),
            DdsLayout::Decoded(DdsDecoded::Masked { masks, .. }) => masks.alpha != 0,
            DdsLayout::Decoded(_) => false,
        }
    }

    fn export_level<'a>(&self, level: &'a MipmapLayer) -> Result<Cow<'a, [u8]>> {
        let (w, h) = (level.layer_width, level.layer_height);
        let DdsLayout::Decoded(decoded) = self.layout else {
            return Ok(Cow::Borrowed(level.texels.as_slice()));
        };
        Ok(Cow::Owned(match decoded {
            DdsDecoded::Bc4 => crop_rgba(decode_bc4(&level.texels, level.width, level.height)?, level.width, w, h),
            DdsDecoded::Bc5 => crop_rgba(decode_bc5(&level.texels, level.width, level.height)?, level.width, w, h),
            DdsDecoded::Yuv(packing) => decode_yuv422(&level.texels, w, h, packing)?,
            DdsDecoded::Masked {
                bit_count,
                masks,
                luminance,
            } => decode_masked_surface(&level.texels, w, h, 1, bit_count, &masks, luminance)?,
            DdsDecoded::Extension { four_cc, .. } => {
                return Err(internal!("DDS FourCC '{}' levels need a handler", four_cc_name(four_cc)))
            }
        }))
    }

    /// Routes stored levels through the handler registered for `four_cc`,
    /// padding rows to the DWORD alignment handlers expect
    fn export_extension(&self, four_cc: u32, bit_count: u32, ctx: &AdapterContext) -> Result<PixelData<'static>> {
        let handler = ctx
            .handlers
            .get(four_cc)
            .ok_or_else(|| structural!("no handler is registered for DDS FourCC '{}'", four_cc_name(four_cc)))?;
        if handler.depth() != bit_count {
            return Err(structural!(
                "handler for DDS FourCC '{}' uses {} bit texels, the file stores {}",
                four_cc_name(four_cc),
                handler.depth(),
                bit_count
            ));
        }

        let mut pixels = PixelData::new(RasterDescriptor::rgba8888());
        for level in &self.levels {
            let (w, h) = (level.width, level.height);
            let stored = row_size(w, bit_count, 1);
            let native_row = row_size(w, bit_count, 4);
            let mut native = vec![0u8; native_row * h as usize];
            for (dst, src) in native.chunks_exact_mut(native_row).zip(level.texels.chunks(stored.max(1))) {
                dst[..src.len()].copy_from_slice(src);
            }

            let mut rgba = vec![0u8; w as usize * h as usize * 4];
            handler.convert_to_rw(&native, w, h, &mut rgba)?;
            pixels.mipmaps.push(PixelLayer::new(w, h, w, h, Cow::Owned(rgba)));
        }
        pixels.has_alpha = pixels
            .mipmaps
            .first()
            .map_or(false, |level| level.texels.chunks_exact(4).any(|c| c[3] != 255));
        Ok(pixels)
    }
}

impl NativeFormat for DdsTexture {
    const KIND: NativeFormatKind = NativeFormatKind::Dds;

    fn is_recognized(prefix: &[u8]) -> bool {
        prefix.starts_with(&DDS_MAGIC)
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let header: DdsHeader = reader.read_type(Endian::Little)?;

        if header.caps2.intersects(DdsCaps2::CUBEMAP | DdsCaps2::VOLUME) || (header.flags.contains(DdsFlags::DEPTH) && header.depth > 1) {
            return Err(structural!("cube map and volume DDS files are not supported"));
        }

        let required = DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT;
        if !header.flags.contains(required) {
            ctx.warnings.push(
                LEVEL_MINOR,
                format!("DDS header lacks the required flags {:?}", required - header.flags),
            );
        }

        let mut layout = DdsLayout::resolve(&header.pixel_format, &mut ctx.warnings)?;
        if let DdsLayout::Decoded(DdsDecoded::Extension { four_cc, bit_count }) = &mut layout {
            match ctx.handlers.get(*four_cc) {
                Some(handler) => *bit_count = handler.depth(),
                None => ctx.warnings.push(
                    LEVEL_NORMAL,
                    format!(
                        "DDS FourCC '{}' has no handler, its {} bit texels are kept as stored",
                        four_cc_name(*four_cc),
                        bit_count
                    ),
                ),
            }
        }
        let (width, height) = (header.width, header.height);
        if width == 0 || height == 0 {
            return Err(structural!("DDS image of {}x{}", width, height));
        }

        let expected = layout.pitch_or_linear_size(width, height)?;
        let (flag, other, name) = if layout.uses_linear_size() {
            (DdsFlags::LINEARSIZE, DdsFlags::PITCH, "linear size")
        } else {
            (DdsFlags::PITCH, DdsFlags::LINEARSIZE, "pitch")
        };
        if header.flags.contains(other) || !header.flags.contains(flag) {
            ctx.warnings
                .push(LEVEL_MINOR, format!("DDS header should declare a {}", name));
        }
        if header.pitch_or_linear_size != 0 && header.pitch_or_linear_size != expected {
            ctx.warnings.push(
                LEVEL_MINOR,
                format!("DDS {} is {}, expected {}", name, header.pitch_or_linear_size, expected),
            );
        }

        let palette = match &layout {
            DdsLayout::Generic(desc) if desc.is_palette() => Some(
                read_bytes(reader, desc.palette_type.max_entries() * 4)
                    .map_err(|_| structural!("DDS palette is truncated"))?,
            ),
            _ => None,
        };

        let declared = if header.flags.contains(DdsFlags::MIPMAPCOUNT) {
            header.mipmap_count.max(1) as usize
        } else {
            1
        };
        let count = resolve_level_count(declared, width, height, &mut ctx.warnings);

        let mut levels = Vec::with_capacity(count);
        for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
            let (sw, sh, size) = layout.level_geometry(w, h)?;
            levels.push(MipmapLayer {
                width: sw,
                height: sh,
                layer_width: w,
                layer_height: h,
                texels: read_level(reader, size, i)?,
            });
        }

        let trailing = remaining_len(reader)?;
        if trailing > 0 {
            ctx.warnings
                .push_secure(LEVEL_MINOR, format!("{} bytes after the last DDS level", trailing));
        }

        Ok(Self {
            header,
            layout,
            palette,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, _ctx: &mut AdapterContext) -> Result<()> {
        self.header.write_le(writer)?;
        if let Some(palette) = &self.palette {
            writer.write_all(palette)?;
        }
        for level in &self.levels {
            writer.write_all(&level.texels)?;
        }
        Ok(())
    }

    fn export_pixels(&self, ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        if let DdsLayout::Decoded(DdsDecoded::Extension { four_cc, bit_count }) = self.layout {
            return self.export_extension(four_cc, bit_count, ctx);
        }

        let format = self.layout.export_descriptor();
        let mut pixels = PixelData::new(format);
        pixels.palette = self
            .palette
            .as_deref()
            .map(|p| PaletteData::borrowed(p, format.palette_type.max_entries()));

        for level in &self.levels {
            let (sw, sh) = match self.layout {
                DdsLayout::Generic(_) => (level.width, level.height),
                DdsLayout::Decoded(_) => (level.layer_width, level.layer_height),
            };
            pixels.mipmaps.push(PixelLayer::new(
                sw,
                sh,
                level.layer_width,
                level.layer_height,
                self.export_level(level)?,
            ));
        }
        pixels.has_alpha = self.has_alpha();
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let target = import_target(&pixels.format);
        let (pixels, report) = acquire_pixels(pixels, &target, &SizeRules::default(), ctx, Self::KIND)?;
        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));
        let layout = DdsLayout::Generic(target);

        let palette = pixels.palette.map(|p| {
            let mut data = p.data.into_owned();
            data.resize(target.palette_type.max_entries() * 4, 0);
            data
        });
        let levels: Vec<MipmapLayer> = pixels.mipmaps.into_iter().map(MipmapLayer::from).collect();

        let mut flags = DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT;
        flags |= if layout.uses_linear_size() {
            DdsFlags::LINEARSIZE
        } else {
            DdsFlags::PITCH
        };
        let mut caps = DdsCaps::TEXTURE;
        if levels.len() > 1 {
            flags |= DdsFlags::MIPMAPCOUNT;
            caps |= DdsCaps::COMPLEX | DdsCaps::MIPMAP;
        }

        let header = DdsHeader {
            flags,
            height,
            width,
            pitch_or_linear_size: layout.pitch_or_linear_size(width, height)?,
            mipmap_count: if levels.len() > 1 { levels.len() as u32 } else { 0 },
            pixel_format: pixel_format_for(&target),
            caps,
            ..Default::default()
        };

        Ok((
            Self {
                header,
                layout,
                palette,
                levels,
            },
            report,
        ))
    }

    fn base_dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::platform::handlers::{D3dFormatHandler, FormatHandlerTable};
    use crate::textures::Acquisition;
    use rwtex_native::{versions::LibraryVersion, ErrorKind};
    use std::io::Cursor;

    fn serialize(texture: &DdsTexture, ctx: &mut AdapterContext) -> Vec<u8> {
        let mut out = Cursor::new(vec![]);
        texture.serialize(&mut out, ctx).unwrap();
        out.into_inner()
    }

    #[test]
    fn dxt1_roundtrip_keeps_header() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let pixels = PixelData::with_base_level(
            RasterDescriptor::compressed(CompressionType::Dxt1),
            64,
            64,
            Cow::Owned(vec![0x5A; 2048]),
        );
        let (texture, report) = DdsTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Direct);
        assert!(texture.header.flags.contains(DdsFlags::LINEARSIZE));
        assert_eq!(texture.header.pitch_or_linear_size, 2048);

        let bytes = serialize(&texture, &mut ctx);
        assert_eq!(bytes.len(), 128 + 2048);
        assert!(DdsTexture::is_recognized(&bytes));

        let read = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert!(ctx.warnings.is_empty());
        assert_eq!(read.levels.len(), 1);
        assert_eq!(read.levels[0].texels.len(), 2048);
        assert_eq!(serialize(&read, &mut ctx), bytes);
    }

    #[test]
    fn raw_images_record_a_pitch() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let bgra = RasterDescriptor::raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra, 1);
        let pixels = PixelData::with_base_level(bgra, 17, 9, Cow::Owned(vec![0; 17 * 9 * 4]));
        let (texture, _) = DdsTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert!(texture.header.flags.contains(DdsFlags::PITCH));
        assert!(!texture.header.flags.contains(DdsFlags::LINEARSIZE));
        assert_eq!(texture.header.pitch_or_linear_size, 68);
        assert_eq!(texture.header.pixel_format.alpha_mask, 0xFF00_0000);
    }

    #[test]
    fn conflicting_types_prefer_rgb() {
        let mut warnings = crate::warnings::WarningLog::default();
        let pf = DdsPixelFormat {
            flags: DdsPixelFormatFlags::RGB | DdsPixelFormatFlags::LUMINANCE,
            rgb_bit_count: 16,
            red_mask: 0xF800,
            green_mask: 0x07E0,
            blue_mask: 0x001F,
            ..Default::default()
        };
        let layout = DdsLayout::resolve(&pf, &mut warnings).unwrap();
        assert_eq!(
            layout,
            DdsLayout::Generic(RasterDescriptor::raw(RasterFormat::Raster565, 16, ColorOrder::Bgra, 1))
        );
        assert!(warnings.mentions("LUMINANCE"));
    }

    #[test]
    fn pitch_mismatch_is_a_warning() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let pixels = PixelData::with_base_level(RasterDescriptor::rgba8888(), 2, 2, Cow::Owned(vec![7; 16]));
        let (mut texture, _) = DdsTexture::import_pixels(pixels, &mut ctx).unwrap();
        texture.header.pitch_or_linear_size = 12;

        let bytes = serialize(&texture, &mut ctx);
        let read = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert!(ctx.warnings.mentions("pitch is 12"));
        assert_eq!(read.levels[0].texels, vec![7; 16]);
    }

    #[test]
    fn palette_follows_the_header() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let desc = RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal4Lsb, 4, 1);
        let mut pixels = PixelData::with_base_level(desc, 4, 1, Cow::Owned(vec![0x10, 0x32]));
        pixels.palette = Some(PaletteData::owned((0..64).collect(), 16));

        let (texture, report) = DdsTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert!(report.is_fully_direct());
        let bytes = serialize(&texture, &mut ctx);
        assert_eq!(bytes.len(), 128 + 64 + 2);
        assert_eq!(&bytes[128..132], &[0, 1, 2, 3]);

        let read = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        let exported = read.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.format.palette_type, PaletteType::Pal4Lsb);
        assert_eq!(exported.mipmaps[0].texels.as_ref(), &[0x10, 0x32]);
    }

    #[test]
    fn bc4_decodes_to_rgba() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut header = DdsHeader {
            flags: DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT | DdsFlags::LINEARSIZE,
            width: 2,
            height: 2,
            pitch_or_linear_size: 8,
            caps: DdsCaps::TEXTURE,
            ..Default::default()
        };
        header.pixel_format.flags = DdsPixelFormatFlags::FOURCC;
        header.pixel_format.four_cc = FOURCC_ATI1;

        let mut out = Cursor::new(vec![]);
        header.write_le(&mut out).unwrap();
        let mut bytes = out.into_inner();
        // both endpoints 200, every index 0
        bytes.extend_from_slice(&[200, 200, 0, 0, 0, 0, 0, 0]);

        let texture = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        let exported = texture.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.format, RasterDescriptor::rgba8888());
        assert_eq!(exported.mipmaps[0].texels.len(), 16);
        assert_eq!(exported.mipmaps[0].texels[0], 200);
    }

    #[test]
    fn cube_maps_are_structural_errors() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut header = DdsHeader::default();
        header.caps2 = DdsCaps2::CUBEMAP | DdsCaps2::CUBEMAP_ALLFACES;
        let mut out = Cursor::new(vec![]);
        header.write_le(&mut out).unwrap();
        let err = DdsTexture::deserialize(&mut Cursor::new(out.into_inner()), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    fn file(header: &DdsHeader, data: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(vec![]);
        header.write_le(&mut out).unwrap();
        let mut bytes = out.into_inner();
        bytes.extend_from_slice(data);
        bytes
    }

    fn fourcc_header(width: u32, height: u32, four_cc: u32) -> DdsHeader {
        let mut header = DdsHeader {
            flags: DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT | DdsFlags::LINEARSIZE,
            width,
            height,
            caps: DdsCaps::TEXTURE,
            ..Default::default()
        };
        header.pixel_format.flags = DdsPixelFormatFlags::FOURCC;
        header.pixel_format.four_cc = four_cc;
        header
    }

    #[test]
    fn huge_dimensions_are_structural_errors() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());

        let mut header = fourcc_header(u32::MAX, u32::MAX, FOURCC_DXT1);
        header.pitch_or_linear_size = 8;
        let err = DdsTexture::deserialize(&mut Cursor::new(file(&header, &[0; 8])), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);

        header.pixel_format.flags = DdsPixelFormatFlags::RGB;
        header.pixel_format.rgb_bit_count = 32;
        header.pixel_format.red_mask = 0x00FF_0000;
        header.pixel_format.green_mask = 0x0000_FF00;
        header.pixel_format.blue_mask = 0x0000_00FF;
        let err = DdsTexture::deserialize(&mut Cursor::new(file(&header, &[0; 8])), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn alpha_texels_need_a_valid_width() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut header = DdsHeader {
            flags: DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT | DdsFlags::PITCH,
            width: 4,
            height: 4,
            caps: DdsCaps::TEXTURE,
            ..Default::default()
        };
        header.pixel_format.flags = DdsPixelFormatFlags::ALPHA;
        header.pixel_format.alpha_mask = 0xFF;

        for bits in [0, 24, 12] {
            header.pixel_format.rgb_bit_count = bits;
            let err = DdsTexture::deserialize(&mut Cursor::new(file(&header, &[0; 64])), &mut ctx).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Structural, "{} bits", bits);
        }

        header.pixel_format.rgb_bit_count = 8;
        let read = DdsTexture::deserialize(&mut Cursor::new(file(&header, &[0x80; 16])), &mut ctx).unwrap();
        let exported = read.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.mipmaps[0].texels[3], 0x80);
    }

    const FOURCC_LUM16: u32 = u32::from_le_bytes(*b"L16 ");

    /// High byte of a 16-bit luminance texel
    struct Lum16;

    impl D3dFormatHandler for Lum16 {
        fn format(&self) -> u32 {
            FOURCC_LUM16
        }

        fn depth(&self) -> u32 {
            16
        }

        fn convert_to_rw(&self, texels: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
            let stride = row_size(width, 16, 4);
            for y in 0..height as usize {
                for x in 0..width as usize {
                    let v = texels[y * stride + x * 2 + 1];
                    rgba[(y * width as usize + x) * 4..][..4].copy_from_slice(&[v, v, v, 255]);
                }
            }
            Ok(())
        }

        fn convert_from_rw(&self, _rgba: &[u8], _width: u32, _height: u32, _texels: &mut [u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_four_cc_is_kept_as_stored() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let bytes = file(&fourcc_header(3, 2, FOURCC_LUM16), &[0x11; 24]);

        let read = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert!(ctx.warnings.mentions("has no handler"));
        assert_eq!(read.levels[0].texels.len(), 3 * 2 * 4);
        assert_eq!(serialize(&read, &mut ctx), bytes);

        let err = read.export_pixels(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn unknown_four_cc_exports_through_its_handler() {
        let config = EngineConfig::default();
        let handlers = FormatHandlerTable::new().with_handler(Lum16);
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let texels: Vec<u8> = (0..6u8).flat_map(|i| [0, i * 10]).collect();
        let bytes = file(&fourcc_header(3, 2, FOURCC_LUM16), &texels);

        let read = DdsTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert!(ctx.warnings.is_empty(), "{:?}", ctx.warnings);
        assert_eq!(read.levels[0].texels, texels);

        let exported = read.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.format, RasterDescriptor::rgba8888());
        assert!(!exported.has_alpha);
        let rgba = exported.mipmaps[0].texels.as_ref();
        assert_eq!(&rgba[..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[16..20], &[40, 40, 40, 255]);
    }
}
