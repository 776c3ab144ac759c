use std::borrow::Cow;
use std::io::{Read, Seek, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    pvr::{detect_header_endian, PvrFlags, PvrHeader, PvrHeaderV2Ext, PvrPixelType, PVR_HEADER_SIZE_V2, PVR_MAGIC},
    raster::{ColorOrder, CompressionType, RasterFormat},
    structural,
};

use super::{acquire_pixels, read_level, AdapterContext, NativeFormat, NativeFormatKind};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, MipmapChain, SizeRules};
use crate::pixel::{
    color::scale_channel,
    compress::{decode_yuv422, YuvPacking},
    geometry::{data_size, row_size, surface_data_size, surface_dimensions},
    masks::{decode_masked_surface, ChannelMasks},
    RasterDescriptor,
};
use crate::platform::swizzle::{unswizzle_surface, PackedTile};
use crate::textures::{ImportReport, MipmapLayer, PixelData, PixelLayer};
use crate::warnings::{LEVEL_MINOR, LEVEL_NORMAL};

/// Pixel types that map onto a generic layout, OpenGL ones first so imports pick them
const GENERIC_TYPES: [(PvrPixelType, RasterFormat, u32, ColorOrder); 17] = [
    (PvrPixelType::OglRgba8888, RasterFormat::Raster8888, 32, ColorOrder::Rgba),
    (PvrPixelType::OglBgra8888, RasterFormat::Raster8888, 32, ColorOrder::Bgra),
    (PvrPixelType::OglRgba4444, RasterFormat::Raster4444, 16, ColorOrder::Abgr),
    (PvrPixelType::OglRgba5551, RasterFormat::Raster1555, 16, ColorOrder::Abgr),
    (PvrPixelType::OglRgb565, RasterFormat::Raster565, 16, ColorOrder::Bgra),
    (PvrPixelType::OglRgb555, RasterFormat::Raster555, 16, ColorOrder::Abgr),
    (PvrPixelType::OglRgb888, RasterFormat::Raster888, 24, ColorOrder::Rgba),
    (PvrPixelType::OglI8, RasterFormat::Lum, 8, ColorOrder::Rgba),
    (PvrPixelType::OglAi88, RasterFormat::LumAlpha, 16, ColorOrder::Rgba),
    (PvrPixelType::Argb4444, RasterFormat::Raster4444, 16, ColorOrder::Bgra),
    (PvrPixelType::Argb1555, RasterFormat::Raster1555, 16, ColorOrder::Bgra),
    (PvrPixelType::Rgb565, RasterFormat::Raster565, 16, ColorOrder::Bgra),
    (PvrPixelType::Rgb555, RasterFormat::Raster555, 16, ColorOrder::Bgra),
    (PvrPixelType::Rgb888, RasterFormat::Raster888, 24, ColorOrder::Bgra),
    (PvrPixelType::Argb8888, RasterFormat::Raster8888, 32, ColorOrder::Bgra),
    (PvrPixelType::I8, RasterFormat::Lum, 8, ColorOrder::Rgba),
    (PvrPixelType::Ai88, RasterFormat::LumAlpha, 16, ColorOrder::Rgba),
];

fn compressed_type(pixel_type: PvrPixelType) -> Option<CompressionType> {
    Some(match pixel_type {
        PvrPixelType::Pvrtc2 | PvrPixelType::OglPvrtc2 => CompressionType::Pvrtc2,
        PvrPixelType::Pvrtc4 | PvrPixelType::OglPvrtc4 => CompressionType::Pvrtc4,
        PvrPixelType::D3dDxt1 => CompressionType::Dxt1,
        PvrPixelType::D3dDxt2 => CompressionType::Dxt2,
        PvrPixelType::D3dDxt3 => CompressionType::Dxt3,
        PvrPixelType::D3dDxt4 => CompressionType::Dxt4,
        PvrPixelType::D3dDxt5 => CompressionType::Dxt5,
        PvrPixelType::EtcRgb4bpp => CompressionType::Etc1,
        _ => return None,
    })
}

fn compressed_pixel_type(compression: CompressionType) -> Option<PvrPixelType> {
    Some(match compression {
        CompressionType::Pvrtc2 => PvrPixelType::OglPvrtc2,
        CompressionType::Pvrtc4 => PvrPixelType::OglPvrtc4,
        CompressionType::Dxt1 => PvrPixelType::D3dDxt1,
        CompressionType::Dxt2 => PvrPixelType::D3dDxt2,
        CompressionType::Dxt3 => PvrPixelType::D3dDxt3,
        CompressionType::Dxt4 => PvrPixelType::D3dDxt4,
        CompressionType::Dxt5 => PvrPixelType::D3dDxt5,
        CompressionType::Etc1 => PvrPixelType::EtcRgb4bpp,
        CompressionType::None => return None,
    })
}

/// Texel layouts without a generic counterpart, decoded to RGBA8888 on export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrDecoded {
    Argb8332,
    Monochrome,
    Yuv(YuvPacking),
    Alpha8,
    Masked { bit_count: u32, masks: ChannelMasks },
}

impl PvrDecoded {
    fn depth(&self) -> u32 {
        match self {
            Self::Argb8332 | Self::Yuv(_) => 16,
            Self::Monochrome => 1,
            Self::Alpha8 => 8,
            Self::Masked { bit_count, .. } => *bit_count,
        }
    }

    fn level_size(&self, width: u32, height: u32) -> usize {
        match self {
            Self::Yuv(_) => ((width as usize + 1) / 2)
                .saturating_mul(4)
                .saturating_mul(height as usize),
            _ => data_size(row_size(width, self.depth(), 1), height),
        }
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        let texels = width as usize * height as usize;
        Ok(match self {
            Self::Yuv(packing) => decode_yuv422(data, width, height, *packing)?,
            Self::Masked { bit_count, masks } => {
                decode_masked_surface(data, width, height, 1, *bit_count, masks, false)?
            }
            Self::Argb8332 => data
                .chunks_exact(2)
                .take(texels)
                .flat_map(|b| {
                    let v = u16::from_le_bytes([b[0], b[1]]) as u32;
                    [
                        scale_channel((v >> 5) & 0x7, 3, 8) as u8,
                        scale_channel((v >> 2) & 0x7, 3, 8) as u8,
                        scale_channel(v & 0x3, 2, 8) as u8,
                        (v >> 8) as u8,
                    ]
                })
                .collect(),
            Self::Alpha8 => data.iter().take(texels).flat_map(|a| [255, 255, 255, *a]).collect(),
            Self::Monochrome => {
                let row = row_size(width, 1, 1);
                let mut out = Vec::with_capacity(texels * 4);
                for y in 0..height as usize {
                    for x in 0..width as usize {
                        let bit = data[y * row + x / 8] >> (7 - x % 8) & 1;
                        let v = if bit != 0 { 255 } else { 0 };
                        out.extend_from_slice(&[v, v, v, 255]);
                    }
                }
                out
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrLayout {
    Generic(RasterDescriptor),
    Decoded(PvrDecoded),
}

impl PvrLayout {
    fn from_header(header: &PvrHeader) -> Result<Self> {
        let Some(pixel_type) = header.pixel_type() else {
            let masks = ChannelMasks::new(header.red_mask, header.green_mask, header.blue_mask, header.alpha_mask);
            if masks == ChannelMasks::default() || !matches!(header.bit_count, 8 | 16 | 24 | 32) {
                return Err(structural!("unknown PVR pixel type 0x{:x}", header.raw_pixel_type()));
            }
            return Ok(match masks.to_descriptor(header.bit_count, false) {
                Some(desc) => Self::Generic(desc),
                None => Self::Decoded(PvrDecoded::Masked {
                    bit_count: header.bit_count,
                    masks,
                }),
            });
        };

        if let Some(compression) = compressed_type(pixel_type) {
            return Ok(Self::Generic(RasterDescriptor::compressed(compression)));
        }
        if let Some((_, format, depth, order)) = GENERIC_TYPES.iter().find(|(t, ..)| *t == pixel_type) {
            return Ok(Self::Generic(RasterDescriptor::raw(*format, *depth, *order, 1)));
        }

        Ok(Self::Decoded(match pixel_type {
            PvrPixelType::Argb8332 => PvrDecoded::Argb8332,
            PvrPixelType::Monochrome => PvrDecoded::Monochrome,
            PvrPixelType::Vy1uy0 => PvrDecoded::Yuv(YuvPacking::Yuy2),
            PvrPixelType::Y1vy0u => PvrDecoded::Yuv(YuvPacking::Uyvy),
            PvrPixelType::OglA8 => PvrDecoded::Alpha8,
            other => return Err(structural!("PVR pixel type {:?} has no layout", other)),
        }))
    }

    fn depth(&self) -> u32 {
        match self {
            Self::Generic(desc) => desc.depth,
            Self::Decoded(decoded) => decoded.depth(),
        }
    }

    fn is_compressed(&self) -> bool {
        matches!(self, Self::Generic(desc) if desc.is_compressed())
    }

    /// `(surface width, surface height, bytes)` of one level
    fn level_geometry(&self, width: u32, height: u32) -> (u32, u32, usize) {
        match self {
            Self::Generic(desc) => {
                let (sw, sh) = surface_dimensions(width, height, desc.compression);
                (sw, sh, surface_data_size(desc, sw, sh))
            }
            Self::Decoded(decoded) => (width, height, decoded.level_size(width, height)),
        }
    }

    fn export_descriptor(&self) -> RasterDescriptor {
        match self {
            Self::Generic(desc) => *desc,
            Self::Decoded(_) => RasterDescriptor::rgba8888(),
        }
    }
}

/// The generic layout an import stores, plus the pixel type naming it
fn import_target(src: &RasterDescriptor) -> (PvrPixelType, RasterDescriptor) {
    if src.is_compressed() {
        if let Some(pixel_type) = compressed_pixel_type(src.compression) {
            return (pixel_type, RasterDescriptor::compressed(src.compression));
        }
    }

    if !src.is_compressed() && !src.is_palette() {
        let found = GENERIC_TYPES.iter().find(|(_, format, depth, order)| {
            *format == src.raster_format
                && *depth == src.depth
                && (src.raster_format.is_luminance() || *order == src.color_order)
        });
        if let Some((pixel_type, format, depth, order)) = found {
            let order = if format.is_luminance() { src.color_order } else { *order };
            return (*pixel_type, RasterDescriptor::raw(*format, *depth, order, 1));
        }
    }

    (PvrPixelType::OglRgba8888, RasterDescriptor::rgba8888())
}

fn swap_texels(data: &mut [u8], depth: u32) {
    match depth {
        16 => data.chunks_exact_mut(2).for_each(|c| c.swap(0, 1)),
        32 => data.chunks_exact_mut(4).for_each(|c| c.reverse()),
        _ => {}
    }
}

fn flip_rows(data: &[u8], row: usize) -> Vec<u8> {
    data.chunks(row).rev().flatten().copied().collect()
}

/// A legacy PVR image file
#[derive(Debug, Clone, PartialEq)]
pub struct PvrTexture {
    pub header: PvrHeader,
    pub endian: Endian,
    pub layout: PvrLayout,
    /// Level data exactly as stored in the file
    pub levels: Vec<MipmapLayer>,
}

impl PvrTexture {
    fn is_twiddled(&self) -> bool {
        self.header.flags.contains(PvrFlags::TWIDDLE) && !self.layout.is_compressed()
    }

    fn export_level<'a>(&self, level: &'a MipmapLayer) -> Result<Cow<'a, [u8]>> {
        let depth = self.layout.depth();
        let mut texels = Cow::Borrowed(level.texels.as_slice());

        if self.endian == Endian::Big && !self.layout.is_compressed() && matches!(depth, 16 | 32) {
            swap_texels(texels.to_mut(), depth);
        }
        if self.is_twiddled() {
            texels = Cow::Owned(unswizzle_surface(&texels, level.width, level.height, depth, PackedTile::YFirst)?);
        }
        if self.header.flags.contains(PvrFlags::VERTICAL_FLIP) && !self.layout.is_compressed() {
            let row = match self.layout {
                PvrLayout::Decoded(decoded) => decoded.level_size(level.width, 1),
                PvrLayout::Generic(desc) => row_size(level.width, desc.depth, 1),
            };
            texels = Cow::Owned(flip_rows(&texels, row));
        }
        if let PvrLayout::Decoded(decoded) = self.layout {
            texels = Cow::Owned(decoded.decode(&texels, level.width, level.height)?);
        }
        Ok(texels)
    }
}

impl NativeFormat for PvrTexture {
    const KIND: NativeFormatKind = NativeFormatKind::Pvr;

    fn is_recognized(prefix: &[u8]) -> bool {
        let Some((endian, size)) = detect_header_endian(prefix) else {
            return false;
        };
        if size != PVR_HEADER_SIZE_V2 {
            return true;
        }
        // the v2 magic sits right after the eleven base fields
        match prefix.get(44..48) {
            Some(magic) => {
                let magic = [magic[0], magic[1], magic[2], magic[3]];
                let value = match endian {
                    Endian::Big => u32::from_be_bytes(magic),
                    Endian::Little => u32::from_le_bytes(magic),
                };
                value == PVR_MAGIC
            }
            None => true,
        }
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let prefix = super::read_prefix(reader, 4)?;
        let (endian, _) = detect_header_endian(&prefix).ok_or_else(|| structural!("not a PVR header"))?;
        let header: PvrHeader = reader.read_type(endian)?;

        if header.flags.intersects(PvrFlags::CUBEMAP | PvrFlags::VOLUME) {
            return Err(structural!("cube and volume PVR files are not supported"));
        }
        if let Some(v2) = &header.v2 {
            if v2.num_surfaces > 1 {
                return Err(structural!("PVR file with {} surfaces", v2.num_surfaces));
            }
        }

        let layout = PvrLayout::from_header(&header)?;
        let (width, height) = (header.width, header.height);
        if width == 0 || height == 0 {
            return Err(structural!("PVR image of {}x{}", width, height));
        }
        if header.flags.contains(PvrFlags::TWIDDLE)
            && !layout.is_compressed()
            && !(width.is_power_of_two() && height.is_power_of_two())
        {
            return Err(structural!("twiddled PVR image of {}x{}", width, height));
        }
        if header.flags.contains(PvrFlags::VERTICAL_FLIP) && layout.is_compressed() {
            ctx.warnings
                .push(LEVEL_NORMAL, "vertical flip of compressed PVR data is ignored");
        }

        let declared = header.mipmap_count as usize + 1;
        let count = resolve_level_count(declared, width, height, &mut ctx.warnings);

        let mut levels = Vec::with_capacity(count);
        let mut total = 0;
        for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
            let (sw, sh, size) = layout.level_geometry(w, h);
            total = size.saturating_add(total);
            levels.push(MipmapLayer {
                width: sw,
                height: sh,
                layer_width: w,
                layer_height: h,
                texels: read_level(reader, size, i)?,
            });
        }

        if header.data_size as usize != total {
            ctx.warnings.push(
                LEVEL_MINOR,
                format!("PVR data size is {} but the levels hold {} bytes", header.data_size, total),
            );
        }

        Ok(Self {
            header,
            endian,
            layout,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, _ctx: &mut AdapterContext) -> Result<()> {
        let mut header = self.header.clone();
        header.mipmap_count = self.levels.len().saturating_sub(1) as u32;
        header.data_size = self.levels.iter().map(|l| l.texels.len() as u32).sum();
        header.write_options(writer, self.endian, ())?;
        for level in &self.levels {
            writer.write_all(&level.texels)?;
        }
        Ok(())
    }

    fn export_pixels(&self, _ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let mut pixels = PixelData::new(self.layout.export_descriptor());
        for level in &self.levels {
            pixels.mipmaps.push(PixelLayer::new(
                level.width,
                level.height,
                level.layer_width,
                level.layer_height,
                self.export_level(level)?,
            ));
        }
        pixels.has_alpha = self.header.flags.contains(PvrFlags::ALPHA);
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let (pixel_type, target) = import_target(&pixels.format);
        let (pixels, report) = acquire_pixels(pixels, &target, &SizeRules::default(), ctx, Self::KIND)?;
        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));
        let levels: Vec<MipmapLayer> = pixels.mipmaps.into_iter().map(MipmapLayer::from).collect();

        let mut flags = PvrFlags::from_bits_retain(pixel_type as u32);
        if levels.len() > 1 {
            flags |= PvrFlags::MIPMAP;
        }
        if pixels.has_alpha {
            flags |= PvrFlags::ALPHA;
        }

        let masks = ChannelMasks::of(&target).unwrap_or_default();
        let header = PvrHeader {
            header_size: PVR_HEADER_SIZE_V2,
            height,
            width,
            mipmap_count: levels.len().saturating_sub(1) as u32,
            flags,
            data_size: levels.iter().map(|l| l.texels.len() as u32).sum(),
            bit_count: if target.is_compressed() {
                target.compression.bits_per_texel()
            } else {
                target.depth
            },
            red_mask: masks.red,
            green_mask: masks.green,
            blue_mask: masks.blue,
            alpha_mask: masks.alpha,
            v2: Some(PvrHeaderV2Ext {
                magic: PVR_MAGIC,
                num_surfaces: 1,
            }),
        };

        Ok((
            Self {
                header,
                endian: Endian::Little,
                layout: PvrLayout::Generic(target),
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
    use crate::platform::handlers::FormatHandlerTable;
    use crate::textures::Acquisition;
    use rwtex_native::versions::LibraryVersion;
    use std::io::Cursor;

    fn header(pixel_type: PvrPixelType, width: u32, height: u32, bit_count: u32) -> PvrHeader {
        PvrHeader {
            header_size: 44,
            height,
            width,
            mipmap_count: 0,
            flags: PvrFlags::from_bits_retain(pixel_type as u32),
            data_size: width * height * bit_count / 8,
            bit_count,
            ..Default::default()
        }
    }

    fn file(header: &PvrHeader, endian: Endian, data: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(vec![]);
        header.write_options(&mut out, endian, ()).unwrap();
        let mut bytes = out.into_inner();
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn stored_bytes_roundtrip() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let data: Vec<u8> = (0..64).collect();
        let bytes = file(&header(PvrPixelType::OglRgba8888, 4, 4, 32), Endian::Little, &data);
        assert!(PvrTexture::is_recognized(&bytes));

        let texture = PvrTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert!(ctx.warnings.is_empty());
        let exported = texture.export_pixels(&mut ctx).unwrap();
        assert!(exported.is_borrowed());
        assert_eq!(exported.format, RasterDescriptor::rgba8888());

        let mut out = Cursor::new(vec![]);
        texture.serialize(&mut out, &mut ctx).unwrap();
        assert_eq!(out.into_inner(), bytes);
    }

    #[test]
    fn big_endian_texels_are_swapped() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let bytes = file(&header(PvrPixelType::OglRgb565, 2, 1, 16), Endian::Big, &[0xF8, 0x00, 0x00, 0x1F]);

        let texture = PvrTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        assert_eq!(texture.endian, Endian::Big);
        let exported = texture.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.mipmaps[0].texels.as_ref(), &[0x00, 0xF8, 0x1F, 0x00]);
        assert_eq!(exported.to_rgba_image(0).unwrap().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn twiddled_data_is_linearized() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut h = header(PvrPixelType::OglI8, 2, 2, 8);
        h.flags |= PvrFlags::TWIDDLE;
        // y supplies the low bit: (0,0) (0,1) (1,0) (1,1)
        let bytes = file(&h, Endian::Little, &[0, 2, 1, 3]);

        let texture = PvrTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        let exported = texture.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.mipmaps[0].texels.as_ref(), &[0, 1, 2, 3]);
    }

    #[test]
    fn anonymous_masks_decode_to_rgba() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut h = header(PvrPixelType::Argb4444, 1, 1, 32);
        h.set_pixel_type(0x7F);
        h.red_mask = 0x3FF0_0000;
        h.green_mask = 0x000F_FC00;
        h.blue_mask = 0x0000_03FF;
        h.alpha_mask = 0xC000_0000;
        let bytes = file(&h, Endian::Little, &(0x3FFu32 << 10 | 3 << 30).to_le_bytes());

        let texture = PvrTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap();
        let exported = texture.export_pixels(&mut ctx).unwrap();
        assert_eq!(exported.format, RasterDescriptor::rgba8888());
        assert_eq!(exported.mipmaps[0].texels.as_ref(), &[0, 255, 0, 255]);
    }

    #[test]
    fn imports_prefer_opengl_types() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let desc = RasterDescriptor::raw(RasterFormat::Raster565, 16, ColorOrder::Bgra, 1);
        let pixels = PixelData::with_base_level(desc, 2, 2, Cow::Owned(vec![0; 8]));
        let (texture, report) = PvrTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Direct);
        assert_eq!(texture.header.pixel_type(), Some(PvrPixelType::OglRgb565));
        assert_eq!(texture.header.red_mask, 0xF800);

        let odd = RasterDescriptor::raw(RasterFormat::Raster1555, 16, ColorOrder::Rgba, 1);
        let pixels = PixelData::with_base_level(odd, 2, 2, Cow::Owned(vec![0; 8]));
        let (texture, report) = PvrTexture::import_pixels(pixels, &mut ctx).unwrap();
        assert_eq!(report.texels, Acquisition::Converted);
        assert_eq!(texture.header.pixel_type(), Some(PvrPixelType::OglRgba8888));
    }

    #[test]
    fn cube_maps_are_rejected() {
        let (config, handlers) = (EngineConfig::default(), FormatHandlerTable::new());
        let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
        let mut h = header(PvrPixelType::OglI8, 1, 1, 8);
        h.flags |= PvrFlags::CUBEMAP;
        let bytes = file(&h, Endian::Little, &[0; 6]);
        let err = PvrTexture::deserialize(&mut Cursor::new(&bytes), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), rwtex_native::ErrorKind::Structural);
    }
}
