use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom, Write};

use rwtex_native::binrw::{BinReaderExt, BinWrite, Endian};
use rwtex_native::{
    gamecube::{GcHeader, GcHeaderExtension, GcHeaderLayout, GxFormat, GxPaletteFormat, GC_NO_PALETTE},
    raster::{ColorOrder, CompressionType, PaletteType, RasterFormat},
    structural,
    versions::PLATFORM_GAMECUBE,
};

use super::{acquire_pixels, d3d, read_level, AdapterContext, NativeFormat, NativeFormatKind, TextureInfo};
use crate::error::Result;
use crate::mipmap::{resolve_level_count, MipmapChain, SizeRules};
use crate::pixel::{
    color::{scale_channel, Rgba8},
    geometry::{aligned_dim, row_size, surface_dimensions},
    transcode::convert_pixel_data,
    RasterDescriptor,
};
use crate::platform::swizzle::ClusterTiling;
use crate::textures::{Acquisition, ImportReport, MipmapLayer, PaletteData, PixelData, PixelLayer};
use crate::warnings::{LEVEL_MINOR, LEVEL_NORMAL};

const CLUSTER_BYTES: usize = 32;

fn size_rules() -> SizeRules {
    SizeRules {
        maximum: Some(1024),
        ..Default::default()
    }
}

/// Tile aligned surface of one level
fn tiled_dimensions(format: GxFormat, width: u32, height: u32) -> (u32, u32) {
    let (tw, th) = format.tile_size();
    (aligned_dim(width, tw), aligned_dim(height, th))
}

fn level_size(format: GxFormat, width: u32, height: u32) -> usize {
    let (sw, sh) = tiled_dimensions(format, width, height);
    sw as usize * sh as usize * format.bpp() as usize / 8
}

fn tlut_capacity(format: GxFormat) -> usize {
    match format {
        GxFormat::C4 => 16,
        GxFormat::C8 => 256,
        GxFormat::C14X2 => 0x4000,
        _ => 0,
    }
}

/// Generic layout the levels of `format` are exposed as
fn export_descriptor(format: GxFormat) -> RasterDescriptor {
    match format {
        GxFormat::I4 => RasterDescriptor::raw(RasterFormat::Lum, 4, ColorOrder::Rgba, 1),
        GxFormat::I8 => RasterDescriptor::raw(RasterFormat::Lum, 8, ColorOrder::Rgba, 1),
        GxFormat::IA4 => RasterDescriptor::raw(RasterFormat::LumAlpha, 8, ColorOrder::Rgba, 1),
        GxFormat::IA8 => RasterDescriptor::raw(RasterFormat::LumAlpha, 16, ColorOrder::Rgba, 1),
        GxFormat::RGB565 => RasterDescriptor::raw(RasterFormat::Raster565, 16, ColorOrder::Bgra, 1),
        GxFormat::RGB5A3 | GxFormat::RGBA8 | GxFormat::C14X2 => RasterDescriptor::rgba8888(),
        GxFormat::C4 => RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal4, 4, 1),
        GxFormat::C8 => RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal8, 8, 1),
        GxFormat::CMPR => RasterDescriptor::compressed(CompressionType::Dxt1),
    }
}

/// GX format to store `src` as, and the generic layout to acquire it in first
fn import_plan(src: &RasterDescriptor, layout: GcHeaderLayout) -> (GxFormat, RasterDescriptor) {
    let plan = |format: GxFormat| (format, export_descriptor(format));

    if src.is_compressed() {
        return if src.compression == CompressionType::Dxt1 {
            plan(GxFormat::CMPR)
        } else {
            plan(GxFormat::RGBA8)
        };
    }

    if src.is_palette() {
        return if src.palette_type == PaletteType::Pal8 {
            plan(GxFormat::C8)
        } else {
            plan(GxFormat::C4)
        };
    }

    let luminance = match (src.raster_format, src.depth) {
        (RasterFormat::Lum, 4) => Some(GxFormat::I4),
        (RasterFormat::Lum, _) => Some(GxFormat::I8),
        (RasterFormat::LumAlpha, 8) => Some(GxFormat::IA4),
        (RasterFormat::LumAlpha, _) => Some(GxFormat::IA8),
        (RasterFormat::Depth16 | RasterFormat::Depth24 | RasterFormat::Depth32, _) => Some(GxFormat::I8),
        _ => None,
    };
    if let Some(format) = luminance {
        if !layout.supports_luminance() {
            return plan(GxFormat::RGBA8);
        }
        let (format, desc) = plan(format);
        return (format, desc.with_order(src.color_order));
    }

    match src.raster_format {
        RasterFormat::Raster565 => plan(GxFormat::RGB565),
        RasterFormat::Raster1555 | RasterFormat::Raster4444 | RasterFormat::Raster555 => plan(GxFormat::RGB5A3),
        _ => plan(GxFormat::RGBA8),
    }
}

fn decode_rgb5a3(value: u16) -> Rgba8 {
    let v = value as u32;
    if v & 0x8000 != 0 {
        Rgba8 {
            r: scale_channel((v >> 10) & 0x1F, 5, 8) as u8,
            g: scale_channel((v >> 5) & 0x1F, 5, 8) as u8,
            b: scale_channel(v & 0x1F, 5, 8) as u8,
            a: 255,
        }
    } else {
        Rgba8 {
            r: scale_channel((v >> 8) & 0xF, 4, 8) as u8,
            g: scale_channel((v >> 4) & 0xF, 4, 8) as u8,
            b: scale_channel(v & 0xF, 4, 8) as u8,
            a: scale_channel((v >> 12) & 0x7, 3, 8) as u8,
        }
    }
}

fn encode_rgb5a3(color: Rgba8) -> u16 {
    let alpha = scale_channel(color.a as u32, 8, 3);
    let value = if alpha == 7 {
        0x8000
            | scale_channel(color.r as u32, 8, 5) << 10
            | scale_channel(color.g as u32, 8, 5) << 5
            | scale_channel(color.b as u32, 8, 5)
    } else {
        alpha << 12
            | scale_channel(color.r as u32, 8, 4) << 8
            | scale_channel(color.g as u32, 8, 4) << 4
            | scale_channel(color.b as u32, 8, 4)
    };
    value as u16
}

fn decode_tlut_entry(format: GxPaletteFormat, value: u16) -> Rgba8 {
    let v = value as u32;
    match format {
        GxPaletteFormat::IA8 => {
            let lum = (v & 0xFF) as u8;
            Rgba8 {
                r: lum,
                g: lum,
                b: lum,
                a: (v >> 8) as u8,
            }
        }
        GxPaletteFormat::RGB565 => Rgba8 {
            r: scale_channel(v >> 11, 5, 8) as u8,
            g: scale_channel((v >> 5) & 0x3F, 6, 8) as u8,
            b: scale_channel(v & 0x1F, 5, 8) as u8,
            a: 255,
        },
        GxPaletteFormat::RGB5A3 => decode_rgb5a3(value),
    }
}

fn encode_tlut_entry(format: GxPaletteFormat, color: Rgba8) -> u16 {
    match format {
        GxPaletteFormat::IA8 => (color.a as u16) << 8 | color.luminance() as u16,
        GxPaletteFormat::RGB565 => {
            (scale_channel(color.r as u32, 8, 5) << 11
                | scale_channel(color.g as u32, 8, 6) << 5
                | scale_channel(color.b as u32, 8, 5)) as u16
        }
        GxPaletteFormat::RGB5A3 => encode_rgb5a3(color),
    }
}

fn decode_tlut(format: GxPaletteFormat, tlut: &[u8]) -> Vec<Rgba8> {
    tlut.chunks_exact(2)
        .map(|b| decode_tlut_entry(format, u16::from_be_bytes([b[0], b[1]])))
        .collect()
}

fn encode_tlut(format: GxPaletteFormat, colors: &[Rgba8]) -> Vec<u8> {
    colors
        .iter()
        .flat_map(|c| encode_tlut_entry(format, *c).to_be_bytes())
        .collect()
}

/// Moves one texel of `depth` bits; nibbles are stored high first
fn copy_texel(src: &[u8], src_texel: usize, dst: &mut [u8], dst_texel: usize, depth: u32) {
    if depth == 4 {
        let nibble = (src[src_texel / 2] >> if src_texel % 2 == 0 { 4 } else { 0 }) & 0x0F;
        let shift = if dst_texel % 2 == 0 { 4 } else { 0 };
        let byte = &mut dst[dst_texel / 2];
        *byte = (*byte & !(0x0F << shift)) | (nibble << shift);
    } else {
        let n = depth as usize / 8;
        dst[dst_texel * n..(dst_texel + 1) * n].copy_from_slice(&src[src_texel * n..(src_texel + 1) * n]);
    }
}

fn swap_u16(data: &mut [u8]) {
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Texels per linear row at byte alignment 1
fn row_stride(width: u32, depth: u32) -> usize {
    row_size(width, depth, 1) * 8 / depth as usize
}

/// Tiled level of a single cluster format to linear rows
fn untile(data: &[u8], format: GxFormat, width: u32, height: u32) -> Vec<u8> {
    let depth = format.bpp();
    let (tw, th) = format.tile_size();
    let tiling = ClusterTiling::new(tw, th, width);
    let stride = row_stride(width, depth);

    let mut out = vec![0u8; row_size(width, depth, 1) * height as usize];
    for y in 0..height {
        for x in 0..width {
            let src = tiling.texel_index(x, y) as usize;
            copy_texel(data, src, &mut out, y as usize * stride + x as usize, depth);
        }
    }
    out
}

/// Linear rows to a tiled level, padding texels stay zero
fn tile(linear: &[u8], format: GxFormat, width: u32, height: u32) -> Vec<u8> {
    let depth = format.bpp();
    let (tw, th) = format.tile_size();
    let tiling = ClusterTiling::new(tw, th, width);
    let stride = row_stride(width, depth);

    let mut out = vec![0u8; level_size(format, width, height)];
    for y in 0..height {
        for x in 0..width {
            let dst = tiling.texel_index(x, y) as usize;
            copy_texel(linear, y as usize * stride + x as usize, &mut out, dst, depth);
        }
    }
    out
}

/// Byte offset of a 4x4 DXT block inside CMPR data: 8x8 tiles of four sub-blocks
fn cmpr_block_offset(bx: u32, by: u32, width: u32) -> usize {
    let tiles_x = aligned_dim(width, 8) / 8;
    let tile = (by / 2) * tiles_x + bx / 2;
    let sub = (by % 2) * 2 + bx % 2;
    tile as usize * CLUSTER_BYTES + sub as usize * 8
}

/// Big endian colors and MSB-first indices to DXT1 order, and back
fn flip_dxt1_block(block: &mut [u8]) {
    block.swap(0, 1);
    block.swap(2, 3);
    for row in &mut block[4..8] {
        let v = *row;
        *row = (v >> 6) | ((v >> 2) & 0x0C) | ((v << 2) & 0x30) | (v << 6);
    }
}

fn cmpr_to_dxt1(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (sw, sh) = surface_dimensions(width, height, CompressionType::Dxt1);
    let mut out = Vec::with_capacity((sw * sh / 2) as usize);
    for by in 0..sh / 4 {
        for bx in 0..sw / 4 {
            let offset = cmpr_block_offset(bx, by, width);
            let mut block = [0u8; 8];
            block.copy_from_slice(&data[offset..offset + 8]);
            flip_dxt1_block(&mut block);
            out.extend_from_slice(&block);
        }
    }
    out
}

fn dxt1_to_cmpr(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (sw, sh) = surface_dimensions(width, height, CompressionType::Dxt1);
    let mut out = vec![0u8; level_size(GxFormat::CMPR, width, height)];
    for (i, chunk) in data.chunks_exact(8).take((sw / 4 * sh / 4) as usize).enumerate() {
        let (bx, by) = (i as u32 % (sw / 4), i as u32 / (sw / 4));
        let offset = cmpr_block_offset(bx, by, width);
        let block = &mut out[offset..offset + 8];
        block.copy_from_slice(chunk);
        flip_dxt1_block(block);
    }
    out
}

/// Decodes a level into the layout of [`export_descriptor`]
fn decode_level(data: &[u8], format: GxFormat, width: u32, height: u32, tlut: Option<&[Rgba8]>) -> Vec<u8> {
    match format {
        GxFormat::CMPR => cmpr_to_dxt1(data, width, height),
        GxFormat::RGBA8 => {
            let tiling = ClusterTiling::new(4, 4, width);
            let mut out = Vec::with_capacity(width as usize * height as usize * 4);
            for y in 0..height {
                for x in 0..width {
                    let (tile, inner) = tiling.locate(x, y);
                    let ar = tile as usize * CLUSTER_BYTES * 2 + inner as usize * 2;
                    let gb = ar + CLUSTER_BYTES;
                    out.extend_from_slice(&[data[ar + 1], data[gb], data[gb + 1], data[ar]]);
                }
            }
            out
        }
        GxFormat::RGB5A3 | GxFormat::C14X2 => {
            let linear = untile(data, format, width, height);
            linear
                .chunks_exact(2)
                .flat_map(|b| {
                    let value = u16::from_be_bytes([b[0], b[1]]);
                    let color = if format == GxFormat::RGB5A3 {
                        decode_rgb5a3(value)
                    } else {
                        tlut.and_then(|t| t.get((value & 0x3FFF) as usize).copied())
                            .unwrap_or_default()
                    };
                    [color.r, color.g, color.b, color.a]
                })
                .collect()
        }
        GxFormat::IA8 | GxFormat::RGB565 => {
            let mut linear = untile(data, format, width, height);
            swap_u16(&mut linear);
            linear
        }
        _ => untile(data, format, width, height),
    }
}

/// Encodes a level given in the layout of [`export_descriptor`]
fn encode_level(texels: &[u8], format: GxFormat, width: u32, height: u32) -> Result<Vec<u8>> {
    Ok(match format {
        GxFormat::CMPR => dxt1_to_cmpr(texels, width, height),
        GxFormat::RGBA8 => {
            let tiling = ClusterTiling::new(4, 4, width);
            let mut out = vec![0u8; level_size(format, width, height)];
            for (i, px) in texels.chunks_exact(4).take(width as usize * height as usize).enumerate() {
                let (tile, inner) = tiling.locate(i as u32 % width, i as u32 / width);
                let ar = tile as usize * CLUSTER_BYTES * 2 + inner as usize * 2;
                let gb = ar + CLUSTER_BYTES;
                out[ar] = px[3];
                out[ar + 1] = px[0];
                out[gb] = px[1];
                out[gb + 1] = px[2];
            }
            out
        }
        GxFormat::RGB5A3 => {
            let linear: Vec<u8> = texels
                .chunks_exact(4)
                .flat_map(|c| {
                    encode_rgb5a3(Rgba8 {
                        r: c[0],
                        g: c[1],
                        b: c[2],
                        a: c[3],
                    })
                    .to_be_bytes()
                })
                .collect();
            tile(&linear, format, width, height)
        }
        GxFormat::IA8 | GxFormat::RGB565 => {
            let mut linear = texels.to_vec();
            swap_u16(&mut linear);
            tile(&linear, format, width, height)
        }
        GxFormat::C14X2 => return Err(structural!("C14X2 rasters cannot be encoded")),
        _ => tile(texels, format, width, height),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameCubeTexture {
    pub header: GcHeader,
    pub format: GxFormat,
    pub palette_format: Option<GxPaletteFormat>,
    /// TLUT entries as stored, big endian
    pub palette: Option<Vec<u8>>,
    /// Tiled GX texel data
    pub levels: Vec<MipmapLayer>,
}

impl GameCubeTexture {
    pub fn layout(&self) -> GcHeaderLayout {
        self.header.extension.layout()
    }

    fn palette_colors(&self) -> Option<Vec<Rgba8>> {
        match (self.palette_format, &self.palette) {
            (Some(format), Some(tlut)) => Some(decode_tlut(format, tlut)),
            _ => None,
        }
    }

    fn needs_luminance(&self) -> bool {
        self.format.is_luminance() || self.palette_format == Some(GxPaletteFormat::IA8)
    }

    /// Copy storable in `layout`, transcoding luminance data the older layouts cannot carry
    fn downgraded(&self, layout: GcHeaderLayout, ctx: &mut AdapterContext) -> Result<Self> {
        let mut texture = self.clone();

        if self.format.is_luminance() {
            ctx.warnings.push(
                LEVEL_NORMAL,
                format!("{:?} texels were converted to RGBA8 for an older GameCube layout", self.format),
            );
            let exported = self.export_pixels(ctx)?;
            let rgba = convert_pixel_data(&exported, &RasterDescriptor::rgba8888(), ctx.config)?;
            texture.format = GxFormat::RGBA8;
            texture.levels = rgba
                .mipmaps
                .iter()
                .map(|layer| {
                    let (w, h) = (layer.layer_width, layer.layer_height);
                    let (sw, sh) = tiled_dimensions(GxFormat::RGBA8, w, h);
                    Ok(MipmapLayer {
                        width: sw,
                        height: sh,
                        layer_width: w,
                        layer_height: h,
                        texels: encode_level(&layer.texels, GxFormat::RGBA8, w, h)?,
                    })
                })
                .collect::<Result<_>>()?;
            texture.header.internal_format = GxFormat::RGBA8 as u8;
            texture.header.depth = GxFormat::RGBA8.bpp() as u8;
        }

        if self.palette_format == Some(GxPaletteFormat::IA8) {
            ctx.warnings.push(
                LEVEL_NORMAL,
                "IA8 palette was converted to RGB5A3 for an older GameCube layout",
            );
            let colors = self.palette_colors().unwrap_or_default();
            texture.palette = Some(encode_tlut(GxPaletteFormat::RGB5A3, &colors));
            texture.palette_format = Some(GxPaletteFormat::RGB5A3);
            texture.header.palette_format = GxPaletteFormat::RGB5A3 as u8;
        }

        if let Some(tlut) = &mut texture.palette {
            // palettes of the older layouts are always complete
            if layout != GcHeaderLayout::V3 {
                tlut.resize(tlut_capacity(texture.format) * 2, 0);
            }
        }
        Ok(texture)
    }

    fn extension_for(&self, layout: GcHeaderLayout) -> GcHeaderExtension {
        let auto_mipmaps = self.header.extension.auto_mipmaps() as u8;
        let raster_flags = self.header.extension.raster_flags().unwrap_or_else(|| {
            d3d::compose_flags(&export_descriptor(self.format), self.header.has_alpha != 0, self.levels.len(), false)
                .bits()
        });
        match layout {
            GcHeaderLayout::V1 => GcHeaderExtension::V1 { pad: 0 },
            GcHeaderLayout::V2 => GcHeaderExtension::V2 {
                auto_mipmaps,
                pad: 0,
                raster_flags,
            },
            GcHeaderLayout::V3 => GcHeaderExtension::V3 {
                auto_mipmaps,
                pad: 0,
                raster_flags,
                palette_entries: self.palette.as_ref().map(|p| p.len() / 2).unwrap_or(0) as u16,
                pad2: 0,
            },
        }
    }

    fn write_body<W: Write + Seek>(&self, writer: &mut W, layout: GcHeaderLayout) -> Result<()> {
        let mut header = self.header.clone();
        if layout != self.layout() {
            header.extension = self.extension_for(layout);
        }
        header.mipmap_count = self.levels.len() as u8;
        header.image_data_size = self.levels.iter().map(|l| l.texels.len() as u32).sum();
        header.write_options(writer, Endian::Big, (layout,))?;

        if let Some(tlut) = &self.palette {
            writer.write_all(tlut)?;
        }
        for level in &self.levels {
            writer.write_all(&level.texels)?;
        }
        Ok(())
    }
}

impl NativeFormat for GameCubeTexture {
    const KIND: NativeFormatKind = NativeFormatKind::GameCube;

    fn is_recognized(prefix: &[u8]) -> bool {
        prefix.get(0..4) == Some(&PLATFORM_GAMECUBE.to_be_bytes()[..])
    }

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self> {
        let layout = GcHeaderLayout::for_version(ctx.version);
        let header: GcHeader = reader.read_be_args((layout,))?;
        if header.common.platform != PLATFORM_GAMECUBE {
            return Err(structural!("platform {} is not GameCube", header.common.platform));
        }

        let format = GxFormat::n(header.internal_format)
            .ok_or_else(|| structural!("unknown GX texel format 0x{:x}", header.internal_format))?;
        let palette_format = if header.palette_format == GC_NO_PALETTE {
            None
        } else {
            Some(
                GxPaletteFormat::n(header.palette_format)
                    .ok_or_else(|| structural!("unknown GX palette format 0x{:x}", header.palette_format))?,
            )
        };

        if format.is_palette() != palette_format.is_some() {
            return Err(structural!(
                "GX format {:?} with palette format 0x{:x}",
                format,
                header.palette_format
            ));
        }
        if !layout.supports_luminance()
            && (format.is_luminance() || palette_format == Some(GxPaletteFormat::IA8))
        {
            return Err(structural!("luminance data in a {:?} GameCube texture", layout));
        }
        if header.depth as u32 != format.bpp() {
            ctx.warnings.push(
                LEVEL_MINOR,
                format!("GameCube depth {} does not match {:?}", header.depth, format),
            );
        }

        let palette = match palette_format {
            Some(_) => {
                let capacity = tlut_capacity(format);
                let entries = match header.extension.palette_entries() {
                    Some(n) if n > 0 => (n as usize).min(capacity),
                    _ => capacity,
                };
                Some(read_level(reader, entries * 2, 0).map_err(|_| structural!("GameCube palette is truncated"))?)
            }
            None => None,
        };

        let (width, height) = (header.width as u32, header.height as u32);
        let count = resolve_level_count(header.mipmap_count as usize, width, height, &mut ctx.warnings);

        let mut levels = Vec::with_capacity(count);
        let mut total = 0;
        for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
            let size = level_size(format, w, h);
            total += size;
            if total > header.image_data_size as usize {
                return Err(structural!(
                    "level {} ends past the declared image data size of {}",
                    i,
                    header.image_data_size
                ));
            }
            let (sw, sh) = tiled_dimensions(format, w, h);
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
                .push_secure(LEVEL_MINOR, format!("{} unused bytes after the GameCube levels", unused));
            reader.seek(SeekFrom::Current(unused as i64))?;
        }

        Ok(Self {
            header,
            format,
            palette_format,
            palette,
            levels,
        })
    }

    fn serialize<W: Write + Seek>(&self, writer: &mut W, ctx: &mut AdapterContext) -> Result<()> {
        let layout = GcHeaderLayout::for_version(ctx.version);
        if !layout.supports_luminance() && self.needs_luminance() {
            return self.downgraded(layout, ctx)?.write_body(writer, layout);
        }
        if layout != GcHeaderLayout::V3 && self.layout() == GcHeaderLayout::V3 {
            return self.downgraded(layout, ctx)?.write_body(writer, layout);
        }
        self.write_body(writer, layout)
    }

    fn export_pixels(&self, _ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        let format = export_descriptor(self.format);
        let tlut = self.palette_colors();

        let mut pixels = PixelData::new(format);
        if format.is_palette() {
            let colors = tlut.as_deref().unwrap_or_default();
            let entries = colors.len().min(format.palette_type.max_entries());
            let data = colors[..entries]
                .iter()
                .flat_map(|c| [c.r, c.g, c.b, c.a])
                .collect();
            pixels.palette = Some(PaletteData::owned(data, entries));
        }

        for level in &self.levels {
            let (w, h) = (level.layer_width, level.layer_height);
            let texels = decode_level(&level.texels, self.format, w, h, tlut.as_deref());
            let (sw, sh) = surface_dimensions(w, h, format.compression);
            pixels.mipmaps.push(PixelLayer::new(sw, sh, w, h, Cow::Owned(texels)));
        }

        pixels.has_alpha = self.header.has_alpha != 0;
        pixels.auto_mipmaps = self.header.extension.auto_mipmaps();
        pixels.raster_type = self.header.raster_type;
        Ok(pixels)
    }

    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)> {
        let layout = GcHeaderLayout::for_version(ctx.version);
        let (gx_format, target) = import_plan(&pixels.format, layout);
        if gx_format == GxFormat::RGBA8 && import_plan(&pixels.format, GcHeaderLayout::V3).0.is_luminance() {
            ctx.warnings.push(
                LEVEL_NORMAL,
                format!("luminance data stored as RGBA8 in a {:?} GameCube texture", layout),
            );
        }

        let (pixels, mut report) = acquire_pixels(pixels, &target, &size_rules(), ctx, Self::KIND)?;
        let (width, height) = pixels.base_dimensions().unwrap_or((1, 1));

        let mut levels = Vec::with_capacity(pixels.mipmaps.len());
        for layer in &pixels.mipmaps {
            let (w, h) = (layer.layer_width, layer.layer_height);
            let (sw, sh) = tiled_dimensions(gx_format, w, h);
            levels.push(MipmapLayer {
                width: sw,
                height: sh,
                layer_width: w,
                layer_height: h,
                texels: encode_level(&layer.texels, gx_format, w, h)?,
            });
        }
        report.texels = Acquisition::Converted;

        let (palette_format, palette) = match &pixels.palette {
            Some(p) => {
                let colors: Vec<Rgba8> = p
                    .data
                    .chunks_exact(4)
                    .take(p.entries)
                    .map(|c| Rgba8 {
                        r: c[0],
                        g: c[1],
                        b: c[2],
                        a: c[3],
                    })
                    .collect();
                let tlut_format = if colors.iter().all(|c| c.a == 255) {
                    GxPaletteFormat::RGB565
                } else {
                    GxPaletteFormat::RGB5A3
                };
                let mut tlut = encode_tlut(tlut_format, &colors);
                tlut.resize(tlut_capacity(gx_format) * 2, 0);
                report.palette = Acquisition::Converted;
                (Some(tlut_format), Some(tlut))
            }
            None => (None, None),
        };

        let raster_flags = d3d::compose_flags(&target, pixels.has_alpha, levels.len(), pixels.auto_mipmaps).bits();
        let extension = match layout {
            GcHeaderLayout::V1 => GcHeaderExtension::V1 { pad: 0 },
            GcHeaderLayout::V2 => GcHeaderExtension::V2 {
                auto_mipmaps: pixels.auto_mipmaps as u8,
                pad: 0,
                raster_flags,
            },
            GcHeaderLayout::V3 => GcHeaderExtension::V3 {
                auto_mipmaps: pixels.auto_mipmaps as u8,
                pad: 0,
                raster_flags,
                palette_entries: palette.as_ref().map(|p| p.len() / 2).unwrap_or(0) as u16,
                pad2: 0,
            },
        };

        let header = GcHeader {
            common: TextureInfo::default().to_common(PLATFORM_GAMECUBE),
            width: width as u16,
            height: height as u16,
            depth: gx_format.bpp() as u8,
            mipmap_count: levels.len() as u8,
            raster_type: pixels.raster_type,
            internal_format: gx_format as u8,
            palette_format: palette_format.map(|f| f as u8).unwrap_or(GC_NO_PALETTE),
            has_alpha: pixels.has_alpha as u8,
            extension,
            image_data_size: levels.iter().map(|l| l.texels.len() as u32).sum(),
        };

        Ok((
            Self {
                header,
                format: gx_format,
                palette_format,
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
        self.header.common = info.to_common(PLATFORM_GAMECUBE);
    }

    fn base_dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }
}
