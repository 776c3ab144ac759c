//! Layout conversion between arbitrary raster descriptors.

use std::borrow::Cow;

use tracing::debug;

use rwtex_native::raster::{ColorOrder, CompressionType, RasterFormat};

use super::{
    color::{AbstractColor, ColorDispatcher, Rgba8},
    compress,
    geometry::{self, surface_dimensions},
    palette::{self, Palettized},
    RasterDescriptor,
};
use crate::config::EngineConfig;
use crate::error::{Result, TextureError};
use crate::textures::{PaletteData, PixelData, PixelLayer};

/// Texel layout plus the palette it indexes into, if any
#[derive(Debug, Clone, Copy)]
pub struct TexelFormat<'a> {
    pub desc: RasterDescriptor,
    pub palette: Option<(&'a [u8], usize)>,
}

impl<'a> TexelFormat<'a> {
    pub fn new(desc: RasterDescriptor, palette: Option<&'a PaletteData<'_>>) -> Self {
        Self {
            desc,
            palette: palette.map(|p| (p.data.as_ref(), p.entries)),
        }
    }

    pub fn raw(desc: RasterDescriptor) -> Self {
        Self { desc, palette: None }
    }

    fn dispatcher(&self) -> Result<ColorDispatcher<'a>> {
        ColorDispatcher::new(
            &self.desc,
            self.palette.map(|(d, _)| d),
            self.palette.map(|(_, n)| n).unwrap_or(0),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceView<'a> {
    pub texels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

fn source_rows<'s>(src: &TexelFormat, view: &SurfaceView<'s>) -> Result<(usize, &'s [u8])> {
    let row_size = geometry::row_size(view.width, src.desc.depth, src.desc.row_alignment);
    let needed = geometry::data_size(row_size, view.height);
    if view.texels.len() < needed {
        return Err(TextureError::Structural(format!(
            "surface holds {} bytes, {}x{} needs {}",
            view.texels.len(),
            view.width,
            view.height,
            needed
        )));
    }
    Ok((row_size, view.texels))
}

/// Re-expresses a raw or palette surface in another raw or palette layout.
///
/// Texels inside both the layer and the source surface are converted, texels of
/// the destination surface outside the layer are written as the cleared color.
pub fn convert_surface(
    src: TexelFormat<'_>,
    view: SurfaceView<'_>,
    layer_width: u32,
    layer_height: u32,
    dst: TexelFormat<'_>,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>> {
    let (src_row_size, texels) = source_rows(&src, &view)?;
    let from = src.dispatcher()?;
    let to = dst.dispatcher()?;

    let dst_row_size = geometry::row_size(dst_width, dst.desc.depth, dst.desc.row_alignment);
    let mut out = vec![0u8; geometry::data_size(dst_row_size, dst_height)];

    let copy_w = layer_width.min(view.width);
    let copy_h = layer_height.min(view.height);

    for y in 0..dst_height {
        let dst_row = &mut out[dst_row_size * y as usize..dst_row_size * (y as usize + 1)];
        let src_row = if y < copy_h {
            let start = src_row_size * y as usize;
            Some(&texels[start..start + src_row_size])
        } else {
            None
        };

        for x in 0..dst_width {
            match src_row {
                Some(row) if x < copy_w => to.set_color(dst_row, x, from.get_color(row, x)),
                _ => to.set_cleared(dst_row, x),
            }
        }
    }

    Ok(out)
}

/// Moves palette indices between palette layouts without touching colors
pub fn copy_palette_indices(
    src: &RasterDescriptor,
    view: SurfaceView<'_>,
    layer_width: u32,
    layer_height: u32,
    dst: &RasterDescriptor,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>> {
    // dummy palettes; only index access is used
    let dummy = [0u8; 4 * 256];
    let src_fmt = TexelFormat {
        desc: *src,
        palette: Some((&dummy[..], 0)),
    };
    let dst_fmt = TexelFormat {
        desc: *dst,
        palette: Some((&dummy[..], 0)),
    };
    let (src_row_size, texels) = source_rows(&src_fmt, &view)?;
    let from = src_fmt.dispatcher()?;
    let to = dst_fmt.dispatcher()?;

    let dst_row_size = geometry::row_size(dst_width, dst.depth, dst.row_alignment);
    let mut out = vec![0u8; geometry::data_size(dst_row_size, dst_height)];

    for y in 0..dst_height.min(layer_height).min(view.height) {
        let start = src_row_size * y as usize;
        let src_row = &texels[start..start + src_row_size];
        let dst_row = &mut out[dst_row_size * y as usize..dst_row_size * (y as usize + 1)];
        for x in 0..dst_width.min(layer_width).min(view.width) {
            if let Some(index) = from.get_index(src_row, x) {
                to.set_index(dst_row, x, index);
            }
        }
    }

    Ok(out)
}

/// Decodes every level into byte-ordered RGBA covering the surface
fn level_to_rgba(pixels: &PixelData, layer: &PixelLayer) -> Result<Vec<u8>> {
    if pixels.format.is_compressed() {
        return compress::decompress_surface(
            &layer.texels,
            pixels.format.compression,
            layer.width,
            layer.height,
        );
    }

    convert_surface(
        TexelFormat::new(pixels.format, pixels.palette.as_ref()),
        SurfaceView {
            texels: &layer.texels,
            width: layer.width,
            height: layer.height,
        },
        layer.width,
        layer.height,
        TexelFormat::raw(RasterDescriptor::rgba8888()),
        layer.width,
        layer.height,
    )
}

fn rgba_texels(bytes: &[u8]) -> &[Rgba8] {
    bytemuck::cast_slice(bytes)
}

/// Whether any visible texel is not fully opaque
pub fn has_translucent_texels(pixels: &PixelData) -> Result<bool> {
    for layer in &pixels.mipmaps {
        let rgba = level_to_rgba(pixels, layer)?;
        let texels = rgba_texels(&rgba);
        for y in 0..layer.layer_height.min(layer.height) as usize {
            let row = &texels[y * layer.width as usize..][..layer.layer_width.min(layer.width) as usize];
            if row.iter().any(|c| c.a != 255) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn can_carry_alpha(desc: &RasterDescriptor) -> bool {
    desc.is_palette() || desc.is_compressed() || desc.raster_format.has_alpha_channel()
}

fn encode_palette(entries: &[Rgba8], dst: &RasterDescriptor) -> Result<PaletteData<'static>> {
    let entry = dst.palette_entry_descriptor();
    let dispatch = ColorDispatcher::new(&entry, None, 0)?;
    let mut data = vec![0u8; geometry::palette_data_size(dst, entries.len())];
    for (i, c) in entries.iter().enumerate() {
        dispatch.set_color(
            &mut data[i * (entry.depth as usize / 8)..],
            0,
            AbstractColor::Rgba(*c),
        );
    }
    Ok(PaletteData::owned(data, entries.len()))
}

fn decode_palette(pixels: &PixelData) -> Result<Vec<Rgba8>> {
    let Some(palette) = &pixels.palette else {
        return Ok(vec![]);
    };
    let entry = pixels.format.palette_entry_descriptor();
    let dispatch = ColorDispatcher::new(&entry, None, 0)?;
    let stride = entry.depth as usize / 8;
    Ok((0..palette.entries)
        .map(|i| {
            palette
                .data
                .get(i * stride..)
                .map(|row| dispatch.get_rgba(row, 0))
                .unwrap_or_default()
        })
        .collect())
}

fn max_index_used(pixels: &PixelData) -> Result<usize> {
    let dispatch = ColorDispatcher::new(
        &pixels.format,
        pixels.palette.as_ref().map(|p| p.data.as_ref()),
        pixels.palette.as_ref().map(|p| p.entries).unwrap_or(0),
    )?;
    let mut max = 0;
    for layer in &pixels.mipmaps {
        let row_size = geometry::row_size(layer.width, pixels.format.depth, pixels.format.row_alignment);
        for y in 0..layer.layer_height {
            let start = row_size * y as usize;
            let row = layer.texels.get(start..start + row_size).unwrap_or(&[]);
            for x in 0..layer.layer_width {
                if let Some(i) = dispatch.get_index(row, x) {
                    max = max.max(i);
                }
            }
        }
    }
    Ok(max)
}

fn to_palette(src: &PixelData, dst: &RasterDescriptor, config: &EngineConfig) -> Result<PixelData<'static>> {
    let max_entries = dst.palette_type.max_entries();
    let mut out = PixelData::new(*dst);
    copy_attributes(src, &mut out, dst);

    if src.format.is_palette() {
        let mut entries = decode_palette(src)?;
        let used = max_index_used(src)?;
        if used < max_entries {
            debug!(
                "Re-indexing {:?} palette into {:?}",
                src.format.palette_type, dst.palette_type
            );
            // entries past the highest index are unused, the target palette is always full size
            entries.resize(max_entries, Rgba8::default());
            out.palette = Some(encode_palette(&entries, dst)?);
            for layer in &src.mipmaps {
                let texels = copy_palette_indices(
                    &src.format,
                    SurfaceView {
                        texels: &layer.texels,
                        width: layer.width,
                        height: layer.height,
                    },
                    layer.layer_width,
                    layer.layer_height,
                    dst,
                    layer.layer_width,
                    layer.layer_height,
                )?;
                out.mipmaps.push(PixelLayer::new(
                    layer.layer_width,
                    layer.layer_height,
                    layer.layer_width,
                    layer.layer_height,
                    Cow::Owned(texels),
                ));
            }
            return Ok(out);
        }
    }

    // all visible texels of every level share one palette
    let mut colors: Vec<Rgba8> = vec![];
    let mut spans = vec![];
    for layer in &src.mipmaps {
        let rgba = level_to_rgba(src, layer)?;
        let texels = rgba_texels(&rgba);
        let start = colors.len();
        for y in 0..layer.layer_height as usize {
            colors.extend_from_slice(&texels[y * layer.width as usize..][..layer.layer_width as usize]);
        }
        spans.push(start..colors.len());
    }

    let Palettized { palette, indices } = palette::palettize(&colors, max_entries, config.palette_quality)?;
    debug!("Palettized {} texels into {} entries", colors.len(), palette.len());
    out.palette = Some(encode_palette(&palette, dst)?);

    let scratch = [0u8; 4 * 256];
    let index_fmt = TexelFormat {
        desc: *dst,
        palette: Some((&scratch[..], 0)),
    };
    let to = index_fmt.dispatcher()?;
    for (layer, span) in src.mipmaps.iter().zip(spans) {
        let row_size = geometry::row_size(layer.layer_width, dst.depth, dst.row_alignment);
        let mut texels = vec![0u8; geometry::data_size(row_size, layer.layer_height)];
        let level_indices = &indices[span];
        for y in 0..layer.layer_height as usize {
            let row = &mut texels[y * row_size..(y + 1) * row_size];
            for x in 0..layer.layer_width as usize {
                to.set_index(row, x as u32, level_indices[y * layer.layer_width as usize + x] as usize);
            }
        }
        out.mipmaps.push(PixelLayer::new(
            layer.layer_width,
            layer.layer_height,
            layer.layer_width,
            layer.layer_height,
            Cow::Owned(texels),
        ));
    }

    Ok(out)
}

/// Raw layout used when block compressed data has to be expanded
pub fn decompression_target(compression: CompressionType, has_alpha: bool, config: &EngineConfig) -> RasterDescriptor {
    if compression == CompressionType::Dxt1 && !has_alpha && config.dxt_packed_decompression {
        RasterDescriptor::raw(RasterFormat::Raster565, 16, ColorOrder::Rgba, 1)
    } else {
        RasterDescriptor::rgba8888()
    }
}

fn copy_attributes(src: &PixelData, out: &mut PixelData, dst: &RasterDescriptor) {
    out.has_alpha = src.has_alpha && can_carry_alpha(dst);
    out.auto_mipmaps = src.auto_mipmaps;
    out.cube_texture = src.cube_texture;
    out.raster_type = src.raster_type;
}

/// Converts whole pixel data into `dst`. Always produces owned buffers.
pub fn convert_pixel_data(
    src: &PixelData,
    dst: &RasterDescriptor,
    config: &EngineConfig,
) -> Result<PixelData<'static>> {
    if let Some(problem) = dst.shape_error() {
        return Err(TextureError::InvalidConfiguration(problem));
    }

    if src.format == *dst {
        return Ok(src.reborrow().into_owned());
    }

    if dst.is_palette() {
        return to_palette(src, dst, config);
    }

    let mut out = PixelData::new(*dst);
    copy_attributes(src, &mut out, dst);

    if src.format.is_compressed() && src.format.compression == dst.compression {
        // only row alignment differs, which block data does not have
        out.mipmaps = src.mipmaps.iter().map(|l| l.reborrow().into_owned()).collect();
        return Ok(out);
    }

    for layer in &src.mipmaps {
        let (dst_w, dst_h) = surface_dimensions(layer.layer_width, layer.layer_height, dst.compression);

        let rgba;
        let (from, view) = if src.format.is_compressed() {
            rgba = level_to_rgba(src, layer)?;
            (
                TexelFormat::raw(RasterDescriptor::rgba8888()),
                SurfaceView {
                    texels: &rgba,
                    width: layer.width,
                    height: layer.height,
                },
            )
        } else {
            (
                TexelFormat::new(src.format, src.palette.as_ref()),
                SurfaceView {
                    texels: &layer.texels,
                    width: layer.width,
                    height: layer.height,
                },
            )
        };

        let texels = if dst.is_compressed() {
            let surface = convert_surface(
                from,
                view,
                layer.layer_width,
                layer.layer_height,
                TexelFormat::raw(RasterDescriptor::rgba8888()),
                dst_w,
                dst_h,
            )?;
            compress::compress_surface(&surface, dst_w, dst_h, dst.compression, config)?
        } else {
            convert_surface(
                from,
                view,
                layer.layer_width,
                layer.layer_height,
                TexelFormat::raw(*dst),
                dst_w,
                dst_h,
            )?
        };

        out.mipmaps.push(PixelLayer::new(
            dst_w,
            dst_h,
            layer.layer_width,
            layer.layer_height,
            Cow::Owned(texels),
        ));
    }

    Ok(out)
}
