//! Per-texel color access for every uncompressed raster layout.
//!
//! A [`ColorDispatcher`] is built once per surface from a [`RasterDescriptor`]
//! and then reads or writes single texels of a row. Out-of-range reads yield the
//! cleared color and out-of-range writes are dropped, so callers only need to
//! validate buffer sizes once per surface.

use rwtex_native::raster::{ColorOrder, PaletteType, RasterFormat};

use super::{geometry, RasterDescriptor};
use crate::error::{Result, TextureError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn luminance(&self) -> u8 {
        ((self.r as u32 + self.g as u32 + self.b as u32) / 3) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgba,
    Luminance,
}

/// A texel color in the model of the raster it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractColor {
    Rgba(Rgba8),
    Luminance { lum: u8, alpha: u8 },
}

impl AbstractColor {
    pub fn cleared(model: ColorModel) -> Self {
        match model {
            ColorModel::Rgba => Self::Rgba(Rgba8::default()),
            ColorModel::Luminance => Self::Luminance { lum: 0, alpha: 0 },
        }
    }

    pub fn model(&self) -> ColorModel {
        match self {
            Self::Rgba(_) => ColorModel::Rgba,
            Self::Luminance { .. } => ColorModel::Luminance,
        }
    }

    pub fn to_rgba(self) -> Rgba8 {
        match self {
            Self::Rgba(c) => c,
            Self::Luminance { lum, alpha } => Rgba8::new(lum, lum, lum, alpha),
        }
    }

    pub fn to_luminance(self) -> (u8, u8) {
        match self {
            Self::Rgba(c) => (c.luminance(), c.a),
            Self::Luminance { lum, alpha } => (lum, alpha),
        }
    }
}

/// Rescales a channel between bit widths as `value * dst_max / src_max`
pub fn scale_channel(value: u32, src_bits: u32, dst_bits: u32) -> u32 {
    if src_bits == dst_bits {
        return value;
    }
    if src_bits == 0 {
        return 0;
    }
    let src_max = (1u64 << src_bits) - 1;
    let dst_max = (1u64 << dst_bits) - 1;
    let value = (value as u64).min(src_max);
    (value * dst_max / src_max) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Channel {
    shift: u32,
    bits: u32,
}

impl Channel {
    fn get(&self, value: u32) -> u8 {
        let mask = ((1u64 << self.bits) - 1) as u32;
        scale_channel((value >> self.shift) & mask, self.bits, 8) as u8
    }

    fn put(&self, channel: u8) -> u32 {
        scale_channel(channel as u32, 8, self.bits) << self.shift
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PackedLayout {
    bytes: usize,
    r: Channel,
    g: Channel,
    b: Channel,
    a: Option<Channel>,
}

impl PackedLayout {
    /// Channel widths are fixed by the raster format, the order only decides their position
    fn new(format: RasterFormat, depth: u32, order: ColorOrder) -> Option<Self> {
        let (r, g, b, a) = match format {
            RasterFormat::Raster1555 => (5, 5, 5, 1),
            RasterFormat::Raster565 => (5, 6, 5, 0),
            RasterFormat::Raster4444 => (4, 4, 4, 4),
            RasterFormat::Raster8888 => (8, 8, 8, 8),
            // the padding slot is modelled as an alpha-less gap
            RasterFormat::Raster888 => (8, 8, 8, 0),
            RasterFormat::Raster555 => (5, 5, 5, 0),
            _ => return None,
        };

        if !format.accepts_depth(depth) {
            return None;
        }

        let widths: [(char, u32); 4] = match order {
            ColorOrder::Rgba => [('r', r), ('g', g), ('b', b), ('a', a)],
            ColorOrder::Bgra => [('b', b), ('g', g), ('r', r), ('a', a)],
            ColorOrder::Abgr => [('a', a), ('b', b), ('g', g), ('r', r)],
        };

        let mut shift = 0;
        let mut layout = Self {
            bytes: (depth as usize + 7) / 8,
            r: Channel { shift: 0, bits: r },
            g: Channel { shift: 0, bits: g },
            b: Channel { shift: 0, bits: b },
            a: None,
        };

        for (name, bits) in widths {
            let channel = Channel { shift, bits };
            match name {
                'r' => layout.r = channel,
                'g' => layout.g = channel,
                'b' => layout.b = channel,
                _ if bits > 0 => layout.a = Some(channel),
                _ => {
                    // padding of 888/555 occupies whatever sits above the colors
                    if order == ColorOrder::Abgr {
                        shift += depth - (r + g + b);
                    }
                }
            }
            shift += bits;
        }

        Some(layout)
    }

    fn decode(&self, value: u32) -> Rgba8 {
        Rgba8 {
            r: self.r.get(value),
            g: self.g.get(value),
            b: self.b.get(value),
            a: self.a.map(|a| a.get(value)).unwrap_or(255),
        }
    }

    fn encode(&self, color: Rgba8) -> u32 {
        let mut value = self.r.put(color.r) | self.g.put(color.g) | self.b.put(color.b);
        if let Some(a) = self.a {
            value |= a.put(color.a);
        }
        value
    }
}

/// Channel bit masks `[r, g, b, a]` of a packed raw layout
pub fn packed_masks(format: RasterFormat, depth: u32, order: ColorOrder) -> Option<[u32; 4]> {
    let layout = PackedLayout::new(format, depth, order)?;
    let mask = |c: Channel| (((1u64 << c.bits) - 1) as u32) << c.shift;
    Some([
        mask(layout.r),
        mask(layout.g),
        mask(layout.b),
        layout.a.map(mask).unwrap_or(0),
    ])
}

#[derive(Debug, Clone)]
struct PaletteLookup<'a> {
    data: &'a [u8],
    entries: usize,
    entry: PackedLayout,
}

impl PaletteLookup<'_> {
    fn color(&self, index: usize) -> Rgba8 {
        if index >= self.entries {
            return Rgba8::default();
        }
        let offset = index * self.entry.bytes;
        match read_le(self.data, offset, self.entry.bytes) {
            Some(value) => self.entry.decode(value),
            None => Rgba8::default(),
        }
    }

    fn nearest(&self, color: Rgba8) -> usize {
        let mut best = 0;
        let mut best_distance = u32::MAX;
        for index in 0..self.entries {
            let entry = self.color(index);
            let distance = color_distance(entry, color);
            if distance < best_distance {
                best = index;
                best_distance = distance;
                if distance == 0 {
                    break;
                }
            }
        }
        best
    }
}

pub(crate) fn color_distance(a: Rgba8, b: Rgba8) -> u32 {
    let d = |x: u8, y: u8| {
        let v = x as i32 - y as i32;
        (v * v) as u32
    };
    d(a.r, b.r) + d(a.g, b.g) + d(a.b, b.b) + d(a.a, b.a)
}

#[derive(Debug, Clone)]
enum Layout<'a> {
    Packed(PackedLayout),
    /// 4-bit luminance, first texel in the high nibble
    Lum4,
    Lum8,
    /// Low nibble luminance, high nibble alpha
    LumAlpha44,
    /// Luminance byte then alpha byte
    LumAlpha88,
    /// Depth values shown as luminance
    DepthValue {
        bytes: usize,
        bits: u32,
    },
    Palette {
        index_depth: u32,
        lsb_first: bool,
        lookup: PaletteLookup<'a>,
    },
}

#[derive(Debug, Clone)]
pub struct ColorDispatcher<'a> {
    layout: Layout<'a>,
}

fn read_le(data: &[u8], offset: usize, bytes: usize) -> Option<u32> {
    let slice = data.get(offset..offset + bytes)?;
    Some(
        slice
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (i * 8)),
    )
}

fn write_le(data: &mut [u8], offset: usize, bytes: usize, value: u32) {
    if let Some(slice) = data.get_mut(offset..offset + bytes) {
        for (i, b) in slice.iter_mut().enumerate() {
            *b = (value >> (i * 8)) as u8;
        }
    }
}

fn read_nibble(row: &[u8], x: u32, lsb_first: bool) -> Option<u8> {
    let byte = *row.get(x as usize / 2)?;
    let low = (x % 2 == 0) == lsb_first;
    Some(if low { byte & 0x0F } else { byte >> 4 })
}

fn write_nibble(row: &mut [u8], x: u32, lsb_first: bool, value: u8) {
    if let Some(byte) = row.get_mut(x as usize / 2) {
        let low = (x % 2 == 0) == lsb_first;
        if low {
            *byte = (*byte & 0xF0) | (value & 0x0F);
        } else {
            *byte = (*byte & 0x0F) | (value << 4);
        }
    }
}

impl<'a> ColorDispatcher<'a> {
    /// `palette` is required for palette rasters and holds `palette_size` entries
    /// in the descriptor's raster format and color order
    pub fn new(
        desc: &RasterDescriptor,
        palette: Option<&'a [u8]>,
        palette_size: usize,
    ) -> Result<Self> {
        if desc.is_compressed() {
            return Err(TextureError::Internal(format!(
                "{:?} rasters cannot be accessed per texel",
                desc.compression
            )));
        }

        if let Some(problem) = desc.shape_error() {
            return Err(TextureError::Structural(problem));
        }

        let layout = if desc.palette_type.is_palette() {
            let entry = PackedLayout::new(
                desc.raster_format,
                desc.palette_entry_depth(),
                desc.color_order,
            )
            .ok_or_else(|| {
                TextureError::Structural(format!(
                    "unsupported palette entry format {:?}",
                    desc.raster_format
                ))
            })?;

            let data = palette.ok_or_else(|| {
                TextureError::Structural("palette raster without palette data".to_string())
            })?;

            // undersized palettes are tolerated, missing entries read as cleared
            let entries = palette_size.min(data.len() / entry.bytes);

            Layout::Palette {
                index_depth: desc.depth,
                lsb_first: desc.palette_type == PaletteType::Pal4Lsb,
                lookup: PaletteLookup {
                    data,
                    entries,
                    entry,
                },
            }
        } else {
            match (desc.raster_format, desc.depth) {
                (RasterFormat::Lum, 4) => Layout::Lum4,
                (RasterFormat::Lum, 8) => Layout::Lum8,
                (RasterFormat::LumAlpha, 8) => Layout::LumAlpha44,
                (RasterFormat::LumAlpha, 16) => Layout::LumAlpha88,
                (RasterFormat::Depth16, d) | (RasterFormat::Depth24, d) | (RasterFormat::Depth32, d) => {
                    Layout::DepthValue {
                        bytes: d as usize / 8,
                        bits: desc.raster_format.natural_depth(),
                    }
                }
                (format, depth) => Layout::Packed(
                    PackedLayout::new(format, depth, desc.color_order).ok_or_else(|| {
                        TextureError::Structural(format!(
                            "cannot interpret {:?} texels at depth {}",
                            format, depth
                        ))
                    })?,
                ),
            }
        };

        Ok(Self { layout })
    }

    pub fn model(&self) -> ColorModel {
        match self.layout {
            Layout::Lum4
            | Layout::Lum8
            | Layout::LumAlpha44
            | Layout::LumAlpha88
            | Layout::DepthValue { .. } => ColorModel::Luminance,
            Layout::Packed(_) | Layout::Palette { .. } => ColorModel::Rgba,
        }
    }

    pub fn is_palette(&self) -> bool {
        matches!(self.layout, Layout::Palette { .. })
    }

    pub fn palette_entries(&self) -> usize {
        match &self.layout {
            Layout::Palette { lookup, .. } => lookup.entries,
            _ => 0,
        }
    }

    /// Palette index of a texel, `None` for non-palette rasters
    pub fn get_index(&self, row: &[u8], x: u32) -> Option<usize> {
        match &self.layout {
            Layout::Palette {
                index_depth,
                lsb_first,
                ..
            } => {
                let index = if *index_depth == 4 {
                    read_nibble(row, x, *lsb_first)?
                } else {
                    *row.get(x as usize)?
                };
                Some(index as usize)
            }
            _ => None,
        }
    }

    pub fn set_index(&self, row: &mut [u8], x: u32, index: usize) {
        if let Layout::Palette {
            index_depth,
            lsb_first,
            ..
        } = &self.layout
        {
            if *index_depth == 4 {
                write_nibble(row, x, *lsb_first, index as u8);
            } else if let Some(byte) = row.get_mut(x as usize) {
                *byte = index as u8;
            }
        }
    }

    pub fn get_color(&self, row: &[u8], x: u32) -> AbstractColor {
        let cleared = AbstractColor::cleared(self.model());
        let x_bytes = x as usize;
        match &self.layout {
            Layout::Packed(packed) => read_le(row, x_bytes * packed.bytes, packed.bytes)
                .map(|v| AbstractColor::Rgba(packed.decode(v)))
                .unwrap_or(cleared),
            Layout::Lum4 => read_nibble(row, x, false)
                .map(|v| AbstractColor::Luminance {
                    lum: v * 17,
                    alpha: 255,
                })
                .unwrap_or(cleared),
            Layout::Lum8 => row
                .get(x_bytes)
                .map(|v| AbstractColor::Luminance {
                    lum: *v,
                    alpha: 255,
                })
                .unwrap_or(cleared),
            Layout::LumAlpha44 => row
                .get(x_bytes)
                .map(|v| AbstractColor::Luminance {
                    lum: (v & 0x0F) * 17,
                    alpha: (v >> 4) * 17,
                })
                .unwrap_or(cleared),
            Layout::LumAlpha88 => match row.get(x_bytes * 2..x_bytes * 2 + 2) {
                Some(v) => AbstractColor::Luminance {
                    lum: v[0],
                    alpha: v[1],
                },
                None => cleared,
            },
            Layout::DepthValue { bytes, bits } => read_le(row, x_bytes * bytes, *bytes)
                .map(|v| AbstractColor::Luminance {
                    lum: scale_channel(v, *bits, 8) as u8,
                    alpha: 255,
                })
                .unwrap_or(cleared),
            Layout::Palette { lookup, .. } => match self.get_index(row, x) {
                Some(index) => AbstractColor::Rgba(lookup.color(index)),
                None => cleared,
            },
        }
    }

    pub fn get_rgba(&self, row: &[u8], x: u32) -> Rgba8 {
        self.get_color(row, x).to_rgba()
    }

    /// Writes `color` converted into this raster's color model. Palette rasters
    /// receive the index of the closest palette entry.
    pub fn set_color(&self, row: &mut [u8], x: u32, color: AbstractColor) {
        let x_bytes = x as usize;
        match &self.layout {
            Layout::Packed(packed) => {
                write_le(row, x_bytes * packed.bytes, packed.bytes, packed.encode(color.to_rgba()))
            }
            Layout::Lum4 => {
                let (lum, _) = color.to_luminance();
                write_nibble(row, x, false, scale_channel(lum as u32, 8, 4) as u8);
            }
            Layout::Lum8 => {
                if let Some(byte) = row.get_mut(x_bytes) {
                    *byte = color.to_luminance().0;
                }
            }
            Layout::LumAlpha44 => {
                let (lum, alpha) = color.to_luminance();
                if let Some(byte) = row.get_mut(x_bytes) {
                    *byte = scale_channel(lum as u32, 8, 4) as u8
                        | (scale_channel(alpha as u32, 8, 4) as u8) << 4;
                }
            }
            Layout::LumAlpha88 => {
                let (lum, alpha) = color.to_luminance();
                if let Some(slice) = row.get_mut(x_bytes * 2..x_bytes * 2 + 2) {
                    slice[0] = lum;
                    slice[1] = alpha;
                }
            }
            Layout::DepthValue { bytes, bits } => {
                let (lum, _) = color.to_luminance();
                write_le(row, x_bytes * bytes, *bytes, scale_channel(lum as u32, 8, *bits));
            }
            Layout::Palette { lookup, .. } => {
                let index = lookup.nearest(color.to_rgba());
                self.set_index(row, x, index);
            }
        }
    }

    pub fn set_cleared(&self, row: &mut [u8], x: u32) {
        match &self.layout {
            Layout::Palette { .. } => self.set_index(row, x, 0),
            _ => self.set_color(row, x, AbstractColor::cleared(self.model())),
        }
    }
}

fn texel_row<'b>(
    texels: &'b [u8],
    y: u32,
    width: u32,
    desc: &RasterDescriptor,
) -> Result<&'b [u8]> {
    let row_size = geometry::row_size(width, desc.depth, desc.row_alignment);
    let start = row_size * y as usize;
    texels.get(start..start + row_size).ok_or_else(|| {
        TextureError::InvalidConfiguration(format!("row {} lies outside the texel buffer", y))
    })
}

/// Reads one texel of a linear surface as RGBA
pub fn browse_texel_rgba(
    texels: &[u8],
    x: u32,
    y: u32,
    width: u32,
    desc: &RasterDescriptor,
    palette: Option<&[u8]>,
    palette_size: usize,
) -> Result<Rgba8> {
    if x >= width {
        return Err(TextureError::InvalidConfiguration(format!(
            "column {} outside a surface {} texels wide",
            x, width
        )));
    }
    let dispatch = ColorDispatcher::new(desc, palette, palette_size)?;
    Ok(dispatch.get_rgba(texel_row(texels, y, width, desc)?, x))
}

/// Writes one texel of a linear, non-palette surface
pub fn put_texel_rgba(
    texels: &mut [u8],
    x: u32,
    y: u32,
    width: u32,
    desc: &RasterDescriptor,
    color: Rgba8,
) -> Result<()> {
    if desc.is_palette() {
        return Err(TextureError::InvalidConfiguration(
            "cannot put colors into a palette raster without its palette".to_string(),
        ));
    }
    if x >= width {
        return Err(TextureError::InvalidConfiguration(format!(
            "column {} outside a surface {} texels wide",
            x, width
        )));
    }
    let dispatch = ColorDispatcher::new(desc, None, 0)?;
    let row_size = geometry::row_size(width, desc.depth, desc.row_alignment);
    let start = row_size * y as usize;
    let row = texels.get_mut(start..start + row_size).ok_or_else(|| {
        TextureError::InvalidConfiguration(format!("row {} lies outside the texel buffer", y))
    })?;
    dispatch.set_color(row, x, AbstractColor::Rgba(color));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(format: RasterFormat, depth: u32, order: ColorOrder) -> RasterDescriptor {
        RasterDescriptor::raw(format, depth, order, 1)
    }

    #[test]
    fn scaling() {
        assert_eq!(scale_channel(31, 5, 8), 255);
        assert_eq!(scale_channel(0, 5, 8), 0);
        // 1 * 255 / 31 = 8.2 and 16 * 255 / 31 = 131.6 both truncate
        assert_eq!(scale_channel(1, 5, 8), 8);
        assert_eq!(scale_channel(16, 5, 8), 131);
        assert_eq!(scale_channel(8, 8, 5), 0);
        assert_eq!(scale_channel(254, 8, 1), 0);
        assert_eq!(scale_channel(255, 8, 5), 31);
        assert_eq!(scale_channel(1, 1, 8), 255);
        assert_eq!(scale_channel(0xF, 4, 8), 0xFF);
        assert_eq!(scale_channel(200, 8, 8), 200);
    }

    #[test]
    fn d3d_a1r5g5b5() {
        let desc = raw(RasterFormat::Raster1555, 16, ColorOrder::Bgra);
        let d = ColorDispatcher::new(&desc, None, 0).unwrap();
        // opaque pure red
        let row = 0xFC00u16.to_le_bytes();
        assert_eq!(d.get_rgba(&row, 0), Rgba8::new(255, 0, 0, 255));

        let mut out = [0u8; 2];
        d.set_color(&mut out, 0, AbstractColor::Rgba(Rgba8::new(0, 0, 255, 0)));
        assert_eq!(u16::from_le_bytes(out), 0x001F);
    }

    #[test]
    fn gl_rgba5551() {
        let desc = raw(RasterFormat::Raster1555, 16, ColorOrder::Abgr);
        let d = ColorDispatcher::new(&desc, None, 0).unwrap();
        // r in the top five bits, alpha in bit zero
        let row = 0xF801u16.to_le_bytes();
        assert_eq!(d.get_rgba(&row, 0), Rgba8::new(255, 0, 0, 255));
    }

    #[test]
    fn byte_ordered_8888() {
        let rgba = raw(RasterFormat::Raster8888, 32, ColorOrder::Rgba);
        let bgra = raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra);
        let row = [1u8, 2, 3, 4];
        let a = ColorDispatcher::new(&rgba, None, 0).unwrap();
        let b = ColorDispatcher::new(&bgra, None, 0).unwrap();
        assert_eq!(a.get_rgba(&row, 0), Rgba8::new(1, 2, 3, 4));
        assert_eq!(b.get_rgba(&row, 0), Rgba8::new(3, 2, 1, 4));
    }

    #[test]
    fn padded_formats_read_opaque_and_write_zero_padding() {
        let desc = raw(RasterFormat::Raster888, 32, ColorOrder::Bgra);
        let d = ColorDispatcher::new(&desc, None, 0).unwrap();
        let row = [10u8, 20, 30, 0];
        assert_eq!(d.get_rgba(&row, 0), Rgba8::new(30, 20, 10, 255));

        let mut out = [0xAAu8; 4];
        d.set_color(&mut out, 0, AbstractColor::Rgba(Rgba8::new(1, 2, 3, 4)));
        assert_eq!(out, [3, 2, 1, 0]);

        let packed24 = raw(RasterFormat::Raster888, 24, ColorOrder::Rgba);
        let d = ColorDispatcher::new(&packed24, None, 0).unwrap();
        let row = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(d.get_rgba(&row, 1), Rgba8::new(4, 5, 6, 255));
    }

    #[test]
    fn luminance_layouts() {
        let lum4 = ColorDispatcher::new(&raw(RasterFormat::Lum, 4, ColorOrder::Rgba), None, 0).unwrap();
        assert_eq!(
            lum4.get_color(&[0xF0], 0),
            AbstractColor::Luminance { lum: 255, alpha: 255 }
        );
        assert_eq!(
            lum4.get_color(&[0xF0], 1),
            AbstractColor::Luminance { lum: 0, alpha: 255 }
        );

        let la44 =
            ColorDispatcher::new(&raw(RasterFormat::LumAlpha, 8, ColorOrder::Rgba), None, 0).unwrap();
        assert_eq!(
            la44.get_color(&[0x3F], 0),
            AbstractColor::Luminance { lum: 255, alpha: 51 }
        );

        let la88 =
            ColorDispatcher::new(&raw(RasterFormat::LumAlpha, 16, ColorOrder::Rgba), None, 0).unwrap();
        assert_eq!(la88.get_rgba(&[9, 200], 0), Rgba8::new(9, 9, 9, 200));

        let mut out = [0u8; 2];
        la88.set_color(&mut out, 0, AbstractColor::Rgba(Rgba8::new(30, 60, 90, 7)));
        assert_eq!(out, [60, 7]);
    }

    #[test]
    fn depth_reads_as_luminance() {
        let d = ColorDispatcher::new(&raw(RasterFormat::Depth16, 16, ColorOrder::Rgba), None, 0).unwrap();
        assert_eq!(
            d.get_color(&0xFFFFu16.to_le_bytes(), 0),
            AbstractColor::Luminance { lum: 255, alpha: 255 }
        );
    }

    #[test]
    fn palettes() {
        let desc = RasterDescriptor::palette(
            RasterFormat::Raster8888,
            ColorOrder::Rgba,
            PaletteType::Pal4,
            4,
            1,
        );
        let palette = [0u8, 0, 0, 255, 255, 255, 255, 255];
        let d = ColorDispatcher::new(&desc, Some(&palette), 2).unwrap();
        let row = [0x12u8];
        assert_eq!(d.get_index(&row, 0), Some(1));
        assert_eq!(d.get_rgba(&row, 0), Rgba8::new(255, 255, 255, 255));
        // index 2 does not exist in a two entry palette
        assert_eq!(d.get_rgba(&row, 1), Rgba8::default());

        let mut lsb = desc;
        lsb.palette_type = PaletteType::Pal4Lsb;
        let d = ColorDispatcher::new(&lsb, Some(&palette), 2).unwrap();
        assert_eq!(d.get_index(&row, 0), Some(2));
        assert_eq!(d.get_index(&row, 1), Some(1));

        let mut out = [0u8];
        d.set_color(&mut out, 1, AbstractColor::Rgba(Rgba8::new(250, 250, 250, 255)));
        assert_eq!(out, [0x10]);
    }

    #[test]
    fn pal4_stored_one_index_per_byte() {
        let desc = RasterDescriptor::palette(
            RasterFormat::Raster8888,
            ColorOrder::Bgra,
            PaletteType::Pal4,
            8,
            4,
        );
        let palette = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let d = ColorDispatcher::new(&desc, Some(&palette), 2).unwrap();
        assert_eq!(d.get_rgba(&[1, 0, 0, 0], 0), Rgba8::new(7, 6, 5, 8));
    }

    #[test]
    fn palette_without_data_is_structural() {
        let desc = RasterDescriptor::palette(
            RasterFormat::Raster8888,
            ColorOrder::Rgba,
            PaletteType::Pal8,
            8,
            1,
        );
        assert!(matches!(
            ColorDispatcher::new(&desc, None, 0),
            Err(TextureError::Structural(_))
        ));
    }

    #[test]
    fn short_rows_read_cleared() {
        let d = ColorDispatcher::new(&RasterDescriptor::rgba8888(), None, 0).unwrap();
        assert_eq!(d.get_rgba(&[1, 2], 0), Rgba8::default());
        let mut row = [0u8; 2];
        d.set_color(&mut row, 0, AbstractColor::Rgba(Rgba8::new(1, 1, 1, 1)));
        assert_eq!(row, [0, 0]);
    }

    #[test]
    fn texel_abi() {
        let desc = RasterDescriptor::raw(RasterFormat::Raster565, 16, ColorOrder::Bgra, 4);
        let mut texels = vec![0u8; 8 * 2];
        put_texel_rgba(&mut texels, 2, 1, 3, &desc, Rgba8::new(0, 255, 0, 255)).unwrap();
        assert_eq!(&texels[12..14], &0x07E0u16.to_le_bytes());
        assert_eq!(
            browse_texel_rgba(&texels, 2, 1, 3, &desc, None, 0).unwrap(),
            Rgba8::new(0, 255, 0, 255)
        );
        assert!(browse_texel_rgba(&texels, 3, 0, 3, &desc, None, 0).is_err());
        assert!(browse_texel_rgba(&texels, 0, 2, 3, &desc, None, 0).is_err());
    }
}
