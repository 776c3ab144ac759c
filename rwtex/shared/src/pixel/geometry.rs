use rwtex_native::raster::CompressionType;

use super::RasterDescriptor;

/// Bytes per row of `width` texels at `depth` bits, padded to `alignment`.
/// `None` when the row does not fit the address space.
pub fn checked_row_size(width: u32, depth: u32, alignment: u32) -> Option<usize> {
    let bytes = (width as usize).checked_mul(depth as usize)?.checked_add(7)? / 8;
    let alignment = alignment.max(1) as usize;
    Some(bytes.checked_add(alignment - 1)? / alignment * alignment)
}

/// Saturating form of [`checked_row_size`]
pub fn row_size(width: u32, depth: u32, alignment: u32) -> usize {
    checked_row_size(width, depth, alignment).unwrap_or(usize::MAX)
}

pub fn data_size(row_size: usize, height: u32) -> usize {
    row_size.saturating_mul(height as usize)
}

pub fn aligned_dim(dim: u32, granularity: u32) -> u32 {
    let granularity = granularity.max(1);
    ((dim.max(1) - 1) / granularity + 1).saturating_mul(granularity)
}

/// PowerVR decoders refuse to work below one full block of their quad grid
pub fn pvrtc_minimum(compression: CompressionType) -> (u32, u32) {
    match compression {
        CompressionType::Pvrtc2 => (16, 8),
        CompressionType::Pvrtc4 => (8, 8),
        _ => (1, 1),
    }
}

/// Surface dimensions that back a layer of the given logical size
pub fn surface_dimensions(layer_width: u32, layer_height: u32, compression: CompressionType) -> (u32, u32) {
    if compression.is_pvrtc() {
        let (min_w, min_h) = pvrtc_minimum(compression);
        return (layer_width.max(min_w), layer_height.max(min_h));
    }

    let (bw, bh) = compression.block_dimensions();
    (aligned_dim(layer_width, bw), aligned_dim(layer_height, bh))
}

pub fn checked_compressed_data_size(width: u32, height: u32, compression: CompressionType) -> Option<usize> {
    if compression.is_pvrtc() {
        let (min_w, min_h) = pvrtc_minimum(compression);
        let texels = (width.max(min_w) as usize).checked_mul(height.max(min_h) as usize)?;
        return Some(texels.checked_mul(compression.bits_per_texel() as usize)? / 8);
    }

    let (bw, bh) = compression.block_dimensions();
    let (bw, bh) = (bw.max(1), bh.max(1));
    let blocks_x = (width.max(1) - 1) / bw + 1;
    let blocks_y = (height.max(1) - 1) / bh + 1;
    (blocks_x as usize)
        .checked_mul(blocks_y as usize)?
        .checked_mul(compression.block_bytes() as usize)
}

/// Saturating form of [`checked_compressed_data_size`]
pub fn compressed_data_size(width: u32, height: u32, compression: CompressionType) -> usize {
    checked_compressed_data_size(width, height, compression).unwrap_or(usize::MAX)
}

/// Number of texel bytes a surface of the described format occupies
pub fn checked_surface_data_size(desc: &RasterDescriptor, surface_width: u32, surface_height: u32) -> Option<usize> {
    if desc.is_compressed() {
        checked_compressed_data_size(surface_width, surface_height, desc.compression)
    } else {
        checked_row_size(surface_width, desc.depth, desc.row_alignment)?.checked_mul(surface_height as usize)
    }
}

/// Saturating form of [`checked_surface_data_size`]
pub fn surface_data_size(desc: &RasterDescriptor, surface_width: u32, surface_height: u32) -> usize {
    checked_surface_data_size(desc, surface_width, surface_height).unwrap_or(usize::MAX)
}

pub fn palette_data_size(desc: &RasterDescriptor, entries: usize) -> usize {
    entries * (desc.palette_entry_depth() as usize / 8)
}
