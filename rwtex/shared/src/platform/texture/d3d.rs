//! Pieces shared by the Direct3D 8 and Direct3D 9 native textures.

use std::io::{Read, Write};

use rwtex_native::binrw::BinWrite;
use rwtex_native::{
    raster::{ColorOrder, CompressionType, PaletteType, RasterFlags, RasterFormat},
    structural,
};

use super::read_level;
use crate::error::Result;
use crate::mipmap::{MipmapChain, SizeRules};
use crate::pixel::{
    geometry::{surface_data_size, surface_dimensions},
    RasterDescriptor,
};
use crate::textures::MipmapLayer;

/// Rows of uncompressed Direct3D surfaces are DWORD aligned
pub const D3D_ROW_ALIGNMENT: u32 = 4;

/// Direct3D limits textures to 4096 texels per side
pub fn size_rules() -> SizeRules {
    SizeRules {
        maximum: Some(4096),
        ..Default::default()
    }
}

/// Header depth stored for block compressed rasters
pub const DXT_HEADER_DEPTH: u8 = 16;

/// Descriptor of a raster described by RenderWare raster flags
pub fn descriptor_from_flags(
    flags: RasterFlags,
    depth: u8,
    compression: CompressionType,
) -> Result<RasterDescriptor> {
    if compression.is_compressed() {
        return Ok(RasterDescriptor::compressed(compression));
    }

    let format = flags.raster_format().ok_or_else(|| {
        structural!("unknown raster format in flags 0x{:x}", flags.bits())
    })?;

    if flags.has_conflicting_palette() {
        return Err(structural!("raster flags 0x{:x} declare both palette kinds", flags.bits()));
    }

    let depth = depth as u32;
    let desc = match flags.palette_type() {
        PaletteType::None => RasterDescriptor::raw(format, depth, ColorOrder::Bgra, D3D_ROW_ALIGNMENT),
        palette => RasterDescriptor::palette(format, ColorOrder::Rgba, palette, depth, D3D_ROW_ALIGNMENT),
    };

    if let Some(problem) = desc.shape_error() {
        return Err(structural!("{}", problem));
    }
    Ok(desc)
}

/// Raster format recorded in the flags of a DXT raster
pub fn dxt_flag_format(compression: CompressionType, has_alpha: bool) -> RasterFormat {
    match compression {
        CompressionType::Dxt1 if has_alpha => RasterFormat::Raster1555,
        CompressionType::Dxt1 => RasterFormat::Raster565,
        _ => RasterFormat::Raster4444,
    }
}

pub fn header_depth(desc: &RasterDescriptor) -> u8 {
    if desc.is_compressed() {
        DXT_HEADER_DEPTH
    } else {
        desc.depth as u8
    }
}

pub fn compose_flags(desc: &RasterDescriptor, has_alpha: bool, levels: usize, auto_mipmaps: bool) -> RasterFlags {
    let format = if desc.is_compressed() {
        dxt_flag_format(desc.compression, has_alpha)
    } else {
        desc.raster_format
    };
    RasterFlags::compose(format, desc.palette_type, levels > 1, auto_mipmaps)
}

/// Picks the layout a Direct3D texture stores `src` in. `rgba_order` allows
/// the byte ordered 32-bit formats Direct3D 9 added.
pub fn import_target(src: &RasterDescriptor, rgba_order: bool) -> RasterDescriptor {
    if src.is_compressed() {
        if src.compression.is_dxt() {
            return RasterDescriptor::compressed(src.compression);
        }
        return RasterDescriptor::raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra, D3D_ROW_ALIGNMENT);
    }

    if src.is_palette() {
        let entry_format = match src.raster_format {
            RasterFormat::Raster888 => RasterFormat::Raster888,
            _ => RasterFormat::Raster8888,
        };
        let (palette, depth) = match src.palette_type {
            PaletteType::Pal8 => (PaletteType::Pal8, 8),
            PaletteType::Pal4 if src.depth == 8 => (PaletteType::Pal4, 8),
            _ => (PaletteType::Pal4, 4),
        };
        return RasterDescriptor::palette(entry_format, ColorOrder::Rgba, palette, depth, D3D_ROW_ALIGNMENT);
    }

    let bgra = |format, depth| RasterDescriptor::raw(format, depth, ColorOrder::Bgra, D3D_ROW_ALIGNMENT);
    // luminance has no channel order, keep the caller's so the data can move as is
    let lum = |format, depth| RasterDescriptor::raw(format, depth, src.color_order, D3D_ROW_ALIGNMENT);

    match src.raster_format {
        RasterFormat::Raster8888 | RasterFormat::Raster888
            if rgba_order && src.color_order == ColorOrder::Rgba =>
        {
            RasterDescriptor::raw(src.raster_format, 32, ColorOrder::Rgba, D3D_ROW_ALIGNMENT)
        }
        RasterFormat::Raster1555 | RasterFormat::Raster565 | RasterFormat::Raster4444 | RasterFormat::Raster555 => {
            bgra(src.raster_format, 16)
        }
        RasterFormat::Raster8888 | RasterFormat::Raster888 => bgra(src.raster_format, 32),
        RasterFormat::Lum => lum(RasterFormat::Lum, 8),
        RasterFormat::LumAlpha => lum(RasterFormat::LumAlpha, 16),
        RasterFormat::Depth16 => lum(RasterFormat::Depth16, 16),
        RasterFormat::Depth24 => lum(RasterFormat::Depth24, 32),
        RasterFormat::Depth32 => lum(RasterFormat::Depth32, 32),
        RasterFormat::Default => bgra(RasterFormat::Raster8888, 32),
    }
}

pub fn palette_bytes(desc: &RasterDescriptor) -> usize {
    desc.palette_type.max_entries() * 4
}

pub fn read_palette<R: Read>(reader: &mut R, desc: &RasterDescriptor) -> Result<Option<Vec<u8>>> {
    if !desc.is_palette() {
        return Ok(None);
    }
    let mut data = vec![0u8; palette_bytes(desc)];
    reader
        .read_exact(&mut data)
        .map_err(|_| structural!("palette of {} entries is truncated", desc.palette_type.max_entries()))?;
    Ok(Some(data))
}

/// Writes the palette padded to its full entry count
pub fn write_palette<W: Write>(writer: &mut W, desc: &RasterDescriptor, palette: Option<&[u8]>) -> Result<()> {
    if !desc.is_palette() {
        return Ok(());
    }
    let mut data = palette.map(|p| p.to_vec()).unwrap_or_default();
    data.resize(palette_bytes(desc), 0);
    writer.write_all(&data)?;
    Ok(())
}

/// Reads size prefixed levels. `expected` gives the size a level must have,
/// `None` trusts the stored size.
pub fn read_sized_levels<R: Read>(
    reader: &mut R,
    width: u32,
    height: u32,
    count: usize,
    desc: Option<&RasterDescriptor>,
) -> Result<Vec<MipmapLayer>> {
    let mut levels = Vec::with_capacity(count);
    for (i, (w, h)) in MipmapChain::new(width, height).take(count).enumerate() {
        let (sw, sh) = surface_dimensions(w, h, desc.map(|d| d.compression).unwrap_or_default());
        let mut size = [0u8; 4];
        reader
            .read_exact(&mut size)
            .map_err(|_| structural!("size of level {} is truncated", i))?;
        let size = u32::from_le_bytes(size) as usize;

        if let Some(desc) = desc {
            let expected = surface_data_size(desc, sw, sh);
            if size != expected {
                return Err(structural!(
                    "level {} ({}x{}) declares {} bytes, its format needs {}",
                    i,
                    w,
                    h,
                    size,
                    expected
                ));
            }
        }

        let texels = read_level(reader, size, i)?;
        levels.push(MipmapLayer {
            width: sw,
            height: sh,
            layer_width: w,
            layer_height: h,
            texels,
        });
    }
    Ok(levels)
}

pub fn write_sized_levels<W: Write + std::io::Seek>(writer: &mut W, levels: &[MipmapLayer]) -> Result<()> {
    for level in levels {
        (level.texels.len() as u32).write_le(writer)?;
        writer.write_all(&level.texels)?;
    }
    Ok(())
}
