//! `D3DFMT_A4L4` support for the Direct3D 9 adapter: four bits of alpha over
//! four bits of luminance in every byte.

use rwtex_native::{d3d::D3dFormat, invalid_config};
use rwtex_shared::{
    error::Result,
    pixel::{geometry, RasterDescriptor},
    platform::handlers::{browse_texel_rgba, put_texel_rgba, D3dFormatHandler, Rgba8},
};
use tracing::trace;

/// Native rows are DWORD aligned
const ROW_ALIGNMENT: u32 = 4;

#[derive(Debug, Default, Clone, Copy)]
pub struct A4L4Handler;

impl A4L4Handler {
    fn check_sizes(native: usize, rgba: usize, width: u32, height: u32) -> Result<()> {
        let native_needed = geometry::data_size(geometry::row_size(width, 8, ROW_ALIGNMENT), height);
        let rgba_needed = width as usize * height as usize * 4;
        if native < native_needed || rgba < rgba_needed {
            return Err(invalid_config!(
                "A4L4 surface of {}x{} needs {} native and {} RGBA bytes, got {} and {}",
                width,
                height,
                native_needed,
                rgba_needed,
                native,
                rgba
            ));
        }
        Ok(())
    }
}

fn to_nibble(value: u8) -> u8 {
    ((value as u32 * 15 + 127) / 255) as u8
}

impl D3dFormatHandler for A4L4Handler {
    fn format(&self) -> u32 {
        D3dFormat::A4L4 as u32
    }

    fn depth(&self) -> u32 {
        8
    }

    fn convert_to_rw(&self, texels: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
        Self::check_sizes(texels.len(), rgba.len(), width, height)?;
        let out = RasterDescriptor::rgba8888();
        let stride = geometry::row_size(width, 8, ROW_ALIGNMENT);
        for y in 0..height {
            let row = &texels[y as usize * stride..];
            for x in 0..width {
                let texel = row[x as usize];
                let lum = (texel & 0x0F) * 17;
                let alpha = (texel >> 4) * 17;
                put_texel_rgba(rgba, x, y, width, &out, Rgba8::new(lum, lum, lum, alpha))?;
            }
        }
        trace!("Expanded {}x{} A4L4 texels", width, height);
        Ok(())
    }

    fn convert_from_rw(&self, rgba: &[u8], width: u32, height: u32, texels: &mut [u8]) -> Result<()> {
        Self::check_sizes(texels.len(), rgba.len(), width, height)?;
        let src = RasterDescriptor::rgba8888();
        let stride = geometry::row_size(width, 8, ROW_ALIGNMENT);
        for y in 0..height {
            for x in 0..width {
                let color = browse_texel_rgba(rgba, x, y, width, &src, None, 0)?;
                let lum = ((color.r as u32 + color.g as u32 + color.b as u32) / 3) as u8;
                texels[y as usize * stride + x as usize] = to_nibble(color.a) << 4 | to_nibble(lum);
            }
        }
        Ok(())
    }
}
