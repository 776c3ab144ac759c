//! Texel address remapping for tiled console layouts.

use crate::error::{Result, TextureError};

/// Which coordinate supplies the lower bit of every interleaved pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedTile {
    /// XBOX swizzle
    XFirst,
    /// PowerVR twiddle
    YFirst,
}

impl PackedTile {
    /// Linear texel index of `(x, y)` in the swizzled layout.
    /// Both dimensions must be powers of two.
    pub fn swizzle(&self, x: u32, y: u32, width: u32, height: u32) -> u32 {
        let (lo, hi) = match self {
            Self::XFirst => (x, y),
            Self::YFirst => (y, x),
        };

        let min_dim = width.min(height);
        let mut offset = 0;
        let mut shift = 0;

        let mut mask = 1;
        while mask < min_dim {
            offset |= (((hi & mask) << 1) | (lo & mask)) << shift;
            shift += 1;
            mask <<= 1;
        }

        // One of the two has run out of bits, the other continues linearly
        offset |= ((x | y) >> shift) << (shift * 2);
        offset
    }

    pub fn unswizzle(&self, index: u32, width: u32, height: u32) -> (u32, u32) {
        let min_dim = width.min(height);
        let (mut lo, mut hi) = (0, 0);
        let mut shift = 0;

        let mut mask = 1;
        while mask < min_dim {
            lo |= ((index >> (2 * shift)) & 1) << shift;
            hi |= ((index >> (2 * shift + 1)) & 1) << shift;
            shift += 1;
            mask <<= 1;
        }

        let rest = (index >> (2 * shift)) << shift;
        let (mut x, mut y) = match self {
            Self::XFirst => (lo, hi),
            Self::YFirst => (hi, lo),
        };
        if width > height {
            x |= rest;
        } else {
            y |= rest;
        }
        (x, y)
    }
}

/// GameCube style tiling: the surface is cut into `tile_width`x`tile_height`
/// tiles stored row by row, texels within a tile are linear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterTiling {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Surface width rounded up to whole tiles
    pub surface_width: u32,
}

impl ClusterTiling {
    pub fn new(tile_width: u32, tile_height: u32, width: u32) -> Self {
        let tiles_x = (width.max(1) + tile_width - 1) / tile_width;
        Self {
            tile_width,
            tile_height,
            surface_width: tiles_x * tile_width,
        }
    }

    fn tiles_x(&self) -> u32 {
        self.surface_width / self.tile_width
    }

    pub fn tile_texels(&self) -> u32 {
        self.tile_width * self.tile_height
    }

    /// `(tile index, texel index inside the tile)`
    pub fn locate(&self, x: u32, y: u32) -> (u32, u32) {
        let tile = (y / self.tile_height) * self.tiles_x() + x / self.tile_width;
        let inner = (y % self.tile_height) * self.tile_width + x % self.tile_width;
        (tile, inner)
    }

    pub fn texel_index(&self, x: u32, y: u32) -> u32 {
        let (tile, inner) = self.locate(x, y);
        tile * self.tile_texels() + inner
    }

    pub fn texel_coord(&self, index: u32) -> (u32, u32) {
        let tile = index / self.tile_texels();
        let inner = index % self.tile_texels();
        let x = (tile % self.tiles_x()) * self.tile_width + inner % self.tile_width;
        let y = (tile / self.tiles_x()) * self.tile_height + inner / self.tile_width;
        (x, y)
    }
}

fn get_texel(data: &[u8], index: usize, depth: u32) -> Option<u32> {
    if depth == 4 {
        let byte = *data.get(index / 2)?;
        Some(if index % 2 == 0 { byte >> 4 } else { byte & 0x0F } as u32)
    } else {
        let bytes = depth as usize / 8;
        let slice = data.get(index * bytes..(index + 1) * bytes)?;
        Some(
            slice
                .iter()
                .enumerate()
                .fold(0, |acc, (i, b)| acc | (*b as u32) << (i * 8)),
        )
    }
}

fn put_texel(data: &mut [u8], index: usize, depth: u32, value: u32) {
    if depth == 4 {
        if let Some(byte) = data.get_mut(index / 2) {
            if index % 2 == 0 {
                *byte = (*byte & 0x0F) | ((value as u8) << 4);
            } else {
                *byte = (*byte & 0xF0) | (value as u8 & 0x0F);
            }
        }
    } else {
        let bytes = depth as usize / 8;
        if let Some(slice) = data.get_mut(index * bytes..(index + 1) * bytes) {
            for (i, b) in slice.iter_mut().enumerate() {
                *b = (value >> (i * 8)) as u8;
            }
        }
    }
}

fn check_surface(len: usize, width: u32, height: u32, depth: u32) -> Result<()> {
    if !width.is_power_of_two() || !height.is_power_of_two() {
        return Err(TextureError::Structural(format!(
            "swizzled surfaces must be powers of two, got {}x{}",
            width, height
        )));
    }
    if !matches!(depth, 4 | 8 | 16 | 24 | 32) {
        return Err(TextureError::Internal(format!(
            "cannot swizzle {} bit texels",
            depth
        )));
    }
    let needed = (width as usize * height as usize * depth as usize + 7) / 8;
    if len < needed {
        return Err(TextureError::Structural(format!(
            "swizzled surface holds {} bytes, {} needed",
            len, needed
        )));
    }
    Ok(())
}

/// Linear rows (no padding) to swizzled order
pub fn swizzle_surface(linear: &[u8], width: u32, height: u32, depth: u32, policy: PackedTile) -> Result<Vec<u8>> {
    check_surface(linear.len(), width, height, depth)?;
    let mut out = vec![0u8; (width as usize * height as usize * depth as usize + 7) / 8];
    for y in 0..height {
        for x in 0..width {
            let value = get_texel(linear, (y * width + x) as usize, depth).unwrap_or(0);
            put_texel(&mut out, policy.swizzle(x, y, width, height) as usize, depth, value);
        }
    }
    Ok(out)
}

pub fn unswizzle_surface(swizzled: &[u8], width: u32, height: u32, depth: u32, policy: PackedTile) -> Result<Vec<u8>> {
    check_surface(swizzled.len(), width, height, depth)?;
    let mut out = vec![0u8; (width as usize * height as usize * depth as usize + 7) / 8];
    for y in 0..height {
        for x in 0..width {
            let value =
                get_texel(swizzled, policy.swizzle(x, y, width, height) as usize, depth).unwrap_or(0);
            put_texel(&mut out, (y * width + x) as usize, depth, value);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xbox_order() {
        let p = PackedTile::XFirst;
        assert_eq!(p.swizzle(0, 0, 4, 4), 0);
        assert_eq!(p.swizzle(1, 0, 4, 4), 1);
        assert_eq!(p.swizzle(0, 1, 4, 4), 2);
        assert_eq!(p.swizzle(1, 1, 4, 4), 3);
        assert_eq!(p.swizzle(2, 0, 4, 4), 4);
        // wide surfaces continue linearly in x past the square part
        assert_eq!(p.swizzle(4, 0, 8, 4), 16);
        assert_eq!(PackedTile::YFirst.swizzle(0, 1, 4, 4), 1);
    }

    #[test]
    fn packed_tile_inverse() {
        for policy in [PackedTile::XFirst, PackedTile::YFirst] {
            for (w, h) in [(1, 1), (4, 4), (8, 2), (2, 16), (32, 8)] {
                let mut seen = vec![false; (w * h) as usize];
                for y in 0..h {
                    for x in 0..w {
                        let i = policy.swizzle(x, y, w, h);
                        assert!(i < w * h);
                        assert!(!seen[i as usize]);
                        seen[i as usize] = true;
                        assert_eq!(policy.unswizzle(i, w, h), (x, y));
                    }
                }
            }
        }
    }

    #[test]
    fn cluster_inverse() {
        let tiling = ClusterTiling::new(8, 4, 12);
        assert_eq!(tiling.surface_width, 16);
        assert_eq!(tiling.locate(9, 5), (3, 9));
        for y in 0..8 {
            for x in 0..16 {
                let i = tiling.texel_index(x, y);
                assert_eq!(tiling.texel_coord(i), (x, y));
            }
        }
    }

    #[test]
    fn surface_roundtrip() {
        let linear: Vec<u8> = (0..64u8).collect();
        for depth in [4, 8, 16, 32] {
            let (w, h) = match depth {
                4 => (8, 16),
                8 => (8, 8),
                16 => (8, 4),
                _ => (4, 4),
            };
            let swizzled = swizzle_surface(&linear, w, h, depth, PackedTile::XFirst).unwrap();
            assert_ne!(swizzled, linear);
            let back = unswizzle_surface(&swizzled, w, h, depth, PackedTile::XFirst).unwrap();
            assert_eq!(back, linear);
        }
        assert!(swizzle_surface(&linear, 6, 4, 8, PackedTile::XFirst).is_err());
    }
}
