use std::borrow::Cow;

use crate::config::EngineConfig;
use crate::error::{Result, TextureError};
use crate::pixel::{
    geometry::surface_dimensions,
    transcode::{convert_pixel_data, convert_surface, SurfaceView, TexelFormat},
    RasterDescriptor,
};
use crate::textures::{PixelData, PixelLayer};
use crate::warnings::{WarningLog, LEVEL_NORMAL};

/// Walks the dimensions of a mipmap chain, halving each step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipmapChain {
    width: u32,
    height: u32,
    level: usize,
}

impl MipmapChain {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            level: 0,
        }
    }

    pub fn is_valid_level(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns false once both sides are already 1
    pub fn increment_level(&mut self) -> bool {
        if self.width <= 1 && self.height <= 1 {
            return false;
        }
        self.width = (self.width / 2).max(1);
        self.height = (self.height / 2).max(1);
        self.level += 1;
        true
    }
}

impl Iterator for MipmapChain {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_valid_level() {
            return None;
        }
        let current = self.dimensions();
        if !self.increment_level() {
            self.width = 0;
            self.height = 0;
        }
        Some(current)
    }
}

/// Number of levels a full chain starting at `width`x`height` has
pub fn max_level_count(width: u32, height: u32) -> usize {
    MipmapChain::new(width, height).count()
}

/// Clamps a declared level count to what the base dimensions can support
pub fn resolve_level_count(declared: usize, width: u32, height: u32, warnings: &mut WarningLog) -> usize {
    let max = max_level_count(width, height);
    if declared == 0 {
        warnings.push(LEVEL_NORMAL, "texture declares zero mipmap levels, assuming one");
        return 1;
    }
    if declared > max {
        warnings.push(
            LEVEL_NORMAL,
            format!(
                "texture declares {} mipmap levels but {}x{} only allows {}",
                declared, width, height, max
            ),
        );
        return max;
    }
    declared
}

/// Dimension requirements of a native texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRules {
    pub power_of_two: bool,
    pub square: bool,
    /// Both sides must be multiples of this; 1 means no requirement
    pub multiple_of: u32,
    pub maximum: Option<u32>,
}

impl Default for SizeRules {
    fn default() -> Self {
        Self {
            power_of_two: false,
            square: false,
            multiple_of: 1,
            maximum: None,
        }
    }
}

impl SizeRules {
    pub fn power_of_two() -> Self {
        Self {
            power_of_two: true,
            ..Default::default()
        }
    }

    pub fn check(&self, width: u32, height: u32) -> std::result::Result<(), String> {
        if width == 0 || height == 0 {
            return Err(format!("{}x{} has a zero dimension", width, height));
        }
        if self.power_of_two && !(width.is_power_of_two() && height.is_power_of_two()) {
            return Err(format!("{}x{} is not a power of two", width, height));
        }
        if self.square && width != height {
            return Err(format!("{}x{} is not square", width, height));
        }
        let m = self.multiple_of.max(1);
        if width % m != 0 || height % m != 0 {
            return Err(format!("{}x{} is not a multiple of {}", width, height, m));
        }
        if let Some(max) = self.maximum {
            if width > max || height > max {
                return Err(format!("{}x{} exceeds the {} texel limit", width, height, max));
            }
        }
        Ok(())
    }
}

/// Verifies that the levels form a halving chain whose base satisfies `rules`.
/// Smaller levels only need to follow the chain since they reach 1x1.
pub fn validate_chain(pixels: &PixelData, rules: &SizeRules) -> Result<()> {
    let per_face = pixels.levels_per_face();
    if per_face == 0 {
        return Err(TextureError::InvalidConfiguration(
            "texture has no mipmap levels".to_string(),
        ));
    }

    for face in pixels.mipmaps.chunks(per_face) {
        let base = &face[0];
        rules
            .check(base.layer_width, base.layer_height)
            .map_err(|e| TextureError::InvalidConfiguration(format!("base level {}", e)))?;

        let chain = MipmapChain::new(base.layer_width, base.layer_height);
        let mut expected = chain.take(face.len());
        for (i, level) in face.iter().enumerate() {
            match expected.next() {
                Some((w, h)) if (w, h) == (level.layer_width, level.layer_height) => {}
                Some((w, h)) => {
                    return Err(TextureError::InvalidConfiguration(format!(
                        "level {} is {}x{}, expected {}x{}",
                        i, level.layer_width, level.layer_height, w, h
                    )))
                }
                None => {
                    return Err(TextureError::InvalidConfiguration(format!(
                        "level {} lies beyond the end of the mipmap chain",
                        i
                    )))
                }
            }
        }
    }

    Ok(())
}

fn box_filter(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let mut out = vec![0u8; dst_w as usize * dst_h as usize * 4];
    let step_x = (src_w / dst_w).max(1);
    let step_y = (src_h / dst_h).max(1);
    // the last row and column of the destination also cover the source remainder
    let span = |i: u32, step: u32, dst: u32, src: u32| {
        let end = if i + 1 == dst { src } else { ((i + 1) * step).min(src) };
        (i * step).min(src.saturating_sub(1))..end
    };
    for y in 0..dst_h {
        for x in 0..dst_w {
            let mut sums = [0u32; 4];
            let mut n = 0;
            for sy in span(y, step_y, dst_h, src_h) {
                for sx in span(x, step_x, dst_w, src_w) {
                    let o = (sy as usize * src_w as usize + sx as usize) * 4;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += src[o + c] as u32;
                    }
                    n += 1;
                }
            }
            let o = (y as usize * dst_w as usize + x as usize) * 4;
            for c in 0..4 {
                out[o + c] = ((sums[c] + n / 2) / n.max(1)) as u8;
            }
        }
    }
    out
}

/// Rebuilds levels below the base with a box filter, up to `max_levels` in total.
/// Returns the resulting level count.
pub fn generate_mipmaps(pixels: &mut PixelData, max_levels: usize, config: &EngineConfig) -> Result<usize> {
    if pixels.cube_texture {
        return Err(TextureError::InvalidConfiguration(
            "mipmap generation for cube textures is not supported".to_string(),
        ));
    }
    let Some(base) = pixels.mipmaps.first() else {
        return Err(TextureError::InvalidConfiguration(
            "texture has no base level".to_string(),
        ));
    };

    let (width, height) = (base.layer_width, base.layer_height);
    let target = max_levels.clamp(1, max_level_count(width, height));

    let single = PixelData {
        mipmaps: vec![base.reborrow()],
        ..pixels.reborrow()
    };
    let rgba = convert_pixel_data(&single, &RasterDescriptor::rgba8888(), config)?;
    let mut current = rgba.mipmaps[0].texels.to_vec();

    let mut generated = vec![];
    let mut chain = MipmapChain::new(width, height);
    let (mut cw, mut ch) = (width, height);
    while generated.len() + 1 < target && chain.increment_level() {
        let (nw, nh) = chain.dimensions();
        let next = box_filter(&current, cw, ch, nw, nh);
        generated.push(PixelLayer::new(nw, nh, nw, nh, Cow::Owned(next.clone())));
        current = next;
        (cw, ch) = (nw, nh);
    }

    let level_count = generated.len() + 1;
    if !generated.is_empty() {
        let mut levels = PixelData::new(RasterDescriptor::rgba8888());
        levels.mipmaps = generated;
        pixels.mipmaps.truncate(1);
        if pixels.format.is_palette() {
            // a fresh palette would not match the base level; map into the existing one
            for layer in &levels.mipmaps {
                let (sw, sh) = surface_dimensions(layer.layer_width, layer.layer_height, pixels.format.compression);
                let texels = convert_surface(
                    TexelFormat::raw(RasterDescriptor::rgba8888()),
                    SurfaceView {
                        texels: &layer.texels,
                        width: layer.width,
                        height: layer.height,
                    },
                    layer.layer_width,
                    layer.layer_height,
                    TexelFormat::new(pixels.format, pixels.palette.as_ref()),
                    sw,
                    sh,
                )?;
                pixels.mipmaps.push(PixelLayer::new(sw, sh, layer.layer_width, layer.layer_height, Cow::Owned(texels)));
            }
        } else {
            let encoded = convert_pixel_data(&levels, &pixels.format, config)?;
            pixels.mipmaps.extend(encoded.mipmaps);
        }
    } else {
        pixels.mipmaps.truncate(1);
    }

    Ok(level_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwtex_native::raster::CompressionType;

    #[test]
    fn chain_steps() {
        let mut chain = MipmapChain::new(256, 64);
        let mut steps = 1;
        while chain.increment_level() {
            steps += 1;
        }
        assert_eq!(steps, 9);
        assert_eq!(chain.dimensions(), (1, 1));

        let dims: Vec<_> = MipmapChain::new(4, 1).collect();
        assert_eq!(dims, vec![(4, 1), (2, 1), (1, 1)]);
        assert_eq!(max_level_count(1, 1), 1);
        assert_eq!(max_level_count(3, 5), 3);
    }

    #[test]
    fn declared_counts() {
        let config = EngineConfig::default();
        let mut warnings = WarningLog::new(&config);
        assert_eq!(resolve_level_count(3, 4, 4, &mut warnings), 3);
        assert!(warnings.is_empty());
        assert_eq!(resolve_level_count(10, 4, 4, &mut warnings), 3);
        assert_eq!(resolve_level_count(0, 4, 4, &mut warnings), 1);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn size_rules() {
        let rules = SizeRules {
            power_of_two: true,
            square: true,
            multiple_of: 1,
            maximum: Some(1024),
        };
        assert!(rules.check(64, 64).is_ok());
        assert!(rules.check(64, 32).is_err());
        assert!(rules.check(48, 48).is_err());
        assert!(rules.check(2048, 2048).is_err());
        assert!(SizeRules::default().check(3, 7).is_ok());
        let mut four = SizeRules::default();
        four.multiple_of = 4;
        assert!(four.check(6, 4).is_err());
    }

    #[test]
    fn chain_validation() {
        let mut p = PixelData::with_base_level(RasterDescriptor::rgba8888(), 4, 2, Cow::Owned(vec![0; 32]));
        p.mipmaps.push(PixelLayer::new(2, 1, 2, 1, Cow::Owned(vec![0; 8])));
        assert!(validate_chain(&p, &SizeRules::power_of_two()).is_ok());

        p.mipmaps.push(PixelLayer::new(2, 1, 2, 1, Cow::Owned(vec![0; 8])));
        assert!(validate_chain(&p, &SizeRules::power_of_two()).is_err());

        let npot = PixelData::with_base_level(RasterDescriptor::rgba8888(), 3, 3, Cow::Owned(vec![0; 36]));
        assert!(validate_chain(&npot, &SizeRules::power_of_two()).is_err());
        assert!(validate_chain(&npot, &SizeRules::default()).is_ok());
    }

    #[test]
    fn generation() {
        let config = EngineConfig::default();
        let texels: Vec<u8> = [[200u8, 0, 0, 255], [0, 0, 200, 255]]
            .iter()
            .cycle()
            .take(16)
            .flatten()
            .copied()
            .collect();
        let mut p = PixelData::with_base_level(RasterDescriptor::rgba8888(), 4, 4, Cow::Owned(texels));
        assert_eq!(generate_mipmaps(&mut p, 16, &config).unwrap(), 3);
        assert_eq!(p.mipmaps.len(), 3);
        assert_eq!(&p.mipmaps[2].texels[..], &[100, 0, 100, 255]);
        assert!(validate_chain(&p, &SizeRules::power_of_two()).is_ok());

        let mut dxt = PixelData::with_base_level(
            RasterDescriptor::compressed(CompressionType::Dxt1),
            8,
            8,
            Cow::Owned(vec![0; 32]),
        );
        assert_eq!(generate_mipmaps(&mut dxt, 2, &config).unwrap(), 2);
        assert_eq!(dxt.mipmaps[1].texels.len(), 8);
    }

    #[test]
    fn odd_sizes_average_the_remainder() {
        let row: Vec<u8> = [10u8, 20, 30, 40, 250].iter().flat_map(|&v| [v, 0, 0, 255]).collect();
        let out = box_filter(&row, 5, 1, 2, 1);
        assert_eq!(&out[..4], &[15, 0, 0, 255]);
        assert_eq!(&out[4..], &[107, 0, 0, 255]);

        let column: Vec<u8> = [0u8, 0, 0, 0, 0, 0, 90].iter().flat_map(|&v| [0, v, 0, 255]).collect();
        let out = box_filter(&column, 1, 7, 1, 3);
        assert_eq!(out.len(), 12);
        assert_eq!(&out[8..], &[0, 30, 0, 255]);
    }
}
