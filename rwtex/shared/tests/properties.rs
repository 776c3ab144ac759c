use std::borrow::Cow;

use rwtex_native::raster::{ColorOrder, PaletteType, RasterFormat};
use rwtex_shared::{
    config::EngineConfig,
    mipmap::{max_level_count, MipmapChain},
    pixel::{
        geometry::row_size,
        transcode::{convert_pixel_data, copy_palette_indices, SurfaceView},
        RasterDescriptor,
    },
    platform::swizzle::PackedTile,
    textures::PaletteData,
    PixelData,
};

#[test]
fn row_sizes_are_the_smallest_aligned_fit() {
    for alignment in [1, 2, 4, 8] {
        for depth in [4, 8, 16, 24, 32] {
            for width in 1..40 {
                let size = row_size(width, depth, alignment);
                let minimum = (width as usize * depth as usize + 7) / 8;
                assert_eq!(size % alignment as usize, 0);
                assert!(size >= minimum);
                assert!(size - minimum < alignment as usize, "{} {} {}", width, depth, alignment);
            }
        }
    }
}

#[test]
fn mipmap_chains_end_at_one_texel() {
    for (w, h) in [(1, 1), (2, 1), (64, 64), (17, 9), (1024, 8), (3, 300)] {
        let levels: Vec<_> = MipmapChain::new(w, h).collect();
        let expected = 32 - (w.max(h) as u32).leading_zeros() as usize;
        assert_eq!(levels.len(), expected, "{}x{}", w, h);
        assert_eq!(levels.len(), max_level_count(w, h));
        assert_eq!(levels.last(), Some(&(1, 1)));

        let mut chain = MipmapChain::new(1, 1);
        assert!(!chain.increment_level());
        assert_eq!(chain.dimensions(), (1, 1));
    }
}

#[test]
fn swizzles_invert() {
    for policy in [PackedTile::XFirst, PackedTile::YFirst] {
        for (w, h) in [(8, 8), (16, 4), (2, 32), (1, 8)] {
            let mut seen = vec![false; (w * h) as usize];
            for y in 0..h {
                for x in 0..w {
                    let index = policy.swizzle(x, y, w, h);
                    assert_eq!(policy.unswizzle(index, w, h), (x, y));
                    seen[index as usize] = true;
                }
            }
            assert!(seen.into_iter().all(|s| s));
        }
    }
}

#[test]
fn bgra_through_rgba_is_lossless() {
    let config = EngineConfig::default();
    let bgra = RasterDescriptor::raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra, 4);
    let texels: Vec<u8> = (0..=255u8).cycle().take(16 * 16 * 4).collect();
    let source = PixelData::with_base_level(bgra, 16, 16, Cow::Owned(texels.clone()));

    let rgba = convert_pixel_data(&source, &RasterDescriptor::rgba8888(), &config).unwrap();
    assert_ne!(rgba.mipmaps[0].texels.as_ref(), texels.as_slice());
    let back = convert_pixel_data(&rgba, &bgra, &config).unwrap();
    assert_eq!(back.mipmaps[0].texels.as_ref(), texels.as_slice());
}

#[test]
fn luminance_is_the_truncated_channel_average() {
    let config = EngineConfig::default();
    let colors = [[10u8, 20, 31, 7], [255, 255, 254, 255], [0, 1, 1, 128], [90, 0, 0, 0]];
    let texels: Vec<u8> = colors.iter().flatten().copied().collect();
    let source = PixelData::with_base_level(RasterDescriptor::rgba8888(), 4, 1, Cow::Owned(texels));

    let lum_alpha = RasterDescriptor::raw(RasterFormat::LumAlpha, 16, ColorOrder::Rgba, 1);
    let stored = convert_pixel_data(&source, &lum_alpha, &config).unwrap();
    let back = convert_pixel_data(&stored, &RasterDescriptor::rgba8888(), &config).unwrap();

    for (color, out) in colors.iter().zip(back.mipmaps[0].texels.chunks_exact(4)) {
        let lum = ((color[0] as u32 + color[1] as u32 + color[2] as u32) / 3) as u8;
        assert_eq!(out, &[lum, lum, lum, color[3]]);
    }
}

#[test]
fn palette_indices_survive_widening() {
    let pal4 = RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal4, 4, 1);
    let pal8 = RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal8, 8, 1);
    let indices: Vec<u8> = (0..32u8).map(|i| (i % 16) << 4 | (i * 3) % 16).collect();

    let view = SurfaceView {
        texels: &indices,
        width: 8,
        height: 8,
    };
    let wide = copy_palette_indices(&pal4, view, 8, 8, &pal8, 8, 8).unwrap();
    assert_eq!(wide.len(), 64);
    assert_eq!(wide[0], indices[0] >> 4);
    assert_eq!(wide[1], indices[0] & 0x0F);

    let view = SurfaceView {
        texels: &wide,
        width: 8,
        height: 8,
    };
    let narrow = copy_palette_indices(&pal8, view, 8, 8, &pal4, 8, 8).unwrap();
    assert_eq!(narrow, indices);
}

#[test]
fn palette_conversion_keeps_indices_when_colors_fit() {
    let config = EngineConfig::default();
    let pal4 = RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal4, 4, 1);
    let pal8 = RasterDescriptor::palette(RasterFormat::Raster8888, ColorOrder::Rgba, PaletteType::Pal8, 8, 1);
    let colors: Vec<u8> = (0..16u8).flat_map(|i| [i * 16, i, 255 - i, 255]).collect();
    let indices: Vec<u8> = (0..8u8).map(|i| i << 4 | (15 - i)).collect();

    let mut source = PixelData::with_base_level(pal4, 4, 4, Cow::Owned(indices.clone()));
    source.palette = Some(PaletteData::owned(colors, 16));

    let wide = convert_pixel_data(&source, &pal8, &config).unwrap();
    assert_eq!(wide.mipmaps[0].texels.len(), 16);
    let wide_palette = wide.palette.as_ref().unwrap();
    assert_eq!(wide_palette.entries, 256);
    assert_eq!(wide_palette.data.len(), 1024);
    assert_eq!(&wide_palette.data[..64], &source.palette.as_ref().unwrap().data[..]);
    assert!(wide_palette.data[64..].iter().all(|&b| b == 0));
    let narrow = convert_pixel_data(&wide, &pal4, &config).unwrap();
    assert_eq!(narrow.mipmaps[0].texels.as_ref(), indices.as_slice());
    assert_eq!(narrow.palette.unwrap().data, source.palette.unwrap().data);
}
