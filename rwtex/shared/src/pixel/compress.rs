use rwtex_native::raster::CompressionType;

use super::geometry::compressed_data_size;
use crate::config::EngineConfig;
use crate::error::{Result, TextureError};

fn squish_format(compression: CompressionType) -> Option<squish::Format> {
    // premultiplied DXT2 and DXT4 share their block layout with DXT3 and DXT5
    match compression {
        CompressionType::Dxt1 => Some(squish::Format::Bc1),
        CompressionType::Dxt2 | CompressionType::Dxt3 => Some(squish::Format::Bc2),
        CompressionType::Dxt4 | CompressionType::Dxt5 => Some(squish::Format::Bc3),
        _ => None,
    }
}

fn check_input(data: &[u8], needed: usize, what: &str) -> Result<()> {
    if data.len() < needed {
        return Err(TextureError::Structural(format!(
            "{} data holds {} bytes but needs {}",
            what,
            data.len(),
            needed
        )));
    }
    Ok(())
}

/// `texture2ddecoder` packs texels as `0xAARRGGBB`
fn unpack_bgra_words(words: &[u32]) -> Vec<u8> {
    words
        .iter()
        .flat_map(|&p| {
            [
                ((p >> 16) & 0xFF) as u8,
                ((p >> 8) & 0xFF) as u8,
                (p & 0xFF) as u8,
                ((p >> 24) & 0xFF) as u8,
            ]
        })
        .collect()
}

fn decode_words(
    data: &[u8],
    width: u32,
    height: u32,
    decoder: fn(&[u8], usize, usize, &mut [u32]) -> std::result::Result<(), &'static str>,
    what: &str,
) -> Result<Vec<u8>> {
    let mut words = vec![0u32; width as usize * height as usize];
    decoder(data, width as usize, height as usize, &mut words)
        .map_err(|e| TextureError::Structural(format!("{} decode error: {}", what, e)))?;
    Ok(unpack_bgra_words(&words))
}

/// Decodes a block compressed surface into byte-ordered RGBA of the same dimensions
pub fn decompress_surface(
    data: &[u8],
    compression: CompressionType,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    check_input(
        data,
        compressed_data_size(width, height, compression),
        &format!("{:?}", compression),
    )?;

    if let Some(format) = squish_format(compression) {
        let mut out = vec![0u8; width as usize * height as usize * 4];
        format.decompress(data, width as usize, height as usize, &mut out);
        return Ok(out);
    }

    match compression {
        CompressionType::Pvrtc2 => decode_words(
            data,
            width,
            height,
            texture2ddecoder::decode_pvrtc_2bpp,
            "PVRTC 2bpp",
        ),
        CompressionType::Pvrtc4 => decode_words(
            data,
            width,
            height,
            texture2ddecoder::decode_pvrtc_4bpp,
            "PVRTC 4bpp",
        ),
        CompressionType::Etc1 => {
            decode_words(data, width, height, texture2ddecoder::decode_etc1, "ETC1")
        }
        _ => Err(TextureError::Internal(format!(
            "{:?} is not a compression type",
            compression
        ))),
    }
}

/// Encodes byte-ordered RGBA into DXT blocks. Only the DXT family has an encoder.
pub fn compress_surface(
    rgba: &[u8],
    width: u32,
    height: u32,
    compression: CompressionType,
    config: &EngineConfig,
) -> Result<Vec<u8>> {
    let format = squish_format(compression).ok_or_else(|| {
        TextureError::InvalidConfiguration(format!(
            "no encoder is available for {:?}",
            compression
        ))
    })?;

    let needed = width as usize * height as usize * 4;
    if rgba.len() < needed {
        return Err(TextureError::Internal(format!(
            "RGBA source holds {} bytes, {} needed",
            rgba.len(),
            needed
        )));
    }

    let mut out = vec![0u8; format.compressed_size(width as usize, height as usize)];
    format.compress(
        &rgba[..needed],
        width as usize,
        height as usize,
        config.squish_params(),
        &mut out,
    );
    Ok(out)
}

/// Single channel BC4 (`ATI1`), shown as grayscale
pub fn decode_bc4(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    check_input(data, compressed_data_size(width, height, CompressionType::Dxt1), "BC4")?;
    decode_words(data, width, height, texture2ddecoder::decode_bc4, "BC4")
}

/// Two channel BC5 (`ATI2`)
pub fn decode_bc5(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    check_input(data, compressed_data_size(width, height, CompressionType::Dxt5), "BC5")?;
    decode_words(data, width, height, texture2ddecoder::decode_bc5, "BC5")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvPacking {
    /// Y0 U Y1 V
    Yuy2,
    /// U Y0 V Y1
    Uyvy,
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
        255,
    ]
}

/// Decodes 4:2:2 packed YUV. `width` is rounded up to pairs of texels.
pub fn decode_yuv422(data: &[u8], width: u32, height: u32, packing: YuvPacking) -> Result<Vec<u8>> {
    let pairs = (width as usize + 1) / 2;
    check_input(data, pairs * 4 * height as usize, "YUV")?;

    let mut out = vec![0u8; width as usize * height as usize * 4];
    for y in 0..height as usize {
        for pair in 0..pairs {
            let o = (y * pairs + pair) * 4;
            let q = &data[o..o + 4];
            let (y0, u, y1, v) = match packing {
                YuvPacking::Yuy2 => (q[0], q[1], q[2], q[3]),
                YuvPacking::Uyvy => (q[1], q[0], q[3], q[2]),
            };
            for (i, luma) in [y0, y1].into_iter().enumerate() {
                let x = pair * 2 + i;
                if x < width as usize {
                    let p = (y * width as usize + x) * 4;
                    out[p..p + 4].copy_from_slice(&yuv_to_rgba(luma, u, v));
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect()
    }

    #[test]
    fn dxt1_block_roundtrip() {
        let config = EngineConfig::default();
        let rgba = solid(4, 4, [255, 0, 0, 255]);
        let blocks = compress_surface(&rgba, 4, 4, CompressionType::Dxt1, &config).unwrap();
        assert_eq!(blocks.len(), 8);
        let decoded = decompress_surface(&blocks, CompressionType::Dxt1, 4, 4).unwrap();
        assert_eq!(&decoded[0..4], &[255, 0, 0, 255]);
        assert_eq!(decoded.len(), 64);
    }

    #[test]
    fn dxt5_sizes() {
        let config = EngineConfig::default();
        let rgba = solid(8, 8, [10, 20, 30, 40]);
        let blocks = compress_surface(&rgba, 8, 8, CompressionType::Dxt5, &config).unwrap();
        assert_eq!(blocks.len(), 64);
        assert!(decompress_surface(&blocks[..32], CompressionType::Dxt5, 8, 8).is_err());
    }

    #[test]
    fn no_pvrtc_encoder() {
        let rgba = solid(8, 8, [0, 0, 0, 255]);
        assert!(matches!(
            compress_surface(&rgba, 8, 8, CompressionType::Pvrtc4, &EngineConfig::default()),
            Err(TextureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn black_pvrtc_decodes() {
        let data = vec![0u8; 32];
        let rgba = decompress_surface(&data, CompressionType::Pvrtc4, 8, 8).unwrap();
        assert_eq!(rgba.len(), 8 * 8 * 4);
    }

    #[test]
    fn yuv_gray() {
        let data = [128u8, 128, 128, 128];
        let yuy2 = decode_yuv422(&data, 2, 1, YuvPacking::Yuy2).unwrap();
        let uyvy = decode_yuv422(&data, 2, 1, YuvPacking::Uyvy).unwrap();
        assert_eq!(yuy2, uyvy);
        assert_eq!(yuy2[0], yuy2[1]);
        assert_eq!(yuy2[3], 255);

        let white = decode_yuv422(&[235, 128, 235, 128], 1, 1, YuvPacking::Yuy2).unwrap();
        assert_eq!(white, vec![255, 255, 255, 255]);
    }
}
