use std::borrow::Cow;
use std::io::Cursor;

use rwtex_a4l4::A4L4Handler;
use rwtex_native::{d3d::D3dFormat, versions::LibraryVersion, ErrorKind};
use rwtex_shared::{
    config::EngineConfig,
    pixel::RasterDescriptor,
    platform::{
        handlers::FormatHandlerTable,
        texture::{d3d9, AdapterContext, NativeTexture},
    },
    NativeFormatKind, PixelData, TextureEngine,
};

fn gray_ramp() -> Vec<u8> {
    // 3x2, every channel a multiple of 17 so the nibbles are exact
    [0x00u8, 0x11, 0x22, 0x33, 0x44, 0x55]
        .iter()
        .flat_map(|v| [*v, *v, *v, 0xFF - *v])
        .collect()
}

fn write(engine: &TextureEngine, texture: &NativeTexture) -> Vec<u8> {
    let mut out = Cursor::new(vec![]);
    engine
        .write_native(texture, &mut out, LibraryVersion::default())
        .unwrap();
    out.into_inner()
}

#[test]
fn handler_texels_survive_a_file_roundtrip() {
    let config = EngineConfig::default();
    let handlers = FormatHandlerTable::new().with_handler(A4L4Handler);
    let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());

    let pixels = PixelData::with_base_level(RasterDescriptor::rgba8888(), 3, 2, Cow::Owned(gray_ramp()));
    let (texture, report) = d3d9::import_with_handler(pixels, D3dFormat::A4L4 as u32, &mut ctx).unwrap();
    assert!(!report.texels.is_direct());
    // 3 texels per row, DWORD aligned
    assert_eq!(texture.levels[0].texels, vec![0xF0, 0xE1, 0xD2, 0, 0xC3, 0xB4, 0xA5, 0]);

    let engine = TextureEngine::new(config.clone(), handlers);
    let bytes = write(&engine, &NativeTexture::Direct3D9(texture));
    assert!(engine.is_stream_native_image(NativeFormatKind::Direct3D9, &bytes));

    let (read, warnings) = engine
        .read_native(NativeFormatKind::Direct3D9, &mut Cursor::new(&bytes), LibraryVersion::default())
        .unwrap();
    assert!(warnings.is_empty());

    let (exported, _) = engine.export_pixels(&read).unwrap();
    assert_eq!(exported.format, RasterDescriptor::rgba8888());
    assert_eq!(exported.mipmaps[0].texels.as_ref(), gray_ramp().as_slice());
    assert_eq!(write(&engine, &read), bytes);
}

#[test]
fn missing_handler_keeps_the_texture_readable() {
    let config = EngineConfig::default();
    let handlers = FormatHandlerTable::new().with_handler(A4L4Handler);
    let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());
    let pixels = PixelData::with_base_level(RasterDescriptor::rgba8888(), 3, 2, Cow::Owned(gray_ramp()));
    let (texture, _) = d3d9::import_with_handler(pixels, D3dFormat::A4L4 as u32, &mut ctx).unwrap();

    let with_handler = TextureEngine::new(config.clone(), handlers);
    let bytes = write(&with_handler, &NativeTexture::Direct3D9(texture));

    let bare = TextureEngine::new(config, FormatHandlerTable::new());
    let (read, warnings) = bare
        .read_native(NativeFormatKind::Direct3D9, &mut Cursor::new(&bytes), LibraryVersion::default())
        .unwrap();
    assert!(warnings.mentions("no handler"));
    assert_eq!(write(&bare, &read), bytes);

    let err = bare.export_pixels(&read).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn converted_input_uses_channel_average() {
    let config = EngineConfig::default();
    let handlers = FormatHandlerTable::new().with_handler(A4L4Handler);
    let mut ctx = AdapterContext::new(&config, &handlers, LibraryVersion::default());

    // BGRA input goes through the RGBA intermediate before the handler sees it
    let bgra = RasterDescriptor::raw(
        rwtex_native::raster::RasterFormat::Raster8888,
        32,
        rwtex_native::raster::ColorOrder::Bgra,
        1,
    );
    let pixels = PixelData::with_base_level(bgra, 1, 1, Cow::Owned(vec![0x00, 0x00, 0xFF, 0xFF]));
    let (texture, _) = d3d9::import_with_handler(pixels, D3dFormat::A4L4 as u32, &mut ctx).unwrap();
    // red 255 averages to 85, which is nibble 5
    assert_eq!(texture.levels[0].texels[0], 0xF5);
}
