use std::io::{Read, Seek, Write};

use tracing::debug;

use rwtex_native::versions::LibraryVersion;

use crate::config::EngineConfig;
use crate::error::{Result, TextureError};
use crate::platform::handlers::FormatHandlerTable;
use crate::platform::texture::{read_prefix, AdapterContext, NativeFormatKind, NativeTexture};
use crate::textures::{ImportReport, PixelData};
use crate::warnings::WarningLog;

/// Bytes every detector needs to make its decision
const DETECTION_PREFIX: usize = 52;

/// Entry point for reading, writing and converting native textures.
///
/// Holds the configuration and the extension handlers; every operation
/// gets a fresh warning log that is handed back with its result.
#[derive(Debug, Default)]
pub struct TextureEngine {
    config: EngineConfig,
    handlers: FormatHandlerTable,
}

impl TextureEngine {
    pub fn new(config: EngineConfig, handlers: FormatHandlerTable) -> Self {
        Self { config, handlers }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handlers(&self) -> &FormatHandlerTable {
        &self.handlers
    }

    fn context(&self, version: LibraryVersion) -> AdapterContext<'_> {
        AdapterContext::new(&self.config, &self.handlers, version)
    }

    pub fn is_stream_native_image(&self, kind: NativeFormatKind, bytes: &[u8]) -> bool {
        kind.is_recognized(bytes)
    }

    /// First kind in detection order whose prefix check accepts `bytes`
    pub fn detect_native_kind(&self, bytes: &[u8]) -> Option<NativeFormatKind> {
        NativeFormatKind::DETECTION_ORDER
            .into_iter()
            .find(|kind| kind.is_recognized(bytes))
    }

    pub fn read_native<R: Read + Seek>(
        &self,
        kind: NativeFormatKind,
        reader: &mut R,
        version: LibraryVersion,
    ) -> Result<(NativeTexture, WarningLog)> {
        let mut ctx = self.context(version);
        let texture = kind.deserialize(reader, &mut ctx)?;
        debug!("Read {} texture of {:?}", kind.name(), texture.base_dimensions());
        Ok((texture, ctx.warnings))
    }

    /// Reads a texture of whatever kind the stream starts with
    pub fn read_detected<R: Read + Seek>(
        &self,
        reader: &mut R,
        version: LibraryVersion,
    ) -> Result<(NativeTexture, WarningLog)> {
        let prefix = read_prefix(reader, DETECTION_PREFIX)?;
        let kind = self
            .detect_native_kind(&prefix)
            .ok_or_else(|| TextureError::Structural("stream holds no known native texture".to_string()))?;
        self.read_native(kind, reader, version)
    }

    pub fn write_native<W: Write + Seek>(
        &self,
        texture: &NativeTexture,
        writer: &mut W,
        version: LibraryVersion,
    ) -> Result<WarningLog> {
        let mut ctx = self.context(version);
        texture.serialize(writer, &mut ctx)?;
        Ok(ctx.warnings)
    }

    /// Writes at the configured target version
    pub fn write_native_default<W: Write + Seek>(&self, texture: &NativeTexture, writer: &mut W) -> Result<WarningLog> {
        self.write_native(texture, writer, self.config.target_version)
    }

    pub fn export_pixels<'t>(&self, texture: &'t NativeTexture) -> Result<(PixelData<'t>, WarningLog)> {
        let mut ctx = self.context(LibraryVersion::default());
        let pixels = texture.export_pixels(&mut ctx)?;
        Ok((pixels, ctx.warnings))
    }

    pub fn import_pixels(
        &self,
        kind: NativeFormatKind,
        pixels: PixelData<'_>,
        version: LibraryVersion,
    ) -> Result<(NativeTexture, ImportReport, WarningLog)> {
        let mut ctx = self.context(version);
        let (texture, report) = kind.import_pixels(pixels, &mut ctx)?;
        Ok((texture, report, ctx.warnings))
    }

    /// Moves the pixels of `texture` into a new container of `kind`, keeping
    /// the name and sampling attributes where both sides carry them
    pub fn convert(
        &self,
        texture: &NativeTexture,
        kind: NativeFormatKind,
        version: LibraryVersion,
    ) -> Result<(NativeTexture, WarningLog)> {
        let mut ctx = self.context(version);
        let pixels = texture.export_pixels(&mut ctx)?;
        let (mut converted, report) = kind.import_pixels(pixels, &mut ctx)?;
        if let Some(info) = texture.texture_info() {
            converted.set_texture_info(&info);
        }
        debug!(
            "Converted {} into {} ({:?})",
            texture.kind().name(),
            kind.name(),
            report.texels
        );
        Ok((converted, ctx.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::RasterDescriptor;
    use crate::platform::texture::TextureInfo;
    use rwtex_native::raster::{ColorOrder, RasterFormat};
    use std::borrow::Cow;
    use std::io::Cursor;

    #[test]
    fn conversion_keeps_texture_info() {
        let engine = TextureEngine::default();
        let desc = RasterDescriptor::raw(RasterFormat::Raster8888, 32, ColorOrder::Bgra, 4);
        let pixels = PixelData::with_base_level(desc, 4, 4, Cow::Owned(vec![0x80; 64]));
        let (mut d3d, _, _) = engine
            .import_pixels(NativeFormatKind::Direct3D8, pixels, LibraryVersion::default())
            .unwrap();
        d3d.set_texture_info(&TextureInfo {
            name: "rock".to_string(),
            ..Default::default()
        });

        let (d3d9, _) = engine
            .convert(&d3d, NativeFormatKind::Direct3D9, LibraryVersion::default())
            .unwrap();
        assert_eq!(d3d9.kind(), NativeFormatKind::Direct3D9);
        assert_eq!(d3d9.texture_info().unwrap().name, "rock");
        assert_eq!(d3d9.base_dimensions(), (4, 4));
    }

    #[test]
    fn detection_finds_written_kind() {
        let engine = TextureEngine::default();
        let pixels = PixelData::with_base_level(RasterDescriptor::rgba8888(), 2, 2, Cow::Owned(vec![1; 16]));
        let (dds, _, _) = engine
            .import_pixels(NativeFormatKind::Dds, pixels, LibraryVersion::default())
            .unwrap();

        let mut out = Cursor::new(vec![]);
        engine.write_native(&dds, &mut out, LibraryVersion::default()).unwrap();
        let bytes = out.into_inner();
        assert_eq!(engine.detect_native_kind(&bytes), Some(NativeFormatKind::Dds));
        assert!(!engine.is_stream_native_image(NativeFormatKind::Pvr, &bytes));

        let (read, warnings) = engine
            .read_detected(&mut Cursor::new(&bytes), LibraryVersion::default())
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(read, dds);
    }

    #[test]
    fn default_writes_use_the_target_version() {
        let config = EngineConfig {
            target_version: LibraryVersion::new(3, 3, 0, 0),
            ..Default::default()
        };
        let engine = TextureEngine::new(config, FormatHandlerTable::new());
        let lum = RasterDescriptor::raw(RasterFormat::Lum, 8, ColorOrder::Rgba, 1);
        let pixels = PixelData::with_base_level(lum, 8, 4, Cow::Owned(vec![0x30; 32]));
        let (gc, _, _) = engine
            .import_pixels(NativeFormatKind::GameCube, pixels, LibraryVersion::new(3, 6, 0, 3))
            .unwrap();

        let mut out = Cursor::new(vec![]);
        let warnings = engine.write_native_default(&gc, &mut out).unwrap();
        assert!(warnings.mentions("older GameCube layout"));
    }

    #[test]
    fn unknown_streams_are_structural() {
        let engine = TextureEngine::default();
        let err = engine
            .read_detected(&mut Cursor::new(vec![0xEE; 64]), LibraryVersion::default())
            .unwrap_err();
        assert_eq!(err.kind(), rwtex_native::ErrorKind::Structural);
    }
}
