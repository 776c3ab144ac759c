pub mod d3d;
pub mod d3d8;
pub mod d3d9;
pub mod dds;
pub mod gamecube;
pub mod powervr;
pub mod pvr;
pub mod xbox;

use std::io::{Read, Seek, Write};

use tracing::debug;

use rwtex_native::{
    common::{NativeTextureCommon, TextureFormatInfo},
    versions::LibraryVersion,
};

use crate::config::EngineConfig;
use crate::error::{Result, TextureError};
use crate::mipmap::{validate_chain, SizeRules};
use crate::pixel::{geometry::surface_dimensions, transcode::convert_pixel_data, RasterDescriptor};
use crate::platform::handlers::FormatHandlerTable;
use crate::textures::{Acquisition, ImportReport, PixelData};
use crate::warnings::WarningLog;

/// Everything an adapter may consult while it works
pub struct AdapterContext<'a> {
    pub config: &'a EngineConfig,
    pub handlers: &'a FormatHandlerTable,
    /// Library version the container is read or written as
    pub version: LibraryVersion,
    pub warnings: WarningLog,
}

impl<'a> AdapterContext<'a> {
    pub fn new(config: &'a EngineConfig, handlers: &'a FormatHandlerTable, version: LibraryVersion) -> Self {
        Self {
            config,
            handlers,
            version,
            warnings: WarningLog::new(config),
        }
    }
}

/// Naming and sampling attributes of RenderWare native textures
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureInfo {
    pub name: String,
    pub mask_name: String,
    pub format_info: TextureFormatInfo,
}

impl TextureInfo {
    pub(crate) fn from_common(common: &NativeTextureCommon) -> Self {
        Self {
            name: common.name(),
            mask_name: common.mask_name(),
            format_info: common.format_info,
        }
    }

    pub(crate) fn to_common(&self, platform: u32) -> NativeTextureCommon {
        NativeTextureCommon::new(platform, self.format_info, &self.name, &self.mask_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormatKind {
    Dds,
    Pvr,
    Direct3D8,
    Direct3D9,
    Xbox,
    GameCube,
    PowerVr,
}

impl NativeFormatKind {
    /// Detection order used when the kind of a stream is unknown. Image files carry
    /// magic numbers and go first, native textures only a platform id.
    pub const DETECTION_ORDER: [Self; 7] = [
        Self::Dds,
        Self::Pvr,
        Self::Direct3D9,
        Self::Direct3D8,
        Self::Xbox,
        Self::GameCube,
        Self::PowerVr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dds => "DDS",
            Self::Pvr => "PVR",
            Self::Direct3D8 => "Direct3D8",
            Self::Direct3D9 => "Direct3D9",
            Self::Xbox => "XBOX",
            Self::GameCube => "Gamecube",
            Self::PowerVr => "PowerVR",
        }
    }

    /// Only Direct3D 9 containers carry six faces
    pub fn supports_cube_textures(&self) -> bool {
        *self == Self::Direct3D9
    }

    pub fn is_recognized(&self, prefix: &[u8]) -> bool {
        match self {
            Self::Dds => dds::DdsTexture::is_recognized(prefix),
            Self::Pvr => pvr::PvrTexture::is_recognized(prefix),
            Self::Direct3D8 => d3d8::D3d8Texture::is_recognized(prefix),
            Self::Direct3D9 => d3d9::D3d9Texture::is_recognized(prefix),
            Self::Xbox => xbox::XboxTexture::is_recognized(prefix),
            Self::GameCube => gamecube::GameCubeTexture::is_recognized(prefix),
            Self::PowerVr => powervr::PowerVrTexture::is_recognized(prefix),
        }
    }

    pub fn deserialize<R: Read + Seek>(&self, reader: &mut R, ctx: &mut AdapterContext) -> Result<NativeTexture> {
        Ok(match self {
            Self::Dds => NativeTexture::Dds(dds::DdsTexture::deserialize(reader, ctx)?),
            Self::Pvr => NativeTexture::Pvr(pvr::PvrTexture::deserialize(reader, ctx)?),
            Self::Direct3D8 => NativeTexture::Direct3D8(d3d8::D3d8Texture::deserialize(reader, ctx)?),
            Self::Direct3D9 => NativeTexture::Direct3D9(d3d9::D3d9Texture::deserialize(reader, ctx)?),
            Self::Xbox => NativeTexture::Xbox(xbox::XboxTexture::deserialize(reader, ctx)?),
            Self::GameCube => NativeTexture::GameCube(gamecube::GameCubeTexture::deserialize(reader, ctx)?),
            Self::PowerVr => NativeTexture::PowerVr(powervr::PowerVrTexture::deserialize(reader, ctx)?),
        })
    }

    pub fn import_pixels(&self, pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(NativeTexture, ImportReport)> {
        fn wrap<T>(
            result: Result<(T, ImportReport)>,
            f: fn(T) -> NativeTexture,
        ) -> Result<(NativeTexture, ImportReport)> {
            result.map(|(t, r)| (f(t), r))
        }

        match self {
            Self::Dds => wrap(dds::DdsTexture::import_pixels(pixels, ctx), NativeTexture::Dds),
            Self::Pvr => wrap(pvr::PvrTexture::import_pixels(pixels, ctx), NativeTexture::Pvr),
            Self::Direct3D8 => wrap(d3d8::D3d8Texture::import_pixels(pixels, ctx), NativeTexture::Direct3D8),
            Self::Direct3D9 => wrap(d3d9::D3d9Texture::import_pixels(pixels, ctx), NativeTexture::Direct3D9),
            Self::Xbox => wrap(xbox::XboxTexture::import_pixels(pixels, ctx), NativeTexture::Xbox),
            Self::GameCube => wrap(
                gamecube::GameCubeTexture::import_pixels(pixels, ctx),
                NativeTexture::GameCube,
            ),
            Self::PowerVr => wrap(powervr::PowerVrTexture::import_pixels(pixels, ctx), NativeTexture::PowerVr),
        }
    }
}

/// One native container format: parse, write and exchange pixels with the
/// generic representation
pub trait NativeFormat: Sized {
    const KIND: NativeFormatKind;

    /// Cheap check of a stream prefix, never fails
    fn is_recognized(prefix: &[u8]) -> bool;

    fn deserialize<R: Read + Seek>(reader: &mut R, ctx: &mut AdapterContext) -> Result<Self>;

    fn serialize<W: Write + Seek>(&self, writer: &mut W, ctx: &mut AdapterContext) -> Result<()>;

    /// Exposes the stored pixels, borrowing them when no conversion is needed
    fn export_pixels(&self, ctx: &mut AdapterContext) -> Result<PixelData<'_>>;

    /// Takes ownership of `pixels`, converting only what the format cannot store
    fn import_pixels(pixels: PixelData<'_>, ctx: &mut AdapterContext) -> Result<(Self, ImportReport)>;

    fn texture_info(&self) -> Option<TextureInfo> {
        None
    }

    fn set_texture_info(&mut self, _info: &TextureInfo) {}

    fn base_dimensions(&self) -> (u32, u32);
}

/// A parsed native texture of any supported kind
#[derive(Debug, Clone, PartialEq)]
pub enum NativeTexture {
    Dds(dds::DdsTexture),
    Pvr(pvr::PvrTexture),
    Direct3D8(d3d8::D3d8Texture),
    Direct3D9(d3d9::D3d9Texture),
    Xbox(xbox::XboxTexture),
    GameCube(gamecube::GameCubeTexture),
    PowerVr(powervr::PowerVrTexture),
}

macro_rules! dispatch {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            NativeTexture::Dds($t) => $body,
            NativeTexture::Pvr($t) => $body,
            NativeTexture::Direct3D8($t) => $body,
            NativeTexture::Direct3D9($t) => $body,
            NativeTexture::Xbox($t) => $body,
            NativeTexture::GameCube($t) => $body,
            NativeTexture::PowerVr($t) => $body,
        }
    };
}

impl NativeTexture {
    pub fn kind(&self) -> NativeFormatKind {
        match self {
            Self::Dds(_) => NativeFormatKind::Dds,
            Self::Pvr(_) => NativeFormatKind::Pvr,
            Self::Direct3D8(_) => NativeFormatKind::Direct3D8,
            Self::Direct3D9(_) => NativeFormatKind::Direct3D9,
            Self::Xbox(_) => NativeFormatKind::Xbox,
            Self::GameCube(_) => NativeFormatKind::GameCube,
            Self::PowerVr(_) => NativeFormatKind::PowerVr,
        }
    }

    pub fn serialize<W: Write + Seek>(&self, writer: &mut W, ctx: &mut AdapterContext) -> Result<()> {
        dispatch!(self, t => t.serialize(writer, ctx))
    }

    pub fn export_pixels(&self, ctx: &mut AdapterContext) -> Result<PixelData<'_>> {
        dispatch!(self, t => t.export_pixels(ctx))
    }

    pub fn texture_info(&self) -> Option<TextureInfo> {
        dispatch!(self, t => t.texture_info())
    }

    pub fn set_texture_info(&mut self, info: &TextureInfo) {
        dispatch!(self, t => t.set_texture_info(info))
    }

    pub fn base_dimensions(&self) -> (u32, u32) {
        dispatch!(self, t => t.base_dimensions())
    }
}

fn is_direct(pixels: &PixelData, target: &RasterDescriptor) -> bool {
    let src = &pixels.format;
    let same_layout = RasterDescriptor {
        row_alignment: target.row_alignment,
        ..*src
    } == *target;
    if !same_layout {
        return false;
    }

    pixels.mipmaps.iter().all(|level| {
        let surface = surface_dimensions(level.layer_width, level.layer_height, target.compression);
        if surface != (level.width, level.height) {
            return false;
        }
        target.is_compressed()
            || crate::pixel::geometry::row_size(level.width, src.depth, src.row_alignment)
                == crate::pixel::geometry::row_size(level.width, target.depth, target.row_alignment)
    })
}

/// Common import path: validation, size rules, then either a direct move or a
/// conversion into `target`
pub(crate) fn acquire_pixels(
    pixels: PixelData<'_>,
    target: &RasterDescriptor,
    rules: &SizeRules,
    ctx: &mut AdapterContext,
    kind: NativeFormatKind,
) -> Result<(PixelData<'static>, ImportReport)> {
    if pixels.cube_texture && !kind.supports_cube_textures() {
        return Err(TextureError::InvalidConfiguration(format!(
            "{} textures cannot store cube maps",
            kind.name()
        )));
    }
    pixels.validate()?;
    validate_chain(&pixels, rules)?;

    if is_direct(&pixels, target) {
        let report = ImportReport {
            texels: Acquisition::Direct,
            palette: if pixels.palette.is_some() {
                Acquisition::Direct
            } else {
                Acquisition::Absent
            },
        };
        let mut owned = pixels.into_owned();
        owned.format.row_alignment = target.row_alignment;
        return Ok((owned, report));
    }

    if !ctx.config.fix_incompatible_rasters {
        return Err(TextureError::InvalidConfiguration(format!(
            "{} textures cannot store {:?} without conversion",
            kind.name(),
            pixels.format
        )));
    }

    debug!("{}: converting {:?} into {:?}", kind.name(), pixels.format, target);
    let converted = convert_pixel_data(&pixels, target, ctx.config)?;
    let report = ImportReport {
        texels: Acquisition::Converted,
        palette: if converted.palette.is_some() {
            Acquisition::Converted
        } else {
            Acquisition::Absent
        },
    };
    Ok((converted, report))
}

pub(crate) fn read_prefix<R: Read + Seek>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let start = reader.stream_position()?;
    let mut prefix = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);
    reader.seek(std::io::SeekFrom::Start(start))?;
    Ok(prefix)
}

/// Reads exactly `len` level bytes, naming the level on truncation.
/// Only bytes the stream actually holds are allocated.
pub(crate) fn read_level<R: Read>(reader: &mut R, len: usize, level: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(TextureError::Structural(format!(
            "texel data of level {} is truncated ({} of {} bytes)",
            level,
            data.len(),
            len
        )));
    }
    Ok(data)
}

pub(crate) fn platform_of(prefix: &[u8]) -> Option<u32> {
    prefix
        .get(0..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
