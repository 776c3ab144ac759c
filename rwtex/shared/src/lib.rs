//! RenderWare native texture transcoding: reads and writes the per-platform
//! texture containers and moves their pixels through a common representation.

pub mod config;
pub mod engine;
pub mod mipmap;
pub mod pixel;
pub mod platform;
pub mod textures;
pub mod warnings;

pub use rwtex_native::error;

pub use config::EngineConfig;
pub use engine::TextureEngine;
pub use platform::texture::{NativeFormatKind, NativeTexture, TextureInfo};
pub use textures::{Acquisition, ImportReport, PixelData};
