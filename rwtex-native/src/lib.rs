//! Wire-level vocabulary of the texture formats: binary header structs, native format
//! codes, the generic raster vocabulary and the error taxonomy shared by all adapters.

pub mod common;
pub mod d3d;
pub mod dds;
pub mod error;
pub mod gamecube;
pub mod powervr;
pub mod pvr;
pub mod raster;
pub mod util;
pub mod versions;
pub mod xbox;

// Re-export binrw
pub use binrw;

pub use error::{ErrorKind, Result, TextureError};
