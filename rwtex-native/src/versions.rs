use std::fmt;

use serde::{Deserialize, Serialize};

pub const PLATFORM_XBOX: u32 = 5;
pub const PLATFORM_GAMECUBE: u32 = 6;
pub const PLATFORM_D3D8: u32 = 8;
pub const PLATFORM_D3D9: u32 = 9;
/// `'PVR\0'`
pub const PLATFORM_POWERVR: u32 = 0x0052_5650;

/// A RenderWare library version, `major.minor.revision.build`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
    pub build: u8,
}

impl LibraryVersion {
    pub const fn new(major: u8, minor: u8, revision: u8, build: u8) -> Self {
        Self {
            major,
            minor,
            revision,
            build,
        }
    }

    /// Decodes a library ID stamp as found in chunk headers.
    ///
    /// Stamps from before 3.1 only carry the version in the low 16 bits (`0x0310`),
    /// newer ones pack it into the top bits next to a build number.
    pub fn from_library_id(id: u32) -> Self {
        if id & 0xFFFF_0000 == 0 {
            let version = id << 8;
            return Self::new(
                ((version >> 16) & 0xF) as u8,
                ((version >> 12) & 0xF) as u8,
                ((version >> 8) & 0xF) as u8,
                0,
            );
        }

        let version = ((id >> 14) & 0x3FF00) + 0x30000 | ((id >> 16) & 0x3F);
        Self::new(
            ((version >> 16) & 0xF) as u8,
            ((version >> 12) & 0xF) as u8,
            ((version >> 8) & 0xF) as u8,
            (version & 0xFF) as u8,
        )
    }

    pub fn to_library_id(&self, build_number: u16) -> u32 {
        let version = ((self.major as u32) << 16)
            | ((self.minor as u32) << 12)
            | ((self.revision as u32) << 8)
            | self.build as u32;

        ((version.wrapping_sub(0x30000) & 0x3FF00) << 14) | ((version & 0x3F) << 16) | build_number as u32
    }
}

impl Default for LibraryVersion {
    fn default() -> Self {
        Self::new(3, 6, 0, 3)
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.build
        )
    }
}
