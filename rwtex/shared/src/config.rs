use std::path::Path;

use anyhow::Context;
use rwtex_native::versions::LibraryVersion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DxtQuality {
    RangeFit,
    ClusterFit,
    IterativeClusterFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteQuality {
    /// Exact palette when the colors fit, median cut otherwise
    MedianCut,
    /// Refuse to quantize
    ExactOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Warnings with a level above this are dropped (1 = serious .. 4 = chatter)
    pub warning_level: u32,
    /// Drop warnings that only matter when checking file integrity
    pub ignore_secure_warnings: bool,
    /// Convert generic pixels a native format cannot store instead of failing
    pub fix_incompatible_rasters: bool,
    /// Decompress alpha-less DXT1 into 565 instead of 8888
    pub dxt_packed_decompression: bool,
    pub dxt_quality: DxtQuality,
    pub palette_quality: PaletteQuality,
    /// Version used when a native texture is written without an explicit one
    pub target_version: LibraryVersion,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warning_level: 3,
            ignore_secure_warnings: true,
            fix_incompatible_rasters: true,
            dxt_packed_decompression: false,
            dxt_quality: DxtQuality::ClusterFit,
            palette_quality: PaletteQuality::MedianCut,
            target_version: LibraryVersion::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(source: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(source).context("Failed to parse engine configuration")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;

        Self::from_yaml_str(&source)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize engine configuration")
    }

    pub(crate) fn squish_params(&self) -> squish::Params {
        squish::Params {
            algorithm: match self.dxt_quality {
                DxtQuality::RangeFit => squish::Algorithm::RangeFit,
                DxtQuality::ClusterFit => squish::Algorithm::ClusterFit,
                DxtQuality::IterativeClusterFit => squish::Algorithm::IterativeClusterFit,
            },
            ..squish::Params::default()
        }
    }
}
