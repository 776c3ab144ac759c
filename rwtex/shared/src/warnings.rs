use std::fmt;

use tracing::{debug, warn};

use crate::config::EngineConfig;

pub const LEVEL_SERIOUS: u32 = 1;
pub const LEVEL_NORMAL: u32 = 2;
pub const LEVEL_MINOR: u32 = 3;
pub const LEVEL_VERBOSE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: u32,
    /// Only relevant when checking file integrity
    pub secure: bool,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Non-fatal anomalies collected during one operation
#[derive(Debug, Clone)]
pub struct WarningLog {
    max_level: u32,
    ignore_secure: bool,
    entries: Vec<Warning>,
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl WarningLog {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_level: config.warning_level,
            ignore_secure: config.ignore_secure_warnings,
            entries: vec![],
        }
    }

    pub fn push<S: Into<String>>(&mut self, level: u32, message: S) {
        self.record(Warning {
            level,
            secure: false,
            message: message.into(),
        });
    }

    pub fn push_secure<S: Into<String>>(&mut self, level: u32, message: S) {
        self.record(Warning {
            level,
            secure: true,
            message: message.into(),
        });
    }

    fn record(&mut self, warning: Warning) {
        if warning.level > self.max_level || (warning.secure && self.ignore_secure) {
            debug!("Dropped warning: {}", warning.message);
            return;
        }

        warn!("{}", warning.message);
        self.entries.push(warning);
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any recorded message contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|w| w.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter() {
        let mut config = EngineConfig::default();
        config.warning_level = 2;
        let mut log = WarningLog::new(&config);
        log.push(LEVEL_SERIOUS, "kept");
        log.push(LEVEL_MINOR, "dropped");
        assert_eq!(log.len(), 1);
        assert!(log.mentions("kept"));
        assert!(!log.mentions("dropped"));
    }

    #[test]
    fn secure_warnings_follow_config() {
        let mut config = EngineConfig::default();
        config.ignore_secure_warnings = true;
        let mut log = WarningLog::new(&config);
        log.push_secure(LEVEL_SERIOUS, "trailing bytes");
        assert!(log.is_empty());

        config.ignore_secure_warnings = false;
        let mut log = WarningLog::new(&config);
        log.push_secure(LEVEL_SERIOUS, "trailing bytes");
        assert_eq!(log.entries()[0].secure, true);
    }
}
