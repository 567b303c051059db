//! Client configuration.

use nx_sf::HosVersion;

/// Configuration for [`PmClient`](crate::PmClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmConfig {
    /// Version of the running system.
    pub hos_version: HosVersion,
    /// First version using the renumbered `pm:dmnt` command table.
    pub dmnt_renumber_threshold: HosVersion,
}

impl PmConfig {
    pub const fn new(hos_version: HosVersion) -> Self {
        Self {
            hos_version,
            dmnt_renumber_threshold: HosVersion::V5_0_0,
        }
    }

    pub const fn with_hos_version(mut self, hos_version: HosVersion) -> Self {
        self.hos_version = hos_version;
        self
    }

    pub const fn with_dmnt_renumber_threshold(mut self, threshold: HosVersion) -> Self {
        self.dmnt_renumber_threshold = threshold;
        self
    }

    /// Whether `pm:dmnt` uses the 5.0.0 command numbering.
    pub fn dmnt_renumbered(&self) -> bool {
        self.hos_version >= self.dmnt_renumber_threshold
    }
}

impl Default for PmConfig {
    fn default() -> Self {
        Self::new(HosVersion::default())
    }
}
