//! Client configuration.

use nx_sf::HosVersion;

/// Configuration for [`SplClient`](crate::SplClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplConfig {
    /// Version of the running system.
    pub hos_version: HosVersion,
    /// First version with the per-role `spl` services.
    pub split_threshold: HosVersion,
}

impl SplConfig {
    pub const fn new(hos_version: HosVersion) -> Self {
        Self {
            hos_version,
            split_threshold: HosVersion::V4_0_0,
        }
    }

    pub const fn with_hos_version(mut self, hos_version: HosVersion) -> Self {
        self.hos_version = hos_version;
        self
    }

    pub const fn with_split_threshold(mut self, threshold: HosVersion) -> Self {
        self.split_threshold = threshold;
        self
    }

    /// Whether the per-role services exist on this system.
    pub fn split_services(&self) -> bool {
        self.hos_version >= self.split_threshold
    }
}

impl Default for SplConfig {
    fn default() -> Self {
        Self::new(HosVersion::default())
    }
}
