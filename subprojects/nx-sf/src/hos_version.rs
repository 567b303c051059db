//! Horizon OS version numbers.
//!
//! Service clients take the running system version as configuration rather
//! than probing for it, so version-gated behavior can be selected (and
//! tested) explicitly.

/// Atmosphere flag bit position (bit 31)
const ATMOSPHERE_BIT: u32 = 1 << 31;

/// Represents a Horizon OS version (major.minor.patch).
///
/// Packed as `major << 16 | minor << 8 | patch`, so versions order
/// numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HosVersion(u32);

impl HosVersion {
    /// 4.0.0, the release that split `spl:` into per-role services.
    pub const V4_0_0: Self = Self::new(4, 0, 0);

    /// 5.0.0, the release that renumbered the `pm:dmnt` commands.
    pub const V5_0_0: Self = Self::new(5, 0, 0);

    /// Creates a new HosVersion from major, minor, and patch components.
    #[inline]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self(((major as u32) << 16) | ((minor as u32) << 8) | (patch as u32))
    }

    /// Creates a HosVersion from a raw packed value.
    ///
    /// The Atmosphere flag (bit 31), if set, is dropped.
    #[inline]
    pub const fn from_u32(raw: u32) -> Self {
        Self(raw & !ATMOSPHERE_BIT)
    }

    /// Returns the raw packed version value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn major(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    #[inline]
    pub const fn minor(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    #[inline]
    pub const fn patch(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl core::fmt::Display for HosVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_order_numerically() {
        assert!(HosVersion::new(3, 0, 2) < HosVersion::V4_0_0);
        assert!(HosVersion::new(4, 0, 0) >= HosVersion::V4_0_0);
        assert!(HosVersion::new(10, 1, 0) > HosVersion::new(9, 255, 255));
    }

    #[test]
    fn test_from_u32_drops_atmosphere_flag() {
        let v = HosVersion::from_u32(0x8004_0100);
        assert_eq!((v.major(), v.minor(), v.patch()), (4, 1, 0));
        assert_eq!(std::format!("{v}"), "4.1.0");
    }
}
