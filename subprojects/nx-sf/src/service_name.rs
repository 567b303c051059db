//! Service name type for Horizon OS services.
//!
//! Service names in Horizon OS are up to 8 characters, with remaining
//! bytes set to zero. The whole name fits in a single `u64`, which is how
//! the service manager receives it on the wire.

use static_assertions::const_assert_eq;

/// Fixed-capacity ASCII string for service names (max 8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct ServiceName {
    name: [u8; 8],
}

const_assert_eq!(size_of::<ServiceName>(), size_of::<u64>());

impl ServiceName {
    /// Maximum length of a service name (8 characters).
    pub const MAX_LEN: usize = 8;

    /// Creates a service name from a string slice.
    ///
    /// Returns `None` if the name exceeds 8 characters or is not ASCII.
    #[inline]
    pub const fn new(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > Self::MAX_LEN {
            return None;
        }

        let mut result = [0u8; 8];
        let mut c = 0;
        while c < bytes.len() {
            if !bytes[c].is_ascii() || bytes[c] == 0 {
                return None;
            }
            result[c] = bytes[c];
            c += 1;
        }
        Some(Self { name: result })
    }

    /// Creates a service name from a literal known to be valid.
    ///
    /// # Panics
    ///
    /// Panics (at compile time, in const context) if the name is longer than
    /// 8 characters or not ASCII.
    #[inline]
    pub const fn from_static(name: &'static str) -> Self {
        match Self::new(name) {
            Some(name) => name,
            None => panic!("invalid service name"),
        }
    }

    /// Converts the service name to the `u64` sent on the wire.
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.name)
    }

    /// Returns the bytes of the service name (excluding trailing zeros).
    #[inline]
    pub const fn as_bytes(&self) -> &[u8] {
        self.name.split_at(self.len()).0
    }

    /// Returns the length of the service name (excluding trailing zeros).
    pub const fn len(&self) -> usize {
        let mut i = 0;
        while i < Self::MAX_LEN {
            if self.name[i] == 0 {
                return i;
            }
            i += 1;
        }
        Self::MAX_LEN
    }

    /// Returns whether the service name is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.name[0] == 0
    }

    /// Returns the service name as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &str {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(_) => "",
        }
    }
}

impl core::fmt::Display for ServiceName {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.as_str().fmt(f)
    }
}

impl PartialEq<str> for ServiceName {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ServiceName {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<ServiceName> for &str {
    #[inline]
    fn eq(&self, other: &ServiceName) -> bool {
        other == self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_packs_into_u64() {
        let name = ServiceName::from_static("spl:");
        assert_eq!(name.to_u64(), u64::from_le_bytes(*b"spl:\0\0\0\0"));
        assert_eq!(name.len(), 4);
        assert_eq!(name, "spl:");
    }

    #[test]
    fn test_service_name_rejects_long_or_non_ascii() {
        assert!(ServiceName::new("spl:manu").is_some());
        assert!(ServiceName::new("spl:manu1").is_none());
        assert!(ServiceName::new("spé").is_none());
    }
}
