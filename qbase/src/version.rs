use std::fmt;

use rand::Rng;

/// A QUIC version number, the 32-bit field following the first byte of a long header.
///
/// Version 0 is not a version: it marks a Version Negotiation packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u32);

impl Version {
    /// Marks a Version Negotiation packet.
    pub const NEGOTIATION: Self = Self(0);
    pub const DRAFT_15: Self = Self(0xff00_000f);
    pub const DRAFT_16: Self = Self(0xff00_0010);

    /// Versions this implementation can parse beyond the invariant header,
    /// in order of preference.
    pub const SUPPORTED: &'static [Version] = &[Self::DRAFT_16, Self::DRAFT_15];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// Reserved versions follow the pattern `0x?a?a?a?a`, they are never
    /// spoken by anyone and exist to exercise version negotiation.
    pub fn is_reserved(self) -> bool {
        self.0 & 0x0f0f_0f0f == 0x0a0a_0a0a
    }

    /// A random reserved version.
    pub fn random_reserved() -> Self {
        Self((rand::rng().random::<u32>() & 0xf0f0_f0f0) | 0x0a0a_0a0a)
    }
}

impl From<u32> for Version {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Version> for u32 {
    fn from(value: Version) -> Self {
        value.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Version;

    #[test]
    fn test_reserved_version() {
        for _ in 0..16 {
            let version = Version::random_reserved();
            assert!(version.is_reserved());
            assert!(!version.is_supported());
        }
        assert!(Version(0x1a2a3a4a).is_reserved());
        assert!(!Version::DRAFT_15.is_reserved());
    }

    #[test]
    fn test_supported_version() {
        assert!(Version::DRAFT_15.is_supported());
        assert!(Version::DRAFT_16.is_supported());
        assert!(!Version::NEGOTIATION.is_supported());
        assert!(!Version(0x1234_5678).is_supported());
        assert_eq!(Version::DRAFT_15.to_string(), "0xff00000f");
    }
}
