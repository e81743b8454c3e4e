//! Per-key version stamps
//!
//! Every write to the statistics store produces a version. Versions are
//! monotonic stamps used for optimistic concurrency: a writer
//! reads an entry together with its version and the store only accepts the
//! follow-up write if the version is still current.
//!
//! `Version::ZERO` never names a stored entry. Passing it as the expected
//! version of a write means "the key must not exist yet".

use serde::{Deserialize, Serialize};

/// Version identifier for a stored statistic
///
/// ## Invariants
///
/// - Versions are strictly increasing per key
/// - Stores allocate versions from a store-wide counter, so a deleted and
///   re-created key never reuses a version a stale writer may still hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Expected version for writes that create a key
    pub const ZERO: Version = Version(0);

    /// Create a version from its raw counter
    pub const fn new(n: u64) -> Self {
        Version(n)
    }

    /// Get the numeric value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The version following this one
    ///
    /// Saturates at `u64::MAX`; a key never sees that many writes.
    pub const fn next(&self) -> Self {
        Version(self.0.saturating_add(1))
    }

    /// Check if this is the "absent" version
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Version(v)
    }
}

/// A value paired with the version it was read at
///
/// Store reads return `Versioned<T>`; the version is what a follow-up
/// write must name as its expected version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The stored value
    pub value: T,
    /// Version of the value
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Wrap a value with its version
    pub fn new(value: T, version: Version) -> Self {
        Versioned { value, version }
    }

    /// Map the inner value to a new type
    pub fn map<U, F>(self, f: F) -> Versioned<U>
    where
        F: FnOnce(T) -> U,
    {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }

    /// Consume and return the inner value
    #[inline]
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_zero() {
        assert!(Version::ZERO.is_zero());
        assert!(!Version::new(1).is_zero());
        assert_eq!(Version::default(), Version::ZERO);
    }

    #[test]
    fn test_version_next() {
        assert_eq!(Version::ZERO.next(), Version::new(1));
        assert_eq!(Version::new(41).next().as_u64(), 42);
        assert_eq!(Version::new(u64::MAX).next(), Version::new(u64::MAX));
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(1) < Version::new(2));
        assert!(Version::ZERO < Version::new(1));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(7).to_string(), "v7");
    }

    #[test]
    fn test_versioned_map() {
        let v = Versioned::new(21u32, Version::new(3));
        let doubled = v.map(|x| x * 2);
        assert_eq!(doubled.value, 42);
        assert_eq!(doubled.version, Version::new(3));
    }

    #[test]
    fn test_version_serialization_roundtrip() {
        let v = Version::new(99);
        let json = serde_json::to_string(&v).unwrap();
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
