//! Content hashing for stored images
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest used to fingerprint
//! every artifact the store writes or reloads.

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
///
/// Two artifacts with the same hash hold byte-identical image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// First 16 hex characters, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let png = b"\x89PNG\r\n\x1a\nfake";
        assert_eq!(ContentHash::compute(png), ContentHash::compute(png));
        assert_ne!(ContentHash::compute(png), ContentHash::compute(b"other"));
    }

    #[test]
    fn short_prefixes_display() {
        let hash = ContentHash::compute(b"panel");
        assert_eq!(hash.to_string().len(), 64);
        assert_eq!(hash.short().len(), 16);
        assert!(hash.to_string().starts_with(&hash.short()));
    }
}
