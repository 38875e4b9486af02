//! Content hashing with blake3.
//!
//! `ContentHash` backs both module fingerprints (source + chain + mode) and
//! the `[hash]` placeholder of emitted file names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a single byte slice.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex digits, as used in `[hash:N]` placeholders.
    pub fn short(self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.clamp(1, 64));
        hex
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short(16))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).ok_or_else(|| serde::de::Error::custom("invalid content hash"))
    }
}

/// Incremental hasher over several labelled parts.
///
/// Parts are length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
#[derive(Default)]
pub struct HashBuilder(blake3::Hasher);

impl HashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, data: impl AsRef<[u8]>) -> Self {
        let data = data.as_ref();
        self.0.update(&(data.len() as u64).to_le_bytes());
        self.0.update(data);
        self
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(*self.0.finalize().as_bytes())
    }
}
