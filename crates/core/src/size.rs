//! Storage class selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a file's content ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// Stored in the row's `small_content` column.
    Inline,
    /// Streamed into a large object referenced by `large_content_id`.
    LargeObject,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::LargeObject => "large_object",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-count boundary between inline and large-object storage.
///
/// The boundary is inclusive on the inline side: a file of exactly
/// `threshold` bytes is stored inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeThreshold(u64);

impl SizeThreshold {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Classify a declared file size.
    pub fn classify(&self, size: u64) -> StorageClass {
        classify(size, *self)
    }
}

impl Default for SizeThreshold {
    fn default() -> Self {
        Self(crate::DEFAULT_SIZE_THRESHOLD)
    }
}

impl fmt::Display for SizeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// Map a byte length to its storage class.
pub fn classify(size: u64, threshold: SizeThreshold) -> StorageClass {
    if size <= threshold.0 {
        StorageClass::Inline
    } else {
        StorageClass::LargeObject
    }
}

/// Maximum number of bytes the inline path reads into memory.
///
/// Independent of [`SizeThreshold`]; a limit below the threshold makes every
/// save fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadLimit(u64);

impl ReadLimit {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Whether the limit can hold every file the threshold routes inline.
    pub fn covers(&self, threshold: SizeThreshold) -> bool {
        self.0 >= threshold.bytes()
    }
}

impl Default for ReadLimit {
    fn default() -> Self {
        Self(crate::DEFAULT_READ_LIMIT)
    }
}

impl fmt::Display for ReadLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}
