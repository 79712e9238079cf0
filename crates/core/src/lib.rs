//! Core types for pgstash.
//!
//! This crate defines the pieces shared by the store and the CLI:
//! - Size classification (inline vs. large object) and the inline read limit
//! - Named, sized source streams and the filesystem provider
//! - Configuration types

pub mod config;
pub mod error;
pub mod size;
pub mod source;

pub use error::{Error, Result};
pub use size::{ReadLimit, SizeThreshold, StorageClass, classify};
pub use source::{FileMeta, SourceFile};

/// Default size threshold: 1 MiB
pub const DEFAULT_SIZE_THRESHOLD: u64 = 1024 * 1024;

/// Default inline read limit: 16 MiB
pub const DEFAULT_READ_LIMIT: u64 = 16 * 1024 * 1024;

/// Default destination table.
pub const DEFAULT_TABLE_NAME: &str = "pgstash_files";

/// Default destination schema.
pub const DEFAULT_SCHEMA: &str = "public";
