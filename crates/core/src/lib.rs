//! Core domain types and shared logic for DSS.
//!
//! This crate defines the data model shared by the other crates:
//! - Content hashing for stored files
//! - Storage name generation and display name sanitizing
//! - Tag normalization
//! - The validated shape of a file listing query
//! - Application configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod query;
pub mod storage_name;
pub mod tag;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use query::{ListParams, ListQuery, SortField, SortOrder};
pub use storage_name::{RandomNameGenerator, StorageNameGenerator};

/// Default upload ceiling: 10 GiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Number of keys returned by a listing when no limit is given.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

/// Largest listing limit accepted unless configured otherwise.
pub const MAX_LIST_LIMIT: u32 = 100;
