//! Cache module for storing raw upstream responses to disk
//!
//! This module provides a keyed file cache that persists payloads to the
//! filesystem under a digest of the request, with a TTL measured from the
//! file's modification time. Every upstream client gets its own directory.

mod manager;

pub use manager::{CacheConfig, CacheError, KeyedFileCache, ENTRY_SUFFIX, KEY_LENGTH};
