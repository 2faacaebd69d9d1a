//! Freshness detection: content-hash (blake3) and mtime policies.

mod hash;
pub mod mtime;

pub use hash::{ContentHash, compute_bytes_hash, compute_file_hash, fingerprint_files, walk_files};
