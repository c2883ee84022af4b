//! Filesystem primitives for agentkit
//!
//! Provides content fingerprints for local plugin sources, atomic file
//! writes, and the well-known project paths.

pub mod checksum;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{
    TRACKED_EXTENSIONS, compute_content_checksum, compute_file_checksum, compute_tree_checksum,
    fingerprint_path,
};
pub use constants::ProjectPath;
pub use error::{Error, Result};
pub use path::NormalizedPath;
