//! Lockfile model and persistence for agentkit
//!
//! The lockfile records, per agent and per plugin kind, exactly one
//! [`LockEntry`] for every installed plugin. It is loaded once at the start of
//! a sync, mutated in memory and written back atomically once at the end.

pub mod entry;
pub mod error;
pub mod lockfile;
pub mod migrate;

pub use entry::{LockEntry, PluginKey, PluginKind, SourceKind};
pub use error::{Error, Result};
pub use lockfile::{AgentLockState, LOCKFILE_VERSION, LockFile};
