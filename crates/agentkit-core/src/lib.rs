//! Plugin dependency resolution and lockfile reconciliation
//!
//! Agents declare plugins backed by local paths or git repositories. A
//! [`SyncEngine`] brings each declared plugin onto disk, loads it, and records
//! what was installed in the lockfile, detecting changes by fingerprint.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentkit_core::{AgentDeclaration, PluginDeclaration, SyncEngine, SyncOptions};
//! use agentkit_lock::PluginKind;
//! use std::path::Path;
//!
//! let agents = vec![AgentDeclaration::new(
//!     "helper",
//!     "Helper",
//!     vec![PluginDeclaration::local("./plugins/echo", PluginKind::Standard)],
//! )];
//!
//! let engine = SyncEngine::new("/project");
//! let report = engine
//!     .sync_file(&agents, Path::new("/project/agentkit.lock.json"), &SyncOptions::default())
//!     .unwrap();
//! println!("{} added", report.stats.added);
//! ```

pub mod declaration;
pub mod error;
pub mod loader;
pub mod reconcile;
pub mod source;
pub mod sync;

pub use declaration::{AgentDeclaration, PluginDeclaration, SourceSpec};
pub use error::{Error, Result};
pub use loader::{Loader, ManifestLoader, Plugin, PluginHandle};
pub use reconcile::{PluginOutcome, PluginStatus, Reconciler};
pub use source::{LocalSource, RemoteSource, Source};
pub use sync::{Stats, SyncEngine, SyncOptions, SyncReport};
