//! Shared test utilities for the agentkit workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: upstream git repositories with commits and tags
//! - [`project`]: [`TestProject`] builder for plugin directories, configs and lockfiles

pub mod git;
pub mod project;

pub use git::Upstream;
pub use project::TestProject;
