//! Git operations for agentkit remote plugin sources
//!
//! Cloning, fetching and checking out plugin repositories, reading the commit a
//! clone is on, and asking an upstream which commit a ref currently points to.

pub mod checkout;
pub mod error;
pub mod helpers;
pub mod url;

pub use checkout::{CheckoutStrategy, checkout_with_fallback, resolve_advertised};
pub use error::{Error, Result};
pub use helpers::{advertised_refs, clone_repo, fetch_origin, head_commit, is_repository};
pub use url::{RepoUrl, normalize};
