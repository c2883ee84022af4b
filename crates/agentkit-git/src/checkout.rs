//! Ordered checkout fallback and advertised-ref resolution
//!
//! A declared ref may name a branch, a tag or a commit. Tags are frequently
//! published with a `v` marker while declarations carry the bare number, so a
//! bare numeric ref such as `1.2.3` is retried as `v1.2.3`. Only refs matching
//! `^\d+(\.\d+)*$` get that retry.

use std::sync::LazyLock;

use git2::Repository;
use regex::Regex;

use crate::helpers::{checkout_revision, pull_branch};
use crate::{Error, Result};

static BARE_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("valid regex"));

static FULL_COMMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("valid regex"));

/// Which step of the fallback produced the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStrategy {
    /// The ref resolved as written
    Literal,
    /// The ref resolved after adding the `v` marker
    VersionMarker,
    /// The ref was pulled from origin as a branch
    Pull,
}

/// Whether `reference` is a bare dotted number with no `v` marker.
pub fn is_bare_numeric_version(reference: &str) -> bool {
    BARE_NUMERIC.is_match(reference)
}

/// The `v`-marked form of a bare numeric ref, if it is one.
pub fn version_marker_form(reference: &str) -> Option<String> {
    is_bare_numeric_version(reference).then(|| format!("v{reference}"))
}

/// Check out `reference`, falling back through the marker form and a pull.
///
/// The first step that succeeds wins. When every step fails the error carries
/// each step's failure.
pub fn checkout_with_fallback(repo: &Repository, reference: &str) -> Result<CheckoutStrategy> {
    let mut failures = Vec::new();

    match checkout_revision(repo, reference) {
        Ok(()) => return Ok(CheckoutStrategy::Literal),
        Err(e) => failures.push(e.to_string()),
    }

    if let Some(marked) = version_marker_form(reference) {
        match checkout_revision(repo, &marked) {
            Ok(()) => {
                tracing::info!(reference = %reference, resolved = %marked, "Resolved version with marker");
                return Ok(CheckoutStrategy::VersionMarker);
            }
            Err(e) => failures.push(e.to_string()),
        }
    }

    match pull_branch(repo, reference) {
        Ok(()) => Ok(CheckoutStrategy::Pull),
        Err(e) => {
            failures.push(e.to_string());
            Err(Error::CheckoutFailed {
                reference: reference.to_string(),
                message: failures.join("; "),
            })
        }
    }
}

/// Commit the upstream advertises for `reference`.
///
/// A full commit id is its own answer. Otherwise branches are preferred over
/// tags, peeled tag entries over unpeeled ones, and the `v`-marked tag is
/// consulted last for bare numeric refs.
pub fn resolve_advertised(refs: &[(String, String)], reference: &str) -> Option<String> {
    if FULL_COMMIT.is_match(reference) {
        return Some(reference.to_lowercase());
    }

    let mut wanted = vec![
        format!("refs/heads/{reference}"),
        format!("refs/tags/{reference}^{{}}"),
        format!("refs/tags/{reference}"),
    ];
    if let Some(marked) = version_marker_form(reference) {
        wanted.push(format!("refs/tags/{marked}^{{}}"));
        wanted.push(format!("refs/tags/{marked}"));
    }

    wanted.iter().find_map(|name| {
        refs.iter()
            .find(|(advertised, _)| advertised == name)
            .map(|(_, oid)| oid.clone())
    })
}
