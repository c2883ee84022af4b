//! Shared git2 helper functions for plugin repositories
//!
//! Everything here operates on a single clone whose only remote is `origin`.

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, Direction, FetchOptions, Remote, Repository};

use crate::{Error, Result};

const ORIGIN: &str = "origin";

const FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

/// Whether `path` is the root of a git repository.
pub fn is_repository(path: &Path) -> bool {
    Repository::open(path).is_ok()
}

/// Clone `url` into `dest`, downloading all tags.
///
/// Parent directories of `dest` are created as needed.
pub fn clone_repo(url: &str, dest: &Path) -> Result<Repository> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut fetch = FetchOptions::new();
    fetch.download_tags(AutotagOption::All);

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);

    tracing::debug!(url = %url, dest = %dest.display(), "Cloning repository");
    builder.clone(url, dest).map_err(|e| Error::CloneFailed {
        url: url.to_string(),
        message: e.message().to_string(),
    })
}

/// Fetch every branch and tag from `origin`.
pub fn fetch_origin(repo: &Repository) -> Result<()> {
    let mut remote = repo.find_remote(ORIGIN)?;
    let url = remote.url().unwrap_or(ORIGIN).to_string();

    let mut fetch = FetchOptions::new();
    fetch.download_tags(AutotagOption::All);

    tracing::debug!(url = %url, "Fetching origin");
    remote
        .fetch(&FETCH_REFSPECS, Some(&mut fetch), None)
        .map_err(|e| Error::FetchFailed {
            url,
            message: e.message().to_string(),
        })
}

/// Check out `reference` without touching the network.
///
/// The reference is resolved as a remote-tracking branch `origin/<ref>` first,
/// then as a tag, then as any revision git understands. A local branch is
/// checked out attached; everything else leaves HEAD detached.
pub fn checkout_revision(repo: &Repository, reference: &str) -> Result<()> {
    let candidates = [
        format!("refs/remotes/{ORIGIN}/{reference}"),
        format!("refs/tags/{reference}"),
        reference.to_string(),
    ];

    for candidate in &candidates {
        let Ok((object, resolved)) = repo.revparse_ext(candidate) else {
            continue;
        };
        let commit = object.peel_to_commit().map_err(|e| Error::CheckoutFailed {
            reference: reference.to_string(),
            message: e.message().to_string(),
        })?;

        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
            .map_err(|e| Error::CheckoutFailed {
                reference: reference.to_string(),
                message: e.message().to_string(),
            })?;

        match resolved.as_ref().and_then(|r| r.name()) {
            Some(name) if name.starts_with("refs/heads/") => repo.set_head(name)?,
            _ => repo.set_head_detached(commit.id())?,
        }

        tracing::debug!(reference = %reference, resolved = %candidate, commit = %commit.id(), "Checked out revision");
        return Ok(());
    }

    Err(Error::CheckoutFailed {
        reference: reference.to_string(),
        message: "no branch, tag or revision with that name".to_string(),
    })
}

/// Fetch `branch` from `origin` and check out `FETCH_HEAD`.
pub fn pull_branch(repo: &Repository, branch: &str) -> Result<()> {
    let mut remote = repo.find_remote(ORIGIN)?;
    let url = remote.url().unwrap_or(ORIGIN).to_string();

    remote
        .fetch(&[branch], None, None)
        .map_err(|e| Error::FetchFailed {
            url: url.clone(),
            message: format!("Fetch of '{}' failed: {}", branch, e.message()),
        })?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .map_err(|e| Error::FetchFailed {
            url: url.clone(),
            message: format!("Could not find FETCH_HEAD: {}", e.message()),
        })?;

    let commit = fetch_head.peel_to_commit().map_err(|e| Error::FetchFailed {
        url,
        message: format!("Could not resolve FETCH_HEAD: {}", e.message()),
    })?;

    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
        .map_err(|e| Error::CheckoutFailed {
            reference: branch.to_string(),
            message: e.message().to_string(),
        })?;
    repo.set_head_detached(commit.id())?;

    Ok(())
}

/// Commit id checked out in the repository at `path`.
///
/// Returns an empty string when `path` is missing, is not a repository or has
/// no commits.
pub fn head_commit(path: &Path) -> String {
    let lookup = || -> Result<String> {
        let repo = Repository::open(path)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    };

    match lookup() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read HEAD commit");
            String::new()
        }
    }
}

/// Refs advertised by the repository at `url`, as `(name, commit id)` pairs.
///
/// Only the ref advertisement is exchanged; no objects are downloaded.
pub fn advertised_refs(url: &str) -> Result<Vec<(String, String)>> {
    let mut remote = Remote::create_detached(url)?;
    remote
        .connect(Direction::Fetch)
        .map_err(|e| Error::RemoteUnreachable {
            url: url.to_string(),
            message: e.message().to_string(),
        })?;

    let refs = remote
        .list()
        .map_err(|e| Error::RemoteUnreachable {
            url: url.to_string(),
            message: e.message().to_string(),
        })?
        .iter()
        .map(|head| (head.name().to_string(), head.oid().to_string()))
        .collect();

    if let Err(e) = remote.disconnect() {
        tracing::debug!(url = %url, error = %e, "Disconnect after ref listing failed");
    }

    Ok(refs)
}
