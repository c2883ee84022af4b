//! Repository URL parsing and normalization
//!
//! Plugin declarations name repositories in several shorthand forms. All of
//! them parse into a [`RepoUrl`], which knows how to produce a clone URL, a
//! display name and a normalized comparison key.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Host assumed for `owner/repo` shorthand.
pub const DEFAULT_HOST: &str = "github.com";

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"));

static HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.-]+(:\d+)?$").expect("valid regex"));

/// Where a repository lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    /// A hosted repository reached over `scheme://host/owner/repo`
    Hosted { scheme: String, host: String },
    /// A repository on the local filesystem, given as `file://` or a path
    Local { url: String, path: PathBuf },
}

/// A parsed repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    location: Location,
    owner: String,
    repo: String,
}

impl RepoUrl {
    /// Parse any accepted repository form.
    ///
    /// Accepted: `owner/repo`, `host/owner/repo`, `http(s)://host/owner/repo[.git]`,
    /// `file:///abs/path` and absolute filesystem paths.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(input, "empty repository reference"));
        }

        if let Some(rest) = trimmed.strip_prefix("file://") {
            return Self::local(trimmed, Path::new(rest), input);
        }
        if Path::new(trimmed).is_absolute() {
            return Self::local(trimmed, Path::new(trimmed), input);
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "https" && scheme != "http" {
                    return Err(invalid(input, &format!("unsupported scheme '{scheme}'")));
                }
                (scheme, rest)
            }
            None => ("https".to_string(), trimmed),
        };

        let segments: Vec<&str> = rest.split('/').collect();
        let (host, owner, repo) = match segments.as_slice() {
            [owner, repo] if !trimmed.contains("://") => (DEFAULT_HOST, *owner, *repo),
            [host, owner, repo] if looks_like_host(host) => (*host, *owner, *repo),
            _ => {
                return Err(invalid(
                    input,
                    "expected owner/repo, host/owner/repo or a full URL",
                ));
            }
        };

        if !HOST.is_match(host) {
            return Err(invalid(input, &format!("invalid host '{host}'")));
        }
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        for segment in [owner, repo] {
            if !SEGMENT.is_match(segment) || segment == "." || segment == ".." {
                return Err(invalid(input, &format!("invalid path segment '{segment}'")));
            }
        }

        Ok(Self {
            location: Location::Hosted {
                scheme,
                host: host.to_string(),
            },
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn local(url: &str, path: &Path, input: &str) -> Result<Self> {
        let repo = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid(input, "path has no final component"))?;
        let repo = repo.strip_suffix(".git").unwrap_or(&repo).to_string();
        let owner = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());

        Ok(Self {
            location: Location::Local {
                url: url.to_string(),
                path: path.to_path_buf(),
            },
            owner,
            repo,
        })
    }

    /// Repository owner. For filesystem repositories this is the parent directory name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name without any `.git` suffix.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Whether this repository lives on the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self.location, Location::Local { .. })
    }

    /// Return a copy whose fetched repository name carries `prefix`.
    ///
    /// Filesystem repositories are used verbatim.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        if self.is_local() || prefix.is_empty() || self.repo.starts_with(prefix) {
            return self.clone();
        }
        Self {
            repo: format!("{prefix}{}", self.repo),
            ..self.clone()
        }
    }

    /// URL handed to git for cloning and ref queries.
    pub fn clone_url(&self) -> String {
        match &self.location {
            Location::Hosted { scheme, host } => {
                format!("{scheme}://{host}/{}/{}", self.owner, self.repo)
            }
            Location::Local { url, .. } => url.clone(),
        }
    }

    /// Comparison form: `host/owner/repo`, lower-cased, no scheme, no `.git`.
    pub fn normalized(&self) -> String {
        match &self.location {
            Location::Hosted { host, .. } => {
                format!("{host}/{}/{}", self.owner, self.repo).to_lowercase()
            }
            Location::Local { path, .. } => {
                let parent = path.parent().unwrap_or_else(|| Path::new(""));
                format!(
                    "{}/{}",
                    parent.to_string_lossy().trim_end_matches('/'),
                    self.repo
                )
                .to_lowercase()
            }
        }
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clone_url())
    }
}

/// Normalize a stored repository URL for comparison.
///
/// Unparseable input falls back to a lower-cased, scheme-less, suffix-less form,
/// so entries written by older versions can still be compared.
pub fn normalize(url: &str) -> String {
    match RepoUrl::parse(url) {
        Ok(parsed) => parsed.normalized(),
        Err(_) => {
            let lowered = url.trim().trim_end_matches('/').to_lowercase();
            let without_scheme = lowered
                .split_once("://")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(lowered);
            without_scheme
                .strip_suffix(".git")
                .map(str::to_string)
                .unwrap_or(without_scheme)
        }
    }
}

fn looks_like_host(segment: &str) -> bool {
    segment.contains('.') || segment.split(':').next() == Some("localhost")
}

fn invalid(url: &str, reason: &str) -> Error {
    Error::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
