//! Git repository fixtures built with `git2`.
//!
//! No `git` binary is required; every fixture drives libgit2 directly.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository, RepositoryInitOptions, Signature};

/// Initialise an empty repository whose initial branch is `main`.
///
/// # Panics
/// Panics if `git2::Repository::init_opts` fails.
pub fn real_git_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    Repository::init_opts(path, &opts).unwrap_or_else(|e| {
        panic!(
            "real_git_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("signature: failed to build signature: {e}"))
}

/// Write `content` to `rel_path` in the work tree and commit it on HEAD.
///
/// # Panics
/// Panics if any filesystem or git operation fails.
pub fn commit_file(repo: &Repository, rel_path: &str, content: &str, message: &str) -> Oid {
    let workdir = repo
        .workdir()
        .unwrap_or_else(|| panic!("commit_file: repository is bare"));
    let full = workdir.join(rel_path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("commit_file: failed to create {}: {e}", parent.display()));
    }
    fs::write(&full, content)
        .unwrap_or_else(|e| panic!("commit_file: failed to write {}: {e}", full.display()));

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(rel_path)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = signature();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap_or_else(|e| panic!("commit_file: commit failed: {e}"))
}

/// Tag HEAD as `name`. Annotated tags carry a message.
///
/// # Panics
/// Panics if HEAD cannot be resolved or the tag cannot be created.
pub fn tag_head(repo: &Repository, name: &str, annotated: bool) -> Oid {
    let target = repo.head().unwrap().peel_to_commit().unwrap().into_object();
    let result = if annotated {
        repo.tag(name, &target, &signature(), &format!("Release {name}"), false)
    } else {
        repo.tag_lightweight(name, &target, false)
    };
    result.unwrap_or_else(|e| panic!("tag_head: failed to create tag {name}: {e}"))
}

/// Create branch `name` at HEAD without switching to it.
///
/// # Panics
/// Panics if the branch cannot be created.
pub fn branch_at_head(repo: &Repository, name: &str) {
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    repo.branch(name, &head, false)
        .unwrap_or_else(|e| panic!("branch_at_head: failed to create {name}: {e}"));
}

/// A non-bare upstream repository laid out as `<root>/<owner>/<name>`.
///
/// Its absolute path doubles as the clone URL, so the parent directory plays
/// the role of the repository owner.
pub struct Upstream {
    path: PathBuf,
    repo: Repository,
}

impl Upstream {
    /// Create an upstream with a plugin manifest committed on `main`.
    pub fn new(root: &Path, owner: &str, name: &str) -> Self {
        let path = root.join(owner).join(name);
        fs::create_dir_all(&path).unwrap();
        let repo = real_git_repo(&path);
        commit_file(&repo, "plugin.toml", &native_manifest(name, "1"), "Initial commit");
        Self { path, repo }
    }

    /// Absolute path of the upstream, usable as a clone URL.
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Commit a new revision of the manifest and return its commit id.
    pub fn advance(&self, revision: &str) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        commit_file(
            &self.repo,
            "plugin.toml",
            &native_manifest(&name, revision),
            &format!("Revision {revision}"),
        )
        .to_string()
    }

    /// Commit an arbitrary file and return the commit id.
    pub fn commit(&self, rel_path: &str, content: &str) -> String {
        commit_file(&self.repo, rel_path, content, &format!("Update {rel_path}")).to_string()
    }

    /// Tag HEAD with an annotated tag.
    pub fn tag(&self, name: &str) {
        tag_head(&self.repo, name, true);
    }

    /// Commit id HEAD currently points to.
    pub fn head(&self) -> String {
        self.repo
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string()
    }
}

/// A minimal native manifest. `revision` ends up in the description.
pub fn native_manifest(name: &str, revision: &str) -> String {
    format!(
        "[plugin]\nname = \"{name}\"\ndescription = \"revision {revision}\"\n\n\
         [[functions]]\nname = \"run\"\ndescription = \"Run the plugin\"\n"
    )
}
