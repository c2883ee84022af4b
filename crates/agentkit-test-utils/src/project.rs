//! [`TestProject`] builder for sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::git::native_manifest;

/// A temporary project directory holding plugin sources, a configuration file
/// and a lockfile.
///
/// # Example
///
/// ```rust,no_run
/// use agentkit_test_utils::TestProject;
///
/// let project = TestProject::new();
/// project.native_plugin("plugins/echo", "echo");
/// project.assert_file_exists("plugins/echo/plugin.toml");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `rel` below the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("TestProject::write: {}: {e}", path.display()));
        path
    }

    /// Create a plugin directory with a native `plugin.toml` and a source file.
    pub fn native_plugin(&self, rel: &str, name: &str) -> PathBuf {
        self.write(&format!("{rel}/plugin.toml"), &native_manifest(name, "1"));
        self.write(&format!("{rel}/src/main.py"), "def run():\n    return 1\n");
        self.path(rel)
    }

    /// Create a plugin directory whose native manifest declares one required
    /// variable `greeting` and one optional variable `punctuation` defaulting to `!`.
    pub fn parameterized_plugin(&self, rel: &str, name: &str) -> PathBuf {
        let manifest = format!(
            "[plugin]\nname = \"{name}\"\ndescription = \"Greets people\"\n\
             instructions = \"Use greet for salutations\"\n\n\
             [[functions]]\nname = \"greet\"\ndescription = \"Say hello\"\n\n\
             [variables.greeting]\ndescription = \"Greeting word\"\nrequired = true\n\n\
             [variables.punctuation]\ndescription = \"Trailing mark\"\ndefault = \"!\"\n"
        );
        self.write(&format!("{rel}/plugin.toml"), &manifest);
        self.path(rel)
    }

    /// Create a plugin directory in the foreign SDK shape (`plugin.json`).
    pub fn foreign_plugin(&self, rel: &str, name: &str) -> PathBuf {
        let manifest = format!(
            r#"{{
  "name": "{name}",
  "description": "Foreign plugin",
  "plugin_instructions": "Call search first",
  "kernel_functions": [
    {{ "name": "search", "description": "Search things" }},
    {{ "name": "fetch", "description": "Fetch a thing" }}
  ],
  "variables": {{
    "endpoint": {{ "description": "API endpoint", "default": "https://example.test" }}
  }}
}}
"#
        );
        self.write(&format!("{rel}/plugin.json"), &manifest);
        self.path(rel)
    }

    /// Write the default configuration file and return its path.
    pub fn write_config(&self, yaml: &str) -> PathBuf {
        self.write("agentkit.yaml", yaml)
    }

    /// Default lockfile location.
    pub fn lockfile_path(&self) -> PathBuf {
        self.path("agentkit.lock.json")
    }

    /// Read the lockfile as text.
    ///
    /// # Panics
    /// Panics if the lockfile does not exist.
    pub fn read_lockfile(&self) -> String {
        fs::read_to_string(self.lockfile_path()).expect("lockfile should exist")
    }

    /// Assert that `rel` exists below the project root.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, rel: &str) {
        let full_path = self.path(rel);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `rel` does **not** exist below the project root.
    pub fn assert_file_not_exists(&self, rel: &str) {
        let full_path = self.path(rel);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }
}
