//! Plugin loading
//!
//! A [`Loader`] turns a materialized plugin directory into something that
//! implements [`Plugin`]. The default [`ManifestLoader`] reads a declarative
//! manifest; foreign manifests are wrapped by [`ForeignPluginAdapter`].

mod foreign;
mod manifest;

pub use foreign::{ForeignManifest, ForeignPluginAdapter};
pub use manifest::{MANIFEST_CANDIDATES, ManifestLoader, ManifestPlugin, VariableSpec};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::declaration::PluginDeclaration;

/// Name and description a plugin presents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One callable capability of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// What the rest of the system sees of a loaded plugin.
pub trait Plugin: Send + Sync + fmt::Debug {
    fn identity(&self) -> &Identity;

    fn capabilities(&self) -> Vec<Operation>;

    fn instructions(&self) -> Option<&str> {
        None
    }

    /// Construction arguments the plugin was instantiated with.
    fn variables(&self) -> &BTreeMap<String, Value>;
}

/// A loaded plugin and the directory it was loaded from.
#[derive(Debug)]
pub struct PluginHandle {
    location: PathBuf,
    plugin: Box<dyn Plugin>,
}

impl PluginHandle {
    pub fn new(location: impl Into<PathBuf>, plugin: impl Plugin + 'static) -> Self {
        Self {
            location: location.into(),
            plugin: Box::new(plugin),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }
}

/// Capability to build a plugin from a materialized source.
pub trait Loader: Send + Sync {
    fn load(
        &self,
        dir: &Path,
        sub_path: Option<&str>,
        declaration: &PluginDeclaration,
    ) -> Result<PluginHandle>;
}

/// An external server process. Nothing is discovered on disk.
#[derive(Debug, Clone)]
pub struct ServerExtension {
    identity: Identity,
    command: String,
    args: Vec<String>,
    variables: BTreeMap<String, Value>,
}

impl ServerExtension {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        let command = command.into();
        let description = if args.is_empty() {
            format!("server extension `{command}`")
        } else {
            format!("server extension `{command} {}`", args.join(" "))
        };
        Self {
            identity: Identity {
                name: name.into(),
                description,
            },
            command,
            args,
            variables: BTreeMap::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Plugin for ServerExtension {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn capabilities(&self) -> Vec<Operation> {
        Vec::new()
    }

    fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }
}
