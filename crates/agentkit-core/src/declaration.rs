//! Declared plugin dependencies
//!
//! Declarations are what the author wrote in the configuration file, already
//! parsed. They are validated once, before a sync touches any state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use agentkit_lock::PluginKind;
use serde_json::Value;

/// Prefix carried by remote repositories of non-server plugins.
pub const PLUGIN_NAME_PREFIX: &str = "agentkit-plugin-";

/// Ref used when a remote declaration names none.
pub const DEFAULT_REFERENCE: &str = "main";

/// Version recorded for local plugins.
pub const LOCAL_VERSION: &str = "local";

/// Where a plugin comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// A file or directory on disk, relative paths resolved against the config directory
    Local { path: PathBuf },
    /// A git repository checked out at `reference`
    Remote {
        url: String,
        reference: String,
        sub_path: Option<String>,
    },
}

/// One plugin dependency of an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDeclaration {
    pub source: SourceSpec,
    pub kind: PluginKind,
    pub variables: BTreeMap<String, Value>,
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Overrides the repository owner as namespace (remote only)
    pub namespace: Option<String>,
}

impl PluginDeclaration {
    pub fn local(path: impl Into<PathBuf>, kind: PluginKind) -> Self {
        Self::with_source(SourceSpec::Local { path: path.into() }, kind)
    }

    pub fn remote(url: impl Into<String>, reference: impl Into<String>, kind: PluginKind) -> Self {
        Self::with_source(
            SourceSpec::Remote {
                url: url.into(),
                reference: reference.into(),
                sub_path: None,
            },
            kind,
        )
    }

    fn with_source(source: SourceSpec, kind: PluginKind) -> Self {
        Self {
            source,
            kind,
            variables: BTreeMap::new(),
            command: None,
            args: Vec::new(),
            namespace: None,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>, args: &[&str]) -> Self {
        self.command = Some(command.into());
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_sub_path(mut self, sub: impl Into<String>) -> Self {
        if let SourceSpec::Remote { sub_path, .. } = &mut self.source {
            *sub_path = Some(sub.into());
        }
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Version string recorded in the lock entry.
    pub fn version(&self) -> &str {
        match &self.source {
            SourceSpec::Local { .. } => LOCAL_VERSION,
            SourceSpec::Remote { reference, .. } => reference,
        }
    }

    /// Check the per-kind invariants. Returns the violation as a message.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self.kind {
            PluginKind::ServerExtension => {
                if !self.variables.is_empty() {
                    return Err("server extensions do not accept variables".to_string());
                }
                if self.command.as_deref().is_none_or(str::is_empty) {
                    return Err("server extensions require a command".to_string());
                }
            }
            PluginKind::Parameterized => {
                if self.variables.is_empty() {
                    return Err("parameterized plugins require variables".to_string());
                }
            }
            PluginKind::Standard => {}
        }

        if let SourceSpec::Remote { reference, .. } = &self.source
            && reference.trim().is_empty()
        {
            return Err("remote plugins require a non-empty ref".to_string());
        }
        if self.namespace.is_some() && matches!(self.source, SourceSpec::Local { .. }) {
            return Err("namespace overrides apply to remote plugins only".to_string());
        }

        Ok(())
    }
}

/// An agent and the plugins it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDeclaration {
    pub id: String,
    pub name: String,
    pub plugins: Vec<PluginDeclaration>,
}

impl AgentDeclaration {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plugins: Vec<PluginDeclaration>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plugins,
        }
    }
}
