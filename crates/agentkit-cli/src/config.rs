//! YAML configuration loading
//!
//! Parses `agentkit.yaml` into agent declarations for the sync engine. Shape
//! errors are reported per agent and plugin so the author can find them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agentkit_core::declaration::DEFAULT_REFERENCE;
use agentkit_core::{AgentDeclaration, PluginDeclaration};
use agentkit_lock::PluginKind;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CliError, Result};

/// Top-level configuration document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    agents: Vec<RawAgent>,
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: Option<String>,
    name: String,
    #[serde(default)]
    plugins: Vec<RawPlugin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawSource {
    Local,
    #[serde(alias = "github")]
    Remote,
}

#[derive(Debug, Deserialize)]
struct RawPlugin {
    source: RawSource,
    path: Option<PathBuf>,
    url: Option<String>,
    #[serde(rename = "ref", alias = "version", alias = "branch")]
    reference: Option<String>,
    #[serde(alias = "plugin_path")]
    sub_path: Option<String>,
    #[serde(rename = "type", default)]
    kind: PluginKind,
    #[serde(default)]
    variables: BTreeMap<String, Value>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    namespace: Option<String>,
}

/// Parsed configuration and the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub agents: Vec<AgentDeclaration>,
}

impl Config {
    /// Read and parse the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CliError::user(format!("Configuration file not found: {}", path.display()))
            } else {
                CliError::io(path, e)
            }
        })?;
        Self::parse(&text, path, config_dir(path))
    }

    pub fn parse(text: &str, path: &Path, base_dir: PathBuf) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(text).map_err(|source| CliError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        let agents = raw
            .agents
            .into_iter()
            .enumerate()
            .map(|(index, agent)| convert_agent(index, agent))
            .collect::<Result<Vec<_>>>()?;

        let mut ids: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(CliError::user(format!(
                "Agent id '{}' is declared more than once",
                pair[0]
            )));
        }

        Ok(Self { base_dir, agents })
    }
}

/// Directory containing the configuration file.
pub fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Default lockfile location next to the configuration file.
pub fn default_lockfile(config_path: &Path) -> PathBuf {
    config_dir(config_path).join(agentkit_fs::ProjectPath::Lockfile)
}

/// Id assigned to agents declared without one, stable across runs as long
/// as the agent keeps its position in the file.
fn positional_id(index: usize) -> String {
    format!("agent-{}", index + 1)
}

fn convert_agent(index: usize, raw: RawAgent) -> Result<AgentDeclaration> {
    let id = match raw.id {
        Some(id) if id.trim().is_empty() => {
            return Err(CliError::user(format!("Agent #{} has an empty id", index + 1)));
        }
        Some(id) => id,
        None => {
            let id = positional_id(index);
            tracing::warn!(agent = %raw.name, id = %id, "Agent has no id, using its position");
            id
        }
    };

    let plugins = raw
        .plugins
        .into_iter()
        .enumerate()
        .map(|(n, plugin)| {
            convert_plugin(plugin).map_err(|message| {
                CliError::user(format!("Agent '{id}', plugin #{}: {message}", n + 1))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AgentDeclaration::new(id, raw.name, plugins))
}

fn convert_plugin(raw: RawPlugin) -> std::result::Result<PluginDeclaration, String> {
    let mut declaration = match raw.source {
        RawSource::Local => {
            let path = raw.path.ok_or("local plugins require 'path'")?;
            if raw.url.is_some() || raw.reference.is_some() || raw.sub_path.is_some() {
                return Err("'url', 'ref' and 'sub_path' apply to remote plugins only".to_string());
            }
            PluginDeclaration::local(path, raw.kind)
        }
        RawSource::Remote => {
            let url = raw.url.ok_or("remote plugins require 'url'")?;
            if raw.path.is_some() {
                return Err("'path' applies to local plugins only".to_string());
            }
            let reference = raw.reference.unwrap_or_else(|| DEFAULT_REFERENCE.to_string());
            let mut declaration = PluginDeclaration::remote(url, reference, raw.kind);
            if let Some(sub_path) = raw.sub_path {
                declaration = declaration.with_sub_path(sub_path);
            }
            declaration
        }
    };

    declaration.variables = raw.variables;
    declaration.command = raw.command;
    declaration.args = raw.args;
    declaration.namespace = raw.namespace;
    Ok(declaration)
}
