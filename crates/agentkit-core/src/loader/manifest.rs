//! Declarative manifest discovery
//!
//! Candidate files are parsed into a generic JSON value and accepted only when
//! they expose a name, a description and a capability listing. The native
//! shape keeps identity under a `[plugin]` table; anything else that qualifies
//! is treated as a foreign manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agentkit_lock::PluginKind;
use serde::Deserialize;
use serde_json::Value;

use super::foreign::{ForeignManifest, ForeignPluginAdapter};
use super::{Identity, Loader, Operation, Plugin, PluginHandle, ServerExtension};
use crate::declaration::PluginDeclaration;
use crate::{Error, Result};

/// Manifest file names tried in order inside a plugin directory.
pub const MANIFEST_CANDIDATES: [&str; 5] = [
    "plugin.toml",
    "agentkit.toml",
    "plugin.json",
    "manifest.json",
    ".agentkit/plugin.toml",
];

const CAPABILITY_FIELDS: [&str; 3] = ["functions", "kernel_functions", "tools"];

/// Declared configuration variable of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct NativeHeader {
    name: String,
    description: String,
    #[serde(default)]
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NativeManifest {
    plugin: NativeHeader,
    #[serde(default)]
    functions: Vec<Operation>,
    #[serde(default)]
    variables: BTreeMap<String, VariableSpec>,
}

/// A plugin instantiated from a manifest.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    identity: Identity,
    operations: Vec<Operation>,
    instructions: Option<String>,
    variables: BTreeMap<String, Value>,
}

impl ManifestPlugin {
    /// Instantiate with `declared` merged over the manifest defaults.
    pub fn instantiate(
        identity: Identity,
        operations: Vec<Operation>,
        instructions: Option<String>,
        specs: &BTreeMap<String, VariableSpec>,
        declared: &BTreeMap<String, Value>,
    ) -> std::result::Result<Self, String> {
        let variables = resolve_variables(&identity.name, specs, declared)?;
        Ok(Self {
            identity,
            operations,
            instructions: instructions.filter(|i| !i.trim().is_empty()),
            variables,
        })
    }
}

impl Plugin for ManifestPlugin {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn capabilities(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }
}

fn resolve_variables(
    plugin: &str,
    specs: &BTreeMap<String, VariableSpec>,
    declared: &BTreeMap<String, Value>,
) -> std::result::Result<BTreeMap<String, Value>, String> {
    let mut resolved: BTreeMap<String, Value> = specs
        .iter()
        .filter_map(|(name, spec)| spec.default.clone().map(|d| (name.clone(), d)))
        .collect();

    for (name, value) in declared {
        if !specs.contains_key(name) {
            tracing::warn!(plugin = %plugin, variable = %name, "Plugin does not declare this variable");
        }
        resolved.insert(name.clone(), value.clone());
    }

    let missing: Vec<&str> = specs
        .iter()
        .filter(|(name, spec)| spec.required && !resolved.contains_key(*name))
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required variables: {}", missing.join(", ")));
    }

    Ok(resolved)
}

/// Loads plugins from declarative manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader;

impl ManifestLoader {
    pub fn new() -> Self {
        Self
    }

    /// First qualifying manifest below `base`, parsed.
    fn discover(&self, base: &Path) -> Result<(PathBuf, Value)> {
        if base.is_file() {
            return match read_manifest(base)? {
                Some(value) => Ok((base.to_path_buf(), value)),
                None => Err(Error::load(base, "file is not a plugin manifest")),
            };
        }

        let mut problems = Vec::new();
        for candidate in MANIFEST_CANDIDATES {
            let path = base.join(candidate);
            if !path.is_file() {
                continue;
            }
            match read_manifest(&path) {
                Ok(Some(value)) => return Ok((path, value)),
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "Skipping file without plugin identity");
                    problems.push(format!("{candidate}: not a plugin manifest"));
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable manifest");
                    problems.push(format!("{candidate}: {e}"));
                }
            }
        }

        let detail = if problems.is_empty() {
            format!("none of {} present", MANIFEST_CANDIDATES.join(", "))
        } else {
            problems.join("; ")
        };
        Err(Error::load(base, format!("no plugin manifest found ({detail})")))
    }
}

impl Loader for ManifestLoader {
    fn load(
        &self,
        dir: &Path,
        sub_path: Option<&str>,
        declaration: &PluginDeclaration,
    ) -> Result<PluginHandle> {
        let base = match sub_path {
            Some(sub) => dir.join(sub),
            None => dir.to_path_buf(),
        };
        if !base.exists() {
            return Err(Error::load(&base, "plugin path does not exist"));
        }

        if declaration.kind == PluginKind::ServerExtension {
            let name = base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let command = declaration.command.clone().unwrap_or_default();
            return Ok(PluginHandle::new(
                base,
                ServerExtension::new(name, command, declaration.args.clone()),
            ));
        }

        let (path, value) = self.discover(&base)?;
        let location = path.parent().map(Path::to_path_buf).unwrap_or(base);

        if value.get("plugin").is_some_and(Value::is_object) {
            let manifest: NativeManifest = serde_json::from_value(value)
                .map_err(|e| Error::load(&path, format!("invalid manifest: {e}")))?;
            let plugin = ManifestPlugin::instantiate(
                Identity {
                    name: manifest.plugin.name,
                    description: manifest.plugin.description,
                },
                manifest.functions,
                manifest.plugin.instructions,
                &manifest.variables,
                &declaration.variables,
            )
            .map_err(|e| Error::load(&path, e))?;
            tracing::debug!(path = %path.display(), "Loaded native plugin manifest");
            return Ok(PluginHandle::new(location, plugin));
        }

        let manifest: ForeignManifest = serde_json::from_value(value)
            .map_err(|e| Error::load(&path, format!("invalid manifest: {e}")))?;
        let adapter = ForeignPluginAdapter::new(manifest, &declaration.variables)
            .map_err(|e| Error::load(&path, e))?;
        tracing::debug!(path = %path.display(), "Loaded foreign plugin manifest through adapter");
        Ok(PluginHandle::new(location, adapter))
    }
}

/// Parse `path` and return it only if it qualifies as a plugin manifest.
fn read_manifest(path: &Path) -> Result<Option<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let value = if is_toml {
        let parsed: toml::Value = toml::from_str(&text)
            .map_err(|e| Error::load(path, format!("invalid TOML: {e}")))?;
        serde_json::to_value(parsed)
            .map_err(|e| Error::load(path, format!("unsupported TOML value: {e}")))?
    } else {
        serde_json::from_str(&text).map_err(|e| Error::load(path, format!("invalid JSON: {e}")))?
    };

    Ok(qualifies(&value).then_some(value))
}

/// Identity fields plus at least one capability listing.
pub(crate) fn qualifies(value: &Value) -> bool {
    let header = value
        .get("plugin")
        .filter(|p| p.is_object())
        .unwrap_or(value);
    let has_identity = ["name", "description"]
        .iter()
        .all(|field| header.get(*field).is_some_and(Value::is_string));
    let has_capabilities = CAPABILITY_FIELDS
        .iter()
        .any(|field| value.get(*field).is_some_and(Value::is_array));
    has_identity && has_capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qualification_needs_identity_and_capabilities() {
        assert!(qualifies(&json!({
            "plugin": { "name": "a", "description": "b" },
            "functions": []
        })));
        assert!(qualifies(&json!({
            "name": "a", "description": "b", "tools": []
        })));
        assert!(!qualifies(&json!({ "name": "a", "description": "b" })));
        assert!(!qualifies(&json!({ "name": "a", "functions": [] })));
        assert!(!qualifies(&json!({ "dependencies": {}, "functions": [] })));
    }

    #[test]
    fn declared_variables_override_defaults() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "tone".to_string(),
            VariableSpec {
                default: Some(json!("calm")),
                ..Default::default()
            },
        );
        let declared = BTreeMap::from([("tone".to_string(), json!("loud"))]);

        let resolved = resolve_variables("p", &specs, &declared).unwrap();
        assert_eq!(resolved["tone"], "loud");
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let specs = BTreeMap::from([(
            "key".to_string(),
            VariableSpec {
                required: true,
                ..Default::default()
            },
        )]);

        let err = resolve_variables("p", &specs, &BTreeMap::new()).unwrap_err();
        assert!(err.contains("key"));
    }
}
