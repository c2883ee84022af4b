//! Adapter for manifests written for another plugin SDK
//!
//! Foreign manifests keep identity at the top level, list capabilities as
//! `kernel_functions` or `tools`, and describe variables either as spec
//! objects or as bare default values.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::manifest::{ManifestPlugin, VariableSpec};
use super::{Identity, Operation, Plugin};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ForeignVariable {
    Spec(VariableSpec),
    Default(Value),
}

impl ForeignVariable {
    fn into_spec(self) -> VariableSpec {
        match self {
            Self::Spec(spec) => spec,
            Self::Default(value) => VariableSpec {
                default: Some(value),
                ..Default::default()
            },
        }
    }
}

/// Foreign SDK manifest shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ForeignManifest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub plugin_instructions: Option<String>,
    #[serde(default)]
    kernel_functions: Vec<Operation>,
    #[serde(default)]
    tools: Vec<Operation>,
    #[serde(default)]
    variables: BTreeMap<String, ForeignVariable>,
}

/// Presents a foreign plugin through the native [`Plugin`] trait.
///
/// Construction forwards the declared variables, and the foreign manifest's
/// identity, instructions, capability listing and variable declarations are
/// copied onto the native shape.
#[derive(Debug, Clone)]
pub struct ForeignPluginAdapter {
    inner: ManifestPlugin,
}

impl ForeignPluginAdapter {
    pub fn new(
        manifest: ForeignManifest,
        declared: &BTreeMap<String, Value>,
    ) -> Result<Self, String> {
        let mut operations = manifest.kernel_functions;
        operations.extend(manifest.tools);

        let specs: BTreeMap<String, VariableSpec> = manifest
            .variables
            .into_iter()
            .map(|(name, variable)| (name, variable.into_spec()))
            .collect();

        let inner = ManifestPlugin::instantiate(
            Identity {
                name: manifest.name,
                description: manifest.description,
            },
            operations,
            manifest.plugin_instructions,
            &specs,
            declared,
        )?;
        Ok(Self { inner })
    }
}

impl Plugin for ForeignPluginAdapter {
    fn identity(&self) -> &Identity {
        self.inner.identity()
    }

    fn capabilities(&self) -> Vec<Operation> {
        self.inner.capabilities()
    }

    fn instructions(&self) -> Option<&str> {
        self.inner.instructions()
    }

    fn variables(&self) -> &BTreeMap<String, Value> {
        self.inner.variables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_values_become_defaults() {
        let manifest: ForeignManifest = serde_json::from_value(json!({
            "name": "weather",
            "description": "Forecasts",
            "tools": [{ "name": "forecast" }],
            "variables": { "units": "metric", "key": { "required": true } }
        }))
        .unwrap();

        let adapter = ForeignPluginAdapter::new(
            manifest,
            &BTreeMap::from([("key".to_string(), json!("secret"))]),
        )
        .unwrap();

        assert_eq!(adapter.identity().name, "weather");
        assert_eq!(adapter.variables()["units"], "metric");
        assert_eq!(adapter.variables()["key"], "secret");
        assert_eq!(adapter.capabilities()[0].name, "forecast");
    }

    #[test]
    fn object_values_stay_defaults() {
        let manifest: ForeignManifest = serde_json::from_value(json!({
            "name": "weather",
            "description": "Forecasts",
            "tools": [],
            "variables": { "location": { "lat": 52.5, "lon": 13.4 } }
        }))
        .unwrap();

        let adapter = ForeignPluginAdapter::new(manifest, &BTreeMap::new()).unwrap();

        assert_eq!(adapter.variables()["location"], json!({ "lat": 52.5, "lon": 13.4 }));
    }
}
