//! Upgrades older lockfile layouts before typed deserialization
//!
//! Older files kept a flat root-level `plugins` section that was not scoped to
//! any agent, and stored each agent's plugins either as a list or as a map
//! keyed by `namespace/name`. Both are regrouped into the
//! `agents.<id>.plugins.<kind>.<namespace/name>` layout.

use serde_json::{Map, Value};

use crate::entry::PluginKind;

/// Agent that receives plugins from a root-level `plugins` section.
pub const DEFAULT_AGENT: &str = "default";

/// Rewrite `value` into the current layout. Returns whether anything changed.
///
/// Values that are not JSON objects are left alone so deserialization can
/// reject them.
pub fn migrate(value: &mut Value) -> bool {
    let Some(root) = value.as_object_mut() else {
        return false;
    };
    let mut changed = false;

    if !root.get("agents").is_some_and(Value::is_object) {
        root.insert("agents".to_string(), Value::Object(Map::new()));
        changed = true;
    }

    if let Some(legacy) = root.remove("plugins") {
        tracing::info!("Moving root-level plugins section into agent '{}'", DEFAULT_AGENT);
        let grouped = group_plugins(legacy);
        if let Some(Value::Object(agents)) = root.get_mut("agents") {
            let agent = agents
                .entry(DEFAULT_AGENT.to_string())
                .or_insert_with(|| serde_json::json!({ "name": DEFAULT_AGENT, "plugins": {} }));
            merge_into_agent(agent, grouped);
        }
        changed = true;
    }

    if let Some(Value::Object(agents)) = root.get_mut("agents") {
        for (id, agent) in agents.iter_mut() {
            let Some(agent) = agent.as_object_mut() else {
                continue;
            };
            let Some(plugins) = agent.remove("plugins") else {
                continue;
            };
            let before = plugins.clone();
            let grouped = Value::Object(group_plugins(plugins));
            if grouped != before {
                tracing::debug!(agent = %id, "Regrouped legacy agent plugins");
                changed = true;
            }
            agent.insert("plugins".to_string(), grouped);
        }
    }

    if !root.contains_key("version") {
        root.insert("version".to_string(), Value::from(crate::LOCKFILE_VERSION));
        changed = true;
    }

    changed
}

fn merge_into_agent(agent: &mut Value, grouped: Map<String, Value>) {
    let Some(agent) = agent.as_object_mut() else {
        return;
    };
    let existing = agent
        .remove("plugins")
        .map(group_plugins)
        .unwrap_or_default();
    let mut merged = existing;
    for (kind, entries) in grouped {
        let Value::Object(entries) = entries else {
            continue;
        };
        let slot = merged
            .entry(kind)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(slot) = slot {
            for (key, entry) in entries {
                slot.entry(key).or_insert(entry);
            }
        }
    }
    agent.insert("plugins".to_string(), Value::Object(merged));
}

/// Group any accepted plugins shape into `kind -> key -> entry`.
fn group_plugins(plugins: Value) -> Map<String, Value> {
    let mut grouped = Map::new();

    match plugins {
        Value::Array(entries) => {
            for entry in entries {
                insert_entry(&mut grouped, None, None, entry);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                match key.parse::<PluginKind>() {
                    Ok(kind) => {
                        if let Value::Object(entries) = value {
                            for (entry_key, entry) in entries {
                                insert_entry(&mut grouped, Some(kind), Some(&entry_key), entry);
                            }
                        }
                    }
                    Err(_) => insert_entry(&mut grouped, None, Some(&key), value),
                }
            }
        }
        other => {
            tracing::warn!(found = %other, "Ignoring plugins section of unexpected shape");
        }
    }

    grouped
}

fn insert_entry(
    grouped: &mut Map<String, Value>,
    kind: Option<PluginKind>,
    key: Option<&str>,
    entry: Value,
) {
    let Value::Object(mut entry) = entry else {
        tracing::warn!("Dropping lock entry that is not an object");
        return;
    };

    if let Some((namespace, name)) = key.and_then(|k| k.split_once('/')) {
        entry
            .entry("namespace")
            .or_insert_with(|| Value::from(namespace));
        entry.entry("name").or_insert_with(|| Value::from(name));
    }

    let declared = ["pluginType", "plugin_type"]
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_str))
        .and_then(|s| s.parse::<PluginKind>().ok());
    let kind = declared.or(kind).unwrap_or_default();
    entry.remove("plugin_type");
    entry.insert("pluginType".to_string(), Value::from(kind.as_str()));

    let (Some(namespace), Some(name)) = (
        entry.get("namespace").and_then(Value::as_str),
        entry.get("name").and_then(Value::as_str),
    ) else {
        tracing::warn!("Dropping lock entry without namespace and name");
        return;
    };
    let key = format!("{namespace}/{name}");

    let slot = grouped
        .entry(kind.as_str().to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(slot) = slot {
        slot.insert(key, Value::Object(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_layout_is_left_unchanged() {
        let mut value = json!({
            "version": 1,
            "agents": {
                "a": { "name": "A", "plugins": { "standard": {
                    "local/echo": { "namespace": "local", "name": "echo", "pluginType": "standard" }
                } } }
            }
        });
        let original = value.clone();

        assert!(!migrate(&mut value));
        assert_eq!(value, original);
    }

    #[test]
    fn list_of_plugins_is_grouped_by_type() {
        let mut value = json!({
            "agents": { "a": { "name": "A", "plugins": [
                { "namespace": "local", "name": "echo", "plugin_type": "sk" },
                { "namespace": "acme", "name": "srv", "plugin_type": "mcp" }
            ] } }
        });

        assert!(migrate(&mut value));
        let plugins = &value["agents"]["a"]["plugins"];
        assert_eq!(plugins["standard"]["local/echo"]["pluginType"], "standard");
        assert_eq!(plugins["serverExtension"]["acme/srv"]["name"], "srv");
    }
}
