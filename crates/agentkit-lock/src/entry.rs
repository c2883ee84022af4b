//! Lock entries and the keys they are stored under

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::Error;

/// Identity of a plugin within an agent: `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginKey {
    pub namespace: String,
    pub name: String,
}

impl PluginKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for PluginKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(Error::InvalidKey { key: s.to_string() }),
        }
    }
}

impl Serialize for PluginKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PluginKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How a plugin is instantiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginKind {
    /// Loaded from a manifest, no construction arguments
    #[default]
    #[serde(alias = "sk")]
    Standard,
    /// An external server process described by `command`/`args`
    #[serde(alias = "mcp", alias = "server_extension")]
    ServerExtension,
    /// Loaded from a manifest and constructed with declared variables
    #[serde(alias = "agently")]
    Parameterized,
}

impl PluginKind {
    pub const ALL: [PluginKind; 3] = [Self::Standard, Self::ServerExtension, Self::Parameterized];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ServerExtension => "serverExtension",
            Self::Parameterized => "parameterized",
        }
    }

    /// Whether remote repositories of this kind carry the plugin name prefix.
    pub fn uses_name_prefix(&self) -> bool {
        !matches!(self, Self::ServerExtension)
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" | "sk" => Ok(Self::Standard),
            "serverExtension" | "server_extension" | "mcp" => Ok(Self::ServerExtension),
            "parameterized" | "agently" => Ok(Self::Parameterized),
            other => Err(Error::InvalidEntry(format!("unknown plugin type '{other}'"))),
        }
    }
}

/// Where a plugin was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Local,
    #[serde(alias = "github")]
    Remote,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// The persisted record of one installed plugin.
///
/// `fingerprint` is a content hash for local sources and a commit id for
/// remote ones; on disk it is written as `contentHash` or `commitId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLockEntry", into = "RawLockEntry")]
pub struct LockEntry {
    pub namespace: String,
    pub name: String,
    pub full_name: String,
    pub version: String,
    pub source_type: SourceKind,
    pub plugin_type: PluginKind,
    pub fingerprint: String,
    pub installed_at: DateTime<Utc>,
    pub variables: BTreeMap<String, Value>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub source_path: Option<String>,
    pub repo_url: Option<String>,
    pub sub_path: Option<String>,
}

impl LockEntry {
    pub fn key(&self) -> PluginKey {
        PluginKey::new(&self.namespace, &self.name)
    }

    /// Move the entry to a new key, keeping everything else.
    pub fn rekey(&mut self, key: &PluginKey) {
        self.namespace = key.namespace.clone();
        self.name = key.name.clone();
        self.full_name = key.to_string();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyServerDetails {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLockEntry {
    namespace: String,
    name: String,
    #[serde(default, alias = "full_name")]
    full_name: Option<String>,
    #[serde(default)]
    version: String,
    #[serde(default, alias = "source_type")]
    source_type: Option<SourceKind>,
    #[serde(default, alias = "plugin_type")]
    plugin_type: PluginKind,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "content_hash")]
    content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "commit_id")]
    commit_id: Option<String>,
    #[serde(default, skip_serializing)]
    sha: Option<String>,
    #[serde(default, alias = "installed_at")]
    installed_at: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing)]
    mcp_details: Option<LegacyServerDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "source_path")]
    source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "repo_url")]
    repo_url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "sub_path",
        alias = "plugin_path"
    )]
    sub_path: Option<String>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidEntry(format!("bad timestamp '{raw}': {e}")))
}

impl TryFrom<RawLockEntry> for LockEntry {
    type Error = Error;

    fn try_from(raw: RawLockEntry) -> Result<Self, Self::Error> {
        let source_type = raw.source_type.unwrap_or(if raw.repo_url.is_some() {
            SourceKind::Remote
        } else {
            SourceKind::Local
        });

        let preferred = match source_type {
            SourceKind::Local => raw.content_hash.or(raw.commit_id),
            SourceKind::Remote => raw.commit_id.or(raw.content_hash),
        };
        let fingerprint = preferred.or(raw.sha).unwrap_or_default();

        let installed_at = match raw.installed_at.as_deref() {
            Some(ts) if !ts.is_empty() => parse_timestamp(ts)?,
            _ => DateTime::<Utc>::UNIX_EPOCH,
        };

        let details = raw.mcp_details.unwrap_or_default();
        let command = raw.command.or(details.command);
        let args = if raw.args.is_empty() {
            details.args
        } else {
            raw.args
        };

        let full_name = raw
            .full_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}/{}", raw.namespace, raw.name));

        Ok(Self {
            namespace: raw.namespace,
            name: raw.name,
            full_name,
            version: raw.version,
            source_type,
            plugin_type: raw.plugin_type,
            fingerprint,
            installed_at,
            variables: raw.variables,
            command,
            args,
            source_path: raw.source_path,
            repo_url: raw.repo_url,
            sub_path: raw.sub_path.filter(|p| !p.is_empty()),
        })
    }
}

impl From<LockEntry> for RawLockEntry {
    fn from(entry: LockEntry) -> Self {
        let (content_hash, commit_id) = match entry.source_type {
            SourceKind::Local => (Some(entry.fingerprint), None),
            SourceKind::Remote => (None, Some(entry.fingerprint)),
        };

        Self {
            namespace: entry.namespace,
            name: entry.name,
            full_name: Some(entry.full_name),
            version: entry.version,
            source_type: Some(entry.source_type),
            plugin_type: entry.plugin_type,
            content_hash,
            commit_id,
            sha: None,
            installed_at: Some(entry.installed_at.to_rfc3339()),
            variables: entry.variables,
            command: entry.command,
            args: entry.args,
            mcp_details: None,
            source_path: entry.source_path,
            repo_url: entry.repo_url,
            sub_path: entry.sub_path,
        }
    }
}
