//! Data Profiles
//!
//! Configuration for the selected data source: schema metadata, prompt
//! templates, dialect, connection parameters and the persisted row-level
//! security policy. Profiles are loaded from a YAML profile store and
//! selected by name before a state machine is ever constructed.

use crate::error::{GenBiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Intent name -> prompt template payload, opaque to the core
pub type PromptMap = HashMap<String, serde_json::Value>;

/// Relational connection parameters for the execution adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

/// Retrieval-store (vector search) connection parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Index holding few-shot question/SQL examples
    #[serde(default)]
    pub sql_index: String,
    /// Index holding named-entity dimension values
    #[serde(default)]
    pub ner_index: String,
    /// Number of neighbours to retrieve per lookup
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

/// Configuration for one data profile
///
/// `tables_info`, `hints`, `prompt_map` and `db_type` are the keys the core
/// reads; everything else a deployment stores alongside them survives in
/// `extra` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseProfile {
    /// Schema/DDL metadata handed to SQL generation, opaque to the core
    #[serde(default)]
    pub tables_info: serde_json::Value,

    /// Free-text schema hints handed to SQL generation
    #[serde(default)]
    pub hints: String,

    /// Prompt templates per intent, keyed by prompt name
    #[serde(default)]
    pub prompt_map: PromptMap,

    /// SQL dialect of the data source, e.g. "mysql", "clickhouse"
    #[serde(default)]
    pub db_type: String,

    /// Model identifier used by LLM collaborator calls for this profile
    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Whether generated SQL is rewritten through the RLS policy before
    /// execution (only honored for dialects that support table replacement)
    #[serde(default)]
    pub enable_row_level_security: bool,

    /// Persisted RLS policy YAML, parsed fresh on every rewrite
    #[serde(default)]
    pub row_level_security_config: String,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Load all named profiles from a YAML profile store
pub fn load_profiles(path: impl AsRef<Path>) -> Result<HashMap<String, DatabaseProfile>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let profiles: HashMap<String, DatabaseProfile> = serde_yaml::from_str(&raw)?;
    Ok(profiles)
}

/// Select one profile by name, failing fast with a descriptive error before
/// any state machine is constructed
pub fn select_profile(
    profiles: &HashMap<String, DatabaseProfile>,
    name: &str,
) -> Result<DatabaseProfile> {
    profiles.get(name).cloned().ok_or_else(|| {
        GenBiError::Profile(format!(
            "Unknown data profile '{}'. Available profiles: {:?}",
            name,
            profiles.keys().collect::<Vec<_>>()
        ))
    })
}
