//! Data-Source Capabilities
//!
//! Small pure lookup answering whether a SQL dialect supports row-level
//! security rewriting, and in which mode. Behavior is two constants per
//! dialect, so this is a match over dialect names rather than a trait
//! hierarchy.

use serde::{Deserialize, Serialize};

/// How row-level security is enforced for a dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RlsMode {
    /// No rewriting; generated SQL runs unchanged
    None,
    /// Protected tables are shadowed by filtered CTEs
    TableReplace,
}

/// RLS capabilities of one dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectCapabilities {
    pub supports_rls: bool,
    pub rls_mode: RlsMode,
}

impl DialectCapabilities {
    pub fn mysql() -> Self {
        Self {
            supports_rls: true,
            rls_mode: RlsMode::TableReplace,
        }
    }

    pub fn clickhouse() -> Self {
        Self {
            supports_rls: true,
            rls_mode: RlsMode::TableReplace,
        }
    }

    /// Default for unknown dialects: no rewriting
    pub fn none() -> Self {
        Self {
            supports_rls: false,
            rls_mode: RlsMode::None,
        }
    }
}

/// Look up the capabilities for a dialect name (case-insensitive)
pub fn capabilities_for(db_type: &str) -> DialectCapabilities {
    match db_type.to_lowercase().as_str() {
        "mysql" => DialectCapabilities::mysql(),
        "clickhouse" => DialectCapabilities::clickhouse(),
        _ => DialectCapabilities::none(),
    }
}
