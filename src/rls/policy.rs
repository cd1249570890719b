//! RLS Policy Model
//!
//! YAML-backed description of which tables are protected and which column
//! filters apply. Values may reference the current user through the
//! `$login_user.username` sentinel, resolved at rewrite time.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::warn;

use crate::context::LoginUser;
use crate::error::Result;

/// Placeholder inside `column_value` that resolves to the calling user's name.
pub const LOGIN_USER_SENTINEL: &str = "$login_user.username";

/// Top-level policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RlsPolicy {
    #[serde(default)]
    pub tables: Vec<TablePolicy>,
}

/// Filters for a single protected table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePolicy {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnRule>,
}

/// One equality filter on a protected table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column_name: String,
    pub column_value: String,
}

impl RlsPolicy {
    /// Parse a policy document. Blank input is an empty policy, not an error.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let policy: RlsPolicy = serde_yaml::from_str(yaml)?;
        Ok(policy)
    }

    /// True when no table carries an effective filter.
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|t| t.columns.is_empty())
    }
}

impl TablePolicy {
    /// `SELECT * FROM t WHERE a = 'x' AND b = 'y'` for this table, with the
    /// login-user sentinel substituted. Tables without column rules produce
    /// nothing and are left unprotected.
    pub fn filter_query(&self, user: &LoginUser) -> Option<String> {
        if self.columns.is_empty() {
            return None;
        }
        let predicate = self
            .columns
            .iter()
            .map(|rule| {
                let value = rule.column_value.replace(LOGIN_USER_SENTINEL, &user.username);
                format!("{} = '{}'", rule.column_name, value.replace('\'', "''"))
            })
            .join(" AND ");
        Some(format!("SELECT * FROM {} WHERE {}", self.table_name, predicate))
    }
}

/// Check a policy document without touching any query: the YAML must parse
/// and every per-table filter must itself be valid SQL. Used when an admin
/// saves profile configuration.
pub fn validate(policy_yaml: &str) -> bool {
    let policy = match RlsPolicy::parse(policy_yaml) {
        Ok(p) => p,
        Err(e) => {
            warn!("RLS policy rejected, YAML does not parse: {}", e);
            return false;
        }
    };
    let probe = LoginUser::new("rls_probe");
    for table in &policy.tables {
        if let Some(query) = table.filter_query(&probe) {
            if let Err(e) = Parser::parse_sql(&GenericDialect {}, &query) {
                warn!(
                    "RLS policy rejected, filter for table '{}' is not valid SQL: {}",
                    table.table_name, e
                );
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
tables:
  - table_name: customer
    columns:
      - column_name: created_by
        column_value: $login_user.username
  - table_name: orders
    columns:
      - column_name: territory
        column_value: Asia
"#;

    #[test]
    fn parses_policy_and_resolves_sentinel() {
        let policy = RlsPolicy::parse(POLICY).unwrap();
        assert_eq!(policy.tables.len(), 2);

        let user = LoginUser::new("admin");
        let query = policy.tables[0].filter_query(&user).unwrap();
        assert_eq!(query, "SELECT * FROM customer WHERE created_by = 'admin'");
        let query = policy.tables[1].filter_query(&user).unwrap();
        assert_eq!(query, "SELECT * FROM orders WHERE territory = 'Asia'");
    }

    #[test]
    fn blank_document_is_empty_policy() {
        let policy = RlsPolicy::parse("   \n").unwrap();
        assert!(policy.is_empty());
    }

    #[test]
    fn table_without_columns_yields_no_filter() {
        let policy = RlsPolicy::parse("tables:\n  - table_name: audit\n").unwrap();
        assert!(policy.tables[0].filter_query(&LoginUser::new("admin")).is_none());
        assert!(policy.is_empty());
    }

    #[test]
    fn quotes_in_values_are_doubled() {
        let table = TablePolicy {
            table_name: "customer".to_string(),
            columns: vec![ColumnRule {
                column_name: "owner".to_string(),
                column_value: "O'Brien".to_string(),
            }],
        };
        let query = table.filter_query(&LoginUser::new("admin")).unwrap();
        assert_eq!(query, "SELECT * FROM customer WHERE owner = 'O''Brien'");
    }

    #[test]
    fn validate_accepts_well_formed_policy() {
        assert!(validate(POLICY));
    }

    #[test]
    fn validate_rejects_broken_yaml() {
        assert!(!validate("tables: [unclosed"));
    }

    #[test]
    fn validate_rejects_filters_that_are_not_sql() {
        let bad = r#"
tables:
  - table_name: customer
    columns:
      - column_name: "created by ;;"
        column_value: admin
"#;
        assert!(!validate(bad));
    }
}
