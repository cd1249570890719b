//! RLS Rewriter
//!
//! Splices policy-derived CTEs in front of a generated query so that every
//! reference to a protected table resolves to its filtered shadow. The
//! rewrite never fails the request: anything it cannot handle is logged and
//! the query passes through untouched.

use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use crate::context::LoginUser;
use crate::rls::policy::RlsPolicy;

/// Audit marker in front of every injected CTE.
pub const RLS_MARKER: &str = "/* rls applied */";

fn leading_with_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\s*with\b").expect("leading WITH pattern"))
}

/// Apply row-level security to `sql` for `user`.
///
/// Returns the rewritten query, or the input unchanged when the policy is
/// empty, the policy does not parse, or the SQL itself does not parse.
pub fn rewrite(sql: &str, policy_yaml: &str, user: &LoginUser) -> String {
    match try_rewrite(sql, policy_yaml, user) {
        Ok(Some(rewritten)) => rewritten,
        Ok(None) => sql.to_string(),
        Err(reason) => {
            warn!("RLS rewrite skipped, query passes through unfiltered: {}", reason);
            sql.to_string()
        }
    }
}

fn try_rewrite(sql: &str, policy_yaml: &str, user: &LoginUser) -> Result<Option<String>, String> {
    let policy =
        RlsPolicy::parse(policy_yaml).map_err(|e| format!("policy does not parse: {}", e))?;
    if policy.is_empty() {
        debug!("RLS policy carries no filters, query unchanged");
        return Ok(None);
    }

    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| format!("query does not parse: {}", e))?;
    if statements.is_empty() {
        return Err("query contains no statement".to_string());
    }

    let cte_lines = policy
        .tables
        .iter()
        .filter_map(|table| {
            table
                .filter_query(user)
                .map(|query| format!("{} {} AS ({})", RLS_MARKER, table.table_name, query))
        })
        .join(",\n");
    if cte_lines.is_empty() {
        return Ok(None);
    }

    // A query that already opens with WITH keeps a single clause: the new
    // CTEs are prepended to its list. The check is on the leading token
    // only, so WITH inside a string literal never triggers a splice.
    let rewritten = match leading_with_pattern().find(sql) {
        Some(keyword) => {
            let remainder = sql[keyword.end()..].trim_start();
            format!("WITH\n{},\n{}", cte_lines, remainder)
        }
        None => format!("WITH\n{}\n{}", cte_lines, sql),
    };
    Ok(Some(rewritten))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TABLE_POLICY: &str = r#"
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

    fn admin() -> LoginUser {
        LoginUser::new("admin")
    }

    #[test]
    fn empty_policy_returns_query_unchanged() {
        let sql = "SELECT * FROM customer";
        assert_eq!(rewrite(sql, "", &admin()), sql);
        assert_eq!(rewrite(sql, "tables: []", &admin()), sql);
    }

    #[test]
    fn injects_marked_ctes_for_each_protected_table() {
        let sql = "SELECT c.name, o.product FROM customer c JOIN orders o ON c.id = o.customer_id";
        let rewritten = rewrite(sql, TWO_TABLE_POLICY, &admin());
        assert_eq!(
            rewritten,
            "WITH\n\
             /* rls applied */ customer AS (SELECT * FROM customer WHERE created_by = 'admin'),\n\
             /* rls applied */ orders AS (SELECT * FROM orders WHERE territory = 'Asia')\n\
             SELECT c.name, o.product FROM customer c JOIN orders o ON c.id = o.customer_id"
        );
        assert_eq!(rewritten.matches(RLS_MARKER).count(), 2);
    }

    #[test]
    fn existing_with_clause_is_extended_not_duplicated() {
        let sql = "WITH recent AS (SELECT id FROM orders WHERE ts > now()) \
                   SELECT * FROM recent LIMIT 100";
        let rewritten = rewrite(sql, TWO_TABLE_POLICY, &admin());
        assert_eq!(
            rewritten,
            "WITH\n\
             /* rls applied */ customer AS (SELECT * FROM customer WHERE created_by = 'admin'),\n\
             /* rls applied */ orders AS (SELECT * FROM orders WHERE territory = 'Asia'),\n\
             recent AS (SELECT id FROM orders WHERE ts > now()) \
             SELECT * FROM recent LIMIT 100"
        );
        assert_eq!(rewritten.matches("WITH").count(), 1);
    }

    #[test]
    fn lowercase_with_clause_is_recognized() {
        let sql = "with recent as (select id from orders) select * from recent";
        let rewritten = rewrite(sql, TWO_TABLE_POLICY, &admin());
        assert!(rewritten.starts_with("WITH\n/* rls applied */ customer AS"));
        assert!(rewritten.ends_with("recent as (select id from orders) select * from recent"));
        assert!(!rewritten.contains("with recent"));
    }

    #[test]
    fn with_inside_string_literal_does_not_trigger_a_splice() {
        let sql = "SELECT note FROM journal WHERE note = 'filed with care'";
        let policy = r#"
tables:
  - table_name: journal
    columns:
      - column_name: owner
        column_value: $login_user.username
"#;
        let rewritten = rewrite(sql, policy, &admin());
        assert_eq!(
            rewritten,
            "WITH\n\
             /* rls applied */ journal AS (SELECT * FROM journal WHERE owner = 'admin')\n\
             SELECT note FROM journal WHERE note = 'filed with care'"
        );
    }

    #[test]
    fn unparseable_sql_passes_through_unfiltered() {
        let sql = "SELEC x FRM customer %%";
        assert_eq!(rewrite(sql, TWO_TABLE_POLICY, &admin()), sql);
    }

    #[test]
    fn unparseable_policy_passes_query_through() {
        let sql = "SELECT * FROM customer";
        assert_eq!(rewrite(sql, "tables: [broken", &admin()), sql);
    }

    #[test]
    fn tables_without_columns_are_skipped() {
        let sql = "SELECT * FROM audit";
        let policy = "tables:\n  - table_name: audit\n";
        assert_eq!(rewrite(sql, policy, &admin()), sql);
    }

    #[test]
    fn sentinel_resolves_per_user() {
        let sql = "SELECT * FROM customer";
        let alice = rewrite(sql, TWO_TABLE_POLICY, &LoginUser::new("alice"));
        assert!(alice.contains("created_by = 'alice'"));
        let bob = rewrite(sql, TWO_TABLE_POLICY, &LoginUser::new("bob"));
        assert!(bob.contains("created_by = 'bob'"));
    }
}
