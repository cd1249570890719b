//! Row-Level Security
//!
//! Rewrites generated SQL so every policy-protected table is shadowed by a
//! filtered common-table-expression before execution. Policies are YAML and
//! live in profile configuration; they are parsed fresh on every rewrite.

pub mod policy;
pub mod rewriter;

pub use policy::{validate, ColumnRule, RlsPolicy, TablePolicy, LOGIN_USER_SENTINEL};
pub use rewriter::rewrite;
