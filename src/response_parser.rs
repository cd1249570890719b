//! Model Response Parsing
//!
//! The SQL-generation and suggestion prompts instruct the model to delimit
//! its output with fixed markers (`<sql>...</sql>`, `[generate]`). These are
//! a wire format shared with the prompt templates; the delimiters must not
//! change here without changing the prompts in lockstep.

use tracing::warn;

const SQL_OPEN: &str = "<sql>";
const SQL_CLOSE: &str = "</sql>";
const SUGGESTION_MARK: &str = "[generate]";

/// Extract the SQL statement between `<sql>` and `</sql>`.
///
/// Missing markers are a soft failure: the turn continues down the
/// empty-SQL branch, so this logs and returns an empty string rather than
/// erroring.
pub fn extract_sql(raw: &str) -> String {
    let Some(open) = raw.find(SQL_OPEN) else {
        warn!("model response contains no <sql> marker");
        return String::new();
    };
    let body = &raw[open + SQL_OPEN.len()..];
    let Some(close) = body.find(SQL_CLOSE) else {
        warn!("model response contains no </sql> marker");
        return String::new();
    };
    body[..close].trim().to_string()
}

/// Extract the explanation text following `</sql>`.
///
/// Returns the whole input unchanged when the marker is absent; never fails.
pub fn extract_explanation(raw: &str) -> String {
    match raw.find(SQL_CLOSE) {
        Some(close) => raw[close + SQL_CLOSE.len()..].trim().to_string(),
        None => raw.to_string(),
    }
}

/// Parse a `[generate]`-delimited suggested-question list.
pub fn parse_suggested_questions(raw: &str) -> Vec<String> {
    raw.split(SUGGESTION_MARK)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
