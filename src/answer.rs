//! Answer Accumulator
//!
//! Built incrementally as the state machine advances; every field defaults
//! to an empty/neutral value so a partial answer read at any state boundary
//! is always well-formed.

use serde::{Deserialize, Serialize};

/// Chart specification for the visualization layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub chart_type: String,
    #[serde(default)]
    pub chart_data: serde_json::Value,
}

/// Result of the knowledge-QA branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSearchResult {
    #[serde(default)]
    pub knowledge_response: String,
}

/// Result of the normal text-to-SQL branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlSearchResult {
    /// Generated SQL statement
    #[serde(default)]
    pub sql: String,

    /// Human-readable explanation following the SQL in the model response
    #[serde(default)]
    pub sql_explanation: String,

    /// Executed rows; stays null until EXECUTE_QUERY stores a result
    #[serde(default)]
    pub data: serde_json::Value,

    /// Natural-language analysis of the executed rows
    #[serde(default)]
    pub data_analyse: String,

    #[serde(default)]
    pub chart: ChartSpec,
}

/// One decomposed sub-task of an agent turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubTaskResult {
    #[serde(default)]
    pub sub_task_query: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Result of the agent (chain-of-thought) branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSearchResult {
    #[serde(default)]
    pub agent_summary: String,
    #[serde(default)]
    pub sub_search_results: Vec<SubTaskResult>,
}

/// Accumulated answer for one turn, returned at COMPLETE (or partially at
/// ERROR)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Answer {
    /// Original user query
    #[serde(default)]
    pub query: String,

    /// Context-aware rewritten query
    #[serde(default)]
    pub query_rewrite: String,

    /// Classified intent label
    #[serde(default)]
    pub query_intent: String,

    #[serde(default)]
    pub knowledge_search_result: KnowledgeSearchResult,

    #[serde(default)]
    pub sql_search_result: SqlSearchResult,

    #[serde(default)]
    pub agent_search_result: AgentSearchResult,

    /// Ask-in-reply text when the rewrite step needs the user to clarify
    #[serde(default)]
    pub ask_rewrite_result: String,

    /// Disambiguation text when entity retrieval finds conflicting candidates
    #[serde(default)]
    pub ask_entity_select: String,

    #[serde(default)]
    pub suggested_questions: Vec<String>,

    /// Failure description when the turn terminates in ERROR
    #[serde(default)]
    pub error_info: String,
}
