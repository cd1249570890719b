//! Processing Context
//!
//! Per-turn value object carrying every input the query state machine needs.
//! Constructed once per user turn; the only field mutated after construction
//! is `query_rewrite`, filled by the INITIAL handler.

use crate::profile::{DatabaseProfile, RetrievalConfig};
use crate::state_machine::QueryState;
use serde::{Deserialize, Serialize};

/// Acting user identity, used for row-level-security sentinel substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUser {
    pub username: String,
}

impl LoginUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Inputs for one user turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingContext {
    /// Raw user query text
    pub search_box: String,

    /// Rewritten query; starts empty, filled by the INITIAL handler
    #[serde(default)]
    pub query_rewrite: String,

    pub session_id: String,
    pub user_id: String,
    pub selected_profile: String,

    /// Schema/DDL metadata, dialect, prompt templates and connection info
    /// for the selected data profile
    pub database_profile: DatabaseProfile,

    #[serde(default)]
    pub use_rag_flag: bool,
    #[serde(default)]
    pub intent_ner_recognition_flag: bool,
    #[serde(default)]
    pub agent_cot_flag: bool,
    #[serde(default)]
    pub explain_gen_process_flag: bool,
    #[serde(default)]
    pub visualize_results_flag: bool,
    #[serde(default)]
    pub data_with_analyse: bool,
    #[serde(default)]
    pub gen_suggested_question_flag: bool,
    #[serde(default)]
    pub auto_correction_flag: bool,

    /// Number of prior turns used for query rewriting; 0 disables rewriting
    #[serde(default)]
    pub context_window: usize,

    /// Prior turns, oldest first
    #[serde(default)]
    pub user_query_history: Vec<String>,

    /// Retrieval-store connection parameters
    #[serde(default)]
    pub opensearch_info: RetrievalConfig,

    /// State to resume from; defaults to the INITIAL sentinel
    #[serde(default)]
    pub previous_state: QueryState,
}

impl ProcessingContext {
    /// Minimal context for a turn: everything else defaults off/empty.
    pub fn new(
        search_box: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        selected_profile: impl Into<String>,
        database_profile: DatabaseProfile,
    ) -> Self {
        Self {
            search_box: search_box.into(),
            query_rewrite: String::new(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            selected_profile: selected_profile.into(),
            database_profile,
            use_rag_flag: false,
            intent_ner_recognition_flag: false,
            agent_cot_flag: false,
            explain_gen_process_flag: false,
            visualize_results_flag: false,
            data_with_analyse: false,
            gen_suggested_question_flag: false,
            auto_correction_flag: false,
            context_window: 0,
            user_query_history: Vec::new(),
            opensearch_info: RetrievalConfig::default(),
            previous_state: QueryState::Initial,
        }
    }

    /// Identity used when applying row-level security to generated SQL
    pub fn login_user(&self) -> LoginUser {
        LoginUser::new(self.user_id.clone())
    }
}
