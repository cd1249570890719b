//! Collaborator Seams
//!
//! Narrow async traits for everything the query state machine talks to:
//! the LLM, the example retrieval store, the SQL executor and the turn log.
//! One thin adapter per trait; everything is injected, nothing is global.

pub mod executor;
pub mod llm;
pub mod log_store;
pub mod retrieval;

use std::sync::Arc;

pub use executor::{ClickHouseHttpExecutor, MySqlExecutor, SqlExecutor, SqlRunResult};
pub use llm::{
    ChatCompletionsClient, IntentClassification, LlmClient, QueryRewriteOutcome, ASK_IN_REPLY,
};
pub use log_store::{JsonlTurnLog, TurnLogEntry, TurnLogStore};
pub use retrieval::{EntityHit, ExampleHit, ExampleRetriever, OpenSearchRetriever};

/// Everything a machine needs, bundled for injection.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub retriever: Arc<dyn ExampleRetriever>,
    pub executor: Arc<dyn SqlExecutor>,
    pub turn_log: Arc<dyn TurnLogStore>,
}

impl Collaborators {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn ExampleRetriever>,
        executor: Arc<dyn SqlExecutor>,
        turn_log: Arc<dyn TurnLogStore>,
    ) -> Self {
        Self {
            llm,
            retriever,
            executor,
            turn_log,
        }
    }
}
