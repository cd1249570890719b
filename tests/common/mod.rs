//! Canned collaborators for driving the state machine without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use genbi::collaborators::executor::{SqlExecutor, SqlRunResult};
use genbi::collaborators::llm::{IntentClassification, LlmClient, QueryRewriteOutcome};
use genbi::collaborators::log_store::{TurnLogEntry, TurnLogStore};
use genbi::collaborators::retrieval::{EntityHit, ExampleHit, ExampleRetriever};
use genbi::collaborators::Collaborators;
use genbi::context::ProcessingContext;
use genbi::error::{GenBiError, Result};
use genbi::profile::{DatabaseProfile, PromptMap, RetrievalConfig};

/// Scriptable LLM stand-in. Response fields default to empty; tests set the
/// ones their flow reads. Call counters make short-circuit assertions easy.
#[derive(Default)]
pub struct CannedLlm {
    /// `ask_in_reply` to force a clarification turn.
    pub rewrite_intent: String,
    /// Rewritten query; empty echoes the input.
    pub rewrite_query: String,
    pub intent: String,
    pub slots: Vec<String>,
    /// Raw SQL-generation responses, one per call; the last repeats.
    pub sql_responses: Vec<String>,
    pub analysis_response: String,
    pub knowledge_response: String,
    pub suggestion_response: String,
    pub decomposed: Vec<String>,
    pub fail_generate: bool,

    pub rewrite_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub analyze_calls: AtomicUsize,
    pub knowledge_calls: AtomicUsize,
    pub decompose_calls: AtomicUsize,
    pub suggest_calls: AtomicUsize,
    /// Questions handed to SQL generation, in call order.
    pub seen_questions: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for CannedLlm {
    async fn rewrite_query(
        &self,
        _model_id: &str,
        query: &str,
        _prompt_map: &PromptMap,
        _history: &[String],
    ) -> Result<QueryRewriteOutcome> {
        self.rewrite_calls.fetch_add(1, Ordering::SeqCst);
        let query = if self.rewrite_query.is_empty() {
            query.to_string()
        } else {
            self.rewrite_query.clone()
        };
        Ok(QueryRewriteOutcome {
            intent: self.rewrite_intent.clone(),
            query,
        })
    }

    async fn classify_intent(
        &self,
        _model_id: &str,
        _query: &str,
        _prompt_map: &PromptMap,
    ) -> Result<IntentClassification> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(IntentClassification {
            intent: self.intent.clone(),
            slots: self.slots.clone(),
        })
    }

    async fn generate_sql(
        &self,
        _model_id: &str,
        _schema: &serde_json::Value,
        _hints: &str,
        _prompt_map: &PromptMap,
        query: &str,
        _examples: &[ExampleHit],
        _entities: &[EntityHit],
        _dialect: &str,
    ) -> Result<String> {
        let call = self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_questions.lock().unwrap().push(query.to_string());
        if self.fail_generate {
            return Err(GenBiError::Llm("canned generation failure".to_string()));
        }
        if self.sql_responses.is_empty() {
            return Ok(String::new());
        }
        let index = call.min(self.sql_responses.len() - 1);
        Ok(self.sql_responses[index].clone())
    }

    async fn analyze_data(
        &self,
        _model_id: &str,
        _prompt_map: &PromptMap,
        _query: &str,
        _json_rows: &str,
    ) -> Result<String> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.analysis_response.clone())
    }

    async fn answer_knowledge_question(
        &self,
        _model_id: &str,
        _query: &str,
        _prompt_map: &PromptMap,
    ) -> Result<String> {
        self.knowledge_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.knowledge_response.clone())
    }

    async fn decompose_task(
        &self,
        _model_id: &str,
        _query: &str,
        _prompt_map: &PromptMap,
    ) -> Result<Vec<String>> {
        self.decompose_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decomposed.clone())
    }

    async fn suggest_questions(
        &self,
        _model_id: &str,
        _query: &str,
        _prompt_map: &PromptMap,
    ) -> Result<String> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suggestion_response.clone())
    }
}

#[derive(Default)]
pub struct CannedRetriever {
    pub entities: Vec<EntityHit>,
    pub examples: Vec<ExampleHit>,
    pub entity_calls: AtomicUsize,
    pub example_calls: AtomicUsize,
}

#[async_trait]
impl ExampleRetriever for CannedRetriever {
    async fn retrieve_entities(
        &self,
        _slots: &[String],
        _config: &RetrievalConfig,
        _profile: &str,
    ) -> Result<Vec<EntityHit>> {
        self.entity_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.clone())
    }

    async fn retrieve_examples(
        &self,
        _query: &str,
        _config: &RetrievalConfig,
        _profile: &str,
    ) -> Result<Vec<ExampleHit>> {
        self.example_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.examples.clone())
    }
}

/// Scriptable executor: results are served per call, the last repeats, and
/// every statement received is captured for RLS assertions.
#[derive(Default)]
pub struct CannedExecutor {
    pub results: Vec<SqlRunResult>,
    pub calls: AtomicUsize,
    pub seen_sql: Mutex<Vec<String>>,
}

#[async_trait]
impl SqlExecutor for CannedExecutor {
    async fn execute(&self, _profile: &DatabaseProfile, sql: &str) -> Result<SqlRunResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sql.lock().unwrap().push(sql.to_string());
        if self.results.is_empty() {
            return Ok(SqlRunResult::success(serde_json::json!([])));
        }
        let index = call.min(self.results.len() - 1);
        Ok(self.results[index].clone())
    }
}

#[derive(Default)]
pub struct CannedTurnLog {
    pub entries: Mutex<Vec<TurnLogEntry>>,
}

#[async_trait]
impl TurnLogStore for CannedTurnLog {
    async fn log_turn(&self, entry: &TurnLogEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Route machine logs through the env filter; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Model response carrying one tagged statement, the way the SQL prompt
/// instructs the model to answer.
pub fn tagged_sql(sql: &str) -> String {
    format!("<sql>{}</sql>\nReads the requested rows.", sql)
}

pub fn base_profile() -> DatabaseProfile {
    DatabaseProfile {
        tables_info: serde_json::json!({"orders": ["id", "amount", "created_by"]}),
        hints: "amounts are stored in cents".to_string(),
        db_type: "mysql".to_string(),
        model_id: "gpt-4o".to_string(),
        ..DatabaseProfile::default()
    }
}

pub fn search_context(query: &str) -> ProcessingContext {
    ProcessingContext::new(query, "session-1", "admin", "demo", base_profile())
}

pub fn bundle(
    llm: &Arc<CannedLlm>,
    retriever: &Arc<CannedRetriever>,
    executor: &Arc<CannedExecutor>,
    turn_log: &Arc<CannedTurnLog>,
) -> Collaborators {
    init_tracing();
    Collaborators::new(
        llm.clone(),
        retriever.clone(),
        executor.clone(),
        turn_log.clone(),
    )
}
