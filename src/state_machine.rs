//! Query State Machine
//!
//! Drives one user turn from raw question to answered query through an
//! explicit state graph: rewrite, intent classification, retrieval, SQL
//! generation, secured execution and analysis. One machine per turn; the
//! caller either lets `run` walk to a terminal state or invokes the state
//! handlers one at a time to narrate progress.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::answer::{Answer, SubTaskResult};
use crate::collaborators::executor::SqlRunResult;
use crate::collaborators::llm::ASK_IN_REPLY;
use crate::collaborators::retrieval::{EntityHit, ExampleHit};
use crate::collaborators::Collaborators;
use crate::context::ProcessingContext;
use crate::datasource::{capabilities_for, RlsMode};
use crate::error::{GenBiError, Result};
use crate::response_parser::{extract_explanation, extract_sql, parse_suggested_questions};
use crate::rls;

/// Hard bound on handler invocations per turn; the graph is acyclic so a
/// well-routed turn finishes in far fewer.
pub const MAX_STEPS: usize = 32;

const MAX_SUB_TASKS: usize = 5;

/// Processing states of one turn. Serialized names are the wire strings
/// callers persist between turns for resumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    #[default]
    Initial,
    AskQueryRewrite,
    IntentRecognition,
    SearchIntent,
    RejectIntent,
    KnowledgeSearch,
    EntityRetrieval,
    AskEntitySelect,
    QaRetrieval,
    SqlGeneration,
    ExecuteQuery,
    AnalyzeData,
    AgentTask,
    AgentSearch,
    AgentDataSummary,
    Error,
    Complete,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Initial => "INITIAL",
            QueryState::AskQueryRewrite => "ASK_QUERY_REWRITE",
            QueryState::IntentRecognition => "INTENT_RECOGNITION",
            QueryState::SearchIntent => "SEARCH_INTENT",
            QueryState::RejectIntent => "REJECT_INTENT",
            QueryState::KnowledgeSearch => "KNOWLEDGE_SEARCH",
            QueryState::EntityRetrieval => "ENTITY_RETRIEVAL",
            QueryState::AskEntitySelect => "ASK_ENTITY_SELECT",
            QueryState::QaRetrieval => "QA_RETRIEVAL",
            QueryState::SqlGeneration => "SQL_GENERATION",
            QueryState::ExecuteQuery => "EXECUTE_QUERY",
            QueryState::AnalyzeData => "ANALYZE_DATA",
            QueryState::AgentTask => "AGENT_TASK",
            QueryState::AgentSearch => "AGENT_SEARCH",
            QueryState::AgentDataSummary => "AGENT_DATA_SUMMARY",
            QueryState::Error => "ERROR",
            QueryState::Complete => "COMPLETE",
        }
    }

    /// Parse a persisted state name. Unknown names resume from the start.
    pub fn parse(value: &str) -> Self {
        match value {
            "INITIAL" => QueryState::Initial,
            "ASK_QUERY_REWRITE" => QueryState::AskQueryRewrite,
            "INTENT_RECOGNITION" => QueryState::IntentRecognition,
            "SEARCH_INTENT" => QueryState::SearchIntent,
            "REJECT_INTENT" => QueryState::RejectIntent,
            "KNOWLEDGE_SEARCH" => QueryState::KnowledgeSearch,
            "ENTITY_RETRIEVAL" => QueryState::EntityRetrieval,
            "ASK_ENTITY_SELECT" => QueryState::AskEntitySelect,
            "QA_RETRIEVAL" => QueryState::QaRetrieval,
            "SQL_GENERATION" => QueryState::SqlGeneration,
            "EXECUTE_QUERY" => QueryState::ExecuteQuery,
            "ANALYZE_DATA" => QueryState::AnalyzeData,
            "AGENT_TASK" => QueryState::AgentTask,
            "AGENT_SEARCH" => QueryState::AgentSearch,
            "AGENT_DATA_SUMMARY" => QueryState::AgentDataSummary,
            "ERROR" => QueryState::Error,
            "COMPLETE" => QueryState::Complete,
            _ => QueryState::Initial,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Error | QueryState::Complete)
    }
}

/// Effective search intent of the turn, exactly one flag set after
/// INTENT_RECOGNITION.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentFlags {
    pub reject_search: bool,
    pub agent_search: bool,
    pub knowledge_search: bool,
    pub normal_search: bool,
}

/// A slot with two or more distinct retrieved candidates cannot be resolved
/// silently; the turn asks the user to choose instead.
fn ambiguous_candidates(slots: &[String], hits: &[EntityHit]) -> Vec<(String, Vec<String>)> {
    let mut ambiguous = Vec::new();
    for slot in slots {
        let slot_lower = slot.to_lowercase();
        let candidates: Vec<String> = hits
            .iter()
            .filter(|hit| hit.entity.to_lowercase().contains(&slot_lower))
            .map(|hit| hit.entity.clone())
            .unique()
            .collect();
        if candidates.len() > 1 {
            ambiguous.push((slot.clone(), candidates));
        }
    }
    ambiguous
}

/// State machine for one user turn.
pub struct QueryStateMachine {
    state: QueryState,
    context: ProcessingContext,
    answer: Answer,
    collaborators: Collaborators,

    intent_flags: IntentFlags,
    slots: Vec<String>,
    entity_hits: Vec<EntityHit>,
    example_hits: Vec<ExampleHit>,
    ambiguous_entities: Vec<(String, Vec<String>)>,
    model_response: String,
    generated_sql: String,
    executed_sql: String,
    execution_result: Option<SqlRunResult>,
}

impl QueryStateMachine {
    /// Build a machine for one turn. The starting state comes from
    /// `context.previous_state`, so a caller resuming a turn seeds that
    /// field with the persisted wire name.
    pub fn new(context: ProcessingContext, collaborators: Collaborators) -> Self {
        let state = context.previous_state;
        info!("Turn starts in state {}", state.as_str());
        let answer = Answer {
            query: context.search_box.clone(),
            ..Answer::default()
        };
        Self {
            state,
            context,
            answer,
            collaborators,
            intent_flags: IntentFlags::default(),
            slots: Vec::new(),
            entity_hits: Vec::new(),
            example_hits: Vec::new(),
            ambiguous_entities: Vec::new(),
            model_response: String::new(),
            generated_sql: String::new(),
            executed_sql: String::new(),
            execution_result: None,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.context
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn into_answer(self) -> Answer {
        self.answer
    }

    pub fn intent_flags(&self) -> IntentFlags {
        self.intent_flags
    }

    pub fn entity_hits(&self) -> &[EntityHit] {
        &self.entity_hits
    }

    pub fn example_hits(&self) -> &[ExampleHit] {
        &self.example_hits
    }

    /// Raw model text the SQL was extracted from, for progress narration.
    pub fn model_response(&self) -> &str {
        &self.model_response
    }

    pub fn generated_sql(&self) -> &str {
        &self.generated_sql
    }

    /// SQL actually sent to the warehouse, after any RLS rewrite.
    pub fn executed_sql(&self) -> &str {
        &self.executed_sql
    }

    pub fn execution_result(&self) -> Option<&SqlRunResult> {
        self.execution_result.as_ref()
    }

    /// Advance one state. Handler failures never bubble: the error text is
    /// recorded on the answer and the machine lands in ERROR.
    pub async fn step(&mut self) -> QueryState {
        let current = self.state;
        let result = match current {
            QueryState::Initial => self.handle_initial().await,
            QueryState::AskQueryRewrite => self.handle_ask_query_rewrite().await,
            QueryState::IntentRecognition => self.handle_intent_recognition().await,
            QueryState::SearchIntent => self.handle_search_intent().await,
            QueryState::RejectIntent => self.handle_reject_intent().await,
            QueryState::KnowledgeSearch => self.handle_knowledge_search().await,
            QueryState::EntityRetrieval => self.handle_entity_retrieval().await,
            QueryState::AskEntitySelect => self.handle_ask_entity_select().await,
            QueryState::QaRetrieval => self.handle_qa_retrieval().await,
            QueryState::SqlGeneration => self.handle_sql_generation().await,
            QueryState::ExecuteQuery => self.handle_execute_query().await,
            QueryState::AnalyzeData => self.handle_analyze_data().await,
            QueryState::AgentTask => self.handle_agent_task().await,
            QueryState::AgentSearch => self.handle_agent_search().await,
            QueryState::AgentDataSummary => self.handle_agent_data_summary().await,
            QueryState::Error | QueryState::Complete => return current,
        };
        match result {
            Ok(next) => {
                debug!("{} -> {}", current.as_str(), next.as_str());
                next
            }
            Err(e) => {
                warn!("State {} failed: {}", current.as_str(), e);
                if self.answer.error_info.is_empty() {
                    self.answer.error_info = e.to_string();
                }
                self.state = QueryState::Error;
                QueryState::Error
            }
        }
    }

    /// Step to a terminal state. Always ends in COMPLETE or ERROR.
    pub async fn run(&mut self) -> &Answer {
        let mut steps = 0;
        while !self.state.is_terminal() {
            if steps >= MAX_STEPS {
                warn!("Step bound reached in state {}, aborting turn", self.state.as_str());
                self.answer.error_info = format!("processing exceeded {} steps", MAX_STEPS);
                self.state = QueryState::Error;
                break;
            }
            steps += 1;
            self.step().await;
        }
        info!("Turn finished in state {} after {} steps", self.state.as_str(), steps);
        &self.answer
    }

    /// INITIAL: rewrite the question against conversation history, or pass
    /// it through untouched when the context window is zero.
    pub async fn handle_initial(&mut self) -> Result<QueryState> {
        let next = if self.context.context_window > 0 {
            let history = &self.context.user_query_history;
            let start = history.len().saturating_sub(self.context.context_window);
            let outcome = self
                .collaborators
                .llm
                .rewrite_query(
                    &self.context.database_profile.model_id,
                    &self.context.search_box,
                    &self.context.database_profile.prompt_map,
                    &history[start..],
                )
                .await?;
            if outcome.intent == ASK_IN_REPLY {
                info!("Rewrite needs clarification, asking in reply");
                self.answer.ask_rewrite_result = outcome.query;
                QueryState::AskQueryRewrite
            } else {
                let rewritten = if outcome.query.is_empty() {
                    self.context.search_box.clone()
                } else {
                    outcome.query
                };
                debug!("Query rewritten to: {}", rewritten);
                self.context.query_rewrite = rewritten.clone();
                self.answer.query_rewrite = rewritten;
                QueryState::IntentRecognition
            }
        } else {
            self.context.query_rewrite = self.context.search_box.clone();
            self.answer.query_rewrite = self.context.search_box.clone();
            QueryState::IntentRecognition
        };
        self.state = next;
        Ok(next)
    }

    /// ASK_QUERY_REWRITE: the clarification question is the whole answer.
    pub async fn handle_ask_query_rewrite(&mut self) -> Result<QueryState> {
        self.answer.query_intent = ASK_IN_REPLY.to_string();
        if self.answer.ask_rewrite_result.is_empty() {
            self.answer.ask_rewrite_result =
                "Could you rephrase the question with a bit more detail?".to_string();
        }
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// INTENT_RECOGNITION: classify the rewritten question and collect NER
    /// slots. With the flag off every turn is a normal search.
    pub async fn handle_intent_recognition(&mut self) -> Result<QueryState> {
        let mut flags = IntentFlags::default();
        if self.context.intent_ner_recognition_flag {
            let classification = self
                .collaborators
                .llm
                .classify_intent(
                    &self.context.database_profile.model_id,
                    &self.context.query_rewrite,
                    &self.context.database_profile.prompt_map,
                )
                .await?;
            self.slots = classification.slots.into_iter().unique().collect();
            match classification.intent.as_str() {
                "reject_search" => flags.reject_search = true,
                "agent_search" => {
                    if self.context.agent_cot_flag {
                        flags.agent_search = true;
                    } else {
                        debug!("Agent intent degraded to normal search, agent flag unset");
                        flags.normal_search = true;
                    }
                }
                "knowledge_search" => flags.knowledge_search = true,
                _ => flags.normal_search = true,
            }
        } else {
            flags.normal_search = true;
        }
        self.answer.query_intent = if flags.reject_search {
            "reject_search"
        } else if flags.agent_search {
            "agent_search"
        } else if flags.knowledge_search {
            "knowledge_search"
        } else {
            "normal_search"
        }
        .to_string();
        self.intent_flags = flags;
        info!("Query intent: {}", self.answer.query_intent);

        let next = if flags.reject_search {
            QueryState::RejectIntent
        } else if flags.knowledge_search {
            QueryState::KnowledgeSearch
        } else {
            QueryState::EntityRetrieval
        };
        self.state = next;
        Ok(next)
    }

    /// SEARCH_INTENT: resumption entry for callers that already know the
    /// turn is a search; skips rewrite and classification and funnels
    /// straight into retrieval.
    pub async fn handle_search_intent(&mut self) -> Result<QueryState> {
        if self.context.query_rewrite.is_empty() {
            self.context.query_rewrite = self.context.search_box.clone();
            self.answer.query_rewrite = self.context.search_box.clone();
        }
        if !self.intent_flags.agent_search {
            self.intent_flags.normal_search = true;
        }
        if self.answer.query_intent.is_empty() {
            self.answer.query_intent = "normal_search".to_string();
        }
        self.state = QueryState::EntityRetrieval;
        Ok(self.state)
    }

    /// REJECT_INTENT: out-of-scope question; no SQL, no retrieval.
    pub async fn handle_reject_intent(&mut self) -> Result<QueryState> {
        info!("Query rejected as out of scope");
        self.answer.query_intent = "reject_search".to_string();
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// KNOWLEDGE_SEARCH: answer from metadata/terminology, never touches
    /// the warehouse.
    pub async fn handle_knowledge_search(&mut self) -> Result<QueryState> {
        let response = self
            .collaborators
            .llm
            .answer_knowledge_question(
                &self.context.database_profile.model_id,
                &self.context.query_rewrite,
                &self.context.database_profile.prompt_map,
            )
            .await?;
        self.answer.knowledge_search_result.knowledge_response = response;
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// ENTITY_RETRIEVAL: look up recognized slots in the NER index. A slot
    /// with conflicting candidates diverts the turn to disambiguation.
    pub async fn handle_entity_retrieval(&mut self) -> Result<QueryState> {
        if self.context.use_rag_flag && !self.slots.is_empty() {
            let hits = self
                .collaborators
                .retriever
                .retrieve_entities(
                    &self.slots,
                    &self.context.opensearch_info,
                    &self.context.selected_profile,
                )
                .await?;
            debug!("{} entity hits for {} slots", hits.len(), self.slots.len());
            self.entity_hits = hits;
        }
        self.ambiguous_entities = ambiguous_candidates(&self.slots, &self.entity_hits);
        let next = if self.ambiguous_entities.is_empty() {
            QueryState::QaRetrieval
        } else {
            info!("{} ambiguous entity slots, asking user to select", self.ambiguous_entities.len());
            QueryState::AskEntitySelect
        };
        self.state = next;
        Ok(next)
    }

    /// ASK_ENTITY_SELECT: list the conflicting candidates and finish the
    /// turn so the user can pick one.
    pub async fn handle_ask_entity_select(&mut self) -> Result<QueryState> {
        let lines: Vec<String> = self
            .ambiguous_entities
            .iter()
            .map(|(slot, candidates)| format!("'{}' could mean {}", slot, candidates.join(" or ")))
            .collect();
        self.answer.ask_entity_select = if lines.is_empty() {
            "Which entity did you mean?".to_string()
        } else {
            format!("Please pick one before I write the query: {}.", lines.join("; "))
        };
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// QA_RETRIEVAL: fetch the closest question/SQL examples for few-shot
    /// prompting. Agent turns branch off to decomposition from here.
    pub async fn handle_qa_retrieval(&mut self) -> Result<QueryState> {
        if self.context.use_rag_flag {
            let hits = self
                .collaborators
                .retriever
                .retrieve_examples(
                    &self.context.query_rewrite,
                    &self.context.opensearch_info,
                    &self.context.selected_profile,
                )
                .await?;
            debug!("{} example hits", hits.len());
            self.example_hits = hits;
        }
        let next = if self.intent_flags.agent_search {
            QueryState::AgentTask
        } else {
            QueryState::SqlGeneration
        };
        self.state = next;
        Ok(next)
    }

    async fn generate_for(&self, question: &str) -> Result<String> {
        let profile = &self.context.database_profile;
        self.collaborators
            .llm
            .generate_sql(
                &profile.model_id,
                &profile.tables_info,
                &profile.hints,
                &profile.prompt_map,
                question,
                &self.example_hits,
                &self.entity_hits,
                &profile.db_type,
            )
            .await
    }

    /// SQL_GENERATION: generate, extract and store the statement. Turns
    /// that don't want results stop here with the SQL as the answer.
    pub async fn handle_sql_generation(&mut self) -> Result<QueryState> {
        let question = self.context.query_rewrite.clone();
        let raw = self.generate_for(&question).await?;
        self.generated_sql = extract_sql(&raw);
        self.answer.sql_search_result.sql = self.generated_sql.clone();
        self.answer.sql_search_result.sql_explanation = extract_explanation(&raw);
        self.model_response = raw;
        info!("Generated SQL ({} chars)", self.generated_sql.len());

        if self.context.gen_suggested_question_flag {
            match self
                .collaborators
                .llm
                .suggest_questions(
                    &self.context.database_profile.model_id,
                    &question,
                    &self.context.database_profile.prompt_map,
                )
                .await
            {
                Ok(raw_suggestions) => {
                    self.answer.suggested_questions = parse_suggested_questions(&raw_suggestions);
                }
                Err(e) => warn!("Question suggestion failed, continuing without: {}", e),
            }
        }

        let next = if self.context.visualize_results_flag {
            QueryState::ExecuteQuery
        } else {
            QueryState::Complete
        };
        self.state = next;
        Ok(next)
    }

    /// Apply the profile's RLS policy when the dialect supports table
    /// replacement; otherwise the statement runs as generated.
    fn secured_sql(&self, sql: &str) -> String {
        let profile = &self.context.database_profile;
        let capabilities = capabilities_for(&profile.db_type);
        if profile.enable_row_level_security
            && capabilities.supports_rls
            && capabilities.rls_mode == RlsMode::TableReplace
        {
            let user = self.context.login_user();
            let rewritten = rls::rewrite(sql, &profile.row_level_security_config, &user);
            if rewritten != sql {
                info!("Row-level security applied for user {}", user.username);
            }
            rewritten
        } else {
            sql.to_string()
        }
    }

    /// EXECUTE_QUERY: run the stored SQL through RLS and the executor.
    /// Empty SQL fails the turn without ever reaching the warehouse.
    pub async fn handle_execute_query(&mut self) -> Result<QueryState> {
        if self.generated_sql.trim().is_empty() {
            warn!("No SQL to execute, failing the turn");
            let result = SqlRunResult::failure(500, "SQL is empty");
            self.answer.error_info = result.error_info.clone();
            self.execution_result = Some(result);
            self.state = QueryState::Error;
            return Ok(self.state);
        }

        let final_sql = self.secured_sql(&self.generated_sql);
        self.executed_sql = final_sql.clone();
        let result = self
            .collaborators
            .executor
            .execute(&self.context.database_profile, &final_sql)
            .await?;

        let next = if result.is_success() {
            self.answer.sql_search_result.data = result.data.clone();
            if self.context.data_with_analyse {
                QueryState::AnalyzeData
            } else {
                QueryState::Complete
            }
        } else {
            warn!("Execution failed ({}): {}", result.status_code, result.error_info);
            self.answer.error_info = result.error_info.clone();
            QueryState::Error
        };
        self.execution_result = Some(result);
        self.state = next;
        Ok(next)
    }

    /// ANALYZE_DATA: summarize the executed rows in natural language.
    pub async fn handle_analyze_data(&mut self) -> Result<QueryState> {
        let json_rows = serde_json::to_string(&self.answer.sql_search_result.data)?;
        let analysis = self
            .collaborators
            .llm
            .analyze_data(
                &self.context.database_profile.model_id,
                &self.context.database_profile.prompt_map,
                &self.context.query_rewrite,
                &json_rows,
            )
            .await?;
        self.answer.sql_search_result.data_analyse = analysis;
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// AGENT_TASK: decompose the question and generate SQL per sub-task,
    /// reusing the retrieval context already collected.
    pub async fn handle_agent_task(&mut self) -> Result<QueryState> {
        let mut tasks = self
            .collaborators
            .llm
            .decompose_task(
                &self.context.database_profile.model_id,
                &self.context.query_rewrite,
                &self.context.database_profile.prompt_map,
            )
            .await?;
        tasks.truncate(MAX_SUB_TASKS);
        if tasks.is_empty() {
            tasks.push(self.context.query_rewrite.clone());
        }
        info!("Decomposed into {} sub-tasks", tasks.len());

        for task in tasks {
            let raw = self.generate_for(&task).await?;
            let sql = extract_sql(&raw);
            self.answer.agent_search_result.sub_search_results.push(SubTaskResult {
                sub_task_query: task,
                sql,
                data: serde_json::Value::Null,
            });
        }
        self.state = QueryState::AgentSearch;
        Ok(self.state)
    }

    /// AGENT_SEARCH: execute every sub-task statement. A sub-task whose
    /// statement fails keeps null data and the turn continues; only
    /// infrastructure faults abort.
    pub async fn handle_agent_search(&mut self) -> Result<QueryState> {
        let task_count = self.answer.agent_search_result.sub_search_results.len();
        for index in 0..task_count {
            let sql = self.answer.agent_search_result.sub_search_results[index].sql.clone();
            if sql.trim().is_empty() {
                warn!("Sub-task {} produced no SQL, skipping", index);
                continue;
            }
            let final_sql = self.secured_sql(&sql);
            let result = self
                .collaborators
                .executor
                .execute(&self.context.database_profile, &final_sql)
                .await?;
            let entry = &mut self.answer.agent_search_result.sub_search_results[index];
            if result.is_success() {
                entry.data = result.data;
            } else {
                warn!("Sub-task {} failed ({}): {}", index, result.status_code, result.error_info);
            }
        }
        self.state = QueryState::AgentDataSummary;
        Ok(self.state)
    }

    /// AGENT_DATA_SUMMARY: one summary over all sub-task results.
    pub async fn handle_agent_data_summary(&mut self) -> Result<QueryState> {
        let digest = serde_json::to_string(&self.answer.agent_search_result.sub_search_results)?;
        let summary = self
            .collaborators
            .llm
            .analyze_data(
                &self.context.database_profile.model_id,
                &self.context.database_profile.prompt_map,
                &self.context.query_rewrite,
                &digest,
            )
            .await?;
        self.answer.agent_search_result.agent_summary = summary;
        self.state = QueryState::Complete;
        Ok(self.state)
    }

    /// Regenerate the statement after a failed execution, embedding the
    /// failure into the prompt, and rewind to EXECUTE_QUERY. Never invoked
    /// by `step`/`run`; the caller decides whether to retry.
    pub async fn handle_auto_correction(&mut self) -> Result<QueryState> {
        if !self.context.auto_correction_flag {
            return Err(GenBiError::State(
                "auto correction is disabled for this turn".to_string(),
            ));
        }
        let failed = match &self.execution_result {
            Some(result) if !result.is_success() => result.clone(),
            _ => {
                return Err(GenBiError::State(
                    "no failed execution to correct".to_string(),
                ))
            }
        };

        let hint = format!(
            "The SQL below failed against the warehouse. Fix it and return the corrected \
             statement.\nSQL:\n{}\nError:\n{}\nQuestion:\n{}",
            self.generated_sql, failed.error_info, self.context.query_rewrite
        );
        let raw = self.generate_for(&hint).await?;
        self.generated_sql = extract_sql(&raw);
        self.answer.sql_search_result.sql = self.generated_sql.clone();
        self.answer.sql_search_result.sql_explanation = extract_explanation(&raw);
        self.model_response = raw;
        self.answer.error_info.clear();
        info!("Auto-corrected SQL, returning to EXECUTE_QUERY");
        self.state = QueryState::ExecuteQuery;
        Ok(self.state)
    }
}
