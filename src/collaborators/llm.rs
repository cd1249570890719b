//! LLM Collaborator
//!
//! Trait seam for every model call the machine makes, plus the
//! chat-completions adapter. Prompt text comes from the profile's prompt
//! map when a key is present and from built-in defaults otherwise.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::collaborators::retrieval::{EntityHit, ExampleHit};
use crate::error::{GenBiError, Result};
use crate::profile::PromptMap;

/// Rewrite intent reported when the model needs the user to clarify first.
pub const ASK_IN_REPLY: &str = "ask_in_reply";

/// API key that switches the adapter into canned-response mode for tests.
pub const DUMMY_API_KEY: &str = "dummy-api-key";

/// Outcome of the multi-turn query rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRewriteOutcome {
    /// `ask_in_reply` when clarification is needed, `none` otherwise.
    #[serde(default)]
    pub intent: String,
    /// The self-contained rewritten question, or the clarification to ask.
    #[serde(default)]
    pub query: String,
}

/// Outcome of intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    /// One of `reject_search`, `agent_search`, `knowledge_search`,
    /// `normal_search`. Anything else is treated as `normal_search`.
    #[serde(default)]
    pub intent: String,
    /// Named entities recognized in the question.
    #[serde(default)]
    pub slots: Vec<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Rewrite a question against conversation history into a
    /// self-contained one, or report that clarification is needed.
    async fn rewrite_query(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
        history: &[String],
    ) -> Result<QueryRewriteOutcome>;

    /// Classify the question into a search intent and extract entity slots.
    async fn classify_intent(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<IntentClassification>;

    /// Generate SQL for the question. Returns the raw model text; the
    /// caller extracts the tagged statement from it.
    #[allow(clippy::too_many_arguments)]
    async fn generate_sql(
        &self,
        model_id: &str,
        schema: &serde_json::Value,
        hints: &str,
        prompt_map: &PromptMap,
        query: &str,
        examples: &[ExampleHit],
        entities: &[EntityHit],
        dialect: &str,
    ) -> Result<String>;

    /// Summarize executed rows in natural language.
    async fn analyze_data(
        &self,
        model_id: &str,
        prompt_map: &PromptMap,
        query: &str,
        json_rows: &str,
    ) -> Result<String>;

    /// Answer a metadata/terminology question without touching the warehouse.
    async fn answer_knowledge_question(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<String>;

    /// Split a multi-part analytical question into independent sub-queries.
    async fn decompose_task(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<Vec<String>>;

    /// Propose follow-up questions. Returns the raw delimited model text.
    async fn suggest_questions(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<String>;
}

const DEFAULT_REWRITE_PROMPT: &str = "You rewrite the latest question into a single \
self-contained analytical question using the conversation history. If the question cannot \
be understood without asking the user, set intent to \"ask_in_reply\" and put the \
clarifying question in \"query\". Return JSON only: {\"intent\": \"ask_in_reply\"|\"none\", \
\"query\": \"...\"}";

const DEFAULT_INTENT_PROMPT: &str = "Classify the question and extract named entities. \
Intents: reject_search (not a data question), agent_search (multi-step analysis), \
knowledge_search (asks about terms or metadata), normal_search (answerable with one SQL \
query). Return JSON only: {\"intent\": \"...\", \"slots\": [\"...\"]}";

const DEFAULT_SQL_PROMPT: &str = "You write SQL for a business analyst. Use only the \
tables and columns provided. Wrap the statement in <sql> and </sql> tags and explain it \
briefly after the closing tag.";

const DEFAULT_ANALYZE_PROMPT: &str = "Summarize the result rows for the question in a \
few plain sentences. Mention notable values, do not restate every row.";

const DEFAULT_KNOWLEDGE_PROMPT: &str = "Answer the question about the dataset's terms \
and metrics directly. Do not write SQL.";

const DEFAULT_DECOMPOSE_PROMPT: &str = "Split the question into the smallest set of \
independent sub-questions that together answer it. Return a JSON array of strings only.";

const DEFAULT_SUGGEST_PROMPT: &str = "Propose up to three follow-up questions the user \
could ask next. Prefix every question with [generate] and return nothing else.";

fn prompt_or(prompt_map: &PromptMap, key: &str, fallback: &str) -> String {
    prompt_map
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(fallback)
        .to_string()
}

/// Strip markdown code fences the model sometimes wraps JSON in.
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Chat-completions adapter for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenBiError::Llm(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn call_chat(&self, model: &str, system: &str, user: &str) -> Result<String> {
        if self.api_key == DUMMY_API_KEY {
            return Ok(canned_completion(system, user));
        }

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.1,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenBiError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenBiError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenBiError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(GenBiError::Llm(format!("LLM API error: {}", error)));
        }

        let content = response_json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| {
                GenBiError::Llm(format!("No content in LLM response: {}", response_json))
            })?;
        debug!("LLM returned {} chars", content.len());
        Ok(content.to_string())
    }
}

/// Deterministic stand-in responses keyed on the prompt, for tests and
/// offline runs.
fn canned_completion(system: &str, user: &str) -> String {
    if system.contains("rewrite") {
        let last = user.lines().last().unwrap_or(user);
        return format!(r#"{{"intent": "none", "query": "{}"}}"#, last.trim());
    }
    if system.contains("Classify") {
        return r#"{"intent": "normal_search", "slots": []}"#.to_string();
    }
    if system.contains("sub-questions") {
        return r#"["canned sub-question"]"#.to_string();
    }
    if system.contains("[generate]") {
        return "[generate]What changed last month?[generate]Which segment grew fastest?"
            .to_string();
    }
    if system.contains("<sql>") {
        return "<sql>SELECT 1</sql>\nCanned statement.".to_string();
    }
    "canned response".to_string()
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn rewrite_query(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
        history: &[String],
    ) -> Result<QueryRewriteOutcome> {
        let system = prompt_or(prompt_map, "rewrite_prompt", DEFAULT_REWRITE_PROMPT);
        let user = format!("History:\n{}\nQuestion:\n{}", history.join("\n"), query);
        let raw = self.call_chat(model_id, &system, &user).await?;
        let outcome: QueryRewriteOutcome = serde_json::from_str(strip_code_fences(&raw))
            .map_err(|e| {
                GenBiError::Llm(format!("Failed to parse rewrite response: {}. Response: {}", e, raw))
            })?;
        Ok(outcome)
    }

    async fn classify_intent(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<IntentClassification> {
        let system = prompt_or(prompt_map, "intent_prompt", DEFAULT_INTENT_PROMPT);
        let raw = self.call_chat(model_id, &system, query).await?;
        let classification: IntentClassification = serde_json::from_str(strip_code_fences(&raw))
            .map_err(|e| {
                GenBiError::Llm(format!("Failed to parse intent response: {}. Response: {}", e, raw))
            })?;
        Ok(classification)
    }

    async fn generate_sql(
        &self,
        model_id: &str,
        schema: &serde_json::Value,
        hints: &str,
        prompt_map: &PromptMap,
        query: &str,
        examples: &[ExampleHit],
        entities: &[EntityHit],
        dialect: &str,
    ) -> Result<String> {
        let system = prompt_or(prompt_map, "sql_prompt", DEFAULT_SQL_PROMPT);
        let mut user = format!("Dialect: {}\nTables:\n{}\n", dialect, schema);
        if !hints.is_empty() {
            user.push_str(&format!("Hints:\n{}\n", hints));
        }
        if !entities.is_empty() {
            user.push_str("Known entities:\n");
            for entity in entities {
                user.push_str(&format!("- {}: {}\n", entity.entity, entity.comment));
            }
        }
        if !examples.is_empty() {
            user.push_str("Examples:\n");
            for example in examples {
                user.push_str(&format!("Q: {}\nSQL: {}\n", example.text, example.sql));
            }
        }
        user.push_str(&format!("Question:\n{}", query));
        self.call_chat(model_id, &system, &user).await
    }

    async fn analyze_data(
        &self,
        model_id: &str,
        prompt_map: &PromptMap,
        query: &str,
        json_rows: &str,
    ) -> Result<String> {
        let system = prompt_or(prompt_map, "analyze_prompt", DEFAULT_ANALYZE_PROMPT);
        let user = format!("Question:\n{}\nRows:\n{}", query, json_rows);
        self.call_chat(model_id, &system, &user).await
    }

    async fn answer_knowledge_question(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<String> {
        let system = prompt_or(prompt_map, "knowledge_prompt", DEFAULT_KNOWLEDGE_PROMPT);
        self.call_chat(model_id, &system, query).await
    }

    async fn decompose_task(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<Vec<String>> {
        let system = prompt_or(prompt_map, "decompose_prompt", DEFAULT_DECOMPOSE_PROMPT);
        let raw = self.call_chat(model_id, &system, query).await?;
        let cleaned = strip_code_fences(&raw);
        // Models occasionally ignore the JSON instruction and return one
        // sub-question per line.
        match serde_json::from_str::<Vec<String>>(cleaned) {
            Ok(tasks) => Ok(tasks),
            Err(_) => Ok(cleaned
                .lines()
                .map(|l| l.trim().trim_start_matches('-').trim().to_string())
                .filter(|l| !l.is_empty())
                .collect()),
        }
    }

    async fn suggest_questions(
        &self,
        model_id: &str,
        query: &str,
        prompt_map: &PromptMap,
    ) -> Result<String> {
        let system = prompt_or(prompt_map, "suggestion_prompt", DEFAULT_SUGGEST_PROMPT);
        self.call_chat(model_id, &system, query).await
    }
}
