//! Turn Log Collaborator
//!
//! Persists one entry per completed turn for audit and replay. The bundled
//! adapter keeps a bounded in-memory window and appends JSONL to a file when
//! one is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::answer::Answer;
use crate::context::ProcessingContext;
use crate::error::Result;
use crate::state_machine::QueryState;

/// One processed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnLogEntry {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub query: String,
    pub query_intent: String,
    pub sql: String,
    pub final_state: QueryState,
    pub elapsed_ms: u64,
}

impl TurnLogEntry {
    pub fn record(
        context: &ProcessingContext,
        answer: &Answer,
        final_state: QueryState,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id: context.session_id.clone(),
            user_id: context.user_id.clone(),
            query: context.search_box.clone(),
            query_intent: answer.query_intent.clone(),
            sql: answer.sql_search_result.sql.clone(),
            final_state,
            elapsed_ms,
        }
    }
}

#[async_trait]
pub trait TurnLogStore: Send + Sync {
    async fn log_turn(&self, entry: &TurnLogEntry) -> Result<()>;
}

/// Append-only JSONL log with a bounded in-memory window.
pub struct JsonlTurnLog {
    log_file: Option<PathBuf>,
    recent: Mutex<Vec<TurnLogEntry>>,
    max_in_memory: usize,
}

impl JsonlTurnLog {
    pub fn new(log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            log_file,
            recent: Mutex::new(Vec::new()),
            max_in_memory,
        }
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<TurnLogEntry> {
        let recent = self.recent.lock().unwrap();
        recent.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for JsonlTurnLog {
    fn default() -> Self {
        Self::new(None, 1000)
    }
}

#[async_trait]
impl TurnLogStore for JsonlTurnLog {
    async fn log_turn(&self, entry: &TurnLogEntry) -> Result<()> {
        {
            let mut recent = self.recent.lock().unwrap();
            recent.push(entry.clone());
            if recent.len() > self.max_in_memory {
                recent.remove(0);
            }
        }

        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json)?;
        }
        Ok(())
    }
}
