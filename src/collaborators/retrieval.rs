//! Example Retrieval Collaborator
//!
//! Pulls few-shot SQL examples and named-entity descriptions from a search
//! index, filtered to the active data profile.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{GenBiError, Result};
use crate::profile::RetrievalConfig;

/// A retrieved named entity with its curator comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHit {
    pub score: f64,
    pub entity: String,
    #[serde(default)]
    pub comment: String,
}

/// A retrieved question/SQL example pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleHit {
    pub score: f64,
    pub text: String,
    #[serde(default)]
    pub sql: String,
}

#[async_trait]
pub trait ExampleRetriever: Send + Sync {
    /// Look up recognized entity slots in the NER index.
    async fn retrieve_entities(
        &self,
        slots: &[String],
        config: &RetrievalConfig,
        profile: &str,
    ) -> Result<Vec<EntityHit>>;

    /// Find the closest question/SQL pairs to the rewritten query.
    async fn retrieve_examples(
        &self,
        query: &str,
        config: &RetrievalConfig,
        profile: &str,
    ) -> Result<Vec<ExampleHit>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    hits: SearchHits<T>,
}

#[derive(Debug, Deserialize)]
struct SearchHits<T> {
    #[serde(default = "Vec::new")]
    hits: Vec<SearchHit<T>>,
}

#[derive(Debug, Deserialize)]
struct SearchHit<T> {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: T,
}

#[derive(Debug, Deserialize)]
struct EntityDoc {
    entity: String,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct ExampleDoc {
    text: String,
    #[serde(default)]
    sql: String,
}

fn to_entity_hits(response: SearchResponse<EntityDoc>) -> Vec<EntityHit> {
    response
        .hits
        .hits
        .into_iter()
        .map(|hit| EntityHit {
            score: hit.score.unwrap_or(0.0),
            entity: hit.source.entity,
            comment: hit.source.comment,
        })
        .collect()
}

fn to_example_hits(response: SearchResponse<ExampleDoc>) -> Vec<ExampleHit> {
    response
        .hits
        .hits
        .into_iter()
        .map(|hit| ExampleHit {
            score: hit.score.unwrap_or(0.0),
            text: hit.source.text,
            sql: hit.source.sql,
        })
        .collect()
}

/// OpenSearch adapter over the plain `_search` API.
#[derive(Clone)]
pub struct OpenSearchRetriever {
    client: Client,
}

impl OpenSearchRetriever {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GenBiError::Retrieval(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn search(
        &self,
        config: &RetrievalConfig,
        index: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}:{}/{}/_search", config.host.trim_end_matches('/'), config.port, index);
        let response = self
            .client
            .post(&url)
            .basic_auth(&config.username, Some(&config.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenBiError::Retrieval(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenBiError::Retrieval(format!(
                "Search on '{}' failed with status {}: {}",
                index, status, text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| GenBiError::Retrieval(format!("Failed to parse search response: {}", e)))
    }
}

#[async_trait]
impl ExampleRetriever for OpenSearchRetriever {
    async fn retrieve_entities(
        &self,
        slots: &[String],
        config: &RetrievalConfig,
        profile: &str,
    ) -> Result<Vec<EntityHit>> {
        let mut hits = Vec::new();
        for slot in slots {
            let body = serde_json::json!({
                "size": config.top_k,
                "query": {
                    "bool": {
                        "must": [{"match": {"entity": slot}}],
                        "filter": [{"term": {"data_profile.keyword": profile}}]
                    }
                }
            });
            let raw = self.search(config, &config.ner_index, body).await?;
            let response: SearchResponse<EntityDoc> = serde_json::from_value(raw)
                .map_err(|e| GenBiError::Retrieval(format!("Bad entity hit shape: {}", e)))?;
            hits.extend(to_entity_hits(response));
        }
        debug!("Retrieved {} entity hits for {} slots", hits.len(), slots.len());
        Ok(hits)
    }

    async fn retrieve_examples(
        &self,
        query: &str,
        config: &RetrievalConfig,
        profile: &str,
    ) -> Result<Vec<ExampleHit>> {
        let body = serde_json::json!({
            "size": config.top_k,
            "query": {
                "bool": {
                    "must": [{"match": {"text": query}}],
                    "filter": [{"term": {"data_profile.keyword": profile}}]
                }
            }
        });
        let raw = self.search(config, &config.sql_index, body).await?;
        let response: SearchResponse<ExampleDoc> = serde_json::from_value(raw)
            .map_err(|e| GenBiError::Retrieval(format!("Bad example hit shape: {}", e)))?;
        let hits = to_example_hits(response);
        debug!("Retrieved {} example hits", hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_search_hits_to_example_pairs() {
        let raw = serde_json::json!({
            "hits": {
                "hits": [
                    {"_score": 2.5, "_source": {"text": "revenue by month", "sql": "SELECT 1"}},
                    {"_score": 1.0, "_source": {"text": "orders by region"}}
                ]
            }
        });
        let response: SearchResponse<ExampleDoc> = serde_json::from_value(raw).unwrap();
        let hits = to_example_hits(response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "revenue by month");
        assert_eq!(hits[0].sql, "SELECT 1");
        assert_eq!(hits[1].sql, "");
    }

    #[test]
    fn missing_hits_array_means_no_results() {
        let raw = serde_json::json!({"hits": {}});
        let response: SearchResponse<EntityDoc> = serde_json::from_value(raw).unwrap();
        assert!(to_entity_hits(response).is_empty());
    }
}
