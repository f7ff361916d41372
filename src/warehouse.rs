//! Warehouse boundary: free-text SQL in, rectangular rows out.
//!
//! The warehouse is an external collaborator. Every failure mode (client
//! not configured, malformed query, transient backend error) surfaces as
//! the same opaque `AssistantError::Warehouse`; callers capture the text
//! and never retry or repair the query.

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Rectangular query result. Values stay as opaque JSON; no rounding or
/// unit conversion happens on this side of the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Row cap for the plain-text rendering handed to the synthesis prompt.
const RENDER_ROW_LIMIT: usize = 50;

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as a list of column-keyed objects for the HTTP response body.
    pub fn to_row_objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                serde_json::Value::Object(map)
            })
            .collect()
    }

    /// Deterministic pipe-delimited rendering: one header row, then data
    /// rows, `NULL` for nulls. Large results are truncated with an explicit
    /// trailer so the model never sees a silently clipped table.
    pub fn to_table_string(&self) -> String {
        let mut out = self.columns.join(" | ");
        out.push('\n');

        for row in self.rows.iter().take(RENDER_ROW_LIMIT) {
            let line = row.iter().map(render_value).join(" | ");
            out.push_str(&line);
            out.push('\n');
        }

        if self.rows.len() > RENDER_ROW_LIMIT {
            out.push_str(&format!(
                "... ({} more rows omitted)\n",
                self.rows.len() - RENDER_ROW_LIMIT
            ));
        }
        out
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute one query and return its rows, or fail opaquely.
    async fn run_query(&self, sql: &str) -> Result<QueryRows>;
}

/// Thin REST client for the warehouse query endpoint. Expects a JSON body
/// of the `QueryRows` shape back from `POST {endpoint}/query`.
pub struct HttpWarehouseClient {
    endpoint: Option<String>,
    http: reqwest::Client,
}

impl HttpWarehouseClient {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Warehouse for HttpWarehouseClient {
    async fn run_query(&self, sql: &str) -> Result<QueryRows> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            AssistantError::Warehouse("warehouse client is not configured".to_string())
        })?;

        let response = self
            .http
            .post(format!("{}/query", endpoint))
            .json(&serde_json::json!({ "query": sql }))
            .send()
            .await
            .map_err(|e| AssistantError::Warehouse(format!("query request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Warehouse(format!(
                "query failed with status {}: {}",
                status, body
            )));
        }

        response
            .json::<QueryRows>()
            .await
            .map_err(|e| AssistantError::Warehouse(format!("malformed result set: {}", e)))
    }
}
