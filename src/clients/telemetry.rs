use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::clients::traits::{DataSourceProvider, ProviderError, QueryResult};

/// Telemetry backend reached over HTTP: POST `{"query": ...}`, receive `{columns, rows}`.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    client: Client,
    endpoint: String,
    username: Option<String>,
    token: Option<String>,
    timeout_ms: u64,
}

impl HttpTelemetrySource {
    pub fn from_config(cfg: &crate::config::Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.telemetry.timeout_ms))
            .user_agent(format!(
                "telemetry-investigator/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ProviderError::Request(format!("build http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: cfg.telemetry.endpoint.clone(),
            username: cfg.telemetry.username.clone(),
            token: cfg.runtime.telemetry_token.clone(),
            timeout_ms: cfg.telemetry.timeout_ms,
        })
    }
}

#[async_trait]
impl DataSourceProvider for HttpTelemetrySource {
    async fn execute_query(&self, query: &str) -> Result<QueryResult, ProviderError> {
        let started = std::time::Instant::now();
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&json!({ "query": query }));
        req = match (&self.username, &self.token) {
            (Some(user), token) => req.basic_auth(user, token.as_ref()),
            (None, Some(token)) => req.bearer_auth(token),
            (None, None) => req,
        };

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ProviderError::Request(e.to_string())
            }
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "telemetry backend returned {}: {}",
                status, body
            )));
        }
        let mut result: QueryResult = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("telemetry response: {}", e)))?;
        if result.execution_time_ms == 0 {
            result.execution_time_ms = started.elapsed().as_millis() as u64;
        }
        tracing::debug!(
            rows = result.row_count(),
            elapsed_ms = result.execution_time_ms,
            "telemetry query executed"
        );
        Ok(result)
    }
}
