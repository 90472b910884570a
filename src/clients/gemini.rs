use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::clients::analysis::{build_analysis_prompt, parse_analysis};
use crate::clients::traits::{AiProvider, AnalysisRequest, AnalysisResult, ProviderError};
use crate::utils::json::{parse_json_object, strip_ansi_codes, truncate_chars};

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_MODEL: &str = "auto";
const DEFAULT_MAX_OUTPUT_BYTES: usize = 512 * 1024;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    response: String,
}

/// AI provider backed by the `gemini` CLI in one-shot JSON output mode.
#[derive(Debug, Clone)]
pub struct GeminiCliProvider {
    binary: String,
    model: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for GeminiCliProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiCliProvider {
    pub fn new() -> Self {
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_ms = std::env::var("GEMINI_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self {
            binary: "gemini".to_string(),
            model,
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn from_config(cfg: &crate::config::AiConfig) -> Self {
        Self {
            binary: "gemini".to_string(),
            model: cfg.model.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
            max_output_bytes: cfg.max_output_bytes,
        }
    }

    /// Override the executable, mainly for wrappers and tests
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut cmd = Command::new(&self.binary);
        cmd.kill_on_drop(true)
            .env("CI", "true")
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg("-y");
        // Auto-routing: if model is "auto", omit the -m flag
        if self.model != "auto" && !self.model.is_empty() {
            cmd.arg("-m").arg(&self.model);
        }
        cmd.arg("-o").arg("json").arg(prompt);

        let child = cmd.spawn().map_err(map_spawn_err)?;
        let timeout_ms = self.timeout.as_millis() as u64;
        let out = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProviderError::Timeout { timeout_ms })?
            .map_err(|e| ProviderError::Request(format!("wait error: {}", e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ProviderError::Request(format!(
                "gemini exit {}: {}",
                out.status,
                truncate_chars(stderr.trim(), 500)
            )));
        }

        let mut stdout = out.stdout;
        if stdout.len() > self.max_output_bytes {
            stdout.truncate(self.max_output_bytes);
        }
        let text = String::from_utf8_lossy(&stdout);
        let response = match parse_json_object::<GeminiResponse>(&text) {
            Ok(parsed) if !parsed.response.trim().is_empty() => parsed.response,
            // Plain-text output (older CLIs or -o text)
            _ => strip_ansi_codes(&text),
        };
        let response = response.trim().to_string();
        if response.is_empty() {
            return Err(ProviderError::Parse(
                "empty Gemini response: no content captured".to_string(),
            ));
        }

        tracing::debug!(
            "Gemini call completed: {} bytes output, model={}",
            response.len(),
            self.model
        );
        Ok(response)
    }
}

#[async_trait]
impl AiProvider for GeminiCliProvider {
    async fn generate_response(&self, prompt: &str) -> Result<String, ProviderError> {
        self.run(prompt).await
    }

    async fn analyze_query_result(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, ProviderError> {
        let prompt = build_analysis_prompt(&request);
        let text = self.run(&prompt).await?;
        parse_analysis(&text)
    }
}

fn map_spawn_err(err: std::io::Error) -> ProviderError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ProviderError::Unavailable
    } else {
        ProviderError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_maps_to_unavailable() {
        let provider = GeminiCliProvider::new().with_binary("definitely-not-a-gemini-binary");
        let err = provider.generate_response("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable));
    }
}
