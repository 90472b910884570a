use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::clients::analysis::{build_analysis_prompt, parse_analysis};
use crate::clients::traits::{AiProvider, AnalysisRequest, AnalysisResult, ProviderError};

const SYSTEM_PROMPT: &str = "You are a careful site-reliability assistant. \
     Only reason from the data you are given. When asked for JSON, respond with a single JSON object.";

/// AI provider speaking the OpenAI `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_ms: u64,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProviderError::Request(format!("build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_ms,
        })
    }

    pub fn from_config(cfg: &crate::config::Config) -> Result<Self, ProviderError> {
        let api_key = cfg
            .runtime
            .ai_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::Unavailable)?;
        Self::new(&cfg.ai.base_url, &cfg.ai.model, api_key, cfg.ai.timeout_ms)
    }

    async fn chat(&self, prompt: &str, json_mode: bool) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.2,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ProviderError::Request(format!("chat send: {}", e))
                }
            })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!("{}: {}", status, text)));
        }
        let v: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("chat response json: {}", e)))?;
        v["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Parse("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatProvider {
    async fn generate_response(&self, prompt: &str) -> Result<String, ProviderError> {
        self.chat(prompt, true).await
    }

    async fn analyze_query_result(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, ProviderError> {
        let text = self.chat(&build_analysis_prompt(&request), true).await?;
        parse_analysis(&text)
    }
}
