use serde::{Deserialize, Serialize};

use crate::error::{InvestigationError, Result};

/// Main configuration structure loaded from investigator.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub investigation: InvestigationConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Orchestration tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvestigationConfig {
    /// Row count above which evidence is tagged critical
    pub critical_row_threshold: usize,
    /// Row count above which evidence is tagged important
    pub important_row_threshold: usize,
    /// Plans estimated longer than this get an advisory suggestion from the validator
    pub advisory_max_plan_seconds: u64,
    pub default_language: String,
    pub default_max_execution_secs: Option<u64>,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            critical_row_threshold: 1000,
            important_row_threshold: 100,
            advisory_max_plan_seconds: 1800,
            default_language: "en".to_string(),
            default_max_execution_secs: None,
        }
    }
}

/// AI reasoning adapter selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// "gemini_cli" or "openai"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini_cli".to_string(),
            model: "auto".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_ms: 120_000,
            max_output_bytes: 512 * 1024,
        }
    }
}

/// Telemetry backend connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub username: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/query".to_string(),
            timeout_ms: 30_000,
            username: None,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub ai_api_key: Option<String>,
    pub telemetry_token: Option<String>,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ai_api_key: None,
            telemetry_token: None,
            log_level: "telemetry_investigator=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            ai_api_key: std::env::var("INVESTIGATOR_AI_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            telemetry_token: std::env::var("INVESTIGATOR_TELEMETRY_TOKEN").ok(),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "telemetry_investigator=info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            investigation: InvestigationConfig::default(),
            ai: AiConfig::default(),
            telemetry: TelemetryConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses INVESTIGATOR_CONFIG or defaults to "investigator.toml".
    pub fn load() -> Result<Self> {
        crate::load_env();

        let config_path = std::env::var("INVESTIGATOR_CONFIG")
            .unwrap_or_else(|_| "investigator.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load `config_path` (defaults if missing), then apply env overrides.
    ///
    /// Emits its warnings through `tracing`, so install the subscriber first.
    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut config = match std::fs::read_to_string(config_path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(_) => {
                tracing::warn!("Config file {} not found, using defaults", config_path);
                Self::default()
            }
        };

        // Env-first overrides
        if let Ok(provider) = std::env::var("INVESTIGATOR_AI_PROVIDER") {
            config.ai.provider = provider;
        }
        if let Ok(model) = std::env::var("INVESTIGATOR_AI_MODEL") {
            config.ai.model = model;
        }
        if let Ok(endpoint) = std::env::var("INVESTIGATOR_TELEMETRY_ENDPOINT") {
            tracing::debug!("INVESTIGATOR_TELEMETRY_ENDPOINT env override applied");
            config.telemetry.endpoint = endpoint;
        }

        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.runtime = RuntimeConfig::default();
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let inv = &self.investigation;
        if inv.important_row_threshold >= inv.critical_row_threshold {
            return Err(InvestigationError::Config {
                message: format!(
                    "important_row_threshold ({}) must be below critical_row_threshold ({})",
                    inv.important_row_threshold, inv.critical_row_threshold
                ),
            });
        }
        if self.ai.timeout_ms == 0 || self.telemetry.timeout_ms == 0 {
            return Err(InvestigationError::Config {
                message: "timeouts must be greater than zero".to_string(),
            });
        }
        match self.ai.provider.as_str() {
            "gemini_cli" | "openai" => {}
            other => tracing::warn!("Unknown AI provider '{}', requests will fail", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.investigation.critical_row_threshold, 1000);
        assert_eq!(config.investigation.important_row_threshold, 100);
        assert_eq!(config.investigation.advisory_max_plan_seconds, 1800);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [ai]
            provider = "openai"
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.timeout_ms, 120_000);
        assert_eq!(config.telemetry.timeout_ms, 30_000);
        assert_eq!(config.investigation.default_language, "en");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = Config::default();
        config.investigation.important_row_threshold = 5000;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, InvestigationError::Config { .. }));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_file_warning_reaches_installed_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            Config::load_from("/nonexistent/investigator.toml")
        })
        .unwrap();

        assert_eq!(config.investigation.critical_row_threshold, 1000);
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(
            logs.contains("Config file /nonexistent/investigator.toml not found"),
            "{}",
            logs
        );
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Config::from_toml_str("[ai\nprovider=").unwrap_err();
        assert!(matches!(err, InvestigationError::Config { .. }));
    }
}
