//! Collaborator interfaces and the concrete adapters shipped with the crate

pub mod analysis;
pub mod gemini;
pub mod openai;
pub mod session;
pub mod telemetry;
pub mod traits;

use std::sync::Arc;

pub use gemini::GeminiCliProvider;
pub use openai::OpenAiCompatProvider;
pub use session::InMemorySessionManager;
pub use telemetry::HttpTelemetrySource;
pub use traits::{
    AiProvider, AnalysisRequest, AnalysisResult, AnalysisType, Column, DataSourceProvider,
    ProviderError, QueryResult, SessionManager, SessionOptions,
};

/// Build the AI provider named in configuration.
pub fn create_ai_provider(
    cfg: &crate::config::Config,
) -> Result<Arc<dyn AiProvider>, ProviderError> {
    match cfg.ai.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatProvider::from_config(cfg)?)),
        "gemini_cli" => Ok(Arc::new(GeminiCliProvider::from_config(&cfg.ai))),
        other => {
            tracing::error!("Unknown AI provider '{}'", other);
            Err(ProviderError::Unavailable)
        }
    }
}
