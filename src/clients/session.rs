use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::clients::traits::{ProviderError, SessionManager, SessionOptions};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub options: SessionOptions,
    pub opened_at: DateTime<Utc>,
}

/// Process-local session manager.
#[derive(Debug, Default)]
pub struct InMemorySessionManager {
    sessions: DashMap<String, SessionInfo>,
}

impl InMemorySessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }
}

#[async_trait]
impl SessionManager for InMemorySessionManager {
    async fn create_session(&self, options: SessionOptions) -> Result<String, ProviderError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            SessionInfo {
                options,
                opened_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn end_session(&self, session_id: &str) -> Result<(), ProviderError> {
        // Ending an unknown session is a no-op
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_open_and_close() {
        let manager = InMemorySessionManager::new();
        let id = manager
            .create_session(SessionOptions {
                investigation_id: "inv-1".into(),
                language: "en".into(),
                interactive: false,
            })
            .await
            .unwrap();
        assert_eq!(manager.active_sessions(), 1);
        assert_eq!(manager.get(&id).unwrap().options.investigation_id, "inv-1");
        manager.end_session(&id).await.unwrap();
        manager.end_session(&id).await.unwrap();
        assert_eq!(manager.active_sessions(), 0);
    }
}
