//! Sessions for the web front end, keyed by session id
//!
//! Each session sits behind its own async mutex so requests for the same
//! session run one at a time while different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::SessionOrchestrator;
use crate::Result;
use crate::config::SessionSettings;
use crate::dialogue::{CompletionService, DialogueEngine};
use crate::voice::ResponseSynthesizer;

/// Shared handle to one session's orchestrator
pub type SessionHandle = Arc<Mutex<SessionOrchestrator>>;

/// Builds orchestrators with the process-wide collaborators
#[derive(Clone)]
pub struct SessionFactory {
    settings: Arc<SessionSettings>,
    service: Arc<dyn CompletionService>,
    synthesizer: ResponseSynthesizer,
}

impl SessionFactory {
    #[must_use]
    pub fn new(
        settings: Arc<SessionSettings>,
        service: Arc<dyn CompletionService>,
        synthesizer: ResponseSynthesizer,
    ) -> Self {
        Self {
            settings,
            service,
            synthesizer,
        }
    }

    /// Settings every session is created with
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Create an orchestrator for `session_id`
    ///
    /// # Errors
    ///
    /// Returns error if the configured wake word is unusable
    pub fn create(&self, session_id: &str) -> Result<SessionOrchestrator> {
        let dialogue = DialogueEngine::from_settings(Arc::clone(&self.service), &self.settings);
        SessionOrchestrator::new(
            session_id,
            Arc::clone(&self.settings),
            dialogue,
            self.synthesizer.clone(),
        )
    }
}

/// Live sessions with idle expiry
pub struct SessionTable {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    factory: SessionFactory,
    idle_timeout: Duration,
}

impl SessionTable {
    #[must_use]
    pub fn new(factory: SessionFactory, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            idle_timeout,
        }
    }

    /// Look up a session, creating it if it does not exist
    ///
    /// # Errors
    ///
    /// Returns error if a new orchestrator cannot be built
    pub async fn get_or_create(&self, session_id: &str) -> Result<SessionHandle> {
        self.sweep().await;

        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return Ok(Arc::clone(handle));
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(session_id) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(Mutex::new(self.factory.create(session_id)?));
        sessions.insert(session_id.to_string(), Arc::clone(&handle));
        tracing::debug!(session_id, active = sessions.len(), "session created");
        Ok(handle)
    }

    /// Look up an existing session
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sweep().await;
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session and its context; returns whether it existed
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id, "session removed");
        }
        removed
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove sessions that have exited or been idle too long
    ///
    /// Sessions currently handling a request are never removed.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| {
            handle.try_lock().map_or(true, |orch| {
                let idle = now.saturating_duration_since(orch.state().last_activity());
                !orch.phase().is_terminal() && idle < self.idle_timeout
            })
        });

        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, active = sessions.len(), "expired sessions removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::dialogue::Prompt;

    struct Silent;

    #[async_trait]
    impl CompletionService for Silent {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            Ok("ok".to_string())
        }
    }

    fn table(idle: Duration) -> SessionTable {
        let factory = SessionFactory::new(
            Arc::new(SessionSettings::default()),
            Arc::new(Silent),
            ResponseSynthesizer::text_only(),
        );
        SessionTable::new(factory, idle)
    }

    #[tokio::test]
    async fn same_id_same_session() {
        let table = table(Duration::from_secs(60));
        let a = table.get_or_create("abc").await.unwrap();
        let b = table.get_or_create("abc").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len().await, 1);
        assert!(table.remove("abc").await);
        assert!(table.is_empty().await);
        assert!(!table.remove("abc").await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept() {
        let table = table(Duration::from_secs(60));
        table.get_or_create("old").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        table.get_or_create("new").await.unwrap();

        assert!(table.get("old").await.is_none());
        assert!(table.get("new").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_sessions_survive_sweep() {
        let table = table(Duration::from_secs(60));
        let handle = table.get_or_create("busy").await.unwrap();
        let _guard = handle.lock().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        table.sweep().await;

        assert_eq!(table.len().await, 1);
    }
}
