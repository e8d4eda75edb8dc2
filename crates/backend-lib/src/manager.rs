// ============================
// crates/backend-lib/src/manager.rs
// ============================
//! Registry of live session actors.
//!
//! Lookups go through concurrent maps; everything stateful about a
//! session lives behind its actor handle.
use crate::ai::AnswerGenerator;
use crate::codes::CodeRegistry;
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::SESSION_CREATED;
use crate::session::Session;
use crate::session_actor::{spawn_session_actor, SessionHandle};
use crate::store::DeckStore;
use dashmap::DashMap;
use livedeck_common::SessionId;
use metrics::counter;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct SessionManager<S> {
    sessions: DashMap<SessionId, SessionHandle>,
    by_code: DashMap<String, SessionId>,
    codes: CodeRegistry,
    store: S,
    generator: Arc<dyn AnswerGenerator>,
    settings: Arc<Settings>,
}

impl<S> SessionManager<S>
where
    S: DeckStore + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, generator: Arc<dyn AnswerGenerator>, settings: Arc<Settings>) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            by_code: DashMap::new(),
            codes: CodeRegistry::new(),
            store,
            generator,
            settings,
        }
    }

    /// Open a new live session for `presentation_id` and spawn its
    /// actor. The join code is unique among non-ended sessions.
    pub async fn create_session(&self, presentation_id: Uuid) -> Result<SessionHandle, AppError> {
        let deck = self.store.get_deck(presentation_id).await?;
        let code = self.codes.reserve(self.settings.join_code_attempts)?;

        let session = Session::new(presentation_id, code.clone());
        let handle = spawn_session_actor(
            session,
            deck,
            self.store.clone(),
            self.generator.clone(),
            self.settings.ai_timeout(),
        );

        self.by_code.insert(code.clone(), handle.session_id);
        self.sessions.insert(handle.session_id, handle.clone());
        counter!(SESSION_CREATED).increment(1);
        info!(session_id = %handle.session_id, join_code = %code, "session created");
        Ok(handle)
    }

    pub fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&session_id).map(|entry| entry.clone())
    }

    /// Resolve a join code, case-insensitively, to a live session.
    pub fn lookup(&self, code: &str) -> Option<SessionHandle> {
        let code = code.trim().to_ascii_uppercase();
        let session_id = *self.by_code.get(&code)?;
        self.get(session_id)
    }

    /// Retire an ended session: drop the actor handle and free its
    /// join code for reuse. Idempotent.
    pub fn finish(&self, session_id: SessionId) {
        let Some((_, handle)) = self.sessions.remove(&session_id) else {
            return;
        };
        self.by_code.remove(&handle.join_code);
        self.codes.release(&handle.join_code);
        info!(session_id = %session_id, join_code = %handle.join_code, "session retired");
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::EchoGenerator;
    use crate::store::InMemoryStore;
    use livedeck_common::{Slide, SlideKind};

    async fn manager() -> (SessionManager<InMemoryStore>, Uuid) {
        let store = InMemoryStore::new();
        let presentation_id = Uuid::new_v4();
        store
            .add_presentation(
                presentation_id,
                vec![Slide {
                    id: Uuid::new_v4(),
                    order_index: 0,
                    kind: SlideKind::Content {
                        text: "hi".to_string(),
                        image_url: None,
                    },
                }],
            )
            .await;
        let manager = SessionManager::new(
            store,
            Arc::new(EchoGenerator),
            Arc::new(Settings::default()),
        );
        (manager, presentation_id)
    }

    #[tokio::test]
    async fn test_create_and_lookup_case_insensitive() {
        let (manager, presentation_id) = manager().await;
        let handle = manager.create_session(presentation_id).await.unwrap();
        assert_eq!(handle.join_code.len(), 6);

        let lower = handle.join_code.to_ascii_lowercase();
        let found = manager.lookup(&format!("  {lower} ")).unwrap();
        assert_eq!(found.session_id, handle.session_id);
    }

    #[tokio::test]
    async fn test_unknown_presentation_rejected() {
        let (manager, _) = manager().await;
        assert!(manager.create_session(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_finish_frees_the_code() {
        let (manager, presentation_id) = manager().await;
        let handle = manager.create_session(presentation_id).await.unwrap();
        assert_eq!(manager.session_count(), 1);

        manager.finish(handle.session_id);
        assert_eq!(manager.session_count(), 0);
        assert!(manager.lookup(&handle.join_code).is_none());
        // twice is fine
        manager.finish(handle.session_id);
    }

    #[tokio::test]
    async fn test_codes_are_unique_across_live_sessions() {
        let (manager, presentation_id) = manager().await;
        let a = manager.create_session(presentation_id).await.unwrap();
        let b = manager.create_session(presentation_id).await.unwrap();
        assert_ne!(a.join_code, b.join_code);
    }
}
