// ============================
// crates/backend-lib/src/store.rs
// ============================
//! Storage collaborator for decks and responses.
//!
//! Persistence proper (relational schema, migrations) lives outside
//! this core; the trait below is the seam it talks through. The
//! in-memory implementation backs tests and the demo binary.
use crate::error::AppError;
use async_trait::async_trait;
use livedeck_common::{Response, SessionId, Slide, SlideId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for the external question/slide/response store.
#[async_trait]
pub trait DeckStore: Send + Sync {
    /// All slides of a presentation, ordered by `order_index`.
    async fn get_deck(&self, presentation_id: Uuid) -> Result<Vec<Slide>, AppError>;

    /// Look up a single slide.
    async fn get_slide(&self, slide_id: SlideId) -> Result<Slide, AppError>;

    /// Persist a stored response (vote, answer or question).
    async fn persist_response(&self, response: &Response) -> Result<(), AppError>;

    /// All persisted responses for (session, slide).
    async fn get_responses(
        &self,
        session_id: SessionId,
        slide_id: SlideId,
    ) -> Result<Vec<Response>, AppError>;
}

#[derive(Default)]
struct StoreInner {
    decks: HashMap<Uuid, Vec<Slide>>,
    responses: Vec<Response>,
}

/// In-memory implementation of the `DeckStore` trait.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a presentation deck. Slides are kept sorted by
    /// `order_index`.
    pub async fn add_presentation(&self, presentation_id: Uuid, mut slides: Vec<Slide>) {
        slides.sort_by_key(|slide| slide.order_index);
        self.inner.write().await.decks.insert(presentation_id, slides);
    }

    pub async fn response_count(&self) -> usize {
        self.inner.read().await.responses.len()
    }
}

#[async_trait]
impl DeckStore for InMemoryStore {
    async fn get_deck(&self, presentation_id: Uuid) -> Result<Vec<Slide>, AppError> {
        self.inner
            .read()
            .await
            .decks
            .get(&presentation_id)
            .cloned()
            .ok_or(AppError::SessionNotFound)
    }

    async fn get_slide(&self, slide_id: SlideId) -> Result<Slide, AppError> {
        self.inner
            .read()
            .await
            .decks
            .values()
            .flatten()
            .find(|slide| slide.id == slide_id)
            .cloned()
            .ok_or(AppError::SlideNotFound)
    }

    async fn persist_response(&self, response: &Response) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        // Upsert semantics mirror the aggregation engine: one non-AI
        // row per (participant, slide).
        if let Some(pid) = response.participant_id {
            if !response.is_ai_response {
                inner.responses.retain(|r| {
                    r.is_ai_response
                        || r.participant_id != Some(pid)
                        || r.slide_id != response.slide_id
                        || r.session_id != response.session_id
                });
            }
        }
        inner.responses.push(response.clone());
        Ok(())
    }

    async fn get_responses(
        &self,
        session_id: SessionId,
        slide_id: SlideId,
    ) -> Result<Vec<Response>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .responses
            .iter()
            .filter(|r| r.session_id == session_id && r.slide_id == slide_id)
            .cloned()
            .collect())
    }
}
