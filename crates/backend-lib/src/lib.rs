// crates/backend-lib/src/lib.rs
pub mod aggregate;
pub mod ai;
pub mod auth;
pub mod codes;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod roster;
pub mod session;
pub mod session_actor;
pub mod store;
pub mod ws_router;

pub use crate::ai::AnswerGenerator;
pub use crate::auth::SpeakerAuth;
pub use crate::config::Settings;
pub use crate::error::AppError;
pub use crate::manager::SessionManager;
pub use crate::session::Session;
pub use crate::session_actor::{SessionHandle, SessionStats};
pub use crate::store::{DeckStore, InMemoryStore};
pub use crate::ws_router::create_router;

use std::sync::Arc;

pub struct AppState<S> {
    pub sessions: Arc<SessionManager<S>>,
    pub auth: Arc<dyn SpeakerAuth>,
    pub settings: Arc<Settings>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            sessions: self.sessions.clone(),
            auth: self.auth.clone(),
            settings: self.settings.clone(),
        }
    }
}
