// ============================
// crates/backend-lib/src/auth.rs
// ============================
//! Auth collaborator seam.
//!
//! Credential verification is owned by the surrounding platform; this
//! core is handed an opaque token at subscribe time and trusts the
//! identity the collaborator resolves it to.
use async_trait::async_trait;
use dashmap::DashMap;
use livedeck_common::SpeakerId;

/// Resolves a presented speaker token to a verified identity.
#[async_trait]
pub trait SpeakerAuth: Send + Sync {
    /// `None` means the token is invalid or expired.
    async fn verify_speaker(&self, token: &str) -> Option<SpeakerId>;
}

/// Fixed token-to-speaker mapping, for tests and the demo binary.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: DashMap<String, SpeakerId>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, speaker: SpeakerId) {
        self.tokens.insert(token.into(), speaker);
    }
}

#[async_trait]
impl SpeakerAuth for StaticTokenAuth {
    async fn verify_speaker(&self, token: &str) -> Option<SpeakerId> {
        self.tokens.get(token).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_static_token_auth() {
        let auth = StaticTokenAuth::new();
        let speaker = Uuid::new_v4();
        auth.register("secret", speaker);

        assert_eq!(auth.verify_speaker("secret").await, Some(speaker));
        assert_eq!(auth.verify_speaker("wrong").await, None);
    }
}
