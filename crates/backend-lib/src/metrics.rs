// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_ENDED: &str = "session.ended";
pub const PARTICIPANT_JOINED: &str = "participant.joined";
pub const PARTICIPANT_LIVE: &str = "participant.live";
pub const RESPONSE_ACCEPTED: &str = "response.accepted";
pub const RESPONSE_REJECTED: &str = "response.rejected";
pub const AI_REQUEST: &str = "ai.request";
pub const AI_FAILED: &str = "ai.failed";
