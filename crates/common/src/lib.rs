// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `LiveDeck` clients and the server.
//! This module defines the WebSocket protocol messages and the domain
//! value types (slides, responses, tallies) they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier for one live run of a presentation.
pub type SessionId = Uuid;
/// Identifier for a slide within a presentation deck.
pub type SlideId = Uuid;
/// Identifier for one audience member's identity within a session.
pub type ParticipantId = Uuid;
/// Identifier for a single WebSocket connection.
pub type ConnectionId = Uuid;
/// Identifier for a stored response.
pub type ResponseId = Uuid;
/// Identifier for an audience question handed to the AI relay.
pub type QuestionId = Uuid;
/// Verified speaker identity supplied by the auth collaborator.
pub type SpeakerId = Uuid;
/// Identifier for one option of a multiple-choice slide.
pub type OptionId = String;

/// Lifecycle state of a session.
///
/// Transitions: `pending -> active <-> paused -> ended`, with `ended`
/// terminal. The current-slide pointer is non-null only while the
/// session is `active` or `paused`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// One option of a multiple-choice slide.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: OptionId,
    pub text: String,
}

/// The five slide kinds, each carrying its own content schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlideKind {
    /// Static content slide (markdown text, optional image).
    Content {
        text: String,
        image_url: Option<String>,
    },
    /// Free-text question for the audience.
    QuestionText {
        question: String,
        max_length: Option<usize>,
        required: bool,
    },
    /// Multiple-choice question for the audience.
    QuestionChoice {
        question: String,
        options: Vec<ChoiceOption>,
        allow_multiple: bool,
    },
    /// AI-generated summary slide.
    Summary {
        title: String,
        summary_text: Option<String>,
    },
    /// Closing slide with conclusions.
    Conclusion {
        title: String,
        conclusions: Vec<String>,
    },
}

impl SlideKind {
    /// Whether the audience may submit responses to this slide kind.
    pub fn accepts_responses(&self) -> bool {
        matches!(
            self,
            SlideKind::QuestionText { .. } | SlideKind::QuestionChoice { .. }
        )
    }
}

/// A slide within a presentation deck.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Slide {
    pub id: SlideId,
    /// Position in the deck (0-based).
    pub order_index: u32,
    #[serde(flatten)]
    pub kind: SlideKind,
}

/// Slide information as carried in outbound events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlideInfo {
    pub id: SlideId,
    pub order_index: u32,
    #[serde(flatten)]
    pub kind: SlideKind,
}

impl From<&Slide> for SlideInfo {
    fn from(slide: &Slide) -> Self {
        SlideInfo {
            id: slide.id,
            order_index: slide.order_index,
            kind: slide.kind.clone(),
        }
    }
}

/// Content payload of a submitted response. The shape must match the
/// kind of the slide it targets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseContent {
    /// Free-text answer to a `question_text` slide.
    Text { text: String },
    /// Selected option id(s) on a `question_choice` slide.
    Choice { option_ids: Vec<OptionId> },
    /// A question for the AI relay.
    Question { question_text: String },
}

/// One stored answer, vote or question.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Response {
    pub id: ResponseId,
    pub session_id: SessionId,
    pub slide_id: SlideId,
    /// Null for anonymous or AI-origin responses.
    pub participant_id: Option<ParticipantId>,
    pub content: ResponseContent,
    pub is_ai_response: bool,
    pub created_at: DateTime<Utc>,
}

/// Messages sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the session as an audience member.
    /// # Fields
    /// * `display_name` - optional name; absent means anonymous
    /// * `participant_token` - prior participant id, presented on
    ///   reconnect so the registry reopens the existing identity
    ///   instead of double counting
    Join {
        display_name: Option<String>,
        participant_token: Option<ParticipantId>,
    },
    /// Join the session as its speaker.
    /// # Fields
    /// * `token` - opaque credential checked by the auth collaborator
    JoinSpeaker { token: String },
    /// Submit a response to a question slide.
    SubmitResponse {
        slide_id: SlideId,
        content: ResponseContent,
    },
    /// Ask a question to be answered by the AI relay.
    AskQuestion {
        slide_id: SlideId,
        question_text: String,
    },
    /// Leave the session without dropping the socket.
    Leave,
    /// Speaker-originated: `pending -> active`.
    StartSession,
    /// Speaker-originated: `active -> paused`.
    PauseSession,
    /// Speaker-originated: `paused -> active`.
    ResumeSession,
    /// Speaker-originated: any non-ended state -> `ended`.
    EndSession,
    /// Speaker-originated: move the current-slide pointer.
    ChangeSlide { slide_id: SlideId },
    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full session snapshot, sent once on a successful join
    /// handshake. Late joiners get current state here rather than via
    /// event replay.
    SessionState {
        session_id: SessionId,
        join_code: String,
        status: SessionStatus,
        current_slide: Option<SlideInfo>,
        total_slides: usize,
        participant_count: usize,
        /// The joiner's own participant identity; doubles as the
        /// reconnect token. Absent for the speaker connection.
        participant_id: Option<ParticipantId>,
    },
    /// Current slide changed.
    SlideChanged { slide: SlideInfo, slide_index: u32 },
    /// A new participant joined.
    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: Option<String>,
        is_anonymous: bool,
        participant_count: usize,
    },
    /// A participant disconnected.
    ParticipantLeft {
        participant_id: ParticipantId,
        participant_count: usize,
    },
    /// Session status changed to active.
    SessionStarted {
        started_at: DateTime<Utc>,
        current_slide: Option<SlideInfo>,
    },
    /// Session status changed to paused.
    SessionPaused,
    /// Session status changed back to active.
    SessionResumed,
    /// Session status changed to ended. Terminal; the connection is
    /// closed after delivery.
    SessionEnded { ended_at: DateTime<Utc> },
    /// Ack to the submitter that its response was stored.
    ResponseSubmitted {
        response_id: ResponseId,
        slide_id: SlideId,
    },
    /// Raw response notification, delivered to the speaker only.
    ResponseReceived {
        response_id: ResponseId,
        slide_id: SlideId,
        participant_id: Option<ParticipantId>,
        display_name: Option<String>,
        content: ResponseContent,
        created_at: DateTime<Utc>,
    },
    /// Aggregated tally for a slide, delivered to everyone.
    VoteUpdate {
        slide_id: SlideId,
        votes: BTreeMap<OptionId, u64>,
        total_votes: u64,
    },
    /// Audience question notification, delivered to the speaker only.
    QuestionAsked {
        question_id: QuestionId,
        slide_id: SlideId,
        participant_id: Option<ParticipantId>,
        display_name: Option<String>,
        question_text: String,
        created_at: DateTime<Utc>,
    },
    /// Streaming or complete AI answer. A failed generation arrives
    /// as a terminal event with `error` set, so clients are never
    /// left in a loading state.
    AiResponse {
        question_id: QuestionId,
        slide_id: SlideId,
        question_text: String,
        response_text: String,
        is_streaming: bool,
        is_complete: bool,
        error: Option<String>,
    },
    /// Error response for a rejected client message.
    Error { code: String, message: String },
    /// Pong response to a client ping.
    Pong { timestamp: DateTime<Utc> },
}

/// Outbound event wrapper carrying the publish timestamp.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: ServerMessage,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: ServerMessage) -> Self {
        Envelope {
            event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialization() {
        let join = ClientMessage::Join {
            display_name: Some("Alice".to_string()),
            participant_token: None,
        };

        let json = serde_json::to_string(&join).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "join");
        assert_eq!(parsed["display_name"], "Alice");

        let round: ClientMessage = serde_json::from_str(&json).unwrap();
        match round {
            ClientMessage::Join {
                display_name,
                participant_token,
            } => {
                assert_eq!(display_name.as_deref(), Some("Alice"));
                assert!(participant_token.is_none());
            },
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_submit_response_content_tagging() {
        let slide_id = Uuid::new_v4();
        let msg = ClientMessage::SubmitResponse {
            slide_id,
            content: ResponseContent::Choice {
                option_ids: vec!["opt1".to_string()],
            },
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "submit_response");
        assert_eq!(parsed["content"]["kind"], "choice");
        assert_eq!(parsed["content"]["option_ids"][0], "opt1");
    }

    #[test]
    fn test_envelope_carries_type_and_timestamp() {
        let env = Envelope::new(ServerMessage::SessionPaused);
        let json = serde_json::to_string(&env).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "session_paused");
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_slide_kind_accepts_responses() {
        let content = SlideKind::Content {
            text: "hello".to_string(),
            image_url: None,
        };
        assert!(!content.accepts_responses());

        let choice = SlideKind::QuestionChoice {
            question: "pick one".to_string(),
            options: vec![ChoiceOption {
                id: "a".to_string(),
                text: "A".to_string(),
            }],
            allow_multiple: false,
        };
        assert!(choice.accepts_responses());
    }

    #[test]
    fn test_vote_update_shape() {
        let mut votes = BTreeMap::new();
        votes.insert("opt1".to_string(), 0);
        votes.insert("opt2".to_string(), 1);
        let msg = ServerMessage::VoteUpdate {
            slide_id: Uuid::new_v4(),
            votes,
            total_votes: 1,
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "vote_update");
        assert_eq!(parsed["votes"]["opt1"], 0);
        assert_eq!(parsed["votes"]["opt2"], 1);
        assert_eq!(parsed["total_votes"], 1);
    }
}
