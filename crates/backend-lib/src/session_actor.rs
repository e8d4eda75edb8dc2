// ============================
// crates/backend-lib/src/session_actor.rs
// ============================
//! Per-session actor.
//!
//! All mutable state for one live session (lifecycle, roster,
//! aggregates, subscriber table) is owned by a single task; every
//! mutation arrives as a `SessionCmd` over an mpsc channel, so there
//! is exactly one writer and no locks. Events leave through
//! per-connection unbounded queues: the actor only ever enqueues, the
//! socket write loop drains, and a queue whose receiver is gone marks
//! the connection dead and routes it through the normal leave path.
use crate::aggregate::AggregationEngine;
use crate::ai::{self, AiQuestion, AnswerGenerator};
use crate::error::AppError;
use crate::metrics::{
    AI_REQUEST, PARTICIPANT_JOINED, PARTICIPANT_LIVE, RESPONSE_ACCEPTED, RESPONSE_REJECTED,
    SESSION_ACTIVE, SESSION_ENDED,
};
use crate::roster::Roster;
use crate::session::Session;
use crate::store::DeckStore;
use chrono::Utc;
use livedeck_common::{
    ConnectionId, Envelope, ParticipantId, QuestionId, Response, ResponseContent, ResponseId,
    ServerMessage, SessionId, SessionStatus, Slide, SlideId, SlideInfo, SpeakerId,
};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the actor pushes onto a connection's outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// A serialized event for the client.
    Event(Envelope),
    /// Heartbeat probe; the write loop turns this into a ws ping
    /// frame. Originates in the connection task, not the actor.
    Ping,
    /// Session is over: drain whatever is queued ahead, then close.
    Shutdown,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Speaker,
    Audience,
}

struct Subscriber {
    role: Role,
    participant_id: Option<ParticipantId>,
    display_name: Option<String>,
    tx: OutboundSender,
}

/// Point-in-time counters for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub join_code: String,
    pub status: SessionStatus,
    pub live_participants: usize,
    pub total_participants: usize,
    pub total_responses: u64,
    pub responses_per_slide: HashMap<SlideId, u64>,
    pub duration_seconds: Option<u64>,
}

/// Messages the actor accepts.
pub enum SessionCmd {
    JoinAudience {
        connection_id: ConnectionId,
        display_name: Option<String>,
        participant_token: Option<ParticipantId>,
        tx: OutboundSender,
        resp_tx: mpsc::UnboundedSender<Result<ParticipantId, AppError>>,
    },
    JoinSpeaker {
        connection_id: ConnectionId,
        speaker_id: SpeakerId,
        tx: OutboundSender,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    Leave {
        connection_id: ConnectionId,
    },
    Submit {
        connection_id: ConnectionId,
        slide_id: SlideId,
        content: ResponseContent,
        resp_tx: mpsc::UnboundedSender<Result<ResponseId, AppError>>,
    },
    AskQuestion {
        connection_id: ConnectionId,
        slide_id: SlideId,
        question_text: String,
        resp_tx: mpsc::UnboundedSender<Result<QuestionId, AppError>>,
    },
    /// Lifecycle commands carry the requesting connection so the actor
    /// can enforce the speaker-only rule; `None` means the caller is
    /// trusted (REST layer acting on an authenticated speaker).
    Start {
        requested_by: Option<ConnectionId>,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    Pause {
        requested_by: Option<ConnectionId>,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    Resume {
        requested_by: Option<ConnectionId>,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    End {
        requested_by: Option<ConnectionId>,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    SetSlide {
        requested_by: Option<ConnectionId>,
        slide_id: SlideId,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    Stats {
        resp_tx: mpsc::UnboundedSender<SessionStats>,
    },
    /// Published by an AI relay task; broadcast to everyone.
    AiEvent {
        event: ServerMessage,
    },
}

/// Cloneable handle to one session actor.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub join_code: String,
    cmd_tx: mpsc::UnboundedSender<SessionCmd>,
}

macro_rules! request {
    ($self:ident, $variant:ident { $($field:ident : $value:expr),* $(,)? }) => {{
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        $self
            .cmd_tx
            .send(SessionCmd::$variant { $($field: $value,)* resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| AppError::Internal("session actor dropped the request".to_string()))?
    }};
}

impl SessionHandle {
    pub async fn join_audience(
        &self,
        connection_id: ConnectionId,
        display_name: Option<String>,
        participant_token: Option<ParticipantId>,
        tx: OutboundSender,
    ) -> Result<ParticipantId, AppError> {
        request!(
            self,
            JoinAudience {
                connection_id: connection_id,
                display_name: display_name,
                participant_token: participant_token,
                tx: tx,
            }
        )
    }

    pub async fn join_speaker(
        &self,
        connection_id: ConnectionId,
        speaker_id: SpeakerId,
        tx: OutboundSender,
    ) -> Result<(), AppError> {
        request!(
            self,
            JoinSpeaker {
                connection_id: connection_id,
                speaker_id: speaker_id,
                tx: tx,
            }
        )
    }

    /// Fire-and-forget; safe to call from Drop paths.
    pub fn leave(&self, connection_id: ConnectionId) {
        let _ = self.cmd_tx.send(SessionCmd::Leave { connection_id });
    }

    pub async fn submit(
        &self,
        connection_id: ConnectionId,
        slide_id: SlideId,
        content: ResponseContent,
    ) -> Result<ResponseId, AppError> {
        request!(
            self,
            Submit {
                connection_id: connection_id,
                slide_id: slide_id,
                content: content,
            }
        )
    }

    pub async fn ask_question(
        &self,
        connection_id: ConnectionId,
        slide_id: SlideId,
        question_text: String,
    ) -> Result<QuestionId, AppError> {
        request!(
            self,
            AskQuestion {
                connection_id: connection_id,
                slide_id: slide_id,
                question_text: question_text,
            }
        )
    }

    pub async fn start(&self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        request!(self, Start { requested_by: requested_by })
    }

    pub async fn pause(&self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        request!(self, Pause { requested_by: requested_by })
    }

    pub async fn resume(&self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        request!(self, Resume { requested_by: requested_by })
    }

    pub async fn end(&self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        request!(self, End { requested_by: requested_by })
    }

    pub async fn set_slide(
        &self,
        requested_by: Option<ConnectionId>,
        slide_id: SlideId,
    ) -> Result<(), AppError> {
        request!(
            self,
            SetSlide {
                requested_by: requested_by,
                slide_id: slide_id,
            }
        )
    }

    pub async fn stats(&self) -> Result<SessionStats, AppError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(SessionCmd::Stats { resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| AppError::Internal("session actor dropped the request".to_string()))
    }
}

/// Spawn the actor task for `session` and hand back its handle.
pub fn spawn_session_actor<S>(
    session: Session,
    deck: Vec<Slide>,
    store: S,
    generator: Arc<dyn AnswerGenerator>,
    ai_timeout: Duration,
) -> SessionHandle
where
    S: DeckStore + Send + Sync + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        session_id: session.id,
        join_code: session.join_code.clone(),
        cmd_tx: cmd_tx.clone(),
    };
    let actor = SessionActor {
        aggregates: AggregationEngine::new(session.id),
        roster: Roster::new(session.id),
        session,
        deck,
        subscribers: HashMap::new(),
        store,
        generator,
        ai_timeout,
        self_tx: cmd_tx,
    };
    tokio::spawn(actor.run(cmd_rx));
    handle
}

struct SessionActor<S> {
    session: Session,
    deck: Vec<Slide>,
    roster: Roster,
    aggregates: AggregationEngine,
    subscribers: HashMap<ConnectionId, Subscriber>,
    store: S,
    generator: Arc<dyn AnswerGenerator>,
    ai_timeout: Duration,
    self_tx: mpsc::UnboundedSender<SessionCmd>,
}

impl<S: DeckStore> SessionActor<S> {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<SessionCmd>) {
        info!(session_id = %self.session.id, join_code = %self.session.join_code, "session actor started");
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SessionCmd::JoinAudience {
                    connection_id,
                    display_name,
                    participant_token,
                    tx,
                    resp_tx,
                } => {
                    let result =
                        self.handle_join_audience(connection_id, display_name, participant_token, tx);
                    let _ = resp_tx.send(result);
                },
                SessionCmd::JoinSpeaker {
                    connection_id,
                    speaker_id,
                    tx,
                    resp_tx,
                } => {
                    let result = self.handle_join_speaker(connection_id, speaker_id, tx);
                    let _ = resp_tx.send(result);
                },
                SessionCmd::Leave { connection_id } => self.handle_leave(connection_id),
                SessionCmd::Submit {
                    connection_id,
                    slide_id,
                    content,
                    resp_tx,
                } => {
                    let result = self.handle_submit(connection_id, slide_id, content).await;
                    let _ = resp_tx.send(result);
                },
                SessionCmd::AskQuestion {
                    connection_id,
                    slide_id,
                    question_text,
                    resp_tx,
                } => {
                    let result = self
                        .handle_ask_question(connection_id, slide_id, question_text)
                        .await;
                    let _ = resp_tx.send(result);
                },
                SessionCmd::Start {
                    requested_by,
                    resp_tx,
                } => {
                    let _ = resp_tx.send(self.handle_start(requested_by));
                },
                SessionCmd::Pause {
                    requested_by,
                    resp_tx,
                } => {
                    let _ = resp_tx.send(self.handle_pause(requested_by));
                },
                SessionCmd::Resume {
                    requested_by,
                    resp_tx,
                } => {
                    let _ = resp_tx.send(self.handle_resume(requested_by));
                },
                SessionCmd::End {
                    requested_by,
                    resp_tx,
                } => {
                    let _ = resp_tx.send(self.handle_end(requested_by));
                },
                SessionCmd::SetSlide {
                    requested_by,
                    slide_id,
                    resp_tx,
                } => {
                    let _ = resp_tx.send(self.handle_set_slide(requested_by, slide_id));
                },
                SessionCmd::Stats { resp_tx } => {
                    let _ = resp_tx.send(self.stats());
                },
                SessionCmd::AiEvent { event } => self.handle_ai_event(event).await,
            }
        }
        info!(session_id = %self.session.id, "session actor stopped");
    }

    // --- joins ---

    fn handle_join_audience(
        &mut self,
        connection_id: ConnectionId,
        display_name: Option<String>,
        participant_token: Option<ParticipantId>,
        tx: OutboundSender,
    ) -> Result<ParticipantId, AppError> {
        if self.session.is_ended() {
            return Err(AppError::SessionEnded);
        }

        let live_before = self.roster.live_count();
        // An unknown token falls back to a fresh identity rather than
        // failing the handshake.
        let participant = match participant_token.and_then(|token| {
            self.roster
                .rejoin(token, connection_id, display_name.clone())
                .map(|p| p.clone())
        }) {
            Some(existing) => existing,
            None => self.roster.join(connection_id, display_name).clone(),
        };

        // A connection swap for an identity that never left keeps the
        // live count unchanged; no join to announce in that case.
        let newly_live = self.roster.live_count() > live_before;
        if newly_live {
            counter!(PARTICIPANT_JOINED).increment(1);
            gauge!(PARTICIPANT_LIVE).increment(1.0);
        }

        self.subscribers.insert(
            connection_id,
            Subscriber {
                role: Role::Audience,
                participant_id: Some(participant.id),
                display_name: participant.display_name.clone(),
                tx: tx.clone(),
            },
        );

        // Snapshot goes to the joiner only; the join notification goes
        // to everyone else.
        let snapshot = self.snapshot(Some(participant.id));
        let _ = tx.send(Outbound::Event(Envelope::new(snapshot)));
        if newly_live {
            self.broadcast_except(
                connection_id,
                ServerMessage::ParticipantJoined {
                    participant_id: participant.id,
                    display_name: participant.display_name.clone(),
                    is_anonymous: participant.is_anonymous,
                    participant_count: self.roster.live_count(),
                },
            );
        }

        debug!(session_id = %self.session.id, participant_id = %participant.id, "participant joined");
        Ok(participant.id)
    }

    fn handle_join_speaker(
        &mut self,
        connection_id: ConnectionId,
        speaker_id: SpeakerId,
        tx: OutboundSender,
    ) -> Result<(), AppError> {
        if self.session.is_ended() {
            return Err(AppError::SessionEnded);
        }
        if self
            .subscribers
            .values()
            .any(|sub| sub.role == Role::Speaker)
        {
            return Err(AppError::SpeakerAlreadyConnected);
        }

        self.subscribers.insert(
            connection_id,
            Subscriber {
                role: Role::Speaker,
                participant_id: None,
                display_name: None,
                tx: tx.clone(),
            },
        );
        let snapshot = self.snapshot(None);
        let _ = tx.send(Outbound::Event(Envelope::new(snapshot)));

        info!(session_id = %self.session.id, %speaker_id, "speaker connected");
        Ok(())
    }

    fn handle_leave(&mut self, connection_id: ConnectionId) {
        let Some(subscriber) = self.subscribers.remove(&connection_id) else {
            return;
        };
        match subscriber.role {
            Role::Speaker => {
                info!(session_id = %self.session.id, "speaker disconnected");
            },
            Role::Audience => {
                let live_before = self.roster.live_count();
                if let Some(participant_id) = self.roster.leave(connection_id) {
                    if self.roster.live_count() < live_before {
                        gauge!(PARTICIPANT_LIVE).decrement(1.0);
                        self.broadcast(ServerMessage::ParticipantLeft {
                            participant_id,
                            participant_count: self.roster.live_count(),
                        });
                    }
                }
            },
        }
    }

    // --- audience operations ---

    async fn handle_submit(
        &mut self,
        connection_id: ConnectionId,
        slide_id: SlideId,
        content: ResponseContent,
    ) -> Result<ResponseId, AppError> {
        // Paused, pending and ended all reject the same way; the
        // client may retry once the session is active again.
        if !self.session.is_active() {
            return Err(AppError::SessionNotActive);
        }
        let slide = self.slide(slide_id)?.clone();

        let subscriber = self
            .subscribers
            .get(&connection_id)
            .ok_or(AppError::ConnectionLost)?;
        if subscriber.role == Role::Speaker {
            return Err(AppError::Forbidden(
                "only audience connections can submit responses".to_string(),
            ));
        }
        let participant_id = subscriber.participant_id;
        let display_name = subscriber.display_name.clone();

        let response = self
            .aggregates
            .submit(&slide, participant_id, content)
            .inspect_err(|_| counter!(RESPONSE_REJECTED).increment(1))?;
        self.store.persist_response(&response).await?;
        counter!(RESPONSE_ACCEPTED).increment(1);

        self.send_to(
            connection_id,
            ServerMessage::ResponseSubmitted {
                response_id: response.id,
                slide_id,
            },
        );
        self.send_to_speaker(ServerMessage::ResponseReceived {
            response_id: response.id,
            slide_id,
            participant_id,
            display_name,
            content: response.content.clone(),
            created_at: response.created_at,
        });

        let (votes, total_votes) = self.aggregates.tally_for(&slide);
        self.broadcast(ServerMessage::VoteUpdate {
            slide_id,
            votes,
            total_votes,
        });

        Ok(response.id)
    }

    async fn handle_ask_question(
        &mut self,
        connection_id: ConnectionId,
        slide_id: SlideId,
        question_text: String,
    ) -> Result<QuestionId, AppError> {
        if !self.session.is_active() {
            return Err(AppError::SessionNotActive);
        }
        let question_text = question_text.trim().to_string();
        if question_text.is_empty() {
            return Err(AppError::Validation("question text is empty".to_string()));
        }
        let slide = self.slide(slide_id)?.clone();

        let subscriber = self
            .subscribers
            .get(&connection_id)
            .ok_or(AppError::ConnectionLost)?;
        let participant_id = subscriber.participant_id;
        let display_name = subscriber.display_name.clone();

        let question_id = Uuid::new_v4();
        let created_at = Utc::now();
        let stored = Response {
            id: question_id,
            session_id: self.session.id,
            slide_id,
            participant_id,
            content: ResponseContent::Question {
                question_text: question_text.clone(),
            },
            is_ai_response: false,
            created_at,
        };
        self.store.persist_response(&stored).await?;

        self.send_to_speaker(ServerMessage::QuestionAsked {
            question_id,
            slide_id,
            participant_id,
            display_name,
            question_text: question_text.clone(),
            created_at,
        });

        counter!(AI_REQUEST).increment(1);
        let prompt = ai::compose_prompt(&question_text, &slide);
        ai::spawn_relay(
            self.generator.clone(),
            self.ai_timeout,
            self.self_tx.clone(),
            AiQuestion {
                question_id,
                slide_id,
                question_text,
                prompt,
            },
        );
        Ok(question_id)
    }

    async fn handle_ai_event(&mut self, event: ServerMessage) {
        if let ServerMessage::AiResponse {
            slide_id,
            response_text,
            is_complete: true,
            error: None,
            ..
        } = &event
        {
            // The answer row is its own Response with a fresh id; the
            // event's question_id stays the correlation key and must
            // not collide with the question row persisted at ask time.
            let stored = Response {
                id: Uuid::new_v4(),
                session_id: self.session.id,
                slide_id: *slide_id,
                participant_id: None,
                content: ResponseContent::Text {
                    text: response_text.clone(),
                },
                is_ai_response: true,
                created_at: Utc::now(),
            };
            if let Err(err) = self.store.persist_response(&stored).await {
                warn!(session_id = %self.session.id, error = %err, "failed to persist AI answer");
            }
        }
        self.broadcast(event);
    }

    // --- lifecycle ---

    fn handle_start(&mut self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        self.ensure_speaker(requested_by)?;
        let first_slide = self.deck.first().map(|slide| slide.id);
        self.session.start(first_slide)?;
        gauge!(SESSION_ACTIVE).increment(1.0);
        self.broadcast(ServerMessage::SessionStarted {
            started_at: self.session.started_at.unwrap_or_else(Utc::now),
            current_slide: self.current_slide_info(),
        });
        info!(session_id = %self.session.id, "session started");
        Ok(())
    }

    fn handle_pause(&mut self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        self.ensure_speaker(requested_by)?;
        self.session.pause()?;
        self.broadcast(ServerMessage::SessionPaused);
        Ok(())
    }

    fn handle_resume(&mut self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        self.ensure_speaker(requested_by)?;
        self.session.resume()?;
        self.broadcast(ServerMessage::SessionResumed);
        Ok(())
    }

    /// Terminal. The ended event is enqueued before the shutdown
    /// marker, so FIFO delivery guarantees every still-connected
    /// client sees `session_ended` before its socket closes.
    fn handle_end(&mut self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        self.ensure_speaker(requested_by)?;
        let ended_at = self.session.end()?;
        if self.session.started_at.is_some() {
            gauge!(SESSION_ACTIVE).decrement(1.0);
        }
        counter!(SESSION_ENDED).increment(1);

        self.broadcast(ServerMessage::SessionEnded { ended_at });
        let live = self.roster.live_count();
        gauge!(PARTICIPANT_LIVE).decrement(live as f64);
        for (connection_id, subscriber) in self.subscribers.drain() {
            let _ = subscriber.tx.send(Outbound::Shutdown);
            self.roster.leave(connection_id);
        }
        info!(session_id = %self.session.id, "session ended");
        Ok(())
    }

    fn handle_set_slide(
        &mut self,
        requested_by: Option<ConnectionId>,
        slide_id: SlideId,
    ) -> Result<(), AppError> {
        self.ensure_speaker(requested_by)?;
        let slide = self.slide(slide_id)?.clone();
        self.session.set_current_slide(slide_id)?;
        self.broadcast(ServerMessage::SlideChanged {
            slide: SlideInfo::from(&slide),
            slide_index: slide.order_index,
        });
        Ok(())
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session.id,
            join_code: self.session.join_code.clone(),
            status: self.session.status,
            live_participants: self.roster.live_count(),
            total_participants: self.roster.total_count(),
            total_responses: self.aggregates.total_responses(),
            responses_per_slide: self.aggregates.responses_per_slide(),
            duration_seconds: self.session.duration_seconds(),
        }
    }

    // --- helpers ---

    fn ensure_speaker(&self, requested_by: Option<ConnectionId>) -> Result<(), AppError> {
        let Some(connection_id) = requested_by else {
            return Ok(());
        };
        match self.subscribers.get(&connection_id) {
            Some(sub) if sub.role == Role::Speaker => Ok(()),
            _ => Err(AppError::Forbidden(
                "only the speaker can control the session".to_string(),
            )),
        }
    }

    fn slide(&self, slide_id: SlideId) -> Result<&Slide, AppError> {
        self.deck
            .iter()
            .find(|slide| slide.id == slide_id)
            .ok_or(AppError::SlideNotFound)
    }

    fn current_slide_info(&self) -> Option<SlideInfo> {
        let slide_id = self.session.current_slide?;
        self.slide(slide_id).ok().map(SlideInfo::from)
    }

    fn snapshot(&self, participant_id: Option<ParticipantId>) -> ServerMessage {
        ServerMessage::SessionState {
            session_id: self.session.id,
            join_code: self.session.join_code.clone(),
            status: self.session.status,
            current_slide: self.current_slide_info(),
            total_slides: self.deck.len(),
            participant_count: self.roster.live_count(),
            participant_id,
        }
    }

    fn broadcast(&mut self, event: ServerMessage) {
        let envelope = Envelope::new(event);
        let dead = self.fan_out(&envelope, None, false);
        self.reap(dead);
    }

    fn broadcast_except(&mut self, skip: ConnectionId, event: ServerMessage) {
        let envelope = Envelope::new(event);
        let dead = self.fan_out(&envelope, Some(skip), false);
        self.reap(dead);
    }

    fn send_to_speaker(&mut self, event: ServerMessage) {
        let envelope = Envelope::new(event);
        let dead = self.fan_out(&envelope, None, true);
        self.reap(dead);
    }

    fn send_to(&mut self, connection_id: ConnectionId, event: ServerMessage) {
        let Some(subscriber) = self.subscribers.get(&connection_id) else {
            return;
        };
        if subscriber
            .tx
            .send(Outbound::Event(Envelope::new(event)))
            .is_err()
        {
            self.reap(vec![connection_id]);
        }
    }

    fn fan_out(
        &self,
        envelope: &Envelope,
        skip: Option<ConnectionId>,
        speaker_only: bool,
    ) -> Vec<ConnectionId> {
        let mut dead = Vec::new();
        for (connection_id, subscriber) in &self.subscribers {
            if skip == Some(*connection_id) {
                continue;
            }
            if speaker_only && subscriber.role != Role::Speaker {
                continue;
            }
            if subscriber
                .tx
                .send(Outbound::Event(envelope.clone()))
                .is_err()
            {
                dead.push(*connection_id);
            }
        }
        dead
    }

    /// A queue whose receiver is gone means the socket task died; run
    /// those connections through the normal leave path.
    fn reap(&mut self, dead: Vec<ConnectionId>) {
        for connection_id in dead {
            debug!(session_id = %self.session.id, %connection_id, "dropping dead connection");
            self.handle_leave(connection_id);
        }
    }
}
