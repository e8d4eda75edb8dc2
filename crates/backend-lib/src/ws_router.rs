// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
//!
//! The socket is split on upgrade: a write task drains this
//! connection's outbound queue, and the read loop parses client
//! messages and forwards them to the session actor. The read loop
//! never touches session state directly, and the actor never touches
//! the socket.
use crate::error::AppError;
use crate::session_actor::{Outbound, SessionHandle};
use crate::store::DeckStore;
use crate::metrics::{WS_ACTIVE, WS_CONNECTION};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use livedeck_common::{ClientMessage, ConnectionId, Envelope, ServerMessage};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Build the application router.
pub fn create_router<S: DeckStore + Clone + Send + Sync + 'static>(
    state: Arc<AppState<S>>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/session/{join_code}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Handler for WebSocket connections. The join code is resolved
/// before the upgrade, so an unknown code fails as a plain HTTP
/// response instead of an immediately-closed socket.
pub async fn ws_handler<S: DeckStore + Clone + Send + Sync + 'static>(
    ws: WebSocketUpgrade,
    Path(join_code): Path<String>,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let Some(handle) = state.sessions.lookup(&join_code) else {
        return AppError::SessionNotFound.into_response();
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, handle))
        .into_response()
}

async fn handle_connection<S: DeckStore + Clone + Send + Sync + 'static>(
    socket: WebSocket,
    state: Arc<AppState<S>>,
    handle: SessionHandle,
) {
    let connection_id: ConnectionId = Uuid::new_v4();
    // Counted here rather than at upgrade time, so an upgrade that
    // never completes cannot leave the gauge incremented forever.
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);
    let (mut sink, mut stream) = socket.split();

    // This connection's outbound queue. The actor enqueues; only this
    // task writes to the socket, so per-connection ordering is FIFO.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    let mut write_task = tokio::spawn(async move {
        while let Some(item) = out_rx.recv().await {
            let sent = match item {
                Outbound::Event(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json) => sink.send(Message::Text(json.into())).await,
                    Err(_) => continue,
                },
                Outbound::Ping => sink.send(Message::Ping(Bytes::new())).await,
                Outbound::Shutdown => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                },
            };
            if sent.is_err() {
                break;
            }
        }
    });

    let mut joined = false;
    let mut heartbeat = tokio::time::interval(state.settings.heartbeat_interval());
    heartbeat.tick().await; // the first tick fires immediately
    let mut outstanding_pings: u32 = 0;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(message)) = frame else { break };
                outstanding_pings = 0;
                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let keep_going = dispatch(
                                    &state,
                                    &handle,
                                    connection_id,
                                    &out_tx,
                                    &mut joined,
                                    client_msg,
                                )
                                .await;
                                if !keep_going {
                                    break;
                                }
                            },
                            Err(err) => {
                                send_event(
                                    &out_tx,
                                    ServerMessage::Error {
                                        code: "malformed_message".to_string(),
                                        message: err.to_string(),
                                    },
                                );
                            },
                        }
                    },
                    Message::Close(_) => break,
                    // Pong and ping frames only reset the liveness counter.
                    _ => {},
                }
            },
            _ = heartbeat.tick() => {
                if outstanding_pings >= state.settings.missed_pings_allowed {
                    debug!(%connection_id, "connection missed too many pings");
                    break;
                }
                outstanding_pings += 1;
                if out_tx.send(Outbound::Ping).is_err() {
                    break;
                }
            },
        }
    }

    // Disconnect path is the same for drops, missed pings and ended
    // sessions: the actor soft-deletes the participant and notifies.
    handle.leave(connection_id);
    gauge!(WS_ACTIVE).decrement(1.0);
    // Let the write task drain what is already queued (a rejection
    // reply must reach the client before the socket closes); it ends
    // once the actor processes the leave and drops its sender clone.
    drop(out_tx);
    if tokio::time::timeout(std::time::Duration::from_secs(2), &mut write_task)
        .await
        .is_err()
    {
        write_task.abort();
    }
    debug!(%connection_id, "connection closed");
}

/// Route one parsed client message. Returns `false` when the
/// connection should be torn down.
async fn dispatch<S: DeckStore + Clone + Send + Sync + 'static>(
    state: &Arc<AppState<S>>,
    handle: &SessionHandle,
    connection_id: ConnectionId,
    out_tx: &mpsc::UnboundedSender<Outbound>,
    joined: &mut bool,
    message: ClientMessage,
) -> bool {
    match message {
        ClientMessage::Join {
            display_name,
            participant_token,
        } => {
            if *joined {
                send_error(out_tx, &AppError::Validation("already joined".to_string()));
                return true;
            }
            match handle
                .join_audience(connection_id, display_name, participant_token, out_tx.clone())
                .await
            {
                Ok(participant_id) => {
                    *joined = true;
                    info!(%connection_id, %participant_id, "audience joined");
                    true
                },
                Err(err) => {
                    send_error(out_tx, &err);
                    false
                },
            }
        },
        ClientMessage::JoinSpeaker { token } => {
            if *joined {
                send_error(out_tx, &AppError::Validation("already joined".to_string()));
                return true;
            }
            let Some(speaker_id) = state.auth.verify_speaker(&token).await else {
                send_error(out_tx, &AppError::InvalidToken);
                return false;
            };
            match handle
                .join_speaker(connection_id, speaker_id, out_tx.clone())
                .await
            {
                Ok(()) => {
                    *joined = true;
                    info!(%connection_id, %speaker_id, "speaker joined");
                    true
                },
                Err(err) => {
                    send_error(out_tx, &err);
                    false
                },
            }
        },
        ClientMessage::Ping => {
            send_event(out_tx, ServerMessage::Pong { timestamp: Utc::now() });
            true
        },
        ClientMessage::Leave => {
            // Explicit leave closes the connection; the shared
            // disconnect path notifies the session.
            false
        },
        // Everything below requires a completed handshake.
        _ if !*joined => {
            send_error(
                out_tx,
                &AppError::Forbidden("join the session first".to_string()),
            );
            true
        },
        ClientMessage::SubmitResponse { slide_id, content } => {
            if let Err(err) = handle.submit(connection_id, slide_id, content).await {
                send_error(out_tx, &err);
            }
            true
        },
        ClientMessage::AskQuestion {
            slide_id,
            question_text,
        } => {
            if let Err(err) = handle
                .ask_question(connection_id, slide_id, question_text)
                .await
            {
                send_error(out_tx, &err);
            }
            true
        },
        ClientMessage::StartSession => {
            if let Err(err) = handle.start(Some(connection_id)).await {
                send_error(out_tx, &err);
            }
            true
        },
        ClientMessage::PauseSession => {
            if let Err(err) = handle.pause(Some(connection_id)).await {
                send_error(out_tx, &err);
            }
            true
        },
        ClientMessage::ResumeSession => {
            if let Err(err) = handle.resume(Some(connection_id)).await {
                send_error(out_tx, &err);
            }
            true
        },
        ClientMessage::EndSession => {
            match handle.end(Some(connection_id)).await {
                Ok(()) => {
                    // The actor has already fanned out session_ended and
                    // the shutdown markers; retire the session so the
                    // join code frees up.
                    state.sessions.finish(handle.session_id);
                },
                Err(err) => send_error(out_tx, &err),
            }
            true
        },
        ClientMessage::ChangeSlide { slide_id } => {
            if let Err(err) = handle.set_slide(Some(connection_id), slide_id).await {
                send_error(out_tx, &err);
            }
            true
        },
    }
}

fn send_event(out_tx: &mpsc::UnboundedSender<Outbound>, event: ServerMessage) {
    let _ = out_tx.send(Outbound::Event(Envelope::new(event)));
}

fn send_error(out_tx: &mpsc::UnboundedSender<Outbound>, err: &AppError) {
    send_event(
        out_tx,
        ServerMessage::Error {
            code: err.error_code().to_string(),
            message: err.to_string(),
        },
    );
}
