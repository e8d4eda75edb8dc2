// ============================
// crates/backend-lib/src/ai.rs
// ============================
//! AI answer relay.
//!
//! The model call itself lives behind the `AnswerGenerator` trait;
//! this module owns the task that consumes a generation stream and
//! republishes each increment as an `ai_response` event through the
//! session actor. The whole generation is bounded by a timeout, and a
//! failure is fatal to the request only: the asking client gets a
//! terminal error event and the session carries on.
use crate::error::AppError;
use crate::metrics::AI_FAILED;
use crate::session_actor::SessionCmd;
use async_trait::async_trait;
use livedeck_common::{QuestionId, ServerMessage, Slide, SlideId, SlideKind};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// External answer-generation capability.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Begin generating an answer for `prompt`. The returned channel
    /// yields the answer incrementally; it closes when generation is
    /// done.
    async fn generate(&self, prompt: &str) -> Result<mpsc::Receiver<String>, AppError>;
}

/// One question in flight through the relay.
pub struct AiQuestion {
    pub question_id: QuestionId,
    pub slide_id: SlideId,
    pub question_text: String,
    pub prompt: String,
}

/// Compose the prompt from the audience question and the slide it was
/// asked on. Speaker-notes style context comes from the slide content.
pub fn compose_prompt(question_text: &str, slide: &Slide) -> String {
    let context = match &slide.kind {
        SlideKind::Content { text, .. } => text.clone(),
        SlideKind::QuestionText { question, .. }
        | SlideKind::QuestionChoice { question, .. } => question.clone(),
        SlideKind::Summary {
            title,
            summary_text,
        } => summary_text.clone().unwrap_or_else(|| title.clone()),
        SlideKind::Conclusion { title, conclusions } => {
            if conclusions.is_empty() {
                title.clone()
            } else {
                conclusions.join("\n")
            }
        },
    };
    format!(
        "You are answering an audience question during a live presentation.\n\
         Current slide:\n{context}\n\nQuestion: {question_text}\n\nAnswer concisely."
    )
}

/// Spawn the relay task for one question. Increments flow back into
/// the actor as `SessionCmd::AiEvent`; no session state is held while
/// the generator runs.
pub fn spawn_relay(
    generator: Arc<dyn AnswerGenerator>,
    timeout: Duration,
    cmd_tx: mpsc::UnboundedSender<SessionCmd>,
    question: AiQuestion,
) {
    tokio::spawn(run_relay(generator, timeout, cmd_tx, question));
}

async fn run_relay(
    generator: Arc<dyn AnswerGenerator>,
    timeout: Duration,
    cmd_tx: mpsc::UnboundedSender<SessionCmd>,
    question: AiQuestion,
) {
    let deadline = tokio::time::Instant::now() + timeout;

    let streamed = tokio::time::timeout_at(deadline, async {
        let mut chunks = generator.generate(&question.prompt).await?;
        let mut full = String::new();
        while let Some(chunk) = chunks.recv().await {
            full.push_str(&chunk);
            let increment = ServerMessage::AiResponse {
                question_id: question.question_id,
                slide_id: question.slide_id,
                question_text: question.question_text.clone(),
                response_text: full.clone(),
                is_streaming: true,
                is_complete: false,
                error: None,
            };
            if cmd_tx.send(SessionCmd::AiEvent { event: increment }).is_err() {
                // Session actor is gone; stop consuming.
                return Err(AppError::ConnectionLost);
            }
        }
        Ok(full)
    })
    .await;

    let terminal = match streamed {
        Ok(Ok(full)) => ServerMessage::AiResponse {
            question_id: question.question_id,
            slide_id: question.slide_id,
            question_text: question.question_text,
            response_text: full,
            is_streaming: false,
            is_complete: true,
            error: None,
        },
        Ok(Err(AppError::ConnectionLost)) => return,
        Ok(Err(err)) => {
            warn!(question_id = %question.question_id, error = %err, "AI generation failed");
            counter!(AI_FAILED).increment(1);
            ai_error_event(question, err.to_string())
        },
        Err(_) => {
            warn!(question_id = %question.question_id, "AI generation timed out");
            counter!(AI_FAILED).increment(1);
            ai_error_event(question, format!("timed out after {}s", timeout.as_secs()))
        },
    };

    let _ = cmd_tx.send(SessionCmd::AiEvent { event: terminal });
}

fn ai_error_event(question: AiQuestion, message: String) -> ServerMessage {
    ServerMessage::AiResponse {
        question_id: question.question_id,
        slide_id: question.slide_id,
        question_text: question.question_text,
        response_text: String::new(),
        is_streaming: false,
        is_complete: true,
        error: Some(message),
    }
}

/// Generator that echoes the question back word by word. Stands in
/// for a real provider in tests and the demo binary.
pub struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<mpsc::Receiver<String>, AppError> {
        let (tx, rx) = mpsc::channel(16);
        let words: Vec<String> = prompt
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect();
        tokio::spawn(async move {
            for word in words {
                if tx.send(word).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// Generator that always fails, for exercising the error path.
pub struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<mpsc::Receiver<String>, AppError> {
        Err(AppError::AiGenerationFailed(
            "provider unavailable".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question() -> AiQuestion {
        AiQuestion {
            question_id: Uuid::new_v4(),
            slide_id: Uuid::new_v4(),
            question_text: "what is this?".to_string(),
            prompt: "context\n\nwhat is this?".to_string(),
        }
    }

    #[test]
    fn test_compose_prompt_includes_slide_context() {
        let slide = Slide {
            id: Uuid::new_v4(),
            order_index: 0,
            kind: SlideKind::Content {
                text: "The Rust borrow checker".to_string(),
                image_url: None,
            },
        };
        let prompt = compose_prompt("why does this matter?", &slide);
        assert!(prompt.contains("The Rust borrow checker"));
        assert!(prompt.contains("why does this matter?"));
    }

    #[tokio::test]
    async fn test_relay_streams_then_completes() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        run_relay(
            Arc::new(EchoGenerator),
            Duration::from_secs(5),
            cmd_tx,
            question(),
        )
        .await;

        let mut saw_increment = false;
        let mut terminal = None;
        while let Some(SessionCmd::AiEvent { event }) = cmd_rx.recv().await {
            if let ServerMessage::AiResponse {
                is_streaming,
                is_complete,
                ..
            } = &event
            {
                if *is_streaming {
                    saw_increment = true;
                }
                if *is_complete {
                    terminal = Some(event);
                    break;
                }
            }
        }

        assert!(saw_increment);
        match terminal.unwrap() {
            ServerMessage::AiResponse {
                response_text,
                error,
                ..
            } => {
                assert!(error.is_none());
                assert!(response_text.contains("what"));
            },
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_relay_failure_yields_terminal_error() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        run_relay(
            Arc::new(FailingGenerator),
            Duration::from_secs(5),
            cmd_tx,
            question(),
        )
        .await;

        let Some(SessionCmd::AiEvent { event }) = cmd_rx.recv().await else {
            panic!("expected a terminal event");
        };
        match event {
            ServerMessage::AiResponse {
                is_complete, error, ..
            } => {
                assert!(is_complete);
                assert!(error.unwrap().contains("provider unavailable"));
            },
            other => panic!("expected AiResponse, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_times_out() {
        struct StallingGenerator;

        #[async_trait]
        impl AnswerGenerator for StallingGenerator {
            async fn generate(&self, _: &str) -> Result<mpsc::Receiver<String>, AppError> {
                // Keep the channel open forever without yielding chunks.
                let (tx, rx) = mpsc::channel(1);
                tokio::spawn(async move {
                    let _tx = tx;
                    std::future::pending::<()>().await;
                });
                Ok(rx)
            }
        }

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        run_relay(
            Arc::new(StallingGenerator),
            Duration::from_secs(1),
            cmd_tx,
            question(),
        )
        .await;

        let Some(SessionCmd::AiEvent { event }) = cmd_rx.recv().await else {
            panic!("expected a terminal event");
        };
        match event {
            ServerMessage::AiResponse {
                is_complete, error, ..
            } => {
                assert!(is_complete);
                assert!(error.unwrap().contains("timed out"));
            },
            other => panic!("expected AiResponse, got {other:?}"),
        }
    }
}
