// crates/backend-bin/src/main.rs
//! Demo entry point: in-memory store seeded with a small deck, a
//! static speaker token, and the echo answer generator.
use anyhow::Context;
use livedeck_backend_lib::{
    ai::EchoGenerator,
    auth::StaticTokenAuth,
    create_router, AppState, InMemoryStore, SessionManager, Settings,
};
use livedeck_common::{ChoiceOption, Slide, SlideKind};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(Settings::load().unwrap_or_else(|_| Settings::default()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = InMemoryStore::new();
    let presentation_id = Uuid::new_v4();
    store.add_presentation(presentation_id, demo_deck()).await;

    let auth = Arc::new(StaticTokenAuth::new());
    let speaker_id = Uuid::new_v4();
    auth.register("speaker-demo", speaker_id);

    let sessions = Arc::new(SessionManager::new(
        store.clone(),
        Arc::new(EchoGenerator),
        settings.clone(),
    ));
    let demo = sessions
        .create_session(presentation_id)
        .await
        .context("failed to open the demo session")?;
    info!(join_code = %demo.join_code, "demo session ready");

    let state = Arc::new(AppState {
        sessions,
        auth,
        settings: settings.clone(),
    });
    let app = create_router(state);

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!("listening on {}", settings.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn demo_deck() -> Vec<Slide> {
    vec![
        Slide {
            id: Uuid::new_v4(),
            order_index: 0,
            kind: SlideKind::Content {
                text: "Welcome to the demo deck".to_string(),
                image_url: None,
            },
        },
        Slide {
            id: Uuid::new_v4(),
            order_index: 1,
            kind: SlideKind::QuestionChoice {
                question: "How are you following along?".to_string(),
                options: vec![
                    ChoiceOption {
                        id: "laptop".to_string(),
                        text: "Laptop".to_string(),
                    },
                    ChoiceOption {
                        id: "phone".to_string(),
                        text: "Phone".to_string(),
                    },
                ],
                allow_multiple: false,
            },
        },
        Slide {
            id: Uuid::new_v4(),
            order_index: 2,
            kind: SlideKind::QuestionText {
                question: "What should we cover next?".to_string(),
                max_length: Some(280),
                required: false,
            },
        },
        Slide {
            id: Uuid::new_v4(),
            order_index: 3,
            kind: SlideKind::Conclusion {
                title: "Thanks for joining".to_string(),
                conclusions: vec!["Questions get AI-drafted answers live".to_string()],
            },
        },
    ]
}
