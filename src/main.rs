use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livequiz::{
    auth, build_router, config::ServerConfig, questions::QuestionSet, state::AppState,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livequiz=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LiveQuiz...");

    let config = ServerConfig::from_env();
    let auth_config = Arc::new(auth::AuthConfig::from_env());
    let state = Arc::new(AppState::with_store(Arc::new(MemoryStore::new()), &config));

    if let Some(path) = &config.demo_questions {
        match QuestionSet::from_file(path) {
            Ok(set) => match state.create_session(set.questions, set.config).await {
                Ok(session) => tracing::info!(
                    "Demo session \"{}\" ready, join code {}",
                    set.title,
                    session.id
                ),
                Err(e) => tracing::warn!("Could not open demo session: {}", e),
            },
            Err(e) => tracing::warn!("Could not load {}: {}", path.display(), e),
        }
    }

    let app = build_router(state, auth_config);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await
}
