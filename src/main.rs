use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holiday_jeopardy::{console, llm, state::AppState, types::GameConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holiday_jeopardy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Holiday Jeopardy...");

    let llm_config = llm::LlmConfig::from_env();
    let llm_provider = match llm_config.build_provider() {
        Ok(provider) => {
            tracing::info!("Using {} for boards, hints and narration", provider.name());
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize the AI provider: {}. Playing with the holiday board, no hints or narration.",
                e
            );
            None
        }
    };

    let state = AppState::new_with_llm(llm_provider, llm_config, GameConfig::from_env());

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    if let Err(e) = console::run(state, stdin, stdout).await {
        tracing::error!("Console I/O failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Goodbye");
}
