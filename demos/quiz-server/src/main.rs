//! Quiz server binary: loads a quiz catalog and serves rooms over WebSocket.
//!
//! ```text
//! quiz-server --bind 0.0.0.0:8080 --quizzes quizzes.json --scoring time-decay
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quizroom::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quiz-server")]
#[command(about = "Real-time multiplayer quiz rooms over WebSocket", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "QUIZROOM_BIND", default_value = ServerConfig::DEFAULT_BIND)]
    bind: String,

    /// JSON file holding the quiz catalog
    #[arg(short, long, env = "QUIZROOM_QUIZZES", default_value = "quizzes.json")]
    quizzes: PathBuf,

    /// Seconds a silent connection is kept open
    #[arg(long, env = "QUIZROOM_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    idle_timeout_secs: u64,

    /// Scoring rule: flat, flat:N, time-decay, or time-decay:N
    #[arg(short, long, env = "QUIZROOM_SCORING", default_value = "flat")]
    scoring: ScoringRule,
}

#[tokio::main]
async fn main() -> Result<(), QuizroomError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let catalog = InMemoryCatalog::from_file(&cli.quizzes)?;
    tracing::info!(quizzes = catalog.len(), path = %cli.quizzes.display(), "catalog ready");

    let server = QuizroomServer::builder()
        .bind(&cli.bind)
        .idle_timeout(Duration::from_secs(cli.idle_timeout_secs))
        .scoring(cli.scoring)
        .build(Arc::new(catalog))
        .await?;

    server.run().await
}
