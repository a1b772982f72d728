//! # Quizroom
//!
//! Real-time multiplayer quiz rooms over WebSocket.
//!
//! A host creates a room and gets a short code, players join with it, the
//! host picks a quiz from the catalog and starts the game. Each question is
//! open until every player has answered or its time runs out; then scores
//! are revealed and the host moves on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quizroom::prelude::*;
//!
//! # async fn run() -> Result<(), QuizroomError> {
//! let catalog = InMemoryCatalog::from_file("quizzes.json")?;
//! let server = QuizroomServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(Arc::new(catalog))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::QuizroomError;
pub use server::{QuizroomServer, QuizroomServerBuilder};

pub mod prelude {
    pub use crate::{QuizroomError, QuizroomServer, QuizroomServerBuilder, ServerConfig};
    pub use quizroom_protocol::{
        ClientEvent, ConnId, Player, Question, Quiz, QuizSummary, RoomCode,
        RoomListEntry, ScoreEntry, ServerEvent, Settings,
    };
    pub use quizroom_room::{InMemoryCatalog, QuizCatalog, ScoringRule};
}
