//! Error types for the room layer.

use std::path::PathBuf;

use quizroom_protocol::{ConnId, RoomCode};

/// Errors that can occur during room operations.
///
/// Every transition validates fully before mutating, so an `Err` means the
/// room is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room has no free player slot.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Settings outside their accepted ranges.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A host-only operation was requested by someone else, or a
    /// player-only operation by the host.
    #[error("connection {conn} may not {action}")]
    Unauthorized { conn: ConnId, action: &'static str },

    /// The room's current stage doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// `start_game` before a quiz was selected.
    #[error("no quiz selected")]
    NoQuizSelected,

    /// The catalog has no quiz with this id.
    #[error("quiz {0} not found")]
    QuizNotFound(String),

    /// The connection already answered the open question.
    #[error("connection {0} already answered this question")]
    DuplicateAnswer(ConnId),

    /// The connection is already a member of this room.
    #[error("connection {0} already in room {1}")]
    AlreadyInRoom(ConnId, RoomCode),

    /// The connection is not a member of this room.
    #[error("connection {0} not in room {1}")]
    NotInRoom(ConnId, RoomCode),

    /// Player names must contain at least one non-whitespace character.
    #[error("player name must not be empty")]
    InvalidPlayerName,

    /// The room's command channel is closed, typically because the room
    /// was dissolved while the request was in flight.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// No unused room code was found within the retry budget.
    #[error("could not allocate a room code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

/// Errors raised while loading a quiz catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("duplicate quiz id {0}")]
    DuplicateId(String),
}
