//! Error types for the session layer.

use quizroom_protocol::{ConnId, RoomCode};

/// Errors that can occur while tracking connection sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the connection. It was never opened or has
    /// already been closed.
    #[error("session not found for connection {0}")]
    NotFound(ConnId),

    /// The connection is already bound to a different room.
    #[error("connection {conn} is already in room {room}")]
    AlreadyInRoom { conn: ConnId, room: RoomCode },

    /// The server is at its connection limit.
    #[error("connection limit of {0} reached")]
    TooManyConnections(usize),
}
