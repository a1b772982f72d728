//! Session types.

use std::time::{Duration, Instant};

use quizroom_protocol::{ConnId, RoomCode};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Limits for the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of simultaneously open sessions.
    ///
    /// Default: 4096.
    pub max_connections: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_connections: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The server's record of one open connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Identity assigned when the socket was accepted.
    pub conn_id: ConnId,

    /// The room this connection is hosting or playing in.
    ///
    /// A connection is in at most one room at a time.
    pub room: Option<RoomCode>,

    /// When the session was opened.
    pub connected_at: Instant,
}

impl Session {
    pub(crate) fn new(conn_id: ConnId) -> Self {
        Self {
            conn_id,
            room: None,
            connected_at: Instant::now(),
        }
    }

    /// Returns `true` if the connection is bound to a room.
    pub fn in_room(&self) -> bool {
        self.room.is_some()
    }

    /// How long the connection has been open.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
