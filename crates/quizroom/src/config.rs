//! Server configuration.

use std::time::Duration;

use quizroom_room::RoomDefaults;
use quizroom_session::SessionConfig;

/// Everything the server needs besides its quiz catalog.
///
/// Usually assembled through [`QuizroomServerBuilder`](crate::QuizroomServerBuilder).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed, which
    /// counts as leaving its room.
    pub idle_timeout: Duration,

    /// How long an accepted socket may take to complete the WebSocket
    /// upgrade before it is dropped.
    pub handshake_timeout: Duration,

    /// Settings, scoring, and queue size every new room starts from.
    pub room: RoomDefaults,

    pub session: SessionConfig,
}

impl ServerConfig {
    pub const DEFAULT_BIND: &'static str = "127.0.0.1:8080";
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: Self::DEFAULT_BIND.to_string(),
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
            room: RoomDefaults::default(),
            session: SessionConfig::default(),
        }
    }
}
