//! `QuizroomServer` builder and server loop.
//!
//! This is the entry point for running a quiz server. It ties together all
//! the layers: transport → protocol → dispatcher → rooms.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quizroom_protocol::{Codec, JsonCodec, Settings};
use quizroom_room::{QuizCatalog, RoomRegistry, ScoringRule};
use quizroom_session::SessionManager;
use quizroom_transport::{Handshake, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Dispatcher, QuizroomError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a quiz server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use quizroom::prelude::*;
///
/// # async fn run() -> Result<(), QuizroomError> {
/// let catalog = InMemoryCatalog::from_file("quizzes.json")?;
/// let server = QuizroomServer::builder()
///     .bind("0.0.0.0:8080")
///     .scoring(ScoringRule::TimeDecay { points_per_second: 10 })
///     .build(Arc::new(catalog))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct QuizroomServerBuilder {
    config: ServerConfig,
}

impl QuizroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Closes connections that stay silent this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Drops accepted sockets that haven't finished the WebSocket upgrade
    /// within `timeout`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Settings new rooms start with.
    pub fn default_settings(mut self, settings: Settings) -> Self {
        self.config.room.settings = settings;
        self
    }

    pub fn scoring(mut self, rule: ScoringRule) -> Self {
        self.config.room.scoring = rule;
        self
    }

    /// Capacity of each room's command queue.
    pub fn room_channel_size(mut self, size: usize) -> Self {
        self.config.room.channel_size = size;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.session.max_connections = max;
        self
    }

    /// Binds the listener and assembles the server around `catalog`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// [`QuizroomError::Room`] if the default settings are out of range,
    /// [`QuizroomError::Transport`] if the address can't be bound.
    pub async fn build(
        self,
        catalog: Arc<dyn QuizCatalog>,
    ) -> Result<QuizroomServer<JsonCodec>, QuizroomError> {
        let config = self.config;
        config
            .room
            .settings
            .check()
            .map_err(quizroom_room::RoomError::InvalidSettings)?;

        let transport = WebSocketTransport::bind(&config.bind_addr).await?;

        let dispatcher = Dispatcher::new(
            RoomRegistry::new(config.room.clone()),
            SessionManager::new(config.session.clone()),
            catalog,
        );
        let state = Arc::new(ServerState {
            dispatcher,
            codec: JsonCodec,
            idle_timeout: config.idle_timeout,
            handshake_timeout: config.handshake_timeout,
        });

        tracing::info!(
            scoring = %config.room.scoring,
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "server configured"
        );
        Ok(QuizroomServer { transport, state })
    }
}

impl Default for QuizroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A quiz server bound to its address.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizroomServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl QuizroomServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> QuizroomServerBuilder {
        QuizroomServerBuilder::new()
    }
}

impl<C: Codec> QuizroomServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, QuizroomError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a task for each accepted socket, which completes the upgrade
    /// and then runs the connection handler. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), QuizroomError> {
        tracing::info!(addr = %self.local_addr()?, "quiz server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match tokio::time::timeout(
                            state.handshake_timeout,
                            pending.complete(),
                        )
                        .await
                        {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "handshake timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
