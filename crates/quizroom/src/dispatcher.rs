//! Event dispatcher: routes a connection's inbound events to its room.
//!
//! The dispatcher is shared by every connection task. It never holds the
//! session lock across an `.await`; room state lives in the room actors and
//! is reached through [`RoomHandle`]s.
//!
//! Connections outside any room are the lobby. Whenever the set of joinable
//! rooms may have changed, each of them is pushed a fresh `rooms_list`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quizroom_protocol::{ClientEvent, ConnId, Player, RoomCode, ServerEvent};
use quizroom_room::{
    Departure, PlayerSender, QuizCatalog, RoomError, RoomHandle, RoomRegistry,
};
use quizroom_session::{SessionError, SessionManager};

use crate::QuizroomError;

/// Routes client events to rooms and reports failures to the sender.
pub struct Dispatcher {
    registry: RoomRegistry,
    sessions: Mutex<SessionManager>,
    // Lock order: `sessions` before `outboxes`.
    outboxes: Mutex<HashMap<ConnId, PlayerSender>>,
    catalog: Arc<dyn QuizCatalog>,
}

impl Dispatcher {
    pub fn new(
        registry: RoomRegistry,
        sessions: SessionManager,
        catalog: Arc<dyn QuizCatalog>,
    ) -> Self {
        Self {
            registry,
            sessions: Mutex::new(sessions),
            outboxes: Mutex::new(HashMap::new()),
            catalog,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, SessionManager> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outboxes(&self) -> MutexGuard<'_, HashMap<ConnId, PlayerSender>> {
        self.outboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new connection and greets it with its id.
    ///
    /// # Errors
    /// [`SessionError::TooManyConnections`] at the configured limit.
    pub fn connect(&self, outbox: &PlayerSender) -> Result<ConnId, SessionError> {
        let conn = self.sessions().open()?;
        self.outboxes().insert(conn, outbox.clone());
        let _ = outbox.send(ServerEvent::Connected {
            connection_id: conn,
        });
        Ok(conn)
    }

    /// Handles one inbound event from `conn`.
    ///
    /// Never fails: rejections are reported to `outbox` only, as
    /// `room_full`, `room_not_found`, or `error`. A duplicate answer is
    /// dropped without a reply.
    pub async fn dispatch(
        &self,
        conn: ConnId,
        outbox: &PlayerSender,
        event: ClientEvent,
    ) {
        let kind = event.kind();
        let room = event.room_code().cloned();
        if let Err(err) = self.route(conn, outbox, event).await {
            tracing::debug!(%conn, event = kind, ?room, error = %err, "event rejected");
            if let Some(reply) = rejection(&err) {
                let _ = outbox.send(reply);
            }
        }
    }

    async fn route(
        &self,
        conn: ConnId,
        outbox: &PlayerSender,
        event: ClientEvent,
    ) -> Result<(), QuizroomError> {
        match event {
            ClientEvent::CreateRoom { player_name } => {
                self.create_room(conn, outbox, &player_name).await
            }
            ClientEvent::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(conn, outbox, room_code, player_name).await,
            ClientEvent::LeaveRoom { room_code } => {
                let room = self.registry.get_room(&room_code).await?;
                let departure = room.leave(conn).await?;
                self.settle_departure(conn, &room_code, departure).await;
                self.broadcast_rooms().await;
                Ok(())
            }
            ClientEvent::GetRooms => {
                let rooms = self.registry.list_joinable_rooms().await;
                let _ = outbox.send(ServerEvent::RoomsList { rooms });
                Ok(())
            }
            ClientEvent::KickPlayer {
                room_code,
                player_id,
            } => {
                self.room(&room_code).await?.kick(conn, player_id).await?;
                self.sessions().unbind(player_id, &room_code);
                self.broadcast_rooms().await;
                Ok(())
            }
            ClientEvent::UpdateSettings {
                room_code,
                settings,
            } => Ok(self
                .room(&room_code)
                .await?
                .update_settings(conn, settings)
                .await?),
            ClientEvent::SelectQuiz { room_code, quiz_id } => {
                let room = self.room(&room_code).await?;
                let quiz = self.catalog.get_quiz(&quiz_id);
                Ok(room.select_quiz(conn, quiz_id, quiz).await?)
            }
            ClientEvent::StartGame { room_code } => {
                self.room(&room_code).await?.start_game(conn).await?;
                // The room just left the joinable set.
                self.broadcast_rooms().await;
                Ok(())
            }
            ClientEvent::PlayerAnswer { room_code, answer } => Ok(self
                .room(&room_code)
                .await?
                .submit_answer(conn, answer)
                .await?),
            ClientEvent::StartNextQuestion { room_code } => Ok(self
                .room(&room_code)
                .await?
                .advance_question(conn)
                .await?),
            ClientEvent::ListQuizzes => {
                let quizzes = self.catalog.list_quizzes();
                let _ = outbox.send(ServerEvent::QuizzesList { quizzes });
                Ok(())
            }
            ClientEvent::GetRoomSnapshot { room_code } => {
                let snapshot = self.room(&room_code).await?.snapshot().await?;
                let _ = outbox.send(ServerEvent::RoomSnapshot { snapshot });
                Ok(())
            }
        }
    }

    async fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.registry.get_room(code).await
    }

    /// Fails if `conn` is bound to a room other than `target`.
    fn ensure_free(
        &self,
        conn: ConnId,
        target: Option<&RoomCode>,
    ) -> Result<(), SessionError> {
        match self.sessions().room_of(conn) {
            Some(current) if Some(current) != target => {
                Err(SessionError::AlreadyInRoom {
                    conn,
                    room: current.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn create_room(
        &self,
        conn: ConnId,
        outbox: &PlayerSender,
        player_name: &str,
    ) -> Result<(), QuizroomError> {
        let name = player_name.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidPlayerName.into());
        }
        self.ensure_free(conn, None)?;

        let host = Player::new(conn, name);
        let handle = self
            .registry
            .create_room(host.clone(), outbox.clone())
            .await?;
        let code = handle.code().clone();

        let bound = self.sessions().bind(conn, code.clone());
        if let Err(e) = bound {
            let _ = self.registry.remove_room(&code).await;
            return Err(e.into());
        }

        let _ = outbox.send(ServerEvent::RoomCreated {
            room_code: code,
            host,
        });
        self.broadcast_rooms().await;
        Ok(())
    }

    async fn join_room(
        &self,
        conn: ConnId,
        outbox: &PlayerSender,
        code: RoomCode,
        player_name: String,
    ) -> Result<(), QuizroomError> {
        self.ensure_free(conn, Some(&code))?;
        let room = self.room(&code).await?;
        room.join(conn, player_name, outbox.clone()).await?;
        self.sessions().bind(conn, code)?;
        self.broadcast_rooms().await;
        Ok(())
    }

    /// Pushes the current joinable rooms to every connection in the lobby.
    async fn broadcast_rooms(&self) {
        let rooms = self.registry.list_joinable_rooms().await;
        let lobby: Vec<PlayerSender> = {
            let sessions = self.sessions();
            self.outboxes()
                .iter()
                .filter(|(conn, _)| {
                    sessions.get(**conn).is_some_and(|s| !s.in_room())
                })
                .map(|(_, outbox)| outbox.clone())
                .collect()
        };
        tracing::trace!(rooms = rooms.len(), lobby = lobby.len(), "pushing rooms list");
        for outbox in lobby {
            let _ = outbox.send(ServerEvent::RoomsList {
                rooms: rooms.clone(),
            });
        }
    }

    /// Brings sessions and the registry in line after `conn` left `code`.
    async fn settle_departure(
        &self,
        conn: ConnId,
        code: &RoomCode,
        departure: Departure,
    ) {
        match departure {
            Departure::Left => {
                self.sessions().unbind(conn, code);
            }
            Departure::Dissolved => {
                // The actor stops on its own; the registry may already have
                // dropped it.
                let _ = self.registry.remove_room(code).await;
                let released = self.sessions().release_room(code);
                let rooms_left = self.registry.room_count().await;
                tracing::info!(
                    room = %code,
                    released = released.len(),
                    rooms_left,
                    "room dissolved by host"
                );
            }
        }
    }

    /// Tears down a closed connection: its session, and its seat in any
    /// room, which counts as leaving.
    pub async fn disconnect(&self, conn: ConnId) {
        let session = match self.sessions().close(conn) {
            Ok(session) => session,
            Err(_) => return,
        };
        self.outboxes().remove(&conn);
        tracing::debug!(%conn, age_ms = session.age().as_millis() as u64, "session closed");

        let Some(code) = session.room else { return };
        let room = match self.registry.get_room(&code).await {
            Ok(room) => room,
            Err(_) => return,
        };
        match room.leave(conn).await {
            Ok(departure) => {
                self.settle_departure(conn, &code, departure).await;
                self.broadcast_rooms().await;
            }
            Err(e) => {
                tracing::debug!(%conn, room = %code, error = %e, "leave on disconnect failed");
            }
        }
    }
}

/// What the sender is told when its event is rejected.
fn rejection(err: &QuizroomError) -> Option<ServerEvent> {
    match err {
        QuizroomError::Room(RoomError::RoomFull(_)) => Some(ServerEvent::RoomFull),
        QuizroomError::Room(RoomError::NotFound(_)) => Some(ServerEvent::RoomNotFound),
        QuizroomError::Room(RoomError::DuplicateAnswer(_)) => None,
        other => Some(ServerEvent::error(other.to_string())),
    }
}
