//! The session manager: allocates connection ids and tracks which room each
//! connection is in.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself; it is a plain `HashMap`.
//! The dispatcher owns one behind a `std::sync::Mutex` and never holds the
//! lock across an `.await`.

use std::collections::HashMap;

use quizroom_protocol::{ConnId, RoomCode};

use crate::{Session, SessionConfig, SessionError};

/// Tracks every open connection.
///
/// ## Lifecycle
///
/// ```text
/// open() ──→ bind(room) ──→ unbind(room) ──→ close()
///   │                                          ▲
///   └──────────────────────────────────────────┘
/// ```
pub struct SessionManager {
    sessions: HashMap<ConnId, Session>,
    /// Next id to hand out. Ids are never reused within a process.
    next_id: u64,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Opens a session for a newly accepted connection and returns its id.
    ///
    /// # Errors
    /// Returns [`SessionError::TooManyConnections`] at the configured limit.
    pub fn open(&mut self) -> Result<ConnId, SessionError> {
        if self.sessions.len() >= self.config.max_connections {
            tracing::warn!(
                limit = self.config.max_connections,
                "rejecting connection, session limit reached"
            );
            return Err(SessionError::TooManyConnections(
                self.config.max_connections,
            ));
        }

        let conn_id = ConnId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(conn_id, Session::new(conn_id));

        tracing::debug!(%conn_id, "session opened");
        Ok(conn_id)
    }

    /// Binds a connection to a room.
    ///
    /// Binding to the room the connection is already in is a no-op.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the session doesn't exist.
    /// - [`SessionError::AlreadyInRoom`] if bound to a different room.
    pub fn bind(
        &mut self,
        conn_id: ConnId,
        room: RoomCode,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;

        match &session.room {
            Some(current) if *current == room => Ok(()),
            Some(current) => Err(SessionError::AlreadyInRoom {
                conn: conn_id,
                room: current.clone(),
            }),
            None => {
                tracing::debug!(%conn_id, room = %room, "session bound");
                session.room = Some(room);
                Ok(())
            }
        }
    }

    /// Clears the binding if the connection is bound to `room`.
    ///
    /// Returns `true` if a binding was removed.
    pub fn unbind(&mut self, conn_id: ConnId, room: &RoomCode) -> bool {
        let Some(session) = self.sessions.get_mut(&conn_id) else {
            return false;
        };
        if session.room.as_ref() != Some(room) {
            return false;
        }
        session.room = None;
        tracing::debug!(%conn_id, room = %room, "session unbound");
        true
    }

    /// Clears every binding to `room`, returning the affected connections in
    /// ascending id order.
    ///
    /// Used when a room is dissolved.
    pub fn release_room(&mut self, room: &RoomCode) -> Vec<ConnId> {
        let mut released: Vec<ConnId> = self
            .sessions
            .values_mut()
            .filter(|session| session.room.as_ref() == Some(room))
            .map(|session| {
                session.room = None;
                session.conn_id
            })
            .collect();
        released.sort();
        if !released.is_empty() {
            tracing::debug!(room = %room, count = released.len(), "room released");
        }
        released
    }

    /// The room the connection is bound to.
    pub fn room_of(&self, conn_id: ConnId) -> Option<&RoomCode> {
        self.sessions.get(&conn_id)?.room.as_ref()
    }

    /// Closes the session, returning it so the caller can act on the room
    /// binding it had.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists.
    pub fn close(&mut self, conn_id: ConnId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        tracing::debug!(
            %conn_id,
            room = ?session.room.as_ref().map(RoomCode::as_str),
            age_ms = session.age().as_millis() as u64,
            "session closed"
        );
        Ok(session)
    }

    pub fn get(&self, conn_id: ConnId) -> Option<&Session> {
        self.sessions.get(&conn_id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
