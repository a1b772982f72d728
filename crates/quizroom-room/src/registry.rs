//! Room registry: creates, finds, lists, and removes rooms.

use std::collections::HashMap;

use quizroom_protocol::{Player, RoomCode, RoomListEntry};
use rand::Rng;
use tokio::sync::RwLock;

use crate::room::spawn_room;
use crate::{PlayerSender, RoomDefaults, RoomError, RoomHandle};

/// How many fresh codes `create_room` tries before giving up.
const MAX_CODE_ATTEMPTS: usize = 32;

type CodeSource = Box<dyn Fn() -> RoomCode + Send + Sync>;

/// Process-wide map from room code to running room.
///
/// Lookups take the read lock; only create and remove take the write lock.
/// Room actors are never awaited while a lock is held, except for the
/// uniqueness check inside `create_room`, which awaits nothing.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    defaults: RoomDefaults,
    codes: CodeSource,
}

impl RoomRegistry {
    /// Creates an empty registry that generates random codes.
    pub fn new(defaults: RoomDefaults) -> Self {
        Self::with_code_source(defaults, random_code)
    }

    /// Creates an empty registry that draws candidate codes from `codes`.
    pub fn with_code_source(
        defaults: RoomDefaults,
        codes: impl Fn() -> RoomCode + Send + Sync + 'static,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            defaults,
            codes: Box::new(codes),
        }
    }

    /// Opens a room with `host` as its host and spawns its actor.
    ///
    /// # Errors
    /// [`RoomError::CodeSpaceExhausted`] if no unused code turns up within
    /// the retry budget.
    pub async fn create_room(
        &self,
        host: Player,
        host_sender: PlayerSender,
    ) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.write().await;

        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| (self.codes)())
            .find(|code| !rooms.contains_key(code))
            .ok_or(RoomError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))?;

        let host_id = host.id;
        let handle = spawn_room(
            code.clone(),
            host,
            host_sender,
            self.defaults.settings,
            self.defaults.scoring,
            self.defaults.channel_size,
        );
        rooms.insert(code.clone(), handle.clone());

        tracing::info!(room = %code, host = %host_id, rooms = rooms.len(), "room created");
        Ok(handle)
    }

    /// # Errors
    /// [`RoomError::NotFound`] if no room has this code.
    pub async fn get_room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Every room still accepting players, ordered by code.
    ///
    /// Handles are cloned under the read lock and queried after it is
    /// released. Rooms that stop in between are skipped.
    pub async fn list_joinable_rooms(&self) -> Vec<RoomListEntry> {
        let handles: Vec<RoomHandle> =
            self.rooms.read().await.values().cloned().collect();

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                if info.status.is_joinable() {
                    entries.push(info);
                }
            }
        }
        entries.sort_by(|a, b| a.room_code.as_str().cmp(b.room_code.as_str()));
        entries
    }

    /// Removes the room and shuts its actor down.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no room has this code.
    pub async fn remove_room(&self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        // The actor may already have stopped on its own.
        let _ = handle.shutdown().await;

        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomDefaults::default())
    }
}

/// A random code of [`RoomCode::LENGTH`] characters from
/// [`RoomCode::ALPHABET`].
pub fn random_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..RoomCode::LENGTH)
        .map(|_| {
            let i = rng.random_range(0..RoomCode::ALPHABET.len());
            char::from(RoomCode::ALPHABET[i])
        })
        .collect();
    RoomCode::new(code)
}
