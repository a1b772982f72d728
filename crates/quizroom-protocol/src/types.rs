//! Identity, addressing, and room-level types that travel on the wire.
//!
//! Everything here is serialized to JSON and read by browser clients, so
//! the serde attributes define the public wire shape. Field names are
//! snake_case throughout.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::quiz::QuizView;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of one live connection.
///
/// Assigned by the server when the socket is accepted and announced to the
/// client in the `connected` event. Every inbound event is attributed to
/// the `ConnId` of the socket it arrived on; clients never claim an
/// identity themselves.
///
/// `#[serde(transparent)]` makes `ConnId(42)` travel as the plain number
/// `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// The short code players type to join a room, e.g. `"K7Q2ZD"`.
///
/// Generated by the registry on creation and never changed afterwards. It
/// is the only handle clients have on a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Length of generated codes.
    pub const LENGTH: usize = 6;

    /// Characters generated codes are drawn from.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Wraps an existing code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who an outbound event is addressed to.
///
/// Room transitions return `(Recipient, ServerEvent)` pairs; the room actor
/// resolves them against its membership at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every current member of the room, host included.
    All,

    /// One connection.
    Player(ConnId),

    /// Every current member except one connection.
    AllExcept(ConnId),
}

impl Recipient {
    /// Returns `true` if a connection with this id is addressed, given that
    /// it is currently part of the room.
    pub fn includes(&self, conn: ConnId) -> bool {
        match self {
            Self::All => true,
            Self::Player(target) => *target == conn,
            Self::AllExcept(excluded) => *excluded != conn,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A participant as shown to other participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// The participant's connection.
    pub id: ConnId,
    /// Display name chosen when creating or joining.
    pub name: String,
}

impl Player {
    pub fn new(id: ConnId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-room game settings, editable by the host while the room waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds players get to answer each question.
    pub response_time_seconds: u32,

    /// Maximum number of players, not counting the host.
    pub max_players: usize,
}

impl Settings {
    /// Accepted values for `response_time_seconds`.
    pub const RESPONSE_TIME_SECONDS: RangeInclusive<u32> = 5..=30;

    /// Accepted values for `max_players`.
    pub const MAX_PLAYERS: RangeInclusive<usize> = 2..=10;

    /// The answer window as a `Duration`.
    pub fn response_time(&self) -> Duration {
        Duration::from_secs(u64::from(self.response_time_seconds))
    }

    /// Checks both fields against their ranges.
    ///
    /// Out-of-range values are reported, never clamped.
    pub fn check(&self) -> Result<(), String> {
        if !Self::RESPONSE_TIME_SECONDS.contains(&self.response_time_seconds) {
            return Err(format!(
                "response_time_seconds must be within {}..={}, got {}",
                Self::RESPONSE_TIME_SECONDS.start(),
                Self::RESPONSE_TIME_SECONDS.end(),
                self.response_time_seconds
            ));
        }
        if !Self::MAX_PLAYERS.contains(&self.max_players) {
            return Err(format!(
                "max_players must be within {}..={}, got {}",
                Self::MAX_PLAYERS.start(),
                Self::MAX_PLAYERS.end(),
                self.max_players
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            response_time_seconds: 15,
            max_players: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The coarse lifecycle of a room.
///
/// Transitions only move forward:
///
/// ```text
/// Waiting → InProgress → Finished
/// ```
///
/// - **Waiting**: accepting players; the host configures settings and
///   picks a quiz.
/// - **InProgress**: the question loop is running.
/// - **Finished**: the last question was revealed and the host closed the
///   quiz. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// One row of the lobby's room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub room_code: RoomCode,
    /// Display name of the host.
    pub host: String,
    /// Players in the room, host excluded.
    pub member_count: usize,
    pub status: RoomStatus,
    pub settings: Settings,
}

/// A player's running total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: ConnId,
    pub name: String,
    pub score: u32,
}

/// How one player answered the question that was just revealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub player_id: ConnId,
    pub name: String,
    /// The option text, or `"default"` if the player did not answer in time.
    pub answer: String,
    /// Seconds between question start and the answer being recorded.
    pub response_time_seconds: f64,
    pub correct: bool,
    /// Points earned on this question.
    pub points: u32,
}

/// Everything a client needs to rebuild a room screen without replaying
/// past events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub status: RoomStatus,
    pub settings: Settings,
    /// Selected quiz with correct answers stripped.
    pub selected_quiz: Option<QuizView>,
    pub players: Vec<Player>,
    pub host: Player,
}
