//! Inbound and outbound events.
//!
//! Both enums are internally tagged with `type`, so a join request on the
//! wire reads:
//!
//! ```json
//! { "type": "join_room", "room_code": "K7Q2ZD", "player_name": "Alice" }
//! ```
//!
//! The sender's identity is never part of an inbound event; the server
//! attaches the [`ConnId`] of the socket the frame arrived on.

use serde::{Deserialize, Serialize};

use crate::quiz::{QuestionView, QuizSummary, QuizView};
use crate::types::{
    AnswerEntry, ConnId, Player, RoomCode, RoomListEntry, RoomSnapshot,
    ScoreEntry, Settings,
};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open a new room with the sender as host.
    CreateRoom { player_name: String },

    /// Join an existing room as a player.
    JoinRoom {
        room_code: RoomCode,
        player_name: String,
    },

    /// Leave a room. A host leaving closes the room.
    LeaveRoom { room_code: RoomCode },

    /// List rooms that are still accepting players.
    GetRooms,

    /// Host only: remove a player.
    KickPlayer {
        room_code: RoomCode,
        player_id: ConnId,
    },

    /// Host only: replace the room settings.
    UpdateSettings {
        room_code: RoomCode,
        settings: Settings,
    },

    /// Host only: pick the quiz to play.
    SelectQuiz { room_code: RoomCode, quiz_id: String },

    /// Host only: start the first question.
    StartGame { room_code: RoomCode },

    /// Player: answer the current question with the chosen option's text.
    PlayerAnswer { room_code: RoomCode, answer: String },

    /// Host only: move past the scoreboard to the next question.
    StartNextQuestion { room_code: RoomCode },

    /// List the quizzes in the catalog.
    ListQuizzes,

    /// Fetch the current state of a room.
    GetRoomSnapshot { room_code: RoomCode },
}

impl ClientEvent {
    /// The room this event targets, if any.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            Self::CreateRoom { .. } | Self::GetRooms | Self::ListQuizzes => None,
            Self::JoinRoom { room_code, .. }
            | Self::LeaveRoom { room_code }
            | Self::KickPlayer { room_code, .. }
            | Self::UpdateSettings { room_code, .. }
            | Self::SelectQuiz { room_code, .. }
            | Self::StartGame { room_code }
            | Self::PlayerAnswer { room_code, .. }
            | Self::StartNextQuestion { room_code }
            | Self::GetRoomSnapshot { room_code } => Some(room_code),
        }
    }

    /// The wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::GetRooms => "get_rooms",
            Self::KickPlayer { .. } => "kick_player",
            Self::UpdateSettings { .. } => "update_settings",
            Self::SelectQuiz { .. } => "select_quiz",
            Self::StartGame { .. } => "start_game",
            Self::PlayerAnswer { .. } => "player_answer",
            Self::StartNextQuestion { .. } => "start_next_question",
            Self::ListQuizzes => "list_quizzes",
            Self::GetRoomSnapshot { .. } => "get_room_snapshot",
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First event on every connection: the identity the server assigned.
    Connected { connection_id: ConnId },

    /// The sender's room was created.
    RoomCreated { room_code: RoomCode, host: Player },

    /// Membership snapshot after a join. `is_owner` is computed per
    /// recipient.
    PlayerJoinedRoom {
        room_code: RoomCode,
        players: Vec<Player>,
        host: Player,
        settings: Settings,
        selected_quiz: Option<QuizView>,
        is_owner: bool,
    },

    /// Membership after a player left or was kicked.
    PlayerLeftRoom { players: Vec<Player>, host: Player },

    RoomsList { rooms: Vec<RoomListEntry> },

    RoomFull,

    RoomNotFound,

    SettingsUpdated { settings: Settings },

    QuizSelected { quiz: QuizView },

    /// The quiz started; question 0 is open for answers.
    GameStarted {
        quiz: QuizView,
        settings: Settings,
        players: Vec<Player>,
    },

    /// Host only: answer progress for the open question.
    AnswerReceived { answered: usize, expected: usize },

    /// The open question closed; scores are revealed.
    AllPlayersAnswered {
        question_index: usize,
        scoreboard: Vec<ScoreEntry>,
        correct_answer: String,
        current_question: QuestionView,
        answers: Vec<AnswerEntry>,
    },

    /// The next question is open for answers.
    NextQuestion {
        question_index: usize,
        question: QuestionView,
        time_limit_seconds: u32,
    },

    QuizFinished { scoreboard: Vec<ScoreEntry> },

    /// The recipient was removed by the host.
    Kicked { room_code: RoomCode },

    /// The room no longer exists.
    RoomClosed { room_code: RoomCode, reason: String },

    QuizzesList { quizzes: Vec<QuizSummary> },

    RoomSnapshot { snapshot: RoomSnapshot },

    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
