//! Room defaults and the stage dispatch table.

use std::fmt;

use quizroom_protocol::{RoomStatus, Settings};
use serde::{Deserialize, Serialize};

use crate::{RoomError, ScoringRule};

// ---------------------------------------------------------------------------
// RoomDefaults
// ---------------------------------------------------------------------------

/// Server-wide parameters every new room starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDefaults {
    /// Settings a room has until its host changes them.
    pub settings: Settings,

    /// How answers are scored. Fixed for the life of the room.
    pub scoring: ScoringRule,

    /// Capacity of each room actor's command queue. Senders wait when it is
    /// full.
    pub channel_size: usize,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            scoring: ScoringRule::default(),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle, at finer grain than [`RoomStatus`].
///
/// ```text
/// Waiting → Collecting ⇄ Revealing → Finished
/// ```
///
/// - **Waiting**: accepting players; the host configures and picks a quiz.
/// - **Collecting**: a question is open and answers are being recorded.
/// - **Revealing**: the question closed; the scoreboard is on screen until
///   the host advances.
/// - **Finished**: the last question was revealed and the host advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Waiting,
    Collecting,
    Revealing,
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Waiting,
        Stage::Collecting,
        Stage::Revealing,
        Stage::Finished,
    ];

    /// The coarse status shown to clients.
    pub fn status(self) -> RoomStatus {
        match self {
            Self::Waiting => RoomStatus::Waiting,
            Self::Collecting | Self::Revealing => RoomStatus::InProgress,
            Self::Finished => RoomStatus::Finished,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Collecting => write!(f, "collecting answers"),
            Self::Revealing => write!(f, "revealing scores"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Every state-changing operation a room accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Join,
    Leave,
    Kick,
    UpdateSettings,
    SelectQuiz,
    StartGame,
    SubmitAnswer,
    Deadline,
    AdvanceQuestion,
}

impl Transition {
    pub const ALL: [Transition; 9] = [
        Transition::Join,
        Transition::Leave,
        Transition::Kick,
        Transition::UpdateSettings,
        Transition::SelectQuiz,
        Transition::StartGame,
        Transition::SubmitAnswer,
        Transition::Deadline,
        Transition::AdvanceQuestion,
    ];

    /// The dispatch table.
    pub fn allowed_in(self, stage: Stage) -> bool {
        use Stage::*;
        match self {
            Self::Join
            | Self::UpdateSettings
            | Self::SelectQuiz
            | Self::StartGame => stage == Waiting,
            Self::Leave | Self::Kick => true,
            Self::SubmitAnswer | Self::Deadline => stage == Collecting,
            Self::AdvanceQuestion => stage == Revealing,
        }
    }

    /// Fails with [`RoomError::InvalidState`] unless the table allows this
    /// transition in `stage`.
    pub fn check(self, stage: Stage) -> Result<(), RoomError> {
        if self.allowed_in(stage) {
            Ok(())
        } else {
            Err(RoomError::InvalidState(format!(
                "{self} is not allowed while the room is {stage}"
            )))
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Kick => "kick",
            Self::UpdateSettings => "update settings",
            Self::SelectQuiz => "select quiz",
            Self::StartGame => "start game",
            Self::SubmitAnswer => "answer",
            Self::Deadline => "deadline",
            Self::AdvanceQuestion => "next question",
        };
        f.write_str(name)
    }
}
