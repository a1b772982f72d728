//! Answer scoring.
//!
//! [`score`] is a pure function: the same rule, question, and answer always
//! produce the same points.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use quizroom_protocol::{ConnId, Question};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// What a player chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// The text of an option, compared exactly against the correct one.
    Option(String),
    /// No answer before the deadline. Never correct.
    Default,
}

impl Choice {
    /// Wire text of [`Choice::Default`].
    pub const SENTINEL: &'static str = "default";

    /// Interprets submitted text. The sentinel text maps to
    /// [`Choice::Default`].
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text == Self::SENTINEL {
            Self::Default
        } else {
            Self::Option(text)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Option(text) => text,
            Self::Default => Self::SENTINEL,
        }
    }
}

/// One recorded answer to the open question. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub conn: ConnId,
    pub choice: Choice,
    /// Time from question start to the answer, measured by the server.
    pub response_time: Duration,
    pub recorded_at: Instant,
}

impl Answer {
    pub fn is_correct(&self, question: &Question) -> bool {
        match &self.choice {
            Choice::Option(text) => question.is_correct(text),
            Choice::Default => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ScoringRule
// ---------------------------------------------------------------------------

/// How a correct answer is rewarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScoringRule {
    /// A fixed number of points per correct answer.
    Flat { points: u32 },
    /// `points_per_second` for every second left on the clock, rounded to
    /// the nearest point.
    TimeDecay { points_per_second: u32 },
}

impl ScoringRule {
    /// Points per second used by `time-decay` when none is given.
    pub const DEFAULT_POINTS_PER_SECOND: u32 = 10;
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self::Flat { points: 1 }
    }
}

impl fmt::Display for ScoringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat { points } => write!(f, "flat:{points}"),
            Self::TimeDecay { points_per_second } => {
                write!(f, "time-decay:{points_per_second}")
            }
        }
    }
}

/// Parses `flat`, `flat:N`, `time-decay`, or `time-decay:N`.
impl FromStr for ScoringRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let number = |default: u32| -> Result<u32, String> {
            arg.map_or(Ok(default), |a| {
                a.trim()
                    .parse()
                    .map_err(|_| format!("invalid points value {a:?}"))
            })
        };
        match name.trim() {
            "flat" => Ok(Self::Flat { points: number(1)? }),
            "time-decay" | "time_decay" => Ok(Self::TimeDecay {
                points_per_second: number(Self::DEFAULT_POINTS_PER_SECOND)?,
            }),
            other => Err(format!(
                "unknown scoring rule {other:?}, expected flat or time-decay"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Points `answer` earns on `question` under `rule`.
///
/// Incorrect answers, including [`Choice::Default`], earn 0.
pub fn score(
    rule: &ScoringRule,
    question: &Question,
    answer: &Answer,
    time_limit: Duration,
) -> u32 {
    if !answer.is_correct(question) {
        return 0;
    }

    match *rule {
        ScoringRule::Flat { points } => points,
        ScoringRule::TimeDecay { points_per_second } => {
            let left = time_limit.saturating_sub(answer.response_time);
            (f64::from(points_per_second) * left.as_secs_f64()).round() as u32
        }
    }
}
