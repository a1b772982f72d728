//! Quiz content as served by the catalog, and the redacted views sent to
//! players.
//!
//! A [`Quiz`] carries the correct answers. It only ever reaches the host's
//! connection whole; everyone else receives a [`QuizView`] built with
//! [`Reveal::Hidden`] until a question's scores are revealed.

use serde::{Deserialize, Serialize};

/// Number of options every question has.
pub const OPTION_COUNT: usize = 4;

/// Whether a view includes correct answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// Include `correct_option_index`.
    Full,
    /// Strip `correct_option_index`.
    Hidden,
}

/// A single multiple-choice question.
///
/// Accepts the field names of the legacy quiz files (`question`,
/// `correctAnswer`) as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_option_index: usize,
}

impl Question {
    /// The text of the correct option.
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .get(self.correct_option_index)
            .map(String::as_str)
    }

    /// Exact string comparison against the correct option.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_option() == Some(answer)
    }

    pub fn view(&self, reveal: Reveal) -> QuestionView {
        QuestionView {
            text: self.text.clone(),
            options: self.options.clone(),
            correct_option_index: match reveal {
                Reveal::Full => Some(self.correct_option_index),
                Reveal::Hidden => None,
            },
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text is empty".into());
        }
        if self.options.len() != OPTION_COUNT {
            return Err(format!(
                "question {:?} has {} options, expected {OPTION_COUNT}",
                self.text,
                self.options.len()
            ));
        }
        if self.correct_option_index >= OPTION_COUNT {
            return Err(format!(
                "question {:?} has correct option {} out of range",
                self.text, self.correct_option_index
            ));
        }
        Ok(())
    }
}

/// A complete quiz, including the correct answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Validates the shape the room relies on: at least one question, each
    /// with exactly [`OPTION_COUNT`] options and an in-range answer index.
    pub fn check(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("quiz id is empty".into());
        }
        if self.questions.is_empty() {
            return Err(format!("quiz {} has no questions", self.id));
        }
        for question in &self.questions {
            question
                .check()
                .map_err(|reason| format!("quiz {}: {reason}", self.id))?;
        }
        Ok(())
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            question_count: self.questions.len(),
        }
    }

    pub fn view(&self, reveal: Reveal) -> QuizView {
        QuizView {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            questions: self.questions.iter().map(|q| q.view(reveal)).collect(),
        }
    }
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub question_count: usize,
}

/// A quiz as sent over the wire, possibly without answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuestionView>,
}

/// A question as sent over the wire, possibly without its answer.
///
/// `correct_option_index` is omitted from the JSON entirely when hidden,
/// rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option_index: Option<usize>,
}
