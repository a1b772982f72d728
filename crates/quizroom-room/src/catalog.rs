//! The quiz catalog: where rooms get their questions from.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use quizroom_protocol::{Quiz, QuizSummary};

use crate::CatalogError;

/// Read-only source of quizzes.
///
/// `Send + Sync + 'static` because one catalog is shared by every
/// connection for the lifetime of the server.
pub trait QuizCatalog: Send + Sync + 'static {
    /// Summaries of every quiz, in catalog order.
    fn list_quizzes(&self) -> Vec<QuizSummary>;

    /// The quiz with this id, if any.
    fn get_quiz(&self, id: &str) -> Option<Arc<Quiz>>;
}

/// A catalog held entirely in memory.
///
/// Every quiz is validated on construction, so rooms can index questions
/// and options without further checks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    quizzes: Vec<Arc<Quiz>>,
}

impl InMemoryCatalog {
    /// # Errors
    /// [`CatalogError::InvalidQuiz`] for a quiz with no questions or a
    /// malformed question, [`CatalogError::DuplicateId`] if two quizzes
    /// share an id.
    pub fn new(quizzes: Vec<Quiz>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for quiz in &quizzes {
            quiz.check().map_err(CatalogError::InvalidQuiz)?;
            if !seen.insert(quiz.id.as_str()) {
                return Err(CatalogError::DuplicateId(quiz.id.clone()));
            }
        }
        Ok(Self {
            quizzes: quizzes.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parses a JSON array of quizzes.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let quizzes: Vec<Quiz> = serde_json::from_str(json)?;
        Self::new(quizzes)
    }

    /// Reads and parses a JSON catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            quizzes = catalog.len(),
            "quiz catalog loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl QuizCatalog for InMemoryCatalog {
    fn list_quizzes(&self) -> Vec<QuizSummary> {
        self.quizzes.iter().map(|quiz| quiz.summary()).collect()
    }

    fn get_quiz(&self, id: &str) -> Option<Arc<Quiz>> {
        self.quizzes.iter().find(|quiz| quiz.id == id).cloned()
    }
}
