//! Rooms for Quizroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's state machine and its answer deadline.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, lists joinable ones
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`]: the pure, synchronous quiz state machine
//! - [`Stage`] / [`Transition`]: the dispatch table every transition
//!   passes through
//! - [`ScoringRule`] / [`score`]: answer scoring
//! - [`QuizCatalog`]: where quizzes come from

mod catalog;
mod config;
mod error;
mod registry;
mod room;
mod scoring;
mod state;

pub use catalog::{InMemoryCatalog, QuizCatalog};
pub use config::{RoomDefaults, Stage, Transition};
pub use error::{CatalogError, RoomError};
pub use registry::{RoomRegistry, random_code};
pub use room::{PlayerSender, RoomHandle};
pub use scoring::{Answer, Choice, ScoringRule, score};
pub use state::{Departure, Outbox, Room};
