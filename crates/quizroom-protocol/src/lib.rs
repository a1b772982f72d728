//! Wire protocol for Quizroom.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): the tagged messages
//!   exchanged over a connection.
//! - **Types** ([`ConnId`], [`RoomCode`], [`Settings`], [`Recipient`], …):
//!   identities, addressing, and read models carried inside events.
//! - **Quiz model** ([`Quiz`], [`Question`], [`QuizView`]): catalog content
//!   and its answer-redacted views.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ events.
//!
//! It knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Dispatcher → Room
//! ```

mod codec;
mod error;
mod events;
mod quiz;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use quiz::{
    OPTION_COUNT, Question, QuestionView, Quiz, QuizSummary, QuizView, Reveal,
};
pub use types::{
    AnswerEntry, ConnId, Player, Recipient, RoomCode, RoomListEntry,
    RoomSnapshot, RoomStatus, ScoreEntry, Settings,
};
