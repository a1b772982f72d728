//! Connection sessions for Quizroom.
//!
//! Every accepted socket gets a [`Session`]: a server-assigned [`ConnId`]
//! and, once the connection creates or joins a room, the code of that room.
//! The dispatcher consults the binding to route disconnects to the right
//! room and to stop one connection from sitting in two rooms at once.
//!
//! There is no reconnection. Closing a socket ends its session, and the
//! room treats it as a departure.
//!
//! ```text
//! Dispatcher (above)  ← binds/unbinds sessions as rooms change
//!     ↕
//! Session Layer (this crate)  ← ConnId allocation, conn → room binding
//!     ↕
//! Protocol Layer (below)  ← ConnId, RoomCode
//! ```
//!
//! [`ConnId`]: quizroom_protocol::ConnId

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig};
