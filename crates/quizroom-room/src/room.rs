//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and is reached only through its command
//! channel, so all transitions of a room are serialized without locks. The
//! actor also owns the room's answer deadline and sits in a
//! `tokio::select!` over commands and the timer.

use std::collections::HashMap;
use std::sync::Arc;

use quizroom_protocol::{
    ConnId, Player, Quiz, Recipient, RoomCode, RoomListEntry, RoomSnapshot,
    ServerEvent, Settings,
};
use quizroom_timer::{DeadlineTimer, TimerConfig};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant as TokioInstant;

use crate::state::{Departure, Outbox, Room};
use crate::{RoomError, ScoringRule};

/// Channel sender for delivering outbound events to one connection.
///
/// Unbounded, so a slow socket never blocks the room.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
///
/// Every variant except `Shutdown` carries a reply channel; the caller
/// waits on it, which keeps each connection's requests in order.
pub(crate) enum RoomCommand {
    Join {
        conn: ConnId,
        name: String,
        sender: PlayerSender,
        reply: Reply<()>,
    },
    Leave {
        conn: ConnId,
        reply: Reply<Departure>,
    },
    Kick {
        requester: ConnId,
        target: ConnId,
        reply: Reply<()>,
    },
    UpdateSettings {
        requester: ConnId,
        settings: Settings,
        reply: Reply<()>,
    },
    SelectQuiz {
        requester: ConnId,
        quiz_id: String,
        quiz: Option<Arc<Quiz>>,
        reply: Reply<()>,
    },
    StartGame {
        requester: ConnId,
        reply: Reply<()>,
    },
    SubmitAnswer {
        conn: ConnId,
        answer: String,
        reply: Reply<()>,
    },
    AdvanceQuestion {
        requester: ConnId,
        reply: Reply<()>,
    },
    GetInfo {
        reply: Reply<RoomListEntry>,
    },
    GetSnapshot {
        reply: Reply<RoomSnapshot>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone: an `mpsc::Sender` and the room code. The registry holds
/// one per room.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?
    }

    /// Adds a player. On success `sender` starts receiving room events.
    pub async fn join(
        &self,
        conn: ConnId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            conn,
            name,
            sender,
            reply,
        })
        .await
    }

    /// Removes a connection. [`Departure::Dissolved`] means the host left
    /// and the actor has stopped.
    pub async fn leave(&self, conn: ConnId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Leave { conn, reply }).await
    }

    pub async fn kick(
        &self,
        requester: ConnId,
        target: ConnId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Kick {
            requester,
            target,
            reply,
        })
        .await
    }

    pub async fn update_settings(
        &self,
        requester: ConnId,
        settings: Settings,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::UpdateSettings {
            requester,
            settings,
            reply,
        })
        .await
    }

    /// `quiz` is the catalog lookup for `quiz_id`, done by the caller so the
    /// actor never touches the catalog.
    pub async fn select_quiz(
        &self,
        requester: ConnId,
        quiz_id: impl Into<String>,
        quiz: Option<Arc<Quiz>>,
    ) -> Result<(), RoomError> {
        let quiz_id = quiz_id.into();
        self.request(|reply| RoomCommand::SelectQuiz {
            requester,
            quiz_id,
            quiz,
            reply,
        })
        .await
    }

    pub async fn start_game(&self, requester: ConnId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartGame { requester, reply })
            .await
    }

    pub async fn submit_answer(
        &self,
        conn: ConnId,
        answer: impl Into<String>,
    ) -> Result<(), RoomError> {
        let answer = answer.into();
        self.request(|reply| RoomCommand::SubmitAnswer {
            conn,
            answer,
            reply,
        })
        .await
    }

    pub async fn advance_question(
        &self,
        requester: ConnId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::AdvanceQuestion { requester, reply })
            .await
    }

    /// Lobby listing entry for this room.
    pub async fn info(&self) -> Result<RoomListEntry, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::GetSnapshot { reply }).await
    }

    /// Tells the actor to stop. Pending deadlines are dropped and nothing
    /// more is broadcast.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    /// Outbound channels of every participant, plus anyone removed by the
    /// command being processed until its events are delivered.
    senders: HashMap<ConnId, PlayerSender>,
    timer: DeadlineTimer<u64>,
    receiver: mpsc::Receiver<RoomCommand>,
}

/// The room clock. Tokio's, so paused-time tests drive deadlines too.
fn now() -> std::time::Instant {
    TokioInstant::now().into_std()
}

impl RoomActor {
    async fn run(mut self) {
        let code = self.room.code().clone();
        tracing::info!(room = %code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if matches!(cmd, RoomCommand::Shutdown) {
                        tracing::info!(room = %code, "room shutting down");
                        break;
                    }
                    self.handle(cmd);
                }
                expiry = self.timer.wait() => {
                    let events = self.room.on_deadline(expiry.key, now());
                    self.deliver(events);
                }
            }

            if self.room.is_closed() {
                break;
            }
            self.sync_timer();
        }

        tracing::info!(
            room = %code,
            deadlines_fired = self.timer.metrics().fired,
            "room actor stopped"
        );
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn,
                name,
                sender,
                reply,
            } => {
                let result = self.room.join(conn, &name).map(|events| {
                    self.senders.insert(conn, sender);
                    events
                });
                self.finish(result, reply);
            }
            RoomCommand::Leave { conn, reply } => {
                let result = self.room.leave(conn, now());
                match result {
                    Ok((departure, events)) => {
                        self.deliver(events);
                        let _ = reply.send(Ok(departure));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::Kick {
                requester,
                target,
                reply,
            } => {
                let result = self.room.kick(requester, target, now());
                self.finish(result, reply);
            }
            RoomCommand::UpdateSettings {
                requester,
                settings,
                reply,
            } => {
                let result = self.room.update_settings(requester, settings);
                self.finish(result, reply);
            }
            RoomCommand::SelectQuiz {
                requester,
                quiz_id,
                quiz,
                reply,
            } => {
                let result = self.room.select_quiz(requester, &quiz_id, quiz);
                self.finish(result, reply);
            }
            RoomCommand::StartGame { requester, reply } => {
                let result = self.room.start_game(requester, now());
                self.finish(result, reply);
            }
            RoomCommand::SubmitAnswer {
                conn,
                answer,
                reply,
            } => {
                let result = self.room.submit_answer(conn, &answer, now());
                self.finish(result, reply);
            }
            RoomCommand::AdvanceQuestion { requester, reply } => {
                let result = self.room.advance_question(requester, now());
                self.finish(result, reply);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(Ok(self.room.info()));
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(Ok(self.room.snapshot()));
            }
            RoomCommand::Shutdown => {}
        }
    }

    /// Delivers the events of a successful transition, then replies.
    ///
    /// Delivering first means the caller sees its own broadcast before any
    /// follow-up it sends after the reply.
    fn finish(&mut self, result: Result<Outbox, RoomError>, reply: Reply<()>) {
        match result {
            Ok(events) => {
                self.deliver(events);
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                tracing::debug!(room = %self.room.code(), error = %e, "command rejected");
                let _ = reply.send(Err(e));
            }
        }
    }

    /// Resolves recipients and sends. `Player` targets are looked up in
    /// `senders` directly, so someone removed by this very transition still
    /// gets the events addressed to them; broadcasts go to current
    /// participants only. Departed connections are pruned afterwards.
    fn deliver(&mut self, events: Outbox) {
        for (recipient, event) in events {
            match recipient {
                Recipient::Player(conn) => self.send_to(conn, event),
                Recipient::All | Recipient::AllExcept(_) => {
                    for conn in self.room.participants() {
                        if recipient.includes(conn) {
                            self.send_to(conn, event.clone());
                        }
                    }
                }
            }
        }

        let room = &self.room;
        self.senders.retain(|conn, _| room.is_participant(*conn));
    }

    /// Silently drops the event if the receiver is gone.
    fn send_to(&self, conn: ConnId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            let _ = sender.send(event);
        }
    }

    /// Makes the timer match the room's pending deadline.
    fn sync_timer(&mut self) {
        let pending = self
            .room
            .deadline()
            .map(|(seq, at)| (seq, TokioInstant::from_std(at)));
        if self.timer.deadline() == pending {
            return;
        }
        match pending {
            Some((seq, at)) => self.timer.arm_at(seq, at),
            None => {
                self.timer.disarm();
            }
        }
    }
}

/// Spawns a new room actor with `host` as its host and returns a handle.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(
    code: RoomCode,
    host: Player,
    host_sender: PlayerSender,
    settings: Settings,
    scoring: ScoringRule,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let mut senders = HashMap::new();
    senders.insert(host.id, host_sender);

    let actor = RoomActor {
        room: Room::new(code.clone(), host, settings, scoring),
        senders,
        timer: DeadlineTimer::new(TimerConfig::default()),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
