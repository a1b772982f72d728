//! The room state machine.
//!
//! [`Room`] is pure and synchronous: every transition takes the current
//! time as an argument and returns the events it produced, addressed by
//! [`Recipient`]. The room actor owns one `Room`, supplies the clock, and
//! delivers the events. Nothing in here spawns, sleeps, or sends.
//!
//! Host authority is checked first in every host-only transition, then the
//! [`Transition`] table, then the transition's own preconditions. Nothing
//! is mutated until all checks pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quizroom_protocol::{
    AnswerEntry, ConnId, Player, Quiz, Recipient, Reveal, RoomCode,
    RoomListEntry, RoomSnapshot, ScoreEntry, ServerEvent, Settings,
};

use crate::config::{Stage, Transition};
use crate::scoring::{self, Answer, Choice, ScoringRule};
use crate::RoomError;

/// Events produced by one transition, in delivery order.
pub type Outbox = Vec<(Recipient, ServerEvent)>;

/// What a departure did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// A player left; the room carries on.
    Left,
    /// The host left; the room is closed and must be removed.
    Dissolved,
}

/// One quiz game: a host, its players, and the question loop.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    host: Player,
    /// Players in join order. The host is not in this list.
    members: Vec<Player>,
    settings: Settings,
    scoring: ScoringRule,
    selected_quiz: Option<Arc<Quiz>>,
    stage: Stage,
    question_index: Option<usize>,
    /// Identity of the open question. Bumped every time a question opens,
    /// so a deadline armed for an earlier question can be told apart.
    question_seq: u64,
    question_started_at: Option<Instant>,
    /// Answers to the open question, in arrival order.
    answers: Vec<Answer>,
    scores: HashMap<ConnId, u32>,
    closed: bool,
}

impl Room {
    pub fn new(
        code: RoomCode,
        host: Player,
        settings: Settings,
        scoring: ScoringRule,
    ) -> Self {
        Self {
            code,
            host,
            members: Vec::new(),
            settings,
            scoring,
            selected_quiz: None,
            stage: Stage::Waiting,
            question_index: None,
            question_seq: 0,
            question_started_at: None,
            answers: Vec::new(),
            scores: HashMap::new(),
            closed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a player.
    ///
    /// The host "joining" its own room is a resynchronisation: it receives
    /// a fresh membership view and nothing changes.
    pub fn join(
        &mut self,
        conn: ConnId,
        name: &str,
    ) -> Result<Outbox, RoomError> {
        if conn == self.host.id {
            return Ok(vec![(
                Recipient::Player(conn),
                self.joined_event(Reveal::Full, true),
            )]);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidPlayerName);
        }
        if self.is_member(conn) {
            return Err(RoomError::AlreadyInRoom(conn, self.code.clone()));
        }
        Transition::Join.check(self.stage)?;
        if self.members.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        self.members.push(Player::new(conn, name));
        tracing::info!(
            room = %self.code,
            %conn,
            player = name,
            players = self.members.len(),
            "player joined"
        );

        Ok(vec![
            (
                Recipient::Player(self.host.id),
                self.joined_event(Reveal::Full, true),
            ),
            (
                Recipient::AllExcept(self.host.id),
                self.joined_event(Reveal::Hidden, false),
            ),
        ])
    }

    /// Removes a connection, voluntarily or by disconnect.
    ///
    /// A departing host closes the room: remaining players are told with
    /// `room_closed`.
    pub fn leave(
        &mut self,
        conn: ConnId,
        now: Instant,
    ) -> Result<(Departure, Outbox), RoomError> {
        Transition::Leave.check(self.stage)?;

        if conn == self.host.id {
            self.closed = true;
            tracing::info!(room = %self.code, "host left, room dissolved");
            let events = vec![(
                Recipient::AllExcept(conn),
                ServerEvent::RoomClosed {
                    room_code: self.code.clone(),
                    reason: "the host left the room".into(),
                },
            )];
            return Ok((Departure::Dissolved, events));
        }

        if !self.is_member(conn) {
            return Err(RoomError::NotInRoom(conn, self.code.clone()));
        }

        let events = self.remove_member(conn, now);
        Ok((Departure::Left, events))
    }

    /// Host only: removes a player. The kicked player is told first.
    pub fn kick(
        &mut self,
        requester: ConnId,
        target: ConnId,
        now: Instant,
    ) -> Result<Outbox, RoomError> {
        self.require_host(requester, "kick players")?;
        Transition::Kick.check(self.stage)?;
        if target == self.host.id {
            return Err(RoomError::InvalidState(
                "the host cannot be kicked".into(),
            ));
        }
        if !self.is_member(target) {
            return Err(RoomError::NotInRoom(target, self.code.clone()));
        }

        tracing::info!(room = %self.code, %target, "player kicked");
        let mut events = vec![(
            Recipient::Player(target),
            ServerEvent::Kicked {
                room_code: self.code.clone(),
            },
        )];
        events.extend(self.remove_member(target, now));
        Ok(events)
    }

    fn remove_member(&mut self, conn: ConnId, now: Instant) -> Outbox {
        self.members.retain(|player| player.id != conn);
        self.answers.retain(|answer| answer.conn != conn);
        self.scores.remove(&conn);

        tracing::info!(
            room = %self.code,
            %conn,
            players = self.members.len(),
            "player left"
        );

        let mut events = vec![(
            Recipient::All,
            ServerEvent::PlayerLeftRoom {
                players: self.members.clone(),
                host: self.host.clone(),
            },
        )];

        // The departed player may have been the last one we were waiting on.
        if self.stage == Stage::Collecting && self.all_answered() {
            events.extend(self.reveal(now));
        }
        events
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Host only, waiting only. Values are validated, never clamped.
    pub fn update_settings(
        &mut self,
        requester: ConnId,
        settings: Settings,
    ) -> Result<Outbox, RoomError> {
        self.require_host(requester, "change settings")?;
        Transition::UpdateSettings.check(self.stage)?;
        settings.check().map_err(RoomError::InvalidSettings)?;
        if settings.max_players < self.members.len() {
            return Err(RoomError::InvalidSettings(format!(
                "max_players {} is below the current player count {}",
                settings.max_players,
                self.members.len()
            )));
        }

        self.settings = settings;
        tracing::debug!(room = %self.code, ?settings, "settings updated");
        Ok(vec![(Recipient::All, ServerEvent::SettingsUpdated { settings })])
    }

    /// Host only, waiting only. `quiz` is the catalog's answer for
    /// `quiz_id`; `None` means the catalog doesn't know it.
    pub fn select_quiz(
        &mut self,
        requester: ConnId,
        quiz_id: &str,
        quiz: Option<Arc<Quiz>>,
    ) -> Result<Outbox, RoomError> {
        self.require_host(requester, "select a quiz")?;
        Transition::SelectQuiz.check(self.stage)?;
        let quiz = quiz.ok_or_else(|| RoomError::QuizNotFound(quiz_id.into()))?;

        tracing::debug!(room = %self.code, quiz = %quiz.id, "quiz selected");
        let events = vec![
            (
                Recipient::Player(self.host.id),
                ServerEvent::QuizSelected {
                    quiz: quiz.view(Reveal::Full),
                },
            ),
            (
                Recipient::AllExcept(self.host.id),
                ServerEvent::QuizSelected {
                    quiz: quiz.view(Reveal::Hidden),
                },
            ),
        ];
        self.selected_quiz = Some(quiz);
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Question loop
    // -----------------------------------------------------------------------

    /// Host only, waiting only. Opens question 0.
    pub fn start_game(
        &mut self,
        requester: ConnId,
        now: Instant,
    ) -> Result<Outbox, RoomError> {
        self.require_host(requester, "start the game")?;
        Transition::StartGame.check(self.stage)?;
        let quiz = self
            .selected_quiz
            .clone()
            .ok_or(RoomError::NoQuizSelected)?;
        if self.members.is_empty() {
            return Err(RoomError::InvalidState(
                "at least one player is required to start".into(),
            ));
        }

        self.scores = self.members.iter().map(|p| (p.id, 0)).collect();
        self.open_question(0, now);

        tracing::info!(
            room = %self.code,
            quiz = %quiz.id,
            players = self.members.len(),
            questions = quiz.len(),
            "game started"
        );

        Ok(vec![
            (
                Recipient::Player(self.host.id),
                ServerEvent::GameStarted {
                    quiz: quiz.view(Reveal::Full),
                    settings: self.settings,
                    players: self.members.clone(),
                },
            ),
            (
                Recipient::AllExcept(self.host.id),
                ServerEvent::GameStarted {
                    quiz: quiz.view(Reveal::Hidden),
                    settings: self.settings,
                    players: self.members.clone(),
                },
            ),
        ])
    }

    /// Records a player's answer to the open question.
    ///
    /// Closes the question early once every current player has answered.
    pub fn submit_answer(
        &mut self,
        conn: ConnId,
        answer: &str,
        now: Instant,
    ) -> Result<Outbox, RoomError> {
        if conn == self.host.id {
            return Err(RoomError::Unauthorized {
                conn,
                action: "answer questions",
            });
        }
        if !self.is_member(conn) {
            return Err(RoomError::NotInRoom(conn, self.code.clone()));
        }
        Transition::SubmitAnswer.check(self.stage)?;
        if self.has_answered(conn) {
            return Err(RoomError::DuplicateAnswer(conn));
        }

        let elapsed = self
            .question_started_at
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));
        self.answers.push(Answer {
            conn,
            choice: Choice::from_text(answer),
            response_time: elapsed.min(self.settings.response_time()),
            recorded_at: now,
        });

        let mut events = vec![(
            Recipient::Player(self.host.id),
            ServerEvent::AnswerReceived {
                answered: self.answers.len(),
                expected: self.members.len(),
            },
        )];
        if self.all_answered() {
            tracing::debug!(room = %self.code, "all players answered, closing early");
            events.extend(self.reveal(now));
        }
        Ok(events)
    }

    /// The answer window of question `seq` ran out.
    ///
    /// Ignored unless `seq` is the open question and the room is still
    /// collecting; a question that already closed early stays closed.
    pub fn on_deadline(&mut self, seq: u64, now: Instant) -> Outbox {
        if !Transition::Deadline.allowed_in(self.stage) || seq != self.question_seq {
            tracing::debug!(
                room = %self.code,
                seq,
                current = self.question_seq,
                stage = %self.stage,
                "stale deadline ignored"
            );
            return Vec::new();
        }

        tracing::debug!(room = %self.code, seq, "answer window closed");
        self.reveal(now)
    }

    /// Host only, revealing only. Opens the next question or finishes.
    pub fn advance_question(
        &mut self,
        requester: ConnId,
        now: Instant,
    ) -> Result<Outbox, RoomError> {
        self.require_host(requester, "advance the quiz")?;
        Transition::AdvanceQuestion.check(self.stage)?;
        let quiz = self
            .selected_quiz
            .clone()
            .ok_or(RoomError::NoQuizSelected)?;

        let next = self.question_index.map_or(0, |index| index + 1);
        let Some(question) = quiz.question(next) else {
            self.stage = Stage::Finished;
            tracing::info!(room = %self.code, "quiz finished");
            return Ok(vec![(
                Recipient::All,
                ServerEvent::QuizFinished {
                    scoreboard: self.scoreboard(),
                },
            )]);
        };

        self.open_question(next, now);
        let time_limit_seconds = self.settings.response_time_seconds;
        Ok(vec![
            (
                Recipient::Player(self.host.id),
                ServerEvent::NextQuestion {
                    question_index: next,
                    question: question.view(Reveal::Full),
                    time_limit_seconds,
                },
            ),
            (
                Recipient::AllExcept(self.host.id),
                ServerEvent::NextQuestion {
                    question_index: next,
                    question: question.view(Reveal::Hidden),
                    time_limit_seconds,
                },
            ),
        ])
    }

    fn open_question(&mut self, index: usize, now: Instant) {
        self.stage = Stage::Collecting;
        self.question_index = Some(index);
        self.question_seq += 1;
        self.question_started_at = Some(now);
        self.answers.clear();
    }

    /// Closes the open question: fills in the sentinel for everyone who
    /// didn't answer, scores, and broadcasts the result.
    fn reveal(&mut self, now: Instant) -> Outbox {
        let (Some(quiz), Some(index)) = (self.selected_quiz.clone(), self.question_index)
        else {
            return Vec::new();
        };
        let Some(question) = quiz.question(index) else {
            return Vec::new();
        };
        let limit = self.settings.response_time();

        for player in &self.members {
            if !self.answers.iter().any(|a| a.conn == player.id) {
                self.answers.push(Answer {
                    conn: player.id,
                    choice: Choice::Default,
                    response_time: limit,
                    recorded_at: now,
                });
            }
        }

        let mut entries = Vec::with_capacity(self.members.len());
        for player in &self.members {
            let Some(answer) = self.answers.iter().find(|a| a.conn == player.id) else {
                continue;
            };
            let points = scoring::score(&self.scoring, question, answer, limit);
            let total = self.scores.entry(player.id).or_insert(0);
            *total = total.saturating_add(points);
            entries.push(AnswerEntry {
                player_id: player.id,
                name: player.name.clone(),
                answer: answer.choice.as_str().to_owned(),
                response_time_seconds: answer.response_time.as_secs_f64(),
                correct: answer.is_correct(question),
                points,
            });
        }

        self.stage = Stage::Revealing;
        tracing::debug!(room = %self.code, question = index, "scores revealed");

        vec![(
            Recipient::All,
            ServerEvent::AllPlayersAnswered {
                question_index: index,
                scoreboard: self.scoreboard(),
                correct_answer: question.correct_option().unwrap_or_default().to_owned(),
                current_question: question.view(Reveal::Full),
                answers: entries,
            },
        )]
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The pending answer deadline: question identity and when it is due.
    pub fn deadline(&self) -> Option<(u64, Instant)> {
        if self.stage != Stage::Collecting {
            return None;
        }
        let start = self.question_started_at?;
        Some((self.question_seq, start + self.settings.response_time()))
    }

    /// Current totals, highest first; ties keep join order.
    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        let mut board: Vec<ScoreEntry> = self
            .members
            .iter()
            .map(|player| ScoreEntry {
                player_id: player.id,
                name: player.name.clone(),
                score: self.scores.get(&player.id).copied().unwrap_or(0),
            })
            .collect();
        board.sort_by(|a, b| b.score.cmp(&a.score));
        board
    }

    pub fn info(&self) -> RoomListEntry {
        RoomListEntry {
            room_code: self.code.clone(),
            host: self.host.name.clone(),
            member_count: self.members.len(),
            status: self.stage.status(),
            settings: self.settings,
        }
    }

    /// Read model for late subscribers. Answers are always redacted.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            status: self.stage.status(),
            settings: self.settings,
            selected_quiz: self
                .selected_quiz
                .as_ref()
                .map(|quiz| quiz.view(Reveal::Hidden)),
            players: self.members.clone(),
            host: self.host.clone(),
        }
    }

    /// Connections currently entitled to room broadcasts.
    pub fn participants(&self) -> impl Iterator<Item = ConnId> + '_ {
        let host = (!self.closed).then_some(self.host.id);
        host.into_iter().chain(self.members.iter().map(|p| p.id))
    }

    pub fn is_participant(&self, conn: ConnId) -> bool {
        (!self.closed && conn == self.host.id) || self.is_member(conn)
    }

    pub fn is_member(&self, conn: ConnId) -> bool {
        self.members.iter().any(|player| player.id == conn)
    }

    pub fn has_answered(&self, conn: ConnId) -> bool {
        self.answers.iter().any(|answer| answer.conn == conn)
    }

    fn all_answered(&self) -> bool {
        self.members.iter().all(|player| self.has_answered(player.id))
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> &Player {
        &self.host
    }

    pub fn members(&self) -> &[Player] {
        &self.members
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn question_index(&self) -> Option<usize> {
        self.question_index
    }

    pub fn question_seq(&self) -> u64 {
        self.question_seq
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn score_of(&self, conn: ConnId) -> Option<u32> {
        self.scores.get(&conn).copied()
    }

    pub fn selected_quiz(&self) -> Option<&Arc<Quiz>> {
        self.selected_quiz.as_ref()
    }

    /// `true` once the host has left. A closed room accepts nothing more.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn require_host(
        &self,
        requester: ConnId,
        action: &'static str,
    ) -> Result<(), RoomError> {
        if requester == self.host.id {
            Ok(())
        } else {
            Err(RoomError::Unauthorized {
                conn: requester,
                action,
            })
        }
    }

    fn joined_event(&self, reveal: Reveal, is_owner: bool) -> ServerEvent {
        ServerEvent::PlayerJoinedRoom {
            room_code: self.code.clone(),
            players: self.members.clone(),
            host: self.host.clone(),
            settings: self.settings,
            selected_quiz: self.selected_quiz.as_ref().map(|quiz| quiz.view(reveal)),
            is_owner,
        }
    }
}
