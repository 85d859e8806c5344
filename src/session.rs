//! One game's authoritative state: roles, names, spectators, move log.
//!
//! Session operations never touch the network. They append [`Delivery`]
//! entries to an [`Outbox`]; the gateway resolves broadcast audiences and
//! pushes the events out while it still holds the session.

use crate::engine::{Rejection, RulesEngine, Side};
use crate::protocol::{CandidateMove, ChatSender, GameEnd, Role, ServerEvent};
use derive_getters::Getters;
use serde::Serialize;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionKey = String;

/// Transport-assigned connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, derive_more::Display)]
#[display("conn-{}", _0)]
pub struct ConnectionId(pub u64);

/// Where an event goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// To one connection.
    Unicast {
        /// Recipient.
        to: ConnectionId,
        /// The event.
        event: ServerEvent,
    },
    /// To every participant of the session at delivery time.
    Broadcast(ServerEvent),
}

/// Ordered deliveries produced by session operations.
#[derive(Debug, Default)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event for one connection.
    pub fn unicast(&mut self, to: ConnectionId, event: ServerEvent) {
        self.deliveries.push(Delivery::Unicast { to, event });
    }

    /// Queues an event for every participant.
    pub fn broadcast(&mut self, event: ServerEvent) {
        self.deliveries.push(Delivery::Broadcast(event));
    }

    /// Returns the queued deliveries.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Consumes the outbox.
    pub fn into_deliveries(self) -> Vec<Delivery> {
        self.deliveries
    }

    /// Returns true when nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

/// Result of joining a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    /// The connection holds a role.
    Role(Role),
    /// The connection is a spectator.
    Spectator,
}

/// Result of submitting a move.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Applied and broadcast; carries the canonical record.
    Accepted(String),
    /// Refused by the engine; the submitter was told.
    Rejected(String),
    /// Not the submitter's turn, or the game is locked. Nobody was told.
    Dropped,
}

/// Per-session limits and switches. The default imposes none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_new::new)]
pub struct SessionSettings {
    /// Longest display name kept, in characters. Longer names are truncated.
    pub max_name_len: Option<usize>,
    /// Longest chat message relayed, in characters. Longer messages are dropped.
    pub max_chat_len: Option<usize>,
    /// Drop moves and resignations once the game has ended.
    pub lock_after_game_end: bool,
}

/// Listing view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct SessionSummary {
    key: SessionKey,
    first_mover_name: Option<String>,
    second_mover_name: Option<String>,
    first_mover_present: bool,
    second_mover_present: bool,
    spectators: usize,
    moves: usize,
    ended: Option<GameEnd>,
}

#[derive(Debug, Clone, Default)]
struct Seat {
    holder: Option<ConnectionId>,
    name: Option<String>,
}

/// A game session shared by two players and any number of spectators.
pub struct Session<E: RulesEngine> {
    key: SessionKey,
    engine: Arc<E>,
    settings: SessionSettings,
    position: E::Position,
    first_mover: Seat,
    second_mover: Seat,
    spectators: HashSet<ConnectionId>,
    move_log: Vec<String>,
    ended: Option<GameEnd>,
}

impl<E: RulesEngine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("first_mover", &self.first_mover.holder)
            .field("second_mover", &self.second_mover.holder)
            .field("spectators", &self.spectators.len())
            .field("moves", &self.move_log.len())
            .field("ended", &self.ended)
            .finish()
    }
}

impl<E: RulesEngine> Session<E> {
    /// Creates an empty session at the engine's starting position.
    #[instrument(skip(engine, settings))]
    pub fn new(key: SessionKey, engine: Arc<E>, settings: SessionSettings) -> Self {
        info!(session = %key, "Creating new game session");
        Self {
            position: engine.initial_position(),
            key,
            engine,
            settings,
            first_mover: Seat::default(),
            second_mover: Seat::default(),
            spectators: HashSet::new(),
            move_log: Vec::new(),
            ended: None,
        }
    }

    /// Returns the session key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the current position.
    pub fn position(&self) -> &E::Position {
        &self.position
    }

    /// Returns the move log in play order.
    pub fn move_log(&self) -> &[String] {
        &self.move_log
    }

    /// Returns the connection holding a role.
    pub fn holder(&self, role: Role) -> Option<ConnectionId> {
        self.seat(role).holder
    }

    /// Returns the display name recorded for a role.
    pub fn display_name(&self, role: Role) -> Option<&str> {
        self.seat(role).name.as_deref()
    }

    /// Returns the spectator set.
    pub fn spectators(&self) -> &HashSet<ConnectionId> {
        &self.spectators
    }

    /// Returns how the game ended, if a game-ended event was broadcast.
    pub fn ended(&self) -> Option<GameEnd> {
        self.ended
    }

    /// Returns the role a connection holds here.
    pub fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        if self.first_mover.holder == Some(connection) {
            Some(Role::FirstMover)
        } else if self.second_mover.holder == Some(connection) {
            Some(Role::SecondMover)
        } else {
            None
        }
    }

    /// Returns true if the connection holds a role or spectates.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.role_of(connection).is_some() || self.spectators.contains(&connection)
    }

    /// Lists role-holders followed by spectators.
    pub fn participants(&self) -> Vec<ConnectionId> {
        let mut all: Vec<ConnectionId> = [self.first_mover.holder, self.second_mover.holder]
            .into_iter()
            .flatten()
            .collect();
        let mut watchers: Vec<ConnectionId> = self.spectators.iter().copied().collect();
        watchers.sort();
        all.extend(watchers);
        all
    }

    /// True when both roles are vacant and nobody spectates.
    pub fn is_empty(&self) -> bool {
        self.first_mover.holder.is_none()
            && self.second_mover.holder.is_none()
            && self.spectators.is_empty()
    }

    /// Builds the listing view.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            key: self.key.clone(),
            first_mover_name: self.first_mover.name.clone(),
            second_mover_name: self.second_mover.name.clone(),
            first_mover_present: self.first_mover.holder.is_some(),
            second_mover_present: self.second_mover.holder.is_some(),
            spectators: self.spectators.len(),
            moves: self.move_log.len(),
            ended: self.ended,
        }
    }

    fn seat(&self, role: Role) -> &Seat {
        match role {
            Role::FirstMover => &self.first_mover,
            Role::SecondMover => &self.second_mover,
        }
    }

    fn seat_mut(&mut self, role: Role) -> &mut Seat {
        match role {
            Role::FirstMover => &mut self.first_mover,
            Role::SecondMover => &mut self.second_mover,
        }
    }

    fn locked(&self) -> bool {
        self.settings.lock_after_game_end && self.ended.is_some()
    }

    /// Assigns the first vacant role, or spectator, and seeds the joiner.
    ///
    /// A connection already in the session keeps its place and is re-seeded.
    #[instrument(skip(self, out), fields(session = %self.key))]
    pub fn join(&mut self, connection: ConnectionId, out: &mut Outbox) -> RoleAssignment {
        let assignment = if let Some(role) = self.role_of(connection) {
            debug!(?role, "Connection rejoined its own role");
            RoleAssignment::Role(role)
        } else if self.spectators.contains(&connection) {
            debug!("Spectator rejoined");
            RoleAssignment::Spectator
        } else if self.first_mover.holder.is_none() {
            self.first_mover.holder = Some(connection);
            RoleAssignment::Role(Role::FirstMover)
        } else if self.second_mover.holder.is_none() {
            self.second_mover.holder = Some(connection);
            RoleAssignment::Role(Role::SecondMover)
        } else {
            self.spectators.insert(connection);
            RoleAssignment::Spectator
        };

        info!(?assignment, "Participant joined");

        match assignment {
            RoleAssignment::Role(role) => {
                out.unicast(connection, ServerEvent::RoleAssigned { role })
            }
            RoleAssignment::Spectator => out.unicast(connection, ServerEvent::SpectatorAssigned),
        }
        out.unicast(
            connection,
            ServerEvent::PositionSnapshot {
                position: self.engine.snapshot(&self.position),
            },
        );
        out.unicast(
            connection,
            ServerEvent::MoveHistorySnapshot {
                moves: self.move_log.clone(),
            },
        );
        if self.first_mover.name.is_some() || self.second_mover.name.is_some() {
            out.unicast(connection, self.name_mapping());
        }

        assignment
    }

    fn name_mapping(&self) -> ServerEvent {
        ServerEvent::NameMapping {
            first_mover: self.first_mover.name.clone(),
            second_mover: self.second_mover.name.clone(),
        }
    }

    /// Records a display name for the caller's role, as sent.
    ///
    /// Connections without a role are ignored. A blank name clears the slot.
    #[instrument(skip(self, name, out), fields(session = %self.key))]
    pub fn set_display_name(&mut self, connection: ConnectionId, name: &str, out: &mut Outbox) {
        let Some(role) = self.role_of(connection) else {
            debug!("Name from connection without a role dropped");
            return;
        };

        let name = if name.trim().is_empty() {
            debug!(?role, "Blank display name clears the slot");
            None
        } else {
            let name: String = match self.settings.max_name_len {
                Some(limit) => name.chars().take(limit).collect(),
                None => name.to_string(),
            };
            info!(?role, name = %name, "Display name set");
            Some(name)
        };
        self.seat_mut(role).name = name;

        out.broadcast(self.name_mapping());
        if self.first_mover.name.is_some() && self.second_mover.name.is_some() {
            out.broadcast(ServerEvent::BothNamesReady);
        } else {
            out.unicast(connection, ServerEvent::WaitingForOpponent);
        }
    }

    /// Validates turn order, delegates to the engine, and publishes the result.
    #[instrument(skip(self, out), fields(session = %self.key))]
    pub fn submit_move(
        &mut self,
        connection: ConnectionId,
        candidate: CandidateMove,
        out: &mut Outbox,
    ) -> MoveOutcome {
        if self.locked() {
            debug!("Move after game end dropped");
            return MoveOutcome::Dropped;
        }

        let to_move = Role::from(self.engine.side_to_move(&self.position));
        if self.holder(to_move) != Some(connection) {
            debug!(expected = ?to_move, "Move out of turn dropped");
            return MoveOutcome::Dropped;
        }

        let engine = Arc::clone(&self.engine);
        let applied = catch_unwind(AssertUnwindSafe(|| {
            engine.apply_move(&self.position, &candidate)
        }))
        .unwrap_or_else(|payload| {
            Err(Rejection::Fault {
                reason: panic_message(payload.as_ref()),
            })
        });

        let applied = match applied {
            Ok(applied) => applied,
            Err(rejection) => {
                warn!(error = %rejection, ?candidate, "Move rejected");
                out.unicast(connection, ServerEvent::MoveRejected { candidate });
                return MoveOutcome::Rejected(rejection.to_string());
            }
        };

        self.position = applied.position;
        self.move_log.push(applied.record.clone());
        info!(record = %applied.record, ply = self.move_log.len(), "Move accepted");

        out.broadcast(ServerEvent::MoveApplied { candidate });
        out.broadcast(ServerEvent::PositionSnapshot {
            position: self.engine.snapshot(&self.position),
        });
        out.broadcast(ServerEvent::MoveHistorySnapshot {
            moves: self.move_log.clone(),
        });

        let terminal = catch_unwind(AssertUnwindSafe(|| engine.is_terminal(&self.position)))
            .unwrap_or_else(|payload| {
                warn!(error = %panic_message(payload.as_ref()), "Terminal check failed");
                None
            });
        if let Some(reason) = terminal {
            let end = GameEnd::from(reason);
            info!(reason = %end, "Game ended");
            self.ended = Some(end);
            out.broadcast(ServerEvent::GameEnded { reason: end });
        }

        MoveOutcome::Accepted(applied.record)
    }

    /// Ends the game in favour of the other role.
    #[instrument(skip(self, out), fields(session = %self.key))]
    pub fn resign(&mut self, connection: ConnectionId, out: &mut Outbox) {
        if self.locked() {
            debug!("Resignation after game end dropped");
            return;
        }
        let Some(role) = self.role_of(connection) else {
            debug!("Resignation from connection without a role dropped");
            return;
        };

        let end = GameEnd::Resignation {
            winner: role.opponent(),
        };
        info!(?role, reason = %end, "Player resigned");
        self.ended = Some(end);
        out.broadcast(ServerEvent::GameEnded { reason: end });
    }

    /// Relays a chat line verbatim to every participant. Nothing is stored.
    #[instrument(skip(self, message, out), fields(session = %self.key))]
    pub fn relay_chat(&mut self, connection: ConnectionId, message: &str, out: &mut Outbox) {
        let (sender, display_name) = match self.role_of(connection) {
            Some(role) => {
                let name = self.display_name(role).map(str::to_string).unwrap_or_else(|| {
                    format!("{} Player", self.engine.side_label(Side::from(role)))
                });
                (ChatSender::from(role), name)
            }
            None if self.spectators.contains(&connection) => {
                (ChatSender::Spectator, "Spectator".to_string())
            }
            None => {
                debug!("Chat from non-participant dropped");
                return;
            }
        };

        if let Some(limit) = self.settings.max_chat_len {
            if message.chars().count() > limit {
                warn!(limit, "Oversized chat message dropped");
                return;
            }
        }

        debug!(?sender, display_name = %display_name, "Relaying chat");
        out.broadcast(ServerEvent::ChatDelivered {
            sender,
            display_name,
            message: message.to_string(),
        });
    }

    /// Removes a connection. Vacated roles are announced, spectators leave quietly.
    ///
    /// Returns the vacated role, if any.
    #[instrument(skip(self, out), fields(session = %self.key))]
    pub fn leave(&mut self, connection: ConnectionId, out: &mut Outbox) -> Option<Role> {
        match self.role_of(connection) {
            Some(role) => {
                self.seat_mut(role).holder = None;
                info!(?role, "Player left");
                out.broadcast(ServerEvent::ParticipantLeft { role });
                Some(role)
            }
            None => {
                if self.spectators.remove(&connection) {
                    debug!("Spectator left");
                }
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "engine panicked".to_string()
    }
}
