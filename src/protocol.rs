//! Wire contract between the gateway and clients.
//!
//! Every frame is a JSON object tagged by `type`. Inbound frames decode into
//! [`ClientCommand`]; anything that does not decode is a [`CommandError`] and
//! never reaches session logic.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Move-privileged participant slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Moves first; the first connection to join takes it.
    #[display("first-mover")]
    FirstMover,
    /// Moves second; the second connection to join takes it.
    #[display("second-mover")]
    SecondMover,
}

impl Role {
    /// Returns the other role.
    pub fn opponent(self) -> Self {
        match self {
            Role::FirstMover => Role::SecondMover,
            Role::SecondMover => Role::FirstMover,
        }
    }
}

/// A move as submitted by a client. Not validated until the rules engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct CandidateMove {
    /// Origin square.
    pub from: String,
    /// Destination square.
    pub to: String,
    /// Promotion piece letter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

/// Inbound command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join a session, creating it if needed.
    Join {
        /// Session to join.
        session_key: String,
    },
    /// Register a display name for the caller's role.
    SetName {
        /// Target session.
        session_key: String,
        /// Display name.
        name: String,
    },
    /// Submit a move.
    Move {
        /// Target session.
        session_key: String,
        /// The candidate move.
        #[serde(rename = "move")]
        candidate: CandidateMove,
    },
    /// Send a chat line.
    Chat {
        /// Target session.
        session_key: String,
        /// Message text.
        message: String,
    },
    /// Resign the caller's role.
    Resign {
        /// Target session.
        session_key: String,
    },
}

impl ClientCommand {
    /// Returns the session key the command addresses.
    pub fn session_key(&self) -> &str {
        match self {
            ClientCommand::Join { session_key }
            | ClientCommand::SetName { session_key, .. }
            | ClientCommand::Move { session_key, .. }
            | ClientCommand::Chat { session_key, .. }
            | ClientCommand::Resign { session_key } => session_key,
        }
    }

    /// Decodes and validates a text frame.
    #[instrument(skip(frame), fields(len = frame.len()))]
    pub fn decode(frame: &str) -> Result<Self, CommandError> {
        let command: Self = serde_json::from_str(frame).map_err(CommandError::from)?;
        if command.session_key().trim().is_empty() {
            return Err(CommandError::new("session_key must not be blank"));
        }
        Ok(command)
    }
}

/// Sender classification attached to chat lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    /// Holder of the first-mover role.
    FirstMover,
    /// Holder of the second-mover role.
    SecondMover,
    /// Anyone else in the session.
    Spectator,
}

impl From<Role> for ChatSender {
    fn from(role: Role) -> Self {
        match role {
            Role::FirstMover => ChatSender::FirstMover,
            Role::SecondMover => ChatSender::SecondMover,
        }
    }
}

/// Why a game position is final, as decided by the rules engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The side to move is mated.
    #[display("checkmate")]
    Checkmate,
    /// A draw with no more specific tag (fifty-move rule).
    #[display("draw")]
    Draw,
    /// The side to move has no legal move.
    #[display("stalemate")]
    Stalemate,
    /// Threefold repetition.
    #[display("draw by repetition")]
    ThreefoldRepetition,
    /// Neither side can mate.
    #[display("draw by insufficient material")]
    InsufficientMaterial,
}

impl TerminalReason {
    /// Picks the reason to report when several hold at once.
    ///
    /// Declaration order is the priority order.
    pub fn most_significant(reasons: impl IntoIterator<Item = Self>) -> Option<Self> {
        reasons.into_iter().min_by_key(|reason| *reason as u8)
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEnd {
    /// Checkmate.
    #[display("checkmate")]
    Checkmate,
    /// Other draw.
    #[display("draw")]
    Draw,
    /// Stalemate.
    #[display("stalemate")]
    Stalemate,
    /// Threefold repetition.
    #[display("draw by repetition")]
    ThreefoldRepetition,
    /// Insufficient material.
    #[display("draw by insufficient material")]
    InsufficientMaterial,
    /// A role-holder resigned.
    #[display("{} wins by resignation", winner)]
    Resignation {
        /// The role that did not resign.
        winner: Role,
    },
}

impl From<TerminalReason> for GameEnd {
    fn from(reason: TerminalReason) -> Self {
        match reason {
            TerminalReason::Checkmate => GameEnd::Checkmate,
            TerminalReason::Draw => GameEnd::Draw,
            TerminalReason::Stalemate => GameEnd::Stalemate,
            TerminalReason::ThreefoldRepetition => GameEnd::ThreefoldRepetition,
            TerminalReason::InsufficientMaterial => GameEnd::InsufficientMaterial,
        }
    }
}

/// Outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The requester now holds a role.
    RoleAssigned {
        /// The assigned role.
        role: Role,
    },
    /// The requester joined as a spectator.
    SpectatorAssigned,
    /// Serialized game position.
    PositionSnapshot {
        /// Engine snapshot (FEN for chess).
        position: String,
    },
    /// Full ordered move log.
    MoveHistorySnapshot {
        /// Canonical move records.
        moves: Vec<String>,
    },
    /// Current display names of both roles.
    NameMapping {
        /// First-mover name.
        first_mover: Option<String>,
        /// Second-mover name.
        second_mover: Option<String>,
    },
    /// The requester is still the only named player.
    WaitingForOpponent,
    /// Both roles have names.
    BothNamesReady,
    /// A move was accepted.
    MoveApplied {
        /// The move as submitted.
        #[serde(rename = "move")]
        candidate: CandidateMove,
    },
    /// The requester's move was refused.
    MoveRejected {
        /// The move as submitted.
        #[serde(rename = "move")]
        candidate: CandidateMove,
    },
    /// The game is over.
    GameEnded {
        /// Why it ended.
        reason: GameEnd,
    },
    /// A role-holder left.
    ParticipantLeft {
        /// The vacated role.
        role: Role,
    },
    /// A relayed chat line.
    ChatDelivered {
        /// Sender classification.
        sender: ChatSender,
        /// Recorded display name or a default label.
        display_name: String,
        /// Message, verbatim.
        message: String,
    },
    /// The requester's frame was not a valid command.
    InvalidCommand {
        /// Decoder diagnostic.
        reason: String,
    },
}

impl ServerEvent {
    /// Encodes the event as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A frame that could not be turned into a [`ClientCommand`].
#[derive(Debug, Clone, Display, Error)]
#[display("Invalid command: {} at {}:{}", message, file, line)]
pub struct CommandError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl CommandError {
    /// Creates a new command error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<serde_json::Error> for CommandError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
