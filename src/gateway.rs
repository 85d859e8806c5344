//! Connection gateway: turns frames into session operations and fans the
//! resulting events out to connections.

use crate::engine::RulesEngine;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::registry::{SessionRegistry, lock_session};
use crate::session::{ConnectionId, Delivery, Outbox, Session, SessionKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, instrument, warn};

/// Outbound channel of one connection. Full channels drop events.
pub type Outlet = mpsc::Sender<ServerEvent>;

/// Events a connection may have queued before further events are dropped.
pub const DEFAULT_OUTLET_CAPACITY: usize = 256;

/// How a closed connection is found in the registry.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Visit every session and call `leave` on each.
    Sweep,
    /// Follow the connection's recorded session key.
    #[default]
    Indexed,
}

/// Accepts connections, dispatches their commands, and delivers events.
pub struct Gateway<E: RulesEngine> {
    registry: Arc<SessionRegistry<E>>,
    policy: DisconnectPolicy,
    outlet_capacity: usize,
    next_connection: AtomicU64,
    outlets: Mutex<HashMap<ConnectionId, Outlet>>,
    memberships: Mutex<HashMap<ConnectionId, SessionKey>>,
}

impl<E: RulesEngine> std::fmt::Debug for Gateway<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("policy", &self.policy)
            .field("outlet_capacity", &self.outlet_capacity)
            .field("connections", &self.connection_count())
            .field("registry", &self.registry)
            .finish()
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: RulesEngine> Gateway<E> {
    /// Creates a gateway over an injected registry.
    #[instrument(skip(registry))]
    pub fn new(registry: Arc<SessionRegistry<E>>, policy: DisconnectPolicy) -> Self {
        info!(%policy, "Creating connection gateway");
        Self {
            registry,
            policy,
            outlet_capacity: DEFAULT_OUTLET_CAPACITY,
            next_connection: AtomicU64::new(1),
            outlets: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the queue length of outlets opened by the transport.
    pub fn with_outlet_capacity(mut self, capacity: usize) -> Self {
        self.outlet_capacity = capacity.max(1);
        self
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<SessionRegistry<E>> {
        &self.registry
    }

    /// Returns the queue length for new outlets.
    pub fn outlet_capacity(&self) -> usize {
        self.outlet_capacity
    }

    /// Returns the number of open connections.
    pub fn connection_count(&self) -> usize {
        guard(&self.outlets).len()
    }

    /// Returns the session a connection last joined.
    pub fn session_of(&self, connection: ConnectionId) -> Option<SessionKey> {
        guard(&self.memberships).get(&connection).cloned()
    }

    /// Registers a new connection and its outbound channel.
    #[instrument(skip(self, outlet))]
    pub fn connect(&self, outlet: Outlet) -> ConnectionId {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        guard(&self.outlets).insert(connection, outlet);
        info!(%connection, "Connection opened");
        connection
    }

    /// Decodes a text frame and dispatches it.
    ///
    /// Frames that do not decode are answered with `invalid_command` and go
    /// no further.
    #[instrument(skip_all, fields(%connection))]
    pub fn handle_frame(&self, connection: ConnectionId, frame: &str) {
        match ClientCommand::decode(frame) {
            Ok(command) => self.dispatch(connection, command),
            Err(e) => {
                warn!(error = %e, "Malformed command");
                self.send(
                    connection,
                    ServerEvent::InvalidCommand {
                        reason: e.message,
                    },
                );
            }
        }
    }

    /// Routes a decoded command to its session.
    #[instrument(skip_all, fields(%connection, session = command.session_key()))]
    pub fn dispatch(&self, connection: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::Join { session_key } => self.join(connection, &session_key),
            ClientCommand::SetName { session_key, name } => {
                self.with_session(&session_key, |session, out| {
                    session.set_display_name(connection, &name, out)
                })
            }
            ClientCommand::Move {
                session_key,
                candidate,
            } => self.with_session(&session_key, |session, out| {
                let outcome = session.submit_move(connection, candidate, out);
                debug!(?outcome, "Move handled");
            }),
            ClientCommand::Chat {
                session_key,
                message,
            } => self.with_session(&session_key, |session, out| {
                session.relay_chat(connection, &message, out)
            }),
            ClientCommand::Resign { session_key } => {
                self.with_session(&session_key, |session, out| session.resign(connection, out))
            }
        }
    }

    fn join(&self, connection: ConnectionId, key: &str) {
        let previous = self.session_of(connection);
        if let Some(previous) = previous.filter(|previous| previous != key) {
            info!(from = %previous, to = key, "Connection switching sessions");
            self.depart(connection, &previous);
        }

        self.registry.with_or_create(key, |session| {
            let mut out = Outbox::new();
            session.join(connection, &mut out);
            self.deliver(session, out);
        });
        guard(&self.memberships).insert(connection, key.to_string());
    }

    fn with_session(&self, key: &str, op: impl FnOnce(&mut Session<E>, &mut Outbox)) {
        let Some(session) = self.registry.get(key) else {
            debug!(session = key, "Command for unknown session ignored");
            return;
        };
        let mut session = lock_session(&session);
        let mut out = Outbox::new();
        op(&mut session, &mut out);
        self.deliver(&session, out);
    }

    /// Leaves one session and reaps it if it emptied.
    fn depart(&self, connection: ConnectionId, key: &str) {
        let reaped = self.registry.with_then_reap(key, |session| {
            let mut out = Outbox::new();
            session.leave(connection, &mut out);
            self.deliver(session, out);
        });
        if let Some(((), true)) = reaped {
            debug!(session = key, "Session reaped after departure");
        }
    }

    /// Tears down a connection and releases everything it held.
    #[instrument(skip(self))]
    pub fn disconnect(&self, connection: ConnectionId) {
        guard(&self.outlets).remove(&connection);
        let membership = guard(&self.memberships).remove(&connection);

        match self.policy {
            DisconnectPolicy::Indexed => {
                if let Some(key) = membership {
                    self.depart(connection, &key);
                }
            }
            DisconnectPolicy::Sweep => self.sweep(connection),
        }
        info!(%connection, "Connection closed");
    }

    fn sweep(&self, connection: ConnectionId) {
        let mut emptied = Vec::new();
        self.registry.for_each(|key, session| {
            let mut session = lock_session(session);
            let mut out = Outbox::new();
            session.leave(connection, &mut out);
            self.deliver(&session, out);
            if session.is_empty() {
                emptied.push(key.to_string());
            }
        });
        for key in emptied {
            self.registry.remove_if_empty(&key);
        }
    }

    /// Pushes deliveries to their connections.
    ///
    /// Callers hold the session lock, which keeps each session's event
    /// stream in acceptance order.
    fn deliver(&self, session: &Session<E>, out: Outbox) {
        if out.is_empty() {
            return;
        }
        let audience = session.participants();
        let outlets = guard(&self.outlets);
        for delivery in out.into_deliveries() {
            match delivery {
                Delivery::Unicast { to, event } => push(&outlets, to, event),
                Delivery::Broadcast(event) => {
                    for to in &audience {
                        push(&outlets, *to, event.clone());
                    }
                }
            }
        }
    }

    fn send(&self, connection: ConnectionId, event: ServerEvent) {
        push(&guard(&self.outlets), connection, event);
    }
}

/// Queues without waiting. A participant that stops reading misses events.
fn push(outlets: &HashMap<ConnectionId, Outlet>, to: ConnectionId, event: ServerEvent) {
    let Some(outlet) = outlets.get(&to) else {
        debug!(connection = %to, "No outlet for connection, event dropped");
        return;
    };
    match outlet.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(connection = %to, "Outlet full, event dropped"),
        Err(TrySendError::Closed(_)) => debug!(connection = %to, "Outlet closed, event dropped"),
    }
}
