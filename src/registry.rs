//! Process-wide mapping from session key to session.

use crate::engine::RulesEngine;
use crate::session::{Session, SessionKey, SessionSettings, SessionSummary};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

/// A session behind its own lock.
pub type SharedSession<E> = Arc<Mutex<Session<E>>>;

/// Locks a session, recovering the guard if a previous holder panicked.
///
/// Engine faults are caught before any mutation, so a poisoned session still
/// holds consistent state.
pub fn lock_session<E: RulesEngine>(session: &SharedSession<E>) -> MutexGuard<'_, Session<E>> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every live session.
///
/// The map lock guards insert and remove only. Gameplay locks the individual
/// session, so sessions never contend with each other.
pub struct SessionRegistry<E: RulesEngine> {
    engine: Arc<E>,
    settings: SessionSettings,
    sessions: Mutex<HashMap<SessionKey, SharedSession<E>>>,
}

impl<E: RulesEngine> std::fmt::Debug for SessionRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("settings", &self.settings)
            .field("sessions", &self.len())
            .finish()
    }
}

impl<E: RulesEngine> SessionRegistry<E> {
    /// Creates an empty registry.
    #[instrument(skip(engine))]
    pub fn new(engine: E, settings: SessionSettings) -> Self {
        info!("Creating session registry");
        Self {
            engine: Arc::new(engine),
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<SessionKey, SharedSession<E>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the existing session or creates an empty one.
    #[instrument(skip(self))]
    pub fn get_or_create(&self, key: &str) -> SharedSession<E> {
        let mut sessions = self.map();
        self.entry(&mut sessions, key)
    }

    fn entry(
        &self,
        sessions: &mut HashMap<SessionKey, SharedSession<E>>,
        key: &str,
    ) -> SharedSession<E> {
        Arc::clone(sessions.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Session::new(
                key.to_string(),
                Arc::clone(&self.engine),
                self.settings,
            )))
        }))
    }

    /// Runs `f` on the session for `key`, creating it if absent.
    ///
    /// The map stays locked for the duration, so the session cannot be
    /// removed between lookup and `f`. Used for joins.
    #[instrument(skip(self, f))]
    pub fn with_or_create<R>(&self, key: &str, f: impl FnOnce(&mut Session<E>) -> R) -> R {
        let mut sessions = self.map();
        let session = self.entry(&mut sessions, key);
        let mut guard = lock_session(&session);
        f(&mut guard)
    }

    /// Looks up a session.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> Option<SharedSession<E>> {
        let session = self.map().get(key).cloned();
        if session.is_none() {
            debug!(session = key, "Session not found");
        }
        session
    }

    /// Deletes a session. Removing an absent key does nothing.
    #[instrument(skip(self))]
    pub fn remove(&self, key: &str) {
        if self.map().remove(key).is_some() {
            info!(session = key, "Session removed");
        }
    }

    /// Runs `f` on a session while the map is locked and removes the
    /// session afterwards if it is empty.
    ///
    /// Returns `None` when the key is unknown, otherwise `f`'s result and
    /// whether the session was removed.
    #[instrument(skip(self, f))]
    pub fn with_then_reap<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Session<E>) -> R,
    ) -> Option<(R, bool)> {
        let mut sessions = self.map();
        let session = sessions.get(key).cloned()?;
        let mut guard = lock_session(&session);
        let result = f(&mut guard);
        let empty = guard.is_empty();
        drop(guard);
        if empty {
            sessions.remove(key);
            info!(session = key, "Empty session removed");
        }
        Some((result, empty))
    }

    /// Removes a session only if it is still empty once the map is locked.
    ///
    /// Returns true when the session was removed.
    #[instrument(skip(self))]
    pub fn remove_if_empty(&self, key: &str) -> bool {
        let mut sessions = self.map();
        let empty = match sessions.get(key) {
            Some(session) => lock_session(session).is_empty(),
            None => return false,
        };
        if empty {
            sessions.remove(key);
            info!(session = key, "Empty session removed");
        }
        empty
    }

    /// Visits every session. The map is snapshotted first, so `f` may lock
    /// sessions and call back into the registry.
    pub fn for_each(&self, mut f: impl FnMut(&str, &SharedSession<E>)) {
        let entries: Vec<(SessionKey, SharedSession<E>)> = self
            .map()
            .iter()
            .map(|(key, session)| (key.clone(), Arc::clone(session)))
            .collect();
        for (key, session) in &entries {
            f(key, session);
        }
    }

    /// Lists the keys of every session.
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.map().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Returns true when no session is live.
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Lists a summary of every session, ordered by key.
    #[instrument(skip(self))]
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        self.for_each(|_, session| summaries.push(lock_session(session).summary()));
        summaries.sort_by(|a, b| a.key().cmp(b.key()));
        info!(count = summaries.len(), "Listed sessions");
        summaries
    }
}
