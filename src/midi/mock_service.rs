//! In-memory platform service for tests and demos.
//!
//! Sources are plain names that can be plugged and unplugged at will;
//! nothing is delivered unless the caller asks for it through
//! [`MockService::notify`] or [`MockService::deliver`].

use super::service::{MidiService, Notification, NotifyFn, PacketFn, PortRef, SessionRef};
use super::{MidiError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One call to [`MidiService::connect_source`] as seen by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAttempt {
    pub port: PortRef,
    pub source_index: usize,
    pub accepted: bool,
}

struct MockSession {
    name: String,
    notify: NotifyFn,
}

struct MockPort {
    session: SessionRef,
    name: String,
    on_packet: PacketFn,
    connected: HashSet<String>,
}

#[derive(Default)]
struct MockState {
    sources: Vec<String>,
    sessions: HashMap<SessionRef, MockSession>,
    ports: HashMap<PortRef, MockPort>,
    attempts: Vec<ConnectAttempt>,
    sessions_disposed: usize,
    ports_created: usize,
    ports_disposed: usize,
    refuse_sessions: bool,
    refuse_ports: bool,
}

#[derive(Default)]
pub struct MockService {
    state: Mutex<MockState>,
    next_id: AtomicU64,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources<I, T>(sources: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let service = Self::new();
        service.set_sources(sources);
        service
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replaces the source list. Existing connections to sources that
    /// disappear are dropped.
    pub fn set_sources<I, T>(&self, sources: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut state = self.state();
        state.sources = sources.into_iter().map(Into::into).collect();
        let live: HashSet<String> = state.sources.iter().cloned().collect();
        for port in state.ports.values_mut() {
            port.connected.retain(|source| live.contains(source));
        }
    }

    pub fn add_source(&self, name: impl Into<String>) {
        self.state().sources.push(name.into());
    }

    pub fn remove_source(&self, name: &str) {
        let mut state = self.state();
        state.sources.retain(|source| source != name);
        for port in state.ports.values_mut() {
            port.connected.remove(name);
        }
    }

    /// Makes the next session creations fail
    pub fn refuse_sessions(&self, refuse: bool) {
        self.state().refuse_sessions = refuse;
    }

    /// Makes the next port creations fail
    pub fn refuse_ports(&self, refuse: bool) {
        self.state().refuse_ports = refuse;
    }

    /// Delivers `notification` to every live session
    pub fn notify(&self, notification: Notification) {
        let listeners: Vec<NotifyFn> = self
            .state()
            .sessions
            .values()
            .map(|session| session.notify.clone())
            .collect();

        for listener in listeners {
            listener(notification);
        }
    }

    /// Pushes `bytes` from the source at `source_index` to every port
    /// connected to it. Returns the number of ports reached.
    pub fn deliver(&self, source_index: usize, bytes: &[u8]) -> usize {
        let receivers: Vec<PacketFn> = {
            let state = self.state();
            let Some(source) = state.sources.get(source_index) else {
                return 0;
            };
            state
                .ports
                .values()
                .filter(|port| port.connected.contains(source))
                .map(|port| port.on_packet.clone())
                .collect()
        };

        for receiver in &receivers {
            receiver(bytes);
        }
        receivers.len()
    }

    pub fn connect_attempts(&self) -> Vec<ConnectAttempt> {
        self.state().attempts.clone()
    }

    pub fn clear_connect_attempts(&self) {
        self.state().attempts.clear();
    }

    pub fn is_connected(&self, port: PortRef, source_index: usize) -> bool {
        let state = self.state();
        match (state.ports.get(&port), state.sources.get(source_index)) {
            (Some(port), Some(source)) => port.connected.contains(source),
            _ => false,
        }
    }

    pub fn live_ports(&self) -> Vec<PortRef> {
        let mut ports: Vec<PortRef> = self.state().ports.keys().copied().collect();
        ports.sort();
        ports
    }

    pub fn port_name(&self, port: PortRef) -> Option<String> {
        self.state().ports.get(&port).map(|port| port.name.clone())
    }

    pub fn port_session(&self, port: PortRef) -> Option<SessionRef> {
        self.state().ports.get(&port).map(|port| port.session)
    }

    pub fn session_name(&self, session: SessionRef) -> Option<String> {
        self.state()
            .sessions
            .get(&session)
            .map(|session| session.name.clone())
    }

    pub fn live_sessions(&self) -> usize {
        self.state().sessions.len()
    }

    pub fn sessions_disposed(&self) -> usize {
        self.state().sessions_disposed
    }

    pub fn ports_created(&self) -> usize {
        self.state().ports_created
    }

    pub fn ports_disposed(&self) -> usize {
        self.state().ports_disposed
    }
}

impl MidiService for MockService {
    fn create_session(&self, name: &str, notify: NotifyFn) -> Result<SessionRef> {
        if self.state().refuse_sessions {
            return Err(MidiError::Session(format!(
                "mock service refused session '{}'",
                name
            )));
        }

        let session = SessionRef::from_raw(self.next_id());
        self.state().sessions.insert(
            session,
            MockSession {
                name: name.to_string(),
                notify,
            },
        );
        Ok(session)
    }

    fn dispose_session(&self, session: SessionRef) {
        let mut state = self.state();
        if state.sessions.remove(&session).is_none() {
            return;
        }
        state.sessions_disposed += 1;

        let before = state.ports.len();
        state.ports.retain(|_, port| port.session != session);
        let released = before - state.ports.len();
        state.ports_disposed += released;
    }

    fn create_input_port(
        &self,
        session: SessionRef,
        name: &str,
        on_packet: PacketFn,
    ) -> Result<PortRef> {
        let id = self.next_id();
        let mut state = self.state();
        if state.refuse_ports {
            return Err(MidiError::PortCreate(format!(
                "mock service refused port '{}'",
                name
            )));
        }
        if !state.sessions.contains_key(&session) {
            return Err(MidiError::UnknownSession(session));
        }

        let port = PortRef::from_raw(id);
        state.ports.insert(
            port,
            MockPort {
                session,
                name: name.to_string(),
                on_packet,
                connected: HashSet::new(),
            },
        );
        state.ports_created += 1;
        Ok(port)
    }

    fn dispose_port(&self, port: PortRef) {
        let mut state = self.state();
        if state.ports.remove(&port).is_some() {
            state.ports_disposed += 1;
        }
    }

    fn source_count(&self) -> usize {
        self.state().sources.len()
    }

    fn source_name(&self, index: usize) -> Option<String> {
        self.state().sources.get(index).cloned()
    }

    fn connect_source(&self, port: PortRef, index: usize) -> Result<()> {
        let mut state = self.state();
        let count = state.sources.len();
        let source = state.sources.get(index).cloned();

        let outcome = match (state.ports.get_mut(&port), source) {
            (None, _) => Err(MidiError::UnknownPort(port)),
            (Some(_), None) => Err(MidiError::SourceOutOfRange { index, count }),
            (Some(entry), Some(source)) => {
                entry.connected.insert(source);
                Ok(())
            }
        };

        state.attempts.push(ConnectAttempt {
            port,
            source_index: index,
            accepted: outcome.is_ok(),
        });
        outcome
    }
}
