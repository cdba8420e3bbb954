use super::service::{MidiService, Notification, NotifyFn, PacketFn, PortRef, SessionRef};
use super::{MidiError, Result};
use log::{debug, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

const LISTER_NAME: &str = "midibridge-lister";

/// Identifies a source across polls: its display name plus how many
/// sources with the same name precede it, so identical devices stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub name: String,
    pub occurrence: usize,
}

pub fn source_ids(names: &[String]) -> Vec<SourceId> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_str()).or_insert(0);
            let id = SourceId {
                name: name.clone(),
                occurrence: *count,
            };
            *count += 1;
            id
        })
        .collect()
}

/// Difference between two source listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupDiff {
    pub added: Vec<SourceId>,
    pub removed: Vec<SourceId>,
}

impl SetupDiff {
    pub fn between(previous: &[SourceId], current: &[SourceId]) -> Self {
        SetupDiff {
            added: current
                .iter()
                .filter(|source| !previous.contains(source))
                .cloned()
                .collect(),
            removed: previous
                .iter()
                .filter(|source| !current.contains(source))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Notifications to deliver, in delivery order
    pub fn notifications(&self) -> Vec<Notification> {
        let mut fired = Vec::new();
        if !self.added.is_empty() {
            fired.push(Notification::ObjectAdded);
        }
        if !self.removed.is_empty() {
            fired.push(Notification::ObjectRemoved);
        }
        if !fired.is_empty() {
            fired.push(Notification::SetupChanged);
        }
        fired
    }
}

/// Takes the connections to `removed` sources out of `connections`
fn prune_connections<K, C>(connections: &mut HashMap<K, C>, removed: &[K]) -> Vec<C>
where
    K: Eq + Hash,
{
    removed
        .iter()
        .filter_map(|source| connections.remove(source))
        .collect()
}

struct MidirSession {
    name: String,
    notify: NotifyFn,
}

struct MidirPort {
    session: SessionRef,
    name: String,
    on_packet: PacketFn,
    // Source indices shift as devices come and go
    connections: HashMap<SourceId, MidiInputConnection<()>>,
}

#[derive(Default)]
struct MidirState {
    sessions: HashMap<SessionRef, MidirSession>,
    ports: HashMap<PortRef, MidirPort>,
    known_sources: Vec<SourceId>,
}

/// Platform service backed by midir.
///
/// A port here is a fan-in point: every source it is connected to gets its
/// own midir input connection, all feeding the same packet callback.
/// midir has no hot-plug callback, so topology changes are detected by
/// calling [`MidirService::poll_setup`] periodically.
pub struct MidirService {
    state: Mutex<MidirState>,
    next_id: AtomicU64,
}

impl Default for MidirService {
    fn default() -> Self {
        Self::new()
    }
}

impl MidirService {
    pub fn new() -> Self {
        let service = MidirService {
            state: Mutex::new(MidirState::default()),
            next_id: AtomicU64::new(0),
        };
        let sources = service.source_names();
        debug!("Initial MIDI sources: {:?}", sources);
        service.state().known_sources = source_ids(&sources);
        service
    }

    fn state(&self) -> MutexGuard<'_, MidirState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn open_input(name: &str) -> Result<MidiInput> {
        let mut midi_in = MidiInput::new(name)?;
        midi_in.ignore(Ignore::None);
        Ok(midi_in)
    }

    /// Compares the platform's source list with the one seen last time and
    /// notifies every live session of the difference.
    ///
    /// Returns the notifications that were delivered.
    pub fn poll_setup(&self) -> Vec<Notification> {
        let current = source_ids(&self.source_names());

        let (fired, listeners, stale) = {
            let mut state = self.state();
            let diff = SetupDiff::between(&state.known_sources, &current);
            state.known_sources = current;

            let mut stale = Vec::new();
            for port in state.ports.values_mut() {
                stale.extend(prune_connections(&mut port.connections, &diff.removed));
            }

            let listeners: Vec<NotifyFn> = state
                .sessions
                .values()
                .map(|session| session.notify.clone())
                .collect();
            (diff.notifications(), listeners, stale)
        };

        drop(stale);

        if !fired.is_empty() {
            info!("MIDI setup changed: {:?}", fired);
        }
        for notification in &fired {
            for listener in &listeners {
                listener(*notification);
            }
        }
        fired
    }
}

impl MidiService for MidirService {
    fn create_session(&self, name: &str, notify: NotifyFn) -> Result<SessionRef> {
        // Fail early if the platform has no MIDI input support at all
        Self::open_input(name).map_err(|e| MidiError::Session(e.to_string()))?;

        let session = SessionRef::from_raw(self.next_id());
        self.state().sessions.insert(
            session,
            MidirSession {
                name: name.to_string(),
                notify,
            },
        );
        info!("Opened MIDI session {} ({})", session, name);
        Ok(session)
    }

    fn dispose_session(&self, session: SessionRef) {
        let closing: Vec<MidiInputConnection<()>> = {
            let mut state = self.state();
            let Some(entry) = state.sessions.remove(&session) else {
                return;
            };
            debug!("Disposing MIDI session {} ({})", session, entry.name);

            let owned: Vec<PortRef> = state
                .ports
                .iter()
                .filter(|(_, port)| port.session == session)
                .map(|(port, _)| *port)
                .collect();
            owned
                .into_iter()
                .filter_map(|port| state.ports.remove(&port))
                .flat_map(|port| port.connections.into_values())
                .collect()
        };

        drop(closing);
    }

    fn create_input_port(
        &self,
        session: SessionRef,
        name: &str,
        on_packet: PacketFn,
    ) -> Result<PortRef> {
        let mut state = self.state();
        if !state.sessions.contains_key(&session) {
            return Err(MidiError::UnknownSession(session));
        }

        let port = PortRef::from_raw(self.next_id());
        state.ports.insert(
            port,
            MidirPort {
                session,
                name: name.to_string(),
                on_packet,
                connections: HashMap::new(),
            },
        );
        debug!("Created MIDI input port {} ({})", port, name);
        Ok(port)
    }

    fn dispose_port(&self, port: PortRef) {
        let removed = self.state().ports.remove(&port);
        if let Some(entry) = removed {
            debug!(
                "Disposing MIDI input port {} ({}) with {} connection(s)",
                port,
                entry.name,
                entry.connections.len()
            );
            drop(entry);
        }
    }

    fn source_count(&self) -> usize {
        match MidiInput::new(LISTER_NAME) {
            Ok(midi_in) => midi_in.port_count(),
            Err(e) => {
                warn!("Failed to enumerate MIDI sources: {}", e);
                0
            }
        }
    }

    fn source_name(&self, index: usize) -> Option<String> {
        let midi_in = MidiInput::new(LISTER_NAME).ok()?;
        let ports = midi_in.ports();
        let port = ports.get(index)?;
        midi_in.port_name(port).ok()
    }

    fn source_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(midi_in) = MidiInput::new(LISTER_NAME) {
            for port in midi_in.ports() {
                if let Ok(name) = midi_in.port_name(&port) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn connect_source(&self, port: PortRef, index: usize) -> Result<()> {
        let (port_name, on_packet) = {
            let state = self.state();
            let entry = state.ports.get(&port).ok_or(MidiError::UnknownPort(port))?;
            (entry.name.clone(), entry.on_packet.clone())
        };

        let midi_in = Self::open_input(&port_name)?;
        let sources = midi_in.ports();
        let source = sources.get(index).ok_or(MidiError::SourceOutOfRange {
            index,
            count: sources.len(),
        })?;
        let names = sources
            .iter()
            .map(|source| midi_in.port_name(source))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let source_id = source_ids(&names).swap_remove(index);

        let already_connected = self
            .state()
            .ports
            .get(&port)
            .is_some_and(|entry| entry.connections.contains_key(&source_id));
        if already_connected {
            return Ok(());
        }

        let connection = midi_in.connect(
            source,
            &port_name,
            move |_stamp, bytes, _| on_packet(bytes),
            (),
        )?;

        // The port may have been disposed, or connected by a concurrent
        // refresh, while the connection was opening
        let mut state = self.state();
        let outcome = match state.ports.get_mut(&port) {
            None => Err(MidiError::UnknownPort(port)),
            Some(entry) => {
                if !entry.connections.contains_key(&source_id) {
                    debug!(
                        "Connected {} to source '{}' #{}",
                        port, source_id.name, source_id.occurrence
                    );
                    entry.connections.insert(source_id, connection);
                }
                Ok(())
            }
        };
        drop(state);
        outcome
    }
}
