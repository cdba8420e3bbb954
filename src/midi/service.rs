//! The seam between a [`MidiClient`](crate::MidiClient) and the platform's
//! MIDI subsystem.
//!
//! A platform service hands out opaque session and port references,
//! enumerates sources by index, connects ports to sources, and calls back
//! asynchronously with topology [`Notification`]s and raw message bytes.

use super::Result;
use std::fmt;
use std::sync::Arc;

/// Opaque reference to a platform client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionRef(u64);

/// Opaque reference to a platform input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef(u64);

impl SessionRef {
    pub const fn from_raw(raw: u64) -> Self {
        SessionRef(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl PortRef {
    pub const fn from_raw(raw: u64) -> Self {
        PortRef(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Topology and configuration changes reported by the platform.
///
/// Ids follow the platform numbering; anything newer than the platform
/// revision this crate knows about arrives as [`Notification::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    SetupChanged,
    ObjectAdded,
    ObjectRemoved,
    PropertyChanged,
    ThruConnectionsChanged,
    SerialPortOwnerChanged,
    IoError,
    Unknown(i32),
}

impl Notification {
    pub fn from_message_id(id: i32) -> Self {
        match id {
            1 => Notification::SetupChanged,
            2 => Notification::ObjectAdded,
            3 => Notification::ObjectRemoved,
            4 => Notification::PropertyChanged,
            5 => Notification::ThruConnectionsChanged,
            6 => Notification::SerialPortOwnerChanged,
            7 => Notification::IoError,
            other => Notification::Unknown(other),
        }
    }

    pub fn message_id(&self) -> i32 {
        match self {
            Notification::SetupChanged => 1,
            Notification::ObjectAdded => 2,
            Notification::ObjectRemoved => 3,
            Notification::PropertyChanged => 4,
            Notification::ThruConnectionsChanged => 5,
            Notification::SerialPortOwnerChanged => 6,
            Notification::IoError => 7,
            Notification::Unknown(id) => *id,
        }
    }

    /// Whether this class of notification should reconnect ports to sources
    pub fn requests_refresh(&self) -> bool {
        !matches!(self, Notification::Unknown(_))
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::SetupChanged => write!(f, "setup-changed"),
            Notification::ObjectAdded => write!(f, "object-added"),
            Notification::ObjectRemoved => write!(f, "object-removed"),
            Notification::PropertyChanged => write!(f, "property-changed"),
            Notification::ThruConnectionsChanged => write!(f, "thru-connections-changed"),
            Notification::SerialPortOwnerChanged => write!(f, "serial-port-owner-changed"),
            Notification::IoError => write!(f, "io-error"),
            Notification::Unknown(id) => write!(f, "unknown({})", id),
        }
    }
}

/// Callback invoked with every notification delivered to a session
pub type NotifyFn = Arc<dyn Fn(Notification) + Send + Sync>;

/// Callback invoked with the raw bytes of every message arriving at a port
pub type PacketFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Trait defining the platform MIDI service a client runs on.
///
/// Implementations deliver notifications and packets on their own threads
/// and must not hold internal locks while invoking the callbacks, since a
/// callback may call straight back into the service.
pub trait MidiService: Send + Sync + 'static {
    /// Opens a client session that reports topology changes to `notify`
    fn create_session(&self, name: &str, notify: NotifyFn) -> Result<SessionRef>;

    /// Releases a session and every port still open under it
    fn dispose_session(&self, session: SessionRef);

    /// Creates an input port under `session` feeding `on_packet`
    fn create_input_port(
        &self,
        session: SessionRef,
        name: &str,
        on_packet: PacketFn,
    ) -> Result<PortRef>;

    /// Releases a port and its connections; unknown ports are ignored
    fn dispose_port(&self, port: PortRef);

    /// Number of sources currently known to the platform
    fn source_count(&self) -> usize;

    /// Display name of the source at `index`
    fn source_name(&self, index: usize) -> Option<String>;

    /// Connects `port` to the source at `index`.
    ///
    /// Connecting an already connected pair succeeds without side effects.
    fn connect_source(&self, port: PortRef, index: usize) -> Result<()>;

    fn source_names(&self) -> Vec<String> {
        (0..self.source_count())
            .filter_map(|index| self.source_name(index))
            .collect()
    }
}
