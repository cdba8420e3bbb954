use thiserror::Error;

use super::service::{PortRef, SessionRef};

/// Error type for MIDI client and platform operations
#[derive(Debug, Error)]
pub enum MidiError {
    /// The platform refused to open a client session
    #[error("MIDI session error: {0}")]
    Session(String),
    /// The platform refused to create an input port
    #[error("MIDI port creation error: {0}")]
    PortCreate(String),
    /// Connecting a port to a source failed
    #[error("MIDI connection error: {0}")]
    Connect(String),
    /// A source index past the end of the platform's source list
    #[error("MIDI source {index} out of range ({count} sources available)")]
    SourceOutOfRange { index: usize, count: usize },
    #[error("unknown MIDI port {0}")]
    UnknownPort(PortRef),
    #[error("unknown MIDI session {0}")]
    UnknownSession(SessionRef),
    /// Any other failure reported by the platform backend
    #[error("MIDI backend error: {0}")]
    Backend(String),
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

impl From<midir::InitError> for MidiError {
    fn from(err: midir::InitError) -> Self {
        MidiError::Backend(err.to_string())
    }
}

impl From<midir::PortInfoError> for MidiError {
    fn from(err: midir::PortInfoError) -> Self {
        MidiError::Backend(err.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for MidiError {
    fn from(err: midir::ConnectError<T>) -> Self {
        MidiError::Connect(err.to_string())
    }
}
