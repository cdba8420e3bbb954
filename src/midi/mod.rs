//! Platform MIDI plumbing for midibridge
//!
//! This module provides:
//! - The [`MidiService`] trait describing a platform MIDI subsystem
//! - [`MidirService`] for real MIDI devices via midir
//! - [`MockService`] for tests and demos
//! - The [`MidiMessage`] value handed to subscribers and the crate's
//!   [`MidiError`] type
//!
mod error;
mod message;
pub mod midir_service;
pub mod mock_service;
mod service;

pub use error::{MidiError, Result};
pub use message::MidiMessage;
pub use service::{MidiService, Notification, NotifyFn, PacketFn, PortRef, SessionRef};

pub use midir_service::MidirService;
pub use mock_service::{ConnectAttempt, MockService};

// Set default service type
pub type DefaultMidiService = MidirService;
