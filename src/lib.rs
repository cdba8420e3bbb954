pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod midi;
pub mod publisher;
pub mod registry;

pub use client::{MidiClient, RefreshSummary};
pub use crate::config::{ClientConfig, ConfigError, DEFAULT_CLIENT_NAME};
pub use midi::{
    DefaultMidiService, MidiError, MidiMessage, MidiService, MidirService, MockService,
    Notification, PortRef, Result, SessionRef,
};
pub use publisher::{CancelHandle, MidiPublisher, MidiStream, Subscription};
pub use registry::PortRegistry;
