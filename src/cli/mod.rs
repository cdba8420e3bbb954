use crate::config::ClientConfig;
use crate::midi::MidiMessage;
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI sources
    #[arg(long)]
    pub device_list: bool,

    /// Client name announced to the MIDI system
    #[arg(long)]
    pub name: Option<String>,

    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also try one source index past the end when reconnecting
    #[arg(long)]
    pub inclusive_sources: bool,

    /// Log to the terminal as well as the log file
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Command line flags win over file and environment configuration
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(name) = &self.name {
            config.client_name = name.clone();
        }
        if self.inclusive_sources {
            config.inclusive_source_range = true;
        }
        config
    }
}

pub fn format_source_list(sources: &[String]) -> String {
    if sources.is_empty() {
        return "No MIDI sources available\n".to_string();
    }

    let mut listing = String::from("Available MIDI sources:\n");
    for (index, source) in sources.iter().enumerate() {
        listing.push_str(&format!("  {}: {}\n", index, source));
    }
    listing
}

pub fn format_message(received_at: DateTime<Local>, message: &MidiMessage) -> String {
    format!("{} {}", received_at.format("%H:%M:%S%.3f"), message)
}
