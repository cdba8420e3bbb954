use chrono::Local;
use clap::Parser;
use crossbeam::channel::RecvTimeoutError;
use midibridge::{
    cli::{format_message, format_source_list, Args},
    logging, ClientConfig, DefaultMidiService, MidiClient, MidiService, MidiStream,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    let args = Args::parse();
    initialize_logging(args.verbose);

    let config = load_configuration(&args);
    let service = Arc::new(DefaultMidiService::new());

    if args.device_list {
        print!("{}", format_source_list(&service.source_names()));
        return;
    }

    let client = match MidiClient::with_config(Arc::clone(&service), &config) {
        Ok(client) => client,
        Err(e) => exit_with_error(&format!("Error opening MIDI client: {}", e)),
    };

    let stream = match client.stream() {
        Ok(stream) => stream,
        Err(e) => exit_with_error(&format!("Error subscribing to MIDI input: {}", e)),
    };

    log::info!(
        "Listening on port '{}' as '{}'",
        stream.subscription().port_name(),
        client.name()
    );
    println!("Listening for MIDI messages. Press Ctrl+C to exit...");

    run_monitor_loop(
        &service,
        &stream,
        Duration::from_millis(config.poll_interval_ms),
    );
}

fn initialize_logging(verbose: bool) {
    match logging::init_logger(verbose) {
        Ok(path) => log::info!("Application starting, logging to {}", path.display()),
        Err(e) => eprintln!("Logger initialization failed: {}", e),
    }
}

fn load_configuration(args: &Args) -> ClientConfig {
    match ClientConfig::load(args.config.as_deref()) {
        Ok(config) => args.apply(config),
        Err(e) => exit_with_error(&format!("Error loading configuration: {}", e)),
    }
}

fn exit_with_error(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    std::process::exit(1);
}

// Prints messages as they arrive and checks for hot-plugged devices once
// per poll interval, busy or not.
fn run_monitor_loop(service: &DefaultMidiService, stream: &MidiStream, poll_interval: Duration) {
    let mut last_poll = Instant::now();
    loop {
        match stream.recv_timeout(poll_interval) {
            Ok(message) => println!("{}", format_message(Local::now(), &message)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("MIDI stream closed");
                break;
            }
        }

        if last_poll.elapsed() >= poll_interval {
            for notification in service.poll_setup() {
                log::info!("MIDI setup notification: {}", notification);
            }
            last_poll = Instant::now();
        }
    }
}
