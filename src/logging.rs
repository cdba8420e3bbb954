use simplelog::*;
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("midibridge")
        .join("logs"))
}

/// Logs to `midibridge.log` in [`log_dir`], and to stderr as well when
/// `verbose` is set.
///
/// Only the first successful call installs a logger. Later calls return the
/// same path without touching the file system, and their `verbose` flag has
/// no effect.
pub fn init_logger(verbose: bool) -> Result<PathBuf, Error> {
    if let Some(path) = LOG_PATH.get() {
        log::debug!("Logger already initialized, verbose={} ignored", verbose);
        return Ok(path.clone());
    }

    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("midibridge.log");

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![WriteLogger::new(
        LevelFilter::Debug,
        Config::default(),
        log_file,
    )];
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    CombinedLogger::init(loggers).map_err(|e| {
        Error::new(
            ErrorKind::Other,
            format!("Logger initialization failed: {}", e),
        )
    })?;

    Ok(LOG_PATH.get_or_init(|| log_path).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_calls_reuse_the_first_logger() {
        let home = std::env::temp_dir().join(format!("midibridge-home-{}", std::process::id()));
        std::env::set_var("HOME", &home);

        let first = init_logger(false).unwrap();
        assert_eq!(first, home.join(".local/share/midibridge/logs/midibridge.log"));
        assert!(first.exists());

        // A second call must not reopen or recreate the file
        fs::remove_dir_all(&home).unwrap();
        let second = init_logger(true).unwrap();
        assert_eq!(second, first);
        assert!(!first.exists());
    }
}
