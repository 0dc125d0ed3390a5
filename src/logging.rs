use std::fs::OpenOptions;

use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};

use crate::config::LoggingConfig;

/// Install the process-wide logger for the `shcore` binary.
///
/// Logs go to stderr, or are appended to `cfg.file` when it is set.
/// Best-effort: if the file cannot be opened or a logger is already
/// installed, the call does nothing beyond a note on stderr.
pub fn init(cfg: &LoggingConfig) {
    let level = cfg.level_filter();
    let log_config = simplelog::Config::default();

    let installed = if cfg.file.is_empty() {
        TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)
    } else {
        match OpenOptions::new().create(true).append(true).open(&cfg.file) {
            Ok(file) => WriteLogger::init(level, log_config, file),
            Err(e) => {
                eprintln!("shcore: cannot open log file {}: {e}", cfg.file);
                return;
            }
        }
    };
    if installed.is_err() {
        eprintln!("shcore: logger already installed");
    }
}
