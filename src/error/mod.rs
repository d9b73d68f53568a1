use std::io;

use crate::config::ConfigError;
use crate::hotkey::HotkeyError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Failures that stop Clue from starting. Per-cycle failures never get here;
/// they end up on the error panel instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to register the application instance: {source}")]
    Register {
        #[source]
        source: gtk4::glib::Error,
    },
    #[error("failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}
