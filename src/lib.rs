pub mod app;
pub mod backend;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod hotkey;
pub mod logging;
pub mod notification;
pub mod orchestrator;
pub mod state;
pub mod ui;
pub use error::{AppError, AppResult};

/// Entrypoint used by the `clue` binary.
pub fn run() -> AppResult<()> {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Clue");

    app::App::new().start()?;

    tracing::info!("shutdown complete");
    Ok(())
}
