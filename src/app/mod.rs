//! Desktop shell: wires config, hotkey, orchestrator and the GTK panel together.
//!
//! Clue runs as a unique GApplication. The first `clue` process owns the
//! orchestrator; `clue --trigger` started later (e.g. from a Hyprland `bind`) is
//! forwarded to it and starts a cycle, as does the optional global hotkey.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{mpsc, Arc};

use gtk4::prelude::*;
use gtk4::Application;

use crate::capture::HyprlandCapture;
use crate::error::{AppError, AppResult};
use crate::hotkey;
use crate::notification;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::ui::{
    install_panel_css, ChannelView, ResultPanel, ViewCommand, LAYOUT_TOKENS, PANEL_COLORS,
};

mod bootstrap;
mod hypr;
mod launch;
mod presenter;
mod worker;

use self::bootstrap::*;
use self::launch::{gtk_launch_args, LaunchOptions, TRIGGER_FLAG};
use self::presenter::Presenter;
use self::worker::*;

const APPLICATION_ID: &str = "io.github.clue";
const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

#[derive(Debug, Default)]
pub struct App;

impl App {
    pub fn new() -> Self {
        Self
    }

    pub fn start(&self) -> AppResult<()> {
        let gtk_args = gtk_launch_args();
        let application = Application::new(
            Some(APPLICATION_ID),
            gtk4::gio::ApplicationFlags::HANDLES_COMMAND_LINE,
        );
        application
            .register(gtk4::gio::Cancellable::NONE)
            .map_err(|source| AppError::Register { source })?;
        if application.is_remote() {
            tracing::info!("clue is already running; forwarding command line to it");
            let _ = application.run_with_args(&gtk_args);
            return Ok(());
        }

        let bootstrap = bootstrap_app_runtime()?;
        let probe_target = bootstrap.local_probe_target();
        let registration = match hotkey::register(&bootstrap.config.hotkey) {
            Ok(registration) => Some(registration),
            Err(err) if err.is_unavailable() => {
                tracing::warn!(
                    error = %err,
                    "global hotkey unavailable; bind `clue {TRIGGER_FLAG}` in the compositor instead"
                );
                None
            }
            Err(err) => return Err(err.into()),
        };

        let (view_tx, view_rx) = mpsc::channel::<ViewCommand>();
        let (orchestrator, commands) = Orchestrator::new(
            OrchestratorSettings::from(&bootstrap.config),
            HyprlandCapture::new(),
            Arc::clone(&bootstrap.backend),
            ChannelView::new(view_tx),
        );
        let handle = orchestrator.handle();
        let orchestrator_thread = std::thread::Builder::new()
            .name("clue-orchestrator".to_string())
            .spawn(move || orchestrator.run(commands))
            .map_err(|source| AppError::Thread {
                name: "orchestrator",
                source,
            })?;
        if let Some(registration) = &registration {
            hotkey::spawn_listener(registration.id(), handle.clone()).map_err(|source| {
                AppError::Thread {
                    name: "hotkey listener",
                    source,
                }
            })?;
            tracing::info!(
                shortcut = registration.shortcut(),
                "global hotkey active"
            );
        }
        tracing::info!("ready; `clue {TRIGGER_FLAG}` analyzes the active window");

        tracing::info!("starting gtk runtime");
        let view_rx = Rc::new(RefCell::new(Some(view_rx)));
        let hold_guard = Rc::new(RefCell::new(None::<gtk4::gio::ApplicationHoldGuard>));
        let activate_once = Rc::new(Cell::new(false));

        let trigger_handle = handle.clone();
        application.connect_command_line(move |app, command_line| {
            let options = LaunchOptions::from_argv(&command_line.arguments());
            app.activate();
            if options.trigger {
                tracing::debug!(remote = command_line.is_remote(), "trigger requested");
                if !trigger_handle.hotkey_pressed() {
                    tracing::warn!("trigger ignored; orchestrator has stopped");
                }
            }
            gtk4::glib::ExitCode::SUCCESS
        });

        application.connect_activate(move |app| {
            if activate_once.replace(true) {
                tracing::debug!("ignoring duplicate gtk activate signal");
                return;
            }
            // No window is open while idle; keep the app alive anyway.
            let guard = <gtk4::Application as gtk4::gio::prelude::ApplicationExtManual>::hold(app);
            hold_guard.borrow_mut().replace(guard);
            install_quit_signals(app);

            install_panel_css(LAYOUT_TOKENS, &PANEL_COLORS);
            let panel = ResultPanel::new(app, LAYOUT_TOKENS, &PANEL_COLORS);
            let mut presenter = Presenter::new(panel, LAYOUT_TOKENS);
            if let Some(rx) = view_rx.borrow_mut().take() {
                attach_receiver(rx, move |command| presenter.apply(command));
            }

            if let Some(target) = probe_target.clone() {
                spawn_worker_action(
                    move || probe_local_backend(target),
                    |result| {
                        if let Err(err) = result {
                            let message = format!("{err:#}");
                            tracing::warn!(error = %message, "local backend probe failed");
                            notification::send(message);
                        }
                    },
                );
            }
        });

        let _ = application.run_with_args(&gtk_args);

        tracing::info!("gtk runtime stopped; shutting down");
        handle.shutdown();
        if orchestrator_thread.join().is_err() {
            tracing::error!("orchestrator thread panicked");
        }
        drop(registration);
        Ok(())
    }
}

fn install_quit_signals(app: &Application) {
    for signum in [SIGINT, SIGTERM] {
        let app = app.clone();
        let _ = gtk4::glib::unix_signal_add_local(signum, move || {
            tracing::info!(signum, "quit signal received");
            app.quit();
            gtk4::glib::ControlFlow::Break
        });
    }
}
