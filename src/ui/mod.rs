//! Presentation side of an analysis cycle.
//!
//! The orchestrator talks to an [`AnalysisView`]; the desktop build implements it
//! with [`ChannelView`], which forwards every call to the GTK main loop as a
//! [`ViewCommand`].

use std::sync::mpsc;

use crate::capture::CapturedImage;
use crate::orchestrator::DismissHandle;

pub mod markdown;
pub mod panel;
pub mod style;

pub use panel::ResultPanel;
pub use style::{install_panel_css, PanelColors, StyleTokens, LAYOUT_TOKENS, PANEL_COLORS};

pub const ANALYZING_MESSAGE: &str = "Analyzing...";

/// One call per state transition, always from the orchestrator thread.
pub trait AnalysisView: Send {
    /// The capture is about to run. Nothing should be painted yet, or it may end up
    /// in the screenshot.
    fn capturing(&self);
    /// `preview` is the capture being analyzed, when there is one to show.
    fn show_transient(&self, message: &str, preview: Option<&CapturedImage>);
    fn show_result(&self, text: &str, on_close: DismissHandle);
    fn show_error(&self, message: &str, on_dismiss: DismissHandle);
    fn hide(&self);
}

#[derive(Debug)]
pub enum ViewCommand {
    Capturing,
    Transient {
        message: String,
        preview: Option<CapturedImage>,
    },
    Result {
        text: String,
        on_close: DismissHandle,
    },
    Error {
        message: String,
        on_dismiss: DismissHandle,
    },
    Hide,
}

#[derive(Debug, Clone)]
pub struct ChannelView {
    tx: mpsc::Sender<ViewCommand>,
}

impl ChannelView {
    pub fn new(tx: mpsc::Sender<ViewCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: ViewCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("ui main loop is gone; dropping view command");
        }
    }
}

impl AnalysisView for ChannelView {
    fn capturing(&self) {
        self.send(ViewCommand::Capturing);
    }

    fn show_transient(&self, message: &str, preview: Option<&CapturedImage>) {
        self.send(ViewCommand::Transient {
            message: message.to_string(),
            preview: preview.cloned(),
        });
    }

    fn show_result(&self, text: &str, on_close: DismissHandle) {
        self.send(ViewCommand::Result {
            text: text.to_string(),
            on_close,
        });
    }

    fn show_error(&self, message: &str, on_dismiss: DismissHandle) {
        self.send(ViewCommand::Error {
            message: message.to_string(),
            on_dismiss,
        });
    }

    fn hide(&self) {
        self.send(ViewCommand::Hide);
    }
}
