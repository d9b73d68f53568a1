use crate::notification::TransientNotice;
use crate::ui::panel::PANEL_TITLE;
use crate::ui::{ResultPanel, StyleTokens, ViewCommand};

use super::hypr::float_panel;

/// Applies view commands on the GTK main thread.
pub(super) struct Presenter {
    panel: ResultPanel,
    notice: TransientNotice,
    tokens: StyleTokens,
}

impl Presenter {
    pub(super) fn new(panel: ResultPanel, tokens: StyleTokens) -> Self {
        Self {
            panel,
            notice: TransientNotice::default(),
            tokens,
        }
    }

    pub(super) fn apply(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Capturing => {
                // Painting here would end up in the screenshot.
                tracing::debug!("capture in progress");
            }
            ViewCommand::Transient { message, preview } => self
                .notice
                .show(&message, preview.as_ref().map(|image| image.bytes.as_slice())),
            ViewCommand::Result { text, on_close } => {
                self.notice.close();
                self.panel.show_result(&text, on_close);
                self.place_panel();
            }
            ViewCommand::Error {
                message,
                on_dismiss,
            } => {
                self.notice.close();
                self.panel.show_error(&message, on_dismiss);
                self.place_panel();
            }
            ViewCommand::Hide => {
                self.notice.close();
                self.panel.hide();
            }
        }
    }

    fn place_panel(&self) {
        float_panel(PANEL_TITLE, self.tokens.panel_width, self.tokens.panel_height);
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        if self.notice.is_showing() {
            self.notice.close();
        }
    }
}
