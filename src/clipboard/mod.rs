use std::io::{self, Write};
use std::process::{Command, Stdio};

use gtk4::gdk;
use gtk4::gdk::prelude::*;
use thiserror::Error;

const WL_COPY_COMMAND: &str = "wl-copy";
const MIME_TEXT_PLAIN_UTF8: &str = "text/plain;charset=utf-8";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("nothing to copy")]
    EmptyText,
    #[error("failed to run wl-copy command: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to access default display for clipboard operations")]
    DisplayUnavailable,
    #[error("wl-copy exited with non-zero status: {status}")]
    CommandFailed { status: String },
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

pub trait ClipboardBackend {
    fn copy_text(&self, text: &str) -> ClipboardResult<()>;
}

/// Clipboard owned by the GTK display; must be used on the main thread.
#[derive(Debug, Default)]
pub struct DisplayClipboard;

impl ClipboardBackend for DisplayClipboard {
    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        ensure_text(text)?;
        let display = gdk::Display::default().ok_or(ClipboardError::DisplayUnavailable)?;
        display.clipboard().set_text(text);
        Ok(())
    }
}

/// Survives the panel hiding, since wl-copy keeps serving the selection itself.
#[derive(Debug, Default)]
pub struct WlCopyBackend;

impl ClipboardBackend for WlCopyBackend {
    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        ensure_text(text)?;
        let command_line = format!("{WL_COPY_COMMAND} --type {MIME_TEXT_PLAIN_UTF8}");
        let mut child = Command::new(WL_COPY_COMMAND)
            .args(["--type", MIME_TEXT_PLAIN_UTF8])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ClipboardError::CommandIo {
                command: command_line.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|source| ClipboardError::CommandIo {
                    command: command_line.clone(),
                    source,
                })?;
        }

        let status = child.wait().map_err(|source| ClipboardError::CommandIo {
            command: command_line,
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::CommandFailed {
                status: status.to_string(),
            })
        }
    }
}

/// Tries each backend in order and returns the last error if none succeed.
pub fn copy_text_with(backends: &[&dyn ClipboardBackend], text: &str) -> ClipboardResult<()> {
    let mut last_error = ClipboardError::DisplayUnavailable;
    for backend in backends {
        match backend.copy_text(text) {
            Ok(()) => return Ok(()),
            Err(ClipboardError::EmptyText) => return Err(ClipboardError::EmptyText),
            Err(err) => {
                tracing::debug!(%err, "clipboard backend failed; trying next");
                last_error = err;
            }
        }
    }
    Err(last_error)
}

pub fn copy_text(text: &str) -> ClipboardResult<()> {
    copy_text_with(&[&WlCopyBackend, &DisplayClipboard], text)
}

fn ensure_text(text: &str) -> ClipboardResult<()> {
    if text.trim().is_empty() {
        Err(ClipboardError::EmptyText)
    } else {
        Ok(())
    }
}
