//! Global trigger shortcut.
//!
//! The shortcut string comes from config (`"Super+Shift+F"` by default). Presses are
//! forwarded to the orchestrator as-is; deciding whether one should start a cycle
//! is not this module's job.
//!
//! `global-hotkey` grabs keys through X11, so on a Wayland compositor it only sees
//! presses while an XWayland window has focus. A compositor bind running
//! `clue --trigger` reaches the running instance regardless.

use std::io;
use std::thread::JoinHandle;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use thiserror::Error;

use crate::orchestrator::OrchestratorHandle;

const LETTER_CODES: [Code; 26] = [
    Code::KeyA,
    Code::KeyB,
    Code::KeyC,
    Code::KeyD,
    Code::KeyE,
    Code::KeyF,
    Code::KeyG,
    Code::KeyH,
    Code::KeyI,
    Code::KeyJ,
    Code::KeyK,
    Code::KeyL,
    Code::KeyM,
    Code::KeyN,
    Code::KeyO,
    Code::KeyP,
    Code::KeyQ,
    Code::KeyR,
    Code::KeyS,
    Code::KeyT,
    Code::KeyU,
    Code::KeyV,
    Code::KeyW,
    Code::KeyX,
    Code::KeyY,
    Code::KeyZ,
];

const DIGIT_CODES: [Code; 10] = [
    Code::Digit0,
    Code::Digit1,
    Code::Digit2,
    Code::Digit3,
    Code::Digit4,
    Code::Digit5,
    Code::Digit6,
    Code::Digit7,
    Code::Digit8,
    Code::Digit9,
];

const FUNCTION_CODES: [Code; 12] = [
    Code::F1,
    Code::F2,
    Code::F3,
    Code::F4,
    Code::F5,
    Code::F6,
    Code::F7,
    Code::F8,
    Code::F9,
    Code::F10,
    Code::F11,
    Code::F12,
];

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("no key found in shortcut {shortcut:?}")]
    MissingKey { shortcut: String },
    #[error("shortcut {shortcut:?} names more than one key")]
    MultipleKeys { shortcut: String },
    #[error("unknown key {key:?} in shortcut")]
    UnknownKey { key: String },
    #[error("failed to create global hotkey manager: {source}")]
    Manager {
        #[source]
        source: global_hotkey::Error,
    },
    #[error("failed to register global hotkey {shortcut:?}: {source}")]
    Register {
        shortcut: String,
        #[source]
        source: global_hotkey::Error,
    },
}

pub type HotkeyResult<T> = std::result::Result<T, HotkeyError>;

impl HotkeyError {
    /// The shortcut was valid but the desktop would not grab it, typically because
    /// no X server is reachable. `clue --trigger` still works in that case.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Manager { .. } | Self::Register { .. })
    }
}

/// Parses `"Ctrl+Alt+K"`-style strings. Modifier and key names are case-insensitive.
pub fn parse_shortcut(shortcut: &str) -> HotkeyResult<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut key_code: Option<Code> = None;

    for token in shortcut.split('+').map(str::trim).filter(|token| !token.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" | "option" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "super" | "win" | "meta" | "cmd" | "logo" => modifiers |= Modifiers::SUPER,
            _ => {
                if key_code.is_some() {
                    return Err(HotkeyError::MultipleKeys {
                        shortcut: shortcut.to_string(),
                    });
                }
                key_code = Some(parse_key_code(token)?);
            }
        }
    }

    let code = key_code.ok_or_else(|| HotkeyError::MissingKey {
        shortcut: shortcut.to_string(),
    })?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, code))
}

fn parse_key_code(token: &str) -> HotkeyResult<Code> {
    let unknown = || HotkeyError::UnknownKey {
        key: token.to_string(),
    };
    let lower = token.to_ascii_lowercase();

    let mut chars = lower.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_lowercase() {
            return Ok(LETTER_CODES[usize::from(ch as u8 - b'a')]);
        }
        if ch.is_ascii_digit() {
            return Ok(DIGIT_CODES[usize::from(ch as u8 - b'0')]);
        }
    }

    if let Some(number) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return number
            .checked_sub(1)
            .and_then(|index| FUNCTION_CODES.get(index).copied())
            .ok_or_else(unknown);
    }

    match lower.as_str() {
        "space" => Ok(Code::Space),
        "enter" | "return" => Ok(Code::Enter),
        "tab" => Ok(Code::Tab),
        "escape" | "esc" => Ok(Code::Escape),
        "backspace" => Ok(Code::Backspace),
        "delete" | "del" => Ok(Code::Delete),
        "insert" | "ins" => Ok(Code::Insert),
        "home" => Ok(Code::Home),
        "end" => Ok(Code::End),
        "pageup" => Ok(Code::PageUp),
        "pagedown" => Ok(Code::PageDown),
        "up" => Ok(Code::ArrowUp),
        "down" => Ok(Code::ArrowDown),
        "left" => Ok(Code::ArrowLeft),
        "right" => Ok(Code::ArrowRight),
        "print" | "printscreen" => Ok(Code::PrintScreen),
        _ => Err(unknown()),
    }
}

/// Keeps the shortcut grabbed for as long as it is alive.
pub struct HotkeyRegistration {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    shortcut: String,
}

impl HotkeyRegistration {
    pub fn id(&self) -> u32 {
        self.hotkey.id()
    }

    pub fn shortcut(&self) -> &str {
        &self.shortcut
    }
}

impl Drop for HotkeyRegistration {
    fn drop(&mut self) {
        if let Err(err) = self.manager.unregister(self.hotkey) {
            tracing::debug!(shortcut = %self.shortcut, %err, "failed to unregister hotkey");
        }
    }
}

pub fn register(shortcut: &str) -> HotkeyResult<HotkeyRegistration> {
    let hotkey = parse_shortcut(shortcut)?;
    let manager = GlobalHotKeyManager::new().map_err(|source| HotkeyError::Manager { source })?;
    manager
        .register(hotkey)
        .map_err(|source| HotkeyError::Register {
            shortcut: shortcut.to_string(),
            source,
        })?;
    tracing::info!(shortcut, id = hotkey.id(), "global hotkey registered");
    Ok(HotkeyRegistration {
        manager,
        hotkey,
        shortcut: shortcut.to_string(),
    })
}

pub fn is_trigger(event: &GlobalHotKeyEvent, hotkey_id: u32) -> bool {
    event.id == hotkey_id && event.state == HotKeyState::Pressed
}

/// Forwards presses of `hotkey_id` until the orchestrator stops listening.
pub fn spawn_listener(hotkey_id: u32, handle: OrchestratorHandle) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("clue-hotkey".to_string())
        .spawn(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            while let Ok(event) = receiver.recv() {
                if !is_trigger(&event, hotkey_id) {
                    continue;
                }
                tracing::debug!(hotkey_id, "trigger hotkey pressed");
                if !handle.hotkey_pressed() {
                    break;
                }
            }
            tracing::debug!("hotkey listener stopped");
        })
}
