use serde::Deserialize;

use super::CaptureError;

#[derive(Deserialize)]
struct ActiveWindowStatus {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    pid: Option<i64>,
    #[serde(default)]
    mapped: Option<bool>,
    #[serde(default)]
    hidden: Option<bool>,
    #[serde(default)]
    at: Option<[i32; 2]>,
    #[serde(default)]
    size: Option<[i32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ActiveWindow {
    pub(super) x: i32,
    pub(super) y: i32,
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) label: String,
}

impl ActiveWindow {
    /// Geometry in the `X,Y WxH` form `grim -g` expects.
    pub(super) fn geometry(&self) -> String {
        format!("{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `hyprctl activewindow -j`. Hyprland prints `{}` (or `Invalid`) when
/// nothing has focus; both map to [`CaptureError::NoActiveWindow`], as does a
/// window owned by `own_pid` so the result panel never captures itself.
pub(super) fn parse_active_window(
    active_window_json: &str,
    own_pid: u32,
) -> Result<ActiveWindow, CaptureError> {
    let trimmed = active_window_json.trim();
    if trimmed.is_empty() || trimmed == "{}" || trimmed.eq_ignore_ascii_case("invalid") {
        return Err(CaptureError::NoActiveWindow);
    }

    let window: ActiveWindowStatus =
        serde_json::from_str(trimmed).map_err(|err| CaptureError::InvalidWindowMetadata {
            message: err.to_string(),
        })?;

    if window.hidden.unwrap_or(false) || matches!(window.mapped, Some(false)) {
        return Err(CaptureError::NoActiveWindow);
    }
    if window.pid == Some(i64::from(own_pid)) {
        tracing::debug!(pid = own_pid, "active window belongs to this process");
        return Err(CaptureError::NoActiveWindow);
    }

    let [x, y] = window.at.ok_or(CaptureError::NoActiveWindow)?;
    let [width, height] = window.size.ok_or(CaptureError::NoActiveWindow)?;
    let width = positive_dimension(width, "width")?;
    let height = positive_dimension(height, "height")?;

    Ok(ActiveWindow {
        x,
        y,
        width,
        height,
        label: format_window_label(window.title.as_deref(), window.class.as_deref()),
    })
}

fn positive_dimension(value: i32, axis: &str) -> Result<u32, CaptureError> {
    u32::try_from(value)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| CaptureError::InvalidWindowMetadata {
            message: format!("active window has non-positive {axis}: {value}"),
        })
}

fn format_window_label(title: Option<&str>, class: Option<&str>) -> String {
    let title = title.map(str::trim).filter(|value| !value.is_empty());
    let class = class.map(str::trim).filter(|value| !value.is_empty());
    let body = match (title, class) {
        (Some(title), Some(class)) => format!("{title} [{class}]"),
        (Some(title), None) => title.to_string(),
        (None, Some(class)) => class.to_string(),
        (None, None) => "window".to_string(),
    };
    body.replace(['\n', '\r'], " ")
}
