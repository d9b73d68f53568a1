use std::process::Command;
use std::time::Duration;

const HYPR_FLOAT_RETRY_COUNT: u8 = 40;
const HYPR_FLOAT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct HyprClientMatch {
    pub(super) address: String,
    pub(super) floating: bool,
    pub(super) pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MonitorArea {
    pub(super) x: i32,
    pub(super) y: i32,
    pub(super) width: i32,
    pub(super) height: i32,
}

/// Finds our own window by exact title; other processes may use the same title.
pub(super) fn hypr_client_match_from_json(
    stdout: &[u8],
    expected_title: &str,
    own_pid: u32,
) -> Option<HyprClientMatch> {
    let parsed: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    let clients = parsed.as_array()?;
    for client in clients {
        let Some(title) = client.get("title").and_then(serde_json::Value::as_str) else {
            continue;
        };
        if title != expected_title {
            continue;
        }
        let pid = client.get("pid").and_then(serde_json::Value::as_i64);
        if pid != Some(i64::from(own_pid)) {
            continue;
        }
        let Some(address) = client.get("address").and_then(serde_json::Value::as_str) else {
            continue;
        };
        let flag = |name: &str| {
            client
                .get(name)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        };
        return Some(HyprClientMatch {
            address: address.to_string(),
            floating: flag("floating"),
            pinned: flag("pinned"),
        });
    }
    None
}

/// Logical area of the focused monitor (falls back to the first one listed).
pub(super) fn focused_monitor_from_json(stdout: &[u8]) -> Option<MonitorArea> {
    let parsed: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    let monitors = parsed.as_array()?;
    let monitor = monitors
        .iter()
        .find(|monitor| {
            monitor
                .get("focused")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        })
        .or_else(|| monitors.first())?;

    let scale = monitor
        .get("scale")
        .and_then(serde_json::Value::as_f64)
        .filter(|scale| *scale > 0.0)
        .unwrap_or(1.0);
    let int = |name: &str| monitor.get(name).and_then(serde_json::Value::as_i64);
    let logical = |pixels: i64| (pixels as f64 / scale).round() as i32;

    let width = logical(int("width")?);
    let height = logical(int("height")?);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(MonitorArea {
        x: i32::try_from(int("x")?).ok()?,
        y: i32::try_from(int("y")?).ok()?,
        width,
        height,
    })
}

/// Horizontally centered, vertically centered on the upper third.
pub(super) fn panel_geometry(monitor: MonitorArea, width: i32, height: i32) -> (i32, i32, i32, i32) {
    let width = width.clamp(1, monitor.width);
    let height = height.clamp(1, monitor.height);
    let x = monitor.x + (monitor.width - width) / 2;
    let y = monitor.y + (monitor.height / 3 - height / 2).max(0);
    (x, y, width, height)
}

fn retry_until_some<T, F, S>(
    retry_count: u8,
    retry_delay: Duration,
    mut action: F,
    mut sleep: S,
) -> Option<T>
where
    F: FnMut(u8) -> Option<T>,
    S: FnMut(Duration),
{
    if retry_count == 0 {
        return None;
    }

    for attempt in 1..=retry_count {
        if let Some(value) = action(attempt) {
            return Some(value);
        }

        if attempt < retry_count {
            sleep(retry_delay);
        }
    }

    None
}

fn hyprctl_json(query: &str) -> Option<Vec<u8>> {
    let outcome = Command::new("hyprctl").args(["-j", query]).output().ok()?;
    outcome.status.success().then_some(outcome.stdout)
}

fn dispatch(window_title: &str, dispatcher: &str, arg: &str) {
    let outcome = Command::new("hyprctl")
        .args(["dispatch", dispatcher, arg])
        .output();
    match outcome {
        Ok(result) if result.status.success() => {
            tracing::debug!(
                window = window_title,
                dispatcher = dispatcher,
                arg = arg,
                "hyprctl dispatch applied"
            );
        }
        Ok(result) => {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::warn!(
                window = window_title,
                dispatcher = dispatcher,
                arg = arg,
                status = result.status.code(),
                stderr = stderr.trim(),
                "hyprctl dispatch returned non-zero status"
            );
        }
        Err(err) => {
            tracing::debug!(
                window = window_title,
                dispatcher = dispatcher,
                arg = arg,
                ?err,
                "hyprctl dispatch failed"
            );
        }
    }
}

/// Makes the panel a pinned floating window placed like a launcher. No-op outside
/// Hyprland, where the compositor decides placement.
pub(super) fn float_panel(window_title: &str, width: i32, height: i32) {
    if std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_none() {
        tracing::debug!(window = window_title, "skipping panel placement outside Hyprland");
        return;
    }

    let window_title = window_title.to_string();
    let own_pid = std::process::id();
    std::thread::spawn(move || {
        let Some(matched) = retry_until_some(
            HYPR_FLOAT_RETRY_COUNT,
            HYPR_FLOAT_RETRY_DELAY,
            |_| {
                let stdout = hyprctl_json("clients")?;
                hypr_client_match_from_json(&stdout, &window_title, own_pid)
            },
            std::thread::sleep,
        ) else {
            tracing::debug!(window = window_title, "hypr window lookup failed for panel");
            return;
        };

        let selector = format!("address:{}", matched.address);
        if !matched.floating {
            dispatch(&window_title, "setfloating", &selector);
        }
        if !matched.pinned {
            dispatch(&window_title, "pin", &selector);
        }
        if let Some(monitor) = hyprctl_json("monitors").and_then(|out| focused_monitor_from_json(&out))
        {
            let (x, y, width, height) = panel_geometry(monitor, width, height);
            dispatch(
                &window_title,
                "resizewindowpixel",
                &format!("exact {width} {height},{selector}"),
            );
            dispatch(
                &window_title,
                "movewindowpixel",
                &format!("exact {x} {y},{selector}"),
            );
        }
        dispatch(&window_title, "focuswindow", &selector);
    });
}
