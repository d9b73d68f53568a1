use std::io::{Cursor, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use self::hyprland::parse_active_window;
use thiserror::Error;

mod hyprland;

/// Upper bound for one `hyprctl`/`grim` invocation. Capture runs on the
/// orchestrator thread, so a hung command would otherwise stall every command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Encoded image of the captured window, ready to be handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no active window")]
    NoActiveWindow,
    #[error("screen capture permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },
    #[error("command io error: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out: {command} did not finish within {} ms", .timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
    #[error("invalid window metadata: {message}")]
    InvalidWindowMetadata { message: String },
    #[error("captured image is unreadable: {message}")]
    UnreadableImage { message: String },
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// What the orchestrator needs from the platform: one image of whatever window
/// currently has focus.
pub trait CaptureService: Send {
    fn capture_active_window(&self) -> CaptureResult<CapturedImage>;
}

/// Process-level seam under [`HyprlandCapture`], so the parsing and validation
/// can be exercised without a compositor.
pub trait CaptureBackend {
    fn active_window_json(&self) -> CaptureResult<String>;
    fn capture_region(&self, geometry: &str) -> CaptureResult<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCaptureBackend;

impl CaptureBackend for SystemCaptureBackend {
    fn active_window_json(&self) -> CaptureResult<String> {
        run_command_output("hyprctl", &["activewindow", "-j"])
    }

    fn capture_region(&self, geometry: &str) -> CaptureResult<Vec<u8>> {
        run_command_bytes("grim", &["-g", geometry, "-t", "png", "-"])
    }
}

/// Active window capture for Hyprland (`hyprctl` + `grim`).
#[derive(Debug, Default, Clone)]
pub struct HyprlandCapture<B = SystemCaptureBackend> {
    backend: B,
}

impl HyprlandCapture<SystemCaptureBackend> {
    pub fn new() -> Self {
        Self {
            backend: SystemCaptureBackend,
        }
    }
}

impl<B: CaptureBackend + Send> CaptureService for HyprlandCapture<B> {
    fn capture_active_window(&self) -> CaptureResult<CapturedImage> {
        capture_active_window_with(&self.backend, std::process::id())
    }
}

pub fn capture_active_window_with<B: CaptureBackend>(
    backend: &B,
    own_pid: u32,
) -> CaptureResult<CapturedImage> {
    let window_json = backend.active_window_json()?;
    let window = parse_active_window(&window_json, own_pid)?;
    let geometry = window.geometry();
    tracing::debug!(window = %window.label, %geometry, "capturing active window");

    let bytes = backend.capture_region(&geometry)?;
    let image = decode_captured_image(bytes)?;
    tracing::info!(
        window = %window.label,
        width = image.width,
        height = image.height,
        bytes = image.bytes.len(),
        "captured active window"
    );
    Ok(image)
}

/// Checks that `bytes` hold a PNG or JPEG and reads its dimensions without
/// decoding the pixels.
pub fn decode_captured_image(bytes: Vec<u8>) -> CaptureResult<CapturedImage> {
    if bytes.is_empty() {
        return Err(CaptureError::UnreadableImage {
            message: "capture produced no data".to_string(),
        });
    }

    let format = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => ImageFormat::Png,
        Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
        Ok(other) => {
            return Err(CaptureError::UnreadableImage {
                message: format!("unsupported image format {other:?}"),
            })
        }
        Err(err) => {
            return Err(CaptureError::UnreadableImage {
                message: err.to_string(),
            })
        }
    };

    let (width, height) = image::ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|err| CaptureError::UnreadableImage {
            message: err.to_string(),
        })?
        .into_dimensions()
        .map_err(|err| CaptureError::UnreadableImage {
            message: err.to_string(),
        })?;

    Ok(CapturedImage {
        bytes,
        format,
        width,
        height,
    })
}

fn run_command_output(command: &str, args: &[&str]) -> CaptureResult<String> {
    let stdout = run_command_bytes(command, args)?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn run_command_bytes(command: &str, args: &[&str]) -> CaptureResult<Vec<u8>> {
    run_command_bytes_within(command, args, COMMAND_TIMEOUT)
}

fn run_command_bytes_within(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> CaptureResult<Vec<u8>> {
    let io_error = |source: std::io::Error| {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            CaptureError::PermissionDenied {
                message: format!("{command}: {source}"),
            }
        } else {
            CaptureError::CommandIo {
                command: command.to_string(),
                source,
            }
        }
    };

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(io_error)?;

    // Pipes are drained while waiting; grim can write more than a pipe buffer holds.
    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());
    let (stdout, stderr) = match (stdout, stderr) {
        (Ok(stdout), Ok(stderr)) => (stdout, stderr),
        (Err(err), _) | (_, Err(err)) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io_error(err));
        }
    };

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(
                command,
                timeout_ms = timeout.as_millis() as u64,
                "command timed out"
            );
            return Err(CaptureError::TimedOut {
                command: command.to_string(),
                timeout,
            });
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io_error(err));
        }
    };
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(classify_command_failure(
            command,
            &status.to_string(),
            stderr.trim(),
        ));
    }

    if stdout.is_empty() {
        return Err(CaptureError::CommandFailed {
            command: command.to_string(),
            message: "command produced no stdout output".to_string(),
        });
    }

    Ok(stdout)
}

/// `Ok(None)` means the child was still running when `timeout` ran out.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(COMMAND_POLL_INTERVAL);
    }
}

fn drain_pipe<R>(pipe: Option<R>) -> std::io::Result<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("clue-capture-pipe".to_string())
        .spawn(move || {
            let mut bytes = Vec::new();
            if let Some(mut pipe) = pipe {
                if let Err(err) = pipe.read_to_end(&mut bytes) {
                    tracing::debug!(%err, "failed to read command pipe");
                }
            }
            bytes
        })
}

fn classify_command_failure(command: &str, status: &str, stderr: &str) -> CaptureError {
    let lowered = stderr.to_ascii_lowercase();
    if ["permission denied", "not authorized", "not permitted"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return CaptureError::PermissionDenied {
            message: format!("{command}: {stderr}"),
        };
    }

    CaptureError::CommandFailed {
        command: command.to_string(),
        message: format!("{status}; stderr: {stderr}"),
    }
}
