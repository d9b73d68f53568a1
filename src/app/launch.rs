use std::ffi::OsString;

pub(super) const TRIGGER_FLAG: &str = "--trigger";

/// What one `clue` invocation asks for. The first invocation becomes the running
/// instance; later ones are forwarded to it by GApplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct LaunchOptions {
    pub(super) trigger: bool,
}

impl LaunchOptions {
    /// Parses a full argv, program name included.
    pub(super) fn from_argv(argv: &[OsString]) -> Self {
        let mut options = Self::default();
        for arg in argv.iter().skip(1) {
            let arg = arg.to_string_lossy();
            match arg.as_ref() {
                TRIGGER_FLAG | "-t" => options.trigger = true,
                other => tracing::warn!(arg = other, "ignoring unknown argument"),
            }
        }
        options
    }
}

/// argv handed to GTK; lossy so a stray non-UTF-8 argument cannot abort startup.
pub(super) fn gtk_launch_args() -> Vec<String> {
    std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}
