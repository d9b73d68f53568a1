/// What the user currently sees. Exactly one value is live at a time and only the
/// orchestrator moves it forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Capturing,
    Analyzing,
    ShowingResult(String),
    ShowingError(String),
}

impl UiState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Capturing => "Capturing",
            Self::Analyzing => "Analyzing",
            Self::ShowingResult(_) => "ShowingResult",
            Self::ShowingError(_) => "ShowingError",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// True while a panel is on screen waiting for the user.
    pub fn is_showing(&self) -> bool {
        matches!(self, Self::ShowingResult(_) | Self::ShowingError(_))
    }
}
