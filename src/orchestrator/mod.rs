//! The analysis cycle: hotkey → capture → backend → panel.
//!
//! All state changes happen on the thread running [`Orchestrator::run`]. The hotkey
//! listener, the analysis workers and the UI only ever send [`Command`]s into its
//! channel, so transitions are serialized without a lock.

use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AnalysisRequest, AnalysisResult, Analyzer};
use crate::capture::{CaptureService, CapturedImage};
use crate::config::RuntimeConfig;
use crate::state::{AppEvent, CycleId, StateMachine, UiState};
use crate::ui::{AnalysisView, ANALYZING_MESSAGE};

mod worker;

#[derive(Debug)]
pub enum Command {
    Hotkey,
    Dismiss {
        cycle: CycleId,
    },
    AnalysisFinished {
        cycle: CycleId,
        result: AnalysisResult,
    },
    Shutdown,
}

/// Cloneable sender used by the hotkey listener and the app shell.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: Sender<Command>,
}

impl OrchestratorHandle {
    /// Returns `false` once the orchestrator loop has stopped.
    pub fn hotkey_pressed(&self) -> bool {
        self.tx.send(Command::Hotkey).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

/// Handed to the view with every panel; dismissing it ends that cycle only.
#[derive(Debug, Clone)]
pub struct DismissHandle {
    tx: Sender<Command>,
    cycle: CycleId,
}

impl DismissHandle {
    pub(crate) fn new(tx: Sender<Command>, cycle: CycleId) -> Self {
        Self { tx, cycle }
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    pub fn dismiss(&self) {
        if self.tx.send(Command::Dismiss { cycle: self.cycle }).is_err() {
            tracing::debug!(cycle = self.cycle, "dismiss after orchestrator shutdown");
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub prompt: String,
    pub error_dismiss_after: Option<Duration>,
}

impl From<&RuntimeConfig> for OrchestratorSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            error_dismiss_after: config.error_dismiss_after,
        }
    }
}

pub struct Orchestrator<C, A, V> {
    machine: StateMachine,
    capture: C,
    analyzer: Arc<A>,
    view: V,
    settings: OrchestratorSettings,
    preview: Option<CapturedImage>,
    tx: Sender<Command>,
}

impl<C, A, V> Orchestrator<C, A, V>
where
    C: CaptureService,
    A: Analyzer + 'static,
    V: AnalysisView,
{
    pub fn new(
        settings: OrchestratorSettings,
        capture: C,
        analyzer: Arc<A>,
        view: V,
    ) -> (Self, Receiver<Command>) {
        let (tx, rx) = mpsc::channel();
        let orchestrator = Self {
            machine: StateMachine::new(),
            capture,
            analyzer,
            view,
            settings,
            preview: None,
            tx,
        };
        (orchestrator, rx)
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> &UiState {
        self.machine.state()
    }

    pub fn run(mut self, commands: Receiver<Command>) {
        tracing::info!(
            backend = self.analyzer.variant().as_str(),
            model = self.analyzer.model(),
            "orchestrator loop started"
        );
        for command in commands.iter() {
            if self.process(command).is_break() {
                break;
            }
        }
        tracing::info!(state = %self.machine, "orchestrator loop stopped");
    }

    pub fn process(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Hotkey => self.on_hotkey(),
            Command::Dismiss { cycle } => {
                self.apply_in_cycle(cycle, AppEvent::Dismissed);
            }
            Command::AnalysisFinished { cycle, result } => self.on_analysis_finished(cycle, result),
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn on_hotkey(&mut self) {
        if !self.machine.state().is_idle() {
            tracing::debug!(
                state = self.machine.state().name(),
                cycle = self.machine.cycle(),
                "dropping hotkey press while a cycle is in progress"
            );
            return;
        }
        if !self.apply(AppEvent::HotkeyPressed) {
            return;
        }

        let cycle = self.machine.cycle();
        tracing::info!(cycle, "hotkey pressed; capturing active window");
        match self.capture.capture_active_window() {
            Ok(image) => {
                // Kept only while the Analyzing notice is rendered.
                self.preview = Some(image);
                let accepted = self.apply(AppEvent::CaptureSucceeded);
                if let (true, Some(image)) = (accepted, self.preview.take()) {
                    self.dispatch_analysis(cycle, image);
                }
            }
            Err(err) => {
                tracing::warn!(cycle, error = %err, "capture failed");
                self.apply(AppEvent::CaptureFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    fn on_analysis_finished(&mut self, cycle: CycleId, result: AnalysisResult) {
        let event = match result {
            Ok(text) => AppEvent::AnalysisSucceeded { text },
            Err(err) => {
                tracing::warn!(cycle, kind = ?err.kind(), error = %err, "analysis failed");
                AppEvent::AnalysisFailed {
                    message: err.to_string(),
                }
            }
        };
        self.apply_in_cycle(cycle, event);
    }

    fn dispatch_analysis(&mut self, cycle: CycleId, image: CapturedImage) {
        let request = AnalysisRequest::new(
            image,
            self.settings.prompt.clone(),
            self.analyzer.variant(),
            self.analyzer.model(),
        );
        if let Err(err) =
            worker::spawn_analysis(cycle, request, Arc::clone(&self.analyzer), self.tx.clone())
        {
            tracing::error!(cycle, ?err, "failed to start analysis worker");
            self.apply_in_cycle(
                cycle,
                AppEvent::AnalysisFailed {
                    message: format!("could not start analysis: {err}"),
                },
            );
        }
    }

    fn apply(&mut self, event: AppEvent) -> bool {
        match self.machine.transition(event) {
            Ok(_) => {
                self.render();
                true
            }
            Err(err) => {
                tracing::debug!(%err, "transition not applied");
                false
            }
        }
    }

    fn apply_in_cycle(&mut self, cycle: CycleId, event: AppEvent) -> bool {
        match self.machine.transition_in_cycle(cycle, event) {
            Ok(_) => {
                self.render();
                true
            }
            Err(err) => {
                tracing::debug!(%err, "transition not applied");
                false
            }
        }
    }

    fn dismiss_handle(&self) -> DismissHandle {
        DismissHandle::new(self.tx.clone(), self.machine.cycle())
    }

    fn render(&self) {
        match self.machine.state() {
            UiState::Idle => self.view.hide(),
            UiState::Capturing => self.view.capturing(),
            UiState::Analyzing => {
                self.view
                    .show_transient(ANALYZING_MESSAGE, self.preview.as_ref())
            }
            UiState::ShowingResult(text) => self.view.show_result(text, self.dismiss_handle()),
            UiState::ShowingError(message) => {
                self.view.show_error(message, self.dismiss_handle());
                self.schedule_error_dismiss();
            }
        }
    }

    fn schedule_error_dismiss(&self) {
        let Some(delay) = self.settings.error_dismiss_after else {
            return;
        };
        let cycle = self.machine.cycle();
        if let Err(err) = worker::spawn_delayed_dismiss(cycle, delay, self.tx.clone()) {
            tracing::warn!(cycle, ?err, "failed to schedule error auto-dismiss");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AnalysisError, AnalysisResult};
    use crate::capture::{CaptureError, CaptureResult, ImageFormat};
    use crate::config::BackendVariant;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    fn image(tag: &[u8]) -> CapturedImage {
        CapturedImage {
            bytes: tag.to_vec(),
            format: ImageFormat::Png,
            width: 1,
            height: 1,
        }
    }

    struct FakeCapture {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeCapture {
        fn succeeding() -> Self {
            Self {
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CaptureService for FakeCapture {
        fn capture_active_window(&self) -> CaptureResult<CapturedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CaptureError::NoActiveWindow)
            } else {
                Ok(image(b"IMG1"))
            }
        }
    }

    struct FakeAnalyzer {
        reply: AnalysisResult,
        calls: AtomicUsize,
        seen_images: Mutex<Vec<Vec<u8>>>,
        gate: Option<Mutex<Receiver<()>>>,
    }

    impl FakeAnalyzer {
        fn replying(reply: AnalysisResult) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                seen_images: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        /// Blocks every call until the returned sender fires.
        fn gated(reply: AnalysisResult) -> (Self, Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let mut analyzer = Self::replying(reply);
            analyzer.gate = Some(Mutex::new(rx));
            (analyzer, tx)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Analyzer for FakeAnalyzer {
        fn variant(&self) -> BackendVariant {
            BackendVariant::Local
        }

        fn model(&self) -> &str {
            "qwen3-vl:8b"
        }

        fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_images
                .lock()
                .expect("images lock")
                .push(request.image().bytes.clone());
            if let Some(gate) = &self.gate {
                let _ = gate.lock().expect("gate lock").recv_timeout(WAIT);
            }
            self.reply.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ViewCall {
        Capturing,
        Transient(String, Option<Vec<u8>>),
        Result(String),
        Error(String),
        Hide,
    }

    #[derive(Clone, Default)]
    struct RecordingView {
        calls: Arc<Mutex<Vec<ViewCall>>>,
        last_dismiss: Arc<Mutex<Option<DismissHandle>>>,
    }

    impl RecordingView {
        fn calls(&self) -> Vec<ViewCall> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn dismiss(&self) {
            self.last_dismiss
                .lock()
                .expect("dismiss lock")
                .as_ref()
                .expect("a panel should be showing")
                .dismiss();
        }

        fn record(&self, call: ViewCall) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    impl AnalysisView for RecordingView {
        fn capturing(&self) {
            self.record(ViewCall::Capturing);
        }

        fn show_transient(&self, message: &str, preview: Option<&CapturedImage>) {
            self.record(ViewCall::Transient(
                message.to_string(),
                preview.map(|image| image.bytes.clone()),
            ));
        }

        fn show_result(&self, text: &str, on_close: DismissHandle) {
            self.record(ViewCall::Result(text.to_string()));
            *self.last_dismiss.lock().expect("dismiss lock") = Some(on_close);
        }

        fn show_error(&self, message: &str, on_dismiss: DismissHandle) {
            self.record(ViewCall::Error(message.to_string()));
            *self.last_dismiss.lock().expect("dismiss lock") = Some(on_dismiss);
        }

        fn hide(&self) {
            self.record(ViewCall::Hide);
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            prompt: "What is on screen?".to_string(),
            error_dismiss_after: None,
        }
    }

    fn next_command(rx: &Receiver<Command>) -> Command {
        rx.recv_timeout(WAIT).expect("orchestrator should receive a command")
    }

    #[test]
    fn successful_cycle_shows_exact_result_then_idles() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok(
            "The window shows a terminal.".to_string()
        )));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            Arc::clone(&analyzer),
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        assert_eq!(orchestrator.state(), &UiState::Analyzing);
        let _ = orchestrator.process(next_command(&rx));

        assert_eq!(
            orchestrator.state(),
            &UiState::ShowingResult("The window shows a terminal.".to_string())
        );
        assert_eq!(
            view.calls(),
            vec![
                ViewCall::Capturing,
                ViewCall::Transient(ANALYZING_MESSAGE.to_string(), Some(b"IMG1".to_vec())),
                ViewCall::Result("The window shows a terminal.".to_string()),
            ]
        );
        assert_eq!(
            analyzer.seen_images.lock().expect("images lock").as_slice(),
            &[b"IMG1".to_vec()]
        );

        view.dismiss();
        let _ = orchestrator.process(next_command(&rx));
        assert_eq!(orchestrator.state(), &UiState::Idle);
        assert_eq!(view.calls().last(), Some(&ViewCall::Hide));
    }

    #[test]
    fn capture_failure_never_reaches_backend() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("unused".to_string())));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::failing(),
            Arc::clone(&analyzer),
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        assert_eq!(
            orchestrator.state(),
            &UiState::ShowingError("no active window".to_string())
        );

        view.dismiss();
        let _ = orchestrator.process(next_command(&rx));

        assert_eq!(orchestrator.state(), &UiState::Idle);
        assert_eq!(analyzer.calls(), 0);
        assert_eq!(
            view.calls(),
            vec![
                ViewCall::Capturing,
                ViewCall::Error("no active window".to_string()),
                ViewCall::Hide,
            ]
        );
    }

    #[test]
    fn hotkey_presses_during_analysis_are_dropped() {
        let (analyzer, release) = FakeAnalyzer::gated(Ok("done".to_string()));
        let analyzer = Arc::new(analyzer);
        let capture = FakeCapture::succeeding();
        let capture_calls = Arc::clone(&capture.calls);
        let view = RecordingView::default();
        let (mut orchestrator, rx) =
            Orchestrator::new(settings(), capture, Arc::clone(&analyzer), view.clone());

        let _ = orchestrator.process(Command::Hotkey);
        let _ = orchestrator.process(Command::Hotkey);
        std::thread::sleep(Duration::from_millis(10));
        let _ = orchestrator.process(Command::Hotkey);

        assert_eq!(view.calls().len(), 2);
        assert_eq!(capture_calls.load(Ordering::SeqCst), 1);

        release.send(()).expect("release analyzer");
        let _ = orchestrator.process(next_command(&rx));

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(
            view.calls(),
            vec![
                ViewCall::Capturing,
                ViewCall::Transient(ANALYZING_MESSAGE.to_string(), Some(b"IMG1".to_vec())),
                ViewCall::Result("done".to_string()),
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hotkey_while_panel_is_showing_is_dropped() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("first".to_string())));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            Arc::clone(&analyzer),
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        let _ = orchestrator.process(next_command(&rx));
        let calls_before = view.calls().len();

        let _ = orchestrator.process(Command::Hotkey);

        assert_eq!(view.calls().len(), calls_before);
        assert_eq!(analyzer.calls(), 1);
    }

    #[test]
    fn model_not_found_error_mentions_model() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Err(AnalysisError::ModelNotFound {
            model: "qwen3-vl:8b".to_string(),
        })));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            analyzer,
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        let _ = orchestrator.process(next_command(&rx));

        let Some(ViewCall::Error(message)) = view.calls().last().cloned() else {
            panic!("expected an error panel, got {:?}", view.calls());
        };
        assert!(message.contains("qwen3-vl:8b"));
        assert_eq!(
            message,
            AnalysisError::ModelNotFound {
                model: "qwen3-vl:8b".to_string()
            }
            .to_string()
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("ok".to_string())));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            analyzer,
            view.clone(),
        );

        let _ = orchestrator.process(Command::AnalysisFinished {
            cycle: 42,
            result: Ok("ghost".to_string()),
        });
        assert_eq!(orchestrator.state(), &UiState::Idle);
        assert!(view.calls().is_empty());

        let _ = orchestrator.process(Command::Hotkey);
        let real = next_command(&rx);
        let _ = orchestrator.process(Command::AnalysisFinished {
            cycle: 0,
            result: Err(AnalysisError::Network {
                message: "late".to_string(),
            }),
        });
        assert_eq!(orchestrator.state(), &UiState::Analyzing);

        let _ = orchestrator.process(real);
        assert_eq!(orchestrator.state(), &UiState::ShowingResult("ok".to_string()));
    }

    #[test]
    fn dismiss_is_idempotent() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("ok".to_string())));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            analyzer,
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        let _ = orchestrator.process(next_command(&rx));
        view.dismiss();
        view.dismiss();
        let _ = orchestrator.process(next_command(&rx));
        let _ = orchestrator.process(next_command(&rx));

        assert_eq!(orchestrator.state(), &UiState::Idle);
        let hides = view
            .calls()
            .into_iter()
            .filter(|call| *call == ViewCall::Hide)
            .count();
        assert_eq!(hides, 1);
    }

    #[test]
    fn error_panel_auto_dismisses() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("unused".to_string())));
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            OrchestratorSettings {
                error_dismiss_after: Some(Duration::from_millis(20)),
                ..settings()
            },
            FakeCapture::failing(),
            analyzer,
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        let command = next_command(&rx);
        assert!(matches!(command, Command::Dismiss { cycle: 1 }));
        let _ = orchestrator.process(command);

        assert_eq!(orchestrator.state(), &UiState::Idle);
    }

    /// Panics on its first call only, like a backend tripping over one bad reply.
    struct PanicOnceAnalyzer {
        calls: AtomicUsize,
    }

    impl Analyzer for PanicOnceAnalyzer {
        fn variant(&self) -> BackendVariant {
            BackendVariant::Cloud
        }

        fn model(&self) -> &str {
            "gemini-2.5-flash"
        }

        fn analyze(&self, _request: &AnalysisRequest) -> AnalysisResult {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("response decoder exploded");
            }
            Ok("recovered".to_string())
        }
    }

    #[test]
    fn panicking_backend_ends_cycle_with_error_and_next_hotkey_works() {
        let analyzer = Arc::new(PanicOnceAnalyzer {
            calls: AtomicUsize::new(0),
        });
        let view = RecordingView::default();
        let (mut orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            Arc::clone(&analyzer),
            view.clone(),
        );

        let _ = orchestrator.process(Command::Hotkey);
        let _ = orchestrator.process(next_command(&rx));

        let UiState::ShowingError(message) = orchestrator.state().clone() else {
            panic!("expected an error panel, got {}", orchestrator.state().name());
        };
        assert!(message.contains("response decoder exploded"));
        assert!(message.starts_with("gemini returned an error"));

        view.dismiss();
        let _ = orchestrator.process(next_command(&rx));
        assert_eq!(orchestrator.state(), &UiState::Idle);

        let _ = orchestrator.process(Command::Hotkey);
        assert_eq!(orchestrator.state(), &UiState::Analyzing);
        let _ = orchestrator.process(next_command(&rx));
        assert_eq!(
            orchestrator.state(),
            &UiState::ShowingResult("recovered".to_string())
        );
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn run_loop_serves_handle_until_shutdown() {
        let analyzer = Arc::new(FakeAnalyzer::replying(Ok("from loop".to_string())));
        let view = RecordingView::default();
        let (orchestrator, rx) = Orchestrator::new(
            settings(),
            FakeCapture::succeeding(),
            analyzer,
            view.clone(),
        );
        let handle = orchestrator.handle();
        let runner = std::thread::spawn(move || orchestrator.run(rx));

        assert!(handle.hotkey_pressed());
        let deadline = std::time::Instant::now() + WAIT;
        while !view
            .calls()
            .contains(&ViewCall::Result("from loop".to_string()))
        {
            assert!(std::time::Instant::now() < deadline, "result never shown");
            std::thread::sleep(Duration::from_millis(5));
        }

        handle.shutdown();
        runner.join().expect("orchestrator thread should exit cleanly");
    }
}
