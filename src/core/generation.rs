//! One generation request running on its own worker thread.
//!
//! The worker owns the network call and the NDJSON decoding. Everything it learns travels to the
//! control thread over a single ordered channel; the control thread drains it through
//! [`GenerationTask::poll_event`] or [`GenerationTask::wait_event`] and is the only side that
//! updates the task's phase.

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::SettingsSource;
use crate::core::constants::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::core::error::{ClientError, ErrorKind, SessionError};
use crate::core::ollama::OllamaClient;
use crate::core::prompts::applicable_template;

/// What the interface asks for. Missing values fall back to settings defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub token_limit: Option<u32>,
    pub template_id: Option<String>,
}

/// Everything the worker needs, fixed at start.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub token_limit: u32,
    pub base_url: String,
    /// Bound on the whole request, connect through last fragment.
    pub timeout: Duration,
}

/// Clamp into the accepted temperature range; non-finite input falls back to `fallback`.
pub fn clamp_temperature(value: f32, fallback: f32) -> f32 {
    let value = if value.is_finite() { value } else { fallback };
    if value.is_finite() {
        value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    } else {
        MIN_TEMPERATURE
    }
}

pub fn clamp_token_limit(value: u32, (min, max): (u32, u32)) -> u32 {
    value.clamp(min, max.max(min))
}

impl GenerationRequest {
    /// `document_text` is the text before the cursor. A template, when it applies to the
    /// model, goes in front of it separated by a blank line.
    pub fn build<S: SettingsSource + ?Sized>(
        settings: &S,
        params: &GenerationParams,
        document_text: &str,
    ) -> Self {
        let model = params.model.trim().to_string();
        let template_body = params
            .template_id
            .as_deref()
            .and_then(|id| applicable_template(settings.templates(), id, &model))
            .map(|template| template.body.trim_end())
            .filter(|body| !body.trim().is_empty());

        let prompt = match template_body {
            Some(body) => format!("{body}\n\n{document_text}"),
            None => document_text.to_string(),
        };

        let default_temperature = settings.default_temperature();
        let temperature = clamp_temperature(
            params.temperature.unwrap_or(default_temperature),
            default_temperature,
        );
        let token_limit = clamp_token_limit(
            params.token_limit.unwrap_or(settings.default_token_limit()),
            settings.token_limit_bounds(),
        );

        Self {
            prompt,
            system: settings.system_instruction().map(str::to_string),
            model,
            temperature,
            token_limit,
            base_url: settings.base_url().to_string(),
            timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPhase {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed(ErrorKind),
    Cancelled,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskPhase::Completed | TaskPhase::Failed(_) | TaskPhase::Cancelled
        )
    }
}

/// What the worker sends; tagged with the task id on the channel.
#[derive(Debug, Clone)]
enum WorkerMessage {
    Fragment(String),
    Completed,
    Failed(ClientError),
    Cancelled,
}

/// What the control thread observes. At most one terminal event per task, always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Fragment(String),
    Completed,
    Failed(ClientError),
    Cancelled,
}

/// Cancels a task from any thread, e.g. a Ctrl+C handler.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

pub struct GenerationTask {
    id: u64,
    phase: TaskPhase,
    output: String,
    cancel_token: CancellationToken,
    rx: mpsc::UnboundedReceiver<(WorkerMessage, u64)>,
    worker: Option<JoinHandle<()>>,
}

impl GenerationTask {
    /// Spawn the worker thread and enter `Requesting`.
    pub fn start(id: u64, request: GenerationRequest) -> Result<Self, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let worker_token = cancel_token.clone();

        info!(
            task_id = id,
            model = %request.model,
            temperature = request.temperature,
            token_limit = request.token_limit,
            "starting generation"
        );

        let worker = std::thread::Builder::new()
            .name("generation-worker".to_string())
            .spawn(move || run_worker(id, request, worker_token, tx))
            .map_err(|e| SessionError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            id,
            phase: TaskPhase::Requesting,
            output: String::new(),
            cancel_token,
            rx,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Text received from the worker and forwarded so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Idempotent; does nothing once the task has ended.
    pub fn cancel(&mut self) {
        if self.is_terminal() || self.cancel_token.is_cancelled() {
            return;
        }
        debug!(task_id = self.id, "cancellation requested");
        self.cancel_token.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel_token.clone())
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Next event if one is ready, without blocking.
    pub fn poll_event(&mut self) -> Option<TaskEvent> {
        loop {
            if self.is_terminal() {
                return None;
            }
            match self.rx.try_recv() {
                Ok((message, task_id)) => {
                    if let Some(event) = self.accept(message, task_id) {
                        return Some(event);
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return None,
                Err(mpsc::error::TryRecvError::Disconnected) => return self.worker_vanished(),
            }
        }
    }

    /// Block until the next event. Returns `None` once the task has ended.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_event(&mut self) -> Option<TaskEvent> {
        loop {
            if self.is_terminal() {
                return None;
            }
            match self.rx.blocking_recv() {
                Some((message, task_id)) => {
                    if let Some(event) = self.accept(message, task_id) {
                        return Some(event);
                    }
                }
                None => return self.worker_vanished(),
            }
        }
    }

    fn worker_vanished(&mut self) -> Option<TaskEvent> {
        warn!(task_id = self.id, "generation worker exited without reporting");
        self.accept(
            WorkerMessage::Failed(ClientError::Connection(
                "generation worker stopped unexpectedly".to_string(),
            )),
            self.id,
        )
    }

    fn accept(&mut self, message: WorkerMessage, task_id: u64) -> Option<TaskEvent> {
        if task_id != self.id || self.is_terminal() {
            return None;
        }

        let cancelled = self.cancel_token.is_cancelled();
        let event = match message {
            WorkerMessage::Fragment(_) if cancelled => return None,
            WorkerMessage::Fragment(text) => {
                if self.phase == TaskPhase::Requesting {
                    self.phase = TaskPhase::Streaming;
                }
                self.output.push_str(&text);
                return Some(TaskEvent::Fragment(text));
            }
            _ if cancelled => TaskEvent::Cancelled,
            WorkerMessage::Completed => TaskEvent::Completed,
            WorkerMessage::Failed(err) => TaskEvent::Failed(err),
            WorkerMessage::Cancelled => TaskEvent::Cancelled,
        };

        self.phase = match &event {
            TaskEvent::Completed => TaskPhase::Completed,
            TaskEvent::Failed(err) => TaskPhase::Failed(err.kind()),
            _ => TaskPhase::Cancelled,
        };
        info!(task_id = self.id, phase = ?self.phase, "generation finished");
        self.join_worker();
        Some(event)
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(task_id = self.id, "generation worker panicked");
            }
        }
    }
}

impl Drop for GenerationTask {
    fn drop(&mut self) {
        // Let a still-running worker wind down on its own; it notices at the next fragment.
        if !self.is_terminal() {
            self.cancel_token.cancel();
        }
    }
}

enum StreamEnd {
    Completed,
    Cancelled,
}

fn run_worker(
    task_id: u64,
    request: GenerationRequest,
    cancel_token: CancellationToken,
    tx: mpsc::UnboundedSender<(WorkerMessage, u64)>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = tx.send((
                WorkerMessage::Failed(ClientError::Connection(format!(
                    "failed to start network runtime: {e}"
                ))),
                task_id,
            ));
            return;
        }
    };

    let outcome = runtime.block_on(stream_generation(task_id, &request, &cancel_token, &tx));
    let message = match outcome {
        Ok(StreamEnd::Completed) => WorkerMessage::Completed,
        Ok(StreamEnd::Cancelled) => WorkerMessage::Cancelled,
        Err(err) => {
            debug!(task_id, error = %err, "generation failed");
            WorkerMessage::Failed(err)
        }
    };
    let _ = tx.send((message, task_id));
}

async fn stream_generation(
    task_id: u64,
    request: &GenerationRequest,
    cancel_token: &CancellationToken,
    tx: &mpsc::UnboundedSender<(WorkerMessage, u64)>,
) -> Result<StreamEnd, ClientError> {
    let client = OllamaClient::new(&request.base_url, request.timeout)?;

    let work = async {
        // Nothing has been forwarded yet, so the request itself may be abandoned outright.
        let mut fragments = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(StreamEnd::Cancelled),
            opened = client.generate(request) => opened?,
        };

        while let Some(fragment) = fragments.next_fragment().await {
            let fragment = fragment?;
            if cancel_token.is_cancelled() {
                debug!(task_id, "cancellation observed at fragment boundary");
                return Ok(StreamEnd::Cancelled);
            }
            if tx.send((WorkerMessage::Fragment(fragment), task_id)).is_err() {
                // The task handle is gone; nobody is listening.
                return Ok(StreamEnd::Cancelled);
            }
        }
        Ok::<_, ClientError>(StreamEnd::Completed)
    };

    match tokio::time::timeout(request.timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(format!(
            "no complete response within {:.1}s",
            request.timeout.as_secs_f32()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ModelFilter, Settings};
    use crate::utils::test_utils::{spawn_mock_ollama, test_request, unreachable_base_url, MockStep};

    fn collect_events(task: &mut GenerationTask) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = task.wait_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn temperature_clamps_to_range() {
        for (input, expected) in [(-0.5, 0.0), (2.5, 2.0), (0.3, 0.3), (100.0, 2.0)] {
            assert_eq!(clamp_temperature(input, 0.7), expected);
        }
        assert_eq!(clamp_temperature(f32::NAN, 0.7), 0.7);
        assert_eq!(clamp_temperature(f32::INFINITY, 5.0), 2.0);
        assert_eq!(clamp_temperature(f32::NAN, f32::NAN), 0.0);
    }

    #[test]
    fn token_limit_clamps_to_configured_bounds() {
        assert_eq!(clamp_token_limit(0, (10, 2000)), 10);
        assert_eq!(clamp_token_limit(5000, (10, 2000)), 2000);
        assert_eq!(clamp_token_limit(140, (10, 2000)), 140);
    }

    #[test]
    fn build_uses_defaults_and_clamps() {
        let settings = Settings::default();
        let params = GenerationParams {
            model: " llama2 ".to_string(),
            temperature: Some(3.0),
            token_limit: Some(1),
            template_id: None,
        };
        let request = GenerationRequest::build(&settings, &params, "Once upon a time");
        assert_eq!(request.model, "llama2");
        assert_eq!(request.temperature, 2.0);
        assert_eq!(request.token_limit, 10);
        assert_eq!(request.prompt, "Once upon a time");
        assert_eq!(request.timeout, Duration::from_secs(120));
        assert!(request.system.is_some());

        let defaults = GenerationRequest::build(
            &settings,
            &GenerationParams {
                model: "llama2".to_string(),
                ..Default::default()
            },
            "x",
        );
        assert_eq!(defaults.temperature, 0.7);
        assert_eq!(defaults.token_limit, 140);
    }

    #[test]
    fn build_prefixes_applicable_template_only() {
        let mut settings = Settings::default();
        let general = settings
            .create_template("General", "Continue:\n", ModelFilter::All, "")
            .expect("template");
        let llama_only = settings
            .create_template(
                "Llama",
                "Llama style:",
                ModelFilter::Model("llama2".to_string()),
                "",
            )
            .expect("template");

        let with_general = GenerationRequest::build(
            &settings,
            &GenerationParams {
                model: "mistral".to_string(),
                template_id: Some(general.id.clone()),
                ..Default::default()
            },
            "The end",
        );
        assert_eq!(with_general.prompt, "Continue:\n\nThe end");

        let wrong_model = GenerationRequest::build(
            &settings,
            &GenerationParams {
                model: "mistral".to_string(),
                template_id: Some(llama_only.id),
                ..Default::default()
            },
            "The end",
        );
        assert_eq!(wrong_model.prompt, "The end");
    }

    #[test]
    fn phase_moves_through_streaming_to_completed() {
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":" there","done":false}"#),
                MockStep::line(r#"{"response":" was a dragon.","done":false}"#),
                MockStep::line(r#"{"response":"","done":true}"#),
            ],
        );
        let mut task = GenerationTask::start(1, test_request(&server.base_url)).expect("start");
        assert_eq!(task.phase(), TaskPhase::Requesting);

        assert_eq!(
            task.wait_event(),
            Some(TaskEvent::Fragment(" there".to_string()))
        );
        assert_eq!(task.phase(), TaskPhase::Streaming);

        assert_eq!(
            collect_events(&mut task),
            vec![
                TaskEvent::Fragment(" was a dragon.".to_string()),
                TaskEvent::Completed
            ]
        );
        assert_eq!(task.phase(), TaskPhase::Completed);
        assert_eq!(task.output(), " there was a dragon.");
        assert_eq!(task.wait_event(), None);
        assert_eq!(task.poll_event(), None);
        server.finish();
    }

    #[test]
    fn unreachable_server_fails_with_connection_kind() {
        let mut task =
            GenerationTask::start(7, test_request(&unreachable_base_url())).expect("start");
        let events = collect_events(&mut task);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TaskEvent::Failed(err) if err.kind() == ErrorKind::Connection));
        assert_eq!(task.phase(), TaskPhase::Failed(ErrorKind::Connection));
    }

    #[test]
    fn cancel_after_first_fragment_stops_forwarding() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":"first","done":false}"#),
                MockStep::WaitFor(release_rx),
                MockStep::line(r#"{"response":"second","done":false}"#),
                MockStep::line(r#"{"response":"","done":true}"#),
            ],
        );
        let mut task = GenerationTask::start(3, test_request(&server.base_url)).expect("start");
        assert_eq!(
            task.wait_event(),
            Some(TaskEvent::Fragment("first".to_string()))
        );

        task.cancel();
        task.cancel();
        release_tx.send(()).expect("server waiting");

        assert_eq!(collect_events(&mut task), vec![TaskEvent::Cancelled]);
        assert_eq!(task.phase(), TaskPhase::Cancelled);
        assert_eq!(task.output(), "first");

        task.cancel();
        assert_eq!(task.phase(), TaskPhase::Cancelled);
        server.finish();
    }

    #[test]
    fn cancel_via_handle_before_response_ends_cancelled() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::WaitFor(release_rx),
                MockStep::line(r#"{"response":"late","done":true}"#),
            ],
        );
        let mut task = GenerationTask::start(4, test_request(&server.base_url)).expect("start");
        let handle = task.cancel_handle();
        std::thread::spawn(move || handle.cancel())
            .join()
            .expect("cancel thread");
        release_tx.send(()).expect("server waiting");

        assert_eq!(collect_events(&mut task), vec![TaskEvent::Cancelled]);
        assert!(task.output().is_empty());
        // The worker may have given up before connecting, so the server is not joined.
        drop(server);
    }

    #[test]
    fn stalled_server_times_out() {
        let (_release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":"slow","done":false}"#),
                MockStep::WaitFor(release_rx),
            ],
        );
        let mut request = test_request(&server.base_url);
        request.timeout = Duration::from_millis(300);
        let mut task = GenerationTask::start(5, request).expect("start");

        let events = collect_events(&mut task);
        assert_eq!(events.first(), Some(&TaskEvent::Fragment("slow".to_string())));
        assert!(matches!(events.last(), Some(TaskEvent::Failed(err)) if err.kind() == ErrorKind::Timeout));
        assert_eq!(task.phase(), TaskPhase::Failed(ErrorKind::Timeout));
        drop(_release_tx);
        server.finish();
    }

    #[test]
    fn malformed_line_fails_the_task() {
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":"ok","done":false}"#),
                MockStep::line("{{{"),
            ],
        );
        let mut task = GenerationTask::start(6, test_request(&server.base_url)).expect("start");
        let events = collect_events(&mut task);
        assert_eq!(events.len(), 2);
        assert_eq!(task.phase(), TaskPhase::Failed(ErrorKind::Malformed));
        server.finish();
    }
}
