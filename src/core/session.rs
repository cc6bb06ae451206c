//! Ties one generation task to the document and reports progress to the interface.
//!
//! The coordinator lives on the control thread alongside the document. It owns at most one
//! [`GenerationTask`] at a time; a second request while one is running is rejected rather than
//! queued. Fragments from the task go through a [`Reconciler`] before they touch the document.

use tracing::{debug, info, warn};

use crate::core::config::SettingsSource;
use crate::core::document::DocumentView;
use crate::core::error::{ClientError, SessionError};
use crate::core::generation::{
    CancelHandle, GenerationParams, GenerationRequest, GenerationTask, TaskEvent, TaskPhase,
};
use crate::core::reconciler::{ApplyOutcome, Reconciler};
use crate::core::status::StatusSink;

/// Which interface controls make sense right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub generate_enabled: bool,
    pub cancel_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub task_id: u64,
    pub phase: TaskPhase,
    /// Text that actually went into the document.
    pub inserted: String,
    /// The document was edited mid-generation and insertion stopped.
    pub stale: bool,
    pub error: Option<ClientError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Inserted(String),
    StaleDocument,
    Finished(SessionReport),
}

pub struct ActiveGeneration {
    task: GenerationTask,
    reconciler: Reconciler,
    temperature: f32,
    token_limit: u32,
    /// Terminal event held while flushed text is reported first.
    deferred_end: Option<TaskEvent>,
}

impl ActiveGeneration {
    fn parameters_label(&self) -> String {
        format!(
            "Temp: {:.2}, Tokens: {}",
            self.temperature, self.token_limit
        )
    }
}

pub enum SessionState {
    Idle,
    Busy(Box<ActiveGeneration>),
}

pub struct SessionCoordinator {
    state: SessionState,
    next_task_id: u64,
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            next_task_id: 1,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Busy(_))
    }

    pub fn controls(&self) -> ControlState {
        match &self.state {
            SessionState::Idle => ControlState {
                generate_enabled: true,
                cancel_enabled: false,
            },
            SessionState::Busy(active) => ControlState {
                generate_enabled: false,
                cancel_enabled: !active.task.cancel_requested(),
            },
        }
    }

    pub fn active_phase(&self) -> Option<TaskPhase> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Busy(active) => Some(active.task.phase()),
        }
    }

    pub fn active_task_id(&self) -> Option<u64> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Busy(active) => Some(active.task.id()),
        }
    }

    /// Start continuing the document from its cursor. Returns the new task id.
    ///
    /// Rejections are reported to `sink` as well as returned.
    pub fn request_generation<S, D>(
        &mut self,
        settings: &S,
        doc: &D,
        params: &GenerationParams,
        sink: &mut dyn StatusSink,
    ) -> Result<u64, SessionError>
    where
        S: SettingsSource + ?Sized,
        D: DocumentView + ?Sized,
    {
        let started = self.start_generation(settings, doc, params);
        if let Err(err) = &started {
            debug!(error = %err, "generation request rejected");
            sink.status(&err.to_string());
        }
        let task_id = started?;

        if let SessionState::Busy(active) = &self.state {
            sink.status(&format!("AI is writing ({})...", active.parameters_label()));
        }
        Ok(task_id)
    }

    fn start_generation<S, D>(
        &mut self,
        settings: &S,
        doc: &D,
        params: &GenerationParams,
    ) -> Result<u64, SessionError>
    where
        S: SettingsSource + ?Sized,
        D: DocumentView + ?Sized,
    {
        if self.is_busy() {
            return Err(SessionError::AlreadyRunning);
        }
        if params.model.trim().is_empty() {
            return Err(SessionError::NoModelSelected);
        }

        let reconciler = Reconciler::new(doc);
        let document_text = doc.text_before(reconciler.anchor().offset);
        if document_text.trim().is_empty() {
            return Err(SessionError::NothingToContinue);
        }

        let request = GenerationRequest::build(settings, params, &document_text);
        let (temperature, token_limit) = (request.temperature, request.token_limit);

        let task_id = self.next_task_id;
        let task = GenerationTask::start(task_id, request)?;
        self.next_task_id += 1;

        self.state = SessionState::Busy(Box::new(ActiveGeneration {
            task,
            reconciler,
            temperature,
            token_limit,
            deferred_end: None,
        }));
        Ok(task_id)
    }

    /// Ask the active task to stop. Returns false when there was nothing to cancel.
    pub fn request_cancel(&mut self) -> bool {
        match &mut self.state {
            SessionState::Busy(active) if !active.task.is_terminal() => {
                active.task.cancel();
                true
            }
            _ => false,
        }
    }

    /// Handle for cancelling the active task from another thread.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Busy(active) => Some(active.task.cancel_handle()),
        }
    }

    /// Apply everything the task has produced so far without blocking.
    pub fn poll_updates<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        sink: &mut dyn StatusSink,
    ) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.step(doc, sink, false) {
            let finished = matches!(update, SessionUpdate::Finished(_));
            updates.push(update);
            if finished {
                break;
            }
        }
        updates
    }

    /// Like [`poll_updates`](Self::poll_updates) but only returns the report, if the task ended.
    pub fn poll<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        sink: &mut dyn StatusSink,
    ) -> Option<SessionReport> {
        self.poll_updates(doc, sink)
            .into_iter()
            .find_map(|update| match update {
                SessionUpdate::Finished(report) => Some(report),
                _ => None,
            })
    }

    /// Block for the next visible change. `None` when idle.
    ///
    /// Must not be called from inside an async runtime.
    pub fn next_update<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        sink: &mut dyn StatusSink,
    ) -> Option<SessionUpdate> {
        self.step(doc, sink, true)
    }

    /// Block until the active task ends. `None` when idle.
    pub fn wait<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        sink: &mut dyn StatusSink,
    ) -> Option<SessionReport> {
        while let Some(update) = self.next_update(doc, sink) {
            if let SessionUpdate::Finished(report) = update {
                return Some(report);
            }
        }
        None
    }

    fn step<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        sink: &mut dyn StatusSink,
        blocking: bool,
    ) -> Option<SessionUpdate> {
        loop {
            let SessionState::Busy(active) = &mut self.state else {
                return None;
            };

            let event = match active.deferred_end.take() {
                Some(end) => Some(end),
                None if blocking => active.task.wait_event(),
                None => active.task.poll_event(),
            };

            match event {
                Some(TaskEvent::Fragment(text)) => {
                    let outcome = active.reconciler.apply_fragment(doc, &text);
                    if let Some(update) = visible_update(outcome, sink) {
                        return Some(update);
                    }
                }
                Some(end) => {
                    if let Some(update) = visible_update(active.reconciler.flush(doc), sink) {
                        active.deferred_end = Some(end);
                        return Some(update);
                    }
                    let error = match end {
                        TaskEvent::Failed(err) => Some(err),
                        _ => None,
                    };
                    return self.finish(error, doc, sink);
                }
                None if active.task.is_terminal() => {
                    if let Some(update) = visible_update(active.reconciler.flush(doc), sink) {
                        return Some(update);
                    }
                    return self.finish(None, doc, sink);
                }
                None => return None,
            }
        }
    }

    fn finish<D: DocumentView + ?Sized>(
        &mut self,
        error: Option<ClientError>,
        doc: &mut D,
        sink: &mut dyn StatusSink,
    ) -> Option<SessionUpdate> {
        let SessionState::Busy(mut active) = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            return None;
        };

        let summary = active.reconciler.finalize(doc);
        let phase = active.task.phase();
        let label = active.parameters_label();

        match (&phase, &error) {
            (TaskPhase::Completed, _) => {
                sink.status(&format!("✓ Generation complete ({label})"));
            }
            (TaskPhase::Cancelled, _) => {
                sink.status("Generation cancelled");
            }
            (TaskPhase::Failed(kind), Some(err)) => {
                warn!(task_id = active.task.id(), %kind, error = %err, "generation failed");
                sink.error(*kind, &err.to_string());
                sink.status(&format!("✗ Generation failed: {kind}"));
            }
            (phase, _) => {
                warn!(task_id = active.task.id(), ?phase, "generation ended unexpectedly");
                sink.status("Generation stopped");
            }
        }

        info!(
            task_id = active.task.id(),
            ?phase,
            inserted_chars = summary.inserted.chars().count(),
            stale = summary.stale,
            "session returned to idle"
        );

        Some(SessionUpdate::Finished(SessionReport {
            task_id: active.task.id(),
            phase,
            inserted: summary.inserted,
            stale: summary.stale,
            error,
        }))
    }
}

fn visible_update(outcome: ApplyOutcome, sink: &mut dyn StatusSink) -> Option<SessionUpdate> {
    match outcome {
        ApplyOutcome::Inserted(text) => Some(SessionUpdate::Inserted(text)),
        ApplyOutcome::Stale(notice) => {
            sink.notice(&notice.to_string());
            Some(SessionUpdate::StaleDocument)
        }
        ApplyOutcome::Suppressed | ApplyOutcome::Pending | ApplyOutcome::Halted => None,
    }
}
