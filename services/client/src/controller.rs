//! The session controller.
//!
//! A single task owns the [`SessionState`] and is the only place it changes.
//! Readers hold a [`SessionHandle`] and see whole snapshots through a
//! `watch` channel; every transition is published with one `send_modify`.

use crate::backend::{AnalysisBackend, FrameStream};
use crate::stream::StreamDecoder;
use eda_core::{
    SelectedFile, SessionError, SessionState, StreamUpdate, TransportError, UploadError,
    UploadPolicy, ValidationError,
};
use futures::{FutureExt, future::BoxFuture};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Messages sent from a handle to the controller task.
enum Command {
    Submit {
        file: Option<SelectedFile>,
        ack: oneshot::Sender<Submission>,
    },
    Shutdown,
}

/// How the controller answered a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A new session started and is now `Uploading`.
    Started(Uuid),
    /// Nothing started; the reason is also recorded as the state's notice.
    Rejected(ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("The session controller is no longer running")]
pub struct ControllerClosed;

/// The presentation-facing half of the controller.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Starts a new session for `file`, cancelling any session in flight.
    ///
    /// Returns once the controller has either rejected the file or published
    /// the `Uploading` transition; the upload itself continues in the
    /// background.
    pub async fn submit(&self, file: Option<SelectedFile>) -> Result<Submission, ControllerClosed> {
        let (ack, accepted) = oneshot::channel();
        self.commands
            .send(Command::Submit { file, ack })
            .await
            .map_err(|_| ControllerClosed)?;
        accepted.await.map_err(|_| ControllerClosed)
    }

    /// Asks the controller to close any open stream and stop.
    pub async fn shutdown(&self) -> Result<(), ControllerClosed> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ControllerClosed)
    }

    /// An immutable snapshot of the current state.
    pub fn current_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Resolves with the first snapshot whose phase is `Settled`.
    pub async fn wait_until_settled(&self) -> Result<SessionState, ControllerClosed> {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(SessionState::is_settled)
            .await
            .map_err(|_| ControllerClosed)?;
        let snapshot = settled.clone();
        Ok(snapshot)
    }
}

/// How the upload-then-open step of a session ended.
enum StartOutcome {
    UploadFailed(UploadError),
    OpenFailed {
        upload_id: String,
        err: TransportError,
    },
    Opened {
        upload_id: String,
        frames: FrameStream,
    },
}

/// A session that is uploading its file or opening its stream. Dropping it
/// cancels whichever request is in flight.
struct PendingStart {
    session_id: Uuid,
    step: BoxFuture<'static, StartOutcome>,
    span: Span,
}

/// The stream of the session currently in `Streaming`.
struct ActiveStream {
    session_id: Uuid,
    decoder: StreamDecoder,
    span: Span,
}

enum LoopEvent {
    Command(Option<Command>),
    Started(StartOutcome),
    Update(Option<StreamUpdate>),
}

pub struct SessionController {
    backend: Arc<dyn AnalysisBackend>,
    policy: UploadPolicy,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<SessionState>,
    starting: Option<PendingStart>,
    active: Option<ActiveStream>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AnalysisBackend>, policy: UploadPolicy) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let controller = Self {
            backend,
            policy,
            commands: command_rx,
            state: state_tx,
            starting: None,
            active: None,
        };
        let handle = SessionHandle {
            commands: command_tx,
            state: state_rx,
        };
        (controller, handle)
    }

    /// Creates a controller and runs it on a new task.
    pub fn spawn(
        backend: Arc<dyn AnalysisBackend>,
        policy: UploadPolicy,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(backend, policy);
        (handle, tokio::spawn(controller.run()))
    }

    /// The control loop. Runs until a shutdown command arrives or every
    /// handle is dropped.
    pub async fn run(mut self) {
        info!("Session controller started");
        loop {
            // Commands win ties so a new submit cancels the old session before
            // any more of its progress is applied.
            let event = tokio::select! {
                biased;
                command = self.commands.recv() => LoopEvent::Command(command),
                outcome = next_outcome(&mut self.starting) => LoopEvent::Started(outcome),
                update = next_update(&mut self.active) => LoopEvent::Update(update),
            };
            match event {
                LoopEvent::Command(Some(Command::Submit { file, ack })) => self.submit(file, ack),
                LoopEvent::Command(Some(Command::Shutdown)) | LoopEvent::Command(None) => break,
                LoopEvent::Started(outcome) => self.started(outcome),
                LoopEvent::Update(Some(update)) => self.apply(update),
                LoopEvent::Update(None) => self.release_stream(),
            }
        }

        if self.starting.is_some() || self.active.is_some() {
            self.settle_with(TransportError::ClosedLocally.into());
        }
        info!("Session controller stopped");
    }

    fn submit(&mut self, file: Option<SelectedFile>, ack: oneshot::Sender<Submission>) {
        let file = match self.policy.validate(file) {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "Rejected submit");
                self.state.send_modify(|state| state.reject(&err));
                let _ = ack.send(Submission::Rejected(err));
                return;
            }
        };

        if let Some(prior) = self.starting.take() {
            info!(session_id = %prior.session_id, "Cancelling start of superseded session");
        }
        if let Some(prior) = self.active.take() {
            info!(session_id = %prior.session_id, "Closing stream of superseded session");
        }

        let mut session_id = Uuid::nil();
        self.state
            .send_modify(|state| session_id = state.begin(file.clone()));
        let _ = ack.send(Submission::Started(session_id));

        let span = info_span!("session", %session_id, file = %file.name);
        let step = start(Arc::clone(&self.backend), file)
            .instrument(span.clone())
            .boxed();
        self.starting = Some(PendingStart {
            session_id,
            step,
            span,
        });
    }

    /// Publishes the result of the upload-then-open step. `Streaming` is only
    /// entered together with the stream that feeds it.
    fn started(&mut self, outcome: StartOutcome) {
        let Some(pending) = self.starting.take() else {
            return;
        };
        let _entered = pending.span.enter();

        match outcome {
            StartOutcome::UploadFailed(err) => {
                error!(error = %err, "Upload failed");
                let err = SessionError::from(err);
                self.state.send_modify(|state| {
                    state.fail(&err);
                });
            }
            StartOutcome::OpenFailed { upload_id, err } => {
                error!(%upload_id, error = %err, "Failed to open analysis stream");
                let err = SessionError::from(err);
                self.state.send_modify(|state| {
                    state.upload_succeeded(upload_id);
                    state.fail(&err);
                });
            }
            StartOutcome::Opened { upload_id, frames } => {
                info!(%upload_id, "Analysis stream open");
                self.active = Some(ActiveStream {
                    session_id: pending.session_id,
                    decoder: StreamDecoder::new(frames),
                    span: pending.span.clone(),
                });
                self.state.send_modify(|state| {
                    state.upload_succeeded(upload_id);
                });
            }
        }
    }

    fn apply(&mut self, update: StreamUpdate) {
        let span = match &self.active {
            Some(active) => active.span.clone(),
            None => return,
        };
        let _entered = span.enter();

        match &update {
            StreamUpdate::Preview(preview) => debug!(chars = preview.len(), "Preview updated"),
            StreamUpdate::Message(message) => debug!(%message, "Transcript message received"),
            StreamUpdate::Ended => info!("Analysis stream ended"),
            StreamUpdate::Failed(err) => {
                error!(kind = err.kind(), error = %err, "Analysis stream failed")
            }
        }

        let terminal = update.is_terminal();
        self.state.send_modify(|state| {
            state.apply(update);
        });
        if terminal {
            self.release_stream();
        }
    }

    fn settle_with(&mut self, err: SessionError) {
        self.starting = None;
        self.release_stream();
        self.state.send_modify(|state| {
            state.fail(&err);
        });
    }

    fn release_stream(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(session_id = %active.session_id, "Released analysis stream");
        }
    }
}

/// Uploads the file and, on success, opens the session's stream.
async fn start(backend: Arc<dyn AnalysisBackend>, file: SelectedFile) -> StartOutcome {
    info!(size = file.size, "Uploading file");
    let receipt = match backend.upload(&file).await {
        Ok(receipt) => receipt,
        Err(err) => return StartOutcome::UploadFailed(err),
    };

    let upload_id = receipt.upload_id;
    info!(
        %upload_id,
        server_message = receipt.message.as_deref().unwrap_or_default(),
        "Upload accepted, opening analysis stream"
    );
    match backend.open_stream(&upload_id).await {
        Ok(frames) => StartOutcome::Opened { upload_id, frames },
        Err(err) => StartOutcome::OpenFailed { upload_id, err },
    }
}

/// The outcome of the pending start; pends forever when there is none.
async fn next_outcome(starting: &mut Option<PendingStart>) -> StartOutcome {
    match starting {
        Some(pending) => (&mut pending.step).await,
        None => std::future::pending().await,
    }
}

/// The next update of the active stream; pends forever when there is none.
async fn next_update(active: &mut Option<ActiveStream>) -> Option<StreamUpdate> {
    match active {
        Some(active) => active.decoder.next_update().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FrameStream, MockAnalysisBackend, UploadReceipt};
    use crate::render::View;
    use async_trait::async_trait;
    use bytes::Bytes;
    use eda_core::{Phase, RoleClass, UploadError};
    use futures::{StreamExt, stream};
    use std::collections::VecDeque;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    /// Replays canned uploads and streams.
    #[derive(Default)]
    struct ScriptedBackend {
        upload_id: Option<String>,
        upload_gate: Option<Arc<Notify>>,
        streams: Mutex<VecDeque<FrameStream>>,
        opened: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with_stream(self, frames: FrameStream) -> Self {
            self.streams.lock().unwrap().push_back(frames);
            self
        }
    }

    #[async_trait]
    impl AnalysisBackend for ScriptedBackend {
        async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, UploadError> {
            if let Some(gate) = &self.upload_gate {
                gate.notified().await;
            }
            Ok(UploadReceipt {
                upload_id: self.upload_id.clone().unwrap_or_else(|| file.name.clone()),
                message: Some("File uploaded successfully".to_string()),
            })
        }

        async fn open_stream(&self, upload_id: &str) -> Result<FrameStream, TransportError> {
            self.opened.lock().unwrap().push(upload_id.to_string());
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Connect("connection refused".to_string()))
        }
    }

    fn frame(json: &str) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }

    fn closing_stream(frames: Vec<Result<Bytes, TransportError>>) -> FrameStream {
        Box::pin(stream::iter(frames))
    }

    /// A stream that never closes on its own; `dropped` flips when it is released.
    fn open_ended_stream(
        frames: Vec<Result<Bytes, TransportError>>,
        dropped: Arc<AtomicBool>,
    ) -> FrameStream {
        struct Release(Arc<AtomicBool>);
        impl Drop for Release {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let release = Release(dropped);
        Box::pin(
            stream::iter(frames)
                .chain(stream::pending())
                .map(move |chunk| {
                    let _held = &release;
                    chunk
                }),
        )
    }

    fn data_csv() -> SelectedFile {
        SelectedFile::new("data.csv", "/tmp/data.csv", 64)
    }

    async fn settled(handle: &SessionHandle) -> SessionState {
        timeout(Duration::from_secs(5), handle.wait_until_settled())
            .await
            .expect("session did not settle in time")
            .expect("controller stopped")
    }

    #[tokio::test]
    async fn test_full_session_settles_cleanly() {
        let backend = ScriptedBackend {
            upload_id: Some("abc123".to_string()),
            ..Default::default()
        }
        .with_stream(closing_stream(vec![
            frame(r#"{"preview": "   a  b\n0  1  2"}"#),
            frame(r#"{"message": "User: please analyze"}"#),
            frame(r#"{"message": "Coder: import pandas as pd"}"#),
        ]));
        let backend = Arc::new(backend);
        let (handle, join) = SessionController::spawn(backend.clone(), UploadPolicy::default());

        let submission = handle.submit(Some(data_csv())).await.unwrap();
        assert!(matches!(submission, Submission::Started(_)));

        let state = settled(&handle).await;
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(state.error, None);
        assert_eq!(state.upload_id.as_deref(), Some("abc123"));
        assert_eq!(state.preview.as_deref(), Some("   a  b\n0  1  2"));
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(*backend.opened.lock().unwrap(), vec!["abc123"]);

        let roles: Vec<RoleClass> = View::from_state(&state)
            .entries
            .iter()
            .map(|entry| entry.role)
            .collect();
        assert_eq!(roles, vec![RoleClass::User, RoleClass::Coder]);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_uploading_is_published_before_upload_completes() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend {
            upload_gate: Some(gate.clone()),
            ..Default::default()
        }
        .with_stream(closing_stream(vec![frame(r#"{"preview": "p"}"#)]));
        let (handle, _join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Uploading);
        assert_eq!(state.selected_file, Some(data_csv()));
        assert_eq!(state.preview, None);

        gate.notify_one();
        let state = settled(&handle).await;
        assert_eq!(state.preview.as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn test_upload_failure_never_opens_stream() {
        let mut backend = MockAnalysisBackend::new();
        backend.expect_upload().times(1).returning(|_| {
            Err(UploadError::Rejected {
                status: 400,
                reason: "No selected file".to_string(),
            })
        });
        backend.expect_open_stream().times(0);
        let (handle, join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let state = settled(&handle).await;
        assert_eq!(state.error.as_deref(), Some("No selected file"));
        assert_eq!(state.upload_id, None);
        assert!(state.transcript.is_empty());

        handle.shutdown().await.unwrap();
        join.await.expect("controller task panicked");
    }

    #[tokio::test]
    async fn test_empty_frame_settles_with_protocol_error() {
        let backend = ScriptedBackend::default().with_stream(closing_stream(vec![
            frame(r#"{"preview": "p1"}"#),
            frame(r#"{"message": "User: hi"}"#),
            frame("{}"),
            frame(r#"{"message": "Coder: never applied"}"#),
        ]));
        let (handle, _join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let state = settled(&handle).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Stream frame carried neither a preview nor a message")
        );
        assert_eq!(state.preview.as_deref(), Some("p1"));
        assert_eq!(state.transcript, vec!["User: hi"]);
    }

    #[tokio::test]
    async fn test_transport_fault_keeps_partial_progress() {
        let backend = ScriptedBackend::default().with_stream(closing_stream(vec![
            frame(r#"{"preview": "p"}"#),
            frame(r#"{"message": "Critic: 7/10"}"#),
            Err(TransportError::Dropped("connection reset".to_string())),
        ]));
        let (handle, _join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let state = settled(&handle).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Analysis stream dropped: connection reset")
        );
        assert_eq!(state.preview.as_deref(), Some("p"));
        assert_eq!(state.transcript, vec!["Critic: 7/10"]);
    }

    #[tokio::test]
    async fn test_stream_that_cannot_open_settles_with_error() {
        let backend = Arc::new(ScriptedBackend::default());
        let (handle, _join) = SessionController::spawn(backend.clone(), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let state = settled(&handle).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to open analysis stream: connection refused")
        );
        assert_eq!(state.upload_id.as_deref(), Some("data.csv"));
        assert_eq!(*backend.opened.lock().unwrap(), vec!["data.csv"]);
    }

    #[tokio::test]
    async fn test_invalid_submit_leaves_phase_unchanged() {
        let backend = MockAnalysisBackend::new();
        let (handle, _join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        let submission = handle.submit(None).await.unwrap();
        assert_eq!(
            submission,
            Submission::Rejected(ValidationError::NoFileSelected)
        );
        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.error, None);
        assert_eq!(
            state.notice.as_deref(),
            Some("Please select a file to analyze")
        );

        let notes = SelectedFile::new("notes.txt", "/tmp/notes.txt", 10);
        let submission = handle.submit(Some(notes)).await.unwrap();
        assert!(matches!(
            submission,
            Submission::Rejected(ValidationError::UnsupportedFileType { .. })
        ));
        assert_eq!(handle.current_state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_resubmit_closes_prior_stream() {
        let first_dropped = Arc::new(AtomicBool::new(false));
        let backend = ScriptedBackend::default()
            .with_stream(open_ended_stream(
                vec![
                    frame(r#"{"preview": "first preview"}"#),
                    frame(r#"{"message": "User: first"}"#),
                ],
                first_dropped.clone(),
            ))
            .with_stream(closing_stream(vec![frame(
                r#"{"message": "Coder: second"}"#,
            )]));
        let (handle, _join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let mut state_rx = handle.subscribe();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|state| state.transcript.len() == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!first_dropped.load(Ordering::SeqCst));

        let next = SelectedFile::new("next.csv", "/tmp/next.csv", 12);
        handle.submit(Some(next)).await.unwrap();
        assert!(first_dropped.load(Ordering::SeqCst));

        let state = settled(&handle).await;
        assert_eq!(state.error, None);
        assert_eq!(state.upload_id.as_deref(), Some("next.csv"));
        assert_eq!(state.preview, None);
        assert_eq!(state.transcript, vec!["Coder: second"]);
    }

    #[tokio::test]
    async fn test_current_state_is_idempotent() {
        let (handle, _join) = SessionController::spawn(
            Arc::new(MockAnalysisBackend::new()),
            UploadPolicy::default(),
        );
        assert_eq!(handle.current_state(), handle.current_state());
        assert_eq!(handle.current_state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_shutdown_releases_open_stream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let backend = ScriptedBackend::default().with_stream(open_ended_stream(
            vec![frame(r#"{"message": "User: hi"}"#)],
            dropped.clone(),
        ));
        let (handle, join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        let mut state_rx = handle.subscribe();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|state| state.transcript.len() == 1),
        )
        .await
        .unwrap()
        .unwrap();

        handle.shutdown().await.unwrap();
        join.await.unwrap();

        assert!(dropped.load(Ordering::SeqCst));
        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(
            state.error.as_deref(),
            Some("Analysis stream closed by the client")
        );
        assert_eq!(state.transcript, vec!["User: hi"]);
        assert!(handle.submit(Some(data_csv())).await.is_err());
    }

    #[tokio::test]
    async fn test_resubmit_during_upload_cancels_prior_session() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(
            ScriptedBackend {
                upload_gate: Some(gate.clone()),
                ..Default::default()
            }
            .with_stream(closing_stream(vec![frame(
                r#"{"message": "Coder: second"}"#,
            )])),
        );
        let (handle, _join) = SessionController::spawn(backend.clone(), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        assert_eq!(handle.current_state().phase, Phase::Uploading);

        let next = SelectedFile::new("next.csv", "/tmp/next.csv", 12);
        let submission = timeout(Duration::from_secs(2), handle.submit(Some(next.clone())))
            .await
            .expect("submit blocked behind the superseded upload")
            .unwrap();
        assert!(matches!(submission, Submission::Started(_)));
        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Uploading);
        assert_eq!(state.selected_file, Some(next));

        // Only the surviving upload is still waiting on the gate.
        gate.notify_one();
        let state = settled(&handle).await;
        assert_eq!(state.error, None);
        assert_eq!(state.upload_id.as_deref(), Some("next.csv"));
        assert_eq!(state.transcript, vec!["Coder: second"]);
        assert_eq!(*backend.opened.lock().unwrap(), vec!["next.csv"]);
    }

    #[tokio::test]
    async fn test_shutdown_during_upload_does_not_wait_for_it() {
        let backend = Arc::new(ScriptedBackend {
            upload_gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        let (handle, join) = SessionController::spawn(backend.clone(), UploadPolicy::default());

        handle.submit(Some(data_csv())).await.unwrap();
        handle.shutdown().await.unwrap();
        timeout(Duration::from_secs(2), join)
            .await
            .expect("controller waited for the upload")
            .unwrap();

        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(
            state.error.as_deref(),
            Some("Analysis stream closed by the client")
        );
        assert_eq!(state.upload_id, None);
        assert!(backend.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_is_published_with_its_stream() {
        let backend = ScriptedBackend::default().with_stream(open_ended_stream(
            vec![],
            Arc::new(AtomicBool::new(false)),
        ));
        let (handle, join) = SessionController::spawn(Arc::new(backend), UploadPolicy::default());
        let mut state_rx = handle.subscribe();

        handle.submit(Some(data_csv())).await.unwrap();
        let state = timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|state| state.phase == Phase::Streaming),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.upload_id.as_deref(), Some("data.csv"));

        handle.shutdown().await.unwrap();
        join.await.unwrap();
        let state = handle.current_state();
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(
            state.error.as_deref(),
            Some("Analysis stream closed by the client")
        );
    }
}
