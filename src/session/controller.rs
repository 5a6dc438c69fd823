use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{ChunkBackpressure, SessionConfig};
use super::state::{FinalizedSession, RecordingSnapshot, SessionState, SessionUpdate};
use crate::audio::{AudioChunk, CaptureSource};
use crate::auth::AuthToken;
use crate::error::{CaptureError, SessionError};
use crate::socket::{SocketConnector, SocketEvent, TranscriptSocket};

type SessionOutcome = Result<FinalizedSession, SessionError>;
type SharedSocket = Arc<Mutex<Option<Box<dyn TranscriptSocket>>>>;
type SharedCapture = Arc<Mutex<Box<dyn CaptureSource>>>;

/// Orchestrates one live-to-finalized transcription attempt
///
/// Composes an audio capture source and a session socket, drives the session
/// state machine, and is the only mutator of session state. One controller
/// serves exactly one start -> stop cycle; a new session means a new
/// controller.
pub struct RecordingController {
    config: SessionConfig,

    /// Correlation id for this attempt's log lines (the backend assigns the
    /// real session id only at finalization)
    attempt_id: Uuid,

    capture: SharedCapture,
    connector: Arc<dyn SocketConnector>,
    socket: SharedSocket,

    shared: Arc<Mutex<Shared>>,
    updates_tx: mpsc::Sender<SessionUpdate>,

    /// Finalize deadline, armed by `stop()`; the event task enforces it
    deadline_tx: watch::Sender<Option<Instant>>,

    /// Terminal outcome, set exactly once; `stop()` awaits and replays it
    outcome_tx: Arc<watch::Sender<Option<SessionOutcome>>>,

    pump_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: SessionState,
    fragments: Vec<String>,
    session_id: Option<String>,
    error: Option<SessionError>,
    final_record: Option<FinalizedSession>,
    started_at: Option<chrono::DateTime<Utc>>,
}

impl RecordingController {
    /// Create a controller plus the update stream a UI subscribes to
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn CaptureSource>,
        connector: Arc<dyn SocketConnector>,
    ) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let (updates_tx, updates_rx) = mpsc::channel(256);
        let (deadline_tx, _) = watch::channel(None);
        let (outcome_tx, _) = watch::channel(None);

        let controller = Self {
            config,
            attempt_id: Uuid::new_v4(),
            capture: Arc::new(Mutex::new(capture)),
            connector,
            socket: Arc::new(Mutex::new(None)),
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Idle,
                fragments: Vec::new(),
                session_id: None,
                error: None,
                final_record: None,
                started_at: None,
            })),
            updates_tx,
            deadline_tx,
            outcome_tx: Arc::new(outcome_tx),
            pump_task: Mutex::new(None),
            event_task: Mutex::new(None),
        };

        (controller, updates_rx)
    }

    /// Start the recording session
    ///
    /// Rejected with `AlreadyRecording` unless the controller is `Idle`, with
    /// no side effects on the running session. The token is read once here;
    /// a missing or empty token fails the session before the device opens.
    pub async fn start(&self, token: Option<AuthToken>) -> Result<(), SessionError> {
        {
            let mut shared = self.shared.lock().await;
            if shared.state != SessionState::Idle {
                return Err(SessionError::AlreadyRecording);
            }
            shared.state = SessionState::Acquiring;
            shared.fragments.clear();
            shared.session_id = None;
            shared.error = None;
            shared.final_record = None;
            shared.started_at = Some(Utc::now());
        }
        info!(attempt = %self.attempt_id, "starting recording session");
        self.notify(SessionUpdate::StateChanged(SessionState::Acquiring));

        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(self.fail(SessionError::MissingCredential).await),
        };

        let audio_rx = {
            let mut capture = self.capture.lock().await;
            match capture.start(self.config.capture.clone()).await {
                Ok(rx) => rx,
                Err(CaptureError::PermissionDenied(reason)) => {
                    return Err(self.fail(SessionError::PermissionDenied(reason)).await)
                }
                Err(e) => return Err(self.fail(SessionError::Capture(e)).await),
            }
        };

        // Device and token are ready; the socket opens from Streaming.
        self.set_state(SessionState::Streaming).await;

        let connecting = self.connector.connect(&self.config.endpoint, &token);
        let (socket, events) = match timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                self.stop_capture().await;
                return Err(self.fail(e).await);
            }
            Err(_) => {
                self.stop_capture().await;
                return Err(self.fail(SessionError::Timeout("socket open")).await);
            }
        };
        {
            *self.socket.lock().await = Some(socket);
        }
        info!(attempt = %self.attempt_id, "session socket open, streaming audio");

        let pump = tokio::spawn(pump_audio(
            audio_rx,
            Arc::clone(&self.socket),
            self.config.backpressure,
        ));
        *self.pump_task.lock().await = Some(pump);

        let events_task = tokio::spawn(run_events(
            self.attempt_id,
            events,
            Arc::clone(&self.shared),
            Arc::clone(&self.socket),
            Arc::clone(&self.capture),
            self.updates_tx.clone(),
            Arc::clone(&self.outcome_tx),
            self.deadline_tx.subscribe(),
        ));
        *self.event_task.lock().await = Some(events_task);

        Ok(())
    }

    /// Stop the session and wait for the finalized record
    ///
    /// Stops capture first (bounding the audio sent after the stop frame),
    /// transmits the stop control frame, then awaits the terminal outcome
    /// under `finalize_timeout`. Idempotent: once a session has settled,
    /// every call returns the same recorded outcome.
    pub async fn stop(&self) -> Result<FinalizedSession, SessionError> {
        {
            let mut shared = self.shared.lock().await;
            match shared.state {
                SessionState::Idle | SessionState::Acquiring => {
                    return Err(SessionError::NotRecording)
                }
                SessionState::Streaming => {
                    shared.state = SessionState::Stopping;
                }
                // A stop is already in flight, or the session has settled;
                // report the recorded outcome either way.
                SessionState::Stopping
                | SessionState::Finalizing
                | SessionState::Finalized
                | SessionState::Failed => {
                    drop(shared);
                    return self.await_outcome().await;
                }
            }
        }
        info!(attempt = %self.attempt_id, "stopping recording session");
        self.notify(SessionUpdate::StateChanged(SessionState::Stopping));

        // Capture halts before the stop frame so no chunk can be produced
        // after it; chunks already queued still go out while the socket is
        // open and the backend flushes them into the final transcript.
        self.stop_capture().await;

        self.deadline_tx
            .send_replace(Some(Instant::now() + self.config.finalize_timeout));
        {
            let mut socket = self.socket.lock().await;
            if let Some(socket) = socket.as_mut() {
                socket.send_stop().await;
            }
        }
        self.set_state(SessionState::Finalizing).await;

        self.await_outcome().await
    }

    /// Tear the session down without waiting for finalization
    ///
    /// The unexpected-teardown path (e.g. the owning view going away):
    /// releases the device and the socket and discards the session. The
    /// controller is defunct afterwards.
    pub async fn abort(&self) {
        info!(attempt = %self.attempt_id, "aborting recording session");

        if let Some(task) = self.pump_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }

        self.stop_capture().await;
        {
            let mut socket = self.socket.lock().await;
            if let Some(socket) = socket.as_mut() {
                socket.disconnect().await;
            }
        }

        // Unblock any stop() caller racing the teardown.
        self.outcome_tx.send_if_modified(|outcome| {
            if outcome.is_none() {
                *outcome = Some(Err(SessionError::StreamError("session aborted".into())));
                true
            } else {
                false
            }
        });
    }

    /// The persisted record, once the session reached `Finalized`
    pub async fn final_record(&self) -> Option<FinalizedSession> {
        self.shared.lock().await.final_record.clone()
    }

    /// Current session state, cheap to clone for display
    pub async fn snapshot(&self) -> RecordingSnapshot {
        let shared = self.shared.lock().await;
        RecordingSnapshot {
            state: shared.state,
            partial_transcript: shared.fragments.clone(),
            session_id: shared.session_id.clone(),
            error: shared.error.as_ref().map(|e| e.to_string()),
            started_at: shared.started_at,
        }
    }

    async fn await_outcome(&self) -> SessionOutcome {
        let mut rx = self.outcome_tx.subscribe();
        loop {
            let settled = rx.borrow_and_update().clone();
            if let Some(outcome) = settled {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::NotRecording);
            }
        }
    }

    async fn set_state(&self, state: SessionState) {
        {
            let mut shared = self.shared.lock().await;
            if shared.state.is_terminal() {
                return;
            }
            shared.state = state;
        }
        self.notify(SessionUpdate::StateChanged(state));
    }

    /// Record a failure; cleanup must already have run by the time this is
    /// called so the UI never observes a failed-but-still-recording session.
    async fn fail(&self, error: SessionError) -> SessionError {
        {
            let mut shared = self.shared.lock().await;
            if !shared.state.is_terminal() {
                shared.state = SessionState::Failed;
                shared.error = Some(error.clone());
            }
        }
        self.outcome_tx.send_replace(Some(Err(error.clone())));
        warn!(attempt = %self.attempt_id, "recording session failed: {}", error);
        self.notify(SessionUpdate::StateChanged(SessionState::Failed));
        self.notify(SessionUpdate::Failed(error.clone()));
        error
    }

    async fn stop_capture(&self) {
        let mut capture = self.capture.lock().await;
        if let Err(e) = capture.stop().await {
            warn!("failed to stop audio capture: {}", e);
        }
    }

    fn notify(&self, update: SessionUpdate) {
        // Best-effort: a slow or absent UI must not stall the session.
        if self.updates_tx.try_send(update).is_err() {
            debug!("updates channel full or closed, dropping notification");
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Ok(mut task) = self.pump_task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
        if let Ok(mut task) = self.event_task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

/// Forward captured chunks to the socket until capture ends
async fn pump_audio(
    mut audio_rx: mpsc::Receiver<AudioChunk>,
    socket: SharedSocket,
    policy: ChunkBackpressure,
) {
    let mut backlog: Vec<AudioChunk> = Vec::new();

    while let Some(chunk) = audio_rx.recv().await {
        let mut guard = socket.lock().await;
        let Some(socket) = guard.as_mut() else { break };

        if socket.is_connected() {
            for held in backlog.drain(..) {
                socket.send_audio(held.to_pcm_bytes()).await;
            }
            socket.send_audio(chunk.to_pcm_bytes()).await;
        } else {
            match policy {
                ChunkBackpressure::Drop => {
                    debug!("socket not open, dropping audio chunk");
                }
                ChunkBackpressure::Buffer => backlog.push(chunk),
            }
        }
    }

    if !backlog.is_empty() {
        debug!("discarding {} buffered audio chunks", backlog.len());
    }
}

/// Consume socket events and drive the session to its terminal state
///
/// Sole writer of terminal state after streaming begins: the first terminal
/// signal (final frame, transport error, or finalize deadline) wins and the
/// rest are never observed.
#[allow(clippy::too_many_arguments)]
async fn run_events(
    attempt_id: Uuid,
    mut events: mpsc::Receiver<SocketEvent>,
    shared: Arc<Mutex<Shared>>,
    socket: SharedSocket,
    capture: SharedCapture,
    updates: mpsc::Sender<SessionUpdate>,
    outcome_tx: Arc<watch::Sender<Option<SessionOutcome>>>,
    mut deadline_rx: watch::Receiver<Option<Instant>>,
) {
    let outcome: SessionOutcome = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = finalize_deadline(&mut deadline_rx) => {
                break Err(SessionError::Timeout("final transcript"));
            }
        };

        match event {
            Some(SocketEvent::Partial(text)) => {
                let mut shared = shared.lock().await;
                if shared.state.is_terminal() {
                    continue;
                }
                shared.fragments.push(text.clone());
                drop(shared);
                let _ = updates.try_send(SessionUpdate::Partial { fragment: text });
            }
            Some(SocketEvent::Final(payload)) => match payload.error {
                Some(reason) => break Err(SessionError::ServerFinalization(reason)),
                None => break Ok(FinalizedSession::from(payload)),
            },
            Some(SocketEvent::Error(reason)) => break Err(SessionError::StreamError(reason)),
            None => break Err(SessionError::StreamError("Connection error".into())),
        }
    };

    // Release both resources before the outcome becomes observable.
    {
        let mut capture = capture.lock().await;
        if let Err(e) = capture.stop().await {
            warn!("failed to stop audio capture: {}", e);
        }
    }
    {
        let mut socket = socket.lock().await;
        if let Some(socket) = socket.as_mut() {
            socket.disconnect().await;
        }
    }

    {
        let mut shared = shared.lock().await;
        if shared.state.is_terminal() {
            // A failure path in start() settled this session already.
            return;
        }
        match &outcome {
            Ok(record) => {
                shared.state = SessionState::Finalized;
                shared.session_id = record.session_id.clone();
                shared.final_record = Some(record.clone());
                info!(
                    attempt = %attempt_id,
                    session = record.session_id.as_deref().unwrap_or("<unsaved>"),
                    "session finalized"
                );
            }
            Err(error) => {
                shared.state = SessionState::Failed;
                shared.error = Some(error.clone());
                warn!(attempt = %attempt_id, "recording session failed: {}", error);
            }
        }
    }

    outcome_tx.send_replace(Some(outcome.clone()));
    match outcome {
        Ok(record) => {
            let _ = updates.try_send(SessionUpdate::StateChanged(SessionState::Finalized));
            let _ = updates.try_send(SessionUpdate::Finalized(record));
        }
        Err(error) => {
            let _ = updates.try_send(SessionUpdate::StateChanged(SessionState::Failed));
            let _ = updates.try_send(SessionUpdate::Failed(error));
        }
    }
}

/// Resolves when the currently armed finalize deadline elapses
///
/// Tracks re-arms through the watch channel; pends forever while no deadline
/// is set.
async fn finalize_deadline(rx: &mut watch::Receiver<Option<Instant>>) {
    loop {
        let deadline = *rx.borrow_and_update();
        match deadline {
            Some(at) => match timeout_at(at, rx.changed()).await {
                Err(_) => return,
                Ok(Ok(())) => continue,
                Ok(Err(_)) => std::future::pending::<()>().await,
            },
            None => {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
