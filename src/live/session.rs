//! Live session lifecycle: start/stop orchestration over capture, channel,
//! playback, and transcript assembly.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::capture::{run_capture, MicrophoneSource};
use super::channel::LiveChannel;
use super::config::LiveConfig;
use super::events::LiveEvent;
use super::playback::{OutputClock, PlaybackScheduler};
use super::transcript::{TranscriptAssembler, TranscriptTurn};
use crate::error::{Result, StrydeError};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Caller-visible session updates.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The session moved to a new state.
    State(SessionState),
    /// A turn was sealed.
    Turn(TranscriptTurn),
    /// A non-fatal mid-session error (the session stays open).
    Error(String),
}

struct ActiveRun {
    shutdown_tx: watch::Sender<bool>,
    pump_task: JoinHandle<()>,
}

/// One live voice session with the coach.
///
/// At most one run can be active at a time: `start` is refused unless the
/// session is `Idle` or `Closed`. `stop` is idempotent, and `Drop` tears the
/// run down if the owner goes away mid-session.
pub struct LiveSession {
    config: LiveConfig,
    microphone: Arc<dyn MicrophoneSource>,
    clock: Arc<dyn OutputClock>,
    state: Arc<Mutex<SessionState>>,
    updates_tx: mpsc::UnboundedSender<SessionUpdate>,
    updates_rx: mpsc::UnboundedReceiver<SessionUpdate>,
    active: Option<ActiveRun>,
}

impl LiveSession {
    pub fn new(
        config: LiveConfig,
        microphone: Arc<dyn MicrophoneSource>,
        clock: Arc<dyn OutputClock>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            config,
            microphone,
            clock,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            updates_tx,
            updates_rx,
            active: None,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock")
    }

    /// Wait for the next session update.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates_rx.recv().await
    }

    /// Start a live run: microphone → channel → playback/transcripts.
    ///
    /// Any failure aborts the whole sequence, releases everything acquired so
    /// far, returns the state to `Idle`, and reports exactly one error.
    pub async fn start(&mut self) -> Result<()> {
        if !matches!(self.state(), SessionState::Idle | SessionState::Closed) {
            return Err(StrydeError::InvalidState(
                "A live session is already active".into(),
            ));
        }
        // Reap a run that ended on a remote close.
        self.stop().await?;

        transition(&self.state, &self.updates_tx, SessionState::Connecting);

        let stream = match self.microphone.open().await {
            Ok(stream) => stream,
            Err(error) => {
                transition(&self.state, &self.updates_tx, SessionState::Idle);
                return Err(error);
            }
        };

        let channel = match LiveChannel::open(&self.config).await {
            Ok(channel) => channel,
            Err(error) => {
                drop(stream); // releases the microphone guard
                transition(&self.state, &self.updates_tx, SessionState::Idle);
                return Err(error);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump_task = tokio::spawn(run_session_loop(
            channel,
            stream,
            Arc::clone(&self.clock),
            Arc::clone(&self.state),
            self.updates_tx.clone(),
            shutdown_rx,
        ));

        self.active = Some(ActiveRun {
            shutdown_tx,
            pump_task,
        });
        Ok(())
    }

    /// Stop the active run, releasing capture, channel, and playback
    /// resources. No-op when nothing is running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        if matches!(self.state(), SessionState::Connecting | SessionState::Open) {
            transition(&self.state, &self.updates_tx, SessionState::Closing);
        }

        let _ = active.shutdown_tx.send(true);
        // A panicked pump task is absorbed here; teardown must not raise.
        if let Err(error) = active.pump_task.await {
            warn!(error = %error, "Live session task ended abnormally");
        }

        transition(&self.state, &self.updates_tx, SessionState::Closed);
        Ok(())
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.shutdown_tx.send(true);
            active.pump_task.abort();
        }
    }
}

/// Set the state and emit an update, once per actual change.
fn transition(
    state: &Mutex<SessionState>,
    updates_tx: &mpsc::UnboundedSender<SessionUpdate>,
    next: SessionState,
) {
    let mut guard = state.lock().expect("session state lock");
    if *guard != next {
        *guard = next;
        let _ = updates_tx.send(SessionUpdate::State(next));
    }
}

/// The single inbound dispatch point: owns the scheduler and assembler, so
/// no continuation can touch them after this task exits.
async fn run_session_loop(
    mut channel: LiveChannel,
    stream: super::capture::CaptureStream,
    clock: Arc<dyn OutputClock>,
    state: Arc<Mutex<SessionState>>,
    updates_tx: mpsc::UnboundedSender<SessionUpdate>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut scheduler = PlaybackScheduler::new(clock);
    let mut assembler = TranscriptAssembler::new();
    let mut pending_stream = Some(stream);
    let mut capture: Option<(watch::Sender<bool>, JoinHandle<()>)> = None;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            event = channel.next_event() => {
                match event {
                    Some(LiveEvent::Ready) => {
                        debug!("Live session ready");
                        transition(&state, &updates_tx, SessionState::Open);
                        if let Some(stream) = pending_stream.take() {
                            let (capture_shutdown_tx, capture_shutdown_rx) = watch::channel(false);
                            let task = tokio::spawn(run_capture(
                                stream,
                                channel.sender(),
                                capture_shutdown_rx,
                            ));
                            capture = Some((capture_shutdown_tx, task));
                        }
                    }
                    Some(LiveEvent::AudioFragment(fragment)) => {
                        if let Err(error) = scheduler.schedule_fragment(&fragment) {
                            warn!(error = %error, "Skipping undecodable audio fragment");
                            let _ = updates_tx.send(SessionUpdate::Error(error.to_string()));
                        }
                    }
                    Some(LiveEvent::InputTranscript(text)) => assembler.push_user(&text),
                    Some(LiveEvent::OutputTranscript(text)) => assembler.push_model(&text),
                    Some(LiveEvent::TurnComplete) => {
                        let _ = updates_tx.send(SessionUpdate::Turn(assembler.seal_turn()));
                    }
                    Some(LiveEvent::ServerError { message }) => {
                        warn!(message = message.as_str(), "Live server error");
                        let _ = updates_tx.send(SessionUpdate::Error(message));
                    }
                    Some(LiveEvent::Closed) | None => {
                        transition(&state, &updates_tx, SessionState::Closed);
                        break;
                    }
                }
            }
        }
    }

    // Outbound capture stops before the remote close is requested.
    if let Some((capture_shutdown_tx, task)) = capture {
        let _ = capture_shutdown_tx.send(true);
        let _ = task.await;
    }
    drop(pending_stream); // releases the microphone if capture never started
    let _ = channel.close().await;
}
