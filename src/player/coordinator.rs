use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::api::{ApiError, PlayerTrack, TrackId};
use crate::app::session::{SessionAction, SessionState, UserSession};
use crate::player::traits::{
    HostTransport, NowPlaying, TrackService, TransportControls, TransportEvent,
};

/// Where the coordinator sits for the current cursor position.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlaybackState {
    /// Nothing queued, cursor invalid, or the last load failed.
    #[default]
    Empty,
    /// A load is in flight for the current cursor position.
    Loading { track_id: TrackId },
    /// The current track is loaded and available for playback.
    Ready(PlayerTrack),
}

/// Published state for presentation. Replaced wholesale on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub playback: PlaybackState,
    pub queue: Vec<TrackId>,
    pub current_index: Option<usize>,
    pub shuffle: bool,
}

/// Everything the outside world may ask of the coordinator. Session actions
/// and playback lifecycle events go through the same serialized channel.
#[derive(Debug)]
pub enum Command {
    Dispatch(SessionAction),
    /// The current track played to completion.
    TrackEnded,
    /// Playback progress report for the current track.
    Progress { elapsed_secs: f64 },
    Shutdown,
}

#[derive(Debug)]
struct LoadOutcome {
    seq: u64,
    track_id: TrackId,
    result: Result<PlayerTrack, ApiError>,
}

/// Cloneable handle for dispatching into a running coordinator.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PlayerHandle {
    pub fn dispatch(&self, action: SessionAction) {
        let _ = self.tx.send(Command::Dispatch(action));
    }

    pub fn track_ended(&self) {
        let _ = self.tx.send(Command::TrackEnded);
    }

    pub fn progress(&self, elapsed_secs: f64) {
        let _ = self.tx.send(Command::Progress { elapsed_secs });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

/// The queue coordinator: owns the session state, reacts to queue/cursor
/// changes by loading track metadata, advances on completion, fires the
/// one-shot play registration, and mirrors ready tracks to the host
/// transport. All mutation happens inside its single task.
pub struct Coordinator {
    service: Arc<dyn TrackService>,
    transport: Option<Box<dyn HostTransport>>,
    state: SessionState,
    playback: PlaybackState,
    /// Bumped per issued load; stale outcomes carry an older value.
    load_seq: u64,
    /// One-shot per track instance, reset whenever the current track changes.
    play_registered: bool,
    /// Target whose last load failed; not retried until the target changes.
    failed_target: Option<TrackId>,
    commands: mpsc::UnboundedReceiver<Command>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    // Held so the transport receiver never reports closed.
    _transport_tx: mpsc::UnboundedSender<TransportEvent>,
    loads_rx: mpsc::UnboundedReceiver<LoadOutcome>,
    loads_tx: mpsc::UnboundedSender<LoadOutcome>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl Coordinator {
    /// Start the coordinator task. The initial state is synced immediately,
    /// so a pre-populated queue starts loading without any dispatch.
    pub fn spawn(
        service: Arc<dyn TrackService>,
        transport: Option<Box<dyn HostTransport>>,
        initial: SessionState,
    ) -> (PlayerHandle, watch::Receiver<Snapshot>) {
        let (cmd_tx, commands) = mpsc::unbounded_channel();
        let (transport_tx, transport_events) = mpsc::unbounded_channel();
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();

        let mut transport = transport;
        if let Some(t) = transport.as_mut() {
            // Best-effort; a transport without buttons still gets publishes.
            if let Err(e) = t.install(TransportControls::new(transport_tx.clone())) {
                debug!(error = %e, "host transport handlers unavailable");
            }
        }

        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            playback: PlaybackState::Empty,
            queue: initial.queue.clone(),
            current_index: initial.current_index,
            shuffle: initial.shuffle,
        });

        let mut coordinator = Self {
            service,
            transport,
            state: initial,
            playback: PlaybackState::Empty,
            load_seq: 0,
            play_registered: false,
            failed_target: None,
            commands,
            transport_events,
            _transport_tx: transport_tx,
            loads_rx,
            loads_tx,
            snapshot_tx,
        };
        tokio::spawn(async move { coordinator.run().await });

        (PlayerHandle { tx: cmd_tx }, snapshot_rx)
    }

    async fn run(&mut self) {
        self.sync_target(false);
        self.publish_snapshot();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if !self.handle_command(cmd) {
                                break;
                            }
                        }
                        // All handles dropped.
                        None => break,
                    }
                }
                Some(event) = self.transport_events.recv() => {
                    self.handle_transport_event(event);
                }
                Some(outcome) = self.loads_rx.recv() => {
                    self.handle_load_outcome(outcome);
                }
            }
            self.publish_snapshot();
        }
        debug!("coordinator stopped");
    }

    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Dispatch(action) => {
                // Queue construction and session changes replace the current
                // track instance even when the id stays the same. A cursor
                // move only does so when it actually lands somewhere else;
                // a clamped move is a no-op.
                let force = match &action {
                    SessionAction::SetQueue(_)
                    | SessionAction::SetUser(_)
                    | SessionAction::ClearUser => true,
                    SessionAction::PopFrontOfQueue => self.state.current_index == Some(0),
                    _ => false,
                };
                let cursor_before = self.state.current_index;
                let moves_cursor = matches!(
                    action,
                    SessionAction::IncrementCurrentIndex | SessionAction::DecrementCurrentIndex
                );
                self.state.apply(action);
                let new_instance =
                    force || (moves_cursor && self.state.current_index != cursor_before);
                self.sync_target(new_instance);
            }
            Command::TrackEnded => {
                // The consumed head is gone; whatever is current now is a
                // fresh instance, duplicate ids included.
                self.state.advance_after_end();
                self.sync_target(true);
            }
            Command::Progress { elapsed_secs } => self.handle_progress(elapsed_secs),
            Command::Shutdown => return false,
        }
        true
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        let action = match event {
            TransportEvent::NextTrack => SessionAction::IncrementCurrentIndex,
            TransportEvent::PreviousTrack => SessionAction::DecrementCurrentIndex,
        };
        let cursor_before = self.state.current_index;
        self.state.apply(action);
        self.sync_target(self.state.current_index != cursor_before);
    }

    /// Reconcile the playback state with whatever the queue+cursor now name.
    /// A new target clears the displayed track before the load resolves, so
    /// presentation never flashes the previous track. `new_instance` forces
    /// a fresh load even for an unchanged id: a duplicated id at the next
    /// queue position is a different track instance.
    fn sync_target(&mut self, new_instance: bool) {
        let target = self.state.current_track_id();
        let displayed = match &self.playback {
            PlaybackState::Empty => None,
            PlaybackState::Loading { track_id } => Some(*track_id),
            PlaybackState::Ready(track) => Some(track.id()),
        };

        match target {
            None => {
                self.failed_target = None;
                if self.playback != PlaybackState::Empty {
                    self.playback = PlaybackState::Empty;
                    self.play_registered = false;
                }
            }
            Some(id) if !new_instance && displayed == Some(id) => {}
            // A failed load is not retried until the target changes.
            Some(id) if !new_instance && self.failed_target == Some(id) => {}
            Some(id) => {
                self.failed_target = None;
                self.playback = PlaybackState::Loading { track_id: id };
                self.play_registered = false;
                self.load_seq += 1;
                let seq = self.load_seq;
                let service = self.service.clone();
                let user = self.state.user.clone();
                let tx = self.loads_tx.clone();
                tokio::spawn(async move {
                    let result = load_track(service, id, user).await;
                    let _ = tx.send(LoadOutcome {
                        seq,
                        track_id: id,
                        result,
                    });
                });
            }
        }
    }

    fn handle_load_outcome(&mut self, outcome: LoadOutcome) {
        if outcome.seq != self.load_seq {
            debug!(track_id = outcome.track_id, "discarding superseded load");
            return;
        }
        // Recency alone is not enough: the cursor may have gone invalid
        // without issuing a newer load. The id must still match.
        if self.state.current_track_id() != Some(outcome.track_id) {
            debug!(track_id = outcome.track_id, "discarding load for stale cursor");
            return;
        }

        match outcome.result {
            Ok(track) => {
                if let Some(transport) = self.transport.as_mut() {
                    let now_playing = NowPlaying::from_track(track.track());
                    if let Err(e) = transport.publish(&now_playing) {
                        debug!(error = %e, "now-playing publish failed");
                    }
                }
                self.playback = PlaybackState::Ready(track);
                self.play_registered = false;
            }
            Err(e) => {
                warn!(track_id = outcome.track_id, error = %e, "track load failed");
                self.failed_target = Some(outcome.track_id);
                self.playback = PlaybackState::Empty;
            }
        }
    }

    /// Register the play once elapsed time passes half the track's duration,
    /// at most once per track instance and only for signed-in users.
    fn handle_progress(&mut self, elapsed_secs: f64) {
        if self.play_registered {
            return;
        }
        let PlaybackState::Ready(track) = &self.playback else {
            return;
        };
        let Some(user) = self.state.user.clone() else {
            return;
        };
        let duration = track.track().duration;
        if duration <= 0.0 || elapsed_secs <= duration / 2.0 {
            return;
        }

        self.play_registered = true;
        let track_id = track.id();
        let service = self.service.clone();
        tokio::spawn(async move {
            // Lossy side channel: a failed registration never interrupts
            // playback.
            if let Err(e) = service.register_play(user.id, track_id).await {
                warn!(track_id, error = %e, "play registration failed");
            }
        });
    }

    fn publish_snapshot(&self) {
        let snapshot = Snapshot {
            playback: self.playback.clone(),
            queue: self.state.queue.clone(),
            current_index: self.state.current_index,
            shuffle: self.state.shuffle,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn load_track(
    service: Arc<dyn TrackService>,
    id: TrackId,
    user: Option<UserSession>,
) -> Result<PlayerTrack, ApiError> {
    let track = service.fetch_track(id).await?;
    match user {
        Some(user) => {
            let mut enriched = service.map_favorite_and_plays(user.id, vec![track]).await?;
            match enriched.pop() {
                Some(track) => Ok(PlayerTrack::WithUserCounts(track)),
                None => Err(ApiError::UnexpectedResponse(
                    "enrichment returned fewer tracks than requested".to_string(),
                )),
            }
        }
        None => Ok(PlayerTrack::Bare(track)),
    }
}
