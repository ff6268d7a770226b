//! Playback controller: owns the session and its single media handle, and
//! applies the retry/fallback policy when loading or playback fails.
//!
//! All inputs (user intents, media events, connectivity changes, timer
//! expiry) go through `&mut self`, so transitions are serialized by
//! construction. The controller never blocks: loads are started and their
//! outcome arrives later as a [`MediaEvent`].
//!
//! ```text
//! Idle ──start──▶ Loading ──ready──▶ Playing ◀──toggle──▶ Paused
//!                   │  ▲                 │                   │
//!          failure  ▼  │ timer      failure / stall          │
//!                 Stalled ◀──────────────┴───────────────────┘
//!                   │
//!   budget exhausted / offline ──▶ Failed ──manual_retry──▶ Loading
//! ```

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, trace, warn};

use crate::backend::{HandleEvents, MediaBackend, MediaHandle};
use crate::clock::{Clock, SystemClock};
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::errors::Result;
use crate::events::PlaybackEventBus;
use crate::failure::{FailureKind, SessionError};
use crate::model::{
    CommandOutcome, HandleId, MediaEvent, MediaEventKind, Notice, PlaybackEvent, PlaybackStatus,
    SessionSnapshot,
};
use crate::retry_timer::RetryTimer;
use crate::session::PlaybackSession;
use crate::settings::PlayerSettings;
use crate::sources::SourceList;

pub struct PlaybackController<B: MediaBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    settings: PlayerSettings,
    session: Option<PlaybackSession>,
    /// The only live handle. Replaced handles are released first.
    handle: Option<B::Handle>,
    last_handle_id: u64,
    retry_timer: RetryTimer,
    connectivity: ConnectivityState,
    /// Volume applied to new sessions; mirrors the session volume.
    volume: f32,
    bus: PlaybackEventBus,
    events_tx: Sender<MediaEvent>,
    events_rx: Receiver<MediaEvent>,
    disposed: bool,
}

impl<B: MediaBackend> PlaybackController<B, SystemClock> {
    pub fn new(backend: B, settings: PlayerSettings) -> Result<Self> {
        Self::with_clock(backend, settings, SystemClock)
    }
}

impl<B: MediaBackend, C: Clock> PlaybackController<B, C> {
    pub fn with_clock(backend: B, settings: PlayerSettings, clock: C) -> Result<Self> {
        Self::with_bus(backend, settings, clock, PlaybackEventBus::new())
    }

    pub(crate) fn with_bus(
        backend: B,
        settings: PlayerSettings,
        clock: C,
        bus: PlaybackEventBus,
    ) -> Result<Self> {
        settings.validate()?;
        let (events_tx, events_rx) = unbounded::<MediaEvent>();
        Ok(Self {
            backend,
            clock,
            volume: settings.default_volume,
            settings,
            session: None,
            handle: None,
            last_handle_id: 0,
            retry_timer: RetryTimer::new(),
            connectivity: ConnectivityState::default(),
            bus,
            events_tx,
            events_rx,
            disposed: false,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(PlaybackStatus::Idle)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn live_handle(&self) -> Option<HandleId> {
        self.handle.as_ref().map(|h| h.id())
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_timer.is_armed()
    }

    /// When the pending automatic retry is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.retry_timer.deadline()
    }

    /// Receiver of raw media events, for an external event loop.
    pub fn media_events(&self) -> Receiver<MediaEvent> {
        self.events_rx.clone()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session
            .as_ref()
            .map(|s| s.snapshot(&self.settings.formats, self.settings.max_retries))
    }

    // ------------------------------------------------------------------
    // User intents
    // ------------------------------------------------------------------

    /// Creates a fresh session and starts loading the primary source.
    pub fn start(&mut self, sources: SourceList) {
        if self.disposed {
            warn!("start() called on a disposed playback controller");
            return;
        }

        self.retry_timer.cancel();
        self.teardown_handle();

        let online = self.connectivity.is_online();
        info!(sources = sources.len(), online, "Starting playback session");
        self.session = Some(PlaybackSession::new(
            sources,
            self.volume,
            online,
            self.settings.autoplay,
        ));

        if !online {
            self.fail_offline();
            return;
        }
        self.begin_load();
    }

    pub fn toggle_play_pause(&mut self) -> CommandOutcome {
        if self.disposed {
            return CommandOutcome::Disposed;
        }
        if !self.connectivity.is_online() {
            self.bus.broadcast(PlaybackEvent::Notice(Notice::Offline));
            return CommandOutcome::Offline;
        }

        let (status, ready) = match self.session.as_ref() {
            Some(session) => (session.status, session.ready),
            None => return self.not_ready(),
        };

        match status {
            PlaybackStatus::Playing => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.pause();
                }
                if let Some(session) = self.session.as_mut() {
                    session.play_requested = false;
                }
                self.set_status(PlaybackStatus::Paused);
                CommandOutcome::Applied
            }
            PlaybackStatus::Paused | PlaybackStatus::Idle if ready && self.handle.is_some() => {
                if let Some(session) = self.session.as_mut() {
                    session.play_requested = true;
                }
                self.play_handle();
                CommandOutcome::Applied
            }
            _ => self.not_ready(),
        }
    }

    /// Clamps `volume` to [0, 1] and applies it right away. Always succeeds.
    pub fn set_volume(&mut self, volume: f32) -> CommandOutcome {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };

        let changed = self.volume != volume;
        self.volume = volume;
        if let Some(session) = self.session.as_mut() {
            session.volume = volume;
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(volume);
        }
        if changed {
            self.bus.broadcast(PlaybackEvent::VolumeChanged { volume });
        }
        CommandOutcome::Applied
    }

    /// Moves to `fraction` of the track. Ignored until the duration is
    /// known and the session is playing or paused.
    pub fn seek(&mut self, fraction: f64) -> CommandOutcome {
        if self.disposed {
            return CommandOutcome::Disposed;
        }
        let Some(session) = self.session.as_mut() else {
            return CommandOutcome::NotReady;
        };
        if !matches!(
            session.status,
            PlaybackStatus::Playing | PlaybackStatus::Paused
        ) {
            return CommandOutcome::NotReady;
        }
        let Some(duration) = session.duration.filter(|d| *d > 0.0) else {
            return CommandOutcome::NotReady;
        };

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let position = fraction * duration;
        session.position = position;
        session.ended = false;

        if let Some(handle) = self.handle.as_mut() {
            handle.seek(position);
        }
        debug!(position, duration, "Seek");
        self.bus.broadcast(PlaybackEvent::PositionChanged {
            position,
            duration: Some(duration),
        });
        CommandOutcome::Applied
    }

    /// Drops any pending retry and reloads from the primary source with a
    /// fresh retry budget.
    pub fn manual_retry(&mut self) -> CommandOutcome {
        if self.disposed {
            return CommandOutcome::Disposed;
        }
        if !self.connectivity.is_online() {
            info!("Manual retry refused while offline");
            self.bus.broadcast(PlaybackEvent::Notice(Notice::Offline));
            return CommandOutcome::Offline;
        }
        let Some(session) = self.session.as_mut() else {
            return self.not_ready();
        };

        self.retry_timer.cancel();
        session.rewind();
        session.play_requested = true;
        info!("Manual retry from the primary source");

        self.bus
            .broadcast(PlaybackEvent::ErrorChanged { error: None });
        self.begin_load();
        CommandOutcome::Applied
    }

    /// Cancels the pending retry and releases the handle. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.retry_timer.cancel();
        self.teardown_handle();
        while self.events_rx.try_recv().is_ok() {}
        self.session = None;
        self.disposed = true;

        info!("Playback controller disposed");
        self.bus.broadcast(PlaybackEvent::Disposed);
    }

    // ------------------------------------------------------------------
    // External signals
    // ------------------------------------------------------------------

    /// Mirrors the platform connectivity signal.
    ///
    /// Going offline fails the session immediately. Coming back online only
    /// re-enables [`manual_retry`](Self::manual_retry).
    pub fn set_online(&mut self, online: bool) {
        let now = self.clock.now();
        if !self.connectivity.set_online(online, now) {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.is_online = online;
        }

        if online {
            info!("Network connection restored");
            self.bus.broadcast(PlaybackEvent::Notice(Notice::Online));
            return;
        }

        warn!("Network connection lost");
        self.retry_timer.cancel();
        if self.session.is_some() && !self.disposed {
            self.fail_offline();
        } else {
            self.bus.broadcast(PlaybackEvent::Notice(Notice::Offline));
        }
    }

    /// Fires the automatic retry if its deadline has passed.
    pub fn poll_timers(&mut self) -> bool {
        if self.disposed || !self.retry_timer.take_if_due(self.clock.now()) {
            return false;
        }
        if !self.connectivity.is_online() {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.status != PlaybackStatus::Stalled {
            return false;
        }

        session.retry_count += 1;
        if let Some(next) = session.next_cursor.take() {
            session.cursor = next;
        }
        info!(
            attempt = session.retry_count,
            max = self.settings.max_retries,
            source_index = session.cursor.source_index,
            format_index = session.cursor.format_index,
            "Retrying playback"
        );
        self.begin_load();
        true
    }

    /// Drains every queued media event.
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let Ok(event) = self.events_rx.try_recv() else {
                break;
            };
            self.handle_media_event(event);
            processed += 1;
        }
        processed
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.disposed {
            return;
        }
        if self.live_handle() != Some(event.handle) {
            trace!(handle = %event.handle, kind = ?event.kind, "Ignoring event from a released handle");
            return;
        }

        match event.kind {
            MediaEventKind::Ready { duration } => self.on_ready(duration),
            MediaEventKind::Progress { position, duration } => {
                if let Some(session) = self.session.as_mut() {
                    session.update_position(position, duration);
                    let (position, duration) = (session.position, session.duration);
                    self.bus
                        .broadcast(PlaybackEvent::PositionChanged { position, duration });
                }
            }
            MediaEventKind::Stalled => {
                if matches!(
                    self.status(),
                    PlaybackStatus::Loading | PlaybackStatus::Playing | PlaybackStatus::Paused
                ) {
                    self.on_failure(
                        SessionError::new(FailureKind::Network)
                            .with_detail("Playback stalled while buffering"),
                    );
                }
            }
            MediaEventKind::Error(error) => self.on_failure(error),
            MediaEventKind::Ended => self.on_ended(),
            MediaEventKind::PlayRejected => self.on_play_rejected(),
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Replaces the live handle with one loading the session cursor.
    fn begin_load(&mut self) {
        self.teardown_handle();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.reset_media_state();
        let volume = session.volume;
        let Some(uri) = session.current_uri(&self.settings.formats) else {
            warn!(cursor = ?session.cursor, "Source cursor out of range");
            self.enter_failed();
            return;
        };

        self.last_handle_id += 1;
        let id = HandleId(self.last_handle_id);
        self.set_status(PlaybackStatus::Loading);
        self.bus
            .broadcast(PlaybackEvent::SourceChanged { uri: uri.clone() });

        let events = HandleEvents::new(id, self.events_tx.clone());
        match self.backend.open(id, &uri, volume, events) {
            Ok(handle) => {
                debug!(handle = %id, uri = %uri, "Media handle created");
                self.handle = Some(handle);
            }
            Err(err) => {
                warn!(uri = %uri, error = %err, "Unable to create media handle");
                self.on_failure(SessionError::new(FailureKind::Unknown).with_detail(err.to_string()));
            }
        }
    }

    fn on_ready(&mut self, duration: Option<f64>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.ready = true;
        session.retry_count = 0;
        if duration.is_some() {
            session.update_position(session.position, duration);
        }
        let resume = session.resume_position.take();
        if let Some(position) = resume {
            session.update_position(position, None);
        }
        let (position, duration) = (session.position, session.duration);
        let status = session.status;
        let play_requested = session.play_requested;

        debug!(?duration, resume = ?resume, "Media handle ready");
        if resume.is_some() {
            if let Some(handle) = self.handle.as_mut() {
                handle.seek(position);
            }
        }
        self.bus
            .broadcast(PlaybackEvent::PositionChanged { position, duration });

        if status == PlaybackStatus::Loading {
            if play_requested {
                self.play_handle();
            } else if resume.is_some() {
                self.set_status(PlaybackStatus::Paused);
            } else {
                self.set_status(PlaybackStatus::Idle);
            }
        }
    }

    fn on_ended(&mut self) {
        if self.status() != PlaybackStatus::Playing {
            return;
        }
        let looping = self.settings.looping;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if looping {
            session.position = 0.0;
            if let Some(handle) = self.handle.as_mut() {
                handle.seek(0.0);
                handle.play();
            }
            debug!("Track ended, looping");
            let duration = session.duration;
            self.bus.broadcast(PlaybackEvent::PositionChanged {
                position: 0.0,
                duration,
            });
        } else {
            session.ended = true;
            session.play_requested = false;
            if let Some(duration) = session.duration {
                session.position = duration;
            }
            debug!("Track ended");
            self.set_status(PlaybackStatus::Paused);
        }
    }

    fn on_play_rejected(&mut self) {
        if self.status() != PlaybackStatus::Playing {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.play_requested = false;
        }
        warn!("Playback refused by the platform, waiting for a user gesture");
        self.set_status(PlaybackStatus::Paused);
        self.bus
            .broadcast(PlaybackEvent::Notice(Notice::AutoplayBlocked));
    }

    /// Applies the fallback policy to a failure of the live handle.
    fn on_failure(&mut self, error: SessionError) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let retry_count = session.retry_count;
        let interrupted = matches!(
            session.status,
            PlaybackStatus::Playing | PlaybackStatus::Paused
        );
        let strategy = error.kind.strategy();
        let next = session
            .cursor
            .fallback(strategy, session.sources(), &self.settings.formats);

        warn!(
            kind = ?error.kind,
            native_code = ?error.native_code,
            retry_count,
            "Playback failure: {}",
            error.detail
        );

        self.teardown_handle();
        self.set_error(Some(error));
        if interrupted {
            if let Some(session) = self.session.as_mut() {
                session.resume_position = Some(session.position);
            }
        }

        if !self.connectivity.is_online() {
            self.enter_failed();
            return;
        }
        if retry_count >= self.settings.max_retries {
            warn!(max = self.settings.max_retries, "Retry budget exhausted");
            self.bus
                .broadcast(PlaybackEvent::Notice(Notice::RetriesExhausted));
            self.enter_failed();
            return;
        }

        // Nothing left to try uses up the whole budget
        let Some(next) = next else {
            warn!(?strategy, "No source or format left to try");
            if let Some(session) = self.session.as_mut() {
                session.retry_count = self.settings.max_retries;
            }
            self.bus
                .broadcast(PlaybackEvent::Notice(Notice::RetriesExhausted));
            self.enter_failed();
            return;
        };

        if let Some(session) = self.session.as_mut() {
            session.next_cursor = Some(next);
        }
        self.set_status(PlaybackStatus::Stalled);

        let delay = self.settings.delay_for(retry_count);
        let generation = self.retry_timer.arm(self.clock.now(), delay);
        debug!(
            ?strategy,
            source_index = next.source_index,
            format_index = next.format_index,
            delay_ms = delay.as_millis() as u64,
            timer = generation,
            "Retry scheduled"
        );
        self.bus.broadcast(PlaybackEvent::RetryScheduled {
            attempt: retry_count + 1,
            delay,
        });
    }

    fn fail_offline(&mut self) {
        self.teardown_handle();
        self.set_error(Some(SessionError::offline()));
        self.enter_failed();
        self.bus.broadcast(PlaybackEvent::Notice(Notice::Offline));
    }

    /// Stops automatic recovery. Only a manual retry leaves this state.
    fn enter_failed(&mut self) {
        self.retry_timer.cancel();
        self.teardown_handle();
        if let Some(session) = self.session.as_mut() {
            session.next_cursor = None;
        }
        self.set_status(PlaybackStatus::Failed);
    }

    fn play_handle(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            if session.ended {
                session.ended = false;
                session.position = 0.0;
                handle.seek(0.0);
            }
        }
        handle.play();
        self.set_status(PlaybackStatus::Playing);
        self.set_error(None);
    }

    /// Releases the live handle before anything else may be created.
    fn teardown_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!(handle = %handle.id(), "Releasing media handle");
            handle.release();
        }
    }

    fn not_ready(&self) -> CommandOutcome {
        self.bus.broadcast(PlaybackEvent::Notice(Notice::NotReady));
        CommandOutcome::NotReady
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.status == status {
            return;
        }
        debug!(from = %session.status, to = %status, "Playback status changed");
        session.status = status;
        self.bus.broadcast(PlaybackEvent::StatusChanged { status });
    }

    fn set_error(&mut self, error: Option<SessionError>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.last_error == error {
            return;
        }
        session.last_error = error.clone();
        self.bus.broadcast(PlaybackEvent::ErrorChanged { error });
    }
}

impl<B: MediaBackend, C: Clock> Drop for PlaybackController<B, C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
