//! Dedicated thread running a [`PlaybackController`].
//!
//! The thread is the single place where the controller is touched: user
//! commands, media events and timer deadlines are multiplexed with
//! `crossbeam_channel::select!` and applied one at a time. Commands are
//! fire-and-forget; the view follows the session through the event bus
//! and [`PlaybackRuntime::snapshot`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::backend::MediaBackend;
use crate::clock::SystemClock;
use crate::controller::PlaybackController;
use crate::errors::{PlaybackError, Result};
use crate::events::PlaybackEventBus;
use crate::model::{PlaybackEvent, SessionSnapshot};
use crate::settings::PlayerSettings;
use crate::sources::SourceList;

/// Upper bound of a wait when no retry is pending.
const IDLE_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug)]
enum RuntimeCommand {
    Start(SourceList),
    TogglePlayPause,
    SetVolume(f32),
    Seek(f64),
    ManualRetry,
    SetOnline(bool),
    Shutdown,
}

pub struct PlaybackRuntime {
    commands: Sender<RuntimeCommand>,
    bus: PlaybackEventBus,
    snapshot: Arc<Mutex<Option<SessionSnapshot>>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackRuntime {
    /// Spawns the controller thread. `backend` is moved into it.
    pub fn spawn<B>(backend: B, settings: PlayerSettings) -> Result<Self>
    where
        B: MediaBackend + Send + 'static,
    {
        settings.validate()?;

        let bus = PlaybackEventBus::new();
        let snapshot = Arc::new(Mutex::new(None));
        let (commands, commands_rx) = unbounded::<RuntimeCommand>();

        let worker = {
            let bus = bus.clone();
            let snapshot = Arc::clone(&snapshot);
            thread::Builder::new()
                .name("playback-controller".into())
                .spawn(move || {
                    match PlaybackController::with_bus(backend, settings, SystemClock, bus) {
                        Ok(controller) => run_controller(controller, commands_rx, snapshot),
                        Err(err) => error!(error = %err, "Unable to build playback controller"),
                    }
                })?
        };

        info!("Playback runtime started");
        Ok(Self {
            commands,
            bus,
            snapshot,
            worker: Some(worker),
        })
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    /// Last state published by the controller thread.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.snapshot.lock().clone()
    }

    pub fn start(&self, sources: SourceList) -> Result<()> {
        self.send(RuntimeCommand::Start(sources))
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(RuntimeCommand::TogglePlayPause)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(RuntimeCommand::SetVolume(volume))
    }

    pub fn seek(&self, fraction: f64) -> Result<()> {
        self.send(RuntimeCommand::Seek(fraction))
    }

    pub fn manual_retry(&self) -> Result<()> {
        self.send(RuntimeCommand::ManualRetry)
    }

    pub fn set_online(&self, online: bool) -> Result<()> {
        self.send(RuntimeCommand::SetOnline(online))
    }

    /// Disposes the controller and waits for the thread to exit.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.commands.send(RuntimeCommand::Shutdown);
        if worker.join().is_err() {
            error!("Playback controller thread panicked");
        }
        info!("Playback runtime stopped");
    }

    fn send(&self, command: RuntimeCommand) -> Result<()> {
        if self.worker.is_none() {
            return Err(PlaybackError::RuntimeStopped);
        }
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::RuntimeStopped)
    }
}

impl Drop for PlaybackRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_controller<B: MediaBackend>(
    mut controller: PlaybackController<B, SystemClock>,
    commands: Receiver<RuntimeCommand>,
    snapshot: Arc<Mutex<Option<SessionSnapshot>>>,
) {
    let media_events = controller.media_events();

    loop {
        let timeout = controller
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT);

        select! {
            recv(commands) -> msg => match msg {
                Ok(RuntimeCommand::Shutdown) | Err(_) => break,
                Ok(command) => apply_command(&mut controller, command),
            },
            recv(media_events) -> msg => {
                if let Ok(event) = msg {
                    controller.handle_media_event(event);
                }
            },
            default(timeout) => {},
        }

        controller.poll_timers();
        *snapshot.lock() = controller.snapshot();
    }

    controller.dispose();
    *snapshot.lock() = None;
}

fn apply_command<B: MediaBackend>(
    controller: &mut PlaybackController<B, SystemClock>,
    command: RuntimeCommand,
) {
    debug!(?command, "Runtime command");
    match command {
        RuntimeCommand::Start(sources) => controller.start(sources),
        RuntimeCommand::TogglePlayPause => {
            controller.toggle_play_pause();
        }
        RuntimeCommand::SetVolume(volume) => {
            controller.set_volume(volume);
        }
        RuntimeCommand::Seek(fraction) => {
            controller.seek(fraction);
        }
        RuntimeCommand::ManualRetry => {
            controller.manual_retry();
        }
        RuntimeCommand::SetOnline(online) => controller.set_online(online),
        RuntimeCommand::Shutdown => {}
    }
}
