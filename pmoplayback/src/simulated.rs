//! Scriptable in-process media backend.
//!
//! Every URI can be given a queue of load outcomes; unscripted URIs become
//! ready with the default duration. The backend records what the
//! controller asked for so a session can be replayed without any audio
//! device.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::backend::{HandleEvents, MediaBackend, MediaHandle};
use crate::errors::{PlaybackError, Result};
use crate::failure::{FailureKind, SessionError};
use crate::model::{HandleId, MediaEventKind};

const DEFAULT_DURATION_SECS: f64 = 180.0;

/// Outcome of one simulated load.
#[derive(Clone, Debug, PartialEq)]
pub enum SimulatedLoad {
    Ready { duration: Option<f64> },
    Fail(SessionError),
    Stall,
    /// Nothing is reported, the handle stays loading.
    Silent,
}

impl SimulatedLoad {
    pub fn fail(kind: FailureKind) -> Self {
        SimulatedLoad::Fail(SessionError::new(kind))
    }
}

/// Call received by a simulated handle.
#[derive(Clone, Debug, PartialEq)]
pub enum SimulatedCall {
    Play(HandleId),
    Pause(HandleId),
    Seek(HandleId, f64),
    Volume(HandleId, f32),
    Release(HandleId),
}

#[derive(Default)]
struct SimulatedState {
    scripts: HashMap<String, VecDeque<SimulatedLoad>>,
    fail_open: Vec<String>,
    reject_next_play: bool,
    opened: Vec<String>,
    calls: Vec<SimulatedCall>,
    live: HashMap<HandleId, HandleEvents>,
    latest: Option<HandleId>,
}

/// Clones share the same script and journal.
#[derive(Clone)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimulatedState>>,
    default_duration: Option<f64>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState::default())),
            default_duration: Some(DEFAULT_DURATION_SECS),
        }
    }

    /// Duration reported by unscripted loads (`None` for a live stream).
    pub fn with_default_duration(mut self, duration: Option<f64>) -> Self {
        self.default_duration = duration;
        self
    }

    /// Appends one outcome for the next load of `uri`.
    pub fn script(&self, uri: &str, load: SimulatedLoad) -> &Self {
        self.state
            .lock()
            .scripts
            .entry(uri.to_string())
            .or_default()
            .push_back(load);
        self
    }

    /// Appends the same outcome `times` times.
    pub fn script_repeat(&self, uri: &str, load: SimulatedLoad, times: usize) -> &Self {
        for _ in 0..times {
            self.script(uri, load.clone());
        }
        self
    }

    /// Makes `open` itself fail for `uri`.
    pub fn fail_open(&self, uri: &str) -> &Self {
        self.state.lock().fail_open.push(uri.to_string());
        self
    }

    /// The next `play` request is refused like a blocked autoplay.
    pub fn reject_next_play(&self) {
        self.state.lock().reject_next_play = true;
    }

    /// URIs opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    pub fn calls(&self) -> Vec<SimulatedCall> {
        self.state.lock().calls.clone()
    }

    /// Handles created and not released yet.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn latest_handle(&self) -> Option<HandleId> {
        self.state.lock().latest
    }

    /// Emits `kind` on behalf of handle `id`. Released handles stay silent.
    pub fn emit(&self, id: HandleId, kind: MediaEventKind) -> bool {
        let events = self.state.lock().live.get(&id).cloned();
        match events {
            Some(events) => events.emit(kind),
            None => false,
        }
    }

    /// Emits `kind` on the most recently opened handle.
    pub fn emit_latest(&self, kind: MediaEventKind) -> bool {
        match self.latest_handle() {
            Some(id) => self.emit(id, kind),
            None => false,
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for SimulatedBackend {
    type Handle = SimulatedHandle;

    fn open(
        &mut self,
        id: HandleId,
        uri: &str,
        volume: f32,
        events: HandleEvents,
    ) -> Result<SimulatedHandle> {
        let load = {
            let mut state = self.state.lock();
            state.opened.push(uri.to_string());
            if state.fail_open.iter().any(|u| u == uri) {
                return Err(PlaybackError::backend(&format!("cannot open {}", uri)));
            }
            state.calls.push(SimulatedCall::Volume(id, volume));
            state.live.insert(id, events.clone());
            state.latest = Some(id);
            state
                .scripts
                .get_mut(uri)
                .and_then(VecDeque::pop_front)
                .unwrap_or(SimulatedLoad::Ready {
                    duration: self.default_duration,
                })
        };

        trace!(handle = %id, uri = %uri, outcome = ?load, "Simulated load");
        match load {
            SimulatedLoad::Ready { duration } => {
                events.ready(duration);
            }
            SimulatedLoad::Fail(error) => {
                events.error(error);
            }
            SimulatedLoad::Stall => {
                events.emit(MediaEventKind::Stalled);
            }
            SimulatedLoad::Silent => {}
        }

        Ok(SimulatedHandle {
            id,
            state: Arc::clone(&self.state),
            released: false,
        })
    }
}

pub struct SimulatedHandle {
    id: HandleId,
    state: Arc<Mutex<SimulatedState>>,
    released: bool,
}

impl MediaHandle for SimulatedHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&mut self) {
        let rejected = {
            let mut state = self.state.lock();
            state.calls.push(SimulatedCall::Play(self.id));
            std::mem::take(&mut state.reject_next_play)
        };
        if rejected {
            let events = self.state.lock().live.get(&self.id).cloned();
            if let Some(events) = events {
                events.emit(MediaEventKind::PlayRejected);
            }
        }
    }

    fn pause(&mut self) {
        self.state.lock().calls.push(SimulatedCall::Pause(self.id));
    }

    fn set_volume(&mut self, volume: f32) {
        self.state
            .lock()
            .calls
            .push(SimulatedCall::Volume(self.id, volume));
    }

    fn seek(&mut self, position: f64) {
        self.state
            .lock()
            .calls
            .push(SimulatedCall::Seek(self.id, position));
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.state.lock();
        state.live.remove(&self.id);
        state.calls.push(SimulatedCall::Release(self.id));
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        self.release();
    }
}
