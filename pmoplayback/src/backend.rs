//! Abstraction of the audio playback primitive driven by the controller.
//!
//! A [`MediaBackend`] creates [`MediaHandle`]s, one per `(source, format)`
//! attempt. Outcomes are never returned synchronously: the handle reports
//! them through the [`HandleEvents`] it was created with, and the
//! controller processes them later, in emission order.

use crossbeam_channel::Sender;

use crate::errors::Result;
use crate::failure::SessionError;
use crate::model::{HandleId, MediaEvent, MediaEventKind};

/// Event sender bound to a single handle.
#[derive(Clone, Debug)]
pub struct HandleEvents {
    id: HandleId,
    tx: Sender<MediaEvent>,
}

impl HandleEvents {
    pub(crate) fn new(id: HandleId, tx: Sender<MediaEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Queues an event for the controller. Returns false once the
    /// controller is gone.
    pub fn emit(&self, kind: MediaEventKind) -> bool {
        self.tx
            .send(MediaEvent {
                handle: self.id,
                kind,
            })
            .is_ok()
    }

    pub fn ready(&self, duration: Option<f64>) -> bool {
        self.emit(MediaEventKind::Ready { duration })
    }

    pub fn error(&self, error: SessionError) -> bool {
        self.emit(MediaEventKind::Error(error))
    }
}

/// Factory of media handles.
pub trait MediaBackend {
    type Handle: MediaHandle;

    /// Starts loading `uri` asynchronously. An `Err` means no handle could be
    /// created at all; load failures are reported through `events`.
    fn open(
        &mut self,
        id: HandleId,
        uri: &str,
        volume: f32,
        events: HandleEvents,
    ) -> Result<Self::Handle>;
}

/// One live playback primitive.
pub trait MediaHandle {
    fn id(&self) -> HandleId;

    /// Requests playback. Refusal is reported as [`MediaEventKind::PlayRejected`].
    fn play(&mut self);

    fn pause(&mut self);

    /// `volume` is already clamped to [0, 1].
    fn set_volume(&mut self, volume: f32);

    /// Moves to `position` seconds.
    fn seek(&mut self, position: f64);

    /// Stops loading/playback and detaches the event sender. Must be
    /// idempotent; no event may be emitted afterwards.
    fn release(&mut self);
}
