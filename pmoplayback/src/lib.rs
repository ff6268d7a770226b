//! # pmoplayback - Contrôleur de lecture tolérant aux pannes
//!
//! Cette crate pilote la lecture d'une piste audio au-dessus d'un
//! « media handle » fourni par un backend, et se charge de la reprise :
//! - Machine à états `Idle → Loading → Playing ⇄ Paused`, avec `Stalled`
//!   pendant une reprise et `Failed` quand elle est abandonnée
//! - Reprises automatiques bornées (3 par défaut, après 2 s, 4 s puis 6 s)
//! - Repli sur un autre format (`.mp3 → .ogg → .wav`) ou une autre source
//!   selon la nature de l'échec
//! - Prise en compte de la connectivité réseau
//! - Un seul handle vivant à la fois, les événements des anciens handles
//!   sont ignorés
//!
//! # Architecture
//!
//! - **PlaybackController** : la machine à états, synchrone et déterministe
//! - **PlaybackRuntime** : un thread dédié qui fait tourner le contrôleur
//! - **MediaBackend / MediaHandle** : l'abstraction du moteur audio
//! - **SimulatedBackend** : un backend scriptable, sans périphérique audio
//! - **PlaybackEventBus** : diffusion des changements d'état vers la vue
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmoplayback::{PlaybackController, PlayerSettings, SimulatedBackend, SourceList};
//!
//! # fn main() -> pmoplayback::Result<()> {
//! let mut controller = PlaybackController::new(SimulatedBackend::new(), PlayerSettings::default())?;
//! let events = controller.subscribe();
//!
//! controller.start(SourceList::new(["/music/a.mp3", "/music/b.mp3"])?);
//! controller.process_pending_events();
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod clock;
mod connectivity;
mod controller;
mod errors;
mod events;
mod failure;
mod model;
mod retry_timer;
mod runtime;
mod session;
mod settings;
mod simulated;
mod sources;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use backend::{HandleEvents, MediaBackend, MediaHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connectivity::{Connectivity, ConnectivityState};
pub use controller::PlaybackController;
pub use errors::{PlaybackError, Result};
pub use events::PlaybackEventBus;
pub use failure::{FailureKind, FallbackStrategy, SessionError};
pub use model::{
    CommandOutcome, HandleId, MediaEvent, MediaEventKind, Notice, PlaybackEvent, PlaybackStatus,
    SessionSnapshot,
};
pub use retry_timer::RetryTimer;
pub use runtime::PlaybackRuntime;
pub use session::PlaybackSession;
pub use settings::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAYS, DEFAULT_VOLUME, PlayerSettings};
pub use simulated::{SimulatedBackend, SimulatedCall, SimulatedHandle, SimulatedLoad};
pub use sources::{
    FormatList, SourceCursor, SourceList, StaticTrackSource, TrackSource, pick_random,
};

#[cfg(feature = "pmoconfig")]
pub use config_ext::PlaybackConfigExt;
