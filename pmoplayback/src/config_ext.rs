//! Extension de pmoconfig pour le contrôleur de lecture
//!
//! Ce module fournit le trait `PlaybackConfigExt` qui expose les réglages
//! `player.*` de pmoconfig et construit un [`PlayerSettings`] prêt à l'emploi.

use std::time::Duration;

use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use tracing::warn;

use crate::settings::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAYS, DEFAULT_VOLUME, PlayerSettings};
use crate::sources::FormatList;

/// Trait d'extension pour gérer les réglages du lecteur dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmoplayback::{PlaybackConfigExt, PlaybackController, SimulatedBackend};
///
/// let settings = get_config().get_player_settings();
/// let controller = PlaybackController::new(SimulatedBackend::new(), settings)?;
/// ```
pub trait PlaybackConfigExt {
    /// Nombre maximal de tentatives automatiques (défaut : 3)
    fn get_player_max_retries(&self) -> Result<u32>;
    fn set_player_max_retries(&self, retries: u32) -> Result<()>;

    /// Délais entre tentatives (défaut : 2 s, 4 s, 6 s)
    fn get_player_retry_delays(&self) -> Result<Vec<Duration>>;
    fn set_player_retry_delays(&self, delays: &[Duration]) -> Result<()>;

    /// Extensions essayées pour chaque source (défaut : mp3, ogg, wav)
    fn get_player_formats(&self) -> Result<Vec<String>>;
    fn set_player_formats(&self, formats: &[&str]) -> Result<()>;

    /// Volume initial dans [0, 1] (défaut : 0.5)
    fn get_player_default_volume(&self) -> Result<f32>;
    fn set_player_default_volume(&self, volume: f32) -> Result<()>;

    fn get_player_autoplay(&self) -> Result<bool>;
    fn set_player_autoplay(&self, autoplay: bool) -> Result<()>;

    fn get_player_looping(&self) -> Result<bool>;
    fn set_player_looping(&self, looping: bool) -> Result<()>;

    /// Assemble les réglages du lecteur.
    ///
    /// Les valeurs absentes ou invalides sont remplacées par les valeurs
    /// par défaut, avec un avertissement.
    fn get_player_settings(&self) -> PlayerSettings;
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn or_default<T>(name: &str, value: Result<T>, default: T) -> T {
    value.unwrap_or_else(|err| {
        warn!(setting = name, error = %err, "Invalid player setting, using default");
        default
    })
}

impl PlaybackConfigExt for Config {
    fn get_player_max_retries(&self) -> Result<u32> {
        match self.get_value(&["player", "max_retries"]) {
            Ok(value) => as_u64(&value)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("player.max_retries is not a positive integer")),
            Err(_) => Ok(DEFAULT_MAX_RETRIES),
        }
    }

    fn set_player_max_retries(&self, retries: u32) -> Result<()> {
        self.set_value(&["player", "max_retries"], Value::Number(Number::from(retries)))
    }

    fn get_player_retry_delays(&self) -> Result<Vec<Duration>> {
        match self.get_value(&["player", "retry_delays_ms"]) {
            Ok(Value::Sequence(seq)) => seq
                .iter()
                .map(|v| {
                    as_u64(v)
                        .map(Duration::from_millis)
                        .ok_or_else(|| anyhow!("player.retry_delays_ms contains {:?}", v))
                })
                .collect(),
            Ok(other) => Err(anyhow!("player.retry_delays_ms is not a list: {:?}", other)),
            Err(_) => Ok(DEFAULT_RETRY_DELAYS.to_vec()),
        }
    }

    fn set_player_retry_delays(&self, delays: &[Duration]) -> Result<()> {
        let seq = delays
            .iter()
            .map(|d| Value::Number(Number::from(d.as_millis() as u64)))
            .collect();
        self.set_value(&["player", "retry_delays_ms"], Value::Sequence(seq))
    }

    fn get_player_formats(&self) -> Result<Vec<String>> {
        match self.get_value(&["player", "formats"]) {
            Ok(Value::Sequence(seq)) => seq
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(anyhow!("player.formats contains {:?}", other)),
                })
                .collect(),
            Ok(other) => Err(anyhow!("player.formats is not a list: {:?}", other)),
            Err(_) => Ok(vec!["mp3".into(), "ogg".into(), "wav".into()]),
        }
    }

    fn set_player_formats(&self, formats: &[&str]) -> Result<()> {
        let seq = formats
            .iter()
            .map(|f| Value::String(f.to_string()))
            .collect();
        self.set_value(&["player", "formats"], Value::Sequence(seq))
    }

    fn get_player_default_volume(&self) -> Result<f32> {
        match self.get_value(&["player", "default_volume"]) {
            Ok(Value::Number(n)) => n
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| anyhow!("player.default_volume is not a number")),
            Ok(other) => Err(anyhow!("player.default_volume is not a number: {:?}", other)),
            Err(_) => Ok(DEFAULT_VOLUME),
        }
    }

    fn set_player_default_volume(&self, volume: f32) -> Result<()> {
        self.set_value(
            &["player", "default_volume"],
            Value::Number(Number::from(volume as f64)),
        )
    }

    fn get_player_autoplay(&self) -> Result<bool> {
        match self.get_value(&["player", "autoplay"]) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(other) => Err(anyhow!("player.autoplay is not a boolean: {:?}", other)),
            Err(_) => Ok(true),
        }
    }

    fn set_player_autoplay(&self, autoplay: bool) -> Result<()> {
        self.set_value(&["player", "autoplay"], Value::Bool(autoplay))
    }

    fn get_player_looping(&self) -> Result<bool> {
        match self.get_value(&["player", "looping"]) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(other) => Err(anyhow!("player.looping is not a boolean: {:?}", other)),
            Err(_) => Ok(true),
        }
    }

    fn set_player_looping(&self, looping: bool) -> Result<()> {
        self.set_value(&["player", "looping"], Value::Bool(looping))
    }

    fn get_player_settings(&self) -> PlayerSettings {
        let defaults = PlayerSettings::default();

        let formats = self
            .get_player_formats()
            .and_then(|formats| FormatList::new(formats).map_err(anyhow::Error::from));

        let settings = PlayerSettings {
            max_retries: or_default(
                "max_retries",
                self.get_player_max_retries(),
                defaults.max_retries,
            ),
            retry_delays: or_default(
                "retry_delays_ms",
                self.get_player_retry_delays(),
                defaults.retry_delays.clone(),
            ),
            formats: or_default("formats", formats, defaults.formats.clone()),
            default_volume: or_default(
                "default_volume",
                self.get_player_default_volume(),
                defaults.default_volume,
            ),
            autoplay: or_default("autoplay", self.get_player_autoplay(), defaults.autoplay),
            looping: or_default("looping", self.get_player_looping(), defaults.looping),
        };

        match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                warn!(error = %err, "Player settings rejected, using defaults");
                defaults
            }
        }
    }
}
