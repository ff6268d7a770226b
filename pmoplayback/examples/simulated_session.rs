//! Session de lecture simulée
//!
//! Cet exemple démontre :
//! - La lecture des réglages du lecteur depuis pmoconfig
//! - Le contrôleur tournant sur son thread (`PlaybackRuntime`)
//! - Les reprises automatiques et le repli de format sur un backend scripté
//! - La perte puis le retour du réseau, suivis d'une reprise manuelle
//!
//! Pour exécuter :
//! ```bash
//! RUST_LOG=pmoplayback=debug cargo run -p pmoplayback --example simulated_session
//! ```

use std::time::Duration;

use pmoconfig::get_config;
use pmoplayback::{
    FailureKind, PlaybackConfigExt, PlaybackEvent, PlaybackRuntime, SimulatedBackend,
    SimulatedLoad, SourceList,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = get_config();

    // Initialiser le logging
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    println!("=== PMOPlayback - Session simulée ===\n");

    let mut settings = config.get_player_settings();
    settings.retry_delays = vec![
        Duration::from_millis(200),
        Duration::from_millis(400),
        Duration::from_millis(600),
    ];
    println!(
        "Réglages : {} tentatives, formats {:?}",
        settings.max_retries,
        config.get_player_formats()?
    );

    // a.mp3 n'est pas supporté, a.ogg subit une coupure réseau puis se charge
    let backend = SimulatedBackend::new();
    backend
        .script("/music/a.mp3", SimulatedLoad::fail(FailureKind::FormatUnsupported))
        .script("/music/a.ogg", SimulatedLoad::fail(FailureKind::Network));

    let mut runtime = PlaybackRuntime::spawn(backend.clone(), settings)?;
    let events = runtime.subscribe();

    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            match &event {
                PlaybackEvent::PositionChanged { .. } => {}
                PlaybackEvent::Disposed => {
                    println!("  ← {:?}", event);
                    break;
                }
                _ => println!("  ← {:?}", event),
            }
        }
    });

    println!("1. Démarrage sur /music/a.mp3, /music/b.mp3");
    runtime.start(SourceList::new(["/music/a.mp3", "/music/b.mp3"])?)?;
    std::thread::sleep(Duration::from_secs(1));

    println!("\n2. Volume à 80 %, puis pause");
    runtime.set_volume(0.8)?;
    runtime.toggle_play_pause()?;
    std::thread::sleep(Duration::from_millis(100));

    println!("\n3. Perte du réseau");
    runtime.set_online(false)?;
    std::thread::sleep(Duration::from_millis(100));

    println!("\n4. Retour du réseau et reprise manuelle");
    runtime.set_online(true)?;
    runtime.manual_retry()?;
    std::thread::sleep(Duration::from_millis(200));

    if let Some(snapshot) = runtime.snapshot() {
        println!("\nÉtat final : {}", snapshot.to_json()?);
    }
    println!("URIs ouvertes : {:?}", backend.opened());

    runtime.shutdown();
    let _ = printer.join();
    Ok(())
}
