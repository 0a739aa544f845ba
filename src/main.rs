//! Application entry point: log-voices.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Open the phrase/character store and build providers, cache and the
//!    playback pool.
//! 5. Spawn the synthesis dispatcher and the event listener on the runtime.
//! 6. Open the log tailer (fails fast when there is no log to follow) and
//!    run it on its own thread until it stops.
//! 7. Drain the dispatcher, report its counters and flush the store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use log_voices::{
    bus::{EventBus, EventSubscriber},
    classify::{Event, LineClassifier, SpeechEvent, StateEvent},
    config::{AppConfig, AppPaths, TailMode},
    speech::{
        PlaybackChannelPool, ProviderRegistry, RodioSink, SpeechCache, SynthesisDispatcher,
    },
    store::{CharacterStore, JsonStore},
    tailer::{LogTailer, TailSinks},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "log-voices", version, about = "Speak a game's chat log aloud")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the chat logs; overrides `tailer.log_dir`.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Read the current log from the start instead of only new lines.
    #[arg(long)]
    replay: bool,
}

fn load_config(cli: &Cli, paths: &AppPaths) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None if !paths.settings_file.exists() => {
            let config = AppConfig::default();
            match config.save() {
                Ok(()) => log::info!("Wrote default settings to {}", paths.settings_file.display()),
                Err(e) => log::warn!("Could not write default settings ({e})"),
            }
            config
        }
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    if let Some(dir) = &cli.log_dir {
        config.tailer.log_dir = Some(dir.clone());
    }
    if cli.replay {
        config.tailer.mode = TailMode::Replay;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Event listener
// ---------------------------------------------------------------------------

/// Log notifications from the bus and apply self-reported settings to the
/// logged-in character.
async fn listen(mut events: EventSubscriber, store: Arc<JsonStore>) {
    let mut character: Option<String> = None;

    while let Some(event) = events.next_event().await {
        match event {
            Event::State(StateEvent::CharacterLogin { name }) => {
                log::info!("Character identified: {name}");
                character = Some(name);
            }
            Event::State(StateEvent::LoginNotFound) => {
                log::debug!("Login not found; self-reports ignored until one is seen");
            }
            Event::State(StateEvent::SelfReport { key, value }) => match &character {
                Some(name) => {
                    let store = Arc::clone(&store);
                    let name = name.clone();
                    let applied = tokio::task::spawn_blocking(move || {
                        store
                            .set_attribute(&name, &key, &value)
                            .map_err(|e| format!("could not apply {key}={value} to {name}: {e}"))
                    })
                    .await;
                    match applied {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => log::warn!("Self-report: {e}"),
                        Err(e) => log::warn!("Self-report task failed: {e}"),
                    }
                }
                None => log::warn!("Self-report {key}={value} before login, ignored"),
            },
            Event::State(StateEvent::LevelUp { level }) => log::info!("Level up: {level}"),
            Event::State(StateEvent::TeamChange { name, change }) => {
                log::info!("Team: {name} {change:?}")
            }
            Event::State(StateEvent::PowerRecharged { power }) => {
                log::info!("Recharged: {power}")
            }
            Event::Stat(stat) => log::debug!("{stat:?}"),
            Event::Speech(_) | Event::Unclassified { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let cli = Cli::parse();
    let paths = AppPaths::new();
    let config = load_config(&cli, &paths)?;
    log::info!("log-voices starting up");

    let log_dir = config
        .tailer
        .log_dir
        .clone()
        .context("no log directory configured: pass --log-dir or set tailer.log_dir")?;

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Store, providers, cache, playback
    let store = Arc::new(
        JsonStore::open(&paths.store_file, config.defaults.clone())
            .with_context(|| format!("failed to open {}", paths.store_file.display()))?
            .with_locales(config.speech.locale.clone(), config.speech.source_locale.clone()),
    );
    let providers = ProviderRegistry::from_config(&config.providers);
    if providers.is_empty() {
        log::warn!("No speech providers configured; every utterance will be dropped");
    }
    let cache = SpeechCache::new(config.cache_dir(), config.cache.extension.clone());
    log::info!("Speech cache: {}", cache.root().display());
    let pool = PlaybackChannelPool::from_config(&config.playback, Arc::new(RodioSink));

    let dispatcher = SynthesisDispatcher::new(
        store.clone(),
        store.clone(),
        cache,
        providers,
        pool,
        config.speech.narrator.clone(),
    );

    // 5. Dispatcher + listener
    let (speech_tx, speech_rx) = mpsc::unbounded_channel::<SpeechEvent>();
    let bus = EventBus::new();
    let listener = rt.spawn(listen(bus.subscribe(), Arc::clone(&store)));
    let dispatch = rt.spawn(dispatcher.run(speech_rx));

    // 6. Tailer
    let classifier = LineClassifier::from_config(&config);
    let sinks = TailSinks {
        speech: speech_tx,
        bus,
    };
    let mut tailer = LogTailer::open(&log_dir, &config.tailer, classifier, sinks)?;

    let tail_thread = std::thread::Builder::new()
        .name("log-tailer".into())
        .spawn(move || tailer.run())
        .context("failed to spawn log-tailer thread")?;
    let tail_result = tail_thread
        .join()
        .map_err(|_| anyhow!("log-tailer thread panicked"))?;

    // 7. The tailer owned the only senders; both tasks now wind down.
    let stats = rt.block_on(dispatch).context("dispatcher task failed")?;
    log::info!(
        "Done: {} received, {} played, {} cache hits, {} dropped",
        stats.received,
        stats.played,
        stats.cache_hits,
        stats.dropped
    );
    let _ = rt.block_on(listener);
    store.flush().context("failed to save store")?;

    tail_result?;
    Ok(())
}
