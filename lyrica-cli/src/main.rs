mod commands;
mod render;

use crate::commands::{Command, HELP};
use crate::render::Renderer;
use lyrica_core::{
    AnimationConfig, CoreError, FileSource, LyricaConfig, LyricaLoader, LyricsSettings,
    ModeConfig, SimulatedClock, SourceReader, SyncEngine, Timeline,
    TrackerSettings,
};
use lyrica_source_http::HttpSource;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Playback keeps running this long past the last lyric when the track
/// length is unknown
const TAIL_SECS: f64 = 5.0;

/// How often sync mode checks whether the simulated track has ended
const END_CHECK_INTERVAL: Duration = Duration::from_millis(250);

fn main() {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(lyrica_core::config_path, PathBuf::from);

    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled(&config_path);
    init_tracing(file_logging_enabled);

    // Load config or create template on first run
    let config = match LyricaConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created a config template at {}. Edit it and run lyrica again.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let result = runtime.block_on(run(config, cancel_token));
    // Stdin reads cannot be interrupted; don't wait on them
    runtime.shutdown_timeout(Duration::from_millis(100));

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: LyricaConfig, cancel_token: CancellationToken) -> Result<(), CoreError> {
    let loader = LyricaLoader::new(config.lyrics.clone(), reader_for(&config.lyrics)?);
    let timeline = loader.load().await?;

    match config.mode {
        ModeConfig::Extract => {
            let json = serde_json::to_string_pretty(&timeline.data())?;
            println!("{json}");
        }
        ModeConfig::Print { container } => {
            render::print_all(&timeline, &container, &mut io::stdout().lock())?;
        }
        ModeConfig::Sync {
            clock,
            container,
            tracking,
            animation,
        } => {
            if timeline.is_empty() {
                warn!("Nothing to sync: no timed lyrics in {}", config.lyrics.source);
                return Ok(());
            }
            info!("Syncing {} to clock {}", container, clock);
            let session = SyncSession {
                loader,
                container,
                tracking,
                animation,
            };
            session.run(timeline, cancel_token).await?;
        }
    }
    Ok(())
}

/// Pick the reader for the configured location.
fn reader_for(lyrics: &LyricsSettings) -> Result<Arc<dyn SourceReader>, CoreError> {
    if !lyrics.raw && HttpSource::handles(&lyrics.source) {
        return Ok(Arc::new(HttpSource::new()?));
    }
    Ok(Arc::new(FileSource::default()))
}

struct SyncSession {
    loader: LyricaLoader,
    container: String,
    tracking: TrackerSettings,
    animation: AnimationConfig,
}

impl SyncSession {
    async fn run(self, timeline: Timeline, cancel_token: CancellationToken) -> Result<(), CoreError> {
        let timeline = Arc::new(timeline);
        let media = Arc::new(SimulatedClock::new(track_length(&timeline)));
        let engine = SyncEngine::new(media.clone(), Arc::clone(&timeline), self.tracking);
        let mut renderer = Renderer::new(
            timeline,
            self.animation,
            self.container.as_str(),
            io::stdout(),
        );

        let mut events = engine.subscribe();
        let mut commands = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut end_check = tokio::time::interval(END_CHECK_INTERVAL);

        engine.attach().await;
        media.play();
        info!("Type h and press enter for commands");

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = end_check.tick() => {
                    if media.is_finished() {
                        info!("Reached the end of the track");
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => renderer.handle(&event)?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Renderer skipped {} event(s)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                line = commands.next_line(), if stdin_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(command) => {
                            if let Some(timeline) = self.execute(command, &engine, &media).await? {
                                renderer.replace_timeline(timeline);
                            }
                        }
                        Err(message) => warn!("{message}"),
                    },
                    // Stdin closed; keep playing until the end or Ctrl+C
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read command: {e}");
                        stdin_open = false;
                    }
                },
            }
        }

        media.pause();
        engine.detach().await;
        Ok(())
    }

    /// Run one interactive command. Returns the new timeline after a reload.
    async fn execute(
        &self,
        command: Command,
        engine: &Arc<SyncEngine>,
        media: &SimulatedClock,
    ) -> Result<Option<Arc<Timeline>>, CoreError> {
        let hit = match command {
            Command::Next(distance) => engine.next(distance).await,
            Command::Previous(distance) => engine.previous(distance).await,
            Command::Last => engine.last().await,
            Command::GoTo(target) => engine.go_to(&target).await,
            Command::Current => engine.current().await,
            Command::Find(text) => {
                let hits = engine.search_by_text(&text).await;
                let mut out = io::stdout().lock();
                if hits.is_empty() {
                    writeln!(out, "no line matches {text:?}")?;
                }
                for hit in hits {
                    writeln!(out, "#{} [{}] {}", hit.index, hit.time, hit.text)?;
                }
                return Ok(None);
            }
            Command::Play => {
                media.play();
                return Ok(None);
            }
            Command::Pause => {
                media.pause();
                return Ok(None);
            }
            Command::Reload => {
                let timeline = Arc::new(self.loader.load().await?);
                engine.replace_timeline(Arc::clone(&timeline)).await;
                return Ok(Some(timeline));
            }
            Command::Help => {
                writeln!(io::stdout().lock(), "{HELP}")?;
                return Ok(None);
            }
            Command::Quit => return Ok(None),
        };

        match hit {
            Some(hit) => info!("#{} [{}] {}", hit.index, hit.time, hit.text),
            None => info!("Nothing there"),
        }
        Ok(None)
    }
}

/// Track length for the simulated clock: the `[length:]` tag, else a little
/// past the clock position where the last lyric shows.
#[allow(clippy::cast_precision_loss)]
fn track_length(timeline: &Timeline) -> Option<f64> {
    if let Some(length) = timeline.metadata().length() {
        return Some(length.as_secs_f64());
    }
    let last = timeline.times().last()?;
    let last_ms = i64::try_from(last.as_millis()).unwrap_or(i64::MAX);
    let shown_at_ms = last_ms.saturating_sub(timeline.offset_ms()).max(0);
    Some(shown_at_ms as f64 / 1000.0 + TAIL_SECS)
}

/// Check if file logging is enabled without fully loading config.
fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Lyrics go to stdout; keep logs out of the way on stderr
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    if file_logging_enabled {
        let log_path = lyrica_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
