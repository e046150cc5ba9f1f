use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use readalong::cli::{Cli, Commands, ConfigAction, Steps};
use readalong::config::{Config, Settings};
use readalong::document::{RegionId, StaticDocument, Word};
use readalong::playback::{HighlightSink, SimulatedAudioBackend};
use readalong::session::{Activation, SessionController, SessionEvent, SessionStatus};
use readalong::speech::MockSpeechService;
use readalong::speech::service::MOCK_BYTES_PER_SEC;
use readalong::text::chunk;
use std::io::{IsTerminal, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(version = %readalong::version_string(), "starting");

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(max_chars) = cli.max_chars {
        config.chunking.max_chars = max_chars;
    }

    match cli.command {
        Commands::Chunks { input, json } => {
            let text = read_input(input.as_deref())?;
            print_chunks(&text, config.settings().max_chars, json)?;
        }
        Commands::Simulate {
            input,
            mode,
            word_time,
            latency,
            steps,
            after,
            debounce,
        } => {
            let text = read_input(input.as_deref())?;
            let mut settings = config.settings();
            settings.reading_mode = mode.into();
            if let Some(debounce) = debounce {
                settings.debounce = debounce;
            }
            let mock = MockSpeechService::new()
                .with_word_secs(word_time.as_secs_f64())
                .with_delay(latency);
            let run = SimulateRun {
                steps,
                after,
                word_time,
                quiet: cli.quiet,
            };
            simulate(&text, settings, mock, run).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let toml = toml::to_string_pretty(&config).context("failed to render config")?;
                print!("{}", toml);
            }
            ConfigAction::Path => match Config::default_path() {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("could not determine the configuration directory"),
            },
        },
    }

    Ok(())
}

/// Route `tracing` output to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "readalong=debug",
        (false, _) => "readalong=trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("logging disabled: {}", e);
    }
}

/// Load configuration from file, falling back to defaults, then apply env overrides.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            if std::io::stdin().is_terminal() {
                anyhow::bail!("no input file given and stdin is a terminal");
            }
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}

fn print_chunks(text: &str, max_chars: usize, json: bool) -> Result<()> {
    let plans: Vec<_> = paragraphs(text)
        .iter()
        .map(|p| chunk(&p.split_whitespace().collect::<Vec<_>>(), max_chars))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    for (p, chunks) in plans.iter().enumerate() {
        println!("{}", format!("paragraph {}", p + 1).bold());
        for (i, c) in chunks.iter().enumerate() {
            println!(
                "  {:>3} {:>4} chars {:>3} words  {}",
                i.dimmed(),
                c.text.chars().count(),
                c.word_count,
                c.text
            );
        }
    }
    Ok(())
}

/// Prints each highlighted word as it comes, inline.
struct TerminalSink {
    quiet: bool,
}

impl HighlightSink for TerminalSink {
    fn highlight(&mut self, word: &Word) {
        if self.quiet {
            return;
        }
        print!("{} ", word.text.black().on_yellow());
        // A closed stdout only loses the live highlight.
        std::io::stdout().flush().ok();
    }

    fn clear(&mut self) {
        if !self.quiet {
            println!();
        }
    }

    fn name(&self) -> &'static str {
        "terminal"
    }
}

struct SimulateRun {
    steps: Option<Steps>,
    after: Duration,
    word_time: Duration,
    quiet: bool,
}

async fn simulate(
    text: &str,
    settings: Settings,
    mock: MockSpeechService,
    run: SimulateRun,
) -> Result<()> {
    let SimulateRun {
        steps,
        after,
        word_time,
        quiet,
    } = run;
    // A chunk holds at most one word per two characters.
    let roam_chunk_time = word_time.saturating_mul(u32::try_from(settings.max_chars / 2).unwrap_or(u32::MAX));
    let doc = Arc::new(StaticDocument::from_paragraphs(&paragraphs(text)));
    let Some(first) = doc.region_ids().first().copied() else {
        anyhow::bail!("input has no readable text");
    };

    let mut handle = SessionController::spawn(
        settings,
        Arc::new(mock.clone()),
        doc,
        Arc::new(SimulatedAudioBackend::new(MOCK_BYTES_PER_SEC)),
        Box::new(TerminalSink { quiet }),
    );
    let mut events = handle
        .events()
        .context("session event stream already taken")?;

    handle.activate(Activation::region(first)).await?;

    if let Some(Steps(steps)) = steps {
        tokio::time::sleep(after).await;
        for direction in steps {
            let outcome = handle.step(direction).await?;
            tracing::info!(?direction, ?outcome, "roam step");
        }
    }

    let mut roaming = false;
    let reason = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break "interrupted".to_string(),
        };
        match event {
            Some(SessionEvent::Finished) => break "finished".to_string(),
            Some(SessionEvent::Failed { message, fatal: true }) => break message,
            Some(SessionEvent::Failed { message, .. }) => {
                eprintln!("{} {}", "failed:".red(), message);
            }
            Some(SessionEvent::PlaybackBlocked) => handle.resume().await?,
            // Roaming never finishes on its own; stop once its audio is done.
            Some(SessionEvent::StatusChanged(status)) => roaming = status == SessionStatus::Roaming,
            Some(SessionEvent::ChunkStarted { region, chunk }) if roaming => {
                wait_for_roam_chunk(region, chunk, roam_chunk_time).await;
                break "roam chunk played".to_string();
            }
            Some(_) => {}
            None => break "session closed".to_string(),
        }
    };

    handle.shutdown().await?;
    if !quiet {
        let (syntheses, transcriptions) = (mock.synthesis_count(), mock.transcription_count());
        eprintln!(
            "{} {} ({} synthesis, {} transcription requests)",
            "done:".green(),
            reason,
            syntheses,
            transcriptions
        );
    }
    Ok(())
}

/// Roam audio has no completion event; give the chunk time to play out.
async fn wait_for_roam_chunk(region: RegionId, chunk: usize, limit: Duration) {
    tracing::debug!(%region, chunk, ?limit, "waiting for roam chunk");
    tokio::time::sleep(limit).await;
}
