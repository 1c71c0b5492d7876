//! `KafkaChat`: terminal chat over an Apache Kafka topic.
//!
//! Every participant produces to and consumes from one topic. Configuration
//! via CLI flags, environment variables, or a config file
//! (`~/.config/kafkachat/config.toml`).
//!
//! ```bash
//! # Default config file, user from $USER
//! cargo run --bin kafkachat
//!
//! # Explicit config, name and encryption key
//! cargo run --bin kafkachat -- ./kafkachat.toml --user alice \
//!     --key "$(cargo run -q --bin kafkachat-keygen)"
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use kafkachat::app::App;
use kafkachat::chat::{ChatSession, FeedEvent, HistoryLine, Started};
use kafkachat::config::{CliArgs, ClientConfig};
use kafkachat::log::kafka::{KafkaLog, KafkaProducer};
use kafkachat::ui;

#[tokio::main]
async fn main() -> io::Result<ExitCode> {
    let cli = CliArgs::parse();

    // Configuration errors are reported before the terminal is taken over.
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("kafkachat: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(topic = %config.topic, user = %config.user, "kafkachat starting");

    let broker = KafkaLog::new(
        config.kafka.clone(),
        &config.broker_log_level,
        config.chat.delivery_timeout,
    );
    let started = match ChatSession::start(&broker, config.session_options()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "could not start session");
            eprintln!("kafkachat: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, started, &config).await;

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("kafkachat exiting");
    result.map(|()| ExitCode::SUCCESS)
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the terminal).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("kafkachat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop.
///
/// The session leaves the chat when the loop ends, including on terminal errors.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    started: Started<KafkaProducer>,
    config: &ClientConfig,
) -> io::Result<()> {
    let Started {
        session,
        mut feed,
        joined,
    } = started;

    let mut app = App::new(&config.user, &config.topic, session.is_encrypted());
    match joined {
        Ok(echo) => app.push_line(echo),
        Err(e) => app.push_line(HistoryLine::Notice(format!(
            "Could not announce arrival: {e}"
        ))),
    }

    let outcome = event_loop(terminal, &session, &mut app, &mut feed, config).await;
    session.finish(outcome).await
}

/// Draw, drain the feed and handle keys until the user quits.
async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &ChatSession<KafkaProducer>,
    app: &mut App,
    feed: &mut mpsc::Receiver<FeedEvent>,
    config: &ClientConfig,
) -> io::Result<()> {
    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, app))?;

        // Step 2: Drain everything the subscriber has delivered (non-blocking).
        drain_feed(app, feed);

        // Step 3: Poll for terminal input events.
        if event::poll(config.tick)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // Sending waits for the broker to confirm the record.
            if let Some(text) = app.handle_key_event(key) {
                match session.submit(&text).await {
                    Ok(Some(echo)) => {
                        app.push_line(echo);
                        app.clear_input();
                    }
                    Ok(None) => app.clear_input(),
                    Err(e) => {
                        tracing::warn!(error = %e, "send failed");
                        app.push_line(HistoryLine::Notice(format!("Message not sent: {e}")));
                    }
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Apply all pending feed events to the app.
fn drain_feed(app: &mut App, feed: &mut mpsc::Receiver<FeedEvent>) {
    while let Ok(event) = feed.try_recv() {
        app.apply_feed_event(event);
    }
}
