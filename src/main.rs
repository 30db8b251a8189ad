//! Interactive TUI dashboard for watching hedged HTTP calls.
//!
//! This binary drives a hedged client against a simulated backend (or a real
//! URL from `HEDGE_TARGET_URL`) and shows in real time:
//! - primary vs speculative wins and failure modes
//! - the adaptive wait time and the hedge budget level
//! - batch load with a tunable slow tail
//!
//! Set `HEDGE_LOG_FILE` to capture `tracing` output; the terminal belongs to the UI.

mod app;
mod call;
mod env;
mod ui;

use std::{fs::File, sync::Mutex, time::Duration};

use app::{App, AppEvent};
use call::spawn_hedged_call;
use color_eyre::{eyre::WrapErr, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use env::build_from_env;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use ui::draw_ui;

fn init_logging() -> Result<()> {
    let Ok(path) = std::env::var("HEDGE_LOG_FILE") else {
        return Ok(());
    };

    let file = File::create(&path).wrap_err_with(|| format!("cannot create log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hedged_http_client=debug")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let setup = build_from_env()?;
    let mut app = App::new(setup);

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    ratatui::restore();

    result
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    app.refresh_stats();

    loop {
        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::CallFinished {
                    outcome,
                    latency_ms,
                    message,
                } => {
                    app.set_last_result(outcome, latency_ms, message);
                }
            }
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_run_call() {
            spawn_hedged_call(app, tx.clone());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if crossterm::event::poll(Duration::from_millis(30))? {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char('r') => spawn_hedged_call(app, tx.clone()),
                    KeyCode::Char('b') => app.toggle_batch_mode(),
                    KeyCode::Char('m') => app.toggle_method(),
                    KeyCode::Char('f') => app.toggle_force_hedge(),
                    KeyCode::Char('i') => app.toggle_auto_idempotency(),
                    KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_tail(0.05),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.adjust_tail(-0.05),
                    KeyCode::Char('[') | KeyCode::Char(',') => app.decrease_batch_count(),
                    KeyCode::Char(']') | KeyCode::Char('.') => app.increase_batch_count(),
                    KeyCode::Char('s') => app.reset_stats(),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
