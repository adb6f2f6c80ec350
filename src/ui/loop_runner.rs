//! The event loop: terminal input, background results, signals and a
//! periodic tick, multiplexed with `tokio::select!`.

use crate::app::{AnalysisState, App, AppEvent, ContentState};
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

use super::events::handle_app_event;
use super::input::handle_input;
use super::render::render;

/// Number of frames in the loading spinner animation.
pub(super) const SPINNER_FRAMES: usize = 10;

const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// What the loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Leave the loop and restore the terminal.
    Quit,
}

/// Raw mode plus alternate screen for as long as the guard lives.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Resolves on SIGINT or SIGTERM. Never resolves off Unix.
#[cfg(unix)]
struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        std::future::pending().await
    }
}

/// Runs the UI until the user quits or a shutdown signal arrives.
///
/// A panic hook restores the terminal before the default hook prints, so a
/// panic never leaves the shell in raw mode. Frames are drawn only when
/// something changed since the last one.
///
/// # Errors
///
/// Terminal setup, drawing and signal registration failures.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        previous_hook(info);
    }));

    let mut signals = ShutdownSignals::install()?;
    let mut guard = TerminalGuard::enter()?;
    let mut keys = EventStream::new();
    let mut ticks = tokio::time::interval(TICK_INTERVAL);

    loop {
        if std::mem::take(&mut app.needs_redraw) {
            guard.terminal.draw(|f| render(f, app))?;
        }
        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Results that already arrived go first so typing never delays them
        while let Ok(event) = event_rx.try_recv() {
            handle_app_event(app, event);
            app.needs_redraw = true;
        }

        tokio::select! {
            biased;

            name = signals.recv() => {
                tracing::info!(signal = name, "Shutting down");
                break;
            }

            terminal_event = keys.next() => match terminal_event {
                Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                    app.needs_redraw = true;
                    if handle_input(app, key.code, key.modifiers, &event_tx) == Action::Quit {
                        break;
                    }
                }
                Some(Ok(Event::Resize(..))) => app.needs_redraw = true,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Terminal input failed");
                    break;
                }
                None => break,
            },

            Some(event) = event_rx.recv() => {
                handle_app_event(app, event);
                app.needs_redraw = true;
            }

            _ = ticks.tick() => advance_spinner(app),
        }
    }

    drop(guard);
    Ok(())
}

/// Animates the spinner while any background work is outstanding.
fn advance_spinner(app: &mut App) {
    let busy = app.is_loading_feeds()
        || matches!(app.content_state, ContentState::Loading { .. })
        || app
            .analyses
            .values()
            .any(|s| matches!(s, AnalysisState::Pending))
        || app.session.chat.awaiting_reply();
    if busy {
        app.spinner_frame = (app.spinner_frame + 1) % SPINNER_FRAMES;
        app.needs_redraw = true;
    }
}
