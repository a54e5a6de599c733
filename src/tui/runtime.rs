//! Dashboard runtime: one cooperative loop for ticks, keys and redraws.
//!
//! Keyboard polling waits at most until the next tick is due. A tick marks
//! the series it touched through [`DirtyTracker`]; the figures are redrawn
//! only when something is dirty or the terminal was resized, while the status
//! line is refreshed after every tick.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::errors::{LgError, Result};
use crate::daemon::scheduler::{DirtyTracker, Ticker, UpdateScheduler};
use crate::monitor::fetcher::StatsSource;
use crate::tui::layout::PaneRect;
use crate::tui::render::{StatusView, render_frame, render_status};
use crate::tui::terminal_guard::TerminalGuard;
use crate::tui::theme::Theme;

/// Longest single wait for terminal input.
const POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct DashboardRuntimeConfig {
    pub interval: Duration,
    pub theme: Theme,
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Redraw,
    /// Run a tick now instead of waiting for the ticker.
    TickNow,
}

/// Why the dashboard loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    UserQuit,
    Signal,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserQuit => "user quit",
            Self::Signal => "signal",
        }
    }
}

#[must_use]
pub fn action_for(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char('r') => Some(KeyAction::Redraw),
        KeyCode::Char(' ') => Some(KeyAction::TickNow),
        _ => None,
    }
}

/// Run the live dashboard until the user quits or `should_stop` turns true.
///
/// Only a non-recoverable tick error or a terminal I/O failure ends the loop
/// with `Err`.
pub fn run_dashboard<S, F>(
    scheduler: &mut UpdateScheduler<S>,
    config: &DashboardRuntimeConfig,
    should_stop: F,
) -> Result<StopReason>
where
    S: StatsSource,
    F: Fn() -> bool,
{
    let _guard = TerminalGuard::new().map_err(terminal_error)?;
    let mut stdout = io::stdout();
    let source = scheduler.source().describe();

    let mut ticker = Ticker::new(config.interval);
    let mut dirty = DirtyTracker::default();
    let mut size = TerminalGuard::terminal_size();
    let mut full_redraw = true;
    let mut status_redraw = false;

    loop {
        if should_stop() {
            return Ok(StopReason::Signal);
        }

        if full_redraw || dirty.is_dirty() || status_redraw {
            let status = StatusView {
                source: &source,
                interval: config.interval,
                stats: scheduler.stats(),
                reported_phase: scheduler.reported_phase(),
            };
            if full_redraw || dirty.is_dirty() {
                render_frame(
                    &mut stdout,
                    scheduler.registry(),
                    scheduler.store(),
                    &status,
                    config.theme,
                    size,
                )
                .map_err(terminal_error)?;
                dirty.take();
            } else {
                let rect = PaneRect::new(0, size.1.saturating_sub(1), size.0, 1);
                render_status(&mut stdout, &status, config.theme, rect).map_err(terminal_error)?;
            }
            stdout.flush().map_err(terminal_error)?;
            full_redraw = false;
            status_redraw = false;
        }

        let wait = ticker.until_due(Instant::now()).min(POLL_SLICE);
        let mut tick_now = false;
        if event::poll(wait).map_err(terminal_error)? {
            match event::read().map_err(terminal_error)? {
                Event::Key(key) => match action_for(&key) {
                    Some(KeyAction::Quit) => return Ok(StopReason::UserQuit),
                    Some(KeyAction::Redraw) => full_redraw = true,
                    Some(KeyAction::TickNow) => tick_now = true,
                    None => {}
                },
                Event::Resize(cols, rows) => {
                    size = (cols, rows);
                    full_redraw = true;
                }
                _ => {}
            }
        }

        let now = Instant::now();
        if ticker.fire(now) || tick_now {
            if tick_now {
                ticker = Ticker::starting_at(config.interval, now + config.interval);
            }
            scheduler.tick(&mut dirty)?;
            status_redraw = true;
        }
    }
}

fn terminal_error(err: io::Error) -> LgError {
    LgError::Runtime {
        details: format!("terminal: {err}"),
    }
}
