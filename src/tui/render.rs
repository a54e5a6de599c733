//! Frame rendering: header, one bordered figure per (phase, group), status line.
//!
//! Everything is queued onto a generic writer so frames can be rendered into
//! a buffer in tests. The caller flushes.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use parking_lot::RwLockReadGuard;

use crate::chart::registry::{ChartGroup, ChartRegistry, Phase};
use crate::chart::series::{Series, SeriesHandle, SeriesStore};
use crate::daemon::scheduler::{TickOutcome, TickStats};
use crate::tui::layout::{PaneRect, build_grid_layout, is_terminal_too_small};
use crate::tui::plot::{Bounds, PlotSeries, format_tick, rasterize};
use crate::tui::theme::{Role, Theme};

/// Inputs for the header and status lines.
#[derive(Debug, Clone, Copy)]
pub struct StatusView<'a> {
    pub source: &'a str,
    pub interval: Duration,
    pub stats: &'a TickStats,
    pub reported_phase: Option<&'a str>,
}

/// Render a full frame.
pub fn render_frame<W: Write>(
    out: &mut W,
    registry: &ChartRegistry,
    store: &SeriesStore,
    status: &StatusView<'_>,
    theme: Theme,
    (cols, rows): (u16, u16),
) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    if is_terminal_too_small(cols, rows) {
        put(out, 0, 0, &format!("terminal too small ({cols}x{rows})"), theme.role(Role::Warning))?;
        return queue!(out, ResetColor);
    }

    let layout = build_grid_layout(cols, rows, registry.figure_count(), registry.columns());
    render_header(out, status, theme, layout.header)?;
    for ((phase, group), rect) in registry.figures().zip(&layout.figures) {
        render_figure(out, phase, group, store, theme, *rect)?;
    }
    render_status(out, status, theme, layout.status)?;
    queue!(out, ResetColor)
}

fn render_header<W: Write>(
    out: &mut W,
    status: &StatusView<'_>,
    theme: Theme,
    rect: PaneRect,
) -> io::Result<()> {
    let phase = status.reported_phase.unwrap_or("-");
    let text = format!(
        " loadgraph v{}  {}  phase: {phase}  every {} ms  [q] quit",
        env!("CARGO_PKG_VERSION"),
        status.source,
        status.interval.as_millis()
    );
    queue!(out, SetAttribute(Attribute::Bold))?;
    put(out, rect.col, rect.row, &fit(&text, rect.width), theme.role(Role::Title))?;
    queue!(out, SetAttribute(Attribute::Reset))
}

/// Redraw only the status line.
pub fn render_status<W: Write>(
    out: &mut W,
    status: &StatusView<'_>,
    theme: Theme,
    rect: PaneRect,
) -> io::Result<()> {
    let (text, role) = status_text(status.stats);
    queue!(out, MoveTo(rect.col, rect.row), Clear(ClearType::CurrentLine))?;
    put(out, rect.col, rect.row, &fit(&text, rect.width), theme.role(role))
}

/// Status line text and its color role.
#[must_use]
pub fn status_text(stats: &TickStats) -> (String, Role) {
    let mut text = format!(
        " ticks {} | applied {} | skipped {} | points {}",
        stats.ticks,
        stats.applied,
        stats.skipped(),
        stats.points_appended
    );
    let role = match &stats.last_outcome {
        None => {
            text.push_str(" | waiting for first tick");
            Role::Muted
        }
        Some(TickOutcome::Applied { phase, points }) => {
            text.push_str(&format!(
                " | last: +{points} points ({phase}) in {} ms",
                stats.last_duration_ms
            ));
            Role::Ok
        }
        Some(TickOutcome::Ignored { phase }) => {
            text.push_str(&format!(" | last: phase {phase:?} not charted"));
            Role::Muted
        }
        Some(TickOutcome::Skipped { message, .. }) => {
            text.push_str(&format!(" | last: skipped, {message}"));
            Role::Warning
        }
    };
    if let Some(at) = stats.last_tick_at {
        text.push_str(&format!(" @ {}", at.format("%H:%M:%S")));
    }
    (text, role)
}

// ──────────────────── figure ────────────────────

fn render_figure<W: Write>(
    out: &mut W,
    phase: &Phase,
    group: &ChartGroup,
    store: &SeriesStore,
    theme: Theme,
    rect: PaneRect,
) -> io::Result<()> {
    if rect.width < 4 || rect.height < 3 {
        return Ok(());
    }
    draw_border(out, &group.title_for(phase), theme, rect)?;

    let inner = PaneRect::new(rect.col + 1, rect.row + 1, rect.width - 2, rect.height - 2);
    // Read guards stay held until the figure is drawn.
    let handles: Vec<Option<SeriesHandle>> = group
        .metrics
        .iter()
        .map(|m| store.handle(phase.as_str(), &m.key))
        .collect();
    let guards: Vec<Option<RwLockReadGuard<'_, Series>>> =
        handles.iter().map(|h| h.as_ref().map(|h| h.read())).collect();
    let empty = Series::default();
    let stored: Vec<&Series> = guards.iter().map(|g| g.as_deref().unwrap_or(&empty)).collect();

    let legend: Vec<(String, Color)> = group
        .metrics
        .iter()
        .zip(&stored)
        .map(|(m, s)| {
            let last = s.last().map_or_else(|| "-".to_string(), |(_, y)| format_tick(y));
            (format!("{} {} {last}", m.marker.glyph(), m.legend), theme.series(m.color))
        })
        .collect();
    let legend_rows = pack_legend(&legend, usize::from(inner.width));

    // ylabel row + x axis row + legend.
    let reserved = 2 + legend_rows.len();
    let canvas_height = usize::from(inner.height).saturating_sub(reserved);
    if canvas_height < 2 {
        let notice = fit("(pane too small)", inner.width);
        return put(out, inner.col, inner.row, &notice, theme.role(Role::Muted));
    }

    put(out, inner.col, inner.row, &fit(&group.ylabel, inner.width), theme.role(Role::Muted))?;

    let series: Vec<PlotSeries<'_>> = group
        .metrics
        .iter()
        .zip(&stored)
        .map(|(m, s)| PlotSeries::from_series(s, m.marker.glyph(), m.color))
        .collect();

    let canvas_top = inner.row + 1;
    let x_axis_row = canvas_top + canvas_height as u16;

    // Gutter for y tick labels; sized before rasterizing so the canvas fits.
    let y_range = Bounds::covering(series.iter().map(|s| s.points()));
    let (top_label, bottom_label) = y_range.map_or_else(
        || (String::new(), String::new()),
        |b| (format_tick(b.y_max), format_tick(b.y_min)),
    );
    let gutter = top_label.chars().count().max(bottom_label.chars().count()) + 1;
    let canvas_width = usize::from(inner.width).saturating_sub(gutter + 1);

    let (canvas, bounds) = rasterize(&series, canvas_width, canvas_height);
    let Some(bounds) = bounds else {
        let msg = "waiting for data";
        let col = inner.col + inner.width.saturating_sub(msg.len() as u16) / 2;
        let row = canvas_top + (canvas_height as u16) / 2;
        put(out, col, row, msg, theme.role(Role::Muted))?;
        return draw_legend(out, &legend_rows, inner.col, x_axis_row + 1, inner.width);
    };

    let axis = theme.role(Role::Axis);
    let canvas_col = inner.col + gutter as u16 + 1;
    for row in 0..canvas_height {
        let screen_row = canvas_top + row as u16;
        let label = if row == 0 {
            top_label.as_str()
        } else if row + 1 == canvas_height {
            bottom_label.as_str()
        } else {
            ""
        };
        put(out, inner.col, screen_row, &format!("{label:>gutter$}│"), axis)?;

        queue!(out, MoveTo(canvas_col, screen_row))?;
        let mut current: Option<Color> = None;
        for cell in canvas.row(row) {
            let (ch, color) = cell.map_or((' ', Color::Reset), |c| (c.ch, theme.series(c.color)));
            if current != Some(color) {
                queue!(out, SetForegroundColor(color))?;
                current = Some(color);
            }
            queue!(out, Print(ch))?;
        }
    }

    let x_min = format_tick(bounds.x_min);
    let x_max = format_tick(bounds.x_max);
    let span = canvas_width.saturating_sub(x_min.chars().count() + x_max.chars().count());
    let xlabel = fit(&group.xlabel, span.saturating_sub(2) as u16);
    let x_axis = format!("{:>gutter$}└{x_min}{xlabel:^span$}{x_max}", "");
    put(out, inner.col, x_axis_row, &fit(&x_axis, inner.width), axis)?;

    draw_legend(out, &legend_rows, inner.col, x_axis_row + 1, inner.width)
}

fn draw_border<W: Write>(out: &mut W, title: &str, theme: Theme, rect: PaneRect) -> io::Result<()> {
    let frame = theme.role(Role::Frame);
    let inner_width = usize::from(rect.width - 2);
    let title = fit(&format!(" {title} "), rect.width.saturating_sub(4));
    let fill = inner_width.saturating_sub(title.chars().count() + 1);

    put(out, rect.col, rect.row, "┌─", frame)?;
    queue!(out, SetAttribute(Attribute::Bold))?;
    put(out, rect.col + 2, rect.row, &title, theme.role(Role::Title))?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    queue!(out, SetForegroundColor(frame), Print(format!("{}┐", "─".repeat(fill))))?;

    for row in rect.row + 1..rect.bottom() - 1 {
        put(out, rect.col, row, "│", frame)?;
        put(out, rect.right() - 1, row, "│", frame)?;
    }
    put(
        out,
        rect.col,
        rect.bottom() - 1,
        &format!("└{}┘", "─".repeat(inner_width)),
        frame,
    )
}

fn draw_legend<W: Write>(
    out: &mut W,
    rows: &[Vec<(String, Color)>],
    col: u16,
    first_row: u16,
    width: u16,
) -> io::Result<()> {
    for (offset, entries) in rows.iter().enumerate() {
        queue!(out, MoveTo(col, first_row + offset as u16))?;
        let mut used = 0_usize;
        for (text, color) in entries {
            let room = usize::from(width).saturating_sub(used);
            let shown = fit(&format!(" {text} "), room as u16);
            used += shown.chars().count();
            queue!(out, SetForegroundColor(*color), Print(shown))?;
        }
    }
    Ok(())
}

/// Greedy packing of legend entries into rows no wider than `width`.
#[must_use]
pub fn pack_legend<T: Clone>(entries: &[(String, T)], width: usize) -> Vec<Vec<(String, T)>> {
    let mut rows: Vec<Vec<(String, T)>> = Vec::new();
    let mut used = 0_usize;
    for entry in entries {
        let len = entry.0.chars().count() + 2;
        match rows.last_mut() {
            Some(row) if used + len <= width => {
                row.push(entry.clone());
                used += len;
            }
            _ => {
                rows.push(vec![entry.clone()]);
                used = len;
            }
        }
    }
    rows
}

// ──────────────────── helpers ────────────────────

fn put<W: Write>(out: &mut W, col: u16, row: u16, text: &str, color: Color) -> io::Result<()> {
    queue!(out, MoveTo(col, row), SetForegroundColor(color), Print(text))
}

/// Truncate to `width` characters, marking the cut with `…`.
#[must_use]
pub fn fit(text: &str, width: u16) -> String {
    let width = usize::from(width);
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(width - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    fn rendered(store: &SeriesStore, stats: &TickStats, size: (u16, u16)) -> String {
        let registry = ChartRegistry::from_config(&Config::default().chart).unwrap();
        let status = StatusView {
            source: "http://localhost:8089/stats/requests",
            interval: Duration::from_millis(1_000),
            stats,
            reported_phase: Some("running"),
        };
        let mut buf = Vec::new();
        render_frame(&mut buf, &registry, store, &status, Theme::resolve(true, false), size).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn default_store() -> SeriesStore {
        let registry = ChartRegistry::from_config(&Config::default().chart).unwrap();
        SeriesStore::from_registry(&registry)
    }

    #[test]
    fn frame_lists_every_figure_title() {
        let out = rendered(&default_store(), &TickStats::default(), (160, 48));
        for title in [
            "Hatching response times",
            "Hatching RPS/Failures",
            "Running response times",
            "Running RPS/Failures",
        ] {
            assert!(out.contains(title), "missing {title}");
        }
        assert!(out.contains("waiting for data"));
        assert!(out.contains("waiting for first tick"));
    }

    #[test]
    fn plotted_series_show_marker_and_legend_value() {
        let mut store = default_store();
        store.append("running", "current_rps", 10.0, 3.0).unwrap();
        store.append("running", "current_rps", 25.0, 4.5).unwrap();
        let out = rendered(&store, &TickStats::default(), (160, 48));
        assert!(out.contains("● current rps 4.50"));
        assert!(out.contains("Requests count"));
        assert!(out.contains("RPS/Failures count"));
    }

    #[test]
    fn tiny_terminal_gets_a_notice() {
        let out = rendered(&default_store(), &TickStats::default(), (20, 5));
        assert!(out.contains("terminal too small"));
        assert!(!out.contains("Running response times"));
    }

    #[test]
    fn status_text_reflects_last_outcome() {
        let mut stats = TickStats {
            ticks: 3,
            applied: 2,
            skipped_transport: 1,
            points_appended: 12,
            ..TickStats::default()
        };
        stats.last_outcome = Some(TickOutcome::Skipped {
            code: "LG-2001".to_string(),
            message: "connection refused".to_string(),
        });
        let (text, role) = status_text(&stats);
        assert!(text.contains("ticks 3"));
        assert!(text.contains("skipped 1"));
        assert!(text.contains("connection refused"));
        assert_eq!(role, Role::Warning);

        stats.last_outcome = Some(TickOutcome::Applied {
            phase: Phase::new("running"),
            points: 6,
        });
        let (text, role) = status_text(&stats);
        assert!(text.contains("+6 points (running)"));
        assert_eq!(role, Role::Ok);
    }

    #[test]
    fn legend_packs_greedily() {
        let entries: Vec<(String, u8)> = vec![
            ("aaaa".to_string(), 0),
            ("bbbb".to_string(), 1),
            ("cccccccc".to_string(), 2),
        ];
        let rows = pack_legend(&entries, 12);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1][0].0, "cccccccc");
    }

    #[test]
    fn fit_truncates_with_ellipsis() {
        assert_eq!(fit("response", 20), "response");
        assert_eq!(fit("response", 5), "resp…");
        assert_eq!(fit("response", 0), "");
    }
}
