//! Character-cell rasterization of (x, y) series.
//!
//! Pure: no terminal access. Each series is drawn in two passes, connecting
//! line first and marker glyphs on top, both from the same borrowed x/y
//! slices. Callers hold the series read lock for the duration of a draw.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::chart::registry::ChartColor;
use crate::chart::series::Series;

/// Glyph used for the segments between two markers.
pub const LINE_GLYPH: char = '·';

/// Data range mapped onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Range covering every point. The y range always includes zero.
    #[must_use]
    pub fn covering<I, P>(series: I) -> Option<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoIterator<Item = (f64, f64)>,
    {
        let mut bounds: Option<Self> = None;
        for (x, y) in series.into_iter().flatten() {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let b = bounds.get_or_insert(Self {
                x_min: x,
                x_max: x,
                y_min: y.min(0.0),
                y_max: y.max(0.0),
            });
            b.x_min = b.x_min.min(x);
            b.x_max = b.x_max.max(x);
            b.y_min = b.y_min.min(y);
            b.y_max = b.y_max.max(y);
        }
        bounds.map(|mut b| {
            if b.x_max <= b.x_min {
                b.x_max = b.x_min + 1.0;
            }
            if b.y_max <= b.y_min {
                b.y_max = b.y_min + 1.0;
            }
            b
        })
    }

    /// Cell (column, row) for a point; row 0 is the top.
    #[must_use]
    pub fn project(&self, x: f64, y: f64, width: usize, height: usize) -> (usize, usize) {
        let fx = ((x - self.x_min) / (self.x_max - self.x_min)).clamp(0.0, 1.0);
        let fy = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        let col = (fx * width.saturating_sub(1) as f64).round() as usize;
        let row_from_bottom = (fy * height.saturating_sub(1) as f64).round() as usize;
        (col, height.saturating_sub(1) - row_from_bottom)
    }
}

/// One series to draw, borrowing its coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PlotSeries<'a> {
    pub glyph: char,
    pub color: ChartColor,
    pub xs: &'a [f64],
    pub ys: &'a [f64],
}

impl<'a> PlotSeries<'a> {
    #[must_use]
    pub fn from_series(series: &'a Series, glyph: char, color: ChartColor) -> Self {
        Self {
            glyph,
            color,
            xs: series.xs(),
            ys: series.ys(),
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + 'a {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    fn finite_points(&self) -> impl Iterator<Item = (f64, f64)> + 'a {
        self.points().filter(|(x, y)| x.is_finite() && y.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub color: ChartColor,
}

/// Fixed-size grid of optional cells.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    cells: Vec<Option<Cell>>,
}

impl Canvas {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width * height],
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<Cell> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.cells[row * self.width + col]
    }

    fn set(&mut self, col: usize, row: usize, cell: Cell, overwrite_marker: bool) {
        if col >= self.width || row >= self.height {
            return;
        }
        let slot = &mut self.cells[row * self.width + col];
        let occupied_by_marker = slot.is_some_and(|c| c.ch != LINE_GLYPH);
        if overwrite_marker || !occupied_by_marker {
            *slot = Some(cell);
        }
    }

    /// Row cells, left to right.
    pub fn row(&self, row: usize) -> impl Iterator<Item = Option<Cell>> + '_ {
        let start = row.min(self.height) * self.width;
        let end = (row + 1).min(self.height) * self.width;
        self.cells[start..end.max(start)].iter().copied()
    }

    /// Plain-text rendering of one row, for tests and no-color output.
    #[must_use]
    pub fn row_text(&self, row: usize) -> String {
        self.row(row).map(|c| c.map_or(' ', |c| c.ch)).collect()
    }
}

/// Draw every series onto a `width` × `height` canvas.
#[must_use]
pub fn rasterize(series: &[PlotSeries<'_>], width: usize, height: usize) -> (Canvas, Option<Bounds>) {
    let mut canvas = Canvas::new(width, height);
    if width == 0 || height == 0 {
        return (canvas, None);
    }
    let Some(bounds) = Bounds::covering(series.iter().map(|s| s.points())) else {
        return (canvas, None);
    };

    for s in series {
        let cells: Vec<(usize, usize)> = s
            .finite_points()
            .map(|(x, y)| bounds.project(x, y, width, height))
            .collect();
        let line = Cell {
            ch: LINE_GLYPH,
            color: s.color,
        };
        for pair in cells.windows(2) {
            for (col, row) in segment(pair[0], pair[1]) {
                canvas.set(col, row, line, false);
            }
        }
    }

    for s in series {
        let marker = Cell {
            ch: s.glyph,
            color: s.color,
        };
        for (x, y) in s.finite_points() {
            let (col, row) = bounds.project(x, y, width, height);
            canvas.set(col, row, marker, true);
        }
    }

    (canvas, Some(bounds))
}

/// Bresenham cells strictly between two endpoints.
fn segment(from: (usize, usize), to: (usize, usize)) -> Vec<(usize, usize)> {
    let (mut x0, mut y0) = (from.0 as i64, from.1 as i64);
    let (x1, y1) = (to.0 as i64, to.1 as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut out = Vec::new();
    loop {
        if (x0, y0) == (x1, y1) {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
        if (x0, y0) != (x1, y1) {
            out.push((x0 as usize, y0 as usize));
        }
    }
    out
}

/// Compact axis label: `950`, `1.5k`, `12k`, `2.5M`, `0.25`.
#[must_use]
pub fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 10_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else if abs >= 10.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}
