//! Grid layout: header line, a grid of figure panes, status line.

#![allow(missing_docs)]

/// Below this the dashboard shows a "terminal too small" message instead.
pub const MIN_USABLE_COLS: u16 = 40;
pub const MIN_USABLE_ROWS: u16 = 10;

/// Figures narrower than this collapse the grid to one column.
const MIN_FIGURE_COLS: u16 = 36;

#[must_use]
pub const fn is_terminal_too_small(cols: u16, rows: u16) -> bool {
    cols < MIN_USABLE_COLS || rows < MIN_USABLE_ROWS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneRect {
    pub col: u16,
    pub row: u16,
    pub width: u16,
    pub height: u16,
}

impl PaneRect {
    #[must_use]
    pub const fn new(col: u16, row: u16, width: u16, height: u16) -> Self {
        Self {
            col,
            row,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right(&self) -> u16 {
        self.col + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> u16 {
        self.row + self.height
    }
}

/// Placement plan for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub header: PaneRect,
    /// One rect per figure, row-major, in figure order.
    pub figures: Vec<PaneRect>,
    pub status: PaneRect,
    /// Columns actually used (may be fewer than configured on narrow terminals).
    pub columns: usize,
}

/// Split the terminal into `figure_count` panes, `columns` per row.
#[must_use]
pub fn build_grid_layout(cols: u16, rows: u16, figure_count: usize, columns: usize) -> GridLayout {
    let header = PaneRect::new(0, 0, cols, 1);
    let status = PaneRect::new(0, rows.saturating_sub(1), cols, 1);

    let max_fit = usize::from((cols / MIN_FIGURE_COLS).max(1));
    let columns = columns.clamp(1, max_fit).min(figure_count.max(1));
    let grid_rows = figure_count.div_ceil(columns).max(1);

    let body_top = 1_u16;
    let body_height = rows.saturating_sub(2);
    let cols_u = u16::try_from(columns).unwrap_or(u16::MAX);
    let rows_u = u16::try_from(grid_rows).unwrap_or(u16::MAX);
    let pane_width = cols / cols_u;
    let pane_height = body_height / rows_u;

    let figures = (0..figure_count)
        .map(|idx| {
            let grid_col = u16::try_from(idx % columns).unwrap_or(0);
            let grid_row = u16::try_from(idx / columns).unwrap_or(0);
            // The last column and row absorb the remainder.
            let width = if grid_col + 1 == cols_u {
                cols - pane_width * grid_col
            } else {
                pane_width
            };
            let height = if grid_row + 1 == rows_u {
                body_height - pane_height * grid_row
            } else {
                pane_height
            };
            PaneRect::new(
                pane_width * grid_col,
                body_top + pane_height * grid_row,
                width,
                height,
            )
        })
        .collect();

    GridLayout {
        header,
        figures,
        status,
        columns,
    }
}
