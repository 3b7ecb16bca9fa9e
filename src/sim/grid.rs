//! Peg layout and the uniform spatial grid used for ball-peg queries
//!
//! Pegs never move during a session, so the grid is built once per board
//! size and only read afterwards. A ball only tests the pegs in its own cell
//! and the eight surrounding cells.

use glam::Vec2;

use super::state::{Board, Peg};
use crate::consts::*;

/// Honeycomb peg layout: alternating 11/10 pegs per row, centred on the board
pub fn layout_pegs(board: &Board) -> Vec<Peg> {
    let mut pegs = Vec::with_capacity(PEG_ROWS * PEG_COLS_EVEN);
    for row in 0..PEG_ROWS {
        let cols = if row % 2 == 0 { PEG_COLS_EVEN } else { PEG_COLS_ODD };
        let row_width = (cols - 1) as f32 * PEG_SPACING_X;
        let start_x = (board.width - row_width) / 2.0;
        let y = PEG_TOP + row as f32 * PEG_SPACING_Y;

        for col in 0..cols {
            pegs.push(Peg::new(Vec2::new(start_x + col as f32 * PEG_SPACING_X, y)));
        }
    }
    pegs
}

/// Upper bound on cells per axis, for absurd board sizes
const MAX_GRID_CELLS: f32 = 1024.0;

/// Uniform bucket grid over peg indices
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid {
    cell_size: f32,
    cols: i32,
    rows: i32,
    /// Row-major buckets of indices into the peg list
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Bucket every peg that falls inside the board's cell extents
    pub fn build(board: &Board, pegs: &[Peg], cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { GRID_CELL_SIZE };
        let cols = (board.width / cell_size).ceil().clamp(1.0, MAX_GRID_CELLS) as i32;
        let rows = (board.height / cell_size).ceil().clamp(1.0, MAX_GRID_CELLS) as i32;

        let mut grid = Self {
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); (cols * rows) as usize],
        };

        for (idx, peg) in pegs.iter().enumerate() {
            let (cx, cy) = grid.cell_coords(peg.pos);
            if let Some(slot) = grid.cell_index(cx, cy) {
                grid.cells[slot].push(idx);
            }
        }
        grid
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// (cols, rows)
    pub fn dimensions(&self) -> (i32, i32) {
        (self.cols, self.rows)
    }

    /// `floor(coordinate / cell_size)` on both axes
    pub fn cell_coords(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_index(&self, cx: i32, cy: i32) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.cols || cy >= self.rows {
            return None;
        }
        Some((cy * self.cols + cx) as usize)
    }

    /// Peg indices in the 3x3 neighbourhood around `pos`
    pub fn candidates(&self, pos: Vec2) -> impl Iterator<Item = usize> + '_ {
        let (gx, gy) = self.cell_coords(pos);
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (gx.saturating_add(dx), gy.saturating_add(dy))))
            .filter_map(move |(cx, cy)| self.cell_index(cx, cy))
            .flat_map(move |slot| self.cells[slot].iter().copied())
    }

    /// Pegs whose centre lies closer than `range` to `pos`
    pub fn pegs_in_range(&self, pos: Vec2, range: f32, pegs: &[Peg]) -> Vec<usize> {
        self.candidates(pos)
            .filter(|&idx| pegs.get(idx).is_some_and(|peg| peg.pos.distance_squared(pos) < range * range))
            .collect()
    }

    /// Total indexed pegs
    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
