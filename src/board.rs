//! Triangular board geometry
//!
//! The board is a triangle of hex tiles: row `r` contains `r + 1` tiles,
//! so a board of `rows` rows holds the triangular number `rows * (rows + 1) / 2`
//! tiles. This module maps triangular `(row, col)` coordinates to dense
//! linear indices and to pixel positions for rendering, and computes how
//! large a board a given question pool can fill. It is pure math with no
//! game state.

use serde::{Deserialize, Serialize};

use crate::constants::board::TILE_SIZE;

/// The triangular number `n * (n + 1) / 2`
pub fn triangular(n: usize) -> usize {
    n * (n + 1) / 2
}

/// The largest `rows` such that `triangular(rows) <= n`
///
/// This determines how many full rows of tiles a pool of `n` questions
/// can fill; leftover questions are simply not dealt.
pub fn triangular_inv(n: usize) -> usize {
    // Integer-only to avoid float edge cases when 8n + 1 is a perfect square.
    let mut rows = 0;
    while triangular(rows + 1) <= n {
        rows += 1;
    }
    rows
}

/// A position on the triangular board
///
/// Valid coordinates satisfy `0 <= col <= row < rows`. The same pair also
/// doubles as a key into the flood-fill adjacency in
/// [`connectivity`](crate::connectivity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Row of the tile, counted from the top of the triangle
    pub row: usize,
    /// Column within the row
    pub col: usize,
}

impl TileCoord {
    /// Creates a coordinate; does not validate against a board size
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Dense linear index of this coordinate: `triangular(row) + col`
    ///
    /// Indices are stable across renders and are what clients send in
    /// tile-click actions.
    pub fn index(self) -> usize {
        triangular(self.row) + self.col
    }

    /// Axial hex coordinates `(q, r)` of this tile
    pub fn axial(self) -> (i64, i64) {
        (self.col as i64 - self.row as i64, self.row as i64)
    }

    /// Pixel center of this tile for pointy-top hexes of [`TILE_SIZE`]
    pub fn center(self) -> (f64, f64) {
        let (q, r) = self.axial();
        let (q, r) = (q as f64, r as f64);
        let sqrt3 = 3.0_f64.sqrt();
        let x = TILE_SIZE * (sqrt3 * q + (sqrt3 * r) / 2.0);
        let y = TILE_SIZE * 1.5 * r;
        (x, y)
    }
}

/// Geometry of one board, defined entirely by its row count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    /// Number of rows in the triangle
    pub rows: usize,
}

impl BoardLayout {
    /// Creates a layout with the given number of rows
    pub fn new(rows: usize) -> Self {
        Self { rows }
    }

    /// The largest board that a pool of `max_tile_count` questions fills
    pub fn from_max_tile_count(max_tile_count: usize) -> Self {
        Self {
            rows: triangular_inv(max_tile_count),
        }
    }

    /// Total number of tiles on the board
    pub fn tile_count(self) -> usize {
        triangular(self.rows)
    }

    /// Whether the coordinate lies on this board
    pub fn contains(self, coord: TileCoord) -> bool {
        coord.row < self.rows && coord.col <= coord.row
    }

    /// Every coordinate of the board, row-major with ascending columns
    ///
    /// This ordering is also the deal order: shuffled questions are
    /// assigned to tiles in exactly this sequence.
    pub fn tiles(self) -> impl Iterator<Item = TileCoord> {
        (0..self.rows).flat_map(|row| (0..=row).map(move |col| TileCoord::new(row, col)))
    }

    /// SVG `viewBox` string that frames the whole board
    pub fn view_box(self) -> String {
        let sqrt3 = 3.0_f64.sqrt();
        let board_width = (sqrt3 * TILE_SIZE * self.rows as f64).ceil();
        let board_height = ((1.5 * (self.rows.saturating_sub(1)) as f64 + 2.0) * TILE_SIZE).ceil();
        let board_min_x = -board_width / 2.0;
        let board_min_y = -TILE_SIZE;
        format!("{board_min_x} {board_min_y} {board_width} {board_height}")
    }
}
