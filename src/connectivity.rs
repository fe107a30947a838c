//! Win detection on the triangular board
//!
//! A move wins when the connected component of same-owner tiles around it
//! touches all three board edges at once: the left edge (`col == 0`), the
//! right edge (`col == row`) and the bottom edge (`row == rows - 1`). The
//! component is collected with an iterative flood fill; an explicit stack
//! keeps arbitrarily large boards safe from recursion depth.

use std::collections::{HashMap, HashSet};

use crate::board::TileCoord;

/// Row/col deltas of the six neighbors of a tile: top-left, top-right,
/// left, right, bottom-left, bottom-right.
const NEIGHBOR_DELTAS: [(isize, isize); 6] = [(-1, -1), (-1, 0), (0, -1), (0, 1), (1, 0), (1, 1)];

/// The six neighboring coordinates of `coord`, unfiltered by board bounds
///
/// Out-of-board neighbors simply never appear in the ownership snapshot,
/// so the flood fill skips them without an explicit bounds check.
fn neighbors(coord: TileCoord) -> impl Iterator<Item = TileCoord> {
    NEIGHBOR_DELTAS.into_iter().filter_map(move |(dr, dc)| {
        let row = coord.row.checked_add_signed(dr)?;
        let col = coord.col.checked_add_signed(dc)?;
        Some(TileCoord::new(row, col))
    })
}

/// Decides whether claiming `start` wins the game for its owner
///
/// `owners` is a snapshot of claimed tiles only (unclaimed and selected
/// tiles are absent); `start` must be present in it. The check is pure and
/// deterministic: it flood-fills the same-owner component containing
/// `start` and tests the three-edge condition. Revisiting a tile is a
/// no-op, so cyclic adjacency cannot loop.
pub fn is_winning_move<O: PartialEq>(
    owners: &HashMap<TileCoord, O>,
    rows: usize,
    start: TileCoord,
) -> bool {
    let Some(owner) = owners.get(&start) else {
        return false;
    };

    let mut visited: HashSet<TileCoord> = HashSet::new();
    let mut stack = vec![start];

    while let Some(coord) = stack.pop() {
        if !visited.insert(coord) {
            continue;
        }
        for next in neighbors(coord) {
            if !visited.contains(&next) && owners.get(&next) == Some(owner) {
                stack.push(next);
            }
        }
    }

    let left = visited.iter().any(|c| c.col == 0);
    let right = visited.iter().any(|c| c.col == c.row);
    let bottom = visited.iter().any(|c| c.row + 1 == rows);
    left && right && bottom
}
