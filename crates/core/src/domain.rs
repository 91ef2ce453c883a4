//! Sub-domain descriptors and the rank-grid partitioning of the global mesh.
//!
//! The global `imax × jmax` cell grid is tiled by an `iproc × jproc` process
//! grid, one worker rank per tile. Each rank's [`Domain`] carries its global
//! bounds (widened by the two-cell ghost margin), its interior size, the cell
//! spacing, and the ranks of its four cardinal neighbors. Descriptors are
//! computed once by the coordinating rank and distributed at startup; they
//! never change for the rest of the run.

use serde::{Deserialize, Serialize};

/// Cardinal direction of a neighboring sub-domain or cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    North,
    West,
    South,
}

impl Direction {
    /// All four directions in halo-exchange order.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    /// The direction pointing back at the sender.
    #[must_use]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::North => Direction::South,
            Direction::West => Direction::East,
            Direction::South => Direction::North,
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::East => 0,
            Direction::North => 1,
            Direction::West => 2,
            Direction::South => 3,
        }
    }
}

/// One rank's tile of the global grid, immutable for the whole run.
///
/// `imin..imax` / `jmin..jmax` are global cell bounds including the two-cell
/// ghost margin (`imax - imin == size_x + 2`). Neighbor entries are `None`
/// where the tile touches a global domain boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Global index of the first (ghost) column.
    pub imin: usize,
    /// Global index of the first (ghost) row.
    pub jmin: usize,
    /// Global index one past the last (ghost) column.
    pub imax: usize,
    /// Global index one past the last (ghost) row.
    pub jmax: usize,
    /// Interior cells in x.
    pub size_x: usize,
    /// Interior cells in y.
    pub size_y: usize,
    /// Cell spacing in x.
    pub dx: f64,
    /// Cell spacing in y.
    pub dy: f64,
    /// Neighbor ranks, indexed east, north, west, south.
    pub neighbors: [Option<usize>; 4],
}

impl Domain {
    /// Neighbor rank in `dir`, or `None` at a global boundary.
    #[must_use]
    pub fn neighbor(&self, dir: Direction) -> Option<usize> {
        self.neighbors[dir.index()]
    }
}

/// Compute rank `rank`'s tile of an `imax × jmax` grid split over an
/// `iproc × jproc` process grid.
///
/// Tiles are contiguous, `imax / iproc` cells wide (the last column of the
/// process grid absorbs the remainder) and `jmax / jproc` cells tall (last
/// row likewise). Ranks are numbered row-major: rank `r` sits at process-grid
/// position `(r % iproc, r / iproc)`.
///
/// # Panics
///
/// Panics if the process grid is empty, the rank is out of range, or a tile
/// would have no interior cells.
#[must_use]
pub fn decompose(
    imax: usize,
    jmax: usize,
    iproc: usize,
    jproc: usize,
    dx: f64,
    dy: f64,
    rank: usize,
) -> Domain {
    assert!(iproc > 0 && jproc > 0, "process grid must be non-empty");
    assert!(rank < iproc * jproc, "rank outside the process grid");
    let tile_x = imax / iproc;
    let tile_y = jmax / jproc;
    assert!(tile_x > 0 && tile_y > 0, "tile has no interior cells");

    let col = rank % iproc;
    let row = rank / iproc;

    let imin = col * tile_x;
    let jmin = row * tile_y;
    // The final column/row absorbs the division remainder.
    let i_end = if col == iproc - 1 {
        imax + 2
    } else {
        (col + 1) * tile_x + 2
    };
    let j_end = if row == jproc - 1 {
        jmax + 2
    } else {
        (row + 1) * tile_y + 2
    };

    let east = if col + 1 < iproc { Some(rank + 1) } else { None };
    let west = if col > 0 { Some(rank - 1) } else { None };
    let north = if row + 1 < jproc {
        Some(rank + iproc)
    } else {
        None
    };
    let south = if row > 0 { Some(rank - iproc) } else { None };

    Domain {
        imin,
        jmin,
        imax: i_end,
        jmax: j_end,
        size_x: i_end - imin - 2,
        size_y: j_end - jmin - 2,
        dx,
        dy,
        neighbors: [east, north, west, south],
    }
}
