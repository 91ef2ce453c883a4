//! Boundary conditions on the staggered grid.
//!
//! Each [`Boundary`] variant owns the cells sharing one physical condition
//! and constrains the fields on them by reflecting across the face toward
//! each fluid neighbor. Velocity and temperature are applied once per
//! timestep after the velocity correction; pressure is re-applied before
//! every relaxation sweep so the solver always sees current boundary values.
//!
//! The free-surface condition lives in [`FreeSurfaceBoundary`]: its cell set
//! changes every timestep as particles reclassify the grid, so it is kept
//! apart from the fixed boundary set.

use rustc_hash::FxHashMap;

use crate::domain::Direction;
use crate::fields::Fields;
use crate::grid::{CellType, Grid};

/// Prescribed values shared by the whole boundary set.
#[derive(Debug, Clone, Default)]
pub struct BoundaryConditions {
    /// Tangential speed of moving walls.
    pub wall_velocity: f64,
    /// Inlet x-velocity.
    pub u_in: f64,
    /// Inlet y-velocity.
    pub v_in: f64,
    /// Held wall temperatures keyed by wall id; absent ids are adiabatic.
    pub wall_temps: Option<FxHashMap<u8, f64>>,
}

/// One physical boundary condition and the cells it owns.
#[derive(Debug, Clone)]
pub enum Boundary {
    /// Tangential velocity prescribed, normal velocity zero.
    MovingWall {
        cells: Vec<(usize, usize)>,
        wall_velocity: f64,
    },
    /// Both velocity components prescribed.
    Inlet {
        cells: Vec<(usize, usize)>,
        u_in: f64,
        v_in: f64,
    },
    /// Zero-gradient velocity, pressure pinned to zero.
    Outlet { cells: Vec<(usize, usize)> },
    /// No-slip; optionally holds a per-wall-id temperature.
    FixedWall {
        cells: Vec<(usize, usize)>,
        wall_temps: Option<FxHashMap<u8, f64>>,
    },
    /// No-slip with zero-gradient temperature.
    Adiabatic { cells: Vec<(usize, usize)> },
    /// Zero normal velocity, zero-gradient tangential velocity.
    FreeSlip { cells: Vec<(usize, usize)> },
}

/// Build one boundary object per condition type present in the grid,
/// in application order.
#[must_use]
pub fn build_all(grid: &Grid, conditions: &BoundaryConditions) -> Vec<Boundary> {
    let mut boundaries = Vec::new();
    if !grid.moving_wall_cells().is_empty() {
        boundaries.push(Boundary::MovingWall {
            cells: grid.moving_wall_cells().to_vec(),
            wall_velocity: conditions.wall_velocity,
        });
    }
    if !grid.inlet_cells().is_empty() {
        boundaries.push(Boundary::Inlet {
            cells: grid.inlet_cells().to_vec(),
            u_in: conditions.u_in,
            v_in: conditions.v_in,
        });
    }
    if !grid.outlet_cells().is_empty() {
        boundaries.push(Boundary::Outlet {
            cells: grid.outlet_cells().to_vec(),
        });
    }
    if !grid.fixed_wall_cells().is_empty() {
        boundaries.push(Boundary::FixedWall {
            cells: grid.fixed_wall_cells().to_vec(),
            wall_temps: conditions.wall_temps.clone(),
        });
    }
    if !grid.adiabatic_cells().is_empty() {
        boundaries.push(Boundary::Adiabatic {
            cells: grid.adiabatic_cells().to_vec(),
        });
    }
    if !grid.free_slip_cells().is_empty() {
        boundaries.push(Boundary::FreeSlip {
            cells: grid.free_slip_cells().to_vec(),
        });
    }
    boundaries
}

fn fluid_dirs(grid: &Grid, i: usize, j: usize) -> impl Iterator<Item = Direction> + '_ {
    Direction::ALL.into_iter().filter(move |&dir| {
        grid.neighbor_type(i, j, dir)
            .is_some_and(CellType::is_fluid)
    })
}

impl Boundary {
    /// Constrain velocity (and temperature where applicable) on the owned
    /// cells.
    pub fn apply(&self, fields: &mut Fields, grid: &Grid) {
        match self {
            Self::MovingWall {
                cells,
                wall_velocity,
            } => {
                for &(i, j) in cells {
                    for dir in fluid_dirs(grid, i, j) {
                        apply_moving_wall(fields, i, j, dir, *wall_velocity);
                    }
                }
            }
            Self::Inlet { cells, u_in, v_in } => {
                for &(i, j) in cells {
                    for dir in fluid_dirs(grid, i, j) {
                        apply_inlet(fields, i, j, dir, *u_in, *v_in);
                    }
                }
            }
            Self::Outlet { cells } => {
                for &(i, j) in cells {
                    for dir in fluid_dirs(grid, i, j) {
                        apply_outlet(fields, i, j, dir);
                    }
                }
            }
            Self::FixedWall { cells, wall_temps } => {
                for &(i, j) in cells {
                    let held = wall_temps.as_ref().and_then(|temps| {
                        match grid.cell_type(i, j) {
                            CellType::FixedWall(id) => temps.get(&id).copied(),
                            _ => None,
                        }
                    });
                    for dir in fluid_dirs(grid, i, j) {
                        apply_no_slip(fields, i, j, dir);
                        apply_temperature(fields, i, j, dir, held);
                    }
                }
            }
            Self::Adiabatic { cells } => {
                for &(i, j) in cells {
                    for dir in fluid_dirs(grid, i, j) {
                        apply_no_slip(fields, i, j, dir);
                        apply_temperature(fields, i, j, dir, None);
                    }
                }
            }
            Self::FreeSlip { cells } => {
                for &(i, j) in cells {
                    for dir in fluid_dirs(grid, i, j) {
                        apply_free_slip(fields, i, j, dir);
                    }
                }
            }
        }
    }

    /// Constrain pressure on the owned cells. Walls take the zero-gradient
    /// value (averaged over fluid neighbors at corners); outlets are pinned
    /// to zero.
    pub fn apply_pressure(&self, fields: &mut Fields, grid: &Grid) {
        let cells = match self {
            Self::Outlet { cells } => {
                for &(i, j) in cells {
                    fields.set_p(i, j, 0.0);
                }
                return;
            }
            Self::MovingWall { cells, .. }
            | Self::Inlet { cells, .. }
            | Self::FixedWall { cells, .. }
            | Self::Adiabatic { cells }
            | Self::FreeSlip { cells } => cells,
        };
        for &(i, j) in cells {
            let mut sum = 0.0;
            let mut count = 0usize;
            for dir in fluid_dirs(grid, i, j) {
                let (ni, nj) = offset(i, j, dir);
                sum += fields.p(ni, nj);
                count += 1;
            }
            if count > 0 {
                fields.set_p(i, j, sum / count as f64);
            }
        }
    }
}

fn offset(i: usize, j: usize, dir: Direction) -> (usize, usize) {
    match dir {
        Direction::East => (i + 1, j),
        Direction::North => (i, j + 1),
        Direction::West => (i - 1, j),
        Direction::South => (i, j - 1),
    }
}

/// No-slip reflection: the face-normal velocity on the wall is zero, the
/// tangential ghost value mirrors the interior with flipped sign so the
/// interpolated wall velocity vanishes.
fn apply_no_slip(fields: &mut Fields, i: usize, j: usize, dir: Direction) {
    match dir {
        Direction::East => {
            fields.set_u(i, j, 0.0);
            fields.set_v(i, j, -fields.v(i + 1, j));
        }
        Direction::North => {
            fields.set_v(i, j, 0.0);
            fields.set_u(i, j, -fields.u(i, j + 1));
        }
        Direction::West => {
            fields.set_u(i - 1, j, 0.0);
            fields.set_v(i, j, -fields.v(i - 1, j));
        }
        Direction::South => {
            fields.set_v(i, j - 1, 0.0);
            fields.set_u(i, j, -fields.u(i, j - 1));
        }
    }
}

/// Moving-wall reflection: like no-slip, but the tangential ghost value
/// interpolates to the prescribed wall speed.
fn apply_moving_wall(fields: &mut Fields, i: usize, j: usize, dir: Direction, wall_velocity: f64) {
    match dir {
        Direction::East => {
            fields.set_u(i, j, 0.0);
            fields.set_v(i, j, 2.0 * wall_velocity - fields.v(i + 1, j));
        }
        Direction::North => {
            fields.set_v(i, j, 0.0);
            fields.set_u(i, j, 2.0 * wall_velocity - fields.u(i, j + 1));
        }
        Direction::West => {
            fields.set_u(i - 1, j, 0.0);
            fields.set_v(i, j, 2.0 * wall_velocity - fields.v(i - 1, j));
        }
        Direction::South => {
            fields.set_v(i, j - 1, 0.0);
            fields.set_u(i, j, 2.0 * wall_velocity - fields.u(i, j - 1));
        }
    }
}

fn apply_inlet(fields: &mut Fields, i: usize, j: usize, dir: Direction, u_in: f64, v_in: f64) {
    match dir {
        Direction::East => {
            fields.set_u(i, j, u_in);
            fields.set_v(i, j, 2.0 * v_in - fields.v(i + 1, j));
        }
        Direction::North => {
            fields.set_v(i, j, v_in);
            fields.set_u(i, j, 2.0 * u_in - fields.u(i, j + 1));
        }
        Direction::West => {
            fields.set_u(i - 1, j, u_in);
            fields.set_v(i, j, 2.0 * v_in - fields.v(i - 1, j));
        }
        Direction::South => {
            fields.set_v(i, j - 1, v_in);
            fields.set_u(i, j, 2.0 * u_in - fields.u(i, j - 1));
        }
    }
}

/// Zero-gradient outflow: both ghost velocity components copy the adjacent
/// interior values.
fn apply_outlet(fields: &mut Fields, i: usize, j: usize, dir: Direction) {
    match dir {
        Direction::East => {
            fields.set_u(i, j, fields.u(i + 1, j));
            fields.set_v(i, j, fields.v(i + 1, j));
        }
        Direction::North => {
            fields.set_u(i, j, fields.u(i, j + 1));
            fields.set_v(i, j, fields.v(i, j + 1));
        }
        Direction::West => {
            fields.set_u(i - 1, j, fields.u(i - 2, j));
            fields.set_v(i, j, fields.v(i - 1, j));
        }
        Direction::South => {
            fields.set_u(i, j, fields.u(i, j - 1));
            fields.set_v(i, j - 1, fields.v(i, j - 2));
        }
    }
}

/// Free-slip reflection: zero normal velocity, tangential velocity copied
/// from the interior.
fn apply_free_slip(fields: &mut Fields, i: usize, j: usize, dir: Direction) {
    match dir {
        Direction::East => {
            fields.set_u(i, j, 0.0);
            fields.set_v(i, j, fields.v(i + 1, j));
        }
        Direction::North => {
            fields.set_v(i, j, 0.0);
            fields.set_u(i, j, fields.u(i, j + 1));
        }
        Direction::West => {
            fields.set_u(i - 1, j, 0.0);
            fields.set_v(i, j, fields.v(i - 1, j));
        }
        Direction::South => {
            fields.set_v(i, j - 1, 0.0);
            fields.set_u(i, j, fields.u(i, j - 1));
        }
    }
}

/// Ghost temperature toward one fluid neighbor: a held wall interpolates to
/// the prescribed value, otherwise zero gradient.
fn apply_temperature(fields: &mut Fields, i: usize, j: usize, dir: Direction, held: Option<f64>) {
    let (ni, nj) = offset(i, j, dir);
    let value = match held {
        Some(wall_temp) => 2.0 * wall_temp - fields.t(ni, nj),
        None => fields.t(ni, nj),
    };
    fields.set_t(i, j, value);
}

/// The dynamic free-surface condition over the current surface cell set.
///
/// `apply` enforces continuity across the liquid front by closing each
/// surface cell's velocity divergence toward its empty neighbors;
/// `apply_pressure` imposes atmospheric pressure. The cell set is refreshed
/// from the grid after every particle reclassification.
#[derive(Debug, Clone, Default)]
pub struct FreeSurfaceBoundary {
    cells: Vec<(usize, usize)>,
}

impl FreeSurfaceBoundary {
    /// Build from the grid's current surface set.
    #[must_use]
    pub fn new(grid: &Grid) -> Self {
        Self {
            cells: grid.surface_cells().to_vec(),
        }
    }

    /// Refresh the owned cell set after reclassification.
    pub fn update_cells(&mut self, grid: &Grid) {
        self.cells.clear();
        self.cells.extend_from_slice(grid.surface_cells());
    }

    /// Velocity and flux conditions on surface cells.
    ///
    /// With a single empty neighbor, the face toward it takes the value
    /// that makes the cell's discrete divergence vanish. With several, each
    /// empty-facing face copies its opposite face. Fluxes follow the
    /// velocities so the next Poisson right-hand side stays consistent.
    pub fn apply(&self, fields: &mut Fields, grid: &Grid) {
        let dx = grid.dx();
        let dy = grid.dy();
        for &(i, j) in &self.cells {
            let empty: Vec<Direction> = Direction::ALL
                .into_iter()
                .filter(|&dir| grid.neighbor_type(i, j, dir) == Some(CellType::Empty))
                .collect();
            match empty.as_slice() {
                [] => {}
                [dir] => {
                    match dir {
                        Direction::East => {
                            let u = fields.u(i - 1, j)
                                - dx / dy * (fields.v(i, j) - fields.v(i, j - 1));
                            fields.set_u(i, j, u);
                            fields.set_f(i, j, u);
                        }
                        Direction::West => {
                            let u = fields.u(i, j)
                                + dx / dy * (fields.v(i, j) - fields.v(i, j - 1));
                            fields.set_u(i - 1, j, u);
                            fields.set_f(i - 1, j, u);
                        }
                        Direction::North => {
                            let v = fields.v(i, j - 1)
                                - dy / dx * (fields.u(i, j) - fields.u(i - 1, j));
                            fields.set_v(i, j, v);
                            fields.set_g(i, j, v);
                        }
                        Direction::South => {
                            let v = fields.v(i, j)
                                + dy / dx * (fields.u(i, j) - fields.u(i - 1, j));
                            fields.set_v(i, j - 1, v);
                            fields.set_g(i, j - 1, v);
                        }
                    }
                }
                dirs => {
                    for dir in dirs {
                        match dir {
                            Direction::East => {
                                let u = fields.u(i - 1, j);
                                fields.set_u(i, j, u);
                                fields.set_f(i, j, u);
                            }
                            Direction::West => {
                                let u = fields.u(i, j);
                                fields.set_u(i - 1, j, u);
                                fields.set_f(i - 1, j, u);
                            }
                            Direction::North => {
                                let v = fields.v(i, j - 1);
                                fields.set_v(i, j, v);
                                fields.set_g(i, j, v);
                            }
                            Direction::South => {
                                let v = fields.v(i, j);
                                fields.set_v(i, j - 1, v);
                                fields.set_g(i, j - 1, v);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Atmospheric pressure on every surface cell.
    pub fn apply_pressure(&self, fields: &mut Fields) {
        for &(i, j) in &self.cells {
            fields.set_p(i, j, 0.0);
        }
    }
}
