//! Incompressible Flow Solver Core Library
//!
//! A parallel finite-difference solver for incompressible viscous flow on a
//! structured staggered grid, with optional energy transport and a
//! particle-tracked free surface.
//!
//! ## Solver structure
//!
//! The solver advances velocity, pressure, and temperature with:
//! - Explicit momentum fluxes with donor-cell upwinding
//! - An iterative pressure-Poisson solve (successive over-relaxation)
//! - Domain decomposition across worker threads with halo exchange
//! - Marker particles for free-surface tracking (dam-break style flows)

// Field arrays and topology
pub mod domain;
pub mod fields;
pub mod grid;
pub mod matrix;

// Numerics
pub mod boundary;
pub mod discretization;
pub mod particle;
pub mod pressure;

// Parallel machinery and orchestration
pub mod comm;
pub mod error;
pub mod simulation;

// Re-export topology types
pub use domain::{decompose, Direction, Domain};
pub use grid::{CellType, Geometry, Grid};
pub use matrix::Matrix;

// Re-export solver types
pub use boundary::{Boundary, BoundaryConditions, FreeSurfaceBoundary};
pub use discretization::Discretization;
pub use fields::{Fields, FluidProperties, InitialConditions};
pub use particle::Particle;
pub use pressure::{PressureSolver, Sor};

// Re-export orchestration types
pub use comm::{CommHub, Communicator};
pub use error::{CommError, SimulationError};
pub use simulation::{run_parallel, NullSink, Simulation, Snapshot, SnapshotSink, SolverConfig};
