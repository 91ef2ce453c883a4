//! Time-advancement driver: configuration, the per-timestep sequence, and
//! the multi-rank entry point.
//!
//! Rank 0 computes every rank's sub-domain descriptor and hands the others
//! theirs; after that each rank owns its grid and fields exclusively and
//! cooperates only through halo exchanges and global reductions. Snapshot
//! emission goes through the [`SnapshotSink`] trait so the driver never
//! knows about output formats.

use std::thread;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::boundary::{self, Boundary, BoundaryConditions, FreeSurfaceBoundary};
use crate::comm::{CommHub, Communicator};
use crate::discretization::Discretization;
use crate::domain::{decompose, Direction, Domain};
use crate::error::{CommError, SimulationError};
use crate::fields::{Fields, FluidProperties, InitialConditions};
use crate::grid::{CellType, Geometry, Grid};
use crate::particle::Particle;
use crate::pressure::{PressureSolver, Sor};

/// Every physical and numerical parameter of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Domain extent in x.
    pub xlength: f64,
    /// Domain extent in y.
    pub ylength: f64,
    /// Interior cells in x.
    pub imax: usize,
    /// Interior cells in y.
    pub jmax: usize,
    /// Initial timestep size; also the adaptive-step upper bound.
    pub dt: f64,
    /// Simulated end time.
    pub t_end: f64,
    /// Interval between snapshot emissions.
    pub output_interval: f64,
    /// Adaptive-timestep safety factor.
    pub tau: f64,
    /// Donor-cell upwind blend factor.
    pub gamma: f64,
    /// SOR relaxation factor.
    pub omega: f64,
    /// Pressure iteration budget per timestep.
    pub itermax: usize,
    /// Pressure residual tolerance.
    pub eps: f64,
    /// Kinematic viscosity.
    pub nu: f64,
    /// Reynolds number.
    pub re: f64,
    /// Thermal diffusivity.
    pub alpha: f64,
    /// Thermal expansion coefficient.
    pub beta: f64,
    /// Body force in x.
    pub gx: f64,
    /// Body force in y.
    pub gy: f64,
    /// Initial x-velocity.
    pub ui: f64,
    /// Initial y-velocity.
    pub vi: f64,
    /// Initial pressure.
    pub pi: f64,
    /// Initial temperature.
    pub ti: f64,
    /// Inlet x-velocity.
    pub u_in: f64,
    /// Inlet y-velocity.
    pub v_in: f64,
    /// Tangential speed of moving walls.
    pub wall_velocity: f64,
    /// Held wall temperatures keyed by wall id.
    pub wall_temps: Option<FxHashMap<u8, f64>>,
    /// Whether the energy equation is solved.
    pub energy_eq: bool,
    /// Process-grid extent in x.
    pub iproc: usize,
    /// Process-grid extent in y.
    pub jproc: usize,
    /// Particles seeded per liquid cell; zero disables the free surface.
    pub ppc: usize,
}

impl SolverConfig {
    /// Lid-driven cavity at Re = 100 with a unit-speed lid.
    #[must_use]
    pub fn lid_driven_cavity(imax: usize, jmax: usize) -> Self {
        Self {
            xlength: 1.0,
            ylength: 1.0,
            imax,
            jmax,
            dt: 0.05,
            t_end: 10.0,
            output_interval: 0.5,
            tau: 0.5,
            gamma: 0.5,
            omega: 1.7,
            itermax: 100,
            eps: 1e-3,
            nu: 0.01,
            re: 100.0,
            alpha: 0.0,
            beta: 0.0,
            gx: 0.0,
            gy: 0.0,
            ui: 0.0,
            vi: 0.0,
            pi: 0.0,
            ti: 0.0,
            u_in: 0.0,
            v_in: 0.0,
            wall_velocity: 1.0,
            wall_temps: None,
            energy_eq: false,
            iproc: 1,
            jproc: 1,
            ppc: 0,
        }
    }

    /// Differentially heated cavity: hot left wall (id 3), cold right wall
    /// (id 4), buoyancy-driven natural convection.
    #[must_use]
    pub fn heated_cavity(imax: usize, jmax: usize) -> Self {
        let mut temps = FxHashMap::default();
        temps.insert(3, 294.78);
        temps.insert(4, 291.20);
        Self {
            nu: 1e-3,
            re: 1000.0,
            alpha: 1.42e-3,
            beta: 6.3e-4,
            gy: -9.81,
            ti: 293.0,
            wall_temps: Some(temps),
            energy_eq: true,
            wall_velocity: 0.0,
            itermax: 500,
            ..Self::lid_driven_cavity(imax, jmax)
        }
    }

    /// Dam break: a liquid column collapsing under gravity, tracked by
    /// marker particles.
    #[must_use]
    pub fn dam_break(imax: usize, jmax: usize) -> Self {
        Self {
            gy: -9.81,
            ppc: 9,
            itermax: 200,
            wall_velocity: 0.0,
            ..Self::lid_driven_cavity(imax, jmax)
        }
    }

    /// Plane channel flow: unit inflow on the left, outflow on the right,
    /// free-slip top.
    #[must_use]
    pub fn channel(imax: usize, jmax: usize) -> Self {
        Self {
            xlength: 2.0,
            u_in: 1.0,
            ui: 1.0,
            wall_velocity: 0.0,
            ..Self::lid_driven_cavity(imax, jmax)
        }
    }

    /// Cell spacing in x.
    #[must_use]
    pub fn dx(&self) -> f64 {
        self.xlength / self.imax as f64
    }

    /// Cell spacing in y.
    #[must_use]
    pub fn dy(&self) -> f64 {
        self.ylength / self.jmax as f64
    }

    fn validate(&self, comm_size: usize) -> Result<(), SimulationError> {
        if self.iproc == 0 || self.jproc == 0 {
            return Err(SimulationError::InvalidConfig(
                "process grid extents must be at least 1".into(),
            ));
        }
        if self.iproc * self.jproc != comm_size {
            return Err(SimulationError::InvalidConfig(format!(
                "process grid {}x{} does not match {} workers",
                self.iproc, self.jproc, comm_size
            )));
        }
        if self.imax < self.iproc || self.jmax < self.jproc {
            return Err(SimulationError::InvalidConfig(format!(
                "grid {}x{} too small for a {}x{} process grid",
                self.imax, self.jmax, self.iproc, self.jproc
            )));
        }
        if self.dt <= 0.0 || self.eps <= 0.0 || self.itermax == 0 {
            return Err(SimulationError::InvalidConfig(
                "dt, eps, and itermax must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Read-only view of one rank's state at an output threshold.
pub struct Snapshot<'a> {
    /// Timestep counter.
    pub step: usize,
    /// Simulated time.
    pub time: f64,
    /// Field arrays.
    pub fields: &'a Fields,
    /// Grid, cell sets, and particles.
    pub grid: &'a Grid,
}

/// Consumer of periodic snapshots; formatting and I/O live behind it.
pub trait SnapshotSink {
    /// Record one snapshot.
    fn write(&mut self, snapshot: &Snapshot<'_>);
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn write(&mut self, _snapshot: &Snapshot<'_>) {}
}

/// One rank's solver state and the per-timestep sequence.
pub struct Simulation {
    comm: Communicator,
    grid: Grid,
    fields: Fields,
    disc: Discretization,
    boundaries: Vec<Boundary>,
    surface: FreeSurfaceBoundary,
    solver: Sor,
    /// Free-surface mode, identical on every rank. The particle phase holds
    /// collective operations, so gating it on a rank-local particle count
    /// would desynchronize the ranks.
    free_surface: bool,
    t_end: f64,
    eps: f64,
    itermax: usize,
    output_interval: f64,
}

impl Simulation {
    /// Build one rank's simulation. Rank 0 decomposes the global grid and
    /// distributes every other rank's sub-domain descriptor; the rest
    /// receive theirs.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] for inconsistent
    /// parameters and [`SimulationError::Comm`] if descriptor distribution
    /// fails.
    pub fn new(
        config: &SolverConfig,
        geometry: &Geometry,
        comm: Communicator,
    ) -> Result<Self, SimulationError> {
        config.validate(comm.size())?;
        if geometry.imax() != config.imax || geometry.jmax() != config.jmax {
            return Err(SimulationError::InvalidConfig(format!(
                "geometry {}x{} does not match configured grid {}x{}",
                geometry.imax(),
                geometry.jmax(),
                config.imax,
                config.jmax
            )));
        }

        let dx = config.dx();
        let dy = config.dy();
        let domain = if comm.is_coordinator() {
            for peer in 1..comm.size() {
                let peer_domain =
                    decompose(config.imax, config.jmax, config.iproc, config.jproc, dx, dy, peer);
                comm.send_domain(peer, peer_domain)?;
            }
            decompose(config.imax, config.jmax, config.iproc, config.jproc, dx, dy, 0)
        } else {
            comm.recv_domain()?
        };

        let mut grid = Grid::new(domain, geometry);
        if config.ppc > 0 {
            grid.seed_particles(config.ppc);
        }
        let fields = Fields::new(
            FluidProperties {
                nu: config.nu,
                re: config.re,
                alpha: config.alpha,
                beta: config.beta,
                gx: config.gx,
                gy: config.gy,
                dt: config.dt,
                tau: config.tau,
                energy_eq: config.energy_eq,
            },
            InitialConditions {
                ui: config.ui,
                vi: config.vi,
                pi: config.pi,
                ti: config.ti,
            },
            grid.domain().size_x,
            grid.domain().size_y,
        );
        let boundaries = boundary::build_all(
            &grid,
            &BoundaryConditions {
                wall_velocity: config.wall_velocity,
                u_in: config.u_in,
                v_in: config.v_in,
                wall_temps: config.wall_temps.clone(),
            },
        );
        let surface = FreeSurfaceBoundary::new(&grid);

        Ok(Self {
            comm,
            grid,
            fields,
            disc: Discretization::new(dx, dy, config.gamma),
            boundaries,
            surface,
            solver: Sor::new(config.omega),
            free_surface: config.ppc > 0,
            t_end: config.t_end,
            eps: config.eps,
            itermax: config.itermax,
            output_interval: config.output_interval,
        })
    }

    /// This rank's grid.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// This rank's field arrays.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Run to the configured end time, emitting snapshots at the output
    /// cadence.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Comm`] if a halo exchange or reduction
    /// fails; pressure non-convergence is a logged soft failure, never an
    /// error.
    pub fn simulate(&mut self, sink: &mut impl SnapshotSink) -> Result<(), SimulationError> {
        for b in &self.boundaries {
            b.apply(&mut self.fields, &self.grid);
        }
        sink.write(&Snapshot {
            step: 0,
            time: 0.0,
            fields: &self.fields,
            grid: &self.grid,
        });

        let mut t = 0.0;
        let mut timestep = 0usize;
        let mut next_output = self.output_interval;

        while t <= self.t_end {
            let dt = self.fields.calculate_dt(&self.grid, &self.comm)?;

            if self.free_surface {
                self.reclassify_and_clear();
            }

            if self.fields.energy_eq() {
                self.fields.calculate_temperature(&self.grid, &self.disc);
                let domain = self.grid.domain().clone();
                self.comm.exchange_halo(self.fields.t_matrix_mut(), &domain)?;
            }

            self.fields.calculate_fluxes(&self.grid, &self.disc);
            let domain = self.grid.domain().clone();
            self.comm.exchange_halo(self.fields.f_matrix_mut(), &domain)?;
            self.comm.exchange_halo(self.fields.g_matrix_mut(), &domain)?;
            self.fields.calculate_rs(&self.grid);

            let (residual, iterations) = self.solve_pressure(t, dt)?;

            self.fields.calculate_velocities(&self.grid);

            if self.free_surface {
                self.surface.apply(&mut self.fields, &self.grid);
                self.surface.apply_pressure(&mut self.fields);
                self.advect_particles(dt)?;
                self.grid.cull_particles();
            }

            for b in &self.boundaries {
                b.apply(&mut self.fields, &self.grid);
            }
            let domain = self.grid.domain().clone();
            self.comm.exchange_halo(self.fields.u_matrix_mut(), &domain)?;
            self.comm.exchange_halo(self.fields.v_matrix_mut(), &domain)?;

            t += dt;
            timestep += 1;

            if self.comm.is_coordinator() && timestep % 5 == 0 {
                info!(
                    timestep,
                    time = t,
                    dt,
                    residual,
                    iterations,
                    "advanced simulation"
                );
            }

            if t >= next_output {
                sink.write(&Snapshot {
                    step: timestep,
                    time: t,
                    fields: &self.fields,
                    grid: &self.grid,
                });
                next_output += self.output_interval;
            }
        }
        Ok(())
    }

    /// Reclassify fluid/surface/empty cells from particle occupancy, then
    /// clear pressure and empty-facing velocities on cells that left the
    /// liquid, and refresh the free-surface condition.
    fn reclassify_and_clear(&mut self) {
        self.grid.reclassify_from_particles();
        self.fields.reset_fields();

        let size_x = self.grid.domain().size_x;
        let size_y = self.grid.domain().size_y;
        for j in 1..=size_y {
            for i in 1..=size_x {
                let kind = self.grid.cell_type(i, j);
                if kind == CellType::Fluid || kind == CellType::Surface {
                    continue;
                }
                self.fields.set_p(i, j, 0.0);
                if self.grid.neighbor_type(i, j, Direction::North) == Some(CellType::Empty) {
                    self.fields.set_v(i, j, 0.0);
                    self.fields.set_g(i, j, 0.0);
                }
                if self.grid.neighbor_type(i, j, Direction::East) == Some(CellType::Empty) {
                    self.fields.set_u(i, j, 0.0);
                    self.fields.set_f(i, j, 0.0);
                }
            }
        }

        self.surface.update_cells(&self.grid);
        self.surface.apply(&mut self.fields, &self.grid);
    }

    /// The inner pressure loop. Non-convergence within the iteration budget
    /// is logged on the coordinator and the step proceeds with the
    /// best-effort pressure field.
    fn solve_pressure(&mut self, t: f64, dt: f64) -> Result<(f64, usize), SimulationError> {
        let domain = self.grid.domain().clone();
        let mut residual = f64::MAX;
        let mut iterations = 0usize;
        while residual > self.eps {
            if iterations >= self.itermax {
                if self.comm.is_coordinator() {
                    warn!(
                        time = t,
                        dt,
                        residual,
                        iterations,
                        "pressure solver did not converge to tolerance"
                    );
                }
                break;
            }
            self.comm.exchange_halo(self.fields.p_matrix_mut(), &domain)?;
            for b in &self.boundaries {
                b.apply_pressure(&mut self.fields, &self.grid);
            }
            residual = self.solver.solve(&mut self.fields, &self.grid, &self.comm)?;
            iterations += 1;
        }
        Ok((residual, iterations))
    }

    /// Advect every marker particle, then hand particles that crossed a
    /// sub-domain seam to the owning neighbor so no rank is left counting
    /// liquid it does not hold. East/west transfers run before north/south,
    /// so a particle cutting a corner reaches the diagonal owner in two
    /// hops.
    fn advect_particles(&mut self, dt: f64) -> Result<(), CommError> {
        let domain = self.grid.domain().clone();
        {
            let (u, v) = (self.fields.u_matrix(), self.fields.v_matrix());
            for p in self.grid.particles_mut() {
                p.interpolate_velocity(&domain, u, v);
                p.advance(dt);
            }
        }

        let x_min = (domain.imin + 1) as f64 * domain.dx;
        let x_max = (domain.imax - 1) as f64 * domain.dx;
        let y_min = (domain.jmin + 1) as f64 * domain.dy;
        let y_max = (domain.jmax - 1) as f64 * domain.dy;
        self.transfer_particles(&domain, [Direction::East, Direction::West], |p, dir| {
            match dir {
                Direction::East => p.position.x > x_max,
                _ => p.position.x < x_min,
            }
        })?;
        self.transfer_particles(&domain, [Direction::North, Direction::South], |p, dir| {
            match dir {
                Direction::North => p.position.y > y_max,
                _ => p.position.y < y_min,
            }
        })
    }

    /// One axis of the particle handover: send departures toward both
    /// directions first, then receive arrivals, so neighboring ranks never
    /// wait on each other.
    fn transfer_particles(
        &mut self,
        domain: &Domain,
        dirs: [Direction; 2],
        mut departed: impl FnMut(&Particle, Direction) -> bool,
    ) -> Result<(), CommError> {
        for dir in dirs {
            if let Some(peer) = domain.neighbor(dir) {
                let outgoing = self.grid.drain_particles_where(|p| departed(p, dir));
                self.comm.send_particles(peer, outgoing)?;
            }
        }
        for dir in dirs {
            if let Some(peer) = domain.neighbor(dir) {
                self.grid.absorb_particles(self.comm.recv_particles(peer)?);
            }
        }
        Ok(())
    }
}

/// Run the full multi-rank simulation: one worker thread per sub-domain,
/// all-to-all message channels between them, rank 0 coordinating. The sink
/// factory is called once per rank.
///
/// # Errors
///
/// Returns the first worker error, or [`SimulationError::WorkerPanicked`]
/// if a worker thread died.
pub fn run_parallel<S, F>(
    config: &SolverConfig,
    geometry: &Geometry,
    make_sink: F,
) -> Result<(), SimulationError>
where
    S: SnapshotSink,
    F: Fn(usize) -> S + Sync,
{
    let size = config.iproc * config.jproc;
    let comms = CommHub::create(size);
    thread::scope(|scope| {
        let make_sink = &make_sink;
        let mut handles = Vec::with_capacity(size);
        for comm in comms {
            let rank = comm.rank();
            let handle = scope.spawn(move || {
                let mut sink = make_sink(rank);
                let mut sim = Simulation::new(config, geometry, comm)?;
                sim.simulate(&mut sink)
            });
            handles.push((rank, handle));
        }
        for (rank, handle) in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(SimulationError::WorkerPanicked { rank }),
            }
        }
        Ok(())
    })
}
