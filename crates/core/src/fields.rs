//! Field state: the per-cell scalar arrays and their update kernels.
//!
//! One [`Fields`] instance holds a sub-domain's velocity, pressure,
//! temperature, momentum-flux, and Poisson right-hand-side arrays along with
//! the scalar flow parameters. Kernels mutate interior cells only; any array
//! mutated here must be halo-exchanged before a neighboring rank's next read
//! across the sub-domain edge.

use rayon::prelude::*;

use crate::comm::Communicator;
use crate::discretization::Discretization;
use crate::error::CommError;
use crate::grid::{CellType, Grid};
use crate::matrix::Matrix;

/// Scalar flow parameters for a run.
#[derive(Debug, Clone, Copy)]
pub struct FluidProperties {
    /// Kinematic viscosity.
    pub nu: f64,
    /// Reynolds number.
    pub re: f64,
    /// Thermal diffusivity.
    pub alpha: f64,
    /// Thermal expansion coefficient (Boussinesq buoyancy).
    pub beta: f64,
    /// Body force in x.
    pub gx: f64,
    /// Body force in y.
    pub gy: f64,
    /// Initial timestep size; also the upper bound for the adaptive step.
    pub dt: f64,
    /// Adaptive-timestep safety factor.
    pub tau: f64,
    /// Whether the energy equation is solved.
    pub energy_eq: bool,
}

/// Initial values for the field arrays.
#[derive(Debug, Clone, Copy)]
pub struct InitialConditions {
    /// Initial x-velocity.
    pub ui: f64,
    /// Initial y-velocity.
    pub vi: f64,
    /// Initial pressure.
    pub pi: f64,
    /// Initial temperature.
    pub ti: f64,
}

/// Container and modifier for the physical fields of one sub-domain.
#[derive(Debug, Clone)]
pub struct Fields {
    u: Matrix,
    v: Matrix,
    p: Matrix,
    t: Matrix,
    t_back: Matrix,
    f: Matrix,
    g: Matrix,
    rs: Matrix,

    nu: f64,
    re: f64,
    alpha: f64,
    beta: f64,
    gx: f64,
    gy: f64,
    dt: f64,
    dt_max: f64,
    tau: f64,
    energy_eq: bool,
}

impl Fields {
    /// Create the field arrays for a `size_x × size_y` sub-domain.
    #[must_use]
    pub fn new(
        props: FluidProperties,
        init: InitialConditions,
        size_x: usize,
        size_y: usize,
    ) -> Self {
        Self {
            u: Matrix::with_value(size_x, size_y, init.ui),
            v: Matrix::with_value(size_x, size_y, init.vi),
            p: Matrix::with_value(size_x, size_y, init.pi),
            t: Matrix::with_value(size_x, size_y, init.ti),
            t_back: Matrix::with_value(size_x, size_y, init.ti),
            f: Matrix::new(size_x, size_y),
            g: Matrix::new(size_x, size_y),
            rs: Matrix::new(size_x, size_y),
            nu: props.nu,
            re: props.re,
            alpha: props.alpha,
            beta: props.beta,
            gx: props.gx,
            gy: props.gy,
            dt: props.dt,
            dt_max: props.dt,
            tau: props.tau,
            energy_eq: props.energy_eq,
        }
    }

    /// Momentum fluxes F and G from the explicit momentum discretization.
    ///
    /// Every face starts out as the raw velocity, so faces touching
    /// non-fluid cells carry no correction and boundary treatment stays in
    /// the boundary set. Fluid-fluid faces get velocity plus the
    /// timestep-scaled diffusion, convection, and body-force contributions;
    /// with the energy equation on, the body force is the Boussinesq
    /// buoyancy term instead of the bare acceleration.
    pub fn calculate_fluxes(&mut self, grid: &Grid, disc: &Discretization) {
        self.f.copy_from(&self.u);
        self.g.copy_from(&self.v);

        let dt = self.dt;
        for &(i, j) in grid.fluid_cells() {
            if grid.cell_type(i + 1, j) == CellType::Fluid {
                let body = if self.energy_eq {
                    -self.beta * 0.5 * (self.t.at(i, j) + self.t.at(i + 1, j)) * self.gx
                } else {
                    self.gx
                };
                let flux = self.u.at(i, j)
                    + dt * (self.nu * disc.laplacian(&self.u, i, j)
                        - disc.convection_u(&self.u, &self.v, i, j)
                        + body);
                self.f.set(i, j, flux);
            }
            if grid.cell_type(i, j + 1) == CellType::Fluid {
                let body = if self.energy_eq {
                    -self.beta * 0.5 * (self.t.at(i, j) + self.t.at(i, j + 1)) * self.gy
                } else {
                    self.gy
                };
                let flux = self.v.at(i, j)
                    + dt * (self.nu * disc.laplacian(&self.v, i, j)
                        - disc.convection_v(&self.u, &self.v, i, j)
                        + body);
                self.g.set(i, j, flux);
            }
        }
    }

    /// Explicit temperature update over fluid cells; no-op when the energy
    /// equation is disabled.
    ///
    /// Double-buffered so every stencil reads the pre-update field; rows are
    /// processed in parallel.
    pub fn calculate_temperature(&mut self, grid: &Grid, disc: &Discretization) {
        if !self.energy_eq {
            return;
        }
        let dt = self.dt;
        let alpha = self.alpha;
        let width = self.t.width();
        let size_x = grid.domain().size_x;
        let size_y = grid.domain().size_y;
        let (t_in, u, v) = (&self.t, &self.u, &self.v);

        self.t_back
            .as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(j, row)| {
                for (i, out) in row.iter_mut().enumerate() {
                    let interior = i >= 1 && i <= size_x && j >= 1 && j <= size_y;
                    *out = if interior && grid.cell_type(i, j).is_fluid() {
                        t_in.at(i, j)
                            + dt * (alpha * disc.laplacian(t_in, i, j)
                                - disc.convection_t(u, v, t_in, i, j))
                    } else {
                        t_in.at(i, j)
                    };
                }
            });
        std::mem::swap(&mut self.t, &mut self.t_back);
    }

    /// Poisson right-hand side: divergence of the flux field over `1/dt`.
    pub fn calculate_rs(&mut self, grid: &Grid) {
        let inv_dt = 1.0 / self.dt;
        let dx = grid.dx();
        let dy = grid.dy();
        for &(i, j) in grid.fluid_cells() {
            let div = (self.f.at(i, j) - self.f.at(i - 1, j)) / dx
                + (self.g.at(i, j) - self.g.at(i, j - 1)) / dy;
            self.rs.set(i, j, div * inv_dt);
        }
    }

    /// Velocity correction: subtract the timestep-scaled pressure gradient
    /// from the flux field to recover the divergence-free velocity.
    pub fn calculate_velocities(&mut self, grid: &Grid) {
        let dt_dx = self.dt / grid.dx();
        let dt_dy = self.dt / grid.dy();
        for &(i, j) in grid.fluid_cells() {
            if grid.cell_type(i + 1, j) == CellType::Fluid {
                let vel = self.f.at(i, j) - dt_dx * (self.p.at(i + 1, j) - self.p.at(i, j));
                self.u.set(i, j, vel);
            }
            if grid.cell_type(i, j + 1) == CellType::Fluid {
                let vel = self.g.at(i, j) - dt_dy * (self.p.at(i, j + 1) - self.p.at(i, j));
                self.v.set(i, j, vel);
            }
        }
    }

    /// Adaptive timestep: the minimum of the diffusive limit and the CFL
    /// limits in x and y, scaled by the safety factor, capped at the
    /// configured initial step, and reduced to a global minimum so every
    /// rank advances with the identical dt.
    ///
    /// The result is stored and returned; it is always strictly positive.
    pub fn calculate_dt(&mut self, grid: &Grid, comm: &Communicator) -> Result<f64, CommError> {
        let dx = grid.dx();
        let dy = grid.dy();
        let inv_sq = 1.0 / (dx * dx) + 1.0 / (dy * dy);

        let mut limit = 0.5 * self.re / inv_sq;
        if self.energy_eq && self.alpha > 0.0 {
            limit = limit.min(0.5 / self.alpha / inv_sq);
        }
        let u_max = self.u.max_abs();
        if u_max > 0.0 {
            limit = limit.min(dx / u_max);
        }
        let v_max = self.v.max_abs();
        if v_max > 0.0 {
            limit = limit.min(dy / v_max);
        }

        let dt = comm.reduce_min((self.tau * limit).min(self.dt_max))?;
        self.dt = dt;
        Ok(dt)
    }

    /// Zero the flux and right-hand-side arrays. Called when free-surface
    /// reclassification re-applies obstacle treatment to cells that are no
    /// longer fluid.
    pub fn reset_fields(&mut self) {
        self.f.fill(0.0);
        self.g.fill(0.0);
        self.rs.fill(0.0);
    }

    /// Whether the energy equation is active.
    #[must_use]
    pub fn energy_eq(&self) -> bool {
        self.energy_eq
    }

    /// Current timestep size.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// x-velocity at `(i, j)`.
    #[must_use]
    pub fn u(&self, i: usize, j: usize) -> f64 {
        self.u.at(i, j)
    }

    /// y-velocity at `(i, j)`.
    #[must_use]
    pub fn v(&self, i: usize, j: usize) -> f64 {
        self.v.at(i, j)
    }

    /// Pressure at `(i, j)`.
    #[must_use]
    pub fn p(&self, i: usize, j: usize) -> f64 {
        self.p.at(i, j)
    }

    /// Temperature at `(i, j)`.
    #[must_use]
    pub fn t(&self, i: usize, j: usize) -> f64 {
        self.t.at(i, j)
    }

    /// x-momentum flux at `(i, j)`.
    #[must_use]
    pub fn f(&self, i: usize, j: usize) -> f64 {
        self.f.at(i, j)
    }

    /// y-momentum flux at `(i, j)`.
    #[must_use]
    pub fn g(&self, i: usize, j: usize) -> f64 {
        self.g.at(i, j)
    }

    /// Poisson right-hand side at `(i, j)`.
    #[must_use]
    pub fn rs(&self, i: usize, j: usize) -> f64 {
        self.rs.at(i, j)
    }

    /// Set the x-velocity at `(i, j)`.
    pub fn set_u(&mut self, i: usize, j: usize, value: f64) {
        self.u.set(i, j, value);
    }

    /// Set the y-velocity at `(i, j)`.
    pub fn set_v(&mut self, i: usize, j: usize, value: f64) {
        self.v.set(i, j, value);
    }

    /// Set the pressure at `(i, j)`.
    pub fn set_p(&mut self, i: usize, j: usize, value: f64) {
        self.p.set(i, j, value);
    }

    /// Set the temperature at `(i, j)`.
    pub fn set_t(&mut self, i: usize, j: usize, value: f64) {
        self.t.set(i, j, value);
    }

    /// Set the Poisson right-hand side at `(i, j)`.
    pub fn set_rs(&mut self, i: usize, j: usize, value: f64) {
        self.rs.set(i, j, value);
    }

    /// Set the x-momentum flux at `(i, j)`.
    pub fn set_f(&mut self, i: usize, j: usize, value: f64) {
        self.f.set(i, j, value);
    }

    /// Set the y-momentum flux at `(i, j)`.
    pub fn set_g(&mut self, i: usize, j: usize, value: f64) {
        self.g.set(i, j, value);
    }

    /// x-velocity array.
    #[must_use]
    pub fn u_matrix(&self) -> &Matrix {
        &self.u
    }

    /// y-velocity array.
    #[must_use]
    pub fn v_matrix(&self) -> &Matrix {
        &self.v
    }

    /// Pressure array.
    #[must_use]
    pub fn p_matrix(&self) -> &Matrix {
        &self.p
    }

    /// Temperature array.
    #[must_use]
    pub fn t_matrix(&self) -> &Matrix {
        &self.t
    }

    /// Mutable x-velocity array (halo exchange).
    pub fn u_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.u
    }

    /// Mutable y-velocity array (halo exchange).
    pub fn v_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.v
    }

    /// Mutable pressure array (halo exchange).
    pub fn p_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.p
    }

    /// Mutable temperature array (halo exchange).
    pub fn t_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.t
    }

    /// Mutable x-flux array (halo exchange).
    pub fn f_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.f
    }

    /// Mutable y-flux array (halo exchange).
    pub fn g_matrix_mut(&mut self) -> &mut Matrix {
        &mut self.g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::CommHub;
    use crate::domain::decompose;
    use crate::grid::Geometry;
    use approx::assert_relative_eq;

    fn cavity_setup(size: usize) -> (Grid, Discretization) {
        let h = 1.0 / size as f64;
        let domain = decompose(size, size, 1, 1, h, h, 0);
        let grid = Grid::new(domain, &Geometry::lid_driven_cavity(size, size));
        let disc = Discretization::new(h, h, 0.5);
        (grid, disc)
    }

    fn props() -> FluidProperties {
        FluidProperties {
            nu: 0.01,
            re: 100.0,
            alpha: 0.0,
            beta: 0.0,
            gx: 0.0,
            gy: 0.0,
            dt: 0.05,
            tau: 0.5,
            energy_eq: false,
        }
    }

    fn at_rest() -> InitialConditions {
        InitialConditions {
            ui: 0.0,
            vi: 0.0,
            pi: 0.0,
            ti: 0.0,
        }
    }

    #[test]
    fn test_rest_state_produces_zero_fluxes_and_rhs() {
        let (grid, disc) = cavity_setup(8);
        let mut fields = Fields::new(props(), at_rest(), 8, 8);
        fields.calculate_fluxes(&grid, &disc);
        fields.calculate_rs(&grid);
        for &(i, j) in grid.fluid_cells() {
            assert_eq!(fields.f(i, j), 0.0);
            assert_eq!(fields.g(i, j), 0.0);
            assert_eq!(fields.rs(i, j), 0.0);
        }
    }

    #[test]
    fn test_dt_respects_every_stability_bound() {
        let (grid, _) = cavity_setup(8);
        let mut comms = CommHub::create(1);
        let comm = comms.remove(0);
        let mut fields = Fields::new(props(), at_rest(), 8, 8);
        // Impose a velocity so the CFL limits are active.
        fields.set_u(4, 4, 2.0);
        fields.set_v(4, 4, -3.0);

        let dt = fields.calculate_dt(&grid, &comm).unwrap();
        let h = grid.dx();
        let inv_sq = 2.0 / (h * h);
        assert!(dt > 0.0);
        assert!(dt <= 0.5 * 100.0 / inv_sq);
        assert!(dt <= h / 2.0);
        assert!(dt <= h / 3.0);
        assert!(dt <= 0.05, "dt exceeded the configured maximum step");
    }

    #[test]
    fn test_dt_capped_at_initial_step_when_at_rest() {
        let (grid, _) = cavity_setup(4);
        let mut comms = CommHub::create(1);
        let comm = comms.remove(0);
        let mut p = props();
        p.dt = 1e-4; // far below any stability limit
        let mut fields = Fields::new(p, at_rest(), 4, 4);
        let dt = fields.calculate_dt(&grid, &comm).unwrap();
        assert_relative_eq!(dt, 1e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_velocity_correction_applies_pressure_gradient() {
        let (grid, disc) = cavity_setup(8);
        let mut fields = Fields::new(props(), at_rest(), 8, 8);
        fields.calculate_fluxes(&grid, &disc);
        // Linear pressure in x drives u in -x.
        for j in 0..10 {
            for i in 0..10 {
                fields.set_p(i, j, i as f64);
            }
        }
        fields.calculate_velocities(&grid);
        let expected = -fields.dt() / grid.dx();
        assert_relative_eq!(fields.u(4, 4), expected, epsilon = 1e-12);
        // v is untouched by an x-only gradient.
        assert_relative_eq!(fields.v(4, 4), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_temperature_update_is_noop_when_energy_disabled() {
        let (grid, disc) = cavity_setup(8);
        let mut fields = Fields::new(props(), at_rest(), 8, 8);
        fields.set_t(4, 4, 7.0);
        fields.calculate_temperature(&grid, &disc);
        assert_eq!(fields.t(4, 4), 7.0);
    }

    #[test]
    fn test_temperature_diffuses_toward_neighbors() {
        let (grid, disc) = cavity_setup(8);
        let mut p = props();
        p.energy_eq = true;
        p.alpha = 0.1;
        let mut fields = Fields::new(p, at_rest(), 8, 8);
        fields.set_t(4, 4, 1.0);
        fields.calculate_temperature(&grid, &disc);
        assert!(fields.t(4, 4) < 1.0, "hot spot did not cool");
        assert!(fields.t(5, 4) > 0.0, "heat did not spread");
    }

    #[test]
    fn test_reset_fields_zeroes_fluxes_and_rhs() {
        let (grid, disc) = cavity_setup(8);
        let mut fields = Fields::new(props(), at_rest(), 8, 8);
        fields.set_u(3, 3, 1.0);
        fields.calculate_fluxes(&grid, &disc);
        fields.calculate_rs(&grid);
        fields.reset_fields();
        for &(i, j) in grid.fluid_cells() {
            assert_eq!(fields.f(i, j), 0.0);
            assert_eq!(fields.g(i, j), 0.0);
            assert_eq!(fields.rs(i, j), 0.0);
        }
    }
}
