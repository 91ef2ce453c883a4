//! Finite-difference stencils on the staggered grid.
//!
//! Convective derivatives use the donor-cell scheme: a central average
//! blended with an upwind correction weighted by the factor `gamma`
//! (`gamma = 0` is pure central differencing, `gamma = 1` full upwinding).
//! Diffusive terms are the standard five-point Laplacian.

use crate::matrix::Matrix;

/// Stencil evaluator for one sub-domain's spacing and upwind blend.
#[derive(Debug, Clone, Copy)]
pub struct Discretization {
    dx: f64,
    dy: f64,
    gamma: f64,
}

impl Discretization {
    /// Create an evaluator for cell spacing `(dx, dy)` and upwind blend `gamma`.
    #[must_use]
    pub fn new(dx: f64, dy: f64, gamma: f64) -> Self {
        Self { dx, dy, gamma }
    }

    /// Convective term of the u-momentum equation,
    /// `∂(u²)/∂x + ∂(uv)/∂y`, at u-location `(i, j)`.
    #[must_use]
    pub fn convection_u(&self, u: &Matrix, v: &Matrix, i: usize, j: usize) -> f64 {
        // d(u^2)/dx
        let k_e = (u.at(i, j) + u.at(i + 1, j)) * 0.5;
        let k_w = (u.at(i - 1, j) + u.at(i, j)) * 0.5;
        let duu_dx = (k_e * k_e - k_w * k_w) / self.dx
            + self.gamma / self.dx
                * (k_e.abs() * (u.at(i, j) - u.at(i + 1, j)) * 0.5
                    - k_w.abs() * (u.at(i - 1, j) - u.at(i, j)) * 0.5);

        // d(uv)/dy, v averaged onto the u-location's north/south faces
        let v_n = (v.at(i, j) + v.at(i + 1, j)) * 0.5;
        let v_s = (v.at(i, j - 1) + v.at(i + 1, j - 1)) * 0.5;
        let duv_dy = (v_n * (u.at(i, j) + u.at(i, j + 1)) * 0.5
            - v_s * (u.at(i, j - 1) + u.at(i, j)) * 0.5)
            / self.dy
            + self.gamma / self.dy
                * (v_n.abs() * (u.at(i, j) - u.at(i, j + 1)) * 0.5
                    - v_s.abs() * (u.at(i, j - 1) - u.at(i, j)) * 0.5);

        duu_dx + duv_dy
    }

    /// Convective term of the v-momentum equation,
    /// `∂(uv)/∂x + ∂(v²)/∂y`, at v-location `(i, j)`.
    #[must_use]
    pub fn convection_v(&self, u: &Matrix, v: &Matrix, i: usize, j: usize) -> f64 {
        // d(uv)/dx, u averaged onto the v-location's east/west faces
        let u_e = (u.at(i, j) + u.at(i, j + 1)) * 0.5;
        let u_w = (u.at(i - 1, j) + u.at(i - 1, j + 1)) * 0.5;
        let duv_dx = (u_e * (v.at(i, j) + v.at(i + 1, j)) * 0.5
            - u_w * (v.at(i - 1, j) + v.at(i, j)) * 0.5)
            / self.dx
            + self.gamma / self.dx
                * (u_e.abs() * (v.at(i, j) - v.at(i + 1, j)) * 0.5
                    - u_w.abs() * (v.at(i - 1, j) - v.at(i, j)) * 0.5);

        // d(v^2)/dy
        let k_n = (v.at(i, j) + v.at(i, j + 1)) * 0.5;
        let k_s = (v.at(i, j - 1) + v.at(i, j)) * 0.5;
        let dvv_dy = (k_n * k_n - k_s * k_s) / self.dy
            + self.gamma / self.dy
                * (k_n.abs() * (v.at(i, j) - v.at(i, j + 1)) * 0.5
                    - k_s.abs() * (v.at(i, j - 1) - v.at(i, j)) * 0.5);

        duv_dx + dvv_dy
    }

    /// Convective term of a cell-centered scalar,
    /// `∂(uT)/∂x + ∂(vT)/∂y`, at cell `(i, j)`.
    #[must_use]
    pub fn convection_t(&self, u: &Matrix, v: &Matrix, t: &Matrix, i: usize, j: usize) -> f64 {
        let dut_dx = (u.at(i, j) * (t.at(i, j) + t.at(i + 1, j)) * 0.5
            - u.at(i - 1, j) * (t.at(i - 1, j) + t.at(i, j)) * 0.5)
            / self.dx
            + self.gamma / self.dx
                * (u.at(i, j).abs() * (t.at(i, j) - t.at(i + 1, j)) * 0.5
                    - u.at(i - 1, j).abs() * (t.at(i - 1, j) - t.at(i, j)) * 0.5);

        let dvt_dy = (v.at(i, j) * (t.at(i, j) + t.at(i, j + 1)) * 0.5
            - v.at(i, j - 1) * (t.at(i, j - 1) + t.at(i, j)) * 0.5)
            / self.dy
            + self.gamma / self.dy
                * (v.at(i, j).abs() * (t.at(i, j) - t.at(i, j + 1)) * 0.5
                    - v.at(i, j - 1).abs() * (t.at(i, j - 1) - t.at(i, j)) * 0.5);

        dut_dx + dvt_dy
    }

    /// Five-point Laplacian of `a` at `(i, j)`.
    #[must_use]
    pub fn laplacian(&self, a: &Matrix, i: usize, j: usize) -> f64 {
        (a.at(i + 1, j) - 2.0 * a.at(i, j) + a.at(i - 1, j)) / (self.dx * self.dx)
            + (a.at(i, j + 1) - 2.0 * a.at(i, j) + a.at(i, j - 1)) / (self.dy * self.dy)
    }
}
