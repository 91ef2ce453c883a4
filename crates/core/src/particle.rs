//! Lagrangian marker particles for the free-surface extension.
//!
//! Particles carry no mass; they mark which cells hold liquid. Each timestep
//! a particle samples the staggered velocity field around it (bilinear over
//! the u and v arrays separately, since the two live at different face
//! centers) and advances by an explicit Euler step. A sample whose stencil
//! reaches outside the local sub-domain is clamped to the nearest stored
//! value rather than treated as a fault.

use nalgebra::Vector2;

use crate::domain::Domain;
use crate::matrix::Matrix;

/// One marker particle in global physical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position (x, y).
    pub position: Vector2<f64>,
    /// Velocity (u, v), refreshed by interpolation each step.
    pub velocity: Vector2<f64>,
}

impl Particle {
    /// Create a particle at rest at `(x, y)`.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Vector2::new(x, y),
            velocity: Vector2::zeros(),
        }
    }

    /// Global cell index `(i, j)` containing this particle.
    #[must_use]
    pub fn cell(&self, dx: f64, dy: f64) -> (i64, i64) {
        (
            (self.position.x / dx).floor() as i64,
            (self.position.y / dy).floor() as i64,
        )
    }

    /// Sample the staggered velocity field at the particle position.
    ///
    /// u-values live at cell east faces `((i + 1)·dx, (j + 0.5)·dy)` and
    /// v-values at cell north faces `((i + 0.5)·dx, (j + 1)·dy)`, both in
    /// global cell indices; each component is interpolated bilinearly over
    /// its own four surrounding nodes.
    pub fn interpolate_velocity(&mut self, domain: &Domain, u: &Matrix, v: &Matrix) {
        let x = self.position.x;
        let y = self.position.y;

        self.velocity.x = bilinear(u, domain, x / domain.dx - 1.0, y / domain.dy - 0.5);
        self.velocity.y = bilinear(v, domain, x / domain.dx - 0.5, y / domain.dy - 1.0);
    }

    /// Advance the position by one explicit Euler step.
    pub fn advance(&mut self, dt: f64) {
        self.position += self.velocity * dt;
    }
}

/// Bilinear interpolation of `field` at fractional global node coordinates
/// `(a, b)`, clamping the four-node stencil to the locally stored extent.
fn bilinear(field: &Matrix, domain: &Domain, a: f64, b: f64) -> f64 {
    let a0 = a.floor();
    let b0 = b.floor();
    let fx = a - a0;
    let fy = b - b0;

    let sample = |da: i64, db: i64| -> f64 {
        let li = clamp_local(a0 as i64 + da, domain.imin, field.width());
        let lj = clamp_local(b0 as i64 + db, domain.jmin, field.height());
        field.at(li, lj)
    };

    sample(0, 0) * (1.0 - fx) * (1.0 - fy)
        + sample(1, 0) * fx * (1.0 - fy)
        + sample(0, 1) * (1.0 - fx) * fy
        + sample(1, 1) * fx * fy
}

/// Map a global node index to a local array index, clamped to the stored range.
fn clamp_local(global: i64, offset: usize, extent: usize) -> usize {
    let local = global - offset as i64;
    local.clamp(0, extent as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decompose;
    use approx::assert_relative_eq;

    fn unit_domain(size: usize) -> Domain {
        let h = 1.0 / size as f64;
        decompose(size, size, 1, 1, h, h, 0)
    }

    #[test]
    fn test_uniform_field_interpolates_exactly() {
        let domain = unit_domain(8);
        let u = Matrix::with_value(8, 8, 2.5);
        let v = Matrix::with_value(8, 8, -1.25);
        let mut p = Particle::new(0.4, 0.6);
        p.interpolate_velocity(&domain, &u, &v);
        assert_relative_eq!(p.velocity.x, 2.5, epsilon = 1e-12);
        assert_relative_eq!(p.velocity.y, -1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_u_field_interpolates_exactly() {
        // u(i, j) = x-position of the face => sampling reproduces x.
        let domain = unit_domain(8);
        let dx = domain.dx;
        let mut u = Matrix::new(8, 8);
        for j in 0..u.height() {
            for i in 0..u.width() {
                u.set(i, j, (i + 1) as f64 * dx);
            }
        }
        let v = Matrix::new(8, 8);
        // Stay well inside the domain so the stencil is not clamped.
        let mut p = Particle::new(0.47, 0.52);
        p.interpolate_velocity(&domain, &u, &v);
        assert_relative_eq!(p.velocity.x, 0.47, epsilon = 1e-12);
    }

    #[test]
    fn test_advance_is_explicit_euler() {
        let mut p = Particle::new(1.0, 2.0);
        p.velocity = Vector2::new(0.5, -0.25);
        p.advance(0.2);
        assert_relative_eq!(p.position.x, 1.1, epsilon = 1e-12);
        assert_relative_eq!(p.position.y, 1.95, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_domain_sample_clamps() {
        let domain = unit_domain(4);
        let u = Matrix::with_value(4, 4, 3.0);
        let v = Matrix::with_value(4, 4, 3.0);
        let mut p = Particle::new(-5.0, 10.0);
        p.interpolate_velocity(&domain, &u, &v);
        assert_relative_eq!(p.velocity.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.velocity.y, 3.0, epsilon = 1e-12);
    }
}
