//! Cell classification and per-sub-domain grid topology.
//!
//! A [`Geometry`] is the global classification of every cell, boundary ring
//! included; scenario constructors replace the external geometry-file loader.
//! Each worker slices its own [`Grid`] out of it. Cells are stored as a flat
//! array of tags; neighbor lookups are computed index offsets, never stored
//! references. The grid also owns the free-surface marker particles and the
//! fluid/surface/empty reclassification they drive.

use crate::domain::{Direction, Domain};
use crate::particle::Particle;

/// Physical classification of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// Interior cell carrying the flow.
    Fluid,
    /// Prescribed-velocity inflow cell.
    Inlet,
    /// Zero-gradient outflow cell.
    Outlet,
    /// No-slip wall, tagged with a wall ID for per-wall temperatures.
    FixedWall(u8),
    /// No-slip wall with zero-gradient temperature.
    Adiabatic,
    /// Zero normal velocity, zero-gradient tangential velocity.
    FreeSlip,
    /// Wall moving tangentially at a prescribed speed.
    MovingWall,
    /// Liquid cell bordering at least one empty cell.
    Surface,
    /// Gas-side cell of a free-surface run; carries no liquid.
    Empty,
}

impl CellType {
    /// Whether this cell participates in the momentum/pressure solve.
    #[must_use]
    pub fn is_fluid(self) -> bool {
        matches!(self, CellType::Fluid)
    }

    /// Whether the particle subsystem may reclassify this cell.
    #[must_use]
    pub fn is_reclassifiable(self) -> bool {
        matches!(self, CellType::Fluid | CellType::Surface | CellType::Empty)
    }
}

/// Global cell classification, `(imax + 2) × (jmax + 2)` with the boundary ring.
#[derive(Debug, Clone)]
pub struct Geometry {
    imax: usize,
    jmax: usize,
    kinds: Vec<CellType>,
}

impl Geometry {
    /// Build a geometry with every ring cell set to `ring` and every interior
    /// cell set by `classify(gi, gj)` over global interior indices. This is
    /// the escape hatch for shapes no preset covers, such as interior
    /// obstacles.
    #[must_use]
    pub fn from_fn(
        imax: usize,
        jmax: usize,
        ring: CellType,
        classify: impl Fn(usize, usize) -> CellType,
    ) -> Self {
        let width = imax + 2;
        let height = jmax + 2;
        let mut kinds = vec![ring; width * height];
        for gj in 1..=jmax {
            for gi in 1..=imax {
                kinds[gj * width + gi] = classify(gi, gj);
            }
        }
        Self { imax, jmax, kinds }
    }

    /// Closed cavity with a moving lid on top and no-slip walls elsewhere.
    #[must_use]
    pub fn lid_driven_cavity(imax: usize, jmax: usize) -> Self {
        let mut geo = Self::from_fn(imax, jmax, CellType::FixedWall(3), |_, _| CellType::Fluid);
        for gi in 0..imax + 2 {
            geo.kinds[(jmax + 1) * (imax + 2) + gi] = CellType::MovingWall;
        }
        geo
    }

    /// Closed cavity with a heated left wall (ID 3), a cooled right wall
    /// (ID 4), and adiabatic top/bottom walls. No wall moves.
    #[must_use]
    pub fn heated_cavity(imax: usize, jmax: usize) -> Self {
        let mut geo = Self::from_fn(imax, jmax, CellType::Adiabatic, |_, _| CellType::Fluid);
        let width = imax + 2;
        for gj in 0..jmax + 2 {
            geo.kinds[gj * width] = CellType::FixedWall(3);
            geo.kinds[gj * width + imax + 1] = CellType::FixedWall(4);
        }
        geo
    }

    /// Liquid column against the left wall of an otherwise empty box:
    /// fluid where `gi <= fill_x && gj <= fill_y`, no-slip walls all around.
    #[must_use]
    pub fn dam_break(imax: usize, jmax: usize, fill_x: usize, fill_y: usize) -> Self {
        Self::from_fn(imax, jmax, CellType::FixedWall(3), |gi, gj| {
            if gi <= fill_x && gj <= fill_y {
                CellType::Fluid
            } else {
                CellType::Empty
            }
        })
    }

    /// Plane channel: inlet along the left edge, outlet along the right,
    /// free-slip top, no-slip bottom. Ring corners stay no-slip walls.
    #[must_use]
    pub fn channel(imax: usize, jmax: usize) -> Self {
        let mut geo = Self::from_fn(imax, jmax, CellType::FixedWall(3), |_, _| CellType::Fluid);
        let width = imax + 2;
        for gj in 1..=jmax {
            geo.kinds[gj * width] = CellType::Inlet;
            geo.kinds[gj * width + imax + 1] = CellType::Outlet;
        }
        for gi in 1..=imax {
            geo.kinds[(jmax + 1) * width + gi] = CellType::FreeSlip;
        }
        geo
    }

    /// Interior cells in x.
    #[must_use]
    pub fn imax(&self) -> usize {
        self.imax
    }

    /// Interior cells in y.
    #[must_use]
    pub fn jmax(&self) -> usize {
        self.jmax
    }

    /// Classification of global cell `(gi, gj)`, ring included.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the global extent.
    #[must_use]
    pub fn at(&self, gi: usize, gj: usize) -> CellType {
        assert!(gi < self.imax + 2 && gj < self.jmax + 2, "index out of bounds");
        self.kinds[gj * (self.imax + 2) + gi]
    }
}

/// Per-type cell coordinate sets, rebuilt after every reclassification.
#[derive(Debug, Default, Clone)]
struct CellSets {
    fluid: Vec<(usize, usize)>,
    surface: Vec<(usize, usize)>,
    inlet: Vec<(usize, usize)>,
    outlet: Vec<(usize, usize)>,
    fixed_wall: Vec<(usize, usize)>,
    adiabatic: Vec<(usize, usize)>,
    free_slip: Vec<(usize, usize)>,
    moving_wall: Vec<(usize, usize)>,
}

/// One sub-domain's cells, cell sets, and marker particles.
#[derive(Debug, Clone)]
pub struct Grid {
    domain: Domain,
    /// Flat `(size_x + 2) × (size_y + 2)` tag array, row-major.
    kinds: Vec<CellType>,
    sets: CellSets,
    particles: Vec<Particle>,
}

impl Grid {
    /// Slice this rank's grid out of the global geometry.
    #[must_use]
    pub fn new(domain: Domain, geometry: &Geometry) -> Self {
        let width = domain.size_x + 2;
        let height = domain.size_y + 2;
        let mut kinds = Vec::with_capacity(width * height);
        for j in 0..height {
            for i in 0..width {
                kinds.push(geometry.at(domain.imin + i, domain.jmin + j));
            }
        }
        let mut grid = Self {
            domain,
            kinds,
            sets: CellSets::default(),
            particles: Vec::new(),
        };
        grid.promote_surface_cells();
        grid.rebuild_sets();
        grid
    }

    /// The owning sub-domain descriptor.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Cell spacing in x.
    #[must_use]
    pub fn dx(&self) -> f64 {
        self.domain.dx
    }

    /// Cell spacing in y.
    #[must_use]
    pub fn dy(&self) -> f64 {
        self.domain.dy
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let width = self.domain.size_x + 2;
        assert!(i < width && j < self.domain.size_y + 2, "index out of bounds");
        j * width + i
    }

    /// Classification of local cell `(i, j)`.
    #[must_use]
    pub fn cell_type(&self, i: usize, j: usize) -> CellType {
        self.kinds[self.index(i, j)]
    }

    /// Classification of the neighbor of `(i, j)` in `dir`, or `None` when
    /// the neighbor falls outside the stored extent.
    #[must_use]
    pub fn neighbor_type(&self, i: usize, j: usize, dir: Direction) -> Option<CellType> {
        let (ni, nj) = match dir {
            Direction::East => (i + 1, j),
            Direction::North => (i, j + 1),
            Direction::West => (i.checked_sub(1)?, j),
            Direction::South => (i, j.checked_sub(1)?),
        };
        if ni < self.domain.size_x + 2 && nj < self.domain.size_y + 2 {
            Some(self.cell_type(ni, nj))
        } else {
            None
        }
    }

    /// Interior fluid cells (surface cells are kept separate).
    #[must_use]
    pub fn fluid_cells(&self) -> &[(usize, usize)] {
        &self.sets.fluid
    }

    /// Interior surface cells of a free-surface run.
    #[must_use]
    pub fn surface_cells(&self) -> &[(usize, usize)] {
        &self.sets.surface
    }

    /// Inlet cells.
    #[must_use]
    pub fn inlet_cells(&self) -> &[(usize, usize)] {
        &self.sets.inlet
    }

    /// Outlet cells.
    #[must_use]
    pub fn outlet_cells(&self) -> &[(usize, usize)] {
        &self.sets.outlet
    }

    /// No-slip wall cells of every wall ID.
    #[must_use]
    pub fn fixed_wall_cells(&self) -> &[(usize, usize)] {
        &self.sets.fixed_wall
    }

    /// Adiabatic wall cells.
    #[must_use]
    pub fn adiabatic_cells(&self) -> &[(usize, usize)] {
        &self.sets.adiabatic
    }

    /// Free-slip cells.
    #[must_use]
    pub fn free_slip_cells(&self) -> &[(usize, usize)] {
        &self.sets.free_slip
    }

    /// Moving-wall cells.
    #[must_use]
    pub fn moving_wall_cells(&self) -> &[(usize, usize)] {
        &self.sets.moving_wall
    }

    /// The marker particles owned by this sub-domain.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to the marker particles.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Whether the free-surface extension is active on this rank.
    #[must_use]
    pub fn has_particles(&self) -> bool {
        !self.particles.is_empty()
    }

    /// Remove and return every particle for which `departed` returns true,
    /// preserving the order of the kept particles.
    pub fn drain_particles_where(
        &mut self,
        mut departed: impl FnMut(&Particle) -> bool,
    ) -> Vec<Particle> {
        let mut kept = Vec::with_capacity(self.particles.len());
        let mut out = Vec::new();
        for p in self.particles.drain(..) {
            if departed(&p) {
                out.push(p);
            } else {
                kept.push(p);
            }
        }
        self.particles = kept;
        out
    }

    /// Take ownership of particles handed over by a neighboring sub-domain.
    pub fn absorb_particles(&mut self, incoming: Vec<Particle>) {
        self.particles.extend(incoming);
    }

    /// Seed `ppc` particles into every interior fluid and surface cell, laid
    /// out on a uniform lattice inside each cell.
    pub fn seed_particles(&mut self, ppc: usize) {
        if ppc == 0 {
            return;
        }
        let side = (ppc as f64).sqrt().ceil() as usize;
        let dx = self.domain.dx;
        let dy = self.domain.dy;
        let cells: Vec<(usize, usize)> = self
            .sets
            .fluid
            .iter()
            .chain(self.sets.surface.iter())
            .copied()
            .collect();
        for (i, j) in cells {
            let gi = (self.domain.imin + i) as f64;
            let gj = (self.domain.jmin + j) as f64;
            for k in 0..ppc {
                let fx = ((k % side) as f64 + 0.5) / side as f64;
                let fy = ((k / side) as f64 + 0.5) / side as f64;
                self.particles.push(Particle::new((gi + fx) * dx, (gj + fy) * dy));
            }
        }
    }

    /// Remove particles that left the liquid region: outside this
    /// sub-domain's interior span, or inside a free-slip cell.
    ///
    /// Particles that crossed a seam must be handed to the owning neighbor
    /// before culling; anything still outside the span afterwards has left
    /// through a global domain boundary.
    pub fn cull_particles(&mut self) {
        let dx = self.domain.dx;
        let dy = self.domain.dy;
        let x_min = (self.domain.imin + 1) as f64 * dx;
        let x_max = (self.domain.imax - 1) as f64 * dx;
        let y_min = (self.domain.jmin + 1) as f64 * dy;
        let y_max = (self.domain.jmax - 1) as f64 * dy;
        let imin = self.domain.imin as i64;
        let jmin = self.domain.jmin as i64;
        let width = self.domain.size_x + 2;
        let kinds = &self.kinds;
        self.particles.retain(|p| {
            if p.position.x < x_min
                || p.position.x > x_max
                || p.position.y < y_min
                || p.position.y > y_max
            {
                return false;
            }
            let (gi, gj) = p.cell(dx, dy);
            let li = (gi - imin) as usize;
            let lj = (gj - jmin) as usize;
            kinds[lj * width + li] != CellType::FreeSlip
        });
    }

    /// Local cell index containing `particle`, if it lies inside the stored
    /// extent of this sub-domain.
    #[must_use]
    pub fn particle_cell(&self, particle: &Particle) -> Option<(usize, usize)> {
        let (gi, gj) = particle.cell(self.domain.dx, self.domain.dy);
        let li = gi - self.domain.imin as i64;
        let lj = gj - self.domain.jmin as i64;
        if li >= 0
            && lj >= 0
            && (li as usize) < self.domain.size_x + 2
            && (lj as usize) < self.domain.size_y + 2
        {
            Some((li as usize, lj as usize))
        } else {
            None
        }
    }

    /// Reclassify fluid/surface/empty cells from particle occupancy.
    ///
    /// Occupancy is counted into a snapshot first, then cell tags are updated
    /// from the snapshot, so the particle list is never read while tags
    /// change. A cell with no particles becomes empty; an occupied cell
    /// becomes fluid, or surface when any cardinal neighbor is empty. Wall,
    /// inlet, and outlet cells are never touched.
    pub fn reclassify_from_particles(&mut self) {
        let width = self.domain.size_x + 2;
        let height = self.domain.size_y + 2;

        let mut occupancy = vec![0_u32; width * height];
        for p in &self.particles {
            let (gi, gj) = p.cell(self.domain.dx, self.domain.dy);
            let li = gi - self.domain.imin as i64;
            let lj = gj - self.domain.jmin as i64;
            if li >= 0 && lj >= 0 && (li as usize) < width && (lj as usize) < height {
                occupancy[lj as usize * width + li as usize] += 1;
            }
        }

        for j in 1..=self.domain.size_y {
            for i in 1..=self.domain.size_x {
                let idx = j * width + i;
                if self.kinds[idx].is_reclassifiable() {
                    self.kinds[idx] = if occupancy[idx] == 0 {
                        CellType::Empty
                    } else {
                        CellType::Fluid
                    };
                }
            }
        }
        self.promote_surface_cells();
        self.rebuild_sets();
    }

    /// Tag every fluid cell with an empty cardinal neighbor as surface.
    fn promote_surface_cells(&mut self) {
        let width = self.domain.size_x + 2;
        let mut surface = Vec::new();
        for j in 1..=self.domain.size_y {
            for i in 1..=self.domain.size_x {
                if self.kinds[j * width + i] != CellType::Fluid {
                    continue;
                }
                let empty_neighbor = Direction::ALL
                    .iter()
                    .any(|&d| self.neighbor_type(i, j, d) == Some(CellType::Empty));
                if empty_neighbor {
                    surface.push((i, j));
                }
            }
        }
        for (i, j) in surface {
            self.kinds[j * width + i] = CellType::Surface;
        }
    }

    /// Rebuild the per-type coordinate sets. Fluid and surface sets cover
    /// interior cells only; boundary sets include the ring.
    fn rebuild_sets(&mut self) {
        let mut sets = CellSets::default();
        let width = self.domain.size_x + 2;
        let height = self.domain.size_y + 2;
        for j in 0..height {
            for i in 0..width {
                let interior =
                    i >= 1 && i <= self.domain.size_x && j >= 1 && j <= self.domain.size_y;
                match self.kinds[j * width + i] {
                    CellType::Fluid if interior => sets.fluid.push((i, j)),
                    CellType::Surface if interior => sets.surface.push((i, j)),
                    CellType::Inlet => sets.inlet.push((i, j)),
                    CellType::Outlet => sets.outlet.push((i, j)),
                    CellType::FixedWall(_) => sets.fixed_wall.push((i, j)),
                    CellType::Adiabatic => sets.adiabatic.push((i, j)),
                    CellType::FreeSlip => sets.free_slip.push((i, j)),
                    CellType::MovingWall => sets.moving_wall.push((i, j)),
                    _ => {}
                }
            }
        }
        self.sets = sets;
    }
}
