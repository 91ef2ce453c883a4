//! End-to-end solver scenarios: rest state, mass conservation, lid-driven
//! cavity circulation, pure conduction, and a particle-tracked dam break.

use fluid_sim_core::comm::CommHub;
use fluid_sim_core::grid::Geometry;
use fluid_sim_core::simulation::{
    NullSink, Simulation, Snapshot, SnapshotSink, SolverConfig,
};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn single_rank(config: &SolverConfig, geometry: &Geometry) -> Simulation {
    init_logging();
    let mut comms = CommHub::create(1);
    Simulation::new(config, geometry, comms.remove(0)).expect("valid configuration")
}

#[test]
fn rest_state_is_a_fixed_point() {
    // No body force, no wall motion, initialized at rest: one step must
    // leave velocity and pressure untouched.
    let mut config = SolverConfig::lid_driven_cavity(8, 8);
    config.wall_velocity = 0.0;
    config.t_end = config.dt * 0.5; // exactly one step
    let geometry = Geometry::lid_driven_cavity(8, 8);
    let mut sim = single_rank(&config, &geometry);
    sim.simulate(&mut NullSink).unwrap();

    for &(i, j) in sim.grid().fluid_cells() {
        assert_eq!(sim.fields().u(i, j), 0.0, "u drifted at ({i}, {j})");
        assert_eq!(sim.fields().v(i, j), 0.0, "v drifted at ({i}, {j})");
        assert_eq!(sim.fields().p(i, j), 0.0, "p drifted at ({i}, {j})");
    }
}

#[test]
fn converged_flow_conserves_mass() {
    let mut config = SolverConfig::lid_driven_cavity(16, 16);
    config.t_end = 0.5;
    config.itermax = 2000;
    let geometry = Geometry::lid_driven_cavity(16, 16);
    let mut sim = single_rank(&config, &geometry);
    sim.simulate(&mut NullSink).unwrap();

    let dx = sim.grid().dx();
    let dy = sim.grid().dy();
    let mut total_divergence = 0.0;
    for &(i, j) in sim.grid().fluid_cells() {
        total_divergence += (sim.fields().u(i, j) - sim.fields().u(i - 1, j)) / dx
            + (sim.fields().v(i, j) - sim.fields().v(i, j - 1)) / dy;
    }
    assert!(
        total_divergence.abs() < config.eps,
        "net divergence {total_divergence} exceeds tolerance {}",
        config.eps
    );
}

#[test]
fn lid_driven_cavity_develops_circulation() {
    let mut config = SolverConfig::lid_driven_cavity(20, 20);
    config.t_end = 3.0;
    config.itermax = 2000;
    let geometry = Geometry::lid_driven_cavity(20, 20);
    let mut sim = single_rank(&config, &geometry);
    sim.simulate(&mut NullSink).unwrap();

    // The flow moves, but nothing interior exceeds the lid speed.
    let mut u_max: f64 = 0.0;
    for &(i, j) in sim.grid().fluid_cells() {
        u_max = u_max.max(sim.fields().u(i, j).abs());
    }
    assert!(u_max > 0.0, "cavity never started moving");
    assert!(
        u_max < 1.0,
        "interior u magnitude {u_max} reached the lid velocity"
    );

    // A single clockwise vortex: downward flow near the right wall,
    // upward flow near the left wall, so v changes sign across the
    // vertical centerline.
    let v_left = sim.fields().v(5, 10);
    let v_right = sim.fields().v(15, 10);
    assert!(
        v_left * v_right < 0.0,
        "no sign change across the centerline: v_left {v_left}, v_right {v_right}"
    );
}

#[test]
fn held_walls_conduct_to_a_linear_temperature_profile() {
    // Hot left wall at 1, cold right wall at 0, no flow anywhere: after
    // many diffusion times the temperature is linear between the walls.
    let mut config = SolverConfig::heated_cavity(8, 8);
    config.beta = 0.0;
    config.gy = 0.0;
    config.nu = 0.01;
    config.re = 100.0;
    config.alpha = 0.1;
    config.ti = 0.5;
    config.t_end = 20.0;
    let mut temps = rustc_hash::FxHashMap::default();
    temps.insert(3, 1.0);
    temps.insert(4, 0.0);
    config.wall_temps = Some(temps);
    let geometry = Geometry::heated_cavity(8, 8);
    let mut sim = single_rank(&config, &geometry);
    sim.simulate(&mut NullSink).unwrap();

    let dx = sim.grid().dx();
    for &(i, j) in sim.grid().fluid_cells() {
        let x = (i as f64 - 0.5) * dx;
        let expected = 1.0 - x;
        let actual = sim.fields().t(i, j);
        assert!(
            (actual - expected).abs() < 1e-2,
            "T({i}, {j}) = {actual}, expected {expected}"
        );
        // No spurious flow from the temperature coupling.
        assert_eq!(sim.fields().u(i, j), 0.0);
        assert_eq!(sim.fields().v(i, j), 0.0);
    }
}

/// Records the particle count at every snapshot.
struct ParticleCounts(Vec<usize>);

impl SnapshotSink for ParticleCounts {
    fn write(&mut self, snapshot: &Snapshot<'_>) {
        self.0.push(snapshot.grid.particles().len());
    }
}

#[test]
fn dam_break_particle_count_never_increases() {
    let mut config = SolverConfig::dam_break(12, 12);
    config.ppc = 4;
    config.t_end = 0.25;
    config.output_interval = 0.01;
    let geometry = Geometry::dam_break(12, 12, 5, 8);
    let mut sim = single_rank(&config, &geometry);
    let mut counts = ParticleCounts(Vec::new());
    sim.simulate(&mut counts).unwrap();

    assert!(counts.0.len() > 2, "expected several snapshots");
    let initial = counts.0[0];
    assert!(initial > 0, "no particles were seeded");
    for pair in counts.0.windows(2) {
        assert!(
            pair[1] <= pair[0],
            "particle count increased from {} to {}",
            pair[0],
            pair[1]
        );
    }
    // The liquid is still in the box: walls are no-slip, so particles are
    // culled only at the global boundary, not in bulk.
    assert!(sim.grid().has_particles());
}
