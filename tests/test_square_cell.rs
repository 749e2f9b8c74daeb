use ale_hydro::{
    forces::{cell_work, gather_node_forces, pressure_forces},
    gas_law::GasLaw,
    geometry::cell_volume,
    halo::reflect_velocities,
    sub_cell::SubCellField,
    Engine, HydroError, LagrangianParams, PredictorCorrectorRunner, Runner,
};
use common::unit_square;
use float_cmp::assert_approx_eq;
use glam::DVec2;

#[macro_use]
mod common;

#[test]
fn test_single_step() {
    let (mesh, mut state) = unit_square(1., 2.5);
    let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
    let dt = runner.initial_timestep(&mesh, &state);
    assert_approx_eq!(f64, dt, 0.5 / 1.4f64.sqrt());

    let report = runner.step(&mesh, &mut state, dt, 0).unwrap();

    // the bottom edge is a wall and keeps its length, so the predicted bound is the initial one
    assert_eq!(report.dt, dt);
    assert_approx_eq!(f64, report.dt_predicted, dt);
    assert_approx_eq!(f64, report.total_mass, 1.);
    assert!(report.dt_next > 0.);

    // walls stay put
    assert_eq!(state.nodes[0], DVec2::ZERO);
    assert_eq!(state.nodes[1], DVec2::X);
    assert_eq!(state.velocity[0], DVec2::ZERO);
    assert_eq!(state.velocity[1], DVec2::ZERO);

    // the gas expands upwards and sideways, symmetrically
    assert!(state.nodes[2].x > 1.);
    assert!(state.nodes[2].y > 1.);
    assert!(state.nodes[3].x < 0.);
    assert_approx_eq!(f64, state.nodes[2].x - 1., -state.nodes[3].x, epsilon = 1e-12);
    assert_approx_eq!(f64, state.nodes[2].y, state.nodes[3].y, epsilon = 1e-12);
    assert_approx_eq_dvec2!(
        state.velocity[2],
        DVec2::new(-state.velocity[3].x, state.velocity[3].y),
        epsilon = 1e-12
    );

    // Lagrangian mass is fixed, so the cell got lighter and colder
    assert_approx_eq!(f64, state.cell_mass[0], 1.);
    let volume = cell_volume(mesh.topology(), &state.nodes, 0);
    assert!(volume > 1.);
    assert_approx_eq!(f64, state.density[0], 1. / volume, epsilon = 1e-14);
    assert!(state.energy[0] < 2.5);
    assert_approx_eq!(
        f64,
        state.pressure[0],
        0.4 * state.density[0] * state.energy[0],
        epsilon = 1e-14
    );

    // no node leaves the neighbourhood of the initial cell
    for node in state.nodes.iter() {
        assert!(node.cmpge(DVec2::splat(-0.5)).all() && node.cmple(DVec2::splat(1.5)).all());
    }
}

#[test]
fn test_corrector_velocity() {
    // rebuild the step by hand: without compression there is no viscosity and the forces are
    // pure pressure forces
    let (mesh, mut state) = unit_square(1., 2.5);
    let topology = mesh.topology();
    let gas_law = GasLaw::default();
    let x0 = state.nodes.clone();
    let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
    let dt = runner.initial_timestep(&mesh, &state);
    runner.step(&mesh, &mut state, dt, 0).unwrap();
    let mass = runner.workspace().nodal_mass().to_vec();

    let forces = |positions: &[DVec2], pressure: f64| {
        let mut cell_force = SubCellField::new(topology, DVec2::ZERO);
        pressure_forces(topology, positions, &[pressure], &mut cell_force);
        let mut node_force = vec![DVec2::ZERO; 4];
        gather_node_forces(topology, &cell_force, &mut node_force);
        (cell_force, node_force)
    };

    // predictor
    let p0 = gas_law.gas_pressure_from_internal_energy(2.5, 1.);
    let (cell_force0, force0) = forces(&x0, p0);
    let mut v_pred: Vec<DVec2> = force0
        .iter()
        .zip(mass.iter())
        .map(|(&f, &m)| 0.5 * dt * f / m)
        .collect();
    reflect_velocities(mesh.node_halo(), &mut v_pred);
    let x1: Vec<DVec2> = x0.iter().zip(v_pred.iter()).map(|(&x, &v)| x + dt * v).collect();
    let e1 = 2.5 - dt * cell_work(topology, &cell_force0, &v_pred, 0);
    let rho1 = 1. / cell_volume(topology, &x1, 0);
    let p1 = 0.5 * (p0 + gas_law.gas_pressure_from_internal_energy(e1, rho1));
    let x_half: Vec<DVec2> = x0.iter().zip(x1.iter()).map(|(&a, &b)| 0.5 * (a + b)).collect();

    // corrector: kick the predicted velocity and average with the (zero) initial one
    let (cell_force1, force1) = forces(&x_half, p1);
    let mut v_final: Vec<DVec2> = v_pred
        .iter()
        .zip(force1.iter().zip(mass.iter()))
        .map(|(&v, (&f, &m))| 0.5 * (v + dt * f / m))
        .collect();
    reflect_velocities(mesh.node_halo(), &mut v_final);
    let e_final = 2.5 - dt * cell_work(topology, &cell_force1, &v_final, 0);

    for node in 0..4 {
        assert_approx_eq_dvec2!(state.velocity[node], v_final[node], epsilon = 1e-12);
        assert_approx_eq_dvec2!(state.nodes[node], x0[node] + dt * v_final[node], epsilon = 1e-12);
    }
    assert_approx_eq!(f64, state.energy[0], e_final, epsilon = 1e-12);
    assert!(state.velocity[2].x > 0.);
}

#[test]
fn test_rejects_unstable_timestep() {
    let (mesh, mut state) = unit_square(1., 2.5);
    let before = state.clone();
    let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
    let dt = runner.initial_timestep(&mesh, &state);

    let err = runner.step(&mesh, &mut state, 1.5 * dt, 3).unwrap_err();
    assert!(err.is_recoverable());
    match err {
        HydroError::CflViolation {
            step,
            requested,
            stable,
        } => {
            assert_eq!(step, 3);
            assert_eq!(requested, 1.5 * dt);
            assert_approx_eq!(f64, stable, dt);
        }
        err => panic!("Unexpected error: {err}"),
    }

    assert_eq!(state.nodes, before.nodes);
    assert_eq!(state.velocity, before.velocity);
    assert_eq!(state.density, before.density);
    assert_eq!(state.energy, before.energy);
}

#[test]
fn test_run() {
    let (mesh, mut state) = unit_square(1., 2.5);
    let runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
    let mut engine = Engine::new(Box::new(runner), 1., 1e-6, 1., 3, 0.1);
    engine.run(&mesh, &mut state).unwrap();

    assert_eq!(engine.t_current(), 1.);
    assert!(engine.step_count() >= 2);
    assert_approx_eq!(f64, state.total_mass(&mesh), 1., epsilon = 1e-12);
    assert_eq!(state.nodes[0], DVec2::ZERO);
    assert_eq!(state.nodes[1], DVec2::X);
    assert!(state.energy[0] > 0. && state.energy[0] < 2.5);
    assert!(state.density[0] > 0. && state.density[0] < 1.);
}
