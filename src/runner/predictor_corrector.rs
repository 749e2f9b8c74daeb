use glam::DVec2;
use rayon::prelude::*;

use super::{LagrangianParams, Runner, StepReport};
use crate::{
    accumulator::{
        cell_masses, check_sub_cell_volumes, equation_of_state, gather_nodal_mass,
        gather_nodal_volume_and_soundspeed,
    },
    errors::{HydroError, HydroResult},
    forces::{cell_work, gather_node_forces, pressure_forces},
    geometry::{cell_volume, compute_centroids, compute_sub_cell_volumes},
    halo::{fill_cell_halo, reflect_velocities},
    mesh::UnstructuredMesh,
    state::HydroState,
    sub_cell::SubCellField,
    timestep::cfl_timestep,
    viscosity::{apply_edge_forces, edge_forces, NodalFields},
};

/// Relative slack allowed between the requested timestep and the CFL bound of the predicted
/// configuration.
const CFL_TOLERANCE: f64 = 1e-12;

/// Preallocated buffers of the Lagrangian step.
///
/// All intermediate and staged results of a step live here, so a failing step never touches the
/// [`HydroState`] and no step allocates.
#[derive(Debug, Clone)]
pub struct Workspace {
    centroids: Vec<DVec2>,
    sub_cell_volume: SubCellField<f64>,
    cell_force: SubCellField<DVec2>,
    edge_force: SubCellField<DVec2>,
    nodal_mass: Vec<f64>,
    nodal_volume: Vec<f64>,
    nodal_soundspeed: Vec<f64>,
    node_force: Vec<DVec2>,
    cell_mass: Vec<f64>,
    pressure0: Vec<f64>,
    // predictor
    nodes1: Vec<DVec2>,
    velocity1: Vec<DVec2>,
    energy1: Vec<f64>,
    density1: Vec<f64>,
    pressure1: Vec<f64>,
    // staged end of step state
    nodes: Vec<DVec2>,
    velocity: Vec<DVec2>,
    energy: Vec<f64>,
    density: Vec<f64>,
    pressure: Vec<f64>,
}

impl Workspace {
    pub fn new(mesh: &UnstructuredMesh) -> Self {
        let topology = mesh.topology();
        let nnodes = mesh.nnodes();
        let ncells = mesh.ncells();
        Self {
            centroids: vec![DVec2::ZERO; ncells],
            sub_cell_volume: SubCellField::new(topology, 0.),
            cell_force: SubCellField::new(topology, DVec2::ZERO),
            edge_force: SubCellField::new(topology, DVec2::ZERO),
            nodal_mass: vec![0.; nnodes],
            nodal_volume: vec![0.; nnodes],
            nodal_soundspeed: vec![0.; nnodes],
            node_force: vec![DVec2::ZERO; nnodes],
            cell_mass: vec![0.; ncells],
            pressure0: vec![0.; ncells],
            nodes1: vec![DVec2::ZERO; nnodes],
            velocity1: vec![DVec2::ZERO; nnodes],
            energy1: vec![0.; ncells],
            density1: vec![0.; ncells],
            pressure1: vec![0.; ncells],
            nodes: vec![DVec2::ZERO; nnodes],
            velocity: vec![DVec2::ZERO; nnodes],
            energy: vec![0.; ncells],
            density: vec![0.; ncells],
            pressure: vec![0.; ncells],
        }
    }

    /// Nodal mass of the last step
    pub fn nodal_mass(&self) -> &[f64] {
        &self.nodal_mass
    }

    /// Nodal volume of the last corrector pass
    pub fn nodal_volume(&self) -> &[f64] {
        &self.nodal_volume
    }

    pub fn nodal_soundspeed(&self) -> &[f64] {
        &self.nodal_soundspeed
    }

    /// Total nodal force (pressure and viscosity) of the last corrector pass
    pub fn node_force(&self) -> &[DVec2] {
        &self.node_force
    }

    pub fn sub_cell_volume(&self) -> &SubCellField<f64> {
        &self.sub_cell_volume
    }

    pub fn centroids(&self) -> &[DVec2] {
        &self.centroids
    }

    fn check_sizes(&self, state: &HydroState) -> HydroResult<()> {
        let nnodes = self.nodal_mass.len();
        let ncells = self.cell_mass.len();
        let checks = [
            ("nodes", state.nodes.len(), nnodes),
            ("velocity", state.velocity.len(), nnodes),
            ("limiter", state.limiter.len(), nnodes),
            ("density", state.density.len(), ncells),
            ("energy", state.energy.len(), ncells),
            ("pressure", state.pressure.len(), ncells),
            ("cell_mass", state.cell_mass.len(), ncells),
        ];
        for (field, found, expected) in checks {
            if found != expected {
                return Err(HydroError::SizeMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Swap the staged end of step state into `state`.
    fn commit(&mut self, state: &mut HydroState) {
        std::mem::swap(&mut state.nodes, &mut self.nodes);
        std::mem::swap(&mut state.velocity, &mut self.velocity);
        std::mem::swap(&mut state.energy, &mut self.energy);
        std::mem::swap(&mut state.density, &mut self.density);
        std::mem::swap(&mut state.pressure, &mut self.pressure);
        state.cell_mass.copy_from_slice(&self.cell_mass);
    }
}

/// Update the velocities with the nodal forces, `v = v_base + dt * F / m`. Nodes without mass
/// keep their base velocity.
fn kick(
    velocity_base: &[DVec2],
    node_force: &[DVec2],
    nodal_mass: &[f64],
    dt: f64,
    velocity_end: &mut [DVec2],
) {
    velocity_end
        .par_iter_mut()
        .enumerate()
        .for_each(|(node, v)| {
            let m = nodal_mass[node];
            *v = if m > 0. {
                velocity_base[node] + dt * node_force[node] / m
            } else {
                velocity_base[node]
            };
        });
}

fn time_centre(velocity0: &[DVec2], velocity_end: &[DVec2], velocity: &mut [DVec2]) {
    velocity
        .par_iter_mut()
        .zip(velocity0.par_iter().zip(velocity_end.par_iter()))
        .for_each(|(v, (v0, v_end))| *v = 0.5 * (*v0 + *v_end));
}

/// `v = (v0 + v) / 2`
fn average_with(velocity0: &[DVec2], velocity: &mut [DVec2]) {
    velocity
        .par_iter_mut()
        .zip(velocity0.par_iter())
        .for_each(|(v, v0)| *v = 0.5 * (*v0 + *v));
}

fn drift(nodes0: &[DVec2], velocity: &[DVec2], dt: f64, nodes: &mut [DVec2]) {
    nodes
        .par_iter_mut()
        .zip(nodes0.par_iter().zip(velocity.par_iter()))
        .for_each(|(x, (x0, v))| *x = *x0 + dt * *v);
}

/// `e = e0 - dt * sum(v . F) / m` for all interior cells.
fn update_energy(
    mesh: &UnstructuredMesh,
    cell_force: &SubCellField<DVec2>,
    velocity: &[DVec2],
    cell_mass: &[f64],
    energy0: &[f64],
    dt: f64,
    energy: &mut [f64],
) {
    let topology = mesh.topology();
    energy
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, e)| {
            if mesh.is_interior_cell(cell) {
                *e = energy0[cell]
                    - dt * cell_work(topology, cell_force, velocity, cell) / cell_mass[cell];
            }
        });
    fill_cell_halo(mesh.cell_halo(), energy);
}

/// `rho = m / V` for all interior cells, with `V` the polygon area of the cell.
fn update_density(
    mesh: &UnstructuredMesh,
    nodes: &[DVec2],
    cell_mass: &[f64],
    density: &mut [f64],
    step: u64,
) -> HydroResult<()> {
    let topology = mesh.topology();
    density
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(cell, rho)| {
            if !mesh.is_interior_cell(cell) {
                return Ok(());
            }
            let volume = cell_volume(topology, nodes, cell);
            if !(volume.is_finite() && volume > 0.) {
                return Err(HydroError::DegenerateCell {
                    step,
                    cell,
                    quantity: "cell volume",
                    value: volume,
                });
            }
            *rho = cell_mass[cell] / volume;
            Ok(())
        })?;
    fill_cell_halo(mesh.cell_halo(), density);
    Ok(())
}

/// Compute the pressure and viscous forces on the nodes for the configuration `nodes`.
///
/// Expects the centroids, sub-cell volumes and nodal quantities of that configuration to be up to
/// date in the workspace.
fn assemble_forces(
    mesh: &UnstructuredMesh,
    params: &LagrangianParams,
    workspace: &mut Workspace,
    nodes: &[DVec2],
    velocity: &[DVec2],
    pressure: &[f64],
    limiter: &[f64],
) {
    let topology = mesh.topology();
    pressure_forces(topology, nodes, pressure, &mut workspace.cell_force);
    gather_node_forces(topology, &workspace.cell_force, &mut workspace.node_force);

    let nodal = NodalFields {
        mass: &workspace.nodal_mass,
        volume: &workspace.nodal_volume,
        soundspeed: &workspace.nodal_soundspeed,
    };
    edge_forces(
        mesh,
        &params.viscosity,
        &params.gas_law,
        nodes,
        &workspace.centroids,
        velocity,
        nodal,
        limiter,
        &mut workspace.edge_force,
    );
    apply_edge_forces(topology, &workspace.edge_force, &mut workspace.node_force);
}

/// Advance `state` by one predictor-corrector step of size `dt`.
///
/// The predictor moves the mesh with the forces of the initial configuration to obtain time
/// centred positions and pressures. The corrector recomputes the forces there and produces the
/// final velocities, positions, energies and densities. The step is rejected with a recoverable
/// [`HydroError::CflViolation`] if `dt` exceeds the CFL bound of the predicted configuration. On
/// any error, `state` is left untouched.
pub fn advance_lagrangian_step(
    mesh: &UnstructuredMesh,
    state: &mut HydroState,
    workspace: &mut Workspace,
    params: &LagrangianParams,
    dt: f64,
    step: u64,
) -> HydroResult<StepReport> {
    workspace.check_sizes(state)?;
    if let Some((node, &value)) = state
        .limiter
        .iter()
        .enumerate()
        .find(|(_, &value)| !(0. ..=1.).contains(&value))
    {
        return Err(HydroError::InvalidLimiter { node, value });
    }

    let topology = mesh.topology();
    let gas_law = &params.gas_law;

    // Predictor
    equation_of_state(
        mesh,
        gas_law,
        &state.density,
        &state.energy,
        &mut workspace.pressure0,
        step,
    )?;
    compute_centroids(topology, &state.nodes, &mut workspace.centroids);
    compute_sub_cell_volumes(
        topology,
        &state.nodes,
        &workspace.centroids,
        &mut workspace.sub_cell_volume,
    );
    check_sub_cell_volumes(mesh, &workspace.sub_cell_volume, step)?;

    let total_mass = cell_masses(
        mesh,
        &state.density,
        &workspace.sub_cell_volume,
        &mut workspace.cell_mass,
    );
    log::debug!("Step {step}: total mass {total_mass:.12e}");
    gather_nodal_mass(
        mesh,
        &state.density,
        &workspace.sub_cell_volume,
        &mut workspace.nodal_mass,
    );
    gather_nodal_volume_and_soundspeed(
        mesh,
        gas_law,
        &state.energy,
        &workspace.sub_cell_volume,
        &mut workspace.nodal_volume,
        &mut workspace.nodal_soundspeed,
        step,
    )?;

    let pressure0 = std::mem::take(&mut workspace.pressure0);
    assemble_forces(
        mesh,
        params,
        workspace,
        &state.nodes,
        &state.velocity,
        &pressure0,
        &state.limiter,
    );
    workspace.pressure0 = pressure0;

    kick(
        &state.velocity,
        &workspace.node_force,
        &workspace.nodal_mass,
        dt,
        &mut workspace.velocity,
    );
    time_centre(&state.velocity, &workspace.velocity, &mut workspace.velocity1);
    reflect_velocities(mesh.node_halo(), &mut workspace.velocity1);
    drift(
        &state.nodes,
        &workspace.velocity1,
        dt,
        &mut workspace.nodes1,
    );
    update_energy(
        mesh,
        &workspace.cell_force,
        &workspace.velocity1,
        &workspace.cell_mass,
        &state.energy,
        dt,
        &mut workspace.energy1,
    );

    let dt_predicted = cfl_timestep(mesh, gas_law, &workspace.nodes1, &state.energy, params.cfl);
    log::debug!("Step {step}: predicted CFL timestep {dt_predicted:.6e}");
    if dt > dt_predicted * (1. + CFL_TOLERANCE) {
        return Err(HydroError::CflViolation {
            step,
            requested: dt,
            stable: dt_predicted,
        });
    }

    update_density(
        mesh,
        &workspace.nodes1,
        &workspace.cell_mass,
        &mut workspace.density1,
        step,
    )?;
    equation_of_state(
        mesh,
        gas_law,
        &workspace.density1,
        &workspace.energy1,
        &mut workspace.pressure1,
        step,
    )?;
    workspace
        .pressure1
        .par_iter_mut()
        .zip(workspace.pressure0.par_iter())
        .for_each(|(p1, p0)| *p1 = 0.5 * (*p0 + *p1));
    workspace
        .nodes1
        .par_iter_mut()
        .zip(state.nodes.par_iter())
        .for_each(|(x1, x0)| *x1 = 0.5 * (*x1 + *x0));

    // Corrector, on the time centred configuration
    compute_centroids(topology, &workspace.nodes1, &mut workspace.centroids);
    compute_sub_cell_volumes(
        topology,
        &workspace.nodes1,
        &workspace.centroids,
        &mut workspace.sub_cell_volume,
    );
    check_sub_cell_volumes(mesh, &workspace.sub_cell_volume, step)?;
    gather_nodal_volume_and_soundspeed(
        mesh,
        gas_law,
        &workspace.energy1,
        &workspace.sub_cell_volume,
        &mut workspace.nodal_volume,
        &mut workspace.nodal_soundspeed,
        step,
    )?;

    let nodes1 = std::mem::take(&mut workspace.nodes1);
    let velocity1 = std::mem::take(&mut workspace.velocity1);
    let pressure1 = std::mem::take(&mut workspace.pressure1);
    assemble_forces(
        mesh,
        params,
        workspace,
        &nodes1,
        &velocity1,
        &pressure1,
        &state.limiter,
    );
    workspace.nodes1 = nodes1;
    workspace.velocity1 = velocity1;
    workspace.pressure1 = pressure1;

    // kick the time centred predictor velocity, then average with the initial one
    kick(
        &workspace.velocity1,
        &workspace.node_force,
        &workspace.nodal_mass,
        dt,
        &mut workspace.velocity,
    );
    average_with(&state.velocity, &mut workspace.velocity);
    reflect_velocities(mesh.node_halo(), &mut workspace.velocity);
    drift(&state.nodes, &workspace.velocity, dt, &mut workspace.nodes);
    update_energy(
        mesh,
        &workspace.cell_force,
        &workspace.velocity,
        &workspace.cell_mass,
        &state.energy,
        dt,
        &mut workspace.energy,
    );
    update_density(
        mesh,
        &workspace.nodes,
        &workspace.cell_mass,
        &mut workspace.density,
        step,
    )?;
    equation_of_state(
        mesh,
        gas_law,
        &workspace.density,
        &workspace.energy,
        &mut workspace.pressure,
        step,
    )?;

    let dt_next = cfl_timestep(mesh, gas_law, &workspace.nodes, &workspace.energy, params.cfl);
    log::debug!("Step {step}: next CFL timestep {dt_next:.6e}");

    workspace.commit(state);
    state.self_check(mesh);

    Ok(StepReport {
        step,
        dt,
        dt_predicted,
        dt_next,
        total_mass,
    })
}

/// Runs the Lagrangian predictor-corrector step with a preallocated workspace.
pub struct PredictorCorrectorRunner {
    params: LagrangianParams,
    workspace: Workspace,
}

impl PredictorCorrectorRunner {
    pub fn new(mesh: &UnstructuredMesh, params: LagrangianParams) -> Self {
        Self {
            params,
            workspace: Workspace::new(mesh),
        }
    }

    pub fn params(&self) -> &LagrangianParams {
        &self.params
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

impl Runner for PredictorCorrectorRunner {
    fn label(&self) -> String {
        "predictor_corrector".to_string()
    }

    fn initial_timestep(&self, mesh: &UnstructuredMesh, state: &HydroState) -> f64 {
        cfl_timestep(
            mesh,
            &self.params.gas_law,
            &state.nodes,
            &state.energy,
            self.params.cfl,
        )
    }

    fn step(
        &mut self,
        mesh: &UnstructuredMesh,
        state: &mut HydroState,
        dt: f64,
        step: u64,
    ) -> HydroResult<StepReport> {
        advance_lagrangian_step(mesh, state, &mut self.workspace, &self.params, dt, step)
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec2;

    use super::*;
    use crate::{
        halo::{CellHalo, NodeHalo},
        topology::CellTopology,
    };

    fn two_quads(node_halo: Vec<NodeHalo>) -> (UnstructuredMesh, HydroState) {
        let topology = CellTopology::new(6, vec![0, 4, 8], vec![0, 1, 4, 3, 1, 2, 5, 4]).unwrap();
        let mesh = UnstructuredMesh::new(topology, node_halo, vec![CellHalo::Interior; 2]).unwrap();
        let nodes = vec![
            DVec2::new(0., 0.),
            DVec2::new(1., 0.),
            DVec2::new(2., 0.),
            DVec2::new(0., 1.),
            DVec2::new(1., 1.),
            DVec2::new(2., 1.),
        ];
        let state = HydroState::new(&mesh, nodes, vec![1., 0.125], vec![2.5, 2.0]).unwrap();
        (mesh, state)
    }

    #[test]
    fn test_uniform_state_at_rest_in_a_box() {
        let (mesh, mut state) = two_quads(vec![NodeHalo::Boundary; 6]);
        state.density = vec![1., 1.];
        state.energy = vec![2.5, 2.5];
        let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
        let dt = runner.initial_timestep(&mesh, &state);
        let report = runner.step(&mesh, &mut state, dt, 0).unwrap();

        assert_approx_eq!(f64, report.total_mass, 2.);
        assert_eq!(state.velocity, vec![DVec2::ZERO; 6]);
        for cell in 0..2 {
            assert_approx_eq!(f64, state.density[cell], 1., epsilon = 1e-14);
            assert_approx_eq!(f64, state.energy[cell], 2.5, epsilon = 1e-14);
            assert_approx_eq!(f64, state.pressure[cell], 1., epsilon = 1e-14);
            assert_approx_eq!(f64, state.cell_mass[cell], 1., epsilon = 1e-14);
        }
    }

    #[test]
    fn test_pressure_jump_drives_the_interface() {
        let mut halo = vec![NodeHalo::Boundary; 6];
        halo[1] = NodeHalo::Interior;
        halo[4] = NodeHalo::Interior;
        let (mesh, mut state) = two_quads(halo);
        let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
        let dt = 0.1 * runner.initial_timestep(&mesh, &state);
        let report = runner.step(&mesh, &mut state, dt, 0).unwrap();

        // the high pressure cell expands into the low pressure cell
        assert!(state.velocity[1].x > 0.);
        assert!(state.nodes[4].x > 1.);
        assert!(state.density[0] < 1.);
        assert!(state.energy[0] < 2.5);
        assert!(report.dt_next > 0.);
        assert_eq!(state.velocity[0], DVec2::ZERO);

        let mass: f64 = (0..2)
            .map(|cell| state.density[cell] * cell_volume(mesh.topology(), &state.nodes, cell))
            .sum();
        assert_approx_eq!(f64, mass, 1.125, epsilon = 1e-13);
    }

    #[test]
    fn test_cfl_violation_leaves_state_untouched() {
        // a box at rest does not move, so the predicted CFL bound is the initial one
        let (mesh, mut state) = two_quads(vec![NodeHalo::Boundary; 6]);
        let before = state.clone();
        let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
        let dt_stable = runner.initial_timestep(&mesh, &state);
        let dt = 10. * dt_stable;
        let error = runner.step(&mesh, &mut state, dt, 7).unwrap_err();

        assert!(error.is_recoverable());
        match error {
            HydroError::CflViolation {
                step,
                requested,
                stable,
            } => {
                assert_eq!(step, 7);
                assert_eq!(requested, dt);
                assert_approx_eq!(f64, stable, dt_stable);
            }
            _ => panic!("Expected a CFL violation, found {error}"),
        }
        assert_eq!(state.nodes, before.nodes);
        assert_eq!(state.velocity, before.velocity);
        assert_eq!(state.density, before.density);
        assert_eq!(state.energy, before.energy);
    }

    #[test]
    fn test_invalid_limiter() {
        let (mesh, mut state) = two_quads(vec![NodeHalo::Interior; 6]);
        state.limiter[3] = -0.5;
        let mut runner = PredictorCorrectorRunner::new(&mesh, LagrangianParams::default());
        assert!(matches!(
            runner.step(&mesh, &mut state, 1e-3, 0),
            Err(HydroError::InvalidLimiter { node: 3, .. })
        ));
    }
}
