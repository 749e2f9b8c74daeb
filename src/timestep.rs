use glam::DVec2;
use rayon::prelude::*;

use crate::{gas_law::GasLaw, geometry::shortest_edge, mesh::UnstructuredMesh};

/// Upper bound of any timestep, returned when no cell limits it.
pub const DT_SENTINEL: f64 = 1e10;

/// The CFL limited timestep of a configuration: the minimum over all interior cells of
/// `cfl * shortest_edge / soundspeed`.
pub fn cfl_timestep(
    mesh: &UnstructuredMesh,
    gas_law: &GasLaw,
    positions: &[DVec2],
    energy: &[f64],
    cfl: f64,
) -> f64 {
    let topology = mesh.topology();
    (0..mesh.ncells())
        .into_par_iter()
        .filter(|&cell| mesh.is_interior_cell(cell))
        .map(|cell| {
            let soundspeed = gas_law.sound_speed_from_internal_energy(energy[cell]);
            let dt = cfl * shortest_edge(topology, positions, cell) / soundspeed;
            debug_assert!(!dt.is_nan());
            dt
        })
        .reduce(|| DT_SENTINEL, f64::min)
}
