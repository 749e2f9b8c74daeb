use rayon::prelude::*;

use crate::{
    errors::{HydroError, HydroResult},
    gas_law::GasLaw,
    halo::{fill_cell_halo, fill_node_halo, NodeHalo},
    mesh::UnstructuredMesh,
    sub_cell::SubCellField,
};

/// Evaluate the ideal gas law on all interior cells and copy the result into the halo cells.
pub fn equation_of_state(
    mesh: &UnstructuredMesh,
    gas_law: &GasLaw,
    density: &[f64],
    energy: &[f64],
    pressure: &mut [f64],
    step: u64,
) -> HydroResult<()> {
    pressure
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(cell, pressure)| {
            if !mesh.is_interior_cell(cell) {
                return Ok(());
            }
            let (rho, e) = (density[cell], energy[cell]);
            if !(rho.is_finite() && rho > 0.) {
                return Err(HydroError::InvalidState {
                    step,
                    cell,
                    quantity: "density",
                    value: rho,
                });
            }
            if !(e.is_finite() && e > 0.) {
                return Err(HydroError::InvalidState {
                    step,
                    cell,
                    quantity: "energy",
                    value: e,
                });
            }
            *pressure = gas_law.gas_pressure_from_internal_energy(e, rho);
            if !(pressure.is_finite() && *pressure > 0.) {
                return Err(HydroError::InvalidState {
                    step,
                    cell,
                    quantity: "pressure",
                    value: *pressure,
                });
            }
            Ok(())
        })?;
    fill_cell_halo(mesh.cell_halo(), pressure);

    Ok(())
}

/// Check that every sub-cell of every interior cell has a positive volume.
pub fn check_sub_cell_volumes(
    mesh: &UnstructuredMesh,
    sub_cell_volume: &SubCellField<f64>,
    step: u64,
) -> HydroResult<()> {
    (0..mesh.ncells()).into_par_iter().try_for_each(|cell| {
        if !mesh.is_interior_cell(cell) {
            return Ok(());
        }
        match sub_cell_volume
            .cell(cell)
            .iter()
            .find(|&&volume| !(volume.is_finite() && volume > 0.))
        {
            Some(&value) => Err(HydroError::DegenerateCell {
                step,
                cell,
                quantity: "sub-cell volume",
                value,
            }),
            None => Ok(()),
        }
    })
}

/// Accumulate the mass of every interior cell from its sub-cells and return the total.
///
/// Halo cells copy the mass of their interior neighbour and do not count towards the total.
pub fn cell_masses(
    mesh: &UnstructuredMesh,
    density: &[f64],
    sub_cell_volume: &SubCellField<f64>,
    cell_mass: &mut [f64],
) -> f64 {
    cell_mass
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, mass)| {
            *mass = if mesh.is_interior_cell(cell) {
                sub_cell_volume
                    .cell(cell)
                    .iter()
                    .map(|volume| density[cell] * volume)
                    .sum()
            } else {
                0.
            };
        });
    let total_mass: f64 = cell_mass.par_iter().sum();
    fill_cell_halo(mesh.cell_halo(), cell_mass);

    total_mass
}

/// Gather the nodal mass from the sub-cells of the interior cells around every node, then copy
/// it into the ghost nodes.
pub fn gather_nodal_mass(
    mesh: &UnstructuredMesh,
    density: &[f64],
    sub_cell_volume: &SubCellField<f64>,
    nodal_mass: &mut [f64],
) {
    let topology = mesh.topology();
    nodal_mass
        .par_iter_mut()
        .enumerate()
        .for_each(|(node, mass)| {
            *mass = topology
                .node_sub_cells(node)
                .iter()
                .filter_map(|&sub_cell| {
                    let cell = topology.sub_cell_owner(sub_cell);
                    mesh.is_interior_cell(cell)
                        .then(|| density[cell] * sub_cell_volume[sub_cell])
                })
                .sum();
        });
    fill_node_halo(mesh.node_halo(), nodal_mass);
}

/// Gather the nodal volume and the volume weighted nodal soundspeed.
///
/// The soundspeed is normalized by the nodal volume once all contributions of a node are summed.
/// Nodes without any interior sub-cell get a zero volume and soundspeed, which is only an error
/// for nodes that are not part of the boundary or the halo.
pub fn gather_nodal_volume_and_soundspeed(
    mesh: &UnstructuredMesh,
    gas_law: &GasLaw,
    energy: &[f64],
    sub_cell_volume: &SubCellField<f64>,
    nodal_volume: &mut [f64],
    nodal_soundspeed: &mut [f64],
    step: u64,
) -> HydroResult<()> {
    let topology = mesh.topology();
    nodal_volume
        .par_iter_mut()
        .zip(nodal_soundspeed.par_iter_mut())
        .enumerate()
        .try_for_each(|(node, (volume, soundspeed))| {
            let (v, c) = topology
                .node_sub_cells(node)
                .iter()
                .filter(|&&sub_cell| mesh.is_interior_cell(topology.sub_cell_owner(sub_cell)))
                .fold((0., 0.), |(v, c), &sub_cell| {
                    let cell = topology.sub_cell_owner(sub_cell);
                    let sub_volume = sub_cell_volume[sub_cell];
                    (
                        v + sub_volume,
                        c + gas_law.sound_speed_from_internal_energy(energy[cell]) * sub_volume,
                    )
                });

            if v > 0. {
                *volume = v;
                *soundspeed = c / v;
                return Ok(());
            }
            *volume = 0.;
            *soundspeed = 0.;
            match mesh.node_halo()[node] {
                NodeHalo::Interior if !topology.node_sub_cells(node).is_empty() => {
                    Err(HydroError::DegenerateNode {
                        step,
                        node,
                        quantity: "nodal volume",
                        value: v,
                    })
                }
                _ => Ok(()),
            }
        })
}
