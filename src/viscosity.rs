use glam::DVec2;
use rayon::prelude::*;

use crate::{
    forces::rotate_cw, gas_law::GasLaw, mesh::UnstructuredMesh, sub_cell::SubCellField,
    topology::CellTopology,
};

/// Coefficients of the edge-centred artificial viscosity.
#[derive(Debug, Clone, Copy)]
pub struct ViscosityParams {
    /// Coefficient of the soundspeed weighted term
    pub linear: f64,
    /// Coefficient of the velocity jump weighted term
    pub quadratic: f64,
}

impl Default for ViscosityParams {
    fn default() -> Self {
        Self {
            linear: 0.5,
            quadratic: 0.5,
        }
    }
}

/// Nodal quantities the viscosity reads, all normalized.
#[derive(Debug, Clone, Copy)]
pub struct NodalFields<'a> {
    pub mass: &'a [f64],
    pub volume: &'a [f64],
    pub soundspeed: &'a [f64],
}

impl NodalFields<'_> {
    fn density(&self, node: usize) -> f64 {
        if self.volume[node] > 0. {
            self.mass[node] / self.volume[node]
        } else {
            0.
        }
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b > 0. {
        2. * a * b / (a + b)
    } else {
        0.
    }
}

/// Viscous force of a single edge, to be subtracted from its first node and added to its second.
///
/// `grad_velocity` is the velocity jump along the edge and `normal` the rotated vector between
/// the edge midpoint and the cell centroid. Expanding edges (`grad_velocity . normal > 0`) carry no
/// viscosity.
pub fn edge_viscous_force(
    params: &ViscosityParams,
    shock_factor: f64,
    density_edge: f64,
    soundspeed: f64,
    grad_velocity: DVec2,
    normal: DVec2,
    limiter: f64,
) -> DVec2 {
    if grad_velocity.dot(normal) > 0. {
        return DVec2::ZERO;
    }
    let grad_mag = grad_velocity.length();
    let unit = if grad_mag > 0. {
        grad_velocity / grad_mag
    } else {
        DVec2::ZERO
    };

    let c1 = params.linear;
    let c2t = params.quadratic * shock_factor;
    let component = |g: f64, s: f64, u: f64| {
        density_edge
            * (c2t * g.abs() + (c2t * c2t * g * g + c1 * c1 * soundspeed * soundspeed).sqrt())
            * (1. - limiter)
            * (g * s)
            * u
    };
    DVec2::new(
        component(grad_velocity.x, normal.x, unit.x),
        component(grad_velocity.y, normal.y, unit.y),
    )
}

/// Compute the viscous force of every directed edge `node(s) -> node(next(s))` of the interior
/// cells. Edges of halo cells carry no force.
#[allow(clippy::too_many_arguments)]
pub fn edge_forces(
    mesh: &UnstructuredMesh,
    params: &ViscosityParams,
    gas_law: &GasLaw,
    positions: &[DVec2],
    centroids: &[DVec2],
    velocity: &[DVec2],
    nodal: NodalFields,
    limiter: &[f64],
    edge_force: &mut SubCellField<DVec2>,
) {
    let topology = mesh.topology();
    let shock_factor = gas_law.gamma().gp1d4();
    edge_force
        .as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(sub_cell, force)| {
            let cell = topology.sub_cell_owner(sub_cell);
            if !mesh.is_interior_cell(cell) {
                *force = DVec2::ZERO;
                return;
            }
            let c = topology.node_of(sub_cell);
            let r = topology.node_of(topology.next_sub_cell(sub_cell));

            let edge_mid = 0.5 * (positions[c] + positions[r]);
            let normal = rotate_cw(centroids[cell] - edge_mid);
            let grad_velocity = velocity[r] - velocity[c];
            let soundspeed = nodal.soundspeed[c].min(nodal.soundspeed[r]);
            let density_edge = harmonic_mean(nodal.density(c), nodal.density(r));

            *force = edge_viscous_force(
                params,
                shock_factor,
                density_edge,
                soundspeed,
                grad_velocity,
                normal,
                limiter[c],
            );
        });
}

/// Add the edge forces to the nodes: every edge pushes its first node by `-F` and its second
/// node by `+F`.
pub fn apply_edge_forces(
    topology: &CellTopology,
    edge_force: &SubCellField<DVec2>,
    node_force: &mut [DVec2],
) {
    node_force
        .par_iter_mut()
        .enumerate()
        .for_each(|(node, force)| {
            for &sub_cell in topology.node_sub_cells(node) {
                *force += edge_force[topology.prev_sub_cell(sub_cell)] - edge_force[sub_cell];
            }
        });
}
