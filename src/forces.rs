use glam::DVec2;
use rayon::prelude::*;

use crate::{sub_cell::SubCellField, topology::CellTopology};

/// Rotate a vector by -90 degrees. For an edge of a counter-clockwise ring this points out of
/// the cell.
#[inline]
pub fn rotate_cw(d: DVec2) -> DVec2 {
    DVec2::new(d.y, -d.x)
}

/// Outward area vector of the two half-edges around `centre`: half the sum of the rotated edge
/// vectors `left -> centre` and `centre -> right`.
pub fn area_vector(left: DVec2, centre: DVec2, right: DVec2) -> DVec2 {
    0.5 * (rotate_cw(centre - left) + rotate_cw(right - centre))
}

/// Compute the pressure force of every sub-cell, for interior and halo cells alike.
pub fn pressure_forces(
    topology: &CellTopology,
    positions: &[DVec2],
    pressure: &[f64],
    cell_force: &mut SubCellField<DVec2>,
) {
    cell_force
        .as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(sub_cell, force)| {
            let stencil = topology.stencil(sub_cell);
            let area = area_vector(
                positions[stencil.left],
                positions[stencil.centre],
                positions[stencil.right],
            );
            *force = pressure[topology.sub_cell_owner(sub_cell)] * area;
        });
}

/// Sum the sub-cell forces around every node.
pub fn gather_node_forces(
    topology: &CellTopology,
    cell_force: &SubCellField<DVec2>,
    node_force: &mut [DVec2],
) {
    node_force
        .par_iter_mut()
        .enumerate()
        .for_each(|(node, force)| {
            *force = topology
                .node_sub_cells(node)
                .iter()
                .map(|&sub_cell| cell_force[sub_cell])
                .sum();
        });
}

/// Work done on a cell by its sub-cell forces, `sum(v . F)` over its nodes.
pub fn cell_work(
    topology: &CellTopology,
    cell_force: &SubCellField<DVec2>,
    velocity: &[DVec2],
    cell: usize,
) -> f64 {
    topology
        .cell_range(cell)
        .map(|sub_cell| velocity[topology.node_of(sub_cell)].dot(cell_force[sub_cell]))
        .sum()
}
