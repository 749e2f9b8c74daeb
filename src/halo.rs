use glam::DVec2;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::{HydroError, HydroResult};

/// Sentinel values of the raw node halo table. Any non-negative entry is an index into the
/// halo neighbour and normal tables instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i64)]
pub enum HaloSentinel {
    NotHalo = -1,
    Boundary = -2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeHalo {
    Interior,
    /// Physical wall. Velocities are pinned to zero.
    Boundary,
    /// Domain-decomposition ghost, paired with an interior `neighbour` across the outward
    /// unit `normal`.
    Ghost { neighbour: usize, normal: DVec2 },
}

impl NodeHalo {
    pub fn is_interior(&self) -> bool {
        matches!(self, NodeHalo::Interior)
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, NodeHalo::Ghost { .. })
    }

    /// Decode the raw halo tables of all nodes.
    pub fn decode_all(
        halo_index: &[i64],
        halo_neighbour: &[usize],
        halo_normal: &[DVec2],
    ) -> HydroResult<Vec<NodeHalo>> {
        let nnodes = halo_index.len();
        if halo_neighbour.len() != halo_normal.len() {
            return Err(HydroError::SizeMismatch {
                field: "halo_normal",
                expected: halo_neighbour.len(),
                found: halo_normal.len(),
            });
        }

        let decoded = halo_index
            .iter()
            .enumerate()
            .map(|(node, &raw)| match HaloSentinel::try_from(raw) {
                Ok(HaloSentinel::NotHalo) => Ok(NodeHalo::Interior),
                Ok(HaloSentinel::Boundary) => Ok(NodeHalo::Boundary),
                Err(_) if raw < 0 => Err(HydroError::InvalidHalo(format!(
                    "Node {node} has unknown halo classification {raw}"
                ))),
                Err(_) => {
                    let index = raw as usize;
                    if index >= halo_neighbour.len() {
                        return Err(HydroError::InvalidHalo(format!(
                            "Node {node} references halo entry {index}, but only {} exist",
                            halo_neighbour.len()
                        )));
                    }
                    let neighbour = halo_neighbour[index];
                    if neighbour >= nnodes || neighbour == node {
                        return Err(HydroError::InvalidHalo(format!(
                            "Ghost node {node} has invalid neighbour {neighbour}"
                        )));
                    }
                    let normal = halo_normal[index];
                    let length = normal.length();
                    if !length.is_finite() || length == 0. {
                        return Err(HydroError::InvalidHalo(format!(
                            "Ghost node {node} has degenerate normal {normal}"
                        )));
                    }
                    Ok(NodeHalo::Ghost {
                        neighbour,
                        normal: normal / length,
                    })
                }
            })
            .collect::<HydroResult<Vec<_>>>()?;

        // Ghost chains would make the exchange order dependent
        for (node, halo) in decoded.iter().enumerate() {
            if let NodeHalo::Ghost { neighbour, .. } = halo {
                if decoded[*neighbour].is_ghost() {
                    return Err(HydroError::InvalidHalo(format!(
                        "Ghost node {node} is paired with ghost node {neighbour}"
                    )));
                }
            }
        }

        Ok(decoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellHalo {
    Interior,
    /// Copies its scalars from the interior cell `neighbour`.
    Halo { neighbour: usize },
}

impl CellHalo {
    pub fn is_interior(&self) -> bool {
        matches!(self, CellHalo::Interior)
    }

    /// Decode the raw cell halo table: `0` marks an interior cell, anything else is the id of the
    /// interior cell to copy from.
    pub fn decode_all(halo_cell: &[usize]) -> HydroResult<Vec<CellHalo>> {
        let ncells = halo_cell.len();
        halo_cell
            .iter()
            .enumerate()
            .map(|(cell, &neighbour)| {
                if neighbour == 0 {
                    return Ok(CellHalo::Interior);
                }
                if neighbour >= ncells || neighbour == cell {
                    return Err(HydroError::InvalidHalo(format!(
                        "Halo cell {cell} has invalid neighbour {neighbour}"
                    )));
                }
                if halo_cell[neighbour] != 0 {
                    return Err(HydroError::InvalidHalo(format!(
                        "Halo cell {cell} copies from halo cell {neighbour}"
                    )));
                }
                Ok(CellHalo::Halo { neighbour })
            })
            .collect()
    }
}

/// Apply the boundary conditions to nodal velocities.
///
/// Ghost nodes keep their tangential velocity and pass the reflected normal component on to
/// their neighbour. Wall nodes are zeroed afterwards, so a wall node is always at rest.
pub fn reflect_velocities(node_halo: &[NodeHalo], velocity: &mut [DVec2]) {
    debug_assert_eq!(node_halo.len(), velocity.len());

    for (node, halo) in node_halo.iter().enumerate() {
        if let NodeHalo::Ghost { neighbour, normal } = *halo {
            let v_normal = velocity[node].dot(normal) * normal;
            velocity[node] -= v_normal;
            velocity[neighbour] -= v_normal;
        }
    }
    for (halo, v) in node_halo.iter().zip(velocity.iter_mut()) {
        if let NodeHalo::Boundary = halo {
            *v = DVec2::ZERO;
        }
    }
}

/// Copy nodal values from interior neighbours into ghost nodes.
pub fn fill_node_halo<T: Copy>(node_halo: &[NodeHalo], values: &mut [T]) {
    for (node, halo) in node_halo.iter().enumerate() {
        if let NodeHalo::Ghost { neighbour, .. } = *halo {
            values[node] = values[neighbour];
        }
    }
}

/// Copy cell values from interior neighbours into halo cells.
pub fn fill_cell_halo<T: Copy>(cell_halo: &[CellHalo], values: &mut [T]) {
    for (cell, halo) in cell_halo.iter().enumerate() {
        if let CellHalo::Halo { neighbour } = *halo {
            values[cell] = values[neighbour];
        }
    }
}
