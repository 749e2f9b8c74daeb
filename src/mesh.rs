use glam::DVec2;

use crate::{
    errors::{HydroError, HydroResult},
    halo::{CellHalo, NodeHalo},
    topology::CellTopology,
};

/// Connectivity and boundary classification of an unstructured polygonal mesh.
///
/// The mesh is immutable for the lifetime of a simulation; node positions live in the
/// [`HydroState`](crate::HydroState) because they move with the flow.
#[derive(Debug, Clone)]
pub struct UnstructuredMesh {
    topology: CellTopology,
    node_halo: Vec<NodeHalo>,
    cell_halo: Vec<CellHalo>,
}

impl UnstructuredMesh {
    pub fn new(
        topology: CellTopology,
        node_halo: Vec<NodeHalo>,
        cell_halo: Vec<CellHalo>,
    ) -> HydroResult<Self> {
        if node_halo.len() != topology.nnodes() {
            return Err(HydroError::SizeMismatch {
                field: "node_halo",
                expected: topology.nnodes(),
                found: node_halo.len(),
            });
        }
        if cell_halo.len() != topology.ncells() {
            return Err(HydroError::SizeMismatch {
                field: "cell_halo",
                expected: topology.ncells(),
                found: cell_halo.len(),
            });
        }
        if cell_halo.iter().all(|halo| !halo.is_interior()) {
            return Err(HydroError::InvalidHalo(
                "The mesh contains no interior cells".to_string(),
            ));
        }
        Ok(Self {
            topology,
            node_halo,
            cell_halo,
        })
    }

    /// Build a mesh from the raw bootstrap tables.
    ///
    /// `halo_index` holds `-1` for interior nodes, `-2` for wall nodes and otherwise an index into
    /// `halo_neighbour`/`halo_normal`. `halo_cell` holds `0` for interior cells and otherwise the
    /// interior cell to copy from.
    pub fn from_raw(
        nnodes: usize,
        cells_offsets: Vec<usize>,
        cells_to_nodes: Vec<usize>,
        halo_index: &[i64],
        halo_neighbour: &[usize],
        halo_normal: &[DVec2],
        halo_cell: &[usize],
    ) -> HydroResult<Self> {
        let topology = CellTopology::new(nnodes, cells_offsets, cells_to_nodes)?;
        if halo_index.len() != nnodes {
            return Err(HydroError::SizeMismatch {
                field: "halo_index",
                expected: nnodes,
                found: halo_index.len(),
            });
        }
        let node_halo = NodeHalo::decode_all(halo_index, halo_neighbour, halo_normal)?;
        let cell_halo = CellHalo::decode_all(halo_cell)?;
        Self::new(topology, node_halo, cell_halo)
    }

    pub fn topology(&self) -> &CellTopology {
        &self.topology
    }

    pub fn node_halo(&self) -> &[NodeHalo] {
        &self.node_halo
    }

    pub fn cell_halo(&self) -> &[CellHalo] {
        &self.cell_halo
    }

    pub fn ncells(&self) -> usize {
        self.topology.ncells()
    }

    pub fn nnodes(&self) -> usize {
        self.topology.nnodes()
    }

    pub fn is_interior_cell(&self, cell: usize) -> bool {
        self.cell_halo[cell].is_interior()
    }

    pub fn interior_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.ncells()).filter(|&cell| self.is_interior_cell(cell))
    }
}
