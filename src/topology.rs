use crate::errors::{HydroError, HydroResult};

/// The three consecutive nodes (by global id) around one sub-cell of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stencil {
    pub left: usize,
    pub centre: usize,
    pub right: usize,
}

/// Ragged cell-to-node connectivity of an unstructured polygonal mesh.
///
/// Every (cell, local node) pair is a *sub-cell* and owns one slot of a flat array, laid out
/// cell by cell in the order of `cells_to_nodes`. The inverse map (node to the sub-cells that
/// touch it) is built once here so that per-sub-cell values can be gathered onto nodes without
/// any concurrent writes.
#[derive(Debug, Clone)]
pub struct CellTopology {
    nnodes: usize,
    cells_offsets: Vec<usize>,
    cells_to_nodes: Vec<usize>,
    sub_cell_owner: Vec<usize>,
    nodes_offsets: Vec<usize>,
    nodes_to_sub_cells: Vec<usize>,
}

impl CellTopology {
    pub fn new(
        nnodes: usize,
        cells_offsets: Vec<usize>,
        cells_to_nodes: Vec<usize>,
    ) -> HydroResult<Self> {
        if cells_offsets.len() < 2 {
            return Err(HydroError::MalformedTopology(
                "The mesh must contain at least one cell".to_string(),
            ));
        }
        if cells_offsets[0] != 0 {
            return Err(HydroError::MalformedTopology(format!(
                "Cell offsets must start at 0, found {}",
                cells_offsets[0]
            )));
        }
        let ncells = cells_offsets.len() - 1;
        if cells_offsets[ncells] != cells_to_nodes.len() {
            return Err(HydroError::MalformedTopology(format!(
                "Last cell offset ({}) does not match the length of the node index array ({})",
                cells_offsets[ncells],
                cells_to_nodes.len()
            )));
        }
        for (cell, bounds) in cells_offsets.windows(2).enumerate() {
            if bounds[1] < bounds[0] {
                return Err(HydroError::MalformedTopology(format!(
                    "Cell offsets decrease at cell {cell}"
                )));
            }
            if bounds[1] - bounds[0] < 3 {
                return Err(HydroError::MalformedTopology(format!(
                    "Cell {cell} has {} nodes, at least 3 are required",
                    bounds[1] - bounds[0]
                )));
            }
        }
        if let Some((sub_cell, &node)) = cells_to_nodes
            .iter()
            .enumerate()
            .find(|(_, &node)| node >= nnodes)
        {
            return Err(HydroError::MalformedTopology(format!(
                "Sub-cell {sub_cell} references node {node}, but the mesh only has {nnodes} nodes"
            )));
        }

        let mut sub_cell_owner = Vec::with_capacity(cells_to_nodes.len());
        for (cell, bounds) in cells_offsets.windows(2).enumerate() {
            sub_cell_owner.extend(std::iter::repeat(cell).take(bounds[1] - bounds[0]));
        }

        // Counting sort of the sub-cells by node
        let mut nodes_offsets = vec![0; nnodes + 1];
        for &node in cells_to_nodes.iter() {
            nodes_offsets[node + 1] += 1;
        }
        for node in 0..nnodes {
            nodes_offsets[node + 1] += nodes_offsets[node];
        }
        let mut cursor = nodes_offsets.clone();
        let mut nodes_to_sub_cells = vec![0; cells_to_nodes.len()];
        for (sub_cell, &node) in cells_to_nodes.iter().enumerate() {
            nodes_to_sub_cells[cursor[node]] = sub_cell;
            cursor[node] += 1;
        }

        Ok(Self {
            nnodes,
            cells_offsets,
            cells_to_nodes,
            sub_cell_owner,
            nodes_offsets,
            nodes_to_sub_cells,
        })
    }

    pub fn ncells(&self) -> usize {
        self.cells_offsets.len() - 1
    }

    pub fn nnodes(&self) -> usize {
        self.nnodes
    }

    pub fn nsub_cells(&self) -> usize {
        self.cells_to_nodes.len()
    }

    pub fn cells_offsets(&self) -> &[usize] {
        &self.cells_offsets
    }

    /// Range of the flat sub-cell indices belonging to `cell`.
    pub fn cell_range(&self, cell: usize) -> std::ops::Range<usize> {
        self.cells_offsets[cell]..self.cells_offsets[cell + 1]
    }

    /// The ordered (counter-clockwise) node ring of `cell`.
    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        &self.cells_to_nodes[self.cell_range(cell)]
    }

    pub fn sub_cell_owner(&self, sub_cell: usize) -> usize {
        self.sub_cell_owner[sub_cell]
    }

    pub fn node_of(&self, sub_cell: usize) -> usize {
        self.cells_to_nodes[sub_cell]
    }

    /// The sub-cell following `sub_cell` in the ring of its cell, wrapping around.
    pub fn next_sub_cell(&self, sub_cell: usize) -> usize {
        let range = self.cell_range(self.sub_cell_owner[sub_cell]);
        range.start + (sub_cell - range.start + 1) % range.len()
    }

    /// The sub-cell preceding `sub_cell` in the ring of its cell, wrapping around.
    pub fn prev_sub_cell(&self, sub_cell: usize) -> usize {
        let range = self.cell_range(self.sub_cell_owner[sub_cell]);
        let n = range.len();
        range.start + (sub_cell - range.start + n - 1) % n
    }

    pub fn stencil(&self, sub_cell: usize) -> Stencil {
        Stencil {
            left: self.cells_to_nodes[self.prev_sub_cell(sub_cell)],
            centre: self.cells_to_nodes[sub_cell],
            right: self.cells_to_nodes[self.next_sub_cell(sub_cell)],
        }
    }

    /// All sub-cells (flat indices) whose centre node is `node`.
    pub fn node_sub_cells(&self, node: usize) -> &[usize] {
        &self.nodes_to_sub_cells[self.nodes_offsets[node]..self.nodes_offsets[node + 1]]
    }
}
