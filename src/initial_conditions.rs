use glam::DVec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    errors::{HydroError, HydroResult},
    geometry::centroid,
    halo::HaloSentinel,
    mesh::UnstructuredMesh,
    state::HydroState,
};

const PERTURBATION_SEED: u64 = 0x5eed;

/// Bootstrap data of a simulation: the mesh, its node positions and the initial fields.
pub struct InitialConditions {
    mesh: UnstructuredMesh,
    nodes: Vec<DVec2>,
    density: Vec<f64>,
    energy: Vec<f64>,
    velocity: Option<Vec<DVec2>>,
    limiter: Option<Vec<f64>>,
}

/// Raw tables of a structured grid in unstructured form.
struct Grid {
    nodes: Vec<DVec2>,
    cells_offsets: Vec<usize>,
    cells_to_nodes: Vec<usize>,
    halo_index: Vec<i64>,
    halo_cell: Vec<usize>,
}

impl Grid {
    /// A grid of `cells[0] x cells[1]` quads covering `[0, box_size]`, optionally surrounded by one
    /// layer of halo cells. The outermost ring of nodes are walls.
    fn new(cells: [usize; 2], box_size: DVec2, halo_layer: bool) -> Self {
        let layer = if halo_layer { 1 } else { 0 };
        let nx = cells[0] + 2 * layer;
        let ny = cells[1] + 2 * layer;
        let dx = DVec2::new(box_size.x / cells[0] as f64, box_size.y / cells[1] as f64);
        let origin = -(layer as f64) * dx;
        let node_idx = |i: usize, j: usize| j * (nx + 1) + i;

        let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
        let mut halo_index: Vec<i64> = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(origin + DVec2::new(i as f64, j as f64) * dx);
                let sentinel = if i == 0 || j == 0 || i == nx || j == ny {
                    HaloSentinel::Boundary
                } else {
                    HaloSentinel::NotHalo
                };
                halo_index.push(sentinel.into());
            }
        }

        let mut cells_offsets = Vec::with_capacity(nx * ny + 1);
        let mut cells_to_nodes = Vec::with_capacity(4 * nx * ny);
        let mut halo_cell = Vec::with_capacity(nx * ny);
        cells_offsets.push(0);
        for j in 0..ny {
            for i in 0..nx {
                cells_to_nodes.extend([
                    node_idx(i, j),
                    node_idx(i + 1, j),
                    node_idx(i + 1, j + 1),
                    node_idx(i, j + 1),
                ]);
                cells_offsets.push(cells_to_nodes.len());
                let is_halo = halo_layer && (i == 0 || j == 0 || i == nx - 1 || j == ny - 1);
                halo_cell.push(if is_halo {
                    // the nearest interior cell, never cell 0
                    j.clamp(1, ny - 2) * nx + i.clamp(1, nx - 2)
                } else {
                    0
                });
            }
        }

        Self {
            nodes,
            cells_offsets,
            cells_to_nodes,
            halo_index,
            halo_cell,
        }
    }

    /// Randomly displace all non-wall nodes by up to `amplitude / 2` cell widths per dimension.
    fn perturb(&mut self, amplitude: f64, dx: DVec2) {
        let mut rng = StdRng::seed_from_u64(PERTURBATION_SEED);
        let not_halo: i64 = HaloSentinel::NotHalo.into();
        for (node, &halo) in self.nodes.iter_mut().zip(self.halo_index.iter()) {
            if halo == not_halo {
                *node += amplitude
                    * dx
                    * DVec2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
            }
        }
    }

    fn into_mesh(self) -> HydroResult<(UnstructuredMesh, Vec<DVec2>)> {
        let mesh = UnstructuredMesh::from_raw(
            self.nodes.len(),
            self.cells_offsets,
            self.cells_to_nodes,
            &self.halo_index,
            &[],
            &[],
            &self.halo_cell,
        )?;
        Ok((mesh, self.nodes))
    }
}

impl InitialConditions {
    /// Initial conditions on an explicitly given mesh.
    pub fn new(
        mesh: UnstructuredMesh,
        nodes: Vec<DVec2>,
        density: Vec<f64>,
        energy: Vec<f64>,
    ) -> Self {
        Self {
            mesh,
            nodes,
            density,
            energy,
            velocity: None,
            limiter: None,
        }
    }

    /// Initial conditions on a rectangular grid, with the density and specific internal energy of
    /// every cell given by a function of its centroid.
    ///
    /// `perturbations` randomly displaces the non-wall nodes by up to half that fraction of a cell
    /// width (keep it below 0.5 for a valid mesh).
    pub fn from_fn<F>(
        cells: [usize; 2],
        box_size: DVec2,
        halo_layer: bool,
        perturbations: Option<f64>,
        mut f: F,
    ) -> HydroResult<Self>
    where
        F: FnMut(DVec2) -> (f64, f64),
    {
        if cells[0] == 0 || cells[1] == 0 {
            return Err(HydroError::MalformedTopology(format!(
                "Cannot create a grid of {} x {} cells",
                cells[0], cells[1]
            )));
        }
        let mut grid = Grid::new(cells, box_size, halo_layer);
        if let Some(amplitude) = perturbations {
            let dx = DVec2::new(box_size.x / cells[0] as f64, box_size.y / cells[1] as f64);
            grid.perturb(amplitude, dx);
        }
        let (mesh, nodes) = grid.into_mesh()?;

        let (density, energy) = (0..mesh.ncells())
            .map(|cell| f(centroid(mesh.topology(), &nodes, cell)))
            .unzip();

        Ok(Self::new(mesh, nodes, density, energy))
    }

    pub fn mesh(&self) -> &UnstructuredMesh {
        &self.mesh
    }

    pub fn nodes(&self) -> &[DVec2] {
        &self.nodes
    }

    pub fn set_velocities(mut self, velocities: Vec<DVec2>) -> Self {
        self.velocity = Some(velocities);
        self
    }

    /// Set the nodal velocities from a function of the node position.
    pub fn set_velocities_fn<F: FnMut(DVec2) -> DVec2>(self, f: F) -> Self {
        let velocities = self.nodes.iter().copied().map(f).collect();
        self.set_velocities(velocities)
    }

    pub fn set_limiter(mut self, limiter: Vec<f64>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Validate and convert into the mesh and the state at `t = 0`.
    pub fn into_parts(self) -> HydroResult<(UnstructuredMesh, HydroState)> {
        let mut state = HydroState::new(&self.mesh, self.nodes, self.density, self.energy)?;
        if let Some(velocity) = self.velocity {
            state = state.with_velocity(velocity)?;
        }
        if let Some(limiter) = self.limiter {
            state.set_limiter(limiter)?;
        }
        Ok((self.mesh, state))
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec2;

    use super::InitialConditions;
    use crate::{
        geometry::cell_volume,
        halo::{CellHalo, NodeHalo},
    };

    #[test]
    fn test_grid() {
        let ics =
            InitialConditions::from_fn([3, 2], DVec2::new(3., 1.), false, None, |x| (x.x, 1.))
                .unwrap();
        let (mesh, state) = ics.into_parts().unwrap();
        assert_eq!(mesh.ncells(), 6);
        assert_eq!(mesh.nnodes(), 12);
        assert!(mesh.cell_halo().iter().all(|halo| halo.is_interior()));
        // only the two central nodes are free
        let free: Vec<usize> = (0..12).filter(|&n| mesh.node_halo()[n].is_interior()).collect();
        assert_eq!(free, vec![5, 6]);
        assert_approx_eq!(f64, state.density[0], 0.5);
        assert_approx_eq!(f64, state.density[5], 2.5);
        for cell in 0..6 {
            assert_approx_eq!(f64, cell_volume(mesh.topology(), &state.nodes, cell), 0.5);
        }
    }

    #[test]
    fn test_halo_layer() {
        let ics =
            InitialConditions::from_fn([2, 2], DVec2::ONE, true, None, |_| (1., 1.)).unwrap();
        let mesh = ics.mesh();
        assert_eq!(mesh.ncells(), 16);
        assert_eq!(mesh.interior_cells().collect::<Vec<_>>(), vec![5, 6, 9, 10]);
        assert_eq!(mesh.cell_halo()[0], CellHalo::Halo { neighbour: 5 });
        assert_eq!(mesh.cell_halo()[3], CellHalo::Halo { neighbour: 6 });
        assert_eq!(mesh.cell_halo()[13], CellHalo::Halo { neighbour: 9 });
        assert_eq!(mesh.node_halo()[0], NodeHalo::Boundary);
        assert_eq!(mesh.node_halo()[6], NodeHalo::Interior);
        assert_approx_eq!(f64, ics.nodes()[6].x, 0.);
        assert_approx_eq!(f64, ics.nodes()[6].y, 0.);
    }

    #[test]
    fn test_perturbations() {
        let regular =
            InitialConditions::from_fn([4, 4], DVec2::ONE, false, None, |_| (1., 1.)).unwrap();
        let perturbed =
            InitialConditions::from_fn([4, 4], DVec2::ONE, false, Some(0.3), |_| (1., 1.))
                .unwrap();
        let mesh = regular.mesh();
        for node in 0..mesh.nnodes() {
            let shift = perturbed.nodes()[node] - regular.nodes()[node];
            if mesh.node_halo()[node].is_interior() {
                assert!(shift.abs().max_element() <= 0.15 * 0.25);
            } else {
                assert_eq!(shift, DVec2::ZERO);
            }
        }
        // deterministic
        let again =
            InitialConditions::from_fn([4, 4], DVec2::ONE, false, Some(0.3), |_| (1., 1.))
                .unwrap();
        assert_eq!(again.nodes(), perturbed.nodes());
        let (_, state) = perturbed.into_parts().unwrap();
        assert_eq!(state.nodes.len(), 25);
    }

    #[test]
    fn test_velocities() {
        let (_, state) = InitialConditions::from_fn([2, 2], DVec2::ONE, false, None, |_| (1., 1.))
            .unwrap()
            .set_velocities_fn(|x| -x)
            .into_parts()
            .unwrap();
        assert_eq!(state.velocity[8], -DVec2::ONE);

        let result = InitialConditions::from_fn([2, 2], DVec2::ONE, false, None, |_| (1., 1.))
            .unwrap()
            .set_velocities(vec![DVec2::ZERO; 3])
            .into_parts();
        assert!(result.is_err());
    }
}
