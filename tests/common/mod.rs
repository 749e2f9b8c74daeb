#![allow(dead_code, unused_macros)]

use ale_hydro::{halo::HaloSentinel, HydroState, UnstructuredMesh};
use glam::DVec2;

macro_rules! assert_approx_eq_dvec2 {
    ($a:expr, $b:expr) => {
        float_cmp::assert_approx_eq!(f64, $a.x, $b.x);
        float_cmp::assert_approx_eq!(f64, $a.y, $b.y);
    };
    ($a:expr, $b:expr, epsilon = $eps:expr) => {
        float_cmp::assert_approx_eq!(f64, $a.x, $b.x, epsilon = $eps);
        float_cmp::assert_approx_eq!(f64, $a.y, $b.y, epsilon = $eps);
    };
}

/// A single unit square cell whose bottom edge (nodes 0 and 1) is a wall.
pub fn unit_square(density: f64, energy: f64) -> (UnstructuredMesh, HydroState) {
    let halo_index: Vec<i64> = vec![
        HaloSentinel::Boundary.into(),
        HaloSentinel::Boundary.into(),
        HaloSentinel::NotHalo.into(),
        HaloSentinel::NotHalo.into(),
    ];
    let mesh =
        UnstructuredMesh::from_raw(4, vec![0, 4], vec![0, 1, 2, 3], &halo_index, &[], &[], &[0])
            .expect("Error creating mesh!");
    let nodes = vec![DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y];
    let state = HydroState::new(&mesh, nodes, vec![density], vec![energy])
        .expect("Error creating state!");
    (mesh, state)
}

/// An `n x n` grid of quads covering the unit square without any walls or halos, with the density
/// and energy of every cell given by a function of its indices.
pub fn free_grid<F>(n: usize, mut f: F) -> (UnstructuredMesh, HydroState)
where
    F: FnMut(usize, usize) -> (f64, f64),
{
    let h = 1. / n as f64;
    let node_idx = |i: usize, j: usize| j * (n + 1) + i;
    let mut nodes = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            nodes.push(DVec2::new(i as f64 * h, j as f64 * h));
        }
    }

    let mut cells_offsets = vec![0];
    let mut cells_to_nodes = Vec::with_capacity(4 * n * n);
    let mut density = Vec::with_capacity(n * n);
    let mut energy = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            cells_to_nodes.extend([
                node_idx(i, j),
                node_idx(i + 1, j),
                node_idx(i + 1, j + 1),
                node_idx(i, j + 1),
            ]);
            cells_offsets.push(cells_to_nodes.len());
            let (rho, e) = f(i, j);
            density.push(rho);
            energy.push(e);
        }
    }

    let halo_index: Vec<i64> = vec![HaloSentinel::NotHalo.into(); nodes.len()];
    let mesh = UnstructuredMesh::from_raw(
        nodes.len(),
        cells_offsets,
        cells_to_nodes,
        &halo_index,
        &[],
        &[],
        &vec![0; n * n],
    )
    .expect("Error creating mesh!");
    let state = HydroState::new(&mesh, nodes, density, energy).expect("Error creating state!");
    (mesh, state)
}
