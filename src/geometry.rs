use glam::DVec2;
use rayon::prelude::*;

use crate::{sub_cell::SubCellField, topology::CellTopology};

/// Signed area of a closed polygon (shoelace formula). Positive for counter-clockwise rings.
pub fn polygon_area<'a, I>(ring: I) -> f64
where
    I: IntoIterator<Item = &'a DVec2>,
    I::IntoIter: Clone,
{
    let ring = ring.into_iter();
    let first = ring.clone().next();
    let mut area = 0.;
    let mut prev: Option<&DVec2> = None;
    for point in ring {
        if let Some(prev) = prev {
            area += prev.perp_dot(*point);
        }
        prev = Some(point);
    }
    if let (Some(last), Some(first)) = (prev, first) {
        area += last.perp_dot(*first);
    }
    0.5 * area
}

/// Arithmetic mean of the nodes of a cell.
pub fn centroid(topology: &CellTopology, positions: &[DVec2], cell: usize) -> DVec2 {
    let nodes = topology.cell_nodes(cell);
    nodes.iter().map(|&node| positions[node]).sum::<DVec2>() / nodes.len() as f64
}

/// Recompute the centroids of all (interior and halo) cells.
pub fn compute_centroids(topology: &CellTopology, positions: &[DVec2], centroids: &mut [DVec2]) {
    centroids
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, c)| *c = centroid(topology, positions, cell));
}

/// Signed area of the quadrilateral spanned by the midpoint of the left edge, the centre node, the
/// midpoint of the right edge and the cell centroid.
pub fn sub_cell_volume(left: DVec2, centre: DVec2, right: DVec2, centroid: DVec2) -> f64 {
    let mid_left = 0.5 * (left + centre);
    let mid_right = 0.5 * (centre + right);
    polygon_area(&[mid_left, centre, mid_right, centroid])
}

/// Recompute the volumes of all sub-cells.
///
/// Summed over a cell, these reproduce the polygon area of the cell exactly.
pub fn compute_sub_cell_volumes(
    topology: &CellTopology,
    positions: &[DVec2],
    centroids: &[DVec2],
    volumes: &mut SubCellField<f64>,
) {
    volumes
        .as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(sub_cell, volume)| {
            let stencil = topology.stencil(sub_cell);
            *volume = sub_cell_volume(
                positions[stencil.left],
                positions[stencil.centre],
                positions[stencil.right],
                centroids[topology.sub_cell_owner(sub_cell)],
            );
        });
}

/// Polygon area of a cell over its full node ring.
pub fn cell_volume(topology: &CellTopology, positions: &[DVec2], cell: usize) -> f64 {
    polygon_area(
        topology
            .cell_nodes(cell)
            .iter()
            .map(|&node| &positions[node]),
    )
}

/// Length of the shortest edge of a cell.
pub fn shortest_edge(topology: &CellTopology, positions: &[DVec2], cell: usize) -> f64 {
    let nodes = topology.cell_nodes(cell);
    let n = nodes.len();
    (0..n)
        .map(|i| positions[nodes[i]].distance(positions[nodes[(i + 1) % n]]))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec2;

    use super::*;

    fn unit_square() -> (CellTopology, Vec<DVec2>) {
        (
            CellTopology::new(4, vec![0, 4], vec![0, 1, 2, 3]).unwrap(),
            vec![
                DVec2::new(0., 0.),
                DVec2::new(1., 0.),
                DVec2::new(1., 1.),
                DVec2::new(0., 1.),
            ],
        )
    }

    #[test]
    fn test_square() {
        let (topology, positions) = unit_square();
        let mut centroids = vec![DVec2::ZERO; 1];
        compute_centroids(&topology, &positions, &mut centroids);
        assert_approx_eq!(f64, centroids[0].x, 0.5);
        assert_approx_eq!(f64, centroids[0].y, 0.5);

        let mut volumes = SubCellField::new(&topology, 0.);
        compute_sub_cell_volumes(&topology, &positions, &centroids, &mut volumes);
        for &volume in volumes.as_slice() {
            assert_approx_eq!(f64, volume, 0.25);
        }
        assert_approx_eq!(f64, cell_volume(&topology, &positions, 0), 1.);
        assert_approx_eq!(f64, shortest_edge(&topology, &positions, 0), 1.);
    }

    #[test]
    fn test_orientation() {
        let (_, positions) = unit_square();
        let reversed: Vec<DVec2> = positions.iter().rev().copied().collect();
        assert_approx_eq!(f64, polygon_area(&positions), 1.);
        assert_approx_eq!(f64, polygon_area(&reversed), -1.);
    }

    #[test]
    fn test_sub_cell_partition() {
        // An irregular pentagon, the mean of the nodes is not the area centroid
        let topology = CellTopology::new(5, vec![0, 5], vec![0, 1, 2, 3, 4]).unwrap();
        let positions = vec![
            DVec2::new(0., 0.),
            DVec2::new(2.3, -0.2),
            DVec2::new(2.9, 1.1),
            DVec2::new(1.2, 2.7),
            DVec2::new(-0.4, 1.3),
        ];
        let mut centroids = vec![DVec2::ZERO; 1];
        compute_centroids(&topology, &positions, &mut centroids);
        let mut volumes = SubCellField::new(&topology, 0.);
        compute_sub_cell_volumes(&topology, &positions, &centroids, &mut volumes);

        let area = cell_volume(&topology, &positions, 0);
        let total: f64 = volumes.cell(0).iter().sum();
        assert!(area > 0.);
        assert_approx_eq!(f64, total, area, epsilon = 1e-9 * area);
        assert!(volumes.as_slice().iter().all(|&v| v > 0.));
    }

    #[test]
    fn test_shortest_edge_scaling() {
        let (topology, positions) = unit_square();
        let shrunk: Vec<DVec2> = positions.iter().map(|&p| 0.5 * p).collect();
        assert_eq!(
            shortest_edge(&topology, &shrunk, 0),
            0.5 * shortest_edge(&topology, &positions, 0)
        );
    }
}
