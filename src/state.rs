use glam::DVec2;

use crate::{
    errors::{HydroError, HydroResult},
    geometry::cell_volume,
    mesh::UnstructuredMesh,
};

/// The long-lived simulation state that the Lagrangian step advances in place.
#[derive(Debug, Clone)]
pub struct HydroState {
    /// Node positions
    pub nodes: Vec<DVec2>,
    pub velocity: Vec<DVec2>,
    pub density: Vec<f64>,
    /// Specific internal energy
    pub energy: Vec<f64>,
    pub pressure: Vec<f64>,
    pub cell_mass: Vec<f64>,
    /// Per-node viscosity damping factor in `[0, 1]`
    pub limiter: Vec<f64>,
}

fn check_len<T>(field: &'static str, values: &[T], expected: usize) -> HydroResult<()> {
    if values.len() != expected {
        return Err(HydroError::SizeMismatch {
            field,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

impl HydroState {
    /// Create the state of a mesh at rest.
    ///
    /// Interior cells must have a positive, finite density and energy and a counter-clockwise
    /// (positive area) node ring. Pressure and cell masses are filled in by the first step.
    pub fn new(
        mesh: &UnstructuredMesh,
        nodes: Vec<DVec2>,
        density: Vec<f64>,
        energy: Vec<f64>,
    ) -> HydroResult<Self> {
        let nnodes = mesh.nnodes();
        let ncells = mesh.ncells();
        check_len("nodes", &nodes, nnodes)?;
        check_len("density", &density, ncells)?;
        check_len("energy", &energy, ncells)?;

        for cell in mesh.interior_cells() {
            for (quantity, value) in [("density", density[cell]), ("energy", energy[cell])] {
                if !(value.is_finite() && value > 0.) {
                    return Err(HydroError::InvalidState {
                        step: 0,
                        cell,
                        quantity,
                        value,
                    });
                }
            }
            let volume = cell_volume(mesh.topology(), &nodes, cell);
            if !(volume.is_finite() && volume > 0.) {
                return Err(HydroError::DegenerateCell {
                    step: 0,
                    cell,
                    quantity: "cell volume",
                    value: volume,
                });
            }
        }

        Ok(Self {
            nodes,
            velocity: vec![DVec2::ZERO; nnodes],
            density,
            energy,
            pressure: vec![0.; ncells],
            cell_mass: vec![0.; ncells],
            limiter: vec![0.; nnodes],
        })
    }

    pub fn with_velocity(mut self, velocity: Vec<DVec2>) -> HydroResult<Self> {
        check_len("velocity", &velocity, self.nodes.len())?;
        self.velocity = velocity;
        Ok(self)
    }

    /// Inject the per-node viscosity limiter.
    pub fn set_limiter(&mut self, limiter: Vec<f64>) -> HydroResult<()> {
        check_len("limiter", &limiter, self.nodes.len())?;
        if let Some((node, &value)) = limiter
            .iter()
            .enumerate()
            .find(|(_, &value)| !(0. ..=1.).contains(&value))
        {
            return Err(HydroError::InvalidLimiter { node, value });
        }
        self.limiter = limiter;
        Ok(())
    }

    pub fn nnodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn ncells(&self) -> usize {
        self.density.len()
    }

    /// Total mass of the interior cells, as of the last committed step.
    pub fn total_mass(&self, mesh: &UnstructuredMesh) -> f64 {
        mesh.interior_cells().map(|cell| self.cell_mass[cell]).sum()
    }

    pub fn total_internal_energy(&self, mesh: &UnstructuredMesh) -> f64 {
        mesh.interior_cells()
            .map(|cell| self.cell_mass[cell] * self.energy[cell])
            .sum()
    }

    /// Check that the interior of the state is finite
    pub fn self_check(&self, mesh: &UnstructuredMesh) {
        for node in self.nodes.iter().zip(self.velocity.iter()) {
            debug_assert!(node.0.is_finite());
            debug_assert!(node.1.is_finite());
        }
        for cell in mesh.interior_cells() {
            debug_assert!(self.density[cell].is_finite());
            debug_assert!(self.energy[cell].is_finite());
            debug_assert!(self.pressure[cell].is_finite());
            debug_assert!(self.density[cell] > 0.);
            debug_assert!(self.energy[cell] > 0.);
        }
    }
}
