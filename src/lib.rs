//! Lagrangian predictor-corrector hydrodynamics on unstructured polygonal meshes, the Lagrangian
//! half of an Arbitrary Lagrangian-Eulerian (ALE) scheme.
//!
//! Node positions and velocities live on the mesh nodes, density, specific internal energy and
//! pressure in the cells. Forces are assembled per sub-cell (cell, node pair) and gathered onto
//! the nodes, so every parallel loop has a single writer per value.

pub use engine::{Engine, Remap};
pub use errors::{HydroError, HydroResult};
pub use initial_conditions::InitialConditions;
pub use mesh::UnstructuredMesh;
pub use runner::{
    advance_lagrangian_step, LagrangianParams, PredictorCorrectorRunner, Runner, StepReport,
    Workspace,
};
pub use state::HydroState;
pub use viscosity::ViscosityParams;

pub mod accumulator;
mod engine;
mod errors;
pub mod forces;
pub mod gas_law;
pub mod geometry;
pub mod halo;
mod initial_conditions;
mod mesh;
mod runner;
mod state;
pub mod sub_cell;
pub mod timestep;
pub mod topology;
pub mod viscosity;
