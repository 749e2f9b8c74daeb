use crate::{
    errors::HydroResult, gas_law::GasLaw, mesh::UnstructuredMesh, state::HydroState,
    viscosity::ViscosityParams,
};

mod predictor_corrector;

pub use predictor_corrector::{advance_lagrangian_step, PredictorCorrectorRunner, Workspace};

/// Physical and numerical parameters of the Lagrangian step.
#[derive(Debug, Clone, Copy)]
pub struct LagrangianParams {
    pub gas_law: GasLaw,
    pub viscosity: ViscosityParams,
    pub cfl: f64,
}

impl Default for LagrangianParams {
    fn default() -> Self {
        Self {
            gas_law: GasLaw::default(),
            viscosity: ViscosityParams::default(),
            cfl: 0.5,
        }
    }
}

/// Summary of a committed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: u64,
    /// The timestep that was taken
    pub dt: f64,
    /// CFL bound of the predicted configuration
    pub dt_predicted: f64,
    /// CFL bound of the final configuration, to be used for the next step
    pub dt_next: f64,
    pub total_mass: f64,
}

pub trait Runner {
    fn label(&self) -> String;

    /// Stable timestep of the bootstrap configuration.
    fn initial_timestep(&self, mesh: &UnstructuredMesh, state: &HydroState) -> f64;

    /// Advance `state` by `dt`. On error the state is left untouched.
    fn step(
        &mut self,
        mesh: &UnstructuredMesh,
        state: &mut HydroState,
        dt: f64,
        step: u64,
    ) -> HydroResult<StepReport>;
}
