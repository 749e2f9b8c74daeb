use crate::{
    errors::{HydroError, HydroResult},
    mesh::UnstructuredMesh,
    runner::{Runner, StepReport},
    state::HydroState,
};

/// The Eulerian stage run between two Lagrangian steps (gather, advection, rezone, repair and
/// scatter). It may rewrite node positions and velocities.
pub trait Remap {
    fn label(&self) -> String;

    fn remap(&mut self, mesh: &UnstructuredMesh, state: &mut HydroState, t: f64)
        -> HydroResult<()>;
}

pub struct Engine {
    runner: Box<dyn Runner>,
    remap: Option<Box<dyn Remap>>,
    t_end: f64,
    dt_min: f64,
    dt_max: f64,
    max_retries: usize,
    dt_status: f64,
    t_current: f64,
    t_last_status: f64,
    dt: Option<f64>,
    step_count: u64,
}

impl Engine {
    /// Setup a simulation by initializing a new engine struct
    pub fn new(
        runner: Box<dyn Runner>,
        t_end: f64,
        dt_min: f64,
        dt_max: f64,
        max_retries: usize,
        dt_status: f64,
    ) -> Self {
        Self {
            runner,
            remap: None,
            t_end,
            dt_min,
            dt_max,
            max_retries,
            dt_status,
            t_current: 0.,
            t_last_status: 0.,
            dt: None,
            step_count: 0,
        }
    }

    pub fn with_remap(mut self, remap: Box<dyn Remap>) -> Self {
        self.remap = Some(remap);
        self
    }

    pub fn t_current(&self) -> f64 {
        self.t_current
    }

    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The timestep the next step will attempt, if known.
    pub fn dt(&self) -> Option<f64> {
        self.dt
    }

    fn clamp_dt(&self, dt: f64) -> HydroResult<f64> {
        let dt = dt.min(self.dt_max);
        if dt < self.dt_min {
            return Err(HydroError::TimestepTooSmall {
                dt,
                dt_min: self.dt_min,
            });
        }
        Ok(dt)
    }

    /// Take a single step, retrying with the stable timestep on CFL violations.
    pub fn step(
        &mut self,
        mesh: &UnstructuredMesh,
        state: &mut HydroState,
    ) -> HydroResult<StepReport> {
        let dt_cfl = match self.dt {
            Some(dt) => dt,
            None => self.runner.initial_timestep(mesh, state),
        };
        let remaining = self.t_end - self.t_current;
        let mut dt = self.clamp_dt(dt_cfl)?.min(remaining);

        let mut retries = 0;
        let report = loop {
            match self.runner.step(mesh, state, dt, self.step_count) {
                Ok(report) => break report,
                Err(HydroError::CflViolation {
                    step,
                    requested,
                    stable,
                }) if retries < self.max_retries => {
                    log::warn!(
                        "Step {step}: timestep {requested:.6e} exceeds the CFL bound {stable:.6e}, retrying"
                    );
                    retries += 1;
                    dt = self.clamp_dt(stable)?.min(remaining);
                }
                Err(err) => return Err(err),
            }
        };

        if dt == remaining {
            self.t_current = self.t_end;
        } else {
            self.t_current += dt;
        }
        self.step_count += 1;
        self.dt = Some(report.dt_next);

        if let Some(remap) = self.remap.as_mut() {
            remap.remap(mesh, state, self.t_current)?;
        }

        Ok(report)
    }

    /// Run this simulation
    pub fn run(&mut self, mesh: &UnstructuredMesh, state: &mut HydroState) -> HydroResult<()> {
        log::info!(
            "Running {} from t = {:.6} to t = {:.6}",
            self.runner.label(),
            self.t_current,
            self.t_end
        );
        if let Some(remap) = &self.remap {
            log::info!("Remapping with {} after every step", remap.label());
        }

        while self.t_current < self.t_end {
            let report = self.step(mesh, state)?;
            if self.t_current - self.t_last_status >= self.dt_status || self.t_current >= self.t_end
            {
                log::info!(
                    "Step {}, t = {:.6}, dt = {:.6e}, total mass = {:.12e}",
                    report.step,
                    self.t_current,
                    report.dt,
                    report.total_mass
                );
                self.t_last_status = self.t_current;
            }
        }

        log::info!("Done after {} steps", self.step_count);
        Ok(())
    }
}
