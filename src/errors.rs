use thiserror::Error;

/// Failures of mesh loading and of the Lagrangian step.
///
/// Everything except [`HydroError::CflViolation`] is fatal: the step that raised it has not been
/// committed and retrying it with the same inputs will fail again.
#[derive(Debug, Error)]
pub enum HydroError {
    #[error("Malformed mesh topology: {0}")]
    MalformedTopology(String),

    #[error("Invalid halo tables: {0}")]
    InvalidHalo(String),

    #[error("Size mismatch for {field}: expected {expected} entries, found {found}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Degenerate geometry at step {step}: cell {cell} has {quantity} = {value:e}")]
    DegenerateCell {
        step: u64,
        cell: usize,
        quantity: &'static str,
        value: f64,
    },

    #[error("Degenerate geometry at step {step}: node {node} has {quantity} = {value:e}")]
    DegenerateNode {
        step: u64,
        node: usize,
        quantity: &'static str,
        value: f64,
    },

    #[error("Invalid thermodynamic state at step {step}: cell {cell} has {quantity} = {value:e}")]
    InvalidState {
        step: u64,
        cell: usize,
        quantity: &'static str,
        value: f64,
    },

    #[error("Limiter of node {node} must lie in [0, 1], found {value}")]
    InvalidLimiter { node: usize, value: f64 },

    #[error("Timestep {requested:e} at step {step} exceeds the stable CFL bound {stable:e}")]
    CflViolation {
        step: u64,
        requested: f64,
        stable: f64,
    },

    #[error("Timestep {dt:e} dropped below dt_min ({dt_min:e})")]
    TimestepTooSmall { dt: f64, dt_min: f64 },
}

impl HydroError {
    /// Whether retrying the step with a smaller timestep can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HydroError::CflViolation { .. })
    }
}

pub type HydroResult<T> = Result<T, HydroError>;
