/// Adiabatic index of the ideal gas used throughout the Lagrangian step.
pub const GAMMA: f64 = 1.4;

#[derive(Debug, Clone, Copy)]
pub struct AdiabaticIndex {
    gamma: f64,
    gm1: f64,
    odgm1: f64,
}

impl From<f64> for AdiabaticIndex {
    fn from(value: f64) -> Self {
        AdiabaticIndex {
            gamma: value,
            gm1: value - 1.,
            odgm1: 1. / (value - 1.),
        }
    }
}

impl From<AdiabaticIndex> for f64 {
    fn from(value: AdiabaticIndex) -> Self {
        value.gamma
    }
}

impl Default for AdiabaticIndex {
    fn default() -> Self {
        GAMMA.into()
    }
}

impl AdiabaticIndex {
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn gm1(&self) -> f64 {
        self.gm1
    }

    pub fn odgm1(&self) -> f64 {
        self.odgm1
    }

    /// gamma * (gamma - 1)
    pub fn ggm1(&self) -> f64 {
        self.gamma * self.gm1
    }

    /// (gamma + 1) / 4, the shock-jump factor of the quadratic viscosity term
    pub fn gp1d4(&self) -> f64 {
        0.25 * (self.gamma + 1.)
    }
}

/// Ideal gas equation of state.
#[derive(Debug, Default, Clone, Copy)]
pub struct GasLaw {
    gamma: AdiabaticIndex,
}

impl GasLaw {
    pub fn new(gamma: f64) -> Self {
        Self {
            gamma: gamma.into(),
        }
    }

    pub fn gamma(&self) -> &AdiabaticIndex {
        &self.gamma
    }

    pub fn gas_pressure_from_internal_energy(&self, internal_energy: f64, density: f64) -> f64 {
        self.gamma.gm1() * internal_energy * density
    }

    /// Specific internal energy
    pub fn gas_internal_energy_from_pressure(&self, pressure: f64, density_inv: f64) -> f64 {
        pressure * density_inv * self.gamma.odgm1()
    }

    pub fn sound_speed_from_internal_energy(&self, internal_energy: f64) -> f64 {
        (self.gamma.ggm1() * internal_energy).sqrt()
    }

    pub fn sound_speed(&self, pressure: f64, density_inv: f64) -> f64 {
        (self.gamma.gamma() * pressure * density_inv).sqrt()
    }
}
