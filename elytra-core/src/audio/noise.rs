//! Brown noise: white noise through a one-pole leaky integrator.
//!
//! ```text
//! white     = U[-1, 1)
//! last_out  = (last_out + 0.02 * white) / 1.02
//! sample    = last_out * 3.5
//! ```
//!
//! `|last_out| ≤ 1` holds for any input history (the update is a contraction
//! towards `±1`), so output never exceeds the scale factor.
//!
//! Runs inside the render callback: no allocation, no locks, fixed work per
//! sample.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AmbienceConfig;

pub struct BrownNoise {
    last_out: f32,
    input_coeff: f32,
    leak_divisor: f32,
    output_scale: f32,
    rng: StdRng,
}

impl BrownNoise {
    pub fn new(config: &AmbienceConfig, rng: StdRng) -> Self {
        Self {
            last_out: 0.0,
            input_coeff: config.noise_input_coeff,
            leak_divisor: config.noise_leak_divisor,
            output_scale: config.noise_output_scale,
            rng,
        }
    }

    pub fn seeded(config: &AmbienceConfig, seed: u64) -> Self {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white = self.rng.gen::<f32>() * 2.0 - 1.0;
        self.last_out = (self.last_out + self.input_coeff * white) / self.leak_divisor;
        self.last_out * self.output_scale
    }

    /// Overwrite `out` with the next `out.len()` samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Current integrator state.
    pub fn last_out(&self) -> f32 {
        self.last_out
    }
}
