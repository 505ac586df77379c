use crate::domain::ports::{GatewayOutcome, PaymentGateway};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Simulated card processor: approves with a fixed probability.
pub struct SimulatedGateway {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedGateway {
    /// `success_rate` is clamped to `[0, 1]`. A `seed` makes the draw sequence
    /// reproducible.
    pub fn new(success_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            rng: Mutex::new(rng),
        }
    }
}

impl PaymentGateway for SimulatedGateway {
    fn outcome(&self) -> GatewayOutcome {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_bool(self.success_rate) {
            GatewayOutcome::Approved
        } else {
            GatewayOutcome::Declined
        }
    }
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedGateway(pub GatewayOutcome);

impl FixedGateway {
    pub fn approving() -> Self {
        Self(GatewayOutcome::Approved)
    }

    pub fn declining() -> Self {
        Self(GatewayOutcome::Declined)
    }
}

impl PaymentGateway for FixedGateway {
    fn outcome(&self) -> GatewayOutcome {
        self.0
    }
}
