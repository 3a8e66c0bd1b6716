//! Memetic evolutionary strategy using a fixed-step gradient-descent update
//! on the ephemeral constants instead of a full Newton step (cheaper per
//! generation, no Hessian needed, at the cost of slower local convergence).

use crate::algorithms::memetic::Memetic;
use crate::algorithms::{LocalLearner, LogRecord, SelectionKind};
use crate::error::{CgpError, CgpResult};
use crate::population::Population;

pub struct Gd4Cgp {
    inner: Memetic,
}

impl Gd4Cgp {
    pub fn new(max_mut: usize, eta: f64, seed: Option<u64>) -> CgpResult<Self> {
        if !(eta > 0.0) {
            return Err(CgpError::InvalidArgument(
                "eta must be a positive learning rate".into(),
            ));
        }
        Ok(Gd4Cgp {
            inner: Memetic::new(
                "gd4cgp",
                LocalLearner::GradientDescent { eta },
                SelectionKind::SingleObjective,
                max_mut,
                seed,
            )?,
        })
    }

    pub fn evolve(&mut self, pop: &mut Population, gen: u64) -> CgpResult<()> {
        self.inner.evolve(pop, gen)
    }

    pub fn get_name(&self) -> String {
        self.inner.get_name()
    }

    pub fn get_extra_info(&self) -> String {
        self.inner.get_extra_info()
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.inner.set_seed(seed)
    }

    pub fn get_seed(&self) -> u64 {
        self.inner.get_seed()
    }

    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.inner.set_verbosity(verbosity)
    }

    pub fn get_verbosity(&self) -> u32 {
        self.inner.get_verbosity()
    }

    pub fn get_log(&self) -> &[LogRecord] {
        self.inner.get_log()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_non_positive_eta() {
        assert!(Gd4Cgp::new(2, 0.0, Some(1)).is_err());
        assert!(Gd4Cgp::new(2, -0.1, Some(1)).is_err());
    }
}
