//! Pure evolutionary strategy over the integer CGP chromosome: mutate, score,
//! keep the `|pop|` best by loss. No local search on ephemeral constants.

use crate::algorithms::memetic::Memetic;
use crate::algorithms::{LocalLearner, LogRecord, SelectionKind};
use crate::error::CgpResult;
use crate::population::Population;

pub struct Es4Cgp {
    inner: Memetic,
}

impl Es4Cgp {
    pub fn new(max_mut: usize, seed: Option<u64>) -> CgpResult<Self> {
        Ok(Es4Cgp {
            inner: Memetic::new(
                "es4cgp",
                LocalLearner::None,
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
    fn construction_rejects_zero_max_mut() {
        assert!(Es4Cgp::new(0, Some(1)).is_err());
    }

    #[test]
    fn extra_info_names_the_algorithm() {
        let algo = Es4Cgp::new(2, Some(1)).unwrap();
        assert_eq!(algo.get_name(), "es4cgp");
    }
}
