//! Multi-objective memetic evolutionary strategy: Newton local search on the
//! ephemeral constants, selection by non-dominated sorting over
//! `(loss, complexity)`.

use crate::algorithms::memetic::Memetic;
use crate::algorithms::{LocalLearner, LogRecord, SelectionKind};
use crate::error::CgpResult;
use crate::population::Population;

pub struct MoMes4Cgp {
    inner: Memetic,
}

impl MoMes4Cgp {
    pub fn new(max_mut: usize, seed: Option<u64>) -> CgpResult<Self> {
        Ok(MoMes4Cgp {
            inner: Memetic::new(
                "momes4cgp",
                LocalLearner::Newton,
                SelectionKind::MultiObjective,
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
