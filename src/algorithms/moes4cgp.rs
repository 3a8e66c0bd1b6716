//! Multi-objective evolutionary strategy: mutation-only local search
//! (like [`crate::algorithms::Es4Cgp`]), selection by non-dominated sorting
//! over `(loss, complexity)` instead of raw loss.

use crate::algorithms::memetic::Memetic;
use crate::algorithms::{LocalLearner, LogRecord, SelectionKind};
use crate::error::CgpResult;
use crate::population::Population;

pub struct MoEs4Cgp {
    inner: Memetic,
}

impl MoEs4Cgp {
    pub fn new(max_mut: usize, seed: Option<u64>) -> CgpResult<Self> {
        Ok(MoEs4Cgp {
            inner: Memetic::new(
                "moes4cgp",
                LocalLearner::None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evolve_rejects_single_objective_problem() {
        use crate::expression::Expression;
        use crate::kernel::KernelSet;
        use crate::problem::{Problem, SymbolicRegressionProblem};
        use std::sync::Arc;

        let kernels: KernelSet<f64> = KernelSet::from_names(&["sum"]).unwrap();
        let cgp = Expression::new(1, 1, 1, 1, 1, 1, kernels, Some(1)).unwrap();
        let problem: Arc<dyn Problem> = Arc::new(
            SymbolicRegressionProblem::new(
                cgp,
                vec!["sum".into()],
                1,
                vec![vec![]],
                vec![vec![0.0]],
                false,
                (-10.0, 10.0),
            )
            .unwrap(),
        );
        let mut pop = Population::new(problem.clone());
        let (lb, ub) = problem.get_bounds();
        let mut x1 = lb.clone();
        let mut x2 = ub;
        x1[0] = 0.0;
        x2[0] = 0.0;
        let f1 = problem.fitness(&x1).unwrap();
        let f2 = problem.fitness(&x2).unwrap();
        pop.push_back(x1, f1);
        pop.push_back(x2, f2);

        let mut algo = MoEs4Cgp::new(1, Some(1)).unwrap();
        assert!(algo.evolve(&mut pop, 1).is_err());
    }
}
