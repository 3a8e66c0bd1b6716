//! Minimal population/host interface consumed by the evolutionary
//! algorithms. This is the external "decision vector +
//! fitness vector" store; algorithms copy it into a local working
//! population at the start of `evolve` and write the result back.

use std::sync::Arc;

use crate::problem::Problem;

pub struct Population {
    problem: Arc<dyn Problem>,
    x: Vec<Vec<f64>>,
    f: Vec<Vec<f64>>,
}

impl Population {
    pub fn new(problem: Arc<dyn Problem>) -> Self {
        Population {
            problem,
            x: Vec::new(),
            f: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.x.len()
    }

    pub fn get_x(&self) -> &[Vec<f64>] {
        &self.x
    }

    pub fn get_f(&self) -> &[Vec<f64>] {
        &self.f
    }

    pub fn get_problem(&self) -> &dyn Problem {
        self.problem.as_ref()
    }

    pub fn push_back(&mut self, x: Vec<f64>, f: Vec<f64>) {
        self.x.push(x);
        self.f.push(f);
    }

    pub fn set_xf(&mut self, i: usize, x: Vec<f64>, f: Vec<f64>) {
        self.x[i] = x;
        self.f[i] = f;
    }

    pub fn best_index_single_objective(&self) -> Option<usize> {
        self.f
            .iter()
            .enumerate()
            .filter(|(_, f)| f[0].is_finite())
            .min_by(|a, b| a.1[0].partial_cmp(&b.1[0]).unwrap())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::kernel::KernelSet;
    use crate::problem::SymbolicRegressionProblem;

    fn trivial_problem() -> Arc<dyn Problem> {
        let kernels: KernelSet<f64> = KernelSet::from_names(&["sum"]).unwrap();
        let cgp = Expression::new(1, 1, 1, 1, 1, 1, kernels, Some(1)).unwrap();
        Arc::new(
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
        )
    }

    #[test]
    fn push_back_and_best_index() {
        let mut pop = Population::new(trivial_problem());
        pop.push_back(vec![0.0], vec![5.0]);
        pop.push_back(vec![1.0], vec![2.0]);
        pop.push_back(vec![2.0], vec![f64::NAN]);
        assert_eq!(pop.size(), 3);
        assert_eq!(pop.best_index_single_objective(), Some(1));
    }

    #[test]
    fn set_xf_overwrites_entry() {
        let mut pop = Population::new(trivial_problem());
        pop.push_back(vec![0.0], vec![5.0]);
        pop.set_xf(0, vec![9.0], vec![1.0]);
        assert_eq!(pop.get_x()[0], vec![9.0]);
        assert_eq!(pop.get_f()[0], vec![1.0]);
    }
}
