//! Generic memetic CGP evolution loop. One generation:
//! assign each individual a mutation count, mutate its active genes on a
//! scratch expression, optionally take a local-search step on its ephemeral
//! constants, score it, filter duplicates/non-finite fitness out of the
//! candidate pool, then select the next population from parents ∪ children.

use crate::algorithms::{LocalLearner, LogRecord, SelectionKind};
use crate::error::{CgpError, CgpResult};
use crate::mo::{fast_non_dominated_sort, select_best_n_mo};
use crate::population::Population;
use crate::problem::{Problem, SymbolicRegressionProblem};
use crate::rng::RandomEngine;

/// Log a fresh column header every this many printed lines, matching the
/// original `momes4cgp.hpp`'s `count % 50u == 1u` cadence.
const LOG_HEADER_EVERY: u64 = 50;

pub struct Memetic {
    name: &'static str,
    learner: LocalLearner,
    selection: SelectionKind,
    max_mut: usize,
    rng: RandomEngine,
    verbosity: u32,
    log: Vec<LogRecord>,
    printed_lines: u64,
}

impl Memetic {
    pub fn new(
        name: &'static str,
        learner: LocalLearner,
        selection: SelectionKind,
        max_mut: usize,
        seed: Option<u64>,
    ) -> CgpResult<Self> {
        if max_mut == 0 {
            return Err(CgpError::InvalidArgument(
                "max_mut must be at least 1".into(),
            ));
        }
        Ok(Memetic {
            name,
            learner,
            selection,
            max_mut,
            rng: RandomEngine::new(seed),
            verbosity: 0,
            log: Vec::new(),
            printed_lines: 1,
        })
    }

    pub fn get_name(&self) -> String {
        self.name.to_string()
    }

    pub fn get_extra_info(&self) -> String {
        format!(
            "max_mut={}, local_learner={:?}, selection={:?}, seed={}",
            self.max_mut, self.learner, self.selection, self.rng.seed()
        )
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng.set_seed(seed);
    }

    pub fn get_seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.verbosity = verbosity;
    }

    pub fn get_verbosity(&self) -> u32 {
        self.verbosity
    }

    pub fn get_log(&self) -> &[LogRecord] {
        &self.log
    }

    /// Runs `gen` generations in place over `pop`. `gen == 0` is a no-op.
    pub fn evolve(&mut self, pop: &mut Population, gen: u64) -> CgpResult<()> {
        let sr = pop
            .get_problem()
            .extract_symbolic_regression()
            .ok_or_else(|| {
                CgpError::NotApplicable(
                    "this algorithm requires a SymbolicRegressionProblem".into(),
                )
            })?;
        if pop.size() < 2 {
            return Err(CgpError::InvalidArgument(
                "population must hold at least 2 individuals".into(),
            ));
        }
        if self.selection == SelectionKind::MultiObjective && sr.get_nobj() < 2 {
            return Err(CgpError::InvalidArgument(
                "multi-objective selection requires a multi-objective problem".into(),
            ));
        }
        if gen == 0 {
            return Ok(());
        }

        let template = sr.get_cgp().clone();
        let k = sr.get_ncx();

        for g in 0..gen {
            self.run_generation(pop, &template, k)?;
            self.record_log(pop, (g + 1) as u32);
        }
        Ok(())
    }

    fn run_generation(
        &mut self,
        pop: &mut Population,
        template: &crate::expression::Expression<f64>,
        k: usize,
    ) -> CgpResult<()> {
        let n = pop.size();
        let mut counts: Vec<usize> = (0..n).map(|i| i % self.max_mut).collect();
        self.rng.shuffle(&mut counts);

        let problem = pop.get_problem();
        let mut seen: Vec<Vec<f64>> = pop.get_f().to_vec();
        let mut children: Vec<(Vec<f64>, Vec<f64>)> = Vec::new();

        for (i, &mi) in counts.iter().enumerate() {
            let xi = &pop.get_x()[i];
            let (ephemeral, int_part) = split(xi, k);
            let mut scratch = template.clone();
            scratch.set(int_part)?;
            if mi > 0 {
                // `template`'s RNG is a frozen clone shared by every
                // scratch; reseed from the algorithm's own engine so the
                // stream advances per mutated individual and the algorithm
                // seed actually governs which genes flip.
                let draw = self.rng.next_u64();
                scratch.rng_mut().set_seed(draw);
                scratch.mutate_active(mi);
            }
            let mut candidate: Vec<f64> = ephemeral;
            candidate.extend(scratch.get().into_iter().map(|g| g as f64));

            self.local_search(problem, k, &mut candidate)?;

            let f = problem.fitness(&candidate)?;
            if !f[0].is_finite() || seen.iter().any(|sf| sf == &f) {
                continue;
            }
            seen.push(f.clone());
            children.push((candidate, f));
        }

        let mut pool_x = pop.get_x().to_vec();
        let mut pool_f = pop.get_f().to_vec();
        for (x, f) in children {
            pool_x.push(x);
            pool_f.push(f);
        }

        let selected = match self.selection {
            SelectionKind::SingleObjective => {
                let mut idx: Vec<usize> = (0..pool_f.len()).filter(|&i| pool_f[i][0].is_finite()).collect();
                idx.sort_by(|&a, &b| pool_f[a][0].partial_cmp(&pool_f[b][0]).unwrap());
                idx.truncate(n);
                idx
            }
            SelectionKind::MultiObjective => select_best_n_mo(&pool_f, n),
        };

        for (slot, &idx) in selected.iter().enumerate() {
            pop.set_xf(slot, pool_x[idx].clone(), pool_f[idx].clone());
        }
        Ok(())
    }

    fn local_search(
        &self,
        problem: &dyn Problem,
        k: usize,
        candidate: &mut [f64],
    ) -> CgpResult<()> {
        match self.learner {
            LocalLearner::None => Ok(()),
            LocalLearner::GradientDescent { eta } => {
                let grad = problem.gradient(candidate)?;
                for i in 0..k {
                    candidate[i] -= eta * grad[i];
                }
                Ok(())
            }
            LocalLearner::Newton => {
                let grad = problem.gradient(candidate)?;
                let hess_flat = &problem.hessians(candidate)?[0];
                let pattern = &problem.hessians_sparsity()[0];
                let mut h = vec![vec![0.0; k]; k];
                for (&(i, j), &v) in pattern.iter().zip(hess_flat.iter()) {
                    h[i][j] = v;
                    h[j][i] = v;
                }
                if let Some(delta) = solve_linear(&h, &grad) {
                    for i in 0..k {
                        candidate[i] -= delta[i];
                    }
                }
                Ok(())
            }
        }
    }

    fn record_log(&mut self, pop: &Population, gen: u32) {
        let best = pop
            .get_f()
            .iter()
            .filter(|f| f[0].is_finite())
            .min_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());
        let best_loss = best.map(|f| f[0]).unwrap_or(f64::INFINITY);
        let multi = self.selection == SelectionKind::MultiObjective;
        let ndf_size = if multi {
            Some(fast_non_dominated_sort(pop.get_f())[0].len() as u64)
        } else {
            None
        };
        let best_complexity = if multi { best.map(|f| f[1]) } else { None };

        let record = LogRecord {
            gen,
            fevals: pop.get_problem().get_fevals(),
            best_loss,
            ndf_size,
            best_complexity,
        };
        // A line is emitted only for generations where `gen % verbosity ==
        // 1`; the header is re-printed every 50 *printed* lines, not every
        // 50 generations.
        if self.verbosity > 0 && gen as u64 % self.verbosity as u64 == 1 {
            if self.printed_lines % LOG_HEADER_EVERY == 1 {
                log::info!(
                    "{:>6} {:>10} {:>14} {:>8} {:>12}",
                    "gen", "fevals", "best_loss", "ndf", "complexity"
                );
            }
            log::info!(
                "{:>6} {:>10} {:>14.6} {:>8} {:>12}",
                record.gen,
                record.fevals,
                record.best_loss,
                record.ndf_size.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                record
                    .best_complexity
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".into()),
            );
            self.printed_lines += 1;
        }
        self.log.push(record);
    }
}

fn split(x: &[f64], k: usize) -> (Vec<f64>, Vec<usize>) {
    let ephemeral = x[..k].to_vec();
    let int_part: Vec<usize> = x[k..].iter().map(|v| v.round() as usize).collect();
    (ephemeral, int_part)
}

/// Solves `h * delta = g` by Gauss-Jordan elimination with partial
/// pivoting; returns `None` when `h` is numerically singular (pivot below
/// `1e-10`), in which case the caller should skip the local-search step
/// rather than divide by a near-zero curvature.
fn solve_linear(h: &[Vec<f64>], g: &[f64]) -> Option<Vec<f64>> {
    let k = g.len();
    if k == 1 {
        return if h[0][0].abs() < 1e-10 {
            None
        } else {
            Some(vec![g[0] / h[0][0]])
        };
    }
    let mut a: Vec<Vec<f64>> = h.to_vec();
    let mut b: Vec<f64> = g.to_vec();

    for col in 0..k {
        let pivot_row = (col..k).max_by(|&r1, &r2| a[r1][col].abs().partial_cmp(&a[r2][col].abs()).unwrap())?;
        if a[pivot_row][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in col..k {
            a[col][j] /= pivot;
        }
        b[col] /= pivot;

        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..k {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_linear_scalar_case() {
        let h = vec![vec![2.0]];
        let g = vec![4.0];
        let delta = solve_linear(&h, &g).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn solve_linear_rejects_singular_matrix() {
        let h = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let g = vec![1.0, 1.0];
        assert!(solve_linear(&h, &g).is_none());
    }

    #[test]
    fn solve_linear_two_by_two() {
        // diag(2, 4) * delta = (4, 8) -> delta = (2, 2)
        let h = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let g = vec![4.0, 8.0];
        let delta = solve_linear(&h, &g).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-9);
        assert!((delta[1] - 2.0).abs() < 1e-9);
    }

    fn trivial_sr_problem(multi: bool) -> SymbolicRegressionProblem {
        use crate::expression::Expression;
        use crate::kernel::KernelSet;
        let kernels: KernelSet<f64> = KernelSet::from_names(&["sum", "mul"]).unwrap();
        let cgp = Expression::new(2, 1, 1, 4, 5, 2, kernels, Some(7)).unwrap();
        let points = vec![vec![1.0], vec![2.0], vec![-1.0]];
        let labels = vec![vec![1.0], vec![4.0], vec![1.0]];
        SymbolicRegressionProblem::new(
            cgp,
            vec!["sum".into(), "mul".into()],
            1,
            points,
            labels,
            multi,
            (-5.0, 5.0),
        )
        .unwrap()
    }

    fn seed_population(problem: std::sync::Arc<dyn Problem>, n: usize) -> Population {
        let mut pop = Population::new(problem);
        let (lb, ub) = pop.get_problem().get_bounds();
        let mut rng = RandomEngine::new(Some(11));
        for _ in 0..n {
            let x: Vec<f64> = lb
                .iter()
                .zip(ub.iter())
                .map(|(&l, &u)| rng.gen_f64_range(l, u + 1.0).floor().max(l).min(u))
                .collect();
            let f = pop.get_problem().fitness(&x).unwrap();
            pop.push_back(x, f);
        }
        pop
    }

    #[test]
    fn evolve_zero_generations_is_a_no_op() {
        let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(false));
        let mut pop = seed_population(problem, 4);
        let before = pop.get_x().to_vec();
        let mut algo = Memetic::new("test", LocalLearner::None, SelectionKind::SingleObjective, 2, Some(1)).unwrap();
        algo.evolve(&mut pop, 0).unwrap();
        assert_eq!(pop.get_x(), before.as_slice());
        assert!(algo.get_log().is_empty());
    }

    #[test]
    fn evolve_never_increases_best_loss_single_objective() {
        let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(false));
        let mut pop = seed_population(problem, 6);
        let best_before = pop.best_index_single_objective().map(|i| pop.get_f()[i][0]);
        let mut algo = Memetic::new("test", LocalLearner::None, SelectionKind::SingleObjective, 3, Some(5)).unwrap();
        algo.evolve(&mut pop, 5).unwrap();
        let best_after = pop.best_index_single_objective().map(|i| pop.get_f()[i][0]);
        assert!(best_after.unwrap() <= best_before.unwrap() + 1e-9);
        assert_eq!(algo.get_log().len(), 5);
    }

    #[test]
    fn evolve_rejects_undersized_population() {
        let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(false));
        let mut pop = seed_population(problem, 1);
        let mut algo = Memetic::new("test", LocalLearner::None, SelectionKind::SingleObjective, 1, Some(1)).unwrap();
        assert!(algo.evolve(&mut pop, 3).is_err());
    }

    #[test]
    fn evolve_rejects_multi_objective_selection_on_single_objective_problem() {
        let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(false));
        let mut pop = seed_population(problem, 4);
        let mut algo = Memetic::new("test", LocalLearner::None, SelectionKind::MultiObjective, 1, Some(1)).unwrap();
        assert!(algo.evolve(&mut pop, 1).is_err());
    }

    #[test]
    fn evolve_multi_objective_tracks_non_dominated_front_size() {
        let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(true));
        let mut pop = seed_population(problem, 6);
        let mut algo = Memetic::new("test", LocalLearner::None, SelectionKind::MultiObjective, 2, Some(3)).unwrap();
        algo.evolve(&mut pop, 3).unwrap();
        assert!(algo.get_log().iter().all(|r| r.ndf_size.is_some()));
    }

    #[test]
    fn evolve_is_reproducible_from_the_same_seed() {
        let run = |seed: u64| {
            let problem: std::sync::Arc<dyn Problem> = std::sync::Arc::new(trivial_sr_problem(false));
            let mut pop = seed_population(problem, 6);
            let mut algo =
                Memetic::new("test", LocalLearner::Newton, SelectionKind::SingleObjective, 3, Some(seed))
                    .unwrap();
            algo.evolve(&mut pop, 4).unwrap();
            (pop.get_x().to_vec(), pop.get_f().to_vec(), algo.get_log().to_vec())
        };
        let (x1, f1, log1) = run(42);
        let (x2, f2, log2) = run(42);
        assert_eq!(x1, x2);
        assert_eq!(f1, f2);
        assert_eq!(log1, log2);
    }

    #[test]
    fn construction_rejects_zero_max_mut() {
        assert!(Memetic::new("test", LocalLearner::None, SelectionKind::SingleObjective, 0, Some(1)).is_err());
    }
}
