//! `SymbolicRegressionProblem` and the minimal `Problem` trait algorithms
//! consume.
//!
//! The decision vector is `[ephemeral (k reals), integer CGP suffix]`. Loss
//! is always mean squared error; complexity (the second objective, when the
//! problem is multi-objective) is the number of active nodes. Gradient and
//! Hessian w.r.t. the ephemeral constants are obtained by instantiating the
//! same `Expression` over `Jet2` rather than hand-deriving either; the
//! graph only needs to be written once.
//!
//! `Problem::fitness_batch` is the one opt-in parallel entry point: a batch
//! evaluator may score many decision vectors at once, since `fitness` only
//! touches immutable topology plus stack-local scratch state.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::error::{CgpError, CgpResult};
use crate::expression::{Expression, LossKind};
use crate::kernel::KernelSet;
use crate::taylor::Jet2;

pub trait Problem: Send + Sync {
    fn get_nobj(&self) -> usize;
    fn get_ncx(&self) -> usize;
    fn get_bounds(&self) -> (Vec<f64>, Vec<f64>);
    fn fitness(&self, x: &[f64]) -> CgpResult<Vec<f64>>;
    fn gradient(&self, x: &[f64]) -> CgpResult<Vec<f64>>;
    fn hessians(&self, x: &[f64]) -> CgpResult<Vec<Vec<f64>>>;
    fn hessians_sparsity(&self) -> Vec<Vec<(usize, usize)>>;
    fn get_fevals(&self) -> u64;
    fn get_name(&self) -> String;
    fn as_any(&self) -> &dyn Any;

    /// Downcast capability used by algorithms to obtain the underlying CGP
    /// handle; returns `None` when this problem isn't a
    /// `SymbolicRegressionProblem`, which the caller should turn into a
    /// `NotApplicable` error.
    fn extract_symbolic_regression(&self) -> Option<&SymbolicRegressionProblem> {
        self.as_any().downcast_ref::<SymbolicRegressionProblem>()
    }

    /// Evaluates `fitness` on every row of `xs` concurrently. Safe because
    /// `fitness` touches only immutable graph topology plus stack-local
    /// temporaries; the only mutation is the atomic feval counter. This is
    /// the boundary where the host's batch evaluator is expected to plug in.
    fn fitness_batch(&self, xs: &[Vec<f64>]) -> Vec<CgpResult<Vec<f64>>> {
        xs.par_iter().map(|x| self.fitness(x)).collect()
    }
}

pub struct SymbolicRegressionProblem {
    cgp: Expression<f64>,
    kernel_names: Vec<String>,
    k: usize,
    n_features: usize,
    points: Vec<Vec<f64>>,
    labels: Vec<Vec<f64>>,
    multi_objective: bool,
    continuous_bounds: (f64, f64),
    fevals: AtomicU64,
}

impl SymbolicRegressionProblem {
    pub fn new(
        cgp: Expression<f64>,
        kernel_names: Vec<String>,
        k: usize,
        points: Vec<Vec<f64>>,
        labels: Vec<Vec<f64>>,
        multi_objective: bool,
        continuous_bounds: (f64, f64),
    ) -> CgpResult<Self> {
        if points.is_empty() || points.len() != labels.len() {
            return Err(CgpError::InvalidArgument(
                "points and labels must be non-empty and of equal length".into(),
            ));
        }
        let n_features = points[0].len();
        if !points.iter().all(|p| p.len() == n_features) {
            return Err(CgpError::InvalidArgument(
                "all dataset rows must have the same number of features".into(),
            ));
        }
        if !labels.iter().all(|l| l.len() == cgp.params().m) {
            return Err(CgpError::InvalidArgument(
                "label rows must match the expression's output count".into(),
            ));
        }
        if cgp.params().n != k + n_features {
            return Err(CgpError::InvalidArgument(format!(
                "expression expects {} inputs, but k={k} ephemeral constants + {n_features} features = {}",
                cgp.params().n,
                k + n_features
            )));
        }
        Ok(SymbolicRegressionProblem {
            cgp,
            kernel_names,
            k,
            n_features,
            points,
            labels,
            multi_objective,
            continuous_bounds,
            fevals: AtomicU64::new(0),
        })
    }

    pub fn get_cgp(&self) -> &Expression<f64> {
        &self.cgp
    }

    pub fn set_cgp_genes(&mut self, genes: Vec<usize>) -> CgpResult<()> {
        self.cgp.set(genes)
    }

    fn decision_len(&self) -> usize {
        self.k + self.cgp.params().chromosome_len()
    }

    fn validate_len(&self, x: &[f64]) -> CgpResult<()> {
        if x.len() != self.decision_len() {
            return Err(CgpError::InvalidArgument(format!(
                "expected decision vector of length {}, got {}",
                self.decision_len(),
                x.len()
            )));
        }
        Ok(())
    }

    fn split(&self, x: &[f64]) -> (Vec<f64>, Vec<usize>) {
        let ephemeral = x[..self.k].to_vec();
        let int_part: Vec<usize> = x[self.k..].iter().map(|v| v.round() as usize).collect();
        (ephemeral, int_part)
    }

    /// Accumulated MSE loss as a `k`-variable Taylor jet, differentiated
    /// w.r.t. the ephemeral constants only; dataset features enter as
    /// constant (zero-gradient) jets.
    fn loss_jet(&self, x: &[f64]) -> CgpResult<Jet2> {
        self.validate_len(x)?;
        let (ephemeral, int_part) = self.split(x);
        let kernels: KernelSet<Jet2> =
            KernelSet::from_names(&self.kernel_names.iter().map(|s| s.as_str()).collect::<Vec<_>>())?;
        let params = self.cgp.params();
        let mut jet_expr = Expression::<Jet2>::new(
            params.n, params.m, params.r, params.c, params.l, params.a, kernels, Some(0),
        )?;
        jet_expr.set(int_part)?;

        let eph_jets: Vec<Jet2> = (0..self.k)
            .map(|i| Jet2::variable(ephemeral[i], self.k, i))
            .collect();

        let mut total = Jet2::constant(0.0, self.k);
        for (p, l) in self.points.iter().zip(self.labels.iter()) {
            let mut row: Vec<Jet2> = eph_jets.clone();
            row.extend(p.iter().map(|&v| Jet2::constant(v, self.k)));
            let out = jet_expr.call(&row)?;
            let m = out.len() as f64;
            let mut row_loss = Jet2::constant(0.0, self.k);
            for (o, y) in out.into_iter().zip(l.iter()) {
                let diff = o - Jet2::constant(*y, self.k);
                let sq = diff.clone() * diff;
                row_loss = row_loss + sq;
            }
            total = total + row_loss.scale(1.0 / m);
        }
        Ok(total.scale(1.0 / self.points.len() as f64))
    }

    pub fn predict(&self, x: &[f64], new_points: &[Vec<f64>]) -> CgpResult<Vec<Vec<f64>>> {
        self.validate_len(x)?;
        let (ephemeral, int_part) = self.split(x);
        let mut scratch = self.cgp.clone();
        scratch.set(int_part)?;
        let mut out = Vec::with_capacity(new_points.len());
        for p in new_points {
            if p.len() != self.n_features {
                return Err(CgpError::InvalidArgument(format!(
                    "expected {} features, got {}",
                    self.n_features,
                    p.len()
                )));
            }
            let mut row = ephemeral.clone();
            row.extend_from_slice(p);
            out.push(scratch.call(&row)?);
        }
        Ok(out)
    }
}

impl Problem for SymbolicRegressionProblem {
    fn get_nobj(&self) -> usize {
        if self.multi_objective {
            2
        } else {
            1
        }
    }

    fn get_ncx(&self) -> usize {
        self.k
    }

    fn get_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let (clb, cub) = self.continuous_bounds;
        let (ilb, iub) = self.cgp.get_bounds();
        let mut lb = vec![clb; self.k];
        let mut ub = vec![cub; self.k];
        lb.extend(ilb.into_iter().map(|v| v as f64));
        ub.extend(iub.into_iter().map(|v| v as f64));
        (lb, ub)
    }

    fn fitness(&self, x: &[f64]) -> CgpResult<Vec<f64>> {
        self.validate_len(x)?;
        let (ephemeral, int_part) = self.split(x);
        let mut scratch = self.cgp.clone();
        scratch.set(int_part)?;

        let mut rows = Vec::with_capacity(self.points.len());
        for p in &self.points {
            let mut row = ephemeral.clone();
            row.extend_from_slice(p);
            rows.push(row);
        }
        let loss = scratch.loss(&rows, &self.labels, LossKind::Mse)?;
        self.fevals.fetch_add(1, Ordering::Relaxed);

        if self.multi_objective {
            let complexity = scratch.active_nodes().len() as f64;
            Ok(vec![loss, complexity])
        } else {
            Ok(vec![loss])
        }
    }

    fn gradient(&self, x: &[f64]) -> CgpResult<Vec<f64>> {
        Ok(self.loss_jet(x)?.grad)
    }

    fn hessians(&self, x: &[f64]) -> CgpResult<Vec<Vec<f64>>> {
        let jet = self.loss_jet(x)?;
        let pattern = self.hessians_sparsity();
        let h1: Vec<f64> = pattern[0].iter().map(|&(i, j)| jet.hess[i][j]).collect();
        if self.multi_objective {
            let h2 = vec![0.0; pattern[1].len()];
            Ok(vec![h1, h2])
        } else {
            Ok(vec![h1])
        }
    }

    fn hessians_sparsity(&self) -> Vec<Vec<(usize, usize)>> {
        let pattern: Vec<(usize, usize)> = (0..self.k)
            .flat_map(|i| (i..self.k).map(move |j| (i, j)))
            .collect();
        vec![pattern; self.get_nobj()]
    }

    fn get_fevals(&self) -> u64 {
        self.fevals.load(Ordering::Relaxed)
    }

    fn get_name(&self) -> String {
        "symbolic regression".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelSet;

    fn xyz_problem() -> SymbolicRegressionProblem {
        // n = 3 ephemeral constants, 0 real features; topology only, wiring
        // is whatever the seed draws (exact-derivative correctness of the
        // jet engine is covered directly in `expression.rs`'s jet tests).
        let kernels: KernelSet<f64> =
            KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
        let cgp = Expression::new(3, 1, 1, 21, 21, 2, kernels, Some(1)).unwrap();
        let points = vec![vec![]];
        let labels = vec![vec![0.0]];
        SymbolicRegressionProblem::new(
            cgp,
            vec!["sum".into(), "diff".into(), "mul".into(), "div".into()],
            3,
            points,
            labels,
            false,
            (-10.0, 10.0),
        )
        .unwrap()
    }

    #[test]
    fn bounds_have_right_shape() {
        let prob = xyz_problem();
        let (lb, ub) = prob.get_bounds();
        assert_eq!(lb.len(), prob.decision_len());
        assert_eq!(ub.len(), prob.decision_len());
        assert_eq!(lb[0], -10.0);
        assert_eq!(ub[0], 10.0);
    }

    #[test]
    fn hessians_sparsity_is_upper_triangular() {
        let prob = xyz_problem();
        let pattern = &prob.hessians_sparsity()[0];
        assert_eq!(pattern.len(), 6); // k=3 -> 3*4/2
        assert!(pattern.iter().all(|&(i, j)| i <= j));
    }

    #[test]
    fn fitness_rejects_wrong_length() {
        let prob = xyz_problem();
        assert!(prob.fitness(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn extract_symbolic_regression_round_trips() {
        let prob: Box<dyn Problem> = Box::new(xyz_problem());
        assert!(prob.extract_symbolic_regression().is_some());
    }

    #[test]
    fn gradient_matches_central_finite_difference_on_ephemeral_constants() {
        let prob = xyz_problem();
        let (lb, ub) = prob.get_bounds();
        let mut rng = crate::rng::RandomEngine::new(Some(4));
        let mut x: Vec<f64> = lb
            .iter()
            .zip(ub.iter())
            .map(|(&l, &u)| rng.gen_f64_range(l, u))
            .collect();
        for v in x[prob.k..].iter_mut() {
            *v = v.round();
        }

        let grad = prob.gradient(&x).unwrap();
        for i in 0..prob.k {
            let h = x[i].abs().max(1.0) * 1e-4;
            let mut plus = x.clone();
            plus[i] += h;
            let mut minus = x.clone();
            minus[i] -= h;
            let fd = (prob.fitness(&plus).unwrap()[0] - prob.fitness(&minus).unwrap()[0]) / (2.0 * h);
            assert!(
                (fd - grad[i]).abs() <= 0.05 * grad[i].abs().max(1e-6),
                "ephemeral {i}: analytical {} vs finite-diff {}",
                grad[i],
                fd
            );
        }
    }

    #[test]
    fn hessian_is_symmetric_up_to_sparsity_pattern() {
        let prob = xyz_problem();
        let (lb, ub) = prob.get_bounds();
        let mut x = lb.clone();
        for (xi, u) in x.iter_mut().zip(ub.iter()) {
            *xi = (*xi + *u) / 2.0;
        }
        for v in x[prob.k..].iter_mut() {
            *v = v.round();
        }
        let h1 = &prob.hessians(&x).unwrap()[0];
        let pattern = &prob.hessians_sparsity()[0];
        // Re-evaluate swapping (i, j) via the dense jet directly: the sparse
        // triplets came from a symmetric jet.hess, so every off-diagonal
        // triplet's value must equal its transpose's.
        let jet = prob.loss_jet(&x).unwrap();
        for (&(i, j), &v) in pattern.iter().zip(h1.iter()) {
            assert!((jet.hess[i][j] - jet.hess[j][i]).abs() < 1e-12);
            assert!((v - jet.hess[i][j]).abs() < 1e-12);
        }
    }

    #[test]
    fn fitness_batch_matches_sequential_fitness() {
        let prob = xyz_problem();
        let (lb, ub) = prob.get_bounds();
        let rows = vec![lb.clone(), ub.clone(), lb];
        let batch = prob.fitness_batch(&rows);
        assert_eq!(batch.len(), rows.len());
        for (x, f) in rows.iter().zip(batch.iter()) {
            assert_eq!(f.as_ref().unwrap(), &prob.fitness(x).unwrap());
        }
    }
}
