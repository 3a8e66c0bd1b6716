//! `Expression<T>`: genotype -> DAG decoding, active-node evaluation,
//! structural mutation, symbolic printing and loss.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CgpError, CgpResult};
use crate::kernel::KernelSet;
use crate::rng::RandomEngine;
use crate::scalar::Scalar;
use crate::topology::{ActiveSet, CgpParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LossKind {
    Mse,
    Mae,
    Ce,
}

#[allow(clippy::type_complexity)]
#[derive(Clone)]
pub enum PhenotypeCorrection<T> {
    None,
    Functional {
        pre: Arc<dyn Fn(&[T]) -> Vec<T> + Send + Sync>,
        post: Arc<dyn Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync>,
    },
}

#[derive(Clone)]
pub struct Expression<T> {
    params: CgpParams,
    kernels: KernelSet<T>,
    genes: Vec<usize>,
    active: ActiveSet,
    rng: RandomEngine,
    correction: PhenotypeCorrection<T>,
}

impl<T: Scalar + 'static> Expression<T> {
    pub fn new(
        n: usize,
        m: usize,
        r: usize,
        c: usize,
        l: usize,
        a: usize,
        kernels: KernelSet<T>,
        seed: Option<u64>,
    ) -> CgpResult<Self> {
        let params = CgpParams::new(n, m, r, c, l, a)?;
        if kernels.is_empty() {
            return Err(CgpError::InvalidArgument(
                "kernel set must not be empty".into(),
            ));
        }
        let mut rng = RandomEngine::new(seed);
        let (lb, ub) = params.bounds(kernels.len());
        let genes: Vec<usize> = lb
            .iter()
            .zip(ub.iter())
            .map(|(&l, &u)| rng.gen_range_incl(l, u))
            .collect();
        let active = Self::recompute(&params, &kernels, &genes);
        Ok(Expression {
            params,
            kernels,
            genes,
            active,
            rng,
            correction: PhenotypeCorrection::None,
        })
    }

    fn recompute(params: &CgpParams, kernels: &KernelSet<T>, genes: &[usize]) -> ActiveSet {
        ActiveSet::compute(params, genes, |f| kernels.get(f).effective_arity(params.a))
    }

    fn recompute_active(&mut self) {
        self.active = Self::recompute(&self.params, &self.kernels, &self.genes);
    }

    pub fn params(&self) -> CgpParams {
        self.params
    }

    pub fn kernels(&self) -> &KernelSet<T> {
        &self.kernels
    }

    pub fn rng_mut(&mut self) -> &mut RandomEngine {
        &mut self.rng
    }

    pub fn active_nodes(&self) -> &[usize] {
        &self.active.active_nodes
    }

    /// Adopts an integer chromosome; fails if any gene is out of bounds.
    pub fn set(&mut self, xu: Vec<usize>) -> CgpResult<()> {
        if xu.len() != self.params.chromosome_len() {
            return Err(CgpError::InvalidArgument(format!(
                "expected chromosome of length {}, got {}",
                self.params.chromosome_len(),
                xu.len()
            )));
        }
        let (lb, ub) = self.get_bounds();
        for (i, &v) in xu.iter().enumerate() {
            if v < lb[i] || v > ub[i] {
                return Err(CgpError::OutOfBounds {
                    index: i,
                    value: v,
                    lb: lb[i],
                    ub: ub[i],
                });
            }
        }
        self.genes = xu;
        self.recompute_active();
        Ok(())
    }

    pub fn get(&self) -> Vec<usize> {
        self.genes.clone()
    }

    pub fn get_bounds(&self) -> (Vec<usize>, Vec<usize>) {
        self.params.bounds(self.kernels.len())
    }

    pub fn get_lb(&self) -> Vec<usize> {
        self.get_bounds().0
    }

    pub fn get_ub(&self) -> Vec<usize> {
        self.get_bounds().1
    }

    fn call_inner(&self, xs: &[T]) -> Vec<T> {
        self.call_inner_weighted(xs, None)
    }

    /// Shared traversal used by both the plain evaluator and
    /// `ExpressionWeighted`: when `weight` is given, it is called with
    /// `(local_node_index, edge_index)` and the result multiplies the raw
    /// operand before the kernel is applied.
    pub(crate) fn call_inner_weighted(
        &self,
        xs: &[T],
        weight: Option<&dyn Fn(usize, usize) -> T>,
    ) -> Vec<T> {
        let f = self.params.num_functional_nodes();
        let mut vals: Vec<Option<T>> = (0..f).map(|_| None).collect();
        for &node_idx in &self.active.active_nodes {
            let local = node_idx - self.params.n;
            let base = self.params.node_gene_offset(local);
            let fgene = self.genes[base];
            let kernel = self.kernels.get(fgene);
            let arity = kernel.effective_arity(self.params.a);
            let mut operands: Vec<T> = Vec::with_capacity(arity);
            for c in 0..arity {
                let target = self.genes[base + 1 + c];
                let mut v = if target < self.params.n {
                    xs[target].clone()
                } else {
                    vals[target - self.params.n]
                        .clone()
                        .expect("active predecessor evaluated before its successor")
                };
                if let Some(w) = weight {
                    v = v * w(local, c);
                }
                operands.push(v);
            }
            vals[local] = Some(kernel.apply(&operands));
        }
        let mut outputs = Vec::with_capacity(self.params.m);
        for o in 0..self.params.m {
            let gidx = self.params.output_gene_offset(o);
            let target = self.genes[gidx];
            let v = if target < self.params.n {
                xs[target].clone()
            } else {
                vals[target - self.params.n]
                    .clone()
                    .expect("output gene references a node outside the active set")
            };
            outputs.push(v);
        }
        outputs
    }

    /// Evaluates the program on `xs` (length `n`), returning `m` outputs.
    /// Computes only active nodes, in topological (ascending node-index)
    /// order: valid because every connection gene points strictly
    /// backwards under the levels-back bound.
    pub fn call(&self, xs: &[T]) -> CgpResult<Vec<T>> {
        if xs.len() != self.params.n {
            return Err(CgpError::InvalidArgument(format!(
                "expected {} inputs, got {}",
                self.params.n,
                xs.len()
            )));
        }
        match &self.correction {
            PhenotypeCorrection::None => Ok(self.call_inner(xs)),
            PhenotypeCorrection::Functional { pre, post } => {
                let corrected_in = pre(xs);
                if corrected_in.len() != self.params.n {
                    return Err(CgpError::InvalidArgument(
                        "pre-correction callback changed the input arity".into(),
                    ));
                }
                let raw = self.call_inner(&corrected_in);
                Ok(post(&corrected_in, raw))
            }
        }
    }

    pub fn set_phenotype_correction(
        &mut self,
        pre: impl Fn(&[T]) -> Vec<T> + Send + Sync + 'static,
        post: impl Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync + 'static,
    ) {
        self.correction = PhenotypeCorrection::Functional {
            pre: Arc::new(pre),
            post: Arc::new(post),
        };
    }

    pub fn unset_phenotype_correction(&mut self) {
        self.correction = PhenotypeCorrection::None;
    }

    fn gene_kind(&self, gene_idx: usize) -> GeneKind {
        let func_block_len = self.params.num_functional_nodes() * (self.params.a + 1);
        if gene_idx >= func_block_len {
            GeneKind::Output
        } else if gene_idx % (self.params.a + 1) == 0 {
            GeneKind::Function
        } else {
            GeneKind::Connection
        }
    }

    fn mutate_gene_at(&mut self, gene_idx: usize, lb: &[usize], ub: &[usize]) {
        let val = self.rng.gen_range_incl(lb[gene_idx], ub[gene_idx]);
        self.genes[gene_idx] = val;
    }

    fn select_n(&mut self, candidates: &[usize], n_mut: usize) -> Vec<usize> {
        let mut pool = candidates.to_vec();
        self.rng.shuffle(&mut pool);
        let take = n_mut.min(pool.len());
        pool.into_iter().take(take).collect()
    }

    fn mutate_from_candidates(&mut self, candidates: Vec<usize>, n_mut: usize) {
        let (lb, ub) = self.get_bounds();
        let chosen = self.select_n(&candidates, n_mut);
        for g in chosen {
            self.mutate_gene_at(g, &lb, &ub);
        }
        self.recompute_active();
    }

    /// Flips `n_mut` uniformly random genes (active or not) to uniformly
    /// random legal values.
    pub fn mutate_random(&mut self, n_mut: usize) {
        let all: Vec<usize> = (0..self.genes.len()).collect();
        self.mutate_from_candidates(all, n_mut);
    }

    /// Flips `n_mut` genes chosen among those that currently participate in
    /// the active set.
    pub fn mutate_active(&mut self, n_mut: usize) {
        let candidates = self.active.active_genes.clone();
        self.mutate_from_candidates(candidates, n_mut);
    }

    pub fn mutate_active_fgene(&mut self, n_mut: usize) {
        let candidates: Vec<usize> = self
            .active
            .active_genes
            .iter()
            .copied()
            .filter(|&g| self.gene_kind(g) == GeneKind::Function)
            .collect();
        self.mutate_from_candidates(candidates, n_mut);
    }

    pub fn mutate_active_cgene(&mut self, n_mut: usize) {
        let candidates: Vec<usize> = self
            .active
            .active_genes
            .iter()
            .copied()
            .filter(|&g| self.gene_kind(g) == GeneKind::Connection)
            .collect();
        self.mutate_from_candidates(candidates, n_mut);
    }

    pub fn mutate_ogene(&mut self, n_mut: usize) {
        let candidates: Vec<usize> = (0..self.params.m)
            .map(|o| self.params.output_gene_offset(o))
            .collect();
        self.mutate_from_candidates(candidates, n_mut);
    }

    /// Symbolic expressions of each output, walking the active graph and
    /// applying each kernel's printer. Shared subgraphs are printed once and
    /// memoized instead of being expanded at every use site.
    pub fn symbolic(&self, input_names: &[String]) -> CgpResult<Vec<String>> {
        if input_names.len() != self.params.n {
            return Err(CgpError::InvalidArgument(
                "need exactly n input names".into(),
            ));
        }
        let mut memo: HashMap<usize, String> = HashMap::new();
        let mut outputs = Vec::with_capacity(self.params.m);
        for o in 0..self.params.m {
            let gidx = self.params.output_gene_offset(o);
            let target = self.genes[gidx];
            outputs.push(self.symbolic_node(target, input_names, &mut memo));
        }
        Ok(outputs)
    }

    fn symbolic_node(
        &self,
        node_idx: usize,
        input_names: &[String],
        memo: &mut HashMap<usize, String>,
    ) -> String {
        if node_idx < self.params.n {
            return input_names[node_idx].clone();
        }
        if let Some(s) = memo.get(&node_idx) {
            return s.clone();
        }
        let local = node_idx - self.params.n;
        let base = self.params.node_gene_offset(local);
        let fgene = self.genes[base];
        let kernel = self.kernels.get(fgene);
        let arity = kernel.effective_arity(self.params.a);
        let mut names = Vec::with_capacity(arity);
        for c in 0..arity {
            let t = self.genes[base + 1 + c];
            names.push(self.symbolic_node(t, input_names, memo));
        }
        let s = kernel.print(&names);
        memo.insert(node_idx, s.clone());
        s
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GeneKind {
    Function,
    Connection,
    Output,
}

impl Expression<f64> {
    /// Mean squared/absolute error or softmax cross-entropy, averaged over
    /// rows. `points[i]` has length `n`, `labels[i]` has length `m`.
    pub fn loss(
        &self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        kind: LossKind,
    ) -> CgpResult<f64> {
        if points.len() != labels.len() || points.is_empty() {
            return Err(CgpError::InvalidArgument(
                "points and labels must be non-empty and of equal length".into(),
            ));
        }
        let mut total = 0.0f64;
        for (p, l) in points.iter().zip(labels.iter()) {
            if p.len() != self.params.n {
                return Err(CgpError::InvalidArgument(format!(
                    "row has {} features, expected {}",
                    p.len(),
                    self.params.n
                )));
            }
            if l.len() != self.params.m {
                return Err(CgpError::InvalidArgument(format!(
                    "label row has {} entries, expected {}",
                    l.len(),
                    self.params.m
                )));
            }
            let pred = self.call(p)?;
            total += match kind {
                LossKind::Mse => {
                    pred.iter().zip(l).map(|(a, b)| (a - b).powi(2)).sum::<f64>()
                        / pred.len() as f64
                }
                LossKind::Mae => {
                    pred.iter().zip(l).map(|(a, b)| (a - b).abs()).sum::<f64>() / pred.len() as f64
                }
                LossKind::Ce => {
                    let max = pred.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let exps: Vec<f64> = pred.iter().map(|v| (v - max).exp()).collect();
                    let sum: f64 = exps.iter().sum();
                    let probs: Vec<f64> = exps.iter().map(|e| e / sum).collect();
                    -probs
                        .iter()
                        .zip(l)
                        .map(|(p, y)| y * p.max(1e-12).ln())
                        .sum::<f64>()
                }
            };
        }
        let avg = total / points.len() as f64;
        Ok(if avg.is_finite() { avg } else { f64::MAX })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelSet;

    fn make(n: usize, m: usize, r: usize, c: usize, l: usize, a: usize) -> Expression<f64> {
        let kernels = KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
        Expression::new(n, m, r, c, l, a, kernels, Some(1)).unwrap()
    }

    #[test]
    fn decodes_miller_ppsn_2014_worked_example() {
        let mut ex = make(2, 4, 2, 3, 4, 2);
        ex.set(vec![0, 0, 1, 1, 0, 0, 1, 3, 1, 2, 0, 1, 0, 4, 4, 2, 5, 4, 2, 5, 7, 3])
            .unwrap();
        let out = ex.call(&[1.0, -1.0]).unwrap();
        assert_eq!(out, vec![0.0, -1.0, -1.0, 0.0]);

        let out2 = ex.call(&[-0.123, 2.345]).unwrap();
        let expected = [2.222, -0.288435, 0.676380075, 0.0];
        for (a, b) in out2.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn decodes_single_row_program() {
        let mut ex = make(4, 1, 1, 10, 10, 2);
        ex.set(vec![
            2, 3, 0, 0, 2, 2, 3, 0, 1, 1, 5, 4, 2, 6, 1, 0, 7, 7, 3, 6, 7, 1, 7, 6, 2, 4, 10, 2, 3,
            2, 10,
        ])
        .unwrap();
        let out = ex.call(&[2.0, 3.0, 4.0, -2.0]).unwrap();
        assert!((out[0] - 0.055555555555).abs() < 1e-8);

        let out2 = ex.call(&[-1.0, 1.0, -1.0, 1.0]).unwrap();
        assert!((out2[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inactive_gene_toggle_does_not_change_output() {
        let mut ex = make(2, 4, 2, 3, 4, 2);
        let original = vec![0, 0, 1, 1, 0, 0, 1, 3, 1, 2, 0, 1, 0, 4, 4, 2, 5, 4, 2, 5, 7, 3];
        ex.set(original.clone()).unwrap();
        let before = ex.call(&[0.37, -1.9]).unwrap();

        // Node6 (gene block starting at index 12: func=0,conns=4,4) is never
        // referenced by any output gene and so is inactive; mutate its
        // function gene to something else in-bounds.
        let mut mutated = original.clone();
        mutated[12] = 2; // sum -> mul, still in bounds [0,3]
        ex.set(mutated).unwrap();
        let after = ex.call(&[0.37, -1.9]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn set_then_get_roundtrips_within_bounds() {
        let ex = make(2, 4, 2, 3, 4, 2);
        let (lb, ub) = ex.get_bounds();
        let mut xu = lb.clone();
        for i in 0..xu.len() {
            xu[i] = (lb[i] + ub[i]) / 2;
        }
        let mut ex2 = ex.clone();
        ex2.set(xu.clone()).unwrap();
        assert_eq!(ex2.get(), xu);
    }

    #[test]
    fn set_out_of_bounds_gene_fails() {
        let mut ex = make(2, 4, 2, 3, 4, 2);
        let mut xu = ex.get();
        let ub = ex.get_ub();
        xu[0] = ub[0] + 1;
        let err = ex.set(xu).unwrap_err();
        assert!(matches!(err, CgpError::OutOfBounds { index: 0, .. }));
    }

    #[test]
    fn mutate_active_changes_at_most_n_positions() {
        let mut ex = make(2, 4, 2, 3, 4, 2);
        ex.set(vec![0, 0, 1, 1, 0, 0, 1, 3, 1, 2, 0, 1, 0, 4, 4, 2, 5, 4, 2, 5, 7, 3])
            .unwrap();
        let before = ex.get();
        ex.mutate_active(2);
        let after = ex.get();
        let diffs = before.iter().zip(after.iter()).filter(|(a, b)| a != b).count();
        assert!(diffs <= 2);
    }

    #[test]
    fn unused_connection_genes_are_not_selected_by_cgene_mutation() {
        // Node3 (gene block at index 3: func=1 "diff", conns 0,0) is a
        // binary kernel so both its connection genes are active; but if we
        // swap its kernel to something of the same effective arity the
        // excluded-gene behaviour is exercised by the arity-1 kernels below.
        let kernels = KernelSet::from_names(&["sqrt", "sum"]).unwrap();
        let mut ex = Expression::new(1, 1, 1, 1, 1, 2, kernels, Some(7)).unwrap();
        // function gene 0 = sqrt (unary): only conn_1 is active, conn_2 is not.
        ex.set(vec![0, 0, 0, 1]).unwrap();
        let active_conn_genes: Vec<usize> = ex
            .active
            .active_genes
            .iter()
            .copied()
            .filter(|&g| ex.gene_kind(g) == GeneKind::Connection)
            .collect();
        assert_eq!(active_conn_genes, vec![1]);
    }

    /// Wires `2*y^2*(x+z)^2` into a 21-column grid (`l = c = 21`, so every
    /// column may reach every earlier one) and evaluates it at `(1,1,1)` over
    /// an order-2 Taylor jet, exercising `Expression<T>`'s polymorphism over
    /// `T` with `T = Jet2` instead of `f64`.
    #[test]
    fn jet_derivative_of_squared_sum_matches_hand_derivative() {
        use crate::taylor::Jet2;

        let kernels: KernelSet<Jet2> = KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
        let mut ex = Expression::<Jet2>::new(3, 1, 1, 21, 21, 2, kernels, Some(1)).unwrap();

        // node0 = x + z; node1 = node0 * node0; node2 = y * y;
        // node3 = node1 * node2; node4 = node3 + node3 = 2*y^2*(x+z)^2.
        let mut genes = vec![0usize; ex.params().chromosome_len()];
        genes[0..3].copy_from_slice(&[0, 0, 2]); // node0: sum(x, z)
        genes[3..6].copy_from_slice(&[2, 3, 3]); // node1: mul(node0, node0)
        genes[6..9].copy_from_slice(&[2, 1, 1]); // node2: mul(y, y)
        genes[9..12].copy_from_slice(&[2, 4, 5]); // node3: mul(node1, node2)
        genes[12..15].copy_from_slice(&[0, 6, 6]); // node4: sum(node3, node3)
        let last = genes.len() - 1;
        genes[last] = 7; // output = node4 (global index n + 4 = 7)
        ex.set(genes).unwrap();

        let x = Jet2::variable(1.0, 3, 0);
        let y = Jet2::variable(1.0, 3, 1);
        let z = Jet2::variable(1.0, 3, 2);
        let out = ex.call(&[x, y, z]).unwrap();
        let f = &out[0];

        assert!((f.val - 8.0).abs() < 1e-9);
        // df/dx, df/dy, df/dz.
        assert!((f.grad[0] - 8.0).abs() < 1e-9);
        assert!((f.grad[1] - 16.0).abs() < 1e-9);
        assert!((f.grad[2] - 8.0).abs() < 1e-9);
        // d2f/dx2, d2f/dy2, d2f/dz2, d2f/dxdy, d2f/dydz, d2f/dxdz.
        assert!((f.hess[0][0] - 4.0).abs() < 1e-9);
        assert!((f.hess[1][1] - 16.0).abs() < 1e-9);
        assert!((f.hess[2][2] - 4.0).abs() < 1e-9);
        assert!((f.hess[0][1] - 16.0).abs() < 1e-9);
        assert!((f.hess[1][2] - 16.0).abs() < 1e-9);
        assert!((f.hess[0][2] - 4.0).abs() < 1e-9);
    }
}
