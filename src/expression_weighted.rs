//! `ExpressionWeighted`: an `Expression` with one scalar weight per incoming
//! edge of every functional node (overview item 4). Unlike `ExpressionAnn`,
//! the kernel set is unrestricted and weighting happens per-edge before the
//! kernel's own fold, not as a separate activation step. Weights live in
//! `f64`: nothing here differentiates through them, so unlike
//! `Expression<T>` there is no need to carry the evaluation type as a
//! parameter here.

use crate::error::{CgpError, CgpResult};
use crate::expression::Expression;
use crate::kernel::KernelSet;

#[derive(Clone)]
pub struct ExpressionWeighted {
    inner: Expression<f64>,
    weights: Vec<f64>,
}

impl ExpressionWeighted {
    pub fn new(
        n: usize,
        m: usize,
        r: usize,
        c: usize,
        l: usize,
        a: usize,
        kernels: KernelSet<f64>,
        seed: Option<u64>,
    ) -> CgpResult<Self> {
        let inner = Expression::new(n, m, r, c, l, a, kernels, seed)?;
        let f = inner.params().num_functional_nodes();
        let a = inner.params().a;
        let weights = vec![1.0; f * a];
        Ok(ExpressionWeighted { inner, weights })
    }

    pub fn params(&self) -> crate::topology::CgpParams {
        self.inner.params()
    }

    pub fn set(&mut self, xu: Vec<usize>) -> CgpResult<()> {
        self.inner.set(xu)
    }

    pub fn get(&self) -> Vec<usize> {
        self.inner.get()
    }

    pub fn get_lb(&self) -> Vec<usize> {
        self.inner.get_lb()
    }

    pub fn get_ub(&self) -> Vec<usize> {
        self.inner.get_ub()
    }

    fn weight_index(&self, local_node: usize, edge: usize) -> usize {
        local_node * self.inner.params().a + edge
    }

    pub fn set_weight(&mut self, local_node: usize, edge: usize, w: f64) -> CgpResult<()> {
        let idx = self.weight_index(local_node, edge);
        if idx >= self.weights.len() {
            return Err(CgpError::OutOfBounds {
                index: idx,
                value: 0,
                lb: 0,
                ub: self.weights.len().saturating_sub(1),
            });
        }
        self.weights[idx] = w;
        Ok(())
    }

    pub fn get_weight(&self, local_node: usize, edge: usize) -> f64 {
        self.weights[self.weight_index(local_node, edge)]
    }

    pub fn set_weights(&mut self, w: Vec<f64>) -> CgpResult<()> {
        if w.len() != self.weights.len() {
            return Err(CgpError::InvalidArgument(format!(
                "expected {} weights, got {}",
                self.weights.len(),
                w.len()
            )));
        }
        self.weights = w;
        Ok(())
    }

    pub fn get_weights(&self) -> Vec<f64> {
        self.weights.clone()
    }

    pub fn randomise_weights(&mut self, mean: f64, std: f64, seed: Option<u64>) {
        let mut rng = crate::rng::RandomEngine::new(seed);
        for w in &mut self.weights {
            *w = rng.gen_normal(mean, std);
        }
    }

    pub fn call(&self, xs: &[f64]) -> CgpResult<Vec<f64>> {
        if xs.len() != self.inner.params().n {
            return Err(CgpError::InvalidArgument(format!(
                "expected {} inputs, got {}",
                self.inner.params().n,
                xs.len()
            )));
        }
        let weights = &self.weights;
        let a = self.inner.params().a;
        let lookup = move |local: usize, edge: usize| weights[local * a + edge];
        Ok(self.inner.call_inner_weighted(xs, Some(&lookup)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelSet;

    #[test]
    fn unit_weights_reproduce_plain_expression() {
        let kernels: KernelSet<f64> =
            KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
        let mut ew = ExpressionWeighted::new(2, 4, 2, 3, 4, 2, kernels, Some(1)).unwrap();
        ew.set(vec![0, 0, 1, 1, 0, 0, 1, 3, 1, 2, 0, 1, 0, 4, 4, 2, 5, 4, 2, 5, 7, 3])
            .unwrap();
        let out = ew.call(&[1.0, -1.0]).unwrap();
        assert_eq!(out, vec![0.0, -1.0, -1.0, 0.0]);
    }

    #[test]
    fn doubling_a_weight_scales_that_edges_contribution() {
        let kernels: KernelSet<f64> =
            KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
        let mut ew = ExpressionWeighted::new(2, 4, 2, 3, 4, 2, kernels, Some(1)).unwrap();
        ew.set(vec![0, 0, 1, 1, 0, 0, 1, 3, 1, 2, 0, 1, 0, 4, 4, 2, 5, 4, 2, 5, 7, 3])
            .unwrap();
        // node local 0 is the first functional node, output0 = node2 = sum(x0, x1).
        ew.set_weight(0, 1, 2.0).unwrap();
        let out = ew.call(&[1.0, -1.0]).unwrap();
        assert_eq!(out[0], 1.0 + 2.0 * -1.0);
    }

    #[test]
    fn set_weights_rejects_wrong_length() {
        let kernels: KernelSet<f64> = KernelSet::from_names(&["sum"]).unwrap();
        let mut ew = ExpressionWeighted::new(2, 1, 2, 3, 2, 2, kernels, Some(2)).unwrap();
        assert!(ew.set_weights(vec![1.0]).is_err());
    }
}
