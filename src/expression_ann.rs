//! `ExpressionAnn`: an `Expression` restricted to unary activation kernels,
//! with a weight per incoming edge and a bias per node, forward evaluation,
//! exact backpropagation and mini-batch SGD.
//!
//! Unlike the general `Expression`, every active node reads all `a`
//! connection genes (they are the node's incoming edges, each independently
//! weighted) rather than only the kernel's effective arity; the kernel here
//! names the node's activation function, applied once to the weighted sum.

use crate::error::{CgpError, CgpResult};
use crate::expression::LossKind;
use crate::kernel::{Kernel, KernelSet, ANN_ACTIVATIONS};
use crate::rng::RandomEngine;
use crate::scalar::Scalar;
use crate::taylor::Jet2;
use crate::topology::{ActiveSet, CgpParams};

fn linear_kernel() -> Kernel<f64> {
    Kernel::new(
        "linear",
        crate::kernel::Arity::Unary,
        |xs: &[f64]| xs[0],
        |names: &[String]| names[0].clone(),
    )
}

/// Evaluates the named activation on a generic scalar, reusing the same
/// closed-form derivatives `Scalar` already provides so backprop's
/// derivative lookup (below) doesn't duplicate them by hand.
fn apply_named<T: Scalar>(name: &str, x: &T) -> T {
    match name {
        "tanh" => x.tanh(),
        "sig" => x.sig(),
        "ReLu" => x.relu(),
        "ELU" => x.elu(),
        "ISRU" => x.isru(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "gaussian" => x.gaussian(),
        "inv_sum" => {
            if x.abs().to_f64() < 1e-12 {
                x.constant_like(1.0)
            } else {
                x.constant_like(1.0) / x.clone()
            }
        }
        "sum" | "linear" => x.clone(),
        _ => x.clone(),
    }
}

/// `(value, derivative)` of the named activation at `s`, obtained by
/// evaluating it on a single-variable Taylor jet instead of hand-coding a
/// parallel derivative table.
fn activation_value_and_grad(name: &str, s: f64) -> (f64, f64) {
    let j = apply_named(name, &Jet2::variable(s, 1, 0));
    (j.val, j.grad[0])
}

pub struct ExpressionAnn {
    params: CgpParams,
    kernels: KernelSet<f64>,
    genes: Vec<usize>,
    weights: Vec<f64>,
    biases: Vec<f64>,
    active: ActiveSet,
    rng: RandomEngine,
    output_activation_name: String,
}

impl ExpressionAnn {
    pub fn new(
        n: usize,
        m: usize,
        r: usize,
        c: usize,
        l: usize,
        a: usize,
        kernel_names: &[&str],
        seed: Option<u64>,
    ) -> CgpResult<Self> {
        for name in kernel_names {
            if !ANN_ACTIVATIONS.contains(name) {
                return Err(CgpError::InvalidArgument(format!(
                    "'{name}' is not a supported ANN activation kernel"
                )));
            }
        }
        let kernels = KernelSet::from_names(kernel_names)?;
        let params = CgpParams::new(n, m, r, c, l, a)?;
        let mut rng = RandomEngine::new(seed);
        let (lb, ub) = params.bounds(kernels.len());
        let genes: Vec<usize> = lb
            .iter()
            .zip(ub.iter())
            .map(|(&lo, &hi)| rng.gen_range_incl(lo, hi))
            .collect();
        let f = params.num_functional_nodes();
        let active = ActiveSet::compute(&params, &genes, |_| params.a);
        Ok(ExpressionAnn {
            weights: vec![1.0; f * params.a],
            biases: vec![0.0; f],
            params,
            kernels,
            genes,
            active,
            rng,
            output_activation_name: "linear".to_string(),
        })
    }

    pub fn params(&self) -> CgpParams {
        self.params
    }

    fn recompute_active(&mut self) {
        let params = self.params;
        self.active = ActiveSet::compute(&params, &self.genes, |_| params.a);
    }

    pub fn set(&mut self, xu: Vec<usize>) -> CgpResult<()> {
        if xu.len() != self.params.chromosome_len() {
            return Err(CgpError::InvalidArgument(format!(
                "expected chromosome of length {}, got {}",
                self.params.chromosome_len(),
                xu.len()
            )));
        }
        let (lb, ub) = self.params.bounds(self.kernels.len());
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

    pub fn get_lb(&self) -> Vec<usize> {
        self.params.bounds(self.kernels.len()).0
    }

    pub fn get_ub(&self) -> Vec<usize> {
        self.params.bounds(self.kernels.len()).1
    }

    fn weight_index(&self, node_idx: usize, edge_idx: usize) -> usize {
        node_idx * self.params.a + edge_idx
    }

    pub fn set_weight(&mut self, node_idx: usize, edge_idx: usize, w: f64) -> CgpResult<()> {
        let idx = self.weight_index(node_idx, edge_idx);
        if idx >= self.weights.len() {
            return Err(CgpError::InvalidArgument(
                "node/edge index out of range".into(),
            ));
        }
        self.weights[idx] = w;
        Ok(())
    }

    pub fn get_weight(&self, node_idx: usize, edge_idx: usize) -> f64 {
        self.weights[self.weight_index(node_idx, edge_idx)]
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
        let mut rng = RandomEngine::new(seed);
        for w in &mut self.weights {
            *w = rng.gen_normal(mean, std);
        }
    }

    pub fn set_bias(&mut self, node_idx: usize, b: f64) -> CgpResult<()> {
        if node_idx >= self.biases.len() {
            return Err(CgpError::InvalidArgument("node index out of range".into()));
        }
        self.biases[node_idx] = b;
        Ok(())
    }

    pub fn get_bias(&self, node_idx: usize) -> f64 {
        self.biases[node_idx]
    }

    pub fn set_biases(&mut self, b: Vec<f64>) -> CgpResult<()> {
        if b.len() != self.biases.len() {
            return Err(CgpError::InvalidArgument(format!(
                "expected {} biases, got {}",
                self.biases.len(),
                b.len()
            )));
        }
        self.biases = b;
        Ok(())
    }

    pub fn get_biases(&self) -> Vec<f64> {
        self.biases.clone()
    }

    pub fn randomise_biases(&mut self, mean: f64, std: f64, seed: Option<u64>) {
        let mut rng = RandomEngine::new(seed);
        for b in &mut self.biases {
            *b = rng.gen_normal(mean, std);
        }
    }

    pub fn set_output_f(&mut self, name: &str) -> CgpResult<()> {
        if name != "linear" && !ANN_ACTIVATIONS.contains(&name) {
            return Err(CgpError::InvalidArgument(format!(
                "'{name}' is not a supported output activation"
            )));
        }
        self.output_activation_name = name.to_string();
        Ok(())
    }

    /// Weights feeding any active node; `unique` is a no-op under this
    /// representation, where every (node, edge-slot) pair is already a
    /// distinct array index and active nodes are already a de-duplicated
    /// set, so there is nothing left to collapse.
    pub fn n_active_weights(&self, _unique: bool) -> usize {
        self.active.active_nodes.len() * self.params.a
    }

    fn source_value(&self, target: usize, xs: &[f64], sv: &[Option<(f64, f64)>]) -> f64 {
        if target < self.params.n {
            xs[target]
        } else {
            sv[target - self.params.n]
                .map(|(_, v)| v)
                .expect("active predecessor evaluated before its successor")
        }
    }

    /// Forward pass. Returns per-node `(pre_activation, post_activation)`
    /// for every functional node slot (`None` for inactive ones) and the
    /// `m` outputs (after the output activation).
    fn forward(&self, xs: &[f64]) -> (Vec<Option<(f64, f64)>>, Vec<f64>) {
        let f = self.params.num_functional_nodes();
        let mut sv: Vec<Option<(f64, f64)>> = vec![None; f];
        for &node_idx in &self.active.active_nodes {
            let local = node_idx - self.params.n;
            let base = self.params.node_gene_offset(local);
            let fgene = self.genes[base];
            let kernel = self.kernels.get(fgene);
            let mut s = self.biases[local];
            for c in 0..self.params.a {
                let target = self.genes[base + 1 + c];
                let v_src = self.source_value(target, xs, &sv);
                s += self.weights[local * self.params.a + c] * v_src;
            }
            let v = kernel.apply(&[s]);
            sv[local] = Some((s, v));
        }
        let mut outputs = Vec::with_capacity(self.params.m);
        for o in 0..self.params.m {
            let gidx = self.params.output_gene_offset(o);
            let target = self.genes[gidx];
            let raw = self.source_value(target, xs, &sv);
            outputs.push(apply_named(&self.output_activation_name, &raw));
        }
        (sv, outputs)
    }

    pub fn call(&self, xs: &[f64]) -> CgpResult<Vec<f64>> {
        if xs.len() != self.params.n {
            return Err(CgpError::InvalidArgument(format!(
                "expected {} inputs, got {}",
                self.params.n,
                xs.len()
            )));
        }
        Ok(self.forward(xs).1)
    }

    fn per_output_loss_grad(outputs: &[f64], label: &[f64], kind: LossKind) -> (f64, Vec<f64>) {
        let m = outputs.len() as f64;
        match kind {
            LossKind::Mse => {
                let loss = outputs
                    .iter()
                    .zip(label)
                    .map(|(o, y)| (o - y).powi(2))
                    .sum::<f64>()
                    / m;
                let grad = outputs
                    .iter()
                    .zip(label)
                    .map(|(o, y)| 2.0 * (o - y) / m)
                    .collect();
                (loss, grad)
            }
            LossKind::Mae => {
                let loss = outputs
                    .iter()
                    .zip(label)
                    .map(|(o, y)| (o - y).abs())
                    .sum::<f64>()
                    / m;
                let grad = outputs
                    .iter()
                    .zip(label)
                    .map(|(o, y)| (o - y).signum() / m)
                    .collect();
                (loss, grad)
            }
            LossKind::Ce => {
                let max = outputs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = outputs.iter().map(|v| (v - max).exp()).collect();
                let sum: f64 = exps.iter().sum();
                let probs: Vec<f64> = exps.iter().map(|e| e / sum).collect();
                let loss = -probs
                    .iter()
                    .zip(label)
                    .map(|(p, y)| y * p.max(1e-12).ln())
                    .sum::<f64>();
                let grad = probs.iter().zip(label).map(|(p, y)| p - y).collect();
                (loss, grad)
            }
        }
    }

    /// Exact gradient of the loss w.r.t. every weight and bias for one
    /// sample, via reverse-mode backprop on the active subgraph.
    pub fn mse(&self, point: &[f64], label: &[f64]) -> CgpResult<(f64, Vec<f64>, Vec<f64>)> {
        self.loss_and_grad(point, label, LossKind::Mse)
    }

    pub fn loss_and_grad(
        &self,
        point: &[f64],
        label: &[f64],
        kind: LossKind,
    ) -> CgpResult<(f64, Vec<f64>, Vec<f64>)> {
        if point.len() != self.params.n || label.len() != self.params.m {
            return Err(CgpError::InvalidArgument(
                "point/label shape mismatch".into(),
            ));
        }
        let (sv, outputs) = self.forward(point);
        let (loss, doutput) = Self::per_output_loss_grad(&outputs, label, kind);

        let f = self.params.num_functional_nodes();
        let mut dv = vec![0.0f64; f];
        for o in 0..self.params.m {
            let gidx = self.params.output_gene_offset(o);
            let target = self.genes[gidx];
            if target < self.params.n {
                continue; // direct input->output wiring has no trainable parameter
            }
            let raw = self.source_value(target, point, &sv);
            let (_, d_out_d_raw) = activation_value_and_grad(&self.output_activation_name, raw);
            dv[target - self.params.n] += doutput[o] * d_out_d_raw;
        }

        let mut grad_w = vec![0.0f64; self.weights.len()];
        let mut grad_b = vec![0.0f64; self.biases.len()];
        for &node_idx in self.active.active_nodes.iter().rev() {
            let local = node_idx - self.params.n;
            let base = self.params.node_gene_offset(local);
            let fgene = self.genes[base];
            let kernel_name = self.kernels.get(fgene).name().to_string();
            let (s, _v) = sv[local].expect("active node must have been forward-evaluated");
            let (_, act_deriv) = activation_value_and_grad(&kernel_name, s);
            let ds = dv[local] * act_deriv;
            grad_b[local] += ds;
            for c in 0..self.params.a {
                let target = self.genes[base + 1 + c];
                let v_src = self.source_value(target, point, &sv);
                let w = self.weights[local * self.params.a + c];
                grad_w[local * self.params.a + c] += ds * v_src;
                if target >= self.params.n {
                    dv[target - self.params.n] += ds * w;
                }
            }
        }
        Ok((loss, grad_w, grad_b))
    }

    /// Averages loss and gradients over a batch.
    pub fn mse_batch(
        &self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
    ) -> CgpResult<(f64, Vec<f64>, Vec<f64>)> {
        self.loss_and_grad_batch(points, labels, LossKind::Mse)
    }

    pub fn loss_and_grad_batch(
        &self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        kind: LossKind,
    ) -> CgpResult<(f64, Vec<f64>, Vec<f64>)> {
        if points.len() != labels.len() || points.is_empty() {
            return Err(CgpError::InvalidArgument(
                "points/labels must be non-empty and equal length".into(),
            ));
        }
        let mut total_loss = 0.0;
        let mut grad_w = vec![0.0f64; self.weights.len()];
        let mut grad_b = vec![0.0f64; self.biases.len()];
        for (p, l) in points.iter().zip(labels.iter()) {
            let (loss, gw, gb) = self.loss_and_grad(p, l, kind)?;
            total_loss += loss;
            for i in 0..grad_w.len() {
                grad_w[i] += gw[i];
            }
            for i in 0..grad_b.len() {
                grad_b[i] += gb[i];
            }
        }
        let batch = points.len() as f64;
        total_loss /= batch;
        for g in &mut grad_w {
            *g /= batch;
        }
        for g in &mut grad_b {
            *g /= batch;
        }
        Ok((total_loss, grad_w, grad_b))
    }

    /// One epoch of mini-batch SGD; returns the epoch's average loss.
    pub fn sgd(
        &mut self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        lr: f64,
        batch_size: usize,
        loss_kind: LossKind,
        shuffle: bool,
    ) -> CgpResult<f64> {
        if points.len() != labels.len() || points.is_empty() {
            return Err(CgpError::InvalidArgument(
                "points/labels must be non-empty and equal length".into(),
            ));
        }
        if lr <= 0.0 {
            return Err(CgpError::InvalidArgument("lr must be > 0".into()));
        }
        if batch_size == 0 || batch_size > points.len() {
            return Err(CgpError::InvalidArgument(format!(
                "batch_size must be in [1, {}]",
                points.len()
            )));
        }
        let mut order: Vec<usize> = (0..points.len()).collect();
        if shuffle {
            self.rng.shuffle(&mut order);
        }
        let mut total_loss = 0.0;
        let mut n_batches = 0usize;
        for chunk in order.chunks(batch_size) {
            let batch_points: Vec<Vec<f64>> = chunk.iter().map(|&i| points[i].clone()).collect();
            let batch_labels: Vec<Vec<f64>> = chunk.iter().map(|&i| labels[i].clone()).collect();
            let (loss, gw, gb) =
                self.loss_and_grad_batch(&batch_points, &batch_labels, loss_kind)?;
            for i in 0..self.weights.len() {
                self.weights[i] -= lr * gw[i];
            }
            for i in 0..self.biases.len() {
                self.biases[i] -= lr * gb[i];
            }
            total_loss += loss;
            n_batches += 1;
        }
        Ok(total_loss / n_batches as f64)
    }
}
