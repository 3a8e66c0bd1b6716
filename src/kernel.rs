//! Kernel & KernelSet.
//!
//! A kernel is a named n-ary function over the evaluation type `T` paired
//! with a symbolic printer. `KernelSet` is the ordered, de-duplicated,
//! stably-indexed collection that function genes index into.

use std::sync::Arc;

use crate::error::CgpError;
use crate::scalar::Scalar;

/// How many of a node's `a` connection genes a kernel actually reads.
/// `Unary` kernels read only the first; `Variadic` kernels read all `a` of
/// them ("unused connection genes" of lower-arity nodes
/// must be skipped by active-gene mutation, not evaluated).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Variadic,
}

pub struct Kernel<T> {
    name: String,
    arity: Arity,
    apply_fn: fn(&[T]) -> T,
    print_fn: Arc<dyn Fn(&[String]) -> String + Send + Sync>,
}

impl<T> Clone for Kernel<T> {
    fn clone(&self) -> Self {
        Kernel {
            name: self.name.clone(),
            arity: self.arity,
            apply_fn: self.apply_fn,
            print_fn: Arc::clone(&self.print_fn),
        }
    }
}

impl<T> Kernel<T> {
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        apply_fn: fn(&[T]) -> T,
        print_fn: impl Fn(&[String]) -> String + Send + Sync + 'static,
    ) -> Self {
        Kernel {
            name: name.into(),
            arity,
            apply_fn,
            print_fn: Arc::new(print_fn),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many of `max_arity` connection genes this kernel actually reads.
    pub fn effective_arity(&self, max_arity: usize) -> usize {
        match self.arity {
            Arity::Unary => 1,
            Arity::Variadic => max_arity,
        }
    }

    pub fn apply(&self, xs: &[T]) -> T {
        (self.apply_fn)(xs)
    }

    pub fn print(&self, names: &[String]) -> String {
        (self.print_fn)(names)
    }
}

// --- Built-in kernels -------------------------------------------------------
//
// n-ary kernels fold left-to-right starting from the first operand (not from
// a `zero()`/`one()` identity) so that the fold works uniformly for `f64` and
// for `Jet2`, neither of which can construct a "zero/one of the right shape"
// without already holding an instance.

fn k_sum<T: Scalar>(xs: &[T]) -> T {
    let mut it = xs.iter().cloned();
    let first = it.next().expect("kernel called with no operands");
    it.fold(first, |a, b| a + b)
}

fn k_diff<T: Scalar>(xs: &[T]) -> T {
    let mut it = xs.iter().cloned();
    let first = it.next().expect("kernel called with no operands");
    it.fold(first, |a, b| a - b)
}

fn k_mul<T: Scalar>(xs: &[T]) -> T {
    let mut it = xs.iter().cloned();
    let first = it.next().expect("kernel called with no operands");
    it.fold(first, |a, b| a * b)
}

fn k_div<T: Scalar>(xs: &[T]) -> T {
    let mut it = xs.iter().cloned();
    let first = it.next().expect("kernel called with no operands");
    it.fold(first, |a, b| a / b)
}

/// Protected division: falls back to a constant 1 whenever the running
/// divisor's magnitude drops below `1e-12`.
fn k_pdiv<T: Scalar>(xs: &[T]) -> T {
    let mut it = xs.iter().cloned();
    let first = it.next().expect("kernel called with no operands");
    it.fold(first, |a, b| {
        if b.abs().to_f64() < 1e-12 {
            a.constant_like(1.0)
        } else {
            a / b
        }
    })
}

fn k_inv_sum<T: Scalar>(xs: &[T]) -> T {
    let s = k_sum(xs);
    if s.abs().to_f64() < 1e-12 {
        s.constant_like(1.0)
    } else {
        s.constant_like(1.0) / s
    }
}

fn k_sqrt<T: Scalar>(xs: &[T]) -> T {
    xs[0].sqrt()
}
fn k_log<T: Scalar>(xs: &[T]) -> T {
    xs[0].log()
}
fn k_exp<T: Scalar>(xs: &[T]) -> T {
    xs[0].exp()
}
fn k_sin<T: Scalar>(xs: &[T]) -> T {
    xs[0].sin()
}
fn k_cos<T: Scalar>(xs: &[T]) -> T {
    xs[0].cos()
}
fn k_tanh<T: Scalar>(xs: &[T]) -> T {
    xs[0].tanh()
}
fn k_gaussian<T: Scalar>(xs: &[T]) -> T {
    xs[0].gaussian()
}
fn k_sig<T: Scalar>(xs: &[T]) -> T {
    xs[0].sig()
}
fn k_relu<T: Scalar>(xs: &[T]) -> T {
    xs[0].relu()
}
fn k_elu<T: Scalar>(xs: &[T]) -> T {
    xs[0].elu()
}
fn k_isru<T: Scalar>(xs: &[T]) -> T {
    xs[0].isru()
}

fn print_nary(op: &str) -> impl Fn(&[String]) -> String + Send + Sync + 'static {
    let op = op.to_string();
    move |names: &[String]| format!("({})", names.join(&format!(" {op} ")))
}

fn print_unary(op: &str) -> impl Fn(&[String]) -> String + Send + Sync + 'static {
    let op = op.to_string();
    move |names: &[String]| format!("{op}({})", names[0])
}

/// The stable kernel-name universe.
pub const KERNEL_NAMES: &[&str] = &[
    "sum", "diff", "mul", "div", "pdiv", "sqrt", "log", "exp", "sin", "cos", "tanh", "gaussian",
    "inv_sum", "sig", "ReLu", "ELU", "ISRU",
];

/// The unary activation kernels supported by `ExpressionAnn`.
pub const ANN_ACTIVATIONS: &[&str] = &[
    "tanh", "sig", "ReLu", "ELU", "ISRU", "sin", "cos", "gaussian", "inv_sum", "sum",
];

pub fn lookup<T: Scalar + 'static>(name: &str) -> Option<Kernel<T>> {
    Some(match name {
        "sum" => Kernel::new("sum", Arity::Variadic, k_sum, print_nary("+")),
        "diff" => Kernel::new("diff", Arity::Variadic, k_diff, print_nary("-")),
        "mul" => Kernel::new("mul", Arity::Variadic, k_mul, print_nary("*")),
        "div" => Kernel::new("div", Arity::Variadic, k_div, print_nary("/")),
        "pdiv" => Kernel::new("pdiv", Arity::Variadic, k_pdiv, print_nary("/")),
        "sqrt" => Kernel::new("sqrt", Arity::Unary, k_sqrt, print_unary("sqrt")),
        "log" => Kernel::new("log", Arity::Unary, k_log, print_unary("log")),
        "exp" => Kernel::new("exp", Arity::Unary, k_exp, print_unary("exp")),
        "sin" => Kernel::new("sin", Arity::Unary, k_sin, print_unary("sin")),
        "cos" => Kernel::new("cos", Arity::Unary, k_cos, print_unary("cos")),
        "tanh" => Kernel::new("tanh", Arity::Unary, k_tanh, print_unary("tanh")),
        "gaussian" => Kernel::new("gaussian", Arity::Unary, k_gaussian, print_unary("gaussian")),
        "inv_sum" => Kernel::new("inv_sum", Arity::Variadic, k_inv_sum, print_nary("+^-1 ")),
        "sig" => Kernel::new("sig", Arity::Unary, k_sig, print_unary("sig")),
        "ReLu" => Kernel::new("ReLu", Arity::Unary, k_relu, print_unary("ReLu")),
        "ELU" => Kernel::new("ELU", Arity::Unary, k_elu, print_unary("ELU")),
        "ISRU" => Kernel::new("ISRU", Arity::Unary, k_isru, print_unary("ISRU")),
        _ => return None,
    })
}

/// An ordered, de-duplicated collection of kernels. Indexing is stable:
/// function genes refer to positions in this set.
#[derive(Clone)]
pub struct KernelSet<T> {
    kernels: Vec<Kernel<T>>,
}

impl<T: Scalar + 'static> KernelSet<T> {
    pub fn new() -> Self {
        KernelSet { kernels: Vec::new() }
    }

    pub fn from_names(names: &[&str]) -> Result<Self, CgpError> {
        let mut set = KernelSet::new();
        for n in names {
            set.push_back_name(n)?;
        }
        Ok(set)
    }

    pub fn push_back(&mut self, kernel: Kernel<T>) {
        if !self.kernels.iter().any(|k| k.name() == kernel.name()) {
            self.kernels.push(kernel);
        }
    }

    pub fn push_back_name(&mut self, name: &str) -> Result<(), CgpError> {
        let kernel = lookup::<T>(name)
            .ok_or_else(|| CgpError::InvalidArgument(format!("unknown kernel '{name}'")))?;
        self.push_back(kernel);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.kernels.retain(|k| k.name() != name);
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Kernel<T> {
        &self.kernels[idx]
    }

    /// The call operator: the ordered vector of kernels used to wire an
    /// `Expression`.
    pub fn call(&self) -> Vec<Kernel<T>> {
        self.kernels.clone()
    }
}

impl<T: Scalar + 'static> Default for KernelSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_fold_matches_simple_op() {
        let k = lookup::<f64>("div").unwrap();
        assert_eq!(k.apply(&[2.0_f64, 3.0]), 2.0 / 3.0);
    }

    #[test]
    fn pdiv_protects_near_zero_divisor() {
        let k = lookup::<f64>("pdiv").unwrap();
        assert_eq!(k.apply(&[5.0_f64, 1e-20]), 1.0);
    }

    #[test]
    fn kernel_set_deduplicates_by_name() {
        let mut set: KernelSet<f64> = KernelSet::new();
        set.push_back_name("sum").unwrap();
        set.push_back_name("sum").unwrap();
        assert_eq!(set.len(), 1);
    }
}
