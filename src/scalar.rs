//! The capability set an evaluation type must provide so the same CGP graph
//! engine can run over plain reals, over truncated Taylor jets (for exact
//! derivatives) or over any other custom scalar
//! "Polymorphism over T"; design notes section 9).
//!
//! Every kernel is written once, generically, against this trait. The only
//! type-specific knowledge lives in `compose`, which implements the
//! second-order chain rule for a scalar function applied to `self`: for `f64`
//! this collapses to "just call the function", for a jet it propagates first
//! and second derivatives.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

pub trait Scalar:
    Clone + Debug + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
{
    /// Zeroth-order value, used for branching (e.g. ReLu) and protection
    /// thresholds (e.g. pdiv, log).
    fn to_f64(&self) -> f64;

    fn abs(&self) -> Self;

    fn is_finite(&self) -> bool;

    /// Applies a scalar function `phi` with first derivative `d1` and second
    /// derivative `d2` (evaluated at `self`'s zeroth-order value) to `self`,
    /// propagating derivative information if `Self` carries any.
    fn compose(&self, phi: f64, d1: f64, d2: f64) -> Self;

    /// A constant equal to `v`, carrying the same derivative "shape" as
    /// `self` (zero gradient/Hessian for jets). Used by protected kernels
    /// that fall back to a fixed value.
    fn constant_like(&self, v: f64) -> Self {
        self.compose(v, 0.0, 0.0)
    }

    fn sqrt(&self) -> Self {
        let x = self.to_f64().max(1e-300);
        self.compose(x.sqrt(), 0.5 / x.sqrt(), -0.25 / x.powf(1.5))
    }

    /// Protected logarithm: `ln(|x|)` with a floor.
    fn log(&self) -> Self {
        let x = self.to_f64().abs().max(1e-12);
        self.compose(x.ln(), 1.0 / x, -1.0 / (x * x))
    }

    fn exp(&self) -> Self {
        let e = self.to_f64().exp();
        self.compose(e, e, e)
    }

    fn sin(&self) -> Self {
        let x = self.to_f64();
        self.compose(x.sin(), x.cos(), -x.sin())
    }

    fn cos(&self) -> Self {
        let x = self.to_f64();
        self.compose(x.cos(), -x.sin(), -x.cos())
    }

    fn tanh(&self) -> Self {
        let t = self.to_f64().tanh();
        self.compose(t, 1.0 - t * t, -2.0 * t * (1.0 - t * t))
    }

    fn gaussian(&self) -> Self {
        let x = self.to_f64();
        let e = (-x * x).exp();
        self.compose(e, -2.0 * x * e, (4.0 * x * x - 2.0) * e)
    }

    fn sig(&self) -> Self {
        let x = self.to_f64();
        let s = 1.0 / (1.0 + (-x).exp());
        self.compose(s, s * (1.0 - s), s * (1.0 - s) * (1.0 - 2.0 * s))
    }

    fn relu(&self) -> Self {
        let x = self.to_f64();
        if x > 0.0 {
            self.compose(x, 1.0, 0.0)
        } else {
            self.compose(0.0, 0.0, 0.0)
        }
    }

    /// ELU with alpha = 1.
    fn elu(&self) -> Self {
        let x = self.to_f64();
        if x > 0.0 {
            self.compose(x, 1.0, 0.0)
        } else {
            let e = x.exp();
            self.compose(e - 1.0, e, e)
        }
    }

    /// ISRU (inverse square root unit) with alpha = 1.
    fn isru(&self) -> Self {
        let x = self.to_f64();
        let denom = (1.0 + x * x).sqrt();
        let val = x / denom;
        let d1 = (1.0 + x * x).powf(-1.5);
        let d2 = -3.0 * x * (1.0 + x * x).powf(-2.5);
        self.compose(val, d1, d2)
    }
}

impl Scalar for f64 {
    fn to_f64(&self) -> f64 {
        *self
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }

    fn compose(&self, phi: f64, _d1: f64, _d2: f64) -> Self {
        phi
    }
}
