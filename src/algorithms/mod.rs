//! Evolutionary algorithms over `SymbolicRegressionProblem`.
//! `memetic::Memetic` holds the one generic `evolve` loop; the five
//! public algorithm types in the sibling modules are thin configurations of
//! it (mutation-only vs. Newton vs. gradient-descent local search, and
//! single- vs. multi-objective selection).

pub mod es4cgp;
pub mod gd4cgp;
pub mod memetic;
pub mod mes4cgp;
pub mod moes4cgp;
pub mod momes4cgp;

pub use es4cgp::Es4Cgp;
pub use gd4cgp::Gd4Cgp;
pub use mes4cgp::Mes4Cgp;
pub use moes4cgp::MoEs4Cgp;
pub use momes4cgp::MoMes4Cgp;

/// What, if anything, a generation's local-search step does to the
/// ephemeral constants of a mutated individual before it is scored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocalLearner {
    /// Pure evolutionary search: the mutated integer chromosome is scored
    /// as-is (`es4cgp`, `moes4cgp`).
    None,
    /// One Newton step on the ephemeral constants using the exact gradient
    /// and Hessian of the loss (`mes4cgp`, `momes4cgp`).
    Newton,
    /// One fixed-step gradient-descent update on the ephemeral constants
    /// (`gd4cgp`).
    GradientDescent { eta: f64 },
}

/// How a generation picks its `|pop|` survivors out of parents ∪ children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionKind {
    /// Keep the `|pop|` individuals with the lowest `f[0]`.
    SingleObjective,
    /// Fast non-dominated sorting + crowding distance (NSGA-II).
    MultiObjective,
}

/// One row of the per-generation evolution log.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LogRecord {
    pub gen: u32,
    pub fevals: u64,
    pub best_loss: f64,
    pub ndf_size: Option<u64>,
    pub best_complexity: Option<f64>,
}
