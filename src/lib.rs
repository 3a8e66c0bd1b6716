//! Cartesian Genetic Programming engine for symbolic regression and
//! differentiable program synthesis.
//!
//! An `Expression<T>` decodes a fixed-length integer chromosome into a
//! feedforward DAG of kernel nodes and evaluates it over any `T: Scalar`:
//! plain `f64` for ordinary use, or a truncated Taylor jet (`taylor::Jet2`)
//! when exact gradients/Hessians of the ephemeral constants are needed
//! (`problem::SymbolicRegressionProblem`). `algorithms` wires this up into
//! evolutionary search: mutate the integer genes, optionally take a local
//! step on the constants, select survivors by loss or by Pareto dominance.

pub mod algorithms;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod expression;
pub mod expression_ann;
pub mod expression_weighted;
pub mod kernel;
pub mod logging;
pub mod mo;
pub mod population;
pub mod problem;
pub mod rng;
pub mod scalar;
pub mod taylor;
pub mod topology;
