//! Hyperparameter search
//!
//! Exhaustive grid search only: a typed [`ParamGrid`] for the gradient
//! boosting regressor and the generic Cartesian expander behind it.

mod grid;

pub use grid::{expand_grid, ParamGrid, ParamSet, ParameterValue};
