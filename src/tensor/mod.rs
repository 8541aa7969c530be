//! Tensor containers exchanged between builders, agents and the training loop.
//!
//! - [`DynTensor`] -- a burn float tensor whose rank is only known at runtime.
//! - [`TensorMap`] -- named tensors (features, targets, predictions) with
//!   explicit key-collision errors and batch collation.

pub mod dyn_tensor;
pub mod map;

pub use dyn_tensor::{DynTensor, MAX_RANK};
pub use map::TensorMap;
