//! Loss values returned by trainable agents.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::AgentError;

/// Name of the term that is backpropagated when an agent reports several.
pub const TOTAL_LOSS_KEY: &str = "loss";

/// The result of `TrainableAgent::compute_loss`.
///
/// The variant decides how the training step logs it: a scalar is logged as
/// `<phase>/loss`, named terms are logged one by one.
#[derive(Debug, Clone)]
pub enum Loss<B: Backend> {
    Scalar(Tensor<B, 1>),
    Terms(LossTerms<B>),
}

/// Named loss terms; a term may be absent for a given batch.
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    terms: BTreeMap<String, Option<Tensor<B, 1>>>,
}

impl<B: Backend> Default for LossTerms<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LossTerms<B> {
    pub fn new() -> Self {
        Self {
            terms: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Tensor<B, 1>) {
        self.terms.insert(name.into(), Some(value));
    }

    /// Record a term that has no value for this batch.
    pub fn insert_absent(&mut self, name: impl Into<String>) {
        self.terms.insert(name.into(), None);
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Tensor<B, 1>>)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Take the total loss out of the terms.
    pub fn into_total(mut self) -> Result<Tensor<B, 1>, AgentError> {
        self.terms
            .remove(TOTAL_LOSS_KEY)
            .flatten()
            .ok_or_else(|| AgentError::MissingLossTerm {
                name: TOTAL_LOSS_KEY.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn scalar(v: f32) -> Tensor<TestBackend, 1> {
        Tensor::from_floats([v], &Default::default())
    }

    #[test]
    fn test_into_total() {
        let mut terms = LossTerms::new();
        terms.insert(TOTAL_LOSS_KEY, scalar(1.5));
        terms.insert("aux", scalar(0.2));
        let total = terms.into_total().unwrap();
        assert_eq!(total.into_scalar(), 1.5);
    }

    #[test]
    fn test_missing_total() {
        let mut terms = LossTerms::<TestBackend>::new();
        terms.insert("aux", scalar(0.2));
        assert_eq!(
            terms.into_total().unwrap_err(),
            AgentError::MissingLossTerm {
                name: "loss".into()
            }
        );
    }

    #[test]
    fn test_absent_total_is_missing() {
        let mut terms = LossTerms::<TestBackend>::new();
        terms.insert_absent(TOTAL_LOSS_KEY);
        assert!(terms.into_total().is_err());
    }
}
