//! Named tensor mappings used for features, targets and predictions.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::dyn_tensor::DynTensor;
use crate::error::AgentError;

/// A mapping from string keys to tensors.
///
/// Keys are unique: inserting or merging a key that is already present is an
/// error rather than a silent overwrite.
#[derive(Debug, Clone)]
pub struct TensorMap<B: Backend> {
    entries: BTreeMap<String, DynTensor<B>>,
}

impl<B: Backend> Default for TensorMap<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> TensorMap<B> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&DynTensor<B>> {
        self.entries.get(key)
    }

    /// Insert a tensor under a new key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        tensor: impl Into<DynTensor<B>>,
    ) -> Result<(), AgentError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(AgentError::DuplicateKey { key });
        }
        self.entries.insert(key, tensor.into());
        Ok(())
    }

    /// Move every entry of `other` into this map.
    pub fn merge(&mut self, other: TensorMap<B>) -> Result<(), AgentError> {
        for (key, tensor) in other.entries {
            self.insert(key, tensor)?;
        }
        Ok(())
    }

    /// Fetch a tensor of a known rank.
    pub fn require<const D: usize>(&self, key: &str) -> Result<Tensor<B, D>, AgentError>
    where
        Tensor<B, D>: TryFrom<DynTensor<B>, Error = AgentError>,
    {
        let tensor = self.entries.get(key).ok_or_else(|| AgentError::MissingKey {
            key: key.to_string(),
        })?;
        Tensor::<B, D>::try_from(tensor.clone())
    }

    /// Add a leading batch dimension of size 1 to every tensor.
    pub fn unsqueeze_batch(self) -> Result<Self, AgentError> {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, tensor)| tensor.unsqueeze_batch().map(|t| (key, t)))
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    /// Leading dimension of the first entry, if any.
    pub fn batch_size(&self) -> Option<usize> {
        self.entries.values().next().map(DynTensor::leading_dim)
    }

    /// Collate per-sample maps into one batched map.
    ///
    /// All maps must carry the same keys with identically shaped tensors.
    pub fn stack(maps: Vec<TensorMap<B>>) -> Result<Self, AgentError> {
        let first = maps.first().ok_or(AgentError::EmptyBatch)?;
        let keys: Vec<String> = first.entries.keys().cloned().collect();

        let mut columns: BTreeMap<String, Vec<DynTensor<B>>> = keys
            .iter()
            .map(|k| (k.clone(), Vec::with_capacity(maps.len())))
            .collect();

        for map in maps {
            if map.entries.len() != keys.len() {
                let missing = keys
                    .iter()
                    .find(|k| !map.entries.contains_key(*k))
                    .or_else(|| map.entries.keys().find(|k| !columns.contains_key(*k)))
                    .cloned()
                    .unwrap_or_default();
                return Err(AgentError::MissingKey { key: missing });
            }
            for (key, tensor) in map.entries {
                let column = columns
                    .get_mut(&key)
                    .ok_or_else(|| AgentError::MissingKey { key: key.clone() })?;
                column.push(tensor);
            }
        }

        let entries = columns
            .into_iter()
            .map(|(key, column)| DynTensor::stack(column).map(|t| (key, t)))
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    /// Detach every tensor from the autodiff graph.
    pub fn detach(self) -> Self {
        Self {
            entries: self
                .entries
                .into_iter()
                .map(|(key, tensor)| (key, tensor.detach()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    fn vector(values: &[f32]) -> DynTensor<TestBackend> {
        DynTensor::from_values(values.to_vec(), &[values.len()], &device()).unwrap()
    }

    #[test]
    fn test_insert_duplicate_key() {
        let mut map = TensorMap::new();
        map.insert("ego_status", vector(&[1.0])).unwrap();
        let err = map.insert("ego_status", vector(&[2.0])).unwrap_err();
        assert_eq!(
            err,
            AgentError::DuplicateKey {
                key: "ego_status".into()
            }
        );
    }

    #[test]
    fn test_repeated_key_keeps_first_tensor() {
        let mut map = TensorMap::new();
        let result = [("k", [1.0]), ("k", [2.0])]
            .into_iter()
            .try_for_each(|(key, values)| map.insert(key, vector(&values)));
        assert!(matches!(result, Err(AgentError::DuplicateKey { .. })));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k").unwrap().to_vec().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_merge_disjoint_and_colliding() {
        let mut a = TensorMap::new();
        a.insert("a", vector(&[1.0])).unwrap();
        let mut b = TensorMap::new();
        b.insert("b", vector(&[2.0])).unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.len(), 2);

        let mut c = TensorMap::new();
        c.insert("a", vector(&[3.0])).unwrap();
        assert!(matches!(a.merge(c), Err(AgentError::DuplicateKey { .. })));
    }

    #[test]
    fn test_require_missing_and_rank() {
        let mut map = TensorMap::new();
        map.insert("v", vector(&[1.0, 2.0])).unwrap();

        assert!(map.require::<1>("v").is_ok());
        assert!(matches!(
            map.require::<2>("v"),
            Err(AgentError::RankMismatch { .. })
        ));
        assert_eq!(
            map.require::<1>("w").unwrap_err(),
            AgentError::MissingKey { key: "w".into() }
        );
    }

    #[test]
    fn test_unsqueeze_batch_all_entries() {
        let mut map = TensorMap::new();
        map.insert("a", vector(&[1.0, 2.0])).unwrap();
        map.insert(
            "b",
            DynTensor::<TestBackend>::from_values(vec![0.0; 6], &[2, 3], &device()).unwrap(),
        )
        .unwrap();

        let batched = map.unsqueeze_batch().unwrap();
        assert_eq!(batched.get("a").unwrap().dims(), vec![1, 2]);
        assert_eq!(batched.get("b").unwrap().dims(), vec![1, 2, 3]);
        assert_eq!(batched.batch_size(), Some(1));
    }

    #[test]
    fn test_stack_maps() {
        let maps = (0..4)
            .map(|i| {
                let mut m = TensorMap::new();
                m.insert("x", vector(&[i as f32, 0.0])).unwrap();
                m
            })
            .collect();
        let batch = TensorMap::stack(maps).unwrap();
        assert_eq!(batch.get("x").unwrap().dims(), vec![4, 2]);
        assert_eq!(batch.batch_size(), Some(4));
    }

    #[test]
    fn test_stack_maps_key_mismatch() {
        let mut a = TensorMap::new();
        a.insert("x", vector(&[1.0])).unwrap();
        let mut b = TensorMap::new();
        b.insert("y", vector(&[1.0])).unwrap();
        assert!(matches!(
            TensorMap::stack(vec![a, b]),
            Err(AgentError::MissingKey { .. })
        ));
    }
}
