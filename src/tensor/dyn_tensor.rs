//! Rank-erased tensor wrapper.
//!
//! Builders emit tensors of different ranks (a status vector, a BEV raster, a
//! camera stack) into a single mapping, and the agent contract has to add and
//! remove a batch dimension without knowing those ranks statically. burn
//! tensors carry their rank in the type, so [`DynTensor`] holds one of ranks
//! 1 through 5 and moves between them explicitly.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::AgentError;

/// Highest rank a [`DynTensor`] can hold.
pub const MAX_RANK: usize = 5;

/// A float tensor of rank 1 to [`MAX_RANK`].
#[derive(Debug, Clone)]
pub enum DynTensor<B: Backend> {
    Rank1(Tensor<B, 1>),
    Rank2(Tensor<B, 2>),
    Rank3(Tensor<B, 3>),
    Rank4(Tensor<B, 4>),
    Rank5(Tensor<B, 5>),
}

macro_rules! with_tensor {
    ($value:expr, $t:ident => $body:expr) => {
        match $value {
            DynTensor::Rank1($t) => $body,
            DynTensor::Rank2($t) => $body,
            DynTensor::Rank3($t) => $body,
            DynTensor::Rank4($t) => $body,
            DynTensor::Rank5($t) => $body,
        }
    };
}

macro_rules! impl_rank_conversions {
    ($($rank:literal => $variant:ident),* $(,)?) => {
        $(
            impl<B: Backend> From<Tensor<B, $rank>> for DynTensor<B> {
                fn from(tensor: Tensor<B, $rank>) -> Self {
                    Self::$variant(tensor)
                }
            }

            impl<B: Backend> TryFrom<DynTensor<B>> for Tensor<B, $rank> {
                type Error = AgentError;

                fn try_from(value: DynTensor<B>) -> Result<Self, Self::Error> {
                    match value {
                        DynTensor::$variant(tensor) => Ok(tensor),
                        other => Err(AgentError::RankMismatch {
                            expected: $rank,
                            actual: other.rank(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_rank_conversions!(1 => Rank1, 2 => Rank2, 3 => Rank3, 4 => Rank4, 5 => Rank5);

impl<B: Backend> DynTensor<B> {
    /// Build a tensor from row-major values and a shape.
    pub fn from_values(
        values: Vec<f32>,
        shape: &[usize],
        device: &B::Device,
    ) -> Result<Self, AgentError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(AgentError::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![values.len()],
            });
        }

        let data = TensorData::new(values, shape.to_vec());
        match shape.len() {
            1 => Ok(Self::Rank1(Tensor::from_data(data, device))),
            2 => Ok(Self::Rank2(Tensor::from_data(data, device))),
            3 => Ok(Self::Rank3(Tensor::from_data(data, device))),
            4 => Ok(Self::Rank4(Tensor::from_data(data, device))),
            5 => Ok(Self::Rank5(Tensor::from_data(data, device))),
            0 => Err(AgentError::RankMismatch {
                expected: 1,
                actual: 0,
            }),
            rank => Err(AgentError::RankOverflow { rank }),
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Self::Rank1(_) => 1,
            Self::Rank2(_) => 2,
            Self::Rank3(_) => 3,
            Self::Rank4(_) => 4,
            Self::Rank5(_) => 5,
        }
    }

    pub fn dims(&self) -> Vec<usize> {
        with_tensor!(self, t => t.dims().to_vec())
    }

    /// Size of the leading dimension.
    pub fn leading_dim(&self) -> usize {
        self.dims()[0]
    }

    /// Add a leading batch dimension of size 1.
    pub fn unsqueeze_batch(self) -> Result<Self, AgentError> {
        match self {
            Self::Rank1(t) => Ok(Self::Rank2(t.unsqueeze::<2>())),
            Self::Rank2(t) => Ok(Self::Rank3(t.unsqueeze::<3>())),
            Self::Rank3(t) => Ok(Self::Rank4(t.unsqueeze::<4>())),
            Self::Rank4(t) => Ok(Self::Rank5(t.unsqueeze::<5>())),
            Self::Rank5(_) => Err(AgentError::RankOverflow { rank: MAX_RANK }),
        }
    }

    /// Remove a leading batch dimension, which must have size 1.
    pub fn squeeze_batch(self) -> Result<Self, AgentError> {
        let shape = self.dims();
        if shape.len() < 2 || shape[0] != 1 {
            return Err(AgentError::BatchDimension { shape });
        }
        match self {
            Self::Rank1(_) => Err(AgentError::BatchDimension { shape }),
            Self::Rank2(t) => Ok(Self::Rank1(t.squeeze::<1>(0))),
            Self::Rank3(t) => Ok(Self::Rank2(t.squeeze::<2>(0))),
            Self::Rank4(t) => Ok(Self::Rank3(t.squeeze::<3>(0))),
            Self::Rank5(t) => Ok(Self::Rank4(t.squeeze::<4>(0))),
        }
    }

    /// Cut the tensor out of the autodiff graph.
    pub fn detach(self) -> Self {
        match self {
            Self::Rank1(t) => Self::Rank1(t.detach()),
            Self::Rank2(t) => Self::Rank2(t.detach()),
            Self::Rank3(t) => Self::Rank3(t.detach()),
            Self::Rank4(t) => Self::Rank4(t.detach()),
            Self::Rank5(t) => Self::Rank5(t.detach()),
        }
    }

    /// Copy the values out in row-major order.
    pub fn to_vec(&self) -> Result<Vec<f32>, AgentError> {
        let data = with_tensor!(self, t => t.clone().into_data());
        data.convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| AgentError::TensorData(format!("{e:?}")))
    }

    /// Stack same-shaped tensors along a new leading dimension.
    pub fn stack(items: Vec<Self>) -> Result<Self, AgentError> {
        let first = items.first().ok_or(AgentError::EmptyBatch)?;
        let shape = first.dims();
        if let Some(odd) = items.iter().find(|item| item.dims() != shape) {
            return Err(AgentError::ShapeMismatch {
                expected: shape,
                actual: odd.dims(),
            });
        }

        match shape.len() {
            1 => Ok(Self::Rank2(Tensor::stack::<2>(collect_rank::<B, 1>(items)?, 0))),
            2 => Ok(Self::Rank3(Tensor::stack::<3>(collect_rank::<B, 2>(items)?, 0))),
            3 => Ok(Self::Rank4(Tensor::stack::<4>(collect_rank::<B, 3>(items)?, 0))),
            4 => Ok(Self::Rank5(Tensor::stack::<5>(collect_rank::<B, 4>(items)?, 0))),
            rank => Err(AgentError::RankOverflow { rank }),
        }
    }
}

fn collect_rank<B: Backend, const D: usize>(
    items: Vec<DynTensor<B>>,
) -> Result<Vec<Tensor<B, D>>, AgentError>
where
    Tensor<B, D>: TryFrom<DynTensor<B>, Error = AgentError>,
{
    items.into_iter().map(Tensor::<B, D>::try_from).collect()
}
