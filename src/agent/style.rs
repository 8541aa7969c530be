//! Driving-style conditioning.
//!
//! Style-conditioned agents take an auxiliary one-hot style feature. The label
//! for each scene token comes from a [`StyleTable`] handed in by the caller,
//! not from hidden agent state. Tokens without a label, labels outside the
//! known codes and calls without any table all read as [`StyleLabel::N`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AgentError;
use crate::tensor::TensorMap;

/// Feature key the one-hot style vector is stored under.
pub const STYLE_FEATURE_KEY: &str = "style_feature";

/// Discrete style label attached to a scene token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StyleLabel {
    A,
    #[default]
    N,
    C,
}

impl StyleLabel {
    /// Number of style categories (width of the one-hot vector).
    pub const COUNT: usize = 3;

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::A),
            "N" => Some(Self::N),
            "C" => Some(Self::C),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::N => 1,
            Self::C => 2,
        }
    }

    pub fn one_hot(self) -> [f32; Self::COUNT] {
        let mut v = [0.0; Self::COUNT];
        v[self.index()] = 1.0;
        v
    }

    pub fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::from_floats(self.one_hot(), device)
    }
}

/// Style labels keyed by scene token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTable {
    labels: HashMap<String, StyleLabel>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `token -> code` pairs; unknown codes map to `N`.
    pub fn from_codes<I, K, V>(codes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let labels = codes
            .into_iter()
            .map(|(token, code)| {
                let token: String = token.into();
                let label = StyleLabel::from_code(code.as_ref()).unwrap_or_else(|| {
                    warn!(token = %token, code = code.as_ref(), "unknown style code, using N");
                    StyleLabel::N
                });
                (token, label)
            })
            .collect();
        Self { labels }
    }

    /// Load a JSON object of the form `{"<token>": "A" | "N" | "C", ...}`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read style labels from {}", path.display()))?;
        let codes: HashMap<String, String> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse style labels from {}", path.display()))?;
        Ok(Self::from_codes(codes))
    }

    pub fn insert(&mut self, token: impl Into<String>, label: StyleLabel) {
        self.labels.insert(token.into(), label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for `token`, `N` when the token is unknown.
    pub fn lookup(&self, token: &str) -> StyleLabel {
        self.labels.get(token).copied().unwrap_or_default()
    }

    /// Insert the one-hot style vector for `token` under [`STYLE_FEATURE_KEY`].
    pub fn inject<B: Backend>(
        &self,
        features: &mut TensorMap<B>,
        token: &str,
        device: &B::Device,
    ) -> Result<(), AgentError> {
        features.insert(STYLE_FEATURE_KEY, self.lookup(token).to_tensor::<B>(device))
    }
}
