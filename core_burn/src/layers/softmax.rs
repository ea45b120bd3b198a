// core_burn/src/layers/softmax.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! `Softmax` по заданной оси.

use burn::tensor::{activation::softmax, backend::Backend};
use serde_json::Value;

use super::single_input;
use crate::{
    blob::{map_blob, Blob},
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
    params::{parse_params, SoftmaxParams},
};

/// Слой softmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftmaxLayer {
    axis: i64,
}

impl SoftmaxLayer {
    /// Строит слой из `softmax_param`. Без оси берется последняя (`-1`).
    ///
    /// # Errors
    /// `LayerError::InvalidParams` при неверных типах полей.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: SoftmaxParams = parse_params("Softmax", value)?;
        Ok(Self {
            axis: params.axis.unwrap_or(-1),
        })
    }

    /// Ось, как она задана (может быть отрицательной).
    #[must_use]
    pub const fn axis(&self) -> i64 {
        self.axis
    }

    /// Неотрицательная ось для тензора ранга `rank`.
    ///
    /// # Errors
    /// `LayerError::InvalidParams`, если ось вне `[-rank, rank)`.
    pub fn resolve_axis(&self, rank: usize) -> Result<usize, LayerError> {
        let signed_rank = i64::try_from(rank).map_err(|e| LayerError::Data(e.to_string()))?;
        let axis = if self.axis < 0 { self.axis + signed_rank } else { self.axis };
        if (0..signed_rank).contains(&axis) {
            usize::try_from(axis).map_err(|e| LayerError::Data(e.to_string()))
        } else {
            Err(LayerError::invalid_params(
                "Softmax",
                format!("ось {} вне ранга {rank}", self.axis),
            ))
        }
    }
}

impl<B: Backend> Layer<B> for SoftmaxLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Materialized
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let x = single_input(inputs)?;
        let dim = self.resolve_axis(x.rank())?;
        Ok(vec![map_blob!(x, |t| softmax(t, dim))])
    }
}
