// core_burn/src/layers/relu.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! `ReLU` и его leaky-вариант (`negative_slope`).

use burn::tensor::{
    activation::{leaky_relu, relu},
    backend::Backend,
};
use serde_json::Value;

use super::single_input;
use crate::{
    blob::{map_blob, Blob},
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
    params::{parse_params, ReluParams},
};

/// Слой ReLU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReluLayer {
    negative_slope: f64,
}

impl ReluLayer {
    /// Строит слой из `relu_param`.
    ///
    /// # Errors
    /// `LayerError::InvalidParams` при неверных типах полей.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: ReluParams = parse_params("ReLU", value)?;
        Ok(Self {
            negative_slope: params.negative_slope.unwrap_or(0.0),
        })
    }
}

impl<B: Backend> Layer<B> for ReluLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Materialized
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let x = single_input(inputs)?;
        let slope = self.negative_slope;
        Ok(vec![if slope == 0.0 {
            map_blob!(x, |t| relu(t))
        } else {
            map_blob!(x, |t| leaky_relu(t, slope))
        }])
    }
}
