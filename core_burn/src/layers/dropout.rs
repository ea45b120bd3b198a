// core_burn/src/layers/dropout.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Инвертированный дропаут: в режиме обучения сохраненные элементы делятся
//! на `1 - ratio`, в режиме тестирования слой тождественный.

use burn::tensor::{backend::Backend, Distribution};
use serde_json::Value;

use super::single_input;
use crate::{
    blob::{map_blob, Blob},
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
    params::{parse_params, DropoutParams},
};

/// Слой дропаута.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropoutLayer {
    ratio: f64,
}

impl DropoutLayer {
    /// Строит слой из `dropout_param`, по умолчанию `ratio = 0.5`.
    ///
    /// # Errors
    /// `LayerError::InvalidParams`, если `ratio` вне `[0, 1)`.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: DropoutParams = parse_params("Dropout", value)?;
        let ratio = params.dropout_ratio.unwrap_or(0.5);
        if !(0.0..1.0).contains(&ratio) {
            return Err(LayerError::invalid_params(
                "Dropout",
                format!("dropout_ratio {ratio} вне [0, 1)"),
            ));
        }
        Ok(Self { ratio })
    }

    /// Доля обнуляемых элементов.
    #[must_use]
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl<B: Backend> Layer<B> for DropoutLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Materialized
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let x = single_input(inputs)?;
        if !ctx.training || self.ratio == 0.0 {
            return Ok(vec![x]);
        }
        let keep = 1.0 - self.ratio;
        let scale = 1.0 / keep;
        Ok(vec![map_blob!(x, |t| {
            let mask = t.random_like(Distribution::Bernoulli(keep));
            t.mul(mask).mul_scalar(scale)
        })])
    }
}
