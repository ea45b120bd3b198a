// core_burn/src/layers/pooling.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Пулинг Caffe (`Pooling`): MAX и AVE над входом `[N, C, H, W]`.
//!
//! Размер выхода считается с округлением вниз.

use burn::{
    nn::{
        pool::{AvgPool2dConfig, MaxPool2dConfig},
        PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};
use serde_json::Value;

use super::single_input;
use crate::{
    blob::Blob,
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
    params::{parse_params, PoolMethod, PoolingParams},
};

const LAYER_TYPE: &str = "Pooling";

/// Слой пулинга.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolingLayer {
    method: PoolMethod,
    kernel: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    global: bool,
}

impl PoolingLayer {
    /// Строит слой из спроецированного `pooling_param`.
    ///
    /// # Errors
    /// `LayerError::Unsupported` для STOCHASTIC, `InvalidParams` для нулевых размеров.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: PoolingParams = parse_params(LAYER_TYPE, value)?;
        let layer = Self {
            method: params.method()?,
            kernel: params.kernel(),
            stride: params.strides(),
            padding: params.padding(),
            global: params.global_pooling.unwrap_or(false),
        };
        if !layer.global && (layer.kernel.contains(&0) || layer.stride.contains(&0)) {
            return Err(LayerError::invalid_params(LAYER_TYPE, "нулевое окно или шаг"));
        }
        if !layer.global && (layer.padding[0] >= layer.kernel[0] || layer.padding[1] >= layer.kernel[1]) {
            return Err(LayerError::invalid_params(LAYER_TYPE, "отступ должен быть меньше окна"));
        }
        Ok(layer)
    }

    /// Метод пулинга.
    #[must_use]
    pub const fn method(&self) -> PoolMethod {
        self.method
    }

    fn pool<B: Backend>(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 4>, LayerError> {
        let [_, _, height, width] = x.dims();
        let (kernel, stride, padding) = if self.global {
            ([height, width], [1, 1], [0, 0])
        } else {
            (self.kernel, self.stride, self.padding)
        };
        if height + 2 * padding[0] < kernel[0] || width + 2 * padding[1] < kernel[1] {
            return Err(LayerError::ShapeMismatch(format!(
                "окно {kernel:?} больше входа {height}x{width}"
            )));
        }
        let padding = PaddingConfig2d::Explicit(padding[0], padding[1]);
        Ok(match self.method {
            PoolMethod::Max => MaxPool2dConfig::new(kernel)
                .with_strides(stride)
                .with_padding(padding)
                .init()
                .forward(x),
            PoolMethod::Average => AvgPool2dConfig::new(kernel)
                .with_strides(stride)
                .with_padding(padding)
                .with_count_include_pad(true)
                .init()
                .forward(x),
        })
    }
}

impl<B: Backend> Layer<B> for PoolingLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Materialized
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let x = single_input(inputs)?.into_rank4()?;
        Ok(vec![Blob::R4(self.pool(x)?)])
    }
}
