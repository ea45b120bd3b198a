// core_burn/src/layers/inner_product.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Полносвязный слой Caffe (`InnerProduct`).
//!
//! Веса хранятся в раскладке Caffe `[out, in]`: `y = x · Wᵀ + b`.
//! Вход ранга больше 2 сплющивается в `[N, prod(остальных осей)]`.

use burn::tensor::{backend::Backend, Tensor};
use serde_json::Value;

use crate::{
    blob::Blob,
    error::LayerError,
    filler::FillerSpec,
    lazy::{DeferredOp, LazyLayer},
    params::{parse_params, InnerProductParams},
};

const LAYER_TYPE: &str = "InnerProduct";

/// Ленивый полносвязный слой.
pub type InnerProduct<B> = LazyLayer<B, InnerProductOp, 2>;

/// Параметры полносвязного слоя.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerProductOp {
    /// Число выходов.
    pub num_output: usize,
    /// Использовать ли смещение.
    pub bias_term: bool,
    /// Инициализатор весов.
    pub weight_filler: Option<FillerSpec>,
    /// Инициализатор смещения.
    pub bias_filler: Option<FillerSpec>,
}

impl InnerProductOp {
    /// Строит оператор из спроецированного `inner_product_param`.
    ///
    /// # Errors
    /// `LayerError::InvalidParams`, если нет `num_output`.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: InnerProductParams = parse_params(LAYER_TYPE, value)?;
        Ok(Self {
            num_output: params
                .num_output
                .filter(|n| *n > 0)
                .ok_or_else(|| LayerError::invalid_params(LAYER_TYPE, "не задан num_output"))?,
            bias_term: params.bias_term.unwrap_or(true),
            weight_filler: params.weight_filler,
            bias_filler: params.bias_filler,
        })
    }
}

impl<B: Backend> DeferredOp<B, 2> for InnerProductOp {
    fn layer_type(&self) -> &'static str {
        LAYER_TYPE
    }

    fn infer_input_dim(&self, input_dims: &[usize]) -> Result<usize, LayerError> {
        match input_dims {
            [] => Err(LayerError::RankMismatch { expected: 2, actual: 0 }),
            [features] => Ok(*features),
            [_, rest @ ..] => Ok(rest.iter().product()),
        }
    }

    fn weight_shape(&self, input_dim: usize) -> [usize; 2] {
        [self.num_output, input_dim]
    }

    fn num_output(&self) -> usize {
        self.num_output
    }

    fn bias_term(&self) -> bool {
        self.bias_term
    }

    fn weight_filler(&self) -> Option<&FillerSpec> {
        self.weight_filler.as_ref()
    }

    fn bias_filler(&self) -> Option<&FillerSpec> {
        self.bias_filler.as_ref()
    }

    /// Веса Caffe часто лежат как `[1, 1, out, in]`: берутся две последние оси.
    fn reshape_weight(&self, weight: Blob<B>) -> Result<Tensor<B, 2>, LayerError> {
        let dims = weight.dims();
        match dims.as_slice() {
            [.., rows, cols] => {
                let shape = [*rows, *cols];
                weight.reshape(shape)
            }
            [len] => weight.reshape([1, *len]),
            [] => Err(LayerError::RankMismatch { expected: 2, actual: 0 }),
        }
    }

    fn input_dim_of(&self, weight_dims: [usize; 2]) -> usize {
        weight_dims[1]
    }

    fn apply(&self, input: Blob<B>, weight: Tensor<B, 2>, bias: Option<Tensor<B, 1>>) -> Result<Blob<B>, LayerError> {
        let x = input.flatten_2d();
        let [_, features] = x.dims();
        let [_, expected] = weight.dims();
        if features != expected {
            return Err(LayerError::ShapeMismatch(format!(
                "полносвязный слой ожидает {expected} признаков, получено {features}"
            )));
        }
        let y = x.matmul(weight.transpose());
        Ok(Blob::R2(match bias {
            Some(bias) => y + bias.unsqueeze::<2>(),
            None => y,
        }))
    }
}
