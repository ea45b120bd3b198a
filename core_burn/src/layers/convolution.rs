// core_burn/src/layers/convolution.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Свертка Caffe (`Convolution`) как ленивый оператор ранга 4.

use burn::tensor::{backend::Backend, module::conv2d, ops::ConvOptions, Tensor};
use serde_json::Value;

use crate::{
    blob::Blob,
    error::LayerError,
    filler::FillerSpec,
    lazy::{DeferredOp, LazyLayer},
    params::{parse_params, ConvolutionParams},
};

const LAYER_TYPE: &str = "Convolution";

/// Ленивая свертка.
pub type Convolution<B> = LazyLayer<B, ConvolutionOp, 4>;

/// Параметры свертки, известные до первого входа.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionOp {
    /// Число выходных каналов.
    pub num_output: usize,
    /// `[kh, kw]`.
    pub kernel: [usize; 2],
    /// `[sh, sw]`.
    pub stride: [usize; 2],
    /// `[ph, pw]`.
    pub padding: [usize; 2],
    /// `[dh, dw]`.
    pub dilation: [usize; 2],
    /// Число групп.
    pub groups: usize,
    /// Использовать ли смещение.
    pub bias_term: bool,
    /// Инициализатор весов.
    pub weight_filler: Option<FillerSpec>,
    /// Инициализатор смещения.
    pub bias_filler: Option<FillerSpec>,
}

impl ConvolutionOp {
    /// Строит оператор из спроецированного `convolution_param`.
    ///
    /// # Errors
    /// `LayerError::InvalidParams`, если нет `num_output` или параметры нулевые.
    pub fn from_params(value: &Value) -> Result<Self, LayerError> {
        let params: ConvolutionParams = parse_params(LAYER_TYPE, value)?;
        let num_output = params
            .num_output
            .filter(|n| *n > 0)
            .ok_or_else(|| LayerError::invalid_params(LAYER_TYPE, "не задан num_output"))?;
        let op = Self {
            num_output,
            kernel: params.kernel(),
            stride: params.strides(),
            padding: params.padding(),
            dilation: params.dilations(),
            groups: params.group.unwrap_or(1),
            bias_term: params.bias_term.unwrap_or(true),
            weight_filler: params.weight_filler,
            bias_filler: params.bias_filler,
        };
        if op.kernel.contains(&0) || op.stride.contains(&0) || op.dilation.contains(&0) || op.groups == 0 {
            return Err(LayerError::invalid_params(LAYER_TYPE, format!("нулевые размеры в {op:?}")));
        }
        if op.num_output % op.groups != 0 {
            return Err(LayerError::invalid_params(
                LAYER_TYPE,
                format!("num_output {} не делится на group {}", op.num_output, op.groups),
            ));
        }
        Ok(op)
    }
}

impl<B: Backend> DeferredOp<B, 4> for ConvolutionOp {
    fn layer_type(&self) -> &'static str {
        LAYER_TYPE
    }

    fn infer_input_dim(&self, input_dims: &[usize]) -> Result<usize, LayerError> {
        match input_dims {
            [_, channels, _, _] if channels % self.groups == 0 => Ok(*channels),
            [_, channels, _, _] => Err(LayerError::ShapeMismatch(format!(
                "{channels} входных каналов не делится на group {}",
                self.groups
            ))),
            other => Err(LayerError::RankMismatch {
                expected: 4,
                actual: other.len(),
            }),
        }
    }

    fn weight_shape(&self, input_dim: usize) -> [usize; 4] {
        [self.num_output, input_dim / self.groups, self.kernel[0], self.kernel[1]]
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

    fn reshape_weight(&self, weight: Blob<B>) -> Result<Tensor<B, 4>, LayerError> {
        let weight = weight.into_rank4()?;
        let dims = weight.dims();
        if dims.contains(&0) {
            return Err(LayerError::ShapeMismatch(format!("веса свертки с нулевой размерностью {dims:?}")));
        }
        Ok(weight)
    }

    fn input_dim_of(&self, weight_dims: [usize; 4]) -> usize {
        weight_dims[1] * self.groups
    }

    fn apply(&self, input: Blob<B>, weight: Tensor<B, 4>, bias: Option<Tensor<B, 1>>) -> Result<Blob<B>, LayerError> {
        let x = input.into_rank4()?;
        let [_, channels, height, width] = x.dims();
        let [_, per_group, kh, kw] = weight.dims();
        if channels != per_group * self.groups {
            return Err(LayerError::ShapeMismatch(format!(
                "свертка ожидает {} входных каналов, получено {channels}",
                per_group * self.groups
            )));
        }
        let (Some(last_h), Some(last_w)) = (kh.checked_sub(1), kw.checked_sub(1)) else {
            return Err(LayerError::ShapeMismatch(format!("пустое ядро свертки {kh}x{kw}")));
        };
        let span_h = self.dilation[0] * last_h + 1;
        let span_w = self.dilation[1] * last_w + 1;
        if height + 2 * self.padding[0] < span_h || width + 2 * self.padding[1] < span_w {
            return Err(LayerError::ShapeMismatch(format!(
                "ядро {kh}x{kw} больше входа {height}x{width} с отступом {:?}",
                self.padding
            )));
        }
        let options = ConvOptions::new(self.stride, self.padding, self.dilation, self.groups);
        Ok(Blob::R4(conv2d(x, weight, bias, options)))
    }
}
