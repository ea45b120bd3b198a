// core_burn/src/params.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Типизированные параметры слоев, десериализуемые из спроецированных `*_param`.
//!
//! Повторяемые поля Caffe (`kernel_size`, `stride`, `pad`, `dilation`) читаются
//! по правилу "первый или по умолчанию": скаляр берется как есть, из списка берется
//! первый элемент, пустой или отсутствующий список дает значение по умолчанию оператора.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{error::LayerError, filler::FillerSpec};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn first_of<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => Some(value),
        Some(OneOrMany::Many(values)) => values.into_iter().next(),
        None => None,
    })
}

/// Десериализует параметры слоя из `serde_json::Value`.
///
/// # Errors
/// `LayerError::InvalidParams` с сообщением `serde_json`.
pub fn parse_params<T: for<'de> Deserialize<'de>>(layer_type: &str, value: &Value) -> Result<T, LayerError> {
    T::deserialize(value).map_err(|e| LayerError::invalid_params(layer_type, e.to_string()))
}

/// `convolution_param`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ConvolutionParams {
    /// Число выходных каналов (обязательно).
    #[serde(default)]
    pub num_output: Option<usize>,
    /// Использовать ли смещение.
    #[serde(default)]
    pub bias_term: Option<bool>,
    /// Отступ.
    #[serde(default, deserialize_with = "first_of")]
    pub pad: Option<usize>,
    /// Размер ядра.
    #[serde(default, deserialize_with = "first_of")]
    pub kernel_size: Option<usize>,
    /// Шаг.
    #[serde(default, deserialize_with = "first_of")]
    pub stride: Option<usize>,
    /// Дилатация.
    #[serde(default, deserialize_with = "first_of")]
    pub dilation: Option<usize>,
    /// Отступ по высоте (перекрывает `pad`).
    #[serde(default)]
    pub pad_h: Option<usize>,
    /// Отступ по ширине (перекрывает `pad`).
    #[serde(default)]
    pub pad_w: Option<usize>,
    /// Высота ядра (перекрывает `kernel_size`).
    #[serde(default)]
    pub kernel_h: Option<usize>,
    /// Ширина ядра (перекрывает `kernel_size`).
    #[serde(default)]
    pub kernel_w: Option<usize>,
    /// Шаг по высоте (перекрывает `stride`).
    #[serde(default)]
    pub stride_h: Option<usize>,
    /// Шаг по ширине (перекрывает `stride`).
    #[serde(default)]
    pub stride_w: Option<usize>,
    /// Число групп.
    #[serde(default)]
    pub group: Option<usize>,
    /// Инициализатор весов.
    #[serde(default)]
    pub weight_filler: Option<FillerSpec>,
    /// Инициализатор смещения.
    #[serde(default)]
    pub bias_filler: Option<FillerSpec>,
}

impl ConvolutionParams {
    /// `[kh, kw]`, по умолчанию 1.
    #[must_use]
    pub fn kernel(&self) -> [usize; 2] {
        let k = self.kernel_size.unwrap_or(1);
        [self.kernel_h.unwrap_or(k), self.kernel_w.unwrap_or(k)]
    }

    /// `[sh, sw]`, по умолчанию 1.
    #[must_use]
    pub fn strides(&self) -> [usize; 2] {
        let s = self.stride.unwrap_or(1);
        [self.stride_h.unwrap_or(s), self.stride_w.unwrap_or(s)]
    }

    /// `[ph, pw]`, по умолчанию 0.
    #[must_use]
    pub fn padding(&self) -> [usize; 2] {
        let p = self.pad.unwrap_or(0);
        [self.pad_h.unwrap_or(p), self.pad_w.unwrap_or(p)]
    }

    /// `[dh, dw]`, по умолчанию 1.
    #[must_use]
    pub fn dilations(&self) -> [usize; 2] {
        let d = self.dilation.unwrap_or(1);
        [d, d]
    }
}

/// `inner_product_param`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct InnerProductParams {
    /// Число выходов (обязательно).
    #[serde(default)]
    pub num_output: Option<usize>,
    /// Использовать ли смещение.
    #[serde(default)]
    pub bias_term: Option<bool>,
    /// Инициализатор весов.
    #[serde(default)]
    pub weight_filler: Option<FillerSpec>,
    /// Инициализатор смещения.
    #[serde(default)]
    pub bias_filler: Option<FillerSpec>,
}

/// Метод пулинга (`PoolingParameter.PoolMethod`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMethod {
    /// `MAX = 0`.
    Max,
    /// `AVE = 1`.
    Average,
}

/// `pooling_param`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct PoolingParams {
    /// Код метода: 0 = MAX, 1 = AVE, 2 = STOCHASTIC.
    #[serde(default)]
    pub pool: Option<i64>,
    /// Размер окна.
    #[serde(default, deserialize_with = "first_of")]
    pub kernel_size: Option<usize>,
    /// Шаг.
    #[serde(default, deserialize_with = "first_of")]
    pub stride: Option<usize>,
    /// Отступ.
    #[serde(default, deserialize_with = "first_of")]
    pub pad: Option<usize>,
    /// Высота окна.
    #[serde(default)]
    pub kernel_h: Option<usize>,
    /// Ширина окна.
    #[serde(default)]
    pub kernel_w: Option<usize>,
    /// Шаг по высоте.
    #[serde(default)]
    pub stride_h: Option<usize>,
    /// Шаг по ширине.
    #[serde(default)]
    pub stride_w: Option<usize>,
    /// Отступ по высоте.
    #[serde(default)]
    pub pad_h: Option<usize>,
    /// Отступ по ширине.
    #[serde(default)]
    pub pad_w: Option<usize>,
    /// Окно на всю пространственную область входа.
    #[serde(default)]
    pub global_pooling: Option<bool>,
}

impl PoolingParams {
    /// Метод пулинга.
    ///
    /// # Errors
    /// `LayerError::Unsupported` для `STOCHASTIC` и неизвестных кодов.
    pub fn method(&self) -> Result<PoolMethod, LayerError> {
        match self.pool.unwrap_or(0) {
            0 => Ok(PoolMethod::Max),
            1 => Ok(PoolMethod::Average),
            2 => Err(LayerError::Unsupported("STOCHASTIC pooling".to_string())),
            code => Err(LayerError::Unsupported(format!("метод пулинга {code}"))),
        }
    }

    /// `[kh, kw]`, по умолчанию 1.
    #[must_use]
    pub fn kernel(&self) -> [usize; 2] {
        let k = self.kernel_size.unwrap_or(1);
        [self.kernel_h.unwrap_or(k), self.kernel_w.unwrap_or(k)]
    }

    /// `[sh, sw]`, по умолчанию 1.
    #[must_use]
    pub fn strides(&self) -> [usize; 2] {
        let s = self.stride.unwrap_or(1);
        [self.stride_h.unwrap_or(s), self.stride_w.unwrap_or(s)]
    }

    /// `[ph, pw]`, по умолчанию 0.
    #[must_use]
    pub fn padding(&self) -> [usize; 2] {
        let p = self.pad.unwrap_or(0);
        [self.pad_h.unwrap_or(p), self.pad_w.unwrap_or(p)]
    }
}

/// `softmax_param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct SoftmaxParams {
    /// Ось; отрицательная считается с конца. Без параметра это последняя ось.
    #[serde(default)]
    pub axis: Option<i64>,
}

/// `relu_param`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
pub struct ReluParams {
    /// Наклон отрицательной части (leaky ReLU).
    #[serde(default)]
    pub negative_slope: Option<f64>,
}

/// `dropout_param`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
pub struct DropoutParams {
    /// Доля обнуляемых элементов, по умолчанию 0.5.
    #[serde(default)]
    pub dropout_ratio: Option<f64>,
}

/// Операция `Eltwise` (`EltwiseParameter.EltwiseOp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EltwiseOp {
    /// `PROD = 0`.
    Prod,
    /// `SUM = 1`.
    Sum,
    /// `MAX = 2`.
    Max,
}

/// `eltwise_param`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct EltwiseParams {
    /// Код операции, по умолчанию SUM.
    #[serde(default)]
    pub operation: Option<i64>,
    /// Коэффициенты для SUM.
    #[serde(default)]
    pub coeff: Vec<f64>,
}

impl EltwiseParams {
    /// Операция.
    ///
    /// # Errors
    /// `LayerError::InvalidParams` для неизвестного кода.
    pub fn op(&self) -> Result<EltwiseOp, LayerError> {
        match self.operation.unwrap_or(1) {
            0 => Ok(EltwiseOp::Prod),
            1 => Ok(EltwiseOp::Sum),
            2 => Ok(EltwiseOp::Max),
            code => Err(LayerError::invalid_params("Eltwise", format!("неизвестная операция {code}"))),
        }
    }
}
