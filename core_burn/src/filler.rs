// core_burn/src/filler.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Инициализаторы параметров (`FillerParameter` Caffe) поверх `burn::nn::Initializer`.

use burn::{
    module::Param,
    nn::Initializer,
    tensor::{backend::Backend, Tensor},
};
use serde::Deserialize;
use tracing::warn;

/// Спроецированный `FillerParameter`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct FillerSpec {
    /// Тип: `gaussian`, `constant`, `uniform`, `xavier`, `msra`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Значение для `constant`.
    #[serde(default)]
    pub value: Option<f64>,
    /// Нижняя граница для `uniform`.
    #[serde(default)]
    pub min: Option<f64>,
    /// Верхняя граница для `uniform`.
    #[serde(default)]
    pub max: Option<f64>,
    /// Среднее для `gaussian`.
    #[serde(default)]
    pub mean: Option<f64>,
    /// Стандартное отклонение для `gaussian`.
    #[serde(default)]
    pub std: Option<f64>,
    /// Нормировка для `xavier`/`msra`: 0 = FAN_IN, 1 = FAN_OUT, 2 = AVERAGE.
    #[serde(default)]
    pub variance_norm: Option<i64>,
}

impl FillerSpec {
    /// Переводит спецификацию в инициализатор Burn.
    ///
    /// `None` означает "инициализатор по умолчанию".
    #[must_use]
    pub fn initializer(&self, fan_in: usize, fan_out: usize) -> Option<Initializer> {
        let kind = self.kind.as_deref()?;
        #[allow(clippy::cast_precision_loss)]
        let n = match self.variance_norm.unwrap_or(0) {
            1 => fan_out as f64,
            2 => (fan_in + fan_out) as f64 / 2.0,
            _ => fan_in as f64,
        }
        .max(1.0);
        match kind {
            "gaussian" => Some(Initializer::Normal {
                mean: self.mean.unwrap_or(0.0),
                std: self.std.unwrap_or(1.0),
            }),
            "constant" => Some(Initializer::Constant {
                value: self.value.unwrap_or(0.0),
            }),
            "uniform" => Some(Initializer::Uniform {
                min: self.min.unwrap_or(0.0),
                max: self.max.unwrap_or(1.0),
            }),
            "xavier" => {
                let scale = (3.0 / n).sqrt();
                Some(Initializer::Uniform { min: -scale, max: scale })
            }
            "msra" => Some(Initializer::Normal {
                mean: 0.0,
                std: (2.0 / n).sqrt(),
            }),
            other => {
                warn!("Неизвестный тип инициализатора '{}', используется инициализатор по умолчанию", other);
                None
            }
        }
    }
}

/// Инициализатор по умолчанию (как у `burn::nn::Linear`).
#[must_use]
pub fn default_initializer() -> Initializer {
    Initializer::KaimingUniform {
        gain: 1.0 / 3.0f64.sqrt(),
        fan_out_only: false,
    }
}

/// Создает параметр формы `shape` по спецификации (или по умолчанию).
#[must_use]
pub fn fill<B: Backend, const D: usize>(
    filler: Option<&FillerSpec>,
    shape: [usize; D],
    fan_in: usize,
    fan_out: usize,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    filler
        .and_then(|spec| spec.initializer(fan_in, fan_out))
        .unwrap_or_else(default_initializer)
        .init_with(shape, Some(fan_in), Some(fan_out), device)
}
