// inference_engine/src/error.rs

use thiserror::Error;

use core_burn::LayerError;
use model_loader::ModelLoaderError;

/// Ошибки построения и выполнения графа.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Вход слоя не передан и не вычисляется ни одним слоем.
    #[error("Переменная '{name}' не существует: передайте ее как вход или добавьте слой, который ее вычисляет")]
    MissingVariable {
        /// Имя переменной.
        name: String,
    },

    /// Среди массивов передан тензор.
    #[error("Входы смешанного вида: '{name}' передан тензором, остальные массивами")]
    MixedInputs {
        /// Имя входа-тензора.
        name: String,
    },

    /// Ошибка конкретного слоя (построение, прямой проход, привязка весов).
    #[error("Ошибка слоя '{layer}': {source}")]
    Layer {
        /// Имя слоя.
        layer: String,
        /// Исходная ошибка слоя.
        #[source]
        source: LayerError,
    },

    /// Ошибка чтения описания, весов или схемы.
    #[error("Ошибка загрузки модели: {0}")]
    Loader(#[from] ModelLoaderError),
}

impl GraphError {
    /// Оборачивает ошибку слоя с его именем.
    pub fn layer(layer: &str, source: LayerError) -> Self {
        Self::Layer {
            layer: layer.to_string(),
            source,
        }
    }
}
