// training_engine/src/error.rs

use thiserror::Error;

use core_burn::LayerError;
use inference_engine::GraphError;
use model_loader::ModelLoaderError;

/// Ошибки солвера.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Параметры солвера противоречивы или неполны.
    #[error("Невалидные параметры солвера: {message}")]
    InvalidSolver {
        /// Что именно не так.
        message: String,
    },

    /// В `SolverParameter` не задана сеть для обучения.
    #[error("Солвер не задает сеть: нужен один из train_net, train_net_param, net, net_param")]
    MissingNet,

    /// Ошибка графа при прямом проходе или построении.
    #[error("Ошибка графа: {0}")]
    Graph(#[from] GraphError),

    /// Ошибка обновления параметра.
    #[error("Ошибка параметра: {0}")]
    Layer(#[from] LayerError),

    /// Ошибка чтения файлов солвера или сети.
    #[error("Ошибка загрузчика: {0}")]
    Loader(#[from] ModelLoaderError),
}

impl SolverError {
    /// Вспомогательный конструктор для `SolverError::InvalidSolver`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSolver {
            message: message.into(),
        }
    }
}
