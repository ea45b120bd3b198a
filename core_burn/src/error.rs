// core_burn/src/error.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

/// Перечисление всех возможных ошибок слоев `core_burn`.
///
/// Ошибки возникают при построении слоя из спроецированных параметров,
/// при прямом проходе (несовместимые ранги и формы) и при привязке весов.
#[derive(thiserror::Error, Debug)] // Используем `thiserror` для автоматической генерации трейтов Error и Display.
pub enum LayerError {
    /// Параметры слоя не удалось разобрать или они противоречивы.
    #[error("Некорректные параметры слоя {layer_type}: {message}")]
    InvalidParams {
        /// Тип слоя (`Convolution`, `Pooling`, ...).
        layer_type: String,
        /// Что именно не так.
        message: String,
    },

    /// Оператор не поддерживается (например, `STOCHASTIC` pooling).
    #[error("Неподдерживаемая операция: {0}")]
    Unsupported(String),

    /// Ранг тензора не совпадает с ожидаемым.
    #[error("Несовместимый ранг тензора: ожидался {expected}, получен {actual}")]
    RankMismatch {
        /// Ожидаемый ранг.
        expected: usize,
        /// Фактический ранг.
        actual: usize,
    },

    /// Несовместимые размеры тензора или блоба.
    #[error("Несовместимые размеры или форма тензора: {0}")]
    ShapeMismatch(String),

    /// Неверное число входов слоя.
    #[error("Неверное число входов: ожидалось {expected}, получено {actual}")]
    InputCount {
        /// Ожидаемое число (минимум для слоев с переменным числом входов).
        expected: usize,
        /// Фактическое число.
        actual: usize,
    },

    /// Модуль не принимает параметры через `set_parameters`.
    #[error("Модуль '{kind}' не поддерживает привязку параметров")]
    UnsupportedBinding {
        /// Вид модуля.
        kind: String,
    },

    /// Ошибка пользовательского внешнего слоя.
    #[error("Ошибка внешнего слоя: {0}")]
    External(String),

    /// Ошибка преобразования данных тензора.
    #[error("Ошибка данных тензора: {0}")]
    Data(String),
}

impl LayerError {
    /// Конструктор для `LayerError::InvalidParams`.
    pub fn invalid_params(layer_type: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            layer_type: layer_type.to_string(),
            message: message.into(),
        }
    }
}
