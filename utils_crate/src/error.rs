#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![deny(unsafe_code, unused_mut, unused_imports, unused_attributes)]

use thiserror::Error;

/// Общий тип ошибки для утилит `utils_crate`.
///
/// Агрегирует ошибки ввода-вывода, конфигурации и инициализации логгера,
/// которые возникают до того, как начинается собственно загрузка модели.
#[derive(Error, Debug)]
pub enum UtilsError {
    /// Ошибка ввода-вывода (I/O).
    ///
    /// Содержит исходную ошибку `std::io::Error` и опционально путь к файлу/директории,
    /// с которым возникла проблема.
    #[error("Ошибка ввода-вывода: {source}")]
    Io {
        /// Исходная ошибка I/O.
        #[source]
        source: std::io::Error,
        /// Опциональный путь, связанный с ошибкой I/O.
        path: Option<String>,
    },

    /// Ошибка, связанная с конфигурацией конвертера.
    ///
    /// Например, неверный синтаксис TOML или неизвестное значение фазы сети.
    #[error("Ошибка конфигурации: {0}")]
    Config(String),

    /// Общая ошибка утилиты для случаев, не покрытых другими вариантами.
    ///
    /// Используется, например, при повторной инициализации глобального логгера.
    #[error("Произошла общая ошибка утилиты: {0}")]
    Generic(String),
}

/// Конвертация из `std::io::Error` в `UtilsError::Io` без пути.
impl From<std::io::Error> for UtilsError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }
}

/// Конвертация из `toml::de::Error` в `UtilsError::Config`.
#[cfg(feature = "config_toml")]
impl From<toml::de::Error> for UtilsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Ошибка десериализации TOML: {err}"))
    }
}

impl UtilsError {
    /// Вспомогательный конструктор для создания `UtilsError::Io` с указанием пути.
    ///
    /// # Аргументы
    ///
    /// * `source` - Исходная ошибка `std::io::Error`.
    /// * `path` - Строка или любой тип, который можно преобразовать в `String`, представляющий путь.
    pub fn io_with_path(source: std::io::Error, path: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }
}
