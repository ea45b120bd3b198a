#![warn(
    missing_docs, // Предупреждать, если публичные элементы не документированы.
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used, // Предупреждать об использовании .unwrap()
    clippy::expect_used  // Предупреждать об использовании .expect()
)]
#![deny(
    unsafe_code,        // Запретить использование unsafe блоков.
    unused_mut,         // Запретить неиспользуемые изменяемые переменные.
    unused_imports,     // Запретить неиспользуемые импорты.
    unused_attributes   // Запретить неиспользуемые атрибуты.
)]

//! `utils_crate` предоставляет общую обработку ошибок, инициализацию логирования
//! и конфигурацию для конвертера моделей Caffe в граф Burn.
//!
//! # Основные модули:
//!
//! - [`error`]: Определяет общий тип ошибки `UtilsError` для всего крейта.
//! - [`logger`]: (активируется фичей `logger_utils_feature`) Инициализация
//!   системы логирования на базе `tracing`.
//! - [`config`]: (активируется фичей `config_toml`) `ConverterConfig` для загрузки
//!   настроек схемы, фазы сети и логирования из TOML-файла.
//!
//! Фича `default` включает обе опциональные части.

// --- Модуль для общих ошибок ---
pub mod error;
pub use error::UtilsError; // Реэкспорт для удобства использования.

/// Модуль с утилитами для инициализации логирования.
///
/// Консольный вывод доступен всегда, запись в файл требует фичи `logger_utils_feature`.
pub mod logger;
pub use logger::init_tracing_logger; // Реэкспорт.
#[cfg(feature = "config_toml")]
pub use logger::init_from_config;

/// Модуль для загрузки и управления конфигурацией конвертера.
///
/// Активируется фичей `config_toml`.
#[cfg(feature = "config_toml")]
pub mod config;
#[cfg(feature = "config_toml")]
pub use config::{ConverterConfig, LoggingSection, NetSection, PhaseSetting, SchemaCompilerSetting, SchemaSection}; // Реэкспорт.
