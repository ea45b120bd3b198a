#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![deny(unsafe_code, unused_mut, unused_imports, unused_attributes)]

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::UtilsError;

/// Глобальная конфигурация конвертера.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ConverterConfig {
    /// Откуда брать и чем компилировать схему `caffe.proto`.
    #[serde(default)]
    pub schema: SchemaSection,

    /// Настройки построения сети.
    #[serde(default)]
    pub net: NetSection,

    /// Конфигурация логирования.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Каким инструментом компилировать `caffe.proto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaCompilerSetting {
    /// Встроенный парсер `protobuf-parse` на чистом Rust.
    #[default]
    Pure,
    /// Внешний бинарник `protoc` (должен быть доступен в `PATH`).
    Protoc,
}

/// Секция `[schema]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct SchemaSection {
    /// Путь к `caffe.proto`. Если не задан, используется встроенная схема.
    #[serde(default)]
    pub proto_path: Option<PathBuf>,
    /// Компилятор схемы.
    #[serde(default)]
    pub compiler: SchemaCompilerSetting,
}

/// Фаза сети, как она задается в конфигурации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhaseSetting {
    /// Режим обучения (дропаут активен).
    Train,
    /// Режим инференса.
    #[default]
    Test,
}

/// Секция `[net]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct NetSection {
    /// Фаза, в которой строится граф.
    #[serde(default)]
    pub phase: PhaseSetting,
}

/// Секция `[logging]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSection {
    /// Уровень логирования для консоли.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Директория для файлов логов (опционально).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl ConverterConfig {
    /// Загружает конфигурацию из TOML файла.
    /// Если файл не найден, возвращается конфигурация по умолчанию.
    ///
    /// # Errors
    /// Возвращает `UtilsError::Io` при ошибках чтения файла или `UtilsError::Config`
    /// при ошибках парсинга TOML.
    pub fn load_from_toml(file_path: &Path) -> Result<Self, UtilsError> {
        if !file_path.exists() {
            warn!(
                "Файл конфигурации {} не найден, используется конфигурация по умолчанию.",
                file_path.display()
            );
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(file_path)
            .map_err(|e| UtilsError::io_with_path(e, file_path.display().to_string()))?;
        Self::from_toml_str(&config_str)
    }

    /// Разбирает конфигурацию из строки TOML.
    ///
    /// # Errors
    /// `UtilsError::Config` при синтаксической ошибке или неизвестном значении.
    pub fn from_toml_str(config_str: &str) -> Result<Self, UtilsError> {
        Ok(toml::from_str(config_str)?)
    }
}
