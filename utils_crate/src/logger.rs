#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![deny(unsafe_code, unused_mut, unused_imports, unused_attributes)]

//! Модуль для инициализации глобального логгера на основе `tracing`.
//!
//! Запись в файл с ежедневной ротацией активируется фичей `logger_utils_feature`.

use std::{io, path::Path};

use tracing::Level;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::error::UtilsError;

/// Строит директиву `<крейт>=<уровень>` для `EnvFilter`.
fn level_directive(target: &str, level: Level) -> Result<Directive, UtilsError> {
    format!("{target}={level}")
        .parse()
        .map_err(|e| UtilsError::Config(format!("Неверная директива логирования '{target}={level}': {e}")))
}

/// Слой записи в файл с ежедневной ротацией.
///
/// Возвращает `None`, если директорию логов создать не удалось.
#[cfg(feature = "logger_utils_feature")]
fn file_layer(
    app_name: &str,
    dir: &Path,
    base_env_filter: EnvFilter,
    target: &str,
    file_level: Level,
) -> Result<Option<Box<dyn Layer<Registry> + Send + Sync + 'static>>, UtilsError> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        // tracing еще не инициализирован, поэтому eprintln!.
        eprintln!(
            "[ПРЕДУПРЕЖДЕНИЕ] Не удалось создать директорию логов {}: {e}. Логирование в файл будет отключено.",
            dir.display()
        );
        return Ok(None);
    }
    let file_appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let file_filter = base_env_filter.add_directive(level_directive(target, file_level)?);
    let layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false) // Выключаем ANSI цвета для файлов
        .with_filter(file_filter);
    Ok(Some(layer.boxed()))
}

/// Без фичи `logger_utils_feature` файловый слой недоступен.
#[cfg(not(feature = "logger_utils_feature"))]
#[allow(clippy::unnecessary_wraps)]
fn file_layer(
    _app_name: &str,
    _dir: &Path,
    _base_env_filter: EnvFilter,
    _target: &str,
    _file_level: Level,
) -> Result<Option<Box<dyn Layer<Registry> + Send + Sync + 'static>>, UtilsError> {
    Ok(None)
}

/// Инициализирует глобальный подписчик `tracing`.
///
/// Настраивает вывод в консоль (stderr) и, опционально, в файл с ежедневной ротацией.
/// Фильтрует по `RUST_LOG` (если переменная не задана, базовый уровень `info`)
/// и по явным уровням для крейта `app_name`.
///
/// # Аргументы
/// * `app_name` - Имя приложения (для фильтров и имени файла лога).
/// * `console_level` - Уровень для консоли.
/// * `file_level` - Уровень для файла.
/// * `log_dir` - Опциональная директория для файлов логов.
///
/// # Ошибки
/// Возвращает `UtilsError::Generic`, если глобальный подписчик уже установлен,
/// и `UtilsError::Config` при невалидной директиве фильтра.
/// Сбой создания директории логов не является ошибкой: он выводится в stderr,
/// а логирование продолжается только в консоль.
#[allow(clippy::module_name_repetitions)] // Имя функции init_tracing_logger в модуле logger - это нормально
pub fn init_tracing_logger(
    app_name: &str,
    console_level: Level,
    file_level: Level,
    log_dir: Option<&Path>,
) -> Result<(), UtilsError> {
    let base_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Заменяем дефисы на подчеркивания в имени приложения для EnvFilter
    let sanitized_app_name = app_name.replace('-', "_");

    let console_filter = base_env_filter
        .clone()
        .add_directive(level_directive(&sanitized_app_name, console_level)?);

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_filter(console_filter);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync + 'static>> = Vec::new();
    layers.push(console_layer.boxed());

    let file_logging = match log_dir {
        Some(dir) => match file_layer(app_name, dir, base_env_filter, &sanitized_app_name, file_level)? {
            Some(layer) => {
                layers.push(layer);
                true
            }
            None => false,
        },
        None => false,
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| UtilsError::Generic(format!("Не удалось инициализировать логгер: {e}")))?;

    match log_dir {
        Some(dir) if file_logging => tracing::info!(
            "Логгер инициализирован. Уровень консоли: {}. Логирование в файл: {} (уровень {}).",
            console_level,
            dir.display(),
            file_level
        ),
        Some(dir) => tracing::warn!(
            "Логгер инициализирован. Уровень консоли: {}. Логирование в файл в {} недоступно.",
            console_level,
            dir.display()
        ),
        None => tracing::info!(
            "Логгер инициализирован. Только вывод в консоль (уровень {}).",
            console_level
        ),
    }
    Ok(())
}

/// Разбирает уровень логирования из строки конфигурации (`"debug"`, `"INFO"` и т.д.).
///
/// # Ошибки
/// `UtilsError::Config`, если строка не является уровнем `tracing`.
pub fn parse_level(level: &str) -> Result<Level, UtilsError> {
    level
        .parse::<Level>()
        .map_err(|e| UtilsError::Config(format!("Неизвестный уровень логирования '{level}': {e}")))
}

/// Инициализирует логгер по секции `[logging]` конфигурации.
///
/// Уровень секции применяется и к консоли, и к файлу в `log_dir`.
///
/// # Ошибки
/// `UtilsError::Config` при неизвестном уровне, далее как [`init_tracing_logger`].
#[cfg(feature = "config_toml")]
pub fn init_from_config(app_name: &str, logging: &crate::config::LoggingSection) -> Result<(), UtilsError> {
    let level = parse_level(&logging.level)?;
    init_tracing_logger(app_name, level, level, logging.log_dir.as_deref())
}
