#![cfg(all(feature = "config_toml", feature = "logger_utils_feature"))]

use std::fs;

use serial_test::serial;
use tempfile::tempdir;
use utils_crate::config::{ConverterConfig, LoggingSection};
use utils_crate::error::UtilsError;
use utils_crate::logger::init_from_config;

#[test]
fn test_unknown_level_in_config_is_rejected() {
    let logging = LoggingSection {
        level: "громко".to_string(),
        log_dir: None,
    };
    assert!(matches!(init_from_config("caffe2burn", &logging), Err(UtilsError::Config(_))));
}

// Отдельный процесс: глобальный подписчик устанавливается здесь впервые.
#[test]
#[serial]
fn test_logging_section_drives_file_logger() {
    let temp_dir = tempdir().unwrap();
    let app_name = "caffe2burn_config_logger";
    let config = ConverterConfig::from_toml_str(&format!(
        "[logging]\nlevel = \"debug\"\nlog_dir = {:?}\n",
        temp_dir.path().display().to_string()
    ))
    .unwrap();

    init_from_config(app_name, &config.logging).unwrap();
    tracing::debug!(target: "caffe2burn_config_logger", "отладочная запись из секции [logging]");
    std::thread::sleep(std::time::Duration::from_millis(100));

    let written = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(app_name))
        .any(|entry| {
            fs::read_to_string(entry.path())
                .map_or(false, |content| content.contains("отладочная запись из секции [logging]"))
        });
    assert!(written, "Запись DEBUG не найдена в лог-файле");

    assert!(matches!(
        init_from_config(app_name, &config.logging),
        Err(UtilsError::Generic(_))
    ));
}
