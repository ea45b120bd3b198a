#[cfg(feature = "config_toml")]
mod converter_config_tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;
    use utils_crate::config::{ConverterConfig, PhaseSetting, SchemaCompilerSetting};
    use utils_crate::error::UtilsError;

    #[test]
    fn test_converter_config_default_values() {
        let config = ConverterConfig::default();
        assert_eq!(config.schema.proto_path, None);
        assert_eq!(config.schema.compiler, SchemaCompilerSetting::Pure);
        assert_eq!(config.net.phase, PhaseSetting::Test);
        assert_eq!(config.logging.level, "info".to_string());
        assert_eq!(config.logging.log_dir, None);
    }

    #[test]
    fn test_converter_config_load_from_toml_exists() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
            [schema]
            proto_path = "/opt/caffe/src/caffe/proto/caffe.proto"
            compiler = "protoc"

            [net]
            phase = "train"

            [logging]
            level = "debug"
            log_dir = "/var/log/caffe2burn"
        "#;
        writeln!(temp_file, "{}", toml_content).unwrap();

        let config = ConverterConfig::load_from_toml(temp_file.path()).unwrap();
        assert_eq!(
            config.schema.proto_path,
            Some(PathBuf::from("/opt/caffe/src/caffe/proto/caffe.proto"))
        );
        assert_eq!(config.schema.compiler, SchemaCompilerSetting::Protoc);
        assert_eq!(config.net.phase, PhaseSetting::Train);
        assert_eq!(config.logging.level, "debug".to_string());
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/var/log/caffe2burn")));
    }

    #[test]
    fn test_converter_config_partial_deserialization() {
        let config = ConverterConfig::from_toml_str("[net]\nphase = \"train\"\n").unwrap();
        assert_eq!(config.net.phase, PhaseSetting::Train);
        assert_eq!(config.schema.compiler, SchemaCompilerSetting::Pure);
        assert_eq!(config.logging.level, "info".to_string());
    }

    #[test]
    fn test_converter_config_file_not_found() {
        let non_existent_path = Path::new("/totally/non/existent/path/caffe2burn.toml");
        let config = ConverterConfig::load_from_toml(non_existent_path).unwrap();
        assert_eq!(config, ConverterConfig::default());
    }

    #[test]
    fn test_converter_config_unknown_phase_is_error() {
        let result = ConverterConfig::from_toml_str("[net]\nphase = \"validation\"\n");
        match result {
            Err(UtilsError::Config(msg)) => assert!(msg.contains("TOML")),
            other => panic!("Expected a Config error for unknown phase, got {:?}", other),
        }
    }
}
