// model_loader/src/schema.rs

//! Мост к схеме Caffe.
//!
//! `caffe.proto` компилируется во время выполнения в динамические дескрипторы
//! `protobuf`, поэтому загрузчик не зависит от сгенерированного кода и может
//! работать с любой версией схемы, совместимой по номерам полей.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protobuf::reflect::{FileDescriptor, MessageDescriptor};
use protobuf::MessageDyn;
use protobuf_parse::Parser;
use tracing::{debug, info};
use utils_crate::config::{ConverterConfig, SchemaCompilerSetting, SchemaSection};

use crate::error::ModelLoaderError;

/// Полная схема Caffe (BVLC), встроенная в бинарник.
pub const BUNDLED_CAFFE_PROTO: &str = include_str!("../proto/caffe.proto");

const BUNDLED_FILE_NAME: &str = "caffe.proto";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Сообщение с описанием сети.
pub const NET_PARAMETER: &str = "NetParameter";
/// Сообщение с параметрами солвера.
pub const SOLVER_PARAMETER: &str = "SolverParameter";

/// Каким инструментом компилировать `.proto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaCompiler {
    /// Парсер `protobuf-parse` на чистом Rust.
    #[default]
    Pure,
    /// Внешний `protoc` из `PATH`.
    Protoc,
}

impl From<SchemaCompilerSetting> for SchemaCompiler {
    fn from(setting: SchemaCompilerSetting) -> Self {
        match setting {
            SchemaCompilerSetting::Pure => Self::Pure,
            SchemaCompilerSetting::Protoc => Self::Protoc,
        }
    }
}

/// Скомпилированная схема Caffe: фабрика типизированных сообщений.
#[derive(Clone)]
pub struct CaffeSchema {
    source: PathBuf,
    files: Vec<FileDescriptor>,
    net: MessageDescriptor,
    solver: MessageDescriptor,
}

impl fmt::Debug for CaffeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaffeSchema")
            .field("source", &self.source)
            .field("files", &self.files.len())
            .field("net", &self.net.full_name())
            .finish()
    }
}

impl CaffeSchema {
    /// Компилирует встроенную схему (`model_loader/proto/caffe.proto`).
    ///
    /// # Errors
    /// `ModelLoaderError::Io`, если не удалось записать схему во временную директорию,
    /// и `ModelLoaderError::SchemaCompilation` при ошибке компилятора.
    pub fn bundled() -> Result<Self, ModelLoaderError> {
        let mut schema = Self::compile_text(BUNDLED_CAFFE_PROTO, SchemaCompiler::Pure)?;
        schema.source = PathBuf::from(format!("<встроенная>/{BUNDLED_FILE_NAME}"));
        Ok(schema)
    }

    /// Загружает `caffe.proto` по http(s)-адресу и компилирует его.
    ///
    /// # Errors
    /// `ModelLoaderError::SchemaCompilation`, если адрес недоступен, сервер вернул
    /// ошибку или загруженный текст не компилируется.
    pub fn fetch(url: &str, compiler: SchemaCompiler) -> Result<Self, ModelLoaderError> {
        info!("Загрузка схемы {}", url);
        let fetch_error = |message: String| ModelLoaderError::SchemaCompilation {
            path: url.to_string(),
            message,
        };
        let text = ureq::get(url)
            .timeout(FETCH_TIMEOUT)
            .call()
            .map_err(|e| fetch_error(format!("не удалось загрузить схему: {e}")))?
            .into_string()
            .map_err(|e| fetch_error(format!("не удалось прочитать ответ: {e}")))?;
        debug!("Схема загружена: {} байт", text.len());

        let mut schema = Self::compile_text(&text, compiler)?;
        schema.source = PathBuf::from(url);
        Ok(schema)
    }

    /// Записывает текст схемы во временную директорию и компилирует его.
    fn compile_text(text: &str, compiler: SchemaCompiler) -> Result<Self, ModelLoaderError> {
        let dir = tempfile::tempdir().map_err(|e| ModelLoaderError::io(Path::new(BUNDLED_FILE_NAME), e))?;
        let path = dir.path().join(BUNDLED_FILE_NAME);
        std::fs::write(&path, text).map_err(|e| ModelLoaderError::io(&path, e))?;
        Self::compile(&path, compiler)
    }

    /// Компилирует `caffe.proto` по указанному пути.
    ///
    /// Директория файла используется как include-путь.
    ///
    /// # Errors
    /// `ModelLoaderError::SchemaCompilation` с диагностикой компилятора, если файл
    /// не компилируется или в нем нет `NetParameter`/`SolverParameter`.
    pub fn compile(proto_path: &Path, compiler: SchemaCompiler) -> Result<Self, ModelLoaderError> {
        info!("Компиляция схемы {} ({:?})", proto_path.display(), compiler);
        let compilation_error = |message: String| ModelLoaderError::SchemaCompilation {
            path: proto_path.display().to_string(),
            message,
        };

        if !proto_path.is_file() {
            return Err(compilation_error("файл схемы не найден".to_string()));
        }
        let include_dir = match proto_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut parser = Parser::new();
        match compiler {
            SchemaCompiler::Pure => parser.pure(),
            SchemaCompiler::Protoc => parser.protoc(),
        };
        parser.include(&include_dir).input(proto_path);

        let parsed = parser
            .parse_and_typecheck()
            .map_err(|e| compilation_error(format!("{e:#}")))?;
        let files = FileDescriptor::new_dynamic_fds(parsed.file_descriptors, &[])
            .map_err(|e| compilation_error(e.to_string()))?;
        debug!("Схема скомпилирована: {} файл(ов) дескрипторов", files.len());

        let find = |name: &str| {
            files
                .iter()
                .find_map(|file| file.message_by_package_relative_name(name))
                .ok_or_else(|| compilation_error(format!("в схеме нет сообщения '{name}'")))
        };
        let net = find(NET_PARAMETER)?;
        let solver = find(SOLVER_PARAMETER)?;

        Ok(Self {
            source: proto_path.to_path_buf(),
            files,
            net,
            solver,
        })
    }

    /// Строит схему по секции `[schema]` конфигурации: http(s)-адрес загружается,
    /// путь к файлу компилируется, без `proto_path` берется встроенная схема.
    ///
    /// # Errors
    /// См. [`CaffeSchema::fetch`], [`CaffeSchema::compile`] и [`CaffeSchema::bundled`].
    pub fn load(section: &SchemaSection) -> Result<Self, ModelLoaderError> {
        let compiler = section.compiler.into();
        match &section.proto_path {
            Some(path) => match path.to_str().filter(|location| is_url(location)) {
                Some(url) => Self::fetch(url, compiler),
                None => Self::compile(path, compiler),
            },
            None => Self::bundled(),
        }
    }

    /// Читает TOML-конфигурацию конвертера и строит схему по ее секции `[schema]`.
    /// Отсутствующий файл дает конфигурацию по умолчанию, то есть встроенную схему.
    ///
    /// # Errors
    /// `ModelLoaderError::Utils`, если файл не читается или не разбирается,
    /// далее как [`CaffeSchema::load`].
    pub fn from_config_file(config_path: &Path) -> Result<Self, ModelLoaderError> {
        let config = ConverterConfig::load_from_toml(config_path)?;
        Self::load(&config.schema)
    }

    /// Откуда была скомпилирована схема.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Дескриптор `NetParameter`.
    #[must_use]
    pub fn net_descriptor(&self) -> &MessageDescriptor {
        &self.net
    }

    /// Дескриптор `SolverParameter`.
    #[must_use]
    pub fn solver_descriptor(&self) -> &MessageDescriptor {
        &self.solver
    }

    /// Ищет любое сообщение схемы по имени относительно пакета.
    ///
    /// # Errors
    /// `ModelLoaderError::MessageNotFound`, если такого сообщения нет.
    pub fn message(&self, name: &str) -> Result<MessageDescriptor, ModelLoaderError> {
        self.files
            .iter()
            .find_map(|file| file.message_by_package_relative_name(name))
            .ok_or_else(|| ModelLoaderError::MessageNotFound { name: name.to_string() })
    }

    /// Пустой `NetParameter`.
    #[must_use]
    pub fn new_net(&self) -> Box<dyn MessageDyn> {
        self.net.new_instance()
    }

    /// Разбирает `NetParameter` из текстового формата (prototxt).
    ///
    /// # Errors
    /// `ModelLoaderError::TextParse` при синтаксической ошибке или неизвестном поле.
    pub fn parse_net_text(&self, text: &str) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
        parse_text(&self.net, text)
    }

    /// Разбирает `NetParameter` из бинарного формата (caffemodel).
    ///
    /// # Errors
    /// `ModelLoaderError::BinaryParse`, если байты не являются валидным сообщением.
    pub fn parse_net_binary(&self, bytes: &[u8]) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
        parse_binary(&self.net, bytes)
    }

    /// Разбирает `SolverParameter` из текстового формата.
    ///
    /// # Errors
    /// `ModelLoaderError::TextParse` при ошибке разбора.
    pub fn parse_solver_text(&self, text: &str) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
        parse_text(&self.solver, text)
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Разбирает текстовое сообщение любого типа схемы.
///
/// # Errors
/// `ModelLoaderError::TextParse` при ошибке разбора.
pub fn parse_text(descriptor: &MessageDescriptor, text: &str) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
    let mut message = descriptor.new_instance();
    protobuf::text_format::merge_from_str(&mut *message, text).map_err(|e| ModelLoaderError::TextParse {
        message_type: descriptor.name().to_string(),
        message: e.to_string(),
    })?;
    Ok(message)
}

/// Разбирает бинарное сообщение любого типа схемы.
///
/// # Errors
/// `ModelLoaderError::BinaryParse` при ошибке разбора.
pub fn parse_binary(descriptor: &MessageDescriptor, bytes: &[u8]) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
    let mut message = descriptor.new_instance();
    message.merge_from_bytes_dyn(bytes).map_err(|e| ModelLoaderError::BinaryParse {
        message_type: descriptor.name().to_string(),
        message: e.to_string(),
    })?;
    Ok(message)
}
