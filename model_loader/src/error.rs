// model_loader/src/error.rs

use thiserror::Error; // Макрос для упрощенного создания типов ошибок

use utils_crate::error::UtilsError;

/// Кастомные типы ошибок для крейта `model_loader`.
///
/// Это перечисление инкапсулирует ошибки компиляции схемы `caffe.proto`,
/// файлового ввода/вывода и разбора текстовых и бинарных сообщений Caffe.
#[derive(Error, Debug)]
pub enum ModelLoaderError {
    /// Ошибка, указывающая на сбой в операциях файлового ввода/вывода.
    #[error("Ошибка ввода/вывода по пути '{path}': {source}")]
    Io {
        /// Путь к файлу, который вызвал ошибку ввода/вывода.
        path: String,
        /// Исходная ошибка `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// Компилятор схемы (`protobuf-parse` или `protoc`) не смог собрать `caffe.proto`.
    #[error("Не удалось скомпилировать схему '{path}': {message}")]
    SchemaCompilation {
        /// Путь к файлу схемы.
        path: String,
        /// Диагностика компилятора.
        message: String,
    },

    /// В скомпилированной схеме нет ожидаемого сообщения (например, `NetParameter`).
    #[error("Сообщение '{name}' не найдено в схеме")]
    MessageNotFound {
        /// Имя сообщения относительно пакета `caffe`.
        name: String,
    },

    /// Ошибка разбора текстового формата protobuf (prototxt).
    #[error("Не удалось разобрать текстовое сообщение '{message_type}': {message}")]
    TextParse {
        /// Тип разбираемого сообщения.
        message_type: String,
        /// Описание ошибки парсера.
        message: String,
    },

    /// Ошибка разбора бинарного формата protobuf (caffemodel).
    #[error("Не удалось разобрать бинарное сообщение '{message_type}': {message}")]
    BinaryParse {
        /// Тип разбираемого сообщения.
        message_type: String,
        /// Описание ошибки парсера.
        message: String,
    },

    /// Описание сети разобрано, но нарушает инварианты (например, дубликаты имен слоев).
    #[error("Невалидное описание модели: {message}")]
    InvalidDescription {
        /// Описательное сообщение о том, почему описание невалидно.
        message: String,
    },

    /// Ошибка, пришедшая из `utils_crate` (конфигурация).
    #[error("Ошибка утилит: {0}")]
    Utils(#[from] UtilsError),
}

impl ModelLoaderError {
    /// Вспомогательный конструктор для `ModelLoaderError::Io`.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
