// model_loader/src/loader.rs

use std::path::Path;

use protobuf::MessageDyn;
use tracing::info; // Для логирования

use crate::{
    error::ModelLoaderError, // Кастомные ошибки загрузчика
    schema::CaffeSchema,     // Скомпилированная схема
    types::ModelDescription, // Разобранное описание сети
    weights::WeightBlobSet,  // Блобы весов
};

/// Загрузчик файлов модели Caffe с диска.
///
/// Каждый файл читается целиком один раз; разбор делегируется [`CaffeSchema`].
#[derive(Debug, Clone, Copy)]
pub struct ModelLoader;

impl ModelLoader {
    /// Читает и разбирает описание сети (prototxt).
    ///
    /// # Errors
    /// `ModelLoaderError::Io` при ошибке чтения, `TextParse` при ошибке разбора,
    /// `InvalidDescription` при нарушении инвариантов.
    pub fn load_description(schema: &CaffeSchema, path: &Path) -> Result<ModelDescription, ModelLoaderError> {
        info!("Загрузка описания сети из: {:?}", path);
        let text = Self::read_text(path)?;
        let net = schema.parse_net_text(&text)?;
        let description = ModelDescription::from_net_message(&*net)?;
        info!(
            "Описание сети '{}' загружено: {} слоев",
            description.name,
            description.layers.len()
        );
        Ok(description)
    }

    /// Читает и разбирает бинарные веса (caffemodel).
    ///
    /// # Errors
    /// `ModelLoaderError::Io` при ошибке чтения, `BinaryParse` при ошибке разбора.
    pub fn load_weights(schema: &CaffeSchema, path: &Path) -> Result<WeightBlobSet, ModelLoaderError> {
        info!("Загрузка весов из: {:?}", path);
        let bytes = std::fs::read(path).map_err(|e| ModelLoaderError::io(path, e))?;
        WeightBlobSet::from_caffemodel(schema, &bytes)
    }

    /// Читает и разбирает параметры солвера (solver.prototxt).
    ///
    /// # Errors
    /// `ModelLoaderError::Io` при ошибке чтения, `TextParse` при ошибке разбора.
    pub fn load_solver(schema: &CaffeSchema, path: &Path) -> Result<Box<dyn MessageDyn>, ModelLoaderError> {
        info!("Загрузка параметров солвера из: {:?}", path);
        let text = Self::read_text(path)?;
        schema.parse_solver_text(&text)
    }

    /// Читает текстовый файл целиком.
    ///
    /// # Errors
    /// `ModelLoaderError::Io` с путем к файлу.
    pub fn read_text(path: &Path) -> Result<String, ModelLoaderError> {
        std::fs::read_to_string(path).map_err(|e| ModelLoaderError::io(path, e))
    }
}
