// model_loader/src/validation.rs

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    error::ModelLoaderError, // Кастомные ошибки
    types::ModelDescription, // Разобранное описание сети
};

/// Проверки разобранного описания сети.
///
/// Отделяет логику валидации от разбора: `ModelDescription` строится из сообщения,
/// затем проверяется здесь целиком.
pub struct DescriptionValidator;

impl DescriptionValidator {
    /// Проверяет инварианты описания.
    ///
    /// Ошибки:
    /// - пустое имя слоя;
    /// - повторяющиеся имена слоев.
    ///
    /// Слой без выходов не является ошибкой, о нем выводится предупреждение.
    ///
    /// # Errors
    /// `ModelLoaderError::InvalidDescription` со списком всех найденных нарушений.
    pub fn validate(description: &ModelDescription) -> Result<(), ModelLoaderError> {
        debug!("Валидация описания сети '{}' ({} слоев)", description.name, description.layers.len());
        let mut errors: Vec<String> = Vec::new(); // Собираем все ошибки валидации
        let mut seen: HashSet<&str> = HashSet::new();

        for (index, layer) in description.layers.iter().enumerate() {
            if layer.name.is_empty() {
                errors.push(format!("слой #{index} (тип '{}') не имеет имени", layer.type_name));
                continue;
            }
            if !seen.insert(layer.name.as_str()) {
                errors.push(format!("повторяющееся имя слоя: '{}'", layer.name));
            }
            if layer.output_names.is_empty() {
                warn!("Слой '{}' не объявляет ни одного выхода (top)", layer.name);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelLoaderError::InvalidDescription {
                message: errors.join("; "),
            })
        }
    }
}
