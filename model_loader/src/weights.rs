// model_loader/src/weights.rs

//! Чтение блобов весов из бинарного `NetParameter` (`.caffemodel`).
//!
//! Блобы читаются напрямую через рефлексию, без проекции в JSON: массивы весов
//! могут содержать миллионы элементов.

use protobuf::reflect::{ReflectValueRef, RuntimeFieldType};
use protobuf::MessageDyn;
use tracing::{debug, info};

use crate::error::ModelLoaderError;
use crate::schema::CaffeSchema;

/// Один сериализованный блоб: форма и данные в порядке row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRecord {
    /// Форма: `shape.dim` или устаревшие `[num, channels, height, width]`.
    pub shape: Vec<usize>,
    /// Значения `data` (или `double_data`, приведенные к `f32`).
    pub data: Vec<f32>,
}

impl BlobRecord {
    /// Число элементов, которое подразумевает форма.
    #[must_use]
    pub fn shape_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Форма согласована с длиной данных.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.shape_elements() == self.data.len()
    }
}

/// Блобы одного слоя в порядке сериализации.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerBlobs {
    /// Имя слоя.
    pub name: String,
    /// Блобы (обычно `[weight, bias]`).
    pub blobs: Vec<BlobRecord>,
}

/// Все блобы весов, прочитанные из бинарного артефакта.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightBlobSet {
    layers: Vec<LayerBlobs>,
}

impl WeightBlobSet {
    /// Разбирает байты `.caffemodel`.
    ///
    /// # Errors
    /// `ModelLoaderError::BinaryParse`, если байты не разбираются как `NetParameter`,
    /// `ModelLoaderError::InvalidDescription` при отрицательной размерности блоба.
    pub fn from_caffemodel(schema: &CaffeSchema, bytes: &[u8]) -> Result<Self, ModelLoaderError> {
        let net = schema.parse_net_binary(bytes)?;
        let set = Self::from_net_message(&*net)?;
        info!(
            "Прочитано {} слоев с {} блобами весов ({} байт)",
            set.layers.len(),
            set.layers.iter().map(|layer| layer.blobs.len()).sum::<usize>(),
            bytes.len()
        );
        Ok(set)
    }

    /// Собирает блобы из уже разобранного `NetParameter` (`layer`, затем `layers`).
    ///
    /// # Errors
    /// `ModelLoaderError::InvalidDescription` при отрицательной размерности блоба.
    pub fn from_net_message(net: &dyn MessageDyn) -> Result<Self, ModelLoaderError> {
        let mut layers = Vec::new();
        for layer in repeated_messages(net, "layer").chain(repeated_messages(net, "layers")) {
            let name = string_value(&*layer, "name");
            let blobs = repeated_messages(&*layer, "blobs")
                .map(|blob| blob_record(&name, &*blob))
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Слой '{}': {} блоб(ов)", name, blobs.len());
            layers.push(LayerBlobs { name, blobs });
        }
        Ok(Self { layers })
    }

    /// Блобы слоя по имени (первое совпадение).
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&[BlobRecord]> {
        self.layers
            .iter()
            .find(|layer| layer.name == name)
            .map(|layer| layer.blobs.as_slice())
    }

    /// Все слои в порядке сериализации.
    pub fn layers(&self) -> impl Iterator<Item = &LayerBlobs> {
        self.layers.iter()
    }

    /// Количество слоев.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Нет ни одного слоя.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl FromIterator<LayerBlobs> for WeightBlobSet {
    fn from_iter<I: IntoIterator<Item = LayerBlobs>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

fn blob_record(layer_name: &str, blob: &dyn MessageDyn) -> Result<BlobRecord, ModelLoaderError> {
    let mut data: Vec<f32> = repeated_values(blob, "data")
        .filter_map(|value| match value {
            ReflectValueRef::F32(v) => Some(v),
            _ => None,
        })
        .collect();
    if data.is_empty() {
        #[allow(clippy::cast_possible_truncation)]
        data.extend(repeated_values(blob, "double_data").filter_map(|value| match value {
            ReflectValueRef::F64(v) => Some(v as f32),
            _ => None,
        }));
    }

    let dims = shape_dims(blob);
    let shape = if dims.is_empty() {
        legacy_shape(blob, data.len())
    } else {
        dims.into_iter()
            .map(|dim| {
                usize::try_from(dim).map_err(|_| ModelLoaderError::InvalidDescription {
                    message: format!("отрицательная размерность {dim} в блобе слоя '{layer_name}'"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(BlobRecord { shape, data })
}

fn shape_dims(blob: &dyn MessageDyn) -> Vec<i64> {
    let Some(field) = blob.descriptor_dyn().field_by_name("shape") else {
        return Vec::new();
    };
    match field.get_singular(blob) {
        Some(ReflectValueRef::Message(shape)) => repeated_values(&*shape, "dim")
            .filter_map(|value| match value {
                ReflectValueRef::I64(v) => Some(v),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `[num, channels, height, width]`; если ни одно из полей не задано, блоб считается
/// одномерным длины `len`.
fn legacy_shape(blob: &dyn MessageDyn, len: usize) -> Vec<usize> {
    let descriptor = blob.descriptor_dyn();
    let dims: Vec<Option<i32>> = ["num", "channels", "height", "width"]
        .iter()
        .map(|name| {
            descriptor
                .field_by_name(name)
                .and_then(|field| field.get_singular(blob))
                .and_then(|value| match value {
                    ReflectValueRef::I32(v) => Some(v),
                    _ => None,
                })
        })
        .collect();
    if dims.iter().all(Option::is_none) {
        return vec![len];
    }
    dims.into_iter()
        .map(|dim| dim.and_then(|v| usize::try_from(v).ok()).unwrap_or(0))
        .collect()
}

fn string_value(message: &dyn MessageDyn, name: &str) -> String {
    message
        .descriptor_dyn()
        .field_by_name(name)
        .and_then(|field| field.get_singular(message))
        .and_then(|value| match value {
            ReflectValueRef::String(s) => Some(s.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn repeated_values<'a>(message: &'a dyn MessageDyn, name: &str) -> impl Iterator<Item = ReflectValueRef<'a>> + 'a {
    let repeated = message
        .descriptor_dyn()
        .field_by_name(name)
        .filter(|field| matches!(field.runtime_field_type(), RuntimeFieldType::Repeated(_)))
        .map(|field| field.get_repeated(message));
    repeated
        .into_iter()
        .flat_map(|repeated| (0..repeated.len()).map(move |i| repeated.get(i)))
}

fn repeated_messages<'a>(
    message: &'a dyn MessageDyn,
    name: &str,
) -> impl Iterator<Item = protobuf::reflect::MessageRef<'a>> + 'a {
    repeated_values(message, name).filter_map(|value| match value {
        ReflectValueRef::Message(nested) => Some(nested),
        _ => None,
    })
}
