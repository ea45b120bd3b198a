// model_loader/src/types.rs

use std::fmt;

use protobuf::reflect::ReflectValueRef;
use protobuf::MessageDyn;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use utils_crate::config::PhaseSetting;

use crate::error::ModelLoaderError;
use crate::projector::project_field;
use crate::validation::DescriptionValidator;

/// Фаза сети Caffe (`caffe.Phase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// `TRAIN = 0`: модули работают в режиме обучения.
    Train,
    /// `TEST = 1`: режим инференса.
    Test,
}

impl Phase {
    /// Числовой код фазы в схеме.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Train => 0,
            Self::Test => 1,
        }
    }

    /// Режим обучения включен для любой фазы, кроме `TEST`.
    #[must_use]
    pub const fn is_training(self) -> bool {
        !matches!(self, Self::Test)
    }
}

impl From<PhaseSetting> for Phase {
    fn from(setting: PhaseSetting) -> Self {
        match setting {
            PhaseSetting::Train => Self::Train,
            PhaseSetting::Test => Self::Test,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "TRAIN"),
            Self::Test => write!(f, "TEST"),
        }
    }
}

/// Параметры Python-слоя (`python_param`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PythonSpec {
    /// Модуль, в котором определен слой.
    pub module: String,
    /// Имя класса слоя. Используется как эффективный тип при поиске в реестре.
    pub layer: String,
    /// Строка параметров, передаваемая слою как есть.
    pub param_str: String,
}

impl PythonSpec {
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Self {
            module: text("module"),
            layer: text("layer"),
            param_str: text("param_str"),
        }
    }
}

/// Объявленный вход сети (`input` + `input_shape` / `input_dim`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDecl {
    /// Имя переменной.
    pub name: String,
    /// Форма, если она объявлена.
    pub shape: Option<Vec<usize>>,
}

/// Описание одного слоя, как оно записано в prototxt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    /// Уникальное имя слоя.
    pub name: String,
    /// Тип слоя. Для устаревших `layers` это имя значения enum (`INNER_PRODUCT`).
    pub type_name: String,
    /// Имена входных переменных (`bottom`).
    pub input_names: Vec<String>,
    /// Имена выходных переменных (`top`).
    pub output_names: Vec<String>,
    /// Все установленные поля `*_param` в порядке номеров полей.
    pub params: Vec<(String, Value)>,
    /// Явные веса потерь (`loss_weight`).
    pub loss_weight: Vec<f32>,
    /// Параметры оптимизации для каждого блоба (`param`, спроецированные `ParamSpec`).
    pub optimization_params: Vec<Value>,
    /// Параметры Python-слоя, если они заданы.
    pub python: Option<PythonSpec>,
    /// Слой пришел из устаревшего поля `layers` (`V1LayerParameter`).
    pub legacy: bool,
}

impl LayerSpec {
    /// Тип, по которому ищется конструктор: для `Python` это `python_param.layer`.
    #[must_use]
    pub fn effective_type(&self) -> &str {
        match &self.python {
            Some(python) if self.type_name == "Python" => &python.layer,
            _ => &self.type_name,
        }
    }

    /// Первый установленный объект `*_param` или `{}`.
    #[must_use]
    pub fn primary_param(&self) -> Value {
        self.params
            .first()
            .map_or_else(|| Value::Object(Map::new()), |(_, value)| value.clone())
    }

    /// Значение конкретного поля `*_param` по имени.
    #[must_use]
    pub fn param(&self, field_name: &str) -> Option<&Value> {
        self.params.iter().find(|(name, _)| name == field_name).map(|(_, value)| value)
    }

    /// Строит описание слоя из сообщения `LayerParameter` или `V1LayerParameter`.
    ///
    /// Блобы весов (`blobs`) не проецируются, их читает `WeightBlobSet`.
    #[must_use]
    pub fn from_layer_message(layer: &dyn MessageDyn, legacy: bool) -> Self {
        let descriptor = layer.descriptor_dyn();
        let mut fields: Vec<_> = descriptor.fields().filter(|field| field.name() != "blobs").collect();
        fields.sort_by_key(|field| field.proto().number());

        let mut projected = Map::new();
        for field in &fields {
            if let Some(value) = project_field(layer, field) {
                projected.insert(field.name().to_string(), value);
            }
        }

        let params: Vec<(String, Value)> = projected
            .iter()
            .filter(|(name, _)| name.ends_with("_param"))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let optimization_params = if legacy {
            legacy_optimization_params(&projected)
        } else {
            projected
                .get("param")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        let spec = Self {
            name: string_field(&projected, "name"),
            type_name: type_name(layer).unwrap_or_default(),
            input_names: string_list(&projected, "bottom"),
            output_names: string_list(&projected, "top"),
            loss_weight: float_list(&projected, "loss_weight"),
            optimization_params,
            python: projected.get("python_param").map(PythonSpec::from_value),
            params,
            legacy,
        };
        debug!(
            "Слой '{}' типа '{}': {} вход(ов), {} выход(ов)",
            spec.name,
            spec.type_name,
            spec.input_names.len(),
            spec.output_names.len()
        );
        spec
    }
}

/// Разобранное описание сети. Неизменяемо после разбора.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ModelDescription {
    /// Имя сети (`name`).
    pub name: String,
    /// Объявленные входы сети.
    pub inputs: Vec<InputDecl>,
    /// Слои: сначала `layer`, затем устаревшие `layers`.
    pub layers: Vec<LayerSpec>,
}

impl ModelDescription {
    /// Строит описание из сообщения `NetParameter` и проверяет его инварианты.
    ///
    /// # Errors
    /// `ModelLoaderError::InvalidDescription`, если имена слоев не уникальны.
    pub fn from_net_message(net: &dyn MessageDyn) -> Result<Self, ModelLoaderError> {
        let descriptor = net.descriptor_dyn();
        let mut header = Map::new();
        for field_name in ["name", "input", "input_shape", "input_dim"] {
            if let Some(field) = descriptor.field_by_name(field_name) {
                if let Some(value) = project_field(net, &field) {
                    header.insert(field_name.to_string(), value);
                }
            }
        }

        let mut layers = Vec::new();
        for (field_name, legacy) in [("layer", false), ("layers", true)] {
            let Some(field) = descriptor.field_by_name(field_name) else {
                continue;
            };
            let repeated = field.get_repeated(net);
            for index in 0..repeated.len() {
                if let ReflectValueRef::Message(layer) = repeated.get(index) {
                    layers.push(LayerSpec::from_layer_message(&*layer, legacy));
                }
            }
        }

        let description = Self {
            name: string_field(&header, "name"),
            inputs: input_declarations(&header),
            layers,
        };
        DescriptionValidator::validate(&description)?;
        Ok(description)
    }

    /// Описание сети, вложенной в другое сообщение (например, `net_param` солвера).
    /// `None`, если поле не задано.
    ///
    /// # Errors
    /// Как у [`Self::from_net_message`].
    pub fn from_embedded_net(message: &dyn MessageDyn, field_name: &str) -> Result<Option<Self>, ModelLoaderError> {
        let Some(field) = message.descriptor_dyn().field_by_name(field_name) else {
            return Ok(None);
        };
        match field.get_singular(message) {
            Some(ReflectValueRef::Message(net)) => Self::from_net_message(&*net).map(Some),
            _ => Ok(None),
        }
    }

    /// Ищет слой по имени.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

fn type_name(layer: &dyn MessageDyn) -> Option<String> {
    let field = layer.descriptor_dyn().field_by_name("type")?;
    match field.get_singular(layer)? {
        ReflectValueRef::String(name) => Some(name.to_string()),
        ReflectValueRef::Enum(descriptor, number) => Some(
            descriptor
                .value_by_number(number)
                .map_or_else(|| number.to_string(), |value| value.name().to_string()),
        ),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation)]
fn float_list(object: &Map<String, Value>, key: &str) -> Vec<f32> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
        .unwrap_or_default()
}

fn usize_list(value: &Value) -> Vec<usize> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// `V1LayerParameter` хранит множители в `blobs_lr` / `weight_decay`;
/// приводим их к виду `ParamSpec`.
fn legacy_optimization_params(object: &Map<String, Value>) -> Vec<Value> {
    let lr = float_list(object, "blobs_lr");
    let decay = float_list(object, "weight_decay");
    (0..lr.len().max(decay.len()))
        .map(|i| {
            let mut spec = Map::new();
            if let Some(v) = lr.get(i) {
                spec.insert("lr_mult".to_string(), Value::from(f64::from(*v)));
            }
            if let Some(v) = decay.get(i) {
                spec.insert("decay_mult".to_string(), Value::from(f64::from(*v)));
            }
            Value::Object(spec)
        })
        .collect()
}

fn input_declarations(header: &Map<String, Value>) -> Vec<InputDecl> {
    let shapes: Vec<Vec<usize>> = header
        .get("input_shape")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|shape| shape.get("dim").map(usize_list).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();
    let flat_dims = header.get("input_dim").map(usize_list).unwrap_or_default();

    string_list(header, "input")
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let shape = shapes.get(i).cloned().or_else(|| {
                let chunk = flat_dims.get(i * 4..i * 4 + 4)?;
                Some(chunk.to_vec())
            });
            InputDecl { name, shape }
        })
        .collect()
}
