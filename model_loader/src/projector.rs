// model_loader/src/projector.rs

//! Проекция динамического protobuf-сообщения в дерево `serde_json::Value`.
//!
//! Правила:
//! - выводятся только установленные поля (singular присутствует, repeated не пуст),
//!   в порядке номеров полей;
//! - repeated превращается в массив, вложенное сообщение обрабатывается рекурсивно;
//! - enum превращается в свой числовой код, bytes в ASCII-экранированную строку;
//! - нечисловые `float`/`double` (NaN, бесконечность) становятся `null`;
//! - map-поля и неизвестные поля пропускаются.

use protobuf::reflect::{FieldDescriptor, ReflectValueRef, RuntimeFieldType};
use protobuf::MessageDyn;
use serde_json::{Map, Number, Value};

/// Проецирует сообщение в JSON-объект. Пустое сообщение дает `{}`.
#[must_use]
pub fn project_message(message: &dyn MessageDyn) -> Value {
    let descriptor = message.descriptor_dyn();
    let mut fields: Vec<FieldDescriptor> = descriptor.fields().collect();
    fields.sort_by_key(|field| field.proto().number());

    let mut object = Map::new();
    for field in fields {
        if let Some(value) = project_field(message, &field) {
            object.insert(field.name().to_string(), value);
        }
    }
    Value::Object(object)
}

/// Проецирует одно поле, если оно установлено.
#[must_use]
pub fn project_field(message: &dyn MessageDyn, field: &FieldDescriptor) -> Option<Value> {
    match field.runtime_field_type() {
        RuntimeFieldType::Singular(_) => field.get_singular(message).map(project_value),
        RuntimeFieldType::Repeated(_) => {
            let repeated = field.get_repeated(message);
            if repeated.is_empty() {
                return None;
            }
            Some(Value::Array((0..repeated.len()).map(|i| project_value(repeated.get(i))).collect()))
        }
        RuntimeFieldType::Map(..) => None,
    }
}

fn project_value(value: ReflectValueRef<'_>) -> Value {
    match value {
        ReflectValueRef::U32(v) => Value::from(v),
        ReflectValueRef::U64(v) => Value::from(v),
        ReflectValueRef::I32(v) => Value::from(v),
        ReflectValueRef::I64(v) => Value::from(v),
        ReflectValueRef::F32(v) => float_value(f64::from(v)),
        ReflectValueRef::F64(v) => float_value(v),
        ReflectValueRef::Bool(v) => Value::Bool(v),
        ReflectValueRef::String(v) => Value::String(v.to_string()),
        ReflectValueRef::Bytes(v) => Value::String(v.escape_ascii().to_string()),
        ReflectValueRef::Enum(_, number) => Value::from(number),
        ReflectValueRef::Message(nested) => project_message(&*nested),
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}
