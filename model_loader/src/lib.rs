// model_loader/src/lib.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

//! # `model_loader`
//!
//! Чтение моделей Caffe без самого Caffe:
//!
//! - [`schema`]: компиляция `caffe.proto` во время выполнения и разбор текстовых
//!   (prototxt) и бинарных (caffemodel) сообщений;
//! - [`projector`]: проекция динамического сообщения в `serde_json::Value`;
//! - [`types`]: `ModelDescription` и `LayerSpec`;
//! - [`weights`]: `WeightBlobSet` с блобами весов;
//! - [`validation`]: проверки инвариантов описания;
//! - [`loader`]: чтение файлов с диска.

pub mod error;
pub mod loader;
pub mod projector;
pub mod schema;
pub mod types;
pub mod validation;
pub mod weights;

pub use error::ModelLoaderError;
pub use loader::ModelLoader;
pub use projector::project_message;
pub use schema::{CaffeSchema, SchemaCompiler};
pub use types::{InputDecl, LayerSpec, ModelDescription, Phase, PythonSpec};
pub use weights::{BlobRecord, LayerBlobs, WeightBlobSet};

// Реэкспорт для потребителей, которым нужны динамические сообщения.
pub use protobuf::MessageDyn;
