// core_burn/src/lib.rs

// Включаем строгие правила линтинга для всего крейта.
#![warn(
    missing_docs, // Предупреждать об отсутствующей документации для публичных элементов.
    clippy::all, // Все стандартные проверки Clippy.
    clippy::pedantic, // Более строгие ("педантичные") проверки Clippy.
    clippy::nursery // Экспериментальные проверки Clippy (могут быть нестабильны).
)]
// Запрещаем использование небезопасных конструкций и потенциально проблемных методов.
#![deny(
    unsafe_code, // Запрет `unsafe` блоков без явного `allow`.
    clippy::unwrap_used, // Запрет использования `.unwrap()`.
    clippy::expect_used // Запрет использования `.expect()`.
)]

//! # `core_burn`
//!
//! Слои Caffe поверх фреймворка [Burn](https://burn.dev/): вычислительные модули,
//! из которых `inference_engine` собирает исполняемый граф.
//!
//! ## Назначение
//!
//! Крейт не знает о формате protobuf. Он получает параметры слоя уже спроецированными
//! в `serde_json::Value` и строит по ним модуль через [`LayerRegistry`].
//!
//! ## Структура
//!
//! - `blob`: тензор динамического ранга [`Blob`], значение переменной графа.
//! - `layer`: трейт [`Layer`] и обертка параметров [`Parameter`].
//! - `lazy`: ленивые модули, веса которых создаются по форме первого входа.
//! - `layers`: операторы по умолчанию (свертка, полносвязный слой, пулинг, softmax,
//!   ReLU, дропаут, eltwise).
//! - `external`: адаптер пользовательских внешних слоев.
//! - `filler`, `params`: инициализаторы и типизированные параметры.
//! - `registry`: отображение типов слоев на конструкторы.
//! - `error`: ошибки крейта.

// Объявляем публичные модули, входящие в состав крейта.
pub mod blob;
pub mod error;
pub mod external;
pub mod filler;
pub mod layer;
pub mod layers;
pub mod lazy;
pub mod params;
pub mod registry;

// Реэкспортируем наиболее важные и часто используемые элементы.

// Ошибки
pub use error::LayerError;

// Значения и модули
pub use blob::Blob;
pub use layer::{ForwardContext, Layer, LayerKind, Parameter, ParameterRank};
pub use lazy::{DeferredOp, LazyLayer, LazyState};

// Внешние слои
pub use external::{AdapterState, BlobBuffer, ExternalLayer, ExternalLayerAdapter};

// Операторы и реестр
pub use filler::FillerSpec;
pub use layers::{ForwardFn, FunctionLayer};
pub use registry::{normalize, Built, Constructor, LayerRegistry};
