// inference_engine/src/lib.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

//! # `inference_engine`
//!
//! Исполняемый граф модели Caffe на Burn.
//!
//! - [`graph`]: построение [`Graph`] по `ModelDescription` и реестру слоев;
//! - [`scheduler`]: прямой проход по зависимостям переменных;
//! - [`binder`]: привязка весов из `.caffemodel`.

pub mod binder;
pub mod error;
pub mod graph;
pub mod scheduler;

pub use error::GraphError;
pub use graph::{BuildOptions, Graph, GraphNode};
pub use scheduler::Feed;
