// training_engine/src/lib.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

//! # `training_engine`
//!
//! Дообучение графа Caffe: SGD с моментом и регуляризацией, накопление
//! градиента по `iter_size` и политики скорости обучения Caffe.
//! Бэкенд должен поддерживать автодифференцирование (`Autodiff<_>`).

pub mod error;
pub mod lr_policy;
pub mod params;
pub mod solver;

pub use error::SolverError;
pub use lr_policy::LrPolicy;
pub use params::SolverParams;
pub use solver::SgdSolver;
