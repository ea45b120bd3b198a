// core_burn/src/layers/function.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Обертка над функцией без состояния.

use std::fmt;

use burn::tensor::backend::Backend;

use crate::{
    blob::Blob,
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
};

/// Прямой проход без параметров: входы в порядке `bottom`, выходы в порядке `top`.
pub type ForwardFn<B> = Box<dyn Fn(Vec<Blob<B>>) -> Result<Vec<Blob<B>>, LayerError>>;

/// Модуль, делегирующий прямой проход функции.
pub struct FunctionLayer<B: Backend> {
    name: String,
    function: ForwardFn<B>,
}

impl<B: Backend> FunctionLayer<B> {
    /// Оборачивает функцию; `name` используется только в отладочном выводе.
    pub fn new(name: impl Into<String>, function: ForwardFn<B>) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl<B: Backend> fmt::Debug for FunctionLayer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLayer").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<B: Backend> Layer<B> for FunctionLayer<B> {
    fn kind(&self) -> LayerKind {
        LayerKind::Function
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        (self.function)(inputs)
    }
}
