// core_burn/src/external.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Внешние слои (`type: "Python"` в описании модели).
//!
//! Пользовательская реализация [`ExternalLayer`] работает с плоскими буферами
//! на хосте, как слои Caffe с `setup`/`forward`. [`ExternalLayerAdapter`]
//! переносит тензоры в буферы и обратно и вызывает `setup` ровно один раз,
//! перед первым `forward`. Градиенты через внешний слой не распространяются.

use std::fmt;

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::{
    blob::Blob,
    error::LayerError,
    layer::{ForwardContext, Layer, LayerKind},
};

/// Буфер блоба на хосте: форма и плоские данные `f32`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobBuffer {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl BlobBuffer {
    /// Буфер с данными.
    #[must_use]
    pub const fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Форма. Пустая форма у выхода означает "одномерный по длине данных".
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Данные.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Задает форму выхода (аналог `top[i].reshape(...)`).
    pub fn reshape(&mut self, shape: &[usize]) {
        self.shape = shape.to_vec();
    }

    /// Записывает данные выхода.
    pub fn set_data(&mut self, data: Vec<f32>) {
        self.data = data;
    }

    fn effective_shape(&self) -> Vec<usize> {
        if self.shape.is_empty() {
            vec![self.data.len()]
        } else {
            self.shape.clone()
        }
    }
}

/// Слой, реализованный пользователем.
pub trait ExternalLayer: fmt::Debug {
    /// Строка параметров слоя (`python_param.param_str`).
    ///
    /// # Errors
    /// `LayerError::External`, если строку не удалось разобрать.
    fn set_param_str(&mut self, _param_str: &str) -> Result<(), LayerError> {
        Ok(())
    }

    /// Однократная настройка по первым входам.
    ///
    /// # Errors
    /// `LayerError::External` при несовместимых входах.
    fn setup(&mut self, bottom: &[BlobBuffer], top: &mut [BlobBuffer]) -> Result<(), LayerError>;

    /// Прямой проход: заполняет `top` (форма и данные).
    ///
    /// # Errors
    /// `LayerError::External` при сбое вычисления.
    fn forward(&mut self, bottom: &[BlobBuffer], top: &mut [BlobBuffer]) -> Result<(), LayerError>;
}

/// Состояние адаптера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// `setup` еще не вызывался.
    NotSetup,
    /// `setup` выполнен.
    Ready,
}

/// Модуль графа над внешним слоем.
pub struct ExternalLayerAdapter<B: Backend> {
    layer: Box<dyn ExternalLayer>,
    state: AdapterState,
    output_count: usize,
    device: B::Device,
}

impl<B: Backend> fmt::Debug for ExternalLayerAdapter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalLayerAdapter")
            .field("layer", &self.layer)
            .field("state", &self.state)
            .field("output_count", &self.output_count)
            .finish()
    }
}

impl<B: Backend> ExternalLayerAdapter<B> {
    /// Передает слою `param_str` и фиксирует число выходов.
    ///
    /// # Errors
    /// Ошибка `set_param_str` внешнего слоя.
    pub fn new(
        mut layer: Box<dyn ExternalLayer>,
        param_str: &str,
        output_count: usize,
        device: &B::Device,
    ) -> Result<Self, LayerError> {
        layer.set_param_str(param_str)?;
        Ok(Self {
            layer,
            state: AdapterState::NotSetup,
            output_count,
            device: device.clone(),
        })
    }

    /// Текущее состояние.
    #[must_use]
    pub const fn state(&self) -> AdapterState {
        self.state
    }
}

impl<B: Backend> Layer<B> for ExternalLayerAdapter<B> {
    fn kind(&self) -> LayerKind {
        LayerKind::External
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let bottom = inputs
            .iter()
            .map(|blob| Ok(BlobBuffer::new(blob.dims(), blob.to_f32_vec()?)))
            .collect::<Result<Vec<_>, LayerError>>()?;
        let mut top = vec![BlobBuffer::default(); self.output_count];

        if self.state == AdapterState::NotSetup {
            self.layer.setup(&bottom, &mut top)?;
            self.state = AdapterState::Ready;
            debug!("Внешний слой {:?} настроен, выходов: {}", self.layer, self.output_count);
        }
        self.layer.forward(&bottom, &mut top)?;

        top.into_iter()
            .map(|buffer| {
                let shape = buffer.effective_shape();
                Blob::from_shape_data(&shape, buffer.data, &self.device)
            })
            .collect()
    }
}
