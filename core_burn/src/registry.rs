// core_burn/src/registry.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Реестр конструкторов слоев.
//!
//! Ключ это нормализованное имя типа: верхний регистр, без `_`
//! (`InnerProduct`, `INNER_PRODUCT` и `inner_product` совпадают). Так же
//! находятся и типы устаревшего формата `layers`, заданные перечислением.

use std::collections::HashMap;

use burn::tensor::backend::Backend;
use serde_json::Value;

use crate::{
    error::LayerError,
    external::ExternalLayer,
    layer::Layer,
    layers::{
        eltwise_fn, Convolution, ConvolutionOp, DropoutLayer, ForwardFn, InnerProduct, InnerProductOp, PoolingLayer,
        ReluLayer, SoftmaxLayer,
    },
};

/// Результат конструктора.
pub enum Built<B: Backend> {
    /// Модуль (материализованный или ленивый).
    Module(Box<dyn Layer<B>>),
    /// Функция без состояния.
    Function(ForwardFn<B>),
    /// Внешний слой; адаптер создает построитель графа.
    External(Box<dyn ExternalLayer>),
}

/// Конструктор: спроецированные параметры и устройство.
pub type Constructor<B> = Box<dyn Fn(&Value, &<B as Backend>::Device) -> Result<Built<B>, LayerError>>;

/// Отображение нормализованных имен типов на конструкторы.
pub struct LayerRegistry<B: Backend> {
    constructors: HashMap<String, Constructor<B>>,
}

/// Нормализует имя типа: верхний регистр, без `_`.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars().filter(|c| *c != '_').flat_map(char::to_uppercase).collect()
}

impl<B: Backend> LayerRegistry<B> {
    /// Пустой реестр.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Реестр с операторами по умолчанию.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("Convolution", |params, device| {
            Ok(Built::Module(Box::new(Convolution::<B>::new(
                ConvolutionOp::from_params(params)?,
                device,
            ))))
        });
        registry.register("InnerProduct", |params, device| {
            Ok(Built::Module(Box::new(InnerProduct::<B>::new(
                InnerProductOp::from_params(params)?,
                device,
            ))))
        });
        registry.register("Pooling", |params, _| {
            Ok(Built::Module(Box::new(PoolingLayer::from_params(params)?)))
        });
        registry.register("Softmax", |params, _| {
            Ok(Built::Module(Box::new(SoftmaxLayer::from_params(params)?)))
        });
        registry.register("ReLU", |params, _| Ok(Built::Module(Box::new(ReluLayer::from_params(params)?))));
        registry.register("Dropout", |params, _| {
            Ok(Built::Module(Box::new(DropoutLayer::from_params(params)?)))
        });
        registry.register("Eltwise", |params, _| Ok(Built::Function(eltwise_fn::<B>(params)?)));
        registry
    }

    /// Регистрирует (или заменяет) конструктор.
    pub fn register<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Built<B>, LayerError> + 'static,
    {
        self.constructors.insert(normalize(type_name), Box::new(constructor));
    }

    /// Регистрирует фабрику внешнего слоя.
    pub fn register_external<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn ExternalLayer>, LayerError> + 'static,
    {
        self.register(type_name, move |params, _| Ok(Built::External(factory(params)?)));
    }

    /// Конструктор по типу слоя, затем по имени слоя.
    #[must_use]
    pub fn lookup(&self, type_name: &str, layer_name: &str) -> Option<&Constructor<B>> {
        self.constructors
            .get(&normalize(type_name))
            .or_else(|| self.constructors.get(&normalize(layer_name)))
    }

    /// Зарегистрирован ли тип.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(&normalize(type_name))
    }

    /// Число зарегистрированных типов.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Пуст ли реестр.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl<B: Backend> Default for LayerRegistry<B> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
