// core_burn/src/lazy.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Ленивый модуль: параметры создаются при первом прямом проходе.
//!
//! Caffe не хранит число входных каналов в описании слоя, оно известно только
//! по форме входа. `LazyLayer` откладывает создание весов до первого вызова
//! `forward` (или до явной привязки весов) и после этого форму больше не выводит.

use std::fmt;

use burn::{
    module::Param,
    tensor::{backend::Backend, Tensor},
};
use tracing::debug;

use crate::{
    blob::Blob,
    error::LayerError,
    filler::{fill, FillerSpec},
    layer::{ForwardContext, Layer, LayerKind, Parameter, ParameterRank},
};

/// Состояние ленивого модуля.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    /// Веса еще не созданы.
    Uninitialized,
    /// Веса созданы; `input_dim` зафиксирован.
    Materialized {
        /// Входные каналы (свертка) или число признаков (полносвязный слой).
        input_dim: usize,
    },
}

/// Оператор, параметры которого зависят от формы первого входа.
///
/// `D` это ранг тензора весов.
pub trait DeferredOp<B: Backend, const D: usize>: fmt::Debug {
    /// Имя типа слоя для сообщений об ошибках.
    fn layer_type(&self) -> &'static str;

    /// Выводит `input_dim` из размеров входа.
    ///
    /// # Errors
    /// `LayerError::RankMismatch`, если вход не подходит оператору.
    fn infer_input_dim(&self, input_dims: &[usize]) -> Result<usize, LayerError>;

    /// Форма весов для данного `input_dim`.
    fn weight_shape(&self, input_dim: usize) -> [usize; D];

    /// Число выходов (длина смещения).
    fn num_output(&self) -> usize;

    /// Создавать ли смещение.
    fn bias_term(&self) -> bool;

    /// Инициализатор весов.
    fn weight_filler(&self) -> Option<&FillerSpec>;

    /// Инициализатор смещения.
    fn bias_filler(&self) -> Option<&FillerSpec>;

    /// Приводит сериализованный блоб весов к рангу `D`.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch` / `RankMismatch`, если блоб не приводится.
    fn reshape_weight(&self, weight: Blob<B>) -> Result<Tensor<B, D>, LayerError>;

    /// `input_dim`, записанный в форме весов.
    fn input_dim_of(&self, weight_dims: [usize; D]) -> usize;

    /// Вычисление.
    ///
    /// # Errors
    /// `LayerError` при несовместимой форме входа.
    fn apply(&self, input: Blob<B>, weight: Tensor<B, D>, bias: Option<Tensor<B, 1>>) -> Result<Blob<B>, LayerError>;
}

/// Ленивый модуль над оператором `Op`.
pub struct LazyLayer<B: Backend, Op: DeferredOp<B, D>, const D: usize> {
    op: Op,
    state: LazyState,
    weight: Option<Param<Tensor<B, D>>>,
    bias: Option<Param<Tensor<B, 1>>>,
    device: B::Device,
}

impl<B: Backend, Op: DeferredOp<B, D>, const D: usize> fmt::Debug for LazyLayer<B, Op, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLayer")
            .field("op", &self.op)
            .field("state", &self.state)
            .field("has_weight", &self.weight.is_some())
            .field("has_bias", &self.bias.is_some())
            .finish()
    }
}

impl<B: Backend, Op: DeferredOp<B, D>, const D: usize> LazyLayer<B, Op, D>
where
    Tensor<B, D>: ParameterRank<B>,
{
    /// Новый модуль в состоянии `Uninitialized`.
    pub fn new(op: Op, device: &B::Device) -> Self {
        Self {
            op,
            state: LazyState::Uninitialized,
            weight: None,
            bias: None,
            device: device.clone(),
        }
    }

    /// Текущее состояние.
    pub const fn state(&self) -> LazyState {
        self.state
    }

    /// Оператор.
    pub const fn op(&self) -> &Op {
        &self.op
    }

    /// Создает недостающие параметры для `input_dim`.
    /// Уже привязанное смещение сохраняется.
    fn materialize(&mut self, input_dim: usize) {
        let shape = self.op.weight_shape(input_dim);
        let receptive: usize = shape.iter().skip(2).product();
        let fan_in = shape.get(1).copied().unwrap_or(1) * receptive;
        let fan_out = self.op.num_output() * receptive;

        if self.weight.is_none() {
            self.weight = Some(fill(self.op.weight_filler(), shape, fan_in, fan_out, &self.device));
        }
        if self.bias.is_none() && self.op.bias_term() {
            self.bias = Some(fill(
                self.op.bias_filler(),
                [self.op.num_output()],
                fan_in,
                fan_out,
                &self.device,
            ));
        }
        self.state = LazyState::Materialized { input_dim };
        debug!(
            "{}: параметры материализованы, input_dim = {}, веса {:?}",
            self.op.layer_type(),
            input_dim,
            shape
        );
    }
}

impl<B: Backend, Op: DeferredOp<B, D>, const D: usize> Layer<B> for LazyLayer<B, Op, D>
where
    Tensor<B, D>: ParameterRank<B>,
{
    fn kind(&self) -> LayerKind {
        LayerKind::Lazy
    }

    fn forward(&mut self, inputs: Vec<Blob<B>>, _ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError> {
        let actual = inputs.len();
        let Some(input) = inputs.into_iter().next() else {
            return Err(LayerError::InputCount { expected: 1, actual });
        };
        if self.state == LazyState::Uninitialized {
            let input_dim = self.op.infer_input_dim(&input.dims())?;
            self.materialize(input_dim);
        }
        let weight = self
            .weight
            .as_ref()
            .map(Param::val)
            .ok_or_else(|| LayerError::invalid_params(self.op.layer_type(), "веса не материализованы"))?;
        let bias = self.bias.as_ref().map(Param::val);
        Ok(vec![self.op.apply(input, weight, bias)?])
    }

    fn parameters(&self) -> Vec<(&'static str, Parameter<B>)> {
        let mut parameters = Vec::with_capacity(2);
        if let Some(weight) = &self.weight {
            parameters.push(("weight", <Tensor<B, D> as ParameterRank<B>>::wrap(weight.clone())));
        }
        if let Some(bias) = &self.bias {
            parameters.push(("bias", Parameter::R1(bias.clone())));
        }
        parameters
    }

    fn set_parameter(&mut self, name: &str, value: Parameter<B>) -> Result<(), LayerError> {
        let actual = value.dims().len();
        match name {
            "weight" => {
                self.weight = Some(
                    <Tensor<B, D> as ParameterRank<B>>::unwrap(value)
                        .ok_or(LayerError::RankMismatch { expected: D, actual })?,
                );
            }
            "bias" => match value {
                Parameter::R1(param) => self.bias = Some(param),
                _ => return Err(LayerError::RankMismatch { expected: 1, actual }),
            },
            other => {
                return Err(LayerError::UnsupportedBinding {
                    kind: format!("{} ({other})", self.op.layer_type()),
                })
            }
        }
        Ok(())
    }

    fn set_parameters(&mut self, weight: Option<Blob<B>>, bias: Option<Blob<B>>) -> Result<(), LayerError> {
        if let Some(weight) = weight {
            let tensor = self.op.reshape_weight(weight)?;
            let input_dim = self.op.input_dim_of(tensor.dims());
            self.weight = Some(Param::from_tensor(tensor));
            self.state = LazyState::Materialized { input_dim };
        }
        if let Some(bias) = bias {
            let len = bias.num_elements();
            self.bias = Some(Param::<Tensor<B, 1>>::from_tensor(bias.reshape::<1>([len])?));
        }
        debug!("{}: параметры привязаны, состояние {:?}", self.op.layer_type(), self.state);
        Ok(())
    }
}
