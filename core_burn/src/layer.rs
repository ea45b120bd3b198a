// core_burn/src/layer.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! Общий интерфейс модуля графа и обертки над его параметрами.

use std::fmt;

use burn::{
    module::{Param, ParamId},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

use crate::{blob::Blob, error::LayerError};

/// Контекст одного прямого прохода.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForwardContext {
    /// Режим обучения (фаза `TRAIN`): влияет на дропаут.
    pub training: bool,
}

/// Вид модуля, как он был построен реестром.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Параметры (если есть) известны при построении.
    Materialized,
    /// Параметры создаются при первом прямом проходе.
    Lazy,
    /// Функция без состояния.
    Function,
    /// Пользовательский внешний слой.
    External,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Materialized => "materialized",
            Self::Lazy => "lazy",
            Self::Function => "function",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Обучаемый параметр модуля одного из поддерживаемых рангов.
#[derive(Debug, Clone)]
pub enum Parameter<B: Backend> {
    /// Смещение `[out]`.
    R1(Param<Tensor<B, 1>>),
    /// Веса полносвязного слоя `[out, in]`.
    R2(Param<Tensor<B, 2>>),
    /// Веса свертки `[out, in, kh, kw]`.
    R4(Param<Tensor<B, 4>>),
}

impl<B: Backend> Parameter<B> {
    /// Идентификатор параметра (стабилен при обновлении значения).
    #[must_use]
    pub fn id(&self) -> ParamId {
        match self {
            Self::R1(p) => p.id,
            Self::R2(p) => p.id,
            Self::R4(p) => p.id,
        }
    }

    /// Текущее значение параметра.
    #[must_use]
    pub fn value(&self) -> Blob<B> {
        match self {
            Self::R1(p) => Blob::R1(p.val()),
            Self::R2(p) => Blob::R2(p.val()),
            Self::R4(p) => Blob::R4(p.val()),
        }
    }

    /// Размеры параметра.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        self.value().dims()
    }

    /// Новый параметр с тем же идентификатором и значением `value`.
    ///
    /// # Errors
    /// `LayerError::RankMismatch` / `ShapeMismatch`, если значение другой формы.
    pub fn with_value(&self, value: Blob<B>) -> Result<Self, LayerError> {
        let (before, after) = (self.dims(), value.dims());
        if before != after {
            return Err(LayerError::ShapeMismatch(format!(
                "параметр {before:?} нельзя заменить значением {after:?}"
            )));
        }
        let id = self.id();
        match (self, value) {
            (Self::R1(_), Blob::R1(t)) => Ok(Self::R1(Param::initialized(id, t.require_grad()))),
            (Self::R2(_), Blob::R2(t)) => Ok(Self::R2(Param::initialized(id, t.require_grad()))),
            (Self::R4(_), Blob::R4(t)) => Ok(Self::R4(Param::initialized(id, t.require_grad()))),
            (_, other) => Err(LayerError::RankMismatch {
                expected: before.len(),
                actual: other.rank(),
            }),
        }
    }
}

impl<B: AutodiffBackend> Parameter<B> {
    /// Градиент параметра после `backward`.
    #[must_use]
    pub fn grad(&self, grads: &B::Gradients) -> Option<Blob<B::InnerBackend>> {
        self.value().grad(grads)
    }
}

/// Связь между рангом тензора и вариантом [`Parameter`].
pub trait ParameterRank<B: Backend>: burn::module::Parameter {
    /// Оборачивает параметр в [`Parameter`].
    fn wrap(param: Param<Self>) -> Parameter<B>;

    /// Извлекает параметр нужного ранга.
    fn unwrap(parameter: Parameter<B>) -> Option<Param<Self>>;
}

macro_rules! parameter_rank {
    ($rank:literal, $variant:ident) => {
        impl<B: Backend> ParameterRank<B> for Tensor<B, $rank> {
            fn wrap(param: Param<Self>) -> Parameter<B> {
                Parameter::$variant(param)
            }

            fn unwrap(parameter: Parameter<B>) -> Option<Param<Self>> {
                match parameter {
                    Parameter::$variant(param) => Some(param),
                    _ => None,
                }
            }
        }
    };
}

parameter_rank!(1, R1);
parameter_rank!(2, R2);
parameter_rank!(4, R4);

/// Модуль графа: одна вычислительная единица с именованными параметрами.
///
/// Топология (имена входов и выходов) хранится в узле графа, а не в модуле.
pub trait Layer<B: Backend>: fmt::Debug {
    /// Вид модуля.
    fn kind(&self) -> LayerKind;

    /// Прямой проход. Входы идут в порядке `bottom`, выходы в порядке `top`.
    ///
    /// # Errors
    /// `LayerError` при несовместимых входах или сбое внешнего слоя.
    fn forward(&mut self, inputs: Vec<Blob<B>>, ctx: &ForwardContext) -> Result<Vec<Blob<B>>, LayerError>;

    /// Параметры модуля в порядке `[weight, bias]`. Пусто, если параметров нет
    /// или они еще не материализованы.
    fn parameters(&self) -> Vec<(&'static str, Parameter<B>)> {
        Vec::new()
    }

    /// Заменяет параметр по имени (используется оптимизатором).
    ///
    /// # Errors
    /// `LayerError::UnsupportedBinding`, если такого параметра нет.
    fn set_parameter(&mut self, name: &str, _value: Parameter<B>) -> Result<(), LayerError> {
        Err(LayerError::UnsupportedBinding {
            kind: format!("{} ({name})", self.kind()),
        })
    }

    /// Привязывает сериализованные веса: только переданные значения.
    ///
    /// # Errors
    /// По умолчанию `LayerError::UnsupportedBinding`.
    fn set_parameters(&mut self, _weight: Option<Blob<B>>, _bias: Option<Blob<B>>) -> Result<(), LayerError> {
        Err(LayerError::UnsupportedBinding {
            kind: self.kind().to_string(),
        })
    }
}
