// core_burn/src/blob.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! `Blob`: тензор динамического ранга (1..=4), значение переменной графа.
//!
//! Ранг тензора в Burn задается на уровне типов, а ранг переменной Caffe
//! известен только во время выполнения. `Blob` хранит тензор нужного ранга
//! и предоставляет операции, которые не зависят от ранга.

use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor, TensorData,
};

use crate::error::LayerError;

/// Тензор ранга 1..=4.
#[derive(Debug, Clone)]
pub enum Blob<B: Backend> {
    /// Ранг 1 (например, смещение).
    R1(Tensor<B, 1>),
    /// Ранг 2 (выход полносвязного слоя `[N, C]`).
    R2(Tensor<B, 2>),
    /// Ранг 3.
    R3(Tensor<B, 3>),
    /// Ранг 4 (`[N, C, H, W]`).
    R4(Tensor<B, 4>),
}

/// Применяет выражение к тензору внутри `Blob`, сохраняя ранг.
macro_rules! map_blob {
    ($blob:expr, |$t:ident| $body:expr) => {
        match $blob {
            $crate::blob::Blob::R1($t) => $crate::blob::Blob::R1($body),
            $crate::blob::Blob::R2($t) => $crate::blob::Blob::R2($body),
            $crate::blob::Blob::R3($t) => $crate::blob::Blob::R3($body),
            $crate::blob::Blob::R4($t) => $crate::blob::Blob::R4($body),
        }
    };
}
pub(crate) use map_blob;

/// Поэлементная операция над двумя блобами одного ранга и формы.
macro_rules! zip_blob {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr) => {{
        let lhs = $lhs;
        let rhs = $rhs;
        $crate::blob::ensure_same_dims(&lhs, &rhs)?;
        match (lhs, rhs) {
            ($crate::blob::Blob::R1($a), $crate::blob::Blob::R1($b)) => Ok($crate::blob::Blob::R1($body)),
            ($crate::blob::Blob::R2($a), $crate::blob::Blob::R2($b)) => Ok($crate::blob::Blob::R2($body)),
            ($crate::blob::Blob::R3($a), $crate::blob::Blob::R3($b)) => Ok($crate::blob::Blob::R3($body)),
            ($crate::blob::Blob::R4($a), $crate::blob::Blob::R4($b)) => Ok($crate::blob::Blob::R4($body)),
            (lhs, rhs) => Err($crate::error::LayerError::RankMismatch {
                expected: lhs.rank(),
                actual: rhs.rank(),
            }),
        }
    }};
}
pub(crate) use zip_blob;

pub(crate) fn ensure_same_dims<B: Backend>(lhs: &Blob<B>, rhs: &Blob<B>) -> Result<(), LayerError> {
    let (l, r) = (lhs.dims(), rhs.dims());
    if l == r {
        Ok(())
    } else {
        Err(LayerError::ShapeMismatch(format!("{l:?} и {r:?}")))
    }
}

impl<B: Backend> Blob<B> {
    /// Ранг тензора.
    #[must_use]
    pub const fn rank(&self) -> usize {
        match self {
            Self::R1(_) => 1,
            Self::R2(_) => 2,
            Self::R3(_) => 3,
            Self::R4(_) => 4,
        }
    }

    /// Размеры тензора.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::R1(t) => t.dims().to_vec(),
            Self::R2(t) => t.dims().to_vec(),
            Self::R3(t) => t.dims().to_vec(),
            Self::R4(t) => t.dims().to_vec(),
        }
    }

    /// Число элементов.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.dims().iter().product()
    }

    /// Устройство, на котором лежит тензор.
    #[must_use]
    pub fn device(&self) -> B::Device {
        match self {
            Self::R1(t) => t.device(),
            Self::R2(t) => t.device(),
            Self::R3(t) => t.device(),
            Self::R4(t) => t.device(),
        }
    }

    /// Меняет форму на `shape` ранга `D`, сохраняя число элементов.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch`, если число элементов не совпадает.
    pub fn reshape<const D: usize>(self, shape: [usize; D]) -> Result<Tensor<B, D>, LayerError> {
        let target: usize = shape.iter().product();
        if target != self.num_elements() {
            return Err(LayerError::ShapeMismatch(format!(
                "нельзя привести {:?} к {:?}",
                self.dims(),
                shape
            )));
        }
        Ok(match self {
            Self::R1(t) => t.reshape(shape),
            Self::R2(t) => t.reshape(shape),
            Self::R3(t) => t.reshape(shape),
            Self::R4(t) => t.reshape(shape),
        })
    }

    /// Сплющивает все оси, кроме первой: `[N, prod(rest)]`.
    /// Блоб ранга 1 считается одним примером `[1, n]`.
    #[must_use]
    pub fn flatten_2d(self) -> Tensor<B, 2> {
        match self {
            Self::R1(t) => {
                let [n] = t.dims();
                t.reshape([1, n])
            }
            Self::R2(t) => t,
            Self::R3(t) => {
                let [n, a, b] = t.dims();
                t.reshape([n, a * b])
            }
            Self::R4(t) => {
                let [n, c, h, w] = t.dims();
                t.reshape([n, c * h * w])
            }
        }
    }

    /// Тензор ранга 4 без изменения формы.
    ///
    /// # Errors
    /// `LayerError::RankMismatch`, если ранг не 4.
    pub fn into_rank4(self) -> Result<Tensor<B, 4>, LayerError> {
        match self {
            Self::R4(t) => Ok(t),
            other => Err(LayerError::RankMismatch {
                expected: 4,
                actual: other.rank(),
            }),
        }
    }

    /// Строит блоб из `TensorData`; ранг берется из формы данных.
    ///
    /// # Errors
    /// `LayerError::RankMismatch` для рангов вне 1..=4.
    pub fn from_data(data: TensorData, device: &B::Device) -> Result<Self, LayerError> {
        Ok(match data.shape.len() {
            1 => Self::R1(Tensor::from_data(data, device)),
            2 => Self::R2(Tensor::from_data(data, device)),
            3 => Self::R3(Tensor::from_data(data, device)),
            4 => Self::R4(Tensor::from_data(data, device)),
            rank => return Err(LayerError::RankMismatch { expected: 4, actual: rank }),
        })
    }

    /// Строит блоб из формы и плоских данных.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch`, если длина данных не совпадает с формой,
    /// `LayerError::RankMismatch` для рангов вне 1..=4.
    pub fn from_shape_data(shape: &[usize], data: Vec<f32>, device: &B::Device) -> Result<Self, LayerError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(LayerError::ShapeMismatch(format!(
                "форма {shape:?} требует {expected} элементов, получено {}",
                data.len()
            )));
        }
        Self::from_data(TensorData::new(data, shape.to_vec()), device)
    }

    /// Данные тензора.
    #[must_use]
    pub fn into_data(self) -> TensorData {
        match self {
            Self::R1(t) => t.into_data(),
            Self::R2(t) => t.into_data(),
            Self::R3(t) => t.into_data(),
            Self::R4(t) => t.into_data(),
        }
    }

    /// Данные тензора в виде плоского `Vec<f32>`.
    ///
    /// # Errors
    /// `LayerError::Data`, если данные не удалось преобразовать.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, LayerError> {
        self.clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| LayerError::Data(format!("{e:?}")))
    }

    /// Сумма всех элементов, тензор `[1]`.
    #[must_use]
    pub fn sum(self) -> Tensor<B, 1> {
        match self {
            Self::R1(t) => t.sum(),
            Self::R2(t) => t.sum(),
            Self::R3(t) => t.sum(),
            Self::R4(t) => t.sum(),
        }
    }

    /// Тензор из нулей той же формы.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        map_blob!(self, |t| t.zeros_like())
    }

    /// Умножение на скаляр.
    #[must_use]
    pub fn mul_scalar(self, scalar: f64) -> Self {
        map_blob!(self, |t| t.mul_scalar(scalar))
    }

    /// Поэлементный знак (-1, 0, 1).
    #[must_use]
    pub fn sign(self) -> Self {
        map_blob!(self, |t| t.sign())
    }

    /// Поэлементная сумма.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch` / `RankMismatch` при несовпадении форм.
    pub fn add(self, other: Self) -> Result<Self, LayerError> {
        zip_blob!(self, other, |a, b| a.add(b))
    }

    /// Поэлементная разность.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch` / `RankMismatch` при несовпадении форм.
    pub fn sub(self, other: Self) -> Result<Self, LayerError> {
        zip_blob!(self, other, |a, b| a.sub(b))
    }

    /// Поэлементное произведение.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch` / `RankMismatch` при несовпадении форм.
    pub fn mul(self, other: Self) -> Result<Self, LayerError> {
        zip_blob!(self, other, |a, b| a.mul(b))
    }

    /// Поэлементный максимум.
    ///
    /// # Errors
    /// `LayerError::ShapeMismatch` / `RankMismatch` при несовпадении форм.
    pub fn max_pair(self, other: Self) -> Result<Self, LayerError> {
        zip_blob!(self, other, |a, b| a.max_pair(b))
    }
}

impl<B: AutodiffBackend> Blob<B> {
    /// Значение без графа автодифференцирования.
    #[must_use]
    pub fn inner(self) -> Blob<B::InnerBackend> {
        map_blob!(self, |t| t.inner())
    }

    /// Блоб автодифференцируемого бэкенда из значения внутреннего бэкенда.
    #[must_use]
    pub fn from_inner(blob: Blob<B::InnerBackend>) -> Self {
        map_blob!(blob, |t| Tensor::from_inner(t))
    }

    /// Градиент этого значения, если он был вычислен.
    #[must_use]
    pub fn grad(&self, grads: &B::Gradients) -> Option<Blob<B::InnerBackend>> {
        match self {
            Self::R1(t) => t.grad(grads).map(Blob::R1),
            Self::R2(t) => t.grad(grads).map(Blob::R2),
            Self::R3(t) => t.grad(grads).map(Blob::R3),
            Self::R4(t) => t.grad(grads).map(Blob::R4),
        }
    }
}

impl<B: Backend> From<Tensor<B, 1>> for Blob<B> {
    fn from(tensor: Tensor<B, 1>) -> Self {
        Self::R1(tensor)
    }
}

impl<B: Backend> From<Tensor<B, 2>> for Blob<B> {
    fn from(tensor: Tensor<B, 2>) -> Self {
        Self::R2(tensor)
    }
}

impl<B: Backend> From<Tensor<B, 3>> for Blob<B> {
    fn from(tensor: Tensor<B, 3>) -> Self {
        Self::R3(tensor)
    }
}

impl<B: Backend> From<Tensor<B, 4>> for Blob<B> {
    fn from(tensor: Tensor<B, 4>) -> Self {
        Self::R4(tensor)
    }
}
