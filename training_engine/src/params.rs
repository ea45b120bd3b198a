// training_engine/src/params.rs

//! Гиперпараметры солвера, прочитанные из спроецированного `SolverParameter`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::SolverError;

/// Поля `SolverParameter`, которые использует SGD-солвер.
///
/// Незаданные поля получают значения по умолчанию Caffe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Путь к описанию сети (общий для обучения и теста).
    pub net: Option<String>,
    /// Путь к описанию обучающей сети.
    pub train_net: Option<String>,
    /// Базовая скорость обучения.
    pub base_lr: f64,
    /// Период вывода потерь в лог (0 отключает).
    pub display: u64,
    /// Последняя итерация для `solve` и политики `poly`.
    pub max_iter: u64,
    /// Число проходов с накоплением градиента на одну итерацию.
    pub iter_size: usize,
    /// Политика скорости обучения.
    pub lr_policy: String,
    /// Множитель политик `step`, `exp`, `inv`, `multistep`, `sigmoid`.
    pub gamma: f64,
    /// Степень политик `inv` и `poly`.
    pub power: f64,
    /// Момент.
    pub momentum: f64,
    /// Коэффициент регуляризации.
    pub weight_decay: f64,
    /// `L2` или `L1`.
    pub regularization_type: String,
    /// Шаг политик `step` и `sigmoid`.
    pub stepsize: u64,
    /// Итерации смены скорости для `multistep`.
    pub stepvalue: Vec<u64>,
    /// Порог L2-нормы градиентов (отрицательный отключает ограничение).
    pub clip_gradients: f64,
    /// Тип солвера; поддерживается только `SGD`.
    #[serde(rename = "type")]
    pub solver_type: String,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            net: None,
            train_net: None,
            base_lr: 0.0,
            display: 0,
            max_iter: 0,
            iter_size: 1,
            lr_policy: "fixed".to_string(),
            gamma: 0.0,
            power: 0.0,
            momentum: 0.0,
            weight_decay: 0.0,
            regularization_type: "L2".to_string(),
            stepsize: 0,
            stepvalue: Vec::new(),
            clip_gradients: -1.0,
            solver_type: "SGD".to_string(),
        }
    }
}

impl SolverParams {
    /// Читает параметры из проекции `SolverParameter`. Вложенные сети игнорируются.
    ///
    /// # Errors
    /// `SolverError::InvalidSolver`, если значение поля не подходит по типу
    /// (например, отрицательный `stepsize`).
    pub fn from_value(value: Value) -> Result<Self, SolverError> {
        serde_json::from_value(value).map_err(|e| SolverError::invalid(e.to_string()))
    }
}
