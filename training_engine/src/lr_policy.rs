// training_engine/src/lr_policy.rs

//! Политики скорости обучения Caffe.

use tracing::warn;

use crate::{error::SolverError, params::SolverParams};

/// Расписание скорости обучения по номеру итерации (с нуля).
#[derive(Debug, Clone, PartialEq)]
pub enum LrPolicy {
    /// `base_lr`.
    Fixed,
    /// `base_lr * gamma ^ floor(iter / stepsize)`.
    Step {
        /// Период уменьшения.
        stepsize: u64,
        /// Множитель.
        gamma: f64,
    },
    /// `base_lr * gamma ^ iter`.
    Exp {
        /// Множитель.
        gamma: f64,
    },
    /// `base_lr * (1 + gamma * iter) ^ (-power)`.
    Inv {
        /// Множитель.
        gamma: f64,
        /// Степень.
        power: f64,
    },
    /// Как `Step`, но с явным списком итераций смены.
    MultiStep {
        /// Итерации смены по возрастанию.
        stepvalues: Vec<u64>,
        /// Множитель.
        gamma: f64,
    },
    /// `base_lr * (1 - iter / max_iter) ^ power`.
    Poly {
        /// Степень.
        power: f64,
        /// Итерация, на которой скорость достигает нуля.
        max_iter: u64,
    },
    /// `base_lr / (1 + exp(-gamma * (iter - stepsize)))`.
    Sigmoid {
        /// Крутизна.
        gamma: f64,
        /// Центр.
        stepsize: u64,
    },
}

impl LrPolicy {
    /// Политика по `lr_policy`. Неизвестное имя дает `Fixed` с предупреждением.
    ///
    /// # Errors
    /// `SolverError::InvalidSolver`, если политике не хватает параметров.
    pub fn from_params(params: &SolverParams) -> Result<Self, SolverError> {
        let policy = match params.lr_policy.as_str() {
            "fixed" => Self::Fixed,
            "step" => {
                if params.stepsize == 0 {
                    return Err(SolverError::invalid("политика step требует stepsize > 0"));
                }
                Self::Step {
                    stepsize: params.stepsize,
                    gamma: params.gamma,
                }
            }
            "exp" => Self::Exp { gamma: params.gamma },
            "inv" => Self::Inv {
                gamma: params.gamma,
                power: params.power,
            },
            "multistep" => Self::MultiStep {
                stepvalues: params.stepvalue.clone(),
                gamma: params.gamma,
            },
            "poly" => {
                if params.max_iter == 0 {
                    return Err(SolverError::invalid("политика poly требует max_iter > 0"));
                }
                Self::Poly {
                    power: params.power,
                    max_iter: params.max_iter,
                }
            }
            "sigmoid" => Self::Sigmoid {
                gamma: params.gamma,
                stepsize: params.stepsize,
            },
            other => {
                warn!("Неизвестная политика скорости обучения '{}', используется fixed", other);
                Self::Fixed
            }
        };
        Ok(policy)
    }

    /// Скорость обучения на итерации `iter`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn rate(&self, base_lr: f64, iter: u64) -> f64 {
        match self {
            Self::Fixed => base_lr,
            Self::Step { stepsize, gamma } => base_lr * gamma.powi((iter / stepsize) as i32),
            Self::Exp { gamma } => base_lr * gamma.powf(iter as f64),
            Self::Inv { gamma, power } => base_lr * gamma.mul_add(iter as f64, 1.0).powf(-power),
            Self::MultiStep { stepvalues, gamma } => {
                let current_step = stepvalues.iter().take_while(|&&value| iter >= value).count();
                base_lr * gamma.powi(current_step as i32)
            }
            Self::Poly { power, max_iter } => {
                let remaining = (1.0 - iter as f64 / *max_iter as f64).max(0.0);
                base_lr * remaining.powf(*power)
            }
            Self::Sigmoid { gamma, stepsize } => {
                base_lr / (1.0 + (-gamma * (iter as f64 - *stepsize as f64)).exp())
            }
        }
    }
}
