// core_burn/src/layers/eltwise.rs

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used)]

//! `Eltwise`: поэлементная свертка N >= 2 входов одной формы слева направо.

use burn::tensor::backend::Backend;
use serde_json::Value;

use super::function::ForwardFn;
use crate::{
    blob::Blob,
    error::LayerError,
    params::{parse_params, EltwiseOp, EltwiseParams},
};

const LAYER_TYPE: &str = "Eltwise";

/// Строит функцию `Eltwise` из `eltwise_param`.
///
/// Для SUM коэффициенты `coeff`, если заданы, должны быть по одному на вход.
///
/// # Errors
/// `LayerError::InvalidParams` для неизвестной операции или `coeff` не для SUM.
pub fn eltwise_fn<B: Backend>(value: &Value) -> Result<ForwardFn<B>, LayerError> {
    let params: EltwiseParams = parse_params(LAYER_TYPE, value)?;
    let op = params.op()?;
    if op != EltwiseOp::Sum && !params.coeff.is_empty() {
        return Err(LayerError::invalid_params(LAYER_TYPE, "coeff допустим только для SUM"));
    }
    let coeff = params.coeff;
    Ok(Box::new(move |inputs: Vec<Blob<B>>| {
        if inputs.len() < 2 {
            return Err(LayerError::InputCount {
                expected: 2,
                actual: inputs.len(),
            });
        }
        if !coeff.is_empty() && coeff.len() != inputs.len() {
            return Err(LayerError::invalid_params(
                LAYER_TYPE,
                format!("{} коэффициентов для {} входов", coeff.len(), inputs.len()),
            ));
        }
        let weight = |i: usize| coeff.get(i).copied().unwrap_or(1.0);
        let mut inputs = inputs.into_iter().enumerate();
        let mut acc = match inputs.next() {
            Some((i, first)) if op == EltwiseOp::Sum && !coeff.is_empty() => first.mul_scalar(weight(i)),
            Some((_, first)) => first,
            None => return Err(LayerError::InputCount { expected: 2, actual: 0 }),
        };
        for (i, input) in inputs {
            acc = match op {
                EltwiseOp::Prod => acc.mul(input)?,
                EltwiseOp::Sum if coeff.is_empty() => acc.add(input)?,
                EltwiseOp::Sum => acc.add(input.mul_scalar(weight(i)))?,
                EltwiseOp::Max => acc.max_pair(input)?,
            };
        }
        Ok(vec![acc])
    }))
}
