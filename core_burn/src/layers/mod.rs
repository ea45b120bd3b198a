// core_burn/src/layers/mod.rs

//! Операторы, поддерживаемые по умолчанию.

pub mod convolution;
pub mod dropout;
pub mod eltwise;
pub mod function;
pub mod inner_product;
pub mod pooling;
pub mod relu;
pub mod softmax;

pub use convolution::{Convolution, ConvolutionOp};
pub use dropout::DropoutLayer;
pub use eltwise::eltwise_fn;
pub use function::{ForwardFn, FunctionLayer};
pub use inner_product::{InnerProduct, InnerProductOp};
pub use pooling::PoolingLayer;
pub use relu::ReluLayer;
pub use softmax::SoftmaxLayer;

use burn::tensor::backend::Backend;

use crate::{blob::Blob, error::LayerError};

/// Единственный вход унарного слоя.
pub(crate) fn single_input<B: Backend>(inputs: Vec<Blob<B>>) -> Result<Blob<B>, LayerError> {
    let actual = inputs.len();
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Ok(input),
        _ => Err(LayerError::InputCount { expected: 1, actual }),
    }
}
