#![allow(dead_code)]

use std::collections::HashMap;

use burn_ndarray::NdArray;
use core_burn::{Blob, LayerRegistry};
use inference_engine::{BuildOptions, Graph};
use model_loader::{CaffeSchema, ModelDescription, Phase};

pub type TestBackend = NdArray<f32>;

pub const TINY_NET: &str = r#"
name: "tiny"
input: "data"
input_shape { dim: 2 dim: 1 dim: 6 dim: 6 }
layer {
  name: "conv1"
  type: "Convolution"
  bottom: "data"
  top: "conv1"
  convolution_param { num_output: 3 kernel_size: 3 weight_filler { type: "gaussian" std: 0.1 } }
}
layer { name: "relu1" type: "ReLU" bottom: "conv1" top: "conv1" }
layer {
  name: "pool1"
  type: "Pooling"
  bottom: "conv1"
  top: "pool1"
  pooling_param { pool: MAX kernel_size: 2 stride: 2 }
}
layer {
  name: "fc1"
  type: "InnerProduct"
  bottom: "pool1"
  top: "fc1"
  inner_product_param { num_output: 5 }
}
layer { name: "prob" type: "Softmax" bottom: "fc1" top: "prob" }
"#;

pub fn schema() -> CaffeSchema {
    CaffeSchema::bundled().unwrap()
}

pub fn describe(text: &str) -> ModelDescription {
    let net = schema().parse_net_text(text).unwrap();
    ModelDescription::from_net_message(&*net).unwrap()
}

pub fn build_with(text: &str, registry: &LayerRegistry<TestBackend>, phase: Phase) -> Graph<TestBackend> {
    Graph::build(&describe(text), registry, BuildOptions::new(phase, Default::default())).unwrap()
}

pub fn build(text: &str) -> Graph<TestBackend> {
    build_with(text, &LayerRegistry::with_defaults(), Phase::Test)
}

pub fn blob(shape: &[usize], data: Vec<f32>) -> Blob<TestBackend> {
    Blob::from_shape_data(shape, data, &Default::default()).unwrap()
}

pub fn ramp(shape: &[usize]) -> Blob<TestBackend> {
    let len: usize = shape.iter().product();
    blob(shape, (0..len).map(|i| (i % 7) as f32 - 3.0).collect())
}

pub fn feeds(entries: Vec<(&str, Blob<TestBackend>)>) -> HashMap<String, Blob<TestBackend>> {
    entries.into_iter().map(|(name, blob)| (name.to_string(), blob)).collect()
}
