use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use core_burn::{
    layers::{eltwise_fn, DropoutLayer, FunctionLayer, PoolingLayer, ReluLayer, SoftmaxLayer},
    Blob, ForwardContext, Layer, LayerError, LayerKind, LayerRegistry,
};
use serde_json::{json, Value};

type TestBackend = NdArray<f32>;

const TEST: ForwardContext = ForwardContext { training: false };
const TRAIN: ForwardContext = ForwardContext { training: true };

fn blob(shape: &[usize], data: Vec<f32>) -> Blob<TestBackend> {
    Blob::from_shape_data(shape, data, &Default::default()).unwrap()
}

fn iota(shape: &[usize]) -> Blob<TestBackend> {
    let len: usize = shape.iter().product();
    blob(shape, (0..len).map(|i| i as f32).collect())
}

fn build(type_name: &str, params: &Value) -> Box<dyn Layer<TestBackend>> {
    let registry = LayerRegistry::<TestBackend>::with_defaults();
    let constructor = registry.lookup(type_name, "").unwrap();
    match constructor(params, &Default::default()).unwrap() {
        core_burn::Built::Module(module) => module,
        core_burn::Built::Function(function) => Box::new(FunctionLayer::new(type_name, function)),
        core_burn::Built::External(_) => panic!("внешний слой не ожидался"),
    }
}

fn run(layer: &mut dyn Layer<TestBackend>, inputs: Vec<Blob<TestBackend>>) -> Blob<TestBackend> {
    layer.forward(inputs, &TEST).unwrap().remove(0)
}

fn run1(layer: &mut dyn Layer<TestBackend>, input: Blob<TestBackend>) -> Blob<TestBackend> {
    run(layer, vec![input])
}

#[test]
fn test_convolution_output_shape() {
    let mut conv = build("Convolution", &json!({"num_output": 4, "kernel_size": [3], "pad": [1]}));
    assert_eq!(conv.kind(), LayerKind::Lazy);
    let out = run1(conv.as_mut(), iota(&[2, 3, 8, 8]));
    assert_eq!(out.dims(), vec![2, 4, 8, 8]);

    let mut strided = build("Convolution", &json!({"num_output": 2, "kernel_size": 3, "stride": 2}));
    let out = run1(strided.as_mut(), iota(&[1, 1, 7, 7]));
    assert_eq!(out.dims(), vec![1, 2, 3, 3]);
}

#[test]
fn test_grouped_convolution_weight_shape() {
    let mut conv = build("Convolution", &json!({"num_output": 4, "group": 2, "kernel_size": 1}));
    run1(conv.as_mut(), iota(&[1, 6, 2, 2]));
    let params = conv.parameters();
    assert_eq!(params[0].0, "weight");
    assert_eq!(params[0].1.dims(), vec![4, 3, 1, 1]);
    assert_eq!(params[1].1.dims(), vec![4]);
}

#[test]
fn test_convolution_requires_num_output() {
    let registry = LayerRegistry::<TestBackend>::with_defaults();
    let constructor = registry.lookup("Convolution", "").unwrap();
    let result = constructor(&json!({"kernel_size": 3}), &Default::default());
    assert!(matches!(result, Err(LayerError::InvalidParams { .. })));
}

#[test]
fn test_inner_product_flattens_input() {
    let mut fc = build("InnerProduct", &json!({"num_output": 5, "bias_term": false}));
    let out = run1(fc.as_mut(), iota(&[2, 3, 4, 4]));
    assert_eq!(out.dims(), vec![2, 5]);
    let params = fc.parameters();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].1.dims(), vec![5, 48]);
}

#[test]
fn test_inner_product_rank1_input_is_one_example() {
    let mut fc = build("InnerProduct", &json!({"num_output": 2}));
    let out = run1(fc.as_mut(), iota(&[3]));
    assert_eq!(out.dims(), vec![1, 2]);
}

#[test]
fn test_max_pooling_values() {
    let mut pool = build("Pooling", &json!({"pool": 0, "kernel_size": 2, "stride": 2}));
    let out = run1(pool.as_mut(), iota(&[1, 1, 4, 4]));
    assert_eq!(out.dims(), vec![1, 1, 2, 2]);
    assert_eq!(out.to_f32_vec().unwrap(), vec![5.0, 7.0, 13.0, 15.0]);
}

#[test]
fn test_average_pooling_shape_and_values() {
    let mut pool = build("Pooling", &json!({"pool": 1, "kernel_size": [2], "stride": [2]}));
    let out = run1(pool.as_mut(), iota(&[2, 3, 6, 6]));
    assert_eq!(out.dims(), vec![2, 3, 3, 3]);
    // (0 + 1 + 6 + 7) / 4
    assert!((out.to_f32_vec().unwrap()[0] - 3.5).abs() < 1e-6);
}

#[test]
fn test_global_pooling_covers_whole_input() {
    let mut pool = build("Pooling", &json!({"pool": 1, "global_pooling": true}));
    let out = run1(pool.as_mut(), iota(&[1, 2, 3, 3]));
    assert_eq!(out.dims(), vec![1, 2, 1, 1]);
    assert_eq!(out.to_f32_vec().unwrap(), vec![4.0, 13.0]);
}

#[test]
fn test_pooling_without_params_uses_defaults() {
    let pool = PoolingLayer::from_params(&json!({})).unwrap();
    assert_eq!(pool.method(), core_burn::params::PoolMethod::Max);
}

#[test]
fn test_softmax_default_axis_is_last() {
    let layer = SoftmaxLayer::from_params(&json!({})).unwrap();
    assert_eq!(layer.axis(), -1);
    assert_eq!(layer.resolve_axis(2).unwrap(), 1);

    let mut softmax = build("Softmax", &json!({}));
    let out = run1(softmax.as_mut(), blob(&[2, 3], vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]));
    assert_eq!(out.dims(), vec![2, 3]);
    let values = out.to_f32_vec().unwrap();
    assert!((values[..3].iter().sum::<f32>() - 1.0).abs() < 1e-6);
    assert!((values[3] - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn test_softmax_explicit_axis() {
    let mut softmax = build("Softmax", &json!({"axis": 1}));
    let out = run1(softmax.as_mut(), iota(&[1, 4, 2, 2]));
    assert_eq!(out.dims(), vec![1, 4, 2, 2]);
    let values = out.to_f32_vec().unwrap();
    let channel_sum: f32 = (0..4).map(|c| values[c * 4]).sum();
    assert!((channel_sum - 1.0).abs() < 1e-5);

    let bad = SoftmaxLayer::from_params(&json!({"axis": 4})).unwrap();
    assert!(bad.resolve_axis(4).is_err());
}

#[test]
fn test_relu_and_leaky_relu() {
    let mut relu = build("ReLU", &json!({}));
    let out = run1(relu.as_mut(), blob(&[4], vec![-1.0, 2.0, -3.0, 0.5]));
    assert_eq!(out.to_f32_vec().unwrap(), vec![0.0, 2.0, 0.0, 0.5]);

    let mut leaky = ReluLayer::from_params(&json!({"negative_slope": 0.5})).unwrap();
    let out = Layer::<TestBackend>::forward(&mut leaky, vec![blob(&[2], vec![-2.0, 2.0])], &TEST).unwrap();
    assert_eq!(out[0].to_f32_vec().unwrap(), vec![-1.0, 2.0]);
}

#[test]
fn test_dropout_identity_in_test_mode() {
    let mut dropout = DropoutLayer::from_params(&json!({})).unwrap();
    assert!((dropout.ratio() - 0.5).abs() < f64::EPSILON);
    let input = iota(&[2, 8]);
    let out = Layer::<TestBackend>::forward(&mut dropout, vec![input.clone()], &TEST).unwrap();
    assert_eq!(out[0].to_f32_vec().unwrap(), input.to_f32_vec().unwrap());
}

#[test]
fn test_dropout_scales_kept_elements_in_train_mode() {
    let mut dropout = DropoutLayer::from_params(&json!({"dropout_ratio": 0.5})).unwrap();
    let input = blob(&[64], vec![1.0; 64]);
    let out = Layer::<TestBackend>::forward(&mut dropout, vec![input], &TRAIN).unwrap();
    assert_eq!(out[0].dims(), vec![64]);
    assert!(out[0]
        .to_f32_vec()
        .unwrap()
        .iter()
        .all(|v| *v == 0.0 || (*v - 2.0).abs() < 1e-6));
}

#[test]
fn test_dropout_rejects_full_ratio() {
    assert!(DropoutLayer::from_params(&json!({"dropout_ratio": 1.0})).is_err());
}

#[test]
fn test_eltwise_operations() {
    let a = || blob(&[1, 3], vec![1.0, 5.0, -2.0]);
    let b = || blob(&[1, 3], vec![2.0, 3.0, 4.0]);

    let mut sum = build("Eltwise", &json!({}));
    assert_eq!(sum.kind(), LayerKind::Function);
    assert_eq!(run(sum.as_mut(), vec![a(), b()]).to_f32_vec().unwrap(), vec![3.0, 8.0, 2.0]);

    let mut prod = build("Eltwise", &json!({"operation": 0}));
    assert_eq!(run(prod.as_mut(), vec![a(), b()]).to_f32_vec().unwrap(), vec![2.0, 15.0, -8.0]);

    let mut max = build("Eltwise", &json!({"operation": 2}));
    assert_eq!(run(max.as_mut(), vec![a(), b(), a()]).to_f32_vec().unwrap(), vec![2.0, 5.0, 4.0]);

    let mut diff = build("Eltwise", &json!({"operation": 1, "coeff": [1.0, -1.0]}));
    assert_eq!(run(diff.as_mut(), vec![a(), b()]).to_f32_vec().unwrap(), vec![-1.0, 2.0, -6.0]);
}

#[test]
fn test_eltwise_rejects_single_input_and_shape_mismatch() {
    let function = eltwise_fn::<TestBackend>(&json!({})).unwrap();
    assert!(matches!(
        function(vec![iota(&[2])]),
        Err(LayerError::InputCount { expected: 2, actual: 1 })
    ));
    assert!(matches!(
        function(vec![iota(&[2]), iota(&[3])]),
        Err(LayerError::ShapeMismatch(_))
    ));
}

#[test]
fn test_unary_layers_reject_extra_inputs() {
    let mut relu = build("ReLU", &json!({}));
    let result = relu.forward(vec![iota(&[2]), iota(&[2])], &TEST);
    assert!(matches!(result, Err(LayerError::InputCount { expected: 1, actual: 2 })));
}

#[test]
fn test_forward_is_deterministic() {
    let mut conv = build("Convolution", &json!({"num_output": 2, "kernel_size": 3}));
    let input = iota(&[1, 2, 5, 5]);
    let first = run1(conv.as_mut(), input.clone()).to_f32_vec().unwrap();
    let second = run1(conv.as_mut(), input).to_f32_vec().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_materialized_layers_reject_binding() {
    let mut relu = build("ReLU", &json!({}));
    let weight = Blob::from(Tensor::<TestBackend, 1>::from_data(
        TensorData::new(vec![1.0f32], [1]),
        &Default::default(),
    ));
    assert!(matches!(
        relu.set_parameters(Some(weight), None),
        Err(LayerError::UnsupportedBinding { .. })
    ));
}
