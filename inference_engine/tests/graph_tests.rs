mod common;

use std::collections::HashMap;

use burn::tensor::TensorData;
use common::{blob, build, build_with, describe, feeds, ramp, TestBackend, TINY_NET};
use core_burn::{Blob, BlobBuffer, Built, ExternalLayer, LayerError, LayerKind, LayerRegistry};
use inference_engine::{BuildOptions, Feed, Graph, GraphError};
use model_loader::Phase;
use utils_crate::ConverterConfig;

#[test]
fn test_tiny_net_output_shape_and_true_outputs() {
    let mut graph = build(TINY_NET);
    assert_eq!(graph.name(), "tiny");
    assert_eq!(graph.nodes().len(), 5);
    assert_eq!(graph.declared_inputs()[0].shape, Some(vec![2, 1, 6, 6]));

    let outputs = graph.forward_tensors(feeds(vec![("data", ramp(&[2, 1, 6, 6]))])).unwrap();
    assert_eq!(outputs.len(), 1);
    let prob = &outputs["prob"];
    assert_eq!(prob.dims(), vec![2, 5]);
    let values = prob.to_f32_vec().unwrap();
    assert!((values[..5].iter().sum::<f32>() - 1.0).abs() < 1e-5);
}

#[test]
fn test_forward_is_idempotent() {
    let mut graph = build(TINY_NET);
    let first = graph.forward_tensors(feeds(vec![("data", ramp(&[2, 1, 6, 6]))])).unwrap();
    let second = graph.forward_tensors(feeds(vec![("data", ramp(&[2, 1, 6, 6]))])).unwrap();
    assert_eq!(first["prob"].to_f32_vec().unwrap(), second["prob"].to_f32_vec().unwrap());
}

#[test]
fn test_lazy_layers_materialize_once_across_batches() {
    let mut graph = build(TINY_NET);
    graph.forward_tensors(feeds(vec![("data", ramp(&[2, 1, 6, 6]))])).unwrap();
    let ids: Vec<_> = graph.parameters().iter().map(|(_, _, p)| p.id()).collect();
    assert_eq!(ids.len(), 4);

    let outputs = graph.forward_tensors(feeds(vec![("data", ramp(&[5, 1, 6, 6]))])).unwrap();
    assert_eq!(outputs["prob"].dims(), vec![5, 5]);
    let again: Vec<_> = graph.parameters().iter().map(|(_, _, p)| p.id()).collect();
    assert_eq!(ids, again);
    assert_eq!(graph.node("fc1").unwrap().module.parameters()[0].1.dims(), vec![5, 12]);
}

#[test]
fn test_missing_variable_is_named() {
    let mut graph = build(TINY_NET);
    let result = graph.forward_tensors(HashMap::new());
    assert!(matches!(result, Err(GraphError::MissingVariable { name }) if name == "data"));
}

#[test]
fn test_chain_returns_only_last_output() {
    let text = r#"
        layer { name: "a" type: "ReLU" bottom: "x" top: "y" }
        layer { name: "b" type: "ReLU" bottom: "y" top: "z" }
    "#;
    let mut graph = build(text);
    let outputs = graph.forward_tensors(feeds(vec![("x", blob(&[3], vec![-1.0, 0.5, 2.0]))])).unwrap();
    assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["z"]);
    assert_eq!(outputs["z"].to_f32_vec().unwrap(), vec![0.0, 0.5, 2.0]);
    assert_eq!(graph.blob("y").unwrap().dims(), vec![3]);
    assert!(graph.blob("x").is_some());
}

#[test]
fn test_unrecognized_layer_is_skipped() {
    let text = r#"
        layer { name: "mystery" type: "Mystery" bottom: "data" top: "m" }
        layer { name: "relu" type: "ReLU" bottom: "data" top: "r" }
    "#;
    let mut graph = build(text);
    assert_eq!(graph.skipped(), ["mystery".to_string()]);
    let outputs = graph.forward_tensors(feeds(vec![("data", blob(&[2], vec![-1.0, 1.0]))])).unwrap();
    assert_eq!(outputs["r"].to_f32_vec().unwrap(), vec![0.0, 1.0]);
    assert!(!outputs.contains_key("m"));
}

#[test]
fn test_batch_norm_and_scale_are_skipped_in_resnet_block() {
    let text = r#"
        name: "block"
        input: "data"
        input_shape { dim: 1 dim: 1 dim: 3 dim: 3 }
        layer { name: "conv1" type: "Convolution" bottom: "data" top: "conv1"
                convolution_param { num_output: 2 kernel_size: 1 bias_term: false
                                    weight_filler { type: "constant" value: 1 } } }
        layer { name: "bn1" type: "BatchNorm" bottom: "conv1" top: "conv1"
                batch_norm_param { use_global_stats: true eps: 0.001 } }
        layer { name: "scale1" type: "Scale" bottom: "conv1" top: "conv1"
                scale_param { bias_term: true } }
        layer { name: "relu1" type: "ReLU" bottom: "conv1" top: "conv1" }
    "#;
    let description = describe(text);
    let bn = description.layer("bn1").unwrap();
    assert_eq!(bn.param("batch_norm_param").unwrap()["use_global_stats"], true);
    assert_eq!(description.layer("scale1").unwrap().param("scale_param").unwrap()["bias_term"], true);

    let mut graph = build(text);
    assert_eq!(graph.skipped(), ["bn1".to_string(), "scale1".to_string()]);
    assert_eq!(graph.nodes().len(), 2);

    let data = blob(&[1, 1, 3, 3], vec![-2.0, -1.0, 0.0, 1.0, 2.0, 3.0, -4.0, 5.0, -6.0]);
    let outputs = graph.forward_tensors(feeds(vec![("data", data)])).unwrap();
    assert_eq!(outputs["conv1"].dims(), vec![1, 2, 3, 3]);
    let values = outputs["conv1"].to_f32_vec().unwrap();
    assert_eq!(&values[..9], &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 5.0, 0.0]);
}

#[test]
fn test_consumer_of_skipped_layer_reports_missing_variable() {
    let text = r#"
        layer { name: "mystery" type: "Mystery" bottom: "data" top: "m" }
        layer { name: "relu" type: "ReLU" bottom: "m" top: "r" }
    "#;
    let mut graph = build(text);
    let result = graph.forward_tensors(feeds(vec![("data", blob(&[1], vec![1.0]))]));
    assert!(matches!(result, Err(GraphError::MissingVariable { name }) if name == "m"));
}

#[test]
fn test_in_place_layer_runs_and_stays_output() {
    let text = r#"
        layer { name: "fc" type: "InnerProduct" bottom: "data" top: "fc"
                inner_product_param { num_output: 4 weight_filler { type: "constant" value: -1 } } }
        layer { name: "relu" type: "ReLU" bottom: "fc" top: "fc" }
    "#;
    let mut graph = build(text);
    assert!(graph.node("relu").unwrap().is_in_place());
    let outputs = graph.forward_tensors(feeds(vec![("data", blob(&[1, 2], vec![1.0, 1.0]))])).unwrap();
    assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["fc"]);
    assert!(outputs["fc"].to_f32_vec().unwrap().iter().all(|v| *v >= 0.0));
}

#[test]
fn test_scheduler_runs_layers_listed_before_their_producers() {
    let text = r#"
        layer { name: "second" type: "ReLU" bottom: "y" top: "z" }
        layer { name: "first" type: "ReLU" bottom: "x" top: "y" }
    "#;
    let mut graph = build(text);
    let outputs = graph.forward_tensors(feeds(vec![("x", blob(&[1], vec![4.0]))])).unwrap();
    assert_eq!(outputs["z"].to_f32_vec().unwrap(), vec![4.0]);
}

#[test]
fn test_given_outputs_skip_their_producer() {
    let text = r#"
        layer { name: "a" type: "ReLU" bottom: "x" top: "y" }
        layer { name: "b" type: "ReLU" bottom: "y" top: "z" }
    "#;
    let mut graph = build(text);
    let outputs = graph.forward_tensors(feeds(vec![("y", blob(&[1], vec![-2.0]))])).unwrap();
    assert_eq!(outputs["z"].to_f32_vec().unwrap(), vec![0.0]);
    assert!(graph.blob("x").is_none());
}

#[test]
fn test_legacy_layers_resolve_enum_types() {
    let text = r#"
        layers { name: "fc" type: INNER_PRODUCT bottom: "data" top: "fc" inner_product_param { num_output: 3 } }
        layers { name: "relu" type: RELU bottom: "fc" top: "out" }
    "#;
    let mut graph = build(text);
    assert_eq!(graph.node("fc").unwrap().type_name, "INNER_PRODUCT");
    assert_eq!(graph.node("fc").unwrap().module.kind(), LayerKind::Lazy);
    let outputs = graph.forward_tensors(feeds(vec![("data", ramp(&[2, 4]))])).unwrap();
    assert_eq!(outputs["out"].dims(), vec![2, 3]);
}

#[test]
fn test_loss_weights_default_and_replicate() {
    let text = r#"
        layer { name: "loss" type: "SumLoss" bottom: "x" top: "loss" }
        layer { name: "multi" type: "Split3" bottom: "x" top: "a" top: "b" top: "c" loss_weight: 2 loss_weight: 3 }
        layer { name: "relu" type: "ReLU" bottom: "x" top: "r" }
    "#;
    let mut registry = LayerRegistry::<TestBackend>::with_defaults();
    registry.register("SumLoss", |_, _| {
        Ok(Built::Function(Box::new(|inputs: Vec<Blob<TestBackend>>| {
            Ok(inputs.into_iter().map(|b| Blob::R1(b.sum())).collect())
        })))
    });
    registry.register("Split3", |_, _| {
        Ok(Built::Function(Box::new(|inputs: Vec<Blob<TestBackend>>| {
            let x = inputs[0].clone();
            Ok(vec![x.clone(), x.clone(), x])
        })))
    });
    let mut graph = build_with(text, &registry, Phase::Test);

    assert_eq!(graph.node("multi").unwrap().loss_weights, vec![2.0, 3.0, 2.0]);
    assert!((graph.loss_weight("loss") - 1.0).abs() < f32::EPSILON);
    assert!((graph.loss_weight("b") - 3.0).abs() < f32::EPSILON);
    assert!(graph.loss_weight("r").abs() < f32::EPSILON);
    assert!(graph.loss_weight("unknown").abs() < f32::EPSILON);

    let outputs = graph.forward_tensors(feeds(vec![("x", blob(&[2], vec![1.0, 2.0]))])).unwrap();
    assert_eq!(outputs["loss"].to_f32_vec().unwrap(), vec![3.0]);
    assert_eq!(outputs.len(), 5);
}

#[test]
fn test_last_writer_wins_for_loss_weight() {
    let text = r#"
        layer { name: "first" type: "ReLU" bottom: "x" top: "y" loss_weight: 4 }
        layer { name: "second" type: "ReLU" bottom: "y" top: "y" }
    "#;
    let graph = build(text);
    assert!(graph.loss_weight("y").abs() < f32::EPSILON);
}

#[test]
fn test_array_mode_returns_arrays() {
    let text = r#"layer { name: "relu" type: "ReLU" bottom: "data" top: "out" }"#;
    let mut graph = build(text);
    let mut inputs = HashMap::new();
    inputs.insert(
        "data".to_string(),
        Feed::<TestBackend>::Array(TensorData::new(vec![-1.0f32, 3.0], [1, 2])),
    );
    let outputs = graph.forward(inputs).unwrap();
    let Some(Feed::Array(data)) = outputs.get("out").cloned() else {
        panic!("ожидался массив");
    };
    assert_eq!(data.shape, vec![1, 2]);
    assert_eq!(data.to_vec::<f32>().unwrap(), vec![0.0, 3.0]);
}

#[test]
fn test_tensor_mode_returns_tensors() {
    let text = r#"layer { name: "relu" type: "ReLU" bottom: "data" top: "out" }"#;
    let mut graph = build(text);
    let mut inputs = HashMap::new();
    inputs.insert("data".to_string(), Feed::Tensor(blob(&[2], vec![1.0, -1.0])));
    let outputs = graph.forward(inputs).unwrap();
    assert!(matches!(outputs.get("out"), Some(Feed::Tensor(_))));
}

#[test]
fn test_mixed_inputs_are_rejected() {
    let text = r#"layer { name: "sum" type: "Eltwise" bottom: "a" bottom: "b" top: "c" }"#;
    let mut graph = build(text);
    let mut inputs = HashMap::new();
    inputs.insert("a".to_string(), Feed::Array(TensorData::new(vec![1.0f32], [1])));
    inputs.insert("b".to_string(), Feed::Tensor(blob(&[1], vec![1.0])));
    assert!(matches!(
        graph.forward(inputs),
        Err(GraphError::MixedInputs { name }) if name == "b"
    ));
}

#[test]
fn test_phase_controls_dropout() {
    let text = r#"layer { name: "drop" type: "Dropout" bottom: "x" top: "y" dropout_param { dropout_ratio: 0.5 } }"#;
    let input = || feeds(vec![("x", blob(&[32], vec![1.0; 32]))]);

    let mut test_graph = build(text);
    assert!(!test_graph.is_training());
    let outputs = test_graph.forward_tensors(input()).unwrap();
    assert_eq!(outputs["y"].to_f32_vec().unwrap(), vec![1.0; 32]);

    let mut train_graph = build_with(text, &LayerRegistry::with_defaults(), Phase::Train);
    assert!(train_graph.is_training());
    let outputs = train_graph.forward_tensors(input()).unwrap();
    assert!(outputs["y"]
        .to_f32_vec()
        .unwrap()
        .iter()
        .all(|v| *v == 0.0 || (*v - 2.0).abs() < 1e-6));
}

#[test]
fn test_build_options_follow_config() {
    let config = ConverterConfig::from_toml_str("[net]\nphase = \"train\"\n").unwrap();
    let options = BuildOptions::<TestBackend>::from_config(&config, Default::default());
    assert_eq!(options.phase, Phase::Train);
    let graph = Graph::build(&describe(TINY_NET), &LayerRegistry::with_defaults(), options).unwrap();
    assert_eq!(graph.phase(), Phase::Train);
}

#[test]
fn test_invalid_layer_params_fail_build_with_layer_name() {
    let text = r#"layer { name: "conv" type: "Convolution" bottom: "data" top: "conv" }"#;
    let result = Graph::build(
        &describe(text),
        &LayerRegistry::<TestBackend>::with_defaults(),
        BuildOptions::new(Phase::Test, Default::default()),
    );
    assert!(matches!(
        result,
        Err(GraphError::Layer { layer, source: LayerError::InvalidParams { .. } }) if layer == "conv"
    ));
}

#[derive(Debug, Default)]
struct AddConstant {
    value: f32,
}

impl ExternalLayer for AddConstant {
    fn set_param_str(&mut self, param_str: &str) -> Result<(), LayerError> {
        self.value = param_str.parse().map_err(|e| LayerError::External(format!("{e}")))?;
        Ok(())
    }

    fn setup(&mut self, _bottom: &[BlobBuffer], _top: &mut [BlobBuffer]) -> Result<(), LayerError> {
        Ok(())
    }

    fn forward(&mut self, bottom: &[BlobBuffer], top: &mut [BlobBuffer]) -> Result<(), LayerError> {
        top[0].reshape(bottom[0].shape());
        top[0].set_data(bottom[0].data().iter().map(|v| v + self.value).collect());
        Ok(())
    }
}

#[test]
fn test_python_layer_uses_registered_external_layer() {
    let text = r#"
        layer {
          name: "shift"
          type: "Python"
          bottom: "data"
          top: "shifted"
          python_param { module: "my_layers" layer: "AddConstant" param_str: "10" }
        }
    "#;
    let mut registry = LayerRegistry::<TestBackend>::with_defaults();
    registry.register_external("AddConstant", |_| Ok(Box::new(AddConstant::default())));
    let mut graph = build_with(text, &registry, Phase::Test);
    assert_eq!(graph.node("shift").unwrap().module.kind(), LayerKind::External);
    assert_eq!(graph.node("shift").unwrap().type_name, "AddConstant");

    let outputs = graph.forward_tensors(feeds(vec![("data", blob(&[1, 2], vec![1.0, 2.0]))])).unwrap();
    assert_eq!(outputs["shifted"].dims(), vec![1, 2]);
    assert_eq!(outputs["shifted"].to_f32_vec().unwrap(), vec![11.0, 12.0]);
}

#[test]
fn test_lookup_falls_back_to_layer_name() {
    let text = r#"layer { name: "relu" type: "Custom" bottom: "x" top: "y" }"#;
    let mut graph = build(text);
    assert!(graph.skipped().is_empty());
    let outputs = graph.forward_tensors(feeds(vec![("x", blob(&[1], vec![-5.0]))])).unwrap();
    assert_eq!(outputs["y"].to_f32_vec().unwrap(), vec![0.0]);
}
