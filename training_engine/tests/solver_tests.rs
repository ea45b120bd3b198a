use std::collections::HashMap;
use std::fs;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use core_burn::{Blob, LayerRegistry};
use inference_engine::{BuildOptions, Graph};
use model_loader::{CaffeSchema, ModelDescription, Phase};
use tempfile::tempdir;
use training_engine::{SgdSolver, SolverError, SolverParams};

type TrainBackend = Autodiff<NdArray<f32>>;

// Квадратичная потеря: (w . x + b)^2.
const SQUARE_NET: &str = r#"
name: "square"
layer {
  name: "fc"
  type: "InnerProduct"
  bottom: "data"
  top: "fc"
  PARAMS
  inner_product_param {
    num_output: 1
    weight_filler { type: "constant" value: 1 }
    bias_filler { type: "constant" value: 0 }
  }
}
layer {
  name: "sq"
  type: "Eltwise"
  bottom: "fc"
  bottom: "fc"
  top: "sq"
  eltwise_param { operation: PROD }
  loss_weight: 1
}
"#;

fn net_text(params: &str) -> String {
    SQUARE_NET.replace("PARAMS", params)
}

fn schema() -> CaffeSchema {
    CaffeSchema::bundled().unwrap()
}

fn graph(params: &str) -> Graph<TrainBackend> {
    let net = schema().parse_net_text(&net_text(params)).unwrap();
    let description = ModelDescription::from_net_message(&*net).unwrap();
    Graph::build(
        &description,
        &LayerRegistry::with_defaults(),
        BuildOptions::new(Phase::Train, Default::default()),
    )
    .unwrap()
}

fn solver(params: SolverParams, layer_params: &str) -> SgdSolver<TrainBackend> {
    SgdSolver::new(graph(layer_params), params).unwrap()
}

fn inputs(data: Vec<f32>) -> HashMap<String, Blob<TrainBackend>> {
    let len = data.len();
    let blob = Blob::from_shape_data(&[1, len], data, &Default::default()).unwrap();
    std::iter::once(("data".to_string(), blob)).collect()
}

fn parameter(solver: &SgdSolver<TrainBackend>, name: &str) -> Vec<f32> {
    solver
        .graph()
        .node("fc")
        .unwrap()
        .module
        .parameters()
        .into_iter()
        .find(|(param_name, _)| *param_name == name)
        .unwrap()
        .1
        .value()
        .to_f32_vec()
        .unwrap()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
    }
}

fn sgd(base_lr: f64) -> SolverParams {
    SolverParams {
        base_lr,
        ..SolverParams::default()
    }
}

#[test]
fn test_sgd_step_follows_gradient() {
    let mut solver = solver(sgd(0.01), "");
    let feed = inputs(vec![1.0, 2.0, 3.0]);

    // Выход 6, потеря 36; градиенты 2 * 6 * x и 2 * 6.
    let first = solver.step(1, &feed).unwrap();
    assert!((first - 36.0).abs() < 1e-4);
    assert_close(&parameter(&solver, "weight"), &[0.88, 0.76, 0.64]);
    assert_close(&parameter(&solver, "bias"), &[-0.12]);
    assert_eq!(solver.iter(), 1);

    let second = solver.step(1, &feed).unwrap();
    assert!((second - 4.2_f32 * 4.2).abs() < 1e-3);
}

#[test]
fn test_quadratic_loss_decreases() {
    let mut solver = solver(
        SolverParams {
            momentum: 0.5,
            ..sgd(0.005)
        },
        "",
    );
    let feed = inputs(vec![1.0, -2.0, 0.5]);
    let mut previous = f32::INFINITY;
    for _ in 0..10 {
        let loss = solver.step(1, &feed).unwrap();
        assert!(loss < previous, "{loss} >= {previous}");
        previous = loss;
    }
    assert_eq!(solver.iter(), 10);
}

#[test]
fn test_iter_size_sums_gradients() {
    let mut solver = solver(
        SolverParams {
            iter_size: 2,
            ..sgd(0.01)
        },
        "",
    );
    let loss = solver.step(1, &inputs(vec![1.0, 2.0, 3.0])).unwrap();
    assert!((loss - 72.0).abs() < 1e-3);
    assert_close(&parameter(&solver, "weight"), &[0.76, 0.52, 0.28]);
}

#[test]
fn test_lr_mult_freezes_weight() {
    let mut solver = solver(sgd(0.01), "param { lr_mult: 0 } param { lr_mult: 1 }");
    solver.step(1, &inputs(vec![1.0, 2.0, 3.0])).unwrap();
    assert_close(&parameter(&solver, "weight"), &[1.0, 1.0, 1.0]);
    assert_close(&parameter(&solver, "bias"), &[-0.12]);
}

#[test]
fn test_weight_decay_shrinks_weights_without_gradient() {
    let mut solver = solver(
        SolverParams {
            weight_decay: 0.1,
            ..sgd(0.1)
        },
        "param { decay_mult: 1 } param { decay_mult: 0 }",
    );
    // Нулевой вход: градиент весов равен нулю, остается только регуляризация.
    solver.step(1, &inputs(vec![0.0, 0.0])).unwrap();
    assert_close(&parameter(&solver, "weight"), &[0.99, 0.99]);
}

#[test]
fn test_momentum_accumulates_updates() {
    let mut solver = solver(
        SolverParams {
            momentum: 0.9,
            weight_decay: 0.1,
            ..sgd(0.1)
        },
        "",
    );
    let feed = inputs(vec![0.0]);
    solver.step(2, &feed).unwrap();
    // v1 = 0.01, w1 = 0.99; v2 = 0.9 * 0.01 + 0.1 * 0.099 = 0.0189.
    assert_close(&parameter(&solver, "weight"), &[0.9711]);
}

#[test]
fn test_clip_gradients_limits_update() {
    let mut solver = solver(
        SolverParams {
            clip_gradients: 1.0,
            ..sgd(1.0)
        },
        "param { lr_mult: 1 } param { lr_mult: 0 }",
    );
    // Выход 7: градиенты [56, 42] по весам и 14 по смещению, норма больше 1.
    solver.step(1, &inputs(vec![4.0, 3.0])).unwrap();
    let weight = parameter(&solver, "weight");
    let moved: f32 = weight.iter().map(|w| (1.0 - w) * (1.0 - w)).sum::<f32>().sqrt();
    assert!(moved <= 1.0 + 1e-4, "{weight:?}");
}

#[test]
fn test_solve_runs_until_max_iter() {
    let mut solver = solver(
        SolverParams {
            max_iter: 4,
            lr_policy: "step".to_string(),
            stepsize: 2,
            gamma: 0.1,
            ..sgd(0.001)
        },
        "",
    );
    solver.solve(&inputs(vec![1.0, 1.0])).unwrap();
    assert_eq!(solver.iter(), 4);
    assert!((solver.learning_rate() - 0.001 * 0.01).abs() < 1e-12);
}

#[test]
fn test_from_file_resolves_net_next_to_solver() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("train.prototxt"), net_text("")).unwrap();
    let solver_path = dir.path().join("solver.prototxt");
    fs::write(
        &solver_path,
        r#"
        net: "train.prototxt"
        base_lr: 0.01
        lr_policy: "fixed"
        momentum: 0.0
        "#,
    )
    .unwrap();

    let mut solver = SgdSolver::<TrainBackend>::from_file(
        &solver_path,
        &schema(),
        &LayerRegistry::with_defaults(),
        &Default::default(),
    )
    .unwrap();
    assert!(solver.graph().is_training());
    assert_eq!(solver.graph().phase(), Phase::Train);
    let loss = solver.step(1, &inputs(vec![1.0, 2.0, 3.0])).unwrap();
    assert!((loss - 36.0).abs() < 1e-4);
}

#[test]
fn test_from_file_accepts_inline_net() {
    let dir = tempdir().unwrap();
    let solver_path = dir.path().join("solver.prototxt");
    let text = format!("base_lr: 0.01\ntrain_net_param {{ {} }}\n", net_text(""));
    fs::write(&solver_path, text).unwrap();

    let solver = SgdSolver::<TrainBackend>::from_file(
        &solver_path,
        &schema(),
        &LayerRegistry::with_defaults(),
        &Default::default(),
    )
    .unwrap();
    assert_eq!(solver.graph().name(), "square");
    assert_eq!(solver.graph().loss_weight("sq"), 1.0);
}

#[test]
fn test_solver_without_net_is_rejected() {
    let dir = tempdir().unwrap();
    let solver_path = dir.path().join("solver.prototxt");
    fs::write(&solver_path, "base_lr: 0.01\n").unwrap();

    let result = SgdSolver::<TrainBackend>::from_file(
        &solver_path,
        &schema(),
        &LayerRegistry::with_defaults(),
        &Default::default(),
    );
    assert!(matches!(result, Err(SolverError::MissingNet)));
}

#[test]
fn test_zero_iter_size_is_rejected() {
    let result = SgdSolver::new(
        graph(""),
        SolverParams {
            iter_size: 0,
            ..sgd(0.01)
        },
    );
    assert!(matches!(result, Err(SolverError::InvalidSolver { .. })));
}
