// inference_engine/src/graph.rs

//! Построение исполняемого графа по описанию сети.
//!
//! Каждый слой описания ищется в реестре по типу (для `Python` по `python_param.layer`),
//! затем по имени слоя. Неизвестные слои пропускаются с предупреждением, остальная
//! часть графа строится и выполняется как обычно.

use std::collections::HashMap;
use std::path::Path;

use burn::tensor::backend::Backend;
use serde_json::Value;
use tracing::{debug, info, warn};

use core_burn::{Blob, Built, ExternalLayerAdapter, FunctionLayer, Layer, LayerRegistry, Parameter};
use model_loader::{CaffeSchema, InputDecl, LayerSpec, ModelDescription, ModelLoader, Phase};
use utils_crate::ConverterConfig;

use crate::error::GraphError;

/// Параметры построения графа.
#[derive(Debug, Clone)]
pub struct BuildOptions<B: Backend> {
    /// Фаза сети; все, кроме `TEST`, включает режим обучения.
    pub phase: Phase,
    /// Устройство для параметров и входов-массивов.
    pub device: B::Device,
}

impl<B: Backend> BuildOptions<B> {
    /// Параметры с явной фазой.
    pub const fn new(phase: Phase, device: B::Device) -> Self {
        Self { phase, device }
    }

    /// Фаза из секции `[net]` конфигурации.
    #[must_use]
    pub fn from_config(config: &ConverterConfig, device: B::Device) -> Self {
        Self::new(config.net.phase.into(), device)
    }
}

/// Узел графа: модуль и его топология.
#[derive(Debug)]
pub struct GraphNode<B: Backend> {
    /// Имя слоя.
    pub name: String,
    /// Тип, по которому найден конструктор.
    pub type_name: String,
    /// Модуль.
    pub module: Box<dyn Layer<B>>,
    /// Имена входов (`bottom`).
    pub input_names: Vec<String>,
    /// Имена выходов (`top`).
    pub output_names: Vec<String>,
    /// Вес потерь для каждого выхода.
    pub loss_weights: Vec<f32>,
    /// Спроецированные `ParamSpec` (`lr_mult`, `decay_mult`) по параметрам.
    pub optimization_params: Vec<Value>,
}

impl<B: Backend> GraphNode<B> {
    /// Слой выполняется на месте: выход совпадает с одним из входов.
    #[must_use]
    pub fn is_in_place(&self) -> bool {
        self.output_names.iter().any(|name| self.input_names.contains(name))
    }
}

/// Исполняемый граф модели Caffe.
#[derive(Debug)]
pub struct Graph<B: Backend> {
    pub(crate) name: String,
    pub(crate) inputs: Vec<InputDecl>,
    pub(crate) nodes: Vec<GraphNode<B>>,
    pub(crate) skipped: Vec<String>,
    pub(crate) loss_weight_by_output_name: HashMap<String, f32>,
    pub(crate) phase: Phase,
    pub(crate) training: bool,
    pub(crate) device: B::Device,
    pub(crate) blobs: HashMap<String, Blob<B>>,
}

/// Веса потерь по выходам: явный `loss_weight` или 1.0 для типов `*LOSS`,
/// повторенные по кругу на все выходы.
fn loss_weights(spec: &LayerSpec, type_name: &str) -> Vec<f32> {
    let declared = if spec.loss_weight.is_empty() {
        let default = if type_name.to_uppercase().ends_with("LOSS") { 1.0 } else { 0.0 };
        vec![default]
    } else {
        spec.loss_weight.clone()
    };
    declared.iter().copied().cycle().take(spec.output_names.len()).collect()
}

fn python_param_str(spec: &LayerSpec) -> &str {
    spec.python.as_ref().map_or("", |python| python.param_str.as_str())
}

impl<B: Backend> Graph<B> {
    /// Строит граф по описанию сети.
    ///
    /// # Errors
    /// `GraphError::Layer`, если конструктор слоя отклонил параметры.
    pub fn build(
        description: &ModelDescription,
        registry: &LayerRegistry<B>,
        options: BuildOptions<B>,
    ) -> Result<Self, GraphError> {
        let BuildOptions { phase, device } = options;
        let mut nodes = Vec::with_capacity(description.layers.len());
        let mut skipped = Vec::new();

        for spec in &description.layers {
            let type_name = spec.effective_type();
            let Some(constructor) = registry.lookup(type_name, &spec.name) else {
                warn!(
                    "Пропуск слоя [{}, {}, {}]: тип не зарегистрирован",
                    spec.name, type_name, spec.type_name
                );
                skipped.push(spec.name.clone());
                continue;
            };

            let params = spec.primary_param();
            let module: Box<dyn Layer<B>> = match constructor(&params, &device)
                .map_err(|source| GraphError::layer(&spec.name, source))?
            {
                Built::Module(module) => module,
                Built::Function(function) => Box::new(FunctionLayer::new(spec.name.clone(), function)),
                Built::External(layer) => Box::new(
                    ExternalLayerAdapter::<B>::new(layer, python_param_str(spec), spec.output_names.len(), &device)
                        .map_err(|source| GraphError::layer(&spec.name, source))?,
                ),
            };
            debug!(
                "Слой '{}' ({}) построен как {}: {:?} -> {:?}",
                spec.name,
                type_name,
                module.kind(),
                spec.input_names,
                spec.output_names
            );

            nodes.push(GraphNode {
                name: spec.name.clone(),
                type_name: type_name.to_string(),
                module,
                input_names: spec.input_names.clone(),
                output_names: spec.output_names.clone(),
                loss_weights: loss_weights(spec, type_name),
                optimization_params: spec.optimization_params.clone(),
            });
        }

        // Последний записавший выход побеждает.
        let loss_weight_by_output_name = nodes
            .iter()
            .flat_map(|node| node.output_names.iter().cloned().zip(node.loss_weights.iter().copied()))
            .collect();

        info!(
            "Граф '{}' построен: {} модулей, {} пропущено, фаза {}",
            description.name,
            nodes.len(),
            skipped.len(),
            phase
        );
        Ok(Self {
            name: description.name.clone(),
            inputs: description.inputs.clone(),
            nodes,
            skipped,
            loss_weight_by_output_name,
            training: phase.is_training(),
            phase,
            device,
            blobs: HashMap::new(),
        })
    }

    /// Загружает описание (и, если задано, веса) с диска и строит граф с операторами по умолчанию.
    ///
    /// # Errors
    /// `GraphError::Loader` при ошибке чтения, `GraphError::Layer` при ошибке слоя.
    pub fn from_files(
        schema: &CaffeSchema,
        prototxt: &Path,
        weights: Option<&Path>,
        options: BuildOptions<B>,
    ) -> Result<Self, GraphError> {
        let description = ModelLoader::load_description(schema, prototxt)?;
        let mut graph = Self::build(&description, &LayerRegistry::with_defaults(), options)?;
        if let Some(weights) = weights {
            graph.copy_from_file(schema, weights)?;
        }
        Ok(graph)
    }

    /// Имя сети.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Объявленные входы сети.
    #[must_use]
    pub fn declared_inputs(&self) -> &[InputDecl] {
        &self.inputs
    }

    /// Узлы в порядке построения.
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode<B>] {
        &self.nodes
    }

    /// Изменяемые узлы (обновление параметров оптимизатором).
    pub fn nodes_mut(&mut self) -> &mut [GraphNode<B>] {
        &mut self.nodes
    }

    /// Узел по имени слоя.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&GraphNode<B>> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Изменяемый узел по имени слоя.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut GraphNode<B>> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    /// Имена пропущенных слоев.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Вес потерь выхода (0.0 для неизвестных имен).
    #[must_use]
    pub fn loss_weight(&self, output_name: &str) -> f32 {
        self.loss_weight_by_output_name.get(output_name).copied().unwrap_or(0.0)
    }

    /// Все веса потерь по именам выходов.
    #[must_use]
    pub const fn loss_weights(&self) -> &HashMap<String, f32> {
        &self.loss_weight_by_output_name
    }

    /// Фаза, с которой построен граф.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Режим обучения.
    #[must_use]
    pub const fn is_training(&self) -> bool {
        self.training
    }

    /// Переключает режим обучения.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Устройство графа.
    #[must_use]
    pub const fn device(&self) -> &B::Device {
        &self.device
    }

    /// Параметры всех модулей: `(слой, имя параметра, параметр)`.
    #[must_use]
    pub fn parameters(&self) -> Vec<(String, &'static str, Parameter<B>)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.module
                    .parameters()
                    .into_iter()
                    .map(|(param_name, parameter)| (node.name.clone(), param_name, parameter))
            })
            .collect()
    }
}
