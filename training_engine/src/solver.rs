// training_engine/src/solver.rs

//! SGD-солвер в форме Caffe.
//!
//! Одна итерация: `iter_size` прямых и обратных проходов с суммированием
//! градиентов, затем для каждого параметра
//! `v = momentum * v + lr * lr_mult * (g + weight_decay * decay_mult * w)`, `w -= v`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::{
    module::ParamId,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use serde_json::Value;
use tracing::{debug, info, warn};

use core_burn::{Blob, LayerRegistry};
use inference_engine::{BuildOptions, Graph, GraphError};
use model_loader::{project_message, CaffeSchema, MessageDyn, ModelDescription, ModelLoader, Phase};

use crate::{error::SolverError, lr_policy::LrPolicy, params::SolverParams};

type Gradients<B> = HashMap<ParamId, Blob<<B as AutodiffBackend>::InnerBackend>>;

/// Вид регуляризации весов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regularization {
    L1,
    L2,
}

/// Солвер стохастического градиентного спуска с моментом.
#[derive(Debug)]
pub struct SgdSolver<B: AutodiffBackend> {
    graph: Graph<B>,
    params: SolverParams,
    policy: LrPolicy,
    regularization: Regularization,
    iter: u64,
    history: Gradients<B>,
}

/// Относительный путь сначала ищется рядом с файлом солвера.
fn resolve_net_path(base_dir: &Path, net: &str) -> PathBuf {
    let candidate = base_dir.join(net);
    if candidate.exists() {
        candidate
    } else {
        PathBuf::from(net)
    }
}

/// Сеть для обучения: `train_net`, `train_net_param`, `net`, `net_param` по порядку.
fn train_net_description(
    message: &dyn MessageDyn,
    params: &SolverParams,
    base_dir: &Path,
    schema: &CaffeSchema,
) -> Result<ModelDescription, SolverError> {
    if let Some(path) = &params.train_net {
        return Ok(ModelLoader::load_description(schema, &resolve_net_path(base_dir, path))?);
    }
    if let Some(description) = ModelDescription::from_embedded_net(message, "train_net_param")? {
        return Ok(description);
    }
    if let Some(path) = &params.net {
        return Ok(ModelLoader::load_description(schema, &resolve_net_path(base_dir, path))?);
    }
    ModelDescription::from_embedded_net(message, "net_param")?.ok_or(SolverError::MissingNet)
}

/// `lr_mult` / `decay_mult` из `ParamSpec`; по умолчанию 1.
fn multiplier(spec: Option<&Value>, key: &str) -> f64 {
    spec.and_then(|spec| spec.get(key)).and_then(Value::as_f64).unwrap_or(1.0)
}

/// Позиция параметра в списке `param` слоя Caffe.
fn param_index(name: &str) -> usize {
    usize::from(name == "bias")
}

impl<B: AutodiffBackend> SgdSolver<B> {
    /// Читает solver.prototxt и строит обучающую сеть в фазе `TRAIN`.
    ///
    /// # Errors
    /// `SolverError::Loader` при ошибке чтения, `MissingNet`, если сеть не задана,
    /// `InvalidSolver` при противоречивых параметрах.
    pub fn from_file(
        path: &Path,
        schema: &CaffeSchema,
        registry: &LayerRegistry<B>,
        device: &B::Device,
    ) -> Result<Self, SolverError> {
        let message = ModelLoader::load_solver(schema, path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_message(&*message, base_dir, schema, registry, device)
    }

    /// Солвер из уже разобранного `SolverParameter`.
    ///
    /// # Errors
    /// См. [`Self::from_file`].
    pub fn from_message(
        message: &dyn MessageDyn,
        base_dir: &Path,
        schema: &CaffeSchema,
        registry: &LayerRegistry<B>,
        device: &B::Device,
    ) -> Result<Self, SolverError> {
        let params = SolverParams::from_value(project_message(message))?;
        let description = train_net_description(message, &params, base_dir, schema)?;
        let graph = Graph::build(&description, registry, BuildOptions::new(Phase::Train, device.clone()))?;
        Self::new(graph, params)
    }

    /// Солвер над готовым графом.
    ///
    /// # Errors
    /// `SolverError::InvalidSolver` при `iter_size == 0`, неизвестной регуляризации
    /// или неполных параметрах политики.
    pub fn new(graph: Graph<B>, params: SolverParams) -> Result<Self, SolverError> {
        if params.iter_size == 0 {
            return Err(SolverError::invalid("iter_size должен быть больше 0"));
        }
        let regularization = match params.regularization_type.as_str() {
            "L2" => Regularization::L2,
            "L1" => Regularization::L1,
            other => return Err(SolverError::invalid(format!("неизвестная регуляризация '{other}'"))),
        };
        if !params.solver_type.eq_ignore_ascii_case("SGD") {
            warn!("Тип солвера '{}' не поддерживается, используется SGD", params.solver_type);
        }
        let policy = LrPolicy::from_params(&params)?;
        info!(
            "SGD-солвер для сети '{}': base_lr = {}, политика {:?}, momentum = {}, weight_decay = {}, iter_size = {}",
            graph.name(),
            params.base_lr,
            policy,
            params.momentum,
            params.weight_decay,
            params.iter_size
        );
        Ok(Self {
            graph,
            params,
            policy,
            regularization,
            iter: 0,
            history: HashMap::new(),
        })
    }

    /// Обучаемый граф.
    #[must_use]
    pub const fn graph(&self) -> &Graph<B> {
        &self.graph
    }

    /// Изменяемый граф (например, для привязки начальных весов).
    pub fn graph_mut(&mut self) -> &mut Graph<B> {
        &mut self.graph
    }

    /// Параметры солвера.
    #[must_use]
    pub const fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Число выполненных итераций.
    #[must_use]
    pub const fn iter(&self) -> u64 {
        self.iter
    }

    /// Скорость обучения для следующей итерации.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.policy.rate(self.params.base_lr, self.iter)
    }

    /// Выполняет `iterations` итераций и возвращает сумму потерь всех проходов.
    ///
    /// # Errors
    /// `SolverError::Graph` при ошибке прямого прохода, `Layer` при ошибке обновления.
    pub fn step(&mut self, iterations: usize, inputs: &HashMap<String, Blob<B>>) -> Result<f32, SolverError> {
        let mut loss_total = 0.0;
        for _ in 0..iterations {
            let mut gradients: Gradients<B> = HashMap::new();
            let mut iteration_loss = 0.0;
            for _ in 0..self.params.iter_size {
                let outputs = self.graph.forward_tensors(inputs.clone())?;
                let Some(loss) = self.weighted_loss(outputs) else {
                    debug!("Итерация {}: нет выходов с ненулевым весом потерь", self.iter);
                    continue;
                };
                iteration_loss += loss.clone().into_scalar().elem::<f32>();
                let grads = loss.backward();
                for (_, _, parameter) in self.graph.parameters() {
                    let Some(gradient) = parameter.grad(&grads) else {
                        continue;
                    };
                    let accumulated = match gradients.remove(&parameter.id()) {
                        Some(previous) => previous.add(gradient)?,
                        None => gradient,
                    };
                    gradients.insert(parameter.id(), accumulated);
                }
            }

            self.clip_gradients(&mut gradients)?;
            let rate = self.learning_rate();
            self.apply_update(rate, gradients)?;
            if self.params.display > 0 && self.iter % self.params.display == 0 {
                info!("Итерация {}, lr = {}, loss = {}", self.iter, rate, iteration_loss);
            }
            self.iter += 1;
            loss_total += iteration_loss;
        }
        Ok(loss_total)
    }

    /// Выполняет итерации до `max_iter`.
    ///
    /// # Errors
    /// См. [`Self::step`].
    pub fn solve(&mut self, inputs: &HashMap<String, Blob<B>>) -> Result<f32, SolverError> {
        let remaining = usize::try_from(self.params.max_iter.saturating_sub(self.iter))
            .map_err(|_| SolverError::invalid("max_iter слишком велик"))?;
        info!("Обучение: {} итераций (с {} до {})", remaining, self.iter, self.params.max_iter);
        self.step(remaining, inputs)
    }

    /// `Σ loss_weight(name) * sum(output)` по выходам с ненулевым весом.
    fn weighted_loss(&self, outputs: HashMap<String, Blob<B>>) -> Option<Tensor<B, 1>> {
        outputs
            .into_iter()
            .filter_map(|(name, blob)| {
                let weight = self.graph.loss_weight(&name);
                (weight != 0.0).then(|| blob.sum().mul_scalar(weight))
            })
            .reduce(|lhs, rhs| lhs.add(rhs))
    }

    /// Масштабирует градиенты, если их общая L2-норма превышает `clip_gradients`.
    fn clip_gradients(&self, gradients: &mut Gradients<B>) -> Result<(), SolverError> {
        let threshold = self.params.clip_gradients;
        if threshold < 0.0 {
            return Ok(());
        }
        let mut sum_of_squares = 0.0_f64;
        for gradient in gradients.values() {
            sum_of_squares += gradient
                .to_f32_vec()?
                .iter()
                .map(|&value| f64::from(value) * f64::from(value))
                .sum::<f64>();
        }
        let norm = sum_of_squares.sqrt();
        if norm > threshold {
            let scale = threshold / norm;
            info!("Норма градиентов {} ограничена до {} (масштаб {})", norm, threshold, scale);
            for gradient in gradients.values_mut() {
                *gradient = gradient.clone().mul_scalar(scale);
            }
        }
        Ok(())
    }

    fn apply_update(&mut self, rate: f64, mut gradients: Gradients<B>) -> Result<(), SolverError> {
        let momentum = self.params.momentum;
        let weight_decay = self.params.weight_decay;
        for node in self.graph.nodes_mut() {
            for (name, parameter) in node.module.parameters() {
                let id = parameter.id();
                let Some(gradient) = gradients.remove(&id) else {
                    continue;
                };
                let spec = node.optimization_params.get(param_index(name));
                let local_rate = rate * multiplier(spec, "lr_mult");
                let local_decay = weight_decay * multiplier(spec, "decay_mult");

                let value = parameter.value().inner();
                let regularized = if local_decay == 0.0 {
                    gradient
                } else {
                    let penalty = match self.regularization {
                        Regularization::L2 => value.clone(),
                        Regularization::L1 => value.clone().sign(),
                    };
                    gradient.add(penalty.mul_scalar(local_decay))?
                };
                let update = match self.history.remove(&id) {
                    Some(previous) => previous.mul_scalar(momentum).add(regularized.mul_scalar(local_rate))?,
                    None => regularized.mul_scalar(local_rate),
                };
                let updated = value.sub(update.clone())?;
                self.history.insert(id, update);

                let replacement = parameter.with_value(Blob::from_inner(updated))?;
                node.module
                    .set_parameter(name, replacement)
                    .map_err(|source| GraphError::layer(&node.name, source))?;
            }
        }
        Ok(())
    }
}
