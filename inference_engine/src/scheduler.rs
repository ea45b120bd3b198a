// inference_engine/src/scheduler.rs

//! Планировщик прямого прохода.
//!
//! Один проход по графу: модуль запускается, когда все его входы связаны.
//! Модули, все выходы которых уже переданы во входах, не запускаются; это множество
//! вычисляется один раз до прохода, поэтому слои "на месте" выполняются.

use std::collections::{HashMap, HashSet};

use burn::tensor::{backend::Backend, TensorData};
use tracing::debug;

use core_burn::{Blob, ForwardContext};

use crate::{error::GraphError, graph::Graph};

/// Значение входа или выхода графа.
#[derive(Debug, Clone)]
pub enum Feed<B: Backend> {
    /// Тензор на устройстве (граф автодифференцирования сохраняется).
    Tensor(Blob<B>),
    /// Массив на хосте.
    Array(TensorData),
}

impl<B: Backend> Feed<B> {
    /// Тензор, если это `Feed::Tensor`.
    #[must_use]
    pub fn into_tensor(self) -> Option<Blob<B>> {
        match self {
            Self::Tensor(blob) => Some(blob),
            Self::Array(_) => None,
        }
    }

    /// Массив, если это `Feed::Array`.
    #[must_use]
    pub fn into_array(self) -> Option<TensorData> {
        match self {
            Self::Array(data) => Some(data),
            Self::Tensor(_) => None,
        }
    }
}

impl<B: Backend> From<Blob<B>> for Feed<B> {
    fn from(blob: Blob<B>) -> Self {
        Self::Tensor(blob)
    }
}

impl<B: Backend> From<TensorData> for Feed<B> {
    fn from(data: TensorData) -> Self {
        Self::Array(data)
    }
}

impl<B: Backend> Graph<B> {
    /// Прямой проход.
    ///
    /// Если все входы тензоры, выходы тоже тензоры. Иначе все входы должны быть
    /// массивами, и выходы возвращаются массивами. Возвращаются только истинные выходы:
    /// вычисленные каким-либо модулем и не потребляемые другим модулем.
    ///
    /// # Errors
    /// `GraphError::MixedInputs` при смешанных входах, `MissingVariable`, если вход
    /// модуля нельзя получить, `Layer` при ошибке модуля.
    pub fn forward(&mut self, inputs: HashMap<String, Feed<B>>) -> Result<HashMap<String, Feed<B>>, GraphError> {
        let tensor_mode = inputs.values().all(|feed| matches!(feed, Feed::Tensor(_)));
        if tensor_mode {
            let inputs = inputs
                .into_iter()
                .filter_map(|(name, feed)| feed.into_tensor().map(|blob| (name, blob)))
                .collect();
            let outputs = self.forward_tensors(inputs)?;
            return Ok(outputs.into_iter().map(|(name, blob)| (name, Feed::Tensor(blob))).collect());
        }

        let mut arrays = HashMap::with_capacity(inputs.len());
        for (name, feed) in inputs {
            match feed {
                Feed::Array(data) => {
                    arrays.insert(name, data);
                }
                Feed::Tensor(_) => return Err(GraphError::MixedInputs { name }),
            }
        }
        let outputs = self.forward_arrays(arrays)?;
        Ok(outputs.into_iter().map(|(name, data)| (name, Feed::Array(data))).collect())
    }

    /// Прямой проход над массивами на хосте.
    ///
    /// # Errors
    /// См. [`Graph::forward`]; `GraphError::Layer`, если массив не приводится к тензору.
    pub fn forward_arrays(
        &mut self,
        inputs: HashMap<String, TensorData>,
    ) -> Result<HashMap<String, TensorData>, GraphError> {
        let mut tensors = HashMap::with_capacity(inputs.len());
        for (name, data) in inputs {
            let blob = Blob::from_data(data, &self.device).map_err(|source| GraphError::layer(&name, source))?;
            tensors.insert(name, blob);
        }
        let outputs = self.forward_tensors(tensors)?;
        Ok(outputs.into_iter().map(|(name, blob)| (name, blob.into_data())).collect())
    }

    /// Прямой проход над тензорами.
    ///
    /// # Errors
    /// См. [`Graph::forward`].
    pub fn forward_tensors(&mut self, inputs: HashMap<String, Blob<B>>) -> Result<HashMap<String, Blob<B>>, GraphError> {
        let ctx = ForwardContext {
            training: self.training,
        };
        let mut variables = inputs;

        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.output_names.iter().all(|name| variables.contains_key(name)))
            .map(|(index, _)| index)
            .collect();

        while !pending.is_empty() {
            let Some(position) = pending.iter().position(|&index| {
                self.nodes[index]
                    .input_names
                    .iter()
                    .all(|name| variables.contains_key(name))
            }) else {
                let node = &self.nodes[pending[0]];
                let name = node
                    .input_names
                    .iter()
                    .find(|name| !variables.contains_key(*name))
                    .cloned()
                    .unwrap_or_default();
                return Err(GraphError::MissingVariable { name });
            };
            let node = &mut self.nodes[pending.remove(position)];

            let node_inputs = node
                .input_names
                .iter()
                .filter_map(|name| variables.get(name).cloned())
                .collect();
            debug!("Выполняется слой '{}' ({})", node.name, node.type_name);
            let outputs = node
                .module
                .forward(node_inputs, &ctx)
                .map_err(|source| GraphError::layer(&node.name, source))?;
            for (name, blob) in node.output_names.iter().zip(outputs) {
                variables.insert(name.clone(), blob);
            }
        }

        let true_outputs = self.true_output_names();
        self.blobs.clone_from(&variables);
        Ok(variables
            .into_iter()
            .filter(|(name, _)| true_outputs.contains(name))
            .collect())
    }

    /// Имена истинных выходов: вычисляются каким-либо модулем и не потребляются
    /// другим модулем (потребитель "на месте" выход не отменяет).
    #[must_use]
    pub fn true_output_names(&self) -> HashSet<String> {
        let produced: HashSet<&String> = self.nodes.iter().flat_map(|node| &node.output_names).collect();
        let consumed: HashSet<&String> = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.input_names
                    .iter()
                    .filter(move |name| !node.output_names.contains(name))
            })
            .collect();
        produced.difference(&consumed).map(|name| (*name).clone()).collect()
    }

    /// Значение переменной после последнего прямого прохода.
    #[must_use]
    pub fn blob(&self, name: &str) -> Option<&Blob<B>> {
        self.blobs.get(name)
    }

    /// Все переменные последнего прямого прохода.
    #[must_use]
    pub const fn blobs(&self) -> &HashMap<String, Blob<B>> {
        &self.blobs
    }
}
