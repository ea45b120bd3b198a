// inference_engine/src/binder.rs

//! Привязка сериализованных весов к параметрам модулей.
//!
//! Блобы слоя сопоставляются по позиции с именами `["weight", "bias"]`; лишние
//! блобы игнорируются. Слои, которых нет в графе или в весах, пропускаются.

use std::path::Path;

use burn::tensor::backend::Backend;
use tracing::{debug, info};

use core_burn::Blob;
use model_loader::{BlobRecord, CaffeSchema, ModelLoader, WeightBlobSet};

use crate::{error::GraphError, graph::Graph};

const PARAMETER_NAMES: [&str; 2] = ["weight", "bias"];

impl<B: Backend> Graph<B> {
    /// Привязывает веса из набора блобов. Возвращает число слоев, получивших веса.
    ///
    /// # Errors
    /// `GraphError::Layer` с `LayerError::ShapeMismatch`, если длина данных блоба
    /// не совпадает с формой, и `UnsupportedBinding` для модулей без параметров.
    pub fn copy_from(&mut self, weights: &WeightBlobSet) -> Result<usize, GraphError> {
        let mut bound = 0;
        for layer in weights.layers() {
            let Some(node) = self.nodes.iter_mut().find(|node| node.name == layer.name) else {
                continue;
            };
            if layer.blobs.is_empty() {
                continue;
            }

            let device = &self.device;
            let mut tensors = layer
                .blobs
                .iter()
                .take(PARAMETER_NAMES.len())
                .map(|record| to_blob::<B>(record, device));
            let weight = tensors
                .next()
                .transpose()
                .map_err(|source| GraphError::layer(&layer.name, source))?;
            let bias = tensors
                .next()
                .transpose()
                .map_err(|source| GraphError::layer(&layer.name, source))?;

            debug!(
                "Слой '{}': привязка {}",
                layer.name,
                PARAMETER_NAMES[..layer.blobs.len().min(PARAMETER_NAMES.len())].join(", ")
            );
            node.module
                .set_parameters(weight, bias)
                .map_err(|source| GraphError::layer(&layer.name, source))?;
            bound += 1;
        }
        info!("Веса привязаны к {} слоям", bound);
        Ok(bound)
    }

    /// Читает `.caffemodel` и привязывает веса.
    ///
    /// # Errors
    /// `GraphError::Loader` при ошибке чтения или разбора, далее как [`Graph::copy_from`].
    pub fn copy_from_file(&mut self, schema: &CaffeSchema, path: &Path) -> Result<usize, GraphError> {
        let weights = ModelLoader::load_weights(schema, path)?;
        self.copy_from(&weights)
    }
}

fn to_blob<B: Backend>(record: &BlobRecord, device: &B::Device) -> Result<Blob<B>, core_burn::LayerError> {
    Blob::from_shape_data(&record.shape, record.data.clone(), device)
}
