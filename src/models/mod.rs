//! Model loading, inference and result assembly

pub mod cache;
pub mod inference;
pub mod loader;
pub mod summary;

pub use cache::CachedModelStore;
pub use inference::InferenceEngine;
pub use loader::{ModelLoader, OnnxRegressor};

use crate::error::PipelineError;
use crate::types::ModelId;
use ndarray::Array2;
use std::sync::Arc;

/// A loaded, pre-trained regression artifact.
pub trait Regressor: Send + Sync {
    /// One prediction per feature matrix row, in row order.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError>;
}

/// Resolves model ids to loaded artifacts.
pub trait ModelStore: Send + Sync {
    fn load(&self, model_id: ModelId) -> Result<Arc<dyn Regressor>, PipelineError>;
}
