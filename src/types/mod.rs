//! Type definitions for the inference pipeline

pub mod dataset;
pub mod model_id;
pub mod report;

pub use dataset::Dataset;
pub use model_id::ModelId;
pub use report::{Diagnostics, PredictionStats, ResultPayload};
