//! Fuel Price Inference Library
//!
//! Preprocesses raw fuel price collection datasets and scores them with
//! pre-trained KNN, linear regression and decision tree regressors.

pub mod config;
pub mod dataset_reader;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod report_writer;
pub mod types;

pub use config::AppConfig;
pub use dataset_reader::DatasetReader;
pub use error::{FailureKind, PipelineError, PreprocessError};
pub use models::inference::InferenceEngine;
pub use preprocessing::FeaturePreprocessor;
pub use report_writer::ReportWriter;
pub use types::{Dataset, ModelId, ResultPayload};
