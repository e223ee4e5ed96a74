//! Error types for the inference pipeline

use polars::prelude::PolarsError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while turning a dataset into a feature matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("Missing required features: {}", .0.join(", "))]
    MissingFeature(Vec<String>),

    #[error("Non-numeric value {value:?} in feature '{column}' (row {row})")]
    NonNumericValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Feature '{0}' has no observed values to impute from")]
    EmptyFeature(String),

    #[error("Data frame error: {0}")]
    Frame(String),
}

impl From<PolarsError> for PreprocessError {
    fn from(err: PolarsError) -> Self {
        PreprocessError::Frame(err.to_string())
    }
}

/// Failures of a single inference request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid model ID '{model_id}'. Must be one of: knn_model, lr_model, dt_model")]
    InvalidModelId { model_id: String },

    #[error("Pre-trained model not found: {}", path.display())]
    ModelNotFound { model_id: String, path: PathBuf },

    #[error("Failed to load model '{model_id}': {reason}")]
    ModelLoad { model_id: String, reason: String },

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// Machine-readable failure classification carried by failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidModelId,
    ModelNotFound,
    ModelLoad,
    MissingFeature,
    NonNumericValue,
    EmptyFeature,
    Prediction,
    DataFrame,
    InvalidCsv,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidModelId => "invalid_model_id",
            FailureKind::ModelNotFound => "model_not_found",
            FailureKind::ModelLoad => "model_load",
            FailureKind::MissingFeature => "missing_feature",
            FailureKind::NonNumericValue => "non_numeric_value",
            FailureKind::EmptyFeature => "empty_feature",
            FailureKind::Prediction => "prediction",
            FailureKind::DataFrame => "data_frame",
            FailureKind::InvalidCsv => "invalid_csv",
        }
    }

    /// Whether the failure was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            FailureKind::ModelNotFound
                | FailureKind::ModelLoad
                | FailureKind::Prediction
                | FailureKind::DataFrame
        )
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::InvalidModelId { .. } => FailureKind::InvalidModelId,
            PipelineError::ModelNotFound { .. } => FailureKind::ModelNotFound,
            PipelineError::ModelLoad { .. } => FailureKind::ModelLoad,
            PipelineError::Preprocess(PreprocessError::MissingFeature(_)) => {
                FailureKind::MissingFeature
            }
            PipelineError::Preprocess(PreprocessError::NonNumericValue { .. }) => {
                FailureKind::NonNumericValue
            }
            PipelineError::Preprocess(PreprocessError::EmptyFeature(_)) => {
                FailureKind::EmptyFeature
            }
            PipelineError::Preprocess(PreprocessError::Frame(_)) => FailureKind::DataFrame,
            PipelineError::Prediction(_) => FailureKind::Prediction,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind().is_client_error()
    }
}
