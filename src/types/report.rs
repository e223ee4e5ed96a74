//! Result payloads returned for every inference request

use crate::error::{FailureKind, PipelineError};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Name of the per-row field carrying the model's prediction.
pub const PREDICTION_FIELD: &str = "Predicted_Valor_de_Venda";

/// Summary statistics over the raw predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Rows removed by the silent filters of preprocessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Rows whose product was not the modelled one
    pub dropped_by_product: usize,
    /// Rows whose collection date could not be parsed
    pub dropped_by_date: usize,
}

impl Diagnostics {
    pub fn total_dropped(&self) -> usize {
        self.dropped_by_product + self.dropped_by_date
    }
}

/// Successful inference over a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub model_id: String,
    pub success: bool,
    /// Shape of the dataset as received, before any filtering
    pub data_shape: [usize; 2],
    pub results: Vec<f64>,
    /// `None` when no row survived preprocessing
    pub predicted_values: Option<PredictionStats>,
    pub processed_data: Vec<Map<String, JsonValue>>,
    pub diagnostics: Diagnostics,
}

/// Structured failure; never carries partial predictions.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub model_id: String,
    pub success: bool,
    pub error: String,
    pub error_kind: FailureKind,
}

/// Outcome of one request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Success(PredictionReport),
    Failure(FailureReport),
}

impl ResultPayload {
    pub fn failure(model_id: &str, kind: FailureKind, error: impl Into<String>) -> Self {
        ResultPayload::Failure(FailureReport {
            model_id: model_id.to_string(),
            success: false,
            error: error.into(),
            error_kind: kind,
        })
    }

    pub fn from_error(model_id: &str, err: &PipelineError) -> Self {
        Self::failure(model_id, err.kind(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultPayload::Success(_))
    }

    pub fn model_id(&self) -> &str {
        match self {
            ResultPayload::Success(report) => &report.model_id,
            ResultPayload::Failure(report) => &report.model_id,
        }
    }

    pub fn as_success(&self) -> Option<&PredictionReport> {
        match self {
            ResultPayload::Success(report) => Some(report),
            ResultPayload::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailureReport> {
        match self {
            ResultPayload::Success(_) => None,
            ResultPayload::Failure(report) => Some(report),
        }
    }
}
