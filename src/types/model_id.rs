//! Identifiers of the pre-trained regression models

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pre-trained model selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    /// K-nearest neighbours regressor
    #[serde(rename = "knn_model")]
    Knn,
    /// Linear regression
    #[serde(rename = "lr_model")]
    LinearRegression,
    /// Decision tree regressor
    #[serde(rename = "dt_model")]
    DecisionTree,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Knn, ModelId::LinearRegression, ModelId::DecisionTree];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Knn => "knn_model",
            ModelId::LinearRegression => "lr_model",
            ModelId::DecisionTree => "dt_model",
        }
    }

    /// Artifact file name, e.g. `lr_model.onnx`.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.as_str(), extension)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PipelineError::InvalidModelId {
                model_id: s.to_string(),
            })
    }
}
