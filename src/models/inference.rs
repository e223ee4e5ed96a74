//! Inference orchestration: model loading, preprocessing, prediction and
//! result assembly for one request

use crate::config::AppConfig;
use crate::dataset_reader::DatasetReader;
use crate::error::{FailureKind, PipelineError};
use crate::models::cache::CachedModelStore;
use crate::models::loader::ModelLoader;
use crate::models::summary::summarize;
use crate::models::ModelStore;
use crate::preprocessing::FeaturePreprocessor;
use crate::types::report::{PredictionReport, PREDICTION_FIELD};
use crate::types::{Dataset, ModelId, ResultPayload};
use serde_json::{Number, Value as JsonValue};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the Validate → LoadModel → Preprocess → Predict → Assemble pipeline.
///
/// Holds no per-request state, so one engine can serve concurrent requests.
pub struct InferenceEngine {
    store: Arc<dyn ModelStore>,
    preprocessor: FeaturePreprocessor,
}

impl InferenceEngine {
    /// Create an inference engine from configuration
    pub fn new(config: &AppConfig) -> Self {
        let loader = ModelLoader::from_config(&config.models);
        let available = loader.available_models();
        if available.is_empty() {
            warn!(models_dir = %config.models.models_dir.display(), "No model artifacts found");
        }
        let store: Arc<dyn ModelStore> = if config.models.cache {
            Arc::new(CachedModelStore::new(loader))
        } else {
            Arc::new(loader)
        };

        info!(
            models_dir = %config.models.models_dir.display(),
            available = ?available,
            cache = config.models.cache,
            product = %config.preprocessing.product,
            "Inference engine initialized"
        );

        Self::with_store(store, FeaturePreprocessor::new(&config.preprocessing))
    }

    /// Create an inference engine over a custom model store
    pub fn with_store(store: Arc<dyn ModelStore>, preprocessor: FeaturePreprocessor) -> Self {
        Self {
            store,
            preprocessor,
        }
    }

    /// Read a CSV file and run a request over it.
    ///
    /// The model id is checked before the file is read, so a bad id is
    /// reported as such even when the file is unreadable.
    pub fn run_path(&self, reader: &DatasetReader, path: &Path, model_id: &str) -> ResultPayload {
        if let Err(e) = model_id.parse::<ModelId>() {
            warn!(model = %model_id, error = %e, "Rejected model id");
            return ResultPayload::from_error(model_id, &e);
        }

        match reader.read_path(path) {
            Ok(dataset) => self.run(&dataset, model_id),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read dataset");
                ResultPayload::failure(model_id, FailureKind::InvalidCsv, e.to_string())
            }
        }
    }

    /// Run a request, converting every failure into a structured payload
    pub fn run(&self, dataset: &Dataset, model_id: &str) -> ResultPayload {
        let start = Instant::now();

        match self.try_run(dataset, model_id) {
            Ok(report) => {
                info!(
                    model = %model_id,
                    rows = dataset.row_count(),
                    predicted = report.results.len(),
                    dropped = report.diagnostics.total_dropped(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Inference request succeeded"
                );
                ResultPayload::Success(report)
            }
            Err(e) => {
                warn!(
                    model = %model_id,
                    error_kind = e.kind().as_str(),
                    error = %e,
                    "Inference request failed"
                );
                ResultPayload::from_error(model_id, &e)
            }
        }
    }

    /// Run a request, returning the typed error on failure
    pub fn try_run(
        &self,
        dataset: &Dataset,
        model_id: &str,
    ) -> Result<PredictionReport, PipelineError> {
        let id: ModelId = model_id.parse()?;

        let model = self.store.load(id)?;

        let processed = self.preprocessor.preprocess(dataset)?;

        let predictions = if processed.retained_rows.is_empty() {
            debug!(model = %id, "No rows left after preprocessing, skipping prediction");
            Vec::new()
        } else {
            model.predict(&processed.features)?
        };

        if predictions.len() != processed.retained_rows.len() {
            return Err(PipelineError::Prediction(format!(
                "model returned {} predictions for {} rows",
                predictions.len(),
                processed.retained_rows.len()
            )));
        }

        let processed_data = dataset
            .records(&processed.retained_rows)
            .into_iter()
            .zip(&predictions)
            .map(|(mut record, &prediction)| {
                let value = Number::from_f64(prediction)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null);
                record.insert(PREDICTION_FIELD.to_string(), value);
                record
            })
            .collect();

        let (rows, columns) = dataset.shape();

        Ok(PredictionReport {
            model_id: id.to_string(),
            success: true,
            data_shape: [rows, columns],
            predicted_values: summarize(&predictions),
            results: predictions,
            processed_data,
            diagnostics: processed.diagnostics,
        })
    }
}
