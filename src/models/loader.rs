//! ONNX model loader

use crate::config::ModelsConfig;
use crate::error::PipelineError;
use crate::models::{ModelStore, Regressor};
use crate::types::ModelId;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Loaded ONNX regressor with metadata
pub struct OnnxRegressor {
    /// Model name
    name: String,
    /// ONNX Runtime session; running it needs exclusive access
    session: Mutex<Session>,
    /// Input name for the feature matrix
    input_name: String,
    /// Output name for the predictions
    output_name: String,
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        let (rows, cols) = features.dim();

        // skl2onnx exports take float32 input of shape [N, n_features]
        let shape = vec![rows as i64, cols as i64];
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let input_tensor = Tensor::from_array((shape, data)).map_err(prediction_failure)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PipelineError::Prediction(format!("Session lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(prediction_failure)?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            PipelineError::Prediction(format!("Model output '{}' missing", self.output_name))
        })?;

        // Regressors emit [N] or [N, 1]; either way the data is one value per row
        let predictions: Vec<f64> = match output.try_extract_tensor::<f32>() {
            Ok((_, data)) => data.iter().map(|&v| v as f64).collect(),
            Err(_) => {
                let (_, data) = output
                    .try_extract_tensor::<f64>()
                    .map_err(prediction_failure)?;
                data.to_vec()
            }
        };

        debug!(
            model = %self.name,
            rows = rows,
            predictions = predictions.len(),
            "ONNX inference complete"
        );

        Ok(predictions)
    }
}

fn prediction_failure(err: impl Display) -> PipelineError {
    PipelineError::Prediction(err.to_string())
}

fn load_failure(model_id: ModelId, err: impl Display) -> PipelineError {
    PipelineError::ModelLoad {
        model_id: model_id.to_string(),
        reason: err.to_string(),
    }
}

/// Loader for ONNX models stored as `{models_dir}/{model_id}.{extension}`
#[derive(Debug, Clone)]
pub struct ModelLoader {
    models_dir: PathBuf,
    extension: String,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader with default settings (`onnx` artifacts, 1 thread)
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            extension: "onnx".to_string(),
            onnx_threads: 1,
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self {
            models_dir: config.models_dir.clone(),
            extension: config.extension.clone(),
            onnx_threads: config.onnx_threads.max(1),
        }
    }

    /// Path of the artifact for a model id
    pub fn artifact_path(&self, model_id: ModelId) -> PathBuf {
        self.models_dir.join(model_id.file_name(&self.extension))
    }

    /// Model ids whose artifact is present in the store
    pub fn available_models(&self) -> Vec<ModelId> {
        ModelId::ALL
            .into_iter()
            .filter(|id| self.artifact_path(*id).is_file())
            .collect()
    }

    /// Load a single ONNX model from the store
    pub fn load_model(&self, model_id: ModelId) -> Result<OnnxRegressor, PipelineError> {
        let path = self.artifact_path(model_id);

        if !path.is_file() {
            return Err(PipelineError::ModelNotFound {
                model_id: model_id.to_string(),
                path,
            });
        }

        info!(model = %model_id, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| load_failure(model_id, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_failure(model_id, e))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| load_failure(model_id, e))?
            .commit_from_file(&path)
            .map_err(|e| load_failure(model_id, e))?;

        // Get input/output names
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("variable") || o.name.contains("output"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "variable".to_string());

        info!(
            model = %model_id,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(OnnxRegressor {
            name: model_id.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl ModelStore for ModelLoader {
    fn load(&self, model_id: ModelId) -> Result<Arc<dyn Regressor>, PipelineError> {
        Ok(Arc::new(self.load_model(model_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        let loader = ModelLoader::new("/srv/trained_models");
        assert_eq!(
            loader.artifact_path(ModelId::Knn),
            PathBuf::from("/srv/trained_models/knn_model.onnx")
        );
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::new(dir.path());

        let err = loader.load(ModelId::DecisionTree).err().unwrap();
        match err {
            PipelineError::ModelNotFound { model_id, path } => {
                assert_eq!(model_id, "dt_model");
                assert_eq!(path, dir.path().join("dt_model.onnx"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_available_models() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lr_model.onnx"), b"").unwrap();
        std::fs::write(dir.path().join("knn_model.joblib"), b"").unwrap();

        let loader = ModelLoader::new(dir.path());
        assert_eq!(loader.available_models(), vec![ModelId::LinearRegression]);
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lr_model.onnx"), b"not an onnx graph").unwrap();

        let loader = ModelLoader::new(dir.path());
        let err = loader.load(ModelId::LinearRegression).err().unwrap();
        assert!(matches!(err, PipelineError::ModelLoad { ref model_id, .. } if model_id == "lr_model"));
    }

    /// Minimal protobuf writer for building ONNX graphs in tests.
    mod onnx {
        fn varint(mut value: u64, out: &mut Vec<u8>) {
            loop {
                let byte = (value & 0x7f) as u8;
                value >>= 7;
                if value == 0 {
                    out.push(byte);
                    return;
                }
                out.push(byte | 0x80);
            }
        }

        fn int_field(field: u64, value: i64, out: &mut Vec<u8>) {
            varint(field << 3, out);
            varint(value as u64, out);
        }

        fn bytes_field(field: u64, data: &[u8], out: &mut Vec<u8>) {
            varint((field << 3) | 2, out);
            varint(data.len() as u64, out);
            out.extend_from_slice(data);
        }

        const FLOAT: i64 = 1;

        /// ValueInfoProto for a float tensor of shape `[N, cols]`.
        fn value_info(name: &str, cols: i64) -> Vec<u8> {
            let mut batch = Vec::new();
            bytes_field(2, b"N", &mut batch);
            let mut width = Vec::new();
            int_field(1, cols, &mut width);

            let mut shape = Vec::new();
            bytes_field(1, &batch, &mut shape);
            bytes_field(1, &width, &mut shape);

            let mut tensor = Vec::new();
            int_field(1, FLOAT, &mut tensor);
            bytes_field(2, &shape, &mut tensor);

            let mut ty = Vec::new();
            bytes_field(1, &tensor, &mut ty);

            let mut info = Vec::new();
            bytes_field(1, name.as_bytes(), &mut info);
            bytes_field(2, &ty, &mut info);
            info
        }

        fn initializer(name: &str, dims: &[i64], values: &[f32]) -> Vec<u8> {
            let mut tensor = Vec::new();
            for &dim in dims {
                int_field(1, dim, &mut tensor);
            }
            int_field(2, FLOAT, &mut tensor);
            bytes_field(8, name.as_bytes(), &mut tensor);
            let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            bytes_field(9, &raw, &mut tensor);
            tensor
        }

        fn node(op_type: &str, inputs: &[&str], outputs: &[&str]) -> Vec<u8> {
            let mut node = Vec::new();
            for input in inputs {
                bytes_field(1, input.as_bytes(), &mut node);
            }
            for output in outputs {
                bytes_field(2, output.as_bytes(), &mut node);
            }
            bytes_field(4, op_type.as_bytes(), &mut node);
            node
        }

        /// `variable = float_input @ W + b` over `features` inputs, with the
        /// un-biased product exposed first as `matmul_raw`.
        pub fn linear_model(features: usize, weight: f32, bias: f32) -> Vec<u8> {
            let mut graph = Vec::new();
            bytes_field(1, &node("MatMul", &["float_input", "W"], &["matmul_raw"]), &mut graph);
            bytes_field(1, &node("Add", &["matmul_raw", "B"], &["variable"]), &mut graph);
            bytes_field(2, b"linear", &mut graph);
            bytes_field(
                5,
                &initializer("W", &[features as i64, 1], &vec![weight; features]),
                &mut graph,
            );
            bytes_field(5, &initializer("B", &[1], &[bias]), &mut graph);
            bytes_field(11, &value_info("float_input", features as i64), &mut graph);
            bytes_field(12, &value_info("matmul_raw", 1), &mut graph);
            bytes_field(12, &value_info("variable", 1), &mut graph);

            let mut opset = Vec::new();
            int_field(2, 13, &mut opset);

            let mut model = Vec::new();
            int_field(1, 8, &mut model);
            bytes_field(2, b"fuel-price-inference-tests", &mut model);
            bytes_field(7, &graph, &mut model);
            bytes_field(8, &opset, &mut model);
            model
        }
    }

    #[test]
    fn test_onnx_regressor_predicts_one_value_per_row() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lr_model.onnx"), onnx::linear_model(8, 0.5, 5.0)).unwrap();

        let regressor = ModelLoader::new(dir.path())
            .load_model(ModelId::LinearRegression)
            .unwrap();
        assert_eq!(regressor.input_name, "float_input");
        assert_eq!(regressor.output_name, "variable");

        let features = Array2::from_shape_fn((3, 8), |(i, j)| match i {
            0 => 0.0,
            1 => 1.0,
            _ => j as f64,
        });

        let predictions = regressor.predict(&features).unwrap();
        assert_eq!(predictions, vec![5.0, 9.0, 19.0]);
    }
}
