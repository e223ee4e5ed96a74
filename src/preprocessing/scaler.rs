//! Standard (z-score) scaling

use crate::error::PreprocessError;
use polars::prelude::*;
use std::collections::HashMap;

/// Parameters for one fitted column: `(x - mean) / scale`
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScalerParams {
    mean: f64,
    scale: f64,
}

/// Standard scaler using the population standard deviation.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    params: HashMap<String, ScalerParams>,
}

impl StandardScaler {
    /// Fit on the float columns of a frame.
    ///
    /// Constant columns get a scale of 1.0 so they are only centred.
    pub fn fit(df: &DataFrame, columns: &[&str]) -> Result<Self, PreprocessError> {
        let mut params = HashMap::with_capacity(columns.len());

        for col_name in columns {
            let values = df.column(col_name)?.as_materialized_series().f64()?;
            params.insert(col_name.to_string(), Self::compute_params(values));
        }

        Ok(Self { params })
    }

    fn compute_params(values: &Float64Chunked) -> ScalerParams {
        let n = values.len() as f64;
        let mean = values.mean().unwrap_or(0.0);
        let variance = values.var(0).unwrap_or(0.0);

        // Variance within rounding error of zero counts as constant.
        let eps = f64::EPSILON;
        let bound = n * eps * variance + (n * mean * eps).powi(2);
        let scale = if variance <= bound {
            1.0
        } else {
            variance.sqrt()
        };

        ScalerParams { mean, scale }
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame, PreprocessError> {
        let mut result = df.clone();

        for (col_name, params) in &self.params {
            let values = df.column(col_name)?.as_materialized_series().f64()?;

            let scaled: Float64Chunked = values
                .into_iter()
                .map(|value| value.map(|v| (v - params.mean) / params.scale))
                .collect();

            result.with_column(scaled.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    pub fn fit_transform(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, PreprocessError> {
        Self::fit(df, columns)?.transform(df)
    }
}
