//! Mean imputation of missing numeric values

use crate::error::PreprocessError;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Replaces the nulls of each fitted column with that column's mean.
#[derive(Debug, Clone, Default)]
pub struct MeanImputer {
    fill_values: HashMap<String, f64>,
}

impl MeanImputer {
    /// Fit on the float columns of a frame.
    ///
    /// A column with no observed value takes `fallback`, or fails with
    /// `EmptyFeature` when there is none.
    pub fn fit(
        df: &DataFrame,
        columns: &[&str],
        fallback: Option<f64>,
    ) -> Result<Self, PreprocessError> {
        let mut fill_values = HashMap::with_capacity(columns.len());

        for col_name in columns {
            let values = df.column(col_name)?.as_materialized_series().f64()?;

            let fill = values
                .mean()
                .or(fallback)
                .ok_or_else(|| PreprocessError::EmptyFeature(col_name.to_string()))?;

            debug!(column = %col_name, fill = fill, nulls = values.null_count(), "Imputer fitted");
            fill_values.insert(col_name.to_string(), fill);
        }

        Ok(Self { fill_values })
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame, PreprocessError> {
        let mut result = df.clone();

        for (col_name, fill) in &self.fill_values {
            let values = df.column(col_name)?.as_materialized_series().f64()?;

            let filled: Float64Chunked = values
                .into_iter()
                .map(|value| Some(value.unwrap_or(*fill)))
                .collect();

            result.with_column(filled.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }
}
