//! Label encoding of categorical features

use crate::error::PreprocessError;
use polars::prelude::*;
use std::collections::HashMap;

/// Label given to missing categorical cells before encoding.
pub const MISSING_LABEL: &str = "nan";

/// Maps each distinct label of a column to its rank among the sorted
/// distinct labels of that column.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    // column name -> sorted distinct labels
    classes: HashMap<String, Vec<String>>,
}

impl LabelEncoder {
    /// Fit on the string columns of a frame; missing cells count as `nan`.
    pub fn fit(df: &DataFrame, columns: &[&str]) -> Result<Self, PreprocessError> {
        let mut classes = HashMap::with_capacity(columns.len());

        for col_name in columns {
            let labels = df.column(col_name)?.as_materialized_series().str()?;

            let mut distinct: Vec<String> = labels
                .into_iter()
                .map(|label| label.unwrap_or(MISSING_LABEL).to_string())
                .collect();
            distinct.sort_unstable();
            distinct.dedup();

            classes.insert(col_name.to_string(), distinct);
        }

        Ok(Self { classes })
    }

    /// Replace every fitted column with its float codes.
    ///
    /// Labels not seen during fit become nulls.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame, PreprocessError> {
        let mut result = df.clone();

        for (col_name, classes) in &self.classes {
            let labels = df.column(col_name)?.as_materialized_series().str()?;

            let codes: Float64Chunked = labels
                .into_iter()
                .map(|label| {
                    let label = label.unwrap_or(MISSING_LABEL);
                    classes
                        .binary_search_by(|class| class.as_str().cmp(label))
                        .ok()
                        .map(|code| code as f64)
                })
                .collect();

            result.with_column(codes.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    /// Fit on a frame and encode it in one step.
    pub fn fit_transform(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, PreprocessError> {
        Self::fit(df, columns)?.transform(df)
    }
}
