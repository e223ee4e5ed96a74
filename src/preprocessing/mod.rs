//! Feature preprocessing for fuel price model inference.
//!
//! Turns a raw fuel price dataset into the numeric feature matrix the
//! pre-trained regressors were fitted on: product filtering, date
//! decomposition, feature selection, label encoding, mean imputation and
//! standard scaling, in that order.

mod encoder;
mod imputer;
mod scaler;

pub use encoder::{LabelEncoder, MISSING_LABEL};
pub use imputer::MeanImputer;
pub use scaler::StandardScaler;

use crate::config::{AllMissingPolicy, PreprocessingConfig};
use crate::error::PreprocessError;
use crate::types::dataset::parse_number;
use crate::types::{Dataset, Diagnostics};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use tracing::debug;

pub const PRODUCT_COLUMN: &str = "Produto";
pub const DATE_COLUMN: &str = "Data da Coleta";
pub const YEAR_COLUMN: &str = "Ano";
pub const MONTH_COLUMN: &str = "Mes";
pub const DAY_COLUMN: &str = "Dia";

/// Model input columns, in matrix order.
pub const REQUIRED_FEATURES: [&str; 8] = [
    "Produto",
    "Bandeira",
    "Regiao - Sigla",
    "Estado - Sigla",
    "Ano",
    "Mes",
    "Dia",
    "Valor de Compra",
];

/// Features that are label encoded.
pub const CATEGORICAL_FEATURES: [&str; 4] =
    ["Produto", "Bandeira", "Regiao - Sigla", "Estado - Sigla"];

/// Features that are mean imputed.
pub const NUMERIC_FEATURES: [&str; 4] = ["Ano", "Mes", "Dia", "Valor de Compra"];

/// Feature matrix plus the rows it was built from.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// One row per retained dataset row, `REQUIRED_FEATURES.len()` columns
    pub features: Array2<f64>,
    /// Indices of the dataset rows behind each matrix row
    pub retained_rows: Vec<usize>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy)]
enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    fn for_column(name: &str) -> Option<Self> {
        match name {
            YEAR_COLUMN => Some(DatePart::Year),
            MONTH_COLUMN => Some(DatePart::Month),
            DAY_COLUMN => Some(DatePart::Day),
            _ => None,
        }
    }

    fn extract(&self, date: &NaiveDate) -> f64 {
        match self {
            DatePart::Year => date.year() as f64,
            DatePart::Month => date.month() as f64,
            DatePart::Day => date.day() as f64,
        }
    }
}

/// Where a required feature is read from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Column,
    Date(DatePart),
}

/// Preprocessor that transforms a dataset into model input features.
///
/// Encoders, imputers and scalers are fitted on the batch being processed,
/// matching how the training pipeline prepared its inputs.
// TODO: load training-time encoder classes and scaler statistics from a
// sidecar next to each artifact instead of refitting per batch.
#[derive(Debug, Clone)]
pub struct FeaturePreprocessor {
    product: String,
    date_formats: Vec<String>,
    all_missing: AllMissingPolicy,
}

impl FeaturePreprocessor {
    /// Create a preprocessor from configuration.
    pub fn new(config: &PreprocessingConfig) -> Self {
        Self {
            product: config.product.clone(),
            date_formats: config.date_formats.clone(),
            all_missing: config.all_missing,
        }
    }

    /// Build the feature matrix for a dataset.
    ///
    /// Rows for other products and rows with an unparseable collection date
    /// are dropped and counted in the returned diagnostics.
    pub fn preprocess(&self, dataset: &Dataset) -> Result<PreprocessOutput, PreprocessError> {
        let mut diagnostics = Diagnostics::default();
        let mut retained: Vec<usize> = (0..dataset.row_count()).collect();

        if let Some(products) = dataset.text_column(PRODUCT_COLUMN) {
            let is_product = |row: usize| products.get(row) == Some(self.product.as_str());

            if !retained.iter().all(|&row| is_product(row)) {
                retained.retain(|&row| is_product(row));
                diagnostics.dropped_by_product = dataset.row_count() - retained.len();
            }
        }

        // Dates of the retained rows, aligned with `retained`.
        let mut dates: Option<Vec<NaiveDate>> = None;
        if let Some(collected) = dataset.text_column(DATE_COLUMN) {
            let mut kept = Vec::with_capacity(retained.len());
            let mut parsed = Vec::with_capacity(retained.len());

            for &row in &retained {
                match collected.get(row).and_then(|raw| self.parse_date(raw)) {
                    Some(date) => {
                        kept.push(row);
                        parsed.push(date);
                    }
                    None => diagnostics.dropped_by_date += 1,
                }
            }

            retained = kept;
            dates = Some(parsed);
        }

        let sources = self.resolve_sources(dataset, dates.is_some())?;

        debug!(
            rows = dataset.row_count(),
            retained = retained.len(),
            dropped_by_product = diagnostics.dropped_by_product,
            dropped_by_date = diagnostics.dropped_by_date,
            "Rows selected for inference"
        );

        if retained.is_empty() {
            return Ok(PreprocessOutput {
                features: Array2::zeros((0, REQUIRED_FEATURES.len())),
                retained_rows: retained,
                diagnostics,
            });
        }

        let frame = self.select_features(dataset, &retained, dates.as_deref(), &sources)?;

        let frame = LabelEncoder::fit_transform(&frame, &CATEGORICAL_FEATURES)?;

        let fallback = match self.all_missing {
            AllMissingPolicy::Fail => None,
            AllMissingPolicy::Zero => Some(0.0),
        };
        let frame = MeanImputer::fit(&frame, &NUMERIC_FEATURES, fallback)?.transform(&frame)?;

        let frame = StandardScaler::fit_transform(&frame, &REQUIRED_FEATURES)?;

        Ok(PreprocessOutput {
            features: to_matrix(&frame)?,
            retained_rows: retained,
            diagnostics,
        })
    }

    /// Locate every required feature, either as a column or as a part of the
    /// collection date.
    fn resolve_sources(
        &self,
        dataset: &Dataset,
        has_dates: bool,
    ) -> Result<Vec<Source>, PreprocessError> {
        let mut sources = Vec::with_capacity(REQUIRED_FEATURES.len());
        let mut missing = Vec::new();

        for name in REQUIRED_FEATURES {
            if dataset.has_column(name) {
                sources.push(Source::Column);
            } else if let Some(part) = DatePart::for_column(name).filter(|_| has_dates) {
                sources.push(Source::Date(part));
            } else {
                missing.push(name.to_string());
            }
        }

        if !missing.is_empty() {
            return Err(PreprocessError::MissingFeature(missing));
        }

        Ok(sources)
    }

    /// Frame of the required features over the retained rows: raw text for
    /// categorical features, floats with nulls for numeric ones.
    fn select_features(
        &self,
        dataset: &Dataset,
        retained: &[usize],
        dates: Option<&[NaiveDate]>,
        sources: &[Source],
    ) -> Result<DataFrame, PreprocessError> {
        let mut columns: Vec<Column> = Vec::with_capacity(REQUIRED_FEATURES.len());

        for (name, source) in REQUIRED_FEATURES.iter().zip(sources) {
            let column: Series = match source {
                Source::Column if CATEGORICAL_FEATURES.contains(name) => {
                    let labels: Vec<Option<&str>> =
                        retained.iter().map(|&row| dataset.cell(name, row)).collect();
                    Series::new((*name).into(), labels)
                }
                Source::Column => {
                    let values = retained
                        .iter()
                        .map(|&row| match dataset.cell(name, row) {
                            None => Ok(None),
                            Some(raw) => parse_number(raw).map(Some).ok_or_else(|| {
                                PreprocessError::NonNumericValue {
                                    column: name.to_string(),
                                    row,
                                    value: raw.to_string(),
                                }
                            }),
                        })
                        .collect::<Result<Vec<Option<f64>>, _>>()?;
                    Series::new((*name).into(), values)
                }
                Source::Date(part) => {
                    let values: Vec<Option<f64>> = (0..retained.len())
                        .map(|i| dates.and_then(|d| d.get(i)).map(|d| part.extract(d)))
                        .collect();
                    Series::new((*name).into(), values)
                }
            };
            columns.push(column.into());
        }

        Ok(DataFrame::new(columns)?)
    }

    fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();

        self.date_formats.iter().find_map(|format| {
            NaiveDate::parse_from_str(raw, format)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, format).map(|dt| dt.date()))
                .ok()
        })
    }
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new(&PreprocessingConfig::default())
    }
}

/// Copy the scaled feature columns into a row-major matrix.
fn to_matrix(frame: &DataFrame) -> Result<Array2<f64>, PreprocessError> {
    let mut features = Array2::zeros((frame.height(), REQUIRED_FEATURES.len()));

    for (j, name) in REQUIRED_FEATURES.iter().enumerate() {
        let values = frame.column(name)?.as_materialized_series().f64()?;
        for (i, value) in values.into_iter().enumerate() {
            features[[i, j]] = value
                .ok_or_else(|| PreprocessError::Frame(format!("null left in feature '{}'", name)))?;
        }
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 7] = [
        "Regiao - Sigla",
        "Estado - Sigla",
        "Produto",
        "Data da Coleta",
        "Valor de Venda",
        "Valor de Compra",
        "Bandeira",
    ];

    fn row<'a>(
        region: &'a str,
        state: &'a str,
        product: &'a str,
        date: &'a str,
        purchase: &'a str,
        flag: &'a str,
    ) -> Vec<&'a str> {
        vec![region, state, product, date, "", purchase, flag]
    }

    fn sample() -> Dataset {
        Dataset::from_rows(
            HEADER,
            vec![
                row("SE", "SP", "GASOLINA", "02/01/2023", "4.5", "RAIZEN"),
                row("S", "PR", "ETANOL", "03/01/2023", "3.1", "BRANCA"),
                row("NE", "BA", "GASOLINA", "not a date", "4.7", "VIBRA"),
                row("SE", "RJ", "GASOLINA", "2023-02-15", "", "BRANCA"),
                row("N", "AM", "GASOLINA", "10/03/2023", "4,9", "IPIRANGA"),
            ],
        )
        .unwrap()
    }

    fn column(output: &PreprocessOutput, name: &str) -> Vec<f64> {
        let j = REQUIRED_FEATURES.iter().position(|f| *f == name).unwrap();
        output.features.column(j).to_vec()
    }

    #[test]
    fn test_filters_and_counts_dropped_rows() {
        let output = FeaturePreprocessor::default().preprocess(&sample()).unwrap();

        assert_eq!(output.retained_rows, vec![0, 3, 4]);
        assert_eq!(output.features.dim(), (3, 8));
        assert_eq!(output.diagnostics.dropped_by_product, 1);
        assert_eq!(output.diagnostics.dropped_by_date, 1);
    }

    #[test]
    fn test_every_column_is_standardized() {
        let output = FeaturePreprocessor::default().preprocess(&sample()).unwrap();

        for j in 0..output.features.ncols() {
            let col = output.features.column(j);
            let mean = col.sum() / col.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
            assert!(col.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_date_parts_and_imputation() {
        let output = FeaturePreprocessor::default().preprocess(&sample()).unwrap();

        // Retained dates: 2023-01-02, 2023-02-15, 2023-03-10.
        let months = column(&output, "Mes");
        assert!(months[0] < months[1] && months[1] < months[2]);

        // Year is constant across the batch, so it is only centred.
        assert!(column(&output, "Ano").iter().all(|v| v.abs() < 1e-9));

        // Missing purchase price is imputed with the mean of 4.5 and 4.9,
        // which is also the batch mean and scales to zero.
        let purchase = column(&output, "Valor de Compra");
        assert!(purchase[1].abs() < 1e-9);
        assert!(purchase[0] < 0.0 && purchase[2] > 0.0);
    }

    #[test]
    fn test_categorical_codes_are_sorted_ranks() {
        let output = FeaturePreprocessor::default().preprocess(&sample()).unwrap();

        // Bandeira: RAIZEN, BRANCA, IPIRANGA -> codes 2, 0, 1 before scaling.
        let flags = column(&output, "Bandeira");
        assert!(flags[1] < flags[2] && flags[2] < flags[0]);

        // Produto is all GASOLINA after filtering: one class, centred to 0.
        assert_eq!(column(&output, "Produto"), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_numeric_looking_labels_keep_their_text() {
        // "12.50" and "12.5" are distinct labels, as is "9" against "10".
        let dataset = Dataset::from_rows(
            HEADER,
            vec![
                row("SE", "SP", "GASOLINA", "02/01/2023", "4.5", "12.50"),
                row("SE", "SP", "GASOLINA", "03/01/2023", "4.6", "12.5"),
                row("SE", "SP", "GASOLINA", "04/01/2023", "4.7", "9"),
            ],
        )
        .unwrap();

        let output = FeaturePreprocessor::default().preprocess(&dataset).unwrap();

        // Sorted as text: "12.5" < "12.50" < "9" -> codes 1, 0, 2.
        let flags = column(&output, "Bandeira");
        assert!(flags[1] < flags[0] && flags[0] < flags[2]);
    }

    #[test]
    fn test_only_other_products_gives_empty_matrix() {
        let dataset = Dataset::from_rows(
            HEADER,
            vec![
                row("S", "PR", "ETANOL", "03/01/2023", "3.1", "BRANCA"),
                row("S", "SC", "DIESEL", "04/01/2023", "5.0", "SHELL"),
            ],
        )
        .unwrap();

        let output = FeaturePreprocessor::default().preprocess(&dataset).unwrap();
        assert_eq!(output.features.dim(), (0, 8));
        assert!(output.retained_rows.is_empty());
        assert_eq!(output.diagnostics.dropped_by_product, 2);
    }

    #[test]
    fn test_missing_purchase_price_column() {
        let dataset = Dataset::from_rows(
            ["Produto", "Bandeira", "Regiao - Sigla", "Estado - Sigla", "Data da Coleta"],
            vec![vec!["GASOLINA", "BRANCA", "SE", "SP", "02/01/2023"]],
        )
        .unwrap();

        let err = FeaturePreprocessor::default().preprocess(&dataset).unwrap_err();
        assert_eq!(err, PreprocessError::MissingFeature(vec!["Valor de Compra".to_string()]));
    }

    #[test]
    fn test_missing_date_parts_without_collection_date() {
        let dataset = Dataset::from_rows(
            ["Produto", "Bandeira", "Regiao - Sigla", "Estado - Sigla", "Ano", "Valor de Compra"],
            vec![vec!["GASOLINA", "BRANCA", "SE", "SP", "2023", "4.5"]],
        )
        .unwrap();

        let err = FeaturePreprocessor::default().preprocess(&dataset).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::MissingFeature(vec!["Mes".to_string(), "Dia".to_string()])
        );
    }

    #[test]
    fn test_explicit_date_columns_are_used_as_is() {
        let dataset = Dataset::from_rows(
            ["Produto", "Bandeira", "Regiao - Sigla", "Estado - Sigla", "Ano", "Mes", "Dia", "Valor de Compra"],
            vec![
                vec!["GASOLINA", "A", "SE", "SP", "2022", "1", "5", "4"],
                vec!["GASOLINA", "B", "SE", "SP", "2024", "1", "7", "6"],
            ],
        )
        .unwrap();

        let output = FeaturePreprocessor::default().preprocess(&dataset).unwrap();
        assert_eq!(column(&output, "Ano"), vec![-1.0, 1.0]);
        assert_eq!(column(&output, "Dia"), vec![-1.0, 1.0]);
        assert_eq!(output.diagnostics, Diagnostics::default());
    }

    #[test]
    fn test_all_missing_feature_policy() {
        let dataset = Dataset::from_rows(
            HEADER,
            vec![
                row("SE", "SP", "GASOLINA", "02/01/2023", "", "RAIZEN"),
                row("SE", "RJ", "GASOLINA", "03/01/2023", "NA", "BRANCA"),
            ],
        )
        .unwrap();

        let err = FeaturePreprocessor::default().preprocess(&dataset).unwrap_err();
        assert_eq!(err, PreprocessError::EmptyFeature("Valor de Compra".to_string()));

        let zero_fill = FeaturePreprocessor::new(&PreprocessingConfig {
            all_missing: AllMissingPolicy::Zero,
            ..PreprocessingConfig::default()
        });
        let output = zero_fill.preprocess(&dataset).unwrap();
        assert_eq!(column(&output, "Valor de Compra"), vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_markers_are_imputed() {
        for marker in ["n/a", "None", "<NA>", "#N/A", "-NaN", "nan"] {
            let dataset = Dataset::from_rows(
                HEADER,
                vec![
                    row("SE", "SP", "GASOLINA", "02/01/2023", "4.5", "RAIZEN"),
                    row("SE", "RJ", "GASOLINA", "03/01/2023", marker, "BRANCA"),
                ],
            )
            .unwrap();

            let output = FeaturePreprocessor::default()
                .preprocess(&dataset)
                .unwrap_or_else(|e| panic!("marker {:?}: {}", marker, e));

            // Filled with the only observed value, so the column is constant.
            assert!(
                column(&output, "Valor de Compra").iter().all(|v| v.abs() < 1e-9),
                "marker {:?}",
                marker
            );
        }
    }

    #[test]
    fn test_non_numeric_purchase_price() {
        let dataset = Dataset::from_rows(
            HEADER,
            vec![row("SE", "SP", "GASOLINA", "02/01/2023", "n/d", "RAIZEN")],
        )
        .unwrap();

        let err = FeaturePreprocessor::default().preprocess(&dataset).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::NonNumericValue { ref column, row: 0, ref value }
                if column == "Valor de Compra" && value == "n/d"
        ));
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let preprocessor = FeaturePreprocessor::default();
        let first = preprocessor.preprocess(&sample()).unwrap();
        let second = preprocessor.preprocess(&sample()).unwrap();
        assert_eq!(first.features, second.features);
    }
}
