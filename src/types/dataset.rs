//! Tabular dataset of fuel price observations, held in a polars frame

use polars::prelude::*;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashSet;

/// Cell texts read as missing, the same set a pandas CSV reader treats as NaN.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a raw cell counts as missing.
pub fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Numeric view of a raw cell. A decimal comma (`"4,29"`) is accepted.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .or_else(|_| raw.replace(',', ".").parse::<f64>())
        .ok()
}

/// Ordered columns of raw cell text; missing cells are nulls.
///
/// Cells keep the text they were read with. Numeric interpretation happens
/// in preprocessing, and in [`Dataset::records`] for output.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Build a dataset from a header and rows of raw cell text.
    ///
    /// Short rows are padded with missing cells, long rows truncated.
    /// Duplicate column names get a `.1`, `.2`, ... suffix.
    pub fn from_rows<H, R, C>(columns: H, rows: impl IntoIterator<Item = R>) -> PolarsResult<Self>
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let names = unique_names(columns.into_iter().map(Into::into).collect());
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];

        for row in rows {
            let mut row = row.into_iter();
            for column in cells.iter_mut() {
                let cell = row
                    .next()
                    .map(|raw| raw.as_ref().to_string())
                    .filter(|raw| !is_missing(raw));
                column.push(cell);
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Series::new(name.into(), values).into())
            .collect();

        Ok(Self {
            frame: DataFrame::new(columns)?,
        })
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Raw text of a column, if present.
    pub fn text_column(&self, name: &str) -> Option<&StringChunked> {
        self.frame
            .column(name)
            .ok()
            .and_then(|column| column.as_materialized_series().str().ok())
    }

    /// Raw text of one cell; `None` when the column is absent or the cell missing.
    pub fn cell(&self, name: &str, row: usize) -> Option<&str> {
        self.text_column(name).and_then(|column| column.get(row))
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }

    /// Selected rows as ordered JSON objects keyed by column name.
    ///
    /// Columns whose present cells all parse as numbers are emitted as
    /// numbers, other columns as strings, missing cells as null.
    pub fn records(&self, rows: &[usize]) -> Vec<Map<String, JsonValue>> {
        let columns: Vec<(String, &StringChunked, bool)> = self
            .frame
            .get_columns()
            .iter()
            .filter_map(|column| {
                let text = column.as_materialized_series().str().ok()?;
                let numeric = text
                    .into_iter()
                    .flatten()
                    .all(|raw| raw.trim().parse::<f64>().is_ok());
                Some((column.name().to_string(), text, numeric))
            })
            .collect();

        rows.iter()
            .map(|&row| {
                columns
                    .iter()
                    .map(|(name, text, numeric)| {
                        let value = match text.get(row) {
                            None => JsonValue::Null,
                            Some(raw) if *numeric => raw
                                .trim()
                                .parse::<f64>()
                                .ok()
                                .and_then(Number::from_f64)
                                .map(JsonValue::Number)
                                .unwrap_or(JsonValue::Null),
                            Some(raw) => JsonValue::String(raw.to_string()),
                        };
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 0;
            while !seen.insert(candidate.clone()) {
                suffix += 1;
                candidate = format!("{}.{}", name, suffix);
            }
            candidate
        })
        .collect()
}
