//! Summary statistics over a prediction batch

use crate::types::PredictionStats;

/// Mean, median, min and max of the predictions.
///
/// Returns `None` for an empty batch, where none of them is defined.
pub fn summarize(predictions: &[f64]) -> Option<PredictionStats> {
    if predictions.is_empty() {
        return None;
    }

    let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;

    Some(PredictionStats {
        mean,
        median: median(predictions),
        min: predictions.iter().copied().fold(f64::INFINITY, f64::min),
        max: predictions.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Median, averaging the two middle values for even-length input.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    if sorted.is_empty() {
        return f64::NAN;
    }

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
