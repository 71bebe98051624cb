//! Chronological train/test split and forward-chaining cross-validation folds

use std::ops::Range;

use super::model::TrainingError;

/// Share of rows used for training
pub const TRAIN_FRACTION: f64 = 0.8;

/// Number of cross-validation folds
pub const CV_FOLDS: usize = 5;

/// Index of the first test row: `floor(fraction * n)`.
pub fn chronological_split_index(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).floor() as usize).min(n)
}

/// One forward-chaining fold: train on everything before `test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window folds over `n` time-ordered rows.
///
/// The last `n_splits` blocks of `n / (n_splits + 1)` rows are validation
/// windows; each fold trains on every row before its window. Rows left over by
/// the integer division stay in the first training window.
pub fn forward_chaining_folds(n: usize, n_splits: usize) -> Result<Vec<Fold>, TrainingError> {
    let n_blocks = n_splits + 1;
    if n_splits == 0 || n < n_blocks {
        return Err(TrainingError::InsufficientData(n));
    }

    let test_size = n / n_blocks;
    let first_test = n - n_splits * test_size;

    Ok((0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            Fold {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}
