//! Trial statistics: per-group means and percent error against a reference
//!
//! Vectors are positional: index `g` is the same group in every trial and in
//! every method for a given query.

use crate::error::{BenchError, Result};

/// Element-wise mean across trials.
///
/// Every trial must have the same number of groups, and there must be at
/// least one trial.
pub fn trial_means(trials: &[Vec<f64>]) -> Result<Vec<f64>> {
    let first = trials
        .first()
        .ok_or_else(|| BenchError::shape("trial means: number of trials", 1, 0))?;
    let groups = first.len();

    let mut sums = vec![0.0; groups];
    for (i, trial) in trials.iter().enumerate() {
        if trial.len() != groups {
            return Err(BenchError::shape(
                format!("trial means: trial {}", i),
                groups,
                trial.len(),
            ));
        }
        for (sum, v) in sums.iter_mut().zip(trial) {
            *sum += v;
        }
    }

    let n = trials.len() as f64;
    Ok(sums.into_iter().map(|s| s / n).collect())
}

/// `|(result - reference) / reference| * 100`.
///
/// Zero reference: `0.0` when the result is zero too, a division error
/// otherwise. Non-finite inputs are division errors as well.
pub fn absolute_percent_error(reference: f64, result: f64) -> Result<f64> {
    group_percent_error(reference, result, 0)
}

fn group_percent_error(reference: f64, result: f64, group: usize) -> Result<f64> {
    if !reference.is_finite() || !result.is_finite() {
        return Err(BenchError::Division {
            context: format!("non-finite input (reference {})", reference),
            group,
            result,
        });
    }
    if reference == 0.0 {
        if result == 0.0 {
            return Ok(0.0);
        }
        return Err(BenchError::Division {
            context: "percent error against a zero reference".into(),
            group,
            result,
        });
    }
    Ok(((result - reference) / reference).abs() * 100.0)
}

/// Mean of the per-group absolute percent errors
pub fn mean_absolute_percent_error(reference_means: &[f64], result_means: &[f64]) -> Result<f64> {
    if reference_means.len() != result_means.len() {
        return Err(BenchError::shape(
            "percent error: number of groups",
            reference_means.len(),
            result_means.len(),
        ));
    }
    if reference_means.is_empty() {
        return Err(BenchError::shape("percent error: number of groups", 1, 0));
    }

    let mut total = 0.0;
    for (group, (&reference, &result)) in reference_means.iter().zip(result_means).enumerate() {
        total += group_percent_error(reference, result, group)?;
    }
    Ok(total / reference_means.len() as f64)
}

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
