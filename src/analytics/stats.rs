//! Small numeric kernels shared by the write and read paths

use crate::{Error, Result};

/// Smoothing added to every action before the prior is renormalized.
pub const PRIOR_SMOOTHING: f64 = 1e-4;

/// Numerically stable softmax of one vector.
#[must_use]
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Softmax applied to every row.
#[must_use]
pub fn softmax_rows(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter().map(|row| softmax(row)).collect()
}

/// Shannon entropy in nats of a distribution, normalized to sum 1 first.
///
/// Zero-probability entries contribute nothing. An all-zero vector has
/// entropy 0.
#[must_use]
pub fn entropy(distribution: &[f64]) -> f64 {
    let total: f64 = distribution.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    -distribution
        .iter()
        .map(|&p| p / total)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

/// Index of the largest value; the first one wins on ties.
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Per-column mean of equal-length rows.
///
/// # Errors
///
/// `InvalidInput` for no rows, `ShapeMismatch` for ragged rows.
#[allow(clippy::cast_precision_loss)]
pub fn mean_rows(rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let width = row_width(rows, "probability rows")?;
    let count = rows.len() as f64;
    let mut mean = vec![0.0; width];
    for row in rows {
        for (acc, &v) in mean.iter_mut().zip(row) {
            *acc += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= count);
    Ok(mean)
}

/// Mean of the rows plus [`PRIOR_SMOOTHING`], renormalized to sum 1.
///
/// # Errors
///
/// Same as [`mean_rows`].
pub fn smoothed_prior(rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let smoothed: Vec<f64> = mean_rows(rows)?
        .into_iter()
        .map(|m| m + PRIOR_SMOOTHING)
        .collect();
    let total: f64 = smoothed.iter().sum();
    Ok(smoothed.into_iter().map(|v| v / total).collect())
}

/// `KL(p || q)` in bits, with `0 * log 0 = 0`.
///
/// # Errors
///
/// `ShapeMismatch` if the distributions differ in length.
pub fn kl_divergence_bits(p: &[f64], q: &[f64]) -> Result<f64> {
    if p.len() != q.len() {
        return Err(Error::ShapeMismatch {
            context: "action divergence".to_string(),
            expected: format!("{} actions", q.len()),
            actual: format!("{} actions", p.len()),
        });
    }
    Ok(p.iter()
        .zip(q)
        .filter(|(pi, _)| **pi > 0.0)
        .map(|(&pi, &qi)| pi * (pi / qi).log2())
        .sum())
}

/// Scale every column to zero mean and unit population variance.
///
/// Constant columns are centered only.
///
/// # Errors
///
/// `ShapeMismatch` for ragged rows.
#[allow(clippy::cast_precision_loss)]
pub fn standardize(rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let width = row_width(rows, "state rows")?;
    let count = rows.len() as f64;

    let mut mean = vec![0.0; width];
    for row in rows {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v / count;
        }
    }
    let mut variance = vec![0.0; width];
    for row in rows {
        for ((var, &m), &v) in variance.iter_mut().zip(&mean).zip(row) {
            *var += (v - m).powi(2) / count;
        }
    }
    let scale: Vec<f64> = variance
        .iter()
        .map(|&var| if var > 0.0 { var.sqrt() } else { 1.0 })
        .collect();

    Ok(rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&mean)
                .zip(&scale)
                .map(|((&v, &m), &s)| (v - m) / s)
                .collect()
        })
        .collect())
}

/// Unique values with their occurrence counts, ascending by value.
#[must_use]
pub fn histogram(values: &[f64]) -> Vec<(f64, u64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut counts: Vec<(f64, u64)> = Vec::new();
    for value in sorted {
        match counts.last_mut() {
            Some((last, count)) if last.total_cmp(&value).is_eq() => *count += 1,
            _ => counts.push((value, 1)),
        }
    }
    counts
}

/// Min-max inverted entropy: the least entropic sample scores 1, the most
/// entropic 0. All-equal entropies score 1.
#[must_use]
pub fn confidence(entropies: &[f64]) -> Vec<f64> {
    let min = entropies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = entropies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    entropies
        .iter()
        .map(|&e| {
            if range > 0.0 {
                (1.0 - (e - min) / range).clamp(0.0, 1.0)
            } else {
                1.0
            }
        })
        .collect()
}

/// Common width of equal-length rows.
///
/// # Errors
///
/// `InvalidInput` for no rows, `ShapeMismatch` naming the first row whose
/// width differs from row 0.
pub fn row_width(rows: &[Vec<f64>], context: &str) -> Result<usize> {
    let first = rows
        .first()
        .ok_or_else(|| Error::InvalidInput(format!("{context} are empty")))?;
    let width = first.len();
    if let Some(i) = rows.iter().position(|row| row.len() != width) {
        return Err(Error::ShapeMismatch {
            context: format!("{context}, row {i}"),
            expected: format!("{width} columns"),
            actual: format!("{} columns", rows[i].len()),
        });
    }
    Ok(width)
}
