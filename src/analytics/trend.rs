//! Least-squares polynomial trend curves for scalar series
//!
//! The fit is indexed by position in the series, not by step value, so gaps
//! between logged steps do not bend the curve. Positions are mapped onto
//! `[-1, 1]` and the Vandermonde columns are orthonormalized (modified
//! Gram-Schmidt, two passes), which keeps degree-5 fits well conditioned for
//! long series. The fitted values are the projection of the series onto the
//! span of those columns.

/// Degree used for dashboard trend curves.
pub const TREND_DEGREE: usize = 5;

/// Columns whose residual norm falls below this (relative to `sqrt(n)`)
/// add nothing to the span.
const RANK_TOLERANCE: f64 = 1e-10;

/// A polynomial trend evaluated at every position of a series.
///
/// # Example
///
/// ```rust
/// use drlvis::analytics::TrendFit;
///
/// let fit = TrendFit::fit(&[1.0, 2.0, 3.0, 4.0], 5);
/// // four points: the degree drops to 3 and the fit interpolates
/// assert_eq!(fit.degree(), 3);
/// assert!((fit.fitted()[2] - 3.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFit {
    degree: usize,
    fitted: Vec<f64>,
}

impl TrendFit {
    /// Fit a polynomial of at most `degree` to `values`.
    ///
    /// With fewer than `degree + 1` values the degree drops to `len - 1`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(values: &[f64], degree: usize) -> Self {
        let n = values.len();
        if n == 0 {
            return Self {
                degree: 0,
                fitted: Vec::new(),
            };
        }
        let degree = degree.min(n - 1);

        let positions: Vec<f64> = if n == 1 {
            vec![0.0]
        } else {
            let last = (n - 1) as f64;
            (0..n).map(|i| 2.0 * i as f64 / last - 1.0).collect()
        };

        let basis = orthonormal_basis(&positions, degree);
        let mut fitted = vec![0.0; n];
        for q in &basis {
            let weight = dot(q, values);
            for (f, &qi) in fitted.iter_mut().zip(q) {
                *f += weight * qi;
            }
        }

        Self { degree, fitted }
    }

    /// Degree actually used.
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Fitted value at every position.
    #[must_use]
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// Take the fitted values.
    #[must_use]
    pub fn into_fitted(self) -> Vec<f64> {
        self.fitted
    }
}

/// Orthonormal basis of the span of `1, x, ..., x^degree` at `positions`.
#[allow(clippy::cast_precision_loss)]
fn orthonormal_basis(positions: &[f64], degree: usize) -> Vec<Vec<f64>> {
    let tolerance = RANK_TOLERANCE * (positions.len() as f64).sqrt();
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(degree + 1);
    let mut power = vec![1.0; positions.len()];

    for _ in 0..=degree {
        let mut column = power.clone();
        for _ in 0..2 {
            for q in &basis {
                let projection = dot(q, &column);
                for (c, &qi) in column.iter_mut().zip(q) {
                    *c -= projection * qi;
                }
            }
        }
        let norm = dot(&column, &column).sqrt();
        if norm > tolerance {
            column.iter_mut().for_each(|c| *c /= norm);
            basis.push(column);
        }

        for (p, &x) in power.iter_mut().zip(positions) {
            *p *= x;
        }
    }
    basis
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
