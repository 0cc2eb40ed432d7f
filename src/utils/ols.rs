//! Ordinary and ridge least squares on a dense design matrix.
//!
//! Used by the ADF regression (coefficients, standard errors, AIC) and by the
//! additive model (MAP estimate under Gaussian priors, i.e. ridge).

use crate::error::{DashboardError, Result};

/// Smallest residual variance used for standard errors, relative to the mean
/// square of the response.
const MIN_RELATIVE_VARIANCE: f64 = 1e-10;

/// Fitted least-squares regression.
#[derive(Debug, Clone)]
pub struct OLSResult {
    /// One coefficient per design column.
    pub coefficients: Vec<f64>,
    /// Standard error of each coefficient.
    pub standard_errors: Vec<f64>,
    /// Residual sum of squares.
    pub ssr: f64,
    /// Number of observations.
    pub nobs: usize,
}

impl OLSResult {
    /// Number of estimated parameters.
    pub fn num_params(&self) -> usize {
        self.coefficients.len()
    }

    /// t statistic of coefficient `j`.
    pub fn t_value(&self, j: usize) -> f64 {
        match (self.coefficients.get(j), self.standard_errors.get(j)) {
            (Some(&b), Some(&se)) if se > 0.0 => b / se,
            _ => f64::NAN,
        }
    }

    /// Gaussian log-likelihood at the least-squares estimate.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.num_params() as f64
    }
}

/// Fit `y = X b` by ordinary least squares.
///
/// `design` holds one row per observation; every row must have the same width.
pub fn ols_fit(y: &[f64], design: &[Vec<f64>]) -> Result<OLSResult> {
    let (xtx, xty, k) = normal_equations(y, design)?;
    let n = y.len();
    if n <= k {
        return Err(DashboardError::InsufficientData {
            needed: k + 1,
            got: n,
        });
    }

    let factor = cholesky(&xtx).ok_or_else(|| {
        DashboardError::ComputationError("design matrix is singular".to_string())
    })?;
    let coefficients = cholesky_solve(&factor, &xty);

    let ssr: f64 = design
        .iter()
        .zip(y.iter())
        .map(|(row, &yi)| {
            let fitted: f64 = row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();

    // An exact fit leaves no residual variance; floor it relative to the
    // response so standard errors stay positive and t-values finite.
    let y_scale = y.iter().map(|v| v * v).sum::<f64>() / n as f64;
    let sigma_sq = (ssr / (n - k) as f64).max(MIN_RELATIVE_VARIANCE * y_scale);
    let standard_errors = (0..k)
        .map(|j| {
            let mut unit = vec![0.0; k];
            unit[j] = 1.0;
            let column = cholesky_solve(&factor, &unit);
            (sigma_sq * column[j]).max(0.0).sqrt()
        })
        .collect();

    Ok(OLSResult {
        coefficients,
        standard_errors,
        ssr,
        nobs: n,
    })
}

/// Fit `y = X b` minimising `|y - X b|^2 + sum_j penalties[j] * b_j^2`.
pub fn ridge_fit(y: &[f64], design: &[Vec<f64>], penalties: &[f64]) -> Result<Vec<f64>> {
    let (mut xtx, xty, k) = normal_equations(y, design)?;
    if penalties.len() != k {
        return Err(DashboardError::DimensionMismatch {
            expected: k,
            got: penalties.len(),
        });
    }
    for (j, &p) in penalties.iter().enumerate() {
        xtx[j][j] += p.max(0.0);
    }

    let factor = cholesky(&xtx).ok_or_else(|| {
        DashboardError::ComputationError("penalised system is not positive definite".to_string())
    })?;
    Ok(cholesky_solve(&factor, &xty))
}

/// Evaluate `X b` row by row.
pub fn predict(design: &[Vec<f64>], coefficients: &[f64]) -> Vec<f64> {
    design
        .iter()
        .map(|row| row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum())
        .collect()
}

fn normal_equations(y: &[f64], design: &[Vec<f64>]) -> Result<(Vec<Vec<f64>>, Vec<f64>, usize)> {
    if y.is_empty() {
        return Err(DashboardError::EmptyData);
    }
    if design.len() != y.len() {
        return Err(DashboardError::DimensionMismatch {
            expected: y.len(),
            got: design.len(),
        });
    }
    let k = design[0].len();
    if k == 0 {
        return Err(DashboardError::InvalidParameter(
            "design matrix has no columns".to_string(),
        ));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in design.iter().zip(y.iter()) {
        if row.len() != k {
            return Err(DashboardError::DimensionMismatch {
                expected: k,
                got: row.len(),
            });
        }
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
    }
    Ok((xtx, xty, k))
}

/// Lower-triangular Cholesky factor, `None` if the matrix is not positive definite.
fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                // relative pivot threshold rejects numerically collinear columns
                if sum <= scale * 1e-12 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

fn cholesky_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * z[j];
        }
        z[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}
