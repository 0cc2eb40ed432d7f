//! Derivative-free minimisation used for ARIMA parameter estimation.

use std::cmp::Ordering;

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// The best point found.
    pub optimal_point: Vec<f64>,
    /// Objective value at the best point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether a tolerance criterion was met before `max_iter`.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence tolerance on objective spread and simplex size.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Relative size of the initial simplex.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

struct Simplex {
    vertices: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl Simplex {
    fn order(&mut self) {
        let mut paired: Vec<(Vec<f64>, f64)> = self
            .vertices
            .drain(..)
            .zip(self.values.drain(..))
            .collect();
        paired.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        for (v, f) in paired {
            self.vertices.push(v);
            self.values.push(f);
        }
    }

    /// Centroid of every vertex except the worst (last after `order`).
    fn centroid(&self) -> Vec<f64> {
        let dim = self.vertices[0].len();
        let count = self.vertices.len() - 1;
        let mut c = vec![0.0; dim];
        for v in &self.vertices[..count] {
            for (ci, vi) in c.iter_mut().zip(v.iter()) {
                *ci += vi;
            }
        }
        c.iter_mut().for_each(|ci| *ci /= count as f64);
        c
    }

    fn replace_worst(&mut self, point: Vec<f64>, value: f64) {
        let last = self.vertices.len() - 1;
        self.vertices[last] = point;
        self.values[last] = value;
    }

    fn diameter(&self, centroid: &[f64]) -> f64 {
        self.vertices
            .iter()
            .map(|v| {
                v.iter()
                    .zip(centroid.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max)
    }
}

/// Point on the line through `from` and `towards`: `from + t * (towards - from)`.
fn along(from: &[f64], towards: &[f64], t: f64) -> Vec<f64> {
    from.iter()
        .zip(towards.iter())
        .map(|(a, b)| a + t * (b - a))
        .collect()
}

/// Minimise `objective` starting from `initial` with the Nelder-Mead simplex method.
///
/// Constraints are expressed by returning `f64::MAX` outside the feasible region.
///
/// # Example
/// ```
/// use weather_ts_dashboard::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
///     &[0.0, 0.0],
///     NelderMeadConfig::default(),
/// );
/// assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = initial.len();
    if dim == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let mut simplex = Simplex {
        vertices: Vec::with_capacity(dim + 1),
        values: Vec::with_capacity(dim + 1),
    };
    for i in 0..=dim {
        let mut vertex = initial.to_vec();
        if i > 0 {
            let x = vertex[i - 1];
            vertex[i - 1] += if x.abs() > 1e-10 {
                config.initial_step * x.abs()
            } else {
                config.initial_step
            };
        }
        simplex.values.push(objective(&vertex));
        simplex.vertices.push(vertex);
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        simplex.order();

        let best = simplex.values[0];
        let worst = simplex.values[dim];
        let second_worst = simplex.values[dim - 1];
        let centroid = simplex.centroid();

        if worst - best < config.tolerance || simplex.diameter(&centroid) < config.tolerance {
            converged = true;
            break;
        }

        let reflected = along(&centroid, &simplex.vertices[dim], -config.alpha);
        let f_reflected = objective(&reflected);

        if f_reflected < best {
            let expanded = along(&centroid, &reflected, config.gamma);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex.replace_worst(expanded, f_expanded);
            } else {
                simplex.replace_worst(reflected, f_reflected);
            }
            continue;
        }

        if f_reflected < second_worst {
            simplex.replace_worst(reflected, f_reflected);
            continue;
        }

        let (contracted, threshold) = if f_reflected < worst {
            (along(&centroid, &reflected, config.rho), f_reflected)
        } else {
            (along(&centroid, &simplex.vertices[dim], config.rho), worst)
        };
        let f_contracted = objective(&contracted);
        if f_contracted < threshold {
            simplex.replace_worst(contracted, f_contracted);
            continue;
        }

        let anchor = simplex.vertices[0].clone();
        for i in 1..=dim {
            let shrunk = along(&anchor, &simplex.vertices[i], config.sigma);
            simplex.values[i] = objective(&shrunk);
            simplex.vertices[i] = shrunk;
        }
    }

    simplex.order();
    NelderMeadResult {
        optimal_point: simplex.vertices[0].clone(),
        optimal_value: simplex.values[0],
        iterations,
        converged,
    }
}
