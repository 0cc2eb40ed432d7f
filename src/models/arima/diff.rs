//! Differencing utilities for ARIMA models.

/// Apply ordinary differencing `d` times.
///
/// Each pass shortens the series by one; differencing stops early once a
/// single value remains.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            break;
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `d` rounds of differencing for values that continue `original`.
///
/// `differenced` holds future values of the `d`-th difference; the result
/// holds the matching future values on the scale of `original`.
pub fn integrate(differenced: &[f64], original: &[f64], d: usize) -> Vec<f64> {
    let mut result = differenced.to_vec();
    for level in (0..d).rev() {
        let anchor = difference(original, level).last().copied().unwrap_or(0.0);
        let mut acc = anchor;
        for v in result.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    result
}

/// Coefficients of `(1 - B)^d` as an AR polynomial: returns `c` such that
/// `(1 - B)^d = 1 - c[0] B - c[1] B^2 - ...`.
pub fn differencing_polynomial(d: usize) -> Vec<f64> {
    // coefficients of (1 - B)^d in increasing powers, starting from 1
    let mut poly = vec![1.0];
    for _ in 0..d {
        let mut next = vec![0.0; poly.len() + 1];
        for (i, &c) in poly.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        poly = next;
    }
    poly.iter().skip(1).map(|c| -c).collect()
}
