//! NaN-aware array statistics shared by metrics and preprocessing.
//!
//! Missing samples are encoded as NaN sizes, so every reduction here skips
//! NaN values instead of poisoning the result. Empty (or all-NaN) inputs
//! yield `None` and the caller decides whether that is an error.

use ndarray::ArrayView1;

/// Mean of the finite values, skipping NaNs.
pub fn nanmean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 { None } else { Some(sum / count as f64) }
}

/// Median of the finite values, skipping NaNs.
///
/// Even-length inputs return the midpoint of the two central values.
pub fn nanmedian(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).expect("NaN values are filtered out"));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 1 {
        Some(finite[mid])
    } else {
        Some(0.5 * (finite[mid - 1] + finite[mid]))
    }
}

/// Minimum of the finite values, skipping NaNs.
pub fn nanmin(values: ArrayView1<f64>) -> Option<f64> {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |min, &v| match min {
            Some(m) if m <= v => Some(m),
            _ => Some(v),
        })
}

/// Index of the smallest finite value, skipping NaNs.
pub fn nanargmin(values: ArrayView1<f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, m)) if m <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// First differences `x[i + 1] - x[i]`.
pub fn diff(values: ArrayView1<f64>) -> Vec<f64> {
    values
        .iter()
        .zip(values.iter().skip(1))
        .map(|(&a, &b)| b - a)
        .collect()
}

/// `n`-th iterated difference, the result is `values.len() - n` long.
pub fn diff_n(values: ArrayView1<f64>, n: usize) -> Vec<f64> {
    let mut out: Vec<f64> = values.to_vec();
    for _ in 0..n {
        out = out.iter().zip(out.iter().skip(1)).map(|(&a, &b)| b - a).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn nanmean_skips_nan() {
        assert_relative_eq!(nanmean(&[1.0, f64::NAN, 3.0]).unwrap(), 2.0);
        assert!(nanmean(&[f64::NAN, f64::NAN]).is_none());
        assert!(nanmean(&[]).is_none());
    }

    #[test]
    fn nanmedian_even_and_odd() {
        assert_relative_eq!(nanmedian(&[10.0, 11.0]).unwrap(), 10.5);
        assert_relative_eq!(nanmedian(&[11.0, 9.0, 10.0]).unwrap(), 10.0);
        assert_relative_eq!(nanmedian(&[11.0, f64::NAN, 9.0, 10.0]).unwrap(), 10.0);
        assert!(nanmedian(&[]).is_none());
    }

    #[test]
    fn nanmin_and_argmin() {
        let arr = Array1::from(vec![3.0, f64::NAN, 1.0, 2.0]);
        assert_relative_eq!(nanmin(arr.view()).unwrap(), 1.0);
        assert_eq!(nanargmin(arr.view()), Some(2));
        let empty = Array1::from(vec![f64::NAN]);
        assert_eq!(nanargmin(empty.view()), None);
    }

    #[test]
    fn diff_orders() {
        let arr = Array1::from(vec![1.0, 2.0, 4.0, 7.0]);
        assert_eq!(diff(arr.view()), vec![1.0, 2.0, 3.0]);
        assert_eq!(diff_n(arr.view(), 2), vec![1.0, 1.0]);
    }
}
