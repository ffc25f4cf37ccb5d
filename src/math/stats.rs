//! Descriptive statistics over small samples.

/// Arithmetic mean; `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator); `None` below two values.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

/// Coefficient of determination of `fitted` against `observed`.
///
/// Returns `None` when the observations have no variance.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> Option<f64> {
    let m = mean(observed)?;
    let sst: f64 = observed.iter().map(|y| (y - m) * (y - m)).sum();
    if sst <= 0.0 || !sst.is_finite() {
        return None;
    }
    let sse: f64 = observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f) * (y - f))
        .sum();
    Some(1.0 - sse / sst)
}

/// Index of the value closest to `target` (first wins on ties).
pub fn argmin_distance(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate() {
        let d = (v - target).abs();
        if !d.is_finite() {
            continue;
        }
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_sd() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(sample_sd(&[1.0]), None);
        assert!((sample_sd(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap() - 2.138089935).abs() < 1e-8);
    }

    #[test]
    fn r_squared_perfect_and_flat() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), Some(1.0));
        assert_eq!(r_squared(&[1.0, 1.0], &[1.0, 1.0]), None);
    }

    #[test]
    fn argmin_distance_prefers_first_on_ties() {
        assert_eq!(argmin_distance(&[0.9, 0.6, 0.4, 0.1], 0.5), Some(1));
        assert_eq!(argmin_distance(&[f64::NAN, 0.2], 0.5), Some(1));
        assert_eq!(argmin_distance(&[], 0.5), None);
    }
}
