//! Regression scores

/// Mean squared error. `f64::MAX` when the slices are empty or unequal.
pub fn mean_squared_error(targets: &[f64], predictions: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::MAX;
    }

    let sum_sq_error: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum();

    sum_sq_error / predictions.len() as f64
}

/// Coefficient of determination.
///
/// A constant target has no variance to explain: a perfect fit scores 1.0 and
/// anything else 0.0, so the score stays finite.
pub fn r2_score(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.is_empty() || predictions.len() != targets.len() {
        return f64::NAN;
    }

    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_res: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_calculate_mse() {
        let targets = vec![12.0, 18.0, 32.0];
        let predictions = vec![10.0, 20.0, 30.0];

        // ((10-12)^2 + (20-18)^2 + (30-32)^2) / 3 = 4
        assert_relative_eq!(mean_squared_error(&targets, &predictions), 4.0, epsilon = 1e-10);
    }

    #[test]
    fn test_mse_mismatched() {
        assert_eq!(mean_squared_error(&[1.0], &[]), f64::MAX);
    }

    #[test]
    fn test_r2_perfect() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y), 1.0);
    }

    #[test]
    fn test_r2_mean_predictor_is_zero() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let p = vec![2.5; 4];
        assert_relative_eq!(r2_score(&y, &p), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_known_value() {
        let y = vec![3.0, -0.5, 2.0, 7.0];
        let p = vec![2.5, 0.0, 2.0, 8.0];
        assert_relative_eq!(r2_score(&y, &p), 0.948_608_137_044_967_9, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 5.0]), 0.0);
    }

    #[test]
    fn test_r2_empty_is_nan() {
        assert!(r2_score(&[], &[]).is_nan());
    }
}
