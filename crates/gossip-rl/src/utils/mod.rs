//! Utility functions.

/// Abbreviate large numbers for display
pub fn abbreviate(num: u64) -> String {
    if num < 1_000 {
        format!("{}", num)
    } else if num < 1_000_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else if num < 1_000_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else {
        format!("{:.1}B", num as f64 / 1_000_000_000.0)
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0s".to_string();
    }

    let secs = seconds as u64;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;

    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn variance(xs: impl Iterator<Item = f64>) -> f64 {
    let xs: Vec<f64> = xs.collect();
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64
}

/// Fraction of the variance of `targets` explained by `predictions`.
///
/// 1 is a perfect fit, 0 is no better than predicting the mean. Returns NaN
/// when the targets have no variance.
pub fn explained_variance(predictions: &[f32], targets: &[f32]) -> f64 {
    let n = targets.len().min(predictions.len());
    if n == 0 {
        return f64::NAN;
    }
    let var_y = variance(targets[..n].iter().map(|&t| t as f64));
    if var_y == 0.0 {
        return f64::NAN;
    }
    let var_residual = variance(
        targets[..n]
            .iter()
            .zip(&predictions[..n])
            .map(|(&t, &p)| (t - p) as f64),
    );
    1.0 - var_residual / var_y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate(500), "500");
        assert_eq!(abbreviate(1500), "1.5K");
        assert_eq!(abbreviate(196_608), "196.6K");
        assert_eq!(abbreviate(1_500_000), "1.5M");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_explained_variance() {
        let targets = [1.0, 2.0, 3.0, 4.0];
        assert!((explained_variance(&targets, &targets) - 1.0).abs() < 1e-9);
        assert!(explained_variance(&[2.5; 4], &targets).abs() < 1e-9);
        assert!(explained_variance(&[0.0; 3], &[1.0; 3]).is_nan());
    }
}
