//! Sample statistics used to finalise the user performance records.

use crate::config::PercentileMethod;

/// Root mean square of the samples, `0` when there are none.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Percentile (`0..=100`) of the samples with the chosen estimator, `0` when
/// there are none.
pub fn percentile(samples: &[f64], p: f64, method: PercentileMethod) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    match method {
        PercentileMethod::Linear => linear_percentile(samples, p),
        PercentileMethod::Histogram { resolution } => histogram_percentile(samples, p, resolution),
    }
}

/// Linear interpolation between the closest ranks, rank = p/100 (n - 1).
fn linear_percentile(samples: &[f64], p: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Cumulative histogram estimator.
///
/// Each sample falls in bin `trunc(x / resolution) * resolution`. Bins are
/// walked in increasing order and the first one whose cumulative frequency is
/// strictly above `p` percent is returned; the last bin if none is.
fn histogram_percentile(samples: &[f64], p: f64, resolution: f64) -> f64 {
    let mut bins: Vec<i64> = samples
        .iter()
        .map(|x| (x / resolution).trunc() as i64)
        .collect();
    bins.sort_unstable();

    let n = bins.len() as f64;
    let mut cumulated = 0usize;
    let mut i = 0;
    while i < bins.len() {
        let bin = bins[i];
        while i < bins.len() && bins[i] == bin {
            i += 1;
            cumulated += 1;
        }
        if cumulated as f64 / n * 100.0 > p {
            return bin as f64 * resolution;
        }
    }
    bins[bins.len() - 1] as f64 * resolution
}
