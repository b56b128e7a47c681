//! Per-beat template-match quality.
//!
//! Every beat is cut from the signal around its peak, the mean of all beats
//! is the template, and a beat's quality is its Pearson correlation with the
//! template, clamped to `0..=1`.

/// Share of the median interval taken before and after each peak
const PRE_PEAK: f64 = 0.35;
const POST_PEAK: f64 = 0.55;

/// Quality score per peak, same order as `peaks`.
pub fn beat_quality(signal: &[f64], peaks: &[usize]) -> Vec<f64> {
    match peaks.len() {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }

    let mut intervals: Vec<usize> = peaks.windows(2).map(|w| w[1].saturating_sub(w[0])).collect();
    intervals.sort_unstable();
    let median = intervals[intervals.len() / 2].max(2) as f64;
    let pre = (PRE_PEAK * median).round() as usize;
    let post = (POST_PEAK * median).round() as usize;
    let width = pre + post + 1;

    // template from beats that fit entirely inside the signal
    let mut template = vec![0.0; width];
    let mut complete = 0usize;
    for &peak in peaks {
        if peak >= pre && peak + post < signal.len() {
            for (t, v) in template.iter_mut().zip(&signal[peak - pre..=peak + post]) {
                *t += v;
            }
            complete += 1;
        }
    }
    if complete == 0 {
        return vec![0.0; peaks.len()];
    }
    for t in &mut template {
        *t /= complete as f64;
    }

    peaks
        .iter()
        .map(|&peak| {
            // truncated beats are compared on their overlap with the template
            let start = peak.saturating_sub(pre);
            let end = (peak + post).min(signal.len().saturating_sub(1));
            if start > end {
                return 0.0;
            }
            let offset = pre - (peak - start);
            let beat = &signal[start..=end];
            let reference = &template[offset..offset + beat.len()];
            pearson(beat, reference).map_or(0.0, |r| r.clamp(0.0, 1.0))
        })
        .collect()
}

/// Pearson correlation; `None` for fewer than two points or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_pearson_basics() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn test_periodic_signal_scores_high() {
        let signal: Vec<f64> = (0..500).map(|i| (2.0 * PI * i as f64 / 25.0).sin()).collect();
        // sine peaks at i = 25k + 6.25
        let peaks: Vec<usize> = (0..19).map(|k| 25 * k + 6).collect();
        let quality = beat_quality(&signal, &peaks);
        assert_eq!(quality.len(), peaks.len());
        assert!(quality.iter().all(|q| *q > 0.99), "{quality:?}");
    }

    #[test]
    fn test_distorted_beat_scores_lower() {
        let mut signal: Vec<f64> = (0..500).map(|i| (2.0 * PI * i as f64 / 25.0).sin()).collect();
        for v in &mut signal[200..225] {
            *v = -*v;
        }
        let peaks: Vec<usize> = (0..19).map(|k| 25 * k + 6).collect();
        let quality = beat_quality(&signal, &peaks);
        // beat around 206 is inverted
        assert!(quality[8] < 0.5);
        assert!(quality[2] > 0.9);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(beat_quality(&[1.0, 2.0], &[]).is_empty());
        assert_eq!(beat_quality(&[1.0, 2.0, 1.0], &[1]), vec![1.0]);
    }
}
