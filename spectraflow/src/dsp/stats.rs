/// Arithmetic mean; 0.0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median; averages the two middle elements for even counts.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
pub(crate) fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Piecewise-linear interpolation of `(xs, ys)` sampled at `at`,
/// extrapolating linearly beyond both ends.  `xs` must be strictly
/// increasing with at least two entries.
pub(crate) fn interp_linear(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    debug_assert!(xs.len() == ys.len() && xs.len() >= 2);
    at.iter()
        .map(|&x| {
            // segment whose right-hand knot is the first x-coordinate >= x,
            // clamped so the end segments extend outward
            let seg = match xs.iter().position(|&knot| knot >= x) {
                None => xs.len() - 1,
                Some(0) => 1,
                Some(ix) => ix,
            };
            let (x0, x1) = (xs[seg - 1], xs[seg]);
            let (y0, y1) = (ys[seg - 1], ys[seg]);
            y0 + (x - x0) * (y1 - y0) / (x1 - x0)
        })
        .collect()
}
