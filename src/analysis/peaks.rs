use ndarray::ArrayView1;
/// Indices of local maxima in `signal`.
///
/// A flat top counts once, at its middle sample (rounded down). Samples at
/// either end are never peaks. Peaks below `height` are discarded, then peaks
/// closer than `distance` samples to a taller one are dropped.
pub fn find_peaks(signal: ArrayView1<'_, f64>, height: Option<f64>, distance: usize) -> Vec<usize> {
    let mut peaks = local_maxima(signal);
    if let Some(h) = height {
        peaks.retain(|&p| signal[p] >= h);
    }
    if distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(signal, &peaks, distance);
    }
    peaks
}
fn local_maxima(x: ArrayView1<'_, f64>) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}
fn select_by_distance(x: ArrayView1<'_, f64>, peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    // tallest first; among equal heights the later peak wins
    order.sort_by(|&a, &b| {
        x[peaks[b]]
            .partial_cmp(&x[peaks[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.cmp(&a))
    });
    let mut keep = vec![true; peaks.len()];
    for &i in &order {
        if !keep[i] {
            continue;
        }
        let mut j = i;
        while j > 0 && peaks[i] - peaks[j - 1] < distance {
            keep[j - 1] = false;
            j -= 1;
        }
        let mut j = i + 1;
        while j < peaks.len() && peaks[j] - peaks[i] < distance {
            keep[j] = false;
            j += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}
