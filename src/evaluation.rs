//! Agreement between metric scores and human judgements.
//!
//! All functions take two parallel slices and return `None` when the input is
//! too short or degenerate (zero variance, mismatched lengths).

/// Pearson product-moment correlation.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(sxy / denom)
}

/// Spearman rank correlation: Pearson over ranks, ties sharing their mean rank.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&ranks(x), &ranks(y))
}

/// Root mean squared error.
pub fn rmse(predicted: &[f64], expected: &[f64]) -> Option<f64> {
    mean_of(predicted, expected, |d| d * d).map(f64::sqrt)
}

/// Mean absolute error.
pub fn mae(predicted: &[f64], expected: &[f64]) -> Option<f64> {
    mean_of(predicted, expected, f64::abs)
}

fn mean_of(a: &[f64], b: &[f64], f: impl Fn(f64) -> f64) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    Some(a.iter().zip(b).map(|(p, e)| f(p - e)).sum::<f64>() / a.len() as f64)
}

/// 1-based ranks; a run of equal values gets the average of its positions.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}
