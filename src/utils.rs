/// Computes 1 / (1 + exp(-t)) in a numerically stable way.
///
/// The naive form overflows exp for large negative t; branching on the sign
/// keeps the exponent non-positive so the result is always finite in [0, 1].
pub fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// Fraction of sites where both grids agree, in [0, 1].
pub fn grid_accuracy(a: &[i8], b: &[i8]) -> f64 {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 1.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}
