//! Cosine similarity ranking over the (small) set of embedded menu items.

/// Cosine similarity of two vectors.
///
/// Returns `None` when the vectors differ in length, are empty, or either has zero norm, since
/// the angle is undefined in those cases.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// The `k` candidates most similar to `query`, best first.
///
/// Candidates whose embedding can't be compared with the query are skipped.
pub fn top_k<'a, T>(query: &[f32], candidates: impl IntoIterator<Item = (&'a T, &'a [f32])>, k: usize) -> Vec<(&'a T, f32)>
where
    T: ?Sized,
{
    let mut scored: Vec<(&T, f32)> = candidates
        .into_iter()
        .filter_map(|(item, embedding)| cosine_similarity(query, embedding).map(|score| (item, score)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}
