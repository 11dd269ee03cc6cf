//! Similarity ranking of stored chunks

/// Compute cosine similarity between two vectors
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

/// Rank candidates by similarity to `query`, keeping the best `top_k`
///
/// Candidates are given in insertion order; equal scores keep that order.
/// Candidates without a vector, or whose score is NaN, score 0.0.
#[must_use]
pub fn rank<'a, T>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (&'a T, Option<&'a [f32]>)>,
    top_k: usize,
) -> Vec<(&'a T, f32)>
where
    T: 'a,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&T, f32)> = candidates
        .into_iter()
        .map(|(item, vector)| {
            let score = vector.map_or(0.0, |v| cosine_similarity(query, v));
            (item, if score.is_nan() { 0.0 } else { score })
        })
        .collect();

    // Stable sort keeps insertion order among ties
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}
