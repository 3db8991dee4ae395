//! Final ordering of fused recommendations.

use crate::domain::FusedRecommendation;
use std::cmp::Ordering;

/// Relevance first, then confidence, then type priority. Values closer than
/// the tie windows compare equal on that key.
pub fn compare(
    a: &FusedRecommendation,
    b: &FusedRecommendation,
    relevance_tie: f64,
    confidence_tie: f64,
) -> Ordering {
    if (a.clinical_relevance - b.clinical_relevance).abs() > relevance_tie {
        return b.clinical_relevance.total_cmp(&a.clinical_relevance);
    }
    if (a.confidence - b.confidence).abs() > confidence_tie {
        return b.confidence.total_cmp(&a.confidence);
    }
    a.kind().rank().cmp(&b.kind().rank())
}

/// Stable insertion sort under [`compare`].
///
/// The tie windows make `compare` non-transitive, which `slice::sort_by`
/// does not allow; insertion sort only needs adjacent comparisons and never
/// moves an element past one it does not strictly precede.
pub fn rank(
    recommendations: &mut [FusedRecommendation],
    relevance_tie: f64,
    confidence_tie: f64,
) {
    for i in 1..recommendations.len() {
        let mut j = i;
        while j > 0
            && compare(
                &recommendations[j],
                &recommendations[j - 1],
                relevance_tie,
                confidence_tie,
            ) == Ordering::Less
        {
            recommendations.swap(j, j - 1);
            j -= 1;
        }
    }
}
