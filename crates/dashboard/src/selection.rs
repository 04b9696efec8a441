use engine::RenderedFeature;

/// Picks the hits shown in the detail view.
///
/// `hits` are top-most first. Consecutive hits from the same layer collapse
/// to the first one, and at most `limit` hits are kept.
pub fn select_hits(hits: Vec<RenderedFeature>, limit: usize) -> Vec<RenderedFeature> {
    let mut out: Vec<RenderedFeature> = Vec::with_capacity(limit.min(hits.len()));
    for hit in hits {
        if out.len() == limit {
            break;
        }
        if out.last().is_some_and(|prev| prev.layer_id == hit.layer_id) {
            continue;
        }
        out.push(hit);
    }
    out
}
