use crate::search::SearchItem;

/// Splits a newest-first page at the first id at or below `cutoff`.
/// Returns the new prefix and whether the cutoff was hit; without a cutoff
/// the whole page is accepted.
pub fn apply_cutoff(items: &[SearchItem], cutoff: Option<u64>) -> (&[SearchItem], bool) {
    let Some(cutoff) = cutoff else { return (items, false) };
    match items.iter().position(|it| it.id <= cutoff) {
        Some(stop) => (&items[..stop], true),
        None => (items, false),
    }
}
