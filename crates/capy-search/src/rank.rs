//! String match ranking.

/// Rank given to a hit that matched on a keyword only.
pub const KEYWORD_RANK: u32 = 1000;

/// Rank of `title` for `term`; lower is better.
///
/// The rank is the byte offset of `term` in `title`, both compared
/// lower-cased. A term found only among `keywords` ranks [`KEYWORD_RANK`].
/// An empty term matches everything at 0.
pub fn match_rank(term: &str, title: &str, keywords: &[String]) -> Option<u32> {
    if term.is_empty() {
        return Some(0);
    }
    let term = term.to_lowercase();

    if let Some(pos) = title.to_lowercase().find(&term) {
        return Some(pos as u32);
    }

    keywords
        .iter()
        .any(|k| k.to_lowercase().contains(&term))
        .then_some(KEYWORD_RANK)
}
