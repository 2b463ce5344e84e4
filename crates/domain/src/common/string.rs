//! Name lookup helpers.

/// Finds the candidate a player most likely meant by `needle`.
///
/// Matching is case-insensitive and tiered: an exact match wins over a prefix
/// match, which wins over a substring match. Within a tier the first candidate
/// in iteration order is returned.
///
/// ```
/// use raconteur_domain::common::fuzzy_search;
///
/// let names = ["Athletics", "Fight", "Fighting Spirit"];
/// assert_eq!(fuzzy_search("fight", names), Some("Fight"));
/// assert_eq!(fuzzy_search("ath", names), Some("Athletics"));
/// assert_eq!(fuzzy_search("spirit", names), Some("Fighting Spirit"));
/// assert_eq!(fuzzy_search("stealth", names), None);
/// ```
pub fn fuzzy_search<'a, I, S>(needle: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let mut prefix = None;
    let mut substring = None;
    for candidate in candidates {
        let candidate: &'a str = candidate.as_ref();
        let lowered = candidate.to_lowercase();
        if lowered == needle {
            return Some(candidate);
        }
        if prefix.is_none() && lowered.starts_with(&needle) {
            prefix = Some(candidate);
        } else if substring.is_none() && lowered.contains(&needle) {
            substring = Some(candidate);
        }
    }
    prefix.or(substring)
}
