//! Deterministic query broadening for the second attempt.

/// Broaden a query that produced zero hits.
///
/// Punctuation becomes whitespace, very short tokens are dropped, and
/// duplicate tokens collapse, leaving the content words as a bag-of-terms
/// query the lexical matcher can hit more loosely. Returns `None` when the
/// text has no usable tokens (the caller then re-runs the vector side
/// unchanged with a widened property set).
pub fn broaden(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut seen: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        if token.chars().count() <= 2 {
            continue;
        }
        let lowered = token.to_lowercase();
        if !seen.contains(&lowered) {
            seen.push(lowered);
        }
    }

    if seen.is_empty() {
        // Nothing survived the filter; fall back to the raw tokens.
        let raw: Vec<&str> = cleaned.split_whitespace().collect();
        if raw.is_empty() {
            return None;
        }
        return Some(raw.join(" "));
    }

    Some(seen.join(" "))
}
