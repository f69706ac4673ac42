//! Turning user-supplied project names into identifier candidates.

/// Longest identifier candidate produced by [`normalize`].
pub const MAX_IDENTIFIER_LEN: usize = 50;

/// Normalize a raw project name into a URL-safe candidate identifier.
///
/// Lower-cases, trims, replaces each whitespace run with a single hyphen,
/// drops every character outside `[a-z0-9-]` and truncates to
/// [`MAX_IDENTIFIER_LEN`]. Returns an empty string when nothing usable
/// remains; callers must reject that.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut candidate = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for ch in lowered.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                candidate.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            candidate.push(ch);
        }
    }

    // Only ASCII remains, so byte truncation is safe.
    candidate.truncate(MAX_IDENTIFIER_LEN);
    candidate
}

/// The `attempt`-th candidate for a base identifier: `base`, `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}
