//! Native event type to canonical event name.

/// Convert a native event type to its delimited, lowercase form.
///
/// Word boundaries are a lowercase letter or digit followed by an uppercase
/// letter, the last capital of an acronym run followed by a lowercase letter,
/// and any `_`, `-`, `.` or whitespace separator. Separator runs collapse.
///
/// ```
/// use abr_engine::to_event_type;
/// assert_eq!(to_event_type("trackChangeRendered"), "track-change-rendered");
/// assert_eq!(to_event_type("QUALITY_CHANGE_REQUESTED"), "quality-change-requested");
/// ```
pub fn to_event_type(native: &str) -> String {
    let chars: Vec<char> = native.chars().collect();
    let mut out = String::with_capacity(native.len() + 4);
    let mut pending_sep = false;

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | '.') || c.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }

        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && !out.is_empty() {
                pending_sep = true;
            }
        }

        if pending_sep {
            out.push('-');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }

    out
}
