//! Coordinator utility functions.

/// Expand `${VAR}` references in configuration text.
///
/// Unknown variables expand to an empty string. A `$` that does not open a
/// `${` reference is kept as is.
pub fn expand_env_vars(input: &str) -> String {
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let reference = &rest[start + 2..];
        match reference.find('}') {
            Some(end) => {
                if let Ok(value) = std::env::var(&reference[..end]) {
                    expanded.push_str(&value);
                }
                rest = &reference[end + 1..];
            }
            // Unterminated reference swallows the remainder.
            None => {
                if let Ok(value) = std::env::var(reference) {
                    expanded.push_str(&value);
                }
                rest = "";
            }
        }
    }
    expanded.push_str(rest);
    expanded
}
