//! ABOUTME: Filesystem-safe slug generation for document filenames
//! ABOUTME: Hand-rolled rather than pulling in a dependency for a single small string helper

/// Lowercases, replaces runs of non-alphanumeric characters with a single
/// `-`, and trims leading/trailing dashes. Falls back to `"document"` for
/// titles that contain no alphanumeric characters at all.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_dash = true;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        "document".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_title_case_with_punctuation() {
        assert_eq!(slugify("What is Semantic Search?"), "what-is-semantic-search");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(slugify("booking   systems -- offline"), "booking-systems-offline");
    }

    #[test]
    fn falls_back_for_empty_input() {
        assert_eq!(slugify("   "), "document");
        assert_eq!(slugify("!!!"), "document");
    }
}
