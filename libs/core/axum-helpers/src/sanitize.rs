//! Normalisation of user-supplied names, titles and tags.

use std::fmt;

/// Strips control characters, collapses runs of whitespace to one space and
/// trims both ends.
pub fn clean_text(input: &str) -> String {
    input
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Why a tag list was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    TooMany { max: usize },
    Empty,
    TooLong { tag: String, max: usize },
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::TooMany { max } => write!(f, "at most {} tags are allowed", max),
            TagError::Empty => write!(f, "tags must not be empty"),
            TagError::TooLong { tag, max } => {
                write!(f, "tag '{}' is longer than {} characters", tag, max)
            }
        }
    }
}

/// Cleans, lowercases and de-duplicates tags, keeping first-seen order.
///
/// The count limit applies after de-duplication.
pub fn normalize_tags<S: AsRef<str>>(
    tags: &[S],
    max_tags: usize,
    max_len: usize,
) -> Result<Vec<String>, TagError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

    for raw in tags {
        let tag = clean_text(raw.as_ref()).to_lowercase();
        if tag.is_empty() {
            return Err(TagError::Empty);
        }
        if tag.chars().count() > max_len {
            return Err(TagError::TooLong { tag, max: max_len });
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.len() > max_tags {
        return Err(TagError::TooMany { max: max_tags });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace_and_controls() {
        assert_eq!(clean_text("  Sprint \t\n Planning\u{0007} "), "Sprint Planning");
        assert_eq!(clean_text("a\u{0000}b"), "a b");
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn test_tags_are_lowercased_and_deduplicated_in_order() {
        let tags = normalize_tags(&["Work", " q3 ", "work", "Q3", "team"], 10, 32).unwrap();
        assert_eq!(tags, vec!["work", "q3", "team"]);
    }

    #[test]
    fn test_tag_limits() {
        let many: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
        assert_eq!(normalize_tags(&many, 10, 32), Err(TagError::TooMany { max: 10 }));
        assert_eq!(normalize_tags(&["  "], 10, 32), Err(TagError::Empty));
        assert!(matches!(
            normalize_tags(&["x".repeat(33)], 10, 32),
            Err(TagError::TooLong { max: 32, .. })
        ));
        assert!(normalize_tags(&["x".repeat(32)], 10, 32).is_ok());
    }
}
