use crate::subject::SubjectPath;

/// Extension given to every categorized file, regardless of the source spelling.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Directory and file stem derived from a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    /// Sanitized top-level category: the destination directory name.
    pub category_dir: String,
    /// Sanitized deepest category: the new file name stem.
    pub deepest_category: String,
}

/// Replace every character that is not a letter, digit, space, hyphen or
/// underscore with `_`.
///
/// Replacement is one-for-one, so the result has as many characters as the
/// input.
///
/// ```rust
/// use exif_tree::naming::sanitize_component;
///
/// assert_eq!(sanitize_component("Vacation?2024"), "Vacation_2024");
/// assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
/// ```
pub fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect()
}

fn is_allowed(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric() || c == ' ' || c == '-' || c == '_'
}

/// Derive the category directory and file stem from a subject path.
pub fn derive_names(path: &SubjectPath) -> DerivedNames {
    DerivedNames {
        category_dir: sanitize_component(path.top()),
        deepest_category: sanitize_component(path.deepest()),
    }
}

/// Build `{deepest}_{content_id}.jpg`.
pub fn categorized_file_name(deepest_category: &str, content_id: &str) -> String {
    format!("{deepest_category}_{content_id}.{OUTPUT_EXTENSION}")
}
