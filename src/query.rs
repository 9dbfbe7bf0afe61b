//! Helpers for the Drive `q` search syntax.

use crate::models::FOLDER_MIME_TYPE;

/// Escape a literal for use inside a single-quoted query string.
pub fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `mimeType='<mime_type>'`
pub fn mime_type_is(mime_type: &str) -> String {
    format!("mimeType='{}'", escape(mime_type))
}

/// Every folder the user can see.
pub fn folders() -> String {
    mime_type_is(FOLDER_MIME_TYPE)
}

/// `'<folder_id>' in parents`
pub fn in_parents(folder_id: &str) -> String {
    format!("'{}' in parents", escape(folder_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folders_query() {
        assert_eq!(folders(), "mimeType='application/vnd.google-apps.folder'");
    }

    #[test]
    fn test_mime_type_query() {
        assert_eq!(mime_type_is("image/jpeg"), "mimeType='image/jpeg'");
    }

    #[test]
    fn test_in_parents_query() {
        assert_eq!(in_parents("1abcXYZ"), "'1abcXYZ' in parents");
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(in_parents("it's"), r"'it\'s' in parents");
        assert_eq!(escape(r"a\b"), r"a\\b");
    }
}
