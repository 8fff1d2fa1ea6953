//! Object key layout: `{collection_root}/{namespace}/{relative_path}`.

use crate::error::PipelineError;
use regex::Regex;
use std::sync::OnceLock;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("segment pattern is valid"))
}

/// Build the object key for one file of a Segment Set.
pub fn object_key(collection_root: &str, namespace: &str, relative_path: &str) -> String {
    format!(
        "{}/{}/{}",
        collection_root.trim_matches('/'),
        namespace,
        relative_path.trim_start_matches('/')
    )
}

/// Key prefix shared by every object of one namespace, trailing slash included.
pub fn namespace_folder(collection_root: &str, namespace: &str) -> String {
    format!("{}/{}/", collection_root.trim_matches('/'), namespace)
}

/// Check a single untrusted path segment taken from a request.
///
/// A valid segment is one path component made of `[A-Za-z0-9._-]` that cannot
/// climb out of its parent.
pub fn validate_segment(segment: &str) -> Result<&str, PipelineError> {
    if segment == "." || segment.contains("..") || !segment_pattern().is_match(segment) {
        return Err(PipelineError::InvalidPathSegment(segment.to_string()));
    }
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key("videos", "1700000000000", "timer.m3u8"),
            "videos/1700000000000/timer.m3u8"
        );
        assert_eq!(
            object_key("/videos/", "1700000000000", "sub/timer0.ts"),
            "videos/1700000000000/sub/timer0.ts"
        );
    }

    #[test]
    fn test_namespace_folder() {
        assert_eq!(namespace_folder("videos", "42"), "videos/42/");
    }

    #[test]
    fn test_valid_segments() {
        for segment in ["timer0.ts", "timer.m3u8", "1700000000000-a1b2c3d4", "a_b"] {
            assert!(validate_segment(segment).is_ok(), "{segment} should be valid");
        }
    }

    #[test]
    fn test_traversal_segments_rejected() {
        for segment in [
            "..",
            ".",
            "../timer0.ts",
            "..%2Ftimer0.ts",
            "a/b",
            "a\\b",
            "",
            "timer..ts",
            "/etc/passwd",
        ] {
            assert!(
                matches!(
                    validate_segment(segment),
                    Err(PipelineError::InvalidPathSegment(_))
                ),
                "{segment:?} should be rejected"
            );
        }
    }
}
