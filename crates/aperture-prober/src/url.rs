use aperture_error::{ApertureError, ErrorCode};

/// Resolves `path` relative to `base`, preserving any non-empty base path
/// segment. A leading `/` on `path` is tolerated but never strips the
/// base's existing path prefix — this is a literal string join, not
/// standard URL-reference resolution (which would discard the base's last
/// path segment on a path-absolute reference).
pub fn join_url(base: &str, path: &str) -> Result<String, ApertureError> {
    if base.is_empty() {
        return Err(ApertureError::new(ErrorCode::InputEmptyUrl, "base URL is empty"));
    }
    reqwest::Url::parse(base).map_err(|e| {
        ApertureError::new(ErrorCode::InputUnparseableUrl, "base URL failed to parse")
            .with_context("base", base)
            .with_source(e)
    })?;

    let trimmed_base = base.trim_end_matches('/');
    let trimmed_path = path.trim_start_matches('/');
    if trimmed_path.is_empty() {
        Ok(trimmed_base.to_string())
    } else {
        Ok(format!("{trimmed_base}/{trimmed_path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_simple_relative_path() {
        assert_eq!(
            join_url("https://example.test", "foo").unwrap(),
            "https://example.test/foo"
        );
    }

    #[test]
    fn tolerates_leading_slash_on_path() {
        assert_eq!(
            join_url("https://example.test", "/foo").unwrap(),
            "https://example.test/foo"
        );
    }

    #[test]
    fn preserves_non_empty_base_path_segment() {
        assert_eq!(
            join_url("https://example.test/api", "/foo").unwrap(),
            "https://example.test/api/foo"
        );
    }

    #[test]
    fn trailing_slash_on_base_does_not_duplicate() {
        assert_eq!(
            join_url("https://example.test/api/", "foo").unwrap(),
            "https://example.test/api/foo"
        );
    }

    #[test]
    fn empty_base_is_an_input_error() {
        let err = join_url("", "/foo").unwrap_err();
        assert_eq!(err.code, ErrorCode::InputEmptyUrl);
    }

    #[test]
    fn unparseable_base_is_an_input_error() {
        let err = join_url("not a url", "/foo").unwrap_err();
        assert_eq!(err.code, ErrorCode::InputUnparseableUrl);
    }
}
