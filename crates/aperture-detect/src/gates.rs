use aperture_core::HistoryRecord;

/// First N bytes sniffed for an HTML doctype/tag, matching browsers'
/// de-facto content sniffing rather than trusting `Content-Type` alone.
const SNIFF_WINDOW: usize = 512;

/// True if `record` looks like an HTML document, by content-type *and*
/// body sniffing — either signal alone is insufficient per §4.2.
pub fn looks_like_html(record: &HistoryRecord) -> bool {
    let content_type_says_html = record
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.eq_ignore_ascii_case("text/html") || ct.to_ascii_lowercase().starts_with("text/html;"));

    let window = &record.body[..record.body.len().min(SNIFF_WINDOW)];
    let text = String::from_utf8_lossy(window).to_ascii_lowercase();
    let sniffed_html = text.contains("<!doctype html") || text.contains("<html");

    content_type_says_html || sniffed_html
}

/// True if `status` falls in the 4xx or 5xx class.
pub fn is_error_status(status: u16) -> bool {
    matches!(status / 100, 4 | 5)
}

/// Hard rejection per §4.2: wrong status class, an HTML response where the
/// artifact must be non-HTML, or an empty body when content is mandatory.
/// Returns `Some(reason)` when the record should be rejected without
/// scoring.
pub fn hard_reject(
    record: &HistoryRecord,
    allow_error_status: bool,
    reject_html: bool,
    require_non_empty_body: bool,
) -> Option<&'static str> {
    if !allow_error_status && is_error_status(record.status_code) {
        return Some("error status class");
    }
    if reject_html && looks_like_html(record) {
        return Some("html response for non-html artifact");
    }
    if require_non_empty_body && record.body.is_empty() {
        return Some("empty body");
    }
    None
}
