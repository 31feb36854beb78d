//! `Link` header pagination.

/// Pagination links extracted from GitHub's `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// Absolute URL of the next page, absent on the last one.
    pub next_url: Option<String>,
}

/// Parse a `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/issues?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
///
/// Only `rel="next"` matters: list walks follow it until it disappears.
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let next_url = link_header.split(',').find_map(|part| {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        match (url, rel) {
            (Some(url), Some("next")) => Some(url.to_string()),
            _ => None,
        }
    });

    LinkPagination { next_url }
}
