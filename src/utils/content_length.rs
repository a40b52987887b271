//! Content length extraction utilities.

use reqwest::header::CONTENT_RANGE;
use reqwest::Response;

/// Total size of the resource behind a response.
///
/// A `Content-Range` header (from a range request) carries the total after
/// the slash. Otherwise the body length is added to `offset`, the number of
/// bytes already held locally. Returns `None` when neither is known.
pub fn total_length(response: &Response, offset: u64) -> Option<u64> {
    if let Some(range) = response.headers().get(CONTENT_RANGE) {
        if let Some(total) = range.to_str().ok().and_then(parse_content_range_total) {
            return Some(total);
        }
    }
    response.content_length().map(|len| len + offset)
}

/// Parse Content-Range header to extract total size.
///
/// Content-Range header format: "bytes start-end/total"
///
/// ```rust
/// use modcore::utils::parse_content_range_total;
///
/// let total = parse_content_range_total("bytes 0-1023/2048");
/// assert_eq!(total, Some(2048));
/// ```
pub fn parse_content_range_total(content_range: &str) -> Option<u64> {
    let (_, total) = content_range.split_once('/')?;
    total.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_after_slash() {
        assert_eq!(parse_content_range_total("bytes 1000-4095/4096"), Some(4096));
        assert_eq!(parse_content_range_total("bytes */4096"), Some(4096));
        assert_eq!(parse_content_range_total("bytes 0-0/ 1 "), Some(1));
    }

    #[test]
    fn test_unknown_total() {
        assert_eq!(parse_content_range_total("bytes 0-1023/*"), None);
        assert_eq!(parse_content_range_total("bytes 0-1023"), None);
        assert_eq!(parse_content_range_total(""), None);
    }
}
