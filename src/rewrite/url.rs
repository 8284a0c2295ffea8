//! Reference resolution and proxy wrapping.
//!
//! Every rewriter funnels a raw reference through [`rewrite_reference`],
//! which either yields the proxied form or a [`RewriteFault`] telling the
//! caller to keep the original text.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Substring identifying a reference that already routes through the proxy.
pub const PROXY_MARKER: &str = "/proxy?url=";

/// Scheme prefixes that never point at a fetchable http resource.
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "blob:"];

/// Characters left bare in the `url` query value. Parentheses and quotes are
/// escaped so the wrapped link stays valid inside an unquoted CSS `url()`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Why a single reference was left as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteFault {
    /// Empty, fragment-only, non-http scheme, or already proxied.
    Skipped,
    /// The reference could not be joined onto the base URL.
    Unresolvable(url::ParseError),
    /// Resolution succeeded but produced something other than http(s).
    NonHttp,
}

impl std::fmt::Display for RewriteFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewriteFault::Skipped => write!(f, "reference skipped"),
            RewriteFault::Unresolvable(e) => write!(f, "unresolvable reference: {}", e),
            RewriteFault::NonHttp => write!(f, "resolved to a non-http scheme"),
        }
    }
}

impl std::error::Error for RewriteFault {}

/// Per-request context for rewriting.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// Absolute URL the document was fetched from.
    pub base_url: Url,
    /// `scheme://host[:port]` of this service, without trailing slash.
    pub proxy_origin: String,
}

impl RewriteContext {
    pub fn new(base_url: Url, proxy_origin: impl Into<String>) -> Self {
        let proxy_origin = proxy_origin.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            proxy_origin,
        }
    }

    /// `{proxy_origin}/proxy?url={percent-encoded absolute}`.
    pub fn wrap(&self, absolute: &str) -> String {
        format!(
            "{}{}{}",
            self.proxy_origin,
            PROXY_MARKER,
            utf8_percent_encode(absolute, QUERY_VALUE)
        )
    }
}

fn has_http_scheme(candidate: &str) -> bool {
    let lower = candidate.get(..8).unwrap_or(candidate).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolve `candidate` against `base`.
///
/// Absolute http(s) references come back untouched and protocol-relative
/// ones borrow the base scheme. Anything else goes through RFC 3986
/// resolution; on failure the candidate is returned unresolved.
pub fn resolve(base: &Url, candidate: &str) -> String {
    try_resolve(base, candidate).unwrap_or_else(|_| candidate.to_string())
}

fn try_resolve(base: &Url, candidate: &str) -> Result<String, url::ParseError> {
    if has_http_scheme(candidate) {
        return Ok(candidate.to_string());
    }
    if candidate.starts_with("//") {
        return Ok(format!("{}:{}", base.scheme(), candidate));
    }
    base.join(candidate).map(String::from)
}

/// True when a reference must be left exactly as written.
pub fn is_skipped(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || value.contains(PROXY_MARKER) {
        return true;
    }
    let head = trimmed.get(..11).unwrap_or(trimmed).to_ascii_lowercase();
    SKIPPED_SCHEMES.iter().any(|scheme| head.starts_with(scheme))
}

/// Turn one raw reference into its proxied form.
pub fn rewrite_reference(value: &str, ctx: &RewriteContext) -> Result<String, RewriteFault> {
    if is_skipped(value) {
        return Err(RewriteFault::Skipped);
    }
    let absolute = try_resolve(&ctx.base_url, value.trim()).map_err(RewriteFault::Unresolvable)?;
    if !has_http_scheme(&absolute) {
        return Err(RewriteFault::NonHttp);
    }
    Ok(ctx.wrap(&absolute))
}

#[cfg(test)]
pub(crate) fn unwrap_proxied(wrapped: &str) -> String {
    let (_, encoded) = wrapped
        .split_once(PROXY_MARKER)
        .expect("value is not proxy-wrapped");
    percent_encoding::percent_decode_str(encoded)
        .decode_utf8()
        .unwrap()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(base: &str) -> RewriteContext {
        RewriteContext::new(Url::parse(base).unwrap(), "http://localhost:8080")
    }

    #[test]
    fn test_absolute_reference_is_untouched() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        assert_eq!(resolve(&base, "https://x.com/a"), "https://x.com/a");
        assert_eq!(resolve(&base, "HTTP://X.com/a"), "HTTP://X.com/a");
    }

    #[test]
    fn test_relative_reference() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        assert_eq!(resolve(&base, "pic.png"), "https://example.com/dir/pic.png");
        assert_eq!(resolve(&base, "../up.css"), "https://example.com/up.css");
        assert_eq!(resolve(&base, "/root.js"), "https://example.com/root.js");
        assert_eq!(resolve(&base, "./a/./b/../c"), "https://example.com/dir/a/c");
    }

    #[test]
    fn test_protocol_relative_reference() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            resolve(&base, "//cdn.example.com/a.js"),
            "https://cdn.example.com/a.js"
        );
    }

    #[test]
    fn test_unparsable_reference_is_returned_as_is() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(resolve(&base, "http://[::1"), "http://[::1");
        assert_eq!(resolve(&base, r"\\[::1"), r"\\[::1");
    }

    #[test]
    fn test_skip_list() {
        for value in [
            "javascript:void(0)",
            "JavaScript:alert(1)",
            "#top",
            "mailto:a@b.com",
            "tel:+15550100",
            "data:image/png;base64,AAAA",
            "blob:https://example.com/uuid",
            "",
            "   ",
            "http://localhost:8080/proxy?url=https%3A%2F%2Fx.com",
        ] {
            assert!(is_skipped(value), "{value:?} should be skipped");
        }
        assert!(!is_skipped("page.html"));
        assert!(!is_skipped("https://x.com/proxy"));
    }

    #[test]
    fn test_wrap_round_trips_through_percent_decoding() {
        let c = ctx("https://example.com/");
        let wrapped = rewrite_reference("https://x.com/a?b=c&d=(e)", &c).unwrap();
        assert!(wrapped.starts_with("http://localhost:8080/proxy?url="));
        assert!(!wrapped[c.proxy_origin.len() + PROXY_MARKER.len()..].contains(['&', '(', ')', '\'', '"']));
        assert_eq!(unwrap_proxied(&wrapped), "https://x.com/a?b=c&d=(e)");
    }

    #[test]
    fn test_trailing_slash_on_origin_is_dropped() {
        let c = RewriteContext::new(Url::parse("https://example.com/").unwrap(), "https://p.io/");
        assert_eq!(c.wrap("https://x.com/"), "https://p.io/proxy?url=https%3A%2F%2Fx.com%2F");
    }

    #[test]
    fn test_non_http_result_is_not_wrapped() {
        let c = ctx("https://example.com/");
        assert_eq!(rewrite_reference("about:blank", &c), Err(RewriteFault::NonHttp));
        assert_eq!(rewrite_reference("ftp://files.example.com/x", &c), Err(RewriteFault::NonHttp));
    }

    #[test]
    fn test_already_wrapped_reference_is_skipped() {
        let c = ctx("https://example.com/");
        let once = rewrite_reference("a.png", &c).unwrap();
        assert_eq!(rewrite_reference(&once, &c), Err(RewriteFault::Skipped));
    }
}
