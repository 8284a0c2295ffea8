//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! relayed body + content-type
//!     → MediaType::from_content_type (dispatch)
//!     → html.rs  (text/html: attributes, inline CSS, meta refresh, <base>)
//!     → css.rs   (text/css: url() references)
//!     → anything else passes through untouched
//! ```
//!
//! # Design Decisions
//! - Pure text transforms: no I/O, no state between calls
//! - Fail-open per match: an unrewritable reference keeps its original text
//! - Already-proxied references are recognized by the literal marker, which
//!   makes a second pass over rewritten output a no-op

pub mod css;
pub mod html;
pub mod url;

pub use self::css::rewrite_css;
pub use self::html::rewrite_html;
pub use self::url::{resolve, RewriteContext, RewriteFault, PROXY_MARKER};

/// How a body is treated by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Html,
    Css,
    Other,
}

impl MediaType {
    /// Classify a `content-type` header value, ignoring parameters and case.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/html" => MediaType::Html,
            "text/css" => MediaType::Css,
            _ => MediaType::Other,
        }
    }

    /// Whether bodies of this type go through the rewriter at all.
    pub fn is_rewritable(self) -> bool {
        !matches!(self, MediaType::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Html => "html",
            MediaType::Css => "css",
            MediaType::Other => "other",
        }
    }
}

/// Rewrite `body` according to its declared media type.
pub fn rewrite(body: &str, media_type: &str, ctx: &RewriteContext) -> String {
    match MediaType::from_content_type(media_type) {
        MediaType::Html => rewrite_html(body, ctx),
        MediaType::Css => rewrite_css(body, ctx),
        MediaType::Other => body.to_string(),
    }
}

/// Rewrite a raw relayed body. Bodies that are not HTML/CSS, or are not valid
/// UTF-8, are returned as-is.
pub fn rewrite_bytes(body: bytes::Bytes, media_type: &str, ctx: &RewriteContext) -> bytes::Bytes {
    if !MediaType::from_content_type(media_type).is_rewritable() {
        return body;
    }
    match std::str::from_utf8(&body) {
        Ok(text) => bytes::Bytes::from(rewrite(text, media_type, ctx)),
        Err(e) => {
            tracing::debug!(error = %e, media_type, "body is not UTF-8, skipping rewrite");
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;
    use bytes::Bytes;

    fn ctx() -> RewriteContext {
        RewriteContext::new(Url::parse("https://example.com/dir/").unwrap(), "http://p:1")
    }

    #[test]
    fn test_media_type_classification() {
        assert_eq!(MediaType::from_content_type("text/html"), MediaType::Html);
        assert_eq!(MediaType::from_content_type("Text/HTML; charset=utf-8"), MediaType::Html);
        assert_eq!(MediaType::from_content_type(" text/css ;charset=x"), MediaType::Css);
        assert_eq!(MediaType::from_content_type("application/json"), MediaType::Other);
        assert_eq!(MediaType::from_content_type("text/plain"), MediaType::Other);
        assert_eq!(MediaType::from_content_type(""), MediaType::Other);
    }

    #[test]
    fn test_dispatch() {
        let html = r#"<img src="a.png">"#;
        assert!(rewrite(html, "text/html", &ctx()).contains(PROXY_MARKER));
        assert!(rewrite("p{x:url(a.png)}", "text/css", &ctx()).contains(PROXY_MARKER));
    }

    #[test]
    fn test_other_types_pass_through() {
        let json = r#"{"link": "<a href=\"x\">", "bg": "url(a.png)"}"#;
        assert_eq!(rewrite(json, "application/json", &ctx()), json);
        assert_eq!(rewrite(json, "", &ctx()), json);

        let binary = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x00, 0xff]);
        assert_eq!(rewrite_bytes(binary.clone(), "image/png", &ctx()), binary);
    }

    #[test]
    fn test_non_utf8_html_passes_through() {
        let latin1 = Bytes::from_static(b"<img src=\"caf\xe9.png\">");
        assert_eq!(rewrite_bytes(latin1.clone(), "text/html", &ctx()), latin1);
    }
}
