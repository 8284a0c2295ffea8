//! CSS `url(...)` rewriting.
//!
//! Used for whole stylesheets and, from the HTML rewriter, for inline
//! `<style>` blocks and `style=` attributes.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::url::{rewrite_reference, RewriteContext};

/// `url(...)` in a stylesheet. CSS functions are case-insensitive.
static STYLESHEET_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
        .expect("stylesheet url pattern is valid")
});

// Inside markup `url(` is matched case-sensitively so script calls such as
// `new URL(x)` are not mistaken for CSS references. Attribute values may
// quote the reference with character references instead of quotes.
static MARKUP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"\burl\(\s*(?:"([^"]*)"|'([^']*)'"#,
        r#"|(&quot;|&#34;|&#x22;|&#39;|&#x27;|&apos;)([^)]*?)(&quot;|&#34;|&#x22;|&#39;|&#x27;|&apos;)"#,
        r#"|([^)"'\s]*))\s*\)"#,
    ))
    .expect("markup url pattern is valid")
});

/// Rewrite a stylesheet.
pub fn rewrite_css(body: &str, ctx: &RewriteContext) -> String {
    STYLESHEET_URL
        .replace_all(body, |caps: &Captures| {
            let (open, value, close) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(v), _, _) => ("\"", v.as_str(), "\""),
                (_, Some(v), _) => ("'", v.as_str(), "'"),
                (_, _, Some(v)) => ("", v.as_str(), ""),
                _ => return caps[0].to_string(),
            };
            rewrite_match(&caps[0], open, value, close, ctx)
        })
        .into_owned()
}

/// Rewrite every `url(...)` reference inside an HTML document (inline
/// `<style>` blocks and `style=` attributes).
pub fn rewrite_urls(text: &str, ctx: &RewriteContext) -> String {
    MARKUP_URL
        .replace_all(text, |caps: &Captures| {
            let (open, value, close) = match (caps.get(1), caps.get(2), caps.get(4), caps.get(6)) {
                (Some(v), _, _, _) => ("\"", v.as_str(), "\""),
                (_, Some(v), _, _) => ("'", v.as_str(), "'"),
                (_, _, Some(v), _) => (&caps[3], v.as_str(), &caps[5]),
                (_, _, _, Some(v)) => ("", v.as_str(), ""),
                _ => return caps[0].to_string(),
            };
            let value = value.replace("&amp;", "&");
            rewrite_match(&caps[0], open, &value, close, ctx)
        })
        .into_owned()
}

fn rewrite_match(original: &str, open: &str, value: &str, close: &str, ctx: &RewriteContext) -> String {
    match rewrite_reference(value, ctx) {
        Ok(wrapped) => format!("url({open}{wrapped}{close})"),
        Err(fault) => {
            tracing::trace!(value, %fault, "css url left unchanged");
            original.to_string()
        }
    }
}
