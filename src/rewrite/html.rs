//! HTML document rewriting.
//!
//! # Passes
//! ```text
//! document
//!     → attribute pass (one regex per tag/attribute pair)
//!     → css::rewrite_urls (inline <style> blocks and style= attributes)
//!     → meta refresh pass (URL part of content=, delay kept)
//!     → <base href> injection after the first <head>
//! ```
//!
//! Each match is rewritten independently; a match that cannot be rewritten
//! keeps its original text and the pass continues.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::css;
use crate::rewrite::url::{is_skipped, rewrite_reference, RewriteContext, RewriteFault};

/// Tag/attribute pairs whose values are resource references.
pub const REWRITTEN_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("link", "href"),
    ("script", "src"),
    ("img", "src"),
    ("iframe", "src"),
    ("form", "action"),
    ("source", "src"),
    ("source", "srcset"),
    ("img", "srcset"),
    ("video", "src"),
    ("audio", "src"),
    ("object", "data"),
    ("embed", "src"),
];

struct AttributePattern {
    attr: &'static str,
    regex: Regex,
}

static ATTRIBUTE_PATTERNS: LazyLock<Vec<AttributePattern>> = LazyLock::new(|| {
    REWRITTEN_ATTRIBUTES
        .iter()
        .map(|&(tag, attr)| AttributePattern {
            attr,
            regex: Regex::new(&format!(
                r#"(?is)(<{tag}\b[^>]*?\s{attr}\s*=\s*)(?:"([^"]*)"|'([^']*)')"#
            ))
            .expect("attribute pattern is valid"),
        })
        .collect()
});

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*?http-equiv\s*=\s*["']?refresh["']?[^>]*>"#)
        .expect("meta refresh pattern is valid")
});

static CONTENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(\scontent\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("content attribute pattern is valid")
});

static REFRESH_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^(\s*\d*(?:\.\d*)?\s*[;,]\s*(?:url\s*=\s*)?)(['"]?)(.*?)(['"]?)(\s*)$"#)
        .expect("refresh value pattern is valid")
});

static BASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<base\b").expect("base pattern is valid"));

static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("head pattern is valid"));

/// Rewrite every resource reference in an HTML document.
pub fn rewrite_html(body: &str, ctx: &RewriteContext) -> String {
    let mut document = body.to_string();

    for pattern in ATTRIBUTE_PATTERNS.iter() {
        document = rewrite_attribute(&document, pattern, ctx);
    }
    document = css::rewrite_urls(&document, ctx);
    document = rewrite_meta_refresh(&document, ctx);
    inject_base(&document, ctx)
}

fn rewrite_attribute(document: &str, pattern: &AttributePattern, ctx: &RewriteContext) -> String {
    let is_srcset = pattern.attr == "srcset";

    pattern
        .regex
        .replace_all(document, |caps: &Captures| {
            let original = &caps[0];
            let (value, quote) = match (caps.get(2), caps.get(3)) {
                (Some(v), _) => (v.as_str(), '"'),
                (None, Some(v)) => (v.as_str(), '\''),
                (None, None) => return original.to_string(),
            };

            let rewritten = if is_srcset {
                rewrite_srcset(value, ctx)
            } else {
                rewrite_attribute_value(value, ctx)
            };

            match rewritten {
                Ok(new_value) => format!("{}{quote}{new_value}{quote}", &caps[1]),
                Err(fault) => {
                    tracing::trace!(attr = pattern.attr, value, %fault, "attribute left unchanged");
                    original.to_string()
                }
            }
        })
        .into_owned()
}

fn rewrite_attribute_value(value: &str, ctx: &RewriteContext) -> Result<String, RewriteFault> {
    rewrite_reference(&value.replace("&amp;", "&"), ctx)
}

/// Rewrite each candidate URL of a `srcset` list. Separators and
/// descriptors are kept byte-for-byte.
fn rewrite_srcset(value: &str, ctx: &RewriteContext) -> Result<String, RewriteFault> {
    if is_skipped(value) {
        return Err(RewriteFault::Skipped);
    }

    let mut out = String::with_capacity(value.len() * 2);
    let mut last = 0;
    let mut changed = false;
    for (start, end) in srcset_urls(value) {
        out.push_str(&value[last..start]);
        let url = &value[start..end];
        match rewrite_attribute_value(url, ctx) {
            Ok(wrapped) => {
                changed = true;
                out.push_str(&wrapped);
            }
            Err(_) => out.push_str(url),
        }
        last = end;
    }
    out.push_str(&value[last..]);

    if changed {
        Ok(out)
    } else {
        Err(RewriteFault::Skipped)
    }
}

/// Byte spans of the candidate URLs in a `srcset` value.
///
/// A URL runs up to whitespace; commas only separate candidates when they
/// trail the URL or follow its descriptors, so `data:` URLs keep theirs.
fn srcset_urls(value: &str) -> Vec<(usize, usize)> {
    let bytes = value.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i == bytes.len() {
            break;
        }

        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut end = i;
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        spans.push((start, end));
        if end < i {
            continue;
        }

        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    i += 1;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }
    spans
}

fn rewrite_meta_refresh(document: &str, ctx: &RewriteContext) -> String {
    META_REFRESH
        .replace_all(document, |caps: &Captures| {
            let tag = &caps[0];
            CONTENT_ATTR
                .replace(tag, |content: &Captures| {
                    let original = &content[0];
                    let (value, quote) = match (content.get(2), content.get(3)) {
                        (Some(v), _) => (v.as_str(), '"'),
                        (None, Some(v)) => (v.as_str(), '\''),
                        (None, None) => return original.to_string(),
                    };
                    match rewrite_refresh_value(value, ctx) {
                        Ok(new_value) => format!("{}{quote}{new_value}{quote}", &content[1]),
                        Err(fault) => {
                            tracing::trace!(value, %fault, "meta refresh left unchanged");
                            original.to_string()
                        }
                    }
                })
                .into_owned()
        })
        .into_owned()
}

/// `"5; url=next.html"` → `"5; url={wrapped}"`.
fn rewrite_refresh_value(value: &str, ctx: &RewriteContext) -> Result<String, RewriteFault> {
    let caps = REFRESH_VALUE.captures(value).ok_or(RewriteFault::Skipped)?;
    let target = caps.get(3).map_or("", |m| m.as_str());
    let wrapped = rewrite_attribute_value(target, ctx)?;
    Ok(format!(
        "{}{}{}{}{}",
        &caps[1], &caps[2], wrapped, &caps[4], &caps[5]
    ))
}

fn inject_base(document: &str, ctx: &RewriteContext) -> String {
    if BASE_TAG.is_match(document) {
        return document.to_string();
    }
    let Some(head) = HEAD_OPEN.find(document) else {
        return document.to_string();
    };

    let href = escape_attribute(ctx.base_url.as_str());
    let mut out = String::with_capacity(document.len() + href.len() + 16);
    out.push_str(&document[..head.end()]);
    out.push_str(&format!("<base href=\"{}\">", href));
    out.push_str(&document[head.end()..]);
    out
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
