//! Stylesheet and inline-style URL rewriting.
//!
//! Only `url(...)` tokens and the string form of `@import` are touched; every
//! other byte of the input is copied through unchanged.

use vn_url::BaseDocument;
use vn_url::EncodeOptions;
use vn_url::ProxyUrlCodec;
use vn_url::ResourceType;

/// Rewrites stylesheet text through the proxy URL codec.
#[derive(Debug, Clone, Copy)]
pub struct StylesheetRewriter<'a> {
    codec: &'a ProxyUrlCodec,
    doc: Option<&'a BaseDocument>,
}

impl<'a> StylesheetRewriter<'a> {
    pub fn new(codec: &'a ProxyUrlCodec) -> Self {
        Self { codec, doc: None }
    }

    pub fn in_document(mut self, doc: Option<&'a BaseDocument>) -> Self {
        self.doc = doc;
        self
    }

    /// Rewrites a full stylesheet or the contents of a `<style>` element.
    pub fn rewrite(&self, css: &str) -> String {
        rewrite_css_urls(css, |url| self.encode(url))
    }

    /// Rewrites the value of a `style` attribute.
    pub fn rewrite_declarations(&self, declarations: &str) -> String {
        self.rewrite(declarations)
    }

    fn encode(&self, url: &str) -> String {
        let options = EncodeOptions {
            resource_type: ResourceType::PLAIN,
            doc: self.doc,
            ..EncodeOptions::default()
        };
        self.codec.encode(url, &options)
    }
}

/// Quoting context a URL is written back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlQuote {
    Single,
    Double,
    Bare,
}

impl UrlQuote {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'\'' => Some(Self::Single),
            b'"' => Some(Self::Double),
            _ => None,
        }
    }
}

/// Calls `map` for every URL in `css` and splices the results back in place.
pub fn rewrite_css_urls(css: &str, mut map: impl FnMut(&str) -> String) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut copied = 0_usize;
    let mut idx = 0_usize;

    while idx < bytes.len() {
        let byte = bytes[idx];

        if byte == b'/' && bytes.get(idx.saturating_add(1)).copied() == Some(b'*') {
            idx = skip_comment(bytes, idx);
            continue;
        }

        if byte == b'\'' || byte == b'"' {
            idx = skip_string(bytes, idx).1;
            continue;
        }

        if starts_with_ignore_ascii_case(bytes, idx, b"url(") && ident_boundary(bytes, idx) {
            match parse_url_token(bytes, idx.saturating_add(4)) {
                Some(token) => {
                    let raw = &css[token.value_start..token.value_end];
                    out.push_str(&css[copied..token.value_start]);
                    out.push_str(&escape_for_quote(&map(raw), token.quote));
                    copied = token.value_end;
                    idx = token.after;
                }
                None => idx = idx.saturating_add(4),
            }
            continue;
        }

        if starts_with_ignore_ascii_case(bytes, idx, b"@import") {
            let after_keyword = skip_spaces(bytes, idx.saturating_add(7));
            if let Some(quote) = bytes.get(after_keyword).copied().and_then(UrlQuote::from_byte) {
                let (value_end, after) = skip_string(bytes, after_keyword);
                let value_start = after_keyword.saturating_add(1);
                if value_end >= value_start {
                    let raw = &css[value_start..value_end];
                    out.push_str(&css[copied..value_start]);
                    out.push_str(&escape_for_quote(&map(raw), quote));
                    copied = value_end;
                }
                idx = after;
                continue;
            }
            idx = after_keyword;
            continue;
        }

        idx = idx.saturating_add(1);
    }

    out.push_str(&css[copied..]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UrlToken {
    value_start: usize,
    value_end: usize,
    quote: UrlQuote,
    after: usize,
}

fn parse_url_token(bytes: &[u8], start: usize) -> Option<UrlToken> {
    let idx = skip_spaces(bytes, start);
    let first = bytes.get(idx).copied()?;

    if let Some(quote) = UrlQuote::from_byte(first) {
        let (value_end, after_string) = skip_string(bytes, idx);
        let close = skip_spaces(bytes, after_string);
        if bytes.get(close).copied() != Some(b')') {
            return None;
        }
        return Some(UrlToken {
            value_start: idx.saturating_add(1),
            value_end,
            quote,
            after: close.saturating_add(1),
        });
    }

    let close = bytes[idx..].iter().position(|b| *b == b')')? + idx;
    let mut value_end = close;
    while value_end > idx && bytes[value_end - 1].is_ascii_whitespace() {
        value_end -= 1;
    }

    Some(UrlToken {
        value_start: idx,
        value_end,
        quote: UrlQuote::Bare,
        after: close.saturating_add(1),
    })
}

/// Percent-encodes the characters that would end the surrounding token.
fn escape_for_quote(url: &str, quote: UrlQuote) -> String {
    let mut out = String::with_capacity(url.len());
    for ch in url.chars() {
        let needs_escape = match quote {
            UrlQuote::Single => ch == '\'' || ch == '\n',
            UrlQuote::Double => ch == '"' || ch == '\n',
            UrlQuote::Bare => {
                matches!(ch, '\'' | '"' | '(' | ')' | '\\') || ch.is_ascii_whitespace()
            }
        };

        if needs_escape {
            out.push_str(&format!("%{:02X}", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Returns `(closing_quote_index, index_after_string)`; an unterminated string
/// runs to the end of input.
fn skip_string(bytes: &[u8], open: usize) -> (usize, usize) {
    let quote = bytes[open];
    let mut idx = open.saturating_add(1);
    let mut escape = false;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if escape {
            escape = false;
        } else if byte == b'\\' {
            escape = true;
        } else if byte == quote {
            return (idx, idx.saturating_add(1));
        } else if byte == b'\n' {
            // CSS strings cannot span lines.
            return (idx, idx);
        }
        idx = idx.saturating_add(1);
    }

    (bytes.len(), bytes.len())
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut idx = start.saturating_add(2);
    while idx.saturating_add(1) < bytes.len() {
        if bytes[idx] == b'*' && bytes[idx + 1] == b'/' {
            return idx.saturating_add(2);
        }
        idx = idx.saturating_add(1);
    }
    bytes.len()
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn ident_boundary(bytes: &[u8], idx: usize) -> bool {
    idx == 0 || !matches!(bytes[idx - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_')
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}
