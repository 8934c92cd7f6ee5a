//! Span-level start tag scanning. Positions are byte offsets into the source
//! so callers can splice replacements without re-serializing the tag.

/// Elements whose content is raw text that is processed once complete.
pub fn is_raw_text_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

/// Elements whose content up to the matching end tag is text, never markup.
pub fn is_text_only_tag(tag: &str) -> bool {
    is_raw_text_tag(tag)
        || ["textarea", "title", "xmp", "noscript", "plaintext"]
            .iter()
            .any(|name| tag.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSpan {
    pub start: usize,
    pub end: usize,
    pub quote: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttribute {
    /// Lowercased.
    pub name: String,
    pub value: Option<ValueSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased.
    pub name: String,
    pub attrs: Vec<TagAttribute>,
    /// Offset just past the closing `>`.
    pub end: usize,
    pub self_closing: bool,
}

impl StartTag {
    pub fn value<'s>(&self, source: &'s str, name: &str) -> Option<&'s str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .and_then(|attr| attr.value)
            .map(|span| &source[span.start..span.end])
    }
}

/// Parses the start tag whose `<` is at `start`. Returns `None` when the bytes
/// there do not form a complete start tag.
pub fn parse_start_tag(source: &str, start: usize) -> Option<StartTag> {
    let bytes = source.as_bytes();
    let mut i = start.saturating_add(1);
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let name_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let name = source[name_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        skip_spaces(bytes, &mut i);
        if i >= bytes.len() {
            return None;
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' {
            i += 1;
            skip_spaces(bytes, &mut i);
            if i < bytes.len() && bytes[i] == b'>' {
                self_closing = true;
                i += 1;
                break;
            }
            continue;
        }

        let attr_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if i == attr_start {
            i += 1;
            continue;
        }

        let attr_name = source[attr_start..i].to_ascii_lowercase();
        skip_spaces(bytes, &mut i);

        let mut value = None;
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            skip_spaces(bytes, &mut i);
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return None;
                }
                value = Some(ValueSpan {
                    start: value_start,
                    end: i,
                    quote: Some(quote),
                });
                i += 1;
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = Some(ValueSpan {
                    start: value_start,
                    end: i,
                    quote: None,
                });
            }
        }

        attrs.push(TagAttribute {
            name: attr_name,
            value,
        });
    }

    Some(StartTag {
        name,
        attrs,
        end: i,
        self_closing,
    })
}

/// Finds `</tag>` at or after `from`; returns `(content_end, after_close)`.
pub fn find_closing_tag(source: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let tag_bytes = tag.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        let name_start = i.saturating_add(2);
        let name_end = name_start.saturating_add(tag_bytes.len());
        if bytes[i] == b'<'
            && bytes.get(i + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(tag_bytes)
        {
            let mut close = name_end;
            skip_spaces(bytes, &mut close);
            if close < bytes.len() && bytes[close] == b'>' {
                return Some((i, close + 1));
            }
        }
        i = i.saturating_add(1);
    }

    None
}

pub fn find_from(source: &str, from: usize, pattern: &str) -> Option<usize> {
    source
        .get(from..)
        .and_then(|rest| rest.find(pattern))
        .map(|offset| from + offset)
}

fn skip_spaces(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

pub(crate) fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'=' | b'"' | b'\'')
}
