//! Rewriting of attribute values that hold more than one URL or wrap the URL
//! in other syntax.

/// Maps every candidate URL of a `srcset` list, keeping descriptors,
/// separators and whitespace as written.
pub fn rewrite_srcset(value: &str, mut map: impl FnMut(&str) -> String) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut copied = 0_usize;
    let mut i = 0_usize;

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let url_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut url_end = i;
        while url_end > url_start && bytes[url_end - 1] == b',' {
            url_end -= 1;
        }

        if url_end > url_start {
            out.push_str(&value[copied..url_start]);
            out.push_str(&map(&value[url_start..url_end]));
            copied = url_end;
        }

        if url_end < i {
            continue;
        }

        let mut depth = 0_u32;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth = depth.saturating_add(1),
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
    }

    out.push_str(&value[copied..]);
    out
}

/// Maps the URL of a refresh directive (`5; url=next.html`). Returns `None`
/// when the content names no URL.
pub fn rewrite_refresh(content: &str, mut map: impl FnMut(&str) -> String) -> Option<String> {
    let bytes = content.as_bytes();
    let mut i = skip_spaces(bytes, 0);
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    i = skip_spaces(bytes, i);
    if i >= bytes.len() || !matches!(bytes[i], b';' | b',') {
        return None;
    }
    i = skip_spaces(bytes, i + 1);

    if bytes.len() >= i + 3 && bytes[i..i + 3].eq_ignore_ascii_case(b"url") {
        let after = skip_spaces(bytes, i + 3);
        if bytes.get(after) == Some(&b'=') {
            i = skip_spaces(bytes, after + 1);
        }
    }

    let (start, end) = match bytes.get(i) {
        Some(quote @ (b'"' | b'\'')) => {
            let start = i + 1;
            let end = bytes[start..]
                .iter()
                .position(|byte| byte == quote)
                .map_or(bytes.len(), |offset| start + offset);
            (start, end)
        }
        _ => (i, content.trim_end().len()),
    };

    if start >= end {
        return None;
    }

    Some(format!(
        "{}{}{}",
        &content[..start],
        map(&content[start..end]),
        &content[end..]
    ))
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::rewrite_refresh;
    use super::rewrite_srcset;

    fn tag(url: &str) -> String {
        format!("P[{url}]")
    }

    #[test]
    fn srcset_candidates_keep_descriptors() {
        assert_eq!(
            rewrite_srcset("a.png 1x,  b.png 2x ,c.png", tag),
            "P[a.png] 1x,  P[b.png] 2x ,P[c.png]"
        );
        assert_eq!(rewrite_srcset("small.jpg 480w, large.jpg", tag), "P[small.jpg] 480w, P[large.jpg]");
    }

    #[test]
    fn srcset_handles_trailing_commas_and_data_urls() {
        assert_eq!(rewrite_srcset("a.png, b.png,", tag), "P[a.png], P[b.png],");
        assert_eq!(
            rewrite_srcset("data:image/png;base64,AAA 1x", tag),
            "P[data:image/png;base64,AAA] 1x"
        );
        assert_eq!(rewrite_srcset("  ", tag), "  ");
    }

    #[test]
    fn refresh_url_is_mapped_in_place() {
        assert_eq!(rewrite_refresh("5; url=next.html", tag), Some("5; url=P[next.html]".to_owned()));
        assert_eq!(rewrite_refresh("0;URL='a b.html' ", tag), Some("0;URL='P[a b.html]' ".to_owned()));
        assert_eq!(rewrite_refresh("3, other.html", tag), Some("3, P[other.html]".to_owned()));
    }

    #[test]
    fn refresh_without_url_is_left_alone() {
        assert_eq!(rewrite_refresh("30", tag), None);
        assert_eq!(rewrite_refresh("5; url=", tag), None);
    }
}
