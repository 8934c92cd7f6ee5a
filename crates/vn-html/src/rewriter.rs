//! Fragment rewriting.
//!
//! The scanner walks the fragment once and copies every byte it does not
//! rewrite. Only attribute values named by [`rule_for`], complete `<style>`
//! contents and complete executable `<script>` contents are replaced. Text of
//! `<textarea>`, `<title>` and similar elements is copied through untouched.

use crate::rules::AttributeRule;
use crate::rules::rule_for;
use crate::script::IdentityScriptProcessor;
use crate::script::ScriptProcessor;
use crate::script::is_executable_script_type;
use crate::values::rewrite_refresh;
use crate::values::rewrite_srcset;
use std::fmt;
use vn_css::StylesheetRewriter;
use vn_dom::scan::StartTag;
use vn_dom::scan::ValueSpan;
use vn_dom::scan::find_closing_tag;
use vn_dom::scan::find_from;
use vn_dom::scan::is_raw_text_tag;
use vn_dom::scan::is_text_only_tag;
use vn_dom::scan::parse_start_tag;
use vn_url::BaseDocument;
use vn_url::DocumentId;
use vn_url::EncodeOptions;
use vn_url::ProxyUrlCodec;
use vn_url::ResourceType;

/// Document id used for the base of a fragment that has no document of its own.
const FRAGMENT_DOCUMENT_ID: DocumentId = DocumentId::MAX;

/// Where a fragment starts relative to markup written before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragmentContext<'t> {
    /// The fragment continues the text of this still-open raw-text element.
    pub open_raw_text: Option<&'t str>,
    /// The fragment continues a comment.
    pub in_comment: bool,
}

pub struct MarkupRewriter<'a> {
    codec: &'a ProxyUrlCodec,
    scripts: &'a dyn ScriptProcessor,
    doc: Option<&'a BaseDocument>,
}

impl fmt::Debug for MarkupRewriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupRewriter")
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

impl<'a> MarkupRewriter<'a> {
    pub fn new(codec: &'a ProxyUrlCodec) -> Self {
        Self {
            codec,
            scripts: &IdentityScriptProcessor,
            doc: None,
        }
    }

    pub fn with_script_processor(mut self, scripts: &'a dyn ScriptProcessor) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn in_document(mut self, doc: Option<&'a BaseDocument>) -> Self {
        self.doc = doc;
        self
    }

    pub fn codec(&self) -> &'a ProxyUrlCodec {
        self.codec
    }

    pub fn document(&self) -> Option<&'a BaseDocument> {
        self.doc
    }

    pub fn rewrite_fragment(&self, html: &str) -> String {
        self.rewrite_continuation(html, FragmentContext::default())
    }

    /// Rewrites `html` that continues an open raw-text element or comment.
    /// The continued text is copied as is; raw text is only processed once its
    /// element is complete within a single fragment.
    pub fn rewrite_continuation(&self, html: &str, context: FragmentContext<'_>) -> String {
        let mut pass = Pass {
            rewriter: self,
            base: None,
        };
        let mut out = String::with_capacity(html.len());

        let mut idx = if context.in_comment {
            find_from(html, 0, "-->").map_or(html.len(), |end| end + 3)
        } else if let Some(tag) = context.open_raw_text {
            find_closing_tag(html, 0, tag).map_or(html.len(), |(_, after)| after)
        } else {
            0
        };
        out.push_str(&html[..idx]);

        while idx < html.len() {
            let Some(offset) = html[idx..].find('<') else {
                out.push_str(&html[idx..]);
                break;
            };
            let lt = idx + offset;
            out.push_str(&html[idx..lt]);
            let rest = &html[lt..];

            if rest.starts_with("<!--") {
                let end = find_from(html, lt + 4, "-->").map_or(html.len(), |end| end + 3);
                out.push_str(&html[lt..end]);
                idx = end;
                continue;
            }

            if rest.starts_with("</") || rest.starts_with("<!") || rest.starts_with("<?") {
                let end = find_from(html, lt, ">").map_or(html.len(), |end| end + 1);
                out.push_str(&html[lt..end]);
                idx = end;
                continue;
            }

            let Some(tag) = parse_start_tag(html, lt) else {
                out.push('<');
                idx = lt + 1;
                continue;
            };

            out.push_str(&pass.rewrite_start_tag(html, lt, &tag));
            idx = tag.end;

            if tag.self_closing || !is_text_only_tag(&tag.name) {
                continue;
            }

            match find_closing_tag(html, idx, &tag.name) {
                Some((content_end, after)) => {
                    let content = &html[idx..content_end];
                    if is_raw_text_tag(&tag.name) {
                        out.push_str(&pass.raw_text(html, &tag, content));
                    } else {
                        out.push_str(content);
                    }
                    out.push_str(&html[content_end..after]);
                    idx = after;
                }
                None => {
                    out.push_str(&html[idx..]);
                    idx = html.len();
                }
            }
        }

        out
    }

    /// Rewritten value for one attribute, or `None` when it is left as is.
    pub fn rewrite_attribute(&self, tag: &str, attr: &str, value: &str) -> Option<String> {
        let rule = rule_for(tag, attr)?;
        let rewritten = self.apply_rule(rule, value, self.doc)?;
        (rewritten != value).then_some(rewritten)
    }

    pub fn rewrite_stylesheet(&self, css: &str) -> String {
        StylesheetRewriter::new(self.codec)
            .in_document(self.doc)
            .rewrite(css)
    }

    /// Processes the complete text of a raw-text element.
    pub fn process_raw_text(&self, tag: &str, text: &str) -> String {
        if tag.eq_ignore_ascii_case("script") {
            self.scripts.process_script(text)
        } else if tag.eq_ignore_ascii_case("style") {
            self.rewrite_stylesheet(text)
        } else {
            text.to_owned()
        }
    }

    fn encode(&self, url: &str, resource_type: ResourceType, doc: Option<&BaseDocument>) -> String {
        let options = EncodeOptions {
            resource_type,
            doc,
            ..EncodeOptions::default()
        };
        self.codec.encode(url.trim(), &options)
    }

    fn apply_rule(
        &self,
        rule: AttributeRule,
        value: &str,
        doc: Option<&BaseDocument>,
    ) -> Option<String> {
        match rule {
            AttributeRule::Url(resource_type) => {
                if value.trim().is_empty() {
                    return None;
                }
                Some(self.encode(value, resource_type, doc))
            }
            AttributeRule::SrcSet => Some(rewrite_srcset(value, |url| {
                self.encode(url, ResourceType::PLAIN, doc)
            })),
            AttributeRule::Style => Some(
                StylesheetRewriter::new(self.codec)
                    .in_document(doc)
                    .rewrite_declarations(value),
            ),
            AttributeRule::Refresh => {
                rewrite_refresh(value, |url| self.encode(url, ResourceType::PLAIN, doc))
            }
        }
    }
}

/// State of one rewrite call.
struct Pass<'p, 'a> {
    rewriter: &'p MarkupRewriter<'a>,
    /// Base set by a `<base href>` seen earlier in the same fragment.
    base: Option<BaseDocument>,
}

impl Pass<'_, '_> {
    fn doc(&self) -> Option<&BaseDocument> {
        self.base.as_ref().or(self.rewriter.doc)
    }

    fn rewrite_start_tag(&mut self, html: &str, lt: usize, tag: &StartTag) -> String {
        let is_import = tag.name == "link"
            && tag.value(html, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("import"))
            });
        let is_refresh = tag.name == "meta"
            && tag
                .value(html, "http-equiv")
                .is_some_and(|equiv| equiv.trim().eq_ignore_ascii_case("refresh"));

        let mut edits: Vec<(ValueSpan, String)> = Vec::new();
        for attr in &tag.attrs {
            let Some(span) = attr.value else {
                continue;
            };
            let Some(mut rule) = rule_for(&tag.name, &attr.name) else {
                continue;
            };

            match rule {
                AttributeRule::Refresh if !is_refresh => continue,
                AttributeRule::Url(_) if is_import => {
                    rule = AttributeRule::Url(ResourceType::html_import());
                }
                _ => {}
            }

            let raw = &html[span.start..span.end];
            if let Some(rewritten) = self.rewriter.apply_rule(rule, raw, self.doc()) {
                if rewritten != raw {
                    edits.push((span, quote_value(&rewritten, span.quote)));
                }
            }
        }

        if tag.name == "base" {
            if let Some(href) = tag.value(html, "href") {
                self.rebase(href);
            }
        }

        let mut out = String::with_capacity(tag.end - lt);
        let mut copied = lt;
        for (span, replacement) in edits {
            out.push_str(&html[copied..span.start]);
            out.push_str(&replacement);
            copied = span.end;
        }
        out.push_str(&html[copied..tag.end]);
        out
    }

    fn rebase(&mut self, href: &str) {
        let id = self.doc().map_or(FRAGMENT_DOCUMENT_ID, |doc| doc.id);
        if let Some(base) = self.rewriter.codec.resolve(href.trim(), self.doc()) {
            // Later URLs resolve against the destination, not the proxied href.
            let base = self.rewriter.codec.destination_url(&base);
            self.base = Some(BaseDocument::new(id, base));
        }
    }

    fn raw_text(&self, html: &str, tag: &StartTag, content: &str) -> String {
        if tag.name == "script" {
            if is_executable_script_type(tag.value(html, "type")) {
                return self.rewriter.scripts.process_script(content);
            }
            return content.to_owned();
        }

        StylesheetRewriter::new(self.rewriter.codec)
            .in_document(self.doc())
            .rewrite(content)
    }
}

/// Escapes `value` for the quoting it replaces; unquoted values that would
/// end early get double quotes.
fn quote_value(value: &str, quote: Option<u8>) -> String {
    match quote {
        Some(b'"') => value.replace('"', "&quot;"),
        Some(_) => value.replace('\'', "&#39;"),
        None => {
            let needs_quotes = value.is_empty()
                || value
                    .bytes()
                    .any(|byte| byte.is_ascii_whitespace() || matches!(byte, b'"' | b'\'' | b'=' | b'<' | b'>' | b'`'));
            if needs_quotes {
                format!("\"{}\"", value.replace('"', "&quot;"))
            } else {
                value.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FragmentContext;
    use super::MarkupRewriter;
    use crate::script::ScriptProcessor;
    use std::cell::Cell;
    use std::sync::Arc;
    use vn_core::ProxyContext;
    use vn_url::BaseDocument;
    use vn_url::ProxyUrlCodec;

    const PAGE: &str = "https://example.com/dir/page.html";

    fn codec() -> ProxyUrlCodec {
        match ProxyUrlCodec::new(Arc::new(ProxyContext::new("sid", PAGE))) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[derive(Default)]
    struct MarkingProcessor {
        calls: Cell<usize>,
    }

    impl ScriptProcessor for MarkingProcessor {
        fn process_script(&self, source: &str) -> String {
            self.calls.set(self.calls.get() + 1);
            format!("/*p*/{source}")
        }
    }

    #[test]
    fn rewrites_resource_attributes_by_tag() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);

        assert_eq!(
            rewriter.rewrite_fragment("<a href=\"next.html\">next</a>"),
            "<a href=\"http://localhost:1337/sid/https://example.com/dir/next.html\">next</a>"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<iframe src='https://other.org/f'></iframe>"),
            "<iframe src='http://localhost:1338/sid!i/https://other.org/f'></iframe>"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<script src=app.js></script>"),
            "<script src=http://localhost:1337/sid!s/https://example.com/dir/app.js></script>"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<form action=\"/post\" method=post>"),
            "<form action=\"http://localhost:1337/sid!f/https://example.com/post\" method=post>"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<link rel=\"import\" href=\"c.html\">"),
            "<link rel=\"import\" href=\"http://localhost:1337/sid!h/https://example.com/dir/c.html\">"
        );
    }

    #[test]
    fn untouched_markup_is_byte_identical() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);
        let html = "<!DOCTYPE html>\n<DIV Class = 'x'  data-src=\"a.png\">t &amp; u < v</DIV>\
                    <!-- <img src=\"c.png\"> --><a href=\"mailto:a@b.com\" title=x>m</a><a href=''>";
        assert_eq!(rewriter.rewrite_fragment(html), html);
    }

    #[test]
    fn text_only_elements_are_copied_through() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);
        let html = "<textarea><a href=x></textarea><title><img src=t.png></title>";
        assert_eq!(rewriter.rewrite_fragment(html), html);

        assert_eq!(
            rewriter.rewrite_fragment("<textarea><a href=x></textarea><a href=y>"),
            "<textarea><a href=x></textarea>\
             <a href=http://localhost:1337/sid/https://example.com/dir/y>"
        );

        let context = FragmentContext {
            open_raw_text: Some("textarea"),
            in_comment: false,
        };
        assert_eq!(
            rewriter.rewrite_continuation("<img src=z.png></textarea>", context),
            "<img src=z.png></textarea>"
        );
    }

    #[test]
    fn rewrites_srcset_style_and_refresh() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);

        assert_eq!(
            rewriter.rewrite_fragment("<img srcset=\"a.png 1x, b.png 2x\">"),
            "<img srcset=\"http://localhost:1337/sid/https://example.com/dir/a.png 1x, \
             http://localhost:1337/sid/https://example.com/dir/b.png 2x\">"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<div style=\"background: url('bg.png')\"></div>"),
            "<div style=\"background: url('http://localhost:1337/sid/https://example.com/dir/bg.png')\"></div>"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<meta http-equiv=\"Refresh\" content=\"0; url=/home\">"),
            "<meta http-equiv=\"Refresh\" content=\"0; url=http://localhost:1337/sid/https://example.com/home\">"
        );
        assert_eq!(
            rewriter.rewrite_fragment("<meta name=\"x\" content=\"0; url=/home\">"),
            "<meta name=\"x\" content=\"0; url=/home\">"
        );
    }

    #[test]
    fn complete_raw_text_is_processed_once() {
        let codec = codec();
        let scripts = MarkingProcessor::default();
        let rewriter = MarkupRewriter::new(&codec).with_script_processor(&scripts);

        let out = rewriter.rewrite_fragment(
            "<script>go()</script><script type=\"text/template\"><b></b></script>\
             <style>p { background: url(p.png) }</style>",
        );
        assert_eq!(
            out,
            "<script>/*p*/go()</script><script type=\"text/template\"><b></b></script>\
             <style>p { background: url(http://localhost:1337/sid/https://example.com/dir/p.png) }</style>"
        );
        assert_eq!(scripts.calls.get(), 1);
    }

    #[test]
    fn unclosed_raw_text_is_left_for_later() {
        let codec = codec();
        let scripts = MarkingProcessor::default();
        let rewriter = MarkupRewriter::new(&codec).with_script_processor(&scripts);

        let html = "<img src=\"a.png\"><script>var u = '<img src=b.png>';";
        let out = rewriter.rewrite_fragment(html);
        assert_eq!(
            out,
            "<img src=\"http://localhost:1337/sid/https://example.com/dir/a.png\"><script>var u = '<img src=b.png>';"
        );
        assert_eq!(scripts.calls.get(), 0);
    }

    #[test]
    fn continuation_skips_the_continued_text() {
        let codec = codec();
        let scripts = MarkingProcessor::default();
        let rewriter = MarkupRewriter::new(&codec).with_script_processor(&scripts);

        let script_tail = FragmentContext {
            open_raw_text: Some("script"),
            in_comment: false,
        };
        assert_eq!(
            rewriter.rewrite_continuation("x = '<a href=y>';</script><a href=z>", script_tail),
            "x = '<a href=y>';</script><a href=http://localhost:1337/sid/https://example.com/dir/z>"
        );
        assert_eq!(scripts.calls.get(), 0);

        let comment_tail = FragmentContext {
            open_raw_text: None,
            in_comment: true,
        };
        assert_eq!(
            rewriter.rewrite_continuation(" <a href=x> --><a href=y>", comment_tail),
            " <a href=x> --><a href=http://localhost:1337/sid/https://example.com/dir/y>"
        );
    }

    #[test]
    fn base_href_rebases_the_rest_of_the_fragment() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);

        assert_eq!(
            rewriter.rewrite_fragment("<img src=a.png><base href=\"https://cdn.example.net/root/\"><img src=\"pic.png\">"),
            "<img src=http://localhost:1337/sid/https://example.com/dir/a.png>\
             <base href=\"http://localhost:1338/sid/https://cdn.example.net/root/\">\
             <img src=\"http://localhost:1338/sid/https://cdn.example.net/root/pic.png\">"
        );
    }

    #[test]
    fn document_base_is_used_for_relative_urls() {
        let codec = codec();
        let doc = BaseDocument::new(7, "https://example.com/other/index.html");
        let rewriter = MarkupRewriter::new(&codec).in_document(Some(&doc));

        assert_eq!(
            rewriter.rewrite_attribute("img", "src", "x.png").as_deref(),
            Some("http://localhost:1337/sid/https://example.com/other/x.png")
        );
        assert_eq!(rewriter.rewrite_attribute("img", "alt", "x.png"), None);
        assert_eq!(rewriter.rewrite_attribute("a", "href", "javascript:void(0)"), None);
    }

    #[test]
    fn rewriting_twice_is_stable() {
        let codec = codec();
        let rewriter = MarkupRewriter::new(&codec);
        let once = rewriter.rewrite_fragment("<a href=\"/x\"><iframe src=\"f.html\"></iframe>");
        assert_eq!(rewriter.rewrite_fragment(&once), once);
    }
}
