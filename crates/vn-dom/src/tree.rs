//! Arena tree with a small tolerant HTML parser and serializer.
//!
//! Text and comment data are kept exactly as written; entities are not
//! decoded, so serializing a parsed tree reproduces the source markup for
//! everything except attribute quoting and implied end tags.

use crate::NodeKind;
use crate::scan::find_closing_tag;
use crate::scan::is_name_char;
use crate::scan::is_text_only_tag;
use crate::scan::parse_start_tag;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    attrs: Vec<(String, String)>,
    data: String,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl NodeData {
    fn element(tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_owned(),
            attrs,
            data: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    fn character_data(kind: NodeKind, data: &str) -> Self {
        Self {
            kind,
            tag: String::new(),
            attrs: Vec::new(),
            data: data.to_owned(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
    Comment(String),
}

/// Parsed markup; node `ROOT` is the container holding the top-level nodes.
#[derive(Debug, Clone)]
pub struct HtmlTree {
    nodes: Vec<NodeData>,
}

impl Default for HtmlTree {
    fn default() -> Self {
        Self {
            nodes: vec![NodeData::element("#fragment", Vec::new())],
        }
    }
}

impl HtmlTree {
    pub const ROOT: usize = 0;

    pub fn parse(source: &str) -> Self {
        let mut tree = Self::default();
        tree.build(tokenize(source));
        tree
    }

    pub fn kind(&self, node: usize) -> Option<NodeKind> {
        self.nodes.get(node).map(|data| data.kind)
    }

    pub fn tag(&self, node: usize) -> Option<&str> {
        self.nodes
            .get(node)
            .filter(|data| data.kind == NodeKind::Element)
            .map(|data| data.tag.as_str())
    }

    pub fn attribute(&self, node: usize, name: &str) -> Option<&str> {
        self.nodes.get(node).and_then(|data| {
            data.attrs
                .iter()
                .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|data| data.parent)
    }

    pub fn children(&self, node: usize) -> &[usize] {
        self.nodes
            .get(node)
            .map(|data| data.children.as_slice())
            .unwrap_or_default()
    }

    pub fn next_sibling(&self, node: usize) -> Option<usize> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|child| *child == node)?;
        siblings.get(position.saturating_add(1)).copied()
    }

    /// Data of a text/comment node, or the concatenated text below an element.
    pub fn text(&self, node: usize) -> String {
        let Some(data) = self.nodes.get(node) else {
            return String::new();
        };

        match data.kind {
            NodeKind::Text | NodeKind::Comment => data.data.clone(),
            NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(node, &mut out);
                out
            }
        }
    }

    pub fn set_text(&mut self, node: usize, text: &str) {
        let Some(kind) = self.kind(node) else {
            return;
        };

        match kind {
            NodeKind::Text | NodeKind::Comment => self.nodes[node].data = text.to_owned(),
            NodeKind::Element => {
                let old = std::mem::take(&mut self.nodes[node].children);
                for child in old {
                    self.nodes[child].parent = None;
                }
                if !text.is_empty() {
                    self.append(node, NodeData::character_data(NodeKind::Text, text));
                }
            }
        }
    }

    /// Elements named `tag` below `node`, in document order.
    pub fn elements_by_tag(&self, node: usize, tag: &str) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_elements(node, tag, &mut out);
        out
    }

    pub fn serialize_children(&self, node: usize) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.serialize_node(*child, &mut out);
        }
        out
    }

    fn collect_text(&self, node: usize, out: &mut String) {
        for child in self.children(node) {
            let data = &self.nodes[*child];
            match data.kind {
                NodeKind::Text => out.push_str(&data.data),
                NodeKind::Element => self.collect_text(*child, out),
                NodeKind::Comment => {}
            }
        }
    }

    fn collect_elements(&self, node: usize, tag: &str, out: &mut Vec<usize>) {
        for child in self.children(node) {
            if self.tag(*child).is_some_and(|name| name.eq_ignore_ascii_case(tag)) {
                out.push(*child);
            }
            self.collect_elements(*child, tag, out);
        }
    }

    fn serialize_node(&self, node: usize, out: &mut String) {
        let data = &self.nodes[node];
        match data.kind {
            NodeKind::Text => out.push_str(&data.data),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&data.data);
                out.push_str("-->");
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&value.replace('"', "&quot;"));
                    out.push('"');
                }
                out.push('>');

                if is_void(&data.tag) {
                    return;
                }

                for child in &data.children {
                    self.serialize_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    fn append(&mut self, parent: usize, mut data: NodeData) -> usize {
        let idx = self.nodes.len();
        data.parent = Some(parent);
        self.nodes.push(data);
        self.nodes[parent].children.push(idx);
        idx
    }

    fn append_text(&mut self, parent: usize, text: &str) {
        if let Some(last) = self.nodes[parent].children.last().copied() {
            if self.nodes[last].kind == NodeKind::Text {
                self.nodes[last].data.push_str(text);
                return;
            }
        }
        self.append(parent, NodeData::character_data(NodeKind::Text, text));
    }

    fn build(&mut self, tokens: Vec<Token>) {
        let mut stack = vec![Self::ROOT];

        for token in tokens {
            let current = stack.last().copied().unwrap_or(Self::ROOT);
            match token {
                Token::Text(text) => self.append_text(current, &text),
                Token::Comment(data) => {
                    self.append(current, NodeData::character_data(NodeKind::Comment, &data));
                }
                Token::Start {
                    name,
                    attrs,
                    self_closing,
                } => {
                    let idx = self.append(current, NodeData::element(&name, attrs));
                    if !self_closing && !is_void(&name) {
                        stack.push(idx);
                    }
                }
                Token::End { name } => {
                    // Stray end tags are dropped; a matching one closes everything opened after it.
                    let open = stack
                        .iter()
                        .skip(1)
                        .rposition(|idx| self.nodes[*idx].tag == name);
                    if let Some(position) = open {
                        stack.truncate(position.saturating_add(1));
                    }
                }
            }
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if starts_with(bytes, i, b"<!--") {
            let (data, next) = parse_comment(source, i);
            out.push(Token::Comment(data));
            i = next;
            continue;
        }

        if bytes[i] == b'<' {
            if starts_with(bytes, i, b"</") {
                if let Some((tok, next)) = parse_end_tag(bytes, i) {
                    out.push(tok);
                    i = next;
                    continue;
                }
            } else if let Some(tag) = parse_start_tag(source, i) {
                let attrs = tag
                    .attrs
                    .iter()
                    .map(|attr| {
                        let value = attr
                            .value
                            .map(|span| source[span.start..span.end].to_owned())
                            .unwrap_or_default();
                        (attr.name.clone(), value)
                    })
                    .collect();
                let text_only = !tag.self_closing && is_text_only_tag(&tag.name);
                out.push(Token::Start {
                    name: tag.name.clone(),
                    attrs,
                    self_closing: tag.self_closing,
                });
                i = tag.end;

                if text_only {
                    let (content_end, next) =
                        find_closing_tag(source, i, &tag.name).unwrap_or((bytes.len(), bytes.len()));
                    if content_end > i {
                        out.push(Token::Text(source[i..content_end].to_owned()));
                    }
                    if next > content_end {
                        out.push(Token::End { name: tag.name });
                    }
                    i = next;
                }

                continue;
            }
        }

        let (txt, next) = parse_text(source, i);
        out.push(Token::Text(txt));
        i = next;
    }

    out
}

fn starts_with(bytes: &[u8], i: usize, pat: &[u8]) -> bool {
    let end = i.saturating_add(pat.len());
    end <= bytes.len() && &bytes[i..end] == pat
}

/// An unterminated comment runs to the end of input.
fn parse_comment(source: &str, start: usize) -> (String, usize) {
    let data_start = start.saturating_add(4);
    match source[data_start..].find("-->") {
        Some(offset) => {
            let data_end = data_start + offset;
            (source[data_start..data_end].to_owned(), data_end + 3)
        }
        None => (source[data_start..].to_owned(), source.len()),
    }
}

/// Text up to the next `<`; always consumes at least one byte.
fn parse_text(source: &str, start: usize) -> (String, usize) {
    let bytes = source.as_bytes();
    let mut i = start.saturating_add(1);
    while i < bytes.len() && bytes[i] != b'<' {
        i += 1;
    }
    let end = i.min(bytes.len());
    (source[start..end].to_owned(), end)
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut i = start + 2;
    let begin = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    if i == begin {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[begin..i]).to_ascii_lowercase();
    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    Some((Token::End { name }, i + 1))
}

pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::HtmlTree;
    use crate::NodeKind;

    #[test]
    fn parses_nested_elements_and_text() {
        let tree = HtmlTree::parse("<div id=a><p>one</p>two</div>");
        let divs = tree.elements_by_tag(HtmlTree::ROOT, "div");
        assert_eq!(divs.len(), 1);
        assert_eq!(tree.text(divs[0]), "onetwo");
        assert_eq!(tree.attribute(divs[0], "id"), Some("a"));
    }

    #[test]
    fn keeps_comments_and_unterminated_comment_runs_to_end() {
        let tree = HtmlTree::parse("<!-- a -->b<!-- c");
        let children = tree.children(HtmlTree::ROOT);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.kind(children[0]), Some(NodeKind::Comment));
        assert_eq!(tree.text(children[0]), " a ");
        assert_eq!(tree.text(children[2]), " c");
    }

    #[test]
    fn raw_text_keeps_markup_literal() {
        let tree = HtmlTree::parse("<script>if (a<b) { x('<p>'); }</script><style>a{}");
        let scripts = tree.elements_by_tag(HtmlTree::ROOT, "script");
        assert_eq!(tree.text(scripts[0]), "if (a<b) { x('<p>'); }");
        assert!(tree.elements_by_tag(HtmlTree::ROOT, "p").is_empty());

        let styles = tree.elements_by_tag(HtmlTree::ROOT, "style");
        assert_eq!(tree.text(styles[0]), "a{}");
    }

    #[test]
    fn textarea_and_title_content_is_text() {
        let tree = HtmlTree::parse("<title>a <b> c</title><textarea><a href=x></textarea>");
        assert!(tree.elements_by_tag(HtmlTree::ROOT, "b").is_empty());
        assert!(tree.elements_by_tag(HtmlTree::ROOT, "a").is_empty());

        let textareas = tree.elements_by_tag(HtmlTree::ROOT, "textarea");
        assert_eq!(tree.text(textareas[0]), "<a href=x>");
        assert_eq!(
            tree.serialize_children(HtmlTree::ROOT),
            "<title>a <b> c</title><textarea><a href=x></textarea>"
        );
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let tree = HtmlTree::parse("<div>x</span>y</div>");
        assert_eq!(tree.serialize_children(HtmlTree::ROOT), "<div>xy</div>");
    }

    #[test]
    fn end_tag_closes_intermediate_elements() {
        let tree = HtmlTree::parse("<div><b>x</div>y");
        assert_eq!(tree.serialize_children(HtmlTree::ROOT), "<div><b>x</b></div>y");
    }

    #[test]
    fn serializer_closes_open_elements_and_skips_void_end_tags() {
        let tree = HtmlTree::parse("<p class='x'>a<br>b<img src=\"i.png\"/>");
        assert_eq!(
            tree.serialize_children(HtmlTree::ROOT),
            "<p class=\"x\">a<br>b<img src=\"i.png\"></p>"
        );
    }

    #[test]
    fn lone_angle_brackets_stay_text() {
        let tree = HtmlTree::parse("a < b <3 <");
        assert_eq!(tree.serialize_children(HtmlTree::ROOT), "a < b <3 <");
        assert_eq!(tree.children(HtmlTree::ROOT).len(), 1);
    }

    #[test]
    fn set_text_replaces_element_children() {
        let mut tree = HtmlTree::parse("<script>a</script>");
        let script = tree.elements_by_tag(HtmlTree::ROOT, "script")[0];
        tree.set_text(script, "b()");
        assert_eq!(tree.serialize_children(HtmlTree::ROOT), "<script>b()</script>");
        tree.set_text(script, "");
        assert_eq!(tree.serialize_children(HtmlTree::ROOT), "<script></script>");
    }
}
