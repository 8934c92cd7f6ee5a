//! Boundary markers and the search that relocates them after parsing.

use vn_dom::NodeKind;
use vn_dom::OrderedTree;
use vn_dom::scan::is_text_only_tag;

pub const BEGIN_MARKER_TAG: &str = "veneer-write-begin";
pub const END_MARKER_TAG: &str = "veneer-write-end";
pub const BEGIN_MARKUP: &str = "<veneer-write-begin></veneer-write-begin>";
pub const END_MARKUP: &str = "<veneer-write-end></veneer-write-end>";

/// Where a marker ended up after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPosition<N> {
    /// The marker parsed as an element.
    Element(N),
    /// The marker markup is literal text inside this raw-text or comment node.
    Text(N),
}

impl<N: Copy> MarkerPosition<N> {
    pub fn node(self) -> N {
        match self {
            Self::Element(node) | Self::Text(node) => node,
        }
    }

    pub fn is_element(self) -> bool {
        matches!(self, Self::Element(_))
    }
}

/// Splits `input` into the part that can be written now and a trailing
/// unterminated tag start (`<`, `</`, `<di`, `<a href="x`, `<!-`) to hold back.
pub fn split_pending(input: &str) -> (&str, &str) {
    let bytes = input.as_bytes();
    let cut = bytes
        .iter()
        .enumerate()
        .filter(|(_, byte)| **byte == b'<')
        .map(|(idx, _)| idx)
        .find(|idx| is_unterminated_tag_start(&input[*idx..]));

    match cut {
        Some(idx) => input.split_at(idx),
        None => (input, ""),
    }
}

fn is_unterminated_tag_start(rest: &str) -> bool {
    let Some(after) = rest.strip_prefix('<') else {
        return false;
    };
    if after == "!" || after == "!-" {
        return true;
    }

    let after = after.strip_prefix('/').unwrap_or(after);
    match after.as_bytes().first() {
        None => true,
        Some(first) => first.is_ascii_alphabetic() && !after.contains('>'),
    }
}

/// Finds the begin marker below `container`: by tag, else by descending first
/// children to the node the marker markup was absorbed into.
pub fn locate_begin<T: OrderedTree>(tree: &T, container: T::Node) -> Option<MarkerPosition<T::Node>> {
    if let Some(marker) = tree.find_element(container, BEGIN_MARKER_TAG) {
        return Some(MarkerPosition::Element(marker));
    }

    let node = descend(tree, container, |tree, node| tree.first_child(node))?;
    absorbed(tree, node)
        .filter(|data| data.starts_with(BEGIN_MARKUP))
        .map(|_| MarkerPosition::Text(node))
}

/// Finds the end marker below `container`, descending last children.
pub fn locate_end<T: OrderedTree>(tree: &T, container: T::Node) -> Option<MarkerPosition<T::Node>> {
    if let Some(marker) = tree.find_element(container, END_MARKER_TAG) {
        return Some(MarkerPosition::Element(marker));
    }

    let node = descend(tree, container, |tree, node| tree.last_child(node))?;
    absorbed(tree, node)
        .filter(|data| data.ends_with(END_MARKUP))
        .map(|_| MarkerPosition::Text(node))
}

/// Tags of the elements between `node` and `container`, outermost first.
pub fn ancestor_tags<T: OrderedTree>(tree: &T, node: T::Node, container: T::Node) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = tree.parent(node);
    while let Some(parent) = current {
        if parent == container {
            break;
        }
        if let Some(tag) = tree.tag_name(parent) {
            tags.push(tag.to_ascii_lowercase());
        }
        current = tree.parent(parent);
    }
    tags.reverse();
    tags
}

fn descend<T: OrderedTree>(
    tree: &T,
    container: T::Node,
    step: impl Fn(&T, T::Node) -> Option<T::Node>,
) -> Option<T::Node> {
    let mut node = step(tree, container)?;
    while tree.kind(node) == NodeKind::Element {
        node = step(tree, node)?;
    }
    Some(node)
}

/// Data of a comment, or of text inside a text-only element.
fn absorbed<T: OrderedTree>(tree: &T, node: T::Node) -> Option<String> {
    match tree.kind(node) {
        NodeKind::Comment => Some(tree.text_content(node)),
        NodeKind::Text => {
            let parent = tree.parent(node)?;
            let tag = tree.tag_name(parent)?;
            is_text_only_tag(tag).then(|| tree.text_content(node))
        }
        NodeKind::Element => None,
    }
}
