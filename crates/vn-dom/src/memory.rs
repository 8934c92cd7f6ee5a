//! In-memory document: every native write appends to the source and the live
//! tree is re-parsed from the whole source, the way a loading document sees
//! the concatenation of all streamed chunks.

use crate::HtmlTree;
use crate::NodeKind;
use crate::OrderedTree;
use crate::WritableDocument;
use std::collections::HashMap;

pub type TreeId = u32;

/// Address of a node in one of the document's trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub tree: TreeId,
    pub index: usize,
}

#[derive(Debug)]
pub struct InMemoryDocument {
    source: String,
    writes: Vec<String>,
    live: TreeId,
    next_tree: TreeId,
    trees: HashMap<TreeId, HtmlTree>,
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        let mut trees = HashMap::new();
        trees.insert(0, HtmlTree::default());
        Self {
            source: String::new(),
            writes: Vec::new(),
            live: 0,
            next_tree: 1,
            trees,
        }
    }
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root container of the live document.
    pub fn root(&self) -> NodeRef {
        NodeRef {
            tree: self.live,
            index: HtmlTree::ROOT,
        }
    }

    /// Everything natively written since the document was last opened.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Arguments of every native write, in order.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    /// Wipes the document, like opening a new one over it.
    pub fn reopen(&mut self) {
        self.source.clear();
        self.writes.clear();
        self.replace_live(HtmlTree::default());
    }

    pub fn serialize(&self) -> String {
        self.serialize_children(self.root())
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeRef> {
        match self.trees.get(&self.live) {
            Some(tree) => tree
                .elements_by_tag(HtmlTree::ROOT, tag)
                .into_iter()
                .map(|index| NodeRef {
                    tree: self.live,
                    index,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<&str> {
        self.trees
            .get(&node.tree)
            .and_then(|tree| tree.attribute(node.index, name))
    }

    /// Detached fragments that were parsed but not yet discarded.
    pub fn open_fragments(&self) -> usize {
        self.trees.len().saturating_sub(1)
    }

    fn replace_live(&mut self, tree: HtmlTree) {
        self.trees.remove(&self.live);
        self.live = self.insert_tree(tree);
    }

    fn insert_tree(&mut self, tree: HtmlTree) -> TreeId {
        let id = self.next_tree;
        self.next_tree = self.next_tree.wrapping_add(1);
        self.trees.insert(id, tree);
        id
    }

    fn tree(&self, node: NodeRef) -> Option<&HtmlTree> {
        self.trees.get(&node.tree)
    }

    fn in_tree(&self, node: NodeRef, index: Option<usize>) -> Option<NodeRef> {
        index.map(|index| NodeRef {
            tree: node.tree,
            index,
        })
    }
}

impl OrderedTree for InMemoryDocument {
    type Node = NodeRef;

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        let index = self.tree(node)?.parent(node.index);
        self.in_tree(node, index)
    }

    fn first_child(&self, node: NodeRef) -> Option<NodeRef> {
        let index = self.tree(node)?.children(node.index).first().copied();
        self.in_tree(node, index)
    }

    fn last_child(&self, node: NodeRef) -> Option<NodeRef> {
        let index = self.tree(node)?.children(node.index).last().copied();
        self.in_tree(node, index)
    }

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let index = self.tree(node)?.next_sibling(node.index);
        self.in_tree(node, index)
    }

    fn kind(&self, node: NodeRef) -> NodeKind {
        self.tree(node)
            .and_then(|tree| tree.kind(node.index))
            .unwrap_or(NodeKind::Text)
    }

    fn tag_name(&self, node: NodeRef) -> Option<&str> {
        self.tree(node)?.tag(node.index)
    }

    fn text_content(&self, node: NodeRef) -> String {
        self.tree(node)
            .map(|tree| tree.text(node.index))
            .unwrap_or_default()
    }

    fn set_text_content(&mut self, node: NodeRef, text: &str) {
        if let Some(tree) = self.trees.get_mut(&node.tree) {
            tree.set_text(node.index, text);
        }
    }
}

impl WritableDocument for InMemoryDocument {
    fn parse_fragment(&mut self, html: &str) -> NodeRef {
        let tree = self.insert_tree(HtmlTree::parse(html));
        NodeRef {
            tree,
            index: HtmlTree::ROOT,
        }
    }

    fn serialize_children(&self, container: NodeRef) -> String {
        self.tree(container)
            .map(|tree| tree.serialize_children(container.index))
            .unwrap_or_default()
    }

    fn discard_fragment(&mut self, container: NodeRef) {
        if container.tree != self.live {
            self.trees.remove(&container.tree);
        }
    }

    fn native_write(&mut self, html: &str) {
        self.writes.push(html.to_owned());
        self.source.push_str(html);
        let tree = HtmlTree::parse(&self.source);
        self.replace_live(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryDocument;
    use crate::NodeKind;
    use crate::OrderedTree;
    use crate::WritableDocument;

    #[test]
    fn native_writes_accumulate_into_one_tree() {
        let mut document = InMemoryDocument::new();
        document.native_write("<div>");
        document.native_write("hello</div>");

        let divs = document.elements_by_tag("div");
        assert_eq!(divs.len(), 1);
        assert_eq!(document.text_content(divs[0]), "hello");
        assert_eq!(document.writes(), ["<div>", "hello</div>"]);
    }

    #[test]
    fn fragments_are_detached_from_the_live_tree() {
        let mut document = InMemoryDocument::new();
        document.native_write("<p>live</p>");

        let container = document.parse_fragment("<span>scratch</span>");
        assert_eq!(document.serialize_children(container), "<span>scratch</span>");
        assert_eq!(document.serialize(), "<p>live</p>");
        assert_eq!(document.open_fragments(), 1);

        document.discard_fragment(container);
        assert_eq!(document.open_fragments(), 0);
    }

    #[test]
    fn walks_and_finds_nodes() {
        let mut document = InMemoryDocument::new();
        let container = document.parse_fragment("<div><p>a</p><!--c--></div><b>x</b>");

        let div = match document.first_child(container) {
            Some(node) => node,
            None => panic!("container is empty"),
        };
        assert_eq!(document.tag_name(div), Some("div"));
        assert_eq!(document.parent(div), Some(container));

        let comment = match document.last_child(div) {
            Some(node) => node,
            None => panic!("div is empty"),
        };
        assert_eq!(document.kind(comment), NodeKind::Comment);
        assert_eq!(document.text_content(comment), "c");

        let bold = match document.find_element(container, "b") {
            Some(node) => node,
            None => panic!("missing <b>"),
        };
        assert_eq!(document.next_sibling(div), Some(bold));
        assert_eq!(document.find_element(container, "table"), None);
    }

    #[test]
    fn reopen_wipes_content() {
        let mut document = InMemoryDocument::new();
        document.native_write("<p>old</p>");
        document.reopen();
        document.native_write("<p>new</p>");
        assert_eq!(document.serialize(), "<p>new</p>");
    }
}
