//! Host tree interfaces used by the streamed-write pipeline, plus an
//! in-memory implementation of both.

pub mod memory;
pub mod scan;
pub mod tree;

use std::fmt;

pub use memory::InMemoryDocument;
pub use memory::NodeRef;
pub use tree::HtmlTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// Read/write access to an ordered node tree.
///
/// Element tag names are reported in ASCII lowercase. For text and comment
/// nodes the text content is the node's data.
pub trait OrderedTree {
    type Node: Copy + Eq + fmt::Debug;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn last_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;
    fn kind(&self, node: Self::Node) -> NodeKind;
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
    fn text_content(&self, node: Self::Node) -> String;
    /// Replaces the data of a text/comment node, or all children of an element.
    fn set_text_content(&mut self, node: Self::Node, text: &str);

    /// First element named `tag` below `root` in document order.
    fn find_element(&self, root: Self::Node, tag: &str) -> Option<Self::Node> {
        let mut stack = Vec::new();
        let mut next = self.first_child(root);

        loop {
            let node = match next {
                Some(node) => node,
                None => match stack.pop() {
                    Some(resume) => {
                        next = self.next_sibling(resume);
                        continue;
                    }
                    None => return None,
                },
            };

            if self.kind(node) == NodeKind::Element
                && self.tag_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                return Some(node);
            }

            match self.first_child(node) {
                Some(child) => {
                    stack.push(node);
                    next = Some(child);
                }
                None => next = self.next_sibling(node),
            }
        }
    }
}

/// A live document that accepts streamed markup.
pub trait WritableDocument: OrderedTree {
    /// Parses `html` into a detached container owned by this document.
    fn parse_fragment(&mut self, html: &str) -> Self::Node;
    fn serialize_children(&self, container: Self::Node) -> String;
    fn discard_fragment(&mut self, container: Self::Node);
    /// Appends markup to the document being loaded.
    fn native_write(&mut self, html: &str);
}
