//! Element-only navigation

use crate::node::NodeKind;
use crate::{DomTree, NodeId};

impl DomTree {
    fn is_kind(&self, id: NodeId, kind: NodeKind) -> bool {
        self.kind(id) == Some(kind)
    }

    /// Whether the node has a child list that may hold elements
    fn has_element_children(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            Some(NodeKind::Element | NodeKind::Document | NodeKind::HtmlDocument | NodeKind::DocumentFragment | NodeKind::EntityDecl)
        )
    }

    pub fn first_element_child(&self, parent: NodeId) -> Option<NodeId> {
        if !self.has_element_children(parent) {
            return None;
        }
        let mut cur = self.first_child(parent);
        while let Some(c) = cur {
            if self.is_kind(c, NodeKind::Element) {
                return Some(c);
            }
            cur = self.next_sibling(c);
        }
        None
    }

    pub fn last_element_child(&self, parent: NodeId) -> Option<NodeId> {
        if !self.has_element_children(parent) {
            return None;
        }
        let mut cur = self.last_child(parent);
        while let Some(c) = cur {
            if self.is_kind(c, NodeKind::Element) {
                return Some(c);
            }
            cur = self.prev_sibling(c);
        }
        None
    }

    /// Next element sibling; attributes and declarations have none
    pub fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let kind = self.kind(node)?;
        if kind == NodeKind::Attribute || kind.is_declaration() || kind == NodeKind::Dtd {
            return None;
        }
        let mut cur = self.next_sibling(node);
        while let Some(s) = cur {
            if self.is_kind(s, NodeKind::Element) {
                return Some(s);
            }
            cur = self.next_sibling(s);
        }
        None
    }

    pub fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let kind = self.kind(node)?;
        if kind == NodeKind::Attribute || kind.is_declaration() || kind == NodeKind::Dtd {
            return None;
        }
        let mut cur = self.prev_sibling(node);
        while let Some(s) = cur {
            if self.is_kind(s, NodeKind::Element) {
                return Some(s);
            }
            cur = self.prev_sibling(s);
        }
        None
    }

    pub fn child_element_count(&self, parent: NodeId) -> usize {
        if !self.has_element_children(parent) {
            return 0;
        }
        self.children(parent)
            .into_iter()
            .filter(|c| self.is_kind(*c, NodeKind::Element))
            .count()
    }

    /// Whether the node is a text node
    #[inline]
    pub fn node_is_text(&self, node: NodeId) -> bool {
        self.is_kind(node, NodeKind::Text)
    }
}
