//! DOM Node Operations
//!
//! Structural mutation: attach as child or sibling, replace, unlink, and
//! text merging. Attach operations reject cycles and child kinds the parent
//! does not accept; adjacent text nodes coalesce.

use crate::node::NodeKind;
use crate::{DomError, DomResult, DomTree, NodeId};

/// Character-data kinds
pub const TEXT_CONTENT_MASK: u32 =
    NodeKind::Text.bit() | NodeKind::CData.bit() | NodeKind::Comment.bit() | NodeKind::Pi.bit();

/// Children accepted by documents
pub const DOCUMENT_CHILD_MASK: u32 =
    NodeKind::Element.bit() | NodeKind::Pi.bit() | NodeKind::Comment.bit();

/// Children accepted by fragments
pub const CONTENT_CHILD_MASK: u32 = NodeKind::Element.bit()
    | NodeKind::Text.bit()
    | NodeKind::CData.bit()
    | NodeKind::EntityRef.bit()
    | NodeKind::Pi.bit()
    | NodeKind::Comment.bit();

/// Children accepted by elements (attributes included)
pub const ELEMENT_CHILD_MASK: u32 = CONTENT_CHILD_MASK | NodeKind::Attribute.bit();

/// Children accepted by attributes
pub const ATTRIBUTE_CHILD_MASK: u32 = NodeKind::Text.bit() | NodeKind::EntityRef.bit();

/// Children accepted by DTDs
pub const DTD_CHILD_MASK: u32 =
    NodeKind::ElementDecl.bit() | NodeKind::AttributeDecl.bit() | NodeKind::EntityDecl.bit();

impl NodeKind {
    /// Mask of child kinds this kind may contain
    pub const fn child_mask(self) -> u32 {
        match self {
            Self::Document | Self::HtmlDocument => DOCUMENT_CHILD_MASK,
            Self::DocumentFragment => CONTENT_CHILD_MASK,
            Self::Element => ELEMENT_CHILD_MASK,
            Self::Attribute => ATTRIBUTE_CHILD_MASK,
            Self::Dtd => DTD_CHILD_MASK,
            _ => 0,
        }
    }

    /// Whether a `child` kind may be placed under this kind
    #[inline]
    pub const fn accepts(self, child: NodeKind) -> bool {
        self.child_mask() & child.bit() != 0
    }
}

impl DomTree {
    /// Check that `cur` can be attached under `parent`
    fn check_attach(&self, parent: NodeId, cur: NodeId) -> DomResult<()> {
        let parent_kind = self.node(parent)?.kind;
        let kind = self.node(cur)?.kind;
        if !parent_kind.accepts(kind) || kind.is_declaration() {
            return Err(DomError::HierarchyRequest);
        }
        if self.is_ancestor_or_self(cur, parent) {
            return Err(DomError::HierarchyRequest);
        }
        Ok(())
    }

    /// Whether two nodes are text nodes that coalesce
    fn text_coalesces(&self, a: NodeId, b: NodeId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => x.kind == NodeKind::Text && y.kind == NodeKind::Text && x.name == y.name,
            _ => false,
        }
    }

    /// Append character data to a text-like node
    pub(crate) fn append_content(&mut self, node: NodeId, extra: &str) -> DomResult<()> {
        let len = self.node(node)?.content().map_or(0, str::len);
        self.injector.charge(len + extra.len() + 1)?;
        let n = self.node_mut(node)?;
        n.content.get_or_insert_with(String::new).push_str(extra);
        Ok(())
    }

    /// Prepend character data to a text-like node
    fn prepend_content(&mut self, node: NodeId, extra: &str) -> DomResult<()> {
        let len = self.node(node)?.content().map_or(0, str::len);
        self.injector.charge(len + extra.len() + 1)?;
        let n = self.node_mut(node)?;
        let content = n.content.get_or_insert_with(String::new);
        content.insert_str(0, extra);
        Ok(())
    }

    /// Link an already unlinked node between `prev` and `next` under
    /// `parent`, merging text into a neighbour when possible
    ///
    /// Returns the node that now holds the content.
    fn insert_node(
        &mut self,
        cur: NodeId,
        parent: NodeId,
        prev: Option<NodeId>,
        next: Option<NodeId>,
    ) -> DomResult<Option<NodeId>> {
        let text = self.node(cur)?.content.clone().unwrap_or_default();
        if let Some(prev) = prev.filter(|p| self.text_coalesces(*p, cur)) {
            self.append_content(prev, &text)?;
            self.free_node(cur);
            return Ok(Some(prev));
        }
        if let Some(next) = next.filter(|n| self.text_coalesces(*n, cur)) {
            self.prepend_content(next, &text)?;
            self.free_node(cur);
            return Ok(Some(next));
        }

        let doc = self.doc(parent);
        if self.doc(cur) != doc {
            self.set_tree_doc(cur, doc)?;
        }
        match (prev, next) {
            (Some(prev), _) => self.link_after(prev, cur),
            (None, Some(next)) => self.link_before(next, cur),
            (None, None) => self.link_last_child(parent, cur),
        }
        Ok(Some(cur))
    }

    /// Link an attribute into `elem`'s list after `prev` (or first),
    /// destroying an existing attribute of the same name and namespace
    fn insert_prop(&mut self, cur: NodeId, elem: NodeId, anchor: PropAnchor) -> DomResult<Option<NodeId>> {
        let name = self.node(cur)?.name.clone().unwrap_or_default();
        let href = self.node_ns(cur).and_then(|ns| self.namespace(ns)?.href()).map(str::to_owned);
        let existing = self.find_prop(elem, &name, href.as_deref());

        self.detach(cur);
        let doc = self.doc(elem);
        if self.doc(cur) != doc {
            self.set_tree_doc(cur, doc)?;
        }
        match anchor {
            PropAnchor::After(prev) if prev != cur => self.link_after(prev, cur),
            PropAnchor::Before(next) if next != cur => self.link_before(next, cur),
            _ => self.link_last_prop(elem, cur),
        }
        if let Some(old) = existing.filter(|old| *old != cur) {
            self.free_node(old);
        }
        Ok(Some(cur))
    }

    /// Append `cur` as the last child (or attribute) of `parent`
    ///
    /// Text merging into the last child returns that child and frees `cur`.
    pub fn add_child(&mut self, parent: NodeId, cur: NodeId) -> DomResult<Option<NodeId>> {
        if parent == cur {
            return Err(DomError::HierarchyRequest);
        }
        self.check_attach(parent, cur)?;
        if self.node(cur)?.kind == NodeKind::Attribute {
            return self.insert_prop(cur, parent, PropAnchor::Last);
        }
        self.detach(cur);
        let last = self.last_child(parent);
        self.insert_node(cur, parent, last, None)
    }

    /// Resolve the parent of a sibling target and validate `cur` against it
    fn sibling_parent(&self, target: NodeId, cur: NodeId) -> DomResult<NodeId> {
        if target == cur {
            return Err(DomError::HierarchyRequest);
        }
        let parent = self.node(target)?.parent.ok_or(DomError::HierarchyRequest)?;
        let target_is_attr = self.node(target)?.kind == NodeKind::Attribute;
        let cur_is_attr = self.node(cur)?.kind == NodeKind::Attribute;
        if target_is_attr != cur_is_attr {
            return Err(DomError::HierarchyRequest);
        }
        self.check_attach(parent, cur)?;
        Ok(parent)
    }

    /// Insert `cur` right after `target`
    pub fn add_next_sibling(&mut self, target: NodeId, cur: NodeId) -> DomResult<Option<NodeId>> {
        let parent = self.sibling_parent(target, cur)?;
        if self.node(cur)?.kind == NodeKind::Attribute {
            return self.insert_prop(cur, parent, PropAnchor::After(target));
        }
        self.detach(cur);
        let next = self.next_sibling(target);
        self.insert_node(cur, parent, Some(target), next)
    }

    /// Insert `cur` right before `target`
    pub fn add_prev_sibling(&mut self, target: NodeId, cur: NodeId) -> DomResult<Option<NodeId>> {
        let parent = self.sibling_parent(target, cur)?;
        if self.node(cur)?.kind == NodeKind::Attribute {
            return self.insert_prop(cur, parent, PropAnchor::Before(target));
        }
        self.detach(cur);
        let prev = self.prev_sibling(target);
        self.insert_node(cur, parent, prev, Some(target))
    }

    /// Append `cur` at the end of `target`'s sibling list
    pub fn add_sibling(&mut self, target: NodeId, cur: NodeId) -> DomResult<Option<NodeId>> {
        let parent = self.sibling_parent(target, cur)?;
        if self.node(cur)?.kind == NodeKind::Attribute {
            return self.insert_prop(cur, parent, PropAnchor::Last);
        }
        if self.last_child(parent) == Some(cur) {
            return Ok(Some(cur));
        }
        self.detach(cur);
        let last = self.last_child(parent);
        self.insert_node(cur, parent, last, None)
    }

    /// Detach a node from its parent
    ///
    /// Declarations stay owned by their DTD and are left in place.
    pub fn unlink(&mut self, node: NodeId) -> DomResult<()> {
        if self.node(node)?.kind.is_declaration() {
            return Ok(());
        }
        self.detach(node);
        Ok(())
    }

    /// Put `cur` in the place of `old`, which is unlinked and returned
    ///
    /// Without `cur`, `old` is just unlinked. Returns `None` when `old`
    /// has no parent, is a declaration, or is `cur` itself; an attribute
    /// and a non-attribute never replace each other (`old` is returned
    /// untouched).
    pub fn replace_node(&mut self, old: NodeId, cur: Option<NodeId>) -> DomResult<Option<NodeId>> {
        let node = self.node(old)?;
        let Some(parent) = node.parent else { return Ok(None) };
        if node.kind.is_declaration() {
            return Ok(None);
        }
        let Some(cur) = cur else {
            self.detach(old);
            return Ok(Some(old));
        };
        if cur == old {
            return Ok(None);
        }
        let old_is_attr = node.kind == NodeKind::Attribute;
        if old_is_attr != (self.node(cur)?.kind == NodeKind::Attribute) {
            return Ok(Some(old));
        }
        self.check_attach(parent, cur)?;

        self.detach(cur);
        let doc = self.doc(old);
        if self.doc(cur) != doc {
            self.set_tree_doc(cur, doc)?;
        }
        self.link_before(old, cur);
        self.detach(old);
        Ok(Some(old))
    }

    /// Append the content of `second` to `first` and free `second`
    ///
    /// Only text nodes with equal names merge; anything else yields `None`.
    pub fn text_merge(&mut self, first: NodeId, second: NodeId) -> DomResult<Option<NodeId>> {
        if first == second || !self.text_coalesces(first, second) {
            return Ok(None);
        }
        let text = self.node(second)?.content.clone().unwrap_or_default();
        self.append_content(first, &text)?;
        self.free_node(second);
        Ok(Some(first))
    }

    /// Append to the character data of a text-like node
    pub fn text_concat(&mut self, node: NodeId, text: Option<&str>) -> DomResult<()> {
        if !self.node(node)?.kind.is_text_like() {
            return Err(DomError::InvalidNodeType);
        }
        match text {
            Some(text) => self.append_content(node, text),
            None => Ok(()),
        }
    }
}

/// Where an attribute lands in the attribute list
#[derive(Debug, Clone, Copy)]
enum PropAnchor {
    Last,
    After(NodeId),
    Before(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TEXT_NAME;

    fn element(tree: &mut DomTree, name: &str) -> NodeId {
        tree.create(NodeKind::Element, Some(name), None, None).unwrap()
    }

    fn text(tree: &mut DomTree, content: &str) -> NodeId {
        tree.create(NodeKind::Text, Some(TEXT_NAME), Some(content), None).unwrap()
    }

    #[test]
    fn test_child_masks() {
        assert!(NodeKind::Document.accepts(NodeKind::Element));
        assert!(!NodeKind::Document.accepts(NodeKind::Text));
        assert!(NodeKind::Element.accepts(NodeKind::Attribute));
        assert!(!NodeKind::Attribute.accepts(NodeKind::Element));
        assert!(NodeKind::Dtd.accepts(NodeKind::EntityDecl));
        assert!(!NodeKind::Text.accepts(NodeKind::Text));
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut tree = DomTree::new();
        let a = element(&mut tree, "a");
        let b = element(&mut tree, "b");
        tree.add_child(a, b).unwrap();

        assert_eq!(tree.add_child(b, a), Err(DomError::HierarchyRequest));
        assert_eq!(tree.add_child(a, a), Err(DomError::HierarchyRequest));
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn test_add_child_merges_text() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");
        let t1 = text(&mut tree, "ab");
        let t2 = text(&mut tree, "cd");

        assert_eq!(tree.add_child(e, t1).unwrap(), Some(t1));
        assert_eq!(tree.add_child(e, t2).unwrap(), Some(t1));
        assert!(!tree.contains(t2));
        assert_eq!(tree.get(t1).unwrap().content(), Some("abcd"));
    }

    #[test]
    fn test_sibling_insertion_order() {
        let mut tree = DomTree::new();
        let p = element(&mut tree, "p");
        let a = element(&mut tree, "a");
        let b = element(&mut tree, "b");
        let c = element(&mut tree, "c");
        let d = element(&mut tree, "d");
        tree.add_child(p, b).unwrap();

        tree.add_prev_sibling(b, a).unwrap();
        tree.add_next_sibling(b, c).unwrap();
        tree.add_sibling(a, d).unwrap();
        assert_eq!(tree.children(p), vec![a, b, c, d]);

        // Moving an existing child
        tree.add_next_sibling(a, d).unwrap();
        assert_eq!(tree.children(p), vec![a, d, b, c]);
    }

    #[test]
    fn test_sibling_requires_parent() {
        let mut tree = DomTree::new();
        let a = element(&mut tree, "a");
        let b = element(&mut tree, "b");
        assert_eq!(tree.add_next_sibling(a, b), Err(DomError::HierarchyRequest));
    }

    #[test]
    fn test_attribute_child_replaces_duplicate() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");
        let old = tree.new_prop(Some(e), Some("x"), Some("1")).unwrap().unwrap();
        let new = tree.new_prop(None, Some("x"), Some("2")).unwrap().unwrap();

        assert_eq!(tree.add_child(e, new).unwrap(), Some(new));
        assert!(!tree.contains(old));
        assert_eq!(tree.attributes(e), vec![new]);
    }

    #[test]
    fn test_replace_node() {
        let mut tree = DomTree::new();
        let p = element(&mut tree, "p");
        let old = element(&mut tree, "old");
        let new = element(&mut tree, "new");
        tree.add_child(p, old).unwrap();

        assert_eq!(tree.replace_node(old, Some(new)).unwrap(), Some(old));
        assert_eq!(tree.children(p), vec![new]);
        assert_eq!(tree.parent(old), None);

        // Parentless old is not applicable
        assert_eq!(tree.replace_node(old, Some(new)).unwrap(), None);
    }

    #[test]
    fn test_text_merge() {
        let mut tree = DomTree::new();
        let t1 = text(&mut tree, "x");
        let t2 = text(&mut tree, "y");
        let e = element(&mut tree, "e");

        assert_eq!(tree.text_merge(t1, e).unwrap(), None);
        assert_eq!(tree.text_merge(t1, t2).unwrap(), Some(t1));
        assert_eq!(tree.get(t1).unwrap().content(), Some("xy"));
        assert!(!tree.contains(t2));
    }

    #[test]
    fn test_text_concat_rejects_elements() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");
        assert_eq!(tree.text_concat(e, Some("x")), Err(DomError::InvalidNodeType));
    }
}
