//! Structural validity guards
//!
//! Pure predicates consulted before structural attaches. A rejected attach
//! is turned into a no-op by the caller.

use arbor_dom::{DTD_CHILD_MASK, DomTree, NodeId, NodeKind, TEXT_CONTENT_MASK};

/// Whether `parent` may contain a child of kind `child`
#[inline]
pub fn is_valid_child_type(parent: NodeKind, child: NodeKind) -> bool {
    parent.accepts(child)
}

/// Whether attaching `child` under `parent` keeps the tree legal
///
/// An absent argument passes; the tree API handles it.
pub fn is_valid_child(tree: &DomTree, parent: Option<NodeId>, child: Option<NodeId>) -> bool {
    let (Some(parent), Some(child)) = (parent, child) else {
        return true;
    };
    if parent == child {
        return false;
    }
    let (Some(parent_kind), Some(child_kind)) = (tree.kind(parent), tree.kind(child)) else {
        return true;
    };
    if !is_valid_child_type(parent_kind, child_kind) {
        return false;
    }
    if tree.first_child(child).is_none() {
        return true;
    }
    let mut cur = tree.parent(parent);
    while let Some(n) = cur {
        if n == child {
            return false;
        }
        cur = tree.parent(n);
    }
    true
}

fn kind_in(tree: &DomTree, node: Option<NodeId>, mask: u32) -> bool {
    node.and_then(|n| tree.kind(n)).is_some_and(|k| k.bit() & mask != 0)
}

/// Element, attribute or entity declaration
#[inline]
pub fn is_dtd_child(tree: &DomTree, node: Option<NodeId>) -> bool {
    kind_in(tree, node, DTD_CHILD_MASK)
}

/// Text, cdata, comment or processing instruction
#[inline]
pub fn is_text_content_node(tree: &DomTree, node: Option<NodeId>) -> bool {
    kind_in(tree, node, TEXT_CONTENT_MASK)
}

/// DTD node installed as its document's internal or external subset
pub fn is_installed_subset(tree: &DomTree, node: NodeId) -> bool {
    if tree.kind(node) != Some(NodeKind::Dtd) {
        return false;
    }
    let Some(data) = tree.doc(node).and_then(|d| tree.get(d)).and_then(|d| d.doc_data()) else {
        return false;
    };
    data.int_subset == Some(node) || data.ext_subset == Some(node)
}
