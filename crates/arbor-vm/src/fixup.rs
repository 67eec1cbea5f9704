//! Namespace fixup after moves

use arbor_dom::{DomResult, DomTree, NodeId, NodeKind};

/// Reconcile namespaces of a node that changed parent or document
///
/// Elements reconcile their own subtree. Attributes reconcile their parent
/// element, or lose their namespace once parentless. Other kinds are left
/// alone.
pub fn fix_ns(tree: &mut DomTree, node: Option<NodeId>) -> DomResult<()> {
    let Some(node) = node else { return Ok(()) };
    match tree.kind(node) {
        Some(NodeKind::Element) => tree.reconcile_ns(node),
        Some(NodeKind::Attribute) => match tree.parent(node) {
            Some(parent) => tree.reconcile_ns(parent),
            None => tree.set_ns(node, None),
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moved_element_gets_declaration() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        let a = tree.new_doc_node(Some(doc), None, Some("a"), None).unwrap().unwrap();
        let ns = tree.new_ns(Some(a), Some("urn:x"), Some("x")).unwrap().unwrap();
        let c = tree.new_child(a, Some(ns), Some("c"), None).unwrap().unwrap();

        tree.unlink(c).unwrap();
        fix_ns(&mut tree, Some(c)).unwrap();
        let moved = tree.node_ns(c).unwrap();
        assert_eq!(tree.namespace(moved).unwrap().href(), Some("urn:x"));
        assert_eq!(tree.namespace(moved).unwrap().owner(), Some(c));

        tree.free_node(a);
        tree.free_node(c);
        tree.free_doc(doc);
        assert_eq!(tree.live_namespaces(), 0);
    }

    #[test]
    fn test_parentless_attribute_loses_namespace() {
        let mut tree = DomTree::new();
        let a = tree.new_node(None, Some("a")).unwrap().unwrap();
        let ns = tree.new_ns(Some(a), Some("urn:x"), Some("x")).unwrap().unwrap();
        let attr = tree.new_ns_prop(Some(a), Some(ns), Some("k"), Some("v")).unwrap().unwrap();

        tree.unlink(attr).unwrap();
        fix_ns(&mut tree, Some(attr)).unwrap();
        assert_eq!(tree.node_ns(attr), None);

        tree.free_node(attr);
        tree.free_node(a);
    }

    #[test]
    fn test_other_kinds_untouched() {
        let mut tree = DomTree::new();
        let text = tree.new_text(Some("t")).unwrap();
        assert_eq!(fix_ns(&mut tree, Some(text)), Ok(()));
        assert_eq!(fix_ns(&mut tree, None), Ok(()));
        tree.free_node(text);
    }
}
