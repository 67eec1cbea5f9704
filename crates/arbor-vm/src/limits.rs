//! Growth limiters
//!
//! Copy-and-reattach sequences double a tree every two steps and repeated
//! concatenation doubles text. Both are capped after the fact.

use arbor_dom::{DomTree, NodeId, NodeKind};
use tracing::debug;

/// Reset oversized character data to empty
///
/// Returns whether the content was cut.
pub fn check_content(tree: &mut DomTree, node: Option<NodeId>, max: usize) -> bool {
    let Some(node) = node else { return false };
    let Some(n) = tree.get(node) else { return false };
    let capped = matches!(
        n.kind(),
        NodeKind::Text | NodeKind::CData | NodeKind::EntityDecl | NodeKind::Pi | NodeKind::Comment
    );
    let len = n.content().map_or(0, str::len);
    if !capped || len <= max {
        return false;
    }
    debug!("content of {} reset ({} bytes)", node, len);
    tree.clear_content(node);
    true
}

/// Nodes in the subtree under `root`, in pre-order
///
/// Attributes are not counted and entity references are not entered.
pub fn count_nodes(tree: &DomTree, root: NodeId) -> usize {
    if !tree.contains(root) {
        return 0;
    }
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        if tree.kind(node) == Some(NodeKind::EntityRef) {
            continue;
        }
        let mut child = tree.last_child(node);
        while let Some(c) = child {
            stack.push(c);
            child = tree.prev_sibling(c);
        }
    }
    count
}

/// Free a copy that grew past `max` nodes
///
/// Returns the copy when it is small enough, `None` once it was freed.
pub fn check_copy(tree: &mut DomTree, copy: Option<NodeId>, max: usize) -> Option<NodeId> {
    let copy = copy?;
    let count = count_nodes(tree, copy);
    if count <= max {
        return Some(copy);
    }
    debug!("discarding copy {} ({} nodes)", copy, count);
    if tree.kind(copy).is_some_and(NodeKind::is_document) {
        tree.free_doc(copy);
    } else {
        tree.free_node(copy);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_reset_above_cap() {
        let mut tree = DomTree::new();
        let text = tree.new_text(Some("x".repeat(101).as_str())).unwrap();
        assert!(check_content(&mut tree, Some(text), 100));
        assert_eq!(tree.get(text).unwrap().content(), Some(""));

        tree.text_concat(text, Some("y".repeat(100).as_str())).unwrap();
        assert!(!check_content(&mut tree, Some(text), 100));
        assert_eq!(tree.get(text).unwrap().content().unwrap().len(), 100);
        tree.free_node(text);
    }

    #[test]
    fn test_content_cap_ignores_containers() {
        let mut tree = DomTree::new();
        let elem = tree.new_node(None, Some("e")).unwrap().unwrap();
        tree.add_content(elem, Some("x".repeat(200).as_str())).unwrap();
        assert!(!check_content(&mut tree, Some(elem), 100));
        assert!(!check_content(&mut tree, None, 100));
        let last = tree.last_child(elem);
        assert!(check_content(&mut tree, last, 100));
        tree.free_node(elem);
    }

    #[test]
    fn test_count_nodes() {
        let mut tree = DomTree::new();
        let a = tree.new_node(None, Some("a")).unwrap().unwrap();
        let b = tree.new_child(a, None, Some("b"), Some("t")).unwrap().unwrap();
        tree.new_child(b, None, Some("c"), None).unwrap();
        tree.set_prop(Some(a), Some("k"), Some("v")).unwrap();
        // a, b, b's text, c
        assert_eq!(count_nodes(&tree, a), 4);
        assert_eq!(count_nodes(&tree, b), 3);
        tree.free_node(a);
        assert_eq!(count_nodes(&tree, a), 0);
    }

    #[test]
    fn test_check_copy_discards_large_copies() {
        let mut tree = DomTree::new();
        let root = tree.new_node(None, Some("r")).unwrap().unwrap();
        for _ in 0..5 {
            tree.new_child(root, None, Some("c"), None).unwrap();
        }
        assert_eq!(check_copy(&mut tree, Some(root), 6), Some(root));
        assert_eq!(check_copy(&mut tree, Some(root), 5), None);
        assert!(!tree.contains(root));
        assert_eq!(tree.live_nodes(), 0);
    }

    fn large_doc(tree: &mut DomTree, doc: NodeId) {
        let root = tree.new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        tree.doc_set_root_element(Some(doc), Some(root)).unwrap();
        for _ in 0..60 {
            tree.new_child(root, None, Some("c"), None).unwrap();
        }
    }

    #[test]
    fn test_check_copy_frees_whole_documents() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        large_doc(&mut tree, doc);
        let before = tree.live_nodes();

        let copy = tree.copy_doc(doc, true).unwrap().unwrap();
        assert!(count_nodes(&tree, copy) > 50);
        assert_eq!(check_copy(&mut tree, Some(copy), 50), None);
        assert!(!tree.contains(copy));
        assert_eq!(tree.live_nodes(), before);

        tree.free_doc(doc);
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_check_copy_frees_html_documents() {
        let mut tree = DomTree::new();
        let doc = tree.html_new_doc(None, None).unwrap();
        large_doc(&mut tree, doc);

        let copy = tree.copy_doc(doc, true).unwrap().unwrap();
        assert_eq!(tree.kind(copy), Some(NodeKind::HtmlDocument));
        assert_eq!(check_copy(&mut tree, Some(copy), 50), None);
        tree.free_doc(doc);
        assert_eq!(tree.live_nodes(), 0);
    }
}
