//! Edge case tests for arbor-dom
//!
//! Stale handles, budget exhaustion, malformed input and structural
//! rejections through the public API.

use arbor_dom::{DomError, DomTree, FailureInjector, NODE_COST, NodeKind};

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn test_freed_handle_never_resolves() {
    let mut tree = DomTree::new();
    let a = tree.new_node(None, Some("a")).unwrap().unwrap();
    tree.free_node(a);
    assert!(!tree.contains(a));

    // the slot is reused under a new generation
    let b = tree.new_node(None, Some("b")).unwrap().unwrap();
    assert_ne!(a, b);
    assert!(tree.get(a).is_none());
    assert_eq!(tree.get_content(a), Err(DomError::NotFound));
    assert_eq!(tree.get(b).unwrap().name(), Some("b"));
}

#[test]
fn test_freeing_root_frees_subtree() {
    let mut tree = DomTree::new();
    let a = tree.new_node(None, Some("a")).unwrap().unwrap();
    let b = tree.new_child(a, None, Some("b"), Some("text")).unwrap().unwrap();
    let c = tree.new_child(b, None, Some("c"), None).unwrap().unwrap();
    assert_eq!(tree.tree_root(c), a);

    tree.free_node(a);
    assert!(!tree.contains(b));
    assert!(!tree.contains(c));
    assert_eq!(tree.live_nodes(), 0);
}

#[test]
fn test_predefined_entities_are_not_counted() {
    let mut tree = DomTree::new();
    let amp = tree.get_predefined_entity("amp").unwrap();
    assert!(tree.is_predefined(amp));
    tree.free_node(amp);
    assert!(tree.contains(amp));
    assert_eq!(tree.live_nodes(), 0);
}

// ============================================================================
// FAILURE INJECTION
// ============================================================================

#[test]
fn test_injector_refuses_past_limit() {
    let mut injector = FailureInjector::new();
    injector.set_limit(10);
    assert!(injector.charge(6).is_ok());
    assert_eq!(injector.charge(6), Err(DomError::OutOfMemory));
    assert!(injector.failed());
    assert!(injector.charge(4).is_ok());

    injector.reset_failed();
    assert!(!injector.failed());
    let stats = injector.stats();
    assert_eq!(stats.granted, 2);
    assert_eq!(stats.refused, 1);
    assert_eq!(stats.bytes, 10);
}

#[test]
fn test_forced_failure_reads_as_failed() {
    let mut injector = FailureInjector::new();
    injector.force_failure(true);
    assert!(injector.failed());
    injector.reset_failed();
    assert!(injector.failed());
    injector.force_failure(false);
    assert!(!injector.failed());
}

#[test]
fn test_unlimited_budget_never_refuses() {
    let mut injector = FailureInjector::new();
    for _ in 0..1000 {
        injector.charge(NODE_COST).unwrap();
    }
    assert!(!injector.failed());
}

#[test]
fn test_exhausted_budget_reports_oom() {
    let mut tree = DomTree::new();
    tree.injector_mut().set_limit(1);
    let err = tree.new_node(None, Some("a")).unwrap_err();
    assert!(err.is_oom());
    assert!(tree.injector().failed());
    assert_eq!(tree.live_nodes(), 0);
}

// ============================================================================
// STRUCTURE
// ============================================================================

#[test]
fn test_document_cannot_be_a_child() {
    let mut tree = DomTree::new();
    let doc = tree.new_doc(None).unwrap();
    let e = tree.new_node(None, Some("e")).unwrap().unwrap();
    assert!(tree.add_child(e, doc).is_err());
    assert_eq!(tree.parent(doc), None);
    assert_eq!(tree.kind(doc), Some(NodeKind::Document));
    assert_eq!(tree.doc(doc), Some(doc));
}

#[test]
fn test_html_document_behaves_as_document() {
    let mut tree = DomTree::new();
    let doc = tree.html_new_doc(None, None).unwrap();
    let e = tree.new_doc_node(Some(doc), None, Some("html"), None).unwrap().unwrap();
    assert!(tree.add_child(e, doc).is_err());
    assert_eq!(tree.doc_set_root_element(Some(doc), Some(e)).unwrap(), None);
    assert_eq!(tree.doc_get_root_element(Some(doc)), Some(e));

    let copy = tree.copy_doc(doc, true).unwrap().unwrap();
    assert_eq!(tree.kind(copy), Some(NodeKind::HtmlDocument));
    assert!(tree.get_int_subset(Some(copy)).is_some());
    tree.free_doc(copy);
    tree.free_doc(doc);
    assert_eq!(tree.live_nodes(), 0);
}

#[test]
fn test_text_cannot_hold_children() {
    let mut tree = DomTree::new();
    let t = tree.new_text(Some("t")).unwrap();
    let e = tree.new_node(None, Some("e")).unwrap().unwrap();
    assert!(tree.add_child(t, e).is_err());
    assert_eq!(tree.parent(e), None);
}

#[test]
fn test_unlink_detaches_from_parent() {
    let mut tree = DomTree::new();
    let a = tree.new_node(None, Some("a")).unwrap().unwrap();
    let b = tree.new_child(a, None, Some("b"), None).unwrap().unwrap();
    tree.unlink(b).unwrap();
    assert_eq!(tree.parent(b), None);
    assert!(tree.children(a).is_empty());
    assert_eq!(tree.tree_root(b), b);
}

// ============================================================================
// PARSING AND OUTPUT
// ============================================================================

#[test]
fn test_malformed_documents() {
    let mut tree = DomTree::new();
    let cases = ["<", "<a></b>", "</a>", "<a><!--</a>"];
    for input in &cases {
        assert_eq!(tree.read_doc(input, None, None, 0).unwrap(), None, "{:?}", input);
    }
    assert_eq!(tree.live_nodes(), 0);
}

#[test]
fn test_unknown_parse_encoding_yields_nothing() {
    let mut tree = DomTree::new();
    assert_eq!(tree.read_doc("<a/>", None, Some("klingon"), 0).unwrap(), None);
    assert_eq!(tree.live_nodes(), 0);
}

#[test]
fn test_special_chars_encoded() {
    let mut tree = DomTree::new();
    let out = tree.encode_special_chars(None, Some("a<b & \"c\">")).unwrap();
    assert_eq!(out.as_deref(), Some("a&lt;b &amp; &quot;c&quot;&gt;"));
    assert_eq!(tree.encode_special_chars(None, None).unwrap(), None);
}

#[test]
fn test_parsed_document_round_trips_content() {
    let mut tree = DomTree::new();
    let doc = tree.read_doc("<r><c>x</c></r>", None, None, 0).unwrap().unwrap();
    let out = tree.doc_dump_memory(doc, false, None).unwrap().unwrap();
    assert!(out.contains("<c>x</c>"), "{}", out);

    tree.free_doc(doc);
    assert_eq!(tree.live_nodes(), 0);
}
