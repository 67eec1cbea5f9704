//! Namespaces
//!
//! Declarations live in their own arena and are owned by the element that
//! declares them. Elements and attributes refer to a declaration by handle;
//! a reference to a freed declaration simply stops resolving.

use crate::alloc::NS_COST;
use crate::node::NodeKind;
use crate::{DomError, DomResult, DomTree, NodeId, NsId};

/// The namespace bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefixes tried per base name before giving up on a reconciled declaration
const RECONCILE_ATTEMPTS: usize = 1000;

/// Namespace declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub(crate) href: Option<String>,
    pub(crate) prefix: Option<String>,
    /// Declaring element, if any
    pub(crate) owner: Option<NodeId>,
}

impl Namespace {
    #[inline]
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[inline]
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }
}

impl DomTree {
    /// Allocate a declaration, attached to `owner` when given
    fn alloc_ns(&mut self, owner: Option<NodeId>, href: Option<&str>, prefix: Option<&str>) -> DomResult<NsId> {
        self.injector.charge(NS_COST)?;
        let href = self.dup_opt(href)?;
        let prefix = self.dup_opt(prefix)?;
        let ns = NsId(self.namespaces.insert(Namespace { href, prefix, owner }));
        if let Some(node) = owner.and_then(|o| self.get_mut(o)) {
            node.ns_def.push(ns);
        }
        Ok(ns)
    }

    /// Declare a namespace on `node`, or create a free-standing one
    ///
    /// Returns `None` when `node` is not an element, when the prefix is the
    /// reserved `xml`, or when `node` already declares the prefix.
    pub fn new_ns(&mut self, node: Option<NodeId>, href: Option<&str>, prefix: Option<&str>) -> DomResult<Option<NsId>> {
        if prefix == Some("xml") {
            return Ok(None);
        }
        if let Some(node) = node {
            let n = self.node(node)?;
            if n.kind != NodeKind::Element {
                return Ok(None);
            }
            let duplicate = n.ns_def.iter().any(|ns| {
                self.namespace(*ns).is_some_and(|decl| decl.prefix() == prefix)
            });
            if duplicate {
                return Ok(None);
            }
        }
        self.alloc_ns(node, href, prefix).map(Some)
    }

    /// Free a declaration, detaching it from its owner
    pub fn free_ns(&mut self, ns: NsId) {
        let Some(decl) = self.namespaces.remove(ns.0) else { return };
        if let Some(node) = decl.owner.and_then(|o| self.get_mut(o)) {
            node.ns_def.retain(|d| *d != ns);
        }
    }

    /// The `xml` declaration visible from `node`, created on demand
    ///
    /// Documents keep it aside; a node without a document gets it declared
    /// on itself when it is an element.
    fn xml_ns(&mut self, node: NodeId) -> DomResult<Option<NsId>> {
        if let Some(found) = self.lookup_prefix(node, Some("xml")) {
            return Ok(Some(found));
        }
        match self.doc(node) {
            Some(doc) => {
                let existing = self.node(doc)?.doc_data().and_then(|d| d.xml_ns);
                if let Some(ns) = existing.filter(|ns| self.namespaces.contains(ns.0)) {
                    return Ok(Some(ns));
                }
                let ns = self.alloc_ns(None, Some(XML_NAMESPACE), Some("xml"))?;
                if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
                    data.xml_ns = Some(ns);
                }
                Ok(Some(ns))
            }
            None if self.kind(node) == Some(NodeKind::Element) => {
                self.alloc_ns(Some(node), Some(XML_NAMESPACE), Some("xml")).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Resolve a prefix walking declarations up the ancestry, without
    /// allocating
    pub fn lookup_prefix(&self, node: NodeId, prefix: Option<&str>) -> Option<NsId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            let n = self.get(id)?;
            match n.kind {
                NodeKind::EntityRef | NodeKind::EntityDecl | NodeKind::Dtd => return None,
                NodeKind::Element => {
                    for &ns in &n.ns_def {
                        if self.namespace(ns).is_some_and(|d| d.prefix() == prefix) {
                            return Some(ns);
                        }
                    }
                }
                _ => {}
            }
            cur = n.parent;
        }
        None
    }

    /// Resolve a prefix; `xml` always resolves, allocating its declaration
    /// if needed
    pub fn search_ns(&mut self, node: NodeId, prefix: Option<&str>) -> DomResult<Option<NsId>> {
        self.node(node)?;
        if prefix == Some("xml") {
            return self.xml_ns(node);
        }
        Ok(self.lookup_prefix(node, prefix))
    }

    /// Find an in-scope declaration binding `href` whose prefix is not
    /// shadowed closer to `node`
    pub fn search_ns_by_href(&mut self, node: NodeId, href: &str) -> DomResult<Option<NsId>> {
        self.node(node)?;
        if href == XML_NAMESPACE {
            return self.xml_ns(node);
        }
        Ok(self.lookup_href(node, href))
    }

    fn lookup_href(&self, node: NodeId, href: &str) -> Option<NsId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            let n = self.get(id)?;
            match n.kind {
                NodeKind::EntityRef | NodeKind::EntityDecl | NodeKind::Dtd => return None,
                NodeKind::Element => {
                    for &ns in &n.ns_def {
                        let Some(decl) = self.namespace(ns) else { continue };
                        if decl.href() == Some(href) && self.lookup_prefix(node, decl.prefix()) == Some(ns) {
                            return Some(ns);
                        }
                    }
                }
                _ => {}
            }
            cur = n.parent;
        }
        None
    }

    /// All declarations in scope at `node`, innermost first; `None` if
    /// there are none
    pub fn get_ns_list(&mut self, node: NodeId) -> DomResult<Option<Vec<NsId>>> {
        let list = self.in_scope_namespaces(node);
        if list.is_empty() {
            return Ok(None);
        }
        self.injector.charge(list.len() * std::mem::size_of::<NsId>())?;
        Ok(Some(list))
    }

    pub(crate) fn in_scope_namespaces(&self, node: NodeId) -> Vec<NsId> {
        let mut out: Vec<NsId> = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            let Some(n) = self.get(id) else { break };
            if n.kind == NodeKind::Element {
                for &ns in &n.ns_def {
                    let Some(prefix) = self.namespace(ns).map(|d| d.prefix()) else { continue };
                    let shadowed = out.iter().any(|o| self.namespace(*o).is_some_and(|d| d.prefix() == prefix));
                    if !shadowed {
                        out.push(ns);
                    }
                }
            }
            cur = n.parent;
        }
        out
    }

    /// Namespace of an element or attribute
    #[inline]
    pub fn node_ns(&self, node: NodeId) -> Option<NsId> {
        self.get(node).and_then(|n| n.ns).filter(|ns| self.namespaces.contains(ns.0))
    }

    /// Set the namespace of an element or attribute; other kinds are left
    /// alone
    pub fn set_ns(&mut self, node: NodeId, ns: Option<NsId>) -> DomResult<()> {
        let n = self.node_mut(node)?;
        if matches!(n.kind, NodeKind::Element | NodeKind::Attribute) {
            n.ns = ns;
        }
        Ok(())
    }

    /// Free-standing copy of a declaration; `None` for the `xml` prefix
    pub fn copy_namespace(&mut self, ns: NsId) -> DomResult<Option<NsId>> {
        let decl = self.namespace(ns).cloned().ok_or(DomError::NotFound)?;
        if decl.prefix() == Some("xml") {
            return Ok(None);
        }
        self.alloc_ns(None, decl.href(), decl.prefix()).map(Some)
    }

    /// Copy a declaration and the ones declared after it on the same
    /// element
    ///
    /// All or nothing: a failed copy frees the partial list.
    pub fn copy_namespace_list(&mut self, ns: NsId) -> DomResult<Option<Vec<NsId>>> {
        let decl = self.namespace(ns).ok_or(DomError::NotFound)?;
        let source: Vec<NsId> = match decl.owner.and_then(|o| self.get(o)) {
            Some(owner) => owner.ns_def.iter().copied().skip_while(|d| *d != ns).collect(),
            None => vec![ns],
        };
        let mut copies = Vec::with_capacity(source.len());
        for src in source {
            match self.copy_namespace(src) {
                Ok(Some(copy)) => copies.push(copy),
                other => {
                    for copy in copies {
                        self.free_ns(copy);
                    }
                    return other.map(|_| None);
                }
            }
        }
        Ok(Some(copies))
    }

    /// Declare `href` on `tree` under a prefix that is free there
    pub(crate) fn new_reconciled_ns(&mut self, tree: NodeId, href: Option<&str>, prefix: Option<&str>) -> DomResult<NsId> {
        if self.kind(tree) != Some(NodeKind::Element) {
            return Err(DomError::InvalidNodeType);
        }
        let base = prefix.unwrap_or("default");
        let mut candidate = base.to_owned();
        let mut counter = 1;
        while self.lookup_prefix(tree, Some(&candidate)).is_some() {
            if counter > RECONCILE_ATTEMPTS {
                return Err(DomError::InvalidArgument);
            }
            candidate = format!("{:.20}{}", base, counter);
            counter += 1;
        }
        self.alloc_ns(Some(tree), href, Some(&candidate))
    }

    /// Make every namespace reference in the subtree resolve to a
    /// declaration in scope, declaring copies on `tree` where needed
    pub fn reconcile_ns(&mut self, tree: NodeId) -> DomResult<()> {
        if self.node(tree)?.kind != NodeKind::Element {
            return Err(DomError::InvalidNodeType);
        }
        let mut cache: Vec<(NsId, NsId)> = Vec::new();
        for node in self.owned_nodes(tree) {
            let Some(n) = self.get(node) else { continue };
            if !matches!(n.kind, NodeKind::Element | NodeKind::Attribute) {
                continue;
            }
            let Some(ns) = n.ns else { continue };
            let Some(decl) = self.namespace(ns).cloned() else {
                // Declaration is gone
                if let Some(n) = self.get_mut(node) {
                    n.ns = None;
                }
                continue;
            };
            if let Some(&(_, mapped)) = cache.iter().find(|(old, _)| *old == ns) {
                if let Some(n) = self.get_mut(node) {
                    n.ns = Some(mapped);
                }
                continue;
            }
            let found = match decl.href() {
                Some(href) => self.search_ns_by_href(node, href)?,
                None => None,
            };
            let mapped = match found {
                Some(found) => found,
                None if self.lookup_prefix(node, decl.prefix()) == Some(ns) => ns,
                None => self.new_reconciled_ns(tree, decl.href(), decl.prefix())?,
            };
            cache.push((ns, mapped));
            if let Some(n) = self.get_mut(node) {
                n.ns = Some(mapped);
            }
        }
        Ok(())
    }

    /// Drop declarations that repeat a binding already in scope from an
    /// ancestor, pointing their users at the outer declaration
    pub(crate) fn remove_redundant_ns(&mut self, tree: NodeId) {
        for node in self.owned_nodes(tree) {
            let Some(n) = self.get(node) else { continue };
            if n.kind != NodeKind::Element || n.ns_def.is_empty() {
                continue;
            }
            let Some(parent) = n.parent else { continue };
            for ns in n.ns_def.clone() {
                let Some(decl) = self.namespace(ns).cloned() else { continue };
                let Some(outer) = self.lookup_prefix(parent, decl.prefix()) else { continue };
                if self.namespace(outer).and_then(|d| d.href()) != decl.href() {
                    continue;
                }
                for user in self.owned_nodes(node) {
                    if let Some(u) = self.get_mut(user) {
                        if u.ns == Some(ns) {
                            u.ns = Some(outer);
                        }
                    }
                }
                self.free_ns(ns);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tree: &mut DomTree, name: &str) -> NodeId {
        tree.create(NodeKind::Element, Some(name), None, None).unwrap()
    }

    #[test]
    fn test_new_ns_rejects_duplicates_and_xml() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");

        assert!(tree.new_ns(Some(e), Some("urn:a"), Some("a")).unwrap().is_some());
        assert!(tree.new_ns(Some(e), Some("urn:b"), Some("a")).unwrap().is_none());
        assert!(tree.new_ns(Some(e), Some(XML_NAMESPACE), Some("xml")).unwrap().is_none());
        assert_eq!(tree.live_namespaces(), 1);
    }

    #[test]
    fn test_search_walks_ancestors() {
        let mut tree = DomTree::new();
        let root = element(&mut tree, "root");
        let child = element(&mut tree, "child");
        tree.link_last_child(root, child);
        let ns = tree.new_ns(Some(root), Some("urn:a"), Some("a")).unwrap().unwrap();

        assert_eq!(tree.search_ns(child, Some("a")).unwrap(), Some(ns));
        assert_eq!(tree.search_ns_by_href(child, "urn:a").unwrap(), Some(ns));
        assert_eq!(tree.search_ns(child, Some("b")).unwrap(), None);
    }

    #[test]
    fn test_shadowed_prefix_not_found_by_href() {
        let mut tree = DomTree::new();
        let root = element(&mut tree, "root");
        let child = element(&mut tree, "child");
        tree.link_last_child(root, child);
        tree.new_ns(Some(root), Some("urn:a"), Some("p")).unwrap();
        tree.new_ns(Some(child), Some("urn:b"), Some("p")).unwrap();

        assert_eq!(tree.search_ns_by_href(child, "urn:a").unwrap(), None);
    }

    #[test]
    fn test_xml_prefix_declared_on_docless_element() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");
        let ns = tree.search_ns(e, Some("xml")).unwrap().unwrap();
        assert_eq!(tree.namespace(ns).unwrap().href(), Some(XML_NAMESPACE));
        // Second lookup reuses it
        assert_eq!(tree.search_ns(e, Some("xml")).unwrap(), Some(ns));
    }

    #[test]
    fn test_reconcile_declares_missing_namespace() {
        let mut tree = DomTree::new();
        let a = element(&mut tree, "a");
        let b = element(&mut tree, "b");
        let ns = tree.new_ns(Some(a), Some("urn:x"), Some("x")).unwrap().unwrap();
        tree.set_ns(b, Some(ns)).unwrap();

        tree.reconcile_ns(b).unwrap();
        let fixed = tree.node_ns(b).unwrap();
        assert_ne!(fixed, ns);
        assert_eq!(tree.namespace(fixed).unwrap().owner(), Some(b));
        assert_eq!(tree.namespace(fixed).unwrap().href(), Some("urn:x"));

        tree.free_node(a);
        tree.free_node(b);
        assert_eq!(tree.live_namespaces(), 0);
    }

    #[test]
    fn test_copy_namespace_list() {
        let mut tree = DomTree::new();
        let e = element(&mut tree, "e");
        let first = tree.new_ns(Some(e), Some("urn:a"), Some("a")).unwrap().unwrap();
        tree.new_ns(Some(e), Some("urn:b"), Some("b")).unwrap();

        let copies = tree.copy_namespace_list(first).unwrap().unwrap();
        assert_eq!(copies.len(), 2);
        for copy in copies {
            assert_eq!(tree.namespace(copy).unwrap().owner(), None);
            tree.free_ns(copy);
        }
        assert_eq!(tree.live_namespaces(), 2);
    }
}
