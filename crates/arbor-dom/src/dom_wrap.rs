//! Moving subtrees between documents
//!
//! Adopting, removing and cloning nodes while keeping every namespace
//! reference pointing at a declaration the subtree can still see.

use crate::node::NodeKind;
use crate::{DomError, DomResult, DomTree, NodeId};

/// Option bit: drop declarations made redundant by an ancestor
pub const RECONCILE_REMOVE_REDUNDANT: i32 = 1;

/// Kinds that never move between documents
fn is_immovable(kind: NodeKind) -> bool {
    kind.is_document() || kind == NodeKind::Dtd || kind.is_declaration()
}

impl DomTree {
    /// Reconcile the namespaces of an element subtree
    pub fn dom_wrap_reconcile_namespaces(&mut self, elem: NodeId, options: i32) -> DomResult<()> {
        self.reconcile_ns(elem)?;
        if options & RECONCILE_REMOVE_REDUNDANT != 0 {
            self.remove_redundant_ns(elem);
        }
        Ok(())
    }

    /// Make `attr`'s namespace one in scope at its new place, or clear it
    fn rebind_attr_ns(&mut self, attr: NodeId, scope: Option<NodeId>) -> DomResult<()> {
        let href = self.node_ns(attr).and_then(|ns| self.namespace(ns)?.href()).map(str::to_owned);
        let ns = match (href, scope) {
            (Some(href), Some(scope)) => self.search_ns_by_href(scope, &href)?,
            _ => None,
        };
        self.node_mut(attr)?.ns = ns;
        Ok(())
    }

    /// Unlink `node` and move it into `dest_doc`, ready to be inserted under
    /// `dest_parent`
    ///
    /// The node stays unlinked; an element gets the declarations it uses
    /// re-declared on itself. `src_doc`, when given, must own the node and
    /// `dest_parent` must belong to `dest_doc`.
    pub fn dom_wrap_adopt_node(
        &mut self,
        src_doc: Option<NodeId>,
        node: NodeId,
        dest_doc: NodeId,
        dest_parent: Option<NodeId>,
        _options: i32,
    ) -> DomResult<()> {
        let n = self.node(node)?;
        let kind = n.kind;
        if is_immovable(kind) {
            return Err(DomError::InvalidNodeType);
        }
        if src_doc.is_some_and(|d| n.doc != Some(d)) {
            return Err(DomError::WrongDocument);
        }
        if !self.kind(dest_doc).is_some_and(NodeKind::is_document) {
            return Err(DomError::InvalidArgument);
        }
        if dest_parent.is_some_and(|p| self.doc(p) != Some(dest_doc)) {
            return Err(DomError::WrongDocument);
        }

        self.detach(node);
        self.set_tree_doc(node, Some(dest_doc))?;
        match kind {
            NodeKind::Element => self.reconcile_ns(node)?,
            NodeKind::Attribute => self.rebind_attr_ns(node, dest_parent)?,
            _ => {}
        }
        tracing::trace!("adopted {} into {}", node, dest_doc);
        Ok(())
    }

    /// Unlink `node` from `doc`, keeping its namespace references valid
    ///
    /// Kinds without namespaces are simply unlinked; documents, DTDs and
    /// declarations are left alone.
    pub fn dom_wrap_remove_node(&mut self, doc: NodeId, node: NodeId, _options: i32) -> DomResult<()> {
        let n = self.node(node)?;
        if n.doc != Some(doc) {
            return Err(DomError::WrongDocument);
        }
        let kind = n.kind;
        if is_immovable(kind) {
            return Ok(());
        }
        self.detach(node);
        match kind {
            NodeKind::Element => self.reconcile_ns(node),
            NodeKind::Attribute => {
                let xml = self.node_ns(node).and_then(|ns| self.namespace(ns)?.href()) == Some(crate::XML_NAMESPACE);
                if !xml {
                    self.node_mut(node)?.ns = None;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Copy `node` into `dest_doc` as a detached subtree
    ///
    /// `deep` copies children as well; attributes and namespaces are always
    /// copied. Namespaces are resolved against `dest_parent` when given.
    pub fn dom_wrap_clone_node(
        &mut self,
        src_doc: Option<NodeId>,
        node: NodeId,
        dest_doc: Option<NodeId>,
        dest_parent: Option<NodeId>,
        deep: bool,
        _options: i32,
    ) -> DomResult<Option<NodeId>> {
        let n = self.node(node)?;
        if is_immovable(n.kind) {
            return Err(DomError::InvalidNodeType);
        }
        if src_doc.is_some_and(|d| n.doc != Some(d)) {
            return Err(DomError::WrongDocument);
        }
        if n.kind == NodeKind::Attribute {
            return self.copy_prop(dest_parent, node);
        }
        self.doc_copy_node(node, dest_doc, if deep { 1 } else { 2 })
    }
}
