//! Copying
//!
//! Copies are fresh subtrees owned by a target document, or by none.
//! Namespace references that would point outside a copy are re-declared on
//! its topmost element.

use crate::node::{AttrRole, NodeKind};
use crate::{DomResult, DomTree, NodeId};

/// What a node copy takes along besides the node itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CopyDepth {
    /// Namespace declarations, namespace reference and attributes
    props: bool,
    children: bool,
}

impl CopyDepth {
    /// `0` copies the node alone, `2` adds attributes and namespaces, any
    /// other value copies recursively
    fn from_extended(extended: i32) -> Self {
        Self {
            props: extended != 0,
            children: extended != 0 && extended != 2,
        }
    }

    const DEEP: Self = Self { props: true, children: true };
}

impl DomTree {
    /// Copy `src` into `doc`, appended to `parent` when given
    ///
    /// A detached copy is freed again on failure; a linked one is left for
    /// the caller that owns the top of the copy.
    fn static_copy(
        &mut self,
        src: NodeId,
        doc: Option<NodeId>,
        parent: Option<NodeId>,
        depth: CopyDepth,
    ) -> DomResult<Option<NodeId>> {
        let node = self.node(src)?;
        let (kind, name, content, ns) = (node.kind, node.name.clone(), node.content.clone(), node.ns);
        if kind.is_document() || kind == NodeKind::Dtd || kind.is_declaration() {
            return Ok(None);
        }
        if kind == NodeKind::Attribute {
            return self.copy_attr(src, doc, parent.filter(|p| self.kind(*p) == Some(NodeKind::Element))).map(Some);
        }
        let copy = self.create(kind, name.as_deref(), content.as_deref(), doc)?;
        if let Some(parent) = parent {
            self.link_last_child(parent, copy);
        }
        match self.fill_copy(src, copy, doc, depth, ns) {
            Ok(()) => Ok(Some(copy)),
            Err(e) => {
                if parent.is_none() {
                    self.free_node(copy);
                }
                Err(e)
            }
        }
    }

    fn fill_copy(
        &mut self,
        src: NodeId,
        copy: NodeId,
        doc: Option<NodeId>,
        depth: CopyDepth,
        ns: Option<crate::NsId>,
    ) -> DomResult<()> {
        if depth.props && self.kind(src) == Some(NodeKind::Element) {
            let defs = self.node(src)?.ns_def.clone();
            for def in defs {
                let Some(decl) = self.namespace(def).cloned() else { continue };
                self.new_ns(Some(copy), decl.href(), decl.prefix())?;
            }
            self.node_mut(copy)?.ns = ns;
            for attr in self.attributes(src) {
                self.copy_attr(attr, doc, Some(copy))?;
            }
        }
        if depth.children && self.kind(src) != Some(NodeKind::EntityRef) {
            for child in self.children(src) {
                self.static_copy(child, doc, Some(copy), CopyDepth::DEEP)?;
            }
        }
        Ok(())
    }

    /// Copy an attribute with its value, linked onto `owner` when given
    ///
    /// The namespace reference still points at the source declaration;
    /// callers localize or clear it.
    fn copy_attr(&mut self, src: NodeId, doc: Option<NodeId>, owner: Option<NodeId>) -> DomResult<NodeId> {
        let node = self.node(src)?;
        let (name, ns, role) = (node.name.clone(), node.ns, node.attr_role());
        let attr = self.create(NodeKind::Attribute, name.as_deref(), None, doc)?;
        self.node_mut(attr)?.ns = ns;
        if let Some(owner) = owner {
            self.link_last_prop(owner, attr);
        }
        let filled = self.children(src).into_iter().try_for_each(|child| {
            self.static_copy(child, doc, Some(attr), CopyDepth::DEEP).map(|_| ())
        });
        let registered = filled.and_then(|()| match (role, doc) {
            (AttrRole::Id, Some(doc)) => {
                let value = self.attr_value(attr);
                self.add_id(doc, &value, attr).map(|_| ())
            }
            _ => Ok(()),
        });
        if let Err(e) = registered {
            if owner.is_none() {
                self.free_node(attr);
            }
            return Err(e);
        }
        Ok(attr)
    }

    /// Topmost element of the copy rooted at `root` above `node`
    fn top_element(&self, root: NodeId, node: NodeId) -> NodeId {
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            if self.kind(parent) != Some(NodeKind::Element) || !self.is_ancestor_or_self(root, parent) {
                break;
            }
            cur = parent;
        }
        cur
    }

    /// Point every namespace reference in the copy rooted at `root` at a
    /// declaration inside it
    fn localize_ns(&mut self, root: NodeId) -> DomResult<()> {
        for node in self.owned_nodes(root) {
            let Some(n) = self.get(node) else { continue };
            let (kind, ns, parent) = (n.kind, n.ns, n.parent);
            if !matches!(kind, NodeKind::Element | NodeKind::Attribute) {
                continue;
            }
            let Some(ns) = ns else { continue };
            let decl = self.namespace(ns).cloned();
            if decl.as_ref().and_then(|d| d.owner).is_some_and(|o| self.is_ancestor_or_self(root, o)) {
                continue;
            }
            let scope = if kind == NodeKind::Attribute { parent } else { Some(node) };
            let mapped = match (decl, scope) {
                (Some(decl), Some(scope)) => {
                    let by_prefix = self
                        .lookup_prefix(scope, decl.prefix())
                        .filter(|f| self.namespace(*f).map(|d| d.href()) == Some(decl.href()));
                    let found = match (by_prefix, decl.href()) {
                        (Some(found), _) => Some(found),
                        (None, Some(href)) => self.search_ns_by_href(scope, href)?,
                        (None, None) => None,
                    };
                    match found {
                        Some(found) => Some(found),
                        None => {
                            let top = self.top_element(root, scope);
                            Some(self.new_reconciled_ns(top, decl.href(), decl.prefix())?)
                        }
                    }
                }
                _ => None,
            };
            self.node_mut(node)?.ns = mapped;
        }
        Ok(())
    }

    fn copy_into(&mut self, node: NodeId, doc: Option<NodeId>, depth: CopyDepth) -> DomResult<Option<NodeId>> {
        match self.node(node)?.kind {
            NodeKind::Document | NodeKind::HtmlDocument => return self.copy_doc(node, depth.children),
            NodeKind::Attribute => {
                let attr = self.copy_attr(node, doc, None)?;
                self.node_mut(attr)?.ns = None;
                return Ok(Some(attr));
            }
            _ => {}
        }
        let Some(copy) = self.static_copy(node, doc, None, depth)? else { return Ok(None) };
        if let Err(e) = self.localize_ns(copy) {
            self.free_node(copy);
            return Err(e);
        }
        Ok(Some(copy))
    }

    /// Copy a node into its own document
    ///
    /// `extended`: 0 copies the node alone, 2 adds attributes and
    /// namespaces, any other value copies the whole subtree. Documents are
    /// copied whole; DTDs and declarations are not copied.
    pub fn copy_node(&mut self, node: NodeId, extended: i32) -> DomResult<Option<NodeId>> {
        let doc = self.doc(node);
        self.copy_into(node, doc, CopyDepth::from_extended(extended))
    }

    /// Copy a node into `doc`
    pub fn doc_copy_node(&mut self, node: NodeId, doc: Option<NodeId>, extended: i32) -> DomResult<Option<NodeId>> {
        self.copy_into(node, doc, CopyDepth::from_extended(extended))
    }

    /// Deep copies of `node` and its following siblings, without a document
    pub fn copy_node_list(&mut self, node: NodeId) -> DomResult<Vec<NodeId>> {
        self.doc_copy_node_list(None, node)
    }

    /// Deep copies of `node` and its following siblings into `doc`
    ///
    /// All or nothing: a failure frees the copies made so far.
    pub fn doc_copy_node_list(&mut self, doc: Option<NodeId>, node: NodeId) -> DomResult<Vec<NodeId>> {
        self.node(node)?;
        let mut copies = Vec::new();
        let mut cur = Some(node);
        while let Some(src) = cur {
            match self.copy_into(src, doc, CopyDepth::DEEP) {
                Ok(Some(copy)) => copies.push(copy),
                Ok(None) => {}
                Err(e) => {
                    for copy in copies {
                        self.free_node(copy);
                    }
                    return Err(e);
                }
            }
            cur = self.next_sibling(src);
        }
        Ok(copies)
    }

    /// Detached copy of an attribute for use on `target`
    ///
    /// The copy belongs to the target's document. Its namespace is the one
    /// in scope at `target` for the same URI, if any.
    pub fn copy_prop(&mut self, target: Option<NodeId>, attr: NodeId) -> DomResult<Option<NodeId>> {
        if self.node(attr)?.kind != NodeKind::Attribute {
            return Ok(None);
        }
        if target.is_some_and(|t| self.kind(t) != Some(NodeKind::Element)) {
            return Ok(None);
        }
        let doc = target.and_then(|t| self.doc(t));
        let copy = self.copy_attr(attr, doc, None)?;
        let href = self.node_ns(attr).and_then(|ns| self.namespace(ns)?.href()).map(str::to_owned);
        let ns = match (target, href) {
            (Some(target), Some(href)) => match self.search_ns_by_href(target, &href) {
                Ok(found) => found,
                Err(e) => {
                    self.free_node(copy);
                    return Err(e);
                }
            },
            _ => None,
        };
        self.node_mut(copy)?.ns = ns;
        Ok(Some(copy))
    }

    /// Copies of `attr` and the attributes after it
    pub fn copy_prop_list(&mut self, target: Option<NodeId>, attr: NodeId) -> DomResult<Vec<NodeId>> {
        let mut copies = Vec::new();
        let mut cur = Some(attr);
        while let Some(src) = cur {
            match self.copy_prop(target, src) {
                Ok(Some(copy)) => copies.push(copy),
                Ok(None) => break,
                Err(e) => {
                    for copy in copies {
                        self.free_node(copy);
                    }
                    return Err(e);
                }
            }
            cur = self.next_sibling(src);
        }
        Ok(copies)
    }

    /// Copy a document; `recursive` also copies its internal subset and
    /// children
    pub fn copy_doc(&mut self, doc: NodeId, recursive: bool) -> DomResult<Option<NodeId>> {
        let node = self.node(doc)?;
        let kind = node.kind;
        let Some(data) = node.doc_data() else { return Ok(None) };
        let (version, encoding, url, int_subset) =
            (data.version.clone(), data.encoding.clone(), data.url.clone(), data.int_subset);
        let copy = match kind {
            NodeKind::HtmlDocument => self.alloc_doc(kind, version.as_deref())?,
            _ => self.new_doc(version.as_deref())?,
        };
        match self.fill_doc_copy(doc, copy, encoding, url, int_subset, recursive) {
            Ok(()) => Ok(Some(copy)),
            Err(e) => {
                self.free_doc(copy);
                Err(e)
            }
        }
    }

    fn fill_doc_copy(
        &mut self,
        doc: NodeId,
        copy: NodeId,
        encoding: Option<String>,
        url: Option<String>,
        int_subset: Option<NodeId>,
        recursive: bool,
    ) -> DomResult<()> {
        let encoding = self.dup_opt(encoding.as_deref())?;
        let url = self.dup_opt(url.as_deref())?;
        if let Some(data) = self.node_mut(copy)?.doc_data_mut() {
            data.encoding = encoding;
            data.url = url;
        }
        if !recursive {
            return Ok(());
        }
        for child in self.children(doc) {
            if self.kind(child) == Some(NodeKind::Dtd) {
                if Some(child) != int_subset {
                    continue;
                }
                let Some(dtd) = self.copy_dtd(child)? else { continue };
                self.link_last_child(copy, dtd);
                self.set_tree_doc(dtd, Some(copy))?;
                if let Some(data) = self.node_mut(copy)?.doc_data_mut() {
                    data.int_subset = Some(dtd);
                }
                continue;
            }
            self.static_copy(child, Some(copy), Some(copy), CopyDepth::DEEP)?;
        }
        self.localize_ns(copy)
    }
}
