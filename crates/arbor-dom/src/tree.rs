//! DOM Tree (arena-based allocation)
//!
//! Owns every node and namespace of a run together with the allocation
//! failure injector that all allocating operations charge.

use crate::alloc::{ENTRY_COST, FailureInjector, NODE_COST};
use crate::arena::GenArena;
use crate::namespace::Namespace;
use crate::node::{AttrRole, Node, NodeExtra, NodeKind};
use crate::{DomError, DomResult, NodeId, NsId};

/// Arena-based node universe
#[derive(Debug)]
pub struct DomTree {
    pub(crate) nodes: GenArena<Node>,
    pub(crate) namespaces: GenArena<Namespace>,
    pub(crate) injector: FailureInjector,
    /// Permanent entity declarations (`lt`, `gt`, `amp`, `apos`, `quot`)
    pub(crate) predefined: Vec<NodeId>,
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: GenArena::new(),
            namespaces: GenArena::new(),
            injector: FailureInjector::new(),
            predefined: Vec::new(),
        };
        tree.install_predefined_entities();
        tree
    }

    pub fn injector(&self) -> &FailureInjector {
        &self.injector
    }

    pub fn injector_mut(&mut self) -> &mut FailureInjector {
        &mut self.injector
    }

    /// Get a node by ID
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomError::NotFound)
    }

    /// Whether the handle resolves to a live node
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(|n| n.kind)
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    #[inline]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child)
    }

    #[inline]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.last_child)
    }

    #[inline]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    #[inline]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// First attribute of an element
    #[inline]
    pub fn properties(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.properties)
    }

    /// Owning document (a document owns itself)
    #[inline]
    pub fn doc(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.doc)
    }

    /// Child list in document order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.first_child(id);
        while let Some(child) = cur {
            out.push(child);
            cur = self.next_sibling(child);
        }
        out
    }

    /// Attribute list in document order
    pub fn attributes(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.properties(id);
        while let Some(attr) = cur {
            out.push(attr);
            cur = self.next_sibling(attr);
        }
        out
    }

    /// Root reached by walking parent links
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        let mut root = id;
        while let Some(parent) = self.parent(root) {
            root = parent;
        }
        root
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    /// Live nodes, not counting the permanent predefined entities
    pub fn live_nodes(&self) -> usize {
        self.nodes.len() - self.predefined.len()
    }

    pub fn live_namespaces(&self) -> usize {
        self.namespaces.len()
    }

    /// Whether the node is one of the permanent predefined entities
    #[inline]
    pub fn is_predefined(&self, id: NodeId) -> bool {
        self.predefined.contains(&id)
    }

    /// Insert a node after charging for it
    pub(crate) fn alloc_node(&mut self, node: Node) -> DomResult<NodeId> {
        self.injector.charge(NODE_COST)?;
        Ok(NodeId(self.nodes.insert(node)))
    }

    /// Allocate a node with copied name and content
    pub(crate) fn create(
        &mut self,
        kind: NodeKind,
        name: Option<&str>,
        content: Option<&str>,
        doc: Option<NodeId>,
    ) -> DomResult<NodeId> {
        let name = self.dup_opt(name)?;
        let content = self.dup_opt(content)?;
        let mut node = Node::new(kind, name, content);
        node.doc = doc;
        self.alloc_node(node)
    }

    /// Copy a string, charging the injector
    pub(crate) fn dup(&mut self, s: &str) -> DomResult<String> {
        self.injector.charge_str(s)?;
        Ok(s.to_owned())
    }

    pub(crate) fn dup_opt(&mut self, s: Option<&str>) -> DomResult<Option<String>> {
        s.map(|s| self.dup(s)).transpose()
    }

    // ---- raw linking ----

    /// Detach a node from its parent and siblings
    ///
    /// A DTD installed as its document's internal subset stops being
    /// installed.
    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let (kind, parent, prev, next) = (node.kind, node.parent, node.prev_sibling, node.next_sibling);

        if kind == NodeKind::Dtd {
            self.uninstall_subset(id);
        }

        match prev {
            Some(p) => {
                if let Some(n) = self.get_mut(p) {
                    n.next_sibling = next;
                }
            }
            None => {
                if let Some(n) = parent.and_then(|p| self.get_mut(p)) {
                    if kind == NodeKind::Attribute {
                        n.properties = next;
                    } else {
                        n.first_child = next;
                    }
                }
            }
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.get_mut(nx) {
                    n.prev_sibling = prev;
                }
            }
            None => {
                if kind != NodeKind::Attribute {
                    if let Some(n) = parent.and_then(|p| self.get_mut(p)) {
                        n.last_child = prev;
                    }
                }
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
    }

    /// Clear the document's subset pointers that refer to `dtd`
    fn uninstall_subset(&mut self, dtd: NodeId) {
        let Some(doc) = self.doc(dtd) else { return };
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            if data.int_subset == Some(dtd) {
                data.int_subset = None;
            }
            if data.ext_subset == Some(dtd) {
                data.ext_subset = None;
            }
        }
    }

    /// Append an unlinked node to the child list
    pub(crate) fn link_last_child(&mut self, parent: NodeId, child: NodeId) {
        let last = self.last_child(parent);
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
            c.prev_sibling = last;
            c.next_sibling = None;
        }
        match last {
            Some(l) => {
                if let Some(n) = self.get_mut(l) {
                    n.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.first_child = Some(child);
                }
            }
        }
        if let Some(p) = self.get_mut(parent) {
            p.last_child = Some(child);
        }
    }

    /// Insert an unlinked node after `prev` (child or attribute list)
    pub(crate) fn link_after(&mut self, prev: NodeId, child: NodeId) {
        let parent = self.parent(prev);
        let next = self.next_sibling(prev);
        if let Some(c) = self.get_mut(child) {
            c.parent = parent;
            c.prev_sibling = Some(prev);
            c.next_sibling = next;
        }
        if let Some(p) = self.get_mut(prev) {
            p.next_sibling = Some(child);
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.get_mut(nx) {
                    n.prev_sibling = Some(child);
                }
            }
            None => {
                if self.kind(child) != Some(NodeKind::Attribute) {
                    if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                        p.last_child = Some(child);
                    }
                }
            }
        }
    }

    /// Insert an unlinked node before `next` (child or attribute list)
    pub(crate) fn link_before(&mut self, next: NodeId, child: NodeId) {
        let parent = self.parent(next);
        let prev = self.prev_sibling(next);
        let is_attr = self.kind(child) == Some(NodeKind::Attribute);
        if let Some(c) = self.get_mut(child) {
            c.parent = parent;
            c.prev_sibling = prev;
            c.next_sibling = Some(next);
        }
        if let Some(n) = self.get_mut(next) {
            n.prev_sibling = Some(child);
        }
        match prev {
            Some(pv) => {
                if let Some(p) = self.get_mut(pv) {
                    p.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                    if is_attr {
                        p.properties = Some(child);
                    } else {
                        p.first_child = Some(child);
                    }
                }
            }
        }
    }

    /// Append an unlinked attribute to an element's attribute list
    pub(crate) fn link_last_prop(&mut self, elem: NodeId, attr: NodeId) {
        match self.attributes(elem).last() {
            Some(&last) => self.link_after(last, attr),
            None => {
                if let Some(a) = self.get_mut(attr) {
                    a.parent = Some(elem);
                    a.prev_sibling = None;
                    a.next_sibling = None;
                }
                if let Some(e) = self.get_mut(elem) {
                    e.properties = Some(attr);
                }
            }
        }
    }

    /// Prepend an unlinked attribute without looking for duplicates
    pub fn prepend_prop(&mut self, elem: NodeId, attr: NodeId) -> DomResult<()> {
        if self.node(elem)?.kind != NodeKind::Element || self.node(attr)?.kind != NodeKind::Attribute {
            return Err(DomError::InvalidNodeType);
        }
        self.detach(attr);
        match self.properties(elem) {
            Some(first) => self.link_before(first, attr),
            None => {
                if let Some(a) = self.get_mut(attr) {
                    a.parent = Some(elem);
                }
                if let Some(e) = self.get_mut(elem) {
                    e.properties = Some(attr);
                }
            }
        }
        Ok(())
    }

    // ---- freeing ----

    /// Every node owned by `root`: itself, descendants, attributes and,
    /// for documents, the external subset
    pub(crate) fn owned_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(id);
            let mut cur = node.properties;
            while let Some(attr) = cur {
                stack.push(attr);
                cur = self.next_sibling(attr);
            }
            let mut cur = node.last_child;
            while let Some(child) = cur {
                stack.push(child);
                cur = self.prev_sibling(child);
            }
            if let Some(data) = node.doc_data() {
                for subset in [data.int_subset, data.ext_subset].into_iter().flatten() {
                    if self.parent(subset) != Some(id) {
                        stack.push(subset);
                    }
                }
            }
        }
        out
    }

    /// Free a node and everything it owns, unlinking it first
    ///
    /// Predefined entities and dead handles are ignored.
    pub fn free_node(&mut self, id: NodeId) {
        if !self.contains(id) || self.is_predefined(id) {
            return;
        }
        self.detach(id);
        let doomed = self.owned_nodes(id);
        for &n in &doomed {
            self.drop_id_entries(n);
        }
        for n in &doomed {
            if let Some(kind) = self.kind(*n) {
                if kind == NodeKind::Dtd {
                    self.uninstall_subset(*n);
                }
            }
        }
        tracing::trace!("freeing {} nodes under {}", doomed.len(), id);
        for n in doomed {
            let Some(node) = self.nodes.remove(n.0) else { continue };
            for ns in node.ns_def {
                self.namespaces.remove(ns.0);
            }
            if let NodeExtra::Document(data) = node.extra {
                if let Some(ns) = data.xml_ns {
                    self.namespaces.remove(ns.0);
                }
            }
        }
    }

    /// Free a document together with all of its subtrees
    #[inline]
    pub fn free_doc(&mut self, doc: NodeId) {
        self.free_node(doc);
    }

    /// Remove ID/IDREF table entries pointing at an attribute
    pub(crate) fn drop_id_entries(&mut self, attr: NodeId) {
        let Some(node) = self.get(attr) else { return };
        let role = node.attr_role();
        if role == AttrRole::Plain {
            return;
        }
        let Some(doc) = node.doc else { return };
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            data.ids.retain(|_, v| *v != attr);
            for list in data.refs.values_mut() {
                list.retain(|v| *v != attr);
            }
            data.refs.retain(|_, list| !list.is_empty());
        }
    }

    /// Set the owning document of a whole subtree
    ///
    /// ID and IDREF registrations follow their attributes into the new
    /// document. A registration that cannot be allocated is dropped and the
    /// failure reported after the subtree has been moved.
    pub fn set_tree_doc(&mut self, root: NodeId, doc: Option<NodeId>) -> DomResult<()> {
        let kind = self.node(root)?.kind;
        if kind.is_document() || self.is_predefined(root) {
            return Ok(());
        }
        let nodes = self.owned_nodes(root);
        let mut moved = Vec::new();
        for &n in &nodes {
            let Some(node) = self.get(n) else { continue };
            if node.doc == doc {
                continue;
            }
            let role = node.attr_role();
            if role != AttrRole::Plain {
                self.drop_id_entries(n);
                moved.push((n, role));
            }
            if let Some(node) = self.get_mut(n) {
                node.doc = doc;
            }
        }

        let mut result = Ok(());
        for (attr, role) in moved {
            let registered = match doc {
                Some(doc) => self.register_role(doc, attr, role),
                None => Ok(false),
            };
            match registered {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(a) = self.get_mut(attr) {
                        a.set_attr_role(AttrRole::Plain);
                    }
                }
                Err(e) => {
                    if let Some(a) = self.get_mut(attr) {
                        a.set_attr_role(AttrRole::Plain);
                    }
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Re-register an attribute in a document's ID or IDREF table
    fn register_role(&mut self, doc: NodeId, attr: NodeId, role: AttrRole) -> DomResult<bool> {
        let value = self.attr_value(attr);
        let taken = match self.node(doc)?.doc_data() {
            Some(data) => role == AttrRole::Id && data.ids.contains_key(&value),
            None => return Ok(false),
        };
        if taken {
            return Ok(false);
        }
        self.injector.charge(ENTRY_COST + value.len())?;
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            match role {
                AttrRole::Id => {
                    data.ids.insert(value, attr);
                }
                AttrRole::Ref => data.refs.entry(value).or_default().push(attr),
                AttrRole::Plain => {}
            }
        }
        Ok(true)
    }

    /// Concatenated text of an attribute's children (no allocation charge)
    pub(crate) fn attr_value(&self, attr: NodeId) -> String {
        let mut out = String::new();
        let mut cur = self.first_child(attr);
        while let Some(child) = cur {
            if let Some(node) = self.get(child) {
                match node.kind {
                    NodeKind::EntityRef => {
                        out.push('&');
                        out.push_str(node.name().unwrap_or_default());
                        out.push(';');
                    }
                    _ => out.push_str(node.content().unwrap_or_default()),
                }
            }
            cur = self.next_sibling(child);
        }
        out
    }

    /// Look up a namespace
    #[inline]
    pub fn namespace(&self, ns: NsId) -> Option<&Namespace> {
        self.namespaces.get(ns.0)
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
