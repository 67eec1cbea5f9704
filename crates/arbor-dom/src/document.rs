//! Documents and node constructors

use crate::node::NodeKind;
use crate::{COMMENT_NAME, DomResult, DomTree, NodeId, NsId, TEXT_NAME};

/// Version written by [`DomTree::new_doc`] when none is given
pub const DEFAULT_VERSION: &str = "1.0";

/// Strip the `&` and `;` around an entity reference name
fn reference_name(name: &str) -> &str {
    let name = name.strip_prefix('&').unwrap_or(name);
    name.strip_suffix(';').unwrap_or(name)
}

impl DomTree {
    /// Create an empty document
    pub fn new_doc(&mut self, version: Option<&str>) -> DomResult<NodeId> {
        self.alloc_doc(NodeKind::Document, Some(version.unwrap_or(DEFAULT_VERSION)))
    }

    /// Allocate a document node of either document kind
    pub(crate) fn alloc_doc(&mut self, kind: NodeKind, version: Option<&str>) -> DomResult<NodeId> {
        let version = self.dup_opt(version)?;
        let doc = self.alloc_node(crate::Node::new(kind, None, None))?;
        let node = self.node_mut(doc)?;
        node.doc = Some(doc);
        if let Some(data) = node.doc_data_mut() {
            data.version = version;
        }
        tracing::trace!("new {} {}", kind.as_str(), doc);
        Ok(doc)
    }

    /// First element child of a document
    pub fn doc_get_root_element(&self, doc: Option<NodeId>) -> Option<NodeId> {
        let doc = doc?;
        if !self.kind(doc).is_some_and(NodeKind::is_document) {
            return None;
        }
        self.children(doc).into_iter().find(|c| self.kind(*c) == Some(NodeKind::Element))
    }

    /// Install `root` as the document element, returning the element it
    /// replaced
    ///
    /// `root` is unlinked from wherever it was and moved into `doc`.
    /// Returns `None` without doing anything unless `doc` is a document
    /// and `root` an element.
    pub fn doc_set_root_element(&mut self, doc: Option<NodeId>, root: Option<NodeId>) -> DomResult<Option<NodeId>> {
        let (Some(doc), Some(root)) = (doc, root) else { return Ok(None) };
        if !self.node(doc)?.kind.is_document() || self.node(root)?.kind != NodeKind::Element {
            return Ok(None);
        }
        let old = self.doc_get_root_element(Some(doc));
        if old == Some(root) {
            return Ok(old);
        }
        self.detach(root);
        self.set_tree_doc(root, Some(doc))?;
        match old {
            Some(old) => {
                self.link_before(old, root);
                self.detach(old);
            }
            None => self.link_last_child(doc, root),
        }
        Ok(old)
    }

    /// Internal subset of a document
    pub fn get_int_subset(&self, doc: Option<NodeId>) -> Option<NodeId> {
        let doc = doc?;
        let data = self.get(doc)?.doc_data()?;
        data.int_subset.or_else(|| {
            self.children(doc).into_iter().find(|c| self.kind(*c) == Some(NodeKind::Dtd))
        })
    }

    fn new_dtd_node(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> DomResult<NodeId> {
        let external_id = self.dup_opt(external_id)?;
        let system_id = self.dup_opt(system_id)?;
        let dtd = self.create(NodeKind::Dtd, name, None, doc)?;
        if let Some(data) = self.node_mut(dtd)?.dtd_data_mut() {
            data.external_id = external_id;
            data.system_id = system_id;
        }
        Ok(dtd)
    }

    /// Create the internal subset of `doc` as its first child
    ///
    /// `None` when the document already has one.
    pub fn create_int_subset(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        if let Some(doc) = doc {
            if !self.node(doc)?.kind.is_document() || self.get_int_subset(Some(doc)).is_some() {
                return Ok(None);
            }
        }
        let dtd = self.new_dtd_node(doc, name, external_id, system_id)?;
        if let Some(doc) = doc {
            match self.first_child(doc) {
                Some(first) => self.link_before(first, dtd),
                None => self.link_last_child(doc, dtd),
            }
            if let Some(data) = self.node_mut(doc)?.doc_data_mut() {
                data.int_subset = Some(dtd);
            }
        }
        Ok(Some(dtd))
    }

    /// Create an external subset, installed on `doc` when given
    ///
    /// `None` when the document already has one.
    pub fn new_dtd(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        if let Some(doc) = doc {
            let data = self.node(doc)?.doc_data();
            if data.is_none_or(|d| d.ext_subset.is_some()) {
                return Ok(None);
            }
        }
        let dtd = self.new_dtd_node(doc, name, external_id, system_id)?;
        if let Some(data) = doc.and_then(|d| self.get_mut(d)).and_then(|d| d.doc_data_mut()) {
            data.ext_subset = Some(dtd);
        }
        Ok(Some(dtd))
    }

    fn new_element(&mut self, doc: Option<NodeId>, ns: Option<NsId>, name: &str) -> DomResult<NodeId> {
        let elem = self.create(NodeKind::Element, Some(name), None, doc)?;
        self.node_mut(elem)?.ns = ns;
        Ok(elem)
    }

    /// Create an element without a document
    pub fn new_node(&mut self, ns: Option<NsId>, name: Option<&str>) -> DomResult<Option<NodeId>> {
        match name {
            Some(name) => self.new_element(None, ns, name).map(Some),
            None => Ok(None),
        }
    }

    /// Create an element in `doc` whose content may contain entity
    /// references
    pub fn new_doc_node(
        &mut self,
        doc: Option<NodeId>,
        ns: Option<NsId>,
        name: Option<&str>,
        content: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        let elem = self.new_element(doc, ns, name)?;
        if let Some(content) = content {
            match self.string_get_node_list(doc, content) {
                Ok(list) => {
                    for child in list {
                        self.link_last_child(elem, child);
                    }
                }
                Err(e) => {
                    self.free_node(elem);
                    return Err(e);
                }
            }
        }
        Ok(Some(elem))
    }

    /// Create an element in `doc` with literal text content
    pub fn new_doc_raw_node(
        &mut self,
        doc: Option<NodeId>,
        ns: Option<NsId>,
        name: Option<&str>,
        content: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        let elem = self.new_element(doc, ns, name)?;
        if let Some(content) = content {
            match self.create(NodeKind::Text, Some(TEXT_NAME), Some(content), doc) {
                Ok(text) => self.link_last_child(elem, text),
                Err(e) => {
                    self.free_node(elem);
                    return Err(e);
                }
            }
        }
        Ok(Some(elem))
    }

    /// Create an element and append it to `parent`
    ///
    /// Without `ns` an element parent lends its own namespace. `parent`
    /// must accept elements.
    pub fn new_child(
        &mut self,
        parent: NodeId,
        ns: Option<NsId>,
        name: Option<&str>,
        content: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        self.new_child_with(parent, ns, name, content, false)
    }

    /// Like [`new_child`](Self::new_child) with literal text content
    pub fn new_text_child(
        &mut self,
        parent: NodeId,
        ns: Option<NsId>,
        name: Option<&str>,
        content: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        self.new_child_with(parent, ns, name, content, true)
    }

    fn new_child_with(
        &mut self,
        parent: NodeId,
        ns: Option<NsId>,
        name: Option<&str>,
        content: Option<&str>,
        raw: bool,
    ) -> DomResult<Option<NodeId>> {
        let p = self.node(parent)?;
        if !p.kind.accepts(NodeKind::Element) {
            return Ok(None);
        }
        let ns = match (ns, p.kind) {
            (None, NodeKind::Element) => self.node_ns(parent),
            _ => ns,
        };
        let doc = self.doc(parent);
        let child = if raw {
            self.new_doc_raw_node(doc, ns, name, content)?
        } else {
            self.new_doc_node(doc, ns, name, content)?
        };
        if let Some(child) = child {
            self.link_last_child(parent, child);
        }
        Ok(child)
    }

    /// Create a text node without a document
    pub fn new_text(&mut self, content: Option<&str>) -> DomResult<NodeId> {
        self.new_doc_text(None, content)
    }

    pub fn new_doc_text(&mut self, doc: Option<NodeId>, content: Option<&str>) -> DomResult<NodeId> {
        self.create(NodeKind::Text, Some(TEXT_NAME), content, doc)
    }

    /// Create a processing instruction; a target is required
    pub fn new_doc_pi(&mut self, doc: Option<NodeId>, target: Option<&str>, content: Option<&str>) -> DomResult<Option<NodeId>> {
        match target {
            Some(target) => self.create(NodeKind::Pi, Some(target), content, doc).map(Some),
            None => Ok(None),
        }
    }

    pub fn new_doc_comment(&mut self, doc: Option<NodeId>, content: Option<&str>) -> DomResult<NodeId> {
        self.create(NodeKind::Comment, Some(COMMENT_NAME), content, doc)
    }

    pub fn new_cdata_block(&mut self, doc: Option<NodeId>, content: Option<&str>) -> DomResult<NodeId> {
        self.create(NodeKind::CData, Some("cdata"), content, doc)
    }

    /// Create a character reference node such as `&#38;`
    pub fn new_char_ref(&mut self, doc: Option<NodeId>, name: Option<&str>) -> DomResult<Option<NodeId>> {
        match name {
            Some(name) => self.create(NodeKind::EntityRef, Some(reference_name(name)), None, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Create an entity reference node
    ///
    /// The reference carries the replacement text of the entity when `doc`
    /// declares it.
    pub fn new_reference(&mut self, doc: Option<NodeId>, name: Option<&str>) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        let name = reference_name(name);
        let content = self
            .lookup_doc_entity(doc, name)
            .and_then(|ent| self.get(ent)?.content().map(str::to_owned));
        self.create(NodeKind::EntityRef, Some(name), content.as_deref(), doc).map(Some)
    }

    pub fn new_doc_fragment(&mut self, doc: Option<NodeId>) -> DomResult<NodeId> {
        self.create(NodeKind::DocumentFragment, None, None, doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_doc_owns_itself() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        assert_eq!(tree.doc(doc), Some(doc));
        assert_eq!(tree.get(doc).unwrap().doc_data().unwrap().version.as_deref(), Some(DEFAULT_VERSION));
        tree.free_doc(doc);
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_set_root_element_replaces_old_root() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        let first = tree.new_node(None, Some("a")).unwrap().unwrap();
        let second = tree.new_node(None, Some("b")).unwrap().unwrap();

        assert_eq!(tree.doc_set_root_element(Some(doc), Some(first)).unwrap(), None);
        assert_eq!(tree.doc_get_root_element(Some(doc)), Some(first));
        assert_eq!(tree.doc(first), Some(doc));

        assert_eq!(tree.doc_set_root_element(Some(doc), Some(second)).unwrap(), Some(first));
        assert_eq!(tree.doc_get_root_element(Some(doc)), Some(second));
        assert_eq!(tree.parent(first), None);

        assert_eq!(tree.doc_set_root_element(Some(doc), Some(second)).unwrap(), Some(second));
    }

    #[test]
    fn test_subsets() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        let int = tree.create_int_subset(Some(doc), Some("r"), None, None).unwrap().unwrap();
        assert_eq!(tree.first_child(doc), Some(int));
        assert_eq!(tree.get_int_subset(Some(doc)), Some(int));
        assert_eq!(tree.create_int_subset(Some(doc), Some("r"), None, None).unwrap(), None);

        let ext = tree.new_dtd(Some(doc), Some("r"), None, Some("r.dtd")).unwrap().unwrap();
        assert_eq!(tree.parent(ext), None);
        assert_eq!(tree.get(doc).unwrap().doc_data().unwrap().ext_subset, Some(ext));

        tree.free_doc(doc);
        assert!(!tree.contains(ext));
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_new_child_inherits_namespace() {
        let mut tree = DomTree::new();
        let parent = tree.new_node(None, Some("p")).unwrap().unwrap();
        let ns = tree.new_ns(Some(parent), Some("urn:x"), Some("x")).unwrap().unwrap();
        tree.set_ns(parent, Some(ns)).unwrap();

        let child = tree.new_text_child(parent, None, Some("c"), Some("a&b")).unwrap().unwrap();
        assert_eq!(tree.node_ns(child), Some(ns));
        assert_eq!(tree.get_content(child).unwrap().as_deref(), Some("a&b"));

        let text = tree.new_text(Some("t")).unwrap();
        assert_eq!(tree.new_child(text, None, Some("c"), None).unwrap(), None);
    }

    #[test]
    fn test_reference_names_are_stripped() {
        let mut tree = DomTree::new();
        let r = tree.new_reference(None, Some("&ent;")).unwrap().unwrap();
        assert_eq!(tree.get(r).unwrap().name(), Some("ent"));
        let c = tree.new_char_ref(None, Some("#65")).unwrap().unwrap();
        assert_eq!(tree.get(c).unwrap().name(), Some("#65"));
    }
}
