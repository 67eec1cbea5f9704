//! ID and IDREF tables
//!
//! Each document maps ID values to the attribute carrying them and IDREF
//! values to the attributes referring to them. An attribute's role tells the
//! tree to purge its entries when it is freed or moves to another document.

use crate::alloc::ENTRY_COST;
use crate::node::{AttrRole, AttributeType, NodeKind};
use crate::{DomError, DomResult, DomTree, NodeId};

impl DomTree {
    /// Register `attr` as carrying the ID `value` in `doc`
    ///
    /// Returns `false` when the value is already taken. `doc` must own the
    /// attribute.
    pub fn add_id(&mut self, doc: NodeId, value: &str, attr: NodeId) -> DomResult<bool> {
        let node = self.node(attr)?;
        if node.kind != NodeKind::Attribute {
            return Err(DomError::InvalidNodeType);
        }
        if node.doc != Some(doc) {
            return Err(DomError::WrongDocument);
        }
        let Some(data) = self.node(doc)?.doc_data() else {
            return Err(DomError::InvalidNodeType);
        };
        if data.ids.contains_key(value) {
            return Ok(false);
        }

        self.injector.charge(ENTRY_COST + value.len())?;
        self.drop_id_entries(attr);
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            data.ids.insert(value.to_owned(), attr);
        }
        if let Some(node) = self.get_mut(attr) {
            node.set_attr_role(AttrRole::Id);
        }
        Ok(true)
    }

    /// Register `attr` as an ID in its own document
    pub fn add_id_safe(&mut self, attr: NodeId, value: &str) -> DomResult<bool> {
        let doc = self.node(attr)?.doc.ok_or(DomError::InvalidArgument)?;
        self.add_id(doc, value, attr)
    }

    /// Attribute carrying the ID `value`
    pub fn get_id(&self, doc: NodeId, value: &str) -> Option<NodeId> {
        let data = self.get(doc)?.doc_data()?;
        data.ids.get(value).copied().filter(|a| self.contains(*a))
    }

    /// Declared type of `attr` on `elem` in the document's DTDs
    fn declared_attr_type(&self, doc: NodeId, elem: NodeId, attr: NodeId) -> Option<AttributeType> {
        let data = self.get(doc)?.doc_data()?;
        let key = (self.get(elem)?.name()?.to_owned(), self.get(attr)?.name()?.to_owned());
        [data.int_subset, data.ext_subset]
            .into_iter()
            .flatten()
            .find_map(|dtd| self.get(dtd)?.dtd_data()?.attributes.get(&key).copied())
            .and_then(|decl| Some(self.get(decl)?.attribute_decl()?.atype))
    }

    /// Whether `attr` is an ID: `xml:id`, or declared of type ID
    pub fn is_id(&self, doc: Option<NodeId>, elem: Option<NodeId>, attr: NodeId) -> bool {
        let Some(node) = self.get(attr) else { return false };
        if node.kind != NodeKind::Attribute {
            return false;
        }
        if node.name() == Some("id") {
            let href = self.node_ns(attr).and_then(|ns| self.namespace(ns)).and_then(|d| d.href());
            if href == Some(crate::XML_NAMESPACE) {
                return true;
            }
        }
        match (doc, elem) {
            (Some(doc), Some(elem)) => self.declared_attr_type(doc, elem, attr) == Some(AttributeType::Id),
            _ => false,
        }
    }

    /// Drop the ID registration of `attr`
    pub fn remove_id(&mut self, doc: NodeId, attr: NodeId) -> bool {
        let Some(data) = self.get(doc).and_then(|d| d.doc_data()) else { return false };
        let Some(value) = data.ids.iter().find(|(_, a)| **a == attr).map(|(v, _)| v.clone()) else {
            return false;
        };
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            data.ids.remove(&value);
        }
        if let Some(node) = self.get_mut(attr) {
            if node.attr_role() == AttrRole::Id {
                node.set_attr_role(AttrRole::Plain);
            }
        }
        true
    }

    /// Record that `attr` refers to the ID `value`
    pub fn add_ref(&mut self, doc: NodeId, value: &str, attr: NodeId) -> DomResult<bool> {
        let node = self.node(attr)?;
        if node.kind != NodeKind::Attribute {
            return Err(DomError::InvalidNodeType);
        }
        if node.doc != Some(doc) {
            return Err(DomError::WrongDocument);
        }
        if self.node(doc)?.doc_data().is_none() {
            return Err(DomError::InvalidNodeType);
        }

        self.injector.charge(ENTRY_COST + value.len())?;
        if let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) {
            data.refs.entry(value.to_owned()).or_default().push(attr);
        }
        if let Some(node) = self.get_mut(attr) {
            if node.attr_role() == AttrRole::Plain {
                node.set_attr_role(AttrRole::Ref);
            }
        }
        Ok(true)
    }

    /// Attributes referring to `value`
    pub fn get_refs(&self, doc: NodeId, value: &str) -> Vec<NodeId> {
        self.get(doc)
            .and_then(|d| d.doc_data())
            .and_then(|data| data.refs.get(value))
            .map(|list| list.iter().copied().filter(|a| self.contains(*a)).collect())
            .unwrap_or_default()
    }

    /// Whether `attr` is an IDREF: registered, or declared IDREF(S)
    pub fn is_ref(&self, doc: Option<NodeId>, elem: Option<NodeId>, attr: NodeId) -> bool {
        let Some(node) = self.get(attr) else { return false };
        if node.kind != NodeKind::Attribute {
            return false;
        }
        if node.attr_role() == AttrRole::Ref {
            return true;
        }
        match (doc, elem) {
            (Some(doc), Some(elem)) => matches!(
                self.declared_attr_type(doc, elem, attr),
                Some(AttributeType::IdRef | AttributeType::IdRefs)
            ),
            _ => false,
        }
    }

    /// Drop every IDREF registration of `attr`
    pub fn remove_ref(&mut self, doc: NodeId, attr: NodeId) -> bool {
        let Some(data) = self.get_mut(doc).and_then(|d| d.doc_data_mut()) else { return false };
        let before: usize = data.refs.values().map(Vec::len).sum();
        for list in data.refs.values_mut() {
            list.retain(|a| *a != attr);
        }
        data.refs.retain(|_, list| !list.is_empty());
        let after: usize = data.refs.values().map(Vec::len).sum();
        if before == after {
            return false;
        }
        if let Some(node) = self.get_mut(attr) {
            if node.attr_role() == AttrRole::Ref {
                node.set_attr_role(AttrRole::Plain);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_attr(tree: &mut DomTree) -> (NodeId, NodeId, NodeId) {
        let doc = tree.new_doc(None).unwrap();
        let root = tree.new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        tree.doc_set_root_element(Some(doc), Some(root)).unwrap();
        let attr = tree.new_prop(Some(root), Some("key"), Some("k1")).unwrap().unwrap();
        (doc, root, attr)
    }

    #[test]
    fn test_ids_follow_attribute_lifetime() {
        let mut tree = DomTree::new();
        let (doc, _, attr) = doc_with_attr(&mut tree);

        assert!(tree.add_id(doc, "k1", attr).unwrap());
        assert!(!tree.add_id(doc, "k1", attr).unwrap());
        assert_eq!(tree.get_id(doc, "k1"), Some(attr));

        tree.free_node(attr);
        assert_eq!(tree.get_id(doc, "k1"), None);
        assert!(tree.get(doc).unwrap().doc_data().unwrap().ids.is_empty());
    }

    #[test]
    fn test_ids_move_with_subtree() {
        let mut tree = DomTree::new();
        let (doc, root, attr) = doc_with_attr(&mut tree);
        assert!(tree.add_id(doc, "k1", attr).unwrap());
        let other = tree.new_doc(None).unwrap();

        tree.unlink(root).unwrap();
        tree.set_tree_doc(root, Some(other)).unwrap();
        assert_eq!(tree.doc(attr), Some(other));
        assert_eq!(tree.get_id(doc, "k1"), None);
        assert_eq!(tree.get_id(other, "k1"), Some(attr));
        assert_eq!(tree.get(attr).unwrap().attr_role(), AttrRole::Id);

        tree.free_node(root);
        tree.free_doc(doc);
        tree.free_doc(other);
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_remove_id() {
        let mut tree = DomTree::new();
        let (doc, _, attr) = doc_with_attr(&mut tree);
        tree.add_id_safe(attr, "k1").unwrap();
        assert!(tree.remove_id(doc, attr));
        assert!(!tree.remove_id(doc, attr));
        assert_eq!(tree.get(attr).unwrap().attr_role(), AttrRole::Plain);
    }

    #[test]
    fn test_refs() {
        let mut tree = DomTree::new();
        let (doc, root, attr) = doc_with_attr(&mut tree);
        assert!(tree.add_ref(doc, "k1", attr).unwrap());
        assert_eq!(tree.get_refs(doc, "k1"), vec![attr]);
        assert!(tree.is_ref(Some(doc), Some(root), attr));

        assert!(tree.remove_ref(doc, attr));
        assert!(tree.get_refs(doc, "k1").is_empty());
        assert!(!tree.is_ref(Some(doc), Some(root), attr));
    }

    #[test]
    fn test_xml_id_is_id() {
        let mut tree = DomTree::new();
        let (doc, root, _) = doc_with_attr(&mut tree);
        let attr = tree.set_prop(Some(root), Some("xml:id"), Some("x")).unwrap().unwrap();
        assert!(tree.is_id(Some(doc), Some(root), attr));
    }

    #[test]
    fn test_wrong_document() {
        let mut tree = DomTree::new();
        let (_, _, attr) = doc_with_attr(&mut tree);
        let other = tree.new_doc(None).unwrap();
        assert_eq!(tree.add_id(other, "k1", attr), Err(DomError::WrongDocument));
    }
}
