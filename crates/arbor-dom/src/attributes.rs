//! Attributes
//!
//! Attributes hang off an element's `properties` list and keep their value
//! as a list of text and entity-reference children.

use crate::node::NodeKind;
use crate::{DomError, DomResult, DomTree, NodeId, NsId};

/// Split `prefix:local`; names with an empty side stay unsplit
pub(crate) fn split_qname(name: &str) -> Option<(&str, &str)> {
    let (prefix, local) = name.split_once(':')?;
    if prefix.is_empty() || local.is_empty() {
        return None;
    }
    Some((prefix, local))
}

impl DomTree {
    /// `Some(true)` for an element, `Some(false)` for other kinds
    fn is_element(&self, node: NodeId) -> DomResult<bool> {
        Ok(self.node(node)?.kind == NodeKind::Element)
    }

    /// Create an attribute with a literal text value
    pub fn new_prop(&mut self, elem: Option<NodeId>, name: Option<&str>, value: Option<&str>) -> DomResult<Option<NodeId>> {
        self.new_ns_prop(elem, None, name, value)
    }

    /// Create a namespaced attribute, appended to `elem` when given
    ///
    /// No duplicate check is made.
    pub fn new_ns_prop(
        &mut self,
        elem: Option<NodeId>,
        ns: Option<NsId>,
        name: Option<&str>,
        value: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        if let Some(elem) = elem {
            if !self.is_element(elem)? {
                return Ok(None);
            }
        }
        self.create_prop(elem, ns, name, value).map(Some)
    }

    fn create_prop(&mut self, elem: Option<NodeId>, ns: Option<NsId>, name: &str, value: Option<&str>) -> DomResult<NodeId> {
        let doc = elem.and_then(|e| self.doc(e));
        let attr = self.create(NodeKind::Attribute, Some(name), None, doc)?;
        if let Some(node) = self.get_mut(attr) {
            node.ns = ns;
        }
        if let Err(e) = self.set_attr_text(attr, value) {
            self.free_node(attr);
            return Err(e);
        }
        if let Some(elem) = elem {
            self.link_last_prop(elem, attr);
        }
        Ok(attr)
    }

    /// Create a parentless attribute whose value may contain entity
    /// references
    pub fn new_doc_prop(&mut self, doc: Option<NodeId>, name: Option<&str>, value: Option<&str>) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        let attr = self.create(NodeKind::Attribute, Some(name), None, doc)?;
        if let Some(value) = value {
            match self.string_get_node_list(doc, value) {
                Ok(list) => {
                    for child in list {
                        self.link_last_child(attr, child);
                    }
                }
                Err(e) => {
                    self.free_node(attr);
                    return Err(e);
                }
            }
        }
        Ok(Some(attr))
    }

    /// Replace an attribute's children with a single text node
    ///
    /// The new child is allocated before the old ones are freed, so a
    /// failure leaves the attribute unchanged.
    pub(crate) fn set_attr_text(&mut self, attr: NodeId, value: Option<&str>) -> DomResult<()> {
        let doc = self.doc(attr);
        let text = match value {
            Some(v) => Some(self.create(NodeKind::Text, Some(crate::TEXT_NAME), Some(v), doc)?),
            None => None,
        };
        for child in self.children(attr) {
            self.free_node(child);
        }
        if let Some(text) = text {
            self.link_last_child(attr, text);
        }
        Ok(())
    }

    /// First real attribute matching `name` and namespace URI (`None`
    /// matches attributes without a namespace)
    pub fn find_prop(&self, elem: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        if self.kind(elem) != Some(NodeKind::Element) {
            return None;
        }
        let mut cur = self.properties(elem);
        while let Some(attr) = cur {
            let node = self.get(attr)?;
            if node.name() == Some(name) {
                let attr_href = self.node_ns(attr).and_then(|ns| self.namespace(ns)).map(|d| d.href());
                let matches = match href {
                    None => attr_href.is_none(),
                    Some(h) => attr_href == Some(Some(h)),
                };
                if matches {
                    return Some(attr);
                }
            }
            cur = node.next_sibling;
        }
        None
    }

    /// Declaration supplying a default value for `name` on `elem`
    fn default_attr_decl(&self, elem: NodeId, name: &str) -> Option<NodeId> {
        let node = self.get(elem)?;
        let elem_name = node.name()?;
        let data = self.get(node.doc?)?.doc_data()?;
        let key = (elem_name.to_owned(), name.to_owned());
        [data.int_subset, data.ext_subset]
            .into_iter()
            .flatten()
            .filter_map(|dtd| self.get(dtd)?.dtd_data()?.attributes.get(&key).copied())
            .find(|decl| {
                self.get(*decl)
                    .and_then(|d| d.attribute_decl())
                    .is_some_and(|d| d.default_value.is_some() && d.prefix.is_none())
            })
    }

    /// Attribute named `name` in any namespace, else the DTD declaration
    /// that supplies a default for it
    pub fn has_prop(&self, elem: NodeId, name: &str) -> Option<NodeId> {
        if self.kind(elem) != Some(NodeKind::Element) {
            return None;
        }
        let by_name = self.attributes(elem).into_iter().find(|a| {
            self.get(*a).is_some_and(|n| n.name() == Some(name))
        });
        by_name.or_else(|| self.default_attr_decl(elem, name))
    }

    /// Attribute matching name and namespace URI, else a defaulting
    /// declaration when no namespace was asked for
    pub fn has_ns_prop(&self, elem: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        self.find_prop(elem, name, href).or_else(|| match href {
            None => self.default_attr_decl(elem, name),
            Some(_) => None,
        })
    }

    /// Value of an attribute node or of a declaration's default
    fn prop_value(&mut self, prop: NodeId) -> DomResult<String> {
        let value = match self.node(prop)?.attribute_decl() {
            Some(decl) => decl.default_value.clone().unwrap_or_default(),
            None => self.attr_value(prop),
        };
        self.injector.charge_str(&value)?;
        Ok(value)
    }

    pub fn get_prop(&mut self, elem: NodeId, name: &str) -> DomResult<Option<String>> {
        match self.has_prop(elem, name) {
            Some(prop) => self.prop_value(prop).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_ns_prop(&mut self, elem: NodeId, name: &str, href: Option<&str>) -> DomResult<Option<String>> {
        match self.has_ns_prop(elem, name, href) {
            Some(prop) => self.prop_value(prop).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_no_ns_prop(&mut self, elem: NodeId, name: &str) -> DomResult<Option<String>> {
        self.get_ns_prop(elem, name, None)
    }

    /// Attribute that [`set_prop`](Self::set_prop) would overwrite
    pub fn set_prop_target(&self, elem: NodeId, name: &str) -> Option<NodeId> {
        if let Some((prefix, local)) = split_qname(name) {
            if prefix == "xml" {
                return self.find_prop(elem, local, Some(crate::XML_NAMESPACE));
            }
            let href = self.lookup_prefix(elem, Some(prefix)).and_then(|ns| self.namespace(ns)?.href());
            if let Some(href) = href {
                return self.find_prop(elem, local, Some(href));
            }
        }
        self.find_prop(elem, name, None)
    }

    /// Set or create an attribute; a `prefix:` in the name selects the
    /// namespace bound to that prefix
    pub fn set_prop(&mut self, elem: Option<NodeId>, name: Option<&str>, value: Option<&str>) -> DomResult<Option<NodeId>> {
        let (Some(elem), Some(name)) = (elem, name) else { return Ok(None) };
        if !self.is_element(elem)? {
            return Ok(None);
        }
        if let Some((prefix, local)) = split_qname(name) {
            if let Some(ns) = self.search_ns(elem, Some(prefix))? {
                if self.namespace(ns).is_some_and(|d| d.href().is_some()) {
                    return self.set_ns_prop(Some(elem), Some(ns), Some(local), value);
                }
            }
        }
        self.set_ns_prop(Some(elem), None, Some(name), value)
    }

    /// Set or create a namespaced attribute
    ///
    /// Without an element a parentless attribute is created. An existing
    /// attribute keeps its identity; its children are replaced.
    pub fn set_ns_prop(
        &mut self,
        elem: Option<NodeId>,
        ns: Option<NsId>,
        name: Option<&str>,
        value: Option<&str>,
    ) -> DomResult<Option<NodeId>> {
        let Some(name) = name else { return Ok(None) };
        let href = match ns {
            Some(ns) => match self.namespace(ns).and_then(|d| d.href()) {
                Some(href) => Some(href.to_owned()),
                None => return Ok(None),
            },
            None => None,
        };
        let Some(elem) = elem else {
            return self.create_prop(None, ns, name, value).map(Some);
        };
        if !self.is_element(elem)? {
            return Ok(None);
        }
        let Some(prop) = self.find_prop(elem, name, href.as_deref()) else {
            return self.create_prop(Some(elem), ns, name, value).map(Some);
        };
        let role = self.node(prop)?.attr_role();
        self.drop_id_entries(prop);
        self.set_attr_text(prop, value)?;
        if let Some(node) = self.get_mut(prop) {
            node.ns = ns;
        }
        if role == crate::AttrRole::Id {
            if let Some(node) = self.get_mut(prop) {
                node.set_attr_role(crate::AttrRole::Plain);
            }
            if let Some(doc) = self.doc(prop) {
                let value = self.attr_value(prop);
                self.add_id(doc, &value, prop)?;
            }
        }
        Ok(Some(prop))
    }

    /// Unlink and free an attribute that sits on an element
    pub fn remove_prop(&mut self, attr: NodeId) -> DomResult<()> {
        let node = self.node(attr)?;
        if node.kind != NodeKind::Attribute {
            return Err(DomError::InvalidNodeType);
        }
        if node.parent.is_none() {
            return Err(DomError::InvalidArgument);
        }
        self.free_node(attr);
        Ok(())
    }

    /// Remove the attribute `name` that has no namespace
    pub fn unset_prop(&mut self, elem: NodeId, name: &str) -> DomResult<bool> {
        self.unset_ns_prop(elem, None, name)
    }

    /// Remove the attribute `name` in the namespace of `ns`
    pub fn unset_ns_prop(&mut self, elem: NodeId, ns: Option<NsId>, name: &str) -> DomResult<bool> {
        self.node(elem)?;
        let href = ns.and_then(|ns| self.namespace(ns)?.href()).map(str::to_owned);
        match self.find_prop(elem, name, href.as_deref()) {
            Some(prop) => {
                self.free_node(prop);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tree: &mut DomTree) -> NodeId {
        tree.create(NodeKind::Element, Some("e"), None, None).unwrap()
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("a:b"), Some(("a", "b")));
        assert_eq!(split_qname(":b"), None);
        assert_eq!(split_qname("ab"), None);
    }

    #[test]
    fn test_new_and_get_prop() {
        let mut tree = DomTree::new();
        let e = element(&mut tree);
        let attr = tree.new_prop(Some(e), Some("a"), Some("1")).unwrap().unwrap();

        assert_eq!(tree.parent(attr), Some(e));
        assert_eq!(tree.has_prop(e, "a"), Some(attr));
        assert_eq!(tree.get_prop(e, "a").unwrap().as_deref(), Some("1"));
        assert_eq!(tree.get_prop(e, "b").unwrap(), None);
    }

    #[test]
    fn test_set_prop_reuses_attribute() {
        let mut tree = DomTree::new();
        let e = element(&mut tree);
        let first = tree.set_prop(Some(e), Some("a"), Some("1")).unwrap().unwrap();
        let old_text = tree.first_child(first).unwrap();

        assert_eq!(tree.set_prop_target(e, "a"), Some(first));
        let second = tree.set_prop(Some(e), Some("a"), Some("2")).unwrap().unwrap();
        assert_eq!(first, second);
        assert!(!tree.contains(old_text));
        assert_eq!(tree.get_prop(e, "a").unwrap().as_deref(), Some("2"));
        assert_eq!(tree.attributes(e).len(), 1);
    }

    #[test]
    fn test_set_prop_on_non_element() {
        let mut tree = DomTree::new();
        let text = tree.create(NodeKind::Text, Some(crate::TEXT_NAME), Some("t"), None).unwrap();
        assert_eq!(tree.set_prop(Some(text), Some("a"), Some("1")).unwrap(), None);
    }

    #[test]
    fn test_unset_and_remove() {
        let mut tree = DomTree::new();
        let e = element(&mut tree);
        let a = tree.new_prop(Some(e), Some("a"), Some("1")).unwrap().unwrap();
        let b = tree.new_prop(Some(e), Some("b"), None).unwrap().unwrap();

        assert!(tree.unset_prop(e, "a").unwrap());
        assert!(!tree.contains(a));
        assert!(!tree.unset_prop(e, "a").unwrap());

        tree.remove_prop(b).unwrap();
        assert_eq!(tree.properties(e), None);
        assert_eq!(tree.live_nodes(), 1);
    }

    #[test]
    fn test_oom_leaves_no_partial_attribute() {
        let mut tree = DomTree::new();
        let e = element(&mut tree);
        tree.injector_mut().set_limit(crate::alloc::NODE_COST + 4);

        let result = tree.new_prop(Some(e), Some("a"), Some("value"));
        assert_eq!(result, Err(DomError::OutOfMemory));
        assert!(tree.injector().failed());
        assert_eq!(tree.properties(e), None);
        assert_eq!(tree.live_nodes(), 1);
    }
}
