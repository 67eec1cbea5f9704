//! Validation
//!
//! Checks documents and subtrees against the declarations of their DTDs,
//! plus the lexical checks for names and name tokens.

use crate::alloc::ENTRY_COST;
use crate::node::{AttributeDefault, AttributeType, ElementContent, NodeKind};
use crate::{DomResult, DomTree, NodeId};

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_numeric() || matches!(c, '-' | '.' | '\u{B7}')
}

/// An XML `Name`
pub fn validate_name_value(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// Space-separated `Name`s
pub fn validate_names_value(value: &str) -> bool {
    !value.is_empty() && value.split(' ').all(validate_name_value)
}

/// An XML `Nmtoken`
pub fn validate_nmtoken_value(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_name_char)
}

/// Space-separated `Nmtoken`s; surrounding blanks are allowed
pub fn validate_nmtokens_value(value: &str) -> bool {
    let trimmed = value.trim_matches(' ');
    !trimmed.is_empty() && trimmed.split(' ').all(validate_nmtoken_value)
}

/// Lexical check of `value` against a declared attribute type
pub fn validate_attribute_value(atype: i32, value: &str) -> bool {
    match AttributeType::from_int(atype) {
        Some(AttributeType::Cdata) => true,
        Some(AttributeType::Id | AttributeType::IdRef | AttributeType::Entity | AttributeType::Notation) => {
            validate_name_value(value)
        }
        Some(AttributeType::IdRefs | AttributeType::Entities) => validate_names_value(value),
        Some(AttributeType::Nmtoken | AttributeType::Enumeration) => validate_nmtoken_value(value),
        Some(AttributeType::Nmtokens) => validate_nmtokens_value(value),
        None => false,
    }
}

/// Collapse runs of spaces and strip them at both ends
fn collapse_spaces(value: &str) -> String {
    value.split(' ').filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

impl DomTree {
    /// Subsets of `doc`, internal first
    fn doc_dtds(&self, doc: NodeId) -> Vec<NodeId> {
        self.get(doc)
            .and_then(|d| d.doc_data())
            .map(|data| [data.int_subset, data.ext_subset].into_iter().flatten().collect())
            .unwrap_or_default()
    }

    fn attr_decl_in(&self, dtds: &[NodeId], element: &str, name: &str) -> Option<NodeId> {
        dtds.iter().find_map(|dtd| self.get_dtd_attr_desc(*dtd, element, name))
    }

    /// Whether `name` is a declared notation
    pub fn validate_notation_use(&self, doc: NodeId, name: &str) -> bool {
        self.doc_dtds(doc)
            .into_iter()
            .any(|dtd| self.get_dtd_notation_desc(dtd, name).is_some())
    }

    /// Check an element declaration's name
    pub fn validate_element_decl(&mut self, decl: NodeId) -> DomResult<bool> {
        self.injector.charge(ENTRY_COST)?;
        let Some(node) = self.get(decl) else { return Ok(false) };
        let prefix_ok = node
            .element_decl()
            .is_none_or(|d| d.prefix.as_deref().is_none_or(validate_name_value));
        Ok(node.kind == NodeKind::ElementDecl && node.name().is_some_and(validate_name_value) && prefix_ok)
    }

    /// Check an attribute declaration: its default fits the type and an
    /// element declares at most one ID attribute
    pub fn validate_attribute_decl(&mut self, decl: NodeId) -> DomResult<bool> {
        self.injector.charge(ENTRY_COST)?;
        let Some(node) = self.get(decl) else { return Ok(false) };
        let Some(data) = node.attribute_decl() else { return Ok(false) };
        if let Some(value) = &data.default_value {
            if !validate_attribute_value(data.atype as i32, value) {
                return Ok(false);
            }
        }
        if data.atype != AttributeType::Id {
            return Ok(true);
        }
        if !matches!(data.default, AttributeDefault::Implied | AttributeDefault::Required) {
            return Ok(false);
        }
        let Some(dtd) = node.parent else { return Ok(true) };
        let element = data.element.clone();
        let ids = self
            .children(dtd)
            .into_iter()
            .filter_map(|d| self.get(d)?.attribute_decl())
            .filter(|d| d.element == element && d.atype == AttributeType::Id)
            .count();
        Ok(ids <= 1)
    }

    /// Validate one element's content and attributes against `dtds`
    fn validate_one_element(&self, dtds: &[NodeId], elem: NodeId) -> bool {
        let Some(node) = self.get(elem) else { return false };
        let Some(name) = node.name() else { return false };
        let qname = match self.node_ns(elem).and_then(|ns| self.namespace(ns)).and_then(|d| d.prefix()) {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_owned(),
        };
        let Some(decl) = dtds.iter().find_map(|dtd| self.get_dtd_element_desc(*dtd, &qname)) else {
            tracing::trace!("no declaration for element {}", qname);
            return false;
        };
        let content = self.get(decl).and_then(|d| d.element_decl()).map(|d| d.content);

        let children = self.children(elem);
        let content_ok = match content {
            Some(ElementContent::Empty) => children.is_empty(),
            Some(ElementContent::Element) => children.iter().all(|c| match self.get(*c) {
                Some(n) if n.kind == NodeKind::Text => self.is_blank_node(*c),
                Some(n) => !matches!(n.kind, NodeKind::CData | NodeKind::EntityRef),
                None => false,
            }),
            Some(ElementContent::Mixed | ElementContent::Any) => true,
            None => false,
        };
        if !content_ok {
            return false;
        }

        for attr in self.attributes(elem) {
            let Some(attr_name) = self.get(attr).and_then(|a| a.name()) else { return false };
            let Some(attr_decl) = self.attr_decl_in(dtds, &qname, attr_name) else {
                tracing::trace!("no declaration for attribute {} of {}", attr_name, qname);
                return false;
            };
            let Some(data) = self.get(attr_decl).and_then(|d| d.attribute_decl()) else { return false };
            let value = self.attr_value(attr);
            if !validate_attribute_value(data.atype as i32, &value) {
                return false;
            }
            if data.default == AttributeDefault::Fixed && data.default_value.as_deref() != Some(value.as_str()) {
                return false;
            }
        }

        // Required attributes must be present
        dtds.iter()
            .filter_map(|dtd| self.get(*dtd)?.dtd_data())
            .flat_map(|data| data.attributes.iter())
            .filter(|((element, _), _)| *element == qname)
            .filter_map(|(_, decl)| Some((self.get(*decl)?.name()?, self.get(*decl)?.attribute_decl()?)))
            .filter(|(_, data)| data.default == AttributeDefault::Required)
            .all(|(attr_name, _)| self.has_prop(elem, attr_name).is_some_and(|a| self.kind(a) == Some(NodeKind::Attribute)))
    }

    fn validate_subtree(&self, dtds: &[NodeId], root: NodeId) -> bool {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.kind(id) == Some(NodeKind::Element) && !self.validate_one_element(dtds, id) {
                return false;
            }
            stack.extend(self.children(id));
        }
        true
    }

    /// Validate the subtree under `elem` against its document's DTDs
    pub fn validate_element(&mut self, doc: NodeId, elem: NodeId) -> DomResult<bool> {
        self.injector.charge(ENTRY_COST)?;
        let dtds = self.doc_dtds(doc);
        if dtds.is_empty() {
            return Ok(false);
        }
        Ok(self.validate_subtree(&dtds, elem))
    }

    /// Validate a whole document: root name, every element, and every
    /// IDREF pointing at a known ID
    pub fn validate_document(&mut self, doc: NodeId) -> DomResult<bool> {
        self.injector.charge(ENTRY_COST)?;
        let dtds = self.doc_dtds(doc);
        let Some(root) = self.doc_get_root_element(Some(doc)) else { return Ok(false) };
        if dtds.is_empty() {
            return Ok(false);
        }
        let declared_root = self.get_int_subset(Some(doc)).and_then(|d| self.get(d)?.name());
        if declared_root.is_some_and(|n| self.get(root).and_then(|r| r.name()) != Some(n)) {
            return Ok(false);
        }
        if !self.validate_subtree(&dtds, root) {
            return Ok(false);
        }
        let Some(data) = self.get(doc).and_then(|d| d.doc_data()) else { return Ok(false) };
        Ok(data.refs.keys().all(|value| {
            value.split(' ').all(|id| data.ids.get(id).is_some_and(|a| self.contains(*a)))
        }))
    }

    /// Validate the document's root subtree against `dtd` alone
    pub fn validate_dtd(&mut self, doc: NodeId, dtd: NodeId) -> DomResult<bool> {
        self.injector.charge(ENTRY_COST)?;
        if self.kind(dtd) != Some(NodeKind::Dtd) {
            return Ok(false);
        }
        let Some(root) = self.doc_get_root_element(Some(doc)) else { return Ok(false) };
        Ok(self.validate_subtree(&[dtd], root))
    }

    /// Normalized value of attribute `name` on `elem` for a declared non
    /// CDATA type; `None` when no normalization applies
    pub fn normalize_attribute_value(
        &mut self,
        doc: NodeId,
        elem: NodeId,
        name: &str,
        value: &str,
    ) -> DomResult<Option<String>> {
        let Some(elem_name) = self.get(elem).filter(|e| e.is_element()).and_then(|e| e.name()) else {
            return Ok(None);
        };
        let dtds = self.doc_dtds(doc);
        let atype = self
            .attr_decl_in(&dtds, elem_name, name)
            .and_then(|d| self.get(d)?.attribute_decl())
            .map(|d| d.atype);
        match atype {
            Some(atype) if atype != AttributeType::Cdata => {
                let normalized = collapse_spaces(value);
                self.injector.charge_str(&normalized)?;
                Ok(Some(normalized))
            }
            _ => Ok(None),
        }
    }

    /// Element names a declaration allows as children, up to `max`
    pub fn get_potential_children(&mut self, decl: NodeId, max: usize) -> DomResult<Vec<String>> {
        let Some(node) = self.get(decl) else { return Ok(Vec::new()) };
        let Some(data) = node.element_decl() else { return Ok(Vec::new()) };
        if data.content == ElementContent::Empty {
            return Ok(Vec::new());
        }
        let Some(dtd) = node.parent else { return Ok(Vec::new()) };
        let names: Vec<String> = self
            .get(dtd)
            .and_then(|d| d.dtd_data())
            .map(|d| d.elements.keys().take(max).cloned().collect())
            .unwrap_or_default();
        for name in &names {
            self.injector.charge_str(name)?;
        }
        Ok(names)
    }

    /// Element names that could be inserted between `prev` and `next`
    pub fn get_valid_elements(&mut self, prev: Option<NodeId>, next: Option<NodeId>, max: usize) -> DomResult<Vec<String>> {
        let Some(parent) = prev.or(next).and_then(|n| self.parent(n)) else { return Ok(Vec::new()) };
        if next.is_some_and(|n| self.parent(n) != Some(parent)) {
            return Ok(Vec::new());
        }
        let Some(doc) = self.doc(parent) else { return Ok(Vec::new()) };
        let Some(name) = self.get(parent).filter(|p| p.is_element()).and_then(|p| p.name()) else {
            return Ok(Vec::new());
        };
        match self.doc_element_decl(doc, name) {
            Some(decl) => self.get_potential_children(decl, max),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::AttributeDeclSpec;

    #[test]
    fn test_lexical_checks() {
        assert!(validate_name_value("a:b-1"));
        assert!(!validate_name_value("1a"));
        assert!(!validate_name_value(""));
        assert!(validate_names_value("a b"));
        assert!(!validate_names_value("a  b"));
        assert!(validate_nmtoken_value("1a"));
        assert!(validate_nmtokens_value(" 1 2 "));
        assert!(validate_attribute_value(AttributeType::Cdata as i32, "any thing"));
        assert!(!validate_attribute_value(AttributeType::Id as i32, "a b"));
        assert!(!validate_attribute_value(42, "a"));
    }

    fn valid_doc(tree: &mut DomTree) -> (NodeId, NodeId, NodeId) {
        let doc = tree.new_doc(None).unwrap();
        let dtd = tree.create_int_subset(Some(doc), Some("r"), None, None).unwrap().unwrap();
        tree.add_element_decl(Some(dtd), Some("r"), ElementContent::Element as i32).unwrap();
        tree.add_element_decl(Some(dtd), Some("c"), ElementContent::Empty as i32).unwrap();
        let spec = AttributeDeclSpec {
            element: Some("r"),
            name: Some("k"),
            atype: AttributeType::Nmtoken as i32,
            default: AttributeDefault::Required as i32,
            ..Default::default()
        };
        tree.add_attribute_decl(Some(dtd), spec).unwrap();
        let root = tree.new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        tree.doc_set_root_element(Some(doc), Some(root)).unwrap();
        tree.new_child(root, None, Some("c"), None).unwrap();
        (doc, dtd, root)
    }

    #[test]
    fn test_validate_document() {
        let mut tree = DomTree::new();
        let (doc, _, root) = valid_doc(&mut tree);
        assert!(!tree.validate_document(doc).unwrap());

        tree.set_prop(Some(root), Some("k"), Some("tok")).unwrap();
        assert!(tree.validate_document(doc).unwrap());

        tree.new_text_child(root, None, Some("c"), Some("x")).unwrap();
        assert!(!tree.validate_document(doc).unwrap());
    }

    #[test]
    fn test_validate_without_dtd() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        assert!(!tree.validate_document(doc).unwrap());
    }

    #[test]
    fn test_normalize() {
        let mut tree = DomTree::new();
        let (doc, _, root) = valid_doc(&mut tree);
        assert_eq!(
            tree.normalize_attribute_value(doc, root, "k", "  a   b ").unwrap().as_deref(),
            Some("a b")
        );
        assert_eq!(tree.normalize_attribute_value(doc, root, "other", " a ").unwrap(), None);
    }

    #[test]
    fn test_valid_elements() {
        let mut tree = DomTree::new();
        let (_, _, root) = valid_doc(&mut tree);
        let child = tree.first_child(root).unwrap();
        let names = tree.get_valid_elements(Some(child), None, 10).unwrap();
        assert_eq!(names, vec!["c".to_owned(), "r".to_owned()]);
    }
}
