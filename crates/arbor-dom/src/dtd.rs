//! DTD declarations
//!
//! Element and attribute declarations are children of their DTD and are
//! indexed by qualified name. Notations are table entries only.

use crate::alloc::ENTRY_COST;
use crate::attributes::split_qname;
use crate::node::{
    AttributeDeclData, AttributeDefault, AttributeType, ElementContent, ElementDeclData, NodeExtra, NodeKind,
    Notation,
};
use crate::valid::{validate_name_value, validate_nmtoken_value, validate_nmtokens_value, validate_names_value};
use crate::{DomResult, DomTree, NodeId};

/// Attribute declaration fields
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeDeclSpec<'a> {
    pub element: Option<&'a str>,
    pub name: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub atype: i32,
    pub default: i32,
    pub default_value: Option<&'a str>,
}

/// `prefix:name`, or `name` alone
fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, name),
        None => name.to_owned(),
    }
}

/// Bytes charged for copying a declaration payload
fn payload_cost(extra: &NodeExtra) -> usize {
    let len = |s: &Option<String>| s.as_ref().map_or(0, |s| s.len() + 1);
    match extra {
        NodeExtra::ElementDecl(d) => len(&d.prefix),
        NodeExtra::AttributeDecl(d) => d.element.len() + 1 + len(&d.prefix) + len(&d.default_value),
        NodeExtra::Entity(d) => len(&d.external_id) + len(&d.system_id),
        _ => 0,
    }
}

fn clone_decl_payload(extra: &NodeExtra) -> NodeExtra {
    match extra {
        NodeExtra::ElementDecl(d) => NodeExtra::ElementDecl(d.clone()),
        NodeExtra::AttributeDecl(d) => NodeExtra::AttributeDecl(d.clone()),
        NodeExtra::Entity(d) => NodeExtra::Entity(d.clone()),
        _ => NodeExtra::None,
    }
}

/// Whether a default value is lexically valid for the declared type
fn default_fits(atype: AttributeType, value: &str) -> bool {
    match atype {
        AttributeType::Id | AttributeType::IdRef | AttributeType::Entity => validate_name_value(value),
        AttributeType::IdRefs | AttributeType::Entities => validate_names_value(value),
        AttributeType::Nmtoken => validate_nmtoken_value(value),
        AttributeType::Nmtokens => validate_nmtokens_value(value),
        AttributeType::Cdata | AttributeType::Enumeration | AttributeType::Notation => true,
    }
}

impl DomTree {
    fn is_dtd(&self, dtd: NodeId) -> bool {
        self.kind(dtd) == Some(NodeKind::Dtd)
    }

    /// Declare an element
    ///
    /// A redefinition is refused with `None`.
    pub fn add_element_decl(&mut self, dtd: Option<NodeId>, name: Option<&str>, content: i32) -> DomResult<Option<NodeId>> {
        let (Some(dtd), Some(name), Some(content)) = (dtd, name, ElementContent::from_int(content)) else {
            return Ok(None);
        };
        let Some(data) = self.node(dtd)?.dtd_data() else { return Ok(None) };
        if data.elements.contains_key(name) {
            return Ok(None);
        }
        let (prefix, local) = match split_qname(name) {
            Some((p, l)) => (Some(p), l),
            None => (None, name),
        };

        self.injector.charge(ENTRY_COST + name.len())?;
        let prefix = self.dup_opt(prefix)?;
        let doc = self.doc(dtd);
        let decl = self.create(NodeKind::ElementDecl, Some(local), None, doc)?;
        self.node_mut(decl)?.extra = NodeExtra::ElementDecl(Box::new(ElementDeclData { content, prefix }));
        self.link_last_child(dtd, decl);
        if let Some(data) = self.node_mut(dtd)?.dtd_data_mut() {
            data.elements.insert(name.to_owned(), decl);
        }
        Ok(Some(decl))
    }

    /// Declare an attribute of an element
    ///
    /// Unknown types, redefinitions and defaults that do not fit the type
    /// are refused with `None`.
    pub fn add_attribute_decl(&mut self, dtd: Option<NodeId>, spec: AttributeDeclSpec<'_>) -> DomResult<Option<NodeId>> {
        let (Some(dtd), Some(element), Some(name)) = (dtd, spec.element, spec.name) else {
            return Ok(None);
        };
        let (Some(atype), Some(default)) = (AttributeType::from_int(spec.atype), AttributeDefault::from_int(spec.default))
        else {
            return Ok(None);
        };
        if spec.default_value.is_some_and(|v| !default_fits(atype, v)) {
            return Ok(None);
        }
        let key = (element.to_owned(), qualify(spec.prefix, name));
        let Some(data) = self.node(dtd)?.dtd_data() else { return Ok(None) };
        if data.attributes.contains_key(&key) {
            return Ok(None);
        }

        self.injector.charge(ENTRY_COST + key.0.len() + key.1.len())?;
        let payload = AttributeDeclData {
            element: self.dup(element)?,
            prefix: self.dup_opt(spec.prefix)?,
            atype,
            default,
            default_value: self.dup_opt(spec.default_value)?,
        };
        let doc = self.doc(dtd);
        let decl = self.create(NodeKind::AttributeDecl, Some(name), None, doc)?;
        self.node_mut(decl)?.extra = NodeExtra::AttributeDecl(Box::new(payload));
        self.link_last_child(dtd, decl);
        if let Some(data) = self.node_mut(dtd)?.dtd_data_mut() {
            data.attributes.insert(key, decl);
        }
        Ok(Some(decl))
    }

    /// Declare a notation; one of the identifiers is required
    pub fn add_notation_decl(
        &mut self,
        dtd: Option<NodeId>,
        name: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> DomResult<bool> {
        let (Some(dtd), Some(name)) = (dtd, name) else { return Ok(false) };
        if public_id.is_none() && system_id.is_none() {
            return Ok(false);
        }
        let Some(data) = self.node(dtd)?.dtd_data() else { return Ok(false) };
        if data.notations.contains_key(name) {
            return Ok(false);
        }
        self.injector.charge(ENTRY_COST + name.len())?;
        let notation = Notation {
            public_id: self.dup_opt(public_id)?,
            system_id: self.dup_opt(system_id)?,
        };
        if let Some(data) = self.node_mut(dtd)?.dtd_data_mut() {
            data.notations.insert(name.to_owned(), notation);
        }
        Ok(true)
    }

    pub fn get_dtd_element_desc(&self, dtd: NodeId, name: &str) -> Option<NodeId> {
        self.get(dtd)?.dtd_data()?.elements.get(name).copied()
    }

    pub fn get_dtd_qelement_desc(&self, dtd: NodeId, name: &str, prefix: Option<&str>) -> Option<NodeId> {
        self.get_dtd_element_desc(dtd, &qualify(prefix, name))
    }

    pub fn get_dtd_attr_desc(&self, dtd: NodeId, element: &str, name: &str) -> Option<NodeId> {
        let key = (element.to_owned(), name.to_owned());
        self.get(dtd)?.dtd_data()?.attributes.get(&key).copied()
    }

    pub fn get_dtd_qattr_desc(&self, dtd: NodeId, element: &str, name: &str, prefix: Option<&str>) -> Option<NodeId> {
        self.get_dtd_attr_desc(dtd, element, &qualify(prefix, name))
    }

    pub fn get_dtd_notation_desc(&self, dtd: NodeId, name: &str) -> Option<&Notation> {
        self.get(dtd)?.dtd_data()?.notations.get(name)
    }

    /// Element declaration visible from `doc`, internal subset first
    pub(crate) fn doc_element_decl(&self, doc: NodeId, name: &str) -> Option<NodeId> {
        let data = self.get(doc)?.doc_data()?;
        [data.int_subset, data.ext_subset]
            .into_iter()
            .flatten()
            .find_map(|dtd| self.get_dtd_element_desc(dtd, name))
    }

    /// 1 for mixed, `ANY` or `EMPTY` content, 0 for element content, -1 if
    /// undeclared
    pub fn is_mixed_element(&self, doc: NodeId, name: &str) -> i32 {
        let content = self
            .doc_element_decl(doc, name)
            .and_then(|decl| self.get(decl)?.element_decl())
            .map(|d| d.content);
        match content {
            Some(ElementContent::Element) => 0,
            Some(_) => 1,
            None => -1,
        }
    }

    /// Parentless, documentless copy of a DTD with all its declarations
    pub fn copy_dtd(&mut self, dtd: NodeId) -> DomResult<Option<NodeId>> {
        if !self.is_dtd(dtd) {
            return Ok(None);
        }
        let (name, external_id, system_id) = {
            let node = self.node(dtd)?;
            let data = node.dtd_data();
            (
                node.name.clone(),
                data.and_then(|d| d.external_id.clone()),
                data.and_then(|d| d.system_id.clone()),
            )
        };
        let copy = self.create(NodeKind::Dtd, name.as_deref(), None, None)?;
        match self.copy_dtd_into(dtd, copy, external_id, system_id) {
            Ok(()) => Ok(Some(copy)),
            Err(e) => {
                self.free_node(copy);
                Err(e)
            }
        }
    }

    fn copy_dtd_into(
        &mut self,
        dtd: NodeId,
        copy: NodeId,
        external_id: Option<String>,
        system_id: Option<String>,
    ) -> DomResult<()> {
        let external_id = self.dup_opt(external_id.as_deref())?;
        let system_id = self.dup_opt(system_id.as_deref())?;
        let notations: Vec<(String, Notation)> = self
            .node(dtd)?
            .dtd_data()
            .map(|d| d.notations.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        for (name, _) in &notations {
            self.injector.charge(ENTRY_COST + name.len())?;
        }
        if let Some(data) = self.node_mut(copy)?.dtd_data_mut() {
            data.external_id = external_id;
            data.system_id = system_id;
            data.notations = notations.into_iter().collect();
        }

        for child in self.children(dtd) {
            let Some(src) = self.get(child) else { continue };
            if !src.kind.is_declaration() {
                continue;
            }
            let (kind, name, content) = (src.kind, src.name.clone(), src.content.clone());
            let key_name = match &src.extra {
                NodeExtra::ElementDecl(d) => qualify(d.prefix.as_deref(), name.as_deref().unwrap_or_default()),
                NodeExtra::AttributeDecl(d) => qualify(d.prefix.as_deref(), name.as_deref().unwrap_or_default()),
                _ => name.clone().unwrap_or_default(),
            };
            let parameter = src.entity_data().is_some_and(|d| d.etype.is_parameter());
            let element = src.attribute_decl().map(|d| d.element.clone());
            let extra = clone_decl_payload(&src.extra);
            self.injector.charge(payload_cost(&extra))?;

            self.injector.charge(ENTRY_COST + key_name.len())?;
            let decl = self.create(kind, name.as_deref(), content.as_deref(), None)?;
            self.node_mut(decl)?.extra = extra;
            self.link_last_child(copy, decl);
            if let Some(data) = self.node_mut(copy)?.dtd_data_mut() {
                match kind {
                    NodeKind::ElementDecl => {
                        data.elements.insert(key_name, decl);
                    }
                    NodeKind::AttributeDecl => {
                        data.attributes.insert((element.unwrap_or_default(), key_name), decl);
                    }
                    _ if parameter => {
                        data.parameter_entities.insert(key_name, decl);
                    }
                    _ => {
                        data.entities.insert(key_name, decl);
                    }
                }
            }
        }
        Ok(())
    }
}
