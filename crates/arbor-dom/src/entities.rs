//! Entities
//!
//! Entity declarations are nodes owned by a DTD and indexed by name in its
//! tables. The five predefined entities are permanent nodes shared by every
//! document.

use crate::alloc::ENTRY_COST;
use crate::node::{EntityData, EntityType, Node, NodeExtra, NodeKind};
use crate::{DomResult, DomTree, NodeId};

/// Predefined entities and their replacement text
const PREDEFINED: [(&str, &str); 5] = [
    ("lt", "<"),
    ("gt", ">"),
    ("amp", "&"),
    ("apos", "'"),
    ("quot", "\""),
];

/// Entity declaration fields shared by the constructors
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityDecl<'a> {
    pub name: Option<&'a str>,
    pub etype: i32,
    pub external_id: Option<&'a str>,
    pub system_id: Option<&'a str>,
    pub content: Option<&'a str>,
}

impl DomTree {
    /// Install the predefined entities outside of the allocation budget
    pub(crate) fn install_predefined_entities(&mut self) {
        for (name, value) in PREDEFINED {
            let mut node = Node::new(NodeKind::EntityDecl, Some(name.to_owned()), Some(value.to_owned()));
            node.extra = NodeExtra::Entity(Box::new(EntityData {
                etype: EntityType::InternalPredefined,
                external_id: None,
                system_id: None,
            }));
            let id = NodeId(self.nodes.insert(node));
            self.predefined.push(id);
        }
    }

    fn entity_node(&mut self, doc: Option<NodeId>, etype: EntityType, decl: &EntityDecl<'_>, name: &str) -> DomResult<NodeId> {
        let external_id = self.dup_opt(decl.external_id)?;
        let system_id = self.dup_opt(decl.system_id)?;
        let ent = self.create(NodeKind::EntityDecl, Some(name), decl.content, doc)?;
        self.node_mut(ent)?.extra = NodeExtra::Entity(Box::new(EntityData {
            etype,
            external_id,
            system_id,
        }));
        Ok(ent)
    }

    /// Create an entity declaration
    ///
    /// It goes into the internal subset when `doc` has one; otherwise the
    /// declaration stands alone and belongs to the caller.
    pub fn new_entity(&mut self, doc: Option<NodeId>, decl: EntityDecl<'_>) -> DomResult<Option<NodeId>> {
        if doc.is_some_and(|d| self.get_int_subset(Some(d)).is_some()) {
            return self.add_doc_entity(doc, decl);
        }
        let (Some(name), Some(etype)) = (decl.name, EntityType::from_int(decl.etype)) else {
            return Ok(None);
        };
        if etype == EntityType::InternalPredefined {
            return Ok(None);
        }
        self.entity_node(doc, etype, &decl, name).map(Some)
    }

    /// Declare an entity in the internal or external subset of `doc`
    ///
    /// Redefinitions and predefined names are refused with `None`.
    pub fn add_entity(&mut self, doc: Option<NodeId>, external: bool, decl: EntityDecl<'_>) -> DomResult<Option<NodeId>> {
        let Some(doc) = doc else { return Ok(None) };
        let Some(data) = self.node(doc)?.doc_data() else { return Ok(None) };
        let dtd = if external { data.ext_subset } else { self.get_int_subset(Some(doc)) };
        let (Some(dtd), Some(name), Some(etype)) = (dtd, decl.name, EntityType::from_int(decl.etype)) else {
            return Ok(None);
        };
        if etype == EntityType::InternalPredefined || self.get_predefined_entity(name).is_some() {
            return Ok(None);
        }
        let Some(tables) = self.node(dtd)?.dtd_data() else { return Ok(None) };
        let table = if etype.is_parameter() { &tables.parameter_entities } else { &tables.entities };
        if table.contains_key(name) {
            return Ok(None);
        }

        self.injector.charge(ENTRY_COST + name.len())?;
        let ent = self.entity_node(Some(doc), etype, &decl, name)?;
        self.link_last_child(dtd, ent);
        if let Some(tables) = self.node_mut(dtd)?.dtd_data_mut() {
            let table = if etype.is_parameter() { &mut tables.parameter_entities } else { &mut tables.entities };
            table.insert(name.to_owned(), ent);
        }
        tracing::trace!("entity {} declared in {}", name, dtd);
        Ok(Some(ent))
    }

    pub fn add_doc_entity(&mut self, doc: Option<NodeId>, decl: EntityDecl<'_>) -> DomResult<Option<NodeId>> {
        self.add_entity(doc, false, decl)
    }

    pub fn add_dtd_entity(&mut self, doc: Option<NodeId>, decl: EntityDecl<'_>) -> DomResult<Option<NodeId>> {
        self.add_entity(doc, true, decl)
    }

    pub fn get_predefined_entity(&self, name: &str) -> Option<NodeId> {
        self.predefined
            .iter()
            .copied()
            .find(|id| self.get(*id).is_some_and(|n| n.name() == Some(name)))
    }

    /// General entity declared in a DTD's table
    fn dtd_entity(&self, dtd: Option<NodeId>, name: &str, parameter: bool) -> Option<NodeId> {
        let data = self.get(dtd?)?.dtd_data()?;
        let table = if parameter { &data.parameter_entities } else { &data.entities };
        table.get(name).copied().filter(|id| self.contains(*id))
    }

    fn subsets(&self, doc: Option<NodeId>) -> (Option<NodeId>, Option<NodeId>) {
        match doc.and_then(|d| self.get(d)).and_then(|d| d.doc_data()) {
            Some(data) => (data.int_subset, data.ext_subset),
            None => (None, None),
        }
    }

    /// General entity visible from `doc`, falling back to the predefined
    /// ones
    pub(crate) fn lookup_doc_entity(&self, doc: Option<NodeId>, name: &str) -> Option<NodeId> {
        let (int, ext) = self.subsets(doc);
        self.dtd_entity(int, name, false)
            .or_else(|| self.dtd_entity(ext, name, false))
            .or_else(|| self.get_predefined_entity(name))
    }

    pub fn get_doc_entity(&self, doc: Option<NodeId>, name: &str) -> Option<NodeId> {
        self.lookup_doc_entity(doc, name)
    }

    /// General entity from the external subset only
    pub fn get_dtd_entity(&self, doc: Option<NodeId>, name: &str) -> Option<NodeId> {
        let (_, ext) = self.subsets(doc);
        self.dtd_entity(ext, name, false)
    }

    pub fn get_parameter_entity(&self, doc: Option<NodeId>, name: &str) -> Option<NodeId> {
        let (int, ext) = self.subsets(doc);
        self.dtd_entity(int, name, true).or_else(|| self.dtd_entity(ext, name, true))
    }

    /// Escape markup characters and carriage returns for element content
    pub fn encode_entities(&mut self, _doc: Option<NodeId>, input: Option<&str>) -> DomResult<Option<String>> {
        let Some(input) = input else { return Ok(None) };
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '&' => out.push_str("&amp;"),
                '\r' => out.push_str("&#13;"),
                c => out.push(c),
            }
        }
        self.injector.charge_str(&out)?;
        Ok(Some(out))
    }

    /// Like [`encode_entities`](Self::encode_entities), quotes included
    pub fn encode_special_chars(&mut self, _doc: Option<NodeId>, input: Option<&str>) -> DomResult<Option<String>> {
        let Some(input) = input else { return Ok(None) };
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '&' => out.push_str("&amp;"),
                '"' => out.push_str("&quot;"),
                '\r' => out.push_str("&#13;"),
                c => out.push(c),
            }
        }
        self.injector.charge_str(&out)?;
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general(name: &'static str, content: &'static str) -> EntityDecl<'static> {
        EntityDecl {
            name: Some(name),
            etype: EntityType::InternalGeneral as i32,
            content: Some(content),
            ..Default::default()
        }
    }

    #[test]
    fn test_predefined_are_permanent() {
        let mut tree = DomTree::new();
        let lt = tree.get_predefined_entity("lt").unwrap();
        assert_eq!(tree.get(lt).unwrap().content(), Some("<"));
        tree.free_node(lt);
        assert!(tree.contains(lt));
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_doc_entities() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        assert_eq!(tree.add_doc_entity(Some(doc), general("e", "v")).unwrap(), None);

        let dtd = tree.create_int_subset(Some(doc), Some("r"), None, None).unwrap().unwrap();
        let ent = tree.add_doc_entity(Some(doc), general("e", "v")).unwrap().unwrap();
        assert_eq!(tree.parent(ent), Some(dtd));
        assert_eq!(tree.get_doc_entity(Some(doc), "e"), Some(ent));
        assert_eq!(tree.get_dtd_entity(Some(doc), "e"), None);
        assert_eq!(tree.add_doc_entity(Some(doc), general("e", "w")).unwrap(), None);
        assert_eq!(tree.add_doc_entity(Some(doc), general("amp", "w")).unwrap(), None);

        let via_new = tree.new_entity(Some(doc), general("f", "x")).unwrap().unwrap();
        assert_eq!(tree.parent(via_new), Some(dtd));

        tree.free_doc(doc);
        assert_eq!(tree.live_nodes(), 0);
    }

    #[test]
    fn test_reference_resolves_entity_text() {
        let mut tree = DomTree::new();
        let doc = tree.new_doc(None).unwrap();
        tree.create_int_subset(Some(doc), Some("r"), None, None).unwrap();
        tree.add_doc_entity(Some(doc), general("e", "value")).unwrap();
        let r = tree.new_reference(Some(doc), Some("e")).unwrap().unwrap();
        assert_eq!(tree.get_content(r).unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_encoding() {
        let mut tree = DomTree::new();
        assert_eq!(
            tree.encode_entities(None, Some("a<b & \"c\"\r")).unwrap().as_deref(),
            Some("a&lt;b &amp; \"c\"&#13;")
        );
        assert_eq!(
            tree.encode_special_chars(None, Some("\"x\"")).unwrap().as_deref(),
            Some("&quot;x&quot;")
        );
        assert_eq!(tree.encode_entities(None, None).unwrap(), None);
    }
}
