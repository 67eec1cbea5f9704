//! Parsing, DTD declarations, ID tables, validation and entities

use arbor_dom::{
    AttributeDeclSpec, DomResult, EntityDecl, NodeKind, validate_attribute_value, validate_name_value, validate_names_value,
    validate_nmtoken_value, validate_nmtokens_value,
};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

/// Upper bound on name lists computed for the validity queries
const MAX_NAME_LIST: usize = 256;

fn status(ok: bool) -> i32 {
    if ok { 0 } else { -1 }
}

impl Vm {
    pub(super) fn dtd_op(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::ParseDocument => {
                self.advance_nodes();
                let (input, url, encoding) = (self.string(0), self.string(1), self.string(2));
                let options = self.int(0);
                let Some(input) = input else { return Expect::Success };
                let res = self.tree.read_doc(&input, url.as_deref(), encoding.as_deref(), options);
                let expect = Expect::from_result(&res);
                self.set_node(0, res.ok().flatten());
                expect
            }
            Opcode::AddElementDecl => {
                self.advance_nodes();
                let dtd = self.dtd_at(1);
                let name = self.string(0);
                let content = self.int(0);
                let res = self.tree.add_element_decl(dtd, name.as_deref(), content);
                let expect = Expect::from_result(&res);
                self.set_node(0, res.ok().flatten());
                expect
            }
            Opcode::AddAttributeDecl => {
                self.advance_nodes();
                let dtd = self.dtd_at(1);
                let (element, name, prefix, value) = (self.string(0), self.string(1), self.string(2), self.string(3));
                let spec = AttributeDeclSpec {
                    element: element.as_deref(),
                    name: name.as_deref(),
                    prefix: prefix.as_deref(),
                    atype: self.int(0),
                    default: self.int(1),
                    default_value: value.as_deref(),
                };
                let res = self.tree.add_attribute_decl(dtd, spec);
                let expect = Expect::from_result(&res);
                self.set_node(0, res.ok().flatten());
                expect
            }
            Opcode::AddNotationDecl => {
                let dtd = self.dtd_at(0);
                let (name, public, system) = (self.string(0), self.string(1), self.string(2));
                Expect::from_result(&self.tree.add_notation_decl(
                    dtd,
                    name.as_deref(),
                    public.as_deref(),
                    system.as_deref(),
                ))
            }
            Opcode::GetDtdElementDesc | Opcode::GetDtdQElementDesc | Opcode::GetDtdAttrDesc | Opcode::GetDtdQAttrDesc => {
                self.advance_nodes();
                let (s0, s1, s2) = (self.string(0), self.string(1), self.string(2));
                let found = match (self.dtd_at(1), s0) {
                    (Some(dtd), Some(s0)) => match (op, s1.as_deref()) {
                        (Opcode::GetDtdElementDesc, _) => self.tree.get_dtd_element_desc(dtd, &s0),
                        (Opcode::GetDtdQElementDesc, prefix) => self.tree.get_dtd_qelement_desc(dtd, &s0, prefix),
                        (Opcode::GetDtdAttrDesc, Some(s1)) => self.tree.get_dtd_attr_desc(dtd, &s0, s1),
                        (Opcode::GetDtdQAttrDesc, Some(s1)) => {
                            self.tree.get_dtd_qattr_desc(dtd, &s0, s1, s2.as_deref())
                        }
                        _ => None,
                    },
                    _ => None,
                };
                self.set_node(0, found);
                Expect::Success
            }
            Opcode::GetDtdNotationDesc => {
                if let (Some(dtd), Some(name)) = (self.dtd_at(0), self.string(0)) {
                    let found = self.tree.get_dtd_notation_desc(dtd, &name).is_some();
                    tracing::trace!("notation {} declared: {}", name, found);
                }
                Expect::Success
            }
            _ => self.id_op(op),
        }
    }

    fn id_op(&mut self, op: Opcode) -> Expect {
        let value = self.string(0);
        match op {
            Opcode::AddId | Opcode::AddRef => {
                let (Some(doc), Some(value), Some(attr)) = (self.doc_at(0), value, self.attr_at(1)) else {
                    return Expect::Success;
                };
                let res = match op {
                    Opcode::AddId => self.tree.add_id(doc, &value, attr),
                    _ => self.tree.add_ref(doc, &value, attr),
                };
                Expect::from_result(&res)
            }
            Opcode::AddIdSafe => {
                let (Some(attr), Some(value)) = (self.attr_at(0), value) else {
                    return Expect::Success;
                };
                Expect::from_result(&self.tree.add_id_safe(attr, &value))
            }
            Opcode::GetId => {
                self.advance_nodes();
                let found = match (self.doc_at(1), value) {
                    (Some(doc), Some(value)) => self.tree.get_id(doc, &value),
                    _ => None,
                };
                self.set_node(0, found);
                Expect::Success
            }
            Opcode::GetRefs => {
                self.advance_ints();
                let count = match (self.doc_at(1), value) {
                    (Some(doc), Some(value)) => self.tree.get_refs(doc, &value).len(),
                    _ => 0,
                };
                self.set_int(0, i32::try_from(count).unwrap_or(i32::MAX));
                Expect::Success
            }
            Opcode::IsId | Opcode::IsRef => {
                self.advance_ints();
                let (doc, elem) = (self.doc_at(2), self.node(1));
                let flag = self.attr_at(0).is_some_and(|attr| match op {
                    Opcode::IsId => self.tree.is_id(doc, elem, attr),
                    _ => self.tree.is_ref(doc, elem, attr),
                });
                self.set_int(0, i32::from(flag));
                Expect::Success
            }
            Opcode::RemoveId | Opcode::RemoveRef => {
                self.advance_ints();
                let removed = match (self.doc_at(1), self.attr_at(0)) {
                    (Some(doc), Some(attr)) if op == Opcode::RemoveId => self.tree.remove_id(doc, attr),
                    (Some(doc), Some(attr)) => self.tree.remove_ref(doc, attr),
                    _ => false,
                };
                self.set_int(0, status(removed));
                Expect::Success
            }
            _ => self.validity_op(op),
        }
    }

    fn validity_op(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::Validate => {
                self.advance_ints();
                let res = match self.node(0).map(|n| (n, self.tree.kind(n))) {
                    Some((n, Some(NodeKind::Document | NodeKind::HtmlDocument))) => Some(self.tree.validate_document(n)),
                    Some((n, Some(NodeKind::ElementDecl))) => Some(self.tree.validate_element_decl(n)),
                    Some((n, Some(NodeKind::AttributeDecl))) => Some(self.tree.validate_attribute_decl(n)),
                    Some((n, Some(NodeKind::Element))) => match self.tree.doc(n) {
                        Some(doc) => Some(self.tree.validate_element(doc, n)),
                        None => None,
                    },
                    _ => None,
                };
                self.store_verdict(res)
            }
            Opcode::ValidateDtd => {
                self.advance_ints();
                let res = match (self.doc_at(0), self.dtd_at(1)) {
                    (Some(doc), Some(dtd)) => Some(self.tree.validate_dtd(doc, dtd)),
                    _ => None,
                };
                self.store_verdict(res)
            }
            Opcode::ValidateNotationUse | Opcode::IsMixedElement => {
                self.advance_ints();
                let verdict = match (self.doc_at(0), self.string(0)) {
                    (Some(doc), Some(name)) if op == Opcode::IsMixedElement => self.tree.is_mixed_element(doc, &name),
                    (Some(doc), Some(name)) => i32::from(self.tree.validate_notation_use(doc, &name)),
                    _ => -1,
                };
                self.set_int(0, verdict);
                Expect::Success
            }
            Opcode::ValidateAttributeValue
            | Opcode::ValidateNameValue
            | Opcode::ValidateNamesValue
            | Opcode::ValidateNmtokenValue
            | Opcode::ValidateNmtokensValue => {
                self.advance_ints();
                let atype = self.int(1);
                let verdict = self.string(0).map_or(-1, |value| {
                    i32::from(match op {
                        Opcode::ValidateAttributeValue => validate_attribute_value(atype, &value),
                        Opcode::ValidateNameValue => validate_name_value(&value),
                        Opcode::ValidateNamesValue => validate_names_value(&value),
                        Opcode::ValidateNmtokenValue => validate_nmtoken_value(&value),
                        _ => validate_nmtokens_value(&value),
                    })
                });
                self.set_int(0, verdict);
                Expect::Success
            }
            Opcode::ValidNormalizeAttributeValue | Opcode::ValidCtxtNormalizeAttributeValue => {
                self.advance_strings();
                let (name, value) = (self.string(1), self.string(2));
                let (Some(doc), Some(elem), Some(name), Some(value)) = (self.doc_at(0), self.node(1), name, value)
                else {
                    self.move_str(0, None);
                    return Expect::Success;
                };
                let res = self.tree.normalize_attribute_value(doc, elem, &name, &value);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::ValidGetPotentialChildren | Opcode::ValidGetValidElements => {
                self.advance_ints();
                let max = usize::try_from(self.int(1)).unwrap_or(0).min(MAX_NAME_LIST);
                let res = match op {
                    Opcode::ValidGetPotentialChildren => match self.node(0) {
                        Some(decl) => self.tree.get_potential_children(decl, max),
                        None => Ok(Vec::new()),
                    },
                    _ => {
                        let (prev, next) = (self.node(0), self.node(1));
                        self.tree.get_valid_elements(prev, next, max)
                    }
                };
                let expect = Expect::from_result(&res);
                let count = res.map_or(-1, |names| i32::try_from(names.len()).unwrap_or(i32::MAX));
                self.set_int(0, count);
                expect
            }
            _ => self.entity_op(op),
        }
    }

    /// Store a validation result as 1, 0, or -1 when nothing was checked
    fn store_verdict(&mut self, res: Option<DomResult<bool>>) -> Expect {
        let Some(res) = res else {
            self.set_int(0, -1);
            return Expect::Success;
        };
        let expect = Expect::from_result(&res);
        self.set_int(0, res.map_or(-1, i32::from));
        expect
    }

    fn entity_op(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::NewEntity | Opcode::AddEntity | Opcode::AddDocEntity | Opcode::AddDtdEntity => {
                self.advance_nodes();
                let doc = self.doc_at(1);
                let external = self.int(0) != 0;
                let (name, external_id, system_id, content) =
                    (self.string(0), self.string(1), self.string(2), self.string(3));
                let decl = EntityDecl {
                    name: name.as_deref(),
                    etype: if op == Opcode::AddEntity { self.int(1) } else { self.int(0) },
                    external_id: external_id.as_deref(),
                    system_id: system_id.as_deref(),
                    content: content.as_deref(),
                };
                let res = match op {
                    Opcode::NewEntity => self.tree.new_entity(doc, decl),
                    Opcode::AddEntity => self.tree.add_entity(doc, external, decl),
                    Opcode::AddDocEntity => self.tree.add_doc_entity(doc, decl),
                    _ => self.tree.add_dtd_entity(doc, decl),
                };
                let expect = Expect::from_result(&res);
                let mut ent = res.ok().flatten();
                if let Some(e) = ent.filter(|e| self.tree.parent(*e).is_none()) {
                    // a standalone declaration has no DTD to own it
                    self.tree.free_node(e);
                    ent = None;
                }
                self.set_node(0, ent);
                expect
            }
            Opcode::GetPredefinedEntity
            | Opcode::GetDocEntity
            | Opcode::GetDtdEntity
            | Opcode::GetParameterEntity => {
                self.advance_nodes();
                let doc = self.doc_at(1);
                let found = self.string(0).and_then(|name| match op {
                    Opcode::GetPredefinedEntity => self.tree.get_predefined_entity(&name),
                    Opcode::GetDocEntity => self.tree.get_doc_entity(doc, &name),
                    Opcode::GetDtdEntity => self.tree.get_dtd_entity(doc, &name),
                    _ => self.tree.get_parameter_entity(doc, &name),
                });
                self.set_node(0, found);
                Expect::Success
            }
            Opcode::EncodeEntitiesReentrant | Opcode::EncodeSpecialChars => {
                self.advance_strings();
                let doc = self.doc_at(0);
                let input = self.string(1);
                let res = match op {
                    Opcode::EncodeEntitiesReentrant => self.tree.encode_entities(doc, input.as_deref()),
                    _ => self.tree.encode_special_chars(doc, input.as_deref()),
                };
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            _ => Expect::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use arbor_dom::AttributeDeclSpec;

    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    fn exec(vm: &mut Vm, op: Opcode, data: &[u8]) {
        vm.execute(op, &mut FuzzInput::new(data)).unwrap();
    }

    #[test]
    fn test_parse_document_is_held() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::CreateString, b"<r><c/></r>\\\n");
        exec(&mut vm, Opcode::ParseDocument, &[]);
        let doc = vm.node(0).unwrap();
        let root = vm.tree().doc_get_root_element(Some(doc)).unwrap();
        assert_eq!(vm.tree().get(root).unwrap().name(), Some("r"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_standalone_entity_is_freed() {
        let mut vm = Vm::new(VmConfig::default());
        let before = vm.tree().live_nodes();
        exec(&mut vm, Opcode::CreateInteger, &[0, 0, 0, 1]);
        exec(&mut vm, Opcode::CreateString, b"ent\\\n");
        exec(&mut vm, Opcode::NewEntity, &[]);
        assert_eq!(vm.node(0), None);
        assert_eq!(vm.tree().live_nodes(), before);
        vm.finish().unwrap();
    }

    #[test]
    fn test_element_decl_lands_in_subset() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree_mut().new_doc(None).unwrap();
        let dtd = vm.tree_mut().create_int_subset(Some(doc), Some("r"), None, None).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(doc));

        exec(&mut vm, Opcode::CreateInteger, &[0, 0, 0, 2]);
        exec(&mut vm, Opcode::CreateString, b"r\\\n");
        exec(&mut vm, Opcode::AddElementDecl, &[]);
        let decl = vm.node(0).unwrap();
        assert_eq!(vm.tree().parent(decl), Some(dtd));

        exec(&mut vm, Opcode::GetDtdElementDesc, &[]);
        assert_eq!(vm.node(0), Some(decl));
        vm.finish().unwrap();
    }

    #[test]
    fn test_attribute_desc_lookups() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree_mut().new_doc(None).unwrap();
        let dtd = vm.tree_mut().create_int_subset(Some(doc), Some("r"), None, None).unwrap().unwrap();
        let spec = AttributeDeclSpec {
            element: Some("r"),
            name: Some("id"),
            prefix: None,
            atype: 1,
            default: 3,
            default_value: None,
        };
        let decl = vm.tree_mut().add_attribute_decl(Some(dtd), spec).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(doc));

        exec(&mut vm, Opcode::CreateString, b"id\\\n");
        exec(&mut vm, Opcode::CreateString, b"r\\\n");
        exec(&mut vm, Opcode::GetDtdAttrDesc, &[]);
        assert_eq!(vm.node(0), Some(decl));
        exec(&mut vm, Opcode::GetDtdQAttrDesc, &[]);
        assert_eq!(vm.node(0), Some(decl));
        exec(&mut vm, Opcode::GetDtdQElementDesc, &[]);
        assert_eq!(vm.node(0), None);
        vm.finish().unwrap();
    }

    #[test]
    fn test_name_validation_writes_int() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::CreateString, b"good\\\n");
        exec(&mut vm, Opcode::ValidateNameValue, &[]);
        assert_eq!(vm.int(0), 1);
        exec(&mut vm, Opcode::CreateString, b"1bad\\\n");
        exec(&mut vm, Opcode::ValidateNameValue, &[]);
        assert_eq!(vm.int(0), 0);
        vm.finish().unwrap();
    }
}
