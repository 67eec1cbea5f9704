//! Navigation, names, content and the xml: attributes

use arbor_dom::{NodeId, NodeKind, XML_NAMESPACE};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    /// Store a relative of the node at offset 1 in a fresh slot
    pub(super) fn navigate(&mut self, op: Opcode) -> Expect {
        self.advance_nodes();
        let found = self.node(1).and_then(|node| {
            let tree = &self.tree;
            match op {
                Opcode::NodeParent => tree.parent(node),
                Opcode::NodeNextSibling => tree.next_sibling(node),
                Opcode::NodePrevSibling => tree.prev_sibling(node),
                Opcode::NodeFirstChild => tree.first_child(node),
                Opcode::GetLastChild => tree.last_child(node),
                Opcode::GetIntSubset => tree.get_int_subset(tree.doc(node)),
                Opcode::DocGetRootElement => tree.doc_get_root_element(tree.doc(node)),
                _ => None,
            }
        });
        let found = found.filter(|n| !self.tree.is_predefined(*n));
        self.set_node(0, found);
        Expect::Success
    }

    pub(super) fn access(&mut self, op: Opcode) -> Expect {
        let s0 = self.string(0);
        let s0 = s0.as_deref();
        match op {
            Opcode::NodeName => {
                self.advance_strings();
                let name = self.node(0).and_then(|n| self.tree.get(n)?.name().map(str::to_owned));
                self.copy_str(0, name.as_deref());
                Expect::Success
            }
            Opcode::NodeSetName => {
                let Some(node) = self.node(0) else { return Expect::Success };
                Expect::from_result(&self.tree.set_name(node, s0))
            }
            Opcode::NodeGetContent => {
                self.advance_strings();
                let Some(node) = self.node(0) else { return Expect::Success };
                let res = self.tree.get_content(node);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::NodeSetContent | Opcode::NodeSetContentLen => {
                let Some(node) = self.node(0) else { return Expect::Success };
                self.forget_subtree(Some(node), false);
                Expect::from_result(&self.tree.set_content(node, s0))
            }
            Opcode::NodeAddContent | Opcode::NodeAddContentLen => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let expect = Expect::from_result(&self.tree.add_content(node, s0));
                let grown = match self.tree.kind(node) {
                    Some(NodeKind::Element | NodeKind::DocumentFragment) => self.tree.last_child(node),
                    _ => Some(node),
                };
                self.cap_content(grown);
                expect
            }
            Opcode::GetLineNo => {
                self.advance_ints();
                let line = self.node(0).map_or(-1, |n| self.tree.get_line_no(n));
                self.set_int(0, line);
                Expect::Success
            }
            Opcode::GetNodePath => {
                self.advance_strings();
                let Some(node) = self.node(0) else { return Expect::Success };
                let res = self.tree.get_node_path(node);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::DocSetRootElement => self.set_root_element(),
            Opcode::NodeIsText => {
                self.advance_ints();
                let text = self.node(0).is_some_and(|n| self.tree.node_is_text(n));
                self.set_int(0, i32::from(text));
                Expect::Success
            }
            Opcode::IsBlankNode => {
                self.advance_ints();
                let blank = self.node(0).is_some_and(|n| self.tree.is_blank_node(n));
                self.set_int(0, i32::from(blank));
                Expect::Success
            }
            Opcode::NodeGetAttrValue => {
                self.advance_strings();
                let (name, href) = (self.string(1), self.string(2));
                let (Some(node), Some(name)) = (self.node(0), name) else {
                    self.move_str(0, None);
                    return Expect::Success;
                };
                let res = self.tree.get_ns_prop(node, &name, href.as_deref());
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::NodeGetLang => {
                self.advance_strings();
                let Some(node) = self.node(0) else { return Expect::Success };
                let res = self.tree.get_lang(node);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::NodeGetBase | Opcode::NodeGetBaseSafe => {
                self.advance_strings();
                let doc = self.doc_at(0);
                let Some(node) = self.node(1) else { return Expect::Success };
                let res = self.tree.get_base(doc, node);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::NodeGetSpacePreserve => {
                self.advance_ints();
                let Some(node) = self.node(0) else {
                    self.set_int(0, -1);
                    return Expect::Success;
                };
                let res = self.tree.get_space_preserve(node);
                let expect = Expect::from_result(&res);
                self.set_int(0, res.unwrap_or(-1));
                expect
            }
            Opcode::NodeSetLang => {
                let Some(node) = self.node(0) else { return Expect::Success };
                self.forget_xml_attr(node, "lang");
                Expect::from_result(&self.tree.set_lang(node, s0))
            }
            Opcode::NodeSetSpacePreserve => {
                let Some(node) = self.node(0) else { return Expect::Success };
                self.forget_xml_attr(node, "space");
                let value = self.int(0);
                Expect::from_result(&self.tree.set_space_preserve(node, value))
            }
            Opcode::NodeSetBase => {
                let Some(node) = self.node(0) else { return Expect::Success };
                self.forget_xml_attr(node, "base");
                Expect::from_result(&self.tree.set_base(node, s0))
            }
            _ => Expect::Unknown,
        }
    }

    /// The children of `xml:<name>` on `elem` are about to be replaced
    fn forget_xml_attr(&mut self, elem: NodeId, name: &str) {
        let attr = self.tree.find_prop(elem, name, Some(XML_NAMESPACE));
        self.forget_subtree(attr, false);
    }

    fn set_root_element(&mut self) -> Expect {
        self.advance_nodes();
        let doc = self.doc_at(1);
        let root = self.node(2);
        let (old_parent, old_doc) = self.home(root);

        let res = self.tree.doc_set_root_element(doc, root);
        let mut expect = Expect::from_result(&res);
        let old_root = res.ok().flatten();
        self.set_node(0, old_root);

        if let Some(root) = root.filter(|r| self.tree.contains(*r)) {
            if self.home(Some(root)) != (old_parent, old_doc) {
                expect = expect.and(self.fix(Some(root)));
                self.release_home(old_parent, old_doc);
            }
        }
        expect
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    fn exec(vm: &mut Vm, op: Opcode, data: &[u8]) {
        let mut input = FuzzInput::new(data);
        vm.execute(op, &mut input).unwrap();
    }

    #[test]
    fn test_navigation_fills_fresh_slot() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree_mut().new_child(a, None, Some("b"), None).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(b));

        exec(&mut vm, Opcode::NodeParent, &[]);
        assert_eq!(vm.node(0), Some(a));
        exec(&mut vm, Opcode::NodeParent, &[]);
        assert_eq!(vm.node(0), None);
        assert_eq!(vm.node(1), Some(a));
        vm.finish().unwrap();
    }

    #[test]
    fn test_set_content_forgets_children() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree_mut().new_child(a, None, Some("b"), None).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(b));
        vm.advance_nodes();
        vm.set_node(0, Some(a));

        exec(&mut vm, Opcode::CreateString, b"hi\\\n");
        exec(&mut vm, Opcode::NodeSetContent, &[]);
        assert!(!vm.tree().contains(b));
        assert_eq!(vm.node(1), None);
        assert_eq!(vm.tree_mut().get_content(a).unwrap().as_deref(), Some("hi"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_set_root_element_returns_old_root() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree_mut().new_doc(None).unwrap();
        let old = vm.tree_mut().new_doc_node(Some(doc), None, Some("old"), None).unwrap().unwrap();
        vm.tree_mut().doc_set_root_element(Some(doc), Some(old)).unwrap();
        let new = vm.tree_mut().new_node(None, Some("new")).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(new));
        vm.advance_nodes();
        vm.set_node(0, Some(doc));

        // node(1) is the document, node(2) the new root once a slot is claimed
        exec(&mut vm, Opcode::DocSetRootElement, &[]);
        assert_eq!(vm.node(0), Some(old));
        assert_eq!(vm.tree().parent(new), Some(doc));
        assert_eq!(vm.tree().parent(old), None);
        vm.finish().unwrap();
    }
}
