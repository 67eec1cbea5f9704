//! Constructors
//!
//! Every constructor claims a fresh node slot first, so node operands are
//! read from offset 1 on.

use arbor_dom::{DomResult, NodeId};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn build(&mut self, op: Opcode) -> Expect {
        self.advance_nodes();
        let s0 = self.string(0);
        let s1 = self.string(1);
        let s2 = self.string(2);
        let (s0, s1, s2) = (s0.as_deref(), s1.as_deref(), s2.as_deref());
        let k = self.int(0);

        let res: DomResult<Option<NodeId>> = match op {
            Opcode::NewDoc => self.tree.new_doc(s0).map(Some),
            Opcode::HtmlNewDoc => self.tree.html_new_doc(s0, s1).map(Some),
            Opcode::HtmlNewDocNoDtd => self.tree.html_new_doc_no_dtd(s0, s1).map(Some),
            Opcode::NewNode | Opcode::NewNodeEatName => {
                let ns = self.node_ns(self.node(1), k);
                self.tree.new_node(ns, s0)
            }
            Opcode::NewDocNode | Opcode::NewDocNodeEatName => {
                let ns = self.node_ns(self.node(2), k);
                let doc = self.doc_at(1);
                self.tree.new_doc_node(doc, ns, s0, s1)
            }
            Opcode::NewDocRawNode => {
                let ns = self.node_ns(self.node(2), k);
                let doc = self.doc_at(1);
                self.tree.new_doc_raw_node(doc, ns, s0, s1)
            }
            Opcode::NewChild | Opcode::NewTextChild => {
                let Some(parent) = self.node(1) else { return Expect::Success };
                let ns = self.node_ns(Some(parent), k);
                if op == Opcode::NewChild {
                    self.tree.new_child(parent, ns, s0, s1)
                } else {
                    self.tree.new_text_child(parent, ns, s0, s1)
                }
            }
            Opcode::NewProp => {
                let elem = self.node(1);
                self.tree.new_prop(elem, s0, s1)
            }
            Opcode::NewDocProp => {
                let doc = self.doc_at(1);
                self.tree.new_doc_prop(doc, s0, s1)
            }
            Opcode::NewNsProp | Opcode::NewNsPropEatName => {
                let elem = self.node(1);
                let ns = self.node_ns(elem, k);
                self.tree.new_ns_prop(elem, ns, s0, s1)
            }
            Opcode::NewText | Opcode::NewTextLen => self.tree.new_text(s0).map(Some),
            Opcode::NewDocText | Opcode::NewDocTextLen => {
                let doc = self.doc_at(1);
                self.tree.new_doc_text(doc, s0).map(Some)
            }
            Opcode::NewPi => self.tree.new_doc_pi(None, s0, s1),
            Opcode::NewDocPi => {
                let doc = self.doc_at(1);
                self.tree.new_doc_pi(doc, s0, s1)
            }
            Opcode::NewComment => self.tree.new_doc_comment(None, s0).map(Some),
            Opcode::NewDocComment => {
                let doc = self.doc_at(1);
                self.tree.new_doc_comment(doc, s0).map(Some)
            }
            Opcode::NewCDataBlock => {
                let doc = self.doc_at(1);
                self.tree.new_cdata_block(doc, s0).map(Some)
            }
            Opcode::NewCharRef => {
                let doc = self.doc_at(1);
                self.tree.new_char_ref(doc, s0)
            }
            Opcode::NewReference => {
                let doc = self.doc_at(1);
                self.tree.new_reference(doc, s0)
            }
            Opcode::NewDocFragment => {
                let doc = self.doc_at(1);
                self.tree.new_doc_fragment(doc).map(Some)
            }
            Opcode::CreateIntSubset => {
                let doc = self.doc_at(1);
                self.tree.create_int_subset(doc, s0, s1, s2)
            }
            Opcode::NewDtd => {
                let doc = self.doc_at(1);
                self.tree.new_dtd(doc, s0, s1, s2)
            }
            _ => return Expect::Unknown,
        };

        let expect = Expect::from_result(&res);
        let node = res.ok().flatten();
        self.set_node(0, node);
        match op {
            // the namespace came from another tree
            Opcode::NewNode
            | Opcode::NewNodeEatName
            | Opcode::NewDocNode
            | Opcode::NewDocNodeEatName
            | Opcode::NewDocRawNode => expect.and(self.fix(node)),
            _ => expect,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;
    use arbor_dom::NodeKind;

    fn exec(vm: &mut Vm, op: Opcode, data: &[u8]) {
        let mut input = FuzzInput::new(data);
        vm.execute(op, &mut input).unwrap();
    }

    #[test]
    fn test_doc_node_lands_in_document() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::NewDoc, &[]);
        exec(&mut vm, Opcode::CreateString, b"root\\\n");
        exec(&mut vm, Opcode::NewDocNode, &[]);

        let elem = vm.node(0).unwrap();
        let doc = vm.node(1).unwrap();
        assert_eq!(vm.tree().kind(elem), Some(NodeKind::Element));
        assert_eq!(vm.tree().doc(elem), Some(doc));
        assert_eq!(vm.tree().parent(elem), None);
        vm.finish().unwrap();
    }

    #[test]
    fn test_new_child_without_parent_stores_nothing() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::CreateString, b"c\\\n");
        exec(&mut vm, Opcode::NewChild, &[]);
        assert_eq!(vm.node(0), None);
        assert_eq!(vm.tree().live_nodes(), 0);
    }

    #[test]
    fn test_borrowed_namespace_is_redeclared() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        vm.tree_mut().new_ns(Some(a), Some("urn:x"), Some("x")).unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(a));
        exec(&mut vm, Opcode::CreateString, b"b\\\n");
        exec(&mut vm, Opcode::NewNode, &[]);

        let b = vm.node(0).unwrap();
        let ns = vm.tree().node_ns(b).unwrap();
        assert_eq!(vm.tree().namespace(ns).unwrap().owner(), Some(b));
        vm.finish().unwrap();
    }
}
