//! DOM-wrap moves and element-only navigation
//!
//! Adopted nodes and clones come back detached. When a destination parent
//! was named and the node ended up in its document, the node is attached
//! there: attributes go first in the list without duplicate removal,
//! other kinds except text are appended as children.

use arbor_dom::{NodeId, NodeKind};

use crate::expect::Expect;
use crate::guards::{is_valid_child, is_valid_child_type};
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn dom(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::DomWrapReconcileNamespaces => {
                let Some(elem) = self.node(0) else { return Expect::Success };
                let options = self.int(0);
                Expect::from_result(&self.tree.dom_wrap_reconcile_namespaces(elem, options))
            }
            Opcode::DomWrapAdoptNode => self.adopt(),
            Opcode::DomWrapRemoveNode => {
                let (Some(doc), Some(node)) = (self.doc_at(0), self.node(1)) else {
                    return Expect::Success;
                };
                let parent = self.tree.parent(node);
                let expect = Expect::from_result(&self.tree.dom_wrap_remove_node(doc, node, 0));
                if self.tree.parent(node) != parent {
                    self.release(parent);
                }
                expect
            }
            Opcode::DomWrapCloneNode => self.clone_node(),
            Opcode::ChildElementCount => {
                self.advance_ints();
                let count = self.node(0).map_or(0, |n| self.tree.child_element_count(n));
                self.set_int(0, i32::try_from(count).unwrap_or(i32::MAX));
                Expect::Success
            }
            Opcode::FirstElementChild
            | Opcode::LastElementChild
            | Opcode::NextElementSibling
            | Opcode::PreviousElementSibling => {
                self.advance_nodes();
                let found = self.node(1).and_then(|n| match op {
                    Opcode::FirstElementChild => self.tree.first_element_child(n),
                    Opcode::LastElementChild => self.tree.last_element_child(n),
                    Opcode::NextElementSibling => self.tree.next_element_sibling(n),
                    _ => self.tree.previous_element_sibling(n),
                });
                self.set_node(0, found);
                Expect::Success
            }
            _ => Expect::Unknown,
        }
    }

    fn adopt(&mut self) -> Expect {
        let src_doc = self.doc_at(0);
        let (Some(node), Some(dest_doc)) = (self.node(1), self.doc_at(2)) else {
            return Expect::Success;
        };
        let dest_parent = self.node(3).filter(|p| is_valid_child(&self.tree, Some(*p), Some(node)));
        let options = self.int(0);
        let (old_parent, old_doc) = self.home(Some(node));

        let res = self.tree.dom_wrap_adopt_node(src_doc, node, dest_doc, dest_parent, options);
        let mut expect = Expect::from_result(&res);
        if let Some(parent) = dest_parent {
            expect = expect.and(self.attach_wrapped(parent, node));
        }

        let parent_now = self.tree.contains(node).then(|| self.tree.parent(node)).flatten();
        let doc_now = self.tree.doc(node);
        if old_parent.is_some() && parent_now != old_parent {
            self.release(old_parent);
        } else if doc_now != old_doc {
            self.release(old_doc);
        }
        expect
    }

    fn clone_node(&mut self) -> Expect {
        self.advance_nodes();
        let src_doc = self.doc_at(1);
        let Some(node) = self.node(2) else { return Expect::Success };
        let dest_doc = self.doc_at(3);
        let dest_parent = self.node(4).filter(|p| match (self.tree.kind(*p), self.tree.kind(node)) {
            (Some(parent), Some(child)) => is_valid_child_type(parent, child),
            _ => false,
        });
        let deep = self.int(0) != 0;

        let res = self.tree.dom_wrap_clone_node(src_doc, node, dest_doc, dest_parent, deep, 0);
        let mut expect = Expect::from_result(&res);
        self.store_copy(res.ok().flatten());
        if let (Some(parent), Some(copy)) = (dest_parent, self.node(0)) {
            expect = expect.and(self.attach_wrapped(parent, copy));
        }
        expect
    }

    /// Attach a detached node under `parent` when both share a document
    fn attach_wrapped(&mut self, parent: NodeId, node: NodeId) -> Expect {
        let Some(kind) = self.tree.kind(node) else { return Expect::Success };
        if self.tree.parent(node).is_some() || self.tree.doc(node) != self.tree.doc(parent) {
            return Expect::Success;
        }
        let expect = match kind {
            NodeKind::Attribute => Expect::from_result(&self.tree.prepend_prop(parent, node)),
            NodeKind::Text => return Expect::Success,
            _ => Expect::from_result(&self.tree.add_child(parent, node)),
        };
        if !self.tree.contains(node) {
            self.forget(node);
            return expect;
        }
        if self.tree.parent(node) == Some(parent) {
            return expect.and(self.fix(Some(node)));
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

    fn exec(vm: &mut Vm, op: Opcode) {
        vm.execute(op, &mut FuzzInput::new(&[])).unwrap();
    }

    fn hold(vm: &mut Vm, node: arbor_dom::NodeId) {
        vm.advance_nodes();
        vm.set_node(0, Some(node));
    }

    #[test]
    fn test_adopt_into_other_document() {
        let mut vm = Vm::new(VmConfig::default());
        let src = vm.tree_mut().new_doc(None).unwrap();
        let dst = vm.tree_mut().new_doc(None).unwrap();
        let root = vm.tree_mut().new_doc_node(Some(dst), None, Some("r"), None).unwrap().unwrap();
        vm.tree_mut().doc_set_root_element(Some(dst), Some(root)).unwrap();
        let elem = vm.tree_mut().new_doc_node(Some(src), None, Some("e"), None).unwrap().unwrap();

        // node(3) = destination parent, node(2) = its document, node(1) = elem
        hold(&mut vm, root);
        hold(&mut vm, root);
        hold(&mut vm, elem);
        hold(&mut vm, elem);

        exec(&mut vm, Opcode::DomWrapAdoptNode);
        assert_eq!(vm.tree().parent(elem), Some(root));
        assert_eq!(vm.tree().doc(elem), Some(dst));
        // nothing references the source document any more
        assert!(!vm.tree().contains(src));
        vm.finish().unwrap();
    }

    #[test]
    fn test_clone_is_stored_detached() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree_mut().new_doc(None).unwrap();
        let elem = vm.tree_mut().new_doc_node(Some(doc), None, Some("e"), Some("t")).unwrap().unwrap();
        hold(&mut vm, elem);
        hold(&mut vm, elem);
        hold(&mut vm, elem);

        // after the slot is claimed: node(2) is the source, node(3) names
        // the destination document and node(4) is empty
        exec(&mut vm, Opcode::DomWrapCloneNode);
        let clone = vm.node(0).unwrap();
        assert_ne!(clone, elem);
        assert_eq!(vm.tree().parent(clone), None);
        assert_eq!(vm.tree().doc(clone), Some(doc));
        vm.finish().unwrap();
    }

    #[test]
    fn test_element_navigation() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        vm.tree_mut().add_content(a, Some("x")).unwrap();
        let b = vm.tree_mut().new_child(a, None, Some("b"), None).unwrap().unwrap();
        hold(&mut vm, a);

        exec(&mut vm, Opcode::FirstElementChild);
        assert_eq!(vm.node(0), Some(b));
        exec(&mut vm, Opcode::ChildElementCount);
        assert_eq!(vm.int(0), 0);
        vm.finish().unwrap();
    }
}
