//! Structural mutation
//!
//! Attaches are vetted by the guards first; a rejected attach runs the
//! call with no node so the tree is left as it was. After a move the node
//! gets its namespaces fixed up and its former home is released. A text
//! node merged into a neighbour is freed by the tree, so its registers are
//! cleared first.

use arbor_dom::{NodeId, NodeKind};

use crate::expect::Expect;
use crate::guards::{is_dtd_child, is_installed_subset, is_valid_child};
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn tree_op(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::UnlinkNode => self.unlink_node(),
            Opcode::AddChild | Opcode::AddSibling | Opcode::AddPrevSibling | Opcode::AddNextSibling => {
                self.attach(op)
            }
            Opcode::ReplaceNode => self.replace_node(),
            Opcode::TextMerge => {
                let (Some(first), Some(second)) = (self.node(0), self.node(1)) else {
                    return Expect::Success;
                };
                let (parent, doc) = self.home(Some(second));
                let res = self.tree.text_merge(first, second);
                let expect = Expect::from_result(&res);
                if matches!(res, Ok(Some(_))) {
                    self.forget(second);
                    self.release_home(parent, doc);
                    self.cap_content(Some(first));
                }
                expect
            }
            Opcode::TextConcat => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let text = self.string(0);
                let expect = Expect::from_result(&self.tree.text_concat(node, text.as_deref()));
                self.cap_content(Some(node));
                expect
            }
            Opcode::StringGetNodeList | Opcode::StringLenGetNodeList => {
                let doc = self.doc_at(0);
                let Some(value) = self.string(0) else { return Expect::Success };
                let res = self.tree.string_get_node_list(doc, &value);
                let expect = Expect::from_result(&res);
                self.free_list(res.unwrap_or_default());
                expect
            }
            Opcode::NodeListGetString | Opcode::NodeListGetRawString => {
                self.advance_strings();
                let head = self.node(1);
                let in_line = self.int(0) != 0;
                let raw = op == Opcode::NodeListGetRawString;
                let res = self.tree.node_list_get_string(head, in_line, raw);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok());
                expect
            }
            // a list attach cannot be vetted node by node up front
            Opcode::AddChildList => Expect::Unknown,
            _ => Expect::Unknown,
        }
    }

    fn unlink_node(&mut self) -> Expect {
        let node = self.node(0).filter(|n| {
            !is_dtd_child(&self.tree, Some(*n)) && !is_installed_subset(&self.tree, *n)
        });
        let Some(node) = node else { return Expect::Success };
        let parent = self.tree.parent(node);
        let mut expect = Expect::from_result(&self.tree.unlink(node));
        if self.tree.parent(node) != parent {
            expect = expect.and(self.fix(Some(node)));
            self.release(parent);
        }
        expect
    }

    /// Insert node(1) relative to node(0)
    fn attach(&mut self, op: Opcode) -> Expect {
        let Some(target) = self.node(0) else { return Expect::Success };
        let parent = match op {
            Opcode::AddChild => Some(target),
            _ => self.tree.parent(target),
        };
        let node = self.node(1).filter(|n| {
            parent.is_some()
                && !is_dtd_child(&self.tree, Some(*n))
                && is_valid_child(&self.tree, parent, Some(*n))
                && self.attr_pairing_ok(op, target, *n)
        });
        let Some(node) = node else { return Expect::Success };
        if let Some(parent) = parent {
            self.forget_replaced_prop(parent, node);
        }

        let (old_parent, old_doc) = self.home(Some(node));
        let res = match op {
            Opcode::AddChild => self.tree.add_child(target, node),
            Opcode::AddSibling => self.tree.add_sibling(target, node),
            Opcode::AddPrevSibling => self.tree.add_prev_sibling(target, node),
            _ => self.tree.add_next_sibling(target, node),
        };
        let mut expect = Expect::from_result(&res);
        let landed = res.ok().flatten();

        if !self.tree.contains(node) {
            // merged into a neighbour
            self.forget(node);
            self.release_home(old_parent, old_doc);
            self.cap_content(landed);
        } else if self.home(Some(node)) != (old_parent, old_doc) {
            expect = expect.and(self.fix(Some(node)));
            self.release_home(old_parent, old_doc);
        }
        expect
    }

    /// Attributes go next to attributes; children of an element either way
    fn attr_pairing_ok(&self, op: Opcode, target: NodeId, node: NodeId) -> bool {
        if op == Opcode::AddChild {
            return true;
        }
        let is_attr = |n| self.tree.kind(n) == Some(NodeKind::Attribute);
        is_attr(target) == is_attr(node)
    }

    /// An attribute attached to `elem` destroys the one it shadows
    fn forget_replaced_prop(&mut self, elem: NodeId, node: NodeId) {
        if self.tree.kind(node) != Some(NodeKind::Attribute) || self.tree.kind(elem) != Some(NodeKind::Element) {
            return;
        }
        let Some(name) = self.tree.get(node).and_then(|n| n.name().map(str::to_owned)) else {
            return;
        };
        let href = self.ns_href(self.tree.node_ns(node));
        let existing = self.tree.find_prop(elem, &name, href.as_deref());
        if let Some(existing) = existing.filter(|e| *e != node) {
            self.forget_subtree(Some(existing), true);
        }
    }

    fn replace_node(&mut self) -> Expect {
        let old = self.node(0).filter(|n| {
            !is_dtd_child(&self.tree, Some(*n)) && !is_installed_subset(&self.tree, *n)
        });
        let Some(old) = old else { return Expect::Success };
        let old_parent = self.tree.parent(old);
        let node = self.node(1).filter(|n| {
            !is_dtd_child(&self.tree, Some(*n)) && is_valid_child(&self.tree, old_parent, Some(*n))
        });
        if let (Some(parent), Some(node)) = (old_parent, node) {
            self.forget_replaced_prop(parent, node);
        }

        let (node_parent, node_doc) = self.home(node);
        let res = self.tree.replace_node(old, node);
        let mut expect = Expect::from_result(&res);

        if self.tree.parent(old) != old_parent {
            expect = expect.and(self.fix(Some(old)));
        }
        match node {
            None => self.release(old_parent),
            Some(node) if self.home(Some(node)) != (node_parent, node_doc) => {
                expect = expect.and(self.fix(Some(node)));
                self.release_home(node_parent, node_doc);
            }
            Some(_) => {}
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
    fn test_add_child_moves_between_trees() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree_mut().new_node(None, Some("b")).unwrap().unwrap();
        let c = vm.tree_mut().new_child(b, None, Some("c"), None).unwrap().unwrap();
        hold(&mut vm, c);
        hold(&mut vm, a);

        // node(0) = a, node(1) = c
        exec(&mut vm, Opcode::AddChild);
        assert_eq!(vm.tree().parent(c), Some(a));
        // nothing holds b any more
        assert!(!vm.tree().contains(b));
        vm.finish().unwrap();
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree_mut().new_child(a, None, Some("b"), None).unwrap().unwrap();
        hold(&mut vm, a);
        hold(&mut vm, b);

        exec(&mut vm, Opcode::AddChild);
        assert_eq!(vm.tree().parent(b), Some(a));
        assert_eq!(vm.tree().parent(a), None);
        vm.finish().unwrap();
    }

    #[test]
    fn test_merged_text_is_forgotten() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let t1 = vm.tree_mut().new_text(Some("x")).unwrap();
        vm.tree_mut().add_child(a, t1).unwrap();
        let t2 = vm.tree_mut().new_text(Some("y")).unwrap();
        hold(&mut vm, t2);
        hold(&mut vm, a);

        exec(&mut vm, Opcode::AddChild);
        assert!(!vm.tree().contains(t2));
        assert_eq!(vm.node(1), None);
        assert_eq!(vm.tree_mut().get_content(t1).unwrap().as_deref(), Some("xy"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_unlink_releases_old_parent() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree_mut().new_child(a, None, Some("b"), None).unwrap().unwrap();
        hold(&mut vm, b);

        exec(&mut vm, Opcode::UnlinkNode);
        assert_eq!(vm.tree().parent(b), None);
        assert!(!vm.tree().contains(a));
        vm.finish().unwrap();
    }

    #[test]
    fn test_text_merge_frees_second() {
        let mut vm = Vm::new(VmConfig::default());
        let t1 = vm.tree_mut().new_text(Some("x")).unwrap();
        let t2 = vm.tree_mut().new_text(Some("y")).unwrap();
        hold(&mut vm, t2);
        hold(&mut vm, t1);

        exec(&mut vm, Opcode::TextMerge);
        assert!(!vm.tree().contains(t2));
        assert_eq!(vm.node(1), None);
        assert_eq!(vm.tree_mut().get_content(t1).unwrap().as_deref(), Some("xy"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_replace_node_swaps_in_place() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let old = vm.tree_mut().new_child(a, None, Some("old"), None).unwrap().unwrap();
        let new = vm.tree_mut().new_node(None, Some("new")).unwrap().unwrap();
        hold(&mut vm, a);
        hold(&mut vm, new);
        hold(&mut vm, old);

        exec(&mut vm, Opcode::ReplaceNode);
        assert_eq!(vm.tree().parent(new), Some(a));
        assert_eq!(vm.tree().parent(old), None);
        vm.finish().unwrap();
    }
}
