//! Namespace declarations

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn namespace(&mut self, op: Opcode) -> Expect {
        let (s0, s1) = (self.string(0), self.string(1));
        match op {
            Opcode::NewNs => {
                let node = self.node(0);
                let res = self.tree.new_ns(node, s0.as_deref(), s1.as_deref());
                if let (None, Ok(Some(ns))) = (node, &res) {
                    self.tree.free_ns(*ns);
                }
                Expect::from_result(&res)
            }
            Opcode::SearchNs => {
                let Some(node) = self.node(1) else { return Expect::Success };
                Expect::from_result(&self.tree.search_ns(node, s0.as_deref()))
            }
            Opcode::SearchNsByHref => {
                let (Some(node), Some(href)) = (self.node(1), s0) else {
                    return Expect::Success;
                };
                Expect::from_result(&self.tree.search_ns_by_href(node, &href))
            }
            Opcode::GetNsList | Opcode::GetNsListSafe => {
                let Some(node) = self.node(1) else { return Expect::Success };
                Expect::from_result(&self.tree.get_ns_list(node))
            }
            Opcode::SetNs => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let ns = self.node_ns(self.node(1), self.int(0));
                let expect = Expect::from_result(&self.tree.set_ns(node, ns));
                if ns.is_some() {
                    expect.and(self.fix(Some(node)))
                } else {
                    expect
                }
            }
            Opcode::CopyNamespace => {
                let Some(ns) = self.node_ns(self.node(0), self.int(0)) else {
                    return Expect::Success;
                };
                let res = self.tree.copy_namespace(ns);
                if let Ok(Some(copy)) = res {
                    self.tree.free_ns(copy);
                }
                Expect::from_result(&res)
            }
            Opcode::CopyNamespaceList => {
                let Some(ns) = self.node_ns(self.node(0), self.int(0)) else {
                    return Expect::Success;
                };
                let res = self.tree.copy_namespace_list(ns);
                let expect = Expect::from_result(&res);
                for copy in res.ok().flatten().unwrap_or_default() {
                    self.tree.free_ns(copy);
                }
                expect
            }
            _ => Expect::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    #[test]
    fn test_namespace_copies_do_not_leak() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        vm.tree_mut().new_ns(Some(a), Some("urn:x"), Some("x")).unwrap();
        vm.tree_mut().new_ns(Some(a), Some("urn:y"), Some("y")).unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(a));

        let before = vm.tree().live_namespaces();
        vm.execute(Opcode::CopyNamespace, &mut FuzzInput::new(&[])).unwrap();
        vm.execute(Opcode::CopyNamespaceList, &mut FuzzInput::new(&[])).unwrap();
        assert_eq!(vm.tree().live_namespaces(), before);
        vm.finish().unwrap();
    }

    #[test]
    fn test_set_ns_moves_declaration_into_scope() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree_mut().new_node(None, Some("a")).unwrap().unwrap();
        let x = vm.tree_mut().new_ns(Some(a), Some("urn:x"), Some("x")).unwrap().unwrap();
        let b = vm.tree_mut().new_node(None, Some("b")).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(a));
        vm.advance_nodes();
        vm.set_node(0, Some(b));

        vm.execute(Opcode::SetNs, &mut FuzzInput::new(&[])).unwrap();
        let ns = vm.tree().node_ns(b).unwrap();
        assert_ne!(ns, x);
        assert_eq!(vm.tree().namespace(ns).unwrap().href(), Some("urn:x"));
        vm.finish().unwrap();
    }
}
