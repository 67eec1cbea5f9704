//! Attribute lookups and mutators
//!
//! Setting an attribute replaces the children of an existing one, and
//! removing one frees it whole; registers pointing into either are cleared
//! before the call.

use arbor_dom::{NodeKind, NsId};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

/// Status integer of a removal
fn removal_status(removed: bool) -> i32 {
    if removed { 0 } else { -1 }
}

impl Vm {
    pub(super) fn attr(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::HasProp | Opcode::HasNsProp => {
                self.advance_nodes();
                let (name, href) = (self.string(0), self.string(1));
                let found = match (self.node(1), name) {
                    (Some(elem), Some(name)) if op == Opcode::HasProp => self.tree.has_prop(elem, &name),
                    (Some(elem), Some(name)) => self.tree.has_ns_prop(elem, &name, href.as_deref()),
                    _ => None,
                };
                self.set_node(0, found);
                Expect::Success
            }
            Opcode::GetProp | Opcode::GetNsProp | Opcode::GetNoNsProp => {
                self.advance_strings();
                let (name, href) = (self.string(1), self.string(2));
                let (Some(elem), Some(name)) = (self.node(0), name) else {
                    return Expect::Success;
                };
                let res = match op {
                    Opcode::GetProp => self.tree.get_prop(elem, &name),
                    Opcode::GetNsProp => self.tree.get_ns_prop(elem, &name, href.as_deref()),
                    _ => self.tree.get_no_ns_prop(elem, &name),
                };
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::SetProp => {
                self.advance_nodes();
                let elem = self.node(1);
                let (name, value) = (self.string(0), self.string(1));
                if let (Some(elem), Some(name)) = (elem, name.as_deref()) {
                    let target = self.tree.set_prop_target(elem, name);
                    self.forget_subtree(target, false);
                }
                let res = self.tree.set_prop(elem, name.as_deref(), value.as_deref());
                let expect = Expect::from_result(&res);
                self.set_node(0, res.ok().flatten());
                expect
            }
            Opcode::SetNsProp => {
                self.advance_nodes();
                let elem = self.node(1);
                let ns = self.node_ns(self.node(2), self.int(0));
                let (name, value) = (self.string(0), self.string(1));
                if let (Some(elem), Some(name)) = (elem, name.as_deref()) {
                    let href = self.ns_href(ns);
                    let target = self.tree.find_prop(elem, name, href.as_deref());
                    self.forget_subtree(target, false);
                }
                let res = self.tree.set_ns_prop(elem, ns, name.as_deref(), value.as_deref());
                let mut expect = Expect::from_result(&res);
                let attr = res.ok().flatten();
                self.set_node(0, attr);
                if ns.is_some() {
                    expect = expect.and(self.fix(attr));
                }
                expect
            }
            Opcode::RemoveProp => {
                self.advance_ints();
                let attr = self
                    .node(0)
                    .filter(|a| self.tree.kind(*a) == Some(NodeKind::Attribute) && self.tree.parent(*a).is_some());
                let Some(attr) = attr else {
                    self.set_int(0, -1);
                    return Expect::Success;
                };
                let parent = self.tree.parent(attr);
                self.forget_subtree(Some(attr), true);
                let res = self.tree.remove_prop(attr);
                self.set_int(0, removal_status(res.is_ok()));
                self.release(parent);
                Expect::from_result(&res)
            }
            Opcode::UnsetProp | Opcode::UnsetNsProp => {
                self.advance_ints();
                let elem = self.node(0);
                let ns = match op {
                    Opcode::UnsetNsProp => self.node_ns(self.node(1), self.int(1)),
                    _ => None,
                };
                let (Some(elem), Some(name)) = (elem, self.string(0)) else {
                    self.set_int(0, -1);
                    return Expect::Success;
                };
                let href = self.ns_href(ns);
                let target = self.tree.find_prop(elem, &name, href.as_deref());
                self.forget_subtree(target, true);
                let res = self.tree.unset_ns_prop(elem, ns, &name);
                self.set_int(0, removal_status(matches!(res, Ok(true))));
                Expect::from_result(&res)
            }
            _ => Expect::Unknown,
        }
    }

    /// Namespace URI of a declaration, owned
    pub(crate) fn ns_href(&self, ns: Option<NsId>) -> Option<String> {
        ns.and_then(|ns| self.tree.namespace(ns)?.href().map(str::to_owned))
    }
}
