//! Copies
//!
//! Single copies go through the copy-size cap before they are stored.
//! List copies are freed right away; only the allocation report matters.

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn copy(&mut self, op: Opcode) -> Expect {
        let k = self.int(0);
        match op {
            Opcode::CopyNodeList => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let res = self.tree.copy_node_list(node);
                let expect = Expect::from_result(&res);
                self.free_list(res.unwrap_or_default());
                expect
            }
            Opcode::DocCopyNodeList => {
                let doc = self.doc_at(0);
                let Some(node) = self.node(1) else { return Expect::Success };
                let res = self.tree.doc_copy_node_list(doc, node);
                let expect = Expect::from_result(&res);
                self.free_list(res.unwrap_or_default());
                expect
            }
            Opcode::CopyPropList => {
                let target = self.node(0);
                let Some(attr) = self.attr_at(1) else { return Expect::Success };
                let res = self.tree.copy_prop_list(target, attr);
                let expect = Expect::from_result(&res);
                self.free_list(res.unwrap_or_default());
                expect
            }
            _ => self.copy_one(op, k),
        }
    }

    fn copy_one(&mut self, op: Opcode, k: i32) -> Expect {
        self.advance_nodes();
        let res = match op {
            Opcode::CopyDoc => match self.doc_at(1) {
                Some(doc) => self.tree.copy_doc(doc, k != 0),
                None => Ok(None),
            },
            Opcode::CopyNode => match self.node(1) {
                Some(node) => self.tree.copy_node(node, k),
                None => Ok(None),
            },
            Opcode::DocCopyNode => {
                let doc = self.doc_at(2);
                match self.node(1) {
                    Some(node) => self.tree.doc_copy_node(node, doc, k),
                    None => Ok(None),
                }
            }
            Opcode::CopyProp => {
                let target = self.node(1);
                match self.attr_at(2) {
                    Some(attr) => self.tree.copy_prop(target, attr),
                    None => Ok(None),
                }
            }
            Opcode::CopyDtd => match self.dtd_at(1) {
                Some(dtd) => self.tree.copy_dtd(dtd),
                None => Ok(None),
            },
            _ => return Expect::Unknown,
        };

        let expect = Expect::from_result(&res);
        let copy = res.ok().flatten();
        if let Some(c) = copy.filter(|_| op == Opcode::CopyProp) {
            // the copy stays detached, so it may not keep a foreign namespace
            self.tree.set_ns(c, None).ok();
        }
        self.store_copy(copy);
        expect
    }
}
