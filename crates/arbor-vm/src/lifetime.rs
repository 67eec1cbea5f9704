//! Reachability reclamation
//!
//! No reference counts: whenever a register lets go of a node, the node
//! registers are scanned. A tree is freed once no register holds a node of
//! that tree; a document is freed once no register holds a node it owns.
//! The two checks share one scan.

use arbor_dom::{NodeId, NodeKind};
use tracing::{debug, trace};

use crate::guards::is_installed_subset;
use crate::vm::Vm;

impl Vm {
    /// Reclaim the tree and document of a node no longer held by the
    /// register it was taken from
    pub(crate) fn release(&mut self, node: Option<NodeId>) {
        let Some(node) = node else { return };
        if !self.tree.contains(node) || self.tree.is_predefined(node) {
            return;
        }
        self.report.releases += 1;

        let root = self.tree.tree_root(node);
        let doc = self.tree.doc(node);
        let mut doc_referenced = false;
        for (_, other) in self.regs.held_nodes() {
            if !self.tree.contains(other) {
                continue;
            }
            if self.tree.tree_root(other) == root {
                trace!("tree {} still held by {}", root, other);
                return;
            }
            if doc.is_some() && self.tree.doc(other) == doc {
                doc_referenced = true;
            }
        }

        let owned_elsewhere = Some(root) == doc
            || self.tree.kind(root).is_some_and(NodeKind::is_declaration)
            || is_installed_subset(&self.tree, root);
        if !owned_elsewhere {
            debug!("freeing unreachable tree {}", root);
            self.tree.free_node(root);
            self.report.trees_freed += 1;
        }

        if let Some(doc) = doc.filter(|d| !doc_referenced && self.tree.contains(*d)) {
            debug!("freeing unreferenced document {}", doc);
            self.tree.free_doc(doc);
            self.report.docs_freed += 1;
        }
    }

    /// Clear every register holding `node` without freeing anything
    ///
    /// Used around calls that free `node` themselves.
    pub(crate) fn forget(&mut self, node: NodeId) {
        let mut hit = false;
        for slot in self.regs.nodes.slots_mut() {
            if *slot == Some(node) {
                *slot = None;
                hit = true;
            }
        }
        if hit {
            self.pending.push(node);
        }
    }

    /// Clear every register holding a descendant of `root`, and `root`
    /// itself when `include_self` is set
    ///
    /// Attributes count as descendants of their element.
    pub(crate) fn forget_subtree(&mut self, root: Option<NodeId>, include_self: bool) {
        let Some(root) = root else { return };
        if !include_self && self.tree.first_child(root).is_none() {
            return;
        }
        for slot in 0..self.regs.nodes.slots().len() {
            let Some(node) = self.regs.nodes.slots()[slot] else { continue };
            let hit = if node == root {
                include_self
            } else {
                self.tree.is_ancestor_or_self(root, node)
            };
            if hit {
                self.regs.nodes.slots_mut()[slot] = None;
                self.pending.push(node);
            }
        }
    }

    /// Release forgotten nodes that survived the step
    pub(crate) fn settle(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for node in pending {
            if self.tree.contains(node) {
                self.release(Some(node));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::vm::Vm;

    fn hold(vm: &mut Vm, node: arbor_dom::NodeId) {
        vm.advance_nodes();
        vm.set_node(0, Some(node));
    }

    #[test]
    fn test_shared_tree_freed_with_last_holder() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree.new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree.new_child(a, None, Some("b"), None).unwrap().unwrap();
        hold(&mut vm, a);
        hold(&mut vm, b);

        vm.set_node(1, None);
        assert!(vm.tree.contains(a));
        vm.set_node(0, None);
        assert!(!vm.tree.contains(a));
        assert_eq!(vm.report.trees_freed, 1);
    }

    #[test]
    fn test_document_outlives_detached_tree() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree.new_doc(None).unwrap();
        let root = vm.tree.new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        vm.tree.doc_set_root_element(Some(doc), Some(root)).unwrap();
        let loose = vm.tree.new_doc_node(Some(doc), None, Some("x"), None).unwrap().unwrap();
        hold(&mut vm, root);
        hold(&mut vm, loose);

        // loose is its own tree but shares the document with root
        vm.set_node(0, None);
        assert!(!vm.tree.contains(loose));
        assert!(vm.tree.contains(doc));

        vm.set_node(1, None);
        assert!(!vm.tree.contains(doc));
        assert!(!vm.tree.contains(root));
        assert_eq!(vm.tree.live_nodes(), 0);
    }

    #[test]
    fn test_installed_subset_not_freed_alone() {
        let mut vm = Vm::new(VmConfig::default());
        let doc = vm.tree.new_doc(None).unwrap();
        let ext = vm.tree.new_dtd(Some(doc), Some("r"), None, Some("r.dtd")).unwrap().unwrap();
        let root = vm.tree.new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        vm.tree.doc_set_root_element(Some(doc), Some(root)).unwrap();
        hold(&mut vm, ext);
        hold(&mut vm, root);

        vm.set_node(1, None);
        assert!(vm.tree.contains(ext));
        vm.set_node(0, None);
        assert_eq!(vm.tree.live_nodes(), 0);
    }

    #[test]
    fn test_forget_subtree() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree.new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree.new_child(a, None, Some("b"), None).unwrap().unwrap();
        let c = vm.tree.new_child(b, None, Some("c"), None).unwrap().unwrap();
        hold(&mut vm, a);
        hold(&mut vm, b);
        hold(&mut vm, c);

        vm.forget_subtree(Some(b), false);
        assert_eq!(vm.node(0), None);
        assert_eq!(vm.node(1), Some(b));
        vm.forget_subtree(Some(b), true);
        assert_eq!(vm.node(1), None);
        assert_eq!(vm.node(2), Some(a));

        vm.settle();
        assert!(vm.tree.contains(c));
        vm.finish().unwrap();
    }

    #[test]
    fn test_forget_then_settle_reclaims_survivors() {
        let mut vm = Vm::new(VmConfig::default());
        let t = vm.tree.new_text(Some("t")).unwrap();
        hold(&mut vm, t);
        vm.forget(t);
        assert_eq!(vm.node(0), None);
        assert!(vm.tree.contains(t));
        vm.settle();
        assert!(!vm.tree.contains(t));
    }
}
