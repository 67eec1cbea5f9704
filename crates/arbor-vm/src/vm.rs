//! Interpreter state and run loop
//!
//! One [`Vm`] owns the tree arena and the register file of a single run.
//! Each step reads an opcode, runs it, reclaims whatever the step made
//! unreachable and checks the injector's report against the step's
//! expectation.

use arbor_dom::{DomTree, NodeId, NodeKind, NsId};
use serde::Serialize;
use tracing::{error, info, trace};

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::input::{FuzzInput, truncate_str};
use crate::opcode::Opcode;
use crate::registers::Registers;

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Opcode bytes consumed, unknown ones included
    pub steps: u64,
    /// Unknown or unsupported opcodes
    pub skipped: u64,
    pub releases: u64,
    pub trees_freed: u64,
    pub docs_freed: u64,
    pub content_truncations: u64,
    pub copies_discarded: u64,
    /// Steps during which the injector refused an allocation
    pub alloc_failures: u64,
}

impl RunReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Interpreter for one input
pub struct Vm {
    pub(crate) tree: DomTree,
    pub(crate) regs: Registers,
    pub(crate) config: VmConfig,
    /// Nodes dropped from the registers during the current step
    pub(crate) pending: Vec<NodeId>,
    pub(crate) report: RunReport,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self {
            tree: DomTree::new(),
            regs: Registers::new(),
            config,
            pending: Vec::new(),
            report: RunReport::default(),
        }
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    // ---- register access ----

    /// Node at `offset`, if it is still live
    pub fn node(&self, offset: usize) -> Option<NodeId> {
        (*self.regs.nodes.get(offset)).filter(|n| self.tree.contains(*n))
    }

    /// Owning document of the node at `offset`
    pub(crate) fn doc_at(&self, offset: usize) -> Option<NodeId> {
        self.tree.doc(self.node(offset)?)
    }

    /// Attribute at `offset`, or the first attribute of an element there
    pub(crate) fn attr_at(&self, offset: usize) -> Option<NodeId> {
        let node = self.node(offset)?;
        match self.tree.kind(node)? {
            NodeKind::Attribute => Some(node),
            NodeKind::Element => self.tree.properties(node),
            _ => None,
        }
    }

    /// DTD at `offset`, or the subset of the document of the node there
    pub(crate) fn dtd_at(&self, offset: usize) -> Option<NodeId> {
        let node = self.node(offset)?;
        if self.tree.kind(node) == Some(NodeKind::Dtd) {
            return Some(node);
        }
        let doc = self.tree.doc(node)?;
        let data = self.tree.get(doc)?.doc_data()?;
        data.int_subset.or(data.ext_subset)
    }

    /// Store a node, releasing the one it displaces
    pub(crate) fn set_node(&mut self, offset: usize, node: Option<NodeId>) {
        let old = *self.regs.nodes.get(offset);
        if old != node {
            self.regs.nodes.replace(offset, node);
            self.release(old);
        }
    }

    /// Claim a fresh node slot, releasing its previous occupant
    pub(crate) fn advance_nodes(&mut self) {
        let evicted = self.regs.nodes.advance();
        self.release(evicted);
    }

    #[inline]
    pub fn int(&self, offset: usize) -> i32 {
        *self.regs.ints.get(offset)
    }

    #[inline]
    pub(crate) fn set_int(&mut self, offset: usize, value: i32) {
        self.regs.ints.replace(offset, value);
    }

    #[inline]
    pub(crate) fn advance_ints(&mut self) {
        self.regs.ints.advance();
    }

    /// Owned copy of the string at `offset`
    pub fn string(&self, offset: usize) -> Option<String> {
        self.regs.strings.get(offset).clone()
    }

    #[inline]
    pub(crate) fn advance_strings(&mut self) {
        self.regs.strings.advance();
    }

    /// Store a bounded copy of `value`
    pub(crate) fn copy_str(&mut self, offset: usize, value: Option<&str>) {
        let value = value.map(|v| truncate_str(v, self.config.max_string).to_owned());
        self.regs.strings.replace(offset, value);
    }

    /// Store an operation result, dropping oversized strings
    pub(crate) fn move_str(&mut self, offset: usize, value: Option<String>) {
        let value = value.filter(|v| v.len() <= self.config.max_result_string);
        self.regs.strings.replace(offset, value);
    }

    /// The `k`-th namespace declaration visible from an element
    ///
    /// Walks the element's declarations, then those of its element
    /// ancestors. Past the end the last declaration found is returned.
    pub(crate) fn node_ns(&self, node: Option<NodeId>, k: i32) -> Option<NsId> {
        let mut cur = node.filter(|n| self.tree.kind(*n) == Some(NodeKind::Element));
        let mut found = None;
        let mut i = 0;
        while let Some(elem) = cur {
            for &ns in self.tree.get(elem)?.ns_defs() {
                found = Some(ns);
                if i == k {
                    return found;
                }
                i += 1;
            }
            cur = self.tree.parent(elem).filter(|p| self.tree.kind(*p) == Some(NodeKind::Element));
        }
        found
    }

    // ---- stepping ----

    /// Read and run one opcode
    pub fn step(&mut self, input: &mut FuzzInput<'_>) -> VmResult<()> {
        let byte = input.read_byte();
        match Opcode::from_byte(byte) {
            Some(op) => self.execute(op, input),
            None => {
                trace!("skipping unknown opcode {}", byte);
                self.report.steps += 1;
                self.report.skipped += 1;
                Ok(())
            }
        }
    }

    /// Run one opcode and check its allocation-failure expectation
    pub fn execute(&mut self, op: Opcode, input: &mut FuzzInput<'_>) -> VmResult<()> {
        self.tree.injector_mut().reset_failed();
        let expect = self.dispatch(op, input);
        self.settle();
        self.report.steps += 1;

        let reported = self.tree.injector().failed();
        self.tree.injector_mut().reset_failed();
        if reported {
            self.report.alloc_failures += 1;
        }
        trace!(op = op.name(), ?expect, reported, "{}", self.regs.snapshot());

        if !expect.holds(reported) {
            let operands = self.regs.snapshot();
            error!("{}: allocation failure expectation {:?} violated ({})", op, expect, operands);
            return Err(VmError::FailureMismatch {
                op: op.name(),
                operands,
                reported,
            });
        }
        if self.config.check_consistency {
            self.check_handles(op)?;
        }
        Ok(())
    }

    /// Every node register must resolve
    fn check_handles(&self, op: Opcode) -> VmResult<()> {
        if let Some((slot, node)) = self.regs.held_nodes().find(|(_, n)| !self.tree.contains(*n)) {
            error!("{}: register {} holds freed node {}", op, slot, node);
            return Err(VmError::DanglingHandle { op: op.name(), slot });
        }
        Ok(())
    }

    /// Drain every register and reclaim what they kept alive
    pub fn finish(mut self) -> VmResult<RunReport> {
        for slot in self.regs.strings.slots_mut() {
            *slot = None;
        }
        for slot in 0..self.regs.nodes.slots().len() {
            let node = self.regs.nodes.slots_mut()[slot].take();
            self.release(node);
        }
        self.settle();

        if self.config.check_consistency {
            let nodes = self.tree.live_nodes();
            let namespaces = self.tree.live_namespaces();
            if nodes != 0 || namespaces != 0 {
                error!("{} nodes and {} namespaces left after drain", nodes, namespaces);
                return Err(VmError::Leak { nodes, namespaces });
            }
        }
        info!(
            steps = self.report.steps,
            skipped = self.report.skipped,
            trees_freed = self.report.trees_freed,
            docs_freed = self.report.docs_freed,
            alloc_failures = self.report.alloc_failures,
            "run finished"
        );
        Ok(self.report)
    }
}

/// Interpret one fuzz input
///
/// The first four bytes seed the allocation budget; the rest is a flat
/// sequence of opcodes and their literal operands.
pub fn run(data: &[u8], config: &VmConfig) -> VmResult<RunReport> {
    let mut input = FuzzInput::new(data);
    let seed = input.read_int(4);
    let mut vm = Vm::new(config.clone());
    if config.use_budget {
        let limit = config.budget_for(seed, data.len());
        vm.tree.injector_mut().set_limit(limit);
    }
    while !input.is_empty() {
        vm.step(&mut input)?;
    }
    vm.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let report = run(&[], &VmConfig::default()).unwrap();
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn test_unknown_opcodes_are_skipped() {
        let report = run(&[0, 0, 0, 0, 0xFF, 0xFE], &VmConfig::default()).unwrap();
        assert_eq!(report.steps, 2);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_set_node_releases_displaced() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree.new_node(None, Some("a")).unwrap().unwrap();
        let b = vm.tree.new_node(None, Some("b")).unwrap().unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(a));
        vm.set_node(0, Some(a));
        assert!(vm.tree.contains(a));
        vm.set_node(0, Some(b));
        assert!(!vm.tree.contains(a));
        assert_eq!(vm.node(0), Some(b));
        vm.finish().unwrap();
    }

    #[test]
    fn test_move_str_drops_oversized() {
        let mut vm = Vm::new(VmConfig::default());
        vm.advance_strings();
        vm.move_str(0, Some("x".repeat(1001)));
        assert_eq!(vm.string(0), None);
        vm.move_str(0, Some("x".repeat(1000)));
        assert_eq!(vm.string(0).map(|s| s.len()), Some(1000));
        vm.copy_str(0, Some("y".repeat(300).as_str()));
        assert_eq!(vm.string(0).map(|s| s.len()), Some(100));
    }

    #[test]
    fn test_node_ns_walks_ancestors() {
        let mut vm = Vm::new(VmConfig::default());
        let a = vm.tree.new_node(None, Some("a")).unwrap().unwrap();
        let x = vm.tree.new_ns(Some(a), Some("urn:x"), Some("x")).unwrap().unwrap();
        let y = vm.tree.new_ns(Some(a), Some("urn:y"), Some("y")).unwrap().unwrap();
        let b = vm.tree.new_child(a, None, Some("b"), None).unwrap().unwrap();
        let z = vm.tree.new_ns(Some(b), Some("urn:z"), Some("z")).unwrap().unwrap();

        assert_eq!(vm.node_ns(Some(b), 0), Some(z));
        assert_eq!(vm.node_ns(Some(b), 1), Some(x));
        assert_eq!(vm.node_ns(Some(b), 2), Some(y));
        assert_eq!(vm.node_ns(Some(b), 9), Some(y));
        assert_eq!(vm.node_ns(Some(a), -1), Some(y));
        assert_eq!(vm.node_ns(None, 0), None);
        vm.tree.free_node(a);
    }
}
