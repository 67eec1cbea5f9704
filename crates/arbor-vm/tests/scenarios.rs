//! End-to-end interpreter scenarios
//!
//! Programs are encoded with `ProgramBuilder` and stepped one opcode at a
//! time so the registers can be inspected between steps.

use arbor_dom::NodeKind;
use arbor_vm::{FuzzInput, Opcode, ProgramBuilder, Vm, VmConfig, VmError, count_nodes};

/// Run a program (seed included) on a fresh interpreter
fn load(program: &[u8]) -> Vm {
    let mut vm = Vm::new(VmConfig::default());
    let mut input = FuzzInput::new(program);
    input.read_int(4);
    while !input.is_empty() {
        vm.step(&mut input).unwrap();
    }
    vm
}

fn exec(vm: &mut Vm, op: Opcode) {
    vm.execute(op, &mut FuzzInput::new(&[])).unwrap();
}

#[test]
fn test_document_with_root_element() {
    let program = ProgramBuilder::new(0)
        .op(Opcode::NewDoc)
        .string("root")
        .op(Opcode::NewDocNode)
        // the document back at the head, the element right behind it
        .dup_node(1)
        .op(Opcode::DocSetRootElement)
        .build();
    let vm = load(&program);

    let doc = vm.node(1).unwrap();
    let root = vm.node(2).unwrap();
    assert_eq!(vm.node(0), None);
    assert_eq!(vm.tree().kind(doc), Some(NodeKind::Document));
    assert_eq!(vm.tree().doc_get_root_element(Some(doc)), Some(root));
    assert_eq!(vm.tree().tree_root(root), doc);
    assert_eq!(vm.tree().live_nodes(), 2);

    let report = vm.finish().unwrap();
    assert_eq!(report.docs_freed, 1);
    assert_eq!(report.trees_freed, 0);
}

#[test]
fn test_appended_text_is_capped() {
    let chunk = "x".repeat(75);
    let program = ProgramBuilder::new(0)
        .string("")
        .op(Opcode::NewText)
        .string(&chunk)
        .op(Opcode::NodeAddContent)
        .build();
    let mut vm = load(&program);
    let text = vm.node(0).unwrap();
    assert_eq!(vm.tree().get(text).unwrap().content().map(str::len), Some(75));

    exec(&mut vm, Opcode::NodeAddContent);
    assert_eq!(vm.tree().get(text).unwrap().content(), Some(""));
    let report = vm.finish().unwrap();
    assert_eq!(report.content_truncations, 1);
}

#[test]
fn test_doubling_copies_are_discarded() {
    let program = ProgramBuilder::new(0)
        .string("e")
        .op(Opcode::NewNode)
        .int(1)
        .build();
    let mut vm = load(&program);

    for round in 1..=7u32 {
        exec(&mut vm, Opcode::CopyNode);
        match vm.node(0) {
            Some(copy) => {
                assert!(round < 7);
                assert_eq!(count_nodes(vm.tree(), copy), 1 << (round - 1));
            }
            None => assert_eq!(round, 7),
        }
        // the previous tree goes under its copy
        exec(&mut vm, Opcode::AddChild);
    }
    let report = vm.finish().unwrap();
    assert_eq!(report.copies_discarded, 1);
}

#[test]
fn test_text_merge_forgets_second() {
    let program = ProgramBuilder::new(0)
        .string("a")
        .op(Opcode::NewText)
        .dup_node(0)
        .string("b")
        .op(Opcode::NewText)
        .build();
    let mut vm = load(&program);
    let first = vm.node(0).unwrap();
    let second = vm.node(1).unwrap();
    assert_eq!(vm.node(2), Some(second));

    exec(&mut vm, Opcode::TextMerge);
    assert!(!vm.tree().contains(second));
    assert_eq!(vm.node(1), None);
    assert_eq!(vm.node(2), None);
    assert_eq!(vm.tree().get(first).unwrap().content(), Some("ba"));
    vm.finish().unwrap();
}

#[test]
fn test_next_sibling_coalesces_into_text_neighbour() {
    let program = ProgramBuilder::new(0)
        .string("p")
        .op(Opcode::NewNode)
        .string("a")
        .op(Opcode::NewText)
        .dup_node(1)
        .op(Opcode::AddChild)
        .string("b")
        .op(Opcode::NewText)
        .dup_node(2)
        .build();
    let mut vm = load(&program);
    let first = vm.node(0).unwrap();
    let second = vm.node(1).unwrap();
    let parent = vm.node(2).unwrap();
    assert_eq!(vm.tree().parent(first), Some(parent));

    exec(&mut vm, Opcode::AddNextSibling);
    assert!(!vm.tree().contains(second));
    assert_eq!(vm.node(1), None);
    assert_eq!(vm.tree().get(first).unwrap().content(), Some("ab"));
    assert_eq!(vm.tree().children(parent), vec![first]);
    vm.finish().unwrap();
}

#[test]
fn test_self_duplicate_aliases() {
    let program = ProgramBuilder::new(0).string("e").op(Opcode::NewNode).dup_node(0).build();
    let mut vm = load(&program);
    let elem = vm.node(0).unwrap();
    assert_eq!(vm.node(1), Some(elem));

    // six more writes fill the ring, the seventh evicts the original
    for _ in 0..7 {
        exec(&mut vm, Opcode::NewText);
    }
    assert!(vm.tree().contains(elem));
    assert_eq!(vm.node(7), Some(elem));

    exec(&mut vm, Opcode::NewText);
    assert!(!vm.tree().contains(elem));
    vm.finish().unwrap();
}

#[test]
fn test_forced_failure_on_accessor_is_fatal() {
    let mut vm = Vm::new(VmConfig::default());
    vm.tree_mut().injector_mut().force_failure(true);
    let err = vm.execute(Opcode::NodeParent, &mut FuzzInput::new(&[])).unwrap_err();
    assert!(matches!(
        err,
        VmError::FailureMismatch {
            op: "parent",
            reported: true,
            ..
        }
    ));
}
