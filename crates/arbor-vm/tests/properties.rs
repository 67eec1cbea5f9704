//! Register and reclamation properties, and a seeded program sweep

use arbor_vm::{FuzzInput, Opcode, ProgramBuilder, REG_COUNT, Vm, VmConfig, run};

fn exec(vm: &mut Vm, op: Opcode) {
    vm.execute(op, &mut FuzzInput::new(&[])).unwrap();
}

#[test]
fn test_ring_evicts_oldest_once() {
    let mut vm = Vm::new(VmConfig::default());
    let mut made = Vec::new();
    for _ in 0..=REG_COUNT {
        exec(&mut vm, Opcode::NewText);
        made.push(vm.node(0).unwrap());
    }

    assert_eq!(vm.report().releases, 1);
    assert_eq!(vm.report().trees_freed, 1);
    assert!(!vm.tree().contains(made[0]));
    for offset in 0..REG_COUNT {
        assert_eq!(vm.node(offset), Some(made[REG_COUNT - offset]));
    }
    vm.finish().unwrap();
}

#[test]
fn test_tree_lives_while_any_node_is_held() {
    let program = ProgramBuilder::new(0)
        .string("a")
        .op(Opcode::NewNode)
        .string("b")
        .op(Opcode::NewChild)
        .build();
    let mut vm = Vm::new(VmConfig::default());
    let mut input = FuzzInput::new(&program);
    input.read_int(4);
    while !input.is_empty() {
        vm.step(&mut input).unwrap();
    }
    let child = vm.node(0).unwrap();
    let parent = vm.node(1).unwrap();
    assert_eq!(vm.tree().parent(child), Some(parent));

    // the parent reaches the oldest slot, the next text evicts it
    for _ in 0..REG_COUNT - 2 {
        exec(&mut vm, Opcode::NewText);
    }
    assert_eq!(vm.node(REG_COUNT - 1), Some(parent));
    assert_eq!(vm.node(REG_COUNT - 2), Some(child));
    exec(&mut vm, Opcode::NewText);
    assert!(vm.tree().contains(parent));
    assert_eq!(vm.node(REG_COUNT - 1), Some(child));
    assert_eq!(vm.report().trees_freed, 0);

    // the child was the last holder
    exec(&mut vm, Opcode::NewText);
    assert!(!vm.tree().contains(parent));
    assert!(!vm.tree().contains(child));
    assert_eq!(vm.report().trees_freed, 1);
    vm.finish().unwrap();
}

#[test]
fn test_empty_and_truncated_programs() {
    let config = VmConfig::default();
    assert!(run(&[], &config).is_ok());
    assert!(run(&[0, 0], &config).is_ok());
    // a string operand cut off mid-way
    assert!(run(&[0, 0, 0, 0, Opcode::CreateString.byte(), b'a'], &config).is_ok());
    // a dup with its offset byte missing
    assert!(run(&[0, 0, 0, 0, Opcode::DupNode.byte()], &config).is_ok());
}

/// xorshift64, enough to spread opcodes and operands
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const NAMES: [&str; 6] = ["a", "b", "x:y", "lang", "", "<r a='1'>t<c/></r>"];

/// A program of valid opcodes with plausible operands
fn random_program(rng: &mut Rng, seed: u32, steps: usize) -> Vec<u8> {
    let mut program = ProgramBuilder::new(seed);
    let ops = Opcode::ALL.len() as u64;
    for _ in 0..steps {
        program = match rng.below(4) {
            0 => program.string(NAMES[rng.below(NAMES.len() as u64) as usize]),
            1 => program.int(rng.below(5) as i32 - 1),
            _ => {
                let op = Opcode::ALL[rng.below(ops) as usize];
                match op {
                    Opcode::CreateInteger | Opcode::CreateString => program,
                    Opcode::DupInteger | Opcode::DupString | Opcode::DupNode => {
                        program.op(op).byte(rng.below(REG_COUNT as u64) as u8)
                    }
                    _ => program.op(op),
                }
            }
        };
    }
    program.build()
}

#[test]
fn test_random_programs_without_budget() {
    let config = VmConfig {
        use_budget: false,
        check_consistency: true,
        ..VmConfig::default()
    };
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    for i in 0..150 {
        let program = random_program(&mut rng, 0, 120);
        if let Err(err) = run(&program, &config) {
            panic!("program {} failed: {}", i, err);
        }
    }
}

#[test]
fn test_random_programs_with_budget() {
    let config = VmConfig {
        check_consistency: true,
        ..VmConfig::default()
    };
    let mut rng = Rng(0xD1B5_4A32_D192_ED03);
    for i in 0..150 {
        let seed = rng.next() as u32;
        let program = random_program(&mut rng, seed, 120);
        if let Err(err) = run(&program, &config) {
            panic!("program {} (seed {}) failed: {}", i, seed, err);
        }
    }
}
