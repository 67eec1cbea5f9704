//! Register-only opcodes

use crate::expect::Expect;
use crate::input::FuzzInput;
use crate::opcode::Opcode;
use crate::registers::REG_COUNT;
use crate::vm::Vm;

impl Vm {
    pub(super) fn register_op(&mut self, op: Opcode, input: &mut FuzzInput<'_>) -> Expect {
        match op {
            Opcode::CreateInteger => {
                self.advance_ints();
                let value = input.read_int(4) as i32;
                self.set_int(0, value);
            }
            Opcode::CreateString => {
                self.advance_strings();
                let value = input.read_string(self.config.max_string);
                self.copy_str(0, value.as_deref());
            }
            Opcode::DupInteger => {
                let offset = dup_offset(input);
                self.advance_ints();
                if offset != 0 {
                    let value = self.int(offset);
                    self.set_int(0, value);
                }
            }
            Opcode::DupString => {
                let offset = dup_offset(input);
                self.advance_strings();
                if offset != 0 {
                    let value = self.string(offset);
                    self.copy_str(0, value.as_deref());
                }
            }
            Opcode::DupNode => {
                let offset = dup_offset(input);
                self.advance_nodes();
                if offset != 0 {
                    let node = self.node(offset);
                    self.set_node(0, node);
                }
            }
            _ => return Expect::Unknown,
        }
        Expect::Success
    }
}

/// Source offset of a dup, relative to the slot about to be claimed
fn dup_offset(input: &mut FuzzInput<'_>) -> usize {
    (usize::from(input.read_byte()) + 1) % REG_COUNT
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    #[test]
    fn test_create_and_dup_integer() {
        let mut vm = Vm::new(VmConfig::default());
        let data = [0, 0, 1, 2, 0];
        let mut input = FuzzInput::new(&data);
        vm.execute(Opcode::CreateInteger, &mut input).unwrap();
        assert_eq!(vm.int(0), 0x0102);
        vm.execute(Opcode::DupInteger, &mut input).unwrap();
        assert_eq!(vm.int(0), 0x0102);
        assert_eq!(vm.int(1), 0x0102);
    }

    #[test]
    fn test_dup_string_copies() {
        let mut vm = Vm::new(VmConfig::default());
        let data = b"abc\\\n\x07";
        let mut input = FuzzInput::new(data);
        vm.execute(Opcode::CreateString, &mut input).unwrap();
        // byte 7 wraps to offset 0: the new slot stays empty
        vm.execute(Opcode::DupString, &mut input).unwrap();
        assert_eq!(vm.string(0), None);
        assert_eq!(vm.string(1).as_deref(), Some("abc"));
    }
}
