//! Program encoder
//!
//! Writes interpreter input by hand: the budget seed, then opcodes with
//! their literal operands in the encoding [`FuzzInput`](crate::FuzzInput)
//! reads back. Used by tests, seed corpora and the replay tool.

use crate::opcode::Opcode;

/// Builder for one fuzz input
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
}

impl ProgramBuilder {
    /// Start a program with an allocation budget seed; zero is unlimited
    pub fn new(seed: u32) -> Self {
        Self {
            bytes: seed.to_be_bytes().to_vec(),
        }
    }

    pub fn op(mut self, op: Opcode) -> Self {
        self.bytes.push(op.byte());
        self
    }

    /// Raw byte, for dup offsets or unknown opcodes
    pub fn byte(mut self, byte: u8) -> Self {
        self.bytes.push(byte);
        self
    }

    /// Push an integer register value
    pub fn int(self, value: i32) -> Self {
        let mut this = self.op(Opcode::CreateInteger);
        this.bytes.extend_from_slice(&value.to_be_bytes());
        this
    }

    /// Push a string register value
    pub fn string(self, value: &str) -> Self {
        let mut this = self.op(Opcode::CreateString);
        for &b in value.as_bytes() {
            if b == b'\\' {
                this.bytes.push(b'\\');
            }
            this.bytes.push(b);
        }
        this.bytes.extend_from_slice(b"\\\n");
        this
    }

    /// Duplicate the node `offset` slots back (0 is the freshest) into a
    /// new slot
    pub fn dup_node(self, offset: u8) -> Self {
        self.op(Opcode::DupNode).byte(offset)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
