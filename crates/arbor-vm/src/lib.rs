//! arbor VM - API fuzzing interpreter
//!
//! Replays a byte stream as a program against the arbor tree API. Values
//! flow through three small ring buffers of integers, strings and node
//! handles; nodes are reclaimed once no register can reach them, and every
//! step checks that the allocation-failure injector agrees with what the
//! operation guarantees.
//!
//! ```no_run
//! use arbor_vm::{VmConfig, run};
//!
//! let report = run(&[0, 0, 0, 0, 5], &VmConfig::default()).unwrap();
//! assert_eq!(report.steps, 1);
//! ```

mod config;
mod error;
mod expect;
mod fixup;
mod guards;
mod input;
mod lifetime;
mod limits;
mod opcode;
mod ops;
pub mod program;
mod registers;
mod vm;

pub use config::VmConfig;
pub use error::{VmError, VmResult};
pub use expect::Expect;
pub use fixup::fix_ns;
pub use guards::{is_dtd_child, is_installed_subset, is_text_content_node, is_valid_child, is_valid_child_type};
pub use input::FuzzInput;
pub use limits::{check_content, check_copy, count_nodes};
pub use opcode::Opcode;
pub use program::ProgramBuilder;
pub use registers::{REG_COUNT, Registers, Ring};
pub use vm::{RunReport, Vm, run};
