//! Serialization
//!
//! Only the document-to-memory dumps keep their text, in the string ring.
//! The other dumps are run for their allocations and dropped. An unknown
//! output encoding is a refusal, not an allocation failure.

use arbor_dom::{DomResult, is_xhtml};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

/// Deepest indentation level passed to the node dumps
const MAX_DUMP_LEVEL: usize = 64;

impl Vm {
    pub(super) fn output(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::DocDumpMemory
            | Opcode::DocDumpMemoryEnc
            | Opcode::DocDumpFormatMemory
            | Opcode::DocDumpFormatMemoryEnc => {
                self.advance_strings();
                let format = matches!(op, Opcode::DocDumpFormatMemory | Opcode::DocDumpFormatMemoryEnc)
                    && self.int(0) != 0;
                let encoding = match op {
                    Opcode::DocDumpMemoryEnc | Opcode::DocDumpFormatMemoryEnc => self.string(1),
                    _ => None,
                };
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                let res = self.tree.doc_dump_memory(doc, format, encoding.as_deref());
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::DocDump | Opcode::DocFormatDump | Opcode::SaveFileTo | Opcode::SaveFormatFileTo => {
                let format = matches!(op, Opcode::DocFormatDump | Opcode::SaveFormatFileTo) && self.int(0) != 0;
                let encoding = match op {
                    Opcode::SaveFileTo | Opcode::SaveFormatFileTo => self.string(0),
                    _ => None,
                };
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                discard(self.tree.doc_dump_memory(doc, format, encoding.as_deref()))
            }
            Opcode::NodeDump | Opcode::BufNodeDump | Opcode::ElemDump | Opcode::NodeDumpOutput => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let level = usize::try_from(self.int(0)).unwrap_or(0).min(MAX_DUMP_LEVEL);
                let format = op != Opcode::ElemDump && self.int(1) != 0;
                let res = match op {
                    Opcode::NodeDumpOutput => {
                        let encoding = self.string(0);
                        self.tree.node_dump_output(node, level, format, encoding.as_deref())
                    }
                    Opcode::ElemDump => self.tree.node_dump(node, 0, false),
                    _ => self.tree.node_dump(node, level, format),
                };
                discard(res)
            }
            Opcode::NodeBufGetContent | Opcode::BufGetNodeContent => {
                let Some(node) = self.node(0) else { return Expect::Success };
                discard(self.tree.node_buf_get_content(node))
            }
            Opcode::AttrSerializeTxtContent => {
                let Some(value) = self.string(0) else { return Expect::Success };
                discard(self.tree.attr_serialize_txt_content(&value))
            }
            Opcode::DumpElementDecl | Opcode::DumpAttributeDecl | Opcode::DumpEntityDecl => {
                let Some(decl) = self.node(0) else { return Expect::Success };
                discard(match op {
                    Opcode::DumpElementDecl => self.tree.dump_element_decl(decl),
                    Opcode::DumpAttributeDecl => self.tree.dump_attribute_decl(decl),
                    _ => self.tree.dump_entity_decl(decl),
                })
            }
            Opcode::DumpElementTable
            | Opcode::DumpAttributeTable
            | Opcode::DumpEntitiesTable
            | Opcode::DumpNotationTable => {
                let Some(dtd) = self.dtd_at(0) else { return Expect::Success };
                discard(match op {
                    Opcode::DumpElementTable => self.tree.dump_element_table(dtd),
                    Opcode::DumpAttributeTable => self.tree.dump_attribute_table(dtd),
                    Opcode::DumpEntitiesTable => self.tree.dump_entities_table(dtd),
                    _ => self.tree.dump_notation_table(dtd),
                })
            }
            Opcode::IsXhtml => {
                self.advance_ints();
                let (system, public) = (self.string(0), self.string(1));
                self.set_int(0, i32::from(is_xhtml(system.as_deref(), public.as_deref())));
                Expect::Success
            }
            // notations are table entries, there is no node to dump
            Opcode::DumpNotationDecl => Expect::Unknown,
            _ => Expect::Unknown,
        }
    }
}

/// Expectation of a dump whose text is not kept
fn discard<T>(res: DomResult<T>) -> Expect {
    Expect::from_result(&res)
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    fn exec(vm: &mut Vm, op: Opcode, data: &[u8]) {
        vm.execute(op, &mut FuzzInput::new(data)).unwrap();
    }

    fn doc_with_root(vm: &mut Vm) {
        let doc = vm.tree_mut().new_doc(None).unwrap();
        let root = vm.tree_mut().new_doc_node(Some(doc), None, Some("r"), None).unwrap().unwrap();
        vm.tree_mut().doc_set_root_element(Some(doc), Some(root)).unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(root));
    }

    #[test]
    fn test_dump_memory_keeps_text() {
        let mut vm = Vm::new(VmConfig::default());
        doc_with_root(&mut vm);
        exec(&mut vm, Opcode::DocDumpMemory, &[]);
        let text = vm.string(0).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\"?>"));
        assert!(text.contains("<r/>"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_unknown_encoding_is_not_a_failure() {
        let mut vm = Vm::new(VmConfig::default());
        doc_with_root(&mut vm);
        exec(&mut vm, Opcode::CreateString, b"EBCDIC-XYZ\\\n");
        exec(&mut vm, Opcode::DocDumpMemoryEnc, &[]);
        assert_eq!(vm.string(0), None);
        vm.finish().unwrap();
    }

    #[test]
    fn test_is_xhtml() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::CreateString, b"-//W3C//DTD XHTML 1.0 Strict//EN\\\n");
        exec(&mut vm, Opcode::CreateString, b"\\\n");
        exec(&mut vm, Opcode::IsXhtml, &[]);
        assert_eq!(vm.int(0), 1);
    }
}
