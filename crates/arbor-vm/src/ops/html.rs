//! HTML documents
//!
//! The memory dumps and the meta encoding keep their text in the string
//! ring; file and output-buffer dumps are dropped like their XML
//! counterparts. HTML serializers format unless told otherwise.

use arbor_dom::{DomResult, is_boolean_attr};

use crate::expect::Expect;
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(super) fn html(&mut self, op: Opcode) -> Expect {
        match op {
            Opcode::HtmlGetMetaEncoding => {
                self.advance_strings();
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                let res = self.tree.html_get_meta_encoding(doc);
                let expect = Expect::from_result(&res);
                let encoding = res.ok().flatten();
                self.copy_str(0, encoding.as_deref());
                expect
            }
            Opcode::HtmlIsBooleanAttr => {
                self.advance_ints();
                let name = self.string(0);
                self.set_int(0, i32::from(name.as_deref().is_some_and(is_boolean_attr)));
                Expect::Success
            }
            Opcode::HtmlDocDumpMemory | Opcode::HtmlDocDumpMemoryFormat => {
                self.advance_strings();
                let format = op == Opcode::HtmlDocDumpMemory || self.int(0) != 0;
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                let res = self.tree.html_doc_dump_memory(doc, format);
                let expect = Expect::from_result(&res);
                self.move_str(0, res.ok().flatten());
                expect
            }
            Opcode::HtmlDocDump => {
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                discard(self.tree.html_doc_dump_memory(doc, true))
            }
            Opcode::HtmlNodeDump | Opcode::HtmlNodeDumpFile | Opcode::HtmlNodeDumpFileFormat => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let format = op != Opcode::HtmlNodeDumpFileFormat || self.int(0) != 0;
                discard(self.tree.html_node_dump_output(node, None, format))
            }
            Opcode::HtmlDocContentDumpOutput | Opcode::HtmlDocContentDumpFormatOutput => {
                let Some(doc) = self.doc_at(0) else { return Expect::Success };
                let encoding = self.string(0);
                let format = op == Opcode::HtmlDocContentDumpOutput || self.int(0) != 0;
                discard(self.tree.html_doc_content_dump_output(doc, encoding.as_deref(), format))
            }
            Opcode::HtmlNodeDumpOutput | Opcode::HtmlNodeDumpFormatOutput => {
                let Some(node) = self.node(0) else { return Expect::Success };
                let encoding = self.string(0);
                let format = op == Opcode::HtmlNodeDumpOutput || self.int(0) != 0;
                discard(self.tree.html_node_dump_output(node, encoding.as_deref(), format))
            }
            // rewriting the meta element can drop text the registers still hold
            Opcode::HtmlSetMetaEncoding => Expect::Unknown,
            _ => Expect::Unknown,
        }
    }
}

fn discard<T>(res: DomResult<T>) -> Expect {
    Expect::from_result(&res)
}

#[cfg(test)]
mod tests {
    use arbor_dom::NodeKind;

    use crate::config::VmConfig;
    use crate::input::FuzzInput;
    use crate::opcode::Opcode;
    use crate::vm::Vm;

    fn exec(vm: &mut Vm, op: Opcode, data: &[u8]) {
        vm.execute(op, &mut FuzzInput::new(data)).unwrap();
    }

    #[test]
    fn test_new_doc_and_dump() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::HtmlNewDoc, &[]);
        let doc = vm.node(0).unwrap();
        assert_eq!(vm.tree().kind(doc), Some(NodeKind::HtmlDocument));

        exec(&mut vm, Opcode::CreateString, b"body\\\n");
        exec(&mut vm, Opcode::NewDocNode, &[]);
        let body = vm.node(0).unwrap();
        vm.tree_mut().doc_set_root_element(Some(doc), Some(body)).unwrap();

        exec(&mut vm, Opcode::HtmlDocDumpMemory, &[]);
        let text = vm.string(0).unwrap();
        assert!(text.starts_with("<!DOCTYPE html PUBLIC"), "{}", text);
        assert!(text.contains("<body></body>"), "{}", text);
        assert!(!text.contains("<?xml"));
        vm.finish().unwrap();
    }

    #[test]
    fn test_no_dtd_without_identifiers() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::HtmlNewDocNoDtd, &[]);
        let doc = vm.node(0).unwrap();
        assert_eq!(vm.tree().get_int_subset(Some(doc)), None);
        vm.finish().unwrap();
    }

    #[test]
    fn test_meta_encoding_lands_in_string_ring() {
        let mut vm = Vm::new(VmConfig::default());
        let tree = vm.tree_mut();
        let doc = tree.html_new_doc_no_dtd(None, None).unwrap();
        let html = tree.new_doc_node(Some(doc), None, Some("html"), None).unwrap().unwrap();
        tree.doc_set_root_element(Some(doc), Some(html)).unwrap();
        let head = tree.new_child(html, None, Some("head"), None).unwrap().unwrap();
        let meta = tree.new_child(head, None, Some("meta"), None).unwrap().unwrap();
        tree.new_prop(Some(meta), Some("charset"), Some("UTF-8")).unwrap();
        vm.advance_nodes();
        vm.set_node(0, Some(meta));

        exec(&mut vm, Opcode::HtmlGetMetaEncoding, &[]);
        assert_eq!(vm.string(0).as_deref(), Some("UTF-8"));
        exec(&mut vm, Opcode::HtmlNodeDumpOutput, &[]);
        vm.finish().unwrap();
    }

    #[test]
    fn test_boolean_attr_verdict() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::CreateString, b"selected\\\n");
        exec(&mut vm, Opcode::HtmlIsBooleanAttr, &[]);
        assert_eq!(vm.int(0), 1);
        exec(&mut vm, Opcode::CreateString, b"href\\\n");
        exec(&mut vm, Opcode::HtmlIsBooleanAttr, &[]);
        assert_eq!(vm.int(0), 0);
    }

    #[test]
    fn test_unknown_output_encoding_is_not_a_failure() {
        let mut vm = Vm::new(VmConfig::default());
        exec(&mut vm, Opcode::HtmlNewDocNoDtd, &[]);
        exec(&mut vm, Opcode::CreateString, b"EBCDIC-XYZ\\\n");
        exec(&mut vm, Opcode::HtmlDocContentDumpOutput, &[]);
        exec(&mut vm, Opcode::HtmlSetMetaEncoding, &[]);
        vm.finish().unwrap();
    }
}
