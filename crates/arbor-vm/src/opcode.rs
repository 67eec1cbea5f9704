//! Opcode table
//!
//! One input byte selects one opcode by position in this table, so the
//! order is the input format. Append new opcodes at the end of a family
//! only when breaking existing corpora is acceptable.

macro_rules! opcodes {
    ($($variant:ident => $name:literal,)*) => {
        /// Interpreter instruction
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// Every opcode in byte order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Diagnostic name
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }
        }
    };
}

opcodes! {
    // Registers
    CreateInteger => "create_integer",
    CreateString => "create_string",
    DupInteger => "dup_integer",
    DupString => "dup_string",
    DupNode => "dup_node",

    // Constructors
    NewDoc => "new_doc",
    NewNode => "new_node",
    NewNodeEatName => "new_node_eat_name",
    NewDocNode => "new_doc_node",
    NewDocNodeEatName => "new_doc_node_eat_name",
    NewDocRawNode => "new_doc_raw_node",
    NewChild => "new_child",
    NewTextChild => "new_text_child",
    NewProp => "new_prop",
    NewDocProp => "new_doc_prop",
    NewNsProp => "new_ns_prop",
    NewNsPropEatName => "new_ns_prop_eat_name",
    NewText => "new_text",
    NewTextLen => "new_text_len",
    NewDocText => "new_doc_text",
    NewDocTextLen => "new_doc_text_len",
    NewPi => "new_pi",
    NewDocPi => "new_doc_pi",
    NewComment => "new_comment",
    NewDocComment => "new_doc_comment",
    NewCDataBlock => "new_cdata_block",
    NewCharRef => "new_char_ref",
    NewReference => "new_reference",
    NewDocFragment => "new_doc_fragment",
    CreateIntSubset => "create_int_subset",
    NewDtd => "new_dtd",

    // Copies
    CopyDoc => "copy_doc",
    CopyNode => "copy_node",
    CopyNodeList => "copy_node_list",
    DocCopyNode => "doc_copy_node",
    DocCopyNodeList => "doc_copy_node_list",
    CopyProp => "copy_prop",
    CopyPropList => "copy_prop_list",
    CopyDtd => "copy_dtd",

    // Accessors and content
    NodeParent => "parent",
    NodeNextSibling => "next_sibling",
    NodePrevSibling => "prev_sibling",
    NodeFirstChild => "first_child",
    GetLastChild => "last_child",
    NodeName => "name",
    NodeSetName => "set_name",
    NodeGetContent => "get_content",
    NodeSetContent => "set_content",
    NodeSetContentLen => "set_content_len",
    NodeAddContent => "add_content",
    NodeAddContentLen => "add_content_len",
    GetIntSubset => "get_int_subset",
    GetLineNo => "get_line_no",
    GetNodePath => "get_node_path",
    DocGetRootElement => "get_root_element",
    DocSetRootElement => "set_root_element",
    NodeIsText => "is_text",
    NodeGetAttrValue => "get_attr_value",
    NodeGetLang => "get_lang",
    NodeSetLang => "set_lang",
    NodeGetSpacePreserve => "get_space_preserve",
    NodeSetSpacePreserve => "set_space_preserve",
    NodeGetBase => "get_base",
    NodeGetBaseSafe => "get_base_safe",
    NodeSetBase => "set_base",

    // Attributes
    HasProp => "has_prop",
    HasNsProp => "has_ns_prop",
    GetProp => "get_prop",
    GetNsProp => "get_ns_prop",
    GetNoNsProp => "get_no_ns_prop",
    SetProp => "set_prop",
    SetNsProp => "set_ns_prop",
    RemoveProp => "remove_prop",
    UnsetProp => "unset_prop",
    UnsetNsProp => "unset_ns_prop",

    // Namespaces
    NewNs => "new_ns",
    SearchNs => "search_ns",
    SearchNsByHref => "search_ns_by_href",
    GetNsList => "get_ns_list",
    GetNsListSafe => "get_ns_list_safe",
    SetNs => "set_ns",
    CopyNamespace => "copy_namespace",
    CopyNamespaceList => "copy_namespace_list",

    // Tree manipulation
    UnlinkNode => "unlink",
    AddChild => "add_child",
    AddChildList => "add_child_list",
    ReplaceNode => "replace",
    AddSibling => "add_sibling",
    AddPrevSibling => "add_prev_sibling",
    AddNextSibling => "add_next_sibling",

    // Text
    TextMerge => "text_merge",
    TextConcat => "text_concat",
    StringGetNodeList => "string_get_node_list",
    StringLenGetNodeList => "string_len_get_node_list",
    NodeListGetString => "node_list_get_string",
    NodeListGetRawString => "node_list_get_raw_string",

    // Parsing
    ParseDocument => "parse_document",

    // DTD
    AddElementDecl => "add_element_decl",
    AddAttributeDecl => "add_attribute_decl",
    AddNotationDecl => "add_notation_decl",
    GetDtdElementDesc => "get_dtd_element_desc",
    GetDtdQElementDesc => "get_dtd_qelement_desc",
    GetDtdAttrDesc => "get_dtd_attr_desc",
    GetDtdQAttrDesc => "get_dtd_qattr_desc",
    GetDtdNotationDesc => "get_dtd_notation_desc",

    // IDs and references
    AddId => "add_id",
    AddIdSafe => "add_id_safe",
    GetId => "get_id",
    IsId => "is_id",
    RemoveId => "remove_id",
    AddRef => "add_ref",
    GetRefs => "get_refs",
    IsRef => "is_ref",
    RemoveRef => "remove_ref",

    // Validation
    IsMixedElement => "is_mixed_element",
    Validate => "validate",
    ValidateAttributeValue => "validate_attribute_value",
    ValidateDtd => "validate_dtd",
    ValidateNotationUse => "validate_notation_use",
    ValidateNameValue => "validate_name_value",
    ValidateNamesValue => "validate_names_value",
    ValidateNmtokenValue => "validate_nmtoken_value",
    ValidateNmtokensValue => "validate_nmtokens_value",
    ValidNormalizeAttributeValue => "normalize_attribute_value",
    ValidCtxtNormalizeAttributeValue => "ctxt_normalize_attribute_value",
    ValidGetPotentialChildren => "get_potential_children",
    ValidGetValidElements => "get_valid_elements",

    // Entities
    NewEntity => "new_entity",
    AddEntity => "add_entity",
    AddDocEntity => "add_doc_entity",
    AddDtdEntity => "add_dtd_entity",
    GetPredefinedEntity => "get_predefined_entity",
    GetDocEntity => "get_doc_entity",
    GetDtdEntity => "get_dtd_entity",
    GetParameterEntity => "get_parameter_entity",
    EncodeEntitiesReentrant => "encode_entities",
    EncodeSpecialChars => "encode_special_chars",

    // HTML documents
    HtmlNewDoc => "html_new_doc",
    HtmlNewDocNoDtd => "html_new_doc_no_dtd",
    HtmlGetMetaEncoding => "html_get_meta_encoding",
    HtmlSetMetaEncoding => "html_set_meta_encoding",
    HtmlIsBooleanAttr => "html_is_boolean_attr",

    // Output
    DocDumpMemory => "dump_memory",
    DocDumpMemoryEnc => "dump_memory_enc",
    DocDumpFormatMemory => "dump_format_memory",
    DocDumpFormatMemoryEnc => "dump_format_memory_enc",
    HtmlDocDumpMemory => "html_doc_dump_memory",
    HtmlDocDumpMemoryFormat => "html_doc_dump_memory_format",
    DocDump => "doc_dump",
    DocFormatDump => "doc_format_dump",
    ElemDump => "elem_dump",
    HtmlDocDump => "html_doc_dump",
    HtmlNodeDumpFile => "html_node_dump_file",
    HtmlNodeDumpFileFormat => "html_node_dump_file_format",
    BufNodeDump => "buf_node_dump",
    NodeDump => "node_dump",
    AttrSerializeTxtContent => "attr_serialize_txt_content",
    DumpElementDecl => "dump_element_decl",
    DumpElementTable => "dump_element_table",
    DumpAttributeDecl => "dump_attribute_decl",
    DumpAttributeTable => "dump_attribute_table",
    DumpNotationDecl => "dump_notation_decl",
    DumpNotationTable => "dump_notation_table",
    DumpEntityDecl => "dump_entity_decl",
    DumpEntitiesTable => "dump_entities_table",
    HtmlNodeDump => "html_node_dump",
    SaveFileTo => "save_file_to",
    SaveFormatFileTo => "save_format_file_to",
    NodeDumpOutput => "node_dump_output",
    HtmlDocContentDumpOutput => "html_doc_content_dump_output",
    HtmlDocContentDumpFormatOutput => "html_doc_content_dump_format_output",
    HtmlNodeDumpOutput => "html_node_dump_output",
    HtmlNodeDumpFormatOutput => "html_node_dump_format_output",

    // Predicates and buffers
    IsXhtml => "is_xhtml",
    IsBlankNode => "is_blank_node",
    NodeBufGetContent => "node_buf_get_content",
    BufGetNodeContent => "buf_get_node_content",

    // DOM wrappers and element navigation
    DomWrapReconcileNamespaces => "dom_wrap_reconcile_namespaces",
    DomWrapAdoptNode => "dom_wrap_adopt_node",
    DomWrapRemoveNode => "dom_wrap_remove_node",
    DomWrapCloneNode => "dom_wrap_clone_node",
    ChildElementCount => "child_element_count",
    FirstElementChild => "first_element_child",
    LastElementChild => "last_element_child",
    NextElementSibling => "next_element_sibling",
    PreviousElementSibling => "previous_element_sibling",
}

impl Opcode {
    /// Opcode selected by an input byte
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(usize::from(byte)).copied()
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
