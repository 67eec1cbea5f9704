//! Opcode handlers
//!
//! [`Vm::dispatch`] routes each opcode to its family. A handler claims its
//! destination slot, reads operands, calls into the tree, stores the
//! result and applies the limiters and namespace fixup, in that order. It
//! returns what the injector must report for the step; the caller reclaims
//! forgotten nodes and checks the report.

mod access;
mod attr;
mod build;
mod copy;
mod dom;
mod dtd;
mod html;
mod ns;
mod output;
mod register;
mod tree;

use arbor_dom::NodeId;

use crate::expect::Expect;
use crate::fixup::fix_ns;
use crate::input::FuzzInput;
use crate::limits::{check_content, check_copy};
use crate::opcode::Opcode;
use crate::vm::Vm;

impl Vm {
    pub(crate) fn dispatch(&mut self, op: Opcode, input: &mut FuzzInput<'_>) -> Expect {
        use Opcode::*;

        match op {
            CreateInteger | CreateString | DupInteger | DupString | DupNode => self.register_op(op, input),

            NewDoc | NewNode | NewNodeEatName | NewDocNode | NewDocNodeEatName | NewDocRawNode | NewChild
            | NewTextChild | NewProp | NewDocProp | NewNsProp | NewNsPropEatName | NewText | NewTextLen
            | NewDocText | NewDocTextLen | NewPi | NewDocPi | NewComment | NewDocComment | NewCDataBlock
            | NewCharRef | NewReference | NewDocFragment | CreateIntSubset | NewDtd | HtmlNewDoc
            | HtmlNewDocNoDtd => self.build(op),

            CopyDoc | CopyNode | CopyNodeList | DocCopyNode | DocCopyNodeList | CopyProp | CopyPropList
            | CopyDtd => self.copy(op),

            NodeParent | NodeNextSibling | NodePrevSibling | NodeFirstChild | GetLastChild | GetIntSubset
            | DocGetRootElement => self.navigate(op),

            NodeName | NodeSetName | NodeGetContent | NodeSetContent | NodeSetContentLen | NodeAddContent
            | NodeAddContentLen | GetLineNo | GetNodePath | DocSetRootElement | NodeIsText | NodeGetAttrValue
            | NodeGetLang | NodeSetLang | NodeGetSpacePreserve | NodeSetSpacePreserve | NodeGetBase
            | NodeGetBaseSafe | NodeSetBase | IsBlankNode => self.access(op),

            HasProp | HasNsProp | GetProp | GetNsProp | GetNoNsProp | SetProp | SetNsProp | RemoveProp
            | UnsetProp | UnsetNsProp => self.attr(op),

            NewNs | SearchNs | SearchNsByHref | GetNsList | GetNsListSafe | SetNs | CopyNamespace
            | CopyNamespaceList => self.namespace(op),

            UnlinkNode | AddChild | AddChildList | ReplaceNode | AddSibling | AddPrevSibling | AddNextSibling
            | TextMerge | TextConcat | StringGetNodeList | StringLenGetNodeList | NodeListGetString
            | NodeListGetRawString => self.tree_op(op),

            ParseDocument | AddElementDecl | AddAttributeDecl | AddNotationDecl | GetDtdElementDesc
            | GetDtdQElementDesc | GetDtdAttrDesc | GetDtdQAttrDesc | GetDtdNotationDesc | AddId | AddIdSafe
            | GetId | IsId | RemoveId | AddRef | GetRefs | IsRef | RemoveRef | IsMixedElement | Validate
            | ValidateAttributeValue | ValidateDtd | ValidateNotationUse | ValidateNameValue
            | ValidateNamesValue | ValidateNmtokenValue | ValidateNmtokensValue | ValidNormalizeAttributeValue
            | ValidCtxtNormalizeAttributeValue | ValidGetPotentialChildren | ValidGetValidElements
            | NewEntity | AddEntity | AddDocEntity | AddDtdEntity | GetPredefinedEntity | GetDocEntity
            | GetDtdEntity | GetParameterEntity | EncodeEntitiesReentrant | EncodeSpecialChars => self.dtd_op(op),

            DocDumpMemory | DocDumpMemoryEnc | DocDumpFormatMemory | DocDumpFormatMemoryEnc | DocDump
            | DocFormatDump | ElemDump | BufNodeDump | NodeDump | AttrSerializeTxtContent | DumpElementDecl
            | DumpElementTable | DumpAttributeDecl | DumpAttributeTable | DumpNotationDecl
            | DumpNotationTable | DumpEntityDecl | DumpEntitiesTable | SaveFileTo | SaveFormatFileTo
            | NodeDumpOutput | IsXhtml | NodeBufGetContent | BufGetNodeContent => self.output(op),

            HtmlGetMetaEncoding | HtmlSetMetaEncoding | HtmlIsBooleanAttr | HtmlDocDumpMemory
            | HtmlDocDumpMemoryFormat | HtmlDocDump | HtmlNodeDumpFile | HtmlNodeDumpFileFormat | HtmlNodeDump
            | HtmlDocContentDumpOutput | HtmlDocContentDumpFormatOutput | HtmlNodeDumpOutput
            | HtmlNodeDumpFormatOutput => self.html(op),

            DomWrapReconcileNamespaces | DomWrapAdoptNode | DomWrapRemoveNode | DomWrapCloneNode
            | ChildElementCount | FirstElementChild | LastElementChild | NextElementSibling
            | PreviousElementSibling => self.dom(op),
        }
    }

    // ---- shared step helpers ----

    /// Cap a copy and store it in the head slot
    pub(crate) fn store_copy(&mut self, copy: Option<NodeId>) {
        let kept = check_copy(&mut self.tree, copy, self.config.max_copy);
        if copy.is_some() && kept.is_none() {
            self.report.copies_discarded += 1;
        }
        self.set_node(0, kept);
    }

    pub(crate) fn cap_content(&mut self, node: Option<NodeId>) {
        if check_content(&mut self.tree, node, self.config.max_content) {
            self.report.content_truncations += 1;
        }
    }

    /// Namespace fixup folded into an expectation
    pub(crate) fn fix(&mut self, node: Option<NodeId>) -> Expect {
        Expect::from_result(&fix_ns(&mut self.tree, node))
    }

    /// Free results the registers never see
    pub(crate) fn free_list(&mut self, list: Vec<NodeId>) {
        for node in list {
            self.tree.free_node(node);
        }
    }

    /// Release the former home of a node that moved: its old parent, or
    /// its old document when it had no parent
    pub(crate) fn release_home(&mut self, old_parent: Option<NodeId>, old_doc: Option<NodeId>) {
        if old_parent.is_some() {
            self.release(old_parent);
        } else {
            self.release(old_doc);
        }
    }

    /// Parent and document of a node, for change detection
    pub(crate) fn home(&self, node: Option<NodeId>) -> (Option<NodeId>, Option<NodeId>) {
        match node {
            Some(n) => (self.tree.parent(n), self.tree.doc(n)),
            None => (None, None),
        }
    }
}
