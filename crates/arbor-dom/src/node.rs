//! DOM Node
//!
//! One struct for every node kind. Links are handles into the arena; kind
//! specific payloads (document tables, DTD tables, declarations) live in
//! [`NodeExtra`].

use std::collections::BTreeMap;

use crate::{NodeId, NsId};

/// Node kinds
///
/// Discriminants follow the classic XML tree numbering; [`NodeKind::bit`]
/// turns them into child-mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CData = 4,
    EntityRef = 5,
    Pi = 7,
    Comment = 8,
    Document = 9,
    DocumentFragment = 11,
    HtmlDocument = 13,
    Dtd = 14,
    ElementDecl = 15,
    AttributeDecl = 16,
    EntityDecl = 17,
}

impl NodeKind {
    /// Mask bit for this kind
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Element, attribute or entity declaration
    #[inline]
    pub fn is_declaration(self) -> bool {
        matches!(self, Self::ElementDecl | Self::AttributeDecl | Self::EntityDecl)
    }

    /// XML or HTML document
    #[inline]
    pub fn is_document(self) -> bool {
        matches!(self, Self::Document | Self::HtmlDocument)
    }

    /// Nodes that carry character data directly
    #[inline]
    pub fn is_text_like(self) -> bool {
        matches!(self, Self::Text | Self::CData | Self::Comment | Self::Pi)
    }

    /// Nodes that keep their content in a child list
    #[inline]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Element | Self::DocumentFragment | Self::Attribute)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Text => "text",
            Self::CData => "cdata",
            Self::EntityRef => "entity-ref",
            Self::Pi => "pi",
            Self::Comment => "comment",
            Self::Document => "document",
            Self::DocumentFragment => "fragment",
            Self::HtmlDocument => "html-document",
            Self::Dtd => "dtd",
            Self::ElementDecl => "element-decl",
            Self::AttributeDecl => "attribute-decl",
            Self::EntityDecl => "entity-decl",
        }
    }
}

/// Name given to text nodes; adjacent text only coalesces on equal names
pub const TEXT_NAME: &str = "text";
/// Name given to comment nodes
pub const COMMENT_NAME: &str = "comment";

/// Role an attribute plays in the document ID tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttrRole {
    #[default]
    Plain,
    Id,
    Ref,
}

/// Entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityType {
    InternalGeneral = 1,
    ExternalGeneralParsed = 2,
    ExternalGeneralUnparsed = 3,
    InternalParameter = 4,
    ExternalParameter = 5,
    InternalPredefined = 6,
}

impl EntityType {
    pub fn from_int(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::InternalGeneral,
            2 => Self::ExternalGeneralParsed,
            3 => Self::ExternalGeneralUnparsed,
            4 => Self::InternalParameter,
            5 => Self::ExternalParameter,
            6 => Self::InternalPredefined,
            _ => return None,
        })
    }

    #[inline]
    pub fn is_parameter(self) -> bool {
        matches!(self, Self::InternalParameter | Self::ExternalParameter)
    }
}

/// Declared content type of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementContent {
    Empty = 1,
    Any = 2,
    Mixed = 3,
    Element = 4,
}

impl ElementContent {
    pub fn from_int(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::Empty,
            2 => Self::Any,
            3 => Self::Mixed,
            4 => Self::Element,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Any => "ANY",
            Self::Mixed => "(#PCDATA)*",
            Self::Element => "(#PCDATA)",
        }
    }
}

/// Declared attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    Cdata = 1,
    Id = 2,
    IdRef = 3,
    IdRefs = 4,
    Entity = 5,
    Entities = 6,
    Nmtoken = 7,
    Nmtokens = 8,
    Enumeration = 9,
    Notation = 10,
}

impl AttributeType {
    pub fn from_int(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::Cdata,
            2 => Self::Id,
            3 => Self::IdRef,
            4 => Self::IdRefs,
            5 => Self::Entity,
            6 => Self::Entities,
            7 => Self::Nmtoken,
            8 => Self::Nmtokens,
            9 => Self::Enumeration,
            10 => Self::Notation,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cdata => "CDATA",
            Self::Id => "ID",
            Self::IdRef => "IDREF",
            Self::IdRefs => "IDREFS",
            Self::Entity => "ENTITY",
            Self::Entities => "ENTITIES",
            Self::Nmtoken => "NMTOKEN",
            Self::Nmtokens => "NMTOKENS",
            Self::Enumeration => "",
            Self::Notation => "NOTATION",
        }
    }
}

/// Attribute default declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeDefault {
    None = 1,
    Required = 2,
    Implied = 3,
    Fixed = 4,
}

impl AttributeDefault {
    pub fn from_int(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::None,
            2 => Self::Required,
            3 => Self::Implied,
            4 => Self::Fixed,
            _ => return None,
        })
    }
}

/// Document payload
#[derive(Debug, Default)]
pub struct DocData {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub url: Option<String>,
    pub int_subset: Option<NodeId>,
    pub ext_subset: Option<NodeId>,
    /// Lazily created `xml` namespace
    pub xml_ns: Option<NsId>,
    pub ids: BTreeMap<String, NodeId>,
    pub refs: BTreeMap<String, Vec<NodeId>>,
}

/// Notation declaration (stored in the DTD table, not a node)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notation {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

/// DTD payload
#[derive(Debug, Default)]
pub struct DtdData {
    pub external_id: Option<String>,
    pub system_id: Option<String>,
    /// Keyed by qualified name
    pub elements: BTreeMap<String, NodeId>,
    /// Keyed by (element, attribute)
    pub attributes: BTreeMap<(String, String), NodeId>,
    pub entities: BTreeMap<String, NodeId>,
    pub parameter_entities: BTreeMap<String, NodeId>,
    pub notations: BTreeMap<String, Notation>,
}

/// Entity declaration payload
#[derive(Debug, Clone)]
pub struct EntityData {
    pub etype: EntityType,
    pub external_id: Option<String>,
    pub system_id: Option<String>,
}

/// Element declaration payload
#[derive(Debug, Clone)]
pub struct ElementDeclData {
    pub content: ElementContent,
    pub prefix: Option<String>,
}

/// Attribute declaration payload
#[derive(Debug, Clone)]
pub struct AttributeDeclData {
    pub element: String,
    pub prefix: Option<String>,
    pub atype: AttributeType,
    pub default: AttributeDefault,
    pub default_value: Option<String>,
}

/// Kind-specific node payload
#[derive(Debug, Default)]
pub enum NodeExtra {
    #[default]
    None,
    Attribute(AttrRole),
    Document(Box<DocData>),
    Dtd(Box<DtdData>),
    Entity(Box<EntityData>),
    ElementDecl(Box<ElementDeclData>),
    AttributeDecl(Box<AttributeDeclData>),
}

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    /// First attribute (elements only)
    pub(crate) properties: Option<NodeId>,
    pub(crate) ns: Option<NsId>,
    /// Namespaces declared on this element
    pub(crate) ns_def: Vec<NsId>,
    pub(crate) doc: Option<NodeId>,
    pub(crate) line: u32,
    pub(crate) extra: NodeExtra,
}

impl Node {
    /// Create an unlinked node
    pub(crate) fn new(kind: NodeKind, name: Option<String>, content: Option<String>) -> Self {
        let extra = match kind {
            NodeKind::Attribute => NodeExtra::Attribute(AttrRole::Plain),
            NodeKind::Document | NodeKind::HtmlDocument => NodeExtra::Document(Box::default()),
            NodeKind::Dtd => NodeExtra::Dtd(Box::default()),
            _ => NodeExtra::None,
        };
        Self {
            kind,
            name,
            content,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            properties: None,
            ns: None,
            ns_def: Vec::new(),
            doc: None,
            line: 0,
            extra,
        }
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Character data of text-like nodes and entity declarations
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    #[inline]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    #[inline]
    pub fn properties(&self) -> Option<NodeId> {
        self.properties
    }

    #[inline]
    pub fn ns(&self) -> Option<NsId> {
        self.ns
    }

    #[inline]
    pub fn ns_defs(&self) -> &[NsId] {
        &self.ns_def
    }

    /// Owning document
    #[inline]
    pub fn doc(&self) -> Option<NodeId> {
        self.doc
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn doc_data(&self) -> Option<&DocData> {
        match &self.extra {
            NodeExtra::Document(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn doc_data_mut(&mut self) -> Option<&mut DocData> {
        match &mut self.extra {
            NodeExtra::Document(data) => Some(data),
            _ => None,
        }
    }

    pub fn dtd_data(&self) -> Option<&DtdData> {
        match &self.extra {
            NodeExtra::Dtd(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn dtd_data_mut(&mut self) -> Option<&mut DtdData> {
        match &mut self.extra {
            NodeExtra::Dtd(data) => Some(data),
            _ => None,
        }
    }

    pub fn entity_data(&self) -> Option<&EntityData> {
        match &self.extra {
            NodeExtra::Entity(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_decl(&self) -> Option<&ElementDeclData> {
        match &self.extra {
            NodeExtra::ElementDecl(data) => Some(data),
            _ => None,
        }
    }

    pub fn attribute_decl(&self) -> Option<&AttributeDeclData> {
        match &self.extra {
            NodeExtra::AttributeDecl(data) => Some(data),
            _ => None,
        }
    }

    /// ID-table role of an attribute
    pub fn attr_role(&self) -> AttrRole {
        match self.extra {
            NodeExtra::Attribute(role) => role,
            _ => AttrRole::Plain,
        }
    }

    pub(crate) fn set_attr_role(&mut self, role: AttrRole) {
        if let NodeExtra::Attribute(current) = &mut self.extra {
            *current = role;
        }
    }
}
