//! arbor DOM - XML tree for API fuzzing
//!
//! Arena-backed XML and HTML tree with namespaces, DTDs, ID tables,
//! copying and serialization. Every allocation is charged to a
//! [`FailureInjector`] so callers can force allocation failures and check
//! how each operation reports them.

mod alloc;
mod arena;
mod attributes;
mod content;
mod copy;
mod document;
mod dom_wrap;
mod dtd;
mod entities;
mod error;
mod html;
mod ids;
mod namespace;
mod navigation;
mod node;
mod operations;
mod parser;
mod serialize;
mod tree;
mod valid;

use std::fmt;

pub use crate::alloc::{AllocStats, ENTRY_COST, FailureInjector, NODE_COST, NS_COST};
pub use document::DEFAULT_VERSION;
pub use dom_wrap::RECONCILE_REMOVE_REDUNDANT;
pub use dtd::AttributeDeclSpec;
pub use entities::EntityDecl;
pub use error::{DomError, DomResult};
pub use html::{HTML_PUBLIC_ID, HTML_SYSTEM_ID, is_boolean_attr};
pub use namespace::{Namespace, XML_NAMESPACE};
pub use node::{
    AttrRole, AttributeDeclData, AttributeDefault, AttributeType, COMMENT_NAME, DocData, DtdData, ElementContent,
    ElementDeclData, EntityData, EntityType, Node, NodeKind, Notation, TEXT_NAME,
};
pub use operations::{
    ATTRIBUTE_CHILD_MASK, CONTENT_CHILD_MASK, DOCUMENT_CHILD_MASK, DTD_CHILD_MASK, ELEMENT_CHILD_MASK,
    TEXT_CONTENT_MASK,
};
pub use parser::{PARSE_NOBLANKS, PARSE_NOCDATA};
pub use serialize::is_xhtml;
pub use tree::DomTree;
pub use valid::{
    validate_attribute_value, validate_name_value, validate_names_value, validate_nmtoken_value,
    validate_nmtokens_value,
};

use arena::GenIndex;

/// Node handle
///
/// Handles to freed nodes stop resolving; they never alias a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) GenIndex);

/// Namespace declaration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NsId(pub(crate) GenIndex);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}.{}", self.0.index, self.0.generation)
    }
}

impl fmt::Display for NsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns{}.{}", self.0.index, self.0.generation)
    }
}
