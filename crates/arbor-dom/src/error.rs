//! DOM error types

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The failure injector refused an allocation
    #[error("out of memory")]
    OutOfMemory,
    /// Handle does not resolve to a live node
    #[error("node not found")]
    NotFound,
    /// Attach would create a cycle or an illegal child kind
    #[error("hierarchy request error")]
    HierarchyRequest,
    /// Node kind not accepted by this operation
    #[error("invalid node type")]
    InvalidNodeType,
    /// Node belongs to a different document
    #[error("wrong document")]
    WrongDocument,
    /// Argument out of range
    #[error("invalid argument")]
    InvalidArgument,
    /// Serialization encoding not supported
    #[error("unsupported encoding")]
    UnsupportedEncoding,
}

impl DomError {
    /// Whether this error came from the allocation-failure injector
    #[inline]
    pub fn is_oom(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}
