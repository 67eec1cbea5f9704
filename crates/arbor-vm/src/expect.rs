//! Allocation-failure expectations
//!
//! Each step declares what the injector should report for it. A step that
//! was skipped, or whose outcome cannot be derived from its operands,
//! declares [`Expect::Unknown`] and is never checked.

use arbor_dom::DomResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expect {
    #[default]
    Unknown,
    /// No allocation may have been refused
    Success,
    /// An allocation must have been refused
    Failure,
}

impl Expect {
    /// Failure exactly when the call ran out of memory
    pub fn from_result<T>(result: &DomResult<T>) -> Self {
        match result {
            Err(e) if e.is_oom() => Self::Failure,
            _ => Self::Success,
        }
    }

    #[inline]
    pub fn failure_if(failed: bool) -> Self {
        if failed { Self::Failure } else { Self::Success }
    }

    /// Combine two parts of one step
    ///
    /// Any failing part makes the step a failure; otherwise an unknown part
    /// makes it unknown.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Failure, _) | (_, Self::Failure) => Self::Failure,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            _ => Self::Success,
        }
    }

    /// Whether the injector's report agrees
    pub fn holds(self, reported: bool) -> bool {
        match self {
            Self::Unknown => true,
            Self::Success => !reported,
            Self::Failure => reported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_dom::DomError;

    #[test]
    fn test_from_result() {
        assert_eq!(Expect::from_result(&Ok::<_, DomError>(())), Expect::Success);
        assert_eq!(Expect::from_result::<()>(&Err(DomError::OutOfMemory)), Expect::Failure);
        assert_eq!(Expect::from_result::<()>(&Err(DomError::HierarchyRequest)), Expect::Success);
    }

    #[test]
    fn test_and() {
        assert_eq!(Expect::Success.and(Expect::Failure), Expect::Failure);
        assert_eq!(Expect::Unknown.and(Expect::Failure), Expect::Failure);
        assert_eq!(Expect::Success.and(Expect::Unknown), Expect::Unknown);
        assert_eq!(Expect::Success.and(Expect::Success), Expect::Success);
    }

    #[test]
    fn test_holds() {
        assert!(Expect::Unknown.holds(true));
        assert!(Expect::Unknown.holds(false));
        assert!(Expect::Success.holds(false));
        assert!(!Expect::Success.holds(true));
        assert!(Expect::Failure.holds(true));
        assert!(!Expect::Failure.holds(false));
    }
}
