/// Failure reported by an [`ApplierAdapter`](crate::ApplierAdapter) while an
/// edit script is being applied to the external tree.
///
/// Once an adapter fails the slot table may be partially applied; the owning
/// composition should be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplierError {
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
    RangeOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },
    Rejected {
        reason: String,
    },
}

impl ApplierError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ApplierError::Rejected {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ApplierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplierError::IndexOutOfBounds { index, len } => {
                write!(f, "child index {index} out of bounds for {len} children")
            }
            ApplierError::RangeOutOfBounds { start, count, len } => {
                write!(
                    f,
                    "child range {start}..{} out of bounds for {len} children",
                    start + count
                )
            }
            ApplierError::Rejected { reason } => write!(f, "edit rejected: {reason}"),
        }
    }
}

impl std::error::Error for ApplierError {}
