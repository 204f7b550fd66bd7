use thiserror::Error;

/// Errors that abort compilation of a score.
///
/// Every variant carries the clause text and its character offset in the
/// source so callers can highlight the failing location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "camelCase"))]
pub enum MmlError {
    /// The clause does not start with a recognized command symbol
    #[error("unknown clause '{clause}' at character {offset}")]
    UnknownClause { clause: String, offset: usize },

    /// A clause boundary was computed on a non-command character
    #[error("malformed clause '{clause}' at character {offset}")]
    MalformedClause { clause: String, offset: usize },

    /// Zero tempo or length, or a duration that is not a positive number
    #[error("invalid length in clause '{clause}' at character {offset}: {reason}")]
    InvalidLength {
        clause: String,
        offset: usize,
        reason: String,
    },
}

impl MmlError {
    /// Character offset of the offending clause
    pub fn offset(&self) -> usize {
        match self {
            MmlError::UnknownClause { offset, .. }
            | MmlError::MalformedClause { offset, .. }
            | MmlError::InvalidLength { offset, .. } => *offset,
        }
    }

    /// Text of the offending clause
    pub fn clause(&self) -> &str {
        match self {
            MmlError::UnknownClause { clause, .. }
            | MmlError::MalformedClause { clause, .. }
            | MmlError::InvalidLength { clause, .. } => clause,
        }
    }
}
