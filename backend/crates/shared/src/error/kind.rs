//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum shared by every crate in the workspace.

use serde::Serialize;

/// Error classification
///
/// Each variant says how a caller should treat the failure, not where it
/// came from. [`ErrorKind::is_transient`] decides whether a failed user-record
/// write is worth another attempt.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Unavailable;
/// assert!(kind.is_transient());
/// assert_eq!(kind.as_str(), "Unavailable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input rejected before reaching any collaborator
    InvalidInput,
    /// Credentials or session rejected
    Unauthorized,
    /// Conflicts with existing state (e.g. account already registered)
    Conflict,
    /// Operation exceeded its time budget
    Timeout,
    /// Remote collaborator unreachable or failing
    Unavailable,
    /// Bug or corrupted local state
    Internal,
}

impl ErrorKind {
    /// Human-readable name
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid Input",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Whether retrying the same operation later may succeed
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Unavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
