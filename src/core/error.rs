//! # Navigation Errors
//!
//! Only invariant violations are errors. A guard that says "no" or a
//! redirect that returns nothing is a normal outcome and is reported
//! through [`Navigation`](crate::core::path::Navigation) instead.

use std::fmt;

use crate::core::path::PathKey;

/// Programming errors surfaced synchronously to the caller. Not retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// Structural mutation attempted on a fixed-selection path.
    Immutable { path: PathKey, operation: &'static str },
    /// Screen pushed onto a fixed-selection path it is not a member of.
    NotAMember { path: PathKey, screen: String },
    /// Selection index past the end of a fixed-selection path.
    IndexOutOfRange { path: PathKey, index: usize, len: usize },
    /// A fixed-selection path must hold at least one screen.
    EmptyFixedPath(PathKey),
    /// A screen names a path the coordinator has never created.
    UnknownPath(PathKey),
    /// Redirect chain did not settle within the configured hop budget.
    RedirectLimit { limit: usize },
    /// Shell/host chain deeper than the configured limit (likely a cycle).
    ShellDepth { limit: usize },
    /// A screen declares a shell that does not host a nested path.
    NotAHost { member: String, shell: String },
    /// A shell member's owning path is not the path its host renders.
    ShellMismatch { member: String, expected: PathKey, found: PathKey },
    /// A custom deep-link handler failed.
    Handler(String),
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::Immutable { path, operation } => {
                write!(f, "cannot {operation} on fixed path '{path}'")
            }
            NavError::NotAMember { path, screen } => {
                write!(f, "{screen} is not a member of fixed path '{path}'")
            }
            NavError::IndexOutOfRange { path, index, len } => {
                write!(f, "index {index} out of range for fixed path '{path}' (len {len})")
            }
            NavError::EmptyFixedPath(path) => write!(f, "fixed path '{path}' has no screens"),
            NavError::UnknownPath(path) => write!(f, "unknown path '{path}'"),
            NavError::RedirectLimit { limit } => {
                write!(f, "redirect chain exceeded {limit} hops")
            }
            NavError::ShellDepth { limit } => {
                write!(f, "shell chain exceeded depth {limit}")
            }
            NavError::NotAHost { member, shell } => {
                write!(f, "{member} declares shell {shell}, which hosts no path")
            }
            NavError::ShellMismatch { member, expected, found } => write!(
                f,
                "{member} belongs to path '{found}' but its host renders '{expected}'"
            ),
            NavError::Handler(msg) => write!(f, "deep link handler error: {msg}"),
        }
    }
}

impl std::error::Error for NavError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_path() {
        let err = NavError::Immutable {
            path: PathKey::new("tabs"),
            operation: "pop",
        };
        assert_eq!(err.to_string(), "cannot pop on fixed path 'tabs'");
    }

    #[test]
    fn test_display_index_out_of_range() {
        let err = NavError::IndexOutOfRange {
            path: PathKey::new("tabs"),
            index: 4,
            len: 3,
        };
        assert!(err.to_string().contains("index 4"));
        assert!(err.to_string().contains("len 3"));
    }
}
