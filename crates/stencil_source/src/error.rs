// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Errors raised while locating or registering template sources.

use thiserror::Error;

/// An error from a [`TemplateManager`](crate::TemplateManager).
///
/// Resolution failures are recoverable (the caller may supply a fallback template); the other
/// variants indicate misuse of a manager and are not worth retrying.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No source could be located for the requested template.
    #[error("template '{name}' could not be resolved: {reason}")]
    TemplateResolution {
        /// The name of the template that was requested.
        name: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The manager does not support the requested operation, e.g. adding a template at runtime
    /// to a manager that only reads from disk.
    #[error("{manager} does not support {operation}")]
    UnsupportedOperation {
        /// The operation that was attempted.
        operation: &'static str,
        /// The kind of manager that rejected the operation.
        manager: &'static str,
    },

    /// A template was registered twice under the same key with different content.
    #[error("a different template is already registered under key '{key}'")]
    Conflict {
        /// The unique key string that is already taken.
        key: String,
    },

    /// Reading a template from storage failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` for template source operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(Error: Send, Sync);
    }

    #[test]
    fn resolution_message_names_template() {
        let error = Error::not_found("layout", "no such file");
        assert_eq!(error.to_string(), "template 'layout' could not be resolved: no such file");
    }

    #[test]
    fn unsupported_operation_message() {
        let error = Error::UnsupportedOperation {
            operation: "add_dynamic",
            manager: "EmbeddedTemplateManager",
        };
        assert_eq!(error.to_string(), "EmbeddedTemplateManager does not support add_dynamic");
    }
}
