//! Error types for reflective lookup and invocation

use crate::metadata::Visibility;

/// Error raised by a method body, boxed so any error type can pass through
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for reflective operations
pub type ReflectResult<T> = Result<T, ReflectError>;

/// Reflection error types
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// No method declared directly on the type matches the name and exact parameter list
    #[error("No declared method {signature} on {type_name}")]
    NotFound {
        /// Type that was searched
        type_name: String,
        /// Requested name and parameter types
        signature: String,
    },

    /// The access policy refuses to override visibility for the matched method
    #[error("Access to {visibility} method {signature} on {type_name} denied by reflection policy")]
    AccessDenied {
        /// Declaring type
        type_name: String,
        /// Matched method signature
        signature: String,
        /// Declared visibility of the method
        visibility: Visibility,
    },

    /// The method body returned an error or panicked
    #[error("Invocation of {signature} failed: {source}")]
    InvocationFailed {
        /// Invoked method signature
        signature: String,
        /// Error raised by the method body
        #[source]
        source: BoxError,
    },

    /// Receiver or arguments do not fit the resolved method
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Returned value is not of the type the caller asked for
    #[error("Return type mismatch: expected {expected}, got {actual}")]
    ReturnTypeMismatch {
        /// Type requested by the caller
        expected: &'static str,
        /// Runtime type of the returned value
        actual: &'static str,
    },
}

impl ReflectError {
    /// Returns true for [`ReflectError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReflectError::NotFound { .. })
    }

    /// Returns true for [`ReflectError::AccessDenied`]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ReflectError::AccessDenied { .. })
    }
}

/// A method body panicked during invocation
#[derive(Debug, Clone, thiserror::Error)]
#[error("Method panicked: {0}")]
pub struct Panicked(pub String);

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Panicked(message)
    }
}

/// Failure extracting a typed argument inside a method body
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArgumentError {
    /// Index past the end of the argument list
    #[error("Missing argument {0}")]
    Missing(usize),

    /// Argument already moved out, or void
    #[error("Argument {0} is empty")]
    Empty(usize),

    /// Argument has a different runtime type
    #[error("Argument {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Argument position
        index: usize,
        /// Requested type
        expected: &'static str,
        /// Runtime type of the argument
        actual: &'static str,
    },
}
