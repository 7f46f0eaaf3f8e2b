//! Error types for native compositor calls.

use thiserror::Error;

/// Errors reported by the native compositor or EGL layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// A native call failed with an error code.
    #[error("{op} failed (code {code})")]
    Call {
        /// Name of the failed operation.
        op: &'static str,
        /// Native error code.
        code: i32,
    },

    /// The handle does not name a live native object.
    #[error("invalid native handle")]
    InvalidHandle,

    /// The operation or format is not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// An argument was rejected before reaching the native layer.
    #[error("bad argument: {0}")]
    BadArgument(&'static str),

    /// The compositor connection has gone away.
    #[error("compositor connection lost")]
    Disconnected,
}

impl NativeError {
    /// Shorthand for a failed call.
    pub fn call(op: &'static str, code: i32) -> Self {
        Self::Call { op, code }
    }
}

/// Result type for native calls.
pub type NativeResult<T> = Result<T, NativeError>;
