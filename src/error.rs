//! Error types for signature extraction, type resolution and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Why an annotation or signature could not be compiled.
///
/// These never abort a compilation run; the compiler records them per
/// function as diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("unsupported type annotation '{annotation}': {reason}")]
    UnsupportedType { annotation: String, reason: String },

    #[error("unsupported key type in '{annotation}': mapping keys must be str")]
    UnsupportedKeyType { annotation: String },

    #[error("unsupported literal value {value}: literal values must be None, bool, str, int or float")]
    UnsupportedLiteralValue { value: String },

    #[error("cannot resolve type '{name}' from module '{module}'")]
    UnresolvedType { name: String, module: String },

    #[error("type '{name}' used in module '{module}' is imported from an external package")]
    UnsupportedExternalType { name: String, module: String },

    #[error("cyclic type definition: {}", chain.join(" -> "))]
    CyclicTypeDefinition { chain: Vec<String> },

    #[error("invalid signature for function '{function}': {reason}")]
    InvalidSignature { function: String, reason: String },
}

impl ResolveError {
    /// Stable identifier used in machine-readable diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::UnsupportedKeyType { .. } => "unsupported_key_type",
            Self::UnsupportedLiteralValue { .. } => "unsupported_literal_value",
            Self::UnresolvedType { .. } => "unresolved_type",
            Self::UnsupportedExternalType { .. } => "unsupported_external_type",
            Self::CyclicTypeDefinition { .. } => "cyclic_type_definition",
            Self::InvalidSignature { .. } => "invalid_signature",
        }
    }

    pub(crate) fn unsupported(annotation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            annotation: annotation.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_signature(function: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors reading syntax trees from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input errors (exit code 2)
    #[error("invalid syntax tree in {origin}: {source}")]
    InvalidSyntaxTree {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("not a package (missing __init__ module): {path}")]
    NotAPackage { path: PathBuf },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors building a name filter.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl FilterError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}
