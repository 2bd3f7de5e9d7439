//! Error taxonomy for policy resolution and evaluation.
//!
//! Every layer returns [`PolicyError`]. The variant says which stage failed; the
//! `#[source]` chain carries the underlying cause for diagnostics.

use std::fmt;
use thiserror::Error;

/// Stage that produced a [`PolicyError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Reference,
    Load,
    Spec,
    Binding,
    Engine,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Reference => "reference",
            ErrorKind::Load => "load",
            ErrorKind::Spec => "spec",
            ErrorKind::Binding => "binding",
            ErrorKind::Engine => "engine",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid reference {reference:?}: {reason}")]
    Reference { reference: String, reason: String },

    #[error("failed to load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },

    #[error("invalid document {origin}: {reason}")]
    Spec { origin: String, reason: String },

    #[error("binding arguments for {subject}: {source}")]
    Binding {
        subject: String,
        #[source]
        source: BindingError,
    },

    #[error("evaluating policy {policy}: {source}")]
    Engine {
        policy: String,
        #[source]
        source: EngineError,
    },
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::Reference { .. } => ErrorKind::Reference,
            PolicyError::Load { .. } => ErrorKind::Load,
            PolicyError::Spec { .. } => ErrorKind::Spec,
            PolicyError::Binding { .. } => ErrorKind::Binding,
            PolicyError::Engine { .. } => ErrorKind::Engine,
        }
    }

    pub fn reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::Reference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn load(uri: impl Into<String>, source: LoadError) -> Self {
        PolicyError::Load {
            uri: uri.into(),
            source,
        }
    }

    pub fn spec(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::Spec {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn binding(subject: impl Into<String>, source: BindingError) -> Self {
        PolicyError::Binding {
            subject: subject.into(),
            source,
        }
    }
}

/// Why fetching bytes for a reference failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("remote lookup failed: {0}")]
    Remote(String),

    #[error("no policy provider configured for {0:?}")]
    NoProvider(String),

    #[error("digest mismatch: expected sha256:{expected}, got sha256:{actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Why arguments could not be bound.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("missing required input {0:?}")]
    MissingInput(String),

    #[error("unresolved placeholder {placeholder:?} in {value:?}")]
    UnresolvedPlaceholder { placeholder: String, value: String },
}

/// Failure reported by a rule engine implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_error_names_missing_input() {
        let err = PolicyError::binding(
            "group sbom-quality",
            BindingError::MissingInput("user_name".to_string()),
        );
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert!(
            err.to_string()
                .contains("missing required input \"user_name\"")
        );
    }

    #[test]
    fn digest_mismatch_is_a_load_error() {
        let err = PolicyError::load(
            "file://policy.yaml",
            LoadError::DigestMismatch {
                expected: "aa".to_string(),
                actual: "bb".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Load);
        assert!(err.to_string().contains("digest mismatch"));
    }
}
