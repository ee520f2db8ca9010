use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OCPP CallError code, as emitted on the wire. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormatViolation,
    PropertyConstraintViolation,
    OccurrenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::NotSupported => "NotSupported",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::ProtocolError => "ProtocolError",
            ErrorCode::SecurityError => "SecurityError",
            ErrorCode::FormatViolation => "FormatViolation",
            ErrorCode::PropertyConstraintViolation => "PropertyConstraintViolation",
            ErrorCode::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            ErrorCode::TypeConstraintViolation => "TypeConstraintViolation",
            ErrorCode::GenericError => "GenericError",
        };
        f.write_str(s)
    }
}

/// A protocol-level error carrying one of the closed OCPP error codes.
///
/// These are values, not exceptional control flow: any Call that cannot be
/// satisfied resolves to one of these and the transport worker decides what
/// to do with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {description}")]
pub struct OcppError {
    pub code: ErrorCode,
    pub description: String,
}

impl OcppError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(ErrorCode::NotImplemented, format!("{action} not implemented"))
    }

    pub fn format_violation(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::FormatViolation, description)
    }

    pub fn protocol_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProtocolError, description)
    }

    pub fn internal_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display_matches_wire_form() {
        assert_eq!(ErrorCode::FormatViolation.to_string(), "FormatViolation");
        assert_eq!(
            ErrorCode::PropertyConstraintViolation.to_string(),
            "PropertyConstraintViolation"
        );
    }

    #[test]
    fn not_implemented_names_the_action() {
        let err = OcppError::not_implemented("Frobnicate");
        assert_eq!(err.code, ErrorCode::NotImplemented);
        assert_eq!(err.description, "Frobnicate not implemented");
    }
}
