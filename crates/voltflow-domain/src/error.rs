use thiserror::Error;
use voltflow_ocpp::error::OcppError;
use voltflow_ocpp::schema::SchemaError;

/// Failures from the certificate validation service.
#[derive(Error, Debug)]
pub enum CertificateValidationError {
    #[error("no certificates found in PEM data")]
    EmptyChain,

    #[error("leaf certificate CN {actual} does not match {expected}")]
    SubjectMismatch { expected: String, actual: String },

    #[error("certificate chain is not trusted: {0}")]
    UntrustedChain(String),

    #[error("certificate {serial} has been revoked")]
    CertificateRevoked { serial: String },

    #[error("OCSP responder unavailable after {attempts} attempts")]
    OcspUnavailable { attempts: u32 },

    #[error("x509 processing failed: {0}")]
    X509(String),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Ocpp(#[from] OcppError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Certificate(#[from] CertificateValidationError),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("upstream service error: {0}")]
    Upstream(#[source] anyhow::Error),
}

impl DomainError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        DomainError::Store(err.into())
    }

    pub fn upstream(err: impl Into<anyhow::Error>) -> Self {
        DomainError::Upstream(err.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
