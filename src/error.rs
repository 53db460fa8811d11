//! Error types for the certificate pipeline.
//!
//! Every fallible stage returns [`Result`]. Signing problems are the one
//! exception: the signer turns them into a degraded outcome unless the
//! operator asked for strict delivery, in which case they surface as
//! [`Error::SigningDegraded`].

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while issuing a certificate.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Image error
    #[error("Image error: {0}")]
    Image(String),

    /// The certification (scoped to its holder) or the holder does not exist
    #[error("Record not found: certification {certification_id} for holder {holder_id}")]
    RecordNotFound {
        /// Requested certification identifier
        certification_id: String,
        /// Owning holder identifier
        holder_id: String,
    },

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the certification store
    #[error("Store error: {0}")]
    Store(String),

    /// The signing credential bundle could not be decoded
    #[error("Credential bundle error: {0}")]
    Credentials(String),

    /// Building or embedding the CMS signature failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Signing degraded and the configured policy rejects unsigned output
    #[error("Signing degraded: {0}")]
    SigningDegraded(String),
}
