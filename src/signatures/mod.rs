//! PDF digital signatures.
//!
//! Signing is a two-pass affair. [`PlaceholderInjector`] appends an
//! incremental update with a signature field whose `/Contents` is a
//! zero-filled hex string and whose `/ByteRange` holds placeholder names.
//! [`PdfSigner`] then writes the real ByteRange, hashes everything outside
//! the `/Contents` gap and embeds a detached CMS signature in the gap,
//! without moving a single byte.
//!
//! [`CertificateSigner`] is the pipeline-facing wrapper: it loads the
//! PKCS#12 bundle on every call and turns any failure into
//! [`SigningOutcome::Unsigned`]. A signature field in a document is never
//! evidence of a signature; use [`SignatureVerifier`] to check one.
//!
//! ## Example
//!
//! ```ignore
//! use cert_oxide::config::SignatureMetadata;
//! use cert_oxide::signatures::{DigestAlgorithm, PdfSigner, PlaceholderInjector, SigningCredentials};
//!
//! let prepared = PlaceholderInjector::new(SignatureMetadata::default(), 8192).inject(&pdf)?;
//! let credentials = SigningCredentials::load("certs/signing-cert.p12", "password123")?;
//! let signed = PdfSigner::new(credentials, DigestAlgorithm::Sha256).sign_document(&prepared)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

mod byterange;
mod credentials;
mod placeholder;
mod signer;
mod types;
mod verifier;

pub use byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER, BYTE_RANGE_PLACEHOLDER_ENTRY};
pub use credentials::SigningCredentials;
pub use placeholder::{PlaceholderInjector, SIGNATURE_FIELD_NAME};
pub use signer::{CertificateSigner, PdfSigner};
pub use types::{
    DegradedReason, DigestAlgorithm, SignatureInfo, SignatureSubFilter, SigningOutcome, VerificationResult,
    VerificationStatus,
};
pub use verifier::SignatureVerifier;
