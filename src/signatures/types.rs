//! Digital signature types and data structures.
//!
//! This module defines the core types used for PDF digital signatures.

use const_oid::db::rfc5912::{ID_SHA_256, ID_SHA_384, ID_SHA_512};
use const_oid::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::path::PathBuf;

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => ID_SHA_256,
            DigestAlgorithm::Sha384 => ID_SHA_384,
            DigestAlgorithm::Sha512 => ID_SHA_512,
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Parse a name such as `sha256` or `SHA-384`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha384" => Some(DigestAlgorithm::Sha384),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Why a document was delivered without a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// No credential bundle at the configured path
    CredentialsMissing(PathBuf),
    /// The bundle exists but could not be read, decrypted or decoded
    CredentialsUnreadable(String),
    /// Building or embedding the signature failed
    SigningFailed(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::CredentialsMissing(path) => {
                write!(f, "signing credentials not found at {}", path.display())
            },
            DegradedReason::CredentialsUnreadable(reason) => {
                write!(f, "signing credentials unreadable: {}", reason)
            },
            DegradedReason::SigningFailed(reason) => write!(f, "signing failed: {}", reason),
        }
    }
}

/// Result of the signing stage.
///
/// `Unsigned` still carries a document with a signature field, but its
/// `/Contents` is the zero-filled placeholder. A signature field alone is
/// never evidence of a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
    /// The document carries a CMS signature over its ByteRange
    Signed(Vec<u8>),
    /// Signing degraded; the placeholder document is returned unchanged
    Unsigned {
        /// The placeholder document
        document: Vec<u8>,
        /// What went wrong
        reason: DegradedReason,
    },
}

impl SigningOutcome {
    /// Whether a signature was embedded.
    pub fn is_signed(&self) -> bool {
        matches!(self, SigningOutcome::Signed(_))
    }

    /// The document bytes, signed or not.
    pub fn document(&self) -> &[u8] {
        match self {
            SigningOutcome::Signed(document) | SigningOutcome::Unsigned { document, .. } => document,
        }
    }

    /// Take the document bytes.
    pub fn into_document(self) -> Vec<u8> {
        match self {
            SigningOutcome::Signed(document) | SigningOutcome::Unsigned { document, .. } => document,
        }
    }

    /// The degraded reason, if signing did not happen.
    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        match self {
            SigningOutcome::Signed(_) => None,
            SigningOutcome::Unsigned { reason, .. } => Some(reason),
        }
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the ByteRange has four numeric entries
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Certificate subject common name
    pub certificate_cn: Option<String>,
    /// Certificate issuer
    pub certificate_issuer: Option<String>,
    /// Certificate validity start
    pub valid_from: Option<String>,
    /// Certificate validity end
    pub valid_to: Option<String>,
}

/// Result of signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall verification status
    pub status: VerificationStatus,
    /// Signature information
    pub signature_info: SignatureInfo,
    /// Verification messages (errors, warnings)
    pub messages: Vec<String>,
    /// The RSA signature over the signed attributes checks out
    pub signature_valid: bool,
    /// Whether the document was modified after signing
    pub document_modified: bool,
    /// Whether the certificate is trusted
    pub certificate_trusted: bool,
    /// Whether the certificate has expired
    pub certificate_expired: bool,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            signature_valid: false,
            document_modified: false,
            certificate_trusted: false,
            certificate_expired: false,
        }
    }
}

impl VerificationResult {
    pub(crate) fn invalid(mut self, message: impl Into<String>) -> Self {
        self.status = VerificationStatus::Invalid;
        self.messages.push(message.into());
        self
    }
}

/// Verification status of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Signature is valid
    Valid,
    /// Signature is invalid (cryptographically, structurally, or never filled in)
    Invalid,
    /// Signature is intact but the certificate is not trusted
    Unknown,
    /// Signature is valid but the certificate has expired
    ValidWithWarnings,
}

impl VerificationStatus {
    /// Check if the status indicates a valid signature.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }

    /// Check if the status indicates any form of validity (including warnings).
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::ValidWithWarnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::parse("sha-384"), Some(DigestAlgorithm::Sha384));
        assert_eq!(DigestAlgorithm::parse("SHA512"), Some(DigestAlgorithm::Sha512));
        assert_eq!(DigestAlgorithm::parse("md5"), None);
    }

    #[test]
    fn test_digest_algorithm_oids() {
        assert_eq!(DigestAlgorithm::Sha256.oid().to_string(), "2.16.840.1.101.3.4.2.1");
        for alg in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512] {
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()), Some(alg));
        }
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(DigestAlgorithm::Sha256.digest(b"abc").len(), 32);
        assert_eq!(DigestAlgorithm::Sha384.digest(b"abc").len(), 48);
        assert_eq!(DigestAlgorithm::Sha512.digest(b"abc").len(), 64);
        assert_eq!(
            hex::encode(DigestAlgorithm::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("adbe.pkcs7.detached"),
            Some(SignatureSubFilter::Pkcs7Detached)
        );
        assert_eq!(SignatureSubFilter::from_pdf_name("adbe.x509.rsa_sha1"), None);
    }

    #[test]
    fn test_signing_outcome_accessors() {
        let signed = SigningOutcome::Signed(vec![1, 2]);
        assert!(signed.is_signed());
        assert!(signed.degraded_reason().is_none());

        let unsigned = SigningOutcome::Unsigned {
            document: vec![3],
            reason: DegradedReason::CredentialsMissing(PathBuf::from("certs/x.p12")),
        };
        assert!(!unsigned.is_signed());
        assert_eq!(unsigned.document(), &[3]);
        assert!(unsigned.degraded_reason().unwrap().to_string().contains("certs/x.p12"));
        assert_eq!(unsigned.into_document(), vec![3]);
    }

    #[test]
    fn test_verification_status() {
        assert!(VerificationStatus::Valid.is_valid());
        assert!(!VerificationStatus::Invalid.is_valid());
        assert!(VerificationStatus::ValidWithWarnings.is_ok());
        assert!(!VerificationStatus::Unknown.is_valid());
    }
}
