//! PDF signing implementation.
//!
//! [`PdfSigner`] fills a signature placeholder with a detached CMS
//! `SignedData` over the document's ByteRange. [`CertificateSigner`] wraps it
//! with the credential loading and degraded-mode handling the issuance
//! pipeline needs.

use super::byterange::ByteRangeCalculator;
use super::credentials::SigningCredentials;
use super::types::{DegradedReason, DigestAlgorithm, SigningOutcome};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use const_oid::db::rfc5911::ID_DATA;
use const_oid::AssociatedOid;
use der::Encode;
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::{Keypair, Signer};
use spki::{AlgorithmIdentifierOwned, DynSignatureAlgorithmIdentifier, EncodePublicKey};
use std::path::PathBuf;
use x509_cert::Certificate;

/// PDF signer that creates digital signatures.
pub struct PdfSigner {
    credentials: SigningCredentials,
    digest_algorithm: DigestAlgorithm,
}

impl PdfSigner {
    /// Create a new PDF signer with the given credentials.
    pub fn new(credentials: SigningCredentials, digest_algorithm: DigestAlgorithm) -> Self {
        Self {
            credentials,
            digest_algorithm,
        }
    }

    /// Compute the digest of the signed bytes.
    pub fn compute_digest(&self, signed_bytes: &[u8]) -> Vec<u8> {
        self.digest_algorithm.digest(signed_bytes)
    }

    /// Create a DER-encoded detached CMS signature over `signed_bytes`.
    ///
    /// The signer info carries content-type and message-digest signed
    /// attributes and identifies the signer by issuer and serial number. The
    /// signing certificate and any chain certificates are embedded.
    pub fn create_signature(&self, signed_bytes: &[u8]) -> Result<Vec<u8>> {
        let digest = self.compute_digest(signed_bytes);
        let key = self.credentials.rsa_key()?;
        let certificate = self.credentials.parsed_certificate()?;
        let chain = self.credentials.parsed_chain()?;

        match self.digest_algorithm {
            DigestAlgorithm::Sha256 => build_signed_data::<Sha256>(key, certificate, chain, self.digest_algorithm, &digest),
            DigestAlgorithm::Sha384 => build_signed_data::<Sha384>(key, certificate, chain, self.digest_algorithm, &digest),
            DigestAlgorithm::Sha512 => build_signed_data::<Sha512>(key, certificate, chain, self.digest_algorithm, &digest),
        }
    }

    /// Sign a document that carries a signature placeholder.
    ///
    /// The last placeholder in the file is used. Its ByteRange is written
    /// first, so the range itself is covered by the signature, then the CMS
    /// signature is hex-encoded into `/Contents`. The output has the same
    /// length as the input.
    pub fn sign_document(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let entry_offset = ByteRangeCalculator::find_placeholder(pdf)
            .ok_or_else(|| Error::Signing("document has no ByteRange placeholder".to_string()))?;
        let contents_offset = ByteRangeCalculator::find_contents_offset(pdf, entry_offset)
            .ok_or_else(|| Error::Signing("signature dictionary has no /Contents hex string".to_string()))?;
        let placeholder_size = ByteRangeCalculator::measure_contents(pdf, contents_offset)
            .ok_or_else(|| Error::Signing("unterminated /Contents hex string".to_string()))?;

        let calculator = ByteRangeCalculator::with_placeholder_size(placeholder_size);
        let byte_range = calculator.calculate_byte_range(pdf.len(), contents_offset);
        log::debug!("Signing with ByteRange {}", ByteRangeCalculator::format_byte_range(&byte_range));

        let mut output = pdf.to_vec();
        ByteRangeCalculator::write_byte_range(&mut output, entry_offset, &byte_range)?;
        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(&output, &byte_range)?;

        let signature = self.create_signature(&signed_bytes)?;
        calculator.insert_signature(&mut output, contents_offset, &hex::encode_upper(&signature))?;

        log::debug!(
            "Embedded {} byte {} signature in a {} byte placeholder",
            signature.len(),
            self.digest_algorithm.name(),
            placeholder_size
        );
        Ok(output)
    }

    /// Digest algorithm used for signing.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Get the signing credentials.
    pub fn credentials(&self) -> &SigningCredentials {
        &self.credentials
    }
}

fn build_signed_data<D>(
    key: RsaPrivateKey,
    certificate: Certificate,
    chain: Vec<Certificate>,
    algorithm: DigestAlgorithm,
    message_digest: &[u8],
) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
    SigningKey<D>: Keypair + DynSignatureAlgorithmIdentifier + Signer<Signature>,
    <SigningKey<D> as Keypair>::VerifyingKey: EncodePublicKey,
{
    let signing_key = SigningKey::<D>::new(key);
    let content_info = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: None,
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: algorithm.oid(),
        parameters: None,
    };
    let signer_id = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.tbs_certificate.issuer.clone(),
        serial_number: certificate.tbs_certificate.serial_number.clone(),
    });

    let signer_info = SignerInfoBuilder::new(
        &signing_key,
        signer_id,
        digest_algorithm.clone(),
        &content_info,
        Some(message_digest),
    )
    .map_err(cms_error)?;

    let mut builder = SignedDataBuilder::new(&content_info);
    builder
        .add_digest_algorithm(digest_algorithm)
        .map_err(cms_error)?
        .add_certificate(CertificateChoices::Certificate(certificate))
        .map_err(cms_error)?;
    for cert in chain {
        builder
            .add_certificate(CertificateChoices::Certificate(cert))
            .map_err(cms_error)?;
    }
    builder
        .add_signer_info::<SigningKey<D>, Signature>(signer_info)
        .map_err(cms_error)?;

    let signed_data = builder.build().map_err(cms_error)?;
    signed_data
        .to_der()
        .map_err(|e| Error::Signing(format!("cannot encode SignedData: {}", e)))
}

fn cms_error(err: cms::builder::Error) -> Error {
    Error::Signing(format!("CMS builder: {:?}", err))
}

/// Signing stage of the issuance pipeline.
///
/// Reads the credential bundle on every call. Any failure is logged and
/// reported as [`SigningOutcome::Unsigned`] carrying the unchanged input.
#[derive(Debug, Clone)]
pub struct CertificateSigner {
    credentials_path: PathBuf,
    passphrase: String,
    digest_algorithm: DigestAlgorithm,
}

impl CertificateSigner {
    /// Create a signer from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            credentials_path: config.credentials_path.clone(),
            passphrase: config.credentials_passphrase.clone(),
            digest_algorithm: config.digest_algorithm,
        }
    }

    /// Path of the credential bundle.
    pub fn credentials_path(&self) -> &std::path::Path {
        &self.credentials_path
    }

    /// Sign a placeholder document, degrading instead of failing.
    pub fn sign(&self, document: Vec<u8>) -> SigningOutcome {
        match self.try_sign(&document) {
            Ok(signed) => SigningOutcome::Signed(signed),
            Err(reason) => {
                log::error!("CRITICAL: delivering unsigned document, {}", reason);
                SigningOutcome::Unsigned { document, reason }
            },
        }
    }

    fn try_sign(&self, document: &[u8]) -> std::result::Result<Vec<u8>, DegradedReason> {
        if !self.credentials_path.is_file() {
            return Err(DegradedReason::CredentialsMissing(self.credentials_path.clone()));
        }

        let credentials = SigningCredentials::load(&self.credentials_path, &self.passphrase)
            .map_err(|e| DegradedReason::CredentialsUnreadable(e.to_string()))?;

        PdfSigner::new(credentials, self.digest_algorithm)
            .sign_document(document)
            .map_err(|e| DegradedReason::SigningFailed(e.to_string()))
    }
}
