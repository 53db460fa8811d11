//! Signing credentials loaded from a PKCS#12 bundle.

use crate::error::{Error, Result};
use der::{Decode, Encode};
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use std::path::Path;
use x509_cert::Certificate;

/// Signing credentials containing certificate and private key.
#[derive(Clone)]
pub struct SigningCredentials {
    /// DER-encoded X.509 signing certificate
    pub certificate: Vec<u8>,
    /// DER-encoded private key (PKCS#8, or PKCS#1 as a fallback)
    pub private_key: Vec<u8>,
    /// Other certificates from the bundle (DER-encoded)
    pub chain: Vec<Vec<u8>>,
}

impl SigningCredentials {
    /// Create new signing credentials from raw components.
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key,
            chain: Vec::new(),
        }
    }

    /// Create credentials with a certificate chain.
    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    /// Read and decode a PKCS#12 bundle from disk.
    pub fn load(path: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_pkcs12(&data, passphrase)
    }

    /// Decode a PKCS#12 (.p12/.pfx) bundle.
    ///
    /// The MAC is checked against the passphrase first. The signing
    /// certificate is the one whose public key matches the bundled key; the
    /// remaining certificates become the chain.
    pub fn from_pkcs12(data: &[u8], passphrase: &str) -> Result<Self> {
        let pfx = p12::PFX::parse(data)
            .map_err(|e| Error::Credentials(format!("not a PKCS#12 bundle: {:?}", e)))?;

        if !pfx.verify_mac(passphrase) {
            return Err(Error::Credentials(
                "MAC verification failed (wrong passphrase?)".to_string(),
            ));
        }

        let private_key = pfx
            .key_bags(passphrase)
            .map_err(|e| Error::Credentials(format!("cannot decrypt key bag: {:?}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Credentials("bundle contains no private key".to_string()))?;

        let mut certificates = pfx
            .cert_x509_bags(passphrase)
            .map_err(|e| Error::Credentials(format!("cannot decrypt certificate bag: {:?}", e)))?;
        if certificates.is_empty() {
            return Err(Error::Credentials("bundle contains no certificate".to_string()));
        }

        let public_key = decode_rsa_key(&private_key)?
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::Credentials(format!("cannot encode public key: {}", e)))?;

        let leaf_index = certificates
            .iter()
            .position(|der| spki_der(der).is_some_and(|spki| spki == public_key.as_bytes()))
            .unwrap_or_else(|| {
                log::warn!("No certificate matches the bundled key, using the first one");
                0
            });
        let certificate = certificates.remove(leaf_index);

        log::debug!(
            "Loaded PKCS#12 bundle: {} byte certificate, {} chain certificates",
            certificate.len(),
            certificates.len()
        );
        Ok(Self::new(certificate, private_key).with_chain(certificates))
    }

    /// Decode the RSA private key.
    pub fn rsa_key(&self) -> Result<RsaPrivateKey> {
        decode_rsa_key(&self.private_key)
    }

    /// Decode the signing certificate.
    pub fn parsed_certificate(&self) -> Result<Certificate> {
        Certificate::from_der(&self.certificate)
            .map_err(|e| Error::Credentials(format!("invalid signing certificate: {}", e)))
    }

    /// Decode the chain certificates.
    pub fn parsed_chain(&self) -> Result<Vec<Certificate>> {
        self.chain
            .iter()
            .map(|der| {
                Certificate::from_der(der)
                    .map_err(|e| Error::Credentials(format!("invalid chain certificate: {}", e)))
            })
            .collect()
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("certificate", &format!("{} bytes", self.certificate.len()))
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

fn decode_rsa_key(der: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
        .map_err(|e| Error::Credentials(format!("unsupported private key (RSA expected): {}", e)))
}

/// SubjectPublicKeyInfo of a DER certificate.
fn spki_der(certificate: &[u8]) -> Option<Vec<u8>> {
    let cert = Certificate::from_der(certificate).ok()?;
    cert.tbs_certificate.subject_public_key_info.to_der().ok()
}
