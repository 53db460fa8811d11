//! Configuration for the certificate pipeline.
//!
//! Everything the pipeline used to read from process globals lives here and is
//! handed to each stage at construction time.

use crate::signatures::DigestAlgorithm;
use std::path::PathBuf;

/// HMAC key used when no `SECRET_KEY` is configured. Never use it in production.
pub const DEVELOPMENT_SECRET_KEY: &str = "super-secret-key-change-this";

/// Default location of the PKCS#12 signing bundle, relative to the working directory.
pub const DEFAULT_CREDENTIALS_PATH: &str = "certs/signing-cert.p12";

/// Default passphrase of the signing bundle produced by the operator tooling.
pub const DEFAULT_CREDENTIALS_PASSPHRASE: &str = "password123";

/// Default signature reservation in bytes (hex-encoded into twice as many digits).
pub const DEFAULT_SIGNATURE_SIZE: usize = 8192;

/// What to do when signing degrades to an unsigned placeholder document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedPolicy {
    /// Deliver the unsigned placeholder document and report the degraded outcome
    #[default]
    Deliver,
    /// Fail the issuance with [`crate::Error::SigningDegraded`]
    Reject,
}

impl DegradedPolicy {
    /// Parse a policy name (`deliver` or `reject`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deliver" => Some(DegradedPolicy::Deliver),
            "reject" => Some(DegradedPolicy::Reject),
            _ => None,
        }
    }
}

/// Descriptive strings embedded in the signature dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMetadata {
    /// `/Reason`
    pub reason: String,
    /// `/ContactInfo`
    pub contact_info: String,
    /// `/Name`
    pub name: String,
    /// `/Location`
    pub location: String,
}

impl Default for SignatureMetadata {
    fn default() -> Self {
        Self {
            reason: "Authorized Certificate".to_string(),
            contact_info: "admin@bignap.com".to_string(),
            name: "Bignap Training Center".to_string(),
            location: "Boston, MA".to_string(),
        }
    }
}

impl SignatureMetadata {
    /// Set the signing reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = contact_info.into();
        self
    }

    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// HMAC key for the integrity hash
    pub secret_key: String,
    /// Path of the PKCS#12 signing bundle
    pub credentials_path: PathBuf,
    /// Passphrase of the signing bundle
    pub credentials_passphrase: String,
    /// Directory that stamp references and temporary downloads resolve against
    pub uploads_dir: PathBuf,
    /// Degraded signing policy
    pub degraded_policy: DegradedPolicy,
    /// Signature dictionary strings
    pub signature_metadata: SignatureMetadata,
    /// Bytes reserved for the DER signature
    pub signature_size: usize,
    /// Digest used inside the CMS signature
    pub digest_algorithm: DigestAlgorithm,
    /// Flate-compress page content streams
    pub compress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            secret_key: DEVELOPMENT_SECRET_KEY.to_string(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            credentials_passphrase: DEFAULT_CREDENTIALS_PASSPHRASE.to_string(),
            uploads_dir: PathBuf::from("uploads"),
            degraded_policy: DegradedPolicy::Deliver,
            signature_metadata: SignatureMetadata::default(),
            signature_size: DEFAULT_SIGNATURE_SIZE,
            digest_algorithm: DigestAlgorithm::Sha256,
            compress: true,
        }
    }

    /// Defaults overlaid with `SECRET_KEY`, `SIGNING_CERT_PATH`,
    /// `SIGNING_CERT_PASSPHRASE`, `UPLOADS_DIR` and `CERT_DEGRADED_POLICY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] with a caller-supplied variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(secret) = lookup("SECRET_KEY").filter(|s| !s.is_empty()) {
            config.secret_key = secret;
        }
        if let Some(path) = lookup("SIGNING_CERT_PATH").filter(|s| !s.is_empty()) {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(passphrase) = lookup("SIGNING_CERT_PASSPHRASE") {
            config.credentials_passphrase = passphrase;
        }
        if let Some(dir) = lookup("UPLOADS_DIR").filter(|s| !s.is_empty()) {
            config.uploads_dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("CERT_DEGRADED_POLICY") {
            match DegradedPolicy::parse(&policy) {
                Some(parsed) => config.degraded_policy = parsed,
                None => log::warn!(
                    "Ignoring unknown CERT_DEGRADED_POLICY {:?}, keeping {:?}",
                    policy,
                    config.degraded_policy
                ),
            }
        }

        config
    }

    /// Whether the integrity hash is keyed with the development secret.
    pub fn uses_development_secret(&self) -> bool {
        self.secret_key == DEVELOPMENT_SECRET_KEY
    }

    /// Directory for temporary download files.
    pub fn temp_dir(&self) -> PathBuf {
        self.uploads_dir.join("temp")
    }

    /// Set the HMAC secret key.
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = secret_key.into();
        self
    }

    /// Set the signing bundle path.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Set the signing bundle passphrase.
    pub fn with_credentials_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.credentials_passphrase = passphrase.into();
        self
    }

    /// Set the uploads directory.
    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    /// Set the degraded signing policy.
    pub fn with_degraded_policy(mut self, policy: DegradedPolicy) -> Self {
        self.degraded_policy = policy;
        self
    }

    /// Set the signature dictionary strings.
    pub fn with_signature_metadata(mut self, metadata: SignatureMetadata) -> Self {
        self.signature_metadata = metadata;
        self
    }

    /// Set the signature reservation in bytes.
    pub fn with_signature_size(mut self, size: usize) -> Self {
        self.signature_size = size;
        self
    }

    /// Set the CMS digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Enable or disable content stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}
