//! Certificate issuance pipeline.
//!
//! ```text
//! CertificationView + Holder
//!     ↓
//! [SignatureComputer]   HMAC over the five record fields, persisted to the store
//!     ↓ HASHED
//! [CertificateRenderer] one landscape page
//!     ↓ RENDERED
//! [PlaceholderInjector] incremental update with an empty signature field
//!     ↓ PLACEHELD
//! [CertificateSigner]   detached CMS signature, or the placeholder document
//!     ↓ SIGNED | DEGRADED
//! IssuedCertificate
//! ```
//!
//! Every stage runs once. Failures before signing abort the run; signing
//! failures degrade to an unsigned document unless the configuration selects
//! [`DegradedPolicy::Reject`].

use crate::config::{DegradedPolicy, PipelineConfig};
use crate::delivery::certificate_filename;
use crate::error::{Error, Result};
use crate::integrity::{SignatureComputer, SignaturePayload};
use crate::records::{CertificationView, Holder};
use crate::renderer::{CertificateFace, CertificateRenderer};
use crate::signatures::{CertificateSigner, DegradedReason, PlaceholderInjector, SigningOutcome};
use crate::store::CertificationStore;
use std::fmt;

/// Marker of a signature form field in the finished document.
const SIGNATURE_FIELD_MARKER: &[u8] = b"/FT /Sig";

/// Pipeline state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Nothing done yet
    Start,
    /// Integrity hash computed and handed to the store
    Hashed,
    /// Certificate page rendered
    Rendered,
    /// Signature placeholder appended
    Placeheld,
    /// CMS signature embedded
    Signed,
    /// Signing failed, the placeholder document stands in
    Degraded,
    /// Result handed back to the caller
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "START",
            PipelineStage::Hashed => "HASHED",
            PipelineStage::Rendered => "RENDERED",
            PipelineStage::Placeheld => "PLACEHELD",
            PipelineStage::Signed => "SIGNED",
            PipelineStage::Degraded => "DEGRADED",
            PipelineStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// A finished certificate.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// Signed document, or the unsigned placeholder document with its reason
    pub outcome: SigningOutcome,
    /// Integrity hash persisted on the record
    pub signature_hash: String,
    /// Suggested download filename
    pub filename: String,
    /// Stages the run went through, in order
    pub stages: Vec<PipelineStage>,
}

impl IssuedCertificate {
    /// The PDF bytes.
    pub fn document(&self) -> &[u8] {
        self.outcome.document()
    }

    /// Whether a signature was embedded.
    pub fn is_signed(&self) -> bool {
        self.outcome.is_signed()
    }

    /// Why the document is unsigned, if it is.
    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        self.outcome.degraded_reason()
    }

    /// Take the PDF bytes.
    pub fn into_document(self) -> Vec<u8> {
        self.outcome.into_document()
    }
}

/// Runs hash → render → placeholder → sign for one certification.
#[derive(Debug)]
pub struct CertificatePipeline {
    config: PipelineConfig,
    computer: SignatureComputer,
    renderer: CertificateRenderer,
    injector: PlaceholderInjector,
    signer: CertificateSigner,
}

impl CertificatePipeline {
    /// Build every stage from one configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if config.uses_development_secret() {
            log::warn!("Integrity hashes use the development secret key; set SECRET_KEY in production");
        }

        let computer = SignatureComputer::new(config.secret_key.as_bytes())?;
        let renderer = CertificateRenderer::new(&config);
        let injector = PlaceholderInjector::new(config.signature_metadata.clone(), config.signature_size);
        let signer = CertificateSigner::new(&config);

        Ok(Self {
            config,
            computer,
            renderer,
            injector,
            signer,
        })
    }

    /// Replace the placeholder stage, e.g. to pin the signing time.
    pub fn with_injector(mut self, injector: PlaceholderInjector) -> Self {
        self.injector = injector;
        self
    }

    /// The configuration the stages were built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The integrity hash stage.
    pub fn computer(&self) -> &SignatureComputer {
        &self.computer
    }

    /// Look up a certification owned by `holder_id` and issue it.
    ///
    /// A certification that does not exist, or belongs to another holder, and
    /// a missing holder both yield [`Error::RecordNotFound`].
    pub fn issue_for_holder(
        &self,
        store: &dyn CertificationStore,
        certification_id: &str,
        holder_id: &str,
    ) -> Result<IssuedCertificate> {
        let not_found = || Error::RecordNotFound {
            certification_id: certification_id.to_string(),
            holder_id: holder_id.to_string(),
        };

        let view = store
            .find_certification(certification_id, holder_id)?
            .ok_or_else(not_found)?;
        let holder = store.find_holder(holder_id)?.ok_or_else(not_found)?;

        self.issue(&view, &holder, store)
    }

    /// Issue a certificate for an already-fetched certification and holder.
    pub fn issue(
        &self,
        view: &CertificationView,
        holder: &Holder,
        store: &dyn CertificationStore,
    ) -> Result<IssuedCertificate> {
        let mut stages = vec![PipelineStage::Start];
        let record_id = &view.record.id;

        log::info!("Phase 1: computing integrity hash for certification {}", record_id);
        let signature_hash = self.computer.compute(&SignaturePayload::from_view(view));
        if let Err(e) = store.update_signature_hash(record_id, &signature_hash) {
            log::warn!("Could not persist signature hash for {}: {}", record_id, e);
        }
        advance(&mut stages, PipelineStage::Hashed);

        log::info!("Phase 2: generating visuals");
        let face = CertificateFace::from_view(view, holder);
        let rendered = self.renderer.render(&face)?;
        log::info!("Visual PDF generated: {} bytes", rendered.len());
        advance(&mut stages, PipelineStage::Rendered);

        log::info!("Phase 3: adding signature placeholder");
        let prepared = self.injector.inject(&rendered)?;
        log::info!("Placeholder added: {} bytes", prepared.len());
        advance(&mut stages, PipelineStage::Placeheld);

        log::info!("Phase 4: signing with {}", self.signer.credentials_path().display());
        let outcome = self.signer.sign(prepared);
        match outcome.degraded_reason() {
            None => {
                log::info!("Signed PDF: {} bytes", outcome.document().len());
                advance(&mut stages, PipelineStage::Signed);
            },
            Some(reason) => {
                advance(&mut stages, PipelineStage::Degraded);
                if self.config.degraded_policy == DegradedPolicy::Reject {
                    return Err(Error::SigningDegraded(reason.to_string()));
                }
                log::warn!("Delivering certification {} unsigned: {}", record_id, reason);
            },
        }

        if !contains(outcome.document(), SIGNATURE_FIELD_MARKER) {
            log::error!("CRITICAL: certificate {} has no signature field", record_id);
        }

        let filename = certificate_filename(
            &view.record.certification_type,
            chrono::Utc::now().timestamp_millis(),
        );
        advance(&mut stages, PipelineStage::Done);

        Ok(IssuedCertificate {
            outcome,
            signature_hash,
            filename,
            stages,
        })
    }
}

fn advance(stages: &mut Vec<PipelineStage>, next: PipelineStage) {
    if let Some(current) = stages.last() {
        log::debug!("Pipeline {} -> {}", current, next);
    }
    stages.push(next);
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CertificationRecord, IssuingCenter};
    use crate::store::MemoryStore;

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig::new()
            .with_secret_key("test-secret")
            .with_uploads_dir(dir.join("uploads"))
            .with_credentials_path(dir.join("missing.p12"))
            .with_signature_size(256)
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_holder(Holder::new("u1", "Test", "User")).unwrap();
        store
            .insert_center(IssuingCenter {
                id: "tc1".to_string(),
                name: "Test Center".to_string(),
                stamp_url: Some("/uploads/missing-stamp.png".to_string()),
            })
            .unwrap();
        store
            .insert_certification(
                CertificationRecord::new("c1", "u1", "NIDCAP Professional", "2024-01-15")
                    .with_issuing_center("tc1"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_degraded_run_delivers_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CertificatePipeline::new(config(dir.path())).unwrap();
        let store = seeded();

        let issued = pipeline.issue_for_holder(&store, "c1", "u1").unwrap();
        assert!(!issued.is_signed());
        assert!(matches!(issued.degraded_reason(), Some(DegradedReason::CredentialsMissing(_))));
        assert!(contains(issued.document(), b"/ByteRange [0 /**********"));
        assert_eq!(
            issued.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Hashed,
                PipelineStage::Rendered,
                PipelineStage::Placeheld,
                PipelineStage::Degraded,
                PipelineStage::Done,
            ]
        );
        assert!(issued.filename.starts_with("certificate-nidcap_professional-"));
    }

    #[test]
    fn test_hash_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CertificatePipeline::new(config(dir.path())).unwrap();
        let store = seeded();

        let issued = pipeline.issue_for_holder(&store, "c1", "u1").unwrap();
        let stored = store.certification("c1").unwrap().unwrap().signature_hash;
        assert_eq!(stored.as_deref(), Some(issued.signature_hash.as_str()));

        let payload = SignaturePayload::new(
            "c1",
            "u1",
            "NIDCAP Professional",
            "2024-01-15",
            Some("Test Center".to_string()),
        );
        assert_eq!(pipeline.computer().compute(&payload), issued.signature_hash);
    }

    #[test]
    fn test_reject_policy_fails_degraded_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_degraded_policy(DegradedPolicy::Reject);
        let pipeline = CertificatePipeline::new(config).unwrap();

        let err = pipeline.issue_for_holder(&seeded(), "c1", "u1").unwrap_err();
        assert!(matches!(err, Error::SigningDegraded(msg) if msg.contains("missing.p12")));
    }

    #[test]
    fn test_unknown_records_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CertificatePipeline::new(config(dir.path())).unwrap();
        let store = seeded();

        assert!(matches!(
            pipeline.issue_for_holder(&store, "c1", "intruder"),
            Err(Error::RecordNotFound { .. })
        ));
        assert!(matches!(
            pipeline.issue_for_holder(&store, "nope", "u1"),
            Err(Error::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_holder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CertificatePipeline::new(config(dir.path())).unwrap();
        let store = MemoryStore::new();
        store
            .insert_certification(CertificationRecord::new("c9", "ghost", "Trainer", "2024-03-01"))
            .unwrap();

        let err = pipeline.issue_for_holder(&store, "c9", "ghost").unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { holder_id, .. } if holder_id == "ghost"));
    }

    #[test]
    fn test_injector_override_pins_signature_dictionary() {
        use crate::config::SignatureMetadata;
        use chrono::TimeZone;

        let dir = tempfile::tempdir().unwrap();
        let metadata = SignatureMetadata::default()
            .with_reason("Course completed")
            .with_contact_info("registrar@example.org")
            .with_name("Example Training Center")
            .with_location("Lyon");
        let signed_at = chrono::Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let pipeline = CertificatePipeline::new(config(dir.path()))
            .unwrap()
            .with_injector(PlaceholderInjector::new(metadata, 256).with_signing_time(signed_at));
        assert_eq!(pipeline.config().signature_size, 256);

        let issued = pipeline.issue_for_holder(&seeded(), "c1", "u1").unwrap();
        let pdf = issued.document();
        assert!(contains(pdf, b"/M (D:20240305143000Z)"));
        assert!(contains(pdf, b"/Reason (Course completed)"));
        assert!(contains(pdf, b"/ContactInfo (registrar@example.org)"));
        assert!(contains(pdf, b"/Name (Example Training Center)"));
        assert!(contains(pdf, b"/Location (Lyon)"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Placeheld.to_string(), "PLACEHELD");
        assert_eq!(PipelineStage::Degraded.to_string(), "DEGRADED");
    }
}
