//! Records read by the pipeline.
//!
//! These mirror rows owned by the surrounding administrative application. The
//! pipeline only reads them, apart from the signature hash it writes back
//! through [`crate::store::CertificationStore`].

use serde::{Deserialize, Serialize};

/// An issued certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRecord {
    /// Certification identifier
    pub id: String,
    /// Identifier of the holder the certification belongs to
    pub holder_id: String,
    /// Certification type label, e.g. "NIDCAP Professional"
    pub certification_type: String,
    /// Issue date as stored (ISO 8601 date or timestamp)
    pub issue_date: String,
    /// Issuing center identifier
    pub issuing_center_id: Option<String>,
    /// Identifier of the staff member who signed off
    pub signer_id: Option<String>,
    /// Stored PDF location, if one was ever uploaded
    pub pdf_url: Option<String>,
    /// Persisted integrity hash (lowercase hex HMAC-SHA256)
    pub signature_hash: Option<String>,
    /// Revocation timestamp
    pub revoked_at: Option<String>,
}

impl CertificationRecord {
    /// Create a record with the fields the pipeline needs; the rest start empty.
    pub fn new(
        id: impl Into<String>,
        holder_id: impl Into<String>,
        certification_type: impl Into<String>,
        issue_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            holder_id: holder_id.into(),
            certification_type: certification_type.into(),
            issue_date: issue_date.into(),
            issuing_center_id: None,
            signer_id: None,
            pdf_url: None,
            signature_hash: None,
            revoked_at: None,
        }
    }

    /// Set the issuing center.
    pub fn with_issuing_center(mut self, center_id: impl Into<String>) -> Self {
        self.issuing_center_id = Some(center_id.into());
        self
    }

    /// Set the signer.
    pub fn with_signer(mut self, signer_id: impl Into<String>) -> Self {
        self.signer_id = Some(signer_id.into());
        self
    }

    /// Whether the certification has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// A certificate holder (a user of the training program).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    /// Holder identifier
    pub id: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact address
    pub email: Option<String>,
    /// Role names
    pub roles: Vec<String>,
}

impl Holder {
    /// Create a holder with just the name fields.
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            roles: Vec::new(),
        }
    }

    /// Name printed on the certificate: `"<first> <last>"`.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A training center that issues certifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuingCenter {
    /// Center identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Stamp image reference (a filename or an `/uploads/...` URL)
    pub stamp_url: Option<String>,
}

/// A certification joined with its issuing center's name and stamp reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationView {
    /// The certification row
    pub record: CertificationRecord,
    /// Issuing center name, absent when the center is unknown
    pub issuer_name: Option<String>,
    /// Issuing center stamp reference
    pub issuer_stamp: Option<String>,
}

impl CertificationView {
    /// Join a record with an optional issuing center.
    pub fn new(record: CertificationRecord, center: Option<&IssuingCenter>) -> Self {
        Self {
            record,
            issuer_name: center.map(|c| c.name.clone()),
            issuer_stamp: center.and_then(|c| c.stamp_url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let holder = Holder::new("u1", "Test", "User");
        assert_eq!(holder.display_name(), "Test User");
    }

    #[test]
    fn test_view_join() {
        let record = CertificationRecord::new("c1", "u1", "NIDCAP Professional", "2024-01-15")
            .with_issuing_center("tc1");
        let center = IssuingCenter {
            id: "tc1".to_string(),
            name: "Test Center".to_string(),
            stamp_url: Some("/uploads/stamp.png".to_string()),
        };
        let view = CertificationView::new(record, Some(&center));
        assert_eq!(view.issuer_name.as_deref(), Some("Test Center"));
        assert_eq!(view.issuer_stamp.as_deref(), Some("/uploads/stamp.png"));
    }

    #[test]
    fn test_record_builders() {
        let record = CertificationRecord::new("c1", "u1", "Trainer", "2024-01-15")
            .with_issuing_center("tc1")
            .with_signer("staff-7");
        assert_eq!(record.issuing_center_id.as_deref(), Some("tc1"));
        assert_eq!(record.signer_id.as_deref(), Some("staff-7"));
        assert!(record.signature_hash.is_none());
    }

    #[test]
    fn test_view_without_center() {
        let record = CertificationRecord::new("c1", "u1", "Trainer", "2024-01-15");
        let view = CertificationView::new(record, None);
        assert!(view.issuer_name.is_none());
        assert!(view.issuer_stamp.is_none());
        assert!(!view.record.is_revoked());
    }
}
