//! Integrity hash over certificate fields.
//!
//! The hash is an HMAC-SHA256 of a fixed-order JSON object
//! `{"id","user_id","type","issue_date","issuer"}` keyed with the configured
//! secret. It depends only on the five fields, so it can be recomputed later
//! and compared against the value persisted on the certification record
//! without touching the rendered PDF.

use crate::error::{Error, Result};
use crate::records::CertificationView;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The five fields covered by the integrity hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    /// Certification identifier
    pub id: String,
    /// Holder identifier (serialized as `user_id`)
    pub holder_id: String,
    /// Certification type (serialized as `type`)
    pub certification_type: String,
    /// Issue date exactly as stored
    pub issue_date: String,
    /// Issuing center name, `null` when absent
    pub issuer: Option<String>,
}

impl SignaturePayload {
    /// Build a payload from the individual fields.
    pub fn new(
        id: impl Into<String>,
        holder_id: impl Into<String>,
        certification_type: impl Into<String>,
        issue_date: impl Into<String>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            holder_id: holder_id.into(),
            certification_type: certification_type.into(),
            issue_date: issue_date.into(),
            issuer,
        }
    }

    /// Build the payload for a joined certification view.
    pub fn from_view(view: &CertificationView) -> Self {
        Self {
            id: view.record.id.clone(),
            holder_id: view.record.holder_id.clone(),
            certification_type: view.record.certification_type.clone(),
            issue_date: view.record.issue_date.clone(),
            issuer: view.issuer_name.clone(),
        }
    }

    /// Canonical serialization fed to the HMAC.
    ///
    /// Keys appear in a fixed order; `serde_json`'s default map would sort them.
    pub fn canonical_json(&self) -> String {
        let issuer = match &self.issuer {
            Some(name) => Value::String(name.clone()),
            None => Value::Null,
        };
        format!(
            "{{\"id\":{},\"user_id\":{},\"type\":{},\"issue_date\":{},\"issuer\":{}}}",
            Value::String(self.id.clone()),
            Value::String(self.holder_id.clone()),
            Value::String(self.certification_type.clone()),
            Value::String(self.issue_date.clone()),
            issuer
        )
    }
}

/// Keyed integrity hash calculator.
#[derive(Clone)]
pub struct SignatureComputer {
    mac: HmacSha256,
}

impl SignatureComputer {
    /// Create a computer keyed with `secret`.
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Configuration(format!("invalid integrity secret: {}", e)))?;
        Ok(Self { mac })
    }

    /// Lowercase hex HMAC-SHA256 of the payload's canonical JSON.
    pub fn compute(&self, payload: &SignaturePayload) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.canonical_json().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recompute and compare against a stored hash in constant time.
    ///
    /// A stored value that is not valid hex never verifies.
    pub fn verify(&self, payload: &SignaturePayload, stored_hex: &str) -> bool {
        let Ok(stored) = hex::decode(stored_hex.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(payload.canonical_json().as_bytes());
        let computed = mac.finalize().into_bytes();
        if stored.len() != computed.len() {
            return false;
        }
        computed.as_slice().ct_eq(stored.as_slice()).into()
    }
}

impl std::fmt::Debug for SignatureComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureComputer")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
