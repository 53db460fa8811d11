//! Data store collaborator.
//!
//! The pipeline needs three things from whatever owns the certification data:
//! the certification joined with its issuing center (scoped to the owning
//! holder), the holder's name fields, and a way to write the integrity hash
//! back. [`MemoryStore`] implements them in memory for the CLI and tests.

use crate::error::{Error, Result};
use crate::records::{CertificationRecord, CertificationView, Holder, IssuingCenter};
use std::collections::HashMap;
use std::sync::RwLock;

/// Queries and updates the pipeline issues against the certification data.
pub trait CertificationStore: Send + Sync {
    /// Fetch a certification joined with its issuer name and stamp reference.
    ///
    /// Returns `None` unless the certification exists and belongs to `holder_id`.
    fn find_certification(
        &self,
        certification_id: &str,
        holder_id: &str,
    ) -> Result<Option<CertificationView>>;

    /// Fetch a holder's name fields.
    fn find_holder(&self, holder_id: &str) -> Result<Option<Holder>>;

    /// Persist the integrity hash on a certification (last writer wins).
    fn update_signature_hash(&self, certification_id: &str, signature_hash: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    certifications: HashMap<String, CertificationRecord>,
    holders: HashMap<String, Holder>,
    centers: HashMap<String, IssuingCenter>,
}

/// In-memory [`CertificationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a holder.
    pub fn insert_holder(&self, holder: Holder) -> Result<()> {
        let mut tables = self.write()?;
        tables.holders.insert(holder.id.clone(), holder);
        Ok(())
    }

    /// Insert or replace an issuing center.
    pub fn insert_center(&self, center: IssuingCenter) -> Result<()> {
        let mut tables = self.write()?;
        tables.centers.insert(center.id.clone(), center);
        Ok(())
    }

    /// Insert or replace a certification.
    pub fn insert_certification(&self, record: CertificationRecord) -> Result<()> {
        let mut tables = self.write()?;
        tables.certifications.insert(record.id.clone(), record);
        Ok(())
    }

    /// Current copy of a certification row.
    pub fn certification(&self, certification_id: &str) -> Result<Option<CertificationRecord>> {
        Ok(self.read()?.certifications.get(certification_id).cloned())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl CertificationStore for MemoryStore {
    fn find_certification(
        &self,
        certification_id: &str,
        holder_id: &str,
    ) -> Result<Option<CertificationView>> {
        let tables = self.read()?;
        let Some(record) = tables.certifications.get(certification_id) else {
            return Ok(None);
        };
        if record.holder_id != holder_id {
            return Ok(None);
        }

        // Left join: an unknown center leaves the issuer columns empty
        let center = record
            .issuing_center_id
            .as_ref()
            .and_then(|id| tables.centers.get(id));
        Ok(Some(CertificationView::new(record.clone(), center)))
    }

    fn find_holder(&self, holder_id: &str) -> Result<Option<Holder>> {
        Ok(self.read()?.holders.get(holder_id).cloned())
    }

    fn update_signature_hash(&self, certification_id: &str, signature_hash: &str) -> Result<()> {
        let mut tables = self.write()?;
        match tables.certifications.get_mut(certification_id) {
            Some(record) => {
                record.signature_hash = Some(signature_hash.to_string());
                Ok(())
            },
            None => Err(Error::Store(format!(
                "cannot update signature hash: certification {} does not exist",
                certification_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_holder(Holder::new("u1", "Test", "User")).unwrap();
        store
            .insert_center(IssuingCenter {
                id: "tc1".to_string(),
                name: "Test Center".to_string(),
                stamp_url: None,
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
    fn test_find_certification_scoped_to_holder() {
        let store = seeded();
        let view = store.find_certification("c1", "u1").unwrap().unwrap();
        assert_eq!(view.issuer_name.as_deref(), Some("Test Center"));

        assert!(store.find_certification("c1", "someone-else").unwrap().is_none());
        assert!(store.find_certification("missing", "u1").unwrap().is_none());
    }

    #[test]
    fn test_unknown_center_is_left_join() {
        let store = seeded();
        store
            .insert_certification(
                CertificationRecord::new("c2", "u1", "Trainer", "2024-02-01")
                    .with_issuing_center("gone"),
            )
            .unwrap();
        let view = store.find_certification("c2", "u1").unwrap().unwrap();
        assert!(view.issuer_name.is_none());
    }

    #[test]
    fn test_update_signature_hash() {
        let store = seeded();
        store.update_signature_hash("c1", "abc123").unwrap();
        let record = store.certification("c1").unwrap().unwrap();
        assert_eq!(record.signature_hash.as_deref(), Some("abc123"));

        assert!(matches!(store.update_signature_hash("nope", "x"), Err(Error::Store(_))));
    }

    #[test]
    fn test_find_holder() {
        let store = seeded();
        assert_eq!(store.find_holder("u1").unwrap().unwrap().display_name(), "Test User");
        assert!(store.find_holder("u2").unwrap().is_none());
    }
}
