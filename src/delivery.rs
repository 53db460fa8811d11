//! Handing issued certificates to a download.
//!
//! The caller either streams [`IssuedCertificate::document`] directly or goes
//! through [`deliver`], which stages the bytes in a temporary file and removes
//! it whatever the send callback returns.

use crate::error::Result;
use crate::pipeline::IssuedCertificate;
use std::path::{Path, PathBuf};

/// Download filename: `certificate-<type>-<timestamp_ms>.pdf`.
///
/// Every character of the type outside `[A-Za-z0-9]` becomes one `_` per
/// UTF-16 code unit, so a character outside the Basic Multilingual Plane
/// turns into `__`. The result is lowercased.
pub fn certificate_filename(certification_type: &str, timestamp_ms: i64) -> String {
    let mut sanitized = String::with_capacity(certification_type.len());
    for c in certification_type.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else {
            sanitized.push_str(&"_".repeat(c.len_utf16()));
        }
    }
    format!("certificate-{}-{}.pdf", sanitized, timestamp_ms)
}

/// A certificate written to disk, removed again on drop.
#[derive(Debug)]
pub struct TempCertificateFile {
    path: PathBuf,
}

impl TempCertificateFile {
    /// Write `bytes` to `dir/filename`, creating `dir` if needed.
    pub fn write(dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        std::fs::write(&path, bytes)?;
        log::debug!("Staged {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { path })
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempCertificateFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => log::warn!("Could not remove temporary file {}: {}", self.path.display(), e),
        }
    }
}

/// Stage the certificate in `dir` and pass its path and filename to `send`.
///
/// The temporary file is gone by the time this returns, on success and on error.
pub fn deliver<T, F>(dir: &Path, issued: &IssuedCertificate, send: F) -> Result<T>
where
    F: FnOnce(&Path, &str) -> Result<T>,
{
    let file = TempCertificateFile::write(dir, &issued.filename, issued.document())?;
    send(file.path(), &issued.filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::PipelineStage;
    use crate::signatures::SigningOutcome;

    fn issued() -> IssuedCertificate {
        IssuedCertificate {
            outcome: SigningOutcome::Signed(b"%PDF-1.7 signed".to_vec()),
            signature_hash: "ab".repeat(32),
            filename: certificate_filename("NIDCAP Professional", 1_700_000_000_000),
            stages: vec![PipelineStage::Start, PipelineStage::Done],
        }
    }

    #[test]
    fn test_certificate_filename() {
        assert_eq!(
            certificate_filename("NIDCAP Professional", 1_700_000_000_000),
            "certificate-nidcap_professional-1700000000000.pdf"
        );
        assert_eq!(certificate_filename("../etc/passwd", 5), "certificate-___etc_passwd-5.pdf");
        assert_eq!(certificate_filename("Überprüfung", 1), "certificate-_berpr_fung-1.pdf");
    }

    #[test]
    fn test_certificate_filename_astral_characters() {
        // one underscore per UTF-16 code unit
        assert_eq!(certificate_filename("Trainer 🎓", 7), "certificate-trainer___-7.pdf");
        assert_eq!(certificate_filename("𝔸", 7), "certificate-__-7.pdf");
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("temp");
        let path = {
            let file = TempCertificateFile::write(&nested, "a.pdf", b"data").unwrap();
            assert_eq!(std::fs::read(file.path()).unwrap(), b"data");
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_deliver_cleans_up_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let issued = issued();

        let seen = deliver(dir.path(), &issued, |path, filename| {
            assert!(path.exists());
            assert_eq!(filename, issued.filename);
            Ok(std::fs::read(path)?)
        })
        .unwrap();

        assert_eq!(seen, b"%PDF-1.7 signed");
        assert!(!dir.path().join(&issued.filename).exists());
    }

    #[test]
    fn test_deliver_cleans_up_after_error() {
        let dir = tempfile::tempdir().unwrap();
        let issued = issued();

        let result: Result<()> = deliver(dir.path(), &issued, |_, _| Err(Error::Store("client went away".to_string())));

        assert!(matches!(result, Err(Error::Store(_))));
        assert!(!dir.path().join(&issued.filename).exists());
    }
}
