//! Shared fixtures for the integration tests.
//!
//! RSA key generation is slow, so the signing bundle is created once per test
//! binary and shared.

#![allow(dead_code)]

use cert_oxide::{CertificationRecord, Holder, IssuingCenter, MemoryStore, PipelineConfig};
use der::{Decode, Encode};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

pub const PASSPHRASE: &str = "password123";
pub const SIGNER_CN: &str = "Cert Oxide Test Signer";

pub const HOLDER_ID: &str = "user-1";
pub const CERTIFICATION_ID: &str = "cert-1";
pub const CENTER_ID: &str = "center-1";
pub const CERTIFICATION_TYPE: &str = "NIDCAP Professional";
pub const ISSUE_DATE: &str = "2024-01-15T10:30:00Z";
pub const ISSUER: &str = "Test Center";

/// A self-signed signing certificate and its PKCS#12 bundle on disk.
pub struct SigningFixture {
    _dir: TempDir,
    pub bundle_path: PathBuf,
    pub bundle: Vec<u8>,
    pub certificate_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

pub fn signing_fixture() -> &'static SigningFixture {
    static FIXTURE: OnceLock<SigningFixture> = OnceLock::new();
    FIXTURE.get_or_init(create_signing_fixture)
}

fn create_signing_fixture() -> SigningFixture {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key");
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());

    let public_key_der = private_key
        .to_public_key()
        .to_public_key_der()
        .expect("encode public key");
    let spki = SubjectPublicKeyInfoOwned::from_der(public_key_der.as_bytes()).expect("decode SPKI");
    let subject = Name::from_str(&format!("CN={},O=Cert Oxide Tests,C=US", SIGNER_CN)).expect("subject");
    let validity = Validity::from_now(Duration::from_secs(365 * 24 * 60 * 60)).expect("validity");
    let serial = SerialNumber::new(&[0x01, 0x42]).expect("serial");

    let builder = CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, &signing_key)
        .expect("certificate builder");
    let certificate = builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("self-signed certificate");
    let certificate_der = certificate.to_der().expect("encode certificate");

    let key_der = private_key.to_pkcs8_der().expect("encode key").as_bytes().to_vec();
    let bundle = p12::PFX::new(&certificate_der, &key_der, None, PASSPHRASE, "signing")
        .expect("build PKCS#12")
        .to_der();

    let dir = tempfile::tempdir().expect("tempdir");
    let bundle_path = dir.path().join("signing-cert.p12");
    std::fs::write(&bundle_path, &bundle).expect("write bundle");

    SigningFixture {
        _dir: dir,
        bundle_path,
        bundle,
        certificate_der,
        key_der,
    }
}

/// Pipeline configuration rooted in `work`, signing with the shared bundle.
pub fn signing_config(work: &Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_secret_key("integration-secret")
        .with_uploads_dir(work.join("uploads"))
        .with_credentials_path(&signing_fixture().bundle_path)
        .with_credentials_passphrase(PASSPHRASE)
}

/// Same as [`signing_config`] but pointing at a bundle that does not exist.
pub fn unsigned_config(work: &Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_secret_key("integration-secret")
        .with_uploads_dir(work.join("uploads"))
        .with_credentials_path(work.join("certs").join("signing-cert.p12"))
}

/// Store with the "Test User" holder and one certification from "Test Center".
pub fn seeded_store(stamp_url: Option<&str>) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_holder(Holder::new(HOLDER_ID, "Test", "User")).unwrap();
    store
        .insert_center(IssuingCenter {
            id: CENTER_ID.to_string(),
            name: ISSUER.to_string(),
            stamp_url: stamp_url.map(str::to_string),
        })
        .unwrap();
    store
        .insert_certification(
            CertificationRecord::new(CERTIFICATION_ID, HOLDER_ID, CERTIFICATION_TYPE, ISSUE_DATE)
                .with_issuing_center(CENTER_ID),
        )
        .unwrap();
    store
}

/// Write a small opaque PNG stamp.
pub fn write_png_stamp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 7) as u8, (y * 5) as u8, 120]));
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Strings shown with `Tj` on every page, decoded as Latin-1.
pub fn shown_text(pdf: &[u8]) -> Vec<String> {
    let doc = lopdf::Document::load_mem(pdf).expect("lopdf parses the document");
    let mut shown = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let content = doc.get_page_content(page_id).expect("page content");
        let content = lopdf::content::Content::decode(&content).expect("content stream");
        for op in content.operations {
            if op.operator == "Tj" {
                if let Some(lopdf::Object::String(bytes, _)) = op.operands.first() {
                    shown.push(bytes.iter().map(|&b| b as char).collect());
                }
            }
        }
    }
    shown
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
