//! PDF signature verification.
//!
//! This module handles verification of existing digital signatures in PDF documents.

use super::byterange::ByteRangeCalculator;
use super::types::{DigestAlgorithm, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::parse_indirect_object_at;
use crate::xref::parse_xref;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use const_oid::db::rfc5911::{ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use const_oid::AssociatedOid;
use der::asn1::OctetString;
use der::{Decode, Encode, SliceReader};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::Verifier;
use x509_cert::Certificate;

/// Verifier for PDF digital signatures.
#[derive(Debug, Default)]
pub struct SignatureVerifier {
    /// Trusted root certificates (DER-encoded)
    trusted_roots: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted root certificate.
    pub fn add_trusted_root(&mut self, cert_der: Vec<u8>) {
        self.trusted_roots.push(cert_der);
    }

    /// Add multiple trusted root certificates.
    pub fn add_trusted_roots(&mut self, certs: Vec<Vec<u8>>) {
        self.trusted_roots.extend(certs);
    }

    /// Whether a DER certificate is one of the trusted roots.
    pub fn is_certificate_trusted(&self, cert_der: &[u8]) -> bool {
        self.trusted_roots.iter().any(|root| root == cert_der)
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = match sig_dict {
            Object::Dictionary(d) => d,
            _ => return Err(Error::InvalidPdf("Signature must be a dictionary".to_string())),
        };

        let text = |key: &str| {
            dict.get(key)
                .and_then(Object::as_string)
                .map(|s| String::from_utf8_lossy(s).into_owned())
        };

        let mut info = SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            ..SignatureInfo::default()
        };

        if let Some(Object::Array(byte_range)) = dict.get("ByteRange") {
            // placeholder names are skipped, leaving fewer than four entries
            info.byte_range = byte_range.iter().filter_map(Object::as_integer).collect();
        }
        info.covers_whole_document = info.byte_range.len() == 4;

        Ok(info)
    }

    /// Verify the last signature in a document.
    ///
    /// Fails only when the document has no readable signature dictionary.
    /// Everything wrong with the signature itself, including a placeholder
    /// that was never filled, is reported through the returned status.
    pub fn verify_document(&self, pdf_data: &[u8]) -> Result<VerificationResult> {
        let sig_dict = find_last_signature(pdf_data)?;
        let contents = match sig_dict.get("Contents") {
            Some(Object::String(bytes)) => bytes.clone(),
            _ => Vec::new(),
        };
        self.verify(pdf_data, &Object::Dictionary(sig_dict), &contents)
    }

    /// Verify a signature.
    ///
    /// `contents` is the decoded `/Contents` value, trailing zero padding included.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Object, contents: &[u8]) -> Result<VerificationResult> {
        let mut result = VerificationResult {
            signature_info: self.extract_signature_info(sig_dict)?,
            ..VerificationResult::default()
        };

        let byte_range: [i64; 4] = match result.signature_info.byte_range.as_slice().try_into() {
            Ok(range) => range,
            Err(_) => return Ok(result.invalid("ByteRange placeholder was never filled")),
        };

        if let Err(e) = ByteRangeCalculator::validate_byte_range(&byte_range, pdf_data.len()) {
            return Ok(result.invalid(format!("Invalid ByteRange: {}", e)));
        }
        let gap_start = byte_range[1] as usize;
        let gap_end = byte_range[2] as usize;
        let gap_last = gap_end.checked_sub(1).and_then(|i| pdf_data.get(i));
        if pdf_data.get(gap_start) != Some(&b'<') || gap_last != Some(&b'>') {
            return Ok(result.invalid("ByteRange gap is not the /Contents hex string"));
        }

        if contents.iter().all(|b| *b == 0) {
            return Ok(result.invalid("Signature placeholder is empty"));
        }

        let signed_data = match decode_signed_data(contents) {
            Ok(signed_data) => signed_data,
            Err(message) => return Ok(result.invalid(message)),
        };
        let Some(signer_info) = signed_data.signer_infos.0.iter().next() else {
            return Ok(result.invalid("SignedData has no signer info"));
        };
        let Some(algorithm) = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid) else {
            return Ok(result.invalid(format!("Unsupported digest algorithm {}", signer_info.digest_alg.oid)));
        };

        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range)?;
        let digest = algorithm.digest(&signed_bytes);
        match message_digest(signer_info) {
            Some(expected) if expected == digest => {},
            Some(_) => {
                result.document_modified = true;
                return Ok(result.invalid("Document was modified after signing"));
            },
            None => return Ok(result.invalid("Signer info has no message-digest attribute")),
        }

        let Some(certificate) = signer_certificate(&signed_data, signer_info) else {
            return Ok(result.invalid("SignedData does not embed the signing certificate"));
        };
        let cert_der = certificate
            .to_der()
            .map_err(|e| Error::InvalidPdf(format!("cannot re-encode certificate: {}", e)))?;

        result.signature_valid = match verify_signer_info(&certificate, signer_info, algorithm) {
            Ok(valid) => valid,
            Err(message) => return Ok(result.invalid(message)),
        };
        if !result.signature_valid {
            return Ok(result.invalid("Signature does not match the certificate's public key"));
        }

        self.describe_certificate(&cert_der, &mut result);
        result.certificate_trusted = self.is_certificate_trusted(&cert_der);

        result.status = match (result.certificate_trusted, result.certificate_expired) {
            (true, false) => VerificationStatus::Valid,
            (true, true) => {
                result.messages.push("Signing certificate has expired".to_string());
                VerificationStatus::ValidWithWarnings
            },
            (false, _) => {
                result.messages.push("Signing certificate is not trusted".to_string());
                VerificationStatus::Unknown
            },
        };
        log::debug!("Signature verification finished: {:?}", result.status);
        Ok(result)
    }

    fn describe_certificate(&self, cert_der: &[u8], result: &mut VerificationResult) {
        let Ok((_, cert)) = x509_parser::parse_x509_certificate(cert_der) else {
            result.messages.push("Cannot inspect signing certificate".to_string());
            return;
        };

        let info = &mut result.signature_info;
        info.certificate_cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        info.certificate_issuer = Some(cert.issuer().to_string());
        info.valid_from = Some(cert.validity().not_before.to_string());
        info.valid_to = Some(cert.validity().not_after.to_string());

        result.certificate_expired = cert.validity().not_after.timestamp() < chrono::Utc::now().timestamp();
    }
}

/// Newest `/Type /Sig` dictionary, by file offset.
fn find_last_signature(pdf_data: &[u8]) -> Result<Dictionary> {
    let table = parse_xref(pdf_data)?;
    let mut objects: Vec<(u32, usize)> = table.in_use_objects().collect();
    objects.sort_by_key(|(_, offset)| std::cmp::Reverse(*offset));

    objects
        .into_iter()
        .filter_map(|(_, offset)| parse_indirect_object_at(pdf_data, offset).ok())
        .map(|(_, object)| object)
        .find(|object| object.has_type("Sig"))
        .and_then(|object| object.into_dict().ok())
        .ok_or_else(|| Error::InvalidPdf("document has no signature dictionary".to_string()))
}

fn decode_signed_data(contents: &[u8]) -> std::result::Result<SignedData, String> {
    // the zero padding after the DER value is left unread
    let mut reader = SliceReader::new(contents).map_err(|e| format!("Malformed signature: {}", e))?;
    let content_info = ContentInfo::decode(&mut reader).map_err(|e| format!("Malformed signature: {}", e))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(format!("Signature is {} rather than SignedData", content_info.content_type));
    }

    let der = content_info
        .content
        .to_der()
        .map_err(|e| format!("Malformed SignedData: {}", e))?;
    SignedData::from_der(&der).map_err(|e| format!("Malformed SignedData: {}", e))
}

fn message_digest(signer_info: &SignerInfo) -> Option<Vec<u8>> {
    let attrs = signer_info.signed_attrs.as_ref()?;
    let attr = attrs.iter().find(|attr| attr.oid == ID_MESSAGE_DIGEST)?;
    let value = attr.values.iter().next()?;
    let der = value.to_der().ok()?;
    OctetString::from_der(&der).ok().map(|s| s.as_bytes().to_vec())
}

/// Embedded certificate matching the signer identifier, else the first one.
fn signer_certificate(signed_data: &SignedData, signer_info: &SignerInfo) -> Option<Certificate> {
    let certificates: Vec<&Certificate> = signed_data
        .certificates
        .as_ref()?
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect();

    let matching = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => certificates.iter().find(|cert| {
            cert.tbs_certificate.issuer == isn.issuer && cert.tbs_certificate.serial_number == isn.serial_number
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    matching.or_else(|| certificates.first()).map(|cert| (*cert).clone())
}

fn verify_signer_info(
    certificate: &Certificate,
    signer_info: &SignerInfo,
    algorithm: DigestAlgorithm,
) -> std::result::Result<bool, String> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("Cannot encode public key: {}", e))?;
    let public_key =
        RsaPublicKey::from_public_key_der(&spki).map_err(|e| format!("Unsupported public key (RSA expected): {}", e))?;

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| "Signer info has no signed attributes".to_string())?
        .to_der()
        .map_err(|e| format!("Cannot encode signed attributes: {}", e))?;
    let signature = Signature::try_from(signer_info.signature.as_bytes())
        .map_err(|e| format!("Malformed RSA signature: {}", e))?;

    Ok(match algorithm {
        DigestAlgorithm::Sha256 => rsa_verify::<Sha256>(public_key, &signed_attrs, &signature),
        DigestAlgorithm::Sha384 => rsa_verify::<Sha384>(public_key, &signed_attrs, &signature),
        DigestAlgorithm::Sha512 => rsa_verify::<Sha512>(public_key, &signed_attrs, &signature),
    })
}

fn rsa_verify<D>(public_key: RsaPublicKey, message: &[u8], signature: &Signature) -> bool
where
    D: Digest + AssociatedOid,
{
    VerifyingKey::<D>::new(public_key).verify(message, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignatureMetadata;
    use crate::signatures::PlaceholderInjector;
    use crate::writer::{PdfWriter, PdfWriterConfig};

    fn sig_dict(byte_range: Vec<Object>) -> Object {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("Sig".to_string()));
        dict.insert("Name".to_string(), Object::String(b"Bignap Training Center".to_vec()));
        dict.insert("Reason".to_string(), Object::String(b"Authorized Certificate".to_vec()));
        dict.insert("SubFilter".to_string(), Object::Name("adbe.pkcs7.detached".to_string()));
        dict.insert("ByteRange".to_string(), Object::Array(byte_range));
        Object::Dictionary(dict)
    }

    #[test]
    fn test_extract_signature_info() {
        let verifier = SignatureVerifier::new();
        let ints = [0, 100, 200, 50].iter().map(|i| Object::Integer(*i)).collect();
        let info = verifier.extract_signature_info(&sig_dict(ints)).unwrap();

        assert_eq!(info.signer_name.as_deref(), Some("Bignap Training Center"));
        assert_eq!(info.reason.as_deref(), Some("Authorized Certificate"));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert_eq!(info.byte_range, vec![0, 100, 200, 50]);
        assert!(info.covers_whole_document);
    }

    #[test]
    fn test_extract_signature_info_rejects_non_dict() {
        let verifier = SignatureVerifier::new();
        assert!(verifier.extract_signature_info(&Object::Integer(1)).is_err());
    }

    #[test]
    fn test_unfilled_placeholder_is_invalid() {
        let placeholder = Object::Name("**********".to_string());
        let dict = sig_dict(vec![Object::Integer(0), placeholder.clone(), placeholder.clone(), placeholder]);
        let result = SignatureVerifier::new().verify(b"whatever", &dict, &[0; 16]).unwrap();

        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.signature_valid);
        assert!(!result.signature_info.covers_whole_document);
    }

    #[test]
    fn test_zero_contents_are_invalid() {
        let pdf = b"0123456789<0000>0123456789";
        let ints = [0, 10, 16, 10].iter().map(|i| Object::Integer(*i)).collect();
        let result = SignatureVerifier::new().verify(pdf, &sig_dict(ints), &[0, 0]).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.messages[0].contains("empty"));
    }

    #[test]
    fn test_gap_must_be_contents() {
        let pdf = b"0123456789abcdef0123456789";
        let ints = [0, 10, 16, 10].iter().map(|i| Object::Integer(*i)).collect();
        let result = SignatureVerifier::new().verify(pdf, &sig_dict(ints), &[1]).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_garbage_signature_is_invalid() {
        let pdf = b"0123456789<0000>0123456789";
        let ints = [0, 10, 16, 10].iter().map(|i| Object::Integer(*i)).collect();
        let result = SignatureVerifier::new().verify(pdf, &sig_dict(ints), &[0x04, 0x01, 0xAA]).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.messages[0].contains("SignedData") || result.messages[0].contains("Malformed"));
    }

    #[test]
    fn test_verify_document_reports_placeholder() {
        let mut writer = PdfWriter::with_config(PdfWriterConfig::default());
        writer.add_page(200.0, 100.0).finish();
        let pdf = writer.finish().unwrap();
        let prepared = PlaceholderInjector::new(SignatureMetadata::default(), 32).inject(&pdf).unwrap();

        let result = SignatureVerifier::new().verify_document(&prepared).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert_eq!(result.signature_info.location.as_deref(), Some("Boston, MA"));
    }

    #[test]
    fn test_verify_document_without_signature() {
        let mut writer = PdfWriter::new();
        writer.add_page(200.0, 100.0).finish();
        let pdf = writer.finish().unwrap();
        assert!(matches!(SignatureVerifier::new().verify_document(&pdf), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_trusted_roots() {
        let mut verifier = SignatureVerifier::new();
        verifier.add_trusted_roots(vec![vec![1, 2], vec![3]]);
        verifier.add_trusted_root(vec![4]);
        assert!(verifier.is_certificate_trusted(&[3]));
        assert!(!verifier.is_certificate_trusted(&[5]));
    }
}
