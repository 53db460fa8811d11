//! Signature placeholder injection.
//!
//! Appends an incremental update to a finished document that adds an
//! invisible signature field. The signature dictionary reserves a zero-filled
//! `/Contents` hex string and a `/ByteRange` of placeholder names, both of
//! which the signer later overwrites in place.
//!
//! The update contains, in order: the signature dictionary, the widget
//! annotation, the AcroForm, the rewritten catalog and the rewritten first
//! page, followed by a new xref section and a trailer chaining to the
//! previous one through `/Prev`.

use super::byterange::BYTE_RANGE_PLACEHOLDER;
use super::types::SignatureSubFilter;
use crate::config::SignatureMetadata;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::parse_indirect_object_at;
use crate::writer::{format_pdf_date, ObjectSerializer};
use crate::xref::{parse_xref, CrossRefTable};
use chrono::{DateTime, Utc};
use std::io::Write;

/// Page-tree depth at which the search for the first page gives up.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Field name of the injected signature.
pub const SIGNATURE_FIELD_NAME: &str = "Signature1";

/// Adds a signature placeholder to unsigned documents.
#[derive(Debug, Clone)]
pub struct PlaceholderInjector {
    metadata: SignatureMetadata,
    signature_size: usize,
    signing_time: Option<DateTime<Utc>>,
}

impl PlaceholderInjector {
    /// Create an injector reserving `signature_size` bytes for the DER signature.
    pub fn new(metadata: SignatureMetadata, signature_size: usize) -> Self {
        Self {
            metadata,
            signature_size,
            signing_time: None,
        }
    }

    /// Pin the `/M` signing time.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Bytes reserved for the DER signature.
    pub fn signature_size(&self) -> usize {
        self.signature_size
    }

    /// Return `pdf` with the placeholder update appended.
    ///
    /// Fails when the document has no readable classic xref table, no
    /// `/Root`, or a catalog/page tree that cannot be resolved.
    pub fn inject(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        if self.signature_size == 0 {
            return Err(Error::Configuration("signature size must be positive".to_string()));
        }

        let table = parse_xref(pdf)?;
        let root_ref = table
            .trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))?;

        let mut catalog = load_object(pdf, &table, root_ref)?.into_dict()?;
        let pages_ref = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;
        let (page_ref, mut page) = find_first_page(pdf, &table, pages_ref, 0)?;

        let size = table.size();
        let sig_ref = ObjectRef::new(size, 0);
        let widget_ref = ObjectRef::new(size + 1, 0);
        let acroform_ref = ObjectRef::new(size + 2, 0);

        let mut acroform = existing_acroform(pdf, &table, &catalog)?;
        let mut fields = match acroform.remove("Fields") {
            Some(Object::Array(fields)) => fields,
            _ => Vec::new(),
        };
        fields.push(Object::Reference(widget_ref));
        acroform.insert("Fields".to_string(), Object::Array(fields));
        acroform.insert("SigFlags".to_string(), Object::Integer(3));
        catalog.insert("AcroForm".to_string(), Object::Reference(acroform_ref));

        let mut annots = match page.remove("Annots") {
            Some(Object::Array(annots)) => annots,
            Some(Object::Reference(r)) => match load_object(pdf, &table, r)? {
                Object::Array(annots) => annots,
                other => {
                    return Err(Error::InvalidObjectType {
                        expected: "Array".to_string(),
                        found: other.type_name().to_string(),
                    })
                },
            },
            _ => Vec::new(),
        };
        annots.push(Object::Reference(widget_ref));
        page.insert("Annots".to_string(), Object::Array(annots));

        let objects = vec![
            (sig_ref, self.signature_dictionary()),
            (widget_ref, widget_annotation(sig_ref, page_ref)),
            (acroform_ref, Object::Dictionary(acroform)),
            (root_ref, Object::Dictionary(catalog)),
            (page_ref, Object::Dictionary(page)),
        ];

        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(i64::from(size + 3)));
        trailer.insert("Root".to_string(), Object::Reference(root_ref));
        trailer.insert("Prev".to_string(), Object::Integer(table.startxref() as i64));
        for key in ["Info", "ID"] {
            if let Some(value) = table.trailer().get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }

        let output = append_update(pdf, &objects, &trailer)?;
        log::debug!(
            "Injected signature placeholder: sig {} widget {} page {}, {} -> {} bytes",
            sig_ref,
            widget_ref,
            page_ref,
            pdf.len(),
            output.len()
        );
        Ok(output)
    }

    fn signature_dictionary(&self) -> Object {
        let placeholder = || ObjectSerializer::name(BYTE_RANGE_PLACEHOLDER);
        let signed_at = self.signing_time.unwrap_or_else(Utc::now);
        let meta = &self.metadata;

        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Sig")),
            ("Filter", ObjectSerializer::name("Adobe.PPKLite")),
            ("SubFilter", ObjectSerializer::name(SignatureSubFilter::Pkcs7Detached.as_pdf_name())),
            (
                "ByteRange",
                Object::Array(vec![Object::Integer(0), placeholder(), placeholder(), placeholder()]),
            ),
            ("Contents", Object::String(vec![0; self.signature_size])),
            ("Reason", ObjectSerializer::string(&meta.reason)),
            ("ContactInfo", ObjectSerializer::string(&meta.contact_info)),
            ("Name", ObjectSerializer::string(&meta.name)),
            ("Location", ObjectSerializer::string(&meta.location)),
            ("M", ObjectSerializer::string(&format_pdf_date(&signed_at))),
            (
                "Prop_Build",
                ObjectSerializer::dict(vec![(
                    "Filter",
                    ObjectSerializer::dict(vec![("Name", ObjectSerializer::name("Adobe.PPKLite"))]),
                )]),
            ),
        ])
    }
}

fn widget_annotation(sig_ref: ObjectRef, page_ref: ObjectRef) -> Object {
    ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Annot")),
        ("Subtype", ObjectSerializer::name("Widget")),
        ("FT", ObjectSerializer::name("Sig")),
        ("T", ObjectSerializer::string(SIGNATURE_FIELD_NAME)),
        ("V", Object::Reference(sig_ref)),
        ("Rect", Object::Array(vec![Object::Integer(0); 4])),
        ("F", ObjectSerializer::integer(4)),
        ("P", Object::Reference(page_ref)),
    ])
}

/// Read an indirect object through the xref table.
fn load_object(pdf: &[u8], table: &CrossRefTable, reference: ObjectRef) -> Result<Object> {
    let offset = table.offset_of(reference.id)?;
    let (found, object) = parse_indirect_object_at(pdf, offset)?;
    if found.id != reference.id {
        return Err(Error::ParseError {
            offset,
            reason: format!("xref points at {} instead of {}", found, reference),
        });
    }
    Ok(object)
}

fn find_first_page(
    pdf: &[u8],
    table: &CrossRefTable,
    node_ref: ObjectRef,
    depth: usize,
) -> Result<(ObjectRef, Dictionary)> {
    if depth > MAX_PAGE_TREE_DEPTH {
        return Err(Error::InvalidPdf("page tree too deep".to_string()));
    }

    let node = load_object(pdf, table, node_ref)?;
    if node.has_type("Page") {
        return Ok((node_ref, node.into_dict()?));
    }
    let first_kid = node
        .as_dict()
        .and_then(|d| d.get("Kids"))
        .and_then(Object::as_array)
        .and_then(|kids| kids.first())
        .and_then(Object::as_reference)
        .ok_or_else(|| Error::InvalidPdf(format!("page tree node {} has no kids", node_ref)))?;
    find_first_page(pdf, table, first_kid, depth + 1)
}

/// Entries of the catalog's current AcroForm, if any.
fn existing_acroform(pdf: &[u8], table: &CrossRefTable, catalog: &Dictionary) -> Result<Dictionary> {
    match catalog.get("AcroForm") {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        Some(Object::Reference(r)) => load_object(pdf, table, *r)?.into_dict(),
        _ => Ok(Dictionary::new()),
    }
}

/// Copy `pdf` and append objects, an xref section and a trailer.
fn append_update(pdf: &[u8], objects: &[(ObjectRef, Object)], trailer: &Dictionary) -> Result<Vec<u8>> {
    let serializer = ObjectSerializer::compact();
    let mut output = Vec::with_capacity(pdf.len() + 20_000);
    output.extend_from_slice(pdf);
    if !matches!(output.last(), Some(b'\n') | Some(b'\r')) {
        output.push(b'\n');
    }

    let mut offsets: Vec<(ObjectRef, usize)> = Vec::with_capacity(objects.len());
    for (reference, object) in objects {
        offsets.push((*reference, output.len()));
        output.extend_from_slice(&serializer.serialize_indirect(reference.id, reference.gen, object)?);
    }
    offsets.sort_by_key(|(reference, _)| reference.id);

    let xref_start = output.len();
    writeln!(output, "xref")?;
    for run in contiguous_runs(&offsets) {
        writeln!(output, "{} {}", run[0].0.id, run.len())?;
        for (reference, offset) in run {
            writeln!(output, "{:010} {:05} n ", offset, reference.gen)?;
        }
    }

    writeln!(output, "trailer")?;
    output.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer.clone()))?);
    writeln!(output)?;
    writeln!(output, "startxref")?;
    writeln!(output, "{}", xref_start)?;
    writeln!(output, "%%EOF")?;
    Ok(output)
}

/// Split sorted entries into runs of consecutive object numbers.
fn contiguous_runs(entries: &[(ObjectRef, usize)]) -> Vec<&[(ObjectRef, usize)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0.id != entries[i - 1].0.id + 1 {
            runs.push(&entries[start..i]);
            start = i;
        }
    }
    runs
}
