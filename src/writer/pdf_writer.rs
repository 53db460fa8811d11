//! PDF document writer.
//!
//! Assembles complete PDF documents with proper structure:
//! header, body, xref table, and trailer.

use super::content_stream::ContentStreamBuilder;
use super::font_metrics::StandardFont;
use super::image_handler::ImageData;
use super::object_serializer::ObjectSerializer;
use crate::error::Result;
use crate::object::{Dictionary, Object};
use chrono::{DateTime, Utc};
use std::io::Write;

/// Configuration for PDF generation.
#[derive(Debug, Clone)]
pub struct PdfWriterConfig {
    /// PDF version (e.g., "1.7")
    pub version: String,
    /// Document title
    pub title: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// Producing library
    pub producer: Option<String>,
    /// Creation timestamp; `None` means "now" at finish time
    pub creation_date: Option<DateTime<Utc>>,
    /// Whether to compress content streams
    pub compress: bool,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            title: None,
            creator: Some("cert_oxide".to_string()),
            producer: Some(format!("cert_oxide {}", env!("CARGO_PKG_VERSION"))),
            creation_date: None,
            compress: true,
        }
    }
}

impl PdfWriterConfig {
    /// Set document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the creator application.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Pin the creation date (byte-stable output in tests).
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Enable or disable stream compression.
    ///
    /// When enabled, content streams are compressed using FlateDecode.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmssZ`).
pub fn format_pdf_date(date: &DateTime<Utc>) -> String {
    date.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Widen a page dimension through its shortest decimal form, so `841.89_f32`
/// is written as `841.89` rather than `841.89001`.
fn page_dimension(value: f32) -> f64 {
    value.to_string().parse().unwrap_or_else(|_| f64::from(value))
}

/// Compress data using Flate/Deflate compression.
pub(crate) fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// A page being built.
pub struct PageBuilder<'a> {
    writer: &'a mut PdfWriter,
    page_index: usize,
}

impl<'a> PageBuilder<'a> {
    /// Page width in points.
    pub fn width(&self) -> f32 {
        self.writer.pages[self.page_index].width
    }

    /// Page height in points.
    pub fn height(&self) -> f32 {
        self.writer.pages[self.page_index].height
    }

    /// Content stream of this page.
    pub fn content(&mut self) -> &mut ContentStreamBuilder {
        &mut self.writer.pages[self.page_index].content_builder
    }

    /// Register an image XObject on this page and return its resource name.
    pub fn add_image(&mut self, image: ImageData) -> String {
        let page = &mut self.writer.pages[self.page_index];
        let name = format!("Im{}", page.images.len() + 1);
        page.images.push((name.clone(), image));
        name
    }

    /// Finish building this page and return to the writer.
    pub fn finish(self) -> &'a mut PdfWriter {
        let page = &mut self.writer.pages[self.page_index];
        page.content_builder.end_text();
        self.writer
    }
}

/// Internal page data.
struct PageData {
    width: f32,
    height: f32,
    content_builder: ContentStreamBuilder,
    images: Vec<(String, ImageData)>,
}

/// PDF document writer.
///
/// Builds a complete PDF document with pages, the Helvetica fonts and
/// image XObjects. Output is a single classic xref section, which is what
/// the signature placeholder injector expects to append to.
pub struct PdfWriter {
    config: PdfWriterConfig,
    pages: Vec<PageData>,
    /// Object ID counter
    next_obj_id: u32,
}

impl PdfWriter {
    /// Create a new PDF writer with default config.
    pub fn new() -> Self {
        Self::with_config(PdfWriterConfig::default())
    }

    /// Create a PDF writer with custom config.
    pub fn with_config(config: PdfWriterConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
            next_obj_id: 1,
        }
    }

    /// Allocate a new object ID.
    fn alloc_obj_id(&mut self) -> u32 {
        let id = self.next_obj_id;
        self.next_obj_id += 1;
        id
    }

    /// Add a page with the given dimensions.
    pub fn add_page(&mut self, width: f32, height: f32) -> PageBuilder<'_> {
        let page_index = self.pages.len();
        self.pages.push(PageData {
            width,
            height,
            content_builder: ContentStreamBuilder::new(),
            images: Vec::new(),
        });
        PageBuilder {
            writer: self,
            page_index,
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Build the complete PDF document.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let serializer = ObjectSerializer::compact();
        let mut objects: Vec<(u32, Object)> = Vec::new();

        let catalog_id = self.alloc_obj_id();
        let pages_id = self.alloc_obj_id();

        let mut font_resources = Dictionary::new();
        for font in StandardFont::ALL {
            let font_id = self.alloc_obj_id();
            objects.push((
                font_id,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Font")),
                    ("Subtype", ObjectSerializer::name("Type1")),
                    ("BaseFont", ObjectSerializer::name(font.base_font())),
                    ("Encoding", ObjectSerializer::name("WinAnsiEncoding")),
                ]),
            ));
            font_resources.insert(font.resource_name().to_string(), ObjectSerializer::reference(font_id, 0));
        }

        let pages = std::mem::take(&mut self.pages);
        let mut page_refs: Vec<Object> = Vec::with_capacity(pages.len());

        for page_data in &pages {
            let page_id = self.alloc_obj_id();
            let content_id = self.alloc_obj_id();

            let raw_content = page_data.content_builder.build()?;
            let mut content_dict = Dictionary::new();
            let content_bytes = if self.config.compress {
                content_dict.insert("Filter".to_string(), ObjectSerializer::name("FlateDecode"));
                compress_data(&raw_content)?
            } else {
                raw_content
            };
            objects.push((
                content_id,
                Object::Stream {
                    dict: content_dict,
                    data: bytes::Bytes::from(content_bytes),
                },
            ));

            let mut xobjects = Dictionary::new();
            for (name, image) in &page_data.images {
                let image_id = self.alloc_obj_id();
                let smask = match image.soft_mask_object() {
                    Some(mask) => {
                        let mask_id = self.alloc_obj_id();
                        objects.push((mask_id, mask));
                        Some(ObjectSerializer::reference(mask_id, 0))
                    },
                    None => None,
                };
                objects.push((
                    image_id,
                    Object::Stream {
                        dict: image.build_xobject_dict(smask),
                        data: bytes::Bytes::from(image.data.clone()),
                    },
                ));
                xobjects.insert(name.clone(), ObjectSerializer::reference(image_id, 0));
            }

            let mut resources = vec![
                ("Font", Object::Dictionary(font_resources.clone())),
                (
                    "ProcSet",
                    Object::Array(
                        ["PDF", "Text", "ImageB", "ImageC", "ImageI"]
                            .iter()
                            .map(|n| ObjectSerializer::name(n))
                            .collect(),
                    ),
                ),
            ];
            if !xobjects.is_empty() {
                resources.push(("XObject", Object::Dictionary(xobjects)));
            }

            objects.push((
                page_id,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Page")),
                    ("Parent", ObjectSerializer::reference(pages_id, 0)),
                    (
                        "MediaBox",
                        ObjectSerializer::rect(
                            0.0,
                            0.0,
                            page_dimension(page_data.width),
                            page_dimension(page_data.height),
                        ),
                    ),
                    ("Contents", ObjectSerializer::reference(content_id, 0)),
                    ("Resources", ObjectSerializer::dict(resources)),
                ]),
            ));
            page_refs.push(ObjectSerializer::reference(page_id, 0));
        }

        objects.push((
            pages_id,
            ObjectSerializer::dict(vec![
                ("Type", ObjectSerializer::name("Pages")),
                ("Count", ObjectSerializer::integer(page_refs.len() as i64)),
                ("Kids", Object::Array(page_refs)),
            ]),
        ));
        objects.push((
            catalog_id,
            ObjectSerializer::dict(vec![
                ("Type", ObjectSerializer::name("Catalog")),
                ("Pages", ObjectSerializer::reference(pages_id, 0)),
            ]),
        ));

        let info_id = self.alloc_obj_id();
        let created = self.config.creation_date.unwrap_or_else(Utc::now);
        let mut info_entries = vec![("CreationDate", ObjectSerializer::string(&format_pdf_date(&created)))];
        if let Some(title) = &self.config.title {
            info_entries.push(("Title", ObjectSerializer::string(title)));
        }
        if let Some(creator) = &self.config.creator {
            info_entries.push(("Creator", ObjectSerializer::string(creator)));
        }
        if let Some(producer) = &self.config.producer {
            info_entries.push(("Producer", ObjectSerializer::string(producer)));
        }
        objects.push((info_id, ObjectSerializer::dict(info_entries)));

        objects.sort_by_key(|(id, _)| *id);

        let mut output = Vec::new();
        // PDF Header
        writeln!(output, "%PDF-{}", self.config.version)?;
        // Binary marker (recommended for binary content)
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut xref_offsets: Vec<usize> = Vec::with_capacity(objects.len());
        for (id, obj) in &objects {
            xref_offsets.push(output.len());
            output.extend_from_slice(&serializer.serialize_indirect(*id, 0, obj)?);
        }

        let xref_start = output.len();
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", self.next_obj_id)?;
        // Object 0 is always free
        writeln!(output, "0000000000 65535 f ")?;
        for offset in &xref_offsets {
            writeln!(output, "{:010} 00000 n ", offset)?;
        }

        let trailer = ObjectSerializer::dict(vec![
            ("Size", ObjectSerializer::integer(i64::from(self.next_obj_id))),
            ("Root", ObjectSerializer::reference(catalog_id, 0)),
            ("Info", ObjectSerializer::reference(info_id, 0)),
        ]);

        writeln!(output, "trailer")?;
        output.extend_from_slice(&serializer.serialize(&trailer)?);
        writeln!(output)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;

        log::debug!("Wrote PDF: {} objects, {} bytes", objects.len(), output.len());
        Ok(output)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::parse_xref;
    use chrono::TimeZone;

    fn uncompressed() -> PdfWriterConfig {
        PdfWriterConfig::default().with_compress(false)
    }

    #[test]
    fn test_create_single_page_pdf() {
        let mut writer = PdfWriter::with_config(uncompressed());
        writer.add_page(841.89, 595.28).finish();
        let bytes = writer.finish().unwrap();

        let content = String::from_utf8_lossy(&bytes);
        assert!(content.starts_with("%PDF-1.7"));
        assert!(content.contains("/Type /Catalog"));
        assert!(content.contains("/Count 1"));
        assert!(content.contains("/MediaBox [0 0 841.89 595.28]"));
        assert!(content.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_page_count() {
        let mut writer = PdfWriter::with_config(uncompressed());
        assert_eq!(writer.page_count(), 0);
        writer.add_page(841.89, 595.28).finish();
        writer.add_page(595.28, 841.89).finish();
        assert_eq!(writer.page_count(), 2);

        let content = String::from_utf8_lossy(&writer.finish().unwrap()).into_owned();
        assert!(content.contains("/Count 2"));
    }

    #[test]
    fn test_fonts_registered() {
        let mut writer = PdfWriter::with_config(uncompressed());
        writer.add_page(612.0, 792.0).finish();
        let content = String::from_utf8_lossy(&writer.finish().unwrap()).into_owned();

        assert!(content.contains("/BaseFont /Helvetica "));
        assert!(content.contains("/BaseFont /Helvetica-Bold"));
        assert!(content.contains("/Encoding /WinAnsiEncoding"));
        assert!(content.contains("/F1 3 0 R"));
        assert!(content.contains("/F2 4 0 R"));
    }

    #[test]
    fn test_pdf_with_text() {
        let mut writer = PdfWriter::with_config(uncompressed());
        {
            let mut page = writer.add_page(612.0, 792.0);
            page.content().set_font("F1", 12.0).text(b"Hello, World!", 72.0, 720.0);
            page.finish();
        }

        let content = String::from_utf8_lossy(&writer.finish().unwrap()).into_owned();
        assert!(content.contains("/F1 12 Tf"));
        assert!(content.contains("(Hello, World!) Tj"));
        assert!(content.contains("ET"));
    }

    #[test]
    fn test_pdf_metadata() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let config = uncompressed().with_title("Certificate").with_creation_date(date);
        let mut writer = PdfWriter::with_config(config);
        writer.add_page(612.0, 792.0).finish();

        let content = String::from_utf8_lossy(&writer.finish().unwrap()).into_owned();
        assert!(content.contains("/Title (Certificate)"));
        assert!(content.contains("/CreationDate (D:20240305143000Z)"));
        assert!(content.contains("/Producer (cert_oxide"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut writer = PdfWriter::new();
        writer.add_page(841.89, 595.28).finish();
        let bytes = writer.finish().unwrap();

        let table = parse_xref(&bytes).unwrap();
        // catalog, pages, two fonts, page, content, info
        assert_eq!(table.size(), 8);
        for id in 1..8 {
            let offset = table.offset_of(id).unwrap();
            let expected = format!("{} 0 obj", id);
            assert!(bytes[offset..].starts_with(expected.as_bytes()), "object {}", id);
        }
    }

    #[test]
    fn test_page_dimensions_keep_their_decimals() {
        assert_eq!(page_dimension(841.89), 841.89);
        assert_eq!(page_dimension(595.28), 595.28);
        assert_eq!(page_dimension(612.0), 612.0);

        let mut writer = PdfWriter::with_config(uncompressed());
        writer.add_page(595.28, 841.89).finish();
        let content = String::from_utf8_lossy(&writer.finish().unwrap()).into_owned();
        assert!(content.contains("/MediaBox [0 0 595.28 841.89]"));
    }

    #[test]
    fn test_compressed_content_stream_round_trips() {
        use crate::parser::parse_indirect_object_at;
        use std::io::Read;

        let mut writer = PdfWriter::new();
        {
            let mut page = writer.add_page(841.89, 595.28);
            for (i, line) in ["CERTIFICATE", "OF COMPLETION", "This is to certify that", "Test User"]
                .iter()
                .cycle()
                .take(40)
                .enumerate()
            {
                page.content()
                    .set_font("F2", 14.0)
                    .text(line.as_bytes(), 100.0, 560.0 - i as f32 * 12.0);
            }
            page.finish();
        }
        let bytes = writer.finish().unwrap();

        // catalog, pages, two fonts, then the page and its content stream
        let table = parse_xref(&bytes).unwrap();
        let (_, content) = parse_indirect_object_at(&bytes, table.offset_of(6).unwrap()).unwrap();
        let (dict, data) = match content {
            Object::Stream { dict, data } => (dict, data),
            other => panic!("expected content stream, got {:?}", other),
        };
        assert_eq!(dict.get("Filter").and_then(Object::as_name), Some("FlateDecode"));

        let mut decoded = String::new();
        flate2::read::ZlibDecoder::new(&data[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert!(decoded.contains("(CERTIFICATE) Tj"));
        assert!(decoded.contains("(Test User) Tj"));
        assert!(data.len() < decoded.len());
    }

    #[test]
    fn test_format_pdf_date() {
        let date = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 1).unwrap();
        assert_eq!(format_pdf_date(&date), "D:20231231235901Z");
    }
}
