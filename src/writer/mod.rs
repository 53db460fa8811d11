//! PDF writing module for generating the certificate document.
//!
//! ## Architecture
//!
//! ```text
//! CertificateRenderer (layout)
//!     ↓
//! [ContentStreamBuilder] (drawing operations → content stream bytes)
//!     ↓
//! [PdfWriter] (pages, fonts, images → complete PDF structure)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```
//!
//! ## Example
//!
//! ```
//! use cert_oxide::writer::{encode_win_ansi, PdfWriter};
//!
//! let mut writer = PdfWriter::new();
//! {
//!     let mut page = writer.add_page(612.0, 792.0);
//!     page.content().set_font("F1", 12.0).text(&encode_win_ansi("Hello"), 72.0, 720.0);
//!     page.finish();
//! }
//! let bytes = writer.finish()?;
//! assert!(bytes.starts_with(b"%PDF-"));
//! # Ok::<(), cert_oxide::Error>(())
//! ```

mod content_stream;
mod font_metrics;
mod image_handler;
mod object_serializer;
mod pdf_writer;

pub use content_stream::{Color, ContentStreamBuilder, ContentStreamOp};
pub use font_metrics::{encode_win_ansi, FontMetrics, StandardFont};
pub use image_handler::{ColorSpace, ImageData, ImageFormat};
pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{format_pdf_date, PageBuilder, PdfWriter, PdfWriterConfig};
