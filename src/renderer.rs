//! Visual certificate renderer.
//!
//! Lays out the certificate face on a single A4 landscape page: a double
//! border with corner brackets, a centered title block, the holder name and
//! certification type, a two-column footer and an optional stamp image.
//!
//! Layout runs on a top-down text cursor like a flowing document: each
//! centered line starts at the cursor, and the cursor then advances by the
//! line height of the font that was used. Coordinates are converted to PDF
//! user space (origin bottom-left) only when operations are emitted.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::records::{CertificationView, Holder};
use crate::writer::{
    encode_win_ansi, Color, ContentStreamBuilder, ImageData, PdfWriter, PdfWriterConfig, StandardFont,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::path::{Component, Path, PathBuf};

/// A4 landscape width in points.
pub const PAGE_WIDTH: f32 = 841.89;
/// A4 landscape height in points.
pub const PAGE_HEIGHT: f32 = 595.28;
/// Page margin in points.
pub const MARGIN: f32 = 50.0;

/// Issuer name printed when the issuing center is unknown.
pub const DEFAULT_ISSUER_NAME: &str = "Authorized Center";

const STAMP_WIDTH: f32 = 100.0;

/// Everything printed on a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFace {
    /// Holder display name
    pub holder_name: String,
    /// Certification type label
    pub certification_type: String,
    /// Issue date as stored
    pub issue_date: String,
    /// Issuing center name
    pub issuer_name: Option<String>,
    /// Stamp image reference
    pub stamp: Option<String>,
}

impl CertificateFace {
    /// Create a face without issuer or stamp.
    pub fn new(
        holder_name: impl Into<String>,
        certification_type: impl Into<String>,
        issue_date: impl Into<String>,
    ) -> Self {
        Self {
            holder_name: holder_name.into(),
            certification_type: certification_type.into(),
            issue_date: issue_date.into(),
            issuer_name: None,
            stamp: None,
        }
    }

    /// Build the face for a joined certification and its holder.
    pub fn from_view(view: &CertificationView, holder: &Holder) -> Self {
        Self {
            holder_name: holder.display_name(),
            certification_type: view.record.certification_type.clone(),
            issue_date: view.record.issue_date.clone(),
            issuer_name: view.issuer_name.clone(),
            stamp: view.issuer_stamp.clone(),
        }
    }

    /// Set the issuing center name.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer_name = Some(issuer.into());
        self
    }

    /// Set the stamp image reference.
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = Some(stamp.into());
        self
    }
}

/// Renders certificate faces to unsigned PDF documents.
#[derive(Debug, Clone)]
pub struct CertificateRenderer {
    uploads_dir: PathBuf,
    writer_config: PdfWriterConfig,
}

impl CertificateRenderer {
    /// Create a renderer using the uploads directory and compression setting of `config`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            uploads_dir: config.uploads_dir.clone(),
            writer_config: PdfWriterConfig::default()
                .with_title("Certificate of Completion")
                .with_compress(config.compress),
        }
    }

    /// Replace the document writer configuration.
    pub fn with_writer_config(mut self, writer_config: PdfWriterConfig) -> Self {
        self.writer_config = writer_config;
        self
    }

    /// Render the certificate to a complete single-page PDF.
    ///
    /// A stamp reference that does not resolve to an existing file is
    /// skipped. A stamp file that exists but cannot be decoded is an error.
    pub fn render(&self, face: &CertificateFace) -> Result<Vec<u8>> {
        let stamp = match face.stamp.as_deref() {
            Some(reference) => match resolve_stamp_path(&self.uploads_dir, reference) {
                Some(path) => Some(ImageData::from_file(&path)?),
                None => {
                    log::debug!("Stamp '{}' not found under {}, omitting", reference, self.uploads_dir.display());
                    None
                },
            },
            None => None,
        };

        let mut writer = PdfWriter::with_config(self.writer_config.clone());
        {
            let mut page = writer.add_page(PAGE_WIDTH, PAGE_HEIGHT);
            let stamp = stamp.map(|image| {
                let height = image.height_for_width(STAMP_WIDTH);
                (page.add_image(image), height)
            });

            let mut layout = Layout::new(page.content());
            layout.draw_frame();
            let footer_top = layout.draw_body(face);
            layout.draw_footer(face, footer_top);

            if let Some((resource, height)) = stamp {
                let x = PAGE_WIDTH / 2.0 - STAMP_WIDTH / 2.0;
                let top = footer_top + 60.0;
                page.content()
                    .draw_image(&resource, x, PAGE_HEIGHT - top - height, STAMP_WIDTH, height);
            }
            page.finish();
        }
        writer.finish()
    }
}

/// Top-down text cursor over a page content stream.
struct Layout<'a> {
    content: &'a mut ContentStreamBuilder,
    y: f32,
    font: StandardFont,
    size: f32,
    spacing: f32,
    color: Color,
}

impl<'a> Layout<'a> {
    fn new(content: &'a mut ContentStreamBuilder) -> Self {
        Self {
            content,
            y: MARGIN,
            font: StandardFont::Helvetica,
            size: 12.0,
            spacing: 0.0,
            color: Color::black(),
        }
    }

    fn font(&mut self, font: StandardFont, size: f32) -> &mut Self {
        self.font = font;
        self.size = size;
        self
    }

    fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    fn spacing(&mut self, spacing: f32) -> &mut Self {
        self.spacing = spacing;
        self
    }

    fn line_height(&self) -> f32 {
        self.font.metrics().line_height(self.size)
    }

    fn move_down(&mut self, lines: f32) {
        self.y += self.line_height() * lines;
    }

    /// Double border and the four corner brackets.
    fn draw_frame(&mut self) {
        let (w, h) = (PAGE_WIDTH, PAGE_HEIGHT);
        self.content.rect(20.0, 20.0, w - 40.0, h - 40.0).stroke();
        self.content.rect(25.0, 25.0, w - 50.0, h - 50.0).stroke();

        self.content.save_state().set_line_width(2.0);
        // (corner, arm along x, arm along y) in top-down coordinates
        let brackets = [
            ((40.0, 40.0), 40.0, 40.0),
            ((w - 40.0, 40.0), -40.0, 40.0),
            ((40.0, h - 40.0), 40.0, -40.0),
            ((w - 40.0, h - 40.0), -40.0, -40.0),
        ];
        for ((cx, cy), dx, dy) in brackets {
            self.content
                .move_to(cx, h - (cy + dy))
                .line_to(cx, h - cy)
                .line_to(cx + dx, h - cy)
                .stroke();
        }
        self.content.restore_state();
    }

    /// Title block down to the certification type. Returns the footer top.
    fn draw_body(&mut self, face: &CertificateFace) -> f32 {
        let bold = StandardFont::HelveticaBold;
        let regular = StandardFont::Helvetica;

        self.move_down(2.0);
        self.font(bold, 40.0).color(hex_color("#1a365d"));
        self.centered("CERTIFICATE");
        self.font(bold, 20.0).spacing(2.0);
        self.centered("OF COMPLETION");
        self.spacing(0.0);
        self.move_down(1.5);

        self.font(regular, 14.0).color(Color::black());
        self.centered("This is to certify that");
        self.move_down(0.5);

        self.font(bold, 32.0).color(hex_color("#2d3748"));
        self.centered(&face.holder_name);
        self.move_down(0.5);

        self.font(regular, 14.0).color(Color::black());
        self.centered("has successfully completed the requirements for");
        self.move_down(0.5);

        self.font(bold, 24.0).color(hex_color("#2b6cb0"));
        self.centered(&face.certification_type);
        self.move_down(1.5);

        self.y
    }

    /// "Awarded On" on the left, "Issued By" right-aligned, values 20pt below.
    fn draw_footer(&mut self, face: &CertificateFace, top: f32) {
        let regular = StandardFont::Helvetica;
        let label = hex_color("#718096");
        let issuer = face.issuer_name.as_deref().unwrap_or(DEFAULT_ISSUER_NAME);

        self.font(regular, 12.0).color(label);
        self.show("Awarded On:", 100.0, top);
        self.font(regular, 14.0).color(Color::black());
        self.show(&format_issue_date(&face.issue_date), 100.0, top + 20.0);

        self.font(regular, 12.0).color(label);
        self.right_aligned("Issued By:", 500.0, 200.0, top);
        self.font(regular, 14.0).color(Color::black());
        self.right_aligned(issuer, 500.0, 200.0, top + 20.0);
    }

    fn width_of(&self, text: &str) -> f32 {
        self.font.metrics().text_width(text, self.size, self.spacing)
    }

    /// Centered between the margins, wrapped on words, advancing the cursor.
    fn centered(&mut self, text: &str) {
        let available = PAGE_WIDTH - 2.0 * MARGIN;
        for line in wrap_words(text, available, |s| self.width_of(s)) {
            let x = MARGIN + (available - self.width_of(&line)) / 2.0;
            let top = self.y;
            self.show(&line, x, top);
            self.y += self.line_height();
        }
    }

    fn right_aligned(&mut self, text: &str, x: f32, width: f32, top: f32) {
        let left = x + width - self.width_of(text);
        self.show(text, left, top);
    }

    /// Emit one line whose line box starts at `top` (top-down coordinates).
    fn show(&mut self, text: &str, x: f32, top: f32) {
        let baseline = PAGE_HEIGHT - (top + self.font.metrics().ascent(self.size));
        self.content
            .fill_color(self.color)
            .begin_text()
            .set_font(self.font.resource_name(), self.size)
            .set_character_spacing(self.spacing)
            .text(&encode_win_ansi(text), x, baseline)
            .end_text();
    }
}

fn hex_color(hex: &str) -> Color {
    Color::from_hex(hex).unwrap_or(Color::black())
}

/// Greedy word wrap. A single word wider than `max_width` gets its own line.
fn wrap_words(text: &str, max_width: f32, width_of: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if width_of(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Resolve a stamp reference against the uploads directory.
///
/// Only the part after `/uploads/` is used when the reference is a URL path.
/// Returns `None` when the file does not exist or the reference would leave
/// the uploads directory.
pub fn resolve_stamp_path(uploads_dir: &Path, reference: &str) -> Option<PathBuf> {
    let filename = match reference.split("/uploads/").nth(1) {
        Some(rest) => rest,
        None => reference,
    };
    let relative = Path::new(filename.trim_start_matches('/'));
    if filename.trim().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        log::warn!("Ignoring stamp reference outside the uploads directory: {}", reference);
        return None;
    }

    let path = uploads_dir.join(relative);
    path.is_file().then_some(path)
}

/// Format an issue date as a US short date (`M/D/YYYY`).
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` and plain dates;
/// anything else is printed as stored.
pub fn format_issue_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let date = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_utc().date())
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"));

    match date {
        Ok(date) => format!("{}/{}/{}", date.month(), date.day(), date.year()),
        Err(_) => raw.to_string(),
    }
}
