//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! While the document is being prepared the array holds name placeholders
//! (`[0 /********** /********** /**********]`) so that the real numbers can
//! be written over it later without shifting any byte.

use crate::error::{Error, Result};

/// Placeholder name standing in for each unknown ByteRange number.
pub const BYTE_RANGE_PLACEHOLDER: &str = "**********";

/// Serialized ByteRange entry as the placeholder injector writes it.
pub const BYTE_RANGE_PLACEHOLDER_ENTRY: &[u8] = b"/ByteRange [0 /********** /********** /**********]";

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a signature of `signature_size` DER bytes.
    ///
    /// The placeholder is `signature_size * 2 + 2` bytes: two hex digits per
    /// byte plus the angle brackets.
    pub fn new(signature_size: usize) -> Self {
        Self {
            placeholder_size: signature_size * 2 + 2,
        }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// ByteRange for a document of `file_size` bytes whose `/Contents` value starts at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Concatenate the two covered ranges.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let [offset1, length1, offset2, length2] = checked_range(byte_range)?;

        for (offset, length) in [(offset1, length1), (offset2, length2)] {
            if offset + length > pdf_data.len() {
                return Err(Error::InvalidPdf(format!(
                    "ByteRange segment {}+{} exceeds file size {}",
                    offset,
                    length,
                    pdf_data.len()
                )));
            }
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);
        Ok(signed_bytes)
    }

    /// Check that a ByteRange starts at 0, ends at EOF and leaves a gap between the segments.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if byte_range.iter().any(|v| *v < 0) {
            return Err(Error::InvalidPdf(format!("ByteRange has negative entries: {:?}", byte_range)));
        }

        let actual_end = offset2 + length2;
        if actual_end != file_size as i64 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                file_size, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Offset of the last ByteRange placeholder entry in the document.
    pub fn find_placeholder(pdf_data: &[u8]) -> Option<usize> {
        pdf_data
            .windows(BYTE_RANGE_PLACEHOLDER_ENTRY.len())
            .rposition(|w| w == BYTE_RANGE_PLACEHOLDER_ENTRY)
    }

    /// Find the `<` of the `/Contents` value at or after `sig_dict_offset`.
    pub fn find_contents_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        let search_end = (sig_dict_offset + 4096).min(pdf_data.len());
        let window = pdf_data.get(sig_dict_offset..search_end)?;

        let pattern = b"/Contents";
        window
            .windows(pattern.len())
            .enumerate()
            .filter(|(_, w)| *w == pattern)
            .find_map(|(pos, _)| {
                let value = window[pos + pattern.len()..]
                    .iter()
                    .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))?;
                let at = pos + pattern.len() + value;
                (window[at] == b'<').then_some(sig_dict_offset + at)
            })
    }

    /// Length of the hex string starting at `contents_offset`, brackets included.
    pub fn measure_contents(pdf_data: &[u8], contents_offset: usize) -> Option<usize> {
        if pdf_data.get(contents_offset) != Some(&b'<') {
            return None;
        }
        let close = pdf_data[contents_offset..].iter().position(|b| *b == b'>')?;
        Some(close + 1)
    }

    /// Overwrite the ByteRange placeholder array with the real values.
    ///
    /// `entry_offset` is where [`BYTE_RANGE_PLACEHOLDER_ENTRY`] starts. The
    /// array is right-padded with spaces so the document length is unchanged.
    pub fn write_byte_range(pdf_data: &mut [u8], entry_offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let array_offset = entry_offset + b"/ByteRange ".len();
        let width = BYTE_RANGE_PLACEHOLDER_ENTRY.len() - b"/ByteRange ".len();

        let formatted = Self::format_byte_range(byte_range);
        if formatted.len() > width {
            return Err(Error::Signing(format!(
                "ByteRange {} does not fit the {}-byte placeholder",
                formatted, width
            )));
        }
        if array_offset + width > pdf_data.len() {
            return Err(Error::InvalidPdf("ByteRange placeholder extends past end of file".to_string()));
        }

        let padded = format!("{:<width$}", formatted, width = width);
        pdf_data[array_offset..array_offset + width].copy_from_slice(padded.as_bytes());
        Ok(())
    }

    /// Replace the placeholder with the hex signature, zero-padded to fill it.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, signature_hex: &str) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::Signing(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }
        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::InvalidPdf("Signature insertion would exceed file bounds".to_string()));
        }

        let sig_value = format!("<{:0<width$}>", signature_hex, width = self.placeholder_size - 2);
        pdf_data[contents_offset..contents_offset + self.placeholder_size].copy_from_slice(sig_value.as_bytes());
        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SIGNATURE_SIZE)
    }
}

fn checked_range(byte_range: &[i64; 4]) -> Result<[usize; 4]> {
    let mut out = [0usize; 4];
    for (slot, value) in out.iter_mut().zip(byte_range) {
        *slot = usize::try_from(*value)
            .map_err(|_| Error::InvalidPdf(format!("ByteRange has negative entries: {:?}", byte_range)))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        // 1024 bytes * 2 (hex) + 2 (brackets) = 2050
        assert_eq!(calc.placeholder_size(), 2050);
        assert_eq!(ByteRangeCalculator::default().placeholder_size(), 16386);
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::with_placeholder_size(100);
        let byte_range = calc.calculate_byte_range(1000, 400);
        assert_eq!(byte_range, [0, 400, 500, 500]);
    }

    #[test]
    fn test_format_byte_range() {
        let formatted = ByteRangeCalculator::format_byte_range(&[0, 100, 200, 300]);
        assert_eq!(formatted, "[0 100 200 300]");
    }

    #[test]
    fn test_extract_signed_bytes() {
        let pdf_data = b"AAABBBCCC";
        let signed = ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
    }

    #[test]
    fn test_extract_signed_bytes_out_of_bounds() {
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAABBB", &[0, 3, 5, 3]).is_err());
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAABBB", &[0, -1, 5, 1]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_find_placeholder_and_contents() {
        let pdf = b"1 0 obj\n<< /ByteRange [0 /********** /********** /**********] /ContactInfo (x) /Contents <0000> >>\nendobj";
        let entry = ByteRangeCalculator::find_placeholder(pdf).unwrap();
        assert_eq!(entry, 11);

        let contents = ByteRangeCalculator::find_contents_offset(pdf, entry).unwrap();
        assert_eq!(pdf[contents], b'<');
        assert_eq!(ByteRangeCalculator::measure_contents(pdf, contents), Some(6));
        assert_eq!(ByteRangeCalculator::measure_contents(pdf, contents + 1), None);
    }

    #[test]
    fn test_write_byte_range_keeps_length() {
        let mut pdf = b"<< /ByteRange [0 /********** /********** /**********] >>".to_vec();
        let len = pdf.len();
        ByteRangeCalculator::write_byte_range(&mut pdf, 3, &[0, 1234, 5678, 90]).unwrap();

        assert_eq!(pdf.len(), len);
        let text = String::from_utf8(pdf).unwrap();
        // 39-byte array slot, 16 bytes used
        assert_eq!(text, format!("<< /ByteRange [0 1234 5678 90]{} >>", " ".repeat(23)));
    }

    #[test]
    fn test_write_byte_range_too_wide() {
        let mut pdf = BYTE_RANGE_PLACEHOLDER_ENTRY.to_vec();
        let huge = [0, 1_000_000_000_000, 2_000_000_000_000, 3_000_000_000_000];
        assert!(ByteRangeCalculator::write_byte_range(&mut pdf, 0, &huge).is_err());
    }

    #[test]
    fn test_insert_signature() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        calc.insert_signature(&mut pdf_data, 2, "ABCD").unwrap();
        assert_eq!(&pdf_data, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        let result = calc.insert_signature(&mut pdf_data, 2, "AABBCCDDEE");
        assert!(matches!(result, Err(Error::Signing(_))));
    }
}
