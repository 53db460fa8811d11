//! Image handling for PDF generation.
//!
//! Stamp images are embedded as Image XObjects: JPEG data is passed through
//! with `DCTDecode`, PNG data is decoded with the `image` crate and re-encoded
//! as Flate-compressed samples, with any alpha channel split into an `/SMask`.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::writer::ObjectSerializer;
use std::io::Write;

/// How the image samples are stored in the XObject stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// Decoded samples (FlateDecode filter)
    Flate,
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image data for PDF embedding.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bits per component (always 8 after decoding)
    pub bits_per_component: u8,
    /// Color space
    pub color_space: ColorSpace,
    /// Storage format
    pub format: ImageFormat,
    /// Encoded image data
    pub data: Vec<u8>,
    /// Flate-compressed alpha channel, if any
    pub soft_mask: Option<Vec<u8>>,
}

impl ImageData {
    /// Wrap raw JPEG data; only the header is inspected.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;
        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            format: ImageFormat::Jpeg,
            data,
            soft_mask: None,
        })
    }

    /// Decode a PNG and re-encode its samples.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| Error::Image(format!("failed to decode PNG: {}", e)))?;
        let (width, height) = (img.width(), img.height());
        let has_alpha = img.color().has_alpha();
        let is_gray = matches!(
            img.color(),
            image::ColorType::L8 | image::ColorType::L16 | image::ColorType::La8 | image::ColorType::La16
        );

        let (color_space, samples, alpha) = match (is_gray, has_alpha) {
            (true, false) => (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None),
            (true, true) => {
                let la = img.to_luma_alpha8();
                let gray: Vec<u8> = la.pixels().map(|p| p.0[0]).collect();
                let alpha: Vec<u8> = la.pixels().map(|p| p.0[1]).collect();
                (ColorSpace::DeviceGray, gray, Some(alpha))
            },
            (false, false) => (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None),
            (false, true) => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                let mut alpha = Vec::with_capacity((width * height) as usize);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha))
            },
        };

        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            format: ImageFormat::Flate,
            data: compress_image_data(&samples)?,
            soft_mask: alpha.map(|a| compress_image_data(&a)).transpose()?,
        })
    }

    /// Load an image from raw bytes, detecting JPEG or PNG by signature.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0xFF, 0xD8]) {
            return Self::from_jpeg(data.to_vec());
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Self::from_png(data);
        }
        Err(Error::Image("unsupported image format (expected PNG or JPEG)".to_string()))
    }

    /// Load an image from a file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Image XObject stream dictionary. `smask` links the soft mask object.
    pub fn build_xobject_dict(&self, smask: Option<Object>) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), ObjectSerializer::name("XObject"));
        dict.insert("Subtype".to_string(), ObjectSerializer::name("Image"));
        dict.insert("Width".to_string(), Object::Integer(i64::from(self.width)));
        dict.insert("Height".to_string(), Object::Integer(i64::from(self.height)));
        dict.insert("ColorSpace".to_string(), ObjectSerializer::name(self.color_space.pdf_name()));
        dict.insert("BitsPerComponent".to_string(), Object::Integer(i64::from(self.bits_per_component)));
        let filter = match self.format {
            ImageFormat::Jpeg => "DCTDecode",
            ImageFormat::Flate => "FlateDecode",
        };
        dict.insert("Filter".to_string(), ObjectSerializer::name(filter));
        if self.format == ImageFormat::Jpeg && self.color_space == ColorSpace::DeviceCMYK {
            // Adobe writes inverted CMYK JPEGs
            dict.insert(
                "Decode".to_string(),
                Object::Array([1, 0, 1, 0, 1, 0, 1, 0].iter().map(|&v| Object::Integer(v)).collect()),
            );
        }
        if let Some(smask) = smask {
            dict.insert("SMask".to_string(), smask);
        }
        dict
    }

    /// Soft mask (alpha channel) XObject as a stream object.
    pub fn soft_mask_object(&self) -> Option<Object> {
        self.soft_mask.as_ref().map(|mask| {
            let mut dict = Dictionary::new();
            dict.insert("Type".to_string(), ObjectSerializer::name("XObject"));
            dict.insert("Subtype".to_string(), ObjectSerializer::name("Image"));
            dict.insert("Width".to_string(), Object::Integer(i64::from(self.width)));
            dict.insert("Height".to_string(), Object::Integer(i64::from(self.height)));
            dict.insert("ColorSpace".to_string(), ObjectSerializer::name("DeviceGray"));
            dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
            dict.insert("Filter".to_string(), ObjectSerializer::name("FlateDecode"));
            Object::Stream {
                dict,
                data: bytes::Bytes::from(mask.clone()),
            }
        })
    }

    /// Height that keeps the aspect ratio at the given display width.
    pub fn height_for_width(&self, width: f32) -> f32 {
        if self.width == 0 {
            return 0.0;
        }
        width * self.height as f32 / self.width as f32
    }
}

/// Dimensions and color space from the first SOF marker.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace)> {
    let invalid = |reason: &str| Error::Image(format!("invalid JPEG: {}", reason));
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(invalid("missing SOI marker"));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF || marker == 0x00 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if pos + 8 > data.len() {
                return Err(invalid("truncated frame header"));
            }
            let height = u32::from(u16::from_be_bytes([data[pos + 3], data[pos + 4]]));
            let width = u32::from(u16::from_be_bytes([data[pos + 5], data[pos + 6]]));
            let color_space = match data[pos + 7] {
                1 => ColorSpace::DeviceGray,
                4 => ColorSpace::DeviceCMYK,
                _ => ColorSpace::DeviceRGB,
            };
            if width == 0 || height == 0 {
                return Err(invalid("zero dimensions"));
            }
            return Ok((width, height, color_space));
        }

        if pos + 2 > data.len() {
            break;
        }
        pos += usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
    }

    Err(invalid("no frame header found"))
}

/// Flate-compress image samples.
fn compress_image_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(color: image::ColorType) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        let img: image::DynamicImage = match color {
            image::ColorType::Rgba8 => image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                4,
                2,
                image::Rgba([200, 10, 10, 128]),
            )),
            _ => image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                4,
                2,
                image::Rgb([10, 200, 10]),
            )),
        };
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_rgb() {
        let image = ImageData::from_bytes(&png_bytes(image::ColorType::Rgb8)).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.color_space, ColorSpace::DeviceRGB);
        assert_eq!(image.format, ImageFormat::Flate);
        assert!(image.soft_mask.is_none());
        assert_eq!(image.height_for_width(100.0), 50.0);
    }

    #[test]
    fn test_png_alpha_becomes_soft_mask() {
        let image = ImageData::from_bytes(&png_bytes(image::ColorType::Rgba8)).unwrap();
        assert!(image.soft_mask.is_some());
        let mask = image.soft_mask_object().unwrap();
        assert_eq!(
            mask.as_dict().and_then(|d| d.get("ColorSpace")).and_then(Object::as_name),
            Some("DeviceGray")
        );
    }

    #[test]
    fn test_xobject_dict_has_no_predictor() {
        let image = ImageData::from_bytes(&png_bytes(image::ColorType::Rgb8)).unwrap();
        let dict = image.build_xobject_dict(None);
        assert_eq!(dict.get("Filter").and_then(Object::as_name), Some("FlateDecode"));
        assert!(!dict.contains_key("DecodeParms"));
        assert!(!dict.contains_key("SMask"));
    }

    #[test]
    fn test_jpeg_header() {
        // SOI, APP0 (length 4), SOF0 for 3x2 RGB
        let jpeg = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00,
            0x02, 0x00, 0x03, 0x03, 0x01, 0x22, 0x00,
        ];
        let image = ImageData::from_bytes(&jpeg).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!(image.build_xobject_dict(None).get("Filter").and_then(Object::as_name), Some("DCTDecode"));
    }

    #[test]
    fn test_undecodable_data_is_an_image_error() {
        assert!(matches!(ImageData::from_bytes(b"not an image"), Err(Error::Image(_))));
        assert!(matches!(ImageData::from_bytes(b"\x89PNG\r\n\x1a\ngarbage"), Err(Error::Image(_))));
        assert!(matches!(ImageData::from_bytes(&[0xFF, 0xD8, 0x00]), Err(Error::Image(_))));
    }
}
