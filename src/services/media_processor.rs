// src/services/media_processor.rs
use crate::errors::ScamGuardError;
use crate::models::InlineMedia;
use base64::{Engine as _, engine::general_purpose};
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};
use std::io::Cursor;

const MAX_SOURCE_DIMENSION: u32 = 8192;
const PDF_MAGIC: &[u8] = b"%PDF";

pub struct MediaProcessor {
    max_bytes: usize,
    max_dimension: u32,
}

impl MediaProcessor {
    pub fn new(max_bytes: usize, max_dimension: u32) -> Self {
        Self {
            max_bytes,
            max_dimension,
        }
    }

    /// Decodes base64 media, accepting a `data:<mime>;base64,` prefix.
    pub fn decode_base64(&self, encoded: &str) -> Result<Vec<u8>, ScamGuardError> {
        let payload = match encoded.split_once(',') {
            Some((_, data)) => data,
            None => encoded,
        };
        let payload: String = payload.split_whitespace().collect();

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ScamGuardError::MediaProcessing(format!("Invalid base64 data: {}", e)))
    }

    pub fn prepare(&self, data: &[u8], allow_pdf: bool) -> Result<InlineMedia, ScamGuardError> {
        if data.is_empty() {
            return Err(ScamGuardError::MediaProcessing("Uploaded file is empty".to_string()));
        }

        if data.len() > self.max_bytes {
            return Err(ScamGuardError::MediaProcessing(format!(
                "Upload of {} bytes exceeds the {} byte limit",
                data.len(),
                self.max_bytes
            )));
        }

        if data.starts_with(PDF_MAGIC) {
            if !allow_pdf {
                return Err(ScamGuardError::MediaProcessing(
                    "PDF documents are only accepted by the invoice check".to_string(),
                ));
            }
            return Ok(InlineMedia {
                mime_type: "application/pdf".to_string(),
                data: data.to_vec(),
            });
        }

        let format = image::guess_format(data)
            .map_err(|e| ScamGuardError::MediaProcessing(format!("Invalid image format: {}", e)))?;
        let mime_type = mime_for(format).ok_or_else(|| {
            ScamGuardError::MediaProcessing(format!("Unsupported image format: {:?}", format))
        })?;

        // Header-only read, so oversized images are refused before any pixel buffer exists.
        let (width, height) = ImageReader::with_format(Cursor::new(data), format)
            .into_dimensions()
            .map_err(|e| {
                ScamGuardError::MediaProcessing(format!("Failed to read image header: {}", e))
            })?;
        if width > MAX_SOURCE_DIMENSION || height > MAX_SOURCE_DIMENSION {
            return Err(ScamGuardError::MediaProcessing(format!(
                "Image dimensions exceed {}x{}",
                MAX_SOURCE_DIMENSION, MAX_SOURCE_DIMENSION
            )));
        }

        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| ScamGuardError::MediaProcessing(format!("Failed to load image: {}", e)))?;

        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(InlineMedia {
                mime_type: mime_type.to_string(),
                data: data.to_vec(),
            });
        }

        Ok(InlineMedia {
            mime_type: "image/jpeg".to_string(),
            data: self.downscale(&img)?,
        })
    }

    fn downscale(&self, img: &DynamicImage) -> Result<Vec<u8>, ScamGuardError> {
        let (width, height) = img.dimensions();
        let ratio = (self.max_dimension as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut output = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut output), ImgFormat::Jpeg)
            .map_err(|e| {
                ScamGuardError::MediaProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(output)
    }
}

fn mime_for(format: ImgFormat) -> Option<&'static str> {
    match format {
        ImgFormat::Png => Some("image/png"),
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::WebP => Some("image/webp"),
        ImgFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImgFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn small_images_pass_through_untouched() {
        let processor = MediaProcessor::new(1024 * 1024, 64);
        let data = png(32, 16);
        let media = processor.prepare(&data, false).unwrap();
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.data, data);
    }

    #[test]
    fn large_images_are_downscaled_to_jpeg() {
        let processor = MediaProcessor::new(10 * 1024 * 1024, 64);
        let media = processor.prepare(&png(256, 128), false).unwrap();
        assert_eq!(media.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&media.data).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn oversized_dimensions_are_refused_from_the_header() {
        let img = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let mut gif = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut gif), ImgFormat::Gif)
            .unwrap();

        // Logical screen width and height, little-endian, right after "GIF89a".
        gif[6..8].copy_from_slice(&9000u16.to_le_bytes());
        gif[8..10].copy_from_slice(&9000u16.to_le_bytes());

        let processor = MediaProcessor::new(1024 * 1024, 64);
        let err = processor.prepare(&gif, false).unwrap_err();
        assert!(err.to_string().contains("exceed"));
    }

    #[test]
    fn pdf_only_allowed_when_requested() {
        let processor = MediaProcessor::new(1024, 64);
        let pdf = b"%PDF-1.7\n%fake invoice".to_vec();

        assert!(processor.prepare(&pdf, false).is_err());
        let media = processor.prepare(&pdf, true).unwrap();
        assert_eq!(media.mime_type, "application/pdf");
    }

    #[test]
    fn rejects_oversized_and_garbage_input() {
        let processor = MediaProcessor::new(16, 64);
        assert!(processor.prepare(&[0u8; 32], false).is_err());
        assert!(processor.prepare(b"not an image", false).is_err());
        assert!(processor.prepare(&[], false).is_err());
    }

    #[test]
    fn decodes_data_urls_and_plain_base64() {
        let processor = MediaProcessor::new(1024, 64);
        let encoded = general_purpose::STANDARD.encode(b"hello");
        assert_eq!(processor.decode_base64(&encoded).unwrap(), b"hello");

        let data_url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(processor.decode_base64(&data_url).unwrap(), b"hello");

        assert!(processor.decode_base64("***").is_err());
    }
}
