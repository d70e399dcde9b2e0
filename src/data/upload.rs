// ABOUTME: Image intake for OCR runs
// Reads an uploaded file, validates it as an image and normalizes exotic formats to PNG

use crate::utils::error::{OcrError, Result};
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Encoded image bytes ready to be sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Arc<[u8]>,
    pub format: ImageFormat,
}

impl ImagePayload {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An image the user has loaded into the upload panel
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub path: PathBuf,
    pub payload: ImagePayload,
    /// Format detected from the file contents, before normalization
    pub source_format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl UploadedImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn was_normalized(&self) -> bool {
        self.source_format != self.payload.format
    }
}

/// Short uppercase label for a format, e.g. `PNG`
pub fn format_label(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| ext.to_uppercase())
        .unwrap_or_else(|| format!("{:?}", format).to_uppercase())
}

/// Expand a leading `~` to the home directory
pub fn expand_path(input: &str) -> PathBuf {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if trimmed == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(trimmed)
}

/// Load and validate an image file for OCR.
///
/// Only files whose extension appears in `accepted_extensions` are considered.
/// The contents decide the actual format: JPEG and PNG are passed through
/// untouched, anything else the decoder understands is re-encoded as PNG.
pub fn load_image(path: &Path, accepted_extensions: &[String]) -> Result<UploadedImage> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !accepted_extensions.iter().any(|ext| ext.eq_ignore_ascii_case(&extension)) {
        return Err(OcrError::ImageDecode(format!(
            "unsupported file type '{}', expected one of: {}",
            path.display(),
            accepted_extensions.join(", ")
        )));
    }

    let bytes = std::fs::read(path)?;
    let mut uploaded = decode_image(bytes)?;
    uploaded.path = path.to_path_buf();

    debug!(
        path = %path.display(),
        format = ?uploaded.payload.format,
        size = uploaded.payload.len(),
        "loaded image"
    );

    Ok(uploaded)
}

/// Validate raw bytes as an image and produce the payload to submit
pub fn decode_image(bytes: Vec<u8>) -> Result<UploadedImage> {
    if bytes.is_empty() {
        return Err(OcrError::ImageDecode("file is empty".to_string()));
    }

    let source_format = image::guess_format(&bytes)?;
    let decoded = image::load_from_memory_with_format(&bytes, source_format)?;
    let (width, height) = (decoded.width(), decoded.height());

    let payload = match source_format {
        ImageFormat::Jpeg | ImageFormat::Png => ImagePayload {
            bytes: Arc::from(bytes),
            format: source_format,
        },
        _ => {
            let mut buffer = Cursor::new(Vec::new());
            decoded.write_to(&mut buffer, ImageFormat::Png)?;
            ImagePayload {
                bytes: Arc::from(buffer.into_inner()),
                format: ImageFormat::Png,
            }
        }
    };

    Ok(UploadedImage {
        path: PathBuf::new(),
        payload,
        source_format,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use tempfile::TempDir;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn accepted() -> Vec<String> {
        vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
    }

    #[test]
    fn test_png_passes_through() {
        let bytes = encoded(ImageFormat::Png);
        let uploaded = decode_image(bytes.clone()).unwrap();

        assert_eq!(uploaded.payload.format, ImageFormat::Png);
        assert_eq!(&*uploaded.payload.bytes, bytes.as_slice());
        assert_eq!((uploaded.width, uploaded.height), (4, 3));
        assert!(!uploaded.was_normalized());
        assert_eq!(uploaded.payload.mime_type(), "image/png");
    }

    #[test]
    fn test_jpeg_passes_through() {
        let bytes = encoded(ImageFormat::Jpeg);
        let uploaded = decode_image(bytes.clone()).unwrap();

        assert_eq!(uploaded.payload.format, ImageFormat::Jpeg);
        assert_eq!(&*uploaded.payload.bytes, bytes.as_slice());
        assert_eq!(uploaded.payload.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_other_formats_are_normalized_to_png() {
        let uploaded = decode_image(encoded(ImageFormat::Bmp)).unwrap();

        assert_eq!(uploaded.source_format, ImageFormat::Bmp);
        assert_eq!(uploaded.payload.format, ImageFormat::Png);
        assert!(uploaded.was_normalized());

        let reloaded = image::load_from_memory(&uploaded.payload.bytes).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (4, 3));
        assert_eq!(reloaded.to_rgb8().get_pixel(0, 0), &image::Rgb([200, 10, 10]));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_image(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));

        let err = decode_image(Vec::new()).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
    }

    #[test]
    fn test_load_image_checks_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.gif");
        std::fs::write(&path, encoded(ImageFormat::Png)).unwrap();

        let err = load_image(&path, &accepted()).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
    }

    #[test]
    fn test_load_image_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Receipt.JPG");
        std::fs::write(&path, encoded(ImageFormat::Jpeg)).unwrap();

        let uploaded = load_image(&path, &accepted()).unwrap();
        assert_eq!(uploaded.file_name(), "Receipt.JPG");
        assert_eq!(uploaded.payload.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_mislabelled_file_is_normalized() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.png");
        std::fs::write(&path, encoded(ImageFormat::Bmp)).unwrap();

        let uploaded = load_image(&path, &accepted()).unwrap();
        assert_eq!(uploaded.payload.format, ImageFormat::Png);
        assert_eq!(format_label(uploaded.source_format), "BMP");
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("  /tmp/a.png "), PathBuf::from("/tmp/a.png"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/a.png"), home.join("a.png"));
        }
    }
}
