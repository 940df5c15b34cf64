use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use tracing::{debug, instrument};

use crate::error::{Result, VisionError};
use crate::image_io;

/// Prefix given to bare base64 payloads when they are turned into a data URI.
/// Providers that omit the prefix send JPEG.
pub const DEFAULT_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// A pre-rendered image embedded in a detection response, either as a
/// `data:` URI or as a bare base64 blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualizationPayload<'a> {
    raw: &'a str,
}

impl<'a> VisualizationPayload<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    pub fn is_data_uri(&self) -> bool {
        self.raw.starts_with("data:")
    }

    /// A URI any image viewer or `<img src>` accepts.
    pub fn to_data_uri(&self) -> String {
        if self.is_data_uri() {
            self.raw.to_string()
        } else {
            format!("{}{}", DEFAULT_DATA_URI_PREFIX, self.raw)
        }
    }

    /// Media type declared by a data URI, if any.
    pub fn media_type(&self) -> Option<&'a str> {
        let header = self.raw.strip_prefix("data:")?.split(',').next()?;
        let media = header.split(';').next()?;
        (!media.is_empty()).then_some(media)
    }

    /// The base64 section of the payload, without any data URI header.
    pub fn base64_body(&self) -> &'a str {
        if self.is_data_uri() {
            self.raw
                .split_once(',')
                .map(|(_, body)| body)
                .unwrap_or_default()
        } else {
            self.raw
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        let body: String = self
            .base64_body()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if body.is_empty() {
            return Err(VisionError::Visualization(
                "visualization payload is empty".to_string(),
            ));
        }

        Ok(STANDARD.decode(body.as_bytes())?)
    }

    #[instrument(skip(self), fields(len = self.raw.len()))]
    pub fn decode(&self) -> Result<DynamicImage> {
        let bytes = self.decode_bytes()?;
        debug!("Decoded {} bytes of visualization data", bytes.len());
        image_io::decode_image_bytes(&bytes)
            .map_err(|e| VisionError::Visualization(format!("undecodable image: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        STANDARD.encode(bytes)
    }

    #[test]
    fn bare_base64_gets_jpeg_prefix() {
        let payload = VisualizationPayload::new("/9j/4AAQ");
        assert!(!payload.is_data_uri());
        assert_eq!(payload.to_data_uri(), "data:image/jpeg;base64,/9j/4AAQ");
        assert_eq!(payload.media_type(), None);
    }

    #[test]
    fn data_uri_is_kept_verbatim() {
        let payload = VisualizationPayload::new("data:image/png;base64,iVBORw0K");
        assert!(payload.is_data_uri());
        assert_eq!(payload.to_data_uri(), "data:image/png;base64,iVBORw0K");
        assert_eq!(payload.media_type(), Some("image/png"));
        assert_eq!(payload.base64_body(), "iVBORw0K");
    }

    #[test]
    fn decodes_png_payload() {
        let encoded = png_base64(12, 7);
        let img = VisualizationPayload::new(&encoded).decode().expect("decode");
        assert_eq!((img.width(), img.height()), (12, 7));
    }

    #[test]
    fn decodes_data_uri_with_line_breaks() {
        let encoded = png_base64(4, 4);
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let uri = format!("data:image/png;base64,{}\n{}", head, tail);
        let img = VisualizationPayload::new(&uri).decode().expect("decode");
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[test]
    fn invalid_base64_is_reported() {
        let err = VisualizationPayload::new("not base64 at all!!").decode().unwrap_err();
        assert!(matches!(err, VisionError::Visualization(_)));
    }

    #[test]
    fn empty_body_is_reported() {
        let err = VisualizationPayload::new("data:image/png;base64,")
            .decode_bytes()
            .unwrap_err();
        assert!(matches!(err, VisionError::Visualization(_)));
    }

    #[test]
    fn non_image_bytes_are_reported() {
        let encoded = STANDARD.encode(b"definitely not an image, just text bytes");
        let err = VisualizationPayload::new(&encoded).decode().unwrap_err();
        assert!(matches!(err, VisionError::Visualization(_)));
    }
}
