use image::{DynamicImage, ImageFormat as ImgFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{Result, VisionError};

const MAX_DIMENSION: u32 = 16384;

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    info!("Loading image: {}", path.display());

    if !path.exists() {
        return Err(VisionError::ImageIo(format!(
            "File not found: {}. Check if the path is correct.",
            path.display()
        )));
    }

    let bytes = fs::read(path)?;
    decode_image_bytes(&bytes)
}

/// Decode an uploaded image, honouring its EXIF orientation so the pixel
/// grid matches what the detection service saw.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(VisionError::InvalidFormat("Image data is empty".to_string()));
    }

    let format = detect_format(bytes)?;
    debug!("Detected format: {:?}", format);

    let img = image::load_from_memory_with_format(bytes, format)?;
    validate_dimensions(img.width(), img.height())?;

    let img = apply_exif_orientation(img, bytes);

    info!(
        "Image decoded successfully: {}x{} pixels",
        img.width(),
        img.height()
    );

    Ok(img)
}

#[instrument(skip(image), fields(path = %path.display()))]
pub fn save_image(image: &DynamicImage, path: &Path, format: ImgFormat, quality: u8) -> Result<()> {
    info!("Saving image to: {}", path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match format {
        ImgFormat::Jpeg => {
            let mut file = BufWriter::new(File::create(path)?);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, quality);
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImgFormat::Png | ImgFormat::WebP => {
            image.save_with_format(path, format)?;
        }
        _ => {
            return Err(VisionError::InvalidFormat(format!(
                "Unsupported output format: {:?}",
                format
            )));
        }
    }

    info!("Image saved successfully");
    Ok(())
}

/// Map an output format name to its `image` format.
pub fn format_from_name(name: &str) -> Result<ImgFormat> {
    match name.to_lowercase().as_str() {
        "jpeg" | "jpg" => Ok(ImgFormat::Jpeg),
        "png" => Ok(ImgFormat::Png),
        "webp" => Ok(ImgFormat::WebP),
        other => Err(VisionError::InvalidFormat(format!(
            "Unsupported output format '{}'. Must be one of: jpeg, png, webp",
            other
        ))),
    }
}

pub fn extension_for(format: ImgFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

fn detect_format(bytes: &[u8]) -> Result<ImgFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Ok(ImgFormat::Jpeg)
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Ok(ImgFormat::Png)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Ok(ImgFormat::WebP)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Ok(ImgFormat::Gif)
    } else if bytes.starts_with(b"BM") {
        Ok(ImgFormat::Bmp)
    } else if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00])
        || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        Ok(ImgFormat::Tiff)
    } else {
        Err(VisionError::InvalidFormat(
            "Unknown or unsupported image format. Supported formats: JPEG, PNG, WebP, GIF, BMP, TIFF"
                .to_string(),
        ))
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(VisionError::InvalidFormat(format!(
            "Image has no pixels: {}x{}",
            width, height
        )));
    }

    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(VisionError::InvalidFormat(format!(
            "Image dimensions too large: {}x{}. Maximum: {}x{}",
            width, height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }

    Ok(())
}

fn apply_exif_orientation(img: DynamicImage, bytes: &[u8]) -> DynamicImage {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(e) => e,
        Err(_) => return img,
    };

    let orientation = match exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
    {
        Some(v) => v,
        None => return img,
    };

    debug!("EXIF orientation: {}", orientation);
    rotate_for_orientation(img, orientation as u16)
}

fn rotate_for_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
