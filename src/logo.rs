//! Logo loading for the invoice header band.
//!
//! Sources may be a `data:image/...;base64,` URL, a `file://` URL or a plain
//! path. The decoded image is flattened onto white (PDF RGB images carry no
//! alpha) and downscaled so the embedded raster stays small.

use std::fs;

use base64::Engine as _;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{InvoiceError, Result};

/// Longest side of the embedded raster, in pixels.
const MAX_LOGO_PX: u32 = 360;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoImage {
    pub width: u32,
    pub height: u32,
    /// Row-major 8-bit RGB triplets.
    pub rgb: Vec<u8>,
}

impl LogoImage {
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

pub fn load_logo(source: &str) -> Result<LogoImage> {
    let bytes = read_logo_source_bytes(source)?;
    decode_logo(&bytes)
}

fn parse_data_url_image(source: &str) -> Option<Result<Vec<u8>>> {
    let trimmed = source.trim();
    if !trimmed.starts_with("data:image/") {
        return None;
    }
    let decoded = trimmed
        .split_once(',')
        .ok_or_else(|| InvoiceError::Logo("data URL has no payload".to_string()))
        .and_then(|(_, payload)| {
            base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| InvoiceError::Logo(format!("data URL decode: {e}")))
        });
    Some(decoded)
}

fn read_logo_source_bytes(source: &str) -> Result<Vec<u8>> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(InvoiceError::Logo("logo source is empty".to_string()));
    }

    if let Some(decoded) = parse_data_url_image(trimmed) {
        return decoded;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Err(InvoiceError::Logo(
            "remote logos are not supported, use a file path or data URL".to_string(),
        ));
    }

    let path_value = match trimmed.strip_prefix("file://") {
        Some(raw) if cfg!(windows) && raw.starts_with('/') && raw.get(2..3) == Some(":") => {
            raw.get(1..).unwrap_or(raw).to_string()
        }
        Some(raw) => raw.to_string(),
        None => trimmed.to_string(),
    };

    debug!(path = %path_value, "Reading logo file");
    fs::read(&path_value)
        .map_err(|e| InvoiceError::Logo(format!("file read failed ({path_value}): {e}")))
}

/// Decode any format `image` understands into a white-backed RGB raster.
pub fn decode_logo(image_bytes: &[u8]) -> Result<LogoImage> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| InvoiceError::Logo(format!("decode: {e}")))?;
    let rgba = decoded.to_rgba8();
    let (src_w, src_h) = rgba.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(InvoiceError::Logo("image has invalid dimensions".to_string()));
    }

    let scale = (f64::from(MAX_LOGO_PX) / f64::from(src_w.max(src_h))).min(1.0);
    let target_w = ((f64::from(src_w) * scale).round() as u32).max(1);
    let target_h = ((f64::from(src_h) * scale).round() as u32).max(1);
    let resized = if target_w != src_w || target_h != src_h {
        image::imageops::resize(&rgba, target_w, target_h, FilterType::Triangle)
    } else {
        rgba
    };

    let mut rgb = Vec::with_capacity((resized.width() * resized.height() * 3) as usize);
    for pixel in resized.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }

    Ok(LogoImage {
        width: resized.width(),
        height: resized.height(),
        rgb,
    })
}
