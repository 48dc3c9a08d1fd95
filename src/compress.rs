/// Upload image compression
///
/// Re-encodes uploaded photos as progressively lower-quality JPEG until they
/// fit the configured size budget, downscaling as a last resort. Codec
/// failures degrade to the original bytes so an odd file never blocks an
/// upload on its own.
use crate::error::{SiteError, SiteResult};
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;

const QUALITY_STEP: u8 = 5;
const QUALITY_FLOOR: u8 = 20;
/// Quality used for the single re-encode after a dimension downscale
const RESCUE_QUALITY: u8 = 80;

/// Size and quality bounds for one compression pass
#[derive(Debug, Clone)]
pub struct CompressionConstraints {
    pub max_size_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub start_quality: u8,
}

impl Default for CompressionConstraints {
    fn default() -> Self {
        Self {
            max_size_bytes: 2 * 1024 * 1024,
            max_width: 1920,
            max_height: 1080,
            start_quality: 85,
        }
    }
}

/// Result of a compression pass
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub warning: Option<String>,
}

/// Compress image bytes to fit within the constraints.
///
/// Deterministic for identical input and constraints. Never enlarges.
/// Input already under budget is returned unchanged to avoid needless
/// quality loss.
pub fn compress(
    bytes: &[u8],
    original_mime: &str,
    constraints: &CompressionConstraints,
) -> SiteResult<CompressOutcome> {
    if bytes.is_empty() {
        return Err(SiteError::EmptyFile);
    }

    if bytes.len() <= constraints.max_size_bytes {
        return Ok(CompressOutcome {
            bytes: bytes.to_vec(),
            mime_type: original_mime.to_string(),
            warning: None,
        });
    }

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("Image decode failed, storing original bytes: {}", e);
            return Ok(CompressOutcome {
                bytes: bytes.to_vec(),
                mime_type: original_mime.to_string(),
                warning: Some(format!("compression skipped: {}", e)),
            });
        }
    };

    match reencode_under_budget(&img, constraints) {
        // A re-encode that came out bigger than the input helps nobody;
        // keep the original bytes instead
        Ok(out) if out.len() > bytes.len() => Ok(CompressOutcome {
            bytes: bytes.to_vec(),
            mime_type: original_mime.to_string(),
            warning: Some("compression skipped: re-encode larger than original".to_string()),
        }),
        Ok(out) => Ok(CompressOutcome {
            bytes: out,
            mime_type: "image/jpeg".to_string(),
            warning: None,
        }),
        Err(e) => {
            tracing::warn!("JPEG re-encode failed, storing original bytes: {}", e);
            Ok(CompressOutcome {
                bytes: bytes.to_vec(),
                mime_type: original_mime.to_string(),
                warning: Some(format!("compression skipped: {}", e)),
            })
        }
    }
}

fn reencode_under_budget(
    img: &DynamicImage,
    constraints: &CompressionConstraints,
) -> Result<Vec<u8>, image::ImageError> {
    // Fit within max dimensions first; never enlarge
    let mut sized = if img.width() > constraints.max_width
        || img.height() > constraints.max_height
    {
        img.resize(
            constraints.max_width,
            constraints.max_height,
            FilterType::Triangle,
        )
    } else {
        img.clone()
    };

    let mut quality = constraints.start_quality.max(QUALITY_FLOOR);
    let mut encoded = encode_jpeg(&sized, quality)?;

    while encoded.len() > constraints.max_size_bytes && quality > QUALITY_FLOOR {
        quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
        encoded = encode_jpeg(&sized, quality)?;
    }

    // Still over budget at the quality floor: downscale once and re-encode
    if encoded.len() > constraints.max_size_bytes {
        let scale =
            (constraints.max_size_bytes as f64 / encoded.len() as f64).sqrt();
        let new_width = ((sized.width() as f64 * scale).floor() as u32).max(1);
        let new_height = ((sized.height() as f64 * scale).floor() as u32).max(1);
        sized = sized.resize_exact(new_width, new_height, FilterType::Triangle);
        encoded = encode_jpeg(&sized, RESCUE_QUALITY)?;
    }

    Ok(encoded)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    /// Build a noisy test image that does not compress to nothing
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let r = ((x.wrapping_mul(31) ^ y.wrapping_mul(17)) % 256) as u8;
            let g = ((x.wrapping_mul(7) + y.wrapping_mul(13)) % 256) as u8;
            let b = ((x ^ y).wrapping_mul(5) % 256) as u8;
            image::Rgb([r, g, b])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_empty_input_rejected() {
        let result = compress(&[], "image/png", &CompressionConstraints::default());
        assert!(matches!(result, Err(SiteError::EmptyFile)));
    }

    #[test]
    fn test_under_budget_returned_unchanged() {
        let bytes = noisy_png(50, 50);
        let out = compress(&bytes, "image/png", &CompressionConstraints::default()).unwrap();
        assert_eq!(out.bytes, bytes);
        assert_eq!(out.mime_type, "image/png");
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_over_budget_is_reduced() {
        let bytes = noisy_png(800, 600);
        let constraints = CompressionConstraints {
            max_size_bytes: 20 * 1024,
            ..Default::default()
        };
        assert!(bytes.len() > constraints.max_size_bytes);

        let out = compress(&bytes, "image/png", &constraints).unwrap();
        assert!(out.bytes.len() <= bytes.len());
        assert_eq!(out.mime_type, "image/jpeg");
    }

    #[test]
    fn test_never_enlarges_dimensions() {
        let bytes = noisy_png(2400, 1600);
        let constraints = CompressionConstraints {
            max_size_bytes: 50 * 1024,
            ..Default::default()
        };

        let out = compress(&bytes, "image/png", &constraints).unwrap();
        let reloaded = image::load_from_memory(&out.bytes).unwrap();
        assert!(reloaded.width() <= 2400);
        assert!(reloaded.height() <= 1600);
        // Over max dimensions, so it must also have been fit to 1920x1080
        assert!(reloaded.width() <= 1920);
        assert!(reloaded.height() <= 1080);
    }

    #[test]
    fn test_downscale_rescue_when_floor_insufficient() {
        let bytes = noisy_png(1200, 900);
        // Budget small enough that the quality ladder alone cannot reach it
        let constraints = CompressionConstraints {
            max_size_bytes: bytes.len() / 40,
            ..Default::default()
        };

        let out = compress(&bytes, "image/png", &constraints).unwrap();
        let reloaded = image::load_from_memory(&out.bytes).unwrap();
        assert!(reloaded.width() < 1200);
        assert!(out.bytes.len() < bytes.len());
    }

    #[test]
    fn test_output_never_larger_than_input() {
        // Budgets far below what JPEG framing alone costs force the
        // downscale rescue; the result must still not grow the file
        for (w, h, budget) in [(8, 8, 1), (64, 64, 64), (800, 600, 20 * 1024)] {
            let bytes = noisy_png(w, h);
            let constraints = CompressionConstraints {
                max_size_bytes: budget,
                ..Default::default()
            };

            let out = compress(&bytes, "image/png", &constraints).unwrap();
            assert!(
                out.bytes.len() <= bytes.len(),
                "{}x{} at budget {} grew from {} to {}",
                w,
                h,
                budget,
                bytes.len(),
                out.bytes.len()
            );
        }
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let bytes = noisy_png(800, 600);
        let constraints = CompressionConstraints {
            max_size_bytes: 20 * 1024,
            ..Default::default()
        };

        let a = compress(&bytes, "image/png", &constraints).unwrap();
        let b = compress(&bytes, "image/png", &constraints).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_original() {
        let garbage: Vec<u8> = (0..3_000_000).map(|i| (i % 251) as u8).collect();
        let out = compress(&garbage, "image/heic", &CompressionConstraints::default()).unwrap();
        assert_eq!(out.bytes, garbage);
        assert_eq!(out.mime_type, "image/heic");
        assert!(out.warning.is_some());
    }
}
