//! Format, size and resolution rules for a single attached image.
//!
//! The resolution rule is orientation agnostic: the longer side is compared
//! against `min_long_side` and the shorter against `min_short_side`, so a
//! 900×750 landscape and a 750×900 portrait scan are both accepted.
use image::ImageReader;
use std::io::Cursor;
use thiserror::Error;

use crate::model::{ImageAsset, MIME_JPEG, MIME_PNG};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// 2.5" × 3" card at 300 DPI.
pub const CARD_MIN_SHORT_SIDE_PX: u32 = 750;
pub const CARD_MIN_LONG_SIDE_PX: u32 = 900;
pub const DEFAULT_MAX_IMAGE_MB: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConstraints {
    pub max_bytes: u64,
    pub min_long_side: u32,
    pub min_short_side: u32,
}

impl Default for ImageConstraints {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_MB * BYTES_PER_MB,
            min_long_side: CARD_MIN_LONG_SIDE_PX,
            min_short_side: CARD_MIN_SHORT_SIDE_PX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Why an image was refused. `Display` is the message shown next to the slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("JPG or PNG only")]
    UnsupportedFormat,
    #[error("Max {max_mb} MB")]
    TooLarge { max_mb: u64 },
    #[error("Invalid image")]
    Undecodable,
    #[error("Min {min_short}×{min_long} px{}", card_note(.min_short, .min_long))]
    BelowMinimumResolution { min_short: u32, min_long: u32 },
}

fn card_note(min_short: &u32, min_long: &u32) -> &'static str {
    if (*min_short, *min_long) == (CARD_MIN_SHORT_SIDE_PX, CARD_MIN_LONG_SIDE_PX) {
        " (2.5\"×3\" @ 300 DPI)"
    } else {
        ""
    }
}

/// Read width and height from the image header.
pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions, image::ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let (width, height) = reader.into_dimensions()?;
    Ok(Dimensions { width, height })
}

pub fn meets_resolution(dims: Dimensions, constraints: &ImageConstraints) -> bool {
    dims.long_side() >= constraints.min_long_side && dims.short_side() >= constraints.min_short_side
}

/// Check one image; rules short-circuit in order: type, size, decodability, resolution.
pub fn validate_image(
    asset: &ImageAsset,
    constraints: &ImageConstraints,
) -> Result<Dimensions, ImageRejection> {
    if asset.content_type != MIME_JPEG && asset.content_type != MIME_PNG {
        return Err(ImageRejection::UnsupportedFormat);
    }
    if asset.size() > constraints.max_bytes {
        return Err(ImageRejection::TooLarge {
            max_mb: constraints.max_bytes / BYTES_PER_MB,
        });
    }
    let dims = probe_dimensions(&asset.bytes).map_err(|_| ImageRejection::Undecodable)?;
    if !meets_resolution(dims, constraints) {
        return Err(ImageRejection::BelowMinimumResolution {
            min_short: constraints.min_short_side,
            min_long: constraints.min_long_side,
        });
    }
    Ok(dims)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        encoded(width, height, ImageFormat::Png)
    }

    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        encoded(width, height, ImageFormat::Jpeg)
    }
}
