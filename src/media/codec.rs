//! Raster conversion pipeline.
//!
//! Decodes a source image, maps it into the profile's target box, appends
//! the transparent padding strip, and re-encodes as lossless PNG. Output is
//! all-or-nothing: a failure never leaves a partial asset behind.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImage, RgbaImage};

use crate::assets::{AssetStore, StagedAsset};
use crate::error::MediaError;
use crate::media::profile::{ConversionProfile, FitPolicy};

/// Hard ceiling on raster source size (50 MB).
pub const MAX_SOURCE_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Result of a raster conversion.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    /// Encoded PNG bytes.
    pub data: Vec<u8>,
    /// Output width, including nothing but image content.
    pub width: u32,
    /// Output height, including the padding strip.
    pub height: u32,
    /// Source size in bytes.
    pub original_size: usize,
}

/// Profile-driven raster converter.
#[derive(Debug, Clone)]
pub struct MediaCodec {
    max_source_bytes: usize,
}

impl MediaCodec {
    /// Create a codec with the default source ceiling.
    pub fn new() -> Self {
        Self {
            max_source_bytes: MAX_SOURCE_IMAGE_BYTES,
        }
    }

    /// Override the source size ceiling.
    pub fn with_max_source_bytes(mut self, max: usize) -> Self {
        self.max_source_bytes = max;
        self
    }

    /// Convert `source` according to `profile`, returning encoded PNG bytes.
    pub fn convert(
        &self,
        source: &[u8],
        profile: &ConversionProfile,
    ) -> Result<ConvertedImage, MediaError> {
        if source.len() > self.max_source_bytes {
            return Err(MediaError::TooLarge {
                size: source.len(),
                max: self.max_source_bytes,
            });
        }

        let decoded = image::load_from_memory(source).map_err(|e| MediaError::DecodeFailed {
            reason: e.to_string(),
        })?;
        let (src_w, src_h) = (decoded.width(), decoded.height());
        if src_w == 0 || src_h == 0 {
            return Err(MediaError::DecodeFailed {
                reason: "image has no intrinsic dimensions".to_string(),
            });
        }

        let (target_w, target_h) = profile.target_box(src_w, src_h);
        let resized = if (target_w, target_h) == (src_w, src_h) {
            decoded
        } else {
            match profile.fit {
                FitPolicy::Exact => decoded.resize_exact(target_w, target_h, FilterType::Lanczos3),
                FitPolicy::Inside => decoded.resize(target_w, target_h, FilterType::Lanczos3),
                FitPolicy::Cover => decoded.resize_to_fill(target_w, target_h, FilterType::Lanczos3),
            }
        };

        let padded = pad_bottom(resized, profile.padding_px);
        let (out_w, out_h) = (padded.width(), padded.height());

        let mut data = Vec::new();
        padded
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .map_err(|e| MediaError::EncodeFailed {
                reason: e.to_string(),
            })?;

        tracing::debug!(
            profile = profile.name,
            src_w,
            src_h,
            out_w,
            out_h,
            "Converted image"
        );

        Ok(ConvertedImage {
            data,
            width: out_w,
            height: out_h,
            original_size: source.len(),
        })
    }

    /// Convert and stage the output as a single asset owned by the caller.
    pub async fn convert_to_file(
        &self,
        source: &[u8],
        profile: &ConversionProfile,
        store: &AssetStore,
        user_id: i64,
    ) -> Result<StagedAsset, MediaError> {
        let converted = self.convert(source, profile)?;
        let asset = store
            .stage(profile.name, user_id, &converted.data, "png")
            .await?;
        Ok(asset)
    }
}

impl Default for MediaCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a fully transparent strip of `padding` rows to the bottom edge.
/// Width is never altered.
fn pad_bottom(img: DynamicImage, padding: u32) -> DynamicImage {
    if padding == 0 {
        return img;
    }
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    // RgbaImage::new zero-fills, so the strip is alpha = 0 throughout.
    let mut canvas = RgbaImage::new(w, h + padding);
    canvas
        .copy_from(&rgba, 0, 0)
        .expect("source fits canvas by construction");
    DynamicImage::ImageRgba8(canvas)
}
