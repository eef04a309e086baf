//! Media conversion pipeline.
//!
//! Provides the raster resize/pad/re-encode pipeline behind named profiles
//! (Icon, Sticker), byte-level kind detection, and validity checks for
//! animated (compressed-vector) and video sticker variants.

mod animated;
mod codec;
mod detection;
mod profile;

pub use animated::{
    MAX_TGS_BYTES, MAX_VIDEO_BYTES, MAX_VIDEO_EDGE, MAX_VIDEO_FPS, MAX_VIDEO_SECONDS, VideoProbe,
    VideoValidator, validate_tgs,
};
pub use codec::{ConvertedImage, MAX_SOURCE_IMAGE_BYTES, MediaCodec};
pub use detection::{MediaKind, detect_kind};
pub use profile::{ConversionProfile, FitPolicy, TargetShape};
