//! Byte-level media kind detection.
//!
//! Sniffs magic bytes only; no decoding happens here.

/// Recognized inbound media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Png,
    Jpeg,
    /// Static WebP.
    WebP,
    /// WebP with an animation flag set.
    AnimatedWebP,
    /// Gzip stream — a compressed-vector ("TGS-style") sticker.
    Gzip,
    /// WebM/Matroska container — a video sticker candidate.
    WebM,
    Unknown,
}

impl MediaKind {
    /// File extension used when staging this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP | Self::AnimatedWebP => "webp",
            Self::Gzip => "tgs",
            Self::WebM => "webm",
            Self::Unknown => "bin",
        }
    }

    /// Whether this kind goes through the raster pipeline.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::WebP)
    }
}

/// Detect the media kind from raw bytes.
pub fn detect_kind(data: &[u8]) -> MediaKind {
    if data.len() < 4 {
        return MediaKind::Unknown;
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return MediaKind::Png;
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return MediaKind::Jpeg;
    }
    if data.starts_with(&[0x1F, 0x8B]) {
        return MediaKind::Gzip;
    }
    // EBML header shared by WebM/MKV
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return MediaKind::WebM;
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        // VP8X extended format carries an animation flag bit.
        if data.len() >= 21 && &data[12..16] == b"VP8X" && data[20] & 0x02 != 0 {
            return MediaKind::AnimatedWebP;
        }
        return MediaKind::WebP;
    }

    MediaKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_png() {
        let data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_kind(&data), MediaKind::Png);
    }

    #[test]
    fn test_detect_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(detect_kind(&data), MediaKind::Jpeg);
    }

    #[test]
    fn test_detect_gzip() {
        let data = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(detect_kind(&data), MediaKind::Gzip);
    }

    #[test]
    fn test_detect_webm() {
        let data = [0x1A, 0x45, 0xDF, 0xA3, 0x00, 0x00];
        assert_eq!(detect_kind(&data), MediaKind::WebM);
    }

    #[test]
    fn test_detect_webp_static() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"WEBP");
        data.extend_from_slice(b"VP8 ");
        assert_eq!(detect_kind(&data), MediaKind::WebP);
    }

    #[test]
    fn test_detect_webp_animated() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"WEBP");
        data.extend_from_slice(b"VP8X");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.push(0x02); // animation flag
        assert_eq!(detect_kind(&data), MediaKind::AnimatedWebP);
    }

    #[test]
    fn test_detect_unknown_and_short() {
        assert_eq!(detect_kind(&[0x00, 0x01, 0x02, 0x03]), MediaKind::Unknown);
        assert_eq!(detect_kind(&[0x1F, 0x8B]), MediaKind::Unknown);
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(MediaKind::Png.extension(), "png");
        assert_eq!(MediaKind::Gzip.extension(), "tgs");
        assert_eq!(MediaKind::WebM.extension(), "webm");
    }
}
