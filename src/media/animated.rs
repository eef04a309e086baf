//! Animated and video sticker validation.
//!
//! Compressed-vector ("TGS-style") stickers are validated in memory: gzip
//! magic, size ceiling, and a decompression check. Video stickers are probed
//! with `ffprobe` and, once the limits pass, re-encoded with `ffmpeg` to the
//! platform's constraints. No partial output survives a failure.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::MediaError;

/// Size ceiling for compressed-vector stickers (64 KB).
pub const MAX_TGS_BYTES: usize = 64 * 1024;
/// Size ceiling for video stickers (256 KB).
pub const MAX_VIDEO_BYTES: u64 = 256 * 1024;
/// Duration ceiling for video stickers.
pub const MAX_VIDEO_SECONDS: f64 = 3.0;
/// Frame-rate ceiling for video stickers.
pub const MAX_VIDEO_FPS: f64 = 30.0;
/// Dimension ceiling (either axis) for video stickers.
pub const MAX_VIDEO_EDGE: u32 = 512;

/// Required codec fourcc for video stickers.
const REQUIRED_VIDEO_CODEC: &str = "vp9";
/// Bitrate cap handed to the transcoder.
const TRANSCODE_BITRATE: &str = "200k";
/// Constant-rate-factor quality setting for the transcoder.
const TRANSCODE_CRF: &str = "32";

/// Validate a compressed-vector sticker payload.
///
/// Validation only; the payload is never re-encoded.
pub fn validate_tgs(data: &[u8]) -> Result<(), MediaError> {
    if data.len() > MAX_TGS_BYTES {
        return Err(MediaError::InvalidAnimated {
            reason: format!("payload is {} bytes, limit is {} bytes", data.len(), MAX_TGS_BYTES),
        });
    }
    if !data.starts_with(&[0x1F, 0x8B]) {
        return Err(MediaError::InvalidAnimated {
            reason: "payload does not start with gzip magic bytes".to_string(),
        });
    }

    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| MediaError::InvalidAnimated {
            reason: format!("gzip stream does not decode: {}", e),
        })?;

    Ok(())
}

/// Probed properties of a video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_seconds: f64,
}

/// ffprobe/ffmpeg-backed video sticker validator and transcoder.
#[derive(Debug, Clone)]
pub struct VideoValidator {
    ffprobe: String,
    ffmpeg: String,
}

impl VideoValidator {
    pub fn new(ffprobe: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Probe a video file and enforce the video-sticker limits.
    ///
    /// Any violation is a terminal per-item failure with a human-readable
    /// reason.
    pub async fn validate(&self, path: &Path) -> Result<VideoProbe, MediaError> {
        let byte_len = tokio::fs::metadata(path).await?.len();
        let probe = self.probe(path).await?;
        enforce_limits(&probe, byte_len)?;
        Ok(probe)
    }

    /// Run ffprobe and parse its JSON output.
    async fn probe(&self, path: &Path) -> Result<VideoProbe, MediaError> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "stream=codec_type,codec_name,width,height,r_frame_rate,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| MediaError::ProbeFailed {
                reason: format!("failed to launch ffprobe: {}", e),
            })?;

        if !output.status.success() {
            return Err(MediaError::ProbeFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ffprobe_output(&output.stdout)
    }

    /// Re-encode a validated video to the platform's constraints: VP9,
    /// CRF quality with a bitrate cap, aspect-preserving downscale into a
    /// 512 box (never upscaling), audio stripped, duration capped at 3 s.
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let result = tokio::process::Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args([
                "-c:v",
                "libvpx-vp9",
                "-crf",
                TRANSCODE_CRF,
                "-b:v",
                TRANSCODE_BITRATE,
                "-vf",
                "scale='min(512,iw)':'min(512,ih)':force_original_aspect_ratio=decrease",
                "-an",
                "-t",
                "3",
            ])
            .arg(output)
            .output()
            .await
            .map_err(|e| MediaError::TranscodeFailed {
                reason: format!("failed to launch ffmpeg: {}", e),
            })?;

        if !result.status.success() {
            // Do not leave a partial output file behind.
            let _ = tokio::fs::remove_file(output).await;
            return Err(MediaError::TranscodeFailed {
                reason: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Enforce video-sticker limits against a probe result.
fn enforce_limits(probe: &VideoProbe, byte_len: u64) -> Result<(), MediaError> {
    if byte_len > MAX_VIDEO_BYTES {
        return Err(MediaError::InvalidVideo {
            reason: format!("file is {} bytes, limit is {} bytes", byte_len, MAX_VIDEO_BYTES),
        });
    }
    if probe.codec != REQUIRED_VIDEO_CODEC {
        return Err(MediaError::InvalidVideo {
            reason: format!("codec must be VP9, got {}", probe.codec),
        });
    }
    if probe.duration_seconds > MAX_VIDEO_SECONDS {
        return Err(MediaError::InvalidVideo {
            reason: format!(
                "duration too long: {:.2}s exceeds {:.1}s",
                probe.duration_seconds, MAX_VIDEO_SECONDS
            ),
        });
    }
    if probe.fps > MAX_VIDEO_FPS {
        return Err(MediaError::InvalidVideo {
            reason: format!("frame rate too high: {:.1} fps exceeds {} fps", probe.fps, MAX_VIDEO_FPS),
        });
    }
    if probe.width > MAX_VIDEO_EDGE || probe.height > MAX_VIDEO_EDGE {
        return Err(MediaError::InvalidVideo {
            reason: format!(
                "dimensions {}x{} exceed {}px limit",
                probe.width, probe.height, MAX_VIDEO_EDGE
            ),
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parse ffprobe JSON into a [`VideoProbe`], requiring exactly one video
/// stream.
fn parse_ffprobe_output(raw: &[u8]) -> Result<VideoProbe, MediaError> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(raw).map_err(|e| MediaError::ProbeFailed {
            reason: format!("unparseable ffprobe output: {}", e),
        })?;

    let video_streams: Vec<&FfprobeStream> = parsed
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .collect();
    if video_streams.len() != 1 {
        return Err(MediaError::InvalidVideo {
            reason: format!("expected exactly one video stream, found {}", video_streams.len()),
        });
    }
    let stream = video_streams[0];

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(MediaError::ProbeFailed {
            reason: "video stream reports no dimensions".to_string(),
        });
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .ok_or_else(|| MediaError::ProbeFailed {
            reason: "video stream reports no frame rate".to_string(),
        })?;

    // WebM streams often omit per-stream duration; fall back to the format.
    let duration_seconds = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::ProbeFailed {
            reason: "no duration reported".to_string(),
        })?;

    Ok(VideoProbe {
        codec: stream.codec_name.clone().unwrap_or_default(),
        width,
        height,
        fps,
        duration_seconds,
    })
}

/// Parse an ffprobe rational frame rate such as `30000/1001`.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => raw.parse().ok(),
    }
}
