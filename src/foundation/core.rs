use std::fmt;
use std::path::Path;

use crate::foundation::error::{AudiogramError, AudiogramResult};

/// MIME type of every audiogram produced by the transcoder.
pub const VIDEO_MP4: &str = "video/mp4";

/// Pixel dimensions of an image or video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create validated, non-zero dimensions.
    pub fn new(width: u32, height: u32) -> AudiogramResult<Self> {
        if width == 0 || height == 0 {
            return Err(AudiogramError::validation(
                "image width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Round both sides down to the nearest even value (minimum 2).
    ///
    /// libx264 with yuv420p output rejects odd frame sizes.
    pub fn even_floor(self) -> Self {
        fn even(v: u32) -> u32 {
            (v - v % 2).max(2)
        }
        Self {
            width: even(self.width),
            height: even(self.height),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Transcode output held in memory until it is handed to a media library.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoBlob {
    /// MIME type, always [`VIDEO_MP4`] for transcoder output.
    pub mime: String,
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
}

impl VideoBlob {
    pub fn mp4(bytes: Vec<u8>) -> Self {
        Self {
            mime: VIDEO_MP4.to_string(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for VideoBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoBlob")
            .field("mime", &self.mime)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> AudiogramResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_reject_zero() {
        assert!(Dimensions::new(0, 10).is_err());
        assert!(Dimensions::new(10, 0).is_err());
        assert_eq!(Dimensions::new(3, 4).unwrap().to_string(), "3x4");
    }

    #[test]
    fn even_floor_rounds_down_and_keeps_minimum() {
        let d = Dimensions {
            width: 1081,
            height: 1,
        };
        assert_eq!(
            d.even_floor(),
            Dimensions {
                width: 1080,
                height: 2
            }
        );
    }

    #[test]
    fn blob_debug_hides_payload() {
        let blob = VideoBlob::mp4(vec![0u8; 16]);
        let dbg = format!("{blob:?}");
        assert!(dbg.contains("<16 bytes>"));
        assert_eq!(blob.mime, VIDEO_MP4);
        assert_eq!(blob.len(), 16);
    }
}
