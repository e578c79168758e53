//! Media items and the upload round-trip.

/// Directory-backed media library.
pub mod library;

use std::io::Cursor;

use crate::foundation::core::Dimensions;
use crate::foundation::error::{AudiogramError, AudiogramResult};

pub use library::DirectoryLibrary;

/// Coarse media type used for upload allow-lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Image,
    Video,
    Text,
}

impl MediaKind {
    /// Infer the kind from a MIME type such as `audio/mpeg`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()? {
            "audio" => Some(Self::Audio),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
            Self::Text => "text",
        }
    }
}

/// Guess a MIME type from a file name's extension.
pub fn mime_from_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "vtt" => "text/vtt",
        "srt" => "text/plain",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// A persisted media-library entry.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub url: String,
    pub mime: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaItem {
    pub fn dimensions(&self) -> Option<Dimensions> {
        Some(Dimensions {
            width: self.width?,
            height: self.height?,
        })
    }
}

/// File handed to a [`MediaUploader`].
#[derive(Clone, Debug)]
pub struct UploadRequest<'a> {
    pub name: &'a str,
    /// Explicit MIME type; inferred from `name` when absent.
    pub mime: Option<&'a str>,
    pub bytes: &'a [u8],
    pub allowed_kinds: &'a [MediaKind],
}

impl UploadRequest<'_> {
    /// Resolve the MIME type and check it against the allow-list.
    pub fn checked_mime(&self) -> AudiogramResult<(String, MediaKind)> {
        let mime = self
            .mime
            .or_else(|| mime_from_name(self.name))
            .ok_or_else(|| {
                AudiogramError::upload(format!("cannot determine media type of '{}'", self.name))
            })?;
        let kind = MediaKind::from_mime(mime).ok_or_else(|| {
            AudiogramError::upload(format!("unsupported media type '{mime}'"))
        })?;
        if !self.allowed_kinds.is_empty() && !self.allowed_kinds.contains(&kind) {
            return Err(AudiogramError::upload(format!(
                "Sorry, this file type is not permitted: '{}' is {} media",
                self.name,
                kind.as_str()
            )));
        }
        Ok((mime.to_string(), kind))
    }
}

/// Persists files and hands back their library URL/id.
pub trait MediaUploader {
    fn upload(&self, request: UploadRequest<'_>) -> AudiogramResult<MediaItem>;
}

/// Read the pixel size of an encoded image without decoding it fully.
pub fn probe_image_dimensions(bytes: &[u8]) -> AudiogramResult<Dimensions> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AudiogramError::validation(format!("read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| AudiogramError::validation(format!("unsupported background image: {e}")))?;
    Dimensions::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_mime_prefix() {
        assert_eq!(MediaKind::from_mime("audio/mpeg"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_mime("text/vtt"), Some(MediaKind::Text));
        assert_eq!(MediaKind::from_mime("application/json"), None);
        assert_eq!(mime_from_name("Episode.MP3"), Some("audio/mpeg"));
        assert_eq!(mime_from_name("noext"), None);
    }

    #[test]
    fn upload_request_enforces_allow_list() {
        let req = UploadRequest {
            name: "clip.mp4",
            mime: None,
            bytes: &[],
            allowed_kinds: &[MediaKind::Audio],
        };
        let err = req.checked_mime().unwrap_err();
        assert!(err.to_string().contains("not permitted"));

        let req = UploadRequest {
            allowed_kinds: &[MediaKind::Video],
            ..req
        };
        assert_eq!(
            req.checked_mime().unwrap(),
            ("video/mp4".to_string(), MediaKind::Video)
        );
    }

    #[test]
    fn probe_reads_png_header() {
        let img = image::RgbaImage::new(6, 4);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        let dims = probe_image_dimensions(buf.get_ref()).unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 6,
                height: 4
            }
        );
        assert!(probe_image_dimensions(b"not an image").is_err());
    }
}
