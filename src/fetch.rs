use std::fmt;
use std::path::{Path, PathBuf};

use crate::foundation::error::{AudiogramError, AudiogramResult};

/// Where the bytes of an input file come from.
#[derive(Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// A file picked in-process, already held in memory.
    Bytes { name: String, data: Vec<u8> },
}

impl MediaSource {
    /// Classify an attribute value as a media source.
    ///
    /// Accepts plain paths and `file://` URLs. Remote URLs are served by the media library and
    /// are rejected here.
    pub fn parse(value: &str) -> AudiogramResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AudiogramError::validation("media source must be non-empty"));
        }
        if let Some(rest) = value.strip_prefix("file://") {
            let path = rest.strip_prefix("localhost").unwrap_or(rest);
            if path.is_empty() {
                return Err(AudiogramError::validation(format!(
                    "file URL '{value}' has no path"
                )));
            }
            return Ok(Self::Path(PathBuf::from(percent_decode(path))));
        }
        if value.starts_with("http://") || value.starts_with("https://") {
            return Err(AudiogramError::validation(format!(
                "remote source '{value}' is not supported; download it into the media library first"
            )));
        }
        if value.starts_with("blob:") || value.starts_with("data:") {
            return Err(AudiogramError::validation(format!(
                "in-browser source '{}' cannot be read outside the editor",
                value.split(':').next().unwrap_or(value)
            )));
        }
        Ok(Self::Path(PathBuf::from(value)))
    }

    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data,
        }
    }

    /// File name used when the source is uploaded or staged.
    pub fn file_name(&self) -> String {
        match self {
            Self::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Bytes { .. } => None,
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Bytes { name, data } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("data", &format_args!("<{} bytes>", data.len()))
                .finish(),
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Bytes { name, .. } => write!(f, "{name}"),
        }
    }
}

/// Read all bytes of `source`.
pub fn fetch_file(source: &MediaSource) -> AudiogramResult<Vec<u8>> {
    let data = match source {
        MediaSource::Path(p) => std::fs::read(p).map_err(|e| {
            AudiogramError::validation(format!("read media source '{}': {e}", p.display()))
        })?,
        MediaSource::Bytes { data, .. } => data.clone(),
    };
    tracing::debug!("{source} file size = {} bytes", data.len());
    Ok(data)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2]))
        {
            out.push(h * 16 + l);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_paths_and_file_urls() {
        assert_eq!(
            MediaSource::parse("media/audio.mp3").unwrap(),
            MediaSource::Path(PathBuf::from("media/audio.mp3"))
        );
        assert_eq!(
            MediaSource::parse("file:///srv/media/my%20clip.mp3").unwrap(),
            MediaSource::Path(PathBuf::from("/srv/media/my clip.mp3"))
        );
        assert_eq!(
            MediaSource::parse("file://localhost/a.png").unwrap(),
            MediaSource::Path(PathBuf::from("/a.png"))
        );
    }

    #[test]
    fn parse_rejects_remote_and_browser_sources() {
        assert!(MediaSource::parse("https://example.com/a.mp3").is_err());
        assert!(MediaSource::parse("blob:https://example.com/1234").is_err());
        assert!(MediaSource::parse("  ").is_err());
    }

    #[test]
    fn fetch_reads_paths_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("captions.vtt");
        std::fs::write(&p, b"WEBVTT\n").unwrap();
        assert_eq!(
            fetch_file(&MediaSource::Path(p.clone())).unwrap(),
            b"WEBVTT\n".to_vec()
        );
        assert_eq!(MediaSource::Path(p).file_name(), "captions.vtt");

        let picked = MediaSource::bytes("subs.vtt", vec![1, 2]);
        assert_eq!(fetch_file(&picked).unwrap(), vec![1, 2]);
        assert!(format!("{picked:?}").contains("<2 bytes>"));
    }

    #[test]
    fn fetch_missing_path_is_validation_error() {
        let err = fetch_file(&MediaSource::Path(PathBuf::from("/nonexistent/x.mp3"))).unwrap_err();
        assert!(matches!(err, AudiogramError::Validation(_)));
    }

    #[test]
    fn percent_decode_leaves_invalid_escapes() {
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("a%zz"), "a%zz");
        assert_eq!(percent_decode("%41b"), "Ab");
    }
}
