use crate::fetch::MediaSource;
use crate::foundation::core::VideoBlob;
use crate::media::MediaItem;

/// Persisted attributes of one audiogram block.
///
/// Field names follow the block's JSON attribute schema; the transcode output and a caption file
/// picked in-process are transient and never serialized.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "media_id::deserialize"
    )]
    pub id: Option<String>,

    #[serde(
        rename = "imageID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "media_id::deserialize"
    )]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,

    #[serde(
        rename = "captionsID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "media_id::deserialize"
    )]
    pub captions_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions_src: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_src: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiogram_url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "media_id::deserialize"
    )]
    pub audiogram_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_location: Option<String>,

    /// Raw transcode output awaiting upload.
    #[serde(skip)]
    pub audiogram_src: Option<VideoBlob>,
    /// Caption file picked in-process; takes precedence over `captions_src`.
    #[serde(skip)]
    pub captions_file: Option<MediaSource>,
}

impl BlockAttributes {
    /// Set or clear the audio track. Any change drops the previous audiogram.
    pub fn select_audio(&mut self, media: Option<&MediaItem>) {
        let next = media.filter(|m| !m.url.is_empty());
        let (src, id) = match next {
            Some(m) => (Some(m.url.clone()), Some(m.id.clone())),
            None => (None, None),
        };
        if src != self.src || id != self.id {
            self.clear_audiogram();
        }
        self.src = src;
        self.id = id;
    }

    /// Point the audio at a URL typed by the user; clears the library id when it changes.
    pub fn select_audio_url(&mut self, url: &str) {
        if self.src.as_deref() != Some(url) {
            self.src = Some(url.to_string());
            self.id = None;
            self.clear_audiogram();
        }
    }

    pub fn update_image(&mut self, media: &MediaItem) {
        self.image_id = Some(media.id.clone());
        self.image_src = Some(media.url.clone());
        self.image_width = media.width;
        self.image_height = media.height;
    }

    pub fn update_captions(&mut self, media: &MediaItem) {
        self.captions_id = Some(media.id.clone());
        self.captions_src = Some(media.url.clone());
        self.captions_file = None;
    }

    /// Use a caption file picked in-process, rendered with the font at `font_src`.
    ///
    /// `captionsSrc` keeps the path of an on-disk pick; in-memory bytes have no location to
    /// persist, so it is cleared for them.
    pub fn select_caption_file(&mut self, source: MediaSource, font_src: &str) {
        self.captions_src = source.as_path().map(|p| p.display().to_string());
        self.captions_id = None;
        self.captions_file = Some(source);
        self.font_src = Some(font_src.to_string());
    }

    /// Store a fresh transcode result, replacing any earlier one.
    pub fn set_audiogram_blob(&mut self, blob: VideoBlob) {
        self.audiogram_url = None;
        self.audiogram_id = None;
        self.audiogram_src = Some(blob);
    }

    pub fn set_uploaded_audiogram(&mut self, id: impl Into<String>, url: impl Into<String>) {
        self.audiogram_id = Some(id.into());
        self.audiogram_url = Some(url.into());
    }

    pub fn clear_uploaded_audiogram(&mut self) {
        self.audiogram_id = None;
        self.audiogram_url = None;
    }

    pub fn has_result(&self) -> bool {
        self.audiogram_url.is_some() && self.audiogram_id.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.src.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image_src.as_deref().is_some_and(|s| !s.is_empty())
    }

    fn clear_audiogram(&mut self) {
        self.audiogram_src = None;
        self.clear_uploaded_audiogram();
    }
}

/// Media ids are numbers in saved posts and strings elsewhere; accept both.
mod media_id {
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D>(de: D) -> Result<Option<String>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<Raw>::deserialize(de)? {
            Some(Raw::Number(n)) => Some(n.to_string()),
            Some(Raw::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        })
    }
}
