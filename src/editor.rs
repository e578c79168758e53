//! Edit session of one audiogram block.
//!
//! Holds the block attributes together with the transient editor state (status message,
//! processing flag, notices) and runs the create action against a [`Transcoder`] and a
//! [`MediaUploader`].

use crate::block::BlockAttributes;
use crate::block::image_size;
use crate::fetch::{MediaSource, fetch_file};
use crate::foundation::error::{AudiogramError, AudiogramResult};
use crate::media::{MediaItem, MediaKind, MediaUploader, UploadRequest};
use crate::transcode::{TranscodeRequest, Transcoder};

pub const MSG_IDLE: &str = "Click Start to transcode";
pub const MSG_LOADING: &str = "Loading ffmpeg-core";
pub const MSG_TRANSCODING: &str = "Start transcoding";
pub const MSG_COMPLETE: &str = "Complete transcoding";

/// Error notice shown above the block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

/// Notices shown above the block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notices {
    list: Vec<Notice>,
}

impl Notices {
    pub fn create_error_notice(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("editor notice: {message}");
        self.list.push(Notice { message });
    }

    pub fn remove_all_notices(&mut self) {
        self.list.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.list.iter()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.list.last()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    pub attributes: BlockAttributes,
    message: String,
    processing: bool,
    notices: Notices,
    image_size_message: Option<String>,
    validate_image_size: bool,
}

impl EditorSession {
    pub fn new(attributes: BlockAttributes) -> Self {
        Self {
            attributes,
            message: MSG_IDLE.to_string(),
            processing: false,
            notices: Notices::default(),
            image_size_message: None,
            validate_image_size: false,
        }
    }

    /// Reject background images outside the allowed social-video sizes.
    pub fn with_image_size_validation(mut self, enabled: bool) -> Self {
        self.validate_image_size = enabled;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn image_size_message(&self) -> Option<&str> {
        self.image_size_message.as_deref()
    }

    pub fn on_select_audio(&mut self, media: Option<&MediaItem>) {
        self.attributes.select_audio(media);
    }

    pub fn on_select_url(&mut self, url: &str) {
        self.attributes.select_audio_url(url);
    }

    /// Apply a newly chosen background image. Returns whether it was accepted.
    pub fn on_update_image(&mut self, media: &MediaItem) -> bool {
        if self.validate_image_size {
            let checked = match media.dimensions() {
                Some(d) => image_size::validate(d.width, d.height).map(|_| ()),
                None => Err(AudiogramError::validation(
                    "Background image dimensions are unknown",
                )),
            };
            if let Err(e) = checked {
                let msg = match e {
                    AudiogramError::Validation(msg) => msg,
                    other => other.to_string(),
                };
                self.notices.create_error_notice(msg.clone());
                self.image_size_message = Some(msg);
                return false;
            }
        }
        self.image_size_message = None;
        self.attributes.update_image(media);
        true
    }

    pub fn on_update_captions(&mut self, media: &MediaItem) {
        self.attributes.update_captions(media);
    }

    pub fn on_select_caption_file(&mut self, source: MediaSource, font_src: &str) {
        self.attributes.select_caption_file(source, font_src);
    }

    pub fn on_upload_error(&mut self, message: impl Into<String>) {
        self.notices.remove_all_notices();
        self.notices.create_error_notice(message);
    }

    /// Upload an audio file that was set by path but is not yet in the media library.
    ///
    /// Returns `Ok(true)` when an upload happened. On failure the audio attributes are cleared.
    pub fn persist_pending_audio(&mut self, uploader: &dyn MediaUploader) -> AudiogramResult<bool> {
        if self.attributes.id.is_some() {
            return Ok(false);
        }
        let Some(src) = self.attributes.src.clone().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };

        let uploaded = MediaSource::parse(&src).and_then(|source| {
            let bytes = fetch_file(&source)?;
            uploader.upload(UploadRequest {
                name: &source.file_name(),
                mime: None,
                bytes: &bytes,
                allowed_kinds: &[MediaKind::Audio],
            })
        });
        match uploaded {
            Ok(item) => {
                self.attributes.src = Some(item.url);
                self.attributes.id = Some(item.id);
                Ok(true)
            }
            Err(e) => {
                self.attributes.src = None;
                self.attributes.id = None;
                self.notices.create_error_notice(e.to_string());
                Err(e)
            }
        }
    }

    pub fn can_create(&self) -> bool {
        self.attributes.has_audio() && self.attributes.has_image() && !self.processing
    }

    /// Transcode the current inputs and upload the result as a video.
    ///
    /// Failures become an error notice and are returned; `processing` is always reset.
    pub fn create_audiogram(
        &mut self,
        transcoder: &Transcoder,
        uploader: &dyn MediaUploader,
    ) -> AudiogramResult<MediaItem> {
        if self.processing {
            return Err(AudiogramError::Busy);
        }
        self.processing = true;
        let result = self.create_inner(transcoder, uploader);
        self.processing = false;
        if let Err(e) = &result {
            self.notices.create_error_notice(e.to_string());
        }
        result
    }

    fn create_inner(
        &mut self,
        transcoder: &Transcoder,
        uploader: &dyn MediaUploader,
    ) -> AudiogramResult<MediaItem> {
        let request = TranscodeRequest::from_attributes(&self.attributes)?;

        self.message = MSG_LOADING.to_string();
        let engine = transcoder.engine();
        if !engine.is_loaded() {
            match engine.load() {
                Ok(()) | Err(AudiogramError::AlreadyLoaded) => {}
                Err(e) => return Err(e),
            }
        }
        self.message = MSG_TRANSCODING.to_string();
        let blob = transcoder.transcode(&request)?;
        self.message = MSG_COMPLETE.to_string();

        let bytes = blob.bytes.clone();
        self.attributes.set_audiogram_blob(blob);

        let name = transcoder.opts().output_name.clone();
        let uploaded = uploader.upload(UploadRequest {
            name: &name,
            mime: Some(crate::foundation::core::VIDEO_MP4),
            bytes: &bytes,
            allowed_kinds: &[MediaKind::Video],
        });
        match uploaded {
            Ok(item) => {
                self.attributes.set_uploaded_audiogram(item.id.clone(), item.url.clone());
                Ok(item)
            }
            Err(e) => {
                self.attributes.audiogram_url = None;
                Err(e)
            }
        }
    }
}
