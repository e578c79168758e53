//! Audiogram transcoding: stage inputs in the engine, run one command, read back the MP4.
//!
//! Staging, the run and cleanup happen under one engine run guard, so a second transcode on
//! the same engine fails with `Busy` instead of clobbering the staged inputs.

/// ffmpeg argument vectors.
pub mod args;

use std::sync::Arc;

use crate::block::BlockAttributes;
use crate::captions::parse_vtt;
use crate::engine::Engine;
use crate::fetch::{MediaSource, fetch_file};
use crate::font::resolve_font_family;
use crate::foundation::core::VideoBlob;
use crate::foundation::error::{AudiogramError, AudiogramResult};
use crate::media::probe_image_dimensions;

pub use args::{
    AUDIO_NAME, CAPTIONS_NAME, CommandPlan, CommandVariant, DEFAULT_OUTPUT_NAME, FONTS_DIR,
    IMAGE_NAME, WaveMode, WaveformStyle, build_args,
};

/// The four inputs of one transcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub audio: MediaSource,
    pub image: MediaSource,
    pub captions: MediaSource,
    pub font: MediaSource,
}

impl TranscodeRequest {
    /// Build a request from block attributes, checking that every input is present.
    ///
    /// A caption file picked in-process wins over `captionsSrc`.
    pub fn from_attributes(attrs: &BlockAttributes) -> AudiogramResult<Self> {
        let required = |value: &Option<String>, what: &str| -> AudiogramResult<MediaSource> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => MediaSource::parse(v),
                _ => Err(AudiogramError::validation(format!(
                    "{what} is required to create an audiogram"
                ))),
            }
        };

        let audio = required(&attrs.src, "audio")?;
        let image = required(&attrs.image_src, "background image")?;
        let captions = match &attrs.captions_file {
            Some(file) => file.clone(),
            None => required(&attrs.captions_src, "captions")?,
        };
        let font = required(&attrs.font_src, "caption font")?;
        Ok(Self {
            audio,
            image,
            captions,
            font,
        })
    }
}

/// Options applied to every transcode.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeOpts {
    pub variant: CommandVariant,
    /// Output file name in the virtual filesystem.
    pub output_name: String,
    pub waveform: WaveformStyle,
    /// Caption font family; read from the font file when `None`.
    pub font_family: Option<String>,
}

impl Default for TranscodeOpts {
    fn default() -> Self {
        Self {
            variant: CommandVariant::default(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            waveform: WaveformStyle::default(),
            font_family: None,
        }
    }
}

/// Drives one engine through the audiogram command.
#[derive(Debug, Clone)]
pub struct Transcoder {
    engine: Arc<Engine>,
    opts: TranscodeOpts,
}

impl Transcoder {
    pub fn new(engine: Arc<Engine>, opts: TranscodeOpts) -> Self {
        Self { engine, opts }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn opts(&self) -> &TranscodeOpts {
        &self.opts
    }

    /// Composite audio, background image and captions into an MP4.
    #[tracing::instrument(skip_all, fields(variant = ?self.opts.variant, audio = %req.audio))]
    pub fn transcode(&self, req: &TranscodeRequest) -> AudiogramResult<VideoBlob> {
        args::validate_output_name(&self.opts.output_name)?;
        if self.engine.is_running() {
            return Err(AudiogramError::Busy);
        }

        let audio = fetch_file(&req.audio)?;
        let image = fetch_file(&req.image)?;
        let captions = fetch_file(&req.captions)?;
        let font = fetch_file(&req.font)?;

        let text = std::str::from_utf8(&captions)
            .map_err(|_| AudiogramError::validation("captions must be UTF-8 text"))?;
        let cues = parse_vtt(text)?;
        let frame = probe_image_dimensions(&image)?;
        let font_family = match &self.opts.font_family {
            Some(family) => family.clone(),
            None => resolve_font_family(&font)?,
        };
        tracing::debug!(
            "{} caption cue(s), background {frame}, font '{font_family}'",
            cues.len()
        );

        match self.engine.load() {
            Ok(()) | Err(AudiogramError::AlreadyLoaded) => {}
            Err(e) => return Err(e),
        }

        let plan = CommandPlan {
            font_file: font_file_name(&req.font),
            font_family,
            output: self.opts.output_name.clone(),
            frame: Some(frame),
            waveform: self.opts.waveform.clone(),
        };
        let args = build_args(self.opts.variant, &plan)?;
        let files = vec![
            (IMAGE_NAME.to_string(), image),
            (AUDIO_NAME.to_string(), audio),
            (CAPTIONS_NAME.to_string(), captions),
            (plan.font_path(), font),
        ];
        let bytes = self.engine.run_staged(files, &args, &plan.output)?;
        if bytes.is_empty() {
            return Err(AudiogramError::engine(format!(
                "ffmpeg produced an empty '{}'",
                plan.output
            )));
        }

        tracing::info!("audiogram created ({} bytes)", bytes.len());
        Ok(VideoBlob::mp4(bytes))
    }
}

/// Name under which the font is staged; libass needs a recognizable extension.
fn font_file_name(font: &MediaSource) -> String {
    let name = font.file_name();
    let name = name.rsplit(['/', '\\']).next().unwrap_or(&name);
    let has_font_ext = name.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty()
            && matches!(
                ext.to_ascii_lowercase().as_str(),
                "ttf" | "otf" | "ttc" | "woff" | "woff2"
            )
    });
    if has_font_ext {
        name.to_string()
    } else {
        format!("{}.ttf", if name.is_empty() { "caption" } else { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> BlockAttributes {
        BlockAttributes {
            src: Some("media/a.mp3".to_string()),
            image_src: Some("media/bg.png".to_string()),
            captions_src: Some("media/c.vtt".to_string()),
            font_src: Some("fonts/abel.ttf".to_string()),
            ..BlockAttributes::default()
        }
    }

    #[test]
    fn request_requires_font() {
        let mut a = attrs();
        a.font_src = None;
        let err = TranscodeRequest::from_attributes(&a).unwrap_err();
        assert!(err.to_string().contains("caption font is required"));

        a.font_src = Some("  ".to_string());
        assert!(TranscodeRequest::from_attributes(&a).is_err());
    }

    #[test]
    fn request_prefers_picked_caption_file() {
        let mut a = attrs();
        let picked = MediaSource::bytes("picked.vtt", b"WEBVTT\n".to_vec());
        a.captions_file = Some(picked.clone());
        let req = TranscodeRequest::from_attributes(&a).unwrap();
        assert_eq!(req.captions, picked);
        assert_eq!(req.font.file_name(), "abel.ttf");
    }

    #[test]
    fn request_rejects_remote_audio() {
        let mut a = attrs();
        a.src = Some("https://cdn.example/a.mp3".to_string());
        assert!(matches!(
            TranscodeRequest::from_attributes(&a),
            Err(AudiogramError::Validation(_))
        ));
    }

    #[test]
    fn font_names_keep_or_gain_extension() {
        assert_eq!(
            font_file_name(&MediaSource::Path("x/Abel.TTF".into())),
            "Abel.TTF"
        );
        assert_eq!(
            font_file_name(&MediaSource::bytes("blob", Vec::new())),
            "blob.ttf"
        );
        assert_eq!(
            font_file_name(&MediaSource::bytes(".ttf", Vec::new())),
            ".ttf.ttf"
        );
    }
}
