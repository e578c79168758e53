//! Audiogram generator.
//!
//! Composites an audio track, a static background image and a WebVTT caption track into an MP4
//! through the system `ffmpeg`, and hands the result to a media library. The block-editor
//! surface (attributes, saved markup, registration metadata and headers) is modelled alongside.

#![forbid(unsafe_code)]

pub mod block;
pub mod captions;
pub mod config;
pub mod editor;
pub mod engine;
pub mod fetch;
pub mod font;
pub mod media;
pub mod transcode;

mod foundation;

pub use block::{BlockAttributes, HeaderPolicy};
pub use config::AudiogramConfig;
pub use editor::EditorSession;
pub use engine::Engine;
pub use engine::executor::{Executor, ExitReport, FfmpegExecutor, LogKind, LogLine};
pub use engine::fs::MemFs;
pub use engine::progress::{Progress, ProgressParser};
pub use fetch::{MediaSource, fetch_file};
pub use foundation::core::{Dimensions, VIDEO_MP4, VideoBlob, ensure_parent_dir};
pub use foundation::error::{AudiogramError, AudiogramResult};
pub use media::{DirectoryLibrary, MediaItem, MediaKind, MediaUploader, UploadRequest};
pub use transcode::{CommandVariant, TranscodeOpts, TranscodeRequest, Transcoder};

/// Whether an `ffmpeg` binary can be spawned from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
