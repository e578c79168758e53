//! JSON configuration for the transcoder, the editor and the plugin surface.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::block::HeaderPolicy;
use crate::foundation::error::{AudiogramError, AudiogramResult};
use crate::transcode::args::validate_output_name;
use crate::transcode::{CommandVariant, DEFAULT_OUTPUT_NAME, TranscodeOpts, WaveformStyle};

/// Caption font settings.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Local font file used by the CLI when no font is given.
    pub path: Option<PathBuf>,
    /// Value stored in `fontSrc` when a caption file is picked.
    pub url: Option<String>,
    /// Family override; read from the font file when unset.
    pub family: Option<String>,
}

/// Values injected into the editor page.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub text_domain: String,
    pub plugin_url: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            text_domain: "generate-audiogram-block".to_string(),
            plugin_url: "/wp-content/plugins/generate-audiogram-block".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AudiogramConfig {
    pub ffmpeg_path: PathBuf,
    pub variant: CommandVariant,
    pub output_name: String,
    pub font: FontConfig,
    pub waveform: WaveformStyle,
    pub validate_image_size: bool,
    pub header_policy: HeaderPolicy,
    pub plugin: PluginConfig,
}

impl Default for AudiogramConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            variant: CommandVariant::default(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            font: FontConfig::default(),
            waveform: WaveformStyle::default(),
            validate_image_size: false,
            header_policy: HeaderPolicy::default(),
            plugin: PluginConfig::default(),
        }
    }
}

impl AudiogramConfig {
    pub fn from_path(path: &Path) -> AudiogramResult<Self> {
        use anyhow::Context as _;

        let file = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        Self::from_reader(file).map_err(|e| match e {
            AudiogramError::Validation(msg) => {
                AudiogramError::validation(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_reader(mut reader: impl Read) -> AudiogramResult<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| AudiogramError::validation(format!("read config: {e}")))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| AudiogramError::validation(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AudiogramResult<()> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(AudiogramError::validation("ffmpeg_path must be non-empty"));
        }
        validate_output_name(&self.output_name)?;
        self.waveform.validate()?;
        Ok(())
    }

    /// Font URL stored in `fontSrc` for picked caption files.
    pub fn font_url(&self) -> String {
        match &self.font.url {
            Some(url) => url.clone(),
            None => format!(
                "{}/{}",
                self.plugin.plugin_url.trim_end_matches('/'),
                crate::block::registration::DEFAULT_FONT_ASSET
            ),
        }
    }

    pub fn transcode_opts(&self) -> TranscodeOpts {
        TranscodeOpts {
            variant: self.variant,
            output_name: self.output_name.clone(),
            waveform: self.waveform.clone(),
            font_family: self.font.family.clone(),
        }
    }
}
