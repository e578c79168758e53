use crate::foundation::core::Dimensions;
use crate::foundation::error::{AudiogramError, AudiogramResult};

/// Fixed virtual filesystem names for staged inputs.
pub const IMAGE_NAME: &str = "bg.png";
pub const AUDIO_NAME: &str = "audio.mp3";
pub const CAPTIONS_NAME: &str = "captions.vtt";
pub const FONTS_DIR: &str = "tmp";
pub const DEFAULT_OUTPUT_NAME: &str = "audiogram.mp4";

/// Shape of the ffmpeg command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandVariant {
    /// Looped image + audio with burned-in subtitles, ffmpeg default codecs.
    Classic,
    /// As `Classic`, with explicit H.264/AAC/yuv420p output.
    Encoded,
    /// Waveform of the audio overlaid on the image, then subtitles; H.264/AAC output.
    #[default]
    Waveform,
}

/// `showwaves` drawing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveMode {
    Point,
    Line,
    P2p,
    #[default]
    Cline,
}

impl WaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::P2p => "p2p",
            Self::Cline => "cline",
        }
    }
}

/// Appearance of the waveform band drawn by the `Waveform` variant.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WaveformStyle {
    /// ffmpeg color (`white`, `0xffcc00`, `#ffcc00@0.8`).
    pub color: String,
    /// Band height as a fraction of the image height, in `(0, 1]`.
    pub height_ratio: f32,
    pub mode: WaveMode,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self {
            color: "white".to_string(),
            height_ratio: 0.25,
            mode: WaveMode::Cline,
        }
    }
}

impl WaveformStyle {
    pub fn validate(&self) -> AudiogramResult<()> {
        if !(self.height_ratio > 0.0 && self.height_ratio <= 1.0) {
            return Err(AudiogramError::validation(
                "waveform height_ratio must be in (0, 1]",
            ));
        }
        if self.color.is_empty()
            || !self
                .color
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.'))
        {
            return Err(AudiogramError::validation(format!(
                "waveform color '{}' is not a valid ffmpeg color",
                self.color
            )));
        }
        Ok(())
    }

    /// Size of the waveform band for a frame, both sides even.
    pub fn band_size(&self, frame: Dimensions) -> Dimensions {
        let frame = frame.even_floor();
        let height = (frame.height as f32 * self.height_ratio).floor() as u32;
        Dimensions {
            width: frame.width,
            height,
        }
        .even_floor()
    }
}

/// Everything needed to render the argument vector.
#[derive(Clone, Debug)]
pub struct CommandPlan {
    /// Font file name inside [`FONTS_DIR`].
    pub font_file: String,
    /// Family libass should pick for captions.
    pub font_family: String,
    /// Output file name in the virtual filesystem.
    pub output: String,
    /// Background image size; required by the `Waveform` variant.
    pub frame: Option<Dimensions>,
    pub waveform: WaveformStyle,
}

impl CommandPlan {
    pub fn font_path(&self) -> String {
        format!("{FONTS_DIR}/{}", self.font_file)
    }
}

/// Build the ffmpeg argument vector for `variant`.
pub fn build_args(variant: CommandVariant, plan: &CommandPlan) -> AudiogramResult<Vec<String>> {
    validate_output_name(&plan.output)?;
    let subtitles = subtitles_filter(&plan.font_family);

    let mut args: Vec<String> = ["-loop", "1", "-i", IMAGE_NAME, "-i", AUDIO_NAME]
        .into_iter()
        .map(str::to_string)
        .collect();

    match variant {
        CommandVariant::Classic => {
            args.extend(["-filter_complex".to_string(), subtitles]);
            args.push("-shortest".to_string());
        }
        CommandVariant::Encoded => {
            args.extend([
                "-filter_complex".to_string(),
                format!("{EVEN_SCALE},{subtitles}"),
            ]);
            args.extend(h264_aac_args());
        }
        CommandVariant::Waveform => {
            let frame = plan.frame.ok_or_else(|| {
                AudiogramError::validation("waveform variant requires the background image size")
            })?;
            plan.waveform.validate()?;
            let band = plan.waveform.band_size(frame);
            let graph = format!(
                "[1:a]showwaves=s={band}:mode={mode}:colors={color}:rate=25,format=rgba[wave];\
                 [0:v]{EVEN_SCALE}[bg];\
                 [bg][wave]overlay=(W-w)/2:H-h:shortest=1,{subtitles}[out]",
                mode = plan.waveform.mode.as_str(),
                color = plan.waveform.color,
            );
            args.extend(
                ["-filter_complex", graph.as_str(), "-map", "[out]", "-map", "1:a"]
                    .into_iter()
                    .map(str::to_string),
            );
            args.extend(h264_aac_args());
        }
    }

    args.push(plan.output.clone());
    Ok(args)
}

const EVEN_SCALE: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

fn h264_aac_args() -> impl Iterator<Item = String> {
    [
        "-c:v", "libx264", "-c:a", "aac", "-pix_fmt", "yuv420p", "-shortest",
    ]
    .into_iter()
    .map(str::to_string)
}

fn subtitles_filter(font_family: &str) -> String {
    format!(
        "subtitles={CAPTIONS_NAME}:fontsdir={FONTS_DIR}:force_style='Fontname={}'",
        sanitize_family(font_family)
    )
}

/// Drop characters that would terminate the quoted style value or the filter graph.
fn sanitize_family(family: &str) -> String {
    let cleaned: String = family
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\' | ':' | ',' | ';' | '[' | ']' | '='))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "sans-serif".to_string()
    } else {
        cleaned.to_string()
    }
}

pub(crate) fn validate_output_name(name: &str) -> AudiogramResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('-') {
        return Err(AudiogramError::validation(format!(
            "output name '{name}' must be a plain file name"
        )));
    }
    if !name.to_ascii_lowercase().ends_with(".mp4") {
        return Err(AudiogramError::validation(format!(
            "output name '{name}' must end with .mp4"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> CommandPlan {
        CommandPlan {
            font_file: "caption.ttf".to_string(),
            font_family: "Source Sans Pro".to_string(),
            output: DEFAULT_OUTPUT_NAME.to_string(),
            frame: Some(Dimensions {
                width: 1080,
                height: 1080,
            }),
            waveform: WaveformStyle::default(),
        }
    }

    #[test]
    fn classic_matches_reference_shape() {
        let args = build_args(CommandVariant::Classic, &plan()).unwrap();
        assert_eq!(
            args,
            vec![
                "-loop",
                "1",
                "-i",
                "bg.png",
                "-i",
                "audio.mp3",
                "-filter_complex",
                "subtitles=captions.vtt:fontsdir=tmp:force_style='Fontname=Source Sans Pro'",
                "-shortest",
                "audiogram.mp4",
            ]
        );
    }

    #[test]
    fn encoded_adds_codecs_and_pixel_format() {
        let args = build_args(CommandVariant::Encoded, &plan()).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -c:a aac -pix_fmt yuv420p -shortest audiogram.mp4"));
        assert!(args[7].starts_with("scale=trunc(iw/2)*2:trunc(ih/2)*2,subtitles="));
    }

    #[test]
    fn waveform_maps_filter_output_and_audio() {
        let args = build_args(CommandVariant::Waveform, &plan()).unwrap();
        let graph = &args[7];
        assert!(graph.starts_with("[1:a]showwaves=s=1080x270:mode=cline:colors=white"));
        assert!(graph.ends_with("force_style='Fontname=Source Sans Pro'[out]"));
        let tail: Vec<&str> = args[8..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "-map", "[out]", "-map", "1:a", "-c:v", "libx264", "-c:a", "aac", "-pix_fmt",
                "yuv420p", "-shortest", "audiogram.mp4",
            ]
        );
    }

    #[test]
    fn waveform_requires_frame_size() {
        let mut p = plan();
        p.frame = None;
        assert!(build_args(CommandVariant::Waveform, &p).is_err());
        assert!(build_args(CommandVariant::Classic, &p).is_ok());
    }

    #[test]
    fn band_size_is_even() {
        let style = WaveformStyle {
            height_ratio: 0.3,
            ..WaveformStyle::default()
        };
        let band = style.band_size(Dimensions {
            width: 1281,
            height: 721,
        });
        assert_eq!(
            band,
            Dimensions {
                width: 1280,
                height: 216
            }
        );
    }

    #[test]
    fn family_is_sanitized() {
        assert_eq!(sanitize_family("Evil', x=1"), "Evil x1");
        assert_eq!(sanitize_family("::"), "sans-serif");
    }

    #[test]
    fn output_and_style_validation() {
        assert!(validate_output_name("out.MP4").is_ok());
        assert!(validate_output_name("dir/out.mp4").is_err());
        assert!(validate_output_name("-y.mp4").is_err());
        assert!(validate_output_name("out.mov").is_err());

        let bad = WaveformStyle {
            color: "white;drop".to_string(),
            ..WaveformStyle::default()
        };
        assert!(bad.validate().is_err());
        let bad = WaveformStyle {
            height_ratio: 0.0,
            ..WaveformStyle::default()
        };
        assert!(bad.validate().is_err());
    }
}
