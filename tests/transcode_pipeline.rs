use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use audiogram::transcode::{CommandVariant, TranscodeOpts, WaveformStyle};
use audiogram::{Engine, FfmpegExecutor, MediaSource, TranscodeRequest, Transcoder};

fn ffmpeg_with_subtitles() -> bool {
    if !audiogram::is_ffmpeg_on_path() {
        return false;
    }
    Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .any(|l| l.split_whitespace().nth(1) == Some("subtitles"))
        })
        .unwrap_or(false)
}

fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.is_file())
}

fn synth_inputs(root: &Path, width: u32, height: u32) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:sample_rate=44100",
            "-t",
            "1",
            "-f",
            "wav",
        ])
        .arg(root.join("tone.wav"))
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating tone.wav");

    image::RgbaImage::from_pixel(width, height, image::Rgba([30, 30, 60, 255]))
        .save(root.join("bg.png"))?;
    std::fs::write(
        root.join("captions.vtt"),
        "WEBVTT\n\n00:00.000 --> 00:00.800\nHello from the audiogram\n",
    )?;
    Ok(())
}

fn request(root: &Path, font: PathBuf) -> TranscodeRequest {
    TranscodeRequest {
        audio: MediaSource::Path(root.join("tone.wav")),
        image: MediaSource::Path(root.join("bg.png")),
        captions: MediaSource::Path(root.join("captions.vtt")),
        font: MediaSource::Path(font),
    }
}

fn probe_duration(path: &Path) -> Option<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

fn render(variant: CommandVariant, width: u32, height: u32) {
    if !ffmpeg_with_subtitles() {
        eprintln!("skipping: ffmpeg with the subtitles filter is not available");
        return;
    }
    let Some(font) = system_font() else {
        eprintln!("skipping: no system TrueType font found");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    synth_inputs(dir.path(), width, height).unwrap();

    let engine = Arc::new(Engine::new(FfmpegExecutor::default()));
    let ratios = Arc::new(Mutex::new(Vec::new()));
    let sink = ratios.clone();
    engine.set_progress(move |p| sink.lock().unwrap().push(p.ratio));

    let transcoder = Transcoder::new(
        engine.clone(),
        TranscodeOpts {
            variant,
            waveform: WaveformStyle {
                color: "0xffcc00".to_string(),
                ..WaveformStyle::default()
            },
            ..TranscodeOpts::default()
        },
    );
    let blob = transcoder.transcode(&request(dir.path(), font)).unwrap();
    assert_eq!(blob.mime, "video/mp4");
    assert!(blob.len() > 1000);
    assert_eq!(&blob.bytes[4..8], b"ftyp");

    let out = dir.path().join("out.mp4");
    std::fs::write(&out, &blob.bytes).unwrap();
    if let Some(secs) = probe_duration(&out) {
        assert!(secs > 0.5 && secs < 2.0, "unexpected duration {secs}");
    }

    let ratios = ratios.lock().unwrap();
    assert!(ratios.iter().any(|r| (*r - 1.0).abs() < 1e-9));
    assert!(engine.fs().unwrap().is_empty());
}

#[test]
fn waveform_variant_renders_mp4() {
    render(CommandVariant::Waveform, 320, 240);
}

#[test]
fn encoded_variant_handles_odd_image_sizes() {
    render(CommandVariant::Encoded, 321, 241);
}

#[test]
fn ffmpeg_failure_surfaces_stderr() {
    if !audiogram::is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let Some(font) = system_font() else {
        eprintln!("skipping: no system TrueType font found");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    synth_inputs(dir.path(), 64, 64).unwrap();
    std::fs::write(dir.path().join("tone.wav"), b"not audio at all").unwrap();

    let engine = Arc::new(Engine::new(FfmpegExecutor::default()));
    let transcoder = Transcoder::new(
        engine.clone(),
        TranscodeOpts {
            variant: CommandVariant::Classic,
            font_family: Some("DejaVu Sans".to_string()),
            ..TranscodeOpts::default()
        },
    );
    let err = transcoder
        .transcode(&request(dir.path(), font))
        .unwrap_err();
    assert!(err.to_string().starts_with("engine error: ffmpeg exited with status"));
    assert!(!engine.is_running());
    assert!(engine.fs().unwrap().is_empty());
}
