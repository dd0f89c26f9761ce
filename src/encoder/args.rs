use std::path::{Path, PathBuf};
use std::time::Duration;

/// Codec and quality choices for the external encode passes. Defaults match
/// a fast software x264 pipeline.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub audio_codec: String,
    pub audio_bitrate_k: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            crf: 30,
            audio_codec: "aac".to_string(),
            audio_bitrate_k: 192,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Probe invocation: no output, just the banner with the `Duration:` header
/// on stderr.
pub fn probe_args(input: &Path) -> Vec<String> {
    vec!["-i".into(), path_arg(input), "-hide_banner".into()]
}

/// Mux pass: copy the captured video stream and encode audio next to it,
/// trimming to the shorter of the two timelines.
pub fn mux_args(video_in: &Path, audio_in: &Path, output: &Path, settings: &EncodeSettings) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(video_in),
        "-i".into(),
        path_arg(audio_in),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        settings.audio_codec.clone(),
        "-b:a".into(),
        format!("{}k", settings.audio_bitrate_k),
        "-shortest".into(),
        "-y".into(),
        path_arg(output),
    ]
}

/// Compression pass over an already muxed file.
pub fn compress_args(input: &Path, output: &Path, settings: &EncodeSettings) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(input),
        "-c:v".into(),
        settings.video_codec.clone(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-c:a".into(),
        "copy".into(),
        "-y".into(),
        path_arg(output),
    ]
}

/// Delegated segmentation pass: the encoder itself rotates output files at
/// `interval`, resetting timestamps so each part stands alone.
pub fn segment_args(
    input: &Path,
    output_pattern: &Path,
    interval: Duration,
    settings: &EncodeSettings,
) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(input),
        "-c:v".into(),
        settings.video_codec.clone(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-c:a".into(),
        settings.audio_codec.clone(),
        "-b:a".into(),
        format!("{}k", settings.audio_bitrate_k),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        interval.as_secs().to_string(),
        "-reset_timestamps".into(),
        "1".into(),
        // Segments are 1-indexed; the muxer would otherwise start at 000.
        "-segment_start_number".into(),
        "1".into(),
        "-y".into(),
        path_arg(output_pattern),
    ]
}

/// Zero-padded numbered output pattern for delegated segmentation,
/// e.g. `Part_%03d.mp4`.
pub fn segment_pattern(dir: &Path, basename: &str, extension: &str) -> PathBuf {
    dir.join(format!("{basename}_%03d.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mux_args_copy_video_and_encode_audio() {
        let args = mux_args(
            Path::new("video.raw"),
            Path::new("audio.pcm"),
            Path::new("synced.mp4"),
            &EncodeSettings::default(),
        );
        assert_eq!(
            args,
            vec![
                "-i", "video.raw", "-i", "audio.pcm", "-c:v", "copy", "-c:a", "aac", "-b:a",
                "192k", "-shortest", "-y", "synced.mp4",
            ]
        );
    }

    #[test]
    fn compress_args_use_configured_quality() {
        let settings = EncodeSettings {
            crf: 23,
            preset: "fast".to_string(),
            ..EncodeSettings::default()
        };
        let args = compress_args(Path::new("in.mp4"), Path::new("out.mp4"), &settings);
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -preset fast -crf 23"));
        assert!(joined.ends_with("-y out.mp4"));
    }

    #[test]
    fn segment_args_carry_the_segment_muxer_flags() {
        let args = segment_args(
            Path::new("synced.mp4"),
            Path::new("Part_%03d.mp4"),
            Duration::from_secs(120),
            &EncodeSettings::default(),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-f segment -segment_time 120 -reset_timestamps 1 -segment_start_number 1"));
        assert!(joined.ends_with("-y Part_%03d.mp4"));
    }

    #[test]
    fn segment_pattern_is_zero_padded() {
        let pattern = segment_pattern(Path::new("/tmp/out"), "Part", "mp4");
        assert_eq!(pattern, PathBuf::from("/tmp/out/Part_%03d.mp4"));
    }
}
