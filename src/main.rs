use anyhow::Context;
use log::info;
use screenrec::{
    encoder, logger::setup_logger, AudioConfig, LoggerConfig, RawFileAudioSink, RawFileVideoSink,
    Recorder, RecorderEvent, SilenceAudioSource, SyntheticFrameSource,
};
use std::{env, time::Duration};

fn main() -> anyhow::Result<()> {
    env::set_var("RUST_BACKTRACE", "full");
    setup_logger(LoggerConfig::new())?;

    // Log system information
    info!("OS: {}", env::consts::OS);
    info!("Architecture: {}", env::consts::ARCH);
    info!("Application started");

    match encoder::locate_encoder("ffmpeg") {
        Ok(path) => info!("Encoder found at {:?}", path),
        Err(e) => info!("No encoder available ({}), capture-only run", e),
    }

    let config = Recorder::builder()
        .fps(30, 1)
        .dimensions(1280, 720)
        .capture_audio(true)
        .output_dir(".")
        .build();
    let recorder = Recorder::new(config);
    let events = recorder.take_events().context("event channel already taken")?;

    let session_dir = screenrec::create_session_dir(recorder.config().output_dir())?;
    info!("Recording into {:?}", session_dir);

    let video_config = recorder.config().video_config();
    let audio_config = AudioConfig::default();
    recorder.start(
        Box::new(SyntheticFrameSource::new(video_config)),
        Some(Box::new(SilenceAudioSource::new(audio_config))),
        Box::new(RawFileVideoSink::create(session_dir.join("video.raw"))?),
        Some(Box::new(RawFileAudioSink::create(session_dir.join("audio.pcm"))?)),
    )?;
    info!("Recording started");

    std::thread::sleep(Duration::from_secs(10));
    info!("Stopping recording");
    recorder.stop()?;

    for event in events.try_iter() {
        match event {
            RecorderEvent::SessionStopped {
                frames_written,
                audio_bytes_written,
            } => info!(
                "Session wrote {} frames and {} audio bytes",
                frames_written, audio_bytes_written
            ),
            other => info!("Event: {:?}", other),
        }
    }

    info!("Application finished");
    Ok(())
}
