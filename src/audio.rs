//! Audio playback for timer completion sounds.

use rodio::source::{SineWave, Source, Zero};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

pub struct AudioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioPlayer {
    /// Opens the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Plays a short two-tone chime in the background at 30% volume.
    pub fn play_chime(&self) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;

        // A5 then C6 with a short gap.
        let first = SineWave::new(880.0)
            .take_duration(Duration::from_millis(150))
            .amplify(0.3);
        let gap = Zero::<f32>::new(1, 44100).take_duration(Duration::from_millis(50));
        let second = SineWave::new(1046.5)
            .take_duration(Duration::from_millis(200))
            .amplify(0.3);

        sink.append(first);
        sink.append(gap);
        sink.append(second);
        sink.detach();

        Ok(())
    }
}
