//! **Audio playback** for the premium route.
//!
//! The router never touches an audio device directly; it plays premium audio
//! through this trait, so tests and headless deployments can substitute their
//! own sink.

use crate::error::{SpeechError, SpeechResult};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

/// Playback sink for opaque premium audio blobs (WAV/MP3).
pub trait AudioPlayback: Send + Sync {
    /// Decode and start playing. Returns an error for malformed audio; the
    /// router treats that as a recoverable premium failure.
    fn play(&self, bytes: &[u8]) -> SpeechResult<()>;
    fn pause(&self);
    fn resume(&self);
    /// Stop immediately and clear the queue. Idempotent.
    fn stop(&self);
    /// Whether the sink currently has queued samples (playing or paused).
    fn is_playing(&self) -> bool;
}

/// Default sink over a `rodio` output device.
pub struct RodioPlayback {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
}

impl RodioPlayback {
    /// Create a sink on the default output device.
    pub fn new() -> SpeechResult<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| SpeechError::Playback(e.to_string()))?;
        let sink =
            Sink::try_new(&stream_handle).map_err(|e| SpeechError::Playback(e.to_string()))?;
        info!("Playback: rodio sink ready");
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
        })
    }
}

impl AudioPlayback for RodioPlayback {
    fn play(&self, bytes: &[u8]) -> SpeechResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let cursor = Cursor::new(bytes.to_vec());
        let source = rodio::Decoder::new(cursor)
            .map_err(|e| SpeechError::Playback(format!("decode failed: {}", e)))?;
        self.sink.append(source.convert_samples::<f32>());
        self.sink.play();
        Ok(())
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn stop(&self) {
        self.sink.stop();
        debug!("Playback: stopped");
    }

    fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

/// Discards audio. Useful in headless environments and as the default before
/// a real sink is wired in.
#[derive(Debug, Default)]
pub struct SilentPlayback;

impl AudioPlayback for SilentPlayback {
    fn play(&self, _bytes: &[u8]) -> SpeechResult<()> {
        Ok(())
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_playback_accepts_anything() {
        let p = SilentPlayback;
        assert!(p.play(&[1, 2, 3]).is_ok());
        assert!(!p.is_playing());
        p.stop();
        p.stop(); // idempotent
    }
}
