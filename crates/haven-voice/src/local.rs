//! **Local Synthesis Driver** — offline/on-device speech, chunk by chunk.
//!
//! The platform engine is an injected dependency behind `LocalTtsEngine`; the
//! driver owns the pacing. Chunk 0 is spoken immediately and each later chunk
//! is scheduled from a per-character duration estimate rather than engine
//! completion events (platform speech APIs do not reliably emit per-chunk end
//! events, so the estimate is the contract). Every scheduled task carries the
//! session id it belongs to, which makes stale-session checks structural.

use crate::error::{SpeechError, SpeechResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Options handed to the platform engine for one utterance. Fixed before the
/// first chunk is spoken; never changed mid-utterance.
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    pub voice_id: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Platform speech engine contract. `speak` should enqueue and return
/// promptly; a returned error means the backend cannot speak at all, which is
/// fatal for the current utterance (there is no lower fallback tier).
pub trait LocalTtsEngine: Send + Sync {
    fn list_voices(&self) -> Vec<String>;
    fn speak(&self, text: &str, options: &SpeakOptions) -> SpeechResult<()>;
    fn pause(&self);
    fn resume(&self);
    fn cancel(&self);
}

/// Placeholder engine: logs chunks instead of speaking. Use for demos and
/// environments without a speech backend.
#[derive(Debug, Default)]
pub struct PlaceholderEngine;

impl LocalTtsEngine for PlaceholderEngine {
    fn list_voices(&self) -> Vec<String> {
        vec!["placeholder".to_string()]
    }

    fn speak(&self, text: &str, options: &SpeakOptions) -> SpeechResult<()> {
        info!(
            "PlaceholderEngine: [{} rate {:.2} pitch {:.2}] {}",
            options.voice_id, options.rate, options.pitch, text
        );
        Ok(())
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn cancel(&self) {}
}

/// Pacing estimates for local playback.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Estimated speaking time per character (default 100ms). A deliberate
    /// approximation standing in for unmeasured engine speaking duration.
    pub per_char_ms: u64,
    /// Pause inserted between chunks (default 300ms).
    pub inter_chunk_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            per_char_ms: 100,
            inter_chunk_pause_ms: 300,
        }
    }
}

/// Invoked with the owning session id when the final chunk's estimated
/// duration elapses.
pub type CompletionHook = Arc<dyn Fn(u64) + Send + Sync>;

struct DriverShared {
    session_id: u64,
    chunks: Vec<String>,
    options: SpeakOptions,
    /// Index of the last chunk handed to the engine.
    current: usize,
    paused: bool,
    stopped: bool,
    done: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// Drives one utterance through the engine with inter-chunk pacing.
pub struct LocalDriver {
    engine: Arc<dyn LocalTtsEngine>,
    pacing: PacingConfig,
}

impl LocalDriver {
    pub fn new(engine: Arc<dyn LocalTtsEngine>, pacing: PacingConfig) -> Self {
        Self { engine, pacing }
    }

    pub fn engine(&self) -> Arc<dyn LocalTtsEngine> {
        Arc::clone(&self.engine)
    }

    /// Speak `chunks[0]` now and schedule the rest. Returns a handle for
    /// pause/resume/stop; `on_complete` fires once the last chunk's estimate
    /// elapses, unless the session is stopped or superseded first.
    pub fn speak_chunks(
        &self,
        session_id: u64,
        chunks: Vec<String>,
        options: SpeakOptions,
        on_complete: CompletionHook,
    ) -> SpeechResult<LocalHandle> {
        if chunks.is_empty() {
            return Err(SpeechError::LocalEngine("no speakable chunks".to_string()));
        }
        self.engine.speak(&chunks[0], &options)?;
        info!(
            "LocalDriver: session {} speaking {} chunk(s) as {}",
            session_id,
            chunks.len(),
            options.voice_id
        );
        let shared = Arc::new(Mutex::new(DriverShared {
            session_id,
            chunks,
            options,
            current: 0,
            paused: false,
            stopped: false,
            done: false,
            tasks: Vec::new(),
        }));
        let handle = LocalHandle {
            shared,
            engine: Arc::clone(&self.engine),
            pacing: self.pacing.clone(),
            on_complete,
            session_id,
        };
        handle.schedule_from(0);
        Ok(handle)
    }
}

/// Handle to one utterance in flight on the local route.
#[derive(Clone)]
pub struct LocalHandle {
    shared: Arc<Mutex<DriverShared>>,
    engine: Arc<dyn LocalTtsEngine>,
    pacing: PacingConfig,
    on_complete: CompletionHook,
    session_id: u64,
}

impl LocalHandle {
    fn estimate_ms(&self, chunk: &str) -> u64 {
        chunk.chars().count() as u64 * self.pacing.per_char_ms
    }

    /// Schedule chunks after `from` plus the completion task, with delays
    /// relative to now. Used both at start and on resume; resume cannot know
    /// how much of the current chunk remains, so its full estimate is the
    /// baseline.
    fn schedule_from(&self, from: usize) {
        let chunks: Vec<String> = self.shared.lock().chunks.clone();
        let mut cumulative: u64 = 0;
        let mut handles = Vec::new();
        for i in (from + 1)..chunks.len() {
            cumulative += self.estimate_ms(&chunks[i - 1]) + self.pacing.inter_chunk_pause_ms;
            handles.push(self.spawn_chunk_task(i, cumulative));
        }
        if let Some(last) = chunks.last() {
            cumulative += self.estimate_ms(last);
        }
        handles.push(self.spawn_completion_task(cumulative));
        self.shared.lock().tasks.extend(handles);
    }

    fn spawn_chunk_task(&self, index: usize, delay_ms: u64) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let engine = Arc::clone(&self.engine);
        let session_id = self.session_id;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let next = {
                let mut s = shared.lock();
                if s.stopped || s.paused || s.done || s.session_id != session_id {
                    None
                } else {
                    s.current = index;
                    Some((s.chunks[index].clone(), s.options.clone()))
                }
            };
            if let Some((text, options)) = next {
                debug!("LocalDriver: session {} chunk {}", session_id, index);
                if let Err(e) = engine.speak(&text, &options) {
                    warn!(
                        "LocalDriver: session {} chunk {} failed: {}",
                        session_id, index, e
                    );
                    shared.lock().stopped = true;
                }
            }
        })
    }

    fn spawn_completion_task(&self, delay_ms: u64) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let on_complete = Arc::clone(&self.on_complete);
        let session_id = self.session_id;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let fire = {
                let mut s = shared.lock();
                if s.stopped || s.paused || s.session_id != session_id {
                    false
                } else {
                    s.done = true;
                    true
                }
            };
            if fire {
                on_complete(session_id);
            }
        })
    }

    /// Suspend the engine and cancel every pending chunk timer. A paused
    /// utterance fires no callbacks until resumed.
    pub fn pause(&self) {
        {
            let mut s = self.shared.lock();
            if s.paused || s.stopped || s.done {
                return;
            }
            s.paused = true;
            for task in s.tasks.drain(..) {
                task.abort();
            }
        }
        self.engine.pause();
        debug!("LocalDriver: session {} paused", self.session_id);
    }

    /// Resume the engine and rebuild the timers relative to now, starting from
    /// the current chunk index. Timers are recreated, not un-frozen, to avoid
    /// drift.
    pub fn resume(&self) {
        let from = {
            let mut s = self.shared.lock();
            if !s.paused || s.stopped || s.done {
                return;
            }
            s.paused = false;
            s.current
        };
        self.engine.resume();
        self.schedule_from(from);
        debug!(
            "LocalDriver: session {} resumed from chunk {}",
            self.session_id, from
        );
    }

    /// Halt the engine and clear the schedule. Idempotent.
    pub fn stop(&self) {
        let was_stopped = {
            let mut s = self.shared.lock();
            let was = s.stopped;
            s.stopped = true;
            for task in s.tasks.drain(..) {
                task.abort();
            }
            was
        };
        if !was_stopped {
            self.engine.cancel();
            debug!("LocalDriver: session {} stopped", self.session_id);
        }
    }

    pub fn is_done(&self) -> bool {
        self.shared.lock().done
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn current_chunk(&self) -> usize {
        self.shared.lock().current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingEngine {
        spoken: Mutex<Vec<String>>,
        cancelled: AtomicBool,
    }

    impl LocalTtsEngine for RecordingEngine {
        fn list_voices(&self) -> Vec<String> {
            vec!["test".to_string()]
        }

        fn speak(&self, text: &str, _options: &SpeakOptions) -> SpeechResult<()> {
            self.spoken.lock().push(text.to_string());
            Ok(())
        }

        fn pause(&self) {}

        fn resume(&self) {}

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn options() -> SpeakOptions {
        SpeakOptions {
            voice_id: "test".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    fn fast_pacing() -> PacingConfig {
        PacingConfig {
            per_char_ms: 2,
            inter_chunk_pause_ms: 5,
        }
    }

    #[test]
    fn first_chunk_speaks_immediately_then_rest_follow() {
        tokio_test::block_on(async {
            let engine = Arc::new(RecordingEngine::default());
            let driver = LocalDriver::new(engine.clone(), fast_pacing());
            let done = Arc::new(AtomicBool::new(false));
            let done_flag = done.clone();
            let handle = driver
                .speak_chunks(
                    1,
                    vec!["one".to_string(), "two".to_string(), "three".to_string()],
                    options(),
                    Arc::new(move |_| done_flag.store(true, Ordering::SeqCst)),
                )
                .unwrap();
            assert_eq!(engine.spoken.lock().len(), 1);

            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(engine.spoken.lock().clone(), vec!["one", "two", "three"]);
            assert!(done.load(Ordering::SeqCst));
            assert!(handle.is_done());
        });
    }

    #[test]
    fn pause_cancels_pending_chunks_and_resume_reschedules() {
        tokio_test::block_on(async {
            let engine = Arc::new(RecordingEngine::default());
            let driver = LocalDriver::new(
                engine.clone(),
                PacingConfig {
                    per_char_ms: 20,
                    inter_chunk_pause_ms: 20,
                },
            );
            let handle = driver
                .speak_chunks(
                    1,
                    vec!["one".to_string(), "two".to_string()],
                    options(),
                    Arc::new(|_| {}),
                )
                .unwrap();
            handle.pause();
            tokio::time::sleep(Duration::from_millis(300)).await;
            // Nothing fired while paused.
            assert_eq!(engine.spoken.lock().len(), 1);

            handle.resume();
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(engine.spoken.lock().clone(), vec!["one", "two"]);
        });
    }

    #[test]
    fn stop_is_idempotent_and_halts_the_engine() {
        tokio_test::block_on(async {
            let engine = Arc::new(RecordingEngine::default());
            let driver = LocalDriver::new(engine.clone(), fast_pacing());
            let handle = driver
                .speak_chunks(
                    1,
                    vec!["one".to_string(), "two".to_string()],
                    options(),
                    Arc::new(|_| {}),
                )
                .unwrap();
            handle.stop();
            handle.stop();
            assert!(engine.cancelled.load(Ordering::SeqCst));

            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(engine.spoken.lock().len(), 1);
            assert!(!handle.is_done());
        });
    }

    #[test]
    fn placeholder_engine_lists_a_voice() {
        let engine = PlaceholderEngine;
        assert_eq!(engine.list_voices(), vec!["placeholder"]);
        assert!(engine.speak("hello", &options()).is_ok());
    }
}
