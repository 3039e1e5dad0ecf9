//! **Voice Router** — the speak/stop/pause/resume façade.
//!
//! Per utterance: score importance, check premium eligibility, race the
//! premium client against the fallback timeout, and fall back to the local
//! driver on any failure, timeout or ineligibility. At most one playback
//! session is active at a time; every async completion re-checks its session
//! id before touching state, so callbacks from a superseded session are
//! discarded rather than applied.

use crate::chunker;
use crate::emotion::{profile_for, EmotionLabel, EmotionSignal, VoiceProfile};
use crate::error::SpeechResult;
use crate::importance;
use crate::local::{CompletionHook, LocalDriver, LocalHandle, LocalTtsEngine, PacingConfig, SpeakOptions};
use crate::playback::{AudioPlayback, SilentPlayback};
use crate::premium::{PremiumSynthesizer, SynthesisRequest};
use crate::quota::{QuotaConfig, QuotaStore, QuotaTracker};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Advisory surfaced when the premium route was attempted and recovered.
const FALLBACK_ADVISORY: &str = "premium voice unavailable, using local voice";

/// Poll interval for premium playback completion.
const PLAYBACK_POLL_MS: u64 = 120;

/// Which synthesis path an utterance took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Premium,
    Local,
    None,
}

/// Router states. Terminal outcomes (completed, cancelled, failed) drop the
/// session and return to `Idle`; they are reported through `RouterEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    Scoring,
    RoutingDecision,
    PremiumPending,
    LocalSpeaking,
    Speaking,
}

/// One discrete unit of text submitted for synthesis.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub emotion: EmotionLabel,
    /// Emotion intensity, clamped to 0.0..=1.0 on entry.
    pub intensity: f32,
}

/// Connectivity probe read at routing-decision time.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Default probe: always online.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Flag-backed probe for wiring into an application's connectivity watcher.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectivity {
    online: Arc<AtomicBool>,
}

impl SharedConnectivity {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(initially_online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for SharedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Events emitted by the router for observability.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    SessionStarted {
        id: u64,
        importance: f32,
        timestamp: DateTime<Utc>,
    },
    /// Routing decision made. `reason` carries the ineligibility when the
    /// premium route was skipped.
    RouteChosen {
        id: u64,
        route: Route,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// Premium was attempted and recovered to the local route.
    FallbackEngaged {
        id: u64,
        advisory: String,
        timestamp: DateTime<Utc>,
    },
    PlaybackStarted {
        id: u64,
        route: Route,
        timestamp: DateTime<Utc>,
    },
    Completed {
        id: u64,
        timestamp: DateTime<Utc>,
    },
    Stopped {
        id: u64,
        timestamp: DateTime<Utc>,
    },
    Failed {
        id: u64,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Read-only snapshot of router state.
#[derive(Debug, Clone)]
pub struct RouterStatus {
    pub state: RouterState,
    pub current_route: Route,
    pub is_speaking: bool,
    /// True only while the premium request is pending.
    pub is_loading: bool,
    pub quota_remaining: u32,
    /// Non-fatal fallback reason from the most recent routing, if any.
    pub last_advisory: Option<String>,
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Premium feature flag (default true). Premium also needs a configured
    /// client, connectivity, quota headroom and an identity.
    pub premium_enabled: bool,
    /// Minimum importance for the premium route (default 0.3). The comparison
    /// is inclusive (`importance >= threshold`); flagged for confirmation
    /// against product intent.
    pub premium_threshold: f32,
    /// TTS model requested from the premium service (default "tts-1").
    pub premium_model: String,
    /// Premium race budget (default 3000ms). Enforced by the router itself,
    /// independent of the HTTP client's timeout.
    pub fallback_timeout_ms: u64,
    /// Maximum chunk size for local playback (default 220 bytes).
    pub max_chunk_size: usize,
    /// Identity the quota is scoped to. `None` forces local-only routing.
    pub user_id: Option<String>,
    /// Base speaking rate; multiplied by the emotion profile.
    pub base_rate: f32,
    /// Base pitch; multiplied by the emotion profile.
    pub base_pitch: f32,
    pub volume: f32,
    pub pacing: PacingConfig,
    pub quota: QuotaConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            premium_enabled: true,
            premium_threshold: 0.3,
            premium_model: "tts-1".to_string(),
            fallback_timeout_ms: 3000,
            max_chunk_size: chunker::DEFAULT_MAX_CHUNK_SIZE,
            user_id: None,
            base_rate: 1.0,
            base_pitch: 1.0,
            volume: 1.0,
            pacing: PacingConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

/// Hook invoked after playback of an utterance starts.
pub type UtteranceHook = Arc<dyn Fn(&Utterance) + Send + Sync>;

struct ActiveSession {
    id: u64,
    route: Route,
    local: Option<LocalHandle>,
    watcher: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn pending(id: u64) -> Self {
        Self {
            id,
            route: Route::None,
            local: None,
            watcher: None,
        }
    }
}

struct RouterInner {
    next_session: u64,
    session: Option<ActiveSession>,
    state: RouterState,
    last_advisory: Option<String>,
}

#[derive(Clone)]
struct EventSender {
    tx: mpsc::UnboundedSender<RouterEvent>,
    // Events are only queued once the receiver has been taken, so an unread
    // channel cannot grow without bound.
    enabled: Arc<AtomicBool>,
}

impl EventSender {
    fn emit(&self, event: RouterEvent) {
        if self.enabled.load(Ordering::SeqCst) {
            let _ = self.tx.send(event);
        }
    }
}

fn complete_session(inner: &Arc<Mutex<RouterInner>>, events: &EventSender, session_id: u64) {
    let completed = {
        let mut inner = inner.lock();
        match inner.session {
            Some(ref s) if s.id == session_id => {
                inner.session = None;
                inner.state = RouterState::Idle;
                true
            }
            _ => false,
        }
    };
    if completed {
        info!("Router: session {} completed", session_id);
        events.emit(RouterEvent::Completed {
            id: session_id,
            timestamp: Utc::now(),
        });
    }
}

/// The speak/stop/pause/resume façade over premium and local synthesis.
pub struct VoiceRouter {
    config: RouterConfig,
    quota: Arc<QuotaTracker>,
    premium: Option<Arc<dyn PremiumSynthesizer>>,
    playback: Arc<dyn AudioPlayback>,
    driver: LocalDriver,
    connectivity: Arc<dyn ConnectivityProbe>,
    inner: Arc<Mutex<RouterInner>>,
    events: EventSender,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<RouterEvent>>>,
    on_utterance_spoken: Option<UtteranceHook>,
}

impl VoiceRouter {
    /// Create a router over the given local engine. Premium stays disabled
    /// until a client is attached with `with_premium`; playback defaults to a
    /// silent sink and the quota to an in-memory store.
    pub fn new(config: RouterConfig, engine: Arc<dyn LocalTtsEngine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let quota = Arc::new(QuotaTracker::in_memory(config.quota.clone()));
        let driver = LocalDriver::new(engine, config.pacing.clone());
        Self {
            config,
            quota,
            premium: None,
            playback: Arc::new(SilentPlayback),
            driver,
            connectivity: Arc::new(AlwaysOnline),
            inner: Arc::new(Mutex::new(RouterInner {
                next_session: 0,
                session: None,
                state: RouterState::Idle,
                last_advisory: None,
            })),
            events: EventSender {
                tx,
                enabled: Arc::new(AtomicBool::new(false)),
            },
            event_rx: Mutex::new(Some(rx)),
            on_utterance_spoken: None,
        }
    }

    pub fn with_premium(mut self, premium: Arc<dyn PremiumSynthesizer>) -> Self {
        self.premium = Some(premium);
        self
    }

    pub fn with_playback(mut self, playback: Arc<dyn AudioPlayback>) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_quota_store(mut self, store: Arc<dyn QuotaStore>) -> Self {
        self.quota = Arc::new(QuotaTracker::new(self.config.quota.clone(), store));
        self
    }

    pub fn with_connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = probe;
        self
    }

    /// Attach a hook invoked after playback of each utterance starts.
    pub fn on_utterance_spoken(mut self, hook: UtteranceHook) -> Self {
        self.on_utterance_spoken = Some(hook);
        self
    }

    /// Take the event receiver. Events are only queued from this point on.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<RouterEvent>> {
        let rx = self.event_rx.lock().take();
        if rx.is_some() {
            self.events.enabled.store(true, Ordering::SeqCst);
        }
        rx
    }

    pub fn status(&self) -> RouterStatus {
        let inner = self.inner.lock();
        RouterStatus {
            state: inner.state,
            current_route: inner.session.as_ref().map(|s| s.route).unwrap_or(Route::None),
            is_speaking: inner.state == RouterState::Speaking,
            is_loading: inner.state == RouterState::PremiumPending,
            quota_remaining: self.quota.remaining(),
            last_advisory: inner.last_advisory.clone(),
        }
    }

    pub fn quota_remaining(&self) -> u32 {
        self.quota.remaining()
    }

    /// Speak from an external classifier signal.
    pub async fn speak_signal(&self, text: &str, signal: &EmotionSignal) -> SpeechResult<Route> {
        self.speak(text, signal.dominant, signal.intensity).await
    }

    /// Route and speak one utterance. Any active session is torn down first;
    /// at most one playback session exists at a time. Returns the route taken
    /// once playback has started (`Route::None` for empty input or when this
    /// call was superseded mid-flight).
    ///
    /// Premium-side failures are absorbed: they surface only through
    /// `last_advisory` and the event stream. A local-engine failure is fatal
    /// for the call; there is no lower fallback tier.
    pub async fn speak(
        &self,
        text: &str,
        emotion: EmotionLabel,
        intensity: f32,
    ) -> SpeechResult<Route> {
        let utterance = Utterance {
            text: text.to_string(),
            emotion,
            intensity: intensity.clamp(0.0, 1.0),
        };
        if utterance.text.trim().is_empty() {
            return Ok(Route::None);
        }

        // Supersede and create atomically: a concurrent speak() can never
        // observe a window with zero or two live sessions.
        let (prior, id) = {
            let mut inner = self.inner.lock();
            let prior = inner.session.take();
            inner.next_session += 1;
            let id = inner.next_session;
            inner.session = Some(ActiveSession::pending(id));
            inner.state = RouterState::Scoring;
            (prior, id)
        };
        if let Some(prior) = prior {
            self.finish_teardown(prior, "superseded");
        }

        let score = importance::score(&utterance.text, utterance.intensity);
        debug!(
            "Router: session {} importance {:.2} ({} chars, {})",
            id,
            score,
            utterance.text.len(),
            utterance.emotion.as_str()
        );
        self.events.emit(RouterEvent::SessionStarted {
            id,
            importance: score,
            timestamp: Utc::now(),
        });

        self.inner.lock().state = RouterState::RoutingDecision;
        let profile = profile_for(utterance.emotion);

        let client = match self.premium_eligibility(score) {
            Ok(client) => client,
            Err(reason) => {
                info!("Router: session {} using local voice ({})", id, reason);
                self.events.emit(RouterEvent::RouteChosen {
                    id,
                    route: Route::Local,
                    reason: Some(reason.clone()),
                    timestamp: Utc::now(),
                });
                return self.start_local(id, &utterance, profile, Some(reason));
            }
        };

        self.events.emit(RouterEvent::RouteChosen {
            id,
            route: Route::Premium,
            reason: None,
            timestamp: Utc::now(),
        });
        self.inner.lock().state = RouterState::PremiumPending;

        let request = SynthesisRequest {
            model: self.config.premium_model.clone(),
            input: utterance.text.clone(),
            voice: profile.voice_id.to_string(),
            speed: self.config.base_rate * profile.rate_multiplier,
            user: self.config.user_id.clone(),
        };
        // The race: first of premium response / fallback timer wins. On
        // timeout the request future is dropped, which aborts the in-flight
        // call best-effort.
        let outcome = tokio::time::timeout(
            Duration::from_millis(self.config.fallback_timeout_ms),
            client.synthesize(&request),
        )
        .await;

        if !self.is_current(id) {
            debug!("Router: discarding stale premium result for session {}", id);
            return Ok(Route::None);
        }

        match outcome {
            Ok(Ok(audio)) => {
                self.quota.record_usage(1);
                match self.playback.play(&audio.bytes) {
                    Ok(()) => return self.begin_premium_speaking(id, &utterance),
                    Err(e) => warn!("Router: premium audio unplayable: {}", e),
                }
            }
            Ok(Err(e)) => warn!("Router: premium synthesis failed: {}", e),
            Err(_) => warn!(
                "Router: premium timed out after {}ms",
                self.config.fallback_timeout_ms
            ),
        }

        let advisory = FALLBACK_ADVISORY.to_string();
        self.events.emit(RouterEvent::FallbackEngaged {
            id,
            advisory: advisory.clone(),
            timestamp: Utc::now(),
        });
        self.start_local(id, &utterance, profile, Some(advisory))
    }

    /// Hard abort of whatever is active: pending timers, in-flight premium
    /// work, local schedule. Always safe, idempotent, ends in `Idle`.
    pub fn stop(&self) {
        self.teardown_active("stopped");
    }

    /// Pause playback. Only meaningful while `Speaking`; a no-op otherwise.
    pub fn pause(&self) {
        let target = {
            let inner = self.inner.lock();
            if inner.state != RouterState::Speaking {
                return;
            }
            inner
                .session
                .as_ref()
                .map(|s| (s.route, s.local.clone()))
        };
        match target {
            Some((Route::Premium, _)) => self.playback.pause(),
            Some((Route::Local, Some(local))) => local.pause(),
            _ => {}
        }
    }

    /// Resume paused playback. Only meaningful while `Speaking`; a no-op
    /// otherwise.
    pub fn resume(&self) {
        let target = {
            let inner = self.inner.lock();
            if inner.state != RouterState::Speaking {
                return;
            }
            inner
                .session
                .as_ref()
                .map(|s| (s.route, s.local.clone()))
        };
        match target {
            Some((Route::Premium, _)) => self.playback.resume(),
            Some((Route::Local, Some(local))) => local.resume(),
            _ => {}
        }
    }

    /// Voices the local engine offers.
    pub fn local_voices(&self) -> Vec<String> {
        self.driver.engine().list_voices()
    }

    fn is_current(&self, session_id: u64) -> bool {
        matches!(self.inner.lock().session, Some(ref s) if s.id == session_id)
    }

    fn teardown_active(&self, cause: &str) {
        let session = {
            let mut inner = self.inner.lock();
            inner.state = RouterState::Idle;
            inner.session.take()
        };
        if let Some(session) = session {
            self.finish_teardown(session, cause);
        }
    }

    fn finish_teardown(&self, session: ActiveSession, cause: &str) {
        if let Some(watcher) = session.watcher {
            watcher.abort();
        }
        if let Some(local) = session.local {
            local.stop();
        }
        self.playback.stop();
        debug!("Router: session {} {}", session.id, cause);
        self.events.emit(RouterEvent::Stopped {
            id: session.id,
            timestamp: Utc::now(),
        });
    }

    /// All premium preconditions, in decision order. Returns the client when
    /// eligible, otherwise the specific ineligibility reason (observability,
    /// not an error).
    fn premium_eligibility(&self, score: f32) -> Result<Arc<dyn PremiumSynthesizer>, String> {
        let client = match (&self.premium, self.config.premium_enabled) {
            (Some(client), true) => Arc::clone(client),
            _ => return Err("premium voice disabled".to_string()),
        };
        if score < self.config.premium_threshold {
            return Err(format!(
                "importance {:.2} below threshold {:.2}",
                score, self.config.premium_threshold
            ));
        }
        if !self.connectivity.is_online() {
            return Err("offline".to_string());
        }
        if self.quota.is_exhausted() {
            return Err("monthly premium quota exhausted".to_string());
        }
        if self.config.user_id.is_none() {
            return Err("no user identity".to_string());
        }
        Ok(client)
    }

    fn begin_premium_speaking(&self, id: u64, utterance: &Utterance) -> SpeechResult<Route> {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.session, Some(ref s) if s.id == id) {
                self.playback.stop();
                return Ok(Route::None);
            }
            inner.state = RouterState::Speaking;
            inner.last_advisory = None;
            if let Some(ref mut session) = inner.session {
                session.route = Route::Premium;
            }
        }
        info!("Router: session {} speaking via premium voice", id);
        self.events.emit(RouterEvent::PlaybackStarted {
            id,
            route: Route::Premium,
            timestamp: Utc::now(),
        });

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let playback = Arc::clone(&self.playback);
        let watcher = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(PLAYBACK_POLL_MS)).await;
                let still_current =
                    matches!(inner.lock().session, Some(ref s) if s.id == id);
                if !still_current {
                    return;
                }
                if !playback.is_playing() {
                    complete_session(&inner, &events, id);
                    return;
                }
            }
        });
        if let Some(ref mut session) = self.inner.lock().session {
            if session.id == id {
                session.watcher = Some(watcher);
            }
        }

        if let Some(ref hook) = self.on_utterance_spoken {
            hook(utterance);
        }
        Ok(Route::Premium)
    }

    fn start_local(
        &self,
        id: u64,
        utterance: &Utterance,
        profile: VoiceProfile,
        advisory: Option<String>,
    ) -> SpeechResult<Route> {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.session, Some(ref s) if s.id == id) {
                return Ok(Route::None);
            }
            inner.state = RouterState::LocalSpeaking;
            if let Some(ref advisory) = advisory {
                inner.last_advisory = Some(advisory.clone());
            }
        }

        let chunks = chunker::chunk(&utterance.text, self.config.max_chunk_size);
        if chunks.is_empty() {
            complete_session(&self.inner, &self.events, id);
            return Ok(Route::None);
        }
        let options = SpeakOptions {
            voice_id: profile.voice_id.to_string(),
            rate: self.config.base_rate * profile.rate_multiplier,
            pitch: self.config.base_pitch * profile.pitch_multiplier,
            volume: self.config.volume,
        };

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let on_complete: CompletionHook =
            Arc::new(move |session_id| complete_session(&inner, &events, session_id));

        match self.driver.speak_chunks(id, chunks, options, on_complete) {
            Ok(handle) => {
                {
                    let mut inner = self.inner.lock();
                    if !matches!(inner.session, Some(ref s) if s.id == id) {
                        handle.stop();
                        return Ok(Route::None);
                    }
                    inner.state = RouterState::Speaking;
                    if let Some(ref mut session) = inner.session {
                        session.route = Route::Local;
                        session.local = Some(handle);
                    }
                }
                self.events.emit(RouterEvent::PlaybackStarted {
                    id,
                    route: Route::Local,
                    timestamp: Utc::now(),
                });
                if let Some(ref hook) = self.on_utterance_spoken {
                    hook(utterance);
                }
                Ok(Route::Local)
            }
            Err(e) => {
                error!("Router: local synthesis failed: {}", e);
                {
                    let mut inner = self.inner.lock();
                    if matches!(inner.session, Some(ref s) if s.id == id) {
                        inner.session = None;
                        inner.state = RouterState::Idle;
                    }
                }
                self.events.emit(RouterEvent::Failed {
                    id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::PlaceholderEngine;

    #[test]
    fn default_config_matches_documented_values() {
        let config = RouterConfig::default();
        assert!(config.premium_enabled);
        assert!((config.premium_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.fallback_timeout_ms, 3000);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn pause_and_resume_outside_speaking_are_noops() {
        let router = VoiceRouter::new(RouterConfig::default(), Arc::new(PlaceholderEngine));
        router.pause();
        router.resume();
        router.stop();
        assert_eq!(router.status().state, RouterState::Idle);
    }

    #[test]
    fn shared_connectivity_toggles() {
        let probe = SharedConnectivity::new(true);
        assert!(probe.is_online());
        probe.set_online(false);
        assert!(!probe.is_online());
    }

    #[test]
    fn status_starts_idle_with_full_quota() {
        let router = VoiceRouter::new(RouterConfig::default(), Arc::new(PlaceholderEngine));
        let status = router.status();
        assert_eq!(status.state, RouterState::Idle);
        assert_eq!(status.current_route, Route::None);
        assert!(!status.is_speaking);
        assert!(!status.is_loading);
        assert_eq!(status.quota_remaining, 100);
        assert!(status.last_advisory.is_none());
    }
}
