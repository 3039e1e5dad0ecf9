//! # Haven Voice - Adaptive Voice Synthesis Routing
//!
//! Per utterance, this crate decides between a network-backed premium voice
//! and an always-available local engine, races premium against a fallback
//! timeout, tracks a rolling monthly quota, splits long text into naturally
//! paced chunks, and maps detected emotion onto voice parameters.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Voice Router                          │
//! │  ┌────────────┐  ┌───────────────┐  ┌────────────────────┐   │
//! │  │ Importance │→ │  Eligibility  │→ │ Premium ⟷ timeout  │   │
//! │  │   Scorer   │  │ (quota, net)  │  │       race         │   │
//! │  └────────────┘  └───────────────┘  └────────┬───────────┘   │
//! │        ↓                                     ↓ fallback      │
//! │  ┌────────────┐  ┌───────────────┐  ┌────────────────────┐   │
//! │  │ Emotion →  │→ │ Text Chunker  │→ │ Local Driver       │   │
//! │  │  Profile   │  │ (prosodic)    │  │ (paced timers)     │   │
//! │  └────────────┘  └───────────────┘  └────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one playback session is active at a time; every async callback
//! carries its session id and is discarded when stale.

pub mod chunker;
pub mod emotion;
pub mod error;
pub mod importance;
pub mod local;
pub mod playback;
pub mod premium;
pub mod quota;
pub mod router;

pub use emotion::{profile_for, profile_for_label, EmotionLabel, EmotionSignal, VoiceProfile};
pub use error::{SpeechError, SpeechResult};
pub use local::{
    CompletionHook, LocalDriver, LocalHandle, LocalTtsEngine, PacingConfig, PlaceholderEngine,
    SpeakOptions,
};
pub use playback::{AudioPlayback, RodioPlayback, SilentPlayback};
pub use premium::{HttpPremiumClient, PremiumAudio, PremiumSynthesizer, SynthesisRequest};
pub use quota::{FailingQuotaStore, InMemoryQuotaStore, QuotaConfig, QuotaRecord, QuotaStore, QuotaTracker};
pub use router::{
    AlwaysOnline, ConnectivityProbe, Route, RouterConfig, RouterEvent, RouterState, RouterStatus,
    SharedConnectivity, Utterance, UtteranceHook, VoiceRouter,
};
