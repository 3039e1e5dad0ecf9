//! Speak demo — route a few utterances through the voice router.
//!
//! Runs with placeholder backends, so no audio hardware is needed. Set
//! `TTS_API_KEY` (and optionally `TTS_API_URL`) to attach the real premium
//! client; without it the router stays on the local route.
//!
//! Run: cargo run -p haven-voice --example speak_demo

use haven_voice::{
    EmotionLabel, HttpPremiumClient, PacingConfig, PlaceholderEngine, RouterConfig, VoiceRouter,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = RouterConfig {
        user_id: Some("demo-user".to_string()),
        // The placeholder engine only logs, so tighten the pacing estimates.
        pacing: PacingConfig {
            per_char_ms: 10,
            inter_chunk_pause_ms: 100,
        },
        ..RouterConfig::default()
    };
    let mut router = VoiceRouter::new(config, Arc::new(PlaceholderEngine));
    match HttpPremiumClient::from_env() {
        Ok(client) => {
            println!("Premium client configured from environment");
            router = router.with_premium(Arc::new(client));
        }
        Err(e) => println!("No premium client ({}), local route only", e),
    }

    let utterances = [
        ("Hi! Good to see you again today.", EmotionLabel::Happy, 0.4),
        (
            "I understand how you feel. Grief comes in waves, and some days \
             are heavier than others. Take a deep breath with me.",
            EmotionLabel::Empathetic,
            0.8,
        ),
        ("Let's note one small win from this week.", EmotionLabel::Reflective, 0.3),
    ];

    for (text, emotion, intensity) in utterances {
        match router.speak(text, emotion, intensity).await {
            Ok(route) => println!("→ spoke via {:?} route", route),
            Err(e) => eprintln!("→ failed: {}", e),
        }
        // Let the local schedule work through its chunks.
        while router.status().is_speaking {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    let status = router.status();
    println!(
        "Done. Quota remaining: {}, last advisory: {:?}",
        status.quota_remaining, status.last_advisory
    );
}
