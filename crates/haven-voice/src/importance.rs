//! **Importance Scorer** — heuristic 0..1 estimate of how much an utterance
//! warrants the premium synthesis route.
//!
//! Pure and deterministic: phrase matches, length bonuses, emotion intensity
//! and clinically salient terms accumulate, then the total is clamped to 1.0.

/// Added once per matching high-therapeutic-value phrase.
const PHRASE_WEIGHT: f32 = 0.3;

/// Added once per matching clinically salient term.
const TERM_WEIGHT: f32 = 0.15;

/// Weight applied to the emotion intensity.
const INTENSITY_WEIGHT: f32 = 0.4;

/// Bonus for utterances longer than 200 characters.
const LONG_BONUS: f32 = 0.2;

/// Further bonus for utterances longer than 500 characters (cumulative with
/// the 200-character bonus).
const VERY_LONG_BONUS: f32 = 0.3;

/// Phrases that mark a high-value therapeutic moment. Matched case-insensitively.
const HIGH_VALUE_PHRASES: &[&str] = &[
    "i understand how you feel",
    "you're not alone",
    "i'm here for you",
    "that sounds really hard",
    "it's okay to feel",
    "thank you for trusting me",
    "take a deep breath",
    "you've been carrying a lot",
    "be kind to yourself",
    "what you're feeling is valid",
];

/// Clinically salient terms. Matched case-insensitively, one increment each.
const CLINICAL_TERMS: &[&str] = &[
    "anxiety",
    "depression",
    "panic",
    "trauma",
    "grief",
    "crisis",
    "overwhelmed",
    "hopeless",
    "burnout",
    "lonely",
];

/// Score an utterance's importance in `[0, 1]`.
///
/// Each matching phrase or term contributes a fixed increment regardless of
/// where it appears; the clamp is applied once at the end.
pub fn score(text: &str, emotion_intensity: f32) -> f32 {
    let lowered = text.to_lowercase();
    let mut total = 0.0_f32;

    for phrase in HIGH_VALUE_PHRASES {
        if lowered.contains(phrase) {
            total += PHRASE_WEIGHT;
        }
    }

    if text.len() > 200 {
        total += LONG_BONUS;
    }
    if text.len() > 500 {
        total += VERY_LONG_BONUS;
    }

    total += emotion_intensity.clamp(0.0, 1.0) * INTENSITY_WEIGHT;

    for term in CLINICAL_TERMS {
        if lowered.contains(term) {
            total += TERM_WEIGHT;
        }
    }

    total.min(1.0)
}
