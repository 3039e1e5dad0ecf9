//! **Emotion-to-Voice Profile Mapper** — static mapping from detected emotional
//! state to voice parameters.
//!
//! The emotion classifier itself is an external collaborator; this module only
//! consumes its `EmotionSignal` and turns a label into a voice identity plus
//! rate/pitch multipliers. Unknown labels fall back to the neutral profile.

use serde::{Deserialize, Serialize};

/// Emotion labels the router understands, including the therapeutic-moment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Excited,
    Sad,
    Angry,
    Anxious,
    Calm,
    Neutral,
    Fear,
    Empathetic,
    Confident,
    Curious,
    Supportive,
    Instructive,
    Reflective,
    Challenging,
}

impl EmotionLabel {
    /// Parse a classifier label, case-insensitively. Unknown input maps to `Neutral`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "happy" => Self::Happy,
            "excited" => Self::Excited,
            "sad" => Self::Sad,
            "angry" => Self::Angry,
            "anxious" => Self::Anxious,
            "calm" => Self::Calm,
            "fear" => Self::Fear,
            "empathetic" => Self::Empathetic,
            "confident" => Self::Confident,
            "curious" => Self::Curious,
            "supportive" => Self::Supportive,
            "instructive" => Self::Instructive,
            "reflective" => Self::Reflective,
            "challenging" => Self::Challenging,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Excited => "excited",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Anxious => "anxious",
            Self::Calm => "calm",
            Self::Neutral => "neutral",
            Self::Fear => "fear",
            Self::Empathetic => "empathetic",
            Self::Confident => "confident",
            Self::Curious => "curious",
            Self::Supportive => "supportive",
            Self::Instructive => "instructive",
            Self::Reflective => "reflective",
            Self::Challenging => "challenging",
        }
    }
}

/// Output of the external emotion classifier, consumed as input to `speak()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSignal {
    /// Strongest detected emotion.
    pub dominant: EmotionLabel,
    /// Intensity of the dominant emotion, 0.0..=1.0.
    pub intensity: f32,
    /// Second-strongest emotion, if the classifier reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<EmotionLabel>,
}

/// Voice parameters for one emotion: identity plus rate/pitch multipliers
/// applied on top of the configured base rate/pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    pub voice_id: &'static str,
    pub rate_multiplier: f32,
    pub pitch_multiplier: f32,
}

const NEUTRAL_PROFILE: VoiceProfile = VoiceProfile {
    voice_id: "nova",
    rate_multiplier: 1.0,
    pitch_multiplier: 1.0,
};

/// Look up the voice profile for an emotion. Process-wide constant table;
/// no side effects.
pub fn profile_for(emotion: EmotionLabel) -> VoiceProfile {
    match emotion {
        EmotionLabel::Happy => VoiceProfile {
            voice_id: "shimmer",
            rate_multiplier: 1.05,
            pitch_multiplier: 1.1,
        },
        EmotionLabel::Excited => VoiceProfile {
            voice_id: "shimmer",
            rate_multiplier: 1.15,
            pitch_multiplier: 1.15,
        },
        EmotionLabel::Sad => VoiceProfile {
            voice_id: "alloy",
            rate_multiplier: 0.85,
            pitch_multiplier: 0.9,
        },
        EmotionLabel::Angry => VoiceProfile {
            voice_id: "onyx",
            rate_multiplier: 1.0,
            pitch_multiplier: 0.95,
        },
        EmotionLabel::Anxious => VoiceProfile {
            voice_id: "sage",
            rate_multiplier: 0.9,
            pitch_multiplier: 0.98,
        },
        EmotionLabel::Calm => VoiceProfile {
            voice_id: "sage",
            rate_multiplier: 0.9,
            pitch_multiplier: 0.95,
        },
        EmotionLabel::Neutral => NEUTRAL_PROFILE,
        EmotionLabel::Fear => VoiceProfile {
            voice_id: "alloy",
            rate_multiplier: 0.9,
            pitch_multiplier: 1.0,
        },
        EmotionLabel::Empathetic => VoiceProfile {
            voice_id: "shimmer",
            rate_multiplier: 0.9,
            pitch_multiplier: 0.98,
        },
        EmotionLabel::Confident => VoiceProfile {
            voice_id: "onyx",
            rate_multiplier: 1.0,
            pitch_multiplier: 1.0,
        },
        EmotionLabel::Curious => VoiceProfile {
            voice_id: "echo",
            rate_multiplier: 1.05,
            pitch_multiplier: 1.05,
        },
        EmotionLabel::Supportive => VoiceProfile {
            voice_id: "shimmer",
            rate_multiplier: 0.92,
            pitch_multiplier: 1.0,
        },
        EmotionLabel::Instructive => VoiceProfile {
            voice_id: "fable",
            rate_multiplier: 0.95,
            pitch_multiplier: 1.0,
        },
        EmotionLabel::Reflective => VoiceProfile {
            voice_id: "sage",
            rate_multiplier: 0.85,
            pitch_multiplier: 0.95,
        },
        EmotionLabel::Challenging => VoiceProfile {
            voice_id: "onyx",
            rate_multiplier: 1.0,
            pitch_multiplier: 1.02,
        },
    }
}

/// Profile lookup from a raw classifier label (unknown → neutral).
pub fn profile_for_label(label: &str) -> VoiceProfile {
    profile_for(EmotionLabel::parse(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_have_profiles() {
        let sad = profile_for(EmotionLabel::Sad);
        assert_eq!(sad.voice_id, "alloy");
        assert!(sad.rate_multiplier < 1.0);

        let excited = profile_for(EmotionLabel::Excited);
        assert!(excited.rate_multiplier > 1.0);
    }

    #[test]
    fn unknown_label_maps_to_neutral() {
        assert_eq!(EmotionLabel::parse("bewildered"), EmotionLabel::Neutral);
        assert_eq!(profile_for_label("bewildered"), NEUTRAL_PROFILE);
        assert_eq!(profile_for_label(""), NEUTRAL_PROFILE);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(EmotionLabel::parse("Anxious"), EmotionLabel::Anxious);
        assert_eq!(EmotionLabel::parse("  SUPPORTIVE "), EmotionLabel::Supportive);
    }

    #[test]
    fn signal_round_trips_through_json() {
        let signal = EmotionSignal {
            dominant: EmotionLabel::Empathetic,
            intensity: 0.7,
            secondary: Some(EmotionLabel::Sad),
        };
        let json = serde_json::to_string(&signal).unwrap();
        let back: EmotionSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dominant, EmotionLabel::Empathetic);
        assert_eq!(back.secondary, Some(EmotionLabel::Sad));
    }
}
