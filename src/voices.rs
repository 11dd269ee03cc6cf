//! Voice catalog for speech synthesis

use serde::Serialize;

/// Gender category of a synthesized voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Neutral,
}

/// Static description of a TTS voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    pub id: &'static str,
    pub name: &'static str,
    /// BCP 47 language tag the voice is tuned for
    pub language: &'static str,
    pub gender: Gender,
    pub description: &'static str,
    pub recommended: bool,
}

/// Voices offered by the speech provider
pub const VOICES: &[VoiceProfile] = &[
    VoiceProfile {
        id: "nova",
        name: "Nova",
        language: "es-ES",
        gender: Gender::Female,
        description: "Clear, natural female voice",
        recommended: true,
    },
    VoiceProfile {
        id: "alloy",
        name: "Alloy",
        language: "en-US",
        gender: Gender::Neutral,
        description: "Versatile neutral voice",
        recommended: false,
    },
    VoiceProfile {
        id: "echo",
        name: "Echo",
        language: "en-US",
        gender: Gender::Male,
        description: "Deep male voice",
        recommended: false,
    },
    VoiceProfile {
        id: "fable",
        name: "Fable",
        language: "en-US",
        gender: Gender::Male,
        description: "Warm male voice",
        recommended: false,
    },
    VoiceProfile {
        id: "onyx",
        name: "Onyx",
        language: "en-US",
        gender: Gender::Male,
        description: "Authoritative male voice",
        recommended: false,
    },
    VoiceProfile {
        id: "shimmer",
        name: "Shimmer",
        language: "en-US",
        gender: Gender::Female,
        description: "Soft female voice",
        recommended: false,
    },
];

/// Look up a voice by id
#[must_use]
pub fn voice_by_id(id: &str) -> Option<&'static VoiceProfile> {
    VOICES.iter().find(|v| v.id == id)
}

/// Gender of a voice, neutral when the id is unknown
#[must_use]
pub fn voice_gender(id: &str) -> Gender {
    voice_by_id(id).map_or(Gender::Neutral, |v| v.gender)
}

/// Voices tuned for a language tag
pub fn voices_for_language(language: &str) -> impl Iterator<Item = &'static VoiceProfile> + '_ {
    VOICES.iter().filter(move |v| v.language == language)
}

/// Voices flagged as recommended
pub fn recommended_voices() -> impl Iterator<Item = &'static VoiceProfile> {
    VOICES.iter().filter(|v| v.recommended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let nova = voice_by_id("nova").unwrap();
        assert_eq!(nova.name, "Nova");
        assert_eq!(nova.gender, Gender::Female);
        assert!(voice_by_id("unknown").is_none());
    }

    #[test]
    fn test_unknown_voice_is_neutral() {
        assert_eq!(voice_gender("onyx"), Gender::Male);
        assert_eq!(voice_gender("nobody"), Gender::Neutral);
    }

    #[test]
    fn test_filters() {
        let spanish: Vec<_> = voices_for_language("es-ES").map(|v| v.id).collect();
        assert_eq!(spanish, vec!["nova"]);

        assert_eq!(recommended_voices().count(), 1);
        assert_eq!(voices_for_language("en-US").count(), 5);
    }
}
