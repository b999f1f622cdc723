//! Voice catalogue: the speakers shipped with the English Kokoro model.
//!
//! Speaker ids are indices into the model's packed style matrix, so they
//! are plain integers on the synthesis boundary. The catalogue is static so
//! a settings UI can list voices before any model is installed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric speaker id understood by the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub u32);

impl VoiceId {
    /// `af_bella`: warm, professional.
    pub const DEFAULT: Self = Self(1);

    /// `am_adam`, the default male narrator.
    pub const DEFAULT_MALE: Self = Self(5);

    /// Clamp into the range covered by [`KOKORO_VOICES`].
    #[must_use]
    pub const fn clamped(self) -> Self {
        let max = (KOKORO_VOICES.len() - 1) as u32;
        if self.0 > max { Self(max) } else { self }
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Voice gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
}

/// Accent of the speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceAccent {
    American,
    British,
}

/// Information about an available voice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Speaker id passed to the synthesizer.
    pub id: VoiceId,

    /// Model-side style name (e.g. `"af_bella"`).
    pub name: &'static str,

    /// Human-readable display name.
    pub display_name: &'static str,

    pub gender: VoiceGender,

    pub accent: VoiceAccent,

    /// One-line character description.
    pub description: &'static str,
}

const fn voice(
    id: u32,
    name: &'static str,
    display_name: &'static str,
    gender: VoiceGender,
    accent: VoiceAccent,
    description: &'static str,
) -> VoiceInfo {
    VoiceInfo {
        id: VoiceId(id),
        name,
        display_name,
        gender,
        accent,
        description,
    }
}

/// The 11 English voices of the Kokoro v0.19 model, ordered by speaker id.
pub const KOKORO_VOICES: &[VoiceInfo] = &[
    // American English, Female
    voice(0, "af", "Default", VoiceGender::Female, VoiceAccent::American, "Default American female"),
    voice(1, "af_bella", "Bella", VoiceGender::Female, VoiceAccent::American, "Warm, professional"),
    voice(2, "af_nicole", "Nicole", VoiceGender::Female, VoiceAccent::American, "Energetic, clear"),
    voice(3, "af_sarah", "Sarah", VoiceGender::Female, VoiceAccent::American, "Clear, articulate"),
    voice(4, "af_sky", "Sky", VoiceGender::Female, VoiceAccent::American, "Soft, dreamy"),
    // American English, Male
    voice(5, "am_adam", "Adam", VoiceGender::Male, VoiceAccent::American, "Deep, authoritative"),
    voice(6, "am_michael", "Michael", VoiceGender::Male, VoiceAccent::American, "Friendly, conversational"),
    // British English, Female
    voice(7, "bf_emma", "Emma", VoiceGender::Female, VoiceAccent::British, "Elegant British"),
    voice(8, "bf_isabella", "Isabella", VoiceGender::Female, VoiceAccent::British, "Refined British"),
    // British English, Male
    voice(9, "bm_george", "George", VoiceGender::Male, VoiceAccent::British, "Distinguished British"),
    voice(10, "bm_lewis", "Lewis", VoiceGender::Male, VoiceAccent::British, "Modern British"),
];

/// Look up a voice by speaker id.
#[must_use]
pub fn find_voice(id: VoiceId) -> Option<&'static VoiceInfo> {
    KOKORO_VOICES.iter().find(|v| v.id == id)
}

/// Look up a voice by its model-side style name (e.g. `"bm_george"`).
#[must_use]
pub fn find_voice_by_name(name: &str) -> Option<&'static VoiceInfo> {
    KOKORO_VOICES.iter().find(|v| v.name.eq_ignore_ascii_case(name))
}

/// Display name for a speaker id, falling back to `"Voice N"`.
#[must_use]
pub fn display_name(id: VoiceId) -> String {
    find_voice(id).map_or_else(|| format!("Voice {id}"), |v| v.display_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_ids_are_dense() {
        for (i, v) in KOKORO_VOICES.iter().enumerate() {
            assert_eq!(v.id.0 as usize, i, "voice {} out of order", v.name);
        }
    }

    #[test]
    fn default_voice_is_bella() {
        assert_eq!(find_voice(VoiceId::DEFAULT).unwrap().name, "af_bella");
        assert_eq!(find_voice(VoiceId::DEFAULT_MALE).unwrap().gender, VoiceGender::Male);
    }

    #[test]
    fn out_of_range_id_clamps_to_last_voice() {
        assert_eq!(VoiceId(42).clamped(), VoiceId(10));
        assert_eq!(VoiceId(3).clamped(), VoiceId(3));
    }

    #[test]
    fn lookup_by_name_ignores_case() {
        assert_eq!(find_voice_by_name("BM_George").unwrap().id, VoiceId(9));
        assert!(find_voice_by_name("zz_nobody").is_none());
    }

    #[test]
    fn unknown_voice_display_name() {
        assert_eq!(display_name(VoiceId(99)), "Voice 99");
        assert_eq!(display_name(VoiceId(7)), "Emma");
    }
}
