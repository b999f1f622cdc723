//! Voices command handler.

use std::fmt::Write;

use anyhow::Result;
use narrate_engine::voice::{VoiceAccent, VoiceGender};
use narrate_engine::{KOKORO_VOICES, VoiceId, VoiceInfo};

/// Execute the voices command: print the voice catalogue.
pub fn execute() -> Result<()> {
    print!("{}", render_table(KOKORO_VOICES));
    Ok(())
}

fn render_table(voices: &[VoiceInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<12} {:<9} {:<8} {:<6} DESCRIPTION",
        "ID", "NAME", "DISPLAY", "ACCENT", "GENDER"
    );
    for voice in voices {
        let marker = if voice.id == VoiceId::DEFAULT { " (default)" } else { "" };
        let _ = writeln!(
            out,
            "{:>3}  {:<12} {:<9} {:<8} {:<6} {}{marker}",
            voice.id.0,
            voice.name,
            voice.display_name,
            accent_label(voice.accent),
            gender_label(voice.gender),
            voice.description,
        );
    }
    out
}

const fn accent_label(accent: VoiceAccent) -> &'static str {
    match accent {
        VoiceAccent::American => "American",
        VoiceAccent::British => "British",
    }
}

const fn gender_label(gender: VoiceGender) -> &'static str {
    match gender {
        VoiceGender::Female => "female",
        VoiceGender::Male => "male",
    }
}
