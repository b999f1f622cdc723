//! Sentences command handler.
//!
//! Prints the segmentation `narrate speak` would use, with the indices that
//! `--from` and the interactive `j N` command expect.

use std::path::Path;

use anyhow::Result;
use narrate_engine::split_sentences;

use crate::input::read_text;

/// Execute the sentences command.
pub fn execute(file: Option<&Path>) -> Result<()> {
    let text = read_text(file)?;
    let sentences = split_sentences(&text);
    if sentences.is_empty() {
        println!("No sentences found.");
        return Ok(());
    }

    for line in numbered(&sentences) {
        println!("{line}");
    }
    Ok(())
}

fn numbered(sentences: &[String]) -> Vec<String> {
    let width = sentences.len().saturating_sub(1).to_string().len();
    sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| format!("{i:>width$}  {sentence}"))
        .collect()
}
