//! Sentence segmentation for narration.
//!
//! Boundaries come from the Unicode text segmentation algorithm (UAX #29),
//! which already keeps decimals (`3.14`), closing quotes and brackets
//! attached to their sentence. UAX #29 has no abbreviation dictionary, so a
//! second pass re-joins segments that end in a title abbreviation
//! (`Dr.`, `Mrs.`) or in an initial that belongs to a name
//! (`J. R. R. Tolkien`, `George R. Martin`), while a lone capital after an
//! ordinary word (`plan B.`) still ends the sentence.

use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that are virtually never sentence-final in narrative text.
///
/// Lower-cased, without the trailing period.
const NON_TERMINAL_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "e.g", "i.e", "fig", "gen",
    "col", "capt", "lt", "sgt", "rev", "hon",
];

/// Split text into an ordered list of non-empty, trimmed sentences.
///
/// A blank line always ends a sentence, so headings and list items without
/// terminal punctuation stay separate. Single line breaks inside a
/// paragraph are treated as hard wrapping and collapsed like any other
/// whitespace. Empty or whitespace-only input yields an empty list.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in paragraphs(text) {
        split_paragraph(&collapse_whitespace(&paragraph), &mut sentences);
    }
    sentences
}

/// Group lines into paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

fn split_paragraph(paragraph: &str, sentences: &mut Vec<String>) {
    let segments: Vec<String> = paragraph
        .split_sentence_bounds()
        .map(collapse_whitespace)
        .filter(|segment| !segment.is_empty())
        .collect();
    let mut pending = String::new();

    for (i, segment) in segments.iter().enumerate() {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(segment);

        let next = segments.get(i + 1).map(String::as_str);
        if !continues_into(&pending, next) {
            sentences.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        sentences.push(pending);
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}

/// Whether `segment` ends in an abbreviation that UAX #29 wrongly took for
/// a sentence end, so that it must be joined with `next`.
fn continues_into(segment: &str, next: Option<&str>) -> bool {
    let mut words = segment.split_whitespace().rev();
    let Some(last_word) = words.next() else {
        return false;
    };
    let Some(stem) = word_stem(last_word).strip_suffix('.') else {
        return false;
    };

    if NON_TERMINAL_ABBREVIATIONS
        .iter()
        .any(|abbr| stem.eq_ignore_ascii_case(abbr))
    {
        return true;
    }
    if !is_initial(stem) {
        return false;
    }

    // "George R. Martin", "J. R. R. Tolkien": the initial follows a name or
    // another initial, or more initials follow it.
    let after_name = words.next().map(word_stem).is_some_and(|previous| {
        previous.strip_suffix('.').is_some_and(is_initial)
            || previous.chars().next().is_some_and(char::is_uppercase)
    });
    let before_initial = next
        .and_then(|next| next.split_whitespace().next())
        .map(word_stem)
        .and_then(|first| first.strip_suffix('.'))
        .is_some_and(is_initial);

    after_name || before_initial
}

/// A word without leading punctuation. Opening punctuation may precede an
/// initial: "(J. Smith".
fn word_stem(word: &str) -> &str {
    word.trim_start_matches(|c: char| !c.is_alphanumeric())
}

/// A lone capital letter.
fn is_initial(stem: &str) -> bool {
    let mut chars = stem.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}
