/// Phrases the speech-to-text layer produces when the caller did not really
/// answer.  Matched exactly against the lowercased, trimmed transcript.
const NON_ANSWERS: &[&str] = &[
    "unknown",
    "unclear",
    "silence",
    "no response",
    "um",
    "uh",
    "er",
    "hmm",
    "nothing",
    "none",
    "i don't know",
    "not sure",
    "skip",
];

/// Classify a raw transcript as a usable answer or a non-answer.
///
/// Returns the trimmed, original-case value when accepted, `None` otherwise.
/// The lowercased copy is used only for the accept/reject decision.  Pure
/// function, no I/O.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if NON_ANSWERS.contains(&lowered.as_str()) || trimmed.chars().count() < 2 {
        return None;
    }
    Some(trimmed.to_string())
}
