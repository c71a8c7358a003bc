//! Corrective notes for repair attempts.

use super::error::{ParseError, ParseErrorKind};
use crate::framing::{close_marker, open_marker};

/// Build the corrective note inserted into the next prompt after a parse failure.
///
/// Includes:
/// - Attempt counter (e.g., "Attempt 1/3")
/// - The failing field and what was wrong with it
/// - Optionally, the start of the previous response (so the model can compare)
/// - Instruction to answer again using the layout
///
/// # Examples
///
/// ```
/// use llm_extract_core::extraction::build_repair_note;
/// use llm_extract_core::parser::parse;
/// use llm_extract_core::schema::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::builder().number("confidence", "").build().unwrap();
/// let error = parse("[[confidence]] high", &schema).unwrap_err();
///
/// let note = build_repair_note(&error, 1, 3, None);
/// assert!(note.contains("Attempt 1/3"));
/// assert!(note.contains("[[confidence]]"));
/// ```
#[must_use]
pub fn build_repair_note(
    error: &ParseError,
    attempt: usize,
    max_attempts: usize,
    previous_response: Option<&str>,
) -> String {
    let mut note = format!(
        "Attempt {attempt}/{max_attempts}: your previous answer could not be used.\n\n"
    );

    note.push_str(&describe_problem(error));
    note.push('\n');

    if let Some(previous) = previous_response {
        note.push_str("\nYour previous answer began with:\n");
        note.push_str(previous);
        note.push('\n');
    }

    note.push_str("\nFix this problem and answer again using the layout below.");
    note
}

fn describe_problem(error: &ParseError) -> String {
    let name = marker_name(&error.field);
    let marker = open_marker(name);
    match error.kind {
        ParseErrorKind::MissingField if error.detail.starts_with("closing marker") => format!(
            "Problem with field `{}` ({}): {}. Close the block with {} after its contents.",
            error.field,
            error.expected,
            error.detail,
            close_marker(name),
        ),
        ParseErrorKind::MissingField => format!(
            "Problem with field `{}`: the marker {marker} was missing. Include it, followed by a {}.",
            error.field, error.expected
        ),
        ParseErrorKind::TypeMismatch | ParseErrorKind::EnumMismatch => format!(
            "Problem with field `{}` under {marker}: expected {}, but {}.",
            error.field, error.expected, error.detail
        ),
    }
}

/// Marker name of the innermost field in a dotted path such as `people[2].age`.
fn marker_name(path: &str) -> &str {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    leaf.split('[').next().unwrap_or(leaf)
}

/// Truncate `text` to at most `limit` characters, appending "..." when cut.
///
/// Counts characters, not bytes, so multi-byte text is never split mid-character.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
