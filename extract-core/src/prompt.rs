//! Prompt templates and rendering.
//!
//! Rendering substitutes `{name}` placeholders, then appends the formatting
//! block derived from the schema. On repair attempts a corrective note is
//! inserted between the two.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::extraction::error::ExtractionError;
use crate::framing::{ITEM_MARKER, close_marker, open_marker};
use crate::schema::{FieldKind, FieldSpec, SchemaDescriptor};

/// Opening paragraph of every formatting block.
pub const FORMAT_PREAMBLE: &str = "Answer using exactly the layout below. Put every marker such as [[name]] \
on a line of its own, exactly as written, and write the value on the lines that follow it. \
Do not add any other markers.";

/// A prompt template with `{name}` placeholders.
///
/// `{{` and `}}` produce literal braces. Braces that do not enclose an
/// identifier are left as they are, so JSON snippets survive unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: Option<String>,
    body: String,
}

impl PromptTemplate {
    /// Creates a template from its body text.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            system: None,
            body: body.into(),
        }
    }

    /// Adds a system preamble, itself a template, rendered ahead of the body.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Template body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// System preamble, if any.
    #[must_use]
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Placeholder names referenced by the template, in first-use order.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for text in self.system.iter().chain(std::iter::once(&self.body)) {
            scan(text, |token| {
                if let Token::Placeholder(name) = token {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            });
        }
        names
    }
}

/// Runtime values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(BTreeMap<String, String>);

impl Arguments {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument (fluent).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces an argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Looks an argument up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Final prompt text for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    text: String,
    attempt: usize,
}

impl RenderedPrompt {
    /// Prompt text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 1-based attempt this prompt was rendered for.
    #[must_use]
    pub const fn attempt(&self) -> usize {
        self.attempt
    }
}

impl AsRef<str> for RenderedPrompt {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RenderedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Renders the first-attempt prompt.
pub fn render(
    template: &PromptTemplate,
    arguments: &Arguments,
    schema: &SchemaDescriptor,
) -> Result<RenderedPrompt, ExtractionError> {
    render_attempt(template, arguments, schema, 1, None)
}

/// Renders the prompt for `attempt`, inserting `correction` (if any) ahead of
/// the formatting block.
pub fn render_attempt(
    template: &PromptTemplate,
    arguments: &Arguments,
    schema: &SchemaDescriptor,
    attempt: usize,
    correction: Option<&str>,
) -> Result<RenderedPrompt, ExtractionError> {
    let mut text = String::new();

    if let Some(system) = &template.system {
        text.push_str(substitute(system, arguments)?.trim_end());
        text.push_str("\n\n");
    }
    text.push_str(substitute(&template.body, arguments)?.trim_end());
    text.push_str("\n\n");

    if let Some(note) = correction {
        text.push_str(note.trim_end());
        text.push_str("\n\n");
    }

    text.push_str(&format_instructions(schema));

    Ok(RenderedPrompt { text, attempt })
}

/// Formatting block for `schema`: one marker per field with its kind and hint.
///
/// # Examples
///
/// ```
/// use llm_extract_core::prompt::format_instructions;
/// use llm_extract_core::schema::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::builder().text("claim", "the main assertion").build().unwrap();
/// let block = format_instructions(&schema);
/// assert!(block.contains("[[claim]]\n<text: the main assertion>"));
/// ```
#[must_use]
pub fn format_instructions(schema: &SchemaDescriptor) -> String {
    let mut block = String::from(FORMAT_PREAMBLE);
    block.push_str("\n\n");
    write_fields(&mut block, schema);
    block
}

fn write_fields(out: &mut String, schema: &SchemaDescriptor) {
    for field in schema.fields() {
        let _ = writeln!(out, "{}", open_marker(field.name()));
        match field.kind() {
            FieldKind::Nested(inner) => {
                write_fields(out, inner);
                let _ = writeln!(out, "{}", close_marker(field.name()));
            }
            FieldKind::List(element) if matches!(**element, FieldKind::Nested(_)) => {
                if let FieldKind::Nested(inner) = element.as_ref() {
                    let _ = writeln!(out, "{}", open_marker(ITEM_MARKER));
                    write_fields(out, inner);
                    let _ = writeln!(out, "{}", close_marker(ITEM_MARKER));
                    let _ = writeln!(
                        out,
                        "(repeat the {} ... {} block once per element)",
                        open_marker(ITEM_MARKER),
                        close_marker(ITEM_MARKER)
                    );
                }
                let _ = writeln!(out, "{}", close_marker(field.name()));
            }
            _ => {
                let _ = writeln!(out, "{}", placeholder_line(field));
            }
        }
    }
}

fn placeholder_line(field: &FieldSpec) -> String {
    let mut line = match field.kind() {
        FieldKind::List(element) => format!(
            "list of {}, one element per line starting with \"- \"",
            element.describe()
        ),
        kind => kind.describe(),
    };
    if !field.is_required() {
        line.push_str(", optional: leave empty if not applicable");
    }
    if let Some(hint) = field.hint().filter(|h| !h.trim().is_empty()) {
        line.push_str(": ");
        line.push_str(hint.trim());
    }
    format!("<{line}>")
}

enum Token<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Walks `template`, reporting literal runs and placeholders in order.
fn scan<'a>(template: &'a str, mut emit: impl FnMut(Token<'a>)) {
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                // Escaped brace: keep one of the pair.
                emit(Token::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => match identifier_len(&bytes[i + 1..]) {
                Some(len) => {
                    emit(Token::Literal(&template[literal_start..i]));
                    emit(Token::Placeholder(&template[i + 1..i + 1 + len]));
                    i += len + 2;
                    literal_start = i;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    emit(Token::Literal(&template[literal_start..]));
}

/// Length of an identifier followed by `}` at the start of `rest`.
fn identifier_len(rest: &[u8]) -> Option<usize> {
    let first = *rest.first()?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let len = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    (rest.get(len) == Some(&b'}')).then_some(len)
}

fn substitute(template: &str, arguments: &Arguments) -> Result<String, ExtractionError> {
    let mut out = String::with_capacity(template.len());
    let mut missing: Option<String> = None;

    scan(template, |token| match token {
        Token::Literal(text) => out.push_str(text),
        Token::Placeholder(name) => match arguments.get(name) {
            Some(value) => out.push_str(value),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
            }
        },
    });

    match missing {
        Some(name) => Err(ExtractionError::Template {
            detail: format!("no argument supplied for placeholder {{{name}}}"),
            placeholder: Some(name),
        }),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaDescriptor {
        let warrant = SchemaDescriptor::builder()
            .text("statement", "the linking assumption")
            .build()
            .unwrap();
        SchemaDescriptor::builder()
            .text("claim", "the main assertion")
            .field(FieldSpec::new("stance", FieldKind::one_of(["support", "attack"])))
            .field(FieldSpec::new("keywords", FieldKind::list_of(FieldKind::Text)))
            .field(FieldSpec::new("rebuttal", FieldKind::Text).optional())
            .field(FieldSpec::new("warrant", FieldKind::Nested(warrant.clone())))
            .field(FieldSpec::new("premises", FieldKind::list_of(FieldKind::Nested(warrant))))
            .build()
            .unwrap()
    }

    #[test]
    fn test_substitution_and_escapes() {
        let template = PromptTemplate::new("Analyze {{this}}:\n```\n{content}\n```\n{\"json\": 1} {content}");
        let args = Arguments::new().with("content", "TEXT").with("unused", "ignored");
        let prompt = render(&template, &args, &schema()).unwrap();

        assert!(prompt
            .as_str()
            .starts_with("Analyze {this}:\n```\nTEXT\n```\n{\"json\": 1} TEXT\n\n"));
        assert!(!prompt.as_str().contains("ignored"));
        assert_eq!(prompt.attempt(), 1);
    }

    #[test]
    fn test_missing_argument_is_template_error() {
        let template = PromptTemplate::new("Summarize {content} for {audience}");
        let err = render(&template, &Arguments::new().with("content", "x"), &schema()).unwrap_err();
        match err {
            ExtractionError::Template { placeholder, detail } => {
                assert_eq!(placeholder.as_deref(), Some("audience"));
                assert!(detail.contains("{audience}"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_system_preamble_is_a_template_too() {
        let template = PromptTemplate::new("Body").with_system("You analyze {genre} texts.");
        let prompt = render(&template, &Arguments::new().with("genre", "technical"), &schema()).unwrap();
        assert!(prompt.as_str().starts_with("You analyze technical texts.\n\nBody\n\n"));
        assert_eq!(template.placeholders(), ["genre"]);
    }

    #[test]
    fn test_format_block_lists_fields_in_order() {
        let block = format_instructions(&schema());
        let expected = "[[claim]]\n<text: the main assertion>\n\
                        [[stance]]\n<one of: support | attack>\n\
                        [[keywords]]\n<list of text, one element per line starting with \"- \">\n\
                        [[rebuttal]]\n<text, optional: leave empty if not applicable>\n\
                        [[warrant]]\n[[statement]]\n<text: the linking assumption>\n[[/warrant]]\n\
                        [[premises]]\n[[item]]\n[[statement]]\n<text: the linking assumption>\n[[/item]]\n";
        assert!(block.starts_with(FORMAT_PREAMBLE));
        assert!(block.contains(expected), "{block}");
        assert!(block.ends_with("[[/premises]]\n"));
    }

    #[test]
    fn test_correction_goes_before_format_block() {
        let template = PromptTemplate::new("Body");
        let prompt = render_attempt(
            &template,
            &Arguments::new(),
            &schema(),
            2,
            Some("Field `stance` was wrong."),
        )
        .unwrap();
        let text = prompt.as_str();

        let note = text.find("Field `stance` was wrong.").unwrap();
        let block = text.find(FORMAT_PREAMBLE).unwrap();
        assert!(text.find("Body").unwrap() < note);
        assert!(note < block);
        assert_eq!(prompt.attempt(), 2);
        assert!(text.ends_with(&format_instructions(&schema())));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let template = PromptTemplate::new("{content}");
        let args = Arguments::from_iter([("content", "doc")]);
        assert_eq!(
            render(&template, &args, &schema()).unwrap(),
            render(&template, &args, &schema()).unwrap()
        );
    }
}
