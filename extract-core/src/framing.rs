//! The field-block framing convention shared by the prompt renderer, the
//! response parser and, through the rendered instructions, the model.
//!
//! ```text
//! [[claim]]
//! Memory tiers let a fixed context window behave as an unbounded one.
//! [[stance]] support
//! [[keywords]]
//! - memory
//! - paging
//! [[warrant]]
//! [[statement]]
//! Operating systems already solved this with virtual memory.
//! [[/warrant]]
//! ```
//!
//! * A marker is a line starting with `[[name]]`. Names match
//!   case-insensitively; surrounding `#`, `*` and `_` decoration is tolerated.
//!   Text following the marker on the same line starts the value.
//! * A plain value runs until the next marker line of any kind, or the end.
//! * Records (and lists of records) are closed blocks: `[[name]]` ...
//!   `[[/name]]`. The interior of a record block is framed against the nested
//!   schema alone. Elements of a record list are `[[item]]` ... `[[/item]]`
//!   blocks inside the list block.
//! * Blocks are closed against the schema: only a marker naming a record or
//!   record-list field of the enclosing schema opens an inner block. A leaf
//!   field may therefore share its name with an enclosing block, and element
//!   schemas may declare a leaf field called `item`. Inner blocks are skipped
//!   whole, so a block ends at the first `[[/name]]` outside them.
//! * Scalar lists hold one element per line (bullets stripped) or, on a
//!   single line, comma separated elements.
//! * Text before the first marker is ignored, markers may come in any order,
//!   and when a marker repeats the first occurrence wins.

use crate::schema::{FieldKind, SchemaDescriptor};

/// Marker name for elements of a record list.
pub const ITEM_MARKER: &str = "item";

/// Opening marker for a field.
#[must_use]
pub fn open_marker(name: &str) -> String {
    format!("[[{name}]]")
}

/// Closing marker for a block field.
#[must_use]
pub fn close_marker(name: &str) -> String {
    format!("[[/{name}]]")
}

/// A marker recognised on a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker<'a> {
    Open { name: &'a str, rest: &'a str },
    Close { name: &'a str },
}

impl Marker<'_> {
    fn opens(&self, field: &str) -> bool {
        matches!(self, Marker::Open { name, .. } if name.eq_ignore_ascii_case(field))
    }

    fn closes(&self, field: &str) -> bool {
        matches!(self, Marker::Close { name } if name.eq_ignore_ascii_case(field))
    }
}

/// Recognises a marker at the start of `line`.
pub(crate) fn marker(line: &str) -> Option<Marker<'_>> {
    let line = line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '_'));
    let after_open = line.strip_prefix("[[")?;
    let end = after_open.find("]]")?;
    let inner = after_open[..end].trim();
    if inner.is_empty() || inner.contains('[') {
        return None;
    }

    if let Some(name) = inner.strip_prefix('/') {
        let name = name.trim();
        return (!name.is_empty()).then_some(Marker::Close { name });
    }

    let rest = after_open[end + 2..]
        .trim_start_matches(|c: char| matches!(c, '*' | '_' | ':'))
        .trim();
    Some(Marker::Open { name: inner, rest })
}

/// Where a field's value was found in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Located<'a> {
    /// Plain value text.
    Value(String),
    /// Interior lines of a closed block.
    Block(&'a [&'a str]),
    /// The block was opened but never closed.
    Unclosed,
}

/// Finds every field of `schema` in `lines`, returned in schema field order.
pub(crate) fn locate<'a>(lines: &'a [&'a str], schema: &SchemaDescriptor) -> Vec<Option<Located<'a>>> {
    let fields = schema.fields();
    let mut found: Vec<Option<Located<'a>>> = vec![None; fields.len()];

    let mut i = 0;
    while i < lines.len() {
        let Some(Marker::Open { name, rest }) = marker(lines[i]) else {
            i += 1;
            continue;
        };
        let Some(index) = fields.iter().position(|f| f.name().eq_ignore_ascii_case(name)) else {
            i += 1;
            continue;
        };

        let (located, next) = if let Some(body) = Body::of(fields[index].kind()) {
            match find_close(lines, i + 1, name, body) {
                Some(close) => (Located::Block(&lines[i + 1..close]), close + 1),
                None => (Located::Unclosed, i + 1),
            }
        } else {
            let end = next_marker(lines, i + 1);
            (Located::Value(join_value(rest, &lines[i + 1..end])), end)
        };

        if found[index].is_none() {
            found[index] = Some(located);
        }
        i = next;
    }

    found
}

/// Splits the interior of a record-list block into element blocks, each
/// framed against `element`.
///
/// Returns `Err(n)` with the 1-based element number when an element block is
/// never closed.
pub(crate) fn items<'a>(lines: &'a [&'a str], element: &SchemaDescriptor) -> Result<Vec<&'a [&'a str]>, usize> {
    let mut elements = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if marker(lines[i]).is_some_and(|m| m.opens(ITEM_MARKER)) {
            let close = find_close(lines, i + 1, ITEM_MARKER, Body::Record(element)).ok_or(elements.len() + 1)?;
            elements.push(&lines[i + 1..close]);
            i = close + 1;
        } else {
            i += 1;
        }
    }
    Ok(elements)
}

/// Splits a scalar list value into raw element strings.
pub(crate) fn list_elements(value: &str) -> Vec<String> {
    let lines: Vec<&str> = value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    match lines.as_slice() {
        [] => Vec::new(),
        [single] if strip_bullet(single).is_none() => single
            .split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect(),
        many => many
            .iter()
            .map(|&line| strip_bullet(line).unwrap_or(line).trim().to_string())
            .collect(),
    }
}

/// Strips a leading list bullet (`-`, `*`, `+`, `•`, `1.`, `1)`).
fn strip_bullet(line: &str) -> Option<&str> {
    for bullet in ['-', '*', '+', '•'] {
        if let Some(rest) = line.strip_prefix(bullet) {
            if rest.starts_with(char::is_whitespace) {
                return Some(rest.trim_start());
            }
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if rest.starts_with(char::is_whitespace) {
                return Some(rest.trim_start());
            }
        }
    }
    None
}

/// What a closed block holds, which decides the markers that open inner blocks.
#[derive(Debug, Clone, Copy)]
enum Body<'s> {
    /// Fields of a record.
    Record(&'s SchemaDescriptor),
    /// `[[item]]` elements of a record list.
    Items(&'s SchemaDescriptor),
}

impl<'s> Body<'s> {
    fn of(kind: &'s FieldKind) -> Option<Self> {
        match kind {
            FieldKind::Nested(schema) => Some(Self::Record(schema)),
            FieldKind::List(element) => match element.as_ref() {
                FieldKind::Nested(schema) => Some(Self::Items(schema)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Body of the inner block opened by `[[name]]`, if that marker opens one.
    fn child(self, name: &str) -> Option<Self> {
        match self {
            Self::Record(schema) => schema
                .fields()
                .iter()
                .find(|f| f.name().eq_ignore_ascii_case(name))
                .and_then(|f| Self::of(f.kind())),
            Self::Items(schema) => name.eq_ignore_ascii_case(ITEM_MARKER).then_some(Self::Record(schema)),
        }
    }
}

/// Index of the line closing the `name` block whose interior starts at `start`.
///
/// Inner blocks are skipped whole; leaf markers never nest, whatever their name.
fn find_close(lines: &[&str], start: usize, name: &str, body: Body<'_>) -> Option<usize> {
    let mut i = start;
    while i < lines.len() {
        match marker(lines[i]) {
            Some(m) if m.closes(name) => return Some(i),
            Some(Marker::Open { name: inner, .. }) => {
                if let Some(child) = body.child(inner) {
                    i = find_close(lines, i + 1, inner, child)?;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn next_marker(lines: &[&str], start: usize) -> usize {
    lines[start..]
        .iter()
        .position(|line| marker(line).is_some())
        .map_or(lines.len(), |offset| start + offset)
}

fn join_value(first: &str, lines: &[&str]) -> String {
    let mut value = first.to_string();
    for line in lines {
        if !value.is_empty() {
            value.push('\n');
        }
        value.push_str(line);
    }
    value.trim().to_string()
}
