//! Recovers typed records from raw model output.
//!
//! Parsing fails fast: the first field problem, in schema order, is returned
//! and nothing else is collected. The retry loop feeds that single problem back
//! to the model, so each corrective prompt stays focused on one issue.

use crate::extraction::error::{ParseError, ParseErrorKind};
use crate::framing::{self, Located, close_marker, open_marker};
use crate::record::{ExtractedRecord, FieldValue};
use crate::schema::{FieldKind, FieldSpec, SchemaDescriptor};

const TRUTHY: &[&str] = &["true", "yes", "y", "on", "1"];
const FALSY: &[&str] = &["false", "no", "n", "off", "0"];

/// Parses `raw` against `schema`.
///
/// # Examples
///
/// ```
/// use llm_extract_core::parser::parse;
/// use llm_extract_core::schema::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::builder()
///     .text("claim", "the main assertion")
///     .number("confidence", "between 0 and 1")
///     .build()
///     .unwrap();
///
/// let record = parse("[[confidence]] 0.8\n[[claim]]\nContext can be paged.", &schema).unwrap();
/// assert_eq!(record.text("claim"), Some("Context can be paged."));
/// assert_eq!(record.number("confidence"), Some(0.8));
/// ```
pub fn parse(raw: &str, schema: &SchemaDescriptor) -> Result<ExtractedRecord, ParseError> {
    let lines: Vec<&str> = raw.lines().collect();
    parse_lines(&lines, schema, None)
}

fn parse_lines(
    lines: &[&str],
    schema: &SchemaDescriptor,
    parent: Option<&str>,
) -> Result<ExtractedRecord, ParseError> {
    let mut record = ExtractedRecord::default();

    for (field, located) in schema.fields().iter().zip(framing::locate(lines, schema)) {
        let path = parent.map_or_else(|| field.name().to_string(), |p| format!("{p}.{}", field.name()));
        let value = match located {
            None if field.is_required() => {
                return Err(ParseError::missing(
                    path,
                    field.kind().describe(),
                    format!("marker {} not found in response", open_marker(field.name())),
                ));
            }
            None => FieldValue::Null,
            Some(Located::Unclosed) => {
                return Err(ParseError::missing(
                    path,
                    field.kind().describe(),
                    format!("closing marker {} not found", close_marker(field.name())),
                ));
            }
            Some(Located::Value(text)) => {
                if text.is_empty() && !field.is_required() {
                    FieldValue::Null
                } else {
                    coerce_value(field, &text, &path)?
                }
            }
            Some(Located::Block(interior)) => coerce_block(field, interior, &path)?,
        };
        record.push(field.name(), value);
    }

    Ok(record)
}

fn coerce_block(field: &FieldSpec, interior: &[&str], path: &str) -> Result<FieldValue, ParseError> {
    match field.kind() {
        FieldKind::Nested(schema) => parse_lines(interior, schema, Some(path)).map(FieldValue::Record),
        FieldKind::List(element) => {
            let FieldKind::Nested(schema) = element.as_ref() else {
                return Err(block_mismatch(field, path));
            };
            let blocks = framing::items(interior, schema).map_err(|n| {
                ParseError::missing(
                    path.to_string(),
                    field.kind().describe(),
                    format!(
                        "closing marker {} not found for element {n}",
                        close_marker(framing::ITEM_MARKER)
                    ),
                )
            })?;

            let mut elements = Vec::with_capacity(blocks.len());
            for (index, block) in blocks.into_iter().enumerate() {
                let element_path = format!("{path}[{}]", index + 1);
                elements.push(FieldValue::Record(parse_lines(block, schema, Some(&element_path))?));
            }
            Ok(FieldValue::List(elements))
        }
        _ => Err(block_mismatch(field, path)),
    }
}

fn block_mismatch(field: &FieldSpec, path: &str) -> ParseError {
    ParseError::missing(
        path.to_string(),
        field.kind().describe(),
        "field is not a record block".to_string(),
    )
}

fn coerce_value(field: &FieldSpec, text: &str, path: &str) -> Result<FieldValue, ParseError> {
    match field.kind() {
        FieldKind::List(element) => {
            let mut items = Vec::new();
            for (index, raw) in framing::list_elements(text).iter().enumerate() {
                let item = coerce_scalar(element, raw, path).map_err(|mut e| {
                    e.detail = format!("element {}: {}", index + 1, e.detail);
                    e
                })?;
                items.push(item);
            }
            Ok(FieldValue::List(items))
        }
        kind => coerce_scalar(kind, text, path),
    }
}

fn coerce_scalar(kind: &FieldKind, raw: &str, path: &str) -> Result<FieldValue, ParseError> {
    let value = unquote(raw.trim());
    let mismatch = |detail: String| {
        ParseError::mismatch(
            ParseErrorKind::TypeMismatch,
            path.to_string(),
            kind.describe(),
            detail,
            value,
        )
    };

    match kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.trim().to_string())),
        FieldKind::Number => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
            _ => Err(mismatch(format!("expected a number, found {value:?}"))),
        },
        FieldKind::Integer => match value.parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 => Ok(FieldValue::Number(n)),
            _ => Err(mismatch(format!("expected a whole number, found {value:?}"))),
        },
        FieldKind::Boolean => {
            let lower = value.to_lowercase();
            if TRUTHY.contains(&lower.as_str()) {
                Ok(FieldValue::Boolean(true))
            } else if FALSY.contains(&lower.as_str()) {
                Ok(FieldValue::Boolean(false))
            } else {
                Err(mismatch(format!("expected yes or no, found {value:?}")))
            }
        }
        FieldKind::Enum(allowed) => {
            let lower = value.to_lowercase();
            allowed
                .iter()
                .find(|candidate| candidate.to_lowercase() == lower)
                .map(|canonical| FieldValue::Choice(canonical.clone()))
                .ok_or_else(|| {
                    ParseError::mismatch(
                        ParseErrorKind::EnumMismatch,
                        path.to_string(),
                        kind.describe(),
                        format!("{value:?} is not one of: {}", allowed.join(", ")),
                        value,
                    )
                })
        }
        FieldKind::List(_) | FieldKind::Nested(_) => {
            Err(mismatch(format!("expected a single {}, found {value:?}", kind.describe())))
        }
    }
}

/// Strips one pair of matching quotes or backticks.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].trim();
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stance() -> FieldKind {
        FieldKind::one_of(["support", "attack"])
    }

    fn toulmin() -> SchemaDescriptor {
        SchemaDescriptor::builder()
            .text("claim", "")
            .text("grounds", "")
            .text("warrant", "")
            .text("qualifier", "")
            .text("rebuttal", "")
            .text("backing", "")
            .build()
            .unwrap()
    }

    #[test]
    fn test_text_fields_round_trip() {
        let raw = "[[claim]]\nMemGPT extends context.\n[[grounds]]\nOS memory tiers.\n[[warrant]]\nPaging works.\n\
                   [[qualifier]]\nPresumably.\n[[rebuttal]]\nLatency may grow.\n[[backing]]\nDecades of OS research.";
        let record = parse(raw, &toulmin()).unwrap();
        assert_eq!(record.text("claim"), Some("MemGPT extends context."));
        assert_eq!(record.text("backing"), Some("Decades of OS research."));
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["claim", "grounds", "warrant", "qualifier", "rebuttal", "backing"]);
    }

    #[test]
    fn test_missing_marker_reports_only_that_field() {
        let raw = "[[claim]] a\n[[grounds]] b\n[[qualifier]] d\n[[rebuttal]] e\n[[backing]] f";
        let err = parse(raw, &toulmin()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert_eq!(err.field, "warrant");
        assert!(err.detail.contains("[[warrant]]"));
    }

    #[test]
    fn test_fails_fast_in_schema_order() {
        let schema = SchemaDescriptor::builder()
            .number("first", "")
            .number("second", "")
            .build()
            .unwrap();
        let err = parse("[[second]] nope\n[[first]] also nope", &schema).unwrap_err();
        assert_eq!(err.field, "first");
    }

    #[test]
    fn test_enum_is_case_insensitive_and_canonical() {
        let schema = SchemaDescriptor::from_fields(vec![FieldSpec::new("stance", stance())]).unwrap();

        let record = parse("[[stance]] SUPPORT", &schema).unwrap();
        assert_eq!(record.get("stance"), Some(&FieldValue::Choice("support".to_string())));

        let err = parse("[[stance]] neutral", &schema).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EnumMismatch);
        assert_eq!(err.raw.as_deref(), Some("neutral"));
        assert!(err.detail.contains("\"neutral\""));
    }

    #[test]
    fn test_numbers_and_booleans() {
        let schema = SchemaDescriptor::builder()
            .number("score", "")
            .boolean("explicit", "")
            .build()
            .unwrap();

        let record = parse("[[score]] \"-2.5\"\n[[explicit]] Yes", &schema).unwrap();
        assert_eq!(record.number("score"), Some(-2.5));
        assert_eq!(record.boolean("explicit"), Some(true));

        let err = parse("[[score]] high\n[[explicit]] no", &schema).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TypeMismatch);
        assert_eq!(err.raw.as_deref(), Some("high"));

        let err = parse("[[score]] inf\n[[explicit]] no", &schema).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TypeMismatch);

        let err = parse("[[score]] 1\n[[explicit]] maybe", &schema).unwrap_err();
        assert_eq!(err.field, "explicit");
    }

    #[test]
    fn test_number_list() {
        let schema = SchemaDescriptor::from_fields(vec![FieldSpec::new(
            "scores",
            FieldKind::list_of(FieldKind::Number),
        )])
        .unwrap();

        let record = parse("[[scores]] 1, 2, 3", &schema).unwrap();
        assert_eq!(
            record.get("scores"),
            Some(&FieldValue::List(vec![
                FieldValue::Number(1.0),
                FieldValue::Number(2.0),
                FieldValue::Number(3.0),
            ]))
        );

        let err = parse("[[scores]] 1, x, 3", &schema).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TypeMismatch);
        assert_eq!(err.field, "scores");
        assert_eq!(err.raw.as_deref(), Some("x"));
        assert!(err.detail.starts_with("element 2"));
    }

    #[test]
    fn test_nested_record_is_compositional() {
        let inner = SchemaDescriptor::builder()
            .text("statement", "")
            .field(FieldSpec::new("stance", stance()))
            .build()
            .unwrap();
        let outer = SchemaDescriptor::builder()
            .text("claim", "")
            .field(FieldSpec::new("warrant", FieldKind::Nested(inner.clone())))
            .build()
            .unwrap();

        let sub_block = "[[stance]] attack\n[[statement]]\nPaging is old news.";
        let raw = format!("[[warrant]]\n{sub_block}\n[[/warrant]]\n[[claim]] c");
        let record = parse(&raw, &outer).unwrap();

        assert_eq!(record.record("warrant"), Some(&parse(sub_block, &inner).unwrap()));
        assert_eq!(record.text("claim"), Some("c"));
    }

    #[test]
    fn test_nested_errors_use_dotted_paths() {
        let inner = SchemaDescriptor::builder().number("strength", "").build().unwrap();
        let outer =
            SchemaDescriptor::from_fields(vec![FieldSpec::new("warrant", FieldKind::Nested(inner))]).unwrap();

        let err = parse("[[warrant]]\n[[strength]] strong\n[[/warrant]]", &outer).unwrap_err();
        assert_eq!(err.field, "warrant.strength");

        let err = parse("[[warrant]]\n[[strength]] 3", &outer).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert_eq!(err.field, "warrant");
        assert!(err.detail.contains("[[/warrant]]"));
    }

    #[test]
    fn test_record_list() {
        let person = SchemaDescriptor::builder()
            .text("name", "")
            .number("age", "")
            .build()
            .unwrap();
        let schema = SchemaDescriptor::from_fields(vec![FieldSpec::new(
            "people",
            FieldKind::list_of(FieldKind::Nested(person)),
        )])
        .unwrap();

        let raw = "[[people]]\n[[item]]\n[[name]] Ada\n[[age]] 36\n[[/item]]\n[[item]]\n[[name]] Alan\n[[age]] 41\n[[/item]]\n[[/people]]";
        let record = parse(raw, &schema).unwrap();
        let people = record.get("people").and_then(FieldValue::as_list).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[1].as_record().and_then(|p| p.text("name")), Some("Alan"));

        let bad = raw.replace("[[age]] 41", "[[age]] old");
        assert_eq!(parse(&bad, &schema).unwrap_err().field, "people[2].age");
    }

    #[test]
    fn test_inner_field_reuses_block_name() {
        let inner = SchemaDescriptor::builder().text("address", "").text("city", "").build().unwrap();
        let schema =
            SchemaDescriptor::from_fields(vec![FieldSpec::new("address", FieldKind::Nested(inner))]).unwrap();

        let record = parse(
            "[[address]]\n[[address]] 1 Main St\n[[city]] Springfield\n[[/address]]",
            &schema,
        )
        .unwrap();
        let address = record.record("address").unwrap();
        assert_eq!(address.text("address"), Some("1 Main St"));
        assert_eq!(address.text("city"), Some("Springfield"));
    }

    #[test]
    fn test_list_element_field_named_item() {
        let line = SchemaDescriptor::builder().text("item", "").number("qty", "").build().unwrap();
        let schema = SchemaDescriptor::from_fields(vec![FieldSpec::new(
            "lines",
            FieldKind::list_of(FieldKind::Nested(line)),
        )])
        .unwrap();

        let raw = "[[lines]]\n[[item]]\n[[item]] apple\n[[qty]] 2\n[[/item]]\n[[item]]\n[[item]] pear\n[[qty]] 5\n[[/item]]\n[[/lines]]";
        let record = parse(raw, &schema).unwrap();
        let lines = record.get("lines").and_then(FieldValue::as_list).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_record().and_then(|l| l.text("item")), Some("apple"));
        assert_eq!(lines[1].as_record().and_then(|l| l.number("qty")), Some(5.0));
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let schema = SchemaDescriptor::from_fields(vec![
            FieldSpec::new("count", FieldKind::Integer),
            FieldSpec::new("sizes", FieldKind::list_of(FieldKind::Integer)),
        ])
        .unwrap();

        let record = parse("[[count]] 3\n[[sizes]] 1, -2, 4.0", &schema).unwrap();
        assert_eq!(record.number("count"), Some(3.0));
        assert_eq!(record.to_json()["sizes"], serde_json::json!([1, -2, 4]));

        let err = parse("[[count]] 2.5\n[[sizes]] 1", &schema).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TypeMismatch);
        assert_eq!(err.field, "count");
        assert_eq!(err.raw.as_deref(), Some("2.5"));

        let err = parse("[[count]] 1\n[[sizes]] 1, 1.5", &schema).unwrap_err();
        assert_eq!(err.field, "sizes");
    }

    #[test]
    fn test_optional_fields_become_null() {
        let schema = SchemaDescriptor::builder()
            .text("claim", "")
            .field(FieldSpec::new("rebuttal", FieldKind::Text).optional())
            .field(FieldSpec::new("confidence", FieldKind::Number).optional())
            .build()
            .unwrap();

        let record = parse("[[claim]] c\n[[confidence]]\n", &schema).unwrap();
        assert_eq!(record.get("rebuttal"), Some(&FieldValue::Null));
        assert_eq!(record.get("confidence"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_record_outlives_response_buffer() {
        let schema = SchemaDescriptor::builder().text("claim", "").build().unwrap();
        let record = {
            let raw = String::from("[[claim]] owned");
            parse(&raw, &schema).unwrap()
        };
        assert_eq!(record.text("claim"), Some("owned"));
    }
}
