//! Conversion of JSON Schema documents (as produced by `schemars`) into
//! [`SchemaDescriptor`]s.
//!
//! Supported: object `properties` with `required`, `description` hints,
//! `string`/`number`/`integer`/`boolean`/`array`/`object` types, string
//! `enum`s and `oneOf`/`anyOf` of string constants, nullable unions (which
//! make a field optional), and `$ref` into `$defs` or `definitions`.
//! Recursive references are rejected.

use std::collections::HashSet;

use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::schema::{FieldKind, FieldSpec, SchemaDescriptor, SchemaError};

impl SchemaDescriptor {
    /// Builds a descriptor from a JSON Schema object.
    ///
    /// Property order is preserved. A property is optional when it is missing
    /// from `required` or its type admits `null`.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_extract_core::schema::{FieldKind, SchemaDescriptor};
    /// use serde_json::json;
    ///
    /// let schema = SchemaDescriptor::from_json_schema(&json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "claim": { "type": "string", "description": "the main assertion" },
    ///         "stance": { "type": "string", "enum": ["support", "attack"] }
    ///     },
    ///     "required": ["claim", "stance"]
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(schema.fields()[0].hint(), Some("the main assertion"));
    /// assert_eq!(schema.fields()[1].kind(), &FieldKind::one_of(["support", "attack"]));
    /// ```
    ///
    /// # Errors
    ///
    /// `SchemaError::JsonSchema` for documents without object properties or
    /// with dangling references, `SchemaError::UnsupportedKind` for types the
    /// framing convention cannot express, and any descriptor validation error.
    pub fn from_json_schema(schema: &Value) -> Result<Self, SchemaError> {
        let converter = Converter { root: schema };
        let mut stack = vec!["#".to_string()];
        let fields = converter.fields(schema, "", &mut stack)?;

        let mut builder = Self::builder();
        if let Some(title) = schema.get("title").and_then(Value::as_str) {
            builder = builder.title(title);
        }
        fields
            .into_iter()
            .fold(builder, |builder, field| builder.field(field))
            .build()
    }

    /// Builds a descriptor from the JSON Schema that `schemars` derives for `T`.
    ///
    /// # Errors
    ///
    /// Same as [`from_json_schema`](Self::from_json_schema).
    pub fn for_type<T: JsonSchema>() -> Result<Self, SchemaError> {
        let value = serde_json::to_value(schema_for!(T))
            .map_err(|e| SchemaError::JsonSchema(e.to_string()))?;
        Self::from_json_schema(&value)
    }
}

struct Converter<'a> {
    root: &'a Value,
}

impl<'a> Converter<'a> {
    fn fields(
        &self,
        node: &'a Value,
        path: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<FieldSpec>, SchemaError> {
        let properties = node
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                let at = if path.is_empty() { "root" } else { path };
                SchemaError::JsonSchema(format!("{at}: object schema has no properties"))
            })?;

        let required: HashSet<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        properties
            .iter()
            .map(|(name, property)| {
                let path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                self.field(name, property, required.contains(name.as_str()), &path, stack)
            })
            .collect()
    }

    fn field(
        &self,
        name: &str,
        property: &'a Value,
        required: bool,
        path: &str,
        stack: &mut Vec<String>,
    ) -> Result<FieldSpec, SchemaError> {
        let (inner, nullable) = strip_null(property);
        let kind = self.kind(inner, path, stack)?;

        let mut spec = FieldSpec::new(name, kind);
        if let Some(hint) = description(property).or_else(|| self.described(inner)) {
            spec = spec.with_hint(hint);
        }
        if !required || nullable {
            spec = spec.optional();
        }
        Ok(spec)
    }

    fn kind(
        &self,
        node: &'a Value,
        path: &str,
        stack: &mut Vec<String>,
    ) -> Result<FieldKind, SchemaError> {
        if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
            if stack.iter().any(|seen| seen == reference) {
                return Err(unsupported(path, format!("recursive reference {reference}")));
            }
            let target = self.resolve(reference, path)?;
            stack.push(reference.to_string());
            let kind = self.kind(target, path, stack);
            stack.pop();
            return kind;
        }

        if let Some([only]) = node.get("allOf").and_then(Value::as_array).map(Vec::as_slice) {
            return self.kind(only, path, stack);
        }

        if let Some(values) = string_choices(node) {
            return values
                .map(FieldKind::Enum)
                .map_err(|reason| unsupported(path, reason));
        }

        match primary_type(node) {
            Some("string") => Ok(FieldKind::Text),
            Some("number") => Ok(FieldKind::Number),
            Some("integer") => Ok(FieldKind::Integer),
            Some("boolean") => Ok(FieldKind::Boolean),
            Some("array") => {
                let items = node
                    .get("items")
                    .ok_or_else(|| unsupported(path, "array without items".to_string()))?;
                let (items, _) = strip_null(items);
                Ok(FieldKind::list_of(self.kind(items, path, stack)?))
            }
            Some("object") => self.nested(node, path, stack),
            None if node.get("properties").is_some() => self.nested(node, path, stack),
            Some(other) => Err(unsupported(path, format!("unsupported type {other:?}"))),
            None => Err(unsupported(path, "no usable type".to_string())),
        }
    }

    fn nested(
        &self,
        node: &'a Value,
        path: &str,
        stack: &mut Vec<String>,
    ) -> Result<FieldKind, SchemaError> {
        let fields = self.fields(node, path, stack)?;
        Ok(FieldKind::Nested(SchemaDescriptor::from_fields(fields)?))
    }

    fn resolve(&self, reference: &str, path: &str) -> Result<&'a Value, SchemaError> {
        reference
            .strip_prefix('#')
            .and_then(|pointer| self.root.pointer(pointer))
            .ok_or_else(|| {
                SchemaError::JsonSchema(format!("{path}: unresolvable reference {reference}"))
            })
    }

    fn described(&self, node: &'a Value) -> Option<&'a str> {
        description(node).or_else(|| {
            let reference = node.get("$ref").and_then(Value::as_str)?;
            description(self.resolve(reference, "").ok()?)
        })
    }
}

fn description(node: &Value) -> Option<&str> {
    node.get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Removes a `null` alternative, reporting whether one was present.
fn strip_null(node: &Value) -> (&Value, bool) {
    for key in ["anyOf", "oneOf"] {
        if let Some([a, b]) = node.get(key).and_then(Value::as_array).map(Vec::as_slice) {
            if is_null(b) {
                return (a, true);
            }
            if is_null(a) {
                return (b, true);
            }
        }
    }

    let nullable = match node.get("type") {
        Some(Value::Array(types)) => types.iter().any(|t| t == "null"),
        _ => false,
    } || node
        .get("enum")
        .and_then(Value::as_array)
        .is_some_and(|values| values.iter().any(Value::is_null));
    (node, nullable)
}

fn is_null(node: &Value) -> bool {
    node.get("type").is_some_and(|t| t == "null")
}

/// The single non-null `type` of a node.
fn primary_type(node: &Value) -> Option<&str> {
    match node.get("type")? {
        Value::String(t) => Some(t),
        Value::Array(types) => {
            let mut non_null = types.iter().filter_map(Value::as_str).filter(|t| *t != "null");
            let first = non_null.next()?;
            non_null.next().is_none().then_some(first)
        }
        _ => None,
    }
}

/// String choices from `enum`, `const`, or a `oneOf`/`anyOf` of constants.
///
/// `None` when the node is not a choice at all.
fn string_choices(node: &Value) -> Option<Result<Vec<String>, String>> {
    if let Some(values) = node.get("enum").and_then(Value::as_array) {
        return Some(strings(values.iter().filter(|v| !v.is_null())));
    }
    if let Some(value) = node.get("const") {
        return Some(strings(std::iter::once(value)));
    }

    for key in ["oneOf", "anyOf"] {
        let Some(branches) = node.get(key).and_then(Value::as_array) else {
            continue;
        };
        let constants: Option<Vec<&Value>> = branches
            .iter()
            .map(|branch| {
                branch.get("const").or_else(|| match branch.get("enum")?.as_array()?.as_slice() {
                    [single] => Some(single),
                    _ => None,
                })
            })
            .collect();
        return Some(match constants {
            Some(values) => strings(values.into_iter()),
            None => Err(format!("{key} alternatives other than constants are not supported")),
        });
    }
    None
}

fn strings<'v>(values: impl Iterator<Item = &'v Value>) -> Result<Vec<String>, String> {
    values
        .map(|value| match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(format!("enum value {other} is not a string")),
        })
        .collect()
}

fn unsupported(path: &str, reason: String) -> SchemaError {
    SchemaError::UnsupportedKind {
        field: path.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    /// A Toulmin-style argument.
    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Argument {
        /// The main assertion.
        claim: String,
        stance: Stance,
        confidence: f64,
        keywords: Vec<String>,
        warrant: Warrant,
        rebuttal: Option<String>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "lowercase")]
    enum Stance {
        Support,
        Attack,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Warrant {
        statement: String,
        strong: bool,
    }

    #[test]
    fn test_for_type_derives_fields_in_declaration_order() {
        let schema = SchemaDescriptor::for_type::<Argument>().unwrap();
        let names: Vec<&str> = schema.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(
            names,
            ["claim", "stance", "confidence", "keywords", "warrant", "rebuttal"]
        );

        assert_eq!(schema.title(), Some("Argument"));
        assert_eq!(schema.fields()[0].hint(), Some("The main assertion."));
        assert_eq!(
            schema.fields()[1].kind(),
            &FieldKind::one_of(["support", "attack"])
        );
        assert_eq!(schema.fields()[2].kind(), &FieldKind::Number);
        assert_eq!(schema.fields()[3].kind(), &FieldKind::list_of(FieldKind::Text));
        assert!(matches!(schema.fields()[4].kind(), FieldKind::Nested(inner) if inner.len() == 2));
        assert!(schema.fields()[4].is_required());
        assert!(!schema.fields()[5].is_required());
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Order {
        lines: Vec<Line>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Line {
        item: String,
        qty: u32,
    }

    #[test]
    fn test_integers_and_item_fields_survive_derivation() {
        let schema = SchemaDescriptor::for_type::<Order>().unwrap();
        let FieldKind::List(element) = schema.fields()[0].kind() else {
            panic!("expected a list");
        };
        let FieldKind::Nested(line) = element.as_ref() else {
            panic!("expected a record list");
        };
        assert_eq!(line.field("item").map(FieldSpec::kind), Some(&FieldKind::Text));
        assert_eq!(line.field("qty").map(FieldSpec::kind), Some(&FieldKind::Integer));

        let record = crate::parser::parse(
            "[[lines]]\n[[item]]\n[[item]] apple\n[[qty]] 2\n[[/item]]\n[[/lines]]",
            &schema,
        )
        .unwrap();
        let order: Order = record.deserialize().unwrap();
        assert_eq!(order.lines[0].item, "apple");
        assert_eq!(order.lines[0].qty, 2);
    }

    #[test]
    fn test_nullable_union_and_required() {
        let schema = SchemaDescriptor::from_json_schema(&json!({
            "type": "object",
            "properties": {
                "a": { "anyOf": [{ "type": "integer" }, { "type": "null" }] },
                "b": { "type": "boolean" },
                "c": { "type": "string" }
            },
            "required": ["a", "c"]
        }))
        .unwrap();

        assert_eq!(schema.fields()[0].kind(), &FieldKind::Integer);
        assert!(!schema.fields()[0].is_required());
        assert!(!schema.fields()[1].is_required());
        assert!(schema.fields()[2].is_required());
    }

    #[test]
    fn test_one_of_constants_is_enum() {
        let schema = SchemaDescriptor::from_json_schema(&json!({
            "properties": {
                "level": {
                    "oneOf": [
                        { "const": "low", "description": "barely" },
                        { "enum": ["high"] }
                    ]
                }
            },
            "required": ["level"]
        }))
        .unwrap();
        assert_eq!(schema.fields()[0].kind(), &FieldKind::one_of(["low", "high"]));
    }

    #[test]
    fn test_recursive_reference_rejected() {
        let err = SchemaDescriptor::from_json_schema(&json!({
            "type": "object",
            "properties": { "child": { "$ref": "#/$defs/Node" } },
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": { "next": { "$ref": "#/$defs/Node" } }
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedKind { ref field, .. } if field == "child.next"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            SchemaDescriptor::from_json_schema(&json!({ "type": "string" })),
            Err(SchemaError::JsonSchema(_))
        ));
        assert!(matches!(
            SchemaDescriptor::from_json_schema(&json!({
                "properties": { "x": { "$ref": "#/$defs/Missing" } }
            })),
            Err(SchemaError::JsonSchema(_))
        ));
        assert!(matches!(
            SchemaDescriptor::from_json_schema(&json!({
                "properties": { "grid": { "type": "array", "items": { "type": "array", "items": { "type": "number" } } } }
            })),
            Err(SchemaError::UnsupportedKind { .. })
        ));
    }
}
