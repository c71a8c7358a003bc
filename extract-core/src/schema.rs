//! Target record descriptions: ordered, named, typed fields.
//!
//! A [`SchemaDescriptor`] is built once per record type through
//! [`SchemaBuilder`], which enforces the descriptor invariants up front so
//! that rendering and parsing never have to re-check them.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Errors raised while building a [`SchemaDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A descriptor must declare at least one field.
    #[error("schema must declare at least one field")]
    Empty,

    /// Field name is empty or contains characters reserved by the framing convention.
    #[error("invalid field name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two fields share a name (names are compared case-insensitively).
    #[error("duplicate field name {0:?}")]
    DuplicateField(String),

    /// An enum field declared no allowed values.
    #[error("enum field {0:?} has no allowed values")]
    EmptyEnum(String),

    /// An enum field declared the same allowed value twice.
    #[error("enum field {field:?} lists {value:?} more than once")]
    DuplicateEnumValue {
        /// Field declaring the enum.
        field: String,
        /// Repeated value.
        value: String,
    },

    /// The field kind cannot be expressed by the framing convention.
    #[error("field {field:?}: {reason}")]
    UnsupportedKind {
        /// Field declaring the kind.
        field: String,
        /// Why it is unsupported.
        reason: String,
    },

    /// A JSON Schema document could not be converted.
    #[error("cannot convert JSON Schema: {0}")]
    JsonSchema(String),
}

/// Semantic type of a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text, taken verbatim (trimmed).
    Text,
    /// Decimal number.
    Number,
    /// Whole number; fractional answers are rejected.
    Integer,
    /// Yes/no style flag.
    Boolean,
    /// One of a closed set of values, matched case-insensitively.
    Enum(Vec<String>),
    /// Sequence of values of a single element kind.
    List(Box<FieldKind>),
    /// A sub-record described by its own schema.
    Nested(SchemaDescriptor),
}

impl FieldKind {
    /// Shorthand for an enum kind.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Shorthand for a list kind.
    #[must_use]
    pub fn list_of(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Short human-readable name, used in prompts and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Text => "text".to_string(),
            Self::Number => "number".to_string(),
            Self::Integer => "whole number".to_string(),
            Self::Boolean => "boolean (yes or no)".to_string(),
            Self::Enum(values) => format!("one of: {}", values.join(" | ")),
            Self::List(element) => format!("list of {}", element.describe()),
            Self::Nested(_) => "record".to_string(),
        }
    }

    /// Whether values of this kind are written as a closed `[[name]]` ... `[[/name]]` block.
    #[must_use]
    pub fn is_block(&self) -> bool {
        match self {
            Self::Nested(_) => true,
            Self::List(element) => matches!(**element, Self::Nested(_)),
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One named field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    hint: Option<String>,
    required: bool,
}

impl FieldSpec {
    /// Creates a required field without a hint.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            hint: None,
            required: true,
        }
    }

    /// Attaches a generation hint shown to the model next to the field.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Marks the field optional: an absent or empty value becomes null.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Field name, as written in its marker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic kind.
    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Generation hint, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Whether the field must be present in every response.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// Ordered, immutable description of a target record.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    title: Option<String>,
    fields: Vec<FieldSpec>,
}

impl SchemaDescriptor {
    /// Returns a builder for a new descriptor.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Validates the given fields and builds a descriptor from them.
    pub fn from_fields(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        SchemaBuilder {
            title: None,
            fields,
        }
        .build()
    }

    /// Optional record title (used only for display).
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks a field up by name, case-insensitively.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a built descriptor; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`SchemaDescriptor`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    title: Option<String>,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    /// Sets the record title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Appends a required text field with a hint.
    #[must_use]
    pub fn text(self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.field(FieldSpec::new(name, FieldKind::Text).with_hint(hint))
    }

    /// Appends a required number field with a hint.
    #[must_use]
    pub fn number(self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.field(FieldSpec::new(name, FieldKind::Number).with_hint(hint))
    }

    /// Appends a required whole-number field with a hint.
    #[must_use]
    pub fn integer(self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.field(FieldSpec::new(name, FieldKind::Integer).with_hint(hint))
    }

    /// Appends a required boolean field with a hint.
    #[must_use]
    pub fn boolean(self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.field(FieldSpec::new(name, FieldKind::Boolean).with_hint(hint))
    }

    /// Validates every invariant and returns the descriptor.
    pub fn build(self) -> Result<SchemaDescriptor, SchemaError> {
        validate_fields(&self.fields)?;
        Ok(SchemaDescriptor {
            title: self.title,
            fields: self.fields,
        })
    }
}

fn validate_fields(fields: &[FieldSpec]) -> Result<(), SchemaError> {
    if fields.is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut seen = HashSet::new();
    for field in fields {
        validate_name(&field.name)?;
        if !seen.insert(field.name.to_lowercase()) {
            return Err(SchemaError::DuplicateField(field.name.clone()));
        }
        validate_kind(&field.name, &field.kind, false)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.trim() != name {
        Some("name has leading or trailing whitespace")
    } else if name.contains(['[', ']', '/', '\n', '\r']) {
        Some("name contains one of '[', ']', '/' or a line break")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn validate_kind(field: &str, kind: &FieldKind, in_list: bool) -> Result<(), SchemaError> {
    match kind {
        FieldKind::Text | FieldKind::Number | FieldKind::Integer | FieldKind::Boolean => Ok(()),
        FieldKind::Enum(values) => {
            if values.is_empty() {
                return Err(SchemaError::EmptyEnum(field.to_string()));
            }
            let mut seen = HashSet::new();
            for value in values {
                if value.trim().is_empty() {
                    return Err(SchemaError::UnsupportedKind {
                        field: field.to_string(),
                        reason: "enum values must not be blank".to_string(),
                    });
                }
                if !seen.insert(value.to_lowercase()) {
                    return Err(SchemaError::DuplicateEnumValue {
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
            }
            Ok(())
        }
        FieldKind::List(element) => {
            if in_list {
                return Err(SchemaError::UnsupportedKind {
                    field: field.to_string(),
                    reason: "lists of lists cannot be framed".to_string(),
                });
            }
            validate_kind(field, element, true)
        }
        // Nested descriptors were validated when they were built.
        FieldKind::Nested(_) => Ok(()),
    }
}
