//! Declarative schema for JSON values and the validator that walks it.
//!
//! A schema is a tree of [`Schema`] nodes. Each node is a string, object or
//! array rule, or [`SchemaKind::Any`] for a node that declares no type and
//! therefore accepts everything. Validation never fails early across
//! siblings: every violation is reported as a human-readable message
//! prefixed with its dotted field path (`repository.url`, `versions[0].zipUrl`).
//!
//! A property is required if and only if its key appears in the enclosing
//! object's `required` list. `optional` on a node is informational only.

use regex::Regex;
use serde_json::Value;

/// Constraints applied to a string value.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<String>>,
}

/// Constraints applied to an object value.
#[derive(Debug, Clone, Default)]
pub struct ObjectRules {
    pub required: Vec<String>,
    /// Declared properties, checked in declaration order
    pub properties: Vec<(String, Schema)>,
}

/// Constraints applied to an array value.
#[derive(Debug, Clone, Default)]
pub struct ArrayRules {
    pub min_items: Option<usize>,
    /// Schema every element must satisfy
    pub items: Option<Box<Schema>>,
}

#[derive(Debug, Clone)]
pub enum SchemaKind {
    Any,
    String(StringRules),
    Object(ObjectRules),
    Array(ArrayRules),
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub kind: SchemaKind,
    pub optional: bool,
}

impl Schema {
    fn with_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn any() -> Self {
        Self::with_kind(SchemaKind::Any)
    }

    pub fn string() -> Self {
        Self::with_kind(SchemaKind::String(StringRules::default()))
    }

    pub fn object() -> Self {
        Self::with_kind(SchemaKind::Object(ObjectRules::default()))
    }

    pub fn array() -> Self {
        Self::with_kind(SchemaKind::Array(ArrayRules::default()))
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    // Modifiers below only apply to the matching kind and are ignored otherwise.

    pub fn min_length(mut self, min: usize) -> Self {
        if let SchemaKind::String(ref mut rules) = self.kind {
            rules.min_length = Some(min);
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let SchemaKind::String(ref mut rules) = self.kind {
            rules.max_length = Some(max);
        }
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        if let SchemaKind::String(ref mut rules) = self.kind {
            rules.pattern = Some(pattern);
        }
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        if let SchemaKind::String(ref mut rules) = self.kind {
            rules.allowed = Some(allowed.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    pub fn required(mut self, keys: &[&str]) -> Self {
        if let SchemaKind::Object(ref mut rules) = self.kind {
            rules.required = keys.iter().map(|k| k.to_string()).collect();
        }
        self
    }

    pub fn property(mut self, key: &str, schema: Schema) -> Self {
        if let SchemaKind::Object(ref mut rules) = self.kind {
            rules.properties.push((key.to_string(), schema));
        }
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        if let SchemaKind::Array(ref mut rules) = self.kind {
            rules.min_items = Some(min);
        }
        self
    }

    pub fn items(mut self, schema: Schema) -> Self {
        if let SchemaKind::Array(ref mut rules) = self.kind {
            rules.items = Some(Box::new(schema));
        }
        self
    }
}

/// Validate `value` against `schema`, labelling messages with `field_path`.
///
/// Returns an empty vector when the value conforms.
pub fn validate(value: &Value, schema: &Schema, field_path: &str) -> Vec<String> {
    let mut errors = Vec::new();
    validate_into(value, schema, field_path, &mut errors);
    errors
}

fn validate_into(value: &Value, schema: &Schema, path: &str, errors: &mut Vec<String>) {
    match &schema.kind {
        SchemaKind::Any => {}
        SchemaKind::String(rules) => validate_string(value, rules, path, errors),
        SchemaKind::Object(rules) => validate_object(value, rules, path, errors),
        SchemaKind::Array(rules) => validate_array(value, rules, path, errors),
    }
}

fn validate_string(value: &Value, rules: &StringRules, path: &str, errors: &mut Vec<String>) {
    let Some(s) = value.as_str() else {
        errors.push(format!("{} must be a string", path));
        return;
    };

    // Length in UTF-16 code units
    let length = s.encode_utf16().count();
    if let Some(min) = rules.min_length
        && length < min
    {
        errors.push(format!("{} must be at least {} characters", path, min));
    }
    if let Some(max) = rules.max_length
        && length > max
    {
        errors.push(format!("{} must be at most {} characters", path, max));
    }
    if let Some(ref pattern) = rules.pattern
        && !pattern.is_match(s)
    {
        errors.push(format!("{} format is invalid", path));
    }
    if let Some(ref allowed) = rules.allowed
        && !allowed.iter().any(|a| a == s)
    {
        errors.push(format!("{} must be one of: {}", path, allowed.join(", ")));
    }
}

fn validate_object(value: &Value, rules: &ObjectRules, path: &str, errors: &mut Vec<String>) {
    let Some(object) = value.as_object() else {
        errors.push(format!("{} must be an object", path));
        return;
    };

    for key in &rules.required {
        if !object.contains_key(key) {
            errors.push(format!("{} is required", join_path(path, key)));
        }
    }

    for (key, property_schema) in &rules.properties {
        if let Some(property) = object.get(key) {
            validate_into(property, property_schema, &join_path(path, key), errors);
        }
    }
}

fn validate_array(value: &Value, rules: &ArrayRules, path: &str, errors: &mut Vec<String>) {
    let Some(elements) = value.as_array() else {
        errors.push(format!("{} must be an array", path));
        return;
    };

    if let Some(min) = rules.min_items
        && elements.len() < min
    {
        errors.push(format!("{} must contain at least {} item(s)", path, min));
    }

    if let Some(ref item_schema) = rules.items {
        for (index, element) in elements.iter().enumerate() {
            validate_into(element, item_schema, &format!("{}[{}]", path, index), errors);
        }
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
