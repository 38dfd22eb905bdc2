use std::fmt::{self, Display, Formatter};

use serde_json::{Map, Value};
use thiserror::Error;

use super::{FieldType, Schema};

/// Why a decoded reply does not fit the schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Violation {
    /// The top-level value is not an object.
    NotAnObject,
    /// A required field is absent.
    MissingField(&'static str),
    /// A field is present with the wrong shape.
    WrongType {
        /// The field name.
        field: &'static str,
        /// What the schema asks for.
        expected: FieldType,
    },
    /// A key the schema does not declare.
    UnexpectedField(String),
}

impl Violation {
    /// The offending field, if the violation concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Violation::NotAnObject => None,
            Violation::MissingField(field)
            | Violation::WrongType { field, .. } => Some(field),
            Violation::UnexpectedField(field) => Some(field),
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAnObject => {
                write!(f, "expected a JSON object at the top level")
            }
            Violation::MissingField(field) => {
                write!(f, "missing required field `{field}`")
            }
            Violation::WrongType { field, expected } => {
                write!(f, "field `{field}` must be {}", expected.describe())
            }
            Violation::UnexpectedField(field) => {
                write!(f, "unexpected field `{field}`")
            }
        }
    }
}

/// The final reply could not be turned into a record.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The text is not JSON at all.
    #[error("output is not valid JSON: {reason}")]
    Decode {
        /// The decoder's message.
        reason: String,
        /// The offending text.
        raw: String,
    },
    /// The text is JSON but does not match the schema.
    #[error("output does not match the schema: {violation}")]
    SchemaViolation {
        /// What is wrong.
        violation: Violation,
        /// The offending text.
        raw: String,
    },
}

impl OutputError {
    /// The raw model text that failed validation.
    pub fn raw(&self) -> &str {
        match self {
            OutputError::Decode { raw, .. }
            | OutputError::SchemaViolation { raw, .. } => raw,
        }
    }

    /// The schema violation, if decoding succeeded.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            OutputError::Decode { .. } => None,
            OutputError::SchemaViolation { violation, .. } => Some(violation),
        }
    }
}

impl Schema {
    /// Decodes `raw` and checks it against this schema.
    ///
    /// Surrounding whitespace and a single Markdown code fence around the
    /// JSON are tolerated. Anything else is all-or-nothing: the first
    /// missing or mistyped field (in schema order) is reported, then the
    /// first undeclared key.
    pub fn validate(&self, raw: &str) -> Result<Map<String, Value>, OutputError> {
        let violation = |violation| OutputError::SchemaViolation {
            violation,
            raw: raw.to_owned(),
        };

        let value: Value = serde_json::from_str(strip_code_fence(raw))
            .map_err(|err| OutputError::Decode {
                reason: err.to_string(),
                raw: raw.to_owned(),
            })?;
        let Value::Object(map) = value else {
            return Err(violation(Violation::NotAnObject));
        };

        for field in self.fields {
            match map.get(field.name) {
                None if field.required => {
                    return Err(violation(Violation::MissingField(field.name)));
                }
                None => {}
                Some(value) if !field.ty.matches(value) => {
                    return Err(violation(Violation::WrongType {
                        field: field.name,
                        expected: field.ty,
                    }));
                }
                Some(_) => {}
            }
        }

        if let Some(key) = map.keys().find(|key| self.field(key).is_none()) {
            return Err(violation(Violation::UnexpectedField(key.clone())));
        }

        Ok(map)
    }
}

/// Returns the body of a fenced block, or the trimmed text if there is no
/// fence.
fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match rest.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with(['{', '[']) => {
            body.trim()
        }
        _ => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::RESEARCH_RECORD;

    fn valid() -> Value {
        json!({
            "topic": "t",
            "summary": "s",
            "sources": ["a"],
            "tools_used": []
        })
    }

    fn violation_of(value: &Value) -> Violation {
        let err = RESEARCH_RECORD.validate(&value.to_string()).unwrap_err();
        err.violation().cloned().unwrap()
    }

    #[test]
    fn test_accepts_valid_record() {
        let map = RESEARCH_RECORD.validate(&valid().to_string()).unwrap();
        assert_eq!(Value::Object(map), valid());
    }

    #[test]
    fn test_missing_fields_are_named() {
        for field in RESEARCH_RECORD.fields {
            let mut value = valid();
            value.as_object_mut().unwrap().remove(field.name);
            let violation = violation_of(&value);
            assert_eq!(violation, Violation::MissingField(field.name));
            assert_eq!(violation.field(), Some(field.name));
        }
    }

    #[test]
    fn test_wrong_shapes() {
        let cases = [
            ("topic", json!(["t"])),
            ("summary", Value::Null),
            ("sources", json!("https://example.com")),
            ("sources", json!(["ok", 3])),
            ("tools_used", json!(null)),
        ];
        for (field, bad) in cases {
            let mut value = valid();
            value[field] = bad;
            let violation = violation_of(&value);
            assert_eq!(violation.field(), Some(field), "{value}");
            assert!(matches!(violation, Violation::WrongType { .. }));
        }
    }

    #[test]
    fn test_rejects_extra_fields() {
        let mut value = valid();
        value["confidence"] = json!("high");
        assert_eq!(
            violation_of(&value),
            Violation::UnexpectedField("confidence".to_owned())
        );
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(violation_of(&json!(["topic"])), Violation::NotAnObject);
        assert_eq!(violation_of(&json!("topic")), Violation::NotAnObject);
    }

    #[test]
    fn test_undecodable_text_is_a_decode_error() {
        for raw in [
            "",
            "Paris is the capital of France.",
            r#"{"topic": "t", "summary": "s""#,
            "{topic: t}",
            "```json\n{\"topic\": }\n```",
        ] {
            let err = RESEARCH_RECORD.validate(raw).unwrap_err();
            assert!(matches!(err, OutputError::Decode { .. }), "{raw:?}");
            assert_eq!(err.raw(), raw);
            assert!(err.violation().is_none());
        }
    }

    #[test]
    fn test_code_fences() {
        let body = valid().to_string();
        for raw in [
            format!("```json\n{body}\n```"),
            format!("```\n{body}\n```"),
            format!("  \n```{body}```\n"),
            format!("\n{body}\n"),
        ] {
            assert!(RESEARCH_RECORD.validate(&raw).is_ok(), "{raw:?}");
        }
    }

    #[test]
    fn test_trailing_prose_is_rejected() {
        let raw = format!("{}\nHope this helps!", valid());
        assert!(matches!(
            RESEARCH_RECORD.validate(&raw),
            Err(OutputError::Decode { .. })
        ));
    }
}
