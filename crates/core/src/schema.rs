//! The shape of the final answer.
//!
//! A [`Schema`] is a plain list of fields. The same list drives both the
//! instructions shown to the model ([`Schema::format_instructions`]) and
//! the check applied to its reply ([`Schema::validate`]), so the two can
//! never disagree.

mod instructions;
mod validator;

use serde::Serialize;
use serde_json::{Map, Value};

pub use validator::{OutputError, Violation};

/// The type of a field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A JSON string.
    Text,
    /// A JSON array whose items are all strings.
    TextList,
}

impl FieldType {
    /// Returns `true` if `value` has this type. `null` never matches.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Text => value.is_string(),
            FieldType::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    /// A short human-readable name, e.g. for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            FieldType::Text => "a string",
            FieldType::TextList => "an array of strings",
        }
    }
}

/// One field of a [`Schema`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SchemaField {
    /// The JSON key.
    pub name: &'static str,
    /// The value type.
    pub ty: FieldType,
    /// Whether the key must be present.
    pub required: bool,
    /// Shown to the model next to the field.
    pub description: &'static str,
}

/// A flat record type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Schema {
    /// The record name shown to the model.
    pub title: &'static str,
    /// Fields in presentation order.
    pub fields: &'static [SchemaField],
}

impl Schema {
    /// Looks up a field by its JSON key.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// The schema of [`ResearchRecord`].
pub const RESEARCH_RECORD: Schema = Schema {
    title: "ResearchRecord",
    fields: &[
        SchemaField {
            name: "topic",
            ty: FieldType::Text,
            required: true,
            description: "The subject of the research.",
        },
        SchemaField {
            name: "summary",
            ty: FieldType::Text,
            required: true,
            description: "A concise answer summarizing the findings.",
        },
        SchemaField {
            name: "sources",
            ty: FieldType::TextList,
            required: true,
            description: "Where the information came from (URLs or page titles). May be empty.",
        },
        SchemaField {
            name: "tools_used",
            ty: FieldType::TextList,
            required: true,
            description: "Names of the tools used to produce the answer. May be empty.",
        },
    ],
};

/// The validated final answer of a research run.
///
/// The only way to obtain one is [`ResearchRecord::parse`], so every value
/// of this type has passed validation against [`RESEARCH_RECORD`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ResearchRecord {
    topic: String,
    summary: String,
    sources: Vec<String>,
    tools_used: Vec<String>,
}

impl ResearchRecord {
    /// Validates the model's raw final text and builds a record from it.
    pub fn parse(raw: &str) -> Result<Self, OutputError> {
        let mut map = RESEARCH_RECORD.validate(raw)?;
        Ok(Self {
            topic: take_text(&mut map, "topic"),
            summary: take_text(&mut map, "summary"),
            sources: take_text_list(&mut map, "sources"),
            tools_used: take_text_list(&mut map, "tools_used"),
        })
    }

    /// The subject of the research.
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The answer.
    #[inline]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Where the information came from, in the model's order.
    #[inline]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Tools the model reports having used.
    #[inline]
    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }
}

// Validation has already checked presence and type of every field.
fn take_text(map: &mut Map<String, Value>, name: &str) -> String {
    match map.remove(name) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    }
}

fn take_text_list(map: &mut Map<String, Value>, name: &str) -> Vec<String> {
    match map.remove(name) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
