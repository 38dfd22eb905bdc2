use std::fmt::Write;

use serde_json::{Map, Value, json};

use super::{FieldType, Schema};

impl Schema {
    /// Renders this schema as a JSON Schema object.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                let mut property = match field.ty {
                    FieldType::Text => json!({ "type": "string" }),
                    FieldType::TextList => json!({
                        "type": "array",
                        "items": { "type": "string" },
                    }),
                };
                property["description"] = field.description.into();
                (field.name.to_owned(), property)
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect();

        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Text telling the model how to shape its final answer.
    ///
    /// The output is the same for the same schema, so it can be embedded
    /// in a system prompt once.
    pub fn format_instructions(&self) -> String {
        // `Value`'s pretty printer cannot fail on an in-memory tree.
        let schema = serde_json::to_string_pretty(&self.json_schema())
            .unwrap_or_default();

        let mut text = String::from(
            "When you have the final answer, the output must be formatted \
             as a JSON instance that conforms to the JSON schema below.\n\n\
             As an example, for the schema {\"properties\": {\"foo\": \
             {\"title\": \"Foo\", \"description\": \"a list of strings\", \
             \"type\": \"array\", \"items\": {\"type\": \"string\"}}}, \
             \"required\": [\"foo\"]}\n\
             the object {\"foo\": [\"bar\", \"baz\"]} is a well-formatted \
             instance of the schema. The object {\"properties\": {\"foo\": \
             [\"bar\", \"baz\"]}} is not well-formatted.\n\n\
             Here is the output schema:\n```\n",
        );
        text.push_str(&schema);
        text.push_str("\n```\n\nFields:\n");
        for field in self.fields {
            let presence = if field.required { "required" } else { "optional" };
            let _ = writeln!(
                text,
                "- `{}` ({}, {presence}): {}",
                field.name,
                field.ty.describe(),
                field.description,
            );
        }
        text.push_str(
            "\nDo not add fields that are not listed. Respond with the JSON \
             object only, with no other text.",
        );
        text
    }
}
