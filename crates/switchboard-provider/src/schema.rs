//! Lowering of [`ParamSchema`] into backend schema languages.

use crate::types::ParamSchema;
use serde_json::{json, Map, Value};

/// Which schema language a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// JSON Schema with lowercase type names (Anthropic, OpenAI, Groq).
    JsonSchema,
    /// The OpenAPI subset used by Google: uppercase type names, enums only on
    /// strings.
    OpenApi,
}

impl Dialect {
    fn type_name(self, name: &'static str) -> Value {
        match self {
            Dialect::JsonSchema => json!(name),
            Dialect::OpenApi => json!(name.to_ascii_uppercase()),
        }
    }
}

/// Recursively convert a parameter schema.
pub fn lower(schema: &ParamSchema, dialect: Dialect) -> Value {
    let mut out = Map::new();
    match schema {
        ParamSchema::Object { properties, .. } => {
            out.insert("type".into(), dialect.type_name("object"));
            let mut props = Map::new();
            let mut required = Vec::new();
            for param in properties {
                props.insert(param.key.clone(), lower(&param.schema, dialect));
                if param.required {
                    required.push(json!(param.key));
                }
            }
            out.insert("properties".into(), Value::Object(props));
            if !required.is_empty() {
                out.insert("required".into(), Value::Array(required));
            }
        }
        ParamSchema::Array { items, limit, .. } => {
            out.insert("type".into(), dialect.type_name("array"));
            out.insert("items".into(), lower(items, dialect));
            if let Some(limit) = limit {
                out.insert("maxItems".into(), json!(limit));
            }
        }
        ParamSchema::String { enum_values, .. } => {
            out.insert("type".into(), dialect.type_name("string"));
            if let Some(values) = enum_values {
                out.insert("enum".into(), json!(values));
                if dialect == Dialect::OpenApi {
                    out.insert("format".into(), json!("enum"));
                }
            }
        }
        ParamSchema::Number { enum_values, .. } => {
            out.insert("type".into(), dialect.type_name("number"));
            if let (Some(values), Dialect::JsonSchema) = (enum_values, dialect) {
                out.insert("enum".into(), json!(values));
            }
        }
        ParamSchema::Boolean { .. } => {
            out.insert("type".into(), dialect.type_name("boolean"));
        }
    }
    if let Some(description) = schema.description() {
        out.insert("description".into(), json!(description));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Param;

    fn sample() -> ParamSchema {
        ParamSchema::object(vec![
            Param::required("path", ParamSchema::string().describe("File path")),
            Param::optional(
                "mode",
                ParamSchema::String {
                    description: None,
                    enum_values: Some(vec!["r".to_string(), "w".to_string()]),
                },
            ),
            Param::optional(
                "lines",
                ParamSchema::Array {
                    description: None,
                    items: Box::new(ParamSchema::Number {
                        description: None,
                        enum_values: Some(vec![1.0, 2.0]),
                    }),
                    limit: Some(3),
                },
            ),
            Param::optional("force", ParamSchema::boolean()),
        ])
    }

    #[test]
    fn test_lower_json_schema() {
        let schema = lower(&sample(), Dialect::JsonSchema);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["path"]));
        assert_eq!(schema["properties"]["path"]["description"], "File path");
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["r", "w"]));
        assert_eq!(schema["properties"]["lines"]["maxItems"], 3);
        assert_eq!(schema["properties"]["lines"]["items"]["enum"], json!([1.0, 2.0]));
        assert_eq!(schema["properties"]["force"]["type"], "boolean");
    }

    #[test]
    fn test_lower_openapi() {
        let schema = lower(&sample(), Dialect::OpenApi);
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["mode"]["format"], "enum");
        assert_eq!(schema["properties"]["lines"]["type"], "ARRAY");
        assert!(schema["properties"]["lines"]["items"].get("enum").is_none());
    }

    #[test]
    fn test_object_without_required_members() {
        let schema = lower(&ParamSchema::object(vec![]), Dialect::JsonSchema);
        assert_eq!(schema, json!({"type": "object", "properties": {}}));
    }
}
