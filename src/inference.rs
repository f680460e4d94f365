use crate::formats;
use crate::schema::{ObjectSchema, PrimitiveType, SchemaNode};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct InferOptions {
    /// Mark every key with a non-null value as required.
    pub strict: bool,
}

pub struct SchemaInferencer;

impl SchemaInferencer {
    /// Arrays are typed from their first element only.
    pub fn infer(value: &Value, options: InferOptions) -> SchemaNode {
        match value {
            Value::Null => SchemaNode::primitive(PrimitiveType::Null),
            Value::Bool(_) => SchemaNode::primitive(PrimitiveType::Boolean),
            Value::Number(number) => SchemaNode::primitive(number_type(number)),
            Value::String(text) => match formats::detect(text) {
                Some(format) => SchemaNode::with_format(PrimitiveType::String, format),
                None => SchemaNode::primitive(PrimitiveType::String),
            },
            Value::Array(items) => SchemaNode::array_of(
                items
                    .first()
                    .map(|first| Self::infer(first, options))
                    .unwrap_or(SchemaNode::Any),
            ),
            Value::Object(fields) => infer_object(fields, options),
        }
    }
}

fn infer_object(fields: &Map<String, Value>, options: InferOptions) -> SchemaNode {
    let properties = fields
        .iter()
        .map(|(key, value)| (key.clone(), SchemaInferencer::infer(value, options)))
        .collect();

    let required = if options.strict {
        fields
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, _)| key.clone())
            .collect()
    } else {
        Vec::new()
    };

    SchemaNode::Object(ObjectSchema {
        properties,
        required,
        keywords: Map::new(),
    })
}

fn number_type(number: &Number) -> PrimitiveType {
    if number.is_i64() || number.is_u64() {
        return PrimitiveType::Integer;
    }
    match number.as_f64() {
        Some(float) if float.is_finite() && float.fract() == 0.0 => PrimitiveType::Integer,
        _ => PrimitiveType::Number,
    }
}
