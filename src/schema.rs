use crate::error::{ProbeError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Null => "null",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveType::String),
            "integer" => Some(PrimitiveType::Integer),
            "number" => Some(PrimitiveType::Number),
            "boolean" => Some(PrimitiveType::Boolean),
            "null" => Some(PrimitiveType::Null),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AnyOf,
    OneOf,
    AllOf,
}

impl Combinator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
            Combinator::AllOf => "allOf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub keywords: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub items: Box<SchemaNode>,
    pub keywords: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSchema {
    pub kind: PrimitiveType,
    pub format: Option<String>,
    pub keywords: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub values: Vec<Value>,
    pub kind: Option<PrimitiveType>,
    pub keywords: Map<String, Value>,
}

/// Shapes the union does not model (boolean schemas, `type` arrays) are
/// carried through untouched as `Opaque`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Any,
    Ref(String),
    Object(ObjectSchema),
    Array(ArraySchema),
    Primitive(PrimitiveSchema),
    Enum(EnumSchema),
    Composite(Combinator, Vec<SchemaNode>),
    Opaque(Value),
}

impl SchemaNode {
    pub fn primitive(kind: PrimitiveType) -> Self {
        SchemaNode::Primitive(PrimitiveSchema {
            kind,
            format: None,
            keywords: Map::new(),
        })
    }

    pub fn with_format(kind: PrimitiveType, format: &str) -> Self {
        SchemaNode::Primitive(PrimitiveSchema {
            kind,
            format: Some(format.to_string()),
            keywords: Map::new(),
        })
    }

    pub fn array_of(items: SchemaNode) -> Self {
        SchemaNode::Array(ArraySchema {
            items: Box::new(items),
            keywords: Map::new(),
        })
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, SchemaNode::Ref(_))
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return SchemaNode::Opaque(value.clone());
        };

        if object.is_empty() {
            return SchemaNode::Any;
        }

        if let Some(pointer) = object.get("$ref").and_then(Value::as_str) {
            return SchemaNode::Ref(pointer.to_string());
        }

        let type_name = object.get("type").and_then(Value::as_str);

        if let Some(Value::Array(values)) = object.get("enum") {
            return SchemaNode::Enum(EnumSchema {
                values: values.clone(),
                kind: type_name.and_then(PrimitiveType::parse),
                keywords: remaining(object, &["enum", "type"]),
            });
        }

        if object.get("type").is_none() {
            for combinator in [Combinator::AnyOf, Combinator::OneOf, Combinator::AllOf] {
                if let Some(Value::Array(members)) = object.get(combinator.keyword()) {
                    if object.len() == 1 {
                        return SchemaNode::Composite(
                            combinator,
                            members.iter().map(SchemaNode::from_value).collect(),
                        );
                    }
                }
            }
        }

        match type_name {
            Some("object") if has_object_shape(object) => object_schema(object),
            Some("object") => SchemaNode::Opaque(value.clone()),
            Some("array") => array_schema(object),
            Some(_) if !matches!(object.get("format"), None | Some(Value::String(_))) => {
                SchemaNode::Opaque(value.clone())
            }
            Some(name) => match PrimitiveType::parse(name) {
                Some(kind) => SchemaNode::Primitive(PrimitiveSchema {
                    kind,
                    format: object
                        .get("format")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    keywords: remaining(object, &["type", "format"]),
                }),
                None => SchemaNode::Opaque(value.clone()),
            },
            None if object.get("type").is_none()
                && object.contains_key("properties")
                && has_object_shape(object) =>
            {
                object_schema(object)
            }
            None if object.get("type").is_none() && object.contains_key("items") => {
                array_schema(object)
            }
            None => SchemaNode::Opaque(value.clone()),
        }
    }

    /// OpenAPI 3.0 `nullable: true` becomes a `[type, "null"]` union.
    pub fn to_value(&self) -> Value {
        match self {
            SchemaNode::Any => Value::Object(Map::new()),
            SchemaNode::Ref(pointer) => {
                let mut map = Map::new();
                map.insert("$ref".to_string(), Value::String(pointer.clone()));
                Value::Object(map)
            }
            SchemaNode::Object(schema) => {
                let mut map = schema.keywords.clone();
                let properties: Map<String, Value> = schema
                    .properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_value()))
                    .collect();
                map.insert("properties".to_string(), Value::Object(properties));
                if !schema.required.is_empty() {
                    map.insert(
                        "required".to_string(),
                        Value::Array(schema.required.iter().cloned().map(Value::String).collect()),
                    );
                }
                with_type(map, "object")
            }
            SchemaNode::Array(schema) => {
                let mut map = schema.keywords.clone();
                map.insert("items".to_string(), schema.items.to_value());
                with_type(map, "array")
            }
            SchemaNode::Primitive(schema) => {
                let mut map = schema.keywords.clone();
                if let Some(format) = &schema.format {
                    map.insert("format".to_string(), Value::String(format.clone()));
                }
                with_type(map, schema.kind.as_str())
            }
            SchemaNode::Enum(schema) => {
                let mut map = schema.keywords.clone();
                map.insert("enum".to_string(), Value::Array(schema.values.clone()));
                match schema.kind {
                    Some(kind) => with_type(map, kind.as_str()),
                    None => Value::Object(map),
                }
            }
            SchemaNode::Composite(combinator, members) => {
                let mut map = Map::new();
                map.insert(
                    combinator.keyword().to_string(),
                    Value::Array(members.iter().map(SchemaNode::to_value).collect()),
                );
                Value::Object(map)
            }
            SchemaNode::Opaque(value) => value.clone(),
        }
    }
}

// malformed `properties` or `required` leave the node opaque for the engine to reject
fn has_object_shape(object: &Map<String, Value>) -> bool {
    let properties_ok = match object.get("properties") {
        None => true,
        Some(Value::Object(props)) => props.values().all(|node| node.is_object() || node.is_boolean()),
        Some(_) => false,
    };
    let required_ok = match object.get("required") {
        None => true,
        Some(Value::Array(names)) => names.iter().all(Value::is_string),
        Some(_) => false,
    };
    properties_ok && required_ok
}

fn object_schema(object: &Map<String, Value>) -> SchemaNode {
    let properties = object
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, node)| (name.clone(), SchemaNode::from_value(node)))
                .collect()
        })
        .unwrap_or_default();

    let required = object
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    SchemaNode::Object(ObjectSchema {
        properties,
        required,
        keywords: remaining(object, &["type", "properties", "required"]),
    })
}

fn array_schema(object: &Map<String, Value>) -> SchemaNode {
    let items = object
        .get("items")
        .map(SchemaNode::from_value)
        .unwrap_or(SchemaNode::Any);

    SchemaNode::Array(ArraySchema {
        items: Box::new(items),
        keywords: remaining(object, &["type", "items"]),
    })
}

fn remaining(object: &Map<String, Value>, modelled: &[&str]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !modelled.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn with_type(mut map: Map<String, Value>, type_name: &str) -> Value {
    let nullable = matches!(map.remove("nullable"), Some(Value::Bool(true)));
    let type_value = if nullable && type_name != "null" {
        Value::Array(vec![
            Value::String(type_name.to_string()),
            Value::String("null".to_string()),
        ])
    } else {
        Value::String(type_name.to_string())
    };
    map.insert("type".to_string(), type_value);
    Value::Object(map)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    root: Value,
}

impl SchemaDocument {
    pub fn from_value(root: Value) -> Result<Self> {
        match root.get("paths") {
            Some(Value::Object(_)) => Ok(Self { root }),
            Some(_) => Err(ProbeError::InvalidDocument(
                "`paths` must be an object".to_string(),
            )),
            None => Err(ProbeError::InvalidDocument(
                "document has no `paths`".to_string(),
            )),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// YAML documents often use bare integer status keys (`200:`); going
    /// through `serde_yaml::Value` turns them into string keys.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(raw)?;
        Self::from_value(serde_json::to_value(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn paths(&self) -> &Map<String, Value> {
        // checked in from_value
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .unwrap_or_else(|| empty_map())
    }

    /// Walk a local `$ref` pointer (`#/components/schemas/Account`).
    pub fn lookup(&self, pointer: &str) -> Option<&Value> {
        let path = pointer.strip_prefix('#')?;
        let mut current = &self.root;

        for raw_segment in path.split('/').filter(|segment| !segment.is_empty()) {
            let segment = raw_segment.replace("~1", "/").replace("~0", "~");
            current = match current {
                Value::Object(map) => map.get(&segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }
}

fn empty_map() -> &'static Map<String, Value> {
    static EMPTY: once_cell::sync::Lazy<Map<String, Value>> = once_cell::sync::Lazy::new(Map::new);
    &EMPTY
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_shapes() {
        assert_eq!(SchemaNode::from_value(&json!({})), SchemaNode::Any);
        assert!(SchemaNode::from_value(&json!({"$ref": "#/definitions/User"})).is_ref());
        assert!(matches!(
            SchemaNode::from_value(&json!({"type": "string", "enum": ["a", "b"]})),
            SchemaNode::Enum(EnumSchema { kind: Some(PrimitiveType::String), .. })
        ));
        assert!(matches!(
            SchemaNode::from_value(&json!({"properties": {"id": {"type": "integer"}}})),
            SchemaNode::Object(_)
        ));
        assert!(matches!(
            SchemaNode::from_value(&json!({"anyOf": [{"type": "string"}, {"type": "null"}]})),
            SchemaNode::Composite(Combinator::AnyOf, _)
        ));
        assert!(matches!(
            SchemaNode::from_value(&json!({"type": ["string", "null"]})),
            SchemaNode::Opaque(_)
        ));
    }

    #[test]
    fn test_malformed_object_keywords_stay_opaque() {
        for schema in [
            json!({"type": "object", "properties": [1]}),
            json!({"type": "object", "properties": {"id": 5}}),
            json!({"type": "object", "required": "id"}),
            json!({"properties": {"id": {"type": "integer"}}, "required": [1]}),
            json!({"type": "string", "format": 5}),
        ] {
            let node = SchemaNode::from_value(&schema);
            assert_eq!(node, SchemaNode::Opaque(schema.clone()));
            assert_eq!(node.to_value(), schema);
        }
    }

    #[test]
    fn test_value_round_trip_keeps_keywords() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 5}
            },
            "required": ["name"],
            "additionalProperties": false
        });
        assert_eq!(SchemaNode::from_value(&schema).to_value(), schema);
    }

    #[test]
    fn test_nullable_becomes_type_union() {
        let node = SchemaNode::from_value(&json!({"type": "string", "nullable": true}));
        assert_eq!(node.to_value(), json!({"type": ["string", "null"]}));
    }

    #[test]
    fn test_document_requires_paths() {
        assert!(SchemaDocument::from_value(json!({"definitions": {}})).is_err());
        assert!(SchemaDocument::from_value(json!({"paths": []})).is_err());
        assert!(SchemaDocument::from_value(json!({"paths": {}})).is_ok());
    }

    #[test]
    fn test_lookup_escapes_and_indices() {
        let doc = SchemaDocument::from_value(json!({
            "paths": {"/a/b": {"get": {}}},
            "components": {"schemas": {"List": {"anyOf": [{"type": "string"}]}}}
        }))
        .unwrap();
        assert_eq!(doc.lookup("#/paths/~1a~1b/get"), Some(&json!({})));
        assert_eq!(
            doc.lookup("#/components/schemas/List/anyOf/0"),
            Some(&json!({"type": "string"}))
        );
        assert_eq!(doc.lookup("#/components/schemas/Missing"), None);
        assert_eq!(doc.lookup("components/schemas/List"), None);
    }

    #[test]
    fn test_yaml_document() {
        let doc = SchemaDocument::from_yaml_str(
            "paths:\n  /account/accounts:\n    get:\n      responses: {}\n",
        )
        .unwrap();
        assert!(doc.paths().contains_key("/account/accounts"));
    }

    #[test]
    fn test_yaml_integer_status_keys() {
        let doc = SchemaDocument::from_yaml_str(
            "paths:\n  /x:\n    get:\n      responses:\n        200:\n          description: ok\n",
        )
        .unwrap();
        assert!(doc.lookup("#/paths/~1x/get/responses/200").is_some());
    }
}
