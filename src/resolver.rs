use crate::matcher::SchemaMatcher;
use crate::schema::{SchemaDocument, SchemaNode};
use log::{debug, warn};
use serde_json::{Map, Value};

const MAX_REF_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub template: String,
    pub node: SchemaNode,
    /// Nested `$ref`s relaxed to `{}` because they dangle or loop back.
    pub unresolved_refs: Vec<String>,
}

pub struct SchemaResolver<'a> {
    doc: &'a SchemaDocument,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(doc: &'a SchemaDocument) -> Self {
        Self { doc }
    }

    pub fn resolve(&self, path: &str, method: &str, status_code: u16) -> Option<SchemaNode> {
        self.resolve_detailed(path, method, status_code)
            .map(|resolution| resolution.node)
    }

    pub fn resolve_detailed(
        &self,
        path: &str,
        method: &str,
        status_code: u16,
    ) -> Option<Resolution> {
        let template = self.match_template(path)?;
        let operation = self.doc.paths().get(template)?.get(method.to_lowercase())?;
        let responses = operation.get("responses")?.as_object()?;

        let response = responses
            .get(&status_code.to_string())
            .or_else(|| responses.get("default"))
            .or_else(|| responses.get("200"))?;

        // response objects may themselves be `$ref`s into components/responses
        let response = self.follow(response, &mut Vec::new())?;
        let schema = extract_schema(response)?;

        // pointers on this stack are being expanded; meeting one again is a cycle
        let mut expanding = Vec::new();
        let schema = self.follow(schema, &mut expanding)?;

        let mut unresolved_refs = Vec::new();
        let inlined = self.inline(schema, &mut expanding, &mut unresolved_refs);

        if !unresolved_refs.is_empty() {
            warn!(
                "⚠️ {} {}: {} unresolved nested $ref(s) relaxed to {{}}",
                method,
                template,
                unresolved_refs.len()
            );
        }

        Some(Resolution {
            template: template.to_string(),
            node: SchemaNode::from_value(&inlined),
            unresolved_refs,
        })
    }

    pub fn resolve_ref(&self, pointer: &str) -> Option<&'a Value> {
        self.doc.lookup(pointer)
    }

    // exact key first, then the template with the most literal segments
    fn match_template(&self, path: &str) -> Option<&'a str> {
        let paths = self.doc.paths();
        if let Some(key) = paths.keys().find(|key| key.as_str() == path) {
            return Some(key.as_str());
        }

        let mut best: Option<(&'a str, usize)> = None;
        for template in paths.keys() {
            if !SchemaMatcher::matches(template, path) {
                continue;
            }
            let score = SchemaMatcher::literal_segments(template);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((template.as_str(), score));
            }
        }

        if best.is_none() {
            debug!("No path template matches {}", path);
        }
        best.map(|(template, _)| template)
    }

    // A dangling or looping chain of top-level `$ref`s yields `None`.
    fn follow(&self, mut node: &'a Value, trail: &mut Vec<String>) -> Option<&'a Value> {
        for _ in 0..MAX_REF_DEPTH {
            match node.get("$ref").and_then(Value::as_str) {
                Some(pointer) if trail.iter().any(|seen| seen == pointer) => return None,
                Some(pointer) => {
                    trail.push(pointer.to_string());
                    node = self.doc.lookup(pointer)?;
                }
                None => return Some(node),
            }
        }
        None
    }

    fn inline(
        &self,
        value: &Value,
        expanding: &mut Vec<String>,
        unresolved: &mut Vec<String>,
    ) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(pointer) = map.get("$ref").and_then(Value::as_str) {
                    let cyclic = expanding.iter().any(|seen| seen == pointer);
                    let target = if cyclic || expanding.len() >= MAX_REF_DEPTH {
                        None
                    } else {
                        self.doc.lookup(pointer)
                    };

                    let Some(target) = target else {
                        unresolved.push(pointer.to_string());
                        return Value::Object(Map::new());
                    };

                    expanding.push(pointer.to_string());
                    let inlined = self.inline(target, expanding, unresolved);
                    expanding.pop();
                    return inlined;
                }

                Value::Object(
                    map.iter()
                        .map(|(key, child)| (key.clone(), self.inline(child, expanding, unresolved)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.inline(item, expanding, unresolved))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn extract_schema(response: &Value) -> Option<&Value> {
    if let Some(schema) = response.get("schema") {
        return Some(schema);
    }

    let content = response.get("content")?.as_object()?;
    if let Some(schema) = content.get("application/json").and_then(|m| m.get("schema")) {
        return Some(schema);
    }

    content
        .iter()
        .filter(|(media_type, _)| is_json_media_type(media_type))
        .find_map(|(_, media)| media.get("schema"))
}

fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.ends_with("/json") || essence.ends_with("+json")
}
