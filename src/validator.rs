use crate::error::Result;
use crate::formats;
use crate::resolver::SchemaResolver;
use crate::schema::{SchemaDocument, SchemaNode};
use crate::types::HttpResponse;
use jsonschema::Validator;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const NO_SCHEMA_WARNING: &str = "No schema available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Violation,
    ValidationError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    #[serde(rename = "schemaPath", skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new(errors: Vec<ValidationIssue>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn no_schema() -> Self {
        Self::new(Vec::new(), vec![NO_SCHEMA_WARNING.to_string()])
    }

    pub fn engine_failure(message: String) -> Self {
        Self::new(
            vec![ValidationIssue {
                path: String::new(),
                message,
                kind: IssueKind::ValidationError,
                schema_path: None,
            }],
            Vec::new(),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // engine failures stay errors
    pub fn soften(self) -> Self {
        let mut warnings = self.warnings;
        let mut errors = Vec::new();

        for issue in self.errors {
            match issue.kind {
                IssueKind::Violation => {
                    warnings.push(format!("{}: {}", display_path(&issue.path), issue.message))
                }
                IssueKind::ValidationError => errors.push(issue),
            }
        }

        Self::new(errors, warnings)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Strict,
    Soft,
}

impl std::str::FromStr for ValidationMode {
    type Err = crate::error::ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "soft" => Ok(ValidationMode::Soft),
            other => Err(crate::error::ProbeError::Configuration(format!(
                "unknown validation mode `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub verbose: bool,
    pub mode: ValidationMode,
}

impl ValidationOptions {
    pub fn new(method: &str, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code: None,
            verbose: false,
            mode: ValidationMode::Strict,
        }
    }

    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SchemaSource<'a> {
    Node(&'a SchemaNode),
    CacheKey(&'a str),
    Document(&'a SchemaDocument),
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    inner: Arc<RwLock<HashMap<String, SchemaNode>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, node: SchemaNode) {
        let mut schemas = self.inner.write().unwrap_or_else(|e| e.into_inner());
        schemas.insert(key.into(), node);
    }

    pub fn get(&self, key: &str) -> Option<SchemaNode> {
        let schemas = self.inner.read().unwrap_or_else(|e| e.into_inner());
        schemas.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    inner: Arc<RwLock<HashMap<PathBuf, Arc<SchemaDocument>>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<SchemaDocument>> {
        if let Some(doc) = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
        {
            return Ok(doc.clone());
        }

        let doc = Arc::new(SchemaDocument::load(path)?);
        debug!("Loaded schema document {}", path.display());
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }
}

pub struct ContractValidator {
    schemas: SchemaCache,
    compiled: RwLock<HashMap<String, Arc<Validator>>>,
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::new(SchemaCache::new())
    }
}

impl ContractValidator {
    pub fn new(schemas: SchemaCache) -> Self {
        Self {
            schemas,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn validate(
        &self,
        response: &HttpResponse,
        source: SchemaSource<'_>,
        options: &ValidationOptions,
    ) -> ValidationResult {
        let mut warnings = Vec::new();

        let node: Option<Cow<'_, SchemaNode>> = match source {
            SchemaSource::Node(node) => Some(Cow::Borrowed(node)),
            SchemaSource::CacheKey(key) => self.schemas.get(key).map(Cow::Owned),
            SchemaSource::Document(doc) => {
                let status = options.status_code.unwrap_or(response.status);
                SchemaResolver::new(doc)
                    .resolve_detailed(&options.endpoint, &options.method, status)
                    .map(|resolution| {
                        warnings.extend(resolution.unresolved_refs.iter().map(|pointer| {
                            format!("Unresolved reference {} treated as unconstrained", pointer)
                        }));
                        Cow::Owned(resolution.node)
                    })
            }
        };

        let Some(node) = node else {
            debug!(
                "{} {}: {}",
                options.method, options.endpoint, NO_SCHEMA_WARNING
            );
            return ValidationResult::no_schema();
        };

        let result = self.check(&node, &response.body, options, warnings);
        match options.mode {
            ValidationMode::Strict => result,
            ValidationMode::Soft => result.soften(),
        }
    }

    pub fn validate_against_node(
        &self,
        response: &HttpResponse,
        node: &SchemaNode,
        options: &ValidationOptions,
    ) -> ValidationResult {
        self.validate(response, SchemaSource::Node(node), options)
    }

    pub fn validate_against_cache_key(
        &self,
        response: &HttpResponse,
        key: &str,
        options: &ValidationOptions,
    ) -> ValidationResult {
        self.validate(response, SchemaSource::CacheKey(key), options)
    }

    pub fn validate_against_document(
        &self,
        response: &HttpResponse,
        doc: &SchemaDocument,
        options: &ValidationOptions,
    ) -> ValidationResult {
        self.validate(response, SchemaSource::Document(doc), options)
    }

    pub fn validate_swagger_contract(
        &self,
        response: &HttpResponse,
        doc: &SchemaDocument,
        options: &ValidationOptions,
    ) -> ValidationResult {
        let options = options.clone().mode(ValidationMode::Soft);
        self.validate(response, SchemaSource::Document(doc), &options)
    }

    fn check(
        &self,
        node: &SchemaNode,
        body: &Value,
        options: &ValidationOptions,
        warnings: Vec<String>,
    ) -> ValidationResult {
        let validator = match self.compile(node) {
            Ok(validator) => validator,
            Err(message) => {
                debug!("{} {}: {}", options.method, options.endpoint, message);
                let mut result = ValidationResult::engine_failure(message);
                result.warnings = warnings;
                return result;
            }
        };

        let errors: Vec<ValidationIssue> = validator
            .iter_errors(body)
            .map(|error| {
                let issue = ValidationIssue {
                    path: error.instance_path.to_string(),
                    message: error.to_string(),
                    kind: IssueKind::Violation,
                    schema_path: options.verbose.then(|| error.schema_path.to_string()),
                };
                if options.verbose {
                    debug!(
                        "{} {} {}: {}",
                        options.method,
                        options.endpoint,
                        display_path(&issue.path),
                        issue.message
                    );
                }
                issue
            })
            .collect();

        ValidationResult::new(errors, warnings)
    }

    fn compile(&self, node: &SchemaNode) -> std::result::Result<Arc<Validator>, String> {
        let schema = node.to_value();
        let key = schema.to_string();

        if let Some(validator) = self
            .compiled
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(validator.clone());
        }

        let validator = Arc::new(build_validator(&schema)?);
        self.compiled
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, validator.clone());
        Ok(validator)
    }
}

// `date-time` and `email` use the same predicates as inference
pub fn build_validator(schema: &Value) -> std::result::Result<Validator, String> {
    jsonschema::draft7::options()
        .should_validate_formats(true)
        .with_format("uuid", formats::is_uuid)
        .with_format("timestamp", formats::is_date_time)
        .with_format("base64", formats::is_base64)
        .with_format("date-time", formats::is_date_time)
        .with_format("email", formats::is_email)
        .build(schema)
        .map_err(|e| format!("Failed to compile schema: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimitiveType;
    use serde_json::json;

    fn ok(body: Value) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    fn users_schema() -> SchemaNode {
        SchemaNode::from_value(&json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "email": {"type": "string", "format": "email"}
                        },
                        "required": ["id", "email"]
                    }
                }
            },
            "required": ["data"]
        }))
    }

    #[test]
    fn test_collects_every_violation() {
        let validator = ContractValidator::default();
        let result = validator.validate_against_node(
            &ok(json!({"data": [{"id": "abc", "email": "not-an-email"}]})),
            &users_schema(),
            &ValidationOptions::new("GET", "/iam/users").verbose(true),
        );

        assert!(!result.is_valid());
        assert!(result.errors().len() >= 2);
        assert!(result.errors().iter().any(|e| e.path == "/data/0/id"));
        assert!(result.errors().iter().any(|e| e.path == "/data/0/email"));
        assert!(result.errors().iter().all(|e| e.schema_path.is_some()));
    }

    #[test]
    fn test_valid_body() {
        let validator = ContractValidator::default();
        let result = validator.validate_against_node(
            &ok(json!({"data": [{"id": 1, "email": "ops@example.com"}]})),
            &users_schema(),
            &ValidationOptions::new("GET", "/iam/users"),
        );
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_custom_formats() {
        let validator = ContractValidator::default();
        let options = ValidationOptions::new("GET", "/storage/objects");
        let schema = SchemaNode::from_value(&json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "format": "uuid"},
                "created": {"type": "string", "format": "timestamp"},
                "payload": {"type": "string", "format": "base64"}
            }
        }));

        let good = validator.validate_against_node(
            &ok(json!({
                "id": "3f2504e0-4f89-41d3-9a0c-0305e82c3301",
                "created": "2024-03-01T10:00:00Z",
                "payload": "aGVsbG8="
            })),
            &schema,
            &options,
        );
        assert!(good.is_valid(), "{:?}", good.errors());

        let bad = validator.validate_against_node(
            &ok(json!({"id": "nope", "created": "later", "payload": "***"})),
            &schema,
            &options,
        );
        assert_eq!(bad.errors().len(), 3);
    }

    #[test]
    fn test_missing_cache_key_is_a_warning() {
        let validator = ContractValidator::default();
        let result = validator.validate_against_cache_key(
            &ok(json!({"anything": true})),
            "accounts.list",
            &ValidationOptions::new("GET", "/account/accounts"),
        );
        assert!(result.is_valid());
        assert_eq!(result.warnings(), &[NO_SCHEMA_WARNING.to_string()]);
    }

    #[test]
    fn test_cache_key_lookup_is_shared() {
        let cache = SchemaCache::new();
        let validator = ContractValidator::new(cache.clone());
        cache.insert("zone.name", SchemaNode::primitive(PrimitiveType::String));

        let result = validator.validate_against_cache_key(
            &ok(json!(12)),
            "zone.name",
            &ValidationOptions::new("GET", "/dns/zones/1"),
        );
        assert!(!result.is_valid());
        assert_eq!(validator.schemas().len(), 1);
    }

    #[test]
    fn test_engine_failure_is_reported_not_raised() {
        let validator = ContractValidator::default();
        let broken = SchemaNode::from_value(&json!({"type": "string", "minLength": "three"}));
        let result = validator.validate_against_node(
            &ok(json!("x")),
            &broken,
            &ValidationOptions::new("GET", "/x"),
        );
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind, IssueKind::ValidationError);
    }

    #[test]
    fn test_malformed_schema_keywords_are_engine_failures() {
        let validator = ContractValidator::default();
        let options = ValidationOptions::new("GET", "/iam/users/1");

        for schema in [
            json!({"type": "object", "properties": [1]}),
            json!({"type": "object", "required": "id"}),
        ] {
            let result = validator.validate_against_node(
                &ok(json!({"name": "anything"})),
                &SchemaNode::from_value(&schema),
                &options,
            );
            assert!(!result.is_valid(), "{schema} was accepted as permissive");
            assert_eq!(result.errors().len(), 1);
            assert_eq!(result.errors()[0].kind, IssueKind::ValidationError);
        }
    }

    #[test]
    fn test_soft_mode_downgrades_violations() {
        let validator = ContractValidator::default();
        let result = validator.validate_against_node(
            &ok(json!({"data": [{"id": "abc", "email": "x"}]})),
            &users_schema(),
            &ValidationOptions::new("GET", "/iam/users").mode(ValidationMode::Soft),
        );
        assert!(result.is_valid());
        assert!(result.warnings().len() >= 2);
    }

    #[test]
    fn test_result_serialization_shape() {
        let result = ValidationResult::engine_failure("boom".to_string());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"valid": false, "errors": [{"path": "", "message": "boom", "type": "validation_error"}]})
        );
    }

    #[test]
    fn test_validation_mode_parse() {
        assert_eq!("SOFT".parse::<ValidationMode>().unwrap(), ValidationMode::Soft);
        assert!("lenient".parse::<ValidationMode>().is_err());
    }
}
