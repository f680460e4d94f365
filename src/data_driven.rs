use crate::client::HttpExecutor;
use crate::error::Result;
use crate::schema::SchemaDocument;
use crate::types::{render_path, status_expected, PreparedRequest};
use crate::validator::{
    ContractValidator, SchemaSource, ValidationMode, ValidationOptions, ValidationResult,
};
use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestCase {
    pub name: String,
    pub method: String,
    pub endpoint: String,
    #[serde(rename = "pathParams", default)]
    pub path_params: HashMap<String, String>,
    #[serde(rename = "queryParams", default)]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    #[serde(rename = "expectedStatus", default)]
    pub expected_status: Vec<u16>,
    // wins over the runner's document
    #[serde(rename = "schemaKey")]
    pub schema_key: Option<String>,
    #[serde(rename = "validateContract", default = "default_true")]
    pub validate_contract: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub skip: bool,
}

impl TestCase {
    fn prepare(&self) -> PreparedRequest {
        PreparedRequest {
            method: self.method.to_uppercase(),
            path: render_path(&self.endpoint, &self.path_params),
            query: self
                .query_params
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    fn status_matches(&self, status: u16) -> bool {
        status_expected(&self.expected_status, status)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSuite {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }
}

// an empty include list selects everything
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TagFilter {
    pub fn accepts(&self, case: &TestCase) -> bool {
        let has = |tag: &String| case.tags.contains(tag);
        (self.include.is_empty() || self.include.iter().any(has))
            && !self.exclude.iter().any(has)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub status: Option<u16>,
    pub passed: bool,
    pub skipped: bool,
    #[serde(rename = "responseTimeMs")]
    pub response_time_ms: f64,
    pub validation: Option<ValidationResult>,
    pub error: Option<String>,
}

impl CaseOutcome {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: None,
            passed: false,
            skipped: true,
            response_time_ms: 0.0,
            validation: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(rename = "durationMs")]
    pub duration_ms: f64,
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub struct DataDrivenRunner {
    executor: Arc<dyn HttpExecutor>,
    validator: Arc<ContractValidator>,
    document: Option<Arc<SchemaDocument>>,
    mode: ValidationMode,
}

impl DataDrivenRunner {
    pub fn new(executor: Arc<dyn HttpExecutor>, validator: Arc<ContractValidator>) -> Self {
        Self {
            executor,
            validator,
            document: None,
            mode: ValidationMode::Strict,
        }
    }

    pub fn with_document(mut self, document: Arc<SchemaDocument>) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn run(&self, suite: &TestSuite, filter: &TagFilter) -> SuiteReport {
        let started = Instant::now();
        info!("🧪 Running suite `{}` ({} cases)", suite.name, suite.cases.len());

        let cases = suite.cases.iter().map(|case| async move {
            if case.skip || !filter.accepts(case) {
                debug!("Skipping case `{}`", case.name);
                CaseOutcome::skipped(&case.name)
            } else {
                self.run_case(case).await
            }
        });
        let outcomes = join_all(cases).await;

        let skipped = outcomes.iter().filter(|o| o.skipped).count();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let report = SuiteReport {
            suite: suite.name.clone(),
            total: outcomes.len(),
            passed,
            failed: outcomes.len() - passed - skipped,
            skipped,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            cases: outcomes,
        };

        info!(
            "✅ Suite `{}`: {} passed, {} failed, {} skipped",
            report.suite, report.passed, report.failed, report.skipped
        );
        report
    }

    async fn run_case(&self, case: &TestCase) -> CaseOutcome {
        let request = case.prepare();
        let request_start = Instant::now();
        let result = self.executor.send(&request).await;
        let response_time_ms = request_start.elapsed().as_secs_f64() * 1000.0;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return CaseOutcome {
                    name: case.name.clone(),
                    status: None,
                    passed: false,
                    skipped: false,
                    response_time_ms,
                    validation: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let status_ok = case.status_matches(response.status);
        let validation = case.validate_contract.then(|| {
            let options = ValidationOptions::new(&case.method, &request.path)
                .status(response.status)
                .mode(self.mode);
            let source = match (&case.schema_key, &self.document) {
                (Some(key), _) => Some(SchemaSource::CacheKey(key)),
                (None, Some(document)) => Some(SchemaSource::Document(document)),
                (None, None) => None,
            };
            match source {
                Some(source) => self.validator.validate(&response, source, &options),
                None => ValidationResult::no_schema(),
            }
        });

        let contract_ok = validation.as_ref().map_or(true, ValidationResult::is_valid);
        let error = if !status_ok {
            Some(format!(
                "expected status {:?}, got {}",
                case.expected_status, response.status
            ))
        } else if !contract_ok {
            Some("response violates contract".to_string())
        } else {
            None
        };

        CaseOutcome {
            name: case.name.clone(),
            status: Some(response.status),
            passed: status_ok && contract_ok,
            skipped: false,
            response_time_ms,
            validation,
            error,
        }
    }
}
