pub mod client;
pub mod config;
pub mod data_driven;
pub mod error;
pub mod formats;
pub mod inference;
pub mod matcher;
pub mod resolver;
pub mod schema;
pub mod stats;
pub mod types;
pub mod validator;

pub use client::{HttpExecutor, ReqwestExecutor};
pub use config::{LoadPlan, RunnerSettings};
pub use data_driven::{DataDrivenRunner, SuiteReport, TagFilter, TestCase, TestSuite};
pub use error::{ProbeError, Result};
pub use inference::{InferOptions, SchemaInferencer};
pub use load_test::LoadTestEngine;
pub use matcher::SchemaMatcher;
pub use resolver::{Resolution, SchemaResolver};
pub use schema::{SchemaDocument, SchemaNode};
pub use stats::Statistics;
pub use types::{
    HttpResponse, LoadProfile, LoadTestConfig, LoadTestMetrics, LoadTestReport, QualityGates,
    RequestOutcome, RunPhase, Scenario,
};
pub use validator::{
    ContractValidator, DocumentCache, SchemaCache, SchemaSource, ValidationMode,
    ValidationOptions, ValidationResult,
};
