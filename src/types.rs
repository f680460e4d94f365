use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ProbeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "durationMs", default)]
    pub duration_ms: Option<f64>,
    #[serde(rename = "sizeBytes", default)]
    pub size_bytes: u64,
}

impl HttpResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
            duration_ms: None,
            size_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
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
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl Scenario {
    pub fn new(method: &str, endpoint: &str) -> Self {
        Self {
            name: format!("{} {}", method.to_uppercase(), endpoint),
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            path_params: HashMap::new(),
            query_params: BTreeMap::new(),
            headers: HashMap::new(),
            body: None,
            expected_status: Vec::new(),
            weight: default_weight(),
        }
    }

    pub fn expect_status(mut self, statuses: &[u16]) -> Self {
        self.expected_status = statuses.to_vec();
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.endpoint
        } else {
            &self.name
        }
    }

    pub fn prepare(&self) -> PreparedRequest {
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

    pub fn is_success(&self, status: u16) -> bool {
        status_expected(&self.expected_status, status)
    }
}

/// An empty expectation accepts any status below 400.
pub fn status_expected(expected: &[u16], status: u16) -> bool {
    if expected.is_empty() {
        status < 400
    } else {
        expected.contains(&status)
    }
}

// unknown parameters are left as written
pub fn render_path(template: &str, params: &HashMap<String, String>) -> String {
    template
        .split('/')
        .map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .and_then(|name| params.get(name))
                .map(String::as_str)
                .unwrap_or(segment)
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoadTestConfig {
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: u32,
    #[serde(rename = "rampUpTimeMs")]
    pub ramp_up_time_ms: u64,
    #[serde(rename = "testDurationMs")]
    pub test_duration_ms: u64,
    #[serde(rename = "thinkTimeMs")]
    pub think_time_ms: u64,
    #[serde(rename = "errorThreshold")]
    pub error_threshold: f64,
    #[serde(rename = "responseTimeThresholdMs")]
    pub response_time_threshold_ms: f64,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            ramp_up_time_ms: 5_000,
            test_duration_ms: 30_000,
            think_time_ms: 1_000,
            error_threshold: 0.05,
            response_time_threshold_ms: 2_000.0,
        }
    }
}

impl LoadTestConfig {
    pub fn stress() -> Self {
        Self {
            max_concurrency: 50,
            ramp_up_time_ms: 10_000,
            test_duration_ms: 60_000,
            think_time_ms: 500,
            error_threshold: 0.10,
            response_time_threshold_ms: 5_000.0,
        }
    }

    pub fn spike() -> Self {
        Self {
            max_concurrency: 100,
            ramp_up_time_ms: 1_000,
            test_duration_ms: 30_000,
            think_time_ms: 100,
            error_threshold: 0.15,
            response_time_threshold_ms: 5_000.0,
        }
    }

    pub fn volume() -> Self {
        Self {
            max_concurrency: 20,
            ramp_up_time_ms: 5_000,
            test_duration_ms: 120_000,
            think_time_ms: 200,
            error_threshold: 0.05,
            response_time_threshold_ms: 3_000.0,
        }
    }

    pub fn endurance() -> Self {
        Self {
            max_concurrency: 10,
            ramp_up_time_ms: 10_000,
            test_duration_ms: 600_000,
            think_time_ms: 2_000,
            error_threshold: 0.02,
            response_time_threshold_ms: 2_000.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ProbeError::Configuration(
                "maxConcurrency must be greater than 0".to_string(),
            ));
        }
        if self.test_duration_ms == 0 {
            return Err(ProbeError::Configuration(
                "testDurationMs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.error_threshold) {
            return Err(ProbeError::Configuration(format!(
                "errorThreshold must be within 0..=1, got {}",
                self.error_threshold
            )));
        }
        if !self.response_time_threshold_ms.is_finite() || self.response_time_threshold_ms < 0.0 {
            return Err(ProbeError::Configuration(format!(
                "responseTimeThresholdMs must be a non-negative number, got {}",
                self.response_time_threshold_ms
            )));
        }
        Ok(())
    }

    // duration + ramp-up + 5s
    pub fn deadline_ms(&self) -> u64 {
        self.test_duration_ms
            .saturating_add(self.ramp_up_time_ms)
            .saturating_add(5_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadProfile {
    Load,
    Stress,
    Spike,
    Volume,
    Endurance,
}

impl LoadProfile {
    pub fn config(&self) -> LoadTestConfig {
        match self {
            LoadProfile::Load => LoadTestConfig::default(),
            LoadProfile::Stress => LoadTestConfig::stress(),
            LoadProfile::Spike => LoadTestConfig::spike(),
            LoadProfile::Volume => LoadTestConfig::volume(),
            LoadProfile::Endurance => LoadTestConfig::endurance(),
        }
    }
}

impl std::str::FromStr for LoadProfile {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(LoadProfile::Load),
            "stress" => Ok(LoadProfile::Stress),
            "spike" => Ok(LoadProfile::Spike),
            "volume" => Ok(LoadProfile::Volume),
            "endurance" => Ok(LoadProfile::Endurance),
            other => Err(ProbeError::Configuration(format!(
                "unknown load profile `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    RampingUp,
    Running,
    Aggregating,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestOutcome {
    #[serde(rename = "userId")]
    pub user_id: u32,
    #[serde(rename = "scenarioName")]
    pub scenario_name: String,
    pub method: String,
    pub endpoint: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "responseTimeMs")]
    pub response_time_ms: f64,
    pub success: bool,
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: i64,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoadTestMetrics {
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "successfulRequests")]
    pub successful_requests: u64,
    #[serde(rename = "failedRequests")]
    pub failed_requests: u64,
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
    pub throughput: f64,
    #[serde(rename = "averageResponseTime")]
    pub average_response_time: f64,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: f64,
    #[serde(rename = "maxResponseTime")]
    pub max_response_time: f64,
    pub percentiles: Percentiles,
    #[serde(rename = "statusCodeDistribution")]
    pub status_code_distribution: BTreeMap<u16, u64>,
    #[serde(rename = "errorDistribution")]
    pub error_distribution: BTreeMap<String, u64>,
    #[serde(rename = "elapsedSeconds")]
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "successfulRequests")]
    pub successful_requests: u64,
    #[serde(rename = "failedRequests")]
    pub failed_requests: u64,
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
    #[serde(rename = "requestsPerSecond")]
    pub requests_per_second: f64,
    #[serde(rename = "averageResponseTime")]
    pub average_response_time: f64,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: f64,
    #[serde(rename = "maxResponseTime")]
    pub max_response_time: f64,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct QualityGates {
    #[serde(rename = "errorRatePass")]
    pub error_rate_pass: bool,
    #[serde(rename = "responseTimePass")]
    pub response_time_pass: bool,
    #[serde(rename = "throughputAchieved")]
    pub throughput_achieved: bool,
}

impl QualityGates {
    pub fn evaluate(metrics: &LoadTestMetrics, config: &LoadTestConfig) -> Self {
        Self {
            error_rate_pass: metrics.error_rate <= config.error_threshold,
            response_time_pass: metrics.percentiles.p95 <= config.response_time_threshold_ms,
            throughput_achieved: metrics.throughput > 0.0,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.error_rate_pass && self.response_time_pass && self.throughput_achieved
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeSeriesPoint {
    /// Seconds since the run started.
    pub second: u64,
    pub rps: f64,
    #[serde(rename = "avgResponseTime")]
    pub avg_response_time: f64,
    #[serde(rename = "p95ResponseTime")]
    pub p95_response_time: f64,
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadTestReport {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    pub config: LoadTestConfig,
    pub summary: Summary,
    #[serde(rename = "performanceMetrics")]
    pub performance_metrics: Percentiles,
    #[serde(rename = "statusCodeDistribution")]
    pub status_code_distribution: BTreeMap<u16, u64>,
    #[serde(rename = "errorDistribution")]
    pub error_distribution: BTreeMap<String, u64>,
    #[serde(rename = "qualityGates")]
    pub quality_gates: QualityGates,
    #[serde(rename = "timeSeries")]
    pub time_series: Vec<TimeSeriesPoint>,
    #[serde(rename = "cancelledUsers")]
    pub cancelled_users: u32,
    #[serde(rename = "detailedResults")]
    pub detailed_results: Vec<RequestOutcome>,
}
