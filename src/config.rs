use crate::error::{ProbeError, Result};
use crate::types::{LoadProfile, LoadTestConfig, Scenario};
use crate::validator::ValidationMode;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub load_plan: Option<PathBuf>,
    pub profile: LoadProfile,
    pub contract_doc: Option<PathBuf>,
    pub test_suite: Option<PathBuf>,
    pub validation_mode: ValidationMode,
}

impl RunnerSettings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let profile = match non_empty("LOAD_PROFILE") {
            Some(name) => name.parse()?,
            None => LoadProfile::Load,
        };
        let validation_mode = match non_empty("VALIDATION_MODE") {
            Some(name) => name.parse()?,
            None => ValidationMode::Strict,
        };

        let base_url = non_empty("API_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProbeError::Configuration(format!(
                "API_BASE_URL must be an http(s) URL, got `{}`",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            token: non_empty("API_TOKEN"),
            load_plan: non_empty("LOAD_PLAN").map(PathBuf::from),
            profile,
            contract_doc: non_empty("CONTRACT_DOC").map(PathBuf::from),
            test_suite: non_empty("TEST_SUITE").map(PathBuf::from),
            validation_mode,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: Option<u32>,
    #[serde(rename = "rampUpTimeMs")]
    pub ramp_up_time_ms: Option<u64>,
    #[serde(rename = "testDurationMs")]
    pub test_duration_ms: Option<u64>,
    #[serde(rename = "thinkTimeMs")]
    pub think_time_ms: Option<u64>,
    #[serde(rename = "errorThreshold")]
    pub error_threshold: Option<f64>,
    #[serde(rename = "responseTimeThresholdMs")]
    pub response_time_threshold_ms: Option<f64>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: LoadTestConfig) -> LoadTestConfig {
        if let Some(value) = self.max_concurrency {
            config.max_concurrency = value;
        }
        if let Some(value) = self.ramp_up_time_ms {
            config.ramp_up_time_ms = value;
        }
        if let Some(value) = self.test_duration_ms {
            config.test_duration_ms = value;
        }
        if let Some(value) = self.think_time_ms {
            config.think_time_ms = value;
        }
        if let Some(value) = self.error_threshold {
            config.error_threshold = value;
        }
        if let Some(value) = self.response_time_threshold_ms {
            config.response_time_threshold_ms = value;
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadPlan {
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub config: ConfigOverrides,
}

impl LoadPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&raw)?),
            _ => Ok(serde_json::from_str(&raw)?),
        }
    }

    pub fn resolve_config(&self, profile: LoadProfile) -> LoadTestConfig {
        self.config.apply(profile.config())
    }
}
