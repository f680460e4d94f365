use anyhow::{bail, Result};
use log::{error, info};
use std::sync::Arc;

use loadmaster_probe::data_driven::{DataDrivenRunner, TagFilter, TestSuite};
use loadmaster_probe::validator::{ContractValidator, DocumentCache, SchemaCache};
use loadmaster_probe::{HttpExecutor, LoadPlan, LoadTestEngine, ReqwestExecutor, RunnerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    info!("🚀 LoadMaster Probe starting...");

    let settings = RunnerSettings::from_env()?;
    info!("📡 Target API: {}", settings.base_url);

    let executor: Arc<dyn HttpExecutor> = Arc::new(ReqwestExecutor::new(
        &settings.base_url,
        settings.token.clone(),
    )?);

    if settings.load_plan.is_none() && settings.test_suite.is_none() {
        info!("Nothing to do: set LOAD_PLAN and/or TEST_SUITE");
        return Ok(());
    }

    let mut failures = Vec::new();

    if let Some(plan_path) = &settings.load_plan {
        let plan = LoadPlan::load(plan_path)?;
        let config = plan.resolve_config(settings.profile);
        info!(
            "🧪 Starting {:?} load test from {}",
            settings.profile,
            plan_path.display()
        );

        let engine = LoadTestEngine::new(executor.clone());
        let report = engine.run(plan.scenarios, config).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);

        if !report.quality_gates.all_passed() {
            error!("❌ Quality gates failed: {:?}", report.quality_gates);
            failures.push("load test quality gates");
        }
    }

    if let Some(suite_path) = &settings.test_suite {
        let suite = TestSuite::load(suite_path)?;
        let validator = Arc::new(ContractValidator::new(SchemaCache::new()));
        let mut runner = DataDrivenRunner::new(executor.clone(), validator)
            .with_mode(settings.validation_mode);

        if let Some(doc_path) = &settings.contract_doc {
            let document = DocumentCache::new().get_or_load(doc_path)?;
            info!("📄 Contract document loaded from {}", doc_path.display());
            runner = runner.with_document(document);
        }

        let report = runner.run(&suite, &TagFilter::default()).await;
        println!("{}", serde_json::to_string_pretty(&report)?);

        if !report.all_passed() {
            error!("❌ {} of {} case(s) failed", report.failed, report.total);
            failures.push("data-driven suite");
        }
    }

    if !failures.is_empty() {
        bail!("failed: {}", failures.join(", "));
    }

    info!("✅ All checks passed");
    Ok(())
}
