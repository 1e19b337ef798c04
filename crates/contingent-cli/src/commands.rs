use std::path::Path;

use anyhow::{bail, Context};
use contingent_common::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use contingent_common::{ContingencyTable, ContingentConfig, TableLabels};
use contingent_query::{
    BuildProgress, BuildStage, ContingencyQuery, JobOrchestrator, PollPolicy, TaskApiClient,
};
use contingent_stats::StatTest;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::report::Report;

/// CLI-level overrides for `build`.
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub exposure_code: Option<String>,
    pub exposure_table: Option<String>,
    pub outcome_code: Option<String>,
    pub outcome_table: Option<String>,
    pub collection: Option<String>,
    pub wait_forever: bool,
    pub json: bool,
}

fn apply_build_overrides(config: &mut ContingentConfig, args: &BuildArgs) -> anyhow::Result<()> {
    let query = &mut config.query;
    if let Some(ref v) = args.exposure_code {
        query.exposure_code = v.clone();
    }
    if let Some(ref v) = args.exposure_table {
        query.exposure_table = v.clone();
    }
    if let Some(ref v) = args.outcome_code {
        query.outcome_code = v.clone();
    }
    if let Some(ref v) = args.outcome_table {
        query.outcome_table = v.clone();
    }
    if let Some(ref v) = args.collection {
        config.task_api.collection_id = v.clone();
    }
    if args.wait_forever {
        config.polling.unbounded = true;
    }

    config.validate()?;
    config.task_api.validate()?;
    if config.query.exposure_code.is_empty() || config.query.outcome_code.is_empty() {
        bail!("Both an exposure code and an outcome code are required (query.* or --exposure-code/--outcome-code)");
    }
    if config.task_api.collection_id.is_empty() {
        bail!("No collection configured (task_api.collection_id or --collection)");
    }
    Ok(())
}

fn log_progress(event: &BuildProgress) {
    let cell = event.cell.map(|c| c.to_string()).unwrap_or_default();
    match event.stage {
        BuildStage::Submitted => info!(%cell, job_uuid = ?event.job_uuid, "Submitted"),
        BuildStage::Polling => debug!(%cell, attempt = event.attempt, status = %event.message, "Still waiting"),
        BuildStage::Done => info!(%cell, attempt = event.attempt, "{}", event.message),
        BuildStage::Failed => warn!(%cell, status = %event.message, "Job failed"),
        BuildStage::Assembled => info!(build_id = %event.build_id, "Table assembled, {}", event.message),
    }
}

pub async fn build(config_file: Option<&Path>, args: BuildArgs) -> anyhow::Result<()> {
    let mut config = ContingentConfig::load(config_file).with_context(|| {
        format!(
            "Could not load configuration (pass --config, set {CONFIG_ENV_VAR} or copy \
             contingent.example.toml to {DEFAULT_CONFIG_PATH})"
        )
    })?;
    apply_build_overrides(&mut config, &args)?;

    let client = TaskApiClient::from_config(&config.task_api).context("Failed to create task API client")?;
    info!(base_url = %client.base_url(), collection = %config.task_api.collection_id, "Task API client ready");

    let policy = PollPolicy::from_config(&config.polling);
    let suite = StatTest::standard_suite(&config.stats).context("Invalid [stats] configuration")?;
    let query = ContingencyQuery::from_config(&config.query);

    let (tx, mut rx) = broadcast::channel::<BuildProgress>(64);
    let progress = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_progress(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => debug!(skipped = n, "Progress events dropped"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let orchestrator = JobOrchestrator::new(client)
        .with_policy(policy)
        .with_max_workers(config.polling.max_workers)
        .with_progress(tx);
    let result = orchestrator
        .build_contingency_table(&query, &config.task_api.collection_id, &config.task_api.owner)
        .await;
    drop(orchestrator);
    if let Err(e) = progress.await {
        debug!(error = %e, "Progress logger stopped early");
    }

    let table = match result {
        Ok(table) => table,
        Err(e) => {
            if e.is_retryable() {
                warn!("The submission can be retried; each attempt uses fresh correlation ids");
            }
            return Err(anyhow::Error::new(e).context("Contingency table build failed"));
        }
    };

    let labels = TableLabels { exposure: query.exposure_code.clone(), outcome: query.outcome_code.clone() };
    print_report(&Report::analyze(table, &suite), &labels, args.json)
}

pub fn analyze(
    config_file: Option<&Path>,
    counts: [i64; 4],
    alternative: Option<String>,
    yates: bool,
    json: bool,
) -> anyhow::Result<()> {
    let table = ContingencyTable::from_ordered(&counts).context("Invalid counts")?;

    let mut stats = ContingentConfig::load_or_default(config_file)
        .context("Could not load configuration")?
        .stats;
    if let Some(alternative) = alternative {
        stats.alternative = alternative;
    }
    stats.yates_correction |= yates;
    let suite = StatTest::standard_suite(&stats).context("Invalid test settings")?;

    print_report(&Report::analyze(table, &suite), &TableLabels::default(), json)
}

fn print_report(report: &Report, labels: &TableLabels, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render(labels));
    }
    Ok(())
}
