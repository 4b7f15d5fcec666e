//! Star-schema ETL for the song play warehouse.
//!
//! Raw JSON song metadata and listening events are staged in the warehouse,
//! then reshaped into one fact table (`songplays`) and four dimensions
//! (`users`, `songs`, `artists`, `time`). Every run is a [`plan::Plan`]
//! executed in order by a [`driver::Driver`].

pub mod driver;
pub mod models;
pub mod plan;
pub mod schema;
pub mod sql;
pub mod staging;
pub mod storage;
pub mod telemetry;
pub mod transform;
pub mod warehouse;

use crate::driver::{Driver, RunSummary};
use crate::plan::{Action, Plan};
use crate::schema::SchemaManager;
use crate::staging::{JsonFetcher, StagingLoader};
use crate::storage::S3Storage;
use crate::transform::Transformer;
use crate::warehouse::PgWarehouse;
use common::config::Settings;
use common::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Which part of the pipeline a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Drop and recreate all seven tables.
    Schema,
    /// Stage the raw JSON, then insert the star schema.
    Load,
    /// Schema followed by load.
    Full,
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "schema" => Ok(Stage::Schema),
            "load" => Ok(Stage::Load),
            "full" => Ok(Stage::Full),
            other => Err(Error::InvalidSetting(format!(
                "unknown stage '{}' (expected schema, load or full)",
                other
            ))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Schema => write!(f, "schema"),
            Stage::Load => write!(f, "load"),
            Stage::Full => write!(f, "full"),
        }
    }
}

pub fn schema_plan(settings: &Settings) -> Plan {
    let dialect = sql::dialect_for(settings.pipeline.backend);
    Plan::new("schema").with_steps(SchemaManager::new(dialect).rebuild())
}

pub fn load_plan(settings: &Settings) -> Result<Plan> {
    let dialect = sql::dialect_for(settings.pipeline.backend);
    Ok(Plan::new("load")
        .with_steps(StagingLoader::new(dialect, settings).steps()?)
        .with_steps(Transformer::new(dialect).steps()))
}

pub fn build_plan(settings: &Settings, stage: Stage) -> Result<Plan> {
    let plan = match stage {
        Stage::Schema => schema_plan(settings),
        Stage::Load => load_plan(settings)?,
        Stage::Full => schema_plan(settings).then(load_plan(settings)?),
    };
    plan.validate()?;
    Ok(plan)
}

/// Connects, runs the plan for `stage` and closes the connection.
pub async fn run_stage(settings: &Settings, stage: Stage) -> Result<RunSummary> {
    let plan = build_plan(settings, stage)?;

    let warehouse = PgWarehouse::connect(&settings.cluster).await?;
    let mut driver = Driver::new(warehouse, &settings.pipeline);

    let fetches = plan
        .steps()
        .iter()
        .any(|s| matches!(s.action, Action::Fetch { .. }));
    if fetches {
        let client = storage::build_client(settings).await?;
        let fetcher = JsonFetcher::new(
            Arc::new(S3Storage::new(client)),
            settings.storage.fetch_concurrency,
        );
        driver = driver.with_fetcher(fetcher);
    }

    let summary = driver.run(&plan).await?;
    driver.close().await?;
    Ok(summary)
}

fn load_settings(config_path: &str) -> Result<Settings> {
    let settings = Settings::new(config_path)?;
    info!(
        config = config_path,
        backend = %settings.pipeline.backend,
        "Loaded configuration"
    );
    Ok(settings)
}

/// Drops and recreates every table.
pub async fn run_create_tables(config_path: &str) -> Result<RunSummary> {
    let settings = load_settings(config_path)?;
    run_stage(&settings, Stage::Schema).await
}

/// Loads staging and inserts the star schema into existing tables.
pub async fn run_etl_pipeline(config_path: &str) -> Result<RunSummary> {
    let settings = load_settings(config_path)?;
    run_stage(&settings, Stage::Load).await
}

pub async fn run_full_refresh(config_path: &str) -> Result<RunSummary> {
    let settings = load_settings(config_path)?;
    run_stage(&settings, Stage::Full).await
}

/// Renders the statements a stage would run, without connecting.
pub fn render_plan(config_path: &str, stage: Stage) -> Result<String> {
    let settings = Settings::new(config_path)?;
    Ok(build_plan(&settings, stage)?.to_string())
}
