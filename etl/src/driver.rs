//! Runs a plan on one warehouse connection.

use crate::models::Table;
use crate::plan::{Action, Plan, Step};
use crate::staging::JsonFetcher;
use crate::warehouse::Warehouse;
use chrono::{DateTime, Utc};
use common::config::{CommitMode, PipelineConfig};
use common::{Error, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub plan: String,
    pub steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Row counts of the tables the plan loaded, when reporting is enabled.
    pub row_counts: Vec<(Table, i64)>,
}

pub struct Driver<W: Warehouse> {
    warehouse: W,
    commit_mode: CommitMode,
    report_row_counts: bool,
    fetcher: Option<JsonFetcher>,
}

impl<W: Warehouse> Driver<W> {
    pub fn new(warehouse: W, pipeline: &PipelineConfig) -> Self {
        Self {
            warehouse,
            commit_mode: pipeline.commit_mode,
            report_row_counts: pipeline.report_row_counts,
            fetcher: None,
        }
    }

    /// Needed for plans with fetch steps.
    pub fn with_fetcher(mut self, fetcher: JsonFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn warehouse_mut(&mut self) -> &mut W {
        &mut self.warehouse
    }

    pub async fn run(&mut self, plan: &Plan) -> Result<RunSummary> {
        plan.validate()?;

        let started_at = Utc::now();
        info!(
            plan = plan.name(),
            steps = plan.steps().len(),
            commit_mode = ?self.commit_mode,
            "Starting plan"
        );

        let outcome = match self.commit_mode {
            CommitMode::PerStatement => self.run_per_statement(plan).await,
            CommitMode::SingleTransaction => self.run_single_transaction(plan).await,
        };

        if let Err(e) = outcome {
            self.abandon_transaction().await;
            return Err(e);
        }

        let row_counts = if self.report_row_counts {
            self.count_loaded_rows(plan).await?
        } else {
            Vec::new()
        };

        let finished_at = Utc::now();
        info!(
            plan = plan.name(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Plan complete"
        );

        Ok(RunSummary {
            plan: plan.name().to_string(),
            steps: plan.steps().len(),
            started_at,
            finished_at,
            row_counts,
        })
    }

    async fn run_per_statement(&mut self, plan: &Plan) -> Result<()> {
        for step in plan.steps() {
            self.warehouse.begin().await?;
            self.execute_step(step).await?;
            self.warehouse.commit().await?;
        }
        Ok(())
    }

    async fn run_single_transaction(&mut self, plan: &Plan) -> Result<()> {
        self.warehouse.begin().await?;
        for step in plan.steps() {
            self.execute_step(step).await?;
        }
        self.warehouse.commit().await
    }

    /// Rolls back whatever transaction the failed step left open. The
    /// step's error is what gets reported.
    async fn abandon_transaction(&mut self) {
        if let Err(e) = self.warehouse.rollback().await {
            warn!(error = %e, "Rollback after failed step also failed");
        }
    }

    async fn execute_step(&mut self, step: &Step) -> Result<u64> {
        let started = Instant::now();

        let rows = match &step.action {
            Action::Sql(sql) => {
                debug!(step = %step.name, sql = %sql, "Executing statement");
                self.warehouse.execute(sql).await
            }
            Action::Fetch { source, mapping } => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                    Error::Load(format!(
                        "step '{}' fetches from object storage but no storage is configured",
                        step.name
                    ))
                })?;
                fetcher
                    .load(&mut self.warehouse, step.table, source, mapping)
                    .await
            }
        }
        .map_err(|e| match e {
            Error::Database(source) => Error::statement(&step.name, source),
            other => other,
        })?;

        info!(
            step = %step.name,
            kind = %step.kind,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Step complete"
        );
        Ok(rows)
    }

    async fn count_loaded_rows(&mut self, plan: &Plan) -> Result<Vec<(Table, i64)>> {
        let mut counts = Vec::new();
        for table in plan.loaded_tables() {
            let count = self.warehouse.count_rows(table).await?;
            info!(table = %table, rows = count, "Table row count");
            counts.push((table, count));
        }
        Ok(counts)
    }

    /// Closes the connection; called once the plan has completed.
    pub async fn close(self) -> Result<()> {
        self.warehouse.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::StepKind;
    use crate::schema::SchemaManager;
    use crate::sql::RedshiftDialect;
    use crate::storage::S3Location;
    use crate::plan::JsonMapping;
    use crate::warehouse::testing::RecordingWarehouse;

    fn pipeline(commit_mode: CommitMode) -> PipelineConfig {
        PipelineConfig {
            commit_mode,
            ..Default::default()
        }
    }

    fn three_step_plan() -> Plan {
        Plan::new("test").with_steps([
            Step::sql(StepKind::Create, Table::Artists, "CREATE TABLE artists ()"),
            Step::sql(StepKind::Create, Table::Songs, "CREATE TABLE songs ()"),
            Step::sql(StepKind::Create, Table::Time, "CREATE TABLE time ()"),
        ])
    }

    #[tokio::test]
    async fn test_per_statement_commits_after_every_step() {
        let mut driver = Driver::new(
            RecordingWarehouse::default(),
            &pipeline(CommitMode::PerStatement),
        );
        let summary = driver.run(&three_step_plan()).await.unwrap();

        assert_eq!(summary.steps, 3);
        assert!(summary.row_counts.is_empty());
        assert_eq!(
            driver.warehouse.log,
            vec![
                "BEGIN",
                "CREATE TABLE artists ()",
                "COMMIT",
                "BEGIN",
                "CREATE TABLE songs ()",
                "COMMIT",
                "BEGIN",
                "CREATE TABLE time ()",
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn test_single_transaction_wraps_the_plan() {
        let mut driver = Driver::new(
            RecordingWarehouse::default(),
            &pipeline(CommitMode::SingleTransaction),
        );
        driver.run(&three_step_plan()).await.unwrap();

        assert_eq!(driver.warehouse.log.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(driver.warehouse.log.last().map(String::as_str), Some("COMMIT"));
        assert_eq!(driver.warehouse.log.len(), 5);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_commits_and_stops() {
        let mut driver = Driver::new(
            RecordingWarehouse::failing_on("songs"),
            &pipeline(CommitMode::PerStatement),
        );
        let err = driver.run(&three_step_plan()).await.unwrap_err();

        assert!(matches!(&err, Error::Statement { step, .. } if step == "create songs"));
        assert_eq!(
            driver.warehouse.log,
            vec!["BEGIN", "CREATE TABLE artists ()", "COMMIT", "BEGIN", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn test_single_transaction_failure_rolls_back_everything() {
        let mut driver = Driver::new(
            RecordingWarehouse::failing_on("time"),
            &pipeline(CommitMode::SingleTransaction),
        );
        assert!(driver.run(&three_step_plan()).await.is_err());
        assert_eq!(
            driver.warehouse.log,
            vec![
                "BEGIN",
                "CREATE TABLE artists ()",
                "CREATE TABLE songs ()",
                "ROLLBACK"
            ]
        );
        assert!(!driver.warehouse.log.iter().any(|s| s == "COMMIT"));
    }

    #[tokio::test]
    async fn test_invalid_plan_is_rejected_before_execution() {
        let plan = Plan::new("bad").with_steps([
            Step::sql(StepKind::Create, Table::Songs, "CREATE TABLE songs ()"),
            Step::sql(StepKind::Create, Table::Artists, "CREATE TABLE artists ()"),
        ]);
        let mut driver = Driver::new(RecordingWarehouse::default(), &PipelineConfig::default());

        assert!(matches!(driver.run(&plan).await, Err(Error::PlanOrder(_))));
        assert!(driver.warehouse.log.is_empty());
    }

    #[tokio::test]
    async fn test_schema_rebuild_twice_runs_same_statements() {
        let plan = Plan::new("schema").with_steps(SchemaManager::new(&RedshiftDialect).rebuild());
        let mut driver = Driver::new(RecordingWarehouse::default(), &PipelineConfig::default());

        driver.run(&plan).await.unwrap();
        let first: Vec<String> = driver.warehouse.log.clone();
        driver.run(&plan).await.unwrap();

        assert_eq!(driver.warehouse.log.len(), first.len() * 2);
        assert_eq!(&driver.warehouse.log[first.len()..], first.as_slice());
        assert_eq!(driver.warehouse.statements().len(), 28);
    }

    #[tokio::test]
    async fn test_fetch_step_without_storage_fails() {
        let plan = Plan::new("load").with_steps([Step::fetch(
            Table::StagingSongs,
            S3Location::parse("s3://bucket/song_data").unwrap(),
            JsonMapping::Auto,
        )]);
        let mut driver = Driver::new(RecordingWarehouse::default(), &PipelineConfig::default());

        assert!(matches!(driver.run(&plan).await, Err(Error::Load(_))));
    }

    #[tokio::test]
    async fn test_reports_row_counts_for_loaded_tables() {
        let plan = Plan::new("load").with_steps([
            Step::sql(StepKind::Load, Table::StagingEvents, "COPY staging_events"),
            Step::sql(StepKind::Insert, Table::Users, "INSERT INTO users SELECT 1")
                .reading(&[Table::StagingEvents]),
        ]);
        let mut driver = Driver::new(RecordingWarehouse::default(), &PipelineConfig::default());
        let summary = driver.run(&plan).await.unwrap();

        assert_eq!(
            summary.row_counts,
            vec![(Table::StagingEvents, 0), (Table::Users, 0)]
        );
    }
}
