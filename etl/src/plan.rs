//! Ordered execution plans
//!
//! Every run is a list of named steps. Ordering constraints between steps are
//! derived from the table model and checked by [`Plan::validate`], so the
//! order is not an accident of how the step lists happen to be declared.

use crate::models::Table;
use crate::storage::S3Location;
use common::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Drop,
    Create,
    Load,
    Insert,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Drop => "drop",
            StepKind::Create => "create",
            StepKind::Load => "load",
            StepKind::Insert => "insert",
        };
        f.write_str(s)
    }
}

/// How JSON fields map onto staging columns when the loader reads objects
/// itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonMapping {
    /// Positional mapping read from a JSONPaths document.
    JsonPaths(S3Location),
    /// Field names match column names.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A single statement executed on the warehouse.
    Sql(String),
    /// Objects under `source` are fetched, mapped and inserted by the loader.
    Fetch {
        source: S3Location,
        mapping: JsonMapping,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    pub table: Table,
    pub action: Action,
    /// Tables a Load must have filled before this step runs.
    pub reads: Vec<Table>,
}

impl Step {
    pub fn sql(kind: StepKind, table: Table, sql: impl Into<String>) -> Self {
        Self {
            name: format!("{} {}", kind, table),
            kind,
            table,
            action: Action::Sql(sql.into()),
            reads: Vec::new(),
        }
    }

    pub fn fetch(table: Table, source: S3Location, mapping: JsonMapping) -> Self {
        Self {
            name: format!("{} {}", StepKind::Load, table),
            kind: StepKind::Load,
            table,
            action: Action::Fetch { source, mapping },
            reads: Vec::new(),
        }
    }

    pub fn reading(mut self, tables: &[Table]) -> Self {
        self.reads.extend_from_slice(tables);
        self
    }

    /// Steps that must come first when they are part of the same plan.
    fn prerequisites(&self) -> Vec<(StepKind, Table)> {
        match self.kind {
            StepKind::Drop => self
                .table
                .referenced_by()
                .map(|t| (StepKind::Drop, t))
                .collect(),
            StepKind::Create => self
                .table
                .references()
                .map(|t| (StepKind::Create, t))
                .collect(),
            StepKind::Load => vec![(StepKind::Create, self.table)],
            StepKind::Insert => self
                .table
                .references()
                .map(|t| (StepKind::Insert, t))
                .chain(self.reads.iter().map(|t| (StepKind::Load, *t)))
                .chain(std::iter::once((StepKind::Create, self.table)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    name: String,
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Appends another plan's steps after this one's.
    pub fn then(mut self, other: Plan) -> Self {
        self.name = format!("{}+{}", self.name, other.name);
        self.steps.extend(other.steps);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Tables filled by Load or Insert steps, in plan order.
    pub fn loaded_tables(&self) -> Vec<Table> {
        let mut tables = Vec::new();
        for step in &self.steps {
            if matches!(step.kind, StepKind::Load | StepKind::Insert) && !tables.contains(&step.table)
            {
                tables.push(step.table);
            }
        }
        tables
    }

    fn position(&self, kind: StepKind, table: Table) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.kind == kind && s.table == table)
    }

    /// Checks that no step runs before a step it depends on. Dependencies that
    /// are not part of the plan are assumed satisfied by an earlier run.
    pub fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            for (kind, table) in step.prerequisites() {
                if let Some(required) = self.position(kind, table) {
                    if required > index {
                        return Err(Error::PlanOrder(format!(
                            "'{}' runs before '{} {}' in plan '{}'",
                            step.name, kind, table, self.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- plan: {} ({} steps)", self.name, self.steps.len())?;
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "-- [{}] {}", index + 1, step.name)?;
            match &step.action {
                Action::Sql(sql) => writeln!(f, "{};", sql.trim())?,
                Action::Fetch { source, mapping } => {
                    write!(f, "-- fetch JSON objects from {} into {}", source, step.table)?;
                    match mapping {
                        JsonMapping::JsonPaths(paths) => writeln!(f, " using {}", paths)?,
                        JsonMapping::Auto => writeln!(f, " (auto)")?,
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(table: Table) -> Step {
        Step::sql(StepKind::Create, table, format!("CREATE TABLE {} ()", table))
    }

    fn drop(table: Table) -> Step {
        Step::sql(StepKind::Drop, table, format!("DROP TABLE IF EXISTS {}", table))
    }

    #[test]
    fn test_create_fact_after_dimensions_is_valid() {
        let plan = Plan::new("schema").with_steps([
            create(Table::Artists),
            create(Table::Users),
            create(Table::Songs),
            create(Table::Time),
            create(Table::Songplays),
        ]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_create_fact_before_dimension_is_rejected() {
        let plan = Plan::new("schema").with_steps([
            create(Table::Artists),
            create(Table::Songplays),
            create(Table::Time),
        ]);
        let err = plan.validate().unwrap_err();
        assert!(matches!(err, Error::PlanOrder(_)));
        assert!(err.to_string().contains("create songplays"));
    }

    #[test]
    fn test_drop_referenced_table_first_is_rejected() {
        let plan = Plan::new("drop").with_steps([drop(Table::Artists), drop(Table::Songs)]);
        assert!(plan.validate().is_err());

        let plan = Plan::new("drop").with_steps([drop(Table::Songs), drop(Table::Artists)]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_insert_must_follow_staging_load() {
        let insert = Step::sql(StepKind::Insert, Table::Users, "INSERT INTO users SELECT 1")
            .reading(&[Table::StagingEvents]);
        let load = Step::sql(StepKind::Load, Table::StagingEvents, "COPY staging_events");

        let plan = Plan::new("load").with_steps([insert.clone(), load.clone()]);
        assert!(plan.validate().is_err());

        let plan = Plan::new("load").with_steps([load, insert]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_missing_dependencies_are_assumed_satisfied() {
        let plan = Plan::new("partial").with_steps([create(Table::Songplays)]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_then_concatenates_and_reports_loaded_tables() {
        let schema = Plan::new("schema").with_steps([create(Table::StagingEvents)]);
        let load = Plan::new("load").with_steps([Step::sql(
            StepKind::Load,
            Table::StagingEvents,
            "COPY staging_events",
        )]);
        let plan = schema.then(load);
        assert_eq!(plan.name(), "schema+load");
        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.loaded_tables(), vec![Table::StagingEvents]);
    }

    #[test]
    fn test_display_lists_statements() {
        let plan = Plan::new("schema").with_steps([drop(Table::Time)]);
        let rendered = plan.to_string();
        assert!(rendered.contains("-- [1] drop time"));
        assert!(rendered.contains("DROP TABLE IF EXISTS time;"));
    }
}
