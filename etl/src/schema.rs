//! Schema manager: DROP and CREATE statements for the staging pair and the
//! fact/dimension set.

use crate::models::{Table, TableGroup};
use crate::plan::{Step, StepKind};
use crate::sql::SqlDialect;
use tracing::debug;

/// Fact/dimension drop order: the fact table first, and songs before the
/// artists table it references.
const FACT_DIMENSION_DROP_ORDER: [Table; 5] = [
    Table::Songplays,
    Table::Users,
    Table::Songs,
    Table::Artists,
    Table::Time,
];

/// Fact/dimension create order: every referenced table exists before the
/// table holding the foreign key.
const FACT_DIMENSION_CREATE_ORDER: [Table; 5] = [
    Table::Artists,
    Table::Users,
    Table::Songs,
    Table::Time,
    Table::Songplays,
];

const STAGING_ORDER: [Table; 2] = [Table::StagingEvents, Table::StagingSongs];

pub struct SchemaManager {
    dialect: &'static dyn SqlDialect,
}

impl SchemaManager {
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn drop(&self, group: TableGroup) -> Vec<Step> {
        let tables: &[Table] = match group {
            TableGroup::Staging => &STAGING_ORDER,
            TableGroup::FactDimension => &FACT_DIMENSION_DROP_ORDER,
        };
        debug!(group = %group, tables = tables.len(), "Rendering DROP statements");
        tables
            .iter()
            .map(|t| Step::sql(StepKind::Drop, *t, drop_table_sql(*t)))
            .collect()
    }

    pub fn create(&self, group: TableGroup) -> Vec<Step> {
        let tables: &[Table] = match group {
            TableGroup::Staging => &STAGING_ORDER,
            TableGroup::FactDimension => &FACT_DIMENSION_CREATE_ORDER,
        };
        debug!(
            group = %group,
            dialect = self.dialect.name(),
            tables = tables.len(),
            "Rendering CREATE statements"
        );
        tables
            .iter()
            .map(|t| Step::sql(StepKind::Create, *t, self.create_table_sql(*t)))
            .collect()
    }

    /// Drop staging then fact/dimension, create staging then fact/dimension.
    pub fn rebuild(&self) -> Vec<Step> {
        let mut steps = self.drop(TableGroup::Staging);
        steps.extend(self.drop(TableGroup::FactDimension));
        steps.extend(self.create(TableGroup::Staging));
        steps.extend(self.create(TableGroup::FactDimension));
        steps
    }

    pub fn create_table_sql(&self, table: Table) -> String {
        let mut lines: Vec<String> = table
            .columns()
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("    {} {}{}", c.name, self.dialect.column_type(c.ty), null)
            })
            .collect();

        if let Some(pk) = table.primary_key() {
            lines.push(format!("    PRIMARY KEY ({})", pk));
        }
        for fk in table.foreign_keys() {
            lines.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({})",
                fk.column, fk.references, fk.referenced_column
            ));
        }

        format!("CREATE TABLE {} (\n{}\n)", table, lines.join(",\n"))
    }
}

pub fn drop_table_sql(table: Table) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}
