//! PostgreSQL SQL dialect

use super::{CalendarField, SqlDialect};
use crate::models::ColumnType;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Varchar => "VARCHAR".to_string(),
            ColumnType::Char(n) => format!("CHAR({})", n),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Identity => {
                "INTEGER GENERATED BY DEFAULT AS IDENTITY (START WITH 0 MINVALUE 0)".to_string()
            }
        }
    }

    fn date_part(&self, field: CalendarField, col: &str) -> String {
        let part = match field {
            CalendarField::Hour => "HOUR",
            CalendarField::Day => "DAY",
            CalendarField::Week => "WEEK",
            CalendarField::Month => "MONTH",
            CalendarField::Year => "YEAR",
            CalendarField::Weekday => "DOW",
        };
        format!("EXTRACT({} FROM {})::INTEGER", part, col)
    }

    fn supports_copy_from_s3(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_column() {
        assert_eq!(
            PostgresDialect.column_type(ColumnType::Identity),
            "INTEGER GENERATED BY DEFAULT AS IDENTITY (START WITH 0 MINVALUE 0)"
        );
    }

    #[test]
    fn test_date_part() {
        assert_eq!(
            PostgresDialect.date_part(CalendarField::Weekday, "start_time"),
            "EXTRACT(DOW FROM start_time)::INTEGER"
        );
    }
}
