//! Amazon Redshift SQL dialect

use super::{CalendarField, SqlDialect};
use crate::models::ColumnType;

pub struct RedshiftDialect;

impl SqlDialect for RedshiftDialect {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn column_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Varchar => "VARCHAR".to_string(),
            ColumnType::Char(n) => format!("CHAR({})", n),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Identity => "INTEGER IDENTITY(0, 1)".to_string(),
        }
    }

    fn date_part(&self, field: CalendarField, col: &str) -> String {
        let part = match field {
            CalendarField::Hour => "h",
            CalendarField::Day => "d",
            CalendarField::Week => "w",
            CalendarField::Month => "mon",
            CalendarField::Year => "y",
            CalendarField::Weekday => "dayofweek",
        };
        format!("date_part({}, {})", part, col)
    }

    fn supports_copy_from_s3(&self) -> bool {
        true
    }
}
