//! SQL dialect trait for the warehouse backends
//!
//! Only the pieces that differ between Redshift and Postgres live here:
//! column types, calendar extraction and how staging data gets loaded.

use crate::models::ColumnType;

/// Calendar parts stored in the `time` dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarField {
    Hour,
    Day,
    Week,
    Month,
    Year,
    /// 0 = Sunday .. 6 = Saturday
    Weekday,
}

impl CalendarField {
    pub const ALL: [CalendarField; 6] = [
        CalendarField::Hour,
        CalendarField::Day,
        CalendarField::Week,
        CalendarField::Month,
        CalendarField::Year,
        CalendarField::Weekday,
    ];

    /// Column name in the `time` table.
    pub fn column(&self) -> &'static str {
        match self {
            CalendarField::Hour => "hour",
            CalendarField::Day => "day",
            CalendarField::Week => "week",
            CalendarField::Month => "month",
            CalendarField::Year => "year",
            CalendarField::Weekday => "weekday",
        }
    }
}

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Column type as written in CREATE TABLE.
    fn column_type(&self, ty: ColumnType) -> String;

    /// Convert an epoch-millisecond column into a TIMESTAMP, truncated to
    /// whole seconds.
    fn epoch_millis_to_timestamp(&self, col: &str) -> String {
        format!("timestamp 'epoch' + {} / 1000 * interval '1 second'", col)
    }

    /// Integer calendar part of a timestamp column.
    fn date_part(&self, field: CalendarField, col: &str) -> String;

    /// Whether the warehouse can COPY straight from object storage. When it
    /// cannot, staging data is fetched and inserted by the loader.
    fn supports_copy_from_s3(&self) -> bool;
}
