//! Staging loader: fills `staging_events` and `staging_songs` from the raw
//! JSON objects in object storage.
//!
//! On Redshift both tables are loaded with server-side COPY. Backends without
//! COPY-from-S3 get fetch steps instead, which [`JsonFetcher`] executes.

mod copy;
mod fetch;
mod jsonpaths;

pub use copy::{events_copy_sql, songs_copy_sql};
pub use fetch::{JsonFetcher, coerce_value, map_record};
pub use jsonpaths::{PathSegment, parse_jsonpaths};

use crate::models::Table;
use crate::plan::{JsonMapping, Step, StepKind};
use crate::sql::SqlDialect;
use crate::storage::S3Location;
use common::Result;
use common::config::Settings;

pub struct StagingLoader<'a> {
    dialect: &'static dyn SqlDialect,
    settings: &'a Settings,
}

impl<'a> StagingLoader<'a> {
    pub fn new(dialect: &'static dyn SqlDialect, settings: &'a Settings) -> Self {
        Self { dialect, settings }
    }

    /// One load step per staging table: events first, then songs.
    pub fn steps(&self) -> Result<Vec<Step>> {
        if self.dialect.supports_copy_from_s3() {
            return Ok(vec![
                Step::sql(
                    StepKind::Load,
                    Table::StagingEvents,
                    events_copy_sql(self.settings),
                ),
                Step::sql(
                    StepKind::Load,
                    Table::StagingSongs,
                    songs_copy_sql(self.settings),
                ),
            ]);
        }

        let s3 = &self.settings.s3;
        Ok(vec![
            Step::fetch(
                Table::StagingEvents,
                S3Location::parse(&s3.log_data)?,
                JsonMapping::JsonPaths(S3Location::parse(&s3.log_jsonpath)?),
            ),
            Step::fetch(
                Table::StagingSongs,
                S3Location::parse(&s3.song_data)?,
                JsonMapping::Auto,
            ),
        ])
    }
}
