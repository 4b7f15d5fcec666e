use crate::sql::quote_literal;
use common::config::Settings;

/// COPY for the event log: positional field mapping from the JSONPaths
/// document. Compression analysis and statistics are skipped because the
/// staging tables are rebuilt every run.
pub fn events_copy_sql(settings: &Settings) -> String {
    format!(
        "COPY staging_events\n\
         FROM {}\n\
         IAM_ROLE {}\n\
         JSON {}\n\
         REGION {}\n\
         COMPUPDATE OFF STATUPDATE OFF",
        quote_literal(&settings.s3.log_data),
        quote_literal(&settings.iam_role.arn),
        quote_literal(&settings.s3.log_jsonpath),
        quote_literal(&settings.s3.region),
    )
}

/// COPY for song metadata: field names match the column names.
pub fn songs_copy_sql(settings: &Settings) -> String {
    format!(
        "COPY staging_songs\n\
         FROM {}\n\
         IAM_ROLE {}\n\
         REGION {}\n\
         FORMAT AS JSON 'auto'\n\
         COMPUPDATE OFF STATUPDATE OFF",
        quote_literal(&settings.s3.song_data),
        quote_literal(&settings.iam_role.arn),
        quote_literal(&settings.s3.region),
    )
}
