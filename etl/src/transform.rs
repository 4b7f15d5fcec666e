//! Transformer: INSERT...SELECT statements that build the star schema from the
//! staging tables.

use crate::models::Table;
use crate::plan::{Step, StepKind};
use crate::sql::{CalendarField, SqlDialect};

/// Page action marking a song play in the event log.
pub const SONG_PLAY_PAGE: &str = "NextSong";

pub struct Transformer {
    dialect: &'static dyn SqlDialect,
}

impl Transformer {
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// Dimensions first, then the fact table. Artists precede songs because
    /// songs holds a foreign key into artists.
    pub fn steps(&self) -> Vec<Step> {
        vec![
            Step::sql(StepKind::Insert, Table::Users, self.users_sql())
                .reading(&[Table::StagingEvents]),
            Step::sql(StepKind::Insert, Table::Time, self.time_sql())
                .reading(&[Table::StagingEvents]),
            Step::sql(StepKind::Insert, Table::Artists, self.artists_sql())
                .reading(&[Table::StagingSongs]),
            Step::sql(StepKind::Insert, Table::Songs, self.songs_sql())
                .reading(&[Table::StagingSongs]),
            Step::sql(StepKind::Insert, Table::Songplays, self.songplays_sql())
                .reading(&[Table::StagingEvents, Table::StagingSongs]),
        ]
    }

    /// One row per user; when a user appears with different attributes (a
    /// free to paid upgrade) the latest event wins. Events without a `ts`
    /// rank last, and ties fall back to the later position in the session.
    pub fn users_sql(&self) -> String {
        format!(
            "INSERT INTO users (user_id, first_name, last_name, gender, level)\n\
             SELECT user_id, first_name, last_name, gender, level\n\
             FROM (\n\
             \x20   SELECT\n\
             \x20       userId AS user_id,\n\
             \x20       firstName AS first_name,\n\
             \x20       lastName AS last_name,\n\
             \x20       gender,\n\
             \x20       level,\n\
             \x20       ROW_NUMBER() OVER (\n\
             \x20           PARTITION BY userId\n\
             \x20           ORDER BY ts DESC NULLS LAST, itemInSession DESC NULLS LAST, sessionId DESC NULLS LAST\n\
             \x20       ) AS event_rank\n\
             \x20   FROM staging_events\n\
             \x20   WHERE userId IS NOT NULL AND page = '{}'\n\
             ) AS latest_user_events\n\
             WHERE event_rank = 1",
            SONG_PLAY_PAGE
        )
    }

    pub fn time_sql(&self) -> String {
        let parts: Vec<String> = CalendarField::ALL
            .iter()
            .map(|f| {
                format!(
                    "    {} AS {}",
                    self.dialect.date_part(*f, "start_time"),
                    f.column()
                )
            })
            .collect();
        let columns: Vec<&str> = CalendarField::ALL.iter().map(|f| f.column()).collect();

        format!(
            "INSERT INTO time (start_time, {})\n\
             SELECT\n\
             \x20   start_time,\n\
             {}\n\
             FROM (\n\
             \x20   SELECT DISTINCT {} AS start_time\n\
             \x20   FROM staging_events\n\
             \x20   WHERE ts IS NOT NULL\n\
             ) AS event_times",
            columns.join(", "),
            parts.join(",\n"),
            self.dialect.epoch_millis_to_timestamp("ts")
        )
    }

    /// One row per artist. Song files repeat artist attributes and do not
    /// always agree, so the attributes come from the artist's lowest song_id.
    pub fn artists_sql(&self) -> String {
        "INSERT INTO artists (artist_id, name, location, latitude, longitude)\n\
         SELECT artist_id, name, location, latitude, longitude\n\
         FROM (\n\
         \x20   SELECT\n\
         \x20       artist_id,\n\
         \x20       artist_name AS name,\n\
         \x20       artist_location AS location,\n\
         \x20       artist_latitude AS latitude,\n\
         \x20       artist_longitude AS longitude,\n\
         \x20       ROW_NUMBER() OVER (PARTITION BY artist_id ORDER BY song_id) AS artist_rank\n\
         \x20   FROM staging_songs\n\
         ) AS ranked_artists\n\
         WHERE artist_rank = 1"
            .to_string()
    }

    pub fn songs_sql(&self) -> String {
        "INSERT INTO songs (song_id, title, artist_id, year, duration)\n\
         SELECT song_id, title, artist_id, year, duration\n\
         FROM (\n\
         \x20   SELECT\n\
         \x20       song_id,\n\
         \x20       title,\n\
         \x20       artist_id,\n\
         \x20       year,\n\
         \x20       duration,\n\
         \x20       ROW_NUMBER() OVER (PARTITION BY song_id ORDER BY artist_id, title) AS song_rank\n\
         \x20   FROM staging_songs\n\
         ) AS ranked_songs\n\
         WHERE song_rank = 1"
            .to_string()
    }

    /// Left join: plays without matching song metadata keep NULL song and
    /// artist keys instead of being dropped. Plays without a `ts` have no
    /// start_time and are skipped.
    pub fn songplays_sql(&self) -> String {
        format!(
            "INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)\n\
             SELECT DISTINCT\n\
             \x20   {} AS start_time,\n\
             \x20   se.userId AS user_id,\n\
             \x20   se.level AS level,\n\
             \x20   ss.song_id AS song_id,\n\
             \x20   ss.artist_id AS artist_id,\n\
             \x20   se.sessionId AS session_id,\n\
             \x20   se.location AS location,\n\
             \x20   se.userAgent AS user_agent\n\
             FROM staging_events se\n\
             LEFT JOIN staging_songs ss ON (se.song = ss.title AND se.artist = ss.artist_name)\n\
             WHERE se.page = '{}' AND se.ts IS NOT NULL",
            self.dialect.epoch_millis_to_timestamp("se.ts"),
            SONG_PLAY_PAGE
        )
    }
}
