use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar,
    Char(u8),
    Integer,
    BigInt,
    Float,
    Timestamp,
    /// Surrogate key generated by the warehouse, starting at 0.
    Identity,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::BigInt | ColumnType::Float | ColumnType::Identity
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: true,
    }
}

const fn required(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: Table,
    pub referenced_column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableGroup {
    Staging,
    FactDimension,
}

impl fmt::Display for TableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableGroup::Staging => write!(f, "staging"),
            TableGroup::FactDimension => write!(f, "fact/dimension"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Songplays,
    Users,
    Songs,
    Artists,
    Time,
}

use ColumnType::*;

const STAGING_EVENTS: &[Column] = &[
    col("artist", Varchar),
    col("auth", Varchar),
    col("firstName", Varchar),
    col("gender", Char(1)),
    col("itemInSession", Integer),
    col("lastName", Varchar),
    col("length", Float),
    col("level", Varchar),
    col("location", Varchar),
    col("method", Varchar),
    col("page", Varchar),
    col("registration", Varchar),
    col("sessionId", Integer),
    col("song", Varchar),
    col("status", Integer),
    col("ts", BigInt),
    col("userAgent", Varchar),
    col("userId", Integer),
];

const STAGING_SONGS: &[Column] = &[
    col("num_songs", Integer),
    col("artist_id", Varchar),
    col("artist_latitude", Varchar),
    col("artist_longitude", Varchar),
    col("artist_location", Varchar),
    col("artist_name", Varchar),
    col("song_id", Varchar),
    col("title", Varchar),
    col("duration", Float),
    col("year", Integer),
];

const SONGPLAYS: &[Column] = &[
    required("songplay_id", Identity),
    required("start_time", Timestamp),
    col("user_id", Integer),
    col("level", Varchar),
    col("song_id", Varchar),
    col("artist_id", Varchar),
    col("session_id", Integer),
    col("location", Varchar),
    col("user_agent", Varchar),
];

const USERS: &[Column] = &[
    required("user_id", Integer),
    col("first_name", Varchar),
    col("last_name", Varchar),
    col("gender", Char(1)),
    col("level", Varchar),
];

const SONGS: &[Column] = &[
    required("song_id", Varchar),
    col("title", Varchar),
    required("artist_id", Varchar),
    col("year", Integer),
    col("duration", Float),
];

const ARTISTS: &[Column] = &[
    required("artist_id", Varchar),
    col("name", Varchar),
    col("location", Varchar),
    col("latitude", Varchar),
    col("longitude", Varchar),
];

const TIME: &[Column] = &[
    required("start_time", Timestamp),
    col("hour", Integer),
    col("day", Integer),
    col("week", Integer),
    col("month", Integer),
    col("year", Integer),
    col("weekday", Integer),
];

const SONGPLAYS_FKS: &[ForeignKey] = &[
    ForeignKey {
        column: "start_time",
        references: Table::Time,
        referenced_column: "start_time",
    },
    ForeignKey {
        column: "user_id",
        references: Table::Users,
        referenced_column: "user_id",
    },
    ForeignKey {
        column: "song_id",
        references: Table::Songs,
        referenced_column: "song_id",
    },
    ForeignKey {
        column: "artist_id",
        references: Table::Artists,
        referenced_column: "artist_id",
    },
];

const SONGS_FKS: &[ForeignKey] = &[ForeignKey {
    column: "artist_id",
    references: Table::Artists,
    referenced_column: "artist_id",
}];

impl Table {
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplays => "songplays",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Table::StagingEvents => STAGING_EVENTS,
            Table::StagingSongs => STAGING_SONGS,
            Table::Songplays => SONGPLAYS,
            Table::Users => USERS,
            Table::Songs => SONGS,
            Table::Artists => ARTISTS,
            Table::Time => TIME,
        }
    }

    /// Column holding the natural (or surrogate) key, if the table has one.
    pub fn primary_key(&self) -> Option<&'static str> {
        match self {
            Table::StagingEvents | Table::StagingSongs => None,
            Table::Songplays => Some("songplay_id"),
            Table::Users => Some("user_id"),
            Table::Songs => Some("song_id"),
            Table::Artists => Some("artist_id"),
            Table::Time => Some("start_time"),
        }
    }

    pub fn foreign_keys(&self) -> &'static [ForeignKey] {
        match self {
            Table::Songplays => SONGPLAYS_FKS,
            Table::Songs => SONGS_FKS,
            _ => &[],
        }
    }

    /// Tables this one holds foreign keys into.
    pub fn references(&self) -> impl Iterator<Item = Table> {
        self.foreign_keys().iter().map(|fk| fk.references)
    }

    /// Tables holding foreign keys into this one.
    pub fn referenced_by(&self) -> impl Iterator<Item = Table> {
        let this = *self;
        Table::ALL
            .into_iter()
            .filter(move |other| other.references().any(|t| t == this))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
