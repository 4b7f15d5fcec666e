use super::jsonpaths::{PathSegment, parse_jsonpaths, resolve};
use crate::models::{ColumnType, Table};
use crate::plan::JsonMapping;
use crate::storage::{ObjectStorage, S3Location};
use crate::warehouse::Warehouse;
use common::{Error, Result};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Records buffered before they are sent to the warehouse.
const FLUSH_ROWS: usize = 2_000;

/// Client-side replacement for COPY: reads every object under a prefix and
/// inserts the mapped records into a staging table.
pub struct JsonFetcher {
    storage: Arc<dyn ObjectStorage>,
    concurrency: usize,
}

impl JsonFetcher {
    pub fn new(storage: Arc<dyn ObjectStorage>, concurrency: usize) -> Self {
        Self {
            storage,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn load<W: Warehouse>(
        &self,
        warehouse: &mut W,
        table: Table,
        source: &S3Location,
        mapping: &JsonMapping,
    ) -> Result<u64> {
        let started = Instant::now();
        let paths = self.column_paths(table, mapping).await?;

        let objects: Vec<S3Location> = self
            .storage
            .list_objects(source)
            .await?
            .into_iter()
            .filter(|o| o.key.ends_with(".json"))
            .collect();

        if objects.is_empty() {
            return Err(Error::Load(format!("no .json objects found under {}", source)));
        }
        let object_count = objects.len();

        let storage = &self.storage;
        let mut documents = stream::iter(objects)
            .map(|location| async move {
                let body = storage.get_object(&location).await?;
                Ok::<_, Error>((location, body))
            })
            .buffered(self.concurrency);

        let mut batch = Vec::with_capacity(FLUSH_ROWS);
        let mut inserted = 0;

        while let Some(document) = documents.next().await {
            let (location, body) = document?;
            for value in parse_documents(&location, &body)? {
                batch.push(map_record(table, &paths, &value)?);
            }
            debug!(object = %location, buffered = batch.len(), "Read staging object");

            if batch.len() >= FLUSH_ROWS {
                inserted += warehouse.insert_records(table, &batch).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            inserted += warehouse.insert_records(table, &batch).await?;
        }

        info!(
            table = %table,
            source = %source,
            objects = object_count,
            rows = inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched staging data"
        );
        Ok(inserted)
    }

    async fn column_paths(&self, table: Table, mapping: &JsonMapping) -> Result<Vec<Vec<PathSegment>>> {
        let columns = table.columns();
        match mapping {
            JsonMapping::Auto => Ok(columns
                .iter()
                .map(|c| vec![PathSegment::Key(c.name.to_string())])
                .collect()),
            JsonMapping::JsonPaths(location) => {
                let document = self.storage.get_object(location).await?;
                let paths = parse_jsonpaths(&document)?;
                if paths.len() != columns.len() {
                    return Err(Error::Load(format!(
                        "JSONPaths document {} has {} paths but {} has {} columns",
                        location,
                        paths.len(),
                        table,
                        columns.len()
                    )));
                }
                Ok(paths)
            }
        }
    }
}

/// An object holds either one JSON document or newline-delimited documents.
fn parse_documents(location: &S3Location, body: &[u8]) -> Result<Vec<Value>> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Load(format!("malformed JSON in {}: {}", location, e)))
}

/// Maps one source document onto a record keyed by lower-cased column name.
pub fn map_record(table: Table, paths: &[Vec<PathSegment>], value: &Value) -> Result<Value> {
    if !value.is_object() {
        return Err(Error::Load(format!(
            "expected a JSON object for {}, got {}",
            table, value
        )));
    }

    let mut record = Map::new();
    for (column, path) in table.columns().iter().zip(paths) {
        let raw = resolve(value, path).unwrap_or(&Value::Null);
        let coerced = coerce_value(raw, column.ty)
            .map_err(|reason| Error::Load(format!("{}.{}: {}", table, column.name, reason)))?;
        record.insert(column.name.to_ascii_lowercase(), coerced);
    }
    Ok(Value::Object(record))
}

/// Converts a JSON value to the shape the column type accepts. Empty strings
/// in numeric columns become NULL; anything else that does not convert is an
/// error.
pub fn coerce_value(value: &Value, ty: ColumnType) -> std::result::Result<Value, String> {
    match (value, ty) {
        (Value::Null, _) => Ok(Value::Null),

        (Value::String(s), _) if ty.is_numeric() && s.trim().is_empty() => Ok(Value::Null),

        (_, ColumnType::Integer | ColumnType::BigInt | ColumnType::Identity) => {
            let int = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("cannot convert {} to an integer", value))?;

            if ty == ColumnType::Integer && i32::try_from(int).is_err() {
                return Err(format!("{} is out of range for INTEGER", int));
            }
            Ok(Value::Number(int.into()))
        }

        (_, ColumnType::Float) => {
            let float = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            float
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("cannot convert {} to a float", value))
        }

        (Value::String(_), _) => Ok(value.clone()),
        (other, _) => Ok(Value::String(match other {
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => other.to_string(),
        })),
    }
}

/// Whole floats inside the i64 range; `as` would saturate anything larger.
fn float_to_i64(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::testing::RecordingWarehouse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct MemoryStorage {
        objects: BTreeMap<String, Vec<u8>>,
    }

    impl MemoryStorage {
        fn new(objects: &[(&str, &str)]) -> Arc<dyn ObjectStorage> {
            Arc::new(Self {
                objects: objects
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn list_objects(&self, prefix: &S3Location) -> Result<Vec<S3Location>> {
            Ok(self
                .objects
                .keys()
                .filter(|k| k.starts_with(&prefix.key))
                .map(|k| prefix.with_key(k))
                .collect())
        }

        async fn get_object(&self, location: &S3Location) -> Result<Vec<u8>> {
            self.objects
                .get(&location.key)
                .cloned()
                .ok_or_else(|| Error::Storage(format!("Object {} not found", location)))
        }
    }

    fn event_paths_document() -> String {
        let paths: Vec<String> = Table::StagingEvents
            .columns()
            .iter()
            .map(|c| format!("$['{}']", c.name))
            .collect();
        json!({ "jsonpaths": paths }).to_string()
    }

    #[test]
    fn test_coerce_numeric_columns() {
        assert_eq!(coerce_value(&json!("39"), ColumnType::Integer), Ok(json!(39)));
        assert_eq!(coerce_value(&json!(""), ColumnType::Integer), Ok(Value::Null));
        assert_eq!(
            coerce_value(&json!(1541990258796i64), ColumnType::BigInt),
            Ok(json!(1541990258796i64))
        );
        assert_eq!(coerce_value(&json!(12.0), ColumnType::Integer), Ok(json!(12)));
        assert_eq!(coerce_value(&json!("218.93"), ColumnType::Float), Ok(json!(218.93)));
        assert!(coerce_value(&json!("abc"), ColumnType::Integer).is_err());
        assert!(coerce_value(&json!(3_000_000_000i64), ColumnType::Integer).is_err());
        assert!(coerce_value(&json!(true), ColumnType::Float).is_err());
    }

    #[test]
    fn test_coerce_bigint_rejects_floats_outside_i64() {
        assert!(coerce_value(&json!(1e19), ColumnType::BigInt).is_err());
        assert!(coerce_value(&json!(-1e300), ColumnType::BigInt).is_err());
        assert!(coerce_value(&json!(1541990258796.5), ColumnType::BigInt).is_err());
        assert_eq!(
            coerce_value(&json!(1.540919166796e12), ColumnType::BigInt),
            Ok(json!(1540919166796i64))
        );
    }

    #[test]
    fn test_coerce_text_columns() {
        assert_eq!(coerce_value(&json!("M"), ColumnType::Char(1)), Ok(json!("M")));
        assert_eq!(
            coerce_value(&json!(1540919166796.0), ColumnType::Varchar),
            Ok(json!("1540919166796.0"))
        );
        assert_eq!(coerce_value(&Value::Null, ColumnType::Varchar), Ok(Value::Null));
        assert_eq!(coerce_value(&json!(""), ColumnType::Varchar), Ok(json!("")));
    }

    #[test]
    fn test_map_record_lowercases_columns() {
        let paths: Vec<_> = Table::StagingSongs
            .columns()
            .iter()
            .map(|c| vec![PathSegment::Key(c.name.to_string())])
            .collect();
        let record = map_record(
            Table::StagingSongs,
            &paths,
            &json!({"song_id": "S1", "title": "Song A", "year": 0, "duration": 218.93}),
        )
        .unwrap();

        assert_eq!(record["song_id"], json!("S1"));
        assert_eq!(record["year"], json!(0));
        assert_eq!(record["artist_id"], Value::Null);
        assert_eq!(record.as_object().unwrap().len(), 10);
    }

    #[test]
    fn test_map_record_rejects_non_objects() {
        let err = map_record(Table::StagingSongs, &[], &json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }

    #[tokio::test]
    async fn test_load_events_with_jsonpaths() {
        let log = concat!(
            r#"{"artist":"Artist X","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":218.93,"level":"paid","location":"Chicago","method":"PUT","page":"NextSong","registration":1.540919166796E12,"sessionId":818,"song":"Song A","status":200,"ts":1541990258796,"userAgent":"Mozilla","userId":"15"}"#,
            "\n",
            r#"{"artist":null,"auth":"Logged Out","firstName":null,"gender":null,"itemInSession":1,"lastName":null,"length":null,"level":"free","location":null,"method":"GET","page":"Home","registration":null,"sessionId":818,"song":null,"status":200,"ts":1541990264796,"userAgent":null,"userId":""}"#,
            "\n"
        );
        let paths = event_paths_document();
        let storage = MemoryStorage::new(&[
            ("log_json_path.json", paths.as_str()),
            ("log_data/2018/11/2018-11-12-events.json", log),
        ]);
        let fetcher = JsonFetcher::new(storage, 2);
        let mut warehouse = RecordingWarehouse::default();

        let rows = fetcher
            .load(
                &mut warehouse,
                Table::StagingEvents,
                &S3Location::parse("s3://bucket/log_data").unwrap(),
                &JsonMapping::JsonPaths(S3Location::parse("s3://bucket/log_json_path.json").unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(rows, 2);
        let records = &warehouse.records[&Table::StagingEvents];
        assert_eq!(records[0]["userid"], json!(15));
        assert_eq!(records[0]["firstname"], json!("Lily"));
        assert_eq!(records[0]["ts"], json!(1541990258796i64));
        assert_eq!(records[1]["userid"], Value::Null);
    }

    #[tokio::test]
    async fn test_load_songs_auto_mapping_across_objects() {
        let storage = MemoryStorage::new(&[
            (
                "song_data/A/TRA.json",
                r#"{"num_songs": 1, "artist_id": "A1", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Artist X", "song_id": "S1", "title": "Song A", "duration": 152.92036, "year": 0}"#,
            ),
            (
                "song_data/B/TRB.json",
                r#"{"num_songs": 1, "artist_id": "A2", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "Artist Y", "song_id": "S2", "title": "Song B", "duration": 209.60608, "year": 1997}"#,
            ),
        ]);
        let fetcher = JsonFetcher::new(storage, 4);
        let mut warehouse = RecordingWarehouse::default();

        let rows = fetcher
            .load(
                &mut warehouse,
                Table::StagingSongs,
                &S3Location::parse("s3://bucket/song_data").unwrap(),
                &JsonMapping::Auto,
            )
            .await
            .unwrap();

        assert_eq!(rows, 2);
        let records = &warehouse.records[&Table::StagingSongs];
        assert_eq!(records[0]["song_id"], json!("S1"));
        assert_eq!(records[1]["artist_latitude"], json!("35.14968"));
    }

    #[tokio::test]
    async fn test_load_skips_objects_that_are_not_json() {
        let storage = MemoryStorage::new(&[
            (
                "song_data/A/TRA.json",
                r#"{"artist_id": "A1", "artist_name": "Artist X", "song_id": "S1", "title": "Song A"}"#,
            ),
            ("song_data/_manifest.txt", "not json at all"),
            ("song_data/_SUCCESS", ""),
            ("song_data/B/", ""),
        ]);
        let fetcher = JsonFetcher::new(storage, 2);
        let mut warehouse = RecordingWarehouse::default();

        let rows = fetcher
            .load(
                &mut warehouse,
                Table::StagingSongs,
                &S3Location::parse("s3://bucket/song_data").unwrap(),
                &JsonMapping::Auto,
            )
            .await
            .unwrap();

        assert_eq!(rows, 1);
        assert_eq!(warehouse.records[&Table::StagingSongs][0]["song_id"], json!("S1"));
    }

    #[tokio::test]
    async fn test_jsonpaths_column_count_mismatch() {
        let storage = MemoryStorage::new(&[
            ("paths.json", r#"{"jsonpaths": ["$['artist']"]}"#),
            ("log_data/a.json", "{}"),
        ]);
        let fetcher = JsonFetcher::new(storage, 1);
        let mut warehouse = RecordingWarehouse::default();

        let err = fetcher
            .load(
                &mut warehouse,
                Table::StagingEvents,
                &S3Location::parse("s3://bucket/log_data").unwrap(),
                &JsonMapping::JsonPaths(S3Location::parse("s3://bucket/paths.json").unwrap()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("has 1 paths"));
    }

    #[tokio::test]
    async fn test_empty_prefix_and_malformed_json_fail() {
        let storage = MemoryStorage::new(&[("song_data/bad.json", "{not json")]);
        let fetcher = JsonFetcher::new(storage, 1);
        let mut warehouse = RecordingWarehouse::default();

        let missing = fetcher
            .load(
                &mut warehouse,
                Table::StagingSongs,
                &S3Location::parse("s3://bucket/nothing_here").unwrap(),
                &JsonMapping::Auto,
            )
            .await;
        assert!(matches!(missing, Err(Error::Load(_))));

        let malformed = fetcher
            .load(
                &mut warehouse,
                Table::StagingSongs,
                &S3Location::parse("s3://bucket/song_data").unwrap(),
                &JsonMapping::Auto,
            )
            .await;
        assert!(matches!(malformed, Err(Error::Load(msg)) if msg.contains("malformed JSON")));
        assert!(warehouse.records.is_empty());
    }
}
