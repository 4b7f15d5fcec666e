pub mod s3;

pub use s3::{ObjectStorage, S3Storage};

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{Credentials, Region};
use common::config::Settings;
use common::{Error, Result};
use std::fmt;
use url::Url;

/// A bucket plus key or key prefix, parsed from an `s3://bucket/key` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        if url.scheme() != "s3" {
            return Err(Error::InvalidUri(format!(
                "expected an s3:// location, got '{}'",
                uri
            )));
        }
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::InvalidUri(format!("missing bucket in '{}'", uri)))?;

        Ok(Self {
            bucket: bucket.to_string(),
            key: url.path().trim_start_matches('/').to_string(),
        })
    }

    /// Same bucket, different key.
    pub fn with_key(&self, key: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Builds the S3 client used by the staging fetch.
///
/// With an explicit endpoint and keys (MinIO, localstack) static credentials
/// and path-style addressing are used; otherwise the default AWS provider
/// chain resolves credentials.
pub async fn build_client(settings: &Settings) -> Result<S3Client> {
    let region = Region::new(settings.s3.region.clone());
    let storage = &settings.storage;

    if let (Some(access_key), Some(secret_key)) = (&storage.access_key, &storage.secret_key) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials);

        if let Some(endpoint) = &storage.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        return Ok(S3Client::from_conf(builder.build()));
    }

    if storage.access_key.is_some() != storage.secret_key.is_some() {
        return Err(Error::InvalidSetting(
            "STORAGE.ACCESS_KEY and STORAGE.SECRET_KEY must be set together".to_string(),
        ));
    }

    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = &storage.endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Ok(S3Client::from_conf(builder.build()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix() {
        let location = S3Location::parse("s3://udacity-dend/log_data").unwrap();
        assert_eq!(location.bucket, "udacity-dend");
        assert_eq!(location.key, "log_data");
        assert_eq!(location.to_string(), "s3://udacity-dend/log_data");
    }

    #[test]
    fn test_parse_bucket_root() {
        let location = S3Location::parse("s3://songs").unwrap();
        assert_eq!(location.bucket, "songs");
        assert_eq!(location.key, "");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            S3Location::parse("https://example.com/key"),
            Err(Error::InvalidUri(_))
        ));
        assert!(S3Location::parse("log_data").is_err());
    }

    #[test]
    fn test_with_key() {
        let location = S3Location::parse("s3://bucket/prefix").unwrap();
        assert_eq!(
            location.with_key("prefix/a.json").to_string(),
            "s3://bucket/prefix/a.json"
        );
    }
}
