use super::S3Location;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use common::Result;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Every object key under the location's prefix, across all pages.
    async fn list_objects(&self, prefix: &S3Location) -> Result<Vec<S3Location>>;
    async fn get_object(&self, location: &S3Location) -> Result<Vec<u8>>;
}

pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_objects(&self, prefix: &S3Location) -> Result<Vec<S3Location>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&prefix.bucket)
                .prefix(&prefix.key);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| match e {
                SdkError::ServiceError(err) => common::Error::Storage(format!(
                    "Cannot list {}: {}",
                    prefix,
                    err.into_err()
                )),
                other => other.into(),
            })?;

            if let Some(contents) = response.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(prefix.with_key(&key));
                    }
                }
            }

            continuation_token = response.next_continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(objects)
    }

    async fn get_object(&self, location: &S3Location) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) if err.err().is_no_such_key() => {
                    common::Error::Storage(format!("Object {} not found", location))
                }
                SdkError::ServiceError(err) => common::Error::Storage(err.into_err().to_string()),
                other => other.into(),
            })?;

        let data = response.body.collect().await?.into_bytes().to_vec();

        Ok(data)
    }
}
