//! S3 destination.
//!
//! Works with AWS S3 and S3-compatible services (MinIO, Wasabi, DigitalOcean
//! Spaces). Credentials come from the default AWS provider chain.

use super::{validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a store for `bucket` with the given region and optional endpoint
    pub async fn new(bucket: &str, region: &str, endpoint: Option<&str>, prefix: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint_url) = endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true); // Required for MinIO and many S3-compatible services
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Full object key for `name` under `prefix`
fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, name: &str, data: Bytes) -> Result<(), StoreError> {
        validate_key(name)?;
        let key = object_key(&self.prefix, name);
        let len = data.len();
        debug!("Uploading {} bytes to s3://{}/{}", len, self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_length(len as i64)
            .content_type("application/x-tar")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StoreError::Request(format!(
                    "put s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    fn describe(&self) -> String {
        match self.prefix.trim_matches('/') {
            "" => format!("s3://{}", self.bucket),
            prefix => format!("s3://{}/{}", self.bucket, prefix),
        }
    }
}
