//! Object store client
//!
//! Thin wrapper over the S3 API: key listing, content fetch, size probe.
//! No retry or consistency logic lives here; callers own failure policy.

use anyhow::{Context, Result};
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use tracing::{debug, info};

pub mod config;

/// Suffix identifying ingestable log batches in the object store.
pub const COMPRESSED_JSON_SUFFIX: &str = ".json.gz";

#[derive(Clone)]
pub struct Storage {
    client: Client,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!("Initializing storage client with region: {}", config.region);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "ldp-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized");

        Ok(Self { client })
    }

    /// List keys under a prefix, filtered to compressed JSON batches
    pub async fn list_keys(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        debug!(
            "Listing objects in s3://{}/{}",
            bucket,
            prefix.unwrap_or("")
        );

        let mut request = self.client.list_objects_v2().bucket(bucket);

        if let Some(p) = prefix {
            request = request.prefix(p);
        }

        let response = request
            .send()
            .await
            .context("Failed to list S3 objects")?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(|k| k.to_string()))
            .filter(|key| key.ends_with(COMPRESSED_JSON_SUFFIX))
            .collect();

        Ok(keys)
    }

    /// Fetch an object's bytes
    pub async fn get_content(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to download from S3: {}", key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);

        Ok(data)
    }

    /// Report an object's size in bytes
    pub async fn get_size(&self, bucket: &str, key: &str) -> Result<i64> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to get object size from S3: {}", key))?;

        Ok(response.content_length().unwrap_or(0))
    }
}
