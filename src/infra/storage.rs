use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;
use url::Url;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_endpoint: Option<String>,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone());
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    /// Presigned PUT for a direct client upload.
    pub async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        content_length: i64,
        expires_in_seconds: u64,
    ) -> Result<String> {
        let presign_config =
            PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .presigned(presign_config)
            .await?;

        let mut url = presigned.uri().to_string();
        if let Some(public_endpoint) = &self.public_endpoint {
            match rewrite_presigned_url(&url, public_endpoint) {
                Ok(rewritten) => url = rewritten,
                Err(err) => tracing::warn!(error = ?err, "failed to rewrite presigned upload URL"),
            }
        }
        Ok(url)
    }

    /// Presigned GET for a private object (resumes). The caller caps the
    /// expiry; resume links never exceed one hour.
    pub async fn presign_download(&self, key: &str, expires_in_seconds: u64) -> Result<String> {
        let presign_config =
            PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await?;

        let mut url = presigned.uri().to_string();
        if let Some(public_endpoint) = &self.public_endpoint {
            match rewrite_presigned_url(&url, public_endpoint) {
                Ok(rewritten) => url = rewritten,
                Err(err) => tracing::warn!(error = ?err, "failed to rewrite presigned download URL"),
            }
        }
        Ok(url)
    }
}

// S3 endpoints inside a private network differ from the one browsers can
// reach; swap scheme/host/port while keeping the signed query string intact.
fn rewrite_presigned_url(original: &str, public_endpoint: &str) -> Result<String> {
    let mut original_url = Url::parse(original)?;
    let public_url = if public_endpoint.contains("://") {
        Url::parse(public_endpoint)?
    } else {
        Url::parse(&format!("http://{}", public_endpoint))?
    };

    original_url
        .set_scheme(public_url.scheme())
        .map_err(|_| anyhow!("invalid scheme for public endpoint"))?;
    original_url
        .set_host(public_url.host_str())
        .map_err(|_| anyhow!("invalid host for public endpoint"))?;
    original_url.set_port(public_url.port()).ok();

    Ok(original_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::rewrite_presigned_url;

    #[test]
    fn rewrite_swaps_host_and_keeps_query() {
        let original = "http://minio:9000/bucket/key.pdf?X-Amz-Signature=abc";
        let rewritten = rewrite_presigned_url(original, "https://files.example.com").unwrap();
        assert_eq!(
            rewritten,
            "https://files.example.com/bucket/key.pdf?X-Amz-Signature=abc"
        );
    }

    #[test]
    fn rewrite_accepts_bare_host() {
        let original = "http://minio:9000/bucket/key.pdf?X-Amz-Signature=abc";
        let rewritten = rewrite_presigned_url(original, "localhost:4566").unwrap();
        assert!(rewritten.starts_with("http://localhost:4566/"));
    }
}
