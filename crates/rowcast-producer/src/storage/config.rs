use serde::{Deserialize, Serialize};

use rowcast_common::{env, EnvError};

/// Connection settings for the source bucket
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    /// Read `AWS_*` credentials, `S3_BUCKET_NAME` and the optional endpoint.
    ///
    /// Path-style addressing defaults to on whenever an endpoint override is
    /// present, since MinIO and LocalStack rarely serve virtual-host buckets.
    pub fn from_env() -> Result<Self, EnvError> {
        let endpoint = env::var("AWS_ENDPOINT_URL");
        let path_style = env::flag_or("S3_PATH_STYLE", endpoint.is_some())?;

        Ok(Self {
            region: env::required("AWS_DEFAULT_REGION")?,
            access_key: env::required("AWS_ACCESS_KEY_ID")?,
            secret_key: env::required("AWS_SECRET_ACCESS_KEY")?,
            bucket: env::required("S3_BUCKET_NAME")?,
            endpoint,
            path_style,
        })
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000", "test-bucket");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert_eq!(config.bucket, "test-bucket");
        assert!(config.path_style);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = StorageConfig::for_minio("http://localhost:9000", "b");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret_key: \"minioadmin\""));
    }
}
