//! Object store construction for the lake.
//!
//! The ingestor writes through an `Arc<dyn ObjectStore>` scoped to the lake
//! bucket. Which implementation backs it is decided once at startup from the
//! configured endpoint:
//!
//! - `http://` / `https://`: an S3-compatible store (MinIO, AWS S3, ...).
//! - `file:///some/dir`: a local directory, with one subdirectory per bucket.
//! - `memory://`: a process-local in-memory store, for development.

pub mod local;
pub mod paths;

use std::{sync::Arc, time::Duration};

use lake_observability::ErrorKind;
use object_store::{
    ClientOptions, ObjectStore,
    aws::{AmazonS3Builder, S3ConditionalPut},
    memory::InMemory,
};
use snafu::{ResultExt, Snafu};

pub use local::{LocalFileSystemStore, TemporaryFileSystemStore};
pub use paths::LakePath;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unsupported object store endpoint {endpoint}"))]
    UnsupportedEndpoint { endpoint: String },

    #[snafu(display("Missing object store credential {name}"))]
    MissingCredential { name: &'static str },

    #[snafu(display("Failed to create {store_type} object store"))]
    Creation {
        store_type: &'static str,
        source: object_store::Error,
    },

    #[snafu(display("Failed to prepare local directory {path}"))]
    LocalDirectory {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Credentials for an S3-compatible endpoint.
#[derive(Clone)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// The backend selected from the configured endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    S3Compatible { endpoint: String, allow_http: bool },
    LocalFileSystem { root: String },
    Memory,
}

/// Everything needed to build the lake object store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backend: StoreBackend,
    pub bucket: String,
    pub region: String,
    pub credentials: Option<StoreCredentials>,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
}

impl StoreBackend {
    /// Parses an endpoint such as `http://localhost:9000` or `file:///var/lake`.
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        if let Some(root) = endpoint.strip_prefix("file://") {
            if root.is_empty() {
                return UnsupportedEndpointSnafu { endpoint }.fail();
            }
            return Ok(StoreBackend::LocalFileSystem {
                root: root.to_string(),
            });
        }

        if endpoint == "memory://" {
            return Ok(StoreBackend::Memory);
        }

        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(StoreBackend::S3Compatible {
                endpoint: endpoint.to_string(),
                allow_http: endpoint.starts_with("http://"),
            });
        }

        UnsupportedEndpointSnafu { endpoint }.fail()
    }

    pub fn requires_credentials(&self) -> bool {
        matches!(self, StoreBackend::S3Compatible { .. })
    }
}

impl StoreOptions {
    /// Creates the object store client scoped to the configured bucket.
    pub fn create_object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        match &self.backend {
            StoreBackend::S3Compatible {
                endpoint,
                allow_http,
            } => self.create_s3_compatible_store(endpoint, *allow_http),
            StoreBackend::LocalFileSystem { root } => {
                let store = LocalFileSystemStore::new(root, &self.bucket)?;
                Ok(store.into_object_store())
            }
            StoreBackend::Memory => Ok(Arc::new(InMemory::new())),
        }
    }

    fn create_s3_compatible_store(
        &self,
        endpoint: &str,
        allow_http: bool,
    ) -> Result<Arc<dyn ObjectStore>> {
        let Some(credentials) = &self.credentials else {
            return MissingCredentialSnafu {
                name: "STORE_ACCESS_KEY",
            }
            .fail();
        };

        let client_options = ClientOptions::new()
            .with_timeout(self.request_timeout)
            .with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .with_allow_http(allow_http);

        // Create-only puts rely on `If-None-Match: *`.
        let store = AmazonS3Builder::new()
            .with_bucket_name(&self.bucket)
            .with_region(&self.region)
            .with_endpoint(endpoint)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key)
            .with_conditional_put(S3ConditionalPut::ETagMatch)
            .with_client_options(client_options)
            .build()
            .context(CreationSnafu {
                store_type: "S3-compatible",
            })?;

        Ok(Arc::new(store))
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedEndpoint { .. } | Self::MissingCredential { .. } => {
                ErrorKind::Configuration
            }
            Self::Creation { .. } => ErrorKind::Internal,
            Self::LocalDirectory { .. } => ErrorKind::Temporary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(backend: StoreBackend, credentials: Option<StoreCredentials>) -> StoreOptions {
        StoreOptions {
            backend,
            bucket: "lake".to_string(),
            region: "us-east-1".to_string(),
            credentials,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_backend_from_endpoint() {
        assert_eq!(
            StoreBackend::from_endpoint("http://localhost:9000").unwrap(),
            StoreBackend::S3Compatible {
                endpoint: "http://localhost:9000".to_string(),
                allow_http: true,
            }
        );
        assert_eq!(
            StoreBackend::from_endpoint("https://s3.eu-central-1.amazonaws.com").unwrap(),
            StoreBackend::S3Compatible {
                endpoint: "https://s3.eu-central-1.amazonaws.com".to_string(),
                allow_http: false,
            }
        );
        assert_eq!(
            StoreBackend::from_endpoint("file:///var/lake").unwrap(),
            StoreBackend::LocalFileSystem {
                root: "/var/lake".to_string()
            }
        );
        assert_eq!(
            StoreBackend::from_endpoint("memory://").unwrap(),
            StoreBackend::Memory
        );
    }

    #[test]
    fn test_backend_from_invalid_endpoint() {
        assert!(StoreBackend::from_endpoint("ftp://host").is_err());
        assert!(StoreBackend::from_endpoint("file://").is_err());
        assert!(StoreBackend::from_endpoint("localhost:9000").is_err());
    }

    #[test]
    fn test_s3_requires_credentials() {
        let backend = StoreBackend::from_endpoint("http://localhost:9000").unwrap();
        assert!(backend.requires_credentials());

        let err = options(backend, None).create_object_store().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_s3_store_builds_with_credentials() {
        let backend = StoreBackend::from_endpoint("http://localhost:9000").unwrap();
        let credentials = StoreCredentials {
            access_key_id: "minio".to_string(),
            secret_access_key: "minio123".to_string(),
        };
        assert!(
            options(backend, Some(credentials))
                .create_object_store()
                .is_ok()
        );
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = StoreCredentials {
            access_key_id: "minio".to_string(),
            secret_access_key: "minio123".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("minio"));
        assert!(!debug.contains("minio123"));
    }
}
