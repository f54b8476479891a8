//! Object storage access.
//!
//! The service keeps its whole state in a single object inside one bucket.
//! [`BlobStore`] is the seam between the repository and the backend so the
//! handlers can run against [`S3BlobStore`] in production and
//! [`MemoryBlobStore`] in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::ConnectionString;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object storage request failed: {0}")]
    Backend(String),
}

/// A bucket of named byte payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the backing container. Succeeds if it already exists.
    async fn create_container(&self) -> Result<(), StoreError>;

    /// Fetch an object.
    ///
    /// Returns `Ok(None)` only when the store confirms the object is absent.
    async fn get_object(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace an object unconditionally.
    async fn put_object(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// [`BlobStore`] backed by an S3-compatible bucket.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    region: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String, region: String) -> Self {
        Self {
            client,
            bucket,
            region,
        }
    }

    pub async fn connect(conn: &ConnectionString, bucket: String) -> Self {
        let client = create_client(conn).await;
        Self::new(client, bucket, conn.region.clone())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn create_container(&self) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                debug!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(err) => {
                let exists = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if exists {
                    Ok(())
                } else {
                    Err(StoreError::Backend(format!("create bucket: {err}")))
                }
            }
        }
    }

    async fn get_object(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    return Ok(None);
                }
                return Err(StoreError::Backend(format!("get object: {err}")));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("read object body: {e}")))?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put_object(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("put object: {e}")))?;

        Ok(())
    }
}

/// Build an S3 client from the parsed connection string.
///
/// A custom endpoint switches to path-style addressing, which MinIO and most
/// self-hosted S3 implementations require.
pub async fn create_client(conn: &ConnectionString) -> Client {
    let credentials = Credentials::new(
        conn.access_key_id.clone(),
        conn.secret_access_key.clone(),
        None,
        None,
        "connection-string",
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(conn.region.clone()))
        .credentials_provider(credentials);

    if let Some(endpoint) = &conn.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let config = loader.load().await;

    let builder = aws_sdk_s3::config::Builder::from(&config);
    let s3_config = if conn.endpoint.is_some() {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };

    Client::from_conf(s3_config)
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-process [`BlobStore`]. Data is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are replaced whole, so a panic while the lock is held cannot
    // leave a half-written object behind.
    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw bytes of an object, bypassing the trait.
    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.objects().get(name).map(|o| o.data.clone())
    }

    /// Declared content type of an object.
    pub fn content_type(&self, name: &str) -> Option<String> {
        self.objects().get(name).map(|o| o.content_type.clone())
    }

    /// Seed an object directly, e.g. with a payload the service did not write.
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.objects().insert(
            name.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_container(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_object(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.object(name))
    }

    async fn put_object(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.objects().insert(
            name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_reports_absent_objects() {
        let store = MemoryBlobStore::new();
        assert!(store.get_object("todos.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_put_overwrites() {
        let store = MemoryBlobStore::new();
        store
            .put_object("todos.json", b"[1]".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put_object("todos.json", b"[2]".to_vec(), "application/json")
            .await
            .unwrap();

        let data = store.get_object("todos.json").await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"[2]"[..]));
        assert_eq!(
            store.content_type("todos.json").as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn memory_store_survives_poisoned_lock() {
        let store = MemoryBlobStore::new();
        store.insert("todos.json", "[]");

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.objects.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(store.objects.is_poisoned());

        store.insert("other.json", "[1]");
        assert_eq!(store.object("other.json"), Some(b"[1]".to_vec()));
        assert_eq!(
            store.get_object("todos.json").await.unwrap(),
            Some(b"[]".to_vec())
        );
        store
            .put_object("todos.json", b"[2]".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(store.object("todos.json"), Some(b"[2]".to_vec()));
    }

    #[tokio::test]
    async fn memory_store_clones_share_objects() {
        let store = MemoryBlobStore::new();
        let other = store.clone();
        store.insert("todos.json", "[]");
        assert_eq!(other.object("todos.json"), Some(b"[]".to_vec()));
    }
}
