use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use blobver_digest::ContentDigest;
use blobver_types::ETag;
use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;
use crate::types::{
    read_all, reader_from, BlobItem, BlobProperties, BlobRead, BlobReader, CopyHandle,
    CopyStatus, ListPage, WriteCondition, WriteOptions,
};

/// Default number of items per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// How long server-side copies stay pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CopyLatency {
    /// Copies complete before `start_copy` returns.
    #[default]
    Immediate,
    /// Copies report `Pending` for this many polls, then commit.
    Polls(u32),
    /// Copies never leave `Pending`.
    Stalled,
}

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Bytes,
    properties: BlobProperties,
}

#[derive(Debug)]
struct CopyJob {
    container: String,
    destination: String,
    destination_condition: WriteCondition,
    source: StoredBlob,
    remaining: Option<u32>,
    finished: Option<CopyStatus>,
}

type Container = BTreeMap<String, StoredBlob>;

/// In-memory, map-based blob store.
///
/// Intended for tests and embedding. All containers live behind a `RwLock`;
/// every conditional operation checks and commits under the write lock, so
/// concurrent callers observe the same conflicts a real object store reports.
pub struct InMemoryBlobStore {
    containers: RwLock<HashMap<String, Container>>,
    copies: Mutex<HashMap<String, CopyJob>>,
    etag_seq: AtomicU64,
    copy_seq: AtomicU64,
    page_size: usize,
    copy_latency: CopyLatency,
}

impl InMemoryBlobStore {
    /// Create an empty store with default page size and immediate copies.
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            copies: Mutex::new(HashMap::new()),
            etag_seq: AtomicU64::new(1),
            copy_seq: AtomicU64::new(1),
            page_size: DEFAULT_PAGE_SIZE,
            copy_latency: CopyLatency::Immediate,
        }
    }

    /// Limit listing pages to `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Control how long server-side copies stay pending.
    pub fn with_copy_latency(mut self, latency: CopyLatency) -> Self {
        self.copy_latency = latency;
        self
    }

    /// Sorted paths of every object in `container`.
    pub fn paths(&self, container: &str) -> StoreResult<Vec<String>> {
        let containers = self.containers.read().map_err(poisoned)?;
        Ok(containers
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Content of an object, if present.
    pub fn content(&self, container: &str, path: &str) -> StoreResult<Option<Bytes>> {
        let containers = self.containers.read().map_err(poisoned)?;
        Ok(containers
            .get(container)
            .and_then(|blobs| blobs.get(path))
            .map(|blob| blob.data.clone()))
    }

    fn next_etag(&self) -> ETag {
        let n = self.etag_seq.fetch_add(1, Ordering::Relaxed);
        ETag::new(format!("\"0x8D{n:014X}\""))
    }

    fn guard(
        container: &str,
        path: &str,
        condition: &WriteCondition,
        current: Option<&ETag>,
    ) -> StoreResult<()> {
        condition
            .check(current)
            .map_err(|kind| StoreError::Conflict {
                container: container.to_string(),
                path: path.to_string(),
                condition: condition.clone(),
                kind,
            })
    }

    /// Apply a copy job to its destination, re-checking the destination condition.
    ///
    /// A destination changed since the copy started is a `Conflict`.
    fn commit_copy(&self, job: &CopyJob) -> StoreResult<CopyStatus> {
        let mut containers = self.containers.write().map_err(poisoned)?;
        let Some(blobs) = containers.get_mut(&job.container) else {
            return Ok(CopyStatus::Failed {
                reason: format!("container {} was deleted", job.container),
            });
        };
        let current = blobs.get(&job.destination).map(|b| &b.properties.etag);
        Self::guard(
            &job.container,
            &job.destination,
            &job.destination_condition,
            current,
        )?;
        let etag = self.next_etag();
        let mut properties = job.source.properties.clone();
        properties.etag = etag.clone();
        properties.last_modified = Utc::now();
        blobs.insert(
            job.destination.clone(),
            StoredBlob {
                data: job.source.data.clone(),
                properties,
            },
        );
        Ok(CopyStatus::Done { etag })
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("page_size", &self.page_size)
            .field("copy_latency", &self.copy_latency)
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Internal("lock poisoned".into())
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<bool> {
        let mut containers = self.containers.write().map_err(poisoned)?;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_string(), BTreeMap::new());
        debug!(container, "created container");
        Ok(true)
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        let containers = self.containers.read().map_err(poisoned)?;
        Ok(containers.contains_key(container))
    }

    async fn read(&self, container: &str, path: &str) -> StoreResult<Option<BlobRead>> {
        let containers = self.containers.read().map_err(poisoned)?;
        Ok(containers
            .get(container)
            .and_then(|blobs| blobs.get(path))
            .map(|blob| BlobRead {
                properties: blob.properties.clone(),
                body: reader_from(blob.data.clone()),
            }))
    }

    async fn properties(
        &self,
        container: &str,
        path: &str,
    ) -> StoreResult<Option<BlobProperties>> {
        let containers = self.containers.read().map_err(poisoned)?;
        Ok(containers
            .get(container)
            .and_then(|blobs| blobs.get(path))
            .map(|blob| blob.properties.clone()))
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        mut body: BlobReader,
        options: WriteOptions,
    ) -> StoreResult<ETag> {
        let data = read_all(&mut body).await?;
        drop(body);

        let mut containers = self.containers.write().map_err(poisoned)?;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        let current = blobs.get(path).map(|b| &b.properties.etag);
        Self::guard(container, path, &options.condition, current)?;

        let etag = self.next_etag();
        let properties = BlobProperties {
            etag: etag.clone(),
            content_type: options.content_type,
            content_md5: Some(ContentDigest::of(&data)),
            size: data.len() as u64,
            metadata: options.metadata,
            last_modified: Utc::now(),
        };
        blobs.insert(path.to_string(), StoredBlob { data, properties });
        debug!(container, path, %etag, "wrote blob");
        Ok(etag)
    }

    async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: BTreeMap<String, String>,
        condition: WriteCondition,
    ) -> StoreResult<ETag> {
        let mut containers = self.containers.write().map_err(poisoned)?;
        let blob = containers
            .get_mut(container)
            .and_then(|blobs| blobs.get_mut(path))
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                path: path.to_string(),
            })?;
        Self::guard(container, path, &condition, Some(&blob.properties.etag))?;

        let etag = self.next_etag();
        blob.properties.metadata = metadata;
        blob.properties.etag = etag.clone();
        blob.properties.last_modified = Utc::now();
        Ok(etag)
    }

    async fn start_copy(
        &self,
        container: &str,
        source: &str,
        source_if_match: Option<&ETag>,
        destination: &str,
        destination_condition: WriteCondition,
    ) -> StoreResult<CopyHandle> {
        let source_blob = {
            let containers = self.containers.read().map_err(poisoned)?;
            let blobs = containers
                .get(container)
                .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
            let source_blob = blobs.get(source).cloned().ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                path: source.to_string(),
            })?;
            if let Some(expected) = source_if_match {
                let condition = WriteCondition::IfMatch(expected.clone());
                Self::guard(container, source, &condition, Some(&source_blob.properties.etag))?;
            }
            let current = blobs.get(destination).map(|b| &b.properties.etag);
            Self::guard(container, destination, &destination_condition, current)?;
            source_blob
        };

        let id = format!("copy-{}", self.copy_seq.fetch_add(1, Ordering::Relaxed));
        let mut job = CopyJob {
            container: container.to_string(),
            destination: destination.to_string(),
            destination_condition,
            source: source_blob,
            remaining: match self.copy_latency {
                CopyLatency::Immediate => Some(0),
                CopyLatency::Polls(n) => Some(n),
                CopyLatency::Stalled => None,
            },
            finished: None,
        };
        if self.copy_latency == CopyLatency::Immediate {
            job.finished = Some(self.commit_copy(&job)?);
        }
        debug!(container, source, destination, copy = %id, "started copy");

        self.copies.lock().map_err(poisoned)?.insert(id.clone(), job);
        Ok(CopyHandle {
            id,
            container: container.to_string(),
            destination: destination.to_string(),
        })
    }

    async fn poll_copy(&self, handle: &CopyHandle) -> StoreResult<CopyStatus> {
        let mut copies = self.copies.lock().map_err(poisoned)?;
        let job = copies
            .get_mut(&handle.id)
            .ok_or_else(|| StoreError::UnknownCopy(handle.id.clone()))?;
        let settled = match job.finished.take() {
            Some(status) => Ok(status),
            None => match job.remaining {
                None => return Ok(CopyStatus::Pending),
                Some(n) if n > 0 => {
                    job.remaining = Some(n - 1);
                    return Ok(CopyStatus::Pending);
                }
                Some(_) => self.commit_copy(job),
            },
        };
        // Settled jobs are reported once and then forgotten.
        copies.remove(&handle.id);
        settled
    }

    async fn list(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        let containers = self.containers.read().map_err(poisoned)?;
        let blobs = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;

        let mut matching = blobs
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .filter(|(path, _)| continuation.map_or(true, |after| path.as_str() > after));

        let items: Vec<BlobItem> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(path, blob)| BlobItem {
                path: path.clone(),
                etag: blob.properties.etag.clone(),
                size: blob.properties.size,
            })
            .collect();
        let continuation = match (matching.next(), items.last()) {
            (Some(_), Some(last)) => Some(last.path.clone()),
            _ => None,
        };
        Ok(ListPage {
            items,
            continuation,
        })
    }

    async fn delete(&self, container: &str, path: &str) -> StoreResult<bool> {
        let mut containers = self.containers.write().map_err(poisoned)?;
        Ok(containers
            .get_mut(container)
            .map(|blobs| blobs.remove(path).is_some())
            .unwrap_or(false))
    }

    fn uri(&self, container: &str, path: &str) -> String {
        format!("memory://{container}/{path}")
    }
}
