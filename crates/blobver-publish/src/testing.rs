//! A store that lets a test play a concurrent writer at a chosen point.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blobver_store::{
    reader_from, BlobProperties, BlobRead, BlobReader, BlobStore, CopyHandle, CopyStatus,
    InMemoryBlobStore, ListPage, StoreResult, WriteCondition, WriteOptions,
};
use blobver_types::ETag;

/// The store call after which the interference runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// After a read has returned its snapshot.
    Read,
    /// Before a copy is started.
    StartCopy,
    /// Before a copy is polled.
    PollCopy,
}

/// What the other writer does.
#[derive(Clone, Debug)]
pub(crate) enum Interference {
    Overwrite { path: String, content: &'static str },
    Delete { path: String },
}

/// Delegates to an [`InMemoryBlobStore`], running one [`Interference`] the
/// first time `step` is reached.
pub(crate) struct RacingStore {
    inner: Arc<InMemoryBlobStore>,
    step: Step,
    pending: Mutex<Option<(String, Interference)>>,
}

impl RacingStore {
    pub(crate) fn new(
        inner: Arc<InMemoryBlobStore>,
        step: Step,
        container: &str,
        interference: Interference,
    ) -> Self {
        Self {
            inner,
            step,
            pending: Mutex::new(Some((container.to_string(), interference))),
        }
    }

    /// Returns `true` once the interference has run.
    pub(crate) fn fired(&self) -> bool {
        self.pending.lock().unwrap().is_none()
    }

    async fn reach(&self, step: Step) {
        if step != self.step {
            return;
        }
        let pending = self.pending.lock().unwrap().take();
        match pending {
            None => {}
            Some((container, Interference::Overwrite { path, content })) => {
                self.inner
                    .write(&container, &path, reader_from(content), WriteOptions::default())
                    .await
                    .unwrap();
            }
            Some((container, Interference::Delete { path })) => {
                assert!(self.inner.delete(&container, &path).await.unwrap());
            }
        }
    }
}

#[async_trait]
impl BlobStore for RacingStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<bool> {
        self.inner.ensure_container(container).await
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.inner.container_exists(container).await
    }

    async fn read(&self, container: &str, path: &str) -> StoreResult<Option<BlobRead>> {
        let read = self.inner.read(container, path).await?;
        self.reach(Step::Read).await;
        Ok(read)
    }

    async fn properties(
        &self,
        container: &str,
        path: &str,
    ) -> StoreResult<Option<BlobProperties>> {
        self.inner.properties(container, path).await
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        body: BlobReader,
        options: WriteOptions,
    ) -> StoreResult<ETag> {
        self.inner.write(container, path, body, options).await
    }

    async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: BTreeMap<String, String>,
        condition: WriteCondition,
    ) -> StoreResult<ETag> {
        self.inner
            .set_metadata(container, path, metadata, condition)
            .await
    }

    async fn start_copy(
        &self,
        container: &str,
        source: &str,
        source_if_match: Option<&ETag>,
        destination: &str,
        destination_condition: WriteCondition,
    ) -> StoreResult<CopyHandle> {
        self.reach(Step::StartCopy).await;
        self.inner
            .start_copy(
                container,
                source,
                source_if_match,
                destination,
                destination_condition,
            )
            .await
    }

    async fn poll_copy(&self, handle: &CopyHandle) -> StoreResult<CopyStatus> {
        self.reach(Step::PollCopy).await;
        self.inner.poll_copy(handle).await
    }

    async fn list(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        self.inner.list(container, prefix, continuation).await
    }

    async fn delete(&self, container: &str, path: &str) -> StoreResult<bool> {
        self.inner.delete(container, path).await
    }

    fn uri(&self, container: &str, path: &str) -> String {
        self.inner.uri(container, path)
    }
}
