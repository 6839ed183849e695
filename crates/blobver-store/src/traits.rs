use std::collections::BTreeMap;

use async_trait::async_trait;
use blobver_types::ETag;

use crate::error::StoreResult;
use crate::types::{
    BlobProperties, BlobRead, BlobReader, CopyHandle, CopyStatus, ListPage, WriteCondition,
    WriteOptions,
};

/// Object storage as consumed by the publish protocol and the collapse engine.
///
/// Implementations must be thread-safe (`Send + Sync`) and usable as
/// `Arc<dyn BlobStore>`. Every conditional operation checks and commits
/// atomically and reports an unmet condition as
/// [`StoreError::Conflict`](crate::StoreError::Conflict).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist.
    ///
    /// Returns `true` if this call created it.
    async fn ensure_container(&self, container: &str) -> StoreResult<bool>;

    /// Check whether the container exists.
    async fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// Open an object for reading.
    ///
    /// Returns `Ok(None)` if the container or the object does not exist.
    async fn read(&self, container: &str, path: &str) -> StoreResult<Option<BlobRead>>;

    /// Fetch an object's properties without its content.
    ///
    /// Returns `Ok(None)` if the container or the object does not exist.
    async fn properties(&self, container: &str, path: &str)
        -> StoreResult<Option<BlobProperties>>;

    /// Write `body` to `path`, applying `options` atomically with the content.
    ///
    /// Returns the new ETag.
    async fn write(
        &self,
        container: &str,
        path: &str,
        body: BlobReader,
        options: WriteOptions,
    ) -> StoreResult<ETag>;

    /// Replace the user metadata of an existing object.
    ///
    /// Returns the new ETag; fails with `NotFound` if the object is missing.
    async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: BTreeMap<String, String>,
        condition: WriteCondition,
    ) -> StoreResult<ETag>;

    /// Start a server-side copy of `source` onto `destination`.
    ///
    /// `source_if_match` guards the source, `destination_condition` the
    /// destination. Both are checked when the copy starts; the destination
    /// condition is checked again when the copy commits.
    async fn start_copy(
        &self,
        container: &str,
        source: &str,
        source_if_match: Option<&ETag>,
        destination: &str,
        destination_condition: WriteCondition,
    ) -> StoreResult<CopyHandle>;

    /// Report the state of a copy started by [`start_copy`](Self::start_copy).
    ///
    /// A destination condition that fails at commit is returned as
    /// [`StoreError::Conflict`](crate::StoreError::Conflict). Once a copy has
    /// settled its handle is released, and polling it again fails with
    /// [`StoreError::UnknownCopy`](crate::StoreError::UnknownCopy).
    async fn poll_copy(&self, handle: &CopyHandle) -> StoreResult<CopyStatus>;

    /// List one page of objects whose path starts with `prefix`.
    async fn list(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage>;

    /// Delete an object. Returns `true` if it existed.
    async fn delete(&self, container: &str, path: &str) -> StoreResult<bool>;

    /// The addressable URI of an object. Performs no I/O.
    fn uri(&self, container: &str, path: &str) -> String;

    /// List every object under `prefix`, following continuation tokens.
    async fn list_all(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let mut paths = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self.list(container, prefix, continuation.as_deref()).await?;
            paths.extend(page.items.into_iter().map(|item| item.path));
            match page.continuation {
                Some(token) => continuation = Some(token),
                None => return Ok(paths),
            }
        }
    }
}
